//! File output.
//!
//! Keys: `dest` (required, non-empty), `trunc` (bool, default true; false
//! appends), `mode` (octal permission bits for a newly created file,
//! default `0666`, subject to the process umask).

use super::{Output, Sink};
use crate::config::{parse_bool, parse_octal_mode, ConfigMap};
use crate::error::{config_error, output_error, AppResult};
use std::fs::OpenOptions;
use std::io::BufWriter;
use std::path::PathBuf;
use tracing::{debug, warn};

pub const FILE: &str = "file";

const KEY_DEST: &str = "dest";
const KEY_TRUNC: &str = "trunc";
const KEY_MODE: &str = "mode";

const DEFAULT_MODE: u32 = 0o666;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileOutput {
    dest: PathBuf,
    truncate: bool,
    mode: u32,
}

impl FileOutput {
    pub fn from_config(config: &ConfigMap) -> AppResult<Self> {
        let mut dest = None;
        let mut truncate = true;
        let mut mode = DEFAULT_MODE;

        for (key, value) in config {
            match key.as_str() {
                KEY_DEST => dest = Some(value.as_str()),
                KEY_TRUNC => truncate = parse_bool(key, value)?,
                KEY_MODE => mode = parse_octal_mode(key, value)?,
                other => warn!(key = %other, "Ignoring unknown output config key"),
            }
        }

        let dest = match dest {
            Some(d) if !d.trim().is_empty() => PathBuf::from(d),
            Some(_) => return Err(config_error(format!("{:?} must not be empty", KEY_DEST))),
            None => {
                return Err(config_error(format!(
                    "missing {:?} config for {:?} output",
                    KEY_DEST, FILE
                )))
            }
        };

        Ok(Self {
            dest,
            truncate,
            mode,
        })
    }

    fn open_options(&self) -> OpenOptions {
        let mut options = OpenOptions::new();
        options.read(true).create(true);
        if self.truncate {
            options.write(true).truncate(true);
        } else {
            options.append(true);
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(self.mode);
        }

        options
    }
}

impl Output for FileOutput {
    fn kind(&self) -> &'static str {
        FILE
    }

    fn writer(&self) -> AppResult<Sink> {
        let file = self.open_options().open(&self.dest).map_err(|e| {
            output_error(format!("error opening file {:?}: {}", self.dest, e))
        })?;
        debug!(dest = %self.dest.display(), truncate = self.truncate, "Output file opened");
        Ok(Box::new(BufWriter::new(file)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn config(pairs: &[(&str, &str)]) -> ConfigMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_empty_dest_is_config_error() {
        let err = FileOutput::from_config(&config(&[("dest", "")])).unwrap_err();
        assert_eq!(err.kind(), "CONFIG_ERROR");
        assert!(err.to_string().contains("dest"));
    }

    #[test]
    fn test_defaults() {
        let out = FileOutput::from_config(&config(&[("dest", "/tmp/diff.txt")])).unwrap();
        assert!(out.truncate);
        assert_eq!(out.mode, 0o666);
        assert_eq!(out.dest, PathBuf::from("/tmp/diff.txt"));
    }

    #[test]
    fn test_bad_values() {
        assert!(FileOutput::from_config(&config(&[("dest", "x"), ("trunc", "nah")])).is_err());
        assert!(FileOutput::from_config(&config(&[("dest", "x"), ("mode", "rw")])).is_err());
    }

    #[test]
    fn test_truncate_then_append() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("diff.txt");
        let dest = path.to_string_lossy().to_string();

        let out = FileOutput::from_config(&config(&[("dest", &dest)])).unwrap();
        for body in ["first\n", "second\n"] {
            let mut w = out.writer().unwrap();
            w.write_all(body.as_bytes()).unwrap();
            w.flush().unwrap();
        }
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "second\n");

        let out = FileOutput::from_config(&config(&[("dest", &dest), ("trunc", "false")])).unwrap();
        let mut w = out.writer().unwrap();
        w.write_all(b"third\n").unwrap();
        drop(w);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "second\nthird\n");
    }

    #[cfg(unix)]
    #[test]
    fn test_mode_applies_to_new_file() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("private.txt");
        let dest = path.to_string_lossy().to_string();

        let out = FileOutput::from_config(&config(&[("dest", &dest), ("mode", "0600")])).unwrap();
        out.writer().unwrap().flush().unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_missing_directory_is_output_error() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("nope/diff.txt").to_string_lossy().to_string();
        let out = FileOutput::from_config(&config(&[("dest", &dest)])).unwrap();
        let err = out.writer().err().unwrap();
        assert_eq!(err.kind(), "OUTPUT_ERROR");
    }
}
