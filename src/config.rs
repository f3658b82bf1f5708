//! Application configuration module
//!
//! Loads settings from an optional config file and `SCHEMADIFF_*`
//! environment variables, merges command-line flags on top, and parses the
//! small configuration languages the tool accepts: connection descriptors
//! (`addr=... user=... db=...`) and formatter/output maps (`k1=v1,k2=v2`).

use crate::cli::{Cli, Command};
use crate::connection::DatabaseType;
use crate::error::{config_error, AppError, AppResult};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// String-keyed configuration handed to formatter/output constructors.
pub type ConfigMap = HashMap<String, String>;

pub const DEFAULT_FORMAT: &str = "simple-table";
pub const DEFAULT_OUTPUT: &str = "stdout";

const ENV_PREFIX: &str = "SCHEMADIFF";
const DEFAULT_CONFIG_NAME: &str = "schemadiff";

const KEY_LABEL: &str = "label";
const KEY_ADDR: &str = "addr";
const KEY_USER: &str = "user";
const KEY_PASS: &str = "pass";
const KEY_DB: &str = "db";
const KEY_ENGINE: &str = "engine";

/// A formatter/output map given either inline (`"k=v,k2=v2"`) or as a table.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MapSetting {
    Inline(String),
    Table(HashMap<String, String>),
}

impl MapSetting {
    fn merge_into(&self, map: &mut ConfigMap) -> AppResult<()> {
        match self {
            MapSetting::Inline(s) => parse_config_map(s, map),
            MapSetting::Table(t) => {
                map.extend(t.iter().map(|(k, v)| (k.clone(), v.clone())));
                Ok(())
            }
        }
    }
}

/// Settings read from the config file and environment
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FileSettings {
    pub connections: Vec<String>,
    pub pretty: Option<bool>,
    pub format: Option<String>,
    pub format_config: Option<MapSetting>,
    pub out: Option<String>,
    pub out_config: Option<MapSetting>,
    pub timeout_secs: Option<u64>,
}

impl FileSettings {
    /// Load from `path` (must exist) or from `schemadiff.*` in the working
    /// directory (optional), then layer `SCHEMADIFF_*` variables on top.
    pub fn load(path: Option<&Path>) -> AppResult<Self> {
        // Load .env file if it exists (ignore errors if file not found)
        let _ = dotenvy::dotenv();

        let file = match path {
            Some(p) => config::File::from(p).required(true),
            None => config::File::with_name(DEFAULT_CONFIG_NAME).required(false),
        };

        let settings = config::Config::builder()
            .add_source(file)
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .try_parsing(true)
                    .list_separator(";")
                    .with_list_parse_key("connections"),
            )
            .build()
            .map_err(|e| config_error(format!("failed to load settings: {}", e)))?;

        settings
            .try_deserialize()
            .map_err(|e| config_error(format!("failed to parse settings: {}", e)))
    }
}

/// Complete, merged settings for one invocation
#[derive(Debug, Clone)]
pub struct Settings {
    pub connection_specs: Vec<String>,
    pub pretty: bool,
    pub format: String,
    pub format_config: ConfigMap,
    pub output: String,
    pub output_config: ConfigMap,
    pub timeout: Option<Duration>,
}

impl Settings {
    /// Merge command-line flags over file/environment settings.
    pub fn resolve(cli: &Cli, file: FileSettings) -> AppResult<Self> {
        let connection_specs = if cli.conn.is_empty() {
            file.connections
        } else {
            cli.conn.clone()
        };

        let mut format_config = ConfigMap::new();
        if let Some(m) = &file.format_config {
            m.merge_into(&mut format_config)?;
        }
        let mut output_config = ConfigMap::new();
        if let Some(m) = &file.out_config {
            m.merge_into(&mut output_config)?;
        }

        let mut settings = Self {
            connection_specs,
            pretty: file.pretty.unwrap_or(false),
            format: file.format.unwrap_or_else(|| DEFAULT_FORMAT.to_string()),
            format_config,
            output: file.out.unwrap_or_else(|| DEFAULT_OUTPUT.to_string()),
            output_config,
            timeout: cli.timeout.or(file.timeout_secs).map(Duration::from_secs),
        };

        match &cli.command {
            Command::Summary { pretty } => {
                settings.pretty |= *pretty;
            }
            Command::Diff {
                format,
                format_config,
                out,
                out_config,
            } => {
                if let Some(f) = format {
                    settings.format = f.clone();
                }
                if let Some(o) = out {
                    settings.output = o.clone();
                }
                for raw in format_config {
                    parse_config_map(raw, &mut settings.format_config)?;
                }
                for raw in out_config {
                    parse_config_map(raw, &mut settings.output_config)?;
                }
            }
            Command::Formats | Command::Outputs => {}
        }

        debug!(
            connections = settings.connection_specs.len(),
            format = %settings.format,
            output = %settings.output,
            "Settings resolved"
        );

        Ok(settings)
    }

    /// Parse every connection descriptor; at least one is required.
    pub fn connection_configs(&self) -> AppResult<Vec<ConnConfig>> {
        if self.connection_specs.is_empty() {
            return Err(config_error(
                "at least one connection configuration must be provided",
            ));
        }

        self.connection_specs
            .iter()
            .map(|spec| {
                ConnConfig::parse(spec).map_err(|e| match e {
                    AppError::Config(msg) => {
                        config_error(format!("error parsing connection config: {}", msg))
                    }
                    other => other,
                })
            })
            .collect()
    }
}

/// One parsed connection descriptor
#[derive(Clone, PartialEq, Eq)]
pub struct ConnConfig {
    pub label: String,
    pub address: String,
    pub username: String,
    pub password: String,
    pub databases: Vec<String>,
    pub engine: DatabaseType,
}

impl std::fmt::Debug for ConnConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnConfig")
            .field("label", &self.label)
            .field("address", &self.address)
            .field("username", &self.username)
            .field("password", &"****")
            .field("databases", &self.databases)
            .field("engine", &self.engine)
            .finish()
    }
}

impl ConnConfig {
    /// Parse `addr=$addr user=$user pass=$pass db=$db[ db=$dbX][ label=$l][ engine=$e]`.
    ///
    /// Pairs with an empty value are skipped.
    pub fn parse(input: &str) -> AppResult<Self> {
        let mut label: Option<String> = None;
        let mut address: Option<String> = None;
        let mut username: Option<String> = None;
        let mut password: Option<String> = None;
        let mut engine: Option<DatabaseType> = None;
        let mut databases = Vec::new();

        for pair in input.split_whitespace() {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| config_error("connection format must be $key=$value"))?;
            let (key, value) = (key.trim(), value.trim());

            if key.is_empty() {
                return Err(config_error("key must not be empty"));
            }
            if value.is_empty() {
                continue;
            }

            match key {
                KEY_LABEL => set_once(&mut label, KEY_LABEL, value)?,
                KEY_ADDR => set_once(&mut address, KEY_ADDR, value)?,
                KEY_USER => set_once(&mut username, KEY_USER, value)?,
                KEY_PASS => set_once(&mut password, KEY_PASS, value)?,
                KEY_DB => databases.push(value.to_string()),
                KEY_ENGINE => {
                    if engine.is_some() {
                        return Err(config_error(format!(
                            "each conn must have only one {:?} key",
                            KEY_ENGINE
                        )));
                    }
                    engine = Some(value.parse()?);
                }
                other => return Err(config_error(format!("unknown key {:?}", other))),
            }
        }

        let address = address.ok_or_else(|| config_error("address must not be empty"))?;
        let username = username.ok_or_else(|| config_error("username must not be empty"))?;
        let password = password.ok_or_else(|| config_error("password must not be empty"))?;
        if databases.is_empty() {
            return Err(config_error(
                "must provide at least one database per connection config",
            ));
        }

        Ok(Self {
            label: label.unwrap_or_default(),
            address,
            username,
            password,
            databases,
            engine: engine.unwrap_or_default(),
        })
    }

    /// Split `host[:port]`, falling back to the engine's default port.
    pub fn host_port(&self) -> AppResult<(String, u16)> {
        let default_port = self.engine.default_port();
        // bare IPv6 ("::1") carries no port; use "[::1]:port" to set one
        if !self.address.starts_with('[') && self.address.matches(':').count() > 1 {
            return Ok((self.address.clone(), default_port));
        }
        match self.address.rsplit_once(':') {
            // bracketed IPv6 without port, e.g. "[::1]"
            Some((_, port)) if port.ends_with(']') => Ok((
                self.address.trim_start_matches('[').trim_end_matches(']').to_string(),
                default_port,
            )),
            Some((host, port)) => {
                let port = port.parse::<u16>().map_err(|_| {
                    config_error(format!("invalid port {:?} in address {:?}", port, self.address))
                })?;
                Ok((host.trim_start_matches('[').trim_end_matches(']').to_string(), port))
            }
            None => Ok((self.address.clone(), default_port)),
        }
    }
}

fn set_once(slot: &mut Option<String>, key: &str, value: &str) -> AppResult<()> {
    if slot.is_some() {
        return Err(config_error(format!(
            "each conn must have only one {:?} key",
            key
        )));
    }
    *slot = Some(value.to_string());
    Ok(())
}

/// Parse `"k1=v1,k2=v2[,]"` into `map`; later keys win.
pub fn parse_config_map(value: &str, map: &mut ConfigMap) -> AppResult<()> {
    for segment in value.split(',') {
        if segment.trim().is_empty() {
            continue;
        }
        let (key, val) = segment
            .split_once('=')
            .ok_or_else(|| config_error(format!("missing \"=\" value in key: {}", segment)))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(config_error(format!("empty key in pair: {}", segment)));
        }
        map.insert(key.to_string(), val.trim().to_string());
    }
    Ok(())
}

/// Boolean in the spellings operators tend to type.
pub fn parse_bool(key: &str, value: &str) -> AppResult<bool> {
    match value {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Ok(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Ok(false),
        _ => Err(config_error(format!(
            "unable to parse {:?} value {:?} as bool",
            key, value
        ))),
    }
}

/// Octal permission bits, e.g. `0644` or `644`.
pub fn parse_octal_mode(key: &str, value: &str) -> AppResult<u32> {
    let digits = value.trim_start_matches("0o");
    u32::from_str_radix(digits, 8)
        .ok()
        .filter(|m| *m <= 0o7777)
        .ok_or_else(|| {
            config_error(format!(
                "unable to parse {:?} value {:?} as octal mode",
                key, value
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_full_descriptor() {
        let cc = ConnConfig::parse("label=prod addr=db1:3307 user=root pass=s3cr=t db=a db=b").unwrap();
        assert_eq!(cc.label, "prod");
        assert_eq!(cc.address, "db1:3307");
        assert_eq!(cc.username, "root");
        assert_eq!(cc.password, "s3cr=t");
        assert_eq!(cc.databases, vec!["a", "b"]);
        assert_eq!(cc.engine, DatabaseType::MySql);
        assert_eq!(cc.host_port().unwrap(), ("db1".to_string(), 3307));
    }

    #[test]
    fn test_parse_descriptor_defaults() {
        let cc = ConnConfig::parse("addr=db1 user=u pass=p db=x engine=postgres label=").unwrap();
        assert_eq!(cc.label, "");
        assert_eq!(cc.engine, DatabaseType::Postgres);
        assert_eq!(cc.host_port().unwrap(), ("db1".to_string(), 5432));
    }

    #[test]
    fn test_parse_descriptor_errors() {
        let cases = [
            ("addr=h user=u pass=p", "at least one database"),
            ("user=u pass=p db=d", "address must not be empty"),
            ("addr=h pass=p db=d", "username must not be empty"),
            ("addr=h user=u db=d", "password must not be empty"),
            ("addr=h addr=h2 user=u pass=p db=d", "only one \"addr\""),
            ("label=a label=b addr=h user=u pass=p db=d", "only one \"label\""),
            ("addr=h user=u pass=p db=d port=1", "unknown key \"port\""),
            ("addr=h user=u pass=p db=d bogus", "$key=$value"),
            ("=x addr=h user=u pass=p db=d", "key must not be empty"),
            ("addr=h user=u pass=p db=d engine=oracle", "unsupported engine"),
        ];
        for (input, expected) in cases {
            let err = ConnConfig::parse(input).unwrap_err();
            assert!(
                err.to_string().contains(expected),
                "{input:?}: {err} does not mention {expected:?}"
            );
            assert_eq!(err.kind(), "CONFIG_ERROR");
        }
    }

    #[test]
    fn test_invalid_port() {
        let cc = ConnConfig::parse("addr=h:abc user=u pass=p db=d").unwrap();
        assert!(cc.host_port().is_err());
    }

    #[test]
    fn test_ipv6_addresses() {
        let host_port = |addr: &str| {
            ConnConfig::parse(&format!("addr={addr} user=u pass=p db=d"))
                .unwrap()
                .host_port()
                .unwrap()
        };
        assert_eq!(host_port("::1"), ("::1".to_string(), 3306));
        assert_eq!(host_port("fe80::1:2"), ("fe80::1:2".to_string(), 3306));
        assert_eq!(host_port("[::1]"), ("::1".to_string(), 3306));
        assert_eq!(host_port("[::1]:3307"), ("::1".to_string(), 3307));
    }

    #[test]
    fn test_debug_masks_password() {
        let cc = ConnConfig::parse("addr=h user=u pass=hunter2 db=d").unwrap();
        assert!(!format!("{cc:?}").contains("hunter2"));
    }

    #[test]
    fn test_parse_config_map() {
        let mut map = ConfigMap::new();
        parse_config_map("header=false,style=bold,", &mut map).unwrap();
        parse_config_map("style=double", &mut map).unwrap();
        assert_eq!(map.get("header").map(String::as_str), Some("false"));
        assert_eq!(map.get("style").map(String::as_str), Some("double"));

        let mut map = ConfigMap::new();
        parse_config_map("dest=", &mut map).unwrap();
        assert_eq!(map.get("dest").map(String::as_str), Some(""));

        assert!(parse_config_map("novalue", &mut ConfigMap::new()).is_err());
        assert!(parse_config_map("=v", &mut ConfigMap::new()).is_err());
    }

    #[test]
    fn test_parse_bool_and_mode() {
        assert!(parse_bool("header", "T").unwrap());
        assert!(!parse_bool("header", "0").unwrap());
        assert!(parse_bool("header", "yes").is_err());
        assert_eq!(parse_octal_mode("mode", "0644").unwrap(), 0o644);
        assert_eq!(parse_octal_mode("mode", "600").unwrap(), 0o600);
        assert!(parse_octal_mode("mode", "0999").is_err());
        assert!(parse_octal_mode("mode", "").is_err());
    }

    #[test]
    fn test_resolve_cli_overrides_file() {
        let cli = Cli::parse_from([
            "schemadiff",
            "-C",
            "addr=h user=u pass=p db=d",
            "diff",
            "--format",
            "presence-table",
            "--format-config",
            "header=false",
            "--out-config",
            "dest=/tmp/x,trunc=false",
        ]);
        let file = FileSettings {
            connections: vec!["addr=other user=u pass=p db=d".to_string()],
            format: Some("json".to_string()),
            format_config: Some(MapSetting::Inline("style=bold,header=true".to_string())),
            out: Some("file".to_string()),
            timeout_secs: Some(30),
            ..Default::default()
        };

        let settings = Settings::resolve(&cli, file).unwrap();
        assert_eq!(settings.connection_specs, vec!["addr=h user=u pass=p db=d"]);
        assert_eq!(settings.format, "presence-table");
        assert_eq!(settings.format_config.get("style").map(String::as_str), Some("bold"));
        assert_eq!(settings.format_config.get("header").map(String::as_str), Some("false"));
        assert_eq!(settings.output, "file");
        assert_eq!(settings.output_config.get("trunc").map(String::as_str), Some("false"));
        assert_eq!(settings.timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_resolve_defaults_and_missing_connections() {
        let cli = Cli::parse_from(["schemadiff", "summary", "--pretty"]);
        let settings = Settings::resolve(&cli, FileSettings::default()).unwrap();
        assert!(settings.pretty);
        assert_eq!(settings.format, DEFAULT_FORMAT);
        assert_eq!(settings.output, DEFAULT_OUTPUT);
        let err = settings.connection_configs().unwrap_err();
        assert!(err.to_string().contains("at least one connection"));
    }
}
