//! Output registry
//!
//! Outputs supply the byte sink a formatter writes into. Standard streams
//! are config-free; `file` is parameterized by its config map.

mod file;

pub use file::FileOutput;

use crate::config::ConfigMap;
use crate::error::{AppError, AppResult};
use once_cell::sync::Lazy;
use std::collections::BTreeMap;
use std::io::Write;

pub const STDOUT: &str = "stdout";
pub const STDERR: &str = "stderr";

/// A byte sink the pipeline flushes and drops after rendering.
pub type Sink = Box<dyn Write + Send>;

/// Supplies the sink for one rendering.
pub trait Output: Send + Sync {
    /// Registry name this output was built under.
    fn kind(&self) -> &'static str;

    fn writer(&self) -> AppResult<Sink>;
}

/// Builds an output from its string-keyed configuration.
pub type OutputConstructor = fn(&ConfigMap) -> AppResult<Box<dyn Output>>;

/// Standard out or standard error. The process stream itself is never closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StdStream {
    Out,
    Err,
}

impl Output for StdStream {
    fn kind(&self) -> &'static str {
        match self {
            StdStream::Out => STDOUT,
            StdStream::Err => STDERR,
        }
    }

    fn writer(&self) -> AppResult<Sink> {
        Ok(match self {
            StdStream::Out => Box::new(std::io::stdout()),
            StdStream::Err => Box::new(std::io::stderr()),
        })
    }
}

fn stdout_output(_: &ConfigMap) -> AppResult<Box<dyn Output>> {
    Ok(Box::new(StdStream::Out))
}

fn stderr_output(_: &ConfigMap) -> AppResult<Box<dyn Output>> {
    Ok(Box::new(StdStream::Err))
}

fn file_output(cfg: &ConfigMap) -> AppResult<Box<dyn Output>> {
    Ok(Box::new(FileOutput::from_config(cfg)?))
}

static OUTPUTS: Lazy<BTreeMap<&'static str, OutputConstructor>> = Lazy::new(|| {
    let mut m: BTreeMap<&'static str, OutputConstructor> = BTreeMap::new();
    m.insert(STDOUT, stdout_output);
    m.insert(STDERR, stderr_output);
    m.insert(file::FILE, file_output);
    m
});

/// Sorted names of every registered output.
pub fn available() -> Vec<String> {
    OUTPUTS.keys().map(|k| k.to_string()).collect()
}

/// Look up `name` and construct it with `config`.
pub fn build(name: &str, config: &ConfigMap) -> AppResult<Box<dyn Output>> {
    let constructor = OUTPUTS.get(name).ok_or_else(|| AppError::UnknownOutput {
        name: name.to_string(),
        available: available(),
    })?;
    constructor(config)
}
