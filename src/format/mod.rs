//! Formatter registry
//!
//! A fixed, compiled-in map from formatter name to constructor. The map is
//! built once on first use and never mutated afterwards.

mod json;
mod table;

pub use json::JsonFormatter;
pub use table::{CellMarker, TableFormatter};

use crate::config::ConfigMap;
use crate::error::{AppError, AppResult};
use crate::summary::SummarySet;
use once_cell::sync::Lazy;
use std::collections::BTreeMap;
use std::io::Write;

/// Renders a [`SummarySet`] to a byte sink.
pub trait Formatter: Send + Sync {
    /// Registry name this formatter was built under.
    fn kind(&self) -> &'static str;

    fn render(&self, summaries: &SummarySet, sink: &mut dyn Write) -> AppResult<()>;
}

/// Builds a formatter from its string-keyed configuration.
pub type FormatConstructor = fn(&ConfigMap) -> AppResult<Box<dyn Formatter>>;

fn simple_table(cfg: &ConfigMap) -> AppResult<Box<dyn Formatter>> {
    Ok(Box::new(TableFormatter::from_config(CellMarker::Name, cfg)?))
}

fn presence_table(cfg: &ConfigMap) -> AppResult<Box<dyn Formatter>> {
    Ok(Box::new(TableFormatter::from_config(CellMarker::Presence, cfg)?))
}

fn json_document(cfg: &ConfigMap) -> AppResult<Box<dyn Formatter>> {
    Ok(Box::new(JsonFormatter::from_config(cfg)?))
}

static FORMATTERS: Lazy<BTreeMap<&'static str, FormatConstructor>> = Lazy::new(|| {
    let mut m: BTreeMap<&'static str, FormatConstructor> = BTreeMap::new();
    m.insert(table::SIMPLE_TABLE, simple_table);
    m.insert(table::PRESENCE_TABLE, presence_table);
    m.insert(json::JSON, json_document);
    m
});

/// Sorted names of every registered formatter.
pub fn available() -> Vec<String> {
    FORMATTERS.keys().map(|k| k.to_string()).collect()
}

/// Look up `name` and construct it with `config`.
pub fn build(name: &str, config: &ConfigMap) -> AppResult<Box<dyn Formatter>> {
    let constructor = FORMATTERS.get(name).ok_or_else(|| AppError::UnknownFormatter {
        name: name.to_string(),
        available: available(),
    })?;
    constructor(config)
}
