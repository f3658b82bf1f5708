//! Presence matrix as a JSON document.

use super::Formatter;
use crate::config::{parse_bool, ConfigMap};
use crate::diff::DiffEngine;
use crate::error::{render_error, AppResult};
use crate::summary::SummarySet;
use std::io::Write;
use tracing::warn;

pub const JSON: &str = "json";

const KEY_PRETTY: &str = "pretty";

#[derive(Debug, Clone, Default)]
pub struct JsonFormatter {
    pretty: bool,
}

impl JsonFormatter {
    pub fn from_config(config: &ConfigMap) -> AppResult<Self> {
        let mut formatter = Self::default();
        for (key, value) in config {
            match key.as_str() {
                KEY_PRETTY => formatter.pretty = parse_bool(key, value)?,
                other => warn!(key = %other, "Ignoring unknown formatter config key"),
            }
        }
        Ok(formatter)
    }
}

impl Formatter for JsonFormatter {
    fn kind(&self) -> &'static str {
        JSON
    }

    fn render(&self, summaries: &SummarySet, sink: &mut dyn Write) -> AppResult<()> {
        let matrix = DiffEngine::presence(summaries);
        let encoded = if self.pretty {
            serde_json::to_writer_pretty(&mut *sink, &matrix)
        } else {
            serde_json::to_writer(&mut *sink, &matrix)
        };
        encoded.map_err(|e| render_error(format!("error encoding presence matrix: {}", e)))?;
        sink.write_all(b"\n")?;
        Ok(())
    }
}
