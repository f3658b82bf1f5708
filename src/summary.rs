//! Summary Model
//!
//! The canonical connection -> database -> table -> column value produced by
//! introspection. Pure data: the JSON shape of the `summary` command mirrors
//! these types field for field.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A single column, exactly as the engine described it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSummary {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    /// Nullability as reported by the engine (`YES` / `NO`).
    pub nullable: String,
    /// Key role (`PRI`, `UNI`, `MUL` or empty).
    pub key: String,
    /// `None` when the column has no default; serializes as `null`.
    pub default: Option<String>,
    pub extra: String,
}

/// A table or view and its columns in engine order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSummary {
    pub name: String,
    /// Table kind as reported by the engine (`BASE TABLE`, `VIEW`, ...).
    #[serde(rename = "type")]
    pub kind: String,
    pub columns: Vec<ColumnSummary>,
}

impl TableSummary {
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            columns: Vec::new(),
        }
    }

    pub fn is_view(&self) -> bool {
        self.kind.to_ascii_uppercase().contains("VIEW")
    }

    #[cfg(test)]
    pub fn find_column(&self, name: &str) -> Option<&ColumnSummary> {
        self.columns.iter().find(|c| c.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSummary {
    pub name: String,
    pub tables: Vec<TableSummary>,
}

impl DatabaseSummary {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tables: Vec::new(),
        }
    }

    /// Table names in discovery order
    pub fn table_names(&self) -> Vec<&str> {
        self.tables.iter().map(|t| t.name.as_str()).collect()
    }

    /// Linear lookup; schema metadata is small.
    pub fn find_table(&self, name: &str) -> Option<&TableSummary> {
        self.tables.iter().find(|t| t.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSummary {
    pub label: String,
    pub address: String,
    pub databases: Vec<DatabaseSummary>,
}

impl ConnectionSummary {
    pub fn new(label: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            address: address.into(),
            databases: Vec::new(),
        }
    }

    pub fn display_name(&self) -> &str {
        display_name(&self.label, &self.address)
    }
}

/// The result of one introspection run, in connection configuration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SummarySet(pub Vec<ConnectionSummary>);

impl SummarySet {
    pub fn new(connections: Vec<ConnectionSummary>) -> Self {
        Self(connections)
    }

    pub fn connections(&self) -> &[ConnectionSummary] {
        &self.0
    }

    /// Every (connection, database) pair in configuration order.
    pub fn databases(&self) -> impl Iterator<Item = (&ConnectionSummary, &DatabaseSummary)> {
        self.0
            .iter()
            .flat_map(|c| c.databases.iter().map(move |db| (c, db)))
    }

    /// One display key per (connection, database) pair: `` `conn`.`db` ``.
    /// Colliding labels are kept as-is.
    pub fn database_keys(&self) -> Vec<String> {
        self.databases()
            .map(|(c, db)| database_key(c.display_name(), &db.name))
            .collect()
    }

    /// Sorted, de-duplicated union of every table name across the set.
    pub fn all_table_names(&self) -> Vec<String> {
        let names: BTreeSet<&str> = self
            .databases()
            .flat_map(|(_, db)| db.tables.iter().map(|t| t.name.as_str()))
            .collect();
        names.into_iter().map(str::to_string).collect()
    }

    pub fn to_json(&self, pretty: bool) -> serde_json::Result<String> {
        if pretty {
            serde_json::to_string_pretty(self)
        } else {
            serde_json::to_string(self)
        }
    }
}

/// Human-facing connection name: the label if non-empty, else the address.
pub fn display_name<'a>(label: &'a str, address: &'a str) -> &'a str {
    if label.is_empty() {
        address
    } else {
        label
    }
}

pub fn database_key(connection: &str, database: &str) -> String {
    format!("`{}`.`{}`", connection, database)
}
