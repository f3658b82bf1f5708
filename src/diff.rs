//! Presence Diff Engine
//!
//! Derives the table-name x database presence matrix from a [`SummarySet`].
//! The comparison is name-based: identically named tables from different
//! databases are treated as the same table, and colliding display keys are
//! not merged.

use crate::summary::SummarySet;
use serde::{Deserialize, Serialize};

/// One matrix row: a table name and its presence per database key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceRow {
    pub name: String,
    pub presence: Vec<bool>,
}

impl PresenceRow {
    /// Present in every database
    pub fn is_uniform(&self) -> bool {
        self.presence.iter().all(|p| *p)
    }
}

/// Rows are sorted table names; columns are database keys in
/// configuration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceMatrix {
    pub databases: Vec<String>,
    pub tables: Vec<PresenceRow>,
}

impl PresenceMatrix {
    #[cfg(test)]
    pub fn cell(&self, table: &str, database_key: &str) -> Option<bool> {
        let col = self.databases.iter().position(|k| k == database_key)?;
        let row = self.tables.iter().find(|r| r.name == table)?;
        row.presence.get(col).copied()
    }

    /// Tables missing from at least one database.
    pub fn divergent(&self) -> impl Iterator<Item = &PresenceRow> {
        self.tables.iter().filter(|r| !r.is_uniform())
    }
}

/// The diff engine that builds presence matrices
pub struct DiffEngine;

impl DiffEngine {
    pub fn presence(summaries: &SummarySet) -> PresenceMatrix {
        let databases = summaries.database_keys();

        let tables = summaries
            .all_table_names()
            .into_iter()
            .map(|name| {
                // Walk the pairs directly: keys may collide, positions never do.
                let presence = summaries
                    .databases()
                    .map(|(_, db)| db.find_table(&name).is_some())
                    .collect();
                PresenceRow { name, presence }
            })
            .collect();

        PresenceMatrix { databases, tables }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summary::fixtures::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_two_connection_scenario() {
        let matrix = DiffEngine::presence(&two_connection_set());

        assert_eq!(matrix.databases, vec!["`a`.`d1`", "`b`.`d1`"]);
        assert_eq!(
            matrix.tables,
            vec![
                PresenceRow {
                    name: "orders".to_string(),
                    presence: vec![true, false],
                },
                PresenceRow {
                    name: "users".to_string(),
                    presence: vec![true, true],
                },
            ]
        );
        assert_eq!(matrix.cell("orders", "`b`.`d1`"), Some(false));
        assert_eq!(matrix.cell("users", "`b`.`d1`"), Some(true));
        assert_eq!(matrix.cell("nope", "`b`.`d1`"), None);
    }

    #[test]
    fn test_cells_match_find_table() {
        let set = SummarySet::new(vec![
            connection("a", "h1", vec![database("d1", &["t1", "t2"]), database("d2", &["t3"])]),
            connection("", "h2", vec![database("d1", &["t2", "t3", "t4"])]),
        ]);
        let matrix = DiffEngine::presence(&set);

        assert_eq!(matrix.databases.len(), 3);
        for row in &matrix.tables {
            assert_eq!(row.presence.len(), 3);
            for (cell, (_, db)) in row.presence.iter().zip(set.databases()) {
                assert_eq!(*cell, db.find_table(&row.name).is_some());
            }
        }
        let divergent: Vec<_> = matrix.divergent().map(|r| r.name.as_str()).collect();
        assert_eq!(divergent, vec!["t1", "t2", "t3", "t4"]);
    }

    #[test]
    fn test_colliding_keys_keep_separate_columns() {
        let set = SummarySet::new(vec![
            connection("dup", "h1", vec![database("d1", &["only_first"])]),
            connection("dup", "h2", vec![database("d1", &[])]),
        ]);
        let matrix = DiffEngine::presence(&set);
        assert_eq!(matrix.databases, vec!["`dup`.`d1`", "`dup`.`d1`"]);
        assert_eq!(matrix.tables[0].presence, vec![true, false]);
    }

    #[test]
    fn test_empty_set() {
        let matrix = DiffEngine::presence(&SummarySet::default());
        assert!(matrix.databases.is_empty());
        assert!(matrix.tables.is_empty());
    }
}
