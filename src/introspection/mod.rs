//! Schema Introspection Module
//!
//! Walks every configured connection and database and builds the
//! [`SummarySet`]. Discovery runs in two phases per database: list the
//! tables (and views), then describe the columns of each table. Each phase
//! runs inside its own read-only transaction scoped to the database.
//!
//! The walk is sequential and fail-fast: the first error aborts the run and
//! no partial summary is returned.

mod mysql;
mod postgres;

pub use mysql::MySqlSource;
pub use postgres::PostgresSource;

use crate::connection::{ConnectionSet, DatabaseType};
use crate::error::{introspection_error, AppResult};
use crate::summary::{ColumnSummary, ConnectionSummary, DatabaseSummary, SummarySet, TableSummary};
use async_trait::async_trait;
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Engine-specific metadata queries.
///
/// Each call opens a read-only transaction bound to `database`, drains the
/// result rows and commits; any early return rolls the transaction back.
#[async_trait]
pub trait SchemaSource: Send + Sync {
    fn engine(&self) -> DatabaseType;

    /// Tables and views of `database` in engine order, with no columns.
    async fn list_tables(&self, database: &str) -> AppResult<Vec<TableSummary>>;

    /// Columns of `table` in engine order.
    async fn list_columns(&self, database: &str, table: &str) -> AppResult<Vec<ColumnSummary>>;

    /// Release pooled connections.
    async fn close(&self);
}

/// Summarize one database: list tables, then describe each table's columns.
pub async fn summarize_database(
    source: &dyn SchemaSource,
    database: &str,
) -> AppResult<DatabaseSummary> {
    let mut summary = DatabaseSummary::new(database);
    summary.tables = source.list_tables(database).await?;

    {
        let mut seen = HashSet::new();
        if let Some(dup) = summary.table_names().into_iter().find(|name| !seen.insert(*name)) {
            return Err(introspection_error(database, "duplicate table name").with_table(dup));
        }
    }

    for table in &mut summary.tables {
        let columns = source
            .list_columns(database, &table.name)
            .await
            .map_err(|e| e.with_table(&table.name))?;

        let mut seen = HashSet::new();
        if let Some(dup) = columns.iter().find(|c| !seen.insert(c.name.as_str())) {
            return Err(introspection_error(
                database,
                format!("duplicate column name {:?}", dup.name),
            )
            .with_table(&table.name));
        }

        debug!(
            database = %database,
            table = %table.name,
            view = table.is_view(),
            columns = columns.len(),
            "Table described"
        );
        table.columns = columns;
    }

    Ok(summary)
}

/// Summarize every database of every connection, in configuration order.
pub async fn summarize_connections(connections: &ConnectionSet) -> AppResult<SummarySet> {
    if connections.is_empty() {
        warn!("No connections to summarize");
    }
    let mut summaries = Vec::with_capacity(connections.len());

    for handle in connections.iter() {
        let mut conn_summary = ConnectionSummary::new(&handle.label, &handle.address);

        for database in &handle.databases {
            info!(
                connection = %handle.display_name(),
                database = %database,
                "Summarizing database"
            );

            let db_summary = summarize_database(handle.source(), database)
                .await
                .map_err(|e| e.with_server(&handle.address))?;

            debug!(
                database = %database,
                tables = db_summary.tables.len(),
                "Database summarized"
            );
            conn_summary.databases.push(db_summary);
        }

        summaries.push(conn_summary);
    }

    Ok(SummarySet::new(summaries))
}


#[cfg(test)]
mod tests {
    use super::memory::MemorySource;
    use super::*;
    use crate::connection::ConnectionHandle;
    use crate::error::AppError;
    use pretty_assertions::assert_eq;

    fn handle(label: &str, address: &str, dbs: &[&str], source: MemorySource) -> ConnectionHandle {
        ConnectionHandle::new(
            label,
            address,
            dbs.iter().map(|d| d.to_string()).collect(),
            Box::new(source),
        )
    }

    #[tokio::test]
    async fn test_summarize_database_two_phases_in_order() {
        let source = MemorySource::default().with_tables(
            "shop",
            &[("users", &["id", "email"]), ("orders", &["id", "user_id"])],
        );
        let calls = source.calls.clone();

        let summary = summarize_database(&source, "shop").await.unwrap();

        assert_eq!(summary.name, "shop");
        assert_eq!(summary.table_names(), vec!["users", "orders"]);
        let cols: Vec<_> = summary.tables[1].columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(cols, vec!["id", "user_id"]);
        assert_eq!(
            *calls.lock().unwrap(),
            vec!["tables:shop", "columns:shop.users", "columns:shop.orders"]
        );
    }

    #[tokio::test]
    async fn test_column_failure_names_database_and_table() {
        let source = MemorySource::default()
            .with_tables("shop", &[("users", &["id"]), ("orders", &["id"])])
            .failing("shop", Some("orders"));

        let err = summarize_database(&source, "shop").await.unwrap_err();
        match &err {
            AppError::Introspection { database, table, .. } => {
                assert_eq!(database, "shop");
                assert_eq!(table.as_deref(), Some("orders"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_duplicate_names_rejected() {
        let source = MemorySource::default().with_tables("d", &[("t", &["a"]), ("t", &["b"])]);
        let err = summarize_database(&source, "d").await.unwrap_err();
        assert!(err.to_string().contains("duplicate table name"));

        let source = MemorySource::default().with_tables("d", &[("t", &["a", "a"])]);
        let err = summarize_database(&source, "d").await.unwrap_err();
        assert!(err.to_string().contains("duplicate column name"));
    }

    #[tokio::test]
    async fn test_summarize_connections_preserves_order() {
        let a = MemorySource::default()
            .with_tables("d1", &[("users", &["id"]), ("orders", &["id"])])
            .with_tables("d0", &[]);
        let b = MemorySource::default().with_tables("d1", &[("users", &["id"])]);
        let set = ConnectionSet::new(vec![
            handle("a", "h1:3306", &["d1", "d0"], a),
            handle("", "h2:3306", &["d1"], b),
        ]);

        let summaries = summarize_connections(&set).await.unwrap();

        assert_eq!(summaries.database_keys(), vec!["`a`.`d1`", "`a`.`d0`", "`h2:3306`.`d1`"]);
        assert_eq!(summaries.all_table_names(), vec!["orders", "users"]);
        assert_eq!(summaries.connections()[1].label, "");
        assert_eq!(summaries.connections()[1].address, "h2:3306");
    }

    #[tokio::test]
    async fn test_failure_discards_whole_run() {
        let a = MemorySource::default().with_tables("d1", &[("users", &["id"])]);
        let b = MemorySource::default()
            .with_tables("d1", &[("users", &["id"])])
            .failing("d1", None);
        let b_calls = b.calls.clone();
        let set = ConnectionSet::new(vec![
            handle("a", "h1", &["d1"], a),
            handle("b", "h2", &["d1", "d2"], b),
        ]);

        let err = summarize_connections(&set).await.unwrap_err();

        assert_eq!(err.kind(), "INTROSPECTION_ERROR");
        let msg = err.to_string();
        assert!(msg.contains("\"d1\""), "{msg}");
        assert!(msg.contains("\"h2\""), "{msg}");
        // d2 is never attempted after d1 fails
        assert_eq!(*b_calls.lock().unwrap(), vec!["tables:d1"]);
    }

    #[tokio::test]
    async fn test_close_reaches_every_source() {
        let a = MemorySource::default();
        let b = MemorySource::default();
        let (a_calls, b_calls) = (a.calls.clone(), b.calls.clone());
        let set = ConnectionSet::new(vec![handle("a", "h1", &[], a), handle("b", "h2", &[], b)]);

        set.close().await;

        assert_eq!(*a_calls.lock().unwrap(), vec!["close"]);
        assert_eq!(*b_calls.lock().unwrap(), vec!["close"]);
    }
}
