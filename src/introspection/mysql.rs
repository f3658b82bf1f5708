//! MySQL schema source.
//!
//! Uses `SHOW FULL TABLES` and ``SHOW COLUMNS FROM `t` `` after a
//! ``USE `db` `` inside a read-only transaction. Statements are sent as
//! plain `&str` so sqlx uses the text protocol: `USE` cannot be prepared.

use super::SchemaSource;
use crate::config::ConnConfig;
use crate::connection::DatabaseType;
use crate::error::{introspection_error, AppError, AppResult};
use crate::summary::{ColumnSummary, TableSummary};
use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection, MySqlPoolOptions, MySqlRow};
use sqlx::pool::PoolConnection;
use sqlx::{Connection, Executor, MySql, MySqlPool, Row, Transaction};
use std::time::Duration;
use tracing::{debug, warn};

const LIST_TABLES: &str = "SHOW FULL TABLES";

/// MySQL source backed by a lazily connected single-connection pool.
pub struct MySqlSource {
    pool: MySqlPool,
}

impl MySqlSource {
    pub fn open(config: &ConnConfig) -> AppResult<Self> {
        let (host, port) = config.host_port()?;

        let options = MySqlConnectOptions::new()
            .host(&host)
            .port(port)
            .username(&config.username)
            .password(&config.password);

        // Introspection is sequential; one connection is enough.
        let pool = MySqlPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(Duration::from_secs(30))
            .connect_lazy_with(options);

        Ok(Self { pool })
    }

    async fn acquire(&self, database: &str) -> AppResult<PoolConnection<MySql>> {
        self.pool.acquire().await.map_err(|e| {
            introspection_error(database, format!("error acquiring connection: {}", e))
        })
    }
}

/// Start a read-only transaction on `conn` and switch it to `database`.
///
/// Dropping the returned transaction without committing rolls it back.
async fn begin_read_only<'c>(
    conn: &'c mut MySqlConnection,
    database: &str,
) -> AppResult<Transaction<'c, MySql>> {
    // Applies to the next transaction started on this session only.
    conn.execute("SET TRANSACTION READ ONLY")
        .await
        .map_err(|e| introspection_error(database, format!("error starting transaction: {}", e)))?;

    let mut tx = conn
        .begin()
        .await
        .map_err(|e| introspection_error(database, format!("error starting transaction: {}", e)))?;

    let use_stmt = format!("USE {}", quote_ident(database));
    if let Err(e) = (&mut *tx).execute(use_stmt.as_str()).await {
        if let Err(rb) = tx.rollback().await {
            warn!(database = %database, "Rollback failed: {}", rb);
        }
        return Err(query_failure(database, &use_stmt, e));
    }

    debug!(database = %database, "Read-only transaction started");
    Ok(tx)
}

async fn commit(tx: Transaction<'_, MySql>, database: &str) -> AppResult<()> {
    tx.commit()
        .await
        .map_err(|e| introspection_error(database, format!("error committing transaction: {}", e)))
}

#[async_trait]
impl SchemaSource for MySqlSource {
    fn engine(&self) -> DatabaseType {
        DatabaseType::MySql
    }

    async fn list_tables(&self, database: &str) -> AppResult<Vec<TableSummary>> {
        let mut conn = self.acquire(database).await?;
        let mut tx = begin_read_only(&mut conn, database).await?;

        let rows = (&mut *tx)
            .fetch_all(LIST_TABLES)
            .await
            .map_err(|e| query_failure(database, LIST_TABLES, e))?;

        let tables = rows
            .iter()
            .map(|row| {
                let name = text(row, 0).map_err(|e| scan_failure(database, e))?;
                let kind = text(row, 1).map_err(|e| scan_failure(database, e))?;
                Ok(TableSummary::new(name, kind))
            })
            .collect::<AppResult<Vec<_>>>()?;

        commit(tx, database).await?;
        Ok(tables)
    }

    async fn list_columns(&self, database: &str, table: &str) -> AppResult<Vec<ColumnSummary>> {
        let query = format!("SHOW COLUMNS FROM {}", quote_ident(table));

        let mut conn = self.acquire(database).await?;
        let mut tx = begin_read_only(&mut conn, database).await?;

        let rows = (&mut *tx)
            .fetch_all(query.as_str())
            .await
            .map_err(|e| query_failure(database, &query, e).with_table(table))?;

        let columns = rows
            .iter()
            .map(|row| column_from_row(row).map_err(|e| scan_failure(database, e).with_table(table)))
            .collect::<AppResult<Vec<_>>>()?;

        commit(tx, database).await?;
        Ok(columns)
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

/// `Field, Type, Null, Key, Default, Extra`
fn column_from_row(row: &MySqlRow) -> Result<ColumnSummary, sqlx::Error> {
    Ok(ColumnSummary {
        name: text(row, 0)?,
        data_type: text(row, 1)?,
        nullable: text(row, 2)?,
        key: text(row, 3)?,
        default: optional_text(row, 4)?,
        extra: text(row, 5)?,
    })
}

// SHOW output column types vary across server versions (VARCHAR, TEXT,
// VARBINARY), so decode raw bytes without the declared-type check.
fn text(row: &MySqlRow, idx: usize) -> Result<String, sqlx::Error> {
    Ok(optional_text(row, idx)?.unwrap_or_default())
}

fn optional_text(row: &MySqlRow, idx: usize) -> Result<Option<String>, sqlx::Error> {
    let raw: Option<Vec<u8>> = row.try_get_unchecked(idx)?;
    Ok(raw.map(|bytes| String::from_utf8_lossy(&bytes).into_owned()))
}

/// Backtick-quote an identifier, doubling embedded backticks.
fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

fn query_failure(database: &str, query: &str, e: sqlx::Error) -> AppError {
    introspection_error(database, format!("error executing query {:?}: {}", query, e))
}

fn scan_failure(database: &str, e: sqlx::Error) -> AppError {
    introspection_error(database, format!("error scanning row: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("users"), "`users`");
        assert_eq!(quote_ident("we`ird"), "`we``ird`");
    }

    #[tokio::test]
    async fn test_unreachable_server_is_introspection_error() {
        let config = ConnConfig::parse("addr=127.0.0.1:1 user=u pass=p db=d").unwrap();
        let source = MySqlSource {
            pool: MySqlPoolOptions::new()
                .max_connections(1)
                .acquire_timeout(Duration::from_millis(500))
                .connect_lazy_with(
                    MySqlConnectOptions::new()
                        .host("127.0.0.1")
                        .port(1)
                        .username(&config.username)
                        .password(&config.password),
                ),
        };

        let err = source.list_tables("d").await.unwrap_err();
        assert_eq!(err.kind(), "INTROSPECTION_ERROR");
        assert!(err.to_string().contains("\"d\""));
        source.close().await;
    }
}
