//! PostgreSQL schema source.
//!
//! A Postgres session is bound to one database for its whole life, so
//! instead of switching databases per transaction this source keeps one
//! pool per configured database. Tables come from `information_schema`
//! restricted to the session's current schema.

use super::SchemaSource;
use crate::config::ConnConfig;
use crate::connection::DatabaseType;
use crate::error::{introspection_error, AppError, AppResult};
use crate::summary::{ColumnSummary, TableSummary};
use async_trait::async_trait;
use deadpool_postgres::{Config, ManagerConfig, Pool, RecyclingMethod, Runtime, Transaction};
use tokio_postgres::{NoTls, Row};
use tracing::debug;

const LIST_TABLES: &str = r#"
    SELECT table_name::text, table_type::text
    FROM information_schema.tables
    WHERE table_schema = current_schema()
    ORDER BY table_name
"#;

// Key and Extra are reshaped into the MySQL vocabulary (PRI/UNI,
// auto_increment) so summaries from both engines compare cleanly.
const LIST_COLUMNS: &str = r#"
    SELECT
        c.column_name::text,
        c.data_type::text,
        c.is_nullable::text,
        CASE
            WHEN EXISTS (
                SELECT 1 FROM information_schema.table_constraints tc
                JOIN information_schema.key_column_usage kcu
                    ON tc.constraint_name = kcu.constraint_name
                    AND tc.table_schema = kcu.table_schema
                WHERE tc.constraint_type = 'PRIMARY KEY'
                    AND tc.table_schema = c.table_schema
                    AND tc.table_name = c.table_name
                    AND kcu.column_name = c.column_name
            ) THEN 'PRI'
            WHEN EXISTS (
                SELECT 1 FROM information_schema.table_constraints tc
                JOIN information_schema.key_column_usage kcu
                    ON tc.constraint_name = kcu.constraint_name
                    AND tc.table_schema = kcu.table_schema
                WHERE tc.constraint_type = 'UNIQUE'
                    AND tc.table_schema = c.table_schema
                    AND tc.table_name = c.table_name
                    AND kcu.column_name = c.column_name
            ) THEN 'UNI'
            ELSE ''
        END AS column_key,
        c.column_default::text,
        CASE
            WHEN c.is_identity = 'YES' OR c.column_default LIKE 'nextval(%' THEN 'auto_increment'
            ELSE ''
        END AS extra
    FROM information_schema.columns c
    WHERE c.table_schema = current_schema()
        AND c.table_name::text = $1
    ORDER BY c.ordinal_position
"#;

/// Postgres source with one lazily connected pool per database.
pub struct PostgresSource {
    pools: Vec<(String, Pool)>,
}

impl PostgresSource {
    pub fn open(config: &ConnConfig) -> AppResult<Self> {
        let (host, port) = config.host_port()?;

        let pools = config
            .databases
            .iter()
            .map(|database| {
                let mut cfg = Config::new();
                cfg.host = Some(host.clone());
                cfg.port = Some(port);
                cfg.user = Some(config.username.clone());
                cfg.password = Some(config.password.clone());
                cfg.dbname = Some(database.clone());
                cfg.manager = Some(ManagerConfig {
                    recycling_method: RecyclingMethod::Fast,
                });

                let pool = cfg
                    .create_pool(Some(Runtime::Tokio1), NoTls)
                    .map_err(|e| AppError::Connection {
                        address: config.address.clone(),
                        message: format!("Failed to create pool: {}", e),
                    })?;
                Ok((database.clone(), pool))
            })
            .collect::<AppResult<Vec<_>>>()?;

        Ok(Self { pools })
    }

    fn pool(&self, database: &str) -> AppResult<&Pool> {
        self.pools
            .iter()
            .find(|(name, _)| name == database)
            .map(|(_, pool)| pool)
            .ok_or_else(|| introspection_error(database, "database is not configured on this connection"))
    }

    async fn client(&self, database: &str) -> AppResult<deadpool_postgres::Client> {
        self.pool(database)?
            .get()
            .await
            .map_err(|e| introspection_error(database, format!("error acquiring connection: {}", e)))
    }
}

async fn begin_read_only<'a>(
    client: &'a mut deadpool_postgres::Client,
    database: &str,
) -> AppResult<Transaction<'a>> {
    let tx = client
        .build_transaction()
        .read_only(true)
        .start()
        .await
        .map_err(|e| introspection_error(database, format!("error starting transaction: {}", e)))?;
    debug!(database = %database, "Read-only transaction started");
    Ok(tx)
}

async fn commit(tx: Transaction<'_>, database: &str) -> AppResult<()> {
    tx.commit()
        .await
        .map_err(|e| introspection_error(database, format!("error committing transaction: {}", e)))
}

#[async_trait]
impl SchemaSource for PostgresSource {
    fn engine(&self) -> DatabaseType {
        DatabaseType::Postgres
    }

    async fn list_tables(&self, database: &str) -> AppResult<Vec<TableSummary>> {
        let mut client = self.client(database).await?;
        let tx = begin_read_only(&mut client, database).await?;

        let rows = tx
            .query(LIST_TABLES, &[])
            .await
            .map_err(|e| introspection_error(database, format!("error listing tables: {}", e)))?;

        let tables = rows
            .iter()
            .map(|row| {
                let name: String = row.try_get(0).map_err(|e| scan_failure(database, e))?;
                let kind: String = row.try_get(1).map_err(|e| scan_failure(database, e))?;
                Ok(TableSummary::new(name, kind))
            })
            .collect::<AppResult<Vec<_>>>()?;

        commit(tx, database).await?;
        Ok(tables)
    }

    async fn list_columns(&self, database: &str, table: &str) -> AppResult<Vec<ColumnSummary>> {
        let mut client = self.client(database).await?;
        let tx = begin_read_only(&mut client, database).await?;

        let rows = tx.query(LIST_COLUMNS, &[&table]).await.map_err(|e| {
            introspection_error(database, format!("error describing columns: {}", e))
                .with_table(table)
        })?;

        let columns = rows
            .iter()
            .map(|row| column_from_row(row).map_err(|e| scan_failure(database, e).with_table(table)))
            .collect::<AppResult<Vec<_>>>()?;

        commit(tx, database).await?;
        Ok(columns)
    }

    async fn close(&self) {
        for (_, pool) in &self.pools {
            pool.close();
        }
    }
}

fn column_from_row(row: &Row) -> Result<ColumnSummary, tokio_postgres::Error> {
    Ok(ColumnSummary {
        name: row.try_get(0)?,
        data_type: row.try_get(1)?,
        nullable: row.try_get(2)?,
        key: row.try_get(3)?,
        default: row.try_get(4)?,
        extra: row.try_get(5)?,
    })
}

fn scan_failure(database: &str, e: tokio_postgres::Error) -> AppError {
    introspection_error(database, format!("error scanning row: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_builds_pool_per_database() {
        let config =
            ConnConfig::parse("addr=127.0.0.1 user=u pass=p db=a db=b engine=postgres").unwrap();
        let source = PostgresSource::open(&config).unwrap();
        let names: Vec<_> = source.pools.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert!(source.pool("a").is_ok());
    }

    #[test]
    fn test_unconfigured_database_is_introspection_error() {
        let config = ConnConfig::parse("addr=127.0.0.1 user=u pass=p db=a engine=postgres").unwrap();
        let source = PostgresSource::open(&config).unwrap();
        let err = source.pool("other").unwrap_err();
        assert_eq!(err.kind(), "INTROSPECTION_ERROR");
        assert!(err.to_string().contains("\"other\""));
    }
}
