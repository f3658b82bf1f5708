//! Database Connection Handles
//!
//! An open, labeled, read-capable handle per configured server plus the
//! fixed list of databases to inspect on it. Handles are opened lazily:
//! no network traffic happens until the first introspection query.

use crate::config::ConnConfig;
use crate::error::{config_error, AppError, AppResult};
use crate::introspection::{MySqlSource, PostgresSource, SchemaSource};
use crate::summary;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::{debug, info};

/// Database type enum
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    #[default]
    MySql,
    Postgres,
}

impl DatabaseType {
    pub fn default_port(self) -> u16 {
        match self {
            DatabaseType::MySql => 3306,
            DatabaseType::Postgres => 5432,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DatabaseType::MySql => "mysql",
            DatabaseType::Postgres => "postgres",
        }
    }
}

impl FromStr for DatabaseType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mysql" | "mariadb" => Ok(DatabaseType::MySql),
            "postgres" | "postgresql" => Ok(DatabaseType::Postgres),
            other => Err(config_error(format!(
                "unsupported engine {:?}, expected one of: [mysql postgres]",
                other
            ))),
        }
    }
}

/// A labeled handle to one server and the databases to inspect on it
pub struct ConnectionHandle {
    pub label: String,
    pub address: String,
    pub databases: Vec<String>,
    source: Box<dyn SchemaSource>,
}

impl std::fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("label", &self.label)
            .field("address", &self.address)
            .field("databases", &self.databases)
            .field("engine", &self.source.engine())
            .finish()
    }
}

impl ConnectionHandle {
    pub fn new(
        label: impl Into<String>,
        address: impl Into<String>,
        databases: Vec<String>,
        source: Box<dyn SchemaSource>,
    ) -> Self {
        Self {
            label: label.into(),
            address: address.into(),
            databases,
            source,
        }
    }

    /// Build the engine-specific source for a parsed descriptor.
    pub fn open(config: &ConnConfig) -> AppResult<Self> {
        let source: Box<dyn SchemaSource> = match config.engine {
            DatabaseType::MySql => Box::new(MySqlSource::open(config)?),
            DatabaseType::Postgres => Box::new(PostgresSource::open(config)?),
        };

        debug!(
            address = %config.address,
            engine = config.engine.as_str(),
            databases = config.databases.len(),
            "Connection handle opened"
        );

        Ok(Self::new(
            config.label.clone(),
            config.address.clone(),
            config.databases.clone(),
            source,
        ))
    }

    pub fn source(&self) -> &dyn SchemaSource {
        self.source.as_ref()
    }

    pub fn display_name(&self) -> &str {
        summary::display_name(&self.label, &self.address)
    }
}

/// Every handle of one invocation, in configuration order
#[derive(Debug, Default)]
pub struct ConnectionSet {
    handles: Vec<ConnectionHandle>,
}

impl ConnectionSet {
    pub fn new(handles: Vec<ConnectionHandle>) -> Self {
        Self { handles }
    }

    pub fn open(configs: &[ConnConfig]) -> AppResult<Self> {
        let handles = configs
            .iter()
            .map(ConnectionHandle::open)
            .collect::<AppResult<Vec<_>>>()?;

        info!("Opened {} connection(s)", handles.len());
        Ok(Self::new(handles))
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConnectionHandle> {
        self.handles.iter()
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Close every underlying pool.
    pub async fn close(self) {
        for handle in &self.handles {
            handle.source.close().await;
        }
        debug!("Closed {} connection(s)", self.handles.len());
    }
}
