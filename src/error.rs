//! Error handling module
//!
//! Provides unified error types for the whole summarize/diff pipeline.
//! Every variant carries enough context (offending name, phase) to be
//! actionable on its own; nothing is retried internally.

use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Malformed descriptor, missing key, bad formatter/output config value.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("unknown formatter {name:?} specified, expected one of: {available:?}")]
    UnknownFormatter { name: String, available: Vec<String> },

    #[error("unknown output {name:?} specified, expected one of: {available:?}")]
    UnknownOutput { name: String, available: Vec<String> },

    #[error("Connection error for {address}: {message}")]
    Connection { address: String, message: String },

    #[error("{}", introspection_message(.server.as_deref(), .database, .table.as_deref(), .message))]
    Introspection {
        server: Option<String>,
        database: String,
        table: Option<String>,
        message: String,
    },

    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    #[error("Render error: {0}")]
    Render(String),

    #[error("Output error: {0}")]
    Output(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn introspection_message(
    server: Option<&str>,
    database: &str,
    table: Option<&str>,
    message: &str,
) -> String {
    let mut out = format!("error summarizing database {:?}", database);
    if let Some(table) = table {
        out.push_str(&format!(" table {:?}", table));
    }
    if let Some(server) = server {
        out.push_str(&format!(" in server {:?}", server));
    }
    out.push_str(": ");
    out.push_str(message);
    out
}

impl AppError {
    /// Short, stable code for the error kind (used in logs).
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Config(_)
            | AppError::UnknownFormatter { .. }
            | AppError::UnknownOutput { .. } => "CONFIG_ERROR",
            AppError::Connection { .. } => "CONNECTION_ERROR",
            AppError::Introspection { .. } => "INTROSPECTION_ERROR",
            AppError::Cancelled(_) => "CANCELLED",
            AppError::Render(_) | AppError::Json(_) => "RENDER_ERROR",
            AppError::Output(_) | AppError::Io(_) => "OUTPUT_ERROR",
        }
    }

    /// Attach a table name to an introspection error that lacks one.
    pub fn with_table(self, table: &str) -> Self {
        match self {
            AppError::Introspection {
                server,
                database,
                table: None,
                message,
            } => AppError::Introspection {
                server,
                database,
                table: Some(table.to_string()),
                message,
            },
            other => other,
        }
    }

    /// Attach the server address to an introspection error.
    pub fn with_server(self, address: &str) -> Self {
        match self {
            AppError::Introspection {
                server: None,
                database,
                table,
                message,
            } => AppError::Introspection {
                server: Some(address.to_string()),
                database,
                table,
                message,
            },
            other => other,
        }
    }
}

/// Result type alias used across the crate
pub type AppResult<T> = Result<T, AppError>;

/// Helper function to create a configuration error
pub fn config_error(msg: impl Into<String>) -> AppError {
    AppError::Config(msg.into())
}

/// Helper function to create an introspection error scoped to a database
pub fn introspection_error(database: &str, msg: impl std::fmt::Display) -> AppError {
    AppError::Introspection {
        server: None,
        database: database.to_string(),
        table: None,
        message: msg.to_string(),
    }
}

/// Helper function to create a render error
pub fn render_error(msg: impl Into<String>) -> AppError {
    AppError::Render(msg.into())
}

/// Helper function to create an output error
pub fn output_error(msg: impl Into<String>) -> AppError {
    AppError::Output(msg.into())
}
