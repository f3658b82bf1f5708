//! schemadiff - database schema summaries and cross-connection diffs
//!
//! Introspects one or more MySQL/PostgreSQL servers (each scoped to a list
//! of databases), builds a nested connection -> database -> table -> column
//! summary and either prints it as JSON (`summary`) or renders a table
//! presence matrix through a pluggable formatter/output pair (`diff`).

mod cli;
mod config;
mod connection;
mod diff;
mod error;
mod format;
mod introspection;
mod output;
mod summary;

use crate::cli::{Cli, Command};
use crate::config::{FileSettings, Settings};
use crate::connection::ConnectionSet;
use crate::diff::DiffEngine;
use crate::error::{output_error, AppError, AppResult};
use crate::format::Formatter;
use crate::introspection::summarize_connections;
use crate::output::Sink;
use crate::summary::SummarySet;
use anyhow::Context;
use clap::Parser;
use std::future::Future;
use std::io::Write;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let file = FileSettings::load(cli.config.as_deref()).context("failed to load settings")?;
    let settings = Settings::resolve(&cli, file)?;

    let result = match &cli.command {
        Command::Formats => print_names(&format::available()),
        Command::Outputs => print_names(&output::available()),
        Command::Summary { .. } => run_summary(&settings).await,
        Command::Diff { .. } => run_diff(&settings).await,
    };

    if let Err(err) = result {
        error!(kind = err.kind(), "{}", err);
        return Err(err.into());
    }
    Ok(())
}

/// Initialize tracing with structured logging on stderr
fn init_tracing(verbose: u8) {
    let default_filter = match verbose {
        0 => "warn,schemadiff=info",
        1 => "warn,schemadiff=debug",
        _ => "info,schemadiff=trace",
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_level(true)
                .compact(),
        )
        .init();
}

fn print_names(names: &[String]) -> AppResult<()> {
    let mut out = std::io::stdout().lock();
    for name in names {
        writeln!(out, "{}", name)?;
    }
    Ok(())
}

async fn run_summary(settings: &Settings) -> AppResult<()> {
    let summaries = summarize(settings).await?;
    info!(connections = summaries.connections().len(), "Summary complete");
    let json = summaries.to_json(settings.pretty)?;

    let mut out = std::io::stdout().lock();
    writeln!(out, "{}", json)?;
    out.flush()?;
    Ok(())
}

async fn run_diff(settings: &Settings) -> AppResult<()> {
    // Reject bad formatter/output settings before touching any database.
    let formatter = format::build(&settings.format, &settings.format_config)?;
    let output = output::build(&settings.output, &settings.output_config)?;
    debug!(format = formatter.kind(), output = output.kind(), "Diff pipeline ready");

    let summaries = summarize(settings).await?;

    let matrix = DiffEngine::presence(&summaries);
    info!(
        tables = matrix.tables.len(),
        divergent = matrix.divergent().count(),
        "Presence matrix built"
    );

    deliver(formatter.as_ref(), &summaries, output.writer()?)
}

/// Render into `sink`, then flush and close it whether or not rendering
/// succeeded. A render error takes precedence over a flush error.
fn deliver(formatter: &dyn Formatter, summaries: &SummarySet, mut sink: Sink) -> AppResult<()> {
    let rendered = formatter.render(summaries, sink.as_mut());
    let flushed = sink.flush();
    drop(sink);

    rendered?;
    flushed.map_err(|e| output_error(format!("error flushing output: {}", e)))
}

/// Open every connection, summarize it, and close the pools whatever the
/// outcome. Ctrl-C or the configured timeout abort the run.
async fn summarize(settings: &Settings) -> AppResult<SummarySet> {
    let configs = settings.connection_configs()?;
    let connections = ConnectionSet::open(&configs)?;

    let result = tokio::select! {
        res = with_deadline(settings.timeout, summarize_connections(&connections)) => res,
        reason = shutdown_signal() => Err(AppError::Cancelled(reason.to_string())),
    };

    connections.close().await;
    result
}

async fn with_deadline<T>(
    timeout: Option<Duration>,
    fut: impl Future<Output = AppResult<T>>,
) -> AppResult<T> {
    match timeout {
        Some(limit) => tokio::time::timeout(limit, fut).await.map_err(|_| {
            AppError::Cancelled(format!("introspection exceeded {}s timeout", limit.as_secs()))
        })?,
        None => fut.await,
    }
}

/// Resolves when the process is asked to stop.
async fn shutdown_signal() -> &'static str {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal, cancelling...");
            "interrupted"
        },
        _ = terminate => {
            info!("Received terminate signal, cancelling...");
            "terminated"
        },
    }
}
