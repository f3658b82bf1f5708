//! Command-line interface definitions

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "schemadiff",
    version,
    about = "Summarize and compare database schemas across connections"
)]
pub struct Cli {
    /// Settings file (TOML/YAML/JSON); defaults to ./schemadiff.* when present
    #[arg(long, global = true, env = "SCHEMADIFF_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// A single connection: "addr=$addr user=$user pass=$pass db=$db[ db=$dbX][ label=$label][ engine=mysql|postgres]"
    #[arg(short = 'C', long = "conn", global = true, action = ArgAction::Append, value_name = "DESCRIPTOR")]
    pub conn: Vec<String>,

    /// Abort introspection after this many seconds
    #[arg(long, global = true, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Produce a JSON summary of all configured database schemas
    Summary {
        /// Produce indented JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Produce a diff of the database summaries
    Diff {
        /// Formatter to use (see `formats`)
        #[arg(long, value_name = "NAME")]
        format: Option<String>,

        /// Formatter configuration: "key=value,key2=value2"
        #[arg(long = "format-config", action = ArgAction::Append, value_name = "MAP")]
        format_config: Vec<String>,

        /// Destination of the formatted diff (see `outputs`)
        #[arg(long, value_name = "NAME")]
        out: Option<String>,

        /// Output configuration: "key=value,key2=value2"
        #[arg(long = "out-config", action = ArgAction::Append, value_name = "MAP")]
        out_config: Vec<String>,
    },

    /// List available formatters
    Formats,

    /// List available outputs
    Outputs,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_repeated_conn_and_maps() {
        let cli = Cli::parse_from([
            "schemadiff",
            "diff",
            "-C",
            "addr=a user=u pass=p db=d",
            "--conn",
            "addr=b user=u pass=p db=d",
            "--format-config",
            "style=bold",
            "--format-config",
            "header=false",
            "-vv",
        ]);
        assert_eq!(cli.conn.len(), 2);
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Diff { format_config, format, .. } => {
                assert_eq!(format_config, vec!["style=bold", "header=false"]);
                assert!(format.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
