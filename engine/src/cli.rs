//! CLI interface for Uchronia
//!
//! Command-line interface built with clap's derive API. The server is the
//! main entry point; the other commands run one pipeline step from the
//! terminal.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Uchronia: what if an invention had arrived in another era?
#[derive(Parser, Debug)]
#[command(name = "uchronia")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log: Option<String>,

    /// Specify alternate configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP server
    Serve {
        /// Interface to bind (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Check configuration and provider credentials
    Doctor,

    /// Break an invention into principles, components and prerequisites
    Deconstruct {
        /// Invention to analyze
        invention: String,
    },

    /// Simulate how an invention could have emerged in another era
    Simulate {
        /// Invention to simulate
        invention: String,

        /// Target era, e.g. "1800s"
        #[arg(short, long)]
        era: String,

        /// Number of pathways
        #[arg(short, long)]
        depth: Option<u32>,

        /// 0.0 (conservative) to 1.0 (imaginative)
        #[arg(short, long)]
        creativity: Option<f64>,
    },

    /// Build a slide deck from a saved export request
    Export {
        /// JSON file with the export request body
        input: PathBuf,

        /// Where to write the deck (defaults to a name derived from the title)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
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
    fn test_parse_simulate() {
        let cli = Cli::parse_from([
            "uchronia",
            "--json",
            "simulate",
            "Smartphone",
            "--era",
            "1800s",
            "--depth",
            "2",
        ]);
        assert!(cli.json);
        match cli.command {
            Command::Simulate {
                invention,
                era,
                depth,
                creativity,
            } => {
                assert_eq!(invention, "Smartphone");
                assert_eq!(era, "1800s");
                assert_eq!(depth, Some(2));
                assert_eq!(creativity, None);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["uchronia", "serve", "--port", "8080", "--log", "debug"]);
        assert_eq!(cli.log.as_deref(), Some("debug"));
        assert!(matches!(cli.command, Command::Serve { port: Some(8080), .. }));
    }
}
