//! Command-line interface for docpager
//!
//! This module handles:
//! - Command-line argument parsing using clap
//! - Configuration loading and validation
//! - Dispatch to the demo runners

pub mod demo;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::Config;
use crate::error::Result;

/// docpager - paginate live document queries
#[derive(Parser, Debug)]
#[command(
    name = "docpager",
    version,
    about = "Key-based pagination over live document queries",
    long_about = "Pages through ordered document queries backed by push-based snapshot
listeners, invalidating loaded pages whenever the underlying data changes."
)]
pub struct CliArgs {
    /// Configuration file path
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Verbose mode (detailed logging)
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Very verbose mode (trace logging)
    #[arg(long = "vv")]
    pub very_verbose: bool,

    /// Documents requested per page
    #[arg(long, value_name = "N")]
    pub page_size: Option<usize>,

    /// Snapshot emissions after which a page listener settles
    #[arg(long, value_name = "N")]
    pub settle: Option<usize>,

    /// Subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Page through a seeded in-memory collection
    Demo {
        /// Number of documents to seed
        #[arg(long, value_name = "N")]
        documents: Option<usize>,

        /// Insert a document after loading to show invalidation
        #[arg(long)]
        mutate: bool,

        /// Deliver each initial snapshot twice (cache, then server)
        #[arg(long)]
        double_delivery: bool,
    },

    /// Page through two concatenated queries
    Concat {
        /// Documents in the first query
        #[arg(long, default_value_t = 3)]
        first: usize,

        /// Documents in the second query
        #[arg(long, default_value_t = 2)]
        second: usize,
    },

    /// Print the effective configuration
    Config,
}

/// Parsed arguments together with the effective configuration.
#[derive(Debug)]
pub struct CliInterface {
    args: CliArgs,
    config: Config,
}

impl CliInterface {
    /// Parse process arguments and load the configuration
    pub fn new() -> Result<Self> {
        Self::from_args(CliArgs::parse())
    }

    /// Load the configuration for already-parsed arguments
    pub fn from_args(args: CliArgs) -> Result<Self> {
        let mut config = Config::load(args.config_file.as_deref())?;
        apply_args(&mut config, &args);
        config.validate()?;
        Ok(Self { args, config })
    }

    pub fn args(&self) -> &CliArgs {
        &self.args
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run the selected subcommand
    pub async fn run(&self) -> Result<()> {
        match &self.args.command {
            Commands::Demo {
                documents,
                mutate,
                double_delivery,
            } => {
                let mut config = self.config.clone();
                if let Some(documents) = documents {
                    config.demo.documents = *documents;
                }
                if *double_delivery {
                    config.demo.double_delivery = true;
                }
                demo::run_single(&config, *mutate).await
            }
            Commands::Concat { first, second } => {
                demo::run_concat(&self.config, *first, *second).await
            }
            Commands::Config => {
                print!("{}", self.config.to_toml()?);
                Ok(())
            }
        }
    }
}

/// Command-line arguments take precedence over every other source
fn apply_args(config: &mut Config, args: &CliArgs) {
    if let Some(page_size) = args.page_size {
        config.paging.page_size = page_size;
    }
    if let Some(settle) = args.settle {
        config.paging.settle_emissions = settle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_demo() {
        let args =
            CliArgs::try_parse_from(["docpager", "--page-size", "3", "demo", "--mutate"]).unwrap();
        assert_eq!(args.page_size, Some(3));
        assert_eq!(
            args.command,
            Commands::Demo {
                documents: None,
                mutate: true,
                double_delivery: false,
            }
        );
    }

    #[test]
    fn test_parse_concat_defaults() {
        let args = CliArgs::try_parse_from(["docpager", "concat"]).unwrap();
        assert_eq!(args.command, Commands::Concat { first: 3, second: 2 });
    }

    #[test]
    fn test_args_override_config() {
        let args =
            CliArgs::try_parse_from(["docpager", "--page-size", "4", "--settle", "3", "config"])
                .unwrap();
        let mut config = Config::default();
        apply_args(&mut config, &args);
        assert_eq!(config.paging.page_size, 4);
        assert_eq!(config.paging.settle_emissions, 3);
    }
}
