//! Command-line interface for binexport
//!
//! This module handles:
//! - Command-line argument parsing using clap
//! - Configuration loading and merging with arguments
//! - Subcommands (version, completion, config)

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use crate::config::{Config, ExportSettings, LogLevel};
use crate::connection::redact_uri;
use crate::error::Result;

pub mod completion;

/// Export a time-indexed MongoDB collection as size-bounded, compressed bins
#[derive(Parser, Debug)]
#[command(
    name = "binexport",
    version,
    about = "Export a MongoDB collection in size-bounded time bins",
    long_about = "Partitions a time range into bins holding at most a configured number of
records, then writes each bin as a gzip-compressed JSON Lines file and records it
in a CSV manifest."
)]
pub struct CliArgs {
    /// MongoDB connection URI
    ///
    /// Format: mongodb://[username:password@]host[:port][/database][?options]
    #[arg(long, value_name = "URI")]
    pub uri: Option<String>,

    /// Database holding the collection
    #[arg(short = 'd', long, value_name = "NAME")]
    pub database: Option<String>,

    /// Collection to export
    #[arg(short = 't', long, value_name = "NAME")]
    pub collection: Option<String>,

    /// Field holding the record timestamp
    #[arg(long, value_name = "FIELD")]
    pub time_field: Option<String>,

    /// Inclusive start of the range (RFC 3339)
    #[arg(long, value_name = "TIME")]
    pub start: Option<String>,

    /// Exclusive end of the range (RFC 3339)
    #[arg(long, value_name = "TIME")]
    pub end: Option<String>,

    /// Extra filter in Extended JSON, e.g. '{"level": "error"}'
    #[arg(long, value_name = "JSON")]
    pub filter: Option<String>,

    /// First slice width, e.g. 1d or 6h
    #[arg(long, value_name = "DURATION")]
    pub initial_slice: Option<String>,

    /// Narrowest slice width, e.g. 1m
    #[arg(long, value_name = "DURATION")]
    pub min_slice: Option<String>,

    /// Record ceiling per bin
    #[arg(long = "max-records", value_name = "COUNT")]
    pub max_records: Option<u64>,

    /// Attempts per remote operation
    #[arg(long, value_name = "COUNT")]
    pub max_retries: Option<u32>,

    /// Timeout per remote operation, e.g. 10m
    #[arg(long, value_name = "DURATION")]
    pub timeout: Option<String>,

    /// Directory receiving the compressed files
    #[arg(short = 'o', long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Manifest file (relative paths live inside the output directory)
    #[arg(long, value_name = "FILE")]
    pub manifest: Option<PathBuf>,

    /// Print the plan without exporting anything
    #[arg(long)]
    pub plan_only: bool,

    /// Disable progress bars
    #[arg(long)]
    pub no_progress: bool,

    /// Configuration file path
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Quiet mode (warnings and errors only)
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Verbose mode (detailed logging)
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Very verbose mode (trace logging)
    #[arg(long = "vv")]
    pub very_verbose: bool,

    /// Subcommands
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Subcommands for binexport
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show version information
    Version,

    /// Generate shell completion script
    Completion {
        /// Shell type (bash, zsh, fish)
        #[arg(value_name = "SHELL")]
        shell: String,
    },

    /// Show or validate configuration
    Config {
        /// Show effective configuration
        #[arg(long)]
        show: bool,

        /// Validate configuration and arguments
        #[arg(long)]
        validate: bool,
    },
}

/// CLI interface handler
pub struct CliInterface {
    /// Parsed command-line arguments
    args: CliArgs,

    /// Configuration with arguments applied
    config: Config,
}

impl CliInterface {
    /// Parse the process arguments and load configuration
    pub fn new() -> Result<Self> {
        Self::from_args(CliArgs::parse())
    }

    /// Build the interface from already parsed arguments
    pub fn from_args(args: CliArgs) -> Result<Self> {
        let config = Self::load_config(&args)?;
        Ok(Self { args, config })
    }

    /// Load configuration from file and merge with arguments
    ///
    /// # Arguments
    /// * `args` - Command-line arguments
    ///
    /// # Returns
    /// * `Result<Config>` - Loaded configuration or error
    fn load_config(args: &CliArgs) -> Result<Config> {
        let mut config = Config::load_from_file(args.config_file.as_deref())?;
        Self::apply_args_to_config(&mut config, args);
        Ok(config)
    }

    /// Override configuration values with the arguments that were given
    fn apply_args_to_config(config: &mut Config, args: &CliArgs) {
        if let Some(uri) = &args.uri {
            config.connection.uri = uri.clone();
        }

        let export = &mut config.export;
        if let Some(v) = &args.database {
            export.database = Some(v.clone());
        }
        if let Some(v) = &args.collection {
            export.collection = Some(v.clone());
        }
        if let Some(v) = &args.time_field {
            export.time_field = v.clone();
        }
        if let Some(v) = &args.start {
            export.start = Some(v.clone());
        }
        if let Some(v) = &args.end {
            export.end = Some(v.clone());
        }
        if let Some(v) = &args.filter {
            export.filter = Some(v.clone());
        }
        if let Some(v) = &args.initial_slice {
            export.initial_slice = v.clone();
        }
        if let Some(v) = &args.min_slice {
            export.min_slice = v.clone();
        }
        if let Some(v) = args.max_records {
            export.max_records_per_bin = v;
        }
        if let Some(v) = args.max_retries {
            export.max_retries = v;
        }
        if let Some(v) = &args.timeout {
            export.query_timeout = v.clone();
        }
        if let Some(v) = &args.output_dir {
            export.output_dir = v.clone();
        }
        if let Some(v) = &args.manifest {
            export.manifest_file = v.clone();
        }

        if args.very_verbose {
            config.logging.level = LogLevel::Trace;
        } else if args.verbose {
            config.logging.level = LogLevel::Debug;
        } else if args.quiet {
            config.logging.level = LogLevel::Warn;
        }
    }

    /// Resolve the settings for an export run
    pub fn export_settings(&self) -> Result<ExportSettings> {
        let mut settings = ExportSettings::resolve(&self.config)?;
        settings.plan_only = self.args.plan_only;
        settings.show_progress = !(self.args.no_progress || self.args.quiet);
        Ok(settings)
    }

    /// Handle subcommands
    ///
    /// # Returns
    /// * `Result<bool>` - True if a subcommand was handled and the program should exit
    pub async fn handle_subcommand(&self) -> Result<bool> {
        let Some(command) = &self.args.command else {
            return Ok(false);
        };

        match command {
            Commands::Version => {
                println!("binexport {}", env!("CARGO_PKG_VERSION"));
            }
            Commands::Completion { shell } => {
                completion::generate_completion(shell)?;
            }
            Commands::Config { show, validate } => {
                if *validate {
                    self.config.validate()?;
                    if self.has_export_target() {
                        self.export_settings()?;
                    }
                    println!("Configuration is valid");
                }
                if *show || !*validate {
                    let mut shown = self.config.clone();
                    shown.connection.uri = redact_uri(&shown.connection.uri);
                    print!("{}", shown.to_toml()?);
                }
            }
        }

        Ok(true)
    }

    /// Whether a collection and range were given, so resolution is meaningful
    fn has_export_target(&self) -> bool {
        let export = &self.config.export;
        export.collection.is_some() || export.start.is_some() || export.end.is_some()
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get the CLI arguments
    pub fn args(&self) -> &CliArgs {
        &self.args
    }

    /// Explicit configuration file, if one was given
    pub fn config_path(&self) -> Option<&Path> {
        self.args.config_file.as_deref()
    }
}
