mod migrate;
mod settings;

use std::path::PathBuf;
use std::process;

use clap::{Args, Parser, Subcommand, ValueEnum};
use configmigration_core::DocumentFormat;
use tracing_subscriber::EnvFilter;

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Text format of a configuration document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum DocFormat {
    Json,
    Yaml,
}

impl From<DocFormat> for DocumentFormat {
    fn from(f: DocFormat) -> Self {
        match f {
            DocFormat::Json => DocumentFormat::Json,
            DocFormat::Yaml => DocumentFormat::Yaml,
        }
    }
}

/// Versioned migrations for configuration files.
#[derive(Parser)]
#[command(
    name = "configmigration",
    version,
    about = "Versioned migrations for configuration files"
)]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    /// Log progress to stderr (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// TOML settings file; command-line flags take precedence
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Flags shared by every command that reads a configuration document.
#[derive(Args, Debug, Clone, Default)]
pub(crate) struct RunArgs {
    /// Directory of V<version>__<description>.yaml migration files
    #[arg(long)]
    pub migrations: Option<PathBuf>,
    /// Version to migrate to (default: latest available)
    #[arg(long)]
    pub target: Option<String>,
    /// Path expression locating the version field (default: $.version)
    #[arg(long)]
    pub version_path: Option<String>,
    /// Version assumed when the document has no version field
    #[arg(long)]
    pub default_version: Option<String>,
    /// Let migrations create missing intermediate mappings
    #[arg(long)]
    pub create_missing: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Migrate a configuration file to the target version
    Migrate {
        /// Path to the configuration file (.json, .yaml or .yml)
        config: PathBuf,
        #[command(flatten)]
        run: RunArgs,
        /// Format of the migrated document (default: same as the input)
        #[arg(long, value_enum)]
        format: Option<DocFormat>,
        /// Migrate without writing anything
        #[arg(long)]
        dry_run: bool,
        /// Overwrite the configuration file with the result
        #[arg(long, conflicts_with = "out")]
        write: bool,
        /// Write the result to this file instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Show the migrations that would be applied to a configuration file
    Plan {
        /// Path to the configuration file
        config: PathBuf,
        #[command(flatten)]
        run: RunArgs,
    },

    /// List the available migrations
    List {
        /// Directory of migration files
        #[arg(long)]
        migrations: Option<PathBuf>,
    },

    /// Print the version recorded in a configuration file
    Version {
        /// Path to the configuration file
        config: PathBuf,
        #[command(flatten)]
        run: RunArgs,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let settings = match &cli.settings {
        Some(path) => match settings::read_settings(path) {
            Ok(s) => s,
            Err(e) => {
                report_error(&e, cli.output, cli.quiet);
                process::exit(1);
            }
        },
        None => settings::Settings::default(),
    };

    match cli.command {
        Commands::Migrate {
            config,
            run,
            format,
            dry_run,
            write,
            out,
        } => {
            let target = if dry_run {
                migrate::Destination::Discard
            } else if write {
                migrate::Destination::File(config.clone())
            } else if let Some(out) = out {
                migrate::Destination::File(out)
            } else {
                migrate::Destination::Stdout
            };
            migrate::cmd_migrate(
                &config,
                &settings,
                &run,
                format,
                target,
                cli.output,
                cli.quiet,
            );
        }
        Commands::Plan { config, run } => {
            migrate::cmd_plan(&config, &settings, &run, cli.output, cli.quiet);
        }
        Commands::List { migrations } => {
            let run = RunArgs {
                migrations,
                ..RunArgs::default()
            };
            migrate::cmd_list(&settings, &run, cli.output, cli.quiet);
        }
        Commands::Version { config, run } => {
            migrate::cmd_version(&config, &settings, &run, cli.output, cli.quiet);
        }
    }
}

fn init_tracing(verbose: bool, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("off")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

pub(crate) fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("{}", msg),
        OutputFormat::Json => {
            eprintln!("{}", serde_json::json!({ "error": msg }));
        }
    }
}
