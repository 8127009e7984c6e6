//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;
use std::sync::Mutex;

use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use docnorm_convert::ConverterRegistry;
use docnorm_core::pipeline::{ProgressReporter, RunConfig, RunSummary};
use docnorm_shared::{ConversionRecord, load_config, load_config_from};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// docnorm — normalize binary documents into text and structured data.
#[derive(Parser)]
#[command(
    name = "docnorm",
    version,
    about = "Convert DOCX/PDF/PPTX/XLSX/VSDX documents under a directory tree \
             into normalized representations with a durable conversion index.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Normalize all supported documents under a root directory.
    Run {
        /// Root path of the repository/tree to normalize.
        path: PathBuf,

        /// Extra directory name to exclude (repeatable).
        #[arg(short = 'x', long = "exclude")]
        exclude: Vec<String>,

        /// Config file to use instead of ~/.docnorm/docnorm.toml.
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "docnorm=info",
        1 => "docnorm=debug",
        _ => "docnorm=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Run {
            path,
            exclude,
            config,
        } => run_normalize(path, exclude, config),
        Command::Config { action } => run_config(action),
    }
}

fn run_normalize(path: PathBuf, exclude: Vec<String>, config: Option<PathBuf>) -> Result<()> {
    let app_config = match config {
        Some(path) => load_config_from(&path)?,
        None => load_config()?,
    };

    let mut extra_exclude_dirs = app_config.discovery.extra_exclude_dirs;
    extra_exclude_dirs.extend(exclude);

    let registry = ConverterRegistry::with_builtin_converters();
    let run_config = RunConfig {
        root: path,
        extra_exclude_dirs,
    };

    info!(
        root = %run_config.root.display(),
        extra_excludes = run_config.extra_exclude_dirs.len(),
        "normalize command invoked"
    );

    let progress = CliProgress::default();
    let summary = docnorm_core::run(&run_config, &registry, &progress)?;

    println!(
        "Completed {} conversions, {} failed, {} skipped",
        summary.succeeded, summary.failed, summary.skipped
    );
    println!("Index: {}", summary.index_path.display());
    println!("Map:   {}", summary.map_path.display());

    Ok(())
}

fn run_config(action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Init => {
            let path = docnorm_shared::init_config()?;
            info!(path = %path.display(), "config file initialized");
            println!("Created {}", path.display());
        }
        ConfigAction::Show => {
            let config = load_config()?;
            println!("{}", toml::to_string_pretty(&config)?);
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Progress reporting
// ---------------------------------------------------------------------------

/// Indicatif-backed progress reporter; the bar is created lazily once the
/// file total is known.
#[derive(Default)]
struct CliProgress {
    bar: Mutex<Option<ProgressBar>>,
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        eprintln!("==> {name}");
    }

    fn file_processed(&self, record: &ConversionRecord, current: usize, total: usize) {
        let mut guard = self.bar.lock().expect("progress bar lock");
        let bar = guard.get_or_insert_with(|| {
            let bar = ProgressBar::new(total as u64);
            bar.set_style(
                ProgressStyle::with_template("[{pos}/{len}] {bar:30.cyan/blue} {msg}")
                    .expect("valid progress template"),
            );
            bar
        });

        bar.set_message(format!("{} ({})", record.source, record.status));
        bar.inc(1);
        if current == total {
            bar.finish_and_clear();
        }
    }

    fn done(&self, _summary: &RunSummary) {}
}
