// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use log::{info, warn, Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use std::io::Write;
use std::path::PathBuf;

use linebatch::app_config::{Config, LogLevel};
use linebatch::app_controller::Controller;

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => LogLevel::Error,
            CliLogLevel::Warn => LogLevel::Warn,
            CliLogLevel::Info => LogLevel::Info,
            CliLogLevel::Debug => LogLevel::Debug,
            CliLogLevel::Trace => LogLevel::Trace,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Translate a line file (default command)
    Translate(TranslateArgs),

    /// Generate shell completions for linebatch
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args, Debug, Default)]
struct TranslateArgs {
    /// Input file of `id:::text` lines (defaults to the configured input file)
    #[arg(value_name = "INPUT")]
    input: Option<PathBuf>,

    /// Output file written when the job completes
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Checkpoint file rewritten after every batch
    #[arg(long)]
    checkpoint: Option<PathBuf>,

    /// Configuration file path
    #[arg(short, long, default_value = "conf.json")]
    config: PathBuf,

    /// Number of concurrent workers
    #[arg(short, long)]
    threads: Option<i64>,

    /// Lines per request
    #[arg(short, long)]
    batch_size: Option<usize>,

    /// Minimum seconds between two requests, across all workers
    #[arg(short, long)]
    delay: Option<f64>,

    /// Model name to use for translation
    #[arg(short, long)]
    model: Option<String>,

    /// API base URL (the `/chat/completions` path is appended)
    #[arg(long)]
    base_url: Option<String>,

    /// API key; not written back to the configuration file
    #[arg(long, env = "LINEBATCH_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Request whole JSON responses instead of a stream
    #[arg(long)]
    no_stream: bool,

    /// Set logging level
    #[arg(short, long, value_enum)]
    log_level: Option<CliLogLevel>,
}

/// linebatch - concurrent batch line translator
///
/// Sends `id:::text` lines in batches to an OpenAI-compatible chat completion
/// API and merges the answers back by id.
#[derive(Parser, Debug)]
#[command(name = "linebatch")]
#[command(version)]
#[command(about = "Concurrent batch translation of id:::text line files")]
#[command(args_conflicts_with_subcommands = true)]
#[command(long_about = "linebatch splits an id:::text line file across workers, translates it batch by batch \
through an OpenAI-compatible chat completion API and merges the answers back by id.

EXAMPLES:
    linebatch                                   # Translate the configured input file
    linebatch temp.txt -o tran.txt              # Translate temp.txt into tran.txt
    linebatch -t 4 -b 25 -d 1.5 temp.txt        # 4 workers, 25 lines per request, 1.5 s apart
    linebatch --no-stream -m my-model temp.txt  # Whole JSON responses from another model
    linebatch completions bash > linebatch.bash # Generate bash completions

CONFIGURATION:
    Configuration is stored in conf.json by default. You can specify a different
    config file with --config. If the config file doesn't exist, a default one
    will be created automatically. Command line overrides are saved back to it.

STOPPING:
    Ctrl-C stops every worker after its current batch. The output file is then left
    untouched and the progress so far stays in the checkpoint file.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    translate: TranslateArgs,
}

// @struct: Custom logger implementation
struct CustomLogger;

impl CustomLogger {
    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        log::set_boxed_logger(Box::new(CustomLogger))?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: Colour escape and tag for a log level
    fn style_for_level(level: Level) -> (&'static str, &'static str) {
        match level {
            Level::Error => ("\x1B[1;31m", "ERROR"),
            Level::Warn => ("\x1B[1;33m", "WARN "),
            Level::Info => ("\x1B[1;32m", "INFO "),
            Level::Debug => ("\x1B[1;36m", "DEBUG"),
            Level::Trace => ("\x1B[1;35m", "TRACE"),
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let (colour, tag) = Self::style_for_level(record.level());
            let _ = writeln!(
                std::io::stderr(),
                "{}{} {} {}\x1B[0m",
                colour, now, tag, record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Info until the configuration says otherwise
    CustomLogger::init(LevelFilter::Info)?;

    let cli = CommandLineOptions::parse();

    match cli.command {
        Some(Commands::Completions { shell }) => {
            let mut cmd = CommandLineOptions::command();
            generate(shell, &mut cmd, "linebatch", &mut std::io::stdout());
            Ok(())
        }
        Some(Commands::Translate(args)) => run_translate(args).await,
        None => run_translate(cli.translate).await,
    }
}

/// Apply command line overrides that are persisted to the configuration file
fn apply_overrides(config: &mut Config, options: &TranslateArgs) {
    if let Some(input) = &options.input {
        config.files.input_file = input.to_string_lossy().into_owned();
    }
    if let Some(output) = &options.output {
        config.files.output_file = output.to_string_lossy().into_owned();
    }
    if let Some(checkpoint) = &options.checkpoint {
        config.files.checkpoint_file = checkpoint.to_string_lossy().into_owned();
    }
    if let Some(threads) = options.threads {
        config.translation.threads = threads;
    }
    if let Some(batch_size) = options.batch_size {
        config.translation.batch_size = batch_size;
    }
    if let Some(delay) = options.delay {
        config.translation.delay = delay;
    }
    if let Some(model) = &options.model {
        config.translation.model = model.clone();
    }
    if let Some(base_url) = &options.base_url {
        config.translation.base_url = base_url.clone();
    }
    if options.no_stream {
        config.translation.stream = false;
    }
    if let Some(log_level) = options.log_level {
        config.log_level = log_level.into();
    }
}

async fn run_translate(options: TranslateArgs) -> Result<()> {
    if let Some(log_level) = options.log_level {
        log::set_max_level(LogLevel::from(log_level).to_level_filter());
    }

    let mut config = Config::load_or_create(&options.config)?;
    apply_overrides(&mut config, &options);
    config.validate().context("Configuration validation failed")?;
    log::set_max_level(config.log_level.to_level_filter());

    // Last used settings are kept for the next run
    config
        .save(&options.config)
        .with_context(|| format!("Failed to save settings to {:?}", options.config))?;

    if let Some(api_key) = &options.api_key {
        config.translation.api_key = api_key.clone();
    }
    if config.translation.api_key.is_empty() {
        warn!("No API key configured; requests are sent without credentials");
    }

    info!(
        "Translating {} with {} ({} worker(s), {} lines per request)",
        config.files.input_file,
        config.translation.model,
        config.translation.effective_threads(),
        config.translation.batch_size
    );

    let controller = Controller::with_config(config)?;
    let summary = controller.run().await?;

    if summary.output_written {
        println!("{}", controller.config().files.output_file);
    }

    Ok(())
}
