use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use mailgate::config::{default_config_path, load_config, Config, LogFormat};
use mailgate::pipeline::{invoke_with_retries, Jitter, MailIngestionPipeline, PipelineConfig};
use mailgate::sanitize::mask_address;
use mailgate::{CancelSignal, ConfigError, RunReport};

#[derive(Parser)]
#[command(name = "mailgate", version, about = "Mailbox attachment ingestion")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (YAML or JSON). Defaults to $MAILGATE_CONFIG or the user config dir.
    #[arg(short, long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log level or filter directive; RUST_LOG takes precedence.
    #[arg(long, global = true, env = "MAILGATE_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log output format.
    #[arg(long, global = true, value_enum, env = "MAILGATE_LOG_FORMAT")]
    log_format: Option<FormatArg>,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch messages, persist attachments and notify the queue
    Run,
    /// Reconnect and expunge messages flagged Deleted
    Expunge,
    /// Load and validate the configuration
    CheckConfig,
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Text,
    Json,
}

impl From<FormatArg> for LogFormat {
    fn from(format: FormatArg) -> Self {
        match format {
            FormatArg::Text => LogFormat::Text,
            FormatArg::Json => LogFormat::Json,
        }
    }
}

const EXIT_FAILURE: u8 = 1;
const EXIT_CANCELLED: u8 = 130;

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run_cli(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

fn run_cli(cli: Cli) -> anyhow::Result<ExitCode> {
    let config_path = match cli.config {
        Some(path) => path,
        None => default_config_path().ok_or(ConfigError::NoConfigFile)?,
    };
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    let level = cli
        .log_level
        .unwrap_or_else(|| config.logging.level.clone());
    let format = cli.log_format.map(LogFormat::from).unwrap_or(config.logging.format);
    setup_logging(&level, format);

    match cli.command {
        Commands::CheckConfig => cmd_check_config(&config, &config_path),
        Commands::Run => cmd_run(config),
        Commands::Expunge => cmd_expunge(config),
    }
}

fn setup_logging(level: &str, format: LogFormat) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    // Route `log` records (the IMAP adapter and dependencies) into tracing.
    let _ = tracing_log::LogTracer::init();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = match format {
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
    };
    if let Err(e) = result {
        eprintln!("Failed to initialize logging: {}", e);
    }
}

fn runtime() -> anyhow::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")
}

/// Triggers `cancel` on Ctrl-C.
fn install_ctrlc(cancel: &CancelSignal) -> anyhow::Result<()> {
    let cancel = cancel.clone();
    ctrlc::set_handler(move || {
        tracing::warn!("Interrupt received, stopping run");
        cancel.cancel();
    })
    .context("Failed to install Ctrl-C handler")
}

fn cmd_run(config: Config) -> anyhow::Result<ExitCode> {
    let cancel = CancelSignal::new();
    install_ctrlc(&cancel)?;

    let pipeline_config = PipelineConfig::from_config(&config);
    let report = runtime()?.block_on(invoke_with_retries(
        pipeline_config.invocation_policy,
        Jitter::default(),
        &cancel,
        |attempt| {
            let config = &config;
            let cancel = cancel.clone();
            async move {
                tracing::info!(attempt, "Starting mail ingestion invocation");
                match MailIngestionPipeline::from_config(config, cancel) {
                    Ok(mut pipeline) => pipeline.run().await,
                    Err(e) => RunReport::failed(mailgate::pipeline::FailureNotice::new(
                        "MailIngestionPipeline::from_config",
                        "Failed to build pipeline",
                        e.to_string(),
                    )),
                }
            }
        },
    ));

    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(if report.success {
        ExitCode::SUCCESS
    } else if report.cancelled {
        ExitCode::from(EXIT_CANCELLED)
    } else {
        ExitCode::from(EXIT_FAILURE)
    })
}

fn cmd_expunge(config: Config) -> anyhow::Result<ExitCode> {
    let cancel = CancelSignal::new();
    install_ctrlc(&cancel)?;

    let mut pipeline = MailIngestionPipeline::from_config(&config, cancel)?;
    match runtime()?.block_on(pipeline.expunge_only()) {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(mailgate::PipelineError::Cancelled) => Ok(ExitCode::from(EXIT_CANCELLED)),
        Err(e) => Err(e).context("Expunge failed"),
    }
}

fn cmd_check_config(config: &Config, path: &Path) -> anyhow::Result<ExitCode> {
    let password_source = if config.mail.password.is_some() {
        "direct value"
    } else if config.mail.password_file.is_some() {
        "file"
    } else {
        "environment variable"
    };

    println!("Configuration OK: {}", path.display());
    println!(
        "  mail:    {}:{} ({:?}) as {} folder {}",
        config.mail.host,
        config.mail.port,
        config.mail.security,
        mask_address(&config.mail.username),
        config.mail.folder
    );
    println!("  password from {}", password_source);
    println!(
        "  storage: {} / {}",
        config.storage.connection_string, config.storage.container_name
    );
    println!(
        "  queue:   {} / {} (timeout {} ms)",
        config.queue.connection_string, config.queue.topic_name, config.queue.send_timeout_ms
    );
    println!(
        "  retries: reconnect {}, storage {}, queue {}, invocation {}",
        config.retry.reconnect.count,
        config.retry.storage.count,
        config.retry.queue.count,
        config.retry.invocation.count
    );
    Ok(ExitCode::SUCCESS)
}
