use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use outpost_logger::{find_log_files, naming::calculate_total_size, LoggerConfig, SharedLogSession};
use std::path::PathBuf;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(
    after_help = "VOLATILITY CODES:\n  0  hoarding          5000 files, 10000 messages/file, 7 days/file\n  1  anticonservative  1000 files, 10000 messages/file, 5 days/file\n  2  conservative      100 files, 5000 messages/file, 3 days/file\n  3  minimal           10 files, 1000 messages/file, 1 day/file"
)]
struct Cli {
    /// Logger configuration file path
    #[arg(long, global = true, help = "Path to logger configuration file")]
    config: Option<PathBuf>,

    /// Directory for log files
    #[arg(long, global = true, help = "Directory for log files")]
    log_dir: Option<PathBuf>,

    /// Volatility code (0-3)
    #[arg(long, global = true, help = "Volatility code selecting a retention preset")]
    volatility: Option<u8>,

    /// Do not mirror log lines to stdout
    #[arg(long, global = true, help = "Disable mirroring of log lines to stdout")]
    no_mirror: bool,

    /// Diagnostic log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn", help = "Set diagnostic log level")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Append messages to a session, one line each
    Append {
        /// Base name of the session, e.g. rest_package
        base_name: String,

        /// Messages to append
        #[arg(required = true)]
        messages: Vec<String>,

        /// Print the session statistics as JSON afterwards
        #[arg(long)]
        stats: bool,
    },

    /// List log files on disk for a base name, oldest first
    List {
        /// Base name of the session
        base_name: String,
    },

    /// Print the resolved rotation and retention bounds
    Policy,
}

/// Install the diagnostic subscriber. Diagnostics go to stderr because
/// stdout carries mirrored log lines.
fn init_tracing(log_level: &str) -> Result<()> {
    let filter = match std::env::var("RUST_LOG") {
        Ok(env_filter) => EnvFilter::new(env_filter),
        Err(_) => EnvFilter::try_new(log_level)
            .with_context(|| format!("Invalid log level '{}'", log_level))?,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    Ok(())
}

/// Load the logger configuration and apply CLI overrides
async fn create_logger_config(cli: &Cli) -> Result<LoggerConfig> {
    let mut config = LoggerConfig::load(cli.config.as_deref())
        .await
        .context("Failed to load logger configuration")?;

    apply_overrides(cli, &mut config);
    config.validate().context("Invalid logger configuration")?;

    info!(
        outpost.event = "logger_config_created",
        log_dir = %config.log_dir.display(),
        volatility = config.volatility,
        custom = config.custom.is_some(),
        console_mirror = config.console_mirror,
        "Logger configuration created"
    );

    Ok(config)
}

fn apply_overrides(cli: &Cli, config: &mut LoggerConfig) {
    if let Some(log_dir) = &cli.log_dir {
        config.log_dir = log_dir.clone();
    }

    if let Some(volatility) = cli.volatility {
        if config.custom.is_some() {
            warn!("--volatility ignored because custom bounds are configured");
        }
        config.volatility = volatility;
    }

    if cli.no_mirror {
        config.console_mirror = false;
    }
}

fn run_append(
    config: &LoggerConfig,
    base_name: &str,
    messages: &[String],
    print_stats: bool,
) -> Result<()> {
    let session = SharedLogSession::new(
        config
            .open_session(base_name)
            .with_context(|| format!("Failed to open log session '{}'", base_name))?,
    );

    for message in messages {
        if let Err(e) = session.append_line(message) {
            error!(base_name = base_name, error = %e, "Append failed");
            if !session.is_healthy() {
                return Err(e).context("Log session is no longer writable");
            }
        }
    }

    session.flush()?;

    if print_stats {
        let stats = session.stats()?;
        println!("{}", serde_json::to_string_pretty(&stats)?);
    }

    Ok(())
}

fn run_list(config: &LoggerConfig, base_name: &str) -> Result<()> {
    let log_files = find_log_files(&config.log_dir, base_name)
        .with_context(|| format!("Failed to list {}", config.log_dir.display()))?;

    for file in &log_files {
        println!(
            "{}  {:>10}  {}",
            file.timestamp.format("%Y-%m-%d %H:%M:%S%.9f"),
            file.size,
            file.path.display()
        );
    }

    println!(
        "{} file(s), {} bytes",
        log_files.len(),
        calculate_total_size(&log_files)
    );
    Ok(())
}

fn run_policy(config: &LoggerConfig) -> Result<()> {
    let policy = config.policy()?;
    println!("{}", serde_json::to_string_pretty(&policy)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables before parsing configuration
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(&cli.log_level)?;

    let config = create_logger_config(&cli).await?;

    match &cli.command {
        Command::Append {
            base_name,
            messages,
            stats,
        } => run_append(&config, base_name, messages, *stats),
        Command::List { base_name } => run_list(&config, base_name),
        Command::Policy => run_policy(&config),
    }
}
