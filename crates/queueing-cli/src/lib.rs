//! # Queueing CLI
//!
//! Command-line interface for the queueing library.
//!
//! This module provides CLI commands for:
//! - Sending a text or file payload to a queue
//! - Leasing one message and optionally committing or abandoning it
//! - Printing the resolved settings with secrets redacted

use bytes::Bytes;
use clap::{Parser, Subcommand};
use queueing::{
    create_provider, ConfigurationError, QueueError, QueueingClient, QueueingSettings,
};
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;

// ============================================================================
// CLI Structure
// ============================================================================

/// Queueing CLI - send to and lease from message queues
#[derive(Parser, Debug)]
#[command(name = "queueing")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Send to and lease from message queues")]
#[command(
    long_about = "Sends payloads to a queue and leases messages from it with commit or abandon resolution"
)]
pub struct Cli {
    /// Settings file path (YAML, TOML or JSON)
    #[arg(short, long, env = "QUEUEING_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Queue name, overriding the settings
    #[arg(short, long, global = true)]
    pub queue: Option<String>,

    /// Logging level
    #[arg(short, long, default_value = "warn", global = true)]
    pub log_level: String,

    /// Enable JSON logging
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Send one message
    Send {
        /// Message text
        #[arg(conflicts_with = "file", required_unless_present = "file")]
        text: Option<String>,

        /// Read the payload from a file
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Lease at most one message
    Receive {
        /// Delete the message after printing it
        #[arg(long, conflicts_with = "abandon")]
        commit: bool,

        /// Make the message visible again after printing it
        #[arg(long)]
        abandon: bool,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Show the resolved settings with secrets redacted
    Config {
        /// Output format
        #[arg(short, long, default_value = "yaml")]
        format: ConfigFormat,
    },
}

/// Output format options
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    Text,
    /// JSON output
    Json,
}

/// Configuration format options
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum ConfigFormat {
    /// YAML format
    Yaml,
    /// JSON format
    Json,
}

/// What to do with a leased message after printing it
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LeaseAction {
    Keep,
    Commit,
    Abandon,
}

impl LeaseAction {
    fn from_flags(commit: bool, abandon: bool) -> Self {
        match (commit, abandon) {
            (true, _) => Self::Commit,
            (false, true) => Self::Abandon,
            (false, false) => Self::Keep,
        }
    }
}

// ============================================================================
// CLI Error Types
// ============================================================================

/// CLI-specific errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Invalid argument: {arg} - {message}")]
    InvalidArgument { arg: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Output formatting failed: {message}")]
    Output { message: String },
}

// ============================================================================
// Output Types
// ============================================================================

/// Printed form of a leased message
#[derive(Debug, Serialize)]
pub struct ReceivedMessageOutput {
    pub message_id: String,
    pub dequeue_count: u32,
    pub expires_at: Option<String>,
    pub body: String,
    pub body_is_utf8: bool,
    /// `Some(false)` when the lease was already gone at resolution time
    pub resolved: Option<bool>,
}

// ============================================================================
// Main Entry Point
// ============================================================================

/// Main CLI entry point
pub async fn run_cli() -> Result<(), CliError> {
    let cli = Cli::parse();

    // Initialize logging
    initialize_logging(&cli)?;

    // Load configuration
    let settings = load_settings(&cli)?;

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received; cancelling");
            trigger.cancel();
        }
    });

    let mut stdout = std::io::stdout();
    execute_command(cli.command, &settings, &cancel, &mut stdout).await
}

/// Initialize logging based on CLI arguments
///
/// Logs go to stderr so command output on stdout stays machine-readable.
fn initialize_logging(cli: &Cli) -> Result<(), CliError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&cli.log_level).map_err(|e| CliError::InvalidArgument {
            arg: "log-level".to_string(),
            message: e.to_string(),
        })?,
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    // An embedding host may already have installed a subscriber
    let _ = if cli.json_logs {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    Ok(())
}

/// Load settings from the configured file and environment
pub fn load_settings(cli: &Cli) -> Result<QueueingSettings, CliError> {
    let mut settings = QueueingSettings::load(cli.config.as_deref())?;

    if let Some(queue) = &cli.queue {
        settings.queue_name = queue.clone();
    }

    Ok(settings)
}

/// Execute a parsed command against the given settings
pub async fn execute_command(
    command: Commands,
    settings: &QueueingSettings,
    cancel: &CancellationToken,
    out: &mut dyn Write,
) -> Result<(), CliError> {
    match command {
        Commands::Config { format } => execute_config_command(settings, format, out),
        Commands::Send { text, file } => {
            let payload = read_payload(text, file).await?;
            let client = connect(settings)?;
            execute_send_command(client.as_ref(), payload, cancel, out).await
        }
        Commands::Receive {
            commit,
            abandon,
            format,
        } => {
            let client = connect(settings)?;
            let action = LeaseAction::from_flags(commit, abandon);
            execute_receive_command(client.as_ref(), action, format, cancel, out).await
        }
    }
}

fn connect(settings: &QueueingSettings) -> Result<Box<dyn QueueingClient>, CliError> {
    settings.validate()?;
    let provider = create_provider(settings)?;
    debug!(provider = %provider.provider_type(), queue = %provider.queue_name(), "Connected");
    Ok(provider.create_client())
}

async fn read_payload(text: Option<String>, file: Option<PathBuf>) -> Result<Bytes, CliError> {
    match (text, file) {
        (Some(text), _) => Ok(Bytes::from(text)),
        (None, Some(path)) => Ok(Bytes::from(tokio::fs::read(&path).await?)),
        (None, None) => Err(CliError::InvalidArgument {
            arg: "text".to_string(),
            message: "provide message text or --file".to_string(),
        }),
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

/// Execute send command
pub async fn execute_send_command(
    client: &dyn QueueingClient,
    payload: Bytes,
    cancel: &CancellationToken,
    out: &mut dyn Write,
) -> Result<(), CliError> {
    let size = payload.len();
    client.send_message(payload, cancel).await?;

    info!(queue = %client.queue_name(), size, "Message sent");
    writeln!(out, "Sent {} bytes to queue '{}'", size, client.queue_name())?;
    Ok(())
}

/// Execute receive command
pub async fn execute_receive_command(
    client: &dyn QueueingClient,
    action: LeaseAction,
    format: OutputFormat,
    cancel: &CancellationToken,
    out: &mut dyn Write,
) -> Result<(), CliError> {
    let Some(message) = client.try_receive_message(cancel).await? else {
        match format {
            OutputFormat::Text => writeln!(out, "No message available")?,
            OutputFormat::Json => writeln!(out, "null")?,
        }
        return Ok(());
    };

    let resolved = match action {
        LeaseAction::Keep => None,
        LeaseAction::Commit => Some(message.try_commit(cancel).await?),
        LeaseAction::Abandon => Some(message.try_abandon(cancel).await?),
    };

    if resolved == Some(false) {
        debug!(
            message_id = %message.message_id(),
            "Lease already gone at resolution time"
        );
    }

    let body_text = message.body_text().ok();
    let output = ReceivedMessageOutput {
        message_id: message.message_id().to_string(),
        dequeue_count: message.dequeue_count(),
        expires_at: message.expires_at().map(|t| t.as_datetime().to_rfc3339()),
        body_is_utf8: body_text.is_some(),
        body: body_text
            .map(str::to_string)
            .unwrap_or_else(|| String::from_utf8_lossy(message.body()).into_owned()),
        resolved,
    };

    match format {
        OutputFormat::Text => {
            writeln!(out, "Message ID:    {}", output.message_id)?;
            writeln!(out, "Dequeue count: {}", output.dequeue_count)?;
            if let Some(expires_at) = &output.expires_at {
                writeln!(out, "Expires at:    {}", expires_at)?;
            }
            if let Some(resolved) = output.resolved {
                let outcome = match (action, resolved) {
                    (LeaseAction::Commit, true) => "committed",
                    (LeaseAction::Abandon, true) => "abandoned",
                    _ => "lease already gone",
                };
                writeln!(out, "Resolution:    {}", outcome)?;
            }
            writeln!(out)?;
            writeln!(out, "{}", output.body)?;
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&output).map_err(|e| CliError::Output {
                message: e.to_string(),
            })?;
            writeln!(out, "{}", json)?;
        }
    }

    Ok(())
}

/// Execute config command
pub fn execute_config_command(
    settings: &QueueingSettings,
    format: ConfigFormat,
    out: &mut dyn Write,
) -> Result<(), CliError> {
    let redacted = settings.redacted();

    let rendered = match format {
        ConfigFormat::Yaml => serde_yaml::to_string(&redacted).map_err(|e| CliError::Output {
            message: e.to_string(),
        })?,
        ConfigFormat::Json => {
            serde_json::to_string_pretty(&redacted).map_err(|e| CliError::Output {
                message: e.to_string(),
            })?
        }
    };

    writeln!(out, "{}", rendered.trim_end())?;
    Ok(())
}
