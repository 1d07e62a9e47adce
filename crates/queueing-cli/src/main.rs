use queueing::QueueError;
use queueing_cli::{run_cli, CliError};
use tracing::error;

#[tokio::main]
async fn main() {
    // Run CLI and handle errors
    if let Err(e) = run_cli().await {
        error!("CLI error: {}", e);
        eprintln!("error: {}", e);

        // Exit with appropriate code based on error type
        let exit_code = match e {
            CliError::Configuration(_) => 3,
            CliError::Queue(QueueError::InvalidArgument { .. }) => 3,
            CliError::Queue(QueueError::Cancelled { .. }) => 130,
            CliError::Queue(QueueError::Transport { .. }) => 4,
            CliError::Queue(_) => 5,
            CliError::InvalidArgument { .. } => 2,
            CliError::Io(_) => 6,
            CliError::Output { .. } => 7,
        };

        std::process::exit(exit_code);
    }
}
