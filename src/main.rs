//! droidpilot CLI binary entry point.

use droidpilot::cli::{self, Cli, Commands};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse_args();
    let config = match cli::load_config(&cli.global) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let code = match cli.command {
        Commands::Ping => match cli::handle_ping(&config).await {
            Ok(true) => 0,
            Ok(false) => 1,
            Err(e) => {
                eprintln!("Error: {e}");
                1
            }
        },
        Commands::Wait(args) => match cli::handle_wait(&config, &args).await {
            Ok(()) => 0,
            Err(e) => {
                eprintln!("Error: {e}");
                1
            }
        },
        Commands::Chat(args) => match cli::handle_chat(config, args).await {
            Ok(outcome) => cli::exit_code(&outcome),
            Err(e) => {
                eprintln!("Error: {e}");
                1
            }
        },
    };
    std::process::exit(code);
}
