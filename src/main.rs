use std::sync::Arc;

use clap::Parser;

use prism_assess::assess::AssessmentSession;
use prism_assess::cli::{self, Cli, Command};
use prism_assess::config::AssessConfig;
use prism_assess::gateway::HttpGateway;
use prism_assess::selection::SelectionStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Cli::parse();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = AssessConfig::from_env();
    let gateway = Arc::new(HttpGateway::new(&config)?);
    let store = SelectionStore::new(&config.selection_path);

    eprintln!("🔎 PRism assess v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Backend: {}", gateway.base_url());
    eprintln!("   Selection: {}", store.path().display());

    match args.command {
        Some(Command::Select(select)) => {
            cli::run_select(&gateway, &store, select).await?;
        }
        None => {
            let inputs = store.load().await?;
            let session = match AssessmentSession::start(&config, inputs, gateway) {
                Ok(session) => session,
                Err(e) if e.is_missing_context() => {
                    eprintln!("❌ {e}");
                    eprintln!("   Run `prism-assess select <skill,skill,...> <pick>` first.");
                    std::process::exit(1);
                }
                Err(e) => return Err(e.into()),
            };
            cli::run_repl(session).await?;
        }
    }

    Ok(())
}
