//! Receipt renamer - main entry point

use anyhow::Result;
use clap::Parser;
use tracing::Level;

use receipt_renamer::cli::{self, Args};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logging goes to stderr so it does not mix with the per-file output
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    // Load .env
    dotenvy::dotenv().ok();

    cli::run(args).await
}
