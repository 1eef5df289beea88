//! Thumbnail rebuilder CLI
//!
//! Runs one command against the configured database and exits.

use clap::Parser;
use thumbnail_rebuilder::cli::Cli;
use thumbnail_rebuilder::services::init_tracing;
use thumbnail_rebuilder::{App, Config, Database};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let command = Cli::parse().command;

    // Load configuration first (before tracing, so we can use the database for logging)
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    let db = Database::connect(&config.database_url).await?;
    let log_writer = init_tracing(&db, config.log_db_level);

    tracing::info!(
        database = %config.database_url,
        files = %config.files_path.display(),
        "Thumbnail rebuilder starting"
    );

    let app = App::new(config, db);
    let result = app.run(command).await;

    if let Err(e) = &result {
        tracing::error!(error = %format!("{:#}", e), "Command failed");
    }

    log_writer.shutdown().await;
    result
}
