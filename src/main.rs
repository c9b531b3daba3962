//! Binary entry point: run one full refresh cycle against the local store.

use std::sync::Arc;

use anyhow::Result;
use tracing::{error, info};

use vtuber_tracker::application::UpdateOrchestrator;
use vtuber_tracker::infrastructure::{
    AppConfig, DatabaseConnection, HttpClient, TrackerRepository, init_logging,
};

const CONFIG_PATH: &str = "config/tracker.json";

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load(CONFIG_PATH).await?;
    init_logging(&config.logging)?;

    let db = DatabaseConnection::new(&config.database_url).await?;
    db.migrate().await?;

    let repo = TrackerRepository::new(db.pool().clone());
    let http = Arc::new(HttpClient::new(config.http.clone())?);
    let orchestrator = UpdateOrchestrator::new(repo, http, config.update.clone())?;

    // Partial extraction failures are logged inside the cycle; only a
    // setup or persistence failure reaches this point.
    if let Err(e) = orchestrator.run_full_update().await {
        error!("Refresh cycle aborted: {:#}", e);
        return Err(e);
    }

    info!("Refresh cycle finished.");
    Ok(())
}
