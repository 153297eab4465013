// src/main.rs
use anyhow::{Context, Result};
use log::{info, warn};
use std::path::Path;
use std::time::Instant;

use fuse_lib::{db, pipeline, ClusteringConfig, PgStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    info!("Starting broker/brokerage name standardization pipeline");
    let start_time = Instant::now();

    // Try to load .env file if it exists
    let env_paths = [".env", ".env.local", "../.env"];
    let mut loaded_env = false;

    for path in env_paths.iter() {
        if Path::new(path).exists() {
            if let Err(e) = db::load_env_from_file(path) {
                warn!("Failed to load environment from {}: {}", path, e);
            } else {
                info!("Loaded environment variables from {}", path);
                loaded_env = true;
                break;
            }
        }
    }

    if !loaded_env {
        info!("No .env file found, using environment variables from system");
    }

    let config = ClusteringConfig::load().context("Failed to load clustering config")?;

    let pool = db::connect()
        .await
        .context("Failed to connect to database")?;
    info!("Successfully connected to the database");

    if std::env::args().any(|arg| arg == "--prepare") {
        info!("Rebuilding importance and similarity tables before clustering");
        db::prepare_similarity_tables(&pool, config.min_similarity)
            .await
            .context("Failed to prepare similarity tables")?;
    }

    let store = PgStore::new(pool);
    let stats = pipeline::run_pipeline(&store, &config).await?;
    stats.log_summary();

    info!(
        "Pipeline completed successfully in {:.2?}",
        start_time.elapsed()
    );
    Ok(())
}
