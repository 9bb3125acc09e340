//! Pipeline binary
//!
//! Reads a job configuration document, runs the annotation pipeline
//! against the cluster API it names, and prints the run report. Fatal
//! errors exit non-zero after cleanup has run.

use docq_cluster::http::HttpClusterApi;
use docq_core::JobConfig;
use docq_pipeline::PipelineOrchestrator;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("DOCQ_CONFIG").ok())
        .ok_or("usage: docq-pipeline <config.json> (or set DOCQ_CONFIG)")?;
    let raw = tokio::fs::read_to_string(&config_path).await?;
    let config = JobConfig::from_json(&raw)?;
    info!(
        cluster = %config.cluster_name,
        run_id = %config.run_id,
        "starting pipeline run"
    );

    let api = Arc::new(HttpClusterApi::new(&config.api_endpoint)?);
    let orchestrator = PipelineOrchestrator::new(api, config);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(true);
        }
    });

    match orchestrator.run_with_shutdown(shutdown_rx).await {
        Ok(report) => {
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Err(e) => {
            error!("pipeline run failed: {}", e);
            std::process::exit(1);
        }
    }
}
