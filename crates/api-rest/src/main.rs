//! Standalone REST API server binary.
//!
//! ## Purpose
//! Runs the REST API against in-memory stores.
//!
//! ## Intended use
//! This binary is useful for development and debugging when no database is available. Patient
//! records are loaded from `EHRSIM_SEED_DIR` at startup and saved summaries live only as long as
//! the process. The workspace's main `ehrsim-run` binary serves the same routes over PostgreSQL.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::{router, AppState};
use ehrsim_core::{
    config::{
        current_window_from_env_value, generation_timeout_from_env_value,
        significance_config_from_env_value,
    },
    digest::DigestLimits,
    repositories::records::{InMemoryPatientRecords, PatientRecordSource},
    repositories::summaries::InMemorySummaryStore,
    CoreConfig, SummaryService,
};
use ehrsim_llm::{LlmConfig, OllamaClient};

/// Main entry point for the standalone REST API server
///
/// # Environment Variables
/// - `EHRSIM_REST_ADDR`: Server address (default: "0.0.0.0:8002")
/// - `EHRSIM_SEED_DIR`: Directory of FHIR bundle `*.json` files to load (optional)
/// - `EHRSIM_CURRENT_WINDOW`, `EHRSIM_GENERATION_TIMEOUT_SECS`, `EHRSIM_SIGNIFICANCE_CONFIG`
/// - `OLLAMA_URL`, `OLLAMA_MODEL`
///
/// # Errors
/// Returns an error if:
/// - the logging/tracing configuration cannot be initialised,
/// - any configuration value is invalid or the seed directory cannot be read,
/// - the server address cannot be bound, or
/// - the HTTP server fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let addr = std::env::var("EHRSIM_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:8002".into());

    tracing::info!("-- Starting EHR simulator REST API (in-memory) on {}", addr);

    let records = match std::env::var("EHRSIM_SEED_DIR").ok() {
        Some(dir) if !dir.trim().is_empty() => {
            let seed_path = Path::new(&dir);
            if !seed_path.is_dir() {
                anyhow::bail!("Seed directory does not exist: {}", seed_path.display());
            }
            let records = InMemoryPatientRecords::load_dir(seed_path).await?;
            let loaded = records.list_patients().await?.len();
            tracing::info!(
                patients = loaded,
                "loaded patient records from {}",
                seed_path.display()
            );
            records
        }
        _ => {
            tracing::warn!("EHRSIM_SEED_DIR not set; starting with no patient records");
            InMemoryPatientRecords::new()
        }
    };

    let generation_timeout =
        generation_timeout_from_env_value(std::env::var("EHRSIM_GENERATION_TIMEOUT_SECS").ok())?;
    let cfg = Arc::new(CoreConfig::new(
        current_window_from_env_value(std::env::var("EHRSIM_CURRENT_WINDOW").ok())?,
        generation_timeout,
        significance_config_from_env_value(std::env::var("EHRSIM_SIGNIFICANCE_CONFIG").ok())?,
        DigestLimits::default(),
    )?);

    // The client gets a little longer than the service so the service reports the timeout.
    let llm = OllamaClient::new(LlmConfig::from_env_values(
        std::env::var("OLLAMA_URL").ok(),
        std::env::var("OLLAMA_MODEL").ok(),
        generation_timeout + Duration::from_secs(5),
    ))?;

    let service = SummaryService::new(
        cfg,
        Arc::new(records),
        Arc::new(InMemorySummaryStore::new()),
        Arc::new(llm),
    )?;

    let app = router(AppState::new(service));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
