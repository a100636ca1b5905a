use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::{AppState, router};
use ehrsim_core::{
    CoreConfig, SummaryError, SummaryService,
    config::{
        current_window_from_env_value, generation_timeout_from_env_value,
        significance_config_from_env_value,
    },
    digest::DigestLimits,
    repositories::postgres::{PgPatientRecords, PgSummaryStore, ensure_schema},
    repositories::records::read_bundle_dir,
};
use ehrsim_llm::{LlmConfig, OllamaClient};

const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;

/// Parse the pool size from an optional string value.
fn db_max_connections_from_env_value(value: Option<String>) -> anyhow::Result<u32> {
    match value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
        None => Ok(DEFAULT_DB_MAX_CONNECTIONS),
        Some(v) => match v.parse::<u32>() {
            Ok(n) if n > 0 => Ok(n),
            _ => anyhow::bail!("EHRSIM_DB_MAX_CONNECTIONS must be a positive integer, got '{v}'"),
        },
    }
}

/// Upsert every bundle in `dir` into the `patients` table.
async fn seed_patients(records: &PgPatientRecords, dir: &Path) -> Result<usize, SummaryError> {
    let bundles = read_bundle_dir(dir)?;
    for (synthea_id, data) in &bundles {
        records.upsert(synthea_id, data).await?;
    }
    Ok(bundles.len())
}

/// Main entry point for the EHR simulator summary server
///
/// Connects to PostgreSQL, applies the schema, optionally seeds patient records and serves the
/// REST API with summaries generated by an Ollama server.
///
/// # Environment Variables
/// - `DATABASE_URL`: PostgreSQL connection string (required)
/// - `EHRSIM_REST_ADDR`: REST server address (default: "0.0.0.0:8002")
/// - `EHRSIM_DB_MAX_CONNECTIONS`: Pool size (default: 5)
/// - `EHRSIM_SEED_DIR`: Directory of FHIR bundles to upsert at startup (optional)
/// - `EHRSIM_CURRENT_WINDOW`: Trailing entries used for current summaries (default: 10)
/// - `EHRSIM_GENERATION_TIMEOUT_SECS`: Model call timeout (default: 120)
/// - `EHRSIM_SIGNIFICANCE_CONFIG`: YAML keyword lists and thresholds (optional)
/// - `OLLAMA_URL`, `OLLAMA_MODEL`: Model endpoint and tag
///
/// # Returns
/// * `Ok(())` - If the server starts and runs successfully
/// * `Err(anyhow::Error)` - If configuration, database setup or the server fails
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("ehrsim_run=info".parse()?)
                .add_directive("ehrsim_core=info".parse()?)
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let database_url = std::env::var("DATABASE_URL")
        .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?;
    let rest_addr = std::env::var("EHRSIM_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:8002".into());

    let generation_timeout =
        generation_timeout_from_env_value(std::env::var("EHRSIM_GENERATION_TIMEOUT_SECS").ok())?;
    let cfg = Arc::new(CoreConfig::new(
        current_window_from_env_value(std::env::var("EHRSIM_CURRENT_WINDOW").ok())?,
        generation_timeout,
        significance_config_from_env_value(std::env::var("EHRSIM_SIGNIFICANCE_CONFIG").ok())?,
        DigestLimits::default(),
    )?);

    let pool = PgPoolOptions::new()
        .max_connections(db_max_connections_from_env_value(
            std::env::var("EHRSIM_DB_MAX_CONNECTIONS").ok(),
        )?)
        .connect(&database_url)
        .await?;
    ensure_schema(&pool).await?;

    let records = PgPatientRecords::new(pool.clone());
    if let Some(dir) = std::env::var("EHRSIM_SEED_DIR")
        .ok()
        .filter(|d| !d.trim().is_empty())
    {
        let seeded = seed_patients(&records, Path::new(&dir)).await?;
        tracing::info!(patients = seeded, "++ Seeded patient records from {}", dir);
    }

    // The client gets a little longer than the service so the service reports the timeout.
    let llm = OllamaClient::new(LlmConfig::from_env_values(
        std::env::var("OLLAMA_URL").ok(),
        std::env::var("OLLAMA_MODEL").ok(),
        generation_timeout + Duration::from_secs(5),
    ))?;

    let service = SummaryService::new(
        cfg,
        Arc::new(records),
        Arc::new(PgSummaryStore::new(pool)),
        Arc::new(llm),
    )?;

    tracing::info!("++ Starting EHR simulator REST on {}", rest_addr);

    let listener = tokio::net::TcpListener::bind(&rest_addr).await?;
    axum::serve(listener, router(AppState::new(service))).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_size_defaults_and_validates() {
        assert_eq!(
            db_max_connections_from_env_value(None).expect("default"),
            DEFAULT_DB_MAX_CONNECTIONS
        );
        assert_eq!(
            db_max_connections_from_env_value(Some(" 12 ".into())).expect("parsed"),
            12
        );
        assert!(db_max_connections_from_env_value(Some("0".into())).is_err());
        assert!(db_max_connections_from_env_value(Some("many".into())).is_err());
    }
}
