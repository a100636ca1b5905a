//! # API REST
//!
//! REST API for the EHR simulator's clinical summaries.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (JSON serialisation, CORS, status-code mapping)
//!
//! Uses `api-shared` for the wire types. The router is built by [`router`] so the standalone
//! development binary and the workspace's `ehrsim-run` server serve the same surface.

#![warn(rust_2018_idioms)]

use api_shared::dto::{
    ActiveSummariesRes, ActiveSummaryRes, AssessmentRes, DigestQuery, DigestRes, HealthRes,
    HistoryItem, IndicatorRes, PatientListItem, PatientRecordRes, SaveSummaryReq, SaveSummaryRes,
    SummarizeReq, SummarizeRes,
};
use api_shared::HealthService;
use axum::{
    body::Bytes,
    extract::{Path as AxumPath, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use ehrsim_core::{GenerationError, SummaryError, SummaryService, SummaryType};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Application state for the REST API server
///
/// Holds the summary service shared by every request handler.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<SummaryService>,
}

impl AppState {
    pub fn new(service: SummaryService) -> Self {
        Self {
            service: Arc::new(service),
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        list_patients,
        get_patient,
        get_digest,
        summarize,
        get_summaries,
        get_summary_history,
        save_summary,
    ),
    components(schemas(
        HealthRes,
        PatientListItem,
        PatientRecordRes,
        DigestQuery,
        DigestRes,
        SummarizeReq,
        SummarizeRes,
        AssessmentRes,
        IndicatorRes,
        ActiveSummaryRes,
        ActiveSummariesRes,
        HistoryItem,
        SaveSummaryReq,
        SaveSummaryRes,
    ))
)]
pub struct ApiDoc;

/// Build the REST router with Swagger UI and permissive CORS.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/patients", get(list_patients))
        .route("/patients/:id", get(get_patient))
        .route("/patients/:id/digest", get(get_digest))
        .route("/patients/:id/summarize", post(summarize))
        .route(
            "/patients/:id/summary",
            get(get_summaries).post(save_summary),
        )
        .route(
            "/patients/:id/summary/:summary_type/history",
            get(get_summary_history),
        )
        .merge(
            SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi()),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Map a core error to a status code and a fixed message.
///
/// Server-side failures are logged here with their full detail; the response body never carries
/// it.
fn error_response(err: SummaryError) -> (StatusCode, &'static str) {
    let response = match &err {
        SummaryError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "Invalid request"),
        SummaryError::EmptyContent => (StatusCode::BAD_REQUEST, "Summary content must not be empty"),
        SummaryError::UnknownSummaryType(_) => (StatusCode::BAD_REQUEST, "Unknown summary type"),
        SummaryError::PatientNotFound(_) => (StatusCode::NOT_FOUND, "Patient not found"),
        SummaryError::Generation(GenerationError::Timeout(_)) => {
            (StatusCode::GATEWAY_TIMEOUT, "Summary generation timed out")
        }
        SummaryError::Generation(_) => (StatusCode::BAD_GATEWAY, "Summary generation failed"),
        SummaryError::ConcurrentSave { .. } => {
            (StatusCode::CONFLICT, "Summary was saved concurrently, retry")
        }
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "Internal error"),
    };

    if response.0.is_server_error() {
        tracing::error!("Request failed: {:?}", err);
    } else {
        tracing::warn!("Request rejected: {}", err);
    }
    response
}

fn parse_summary_type(value: &str) -> Result<SummaryType, (StatusCode, &'static str)> {
    value
        .parse()
        .map_err(|e: ehrsim_core::UnknownSummaryType| error_response(e.into()))
}

/// Parse an optional summarise body. An empty or whitespace-only body means the defaults.
fn parse_summarize_body(body: &[u8]) -> Result<SummarizeReq, (StatusCode, &'static str)> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(SummarizeReq::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| error_response(SummaryError::InvalidInput(format!("summarize body: {e}"))))
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for the REST API
///
/// Used for monitoring and load balancer health checks.
#[axum::debug_handler]
async fn health(State(_state): State<AppState>) -> Json<HealthRes> {
    Json(HealthService::check_health())
}

#[utoipa::path(
    get,
    path = "/patients",
    responses(
        (status = 200, description = "Stored patients in id order", body = [PatientListItem]),
        (status = 500, description = "Internal server error")
    )
)]
/// List all stored patient records
///
/// # Returns
/// * `Ok(Json<Vec<PatientListItem>>)` - Patient ids with their Synthea ids
/// * `Err((StatusCode, &str))` - Internal server error if the record source fails
#[axum::debug_handler]
async fn list_patients(
    State(state): State<AppState>,
) -> Result<Json<Vec<PatientListItem>>, (StatusCode, &'static str)> {
    let patients = state.service.list_patients().await.map_err(error_response)?;
    Ok(Json(patients.into_iter().map(PatientListItem::from).collect()))
}

#[utoipa::path(
    get,
    path = "/patients/{id}",
    params(("id" = i64, Path, description = "Patient id")),
    responses(
        (status = 200, description = "Stored patient record", body = PatientRecordRes),
        (status = 404, description = "Patient not found"),
        (status = 500, description = "Internal server error")
    )
)]
/// Fetch one stored patient record, including its FHIR bundle
#[axum::debug_handler]
async fn get_patient(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<i64>,
) -> Result<Json<PatientRecordRes>, (StatusCode, &'static str)> {
    let patient = state.service.get_patient(id).await.map_err(error_response)?;
    Ok(Json(patient.into()))
}

#[utoipa::path(
    get,
    path = "/patients/{id}/digest",
    params(
        ("id" = i64, Path, description = "Patient id"),
        ("summary_type" = Option<String>, Query, description = "historical (default) or current")
    ),
    responses(
        (status = 200, description = "Digest the model would be given", body = DigestRes),
        (status = 400, description = "Unknown summary type"),
        (status = 404, description = "Patient not found")
    )
)]
/// Show the clinical digest for a patient
///
/// Current digests use the configured trailing window; historical digests use the whole record.
#[axum::debug_handler]
async fn get_digest(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<i64>,
    Query(query): Query<DigestQuery>,
) -> Result<Json<DigestRes>, (StatusCode, &'static str)> {
    let summary_type = parse_summary_type(&query.summary_type)?;
    let digest = state
        .service
        .digest(id, summary_type)
        .await
        .map_err(error_response)?;
    Ok(Json(DigestRes {
        patient_id: id,
        summary_type: summary_type.to_string(),
        digest,
    }))
}

#[utoipa::path(
    post,
    path = "/patients/{id}/summarize",
    params(("id" = i64, Path, description = "Patient id")),
    request_body = SummarizeReq,
    responses(
        (status = 200, description = "Generated summary (not saved)", body = SummarizeRes),
        (status = 400, description = "Invalid body or unknown summary type"),
        (status = 404, description = "Patient not found"),
        (status = 502, description = "Model call failed"),
        (status = 504, description = "Model call timed out")
    )
)]
/// Generate a summary without saving it
///
/// The body is optional; without one a historical summary is generated. A body is parsed as
/// JSON whatever its content type. Current summaries are compared against the active current
/// summary and come back with highlighted HTML.
///
/// # Errors
/// Returns `400 Bad Request` if a body is present but is not a valid request, `502 Bad Gateway`
/// if the model fails or returns no text, and `504 Gateway Timeout` if it does not answer within
/// the configured timeout.
#[axum::debug_handler]
async fn summarize(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<i64>,
    body: Bytes,
) -> Result<Json<SummarizeRes>, (StatusCode, &'static str)> {
    let req = parse_summarize_body(&body)?;
    let summary_type = parse_summary_type(&req.summary_type)?;
    let draft = state
        .service
        .summarise(id, summary_type)
        .await
        .map_err(error_response)?;
    Ok(Json(draft.into()))
}

#[utoipa::path(
    get,
    path = "/patients/{id}/summary",
    params(("id" = i64, Path, description = "Patient id")),
    responses(
        (status = 200, description = "Active summary of each type", body = ActiveSummariesRes),
        (status = 500, description = "Internal server error")
    )
)]
/// Fetch the active historical and current summaries for a patient
#[axum::debug_handler]
async fn get_summaries(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<i64>,
) -> Result<Json<ActiveSummariesRes>, (StatusCode, &'static str)> {
    let active = state
        .service
        .active_summaries(id)
        .await
        .map_err(error_response)?;
    Ok(Json(active.into()))
}

#[utoipa::path(
    get,
    path = "/patients/{id}/summary/{summary_type}/history",
    params(
        ("id" = i64, Path, description = "Patient id"),
        ("summary_type" = String, Path, description = "historical or current")
    ),
    responses(
        (status = 200, description = "All versions, newest first", body = [HistoryItem]),
        (status = 400, description = "Unknown summary type"),
        (status = 500, description = "Internal server error")
    )
)]
/// List every saved version of one summary type, newest first
#[axum::debug_handler]
async fn get_summary_history(
    State(state): State<AppState>,
    AxumPath((id, summary_type)): AxumPath<(i64, String)>,
) -> Result<Json<Vec<HistoryItem>>, (StatusCode, &'static str)> {
    let summary_type = parse_summary_type(&summary_type)?;
    let history = state
        .service
        .history(id, summary_type)
        .await
        .map_err(error_response)?;
    Ok(Json(history.into_iter().map(HistoryItem::from).collect()))
}

#[utoipa::path(
    post,
    path = "/patients/{id}/summary",
    params(("id" = i64, Path, description = "Patient id")),
    request_body = SaveSummaryReq,
    responses(
        (status = 200, description = "Summary saved as the next active version", body = SaveSummaryRes),
        (status = 400, description = "Missing, blank or invalid fields"),
        (status = 404, description = "Patient not found"),
        (status = 409, description = "Concurrent save conflict"),
        (status = 500, description = "Internal server error")
    )
)]
/// Save a summary as the next active version
///
/// # Arguments
/// * `req` - Summary type, content and optional highlighted HTML
///
/// # Errors
/// Returns `400 Bad Request` if the type or content is missing, the content is blank, or the
/// type is unknown. Nothing is written in those cases.
#[axum::debug_handler]
async fn save_summary(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<i64>,
    Json(req): Json<SaveSummaryReq>,
) -> Result<Json<SaveSummaryRes>, (StatusCode, &'static str)> {
    let (Some(summary_type), Some(content)) = (req.summary_type, req.content) else {
        return Err((StatusCode::BAD_REQUEST, "Missing type or content"));
    };
    let summary_type = parse_summary_type(&summary_type)?;

    let saved = state
        .service
        .save(id, summary_type, &content, req.highlighted_html)
        .await
        .map_err(error_response)?;
    Ok(Json(SaveSummaryRes {
        status: "success".into(),
        version: saved.version,
    }))
}
