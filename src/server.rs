use axum::{
    extract::{rejection::JsonRejection, Multipart, Path, Query},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Extension, Router,
};
use hyper::Server;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

use crate::constants::{DEFAULT_LIST_LIMIT, MAX_LIST_LIMIT};
use crate::error::GradeError;
use crate::inference::{predict_baseline, ModelContext};
use crate::pipeline::ingestion::{Ingestor, RawTable};
use crate::pipeline::storage::Storage;
use crate::types::FeaturePoint;

/// Shared, read-only handles for every request.
#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn Storage>,
    pub ingestor: Ingestor,
    pub model: Arc<ModelContext>,
}

impl AppState {
    pub fn new(storage: Arc<dyn Storage>, model: Arc<ModelContext>) -> Self {
        Self {
            ingestor: Ingestor::new(storage.clone()),
            storage,
            model,
        }
    }
}

/// Error body `{"detail": ...}` with a status derived from the error kind.
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    fn bad_request(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            detail: detail.into(),
        }
    }

    fn not_found(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            detail: detail.into(),
        }
    }
}

impl From<GradeError> for ApiError {
    fn from(e: GradeError) -> Self {
        let status = match &e {
            GradeError::Schema { .. } | GradeError::EmptyInput | GradeError::Csv(_) | GradeError::Json(_) => {
                StatusCode::BAD_REQUEST
            }
            GradeError::PipelineUnavailable { .. } | GradeError::NoBaselineData => StatusCode::SERVICE_UNAVAILABLE,
            GradeError::IdentifierSpaceExhausted => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!("Request failed: {}", e);
        }
        Self {
            status,
            detail: e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(format!("Invalid JSON body: {}", rejection.body_text()))
    }
}

type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub limit: Option<usize>,
}

/// Health check endpoint
async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": "smart-mining",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn list_forages(
    Extension(state): Extension<AppState>,
    Query(params): Query<ListParams>,
) -> ApiResult<impl IntoResponse> {
    let limit = params.limit.unwrap_or(DEFAULT_LIST_LIMIT).min(MAX_LIST_LIMIT);
    let rows = state.storage.list_measurements(limit).await?;
    Ok(Json(rows))
}

async fn get_forage(Extension(state): Extension<AppState>, Path(id): Path<i64>) -> ApiResult<impl IntoResponse> {
    match state.storage.get_measurement(id).await? {
        Some(m) => Ok(Json(m)),
        None => Err(ApiError::not_found(format!("Forage {id} not found"))),
    }
}

/// Takes the field named `file`, or the first field when none is named so.
async fn upload_csv(Extension(state): Extension<AppState>, mut multipart: Multipart) -> ApiResult<impl IntoResponse> {
    let mut upload: Option<Vec<u8>> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart body: {e}")))?
    {
        let is_file = field.name() == Some("file");
        if upload.is_some() && !is_file {
            continue;
        }
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(format!("Failed to read upload: {e}")))?;
        upload = Some(bytes.to_vec());
        if is_file {
            break;
        }
    }

    let bytes = upload.ok_or_else(|| ApiError::bad_request("No file uploaded"))?;
    info!("Received CSV upload of {} bytes", bytes.len());
    let report = state.ingestor.ingest_csv(&bytes).await?;
    Ok(Json(report))
}

async fn bulk_insert(
    Extension(state): Extension<AppState>,
    payload: Result<Json<Vec<Map<String, Value>>>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(records) = payload?;
    if records.is_empty() {
        return Err(GradeError::EmptyInput.into());
    }
    let report = state.ingestor.ingest(RawTable::from_json_records(&records)).await?;
    Ok(Json(report))
}

async fn predict(
    Extension(state): Extension<AppState>,
    payload: Result<Json<FeaturePoint>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(point) = payload?;
    let prediction = state.model.predict(point).map_err(|e| {
        warn!("Prediction failed: {}", e);
        e
    })?;
    Ok(Json(prediction))
}

async fn predict_baseline_handler(
    Extension(state): Extension<AppState>,
    payload: Result<Json<FeaturePoint>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(point) = payload?;
    let prediction = predict_baseline(state.storage.as_ref(), point).await?;
    Ok(Json(prediction))
}

async fn model_status(Extension(state): Extension<AppState>) -> impl IntoResponse {
    Json(state.model.status())
}

async fn metrics_handler() -> impl IntoResponse {
    match crate::metrics::render() {
        Some(body) => ([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body).into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, "metrics recorder not installed").into_response(),
    }
}

/// Create the HTTP router with all routes
pub fn create_server(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/forages", get(list_forages))
        .route("/forages/upload-csv", post(upload_csv))
        .route("/forages/bulk", post(bulk_insert))
        .route("/forages/:id", get(get_forage))
        .route("/predict", post(predict))
        .route("/predict/baseline", post(predict_baseline_handler))
        .route("/model/status", get(model_status))
        .route("/metrics", get(metrics_handler))
        .layer(Extension(state))
        .layer(ServiceBuilder::new().layer(cors))
}

/// Start the HTTP server on the given address
pub async fn start_server(state: AppState, host: &str, port: u16) -> anyhow::Result<()> {
    let app = create_server(state);

    let addr: SocketAddr = format!("{host}:{port}").parse()?;

    info!("HTTP server running on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    Server::bind(&addr).serve(app.into_make_service()).await?;

    Ok(())
}
