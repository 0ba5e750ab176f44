//! HTTP surface of the prediction service.

use std::any::Any;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    middleware,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tower_http::catch_panic::CatchPanicLayer;
use tracing::info;

use crate::error::InferenceError;
use crate::iris::Species;
use crate::model_service::{ModelInfo, PredictionService};
use crate::observability::{self, panic_message, HandlerFailure, LogContext};
use crate::validation::{self, Rejection};

pub const SERVICE_NAME: &str = "iris-prediction-api";

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<PredictionService>,
    pub logs: LogContext,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Rejected(#[from] Rejection),

    #[error(transparent)]
    Inference(#[from] InferenceError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        let status = match &self {
            ApiError::Rejected(rejection) => rejection.status(),
            ApiError::Inference(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let mut response = (status, Json(json!({ "error": message }))).into_response();
        if let ApiError::Inference(_) = self {
            response.extensions_mut().insert(HandlerFailure(message));
        }

        response
    }
}

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub prediction: Vec<Species>,
}

#[derive(Debug, Serialize)]
pub struct PredictProbaResponse {
    pub prediction: Vec<Species>,
    pub probabilities: Vec<[f64; 3]>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: String,
    pub service: &'static str,
}

pub fn router(state: AppState) -> Router {
    let logs = state.logs.clone();

    let app = Router::new()
        .route("/predict", post(predict))
        .route("/predict-proba", post(predict_proba))
        .route("/health", get(health))
        .route("/model-info", get(model_info))
        .with_state(state);

    with_observability(app, logs)
}

/// Wraps every route of `app` in request logging. Panics that escape the
/// logging layer are turned into a 500 JSON body.
pub fn with_observability(app: Router, logs: LogContext) -> Router {
    app.layer(middleware::from_fn_with_state(logs, observability::observe))
        .layer(CatchPanicLayer::custom(panic_response))
}

fn panic_response(payload: Box<dyn Any + Send + 'static>) -> Response {
    let message = panic_message(payload.as_ref());
    (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": message }))).into_response()
}

async fn predict(State(state): State<AppState>, body: Bytes) -> Result<Json<PredictResponse>, ApiError> {
    let batch = validation::decode(&body)?;
    let prediction = state.service.predict(&batch)?;

    info!(event = "prediction", samples = batch.len(), "Prediction served");

    Ok(Json(PredictResponse { prediction }))
}

async fn predict_proba(State(state): State<AppState>, body: Bytes) -> Result<Json<PredictProbaResponse>, ApiError> {
    let batch = validation::decode(&body)?;
    let prediction = state.service.predict(&batch)?;
    let probabilities = state.service.predict_proba(&batch)?;

    info!(event = "prediction_with_probabilities", samples = batch.len(), "Prediction served");

    Ok(Json(PredictProbaResponse { prediction, probabilities }))
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        timestamp: chrono::Utc::now().to_rfc3339(),
        service: SERVICE_NAME,
    })
}

async fn model_info(State(state): State<AppState>) -> Json<ModelInfo> {
    Json(state.service.model_info())
}
