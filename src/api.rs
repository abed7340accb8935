// 🌐 HTTP API
// JSON routes over FinanceService; every failure becomes {"error": ...}

use crate::budget::{initialize_balance, BalancePlan, SavingMode};
use crate::error::AppError;
use crate::models::MonthlyAnalytics;
use crate::service::{FinanceService, IngestOutcome, NewTransaction, SaveOutcome};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub service: FinanceService,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::StoreUnavailable(_)
            | AppError::ModelUnavailable(_)
            | AppError::InvalidInput(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if self.is_client_error() {
            warn!(error = %self, "request rejected");
        } else {
            error!(error = %self, "request failed");
        }

        (status, Json(ErrorBody { error: self.to_string() })).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, AppError>;

/// Malformed JSON is a validation error, not axum's plain-text rejection
fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| AppError::validation(rejection.body_text()))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeBalanceRequest {
    #[serde(default)]
    pub total_income: Option<f64>,
    #[serde(default)]
    pub saving_percentage: Option<f64>,
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /health - Health check
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// POST /initialize_balance - Split income into savings and balance
async fn initialize_balance_handler(
    payload: Result<Json<InitializeBalanceRequest>, JsonRejection>,
) -> ApiResult<BalancePlan> {
    let request = json_body(payload)?;
    let mode = SavingMode::from_percentage(request.saving_percentage.unwrap_or(30.0));
    let plan = initialize_balance(request.total_income.unwrap_or(0.0), mode)?;
    Ok(Json(plan))
}

/// POST /add_transaction - Validate, store, rescan for anomalies
async fn add_transaction(
    State(state): State<AppState>,
    payload: Result<Json<NewTransaction>, JsonRejection>,
) -> ApiResult<IngestOutcome> {
    let input = json_body(payload)?;
    Ok(Json(state.service.add_transaction(input)?))
}

/// GET /analytics/:user_id/:month - Chart data, anomalies, advice
async fn monthly_analytics(
    State(state): State<AppState>,
    Path((user_id, month)): Path<(String, String)>,
) -> ApiResult<MonthlyAnalytics> {
    Ok(Json(state.service.monthly_analytics(&user_id, &month)?))
}

/// GET /analytics/:user_id/:month/saved - Previously persisted result
async fn saved_analytics(
    State(state): State<AppState>,
    Path((user_id, month)): Path<(String, String)>,
) -> ApiResult<MonthlyAnalytics> {
    Ok(Json(state.service.saved_analytics(&user_id, &month)?))
}

/// POST /save_all_analytics - Flush the outbox
async fn save_all_analytics(State(state): State<AppState>) -> ApiResult<SaveOutcome> {
    Ok(Json(state.service.save_all_analytics()?))
}

// ============================================================================
// Router
// ============================================================================

pub fn router(service: FinanceService) -> Router {
    let state = AppState { service };

    Router::new()
        .route("/health", get(health_check))
        .route("/initialize_balance", post(initialize_balance_handler))
        .route("/add_transaction", post(add_transaction))
        .route("/analytics/:user_id/:month", get(monthly_analytics))
        .route("/analytics/:user_id/:month/saved", get(saved_analytics))
        .route("/save_all_analytics", post(save_all_analytics))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

// ============================================================================
// TESTS
// ============================================================================
