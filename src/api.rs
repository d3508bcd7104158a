// REST API - axum routes over the card repository
//
// Card and redemption endpoints return bare JSON bodies (the web frontend
// consumes them directly); errors and the health check use ApiResponse.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{delete, get, post, put},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::error::ApiError;
use crate::models::{Card, NewCard, NewRedemption, Redemption};
use crate::repository::CardRepository;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<CardRepository>,
}

/// API Response wrapper
#[derive(Serialize)]
pub struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn err(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::CardNotFound(_)
            | ApiError::RedemptionNotFound { .. }
            | ApiError::SummaryNotFound { .. } => StatusCode::NOT_FOUND,
        };
        (status, Json(ApiResponse::<()>::err(self.to_string()))).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct CheckedParams {
    checked: bool,
}

// ============================================================================
// Router
// ============================================================================

/// Build the `/api` router with CORS and request tracing
pub fn router(repo: Arc<CardRepository>) -> Router {
    let state = AppState { repo };

    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/creditcards", get(list_cards).post(create_card))
        .route(
            "/creditcards/reimbursements/current-year-total",
            get(current_year_total),
        )
        .route(
            "/creditcards/:id",
            get(get_card).put(update_card).delete(delete_card),
        )
        .route("/creditcards/:id/summaries/:year", get(yearly_summary))
        .route("/creditcards/:id/redemptions", post(add_redemption))
        .route(
            "/creditcards/:id/redemptions/:redemption_id",
            delete(delete_redemption),
        )
        .route(
            "/creditcards/:id/redemptions/:redemption_id/checked",
            put(set_redemption_checked),
        )
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/creditcards - All cards with current-year totals refreshed
async fn list_cards(State(state): State<AppState>) -> Json<Vec<Card>> {
    Json(state.repo.list_cards())
}

/// GET /api/creditcards/:id
async fn get_card(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Card>, ApiError> {
    state
        .repo
        .get_card(&id)
        .map(Json)
        .ok_or(ApiError::CardNotFound(id))
}

/// POST /api/creditcards
async fn create_card(State(state): State<AppState>, Json(input): Json<NewCard>) -> Json<Card> {
    Json(state.repo.create_card(input))
}

/// PUT /api/creditcards/:id
async fn update_card(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<NewCard>,
) -> Result<Json<Card>, ApiError> {
    state
        .repo
        .update_card(&id, input)
        .map(Json)
        .ok_or(ApiError::CardNotFound(id))
}

/// DELETE /api/creditcards/:id
async fn delete_card(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if state.repo.delete_card(&id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::CardNotFound(id))
    }
}

/// POST /api/creditcards/:id/redemptions
async fn add_redemption(
    State(state): State<AppState>,
    Path(card_id): Path<String>,
    Json(input): Json<NewRedemption>,
) -> Result<Json<Redemption>, ApiError> {
    state
        .repo
        .add_redemption(&card_id, input)
        .map(Json)
        .ok_or(ApiError::CardNotFound(card_id))
}

/// DELETE /api/creditcards/:id/redemptions/:redemption_id
async fn delete_redemption(
    State(state): State<AppState>,
    Path((card_id, redemption_id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    if state.repo.delete_redemption(&card_id, &redemption_id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::RedemptionNotFound {
            card_id,
            redemption_id,
        })
    }
}

/// PUT /api/creditcards/:id/redemptions/:redemption_id/checked?checked=bool
async fn set_redemption_checked(
    State(state): State<AppState>,
    Path((card_id, redemption_id)): Path<(String, String)>,
    Query(params): Query<CheckedParams>,
) -> Result<Json<Redemption>, ApiError> {
    state
        .repo
        .set_redemption_checked(&card_id, &redemption_id, params.checked)
        .map(Json)
        .ok_or(ApiError::RedemptionNotFound {
            card_id,
            redemption_id,
        })
}

/// GET /api/creditcards/reimbursements/current-year-total
async fn current_year_total(State(state): State<AppState>) -> Json<f64> {
    Json(state.repo.current_year_reimbursement_total())
}

/// GET /api/creditcards/:id/summaries/:year
async fn yearly_summary(
    State(state): State<AppState>,
    Path((card_id, year)): Path<(String, i32)>,
) -> Result<Json<f64>, ApiError> {
    match state.repo.yearly_summary(&card_id, year) {
        Some(Some(total)) => Ok(Json(total)),
        Some(None) => Err(ApiError::SummaryNotFound { card_id, year }),
        None => Err(ApiError::CardNotFound(card_id)),
    }
}
