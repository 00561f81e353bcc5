use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;

use crate::errors::AppError;
use crate::handlers::auth;
use crate::services::reminders::{self, CronSummary};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CronParams {
    pub test: Option<String>,
}

// GET|POST /api/cron/booking-reminders
pub async fn booking_reminders(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<CronParams>,
) -> Result<Json<CronSummary>, AppError> {
    auth::require_operator(&state, &headers)?;
    let test_mode = matches!(params.test.as_deref(), Some("true") | Some("1"));
    Ok(Json(reminders::run_scheduled(&state, test_mode).await?))
}
