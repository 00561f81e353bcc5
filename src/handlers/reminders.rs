use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;

use crate::errors::AppError;
use crate::handlers::auth;
use crate::models::ReminderType;
use crate::services::reminders::{self, ReminderFilter, SendOutcome};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct DueParams {
    pub check: Option<String>,
}

// GET /api/bookings/reminders?check=all|24_hour|2_hour|30_min
pub async fn list_due(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<DueParams>,
) -> Result<Json<serde_json::Value>, AppError> {
    auth::require_operator(&state, &headers)?;

    let check = params.check.as_deref().unwrap_or("all");
    let filter = ReminderFilter::parse(check)
        .ok_or_else(|| AppError::BusinessRule(format!("invalid reminder type: {check}")))?;

    let now = state.clock.now();
    let due = {
        let db = state.db()?;
        reminders::find_due(&db, now, filter)?
    };

    Ok(Json(serde_json::json!({
        "check": check,
        "now": now,
        "count": due.len(),
        "reminders": due,
    })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendReminderRequest {
    #[serde(rename = "type")]
    pub reminder_type: Option<String>,
    pub booking_id: Option<String>,
    #[serde(default)]
    pub force: bool,
}

// POST /api/bookings/reminders
pub async fn send_reminder(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<SendReminderRequest>,
) -> Result<Json<SendOutcome>, AppError> {
    auth::require_operator(&state, &headers)?;

    let booking_id = body
        .booking_id
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| AppError::Validation("bookingId is required".to_string()))?;
    let raw_type = body
        .reminder_type
        .ok_or_else(|| AppError::Validation("type is required".to_string()))?;
    let reminder_type = ReminderType::parse(&raw_type)
        .ok_or_else(|| AppError::BusinessRule(format!("invalid reminder type: {raw_type}")))?;

    let outcome = reminders::send_reminder(&state, &booking_id, reminder_type, body.force).await?;
    Ok(Json(outcome))
}
