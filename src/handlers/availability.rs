use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use chrono::NaiveDate;
use serde::Deserialize;

use crate::errors::AppError;
use crate::models::{canonical_time_slot, parse_date};
use crate::services::availability::{self, SlotAvailability, SlotQuery, SlotStatus};
use crate::state::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotParams {
    pub date: Option<String>,
    pub time_slot: Option<String>,
    pub service_id: Option<String>,
    pub include_services: Option<String>,
}

fn required_date(raw: Option<&str>) -> Result<NaiveDate, AppError> {
    let raw = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::Validation("date is required".to_string()))?;
    parse_date(raw).ok_or_else(|| AppError::Validation(format!("invalid date: {raw}")))
}

/// Slots are counted under their `HH:MM` spelling, the same one bookings are stored with.
fn required_slot(raw: Option<&str>) -> Result<String, AppError> {
    let raw = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::Validation("timeSlot is required".to_string()))?;
    canonical_time_slot(raw).ok_or_else(|| AppError::Validation(format!("invalid timeSlot: {raw}")))
}

// GET /api/availability
pub async fn check_slot(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SlotParams>,
) -> Result<Json<SlotAvailability>, AppError> {
    let date = required_date(params.date.as_deref())?;
    let time_slot = required_slot(params.time_slot.as_deref())?;
    let include_services = matches!(params.include_services.as_deref(), Some("true") | Some("1"));

    let query = SlotQuery {
        date,
        time_slot: &time_slot,
        service_id: params.service_id.as_deref(),
        include_services,
    };
    let result = {
        let db = state.db()?;
        availability::check_slot(&db, &query)?
    };
    Ok(Json(result))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRequest {
    #[serde(default)]
    pub dates: Vec<String>,
    #[serde(default)]
    pub time_slots: Vec<String>,
}

// POST /api/availability
pub async fn check_batch(
    State(state): State<Arc<AppState>>,
    Json(body): Json<BatchRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    if body.dates.is_empty() || body.time_slots.is_empty() {
        return Err(AppError::Validation(
            "dates and timeSlots must both be non-empty".to_string(),
        ));
    }

    let combinations = body.dates.len() * body.time_slots.len();
    if combinations > state.config.max_batch_combinations {
        return Err(AppError::BusinessRule(format!(
            "too many combinations requested ({combinations}, max {})",
            state.config.max_batch_combinations
        )));
    }

    let dates = body
        .dates
        .iter()
        .map(|d| required_date(Some(d.as_str())))
        .collect::<Result<Vec<_>, _>>()?;
    let time_slots = body
        .time_slots
        .iter()
        .map(|s| required_slot(Some(s.as_str())))
        .collect::<Result<Vec<_>, _>>()?;

    let results: Vec<SlotStatus> = {
        let db = state.db()?;
        availability::check_batch(&db, &dates, &time_slots, &state.config.capacity)?
    };
    Ok(Json(serde_json::json!({ "results": results })))
}
