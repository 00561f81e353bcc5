use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::db::queries;
use crate::errors::AppError;
use crate::handlers::{auth, bookings::load_booking};
use crate::models::{parse_date, Booking, BookingStatus};
use crate::services::lifecycle::{self, BookingEvent};
use crate::state::AppState;

const DEFAULT_LIST_LIMIT: i64 = 50;
const MAX_LIST_LIMIT: i64 = 500;

fn client_key(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or("unknown")
        .to_string()
}

// POST /api/admin/login
#[derive(Deserialize)]
pub struct LoginRequest {
    pub password: String,
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<LoginRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let key = client_key(&headers);
    if !state.rate_limiter.check(&key).await? {
        return Err(AppError::RateLimited(
            "too many failed login attempts, try again later".to_string(),
        ));
    }

    let expected = &state.config.admin_password;
    if expected.is_empty() || body.password != *expected {
        state.rate_limiter.record_failure(&key).await?;
        tracing::warn!(key = %key, "admin login failed");
        return Err(AppError::Unauthorized);
    }

    state.rate_limiter.clear(&key).await?;
    tracing::info!(key = %key, "admin logged in");
    Ok(Json(serde_json::json!({ "token": state.config.admin_token })))
}

// GET /api/admin/bookings
#[derive(Deserialize)]
pub struct BookingsQuery {
    pub status: Option<String>,
    pub date: Option<String>,
    pub limit: Option<i64>,
}

pub async fn get_bookings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<BookingsQuery>,
) -> Result<Json<Vec<Booking>>, AppError> {
    auth::require_admin(&state, &headers)?;

    let status = match query.status.as_deref() {
        Some(raw) => Some(
            BookingStatus::parse(raw)
                .ok_or_else(|| AppError::Validation(format!("invalid status: {raw}")))?,
        ),
        None => None,
    };
    let date = match query.date.as_deref() {
        Some(raw) => {
            Some(parse_date(raw).ok_or_else(|| AppError::Validation(format!("invalid date: {raw}")))?)
        }
        None => None,
    };
    let limit = query
        .limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .clamp(1, MAX_LIST_LIMIT);

    let bookings = {
        let db = state.db()?;
        queries::list_bookings(&db, status, date, limit)?
    };
    Ok(Json(bookings))
}

// POST /api/admin/bookings/:id/status
pub async fn update_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(event): Json<BookingEvent>,
) -> Result<Json<Booking>, AppError> {
    auth::require_admin(&state, &headers)?;

    let db = state.db()?;
    let current = load_booking(&db, &id)?;
    let updated = lifecycle::transition(&current, event, state.clock.now())?;
    queries::update_booking_status(&db, &updated)?;
    Ok(Json(updated))
}

// GET /api/admin/stats
#[derive(Deserialize)]
pub struct StatsQuery {
    pub date: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotLoad {
    time_slot: String,
    active: i64,
    capacity: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    date: String,
    total_active: i64,
    slots: Vec<SlotLoad>,
    by_status: BTreeMap<&'static str, i64>,
}

pub async fn get_stats(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<StatsQuery>,
) -> Result<Json<StatsResponse>, AppError> {
    auth::require_admin(&state, &headers)?;

    let date = match query.date.as_deref() {
        Some(raw) => parse_date(raw).ok_or_else(|| AppError::Validation(format!("invalid date: {raw}")))?,
        None => state.clock.now().date(),
    };

    let (total_active, per_slot, per_status) = {
        let db = state.db()?;
        (
            queries::count_active_on_day(&db, date)?,
            queries::active_counts_by_slot(&db, date)?,
            queries::counts_by_status(&db, date)?,
        )
    };

    let mut by_status: BTreeMap<&'static str, i64> =
        BookingStatus::ALL.iter().map(|s| (s.as_str(), 0)).collect();
    for (status, count) in per_status {
        by_status.insert(status.as_str(), count);
    }

    let slots = per_slot
        .into_iter()
        .map(|(time_slot, active)| SlotLoad {
            capacity: state.config.capacity.for_slot(&time_slot),
            time_slot,
            active,
        })
        .collect();

    Ok(Json(StatsResponse {
        date: date.format("%Y-%m-%d").to_string(),
        total_active,
        slots,
        by_status,
    }))
}
