use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::db::queries;
use crate::errors::AppError;
use crate::handlers::auth::{self, Caller};
use crate::models::{parse_date, AddOn, Booking};
use crate::services::bookings::{self, BookingChanges, NewBooking};
use crate::services::lifecycle::{self, BookingEvent};
use crate::state::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingDetail {
    #[serde(flatten)]
    pub booking: Booking,
    pub add_ons: Vec<AddOn>,
}

pub(crate) fn load_booking(conn: &Connection, id: &str) -> Result<Booking, AppError> {
    queries::get_booking_by_id(conn, id)?.ok_or_else(|| AppError::NotFound(format!("booking {id}")))
}

fn detail(conn: &Connection, booking: Booking) -> Result<BookingDetail, AppError> {
    let add_ons = queries::get_add_ons(conn, &booking.id)?;
    Ok(BookingDetail { booking, add_ons })
}

// POST /api/bookings
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingRequest {
    pub service_id: Option<String>,
    pub booking_date: Option<String>,
    pub time_slot: Option<String>,
    pub notes: Option<String>,
    #[serde(default)]
    pub add_ons: Vec<AddOn>,
    /// Only honoured for admin callers booking on a customer's behalf.
    pub user_id: Option<String>,
}

pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<BookingDetail>), AppError> {
    let caller = auth::identify(&state, &headers)?;

    let service_id = body
        .service_id
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| AppError::Validation("serviceId is required".to_string()))?;
    let raw_date = body
        .booking_date
        .ok_or_else(|| AppError::Validation("bookingDate is required".to_string()))?;
    let booking_date = parse_date(&raw_date)
        .ok_or_else(|| AppError::Validation(format!("invalid date: {raw_date}")))?;
    let time_slot = body
        .time_slot
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| AppError::Validation("timeSlot is required".to_string()))?;

    let db = state.db()?;
    let user_id = match caller {
        Caller::Customer(user) => user.id,
        Caller::Admin => {
            let id = body
                .user_id
                .ok_or_else(|| AppError::Validation("userId is required for admin bookings".to_string()))?;
            queries::get_user(&db, &id)?.ok_or_else(|| AppError::NotFound(format!("user {id}")))?;
            id
        }
    };

    let new = NewBooking {
        user_id,
        service_id,
        booking_date,
        time_slot,
        notes: body.notes,
        add_ons: body.add_ons,
    };
    let booking = bookings::create_booking(&db, &state.config, new, state.clock.now())?;
    Ok((StatusCode::CREATED, Json(detail(&db, booking)?)))
}

// GET /api/bookings/:id
pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<BookingDetail>, AppError> {
    let caller = auth::identify(&state, &headers)?;
    let db = state.db()?;
    let booking = load_booking(&db, &id)?;
    auth::authorize_booking(&caller, &booking)?;
    Ok(Json(detail(&db, booking)?))
}

// PUT /api/bookings/:id
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModifyBookingRequest {
    pub booking_date: Option<String>,
    pub time_slot: Option<String>,
    pub notes: Option<String>,
    pub add_ons: Option<Vec<AddOn>>,
}

pub async fn modify_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<ModifyBookingRequest>,
) -> Result<Json<BookingDetail>, AppError> {
    let caller = auth::identify(&state, &headers)?;

    let booking_date = match body.booking_date.as_deref() {
        Some(raw) => Some(
            parse_date(raw).ok_or_else(|| AppError::Validation(format!("invalid date: {raw}")))?,
        ),
        None => None,
    };
    let changes = BookingChanges {
        booking_date,
        time_slot: body.time_slot,
        notes: body.notes,
        add_ons: body.add_ons,
    };

    let db = state.db()?;
    let current = load_booking(&db, &id)?;
    auth::authorize_booking(&caller, &current)?;
    let updated = bookings::modify_booking(&db, &state.config, &current, changes, state.clock.now())?;
    Ok(Json(detail(&db, updated)?))
}

// POST /api/bookings/:id/cancel
#[derive(Deserialize)]
pub struct CancelRequest {
    pub reason: Option<String>,
}

pub async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    body: Option<Json<CancelRequest>>,
) -> Result<Json<Booking>, AppError> {
    let caller = auth::identify(&state, &headers)?;
    let reason = body.and_then(|Json(b)| b.reason);

    let db = state.db()?;
    let current = load_booking(&db, &id)?;
    auth::authorize_booking(&caller, &current)?;

    let cancelled = lifecycle::transition(&current, BookingEvent::Cancel { reason }, state.clock.now())?;
    queries::update_booking_status(&db, &cancelled)?;
    Ok(Json(cancelled))
}
