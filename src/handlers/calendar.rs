use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};

use crate::db::queries;
use crate::errors::AppError;
use crate::handlers::bookings::load_booking;
use crate::services::calendar::generate_ics;
use crate::state::AppState;

const BUSINESS_NAME: &str = "Washbay";

// GET /calendar/:booking_id.ics
pub async fn download_ics(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
) -> Result<Response, AppError> {
    let booking_id = raw_id.strip_suffix(".ics").unwrap_or(&raw_id);

    let (booking, service) = {
        let db = state.db()?;
        let booking = load_booking(&db, booking_id)?;
        let service = queries::get_service(&db, &booking.service_id)?;
        (booking, service)
    };

    let ics = generate_ics(&booking, service.as_ref(), BUSINESS_NAME).ok_or_else(|| {
        AppError::BusinessRule(format!("booking has an invalid time slot: {}", booking.time_slot))
    })?;
    let disposition = format!("attachment; filename=\"booking-{booking_id}.ics\"");

    Ok((
        [
            (header::CONTENT_TYPE, "text/calendar; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        ics,
    )
        .into_response())
}
