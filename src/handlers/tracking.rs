use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;

use crate::db::queries;
use crate::errors::AppError;
use crate::handlers::{auth, bookings::load_booking};
use crate::services::tracking::{self, TrackingView};
use crate::state::AppState;

// GET /api/bookings/:id/tracking
pub async fn get_tracking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<TrackingView>, AppError> {
    let caller = auth::identify(&state, &headers)?;

    let (booking, service) = {
        let db = state.db()?;
        let booking = load_booking(&db, &id)?;
        auth::authorize_booking(&caller, &booking)?;
        let service = queries::get_service(&db, &booking.service_id)?;
        (booking, service)
    };

    Ok(Json(tracking::track(&booking, service.as_ref(), state.clock.now())))
}
