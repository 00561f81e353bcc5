//! Bearer-token caller identification shared by every protected route.

use axum::http::HeaderMap;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Booking, Role, User};
use crate::state::AppState;

#[derive(Debug, Clone)]
pub enum Caller {
    Admin,
    Customer(User),
}

impl Caller {
    pub fn is_admin(&self) -> bool {
        matches!(self, Caller::Admin)
    }

    /// Owner or admin.
    pub fn can_access(&self, booking: &Booking) -> bool {
        match self {
            Caller::Admin => true,
            Caller::Customer(user) => user.id == booking.user_id,
        }
    }
}

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

pub fn identify(state: &AppState, headers: &HeaderMap) -> Result<Caller, AppError> {
    let token = bearer_token(headers).ok_or(AppError::Unauthorized)?;
    if !state.config.admin_token.is_empty() && token == state.config.admin_token {
        return Ok(Caller::Admin);
    }

    let user = {
        let db = state.db()?;
        queries::get_user_by_token(&db, token)?
    };
    match user {
        Some(user) if user.role == Role::Admin => Ok(Caller::Admin),
        Some(user) => Ok(Caller::Customer(user)),
        None => Err(AppError::Unauthorized),
    }
}

pub fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<(), AppError> {
    if identify(state, headers)?.is_admin() {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}

/// Admin callers, or the scheduler presenting `CRON_SECRET`.
pub fn require_operator(state: &AppState, headers: &HeaderMap) -> Result<(), AppError> {
    let secret = &state.config.cron_secret;
    if !secret.is_empty() && bearer_token(headers) == Some(secret.as_str()) {
        return Ok(());
    }
    require_admin(state, headers)
}

pub fn authorize_booking(caller: &Caller, booking: &Booking) -> Result<(), AppError> {
    if caller.can_access(booking) {
        Ok(())
    } else {
        tracing::warn!(booking_id = %booking.id, "caller does not own booking");
        Err(AppError::Forbidden)
    }
}
