pub mod config;
pub mod db;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod services;
pub mod state;

use std::sync::Arc;

use axum::http::{header, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn app(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(handlers::health::health))
        .route(
            "/api/availability",
            get(handlers::availability::check_slot).post(handlers::availability::check_batch),
        )
        .route("/api/bookings", post(handlers::bookings::create_booking))
        .route(
            "/api/bookings/reminders",
            get(handlers::reminders::list_due).post(handlers::reminders::send_reminder),
        )
        .route(
            "/api/bookings/:id",
            get(handlers::bookings::get_booking).put(handlers::bookings::modify_booking),
        )
        .route(
            "/api/bookings/:id/cancel",
            post(handlers::bookings::cancel_booking),
        )
        .route(
            "/api/bookings/:id/tracking",
            get(handlers::tracking::get_tracking),
        )
        .route(
            "/api/cron/booking-reminders",
            get(handlers::cron::booking_reminders).post(handlers::cron::booking_reminders),
        )
        .route("/api/admin/login", post(handlers::admin::login))
        .route("/api/admin/bookings", get(handlers::admin::get_bookings))
        .route(
            "/api/admin/bookings/:id/status",
            post(handlers::admin::update_status),
        )
        .route("/api/admin/stats", get(handlers::admin::get_stats))
        .route("/webhook/payment", post(handlers::webhook::payment_webhook))
        .route(
            "/calendar/:booking_id",
            get(handlers::calendar::download_ics),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
