use std::sync::{Arc, Mutex};

use tracing_subscriber::EnvFilter;

use washbay::config::AppConfig;
use washbay::db;
use washbay::services::clock::{Clock, SystemClock};
use washbay::services::email::http::HttpEmailProvider;
use washbay::services::messaging::twilio::TwilioSmsProvider;
use washbay::services::rate_limit::SqliteRateLimiter;
use washbay::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();
    if config.admin_password.is_empty() {
        tracing::warn!("ADMIN_PASSWORD not set, admin login is disabled");
    }
    if config.webhook_secret.is_empty() {
        tracing::warn!("WEBHOOK_SECRET not set, payment webhook signatures are not verified");
    }

    let db = Arc::new(Mutex::new(db::init_db(&config.database_url)?));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let messaging = TwilioSmsProvider::new(
        config.twilio_account_sid.clone(),
        config.twilio_auth_token.clone(),
        config.twilio_phone_number.clone(),
    );
    let email = HttpEmailProvider::new(
        config.email_api_url.clone(),
        config.email_api_key.clone(),
        config.email_from.clone(),
    );
    let rate_limiter = SqliteRateLimiter::new(
        Arc::clone(&db),
        Arc::clone(&clock),
        config.login_max_attempts,
        config.login_lockout_minutes,
    );

    let state = Arc::new(AppState {
        db,
        config: config.clone(),
        messaging: Box::new(messaging),
        email: Box::new(email),
        clock,
        rate_limiter: Arc::new(rate_limiter),
    });

    let app = washbay::app(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
