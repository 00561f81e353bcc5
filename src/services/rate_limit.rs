use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Duration;
use rusqlite::Connection;

use crate::db::queries::{self, LoginAttempts};
use crate::services::clock::Clock;

/// Failure-counting limiter for sensitive endpoints such as admin login.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// `false` while `key` is locked out.
    async fn check(&self, key: &str) -> anyhow::Result<bool>;
    async fn record_failure(&self, key: &str) -> anyhow::Result<()>;
    async fn clear(&self, key: &str) -> anyhow::Result<()>;
}

/// Keeps attempt counters in the shared database so every instance sees the same lockouts.
pub struct SqliteRateLimiter {
    db: Arc<Mutex<Connection>>,
    clock: Arc<dyn Clock>,
    max_attempts: u32,
    window: Duration,
}

impl SqliteRateLimiter {
    pub fn new(
        db: Arc<Mutex<Connection>>,
        clock: Arc<dyn Clock>,
        max_attempts: u32,
        window_minutes: i64,
    ) -> Self {
        Self {
            db,
            clock,
            max_attempts: max_attempts.max(1),
            window: Duration::minutes(window_minutes),
        }
    }

    fn conn(&self) -> anyhow::Result<std::sync::MutexGuard<'_, Connection>> {
        self.db
            .lock()
            .map_err(|_| anyhow::anyhow!("database lock poisoned"))
    }
}

#[async_trait]
impl RateLimiter for SqliteRateLimiter {
    async fn check(&self, key: &str) -> anyhow::Result<bool> {
        let now = self.clock.now();
        let conn = self.conn()?;
        let attempts = queries::get_login_attempts(&conn, key)?;
        Ok(match attempts.and_then(|a| a.locked_until) {
            Some(until) => until <= now,
            None => true,
        })
    }

    async fn record_failure(&self, key: &str) -> anyhow::Result<()> {
        let now = self.clock.now();
        let conn = self.conn()?;

        let mut attempts = match queries::get_login_attempts(&conn, key)? {
            Some(a) if now - a.first_failure_at < self.window => a,
            _ => LoginAttempts {
                failures: 0,
                first_failure_at: now,
                locked_until: None,
            },
        };
        attempts.failures += 1;
        if attempts.failures >= self.max_attempts {
            attempts.locked_until = Some(now + self.window);
            tracing::warn!(key, failures = attempts.failures, "locking out after repeated failures");
        }

        queries::save_login_attempts(&conn, key, &attempts)
    }

    async fn clear(&self, key: &str) -> anyhow::Result<()> {
        let conn = self.conn()?;
        queries::clear_login_attempts(&conn, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::services::clock::FixedClock;
    use chrono::NaiveDateTime;

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    fn limiter(clock: Arc<FixedClock>) -> SqliteRateLimiter {
        let conn = db::init_db(":memory:").unwrap();
        SqliteRateLimiter::new(Arc::new(Mutex::new(conn)), clock, 3, 15)
    }

    #[tokio::test]
    async fn test_locks_after_max_failures_and_expires() {
        let clock = Arc::new(FixedClock::new(at("2024-06-01 09:00")));
        let limiter = limiter(clock.clone());

        for _ in 0..2 {
            limiter.record_failure("1.2.3.4").await.unwrap();
            assert!(limiter.check("1.2.3.4").await.unwrap());
        }
        limiter.record_failure("1.2.3.4").await.unwrap();
        assert!(!limiter.check("1.2.3.4").await.unwrap());
        assert!(limiter.check("5.6.7.8").await.unwrap());

        clock.set(at("2024-06-01 09:16"));
        assert!(limiter.check("1.2.3.4").await.unwrap());
    }

    #[tokio::test]
    async fn test_clear_resets_counter() {
        let clock = Arc::new(FixedClock::new(at("2024-06-01 09:00")));
        let limiter = limiter(clock);

        limiter.record_failure("k").await.unwrap();
        limiter.record_failure("k").await.unwrap();
        limiter.clear("k").await.unwrap();
        limiter.record_failure("k").await.unwrap();
        assert!(limiter.check("k").await.unwrap());
    }

    #[tokio::test]
    async fn test_old_failures_fall_out_of_window() {
        let clock = Arc::new(FixedClock::new(at("2024-06-01 09:00")));
        let limiter = limiter(clock.clone());

        limiter.record_failure("k").await.unwrap();
        limiter.record_failure("k").await.unwrap();
        clock.set(at("2024-06-01 10:00"));
        limiter.record_failure("k").await.unwrap();
        assert!(limiter.check("k").await.unwrap());
    }
}
