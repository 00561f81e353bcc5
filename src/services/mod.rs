pub mod availability;
pub mod bookings;
pub mod calendar;
pub mod clock;
pub mod email;
pub mod lifecycle;
pub mod messaging;
pub mod notifier;
pub mod rate_limit;
pub mod reminders;
pub mod tracking;
