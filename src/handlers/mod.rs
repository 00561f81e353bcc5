pub mod admin;
pub mod auth;
pub mod availability;
pub mod bookings;
pub mod calendar;
pub mod cron;
pub mod health;
pub mod reminders;
pub mod tracking;
pub mod webhook;
