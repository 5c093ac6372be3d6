//! MailGuard: email threat triage engine.

pub mod analyzers;
pub mod api;
pub mod config;
pub mod error;
pub mod triage;
