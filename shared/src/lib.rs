//! Shared library for the lesson booking Lambda functions.
//!
//! This crate provides the booking operations, the record store they run
//! against, and the HTTP glue used by every endpoint binary.

pub mod booking;
pub mod codes;
pub mod config;
pub mod db;
pub mod error;
pub mod http;
pub mod memory;
pub mod models;
pub mod notifier;
pub mod postgres;
pub mod promo;
pub mod secrets;
pub mod state;
pub mod store;

pub use config::Config;
pub use error::{Error, Result};
pub use memory::InMemoryRecordStore;
pub use notifier::Notifier;
pub use postgres::PgRecordStore;
pub use secrets::{fetch_database_credentials, DatabaseCredentials};
pub use state::AppState;
pub use store::RecordStore;
