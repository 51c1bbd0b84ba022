//! Error types for the lesson booking Lambda functions.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while booking, cancelling or issuing packages.
#[derive(Error, Debug)]
pub enum Error {
    /// Missing or malformed input
    #[error("{0}")]
    Validation(String),

    /// No paid package, and no pending single-lesson package inside the grace window
    #[error("Invalid package code or payment not yet confirmed. Please try again in a moment.")]
    PackageNotFound { code: String },

    #[error("No remaining lessons in this package")]
    NoLessonsRemaining,

    #[error("Invalid time slot")]
    InvalidTimeSlot,

    #[error("This time slot is full")]
    SlotFull,

    #[error("This student is already booked for this time slot")]
    DuplicateBooking,

    #[error("Invalid promo code for free package")]
    InvalidPromoCode,

    /// Booking missing, or owned by someone else. The two are reported identically.
    #[error("Booking not found or access denied")]
    BookingNotFound,

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// AWS SDK error
    #[error("AWS error: {0}")]
    Aws(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Get HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::Validation(_)
            | Error::PackageNotFound { .. }
            | Error::NoLessonsRemaining
            | Error::InvalidTimeSlot
            | Error::SlotFull
            | Error::DuplicateBooking
            | Error::InvalidPromoCode => 400,
            Error::BookingNotFound => 404,
            _ => 500,
        }
    }

    /// Extra detail returned alongside the client-facing message, if any.
    pub fn details(&self) -> Option<String> {
        match self {
            Error::PackageNotFound { code } => Some(format!("Package code: {} not found", code)),
            e if e.status_code() >= 500 => Some(e.to_string()),
            _ => None,
        }
    }
}

/// Unwrap a field that request validation has already checked for presence.
pub(crate) fn required<T>(value: Option<T>) -> Result<T> {
    value.ok_or_else(|| Error::Validation("Missing required fields".to_string()))
}

impl From<validator::ValidationErrors> for Error {
    fn from(errors: validator::ValidationErrors) -> Self {
        let invalid_only = errors
            .field_errors()
            .values()
            .flat_map(|errs| errs.iter())
            .all(|e| e.code == "range");

        if invalid_only {
            Error::Validation(format!("Invalid request: {}", errors))
        } else {
            Error::Validation("Missing required fields".to_string())
        }
    }
}
