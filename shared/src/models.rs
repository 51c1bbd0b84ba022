//! Shared data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Error;

/// Payment state of a package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageStatus {
    Pending,
    Paid,
}

impl PackageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PackageStatus::Pending => "pending",
            PackageStatus::Paid => "paid",
        }
    }
}

impl TryFrom<String> for PackageStatus {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "pending" => Ok(PackageStatus::Pending),
            "paid" => Ok(PackageStatus::Paid),
            other => Err(Error::Internal(format!("Unknown package status: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Confirmed,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Confirmed => "confirmed",
        }
    }
}

impl TryFrom<String> for BookingStatus {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "confirmed" => Ok(BookingStatus::Confirmed),
            other => Err(Error::Internal(format!("Unknown booking status: {}", other))),
        }
    }
}

/// A purchased or promotional bundle of lesson credits.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Package {
    pub code: String,
    pub program: String,
    pub lessons_total: i32,
    pub lessons_remaining: i32,
    /// Minor currency units (cents)
    pub amount_paid: i64,
    pub payment_intent_id: Option<String>,
    #[sqlx(try_from = "String")]
    pub status: PackageStatus,
    pub created_at: DateTime<Utc>,
}

/// A bookable session instance.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TimeSlot {
    pub id: Uuid,
    pub program: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub max_capacity: i32,
    pub current_enrollment: i32,
}

impl TimeSlot {
    pub fn is_full(&self) -> bool {
        self.current_enrollment >= self.max_capacity
    }
}

/// A reservation consuming one lesson credit against one time slot.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Booking {
    pub id: Uuid,
    pub time_slot_id: Uuid,
    pub package_code: String,
    pub customer_email: String,
    pub customer_name: String,
    pub customer_phone: Option<String>,
    pub student_name: String,
    pub student_age: Option<i32>,
    pub notes: Option<String>,
    #[sqlx(try_from = "String")]
    pub status: BookingStatus,
    pub booking_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Booking about to be committed.
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub time_slot_id: Uuid,
    pub package_code: String,
    pub customer_email: String,
    pub customer_name: String,
    pub customer_phone: Option<String>,
    pub student_name: String,
    pub student_age: Option<i32>,
    pub notes: Option<String>,
    pub booked_at: DateTime<Utc>,
}

/// Package about to be inserted.
#[derive(Debug, Clone)]
pub struct NewPackage {
    pub code: String,
    pub program: String,
    pub lessons: i32,
    pub amount_paid: i64,
    pub payment_intent_id: Option<String>,
    pub status: PackageStatus,
    pub created_at: DateTime<Utc>,
}

/// Contact record keyed by email.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Customer {
    pub email: String,
    pub name: String,
    pub phone: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Result of an atomic cancellation.
#[derive(Debug, Clone)]
pub struct CancelledBooking {
    pub booking: Booking,
    /// Lessons remaining after the credit was restored; `None` when the
    /// originating package no longer exists.
    pub lessons_remaining: Option<i32>,
}
