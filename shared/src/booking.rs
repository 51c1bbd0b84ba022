//! Booking and cancellation of lesson time slots.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::error::required;
use crate::models::{Booking, NewBooking, Package, PackageStatus, TimeSlot};
use crate::notifier::Notifier;
use crate::store::{CustomerUpsert, RecordStore};
use crate::{Error, Result};

/// How long a pending single-lesson package stays bookable while the payment
/// webhook catches up.
pub const PENDING_GRACE_MINUTES: i64 = 5;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct BookTimeSlotRequest {
    #[validate(required, length(min = 1))]
    pub package_code: Option<String>,
    #[validate(required)]
    pub time_slot_id: Option<Uuid>,
    #[validate(required, length(min = 1))]
    pub student_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_age")]
    pub student_age: Option<i32>,
    #[validate(required, length(min = 1))]
    pub customer_name: Option<String>,
    #[validate(required, length(min = 1))]
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CancelBookingRequest {
    /// Kept as text so a malformed id reads as "not found", like any unknown id.
    #[validate(required, length(min = 1))]
    pub booking_id: Option<String>,
    #[validate(required, length(min = 1))]
    pub customer_email: Option<String>,
}

/// Form inputs send ages as numbers or strings; anything unparseable is dropped.
fn lenient_age<'de, D>(deserializer: D) -> std::result::Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    let age = match Option::<serde_json::Value>::deserialize(deserializer)? {
        Some(serde_json::Value::Number(n)) => n.as_i64().and_then(|n| i32::try_from(n).ok()),
        Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    };
    Ok(age)
}

/// Booking record echoed back with its time slot.
#[derive(Debug, Serialize)]
pub struct BookingWithSlot {
    #[serde(flatten)]
    pub booking: Booking,
    #[serde(rename = "timeSlot")]
    pub time_slot: TimeSlot,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingConfirmation {
    pub booking_id: Uuid,
    pub lessons_remaining: i32,
    pub booking: BookingWithSlot,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelledBookingSummary {
    pub id: Uuid,
    pub package_code: String,
    pub time_slot_id: Uuid,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancellationReceipt {
    pub message: String,
    pub cancelled_booking: CancelledBookingSummary,
}

/// Whether a package may be booked against at `now`.
///
/// Paid packages always qualify. A pending package qualifies only if it is a
/// single lesson created within the grace window.
pub fn is_bookable(package: &Package, now: DateTime<Utc>) -> bool {
    match package.status {
        PackageStatus::Paid => true,
        PackageStatus::Pending => {
            package.lessons_total == 1
                && package.created_at >= now - Duration::minutes(PENDING_GRACE_MINUTES)
        }
    }
}

async fn resolve_package(store: &dyn RecordStore, code: &str, now: DateTime<Utc>) -> Result<Package> {
    match store.get_package(code).await? {
        Some(package) if is_bookable(&package, now) => {
            if package.status == PackageStatus::Pending {
                info!(package_code = %code, "Allowing booking for pending single lesson package");
            }
            Ok(package)
        }
        _ => Err(Error::PackageNotFound {
            code: code.to_string(),
        }),
    }
}

/// Book a time slot against a package.
///
/// Validation and business-rule checks run before any write. The booking
/// insert and both counter updates are committed atomically by the store.
/// Refreshing the lesson count, the customer upsert and the notification are
/// best-effort and never fail the request.
pub async fn book_time_slot(
    store: &dyn RecordStore,
    notifier: Option<&dyn Notifier>,
    request: BookTimeSlotRequest,
) -> Result<BookingConfirmation> {
    request.validate()?;
    let package_code = required(request.package_code)?;
    let time_slot_id = required(request.time_slot_id)?;
    let student_name = required(request.student_name)?;
    let customer_name = required(request.customer_name)?;
    let customer_email = required(request.customer_email)?;

    let now = Utc::now();

    let package = resolve_package(store, &package_code, now).await?;
    if package.lessons_remaining <= 0 {
        return Err(Error::NoLessonsRemaining);
    }

    let slot = store
        .get_time_slot(time_slot_id)
        .await?
        .ok_or(Error::InvalidTimeSlot)?;
    if slot.is_full() {
        return Err(Error::SlotFull);
    }

    if store
        .find_booking(time_slot_id, &package_code, &customer_email)
        .await?
        .is_some()
    {
        return Err(Error::DuplicateBooking);
    }

    let booking = store
        .commit_booking(NewBooking {
            time_slot_id,
            package_code: package_code.clone(),
            customer_email: customer_email.clone(),
            customer_name: customer_name.clone(),
            customer_phone: request.customer_phone.clone(),
            student_name,
            student_age: request.student_age,
            notes: request.notes,
            booked_at: now,
        })
        .await
        .inspect_err(|e| error!(package_code = %package_code, error = %e, "Booking creation failed"))?;

    info!(booking_id = %booking.id, package_code = %package_code, time_slot_id = %time_slot_id, "Booking created");

    let lessons_remaining = match store.lessons_remaining(&package_code).await {
        Ok(Some(remaining)) => remaining,
        Ok(None) => package.lessons_remaining - 1,
        Err(e) => {
            warn!(package_code = %package_code, error = %e, "Failed to refresh lessons remaining");
            package.lessons_remaining - 1
        }
    };

    let upsert = CustomerUpsert {
        email: customer_email,
        name: customer_name,
        phone: request.customer_phone,
        updated_at: now,
    };
    if let Err(e) = store.upsert_customer(upsert).await {
        error!(booking_id = %booking.id, error = %e, "Customer upsert failed");
    }

    if let Some(notifier) = notifier {
        if let Err(e) = notifier.booking_confirmed(&booking, &slot).await {
            error!(booking_id = %booking.id, error = %e, "Email sending failed");
        }
    }

    // The slot snapshot predates the commit; report the seat just taken.
    let mut time_slot = slot;
    time_slot.current_enrollment += 1;

    Ok(BookingConfirmation {
        booking_id: booking.id,
        lessons_remaining,
        booking: BookingWithSlot { booking, time_slot },
    })
}

/// Cancel a booking owned by `customer_email`, restoring its lesson credit.
pub async fn cancel_booking(
    store: &dyn RecordStore,
    request: CancelBookingRequest,
) -> Result<CancellationReceipt> {
    request.validate()?;
    let booking_id = required(request.booking_id)?;
    let customer_email = required(request.customer_email)?;
    let booking_id = Uuid::parse_str(booking_id.trim()).map_err(|_| Error::BookingNotFound)?;

    store
        .find_customer_booking(booking_id, &customer_email)
        .await?
        .ok_or(Error::BookingNotFound)?;

    let cancelled = store
        .cancel_booking(booking_id, &customer_email)
        .await
        .inspect_err(|e| error!(booking_id = %booking_id, error = %e, "Booking deletion failed"))?
        .ok_or(Error::BookingNotFound)?;

    let booking = cancelled.booking;
    match cancelled.lessons_remaining {
        Some(remaining) => info!(
            booking_id = %booking.id,
            package_code = %booking.package_code,
            lessons_remaining = remaining,
            "Booking cancelled"
        ),
        None => warn!(
            booking_id = %booking.id,
            package_code = %booking.package_code,
            "Booking cancelled but package no longer exists; no lesson restored"
        ),
    }

    Ok(CancellationReceipt {
        message: "Booking cancelled successfully".to_string(),
        cancelled_booking: CancelledBookingSummary {
            id: booking.id,
            package_code: booking.package_code,
            time_slot_id: booking.time_slot_id,
        },
    })
}
