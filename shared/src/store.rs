//! Record store abstraction over packages, time slots, bookings and customers.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{
    Booking, CancelledBooking, Customer, NewBooking, NewPackage, Package, TimeSlot,
};
use crate::Result;

/// Persistence operations used by the booking handlers.
///
/// Implementations must be thread-safe (Send + Sync). Counter bookkeeping
/// (`current_enrollment`, `lessons_remaining`) happens only inside
/// [`RecordStore::commit_booking`] and [`RecordStore::cancel_booking`], each of
/// which is atomic.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetches a package by its code.
    async fn get_package(&self, code: &str) -> Result<Option<Package>>;

    /// Fetches only the current remaining-lesson count of a package.
    async fn lessons_remaining(&self, code: &str) -> Result<Option<i32>>;

    /// Inserts a new package. Fails if the code is already taken.
    async fn insert_package(&self, package: NewPackage) -> Result<Package>;

    async fn get_time_slot(&self, id: Uuid) -> Result<Option<TimeSlot>>;

    /// Looks up a booking by its (slot, package, email) triple.
    async fn find_booking(
        &self,
        time_slot_id: Uuid,
        package_code: &str,
        customer_email: &str,
    ) -> Result<Option<Booking>>;

    /// Looks up a booking by id, only if it belongs to `customer_email`.
    async fn find_customer_booking(
        &self,
        booking_id: Uuid,
        customer_email: &str,
    ) -> Result<Option<Booking>>;

    /// Inserts a confirmed booking, taking one seat and one lesson credit.
    ///
    /// Capacity, remaining lessons and uniqueness are re-checked under lock, so
    /// this fails with `SlotFull`, `NoLessonsRemaining`, `DuplicateBooking`,
    /// `InvalidTimeSlot` or `PackageNotFound` without writing anything.
    async fn commit_booking(&self, booking: NewBooking) -> Result<Booking>;

    /// Deletes an owned booking, releasing its seat and restoring its credit.
    ///
    /// Returns `None` if no booking matches both id and email.
    async fn cancel_booking(
        &self,
        booking_id: Uuid,
        customer_email: &str,
    ) -> Result<Option<CancelledBooking>>;

    /// Inserts or updates a customer keyed by email.
    async fn upsert_customer(&self, customer: CustomerUpsert) -> Result<Customer>;
}

/// Customer details to write on upsert.
///
/// A `None` phone leaves an existing phone number untouched.
#[derive(Debug, Clone)]
pub struct CustomerUpsert {
    pub email: String,
    pub name: String,
    pub phone: Option<String>,
    pub updated_at: DateTime<Utc>,
}
