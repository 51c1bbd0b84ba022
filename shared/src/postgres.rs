//! PostgreSQL-backed record store.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use crate::models::{
    Booking, BookingStatus, CancelledBooking, Customer, NewBooking, NewPackage, Package,
    TimeSlot,
};
use crate::store::{CustomerUpsert, RecordStore};
use crate::{Error, Result};

const PACKAGE_COLUMNS: &str = "code, program, lessons_total, lessons_remaining, amount_paid, \
     payment_intent_id, status, created_at";

const BOOKING_COLUMNS: &str = "id, time_slot_id, package_code, customer_email, customer_name, \
     customer_phone, student_name, student_age, notes, status, booking_date, created_at";

/// Record store over the `packages`, `time_slots`, `bookings` and `customers` tables.
#[derive(Clone)]
pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn get_package(&self, code: &str) -> Result<Option<Package>> {
        let package = sqlx::query_as::<_, Package>(&format!(
            "SELECT {} FROM packages WHERE code = $1",
            PACKAGE_COLUMNS
        ))
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(package)
    }

    async fn lessons_remaining(&self, code: &str) -> Result<Option<i32>> {
        let remaining: Option<i32> =
            sqlx::query_scalar("SELECT lessons_remaining FROM packages WHERE code = $1")
                .bind(code)
                .fetch_optional(&self.pool)
                .await?;

        Ok(remaining)
    }

    async fn insert_package(&self, package: NewPackage) -> Result<Package> {
        let record = sqlx::query_as::<_, Package>(&format!(
            r#"
            INSERT INTO packages
                (code, program, lessons_total, lessons_remaining, amount_paid,
                 payment_intent_id, status, created_at)
            VALUES ($1, $2, $3, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            PACKAGE_COLUMNS
        ))
        .bind(&package.code)
        .bind(&package.program)
        .bind(package.lessons)
        .bind(package.amount_paid)
        .bind(&package.payment_intent_id)
        .bind(package.status.as_str())
        .bind(package.created_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(record)
    }

    async fn get_time_slot(&self, id: Uuid) -> Result<Option<TimeSlot>> {
        let slot = sqlx::query_as::<_, TimeSlot>(
            r#"
            SELECT id, program, starts_at, ends_at, max_capacity, current_enrollment
            FROM time_slots
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(slot)
    }

    async fn find_booking(
        &self,
        time_slot_id: Uuid,
        package_code: &str,
        customer_email: &str,
    ) -> Result<Option<Booking>> {
        let booking = sqlx::query_as::<_, Booking>(&format!(
            r#"
            SELECT {}
            FROM bookings
            WHERE time_slot_id = $1 AND package_code = $2 AND customer_email = $3
            "#,
            BOOKING_COLUMNS
        ))
        .bind(time_slot_id)
        .bind(package_code)
        .bind(customer_email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(booking)
    }

    async fn find_customer_booking(
        &self,
        booking_id: Uuid,
        customer_email: &str,
    ) -> Result<Option<Booking>> {
        let booking = sqlx::query_as::<_, Booking>(&format!(
            "SELECT {} FROM bookings WHERE id = $1 AND customer_email = $2",
            BOOKING_COLUMNS
        ))
        .bind(booking_id)
        .bind(customer_email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(booking)
    }

    async fn commit_booking(&self, booking: NewBooking) -> Result<Booking> {
        let mut tx = self.pool.begin().await?;

        // Lock order: package, then slot. Cancellation uses the same order.
        let lessons_remaining: Option<i32> = sqlx::query_scalar(
            "SELECT lessons_remaining FROM packages WHERE code = $1 FOR UPDATE",
        )
        .bind(&booking.package_code)
        .fetch_optional(&mut *tx)
        .await?;

        let lessons_remaining = lessons_remaining.ok_or_else(|| Error::PackageNotFound {
            code: booking.package_code.clone(),
        })?;
        if lessons_remaining <= 0 {
            return Err(Error::NoLessonsRemaining);
        }

        let seats: Option<(i32, i32)> = sqlx::query_as(
            "SELECT max_capacity, current_enrollment FROM time_slots WHERE id = $1 FOR UPDATE",
        )
        .bind(booking.time_slot_id)
        .fetch_optional(&mut *tx)
        .await?;

        let (max_capacity, current_enrollment) = seats.ok_or(Error::InvalidTimeSlot)?;
        if current_enrollment >= max_capacity {
            return Err(Error::SlotFull);
        }

        let record = sqlx::query_as::<_, Booking>(&format!(
            r#"
            INSERT INTO bookings
                (id, time_slot_id, package_code, customer_email, customer_name,
                 customer_phone, student_name, student_age, notes, status,
                 booking_date, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $11)
            ON CONFLICT (time_slot_id, package_code, customer_email) DO NOTHING
            RETURNING {}
            "#,
            BOOKING_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(booking.time_slot_id)
        .bind(&booking.package_code)
        .bind(&booking.customer_email)
        .bind(&booking.customer_name)
        .bind(&booking.customer_phone)
        .bind(&booking.student_name)
        .bind(booking.student_age)
        .bind(&booking.notes)
        .bind(BookingStatus::Confirmed.as_str())
        .bind(booking.booked_at)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(Error::DuplicateBooking)?;

        sqlx::query(
            "UPDATE time_slots SET current_enrollment = current_enrollment + 1 WHERE id = $1",
        )
        .bind(booking.time_slot_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE packages SET lessons_remaining = lessons_remaining - 1 WHERE code = $1",
        )
        .bind(&booking.package_code)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!(booking_id = %record.id, "Booking committed");
        Ok(record)
    }

    async fn cancel_booking(
        &self,
        booking_id: Uuid,
        customer_email: &str,
    ) -> Result<Option<CancelledBooking>> {
        let mut tx = self.pool.begin().await?;

        let owned: Option<String> = sqlx::query_scalar(
            "SELECT package_code FROM bookings WHERE id = $1 AND customer_email = $2",
        )
        .bind(booking_id)
        .bind(customer_email)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(package_code) = owned else {
            return Ok(None);
        };

        let lessons_remaining: Option<i32> = sqlx::query_scalar(
            r#"
            UPDATE packages
            SET lessons_remaining = LEAST(lessons_remaining + 1, lessons_total)
            WHERE code = $1
            RETURNING lessons_remaining
            "#,
        )
        .bind(&package_code)
        .fetch_optional(&mut *tx)
        .await?;

        let deleted = sqlx::query_as::<_, Booking>(&format!(
            "DELETE FROM bookings WHERE id = $1 AND customer_email = $2 RETURNING {}",
            BOOKING_COLUMNS
        ))
        .bind(booking_id)
        .bind(customer_email)
        .fetch_optional(&mut *tx)
        .await?;

        // Deleted concurrently between the ownership read and the delete.
        let Some(booking) = deleted else {
            return Ok(None);
        };

        sqlx::query(
            r#"
            UPDATE time_slots
            SET current_enrollment = GREATEST(current_enrollment - 1, 0)
            WHERE id = $1
            "#,
        )
        .bind(booking.time_slot_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Some(CancelledBooking {
            booking,
            lessons_remaining,
        }))
    }

    async fn upsert_customer(&self, customer: CustomerUpsert) -> Result<Customer> {
        let record = sqlx::query_as::<_, Customer>(
            r#"
            INSERT INTO customers (email, name, phone, updated_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (email) DO UPDATE SET
                name = EXCLUDED.name,
                phone = COALESCE(EXCLUDED.phone, customers.phone),
                updated_at = EXCLUDED.updated_at
            RETURNING email, name, phone, updated_at
            "#,
        )
        .bind(&customer.email)
        .bind(&customer.name)
        .bind(&customer.phone)
        .bind(customer.updated_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(record)
    }
}
