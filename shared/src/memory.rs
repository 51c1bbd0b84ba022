//! In-memory record store used by tests.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{
    Booking, BookingStatus, CancelledBooking, Customer, NewBooking, NewPackage, Package,
    TimeSlot,
};
use crate::store::{CustomerUpsert, RecordStore};
use crate::{Error, Result};

/// Store operations that can be made to fail on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    GetPackage,
    LessonsRemaining,
    InsertPackage,
    GetTimeSlot,
    FindBooking,
    FindCustomerBooking,
    CommitBooking,
    CancelBooking,
    UpsertCustomer,
}

#[derive(Default)]
struct Tables {
    packages: HashMap<String, Package>,
    time_slots: HashMap<Uuid, TimeSlot>,
    bookings: Vec<Booking>,
    customers: HashMap<String, Customer>,
}

/// In-memory record store for tests and local runs.
///
/// Every compound write happens under a single write lock, giving the same
/// all-or-nothing behaviour as the PostgreSQL transactions.
#[derive(Clone, Default)]
pub struct InMemoryRecordStore {
    tables: Arc<RwLock<Tables>>,
    failing: Arc<RwLock<HashSet<StoreOp>>>,
}

impl InMemoryRecordStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every later call of `op` fail with a database error.
    pub async fn fail_on(&self, op: StoreOp) {
        self.failing.write().await.insert(op);
    }

    pub async fn put_package(&self, package: Package) {
        self.tables
            .write()
            .await
            .packages
            .insert(package.code.clone(), package);
    }

    pub async fn put_time_slot(&self, slot: TimeSlot) {
        self.tables.write().await.time_slots.insert(slot.id, slot);
    }

    pub async fn bookings(&self) -> Vec<Booking> {
        self.tables.read().await.bookings.clone()
    }

    pub async fn customer(&self, email: &str) -> Option<Customer> {
        self.tables.read().await.customers.get(email).cloned()
    }

    pub async fn package(&self, code: &str) -> Option<Package> {
        self.tables.read().await.packages.get(code).cloned()
    }

    pub async fn time_slot(&self, id: Uuid) -> Option<TimeSlot> {
        self.tables.read().await.time_slots.get(&id).cloned()
    }

    async fn check(&self, op: StoreOp) -> Result<()> {
        if self.failing.read().await.contains(&op) {
            return Err(Error::Database(sqlx::Error::Protocol(format!(
                "injected failure: {:?}",
                op
            ))));
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn get_package(&self, code: &str) -> Result<Option<Package>> {
        self.check(StoreOp::GetPackage).await?;
        Ok(self.tables.read().await.packages.get(code).cloned())
    }

    async fn lessons_remaining(&self, code: &str) -> Result<Option<i32>> {
        self.check(StoreOp::LessonsRemaining).await?;
        Ok(self
            .tables
            .read()
            .await
            .packages
            .get(code)
            .map(|p| p.lessons_remaining))
    }

    async fn insert_package(&self, package: NewPackage) -> Result<Package> {
        self.check(StoreOp::InsertPackage).await?;
        let mut tables = self.tables.write().await;

        if tables.packages.contains_key(&package.code) {
            return Err(Error::Database(sqlx::Error::Protocol(format!(
                "duplicate package code: {}",
                package.code
            ))));
        }

        let record = Package {
            code: package.code,
            program: package.program,
            lessons_total: package.lessons,
            lessons_remaining: package.lessons,
            amount_paid: package.amount_paid,
            payment_intent_id: package.payment_intent_id,
            status: package.status,
            created_at: package.created_at,
        };
        tables.packages.insert(record.code.clone(), record.clone());
        Ok(record)
    }

    async fn get_time_slot(&self, id: Uuid) -> Result<Option<TimeSlot>> {
        self.check(StoreOp::GetTimeSlot).await?;
        Ok(self.tables.read().await.time_slots.get(&id).cloned())
    }

    async fn find_booking(
        &self,
        time_slot_id: Uuid,
        package_code: &str,
        customer_email: &str,
    ) -> Result<Option<Booking>> {
        self.check(StoreOp::FindBooking).await?;
        Ok(self
            .tables
            .read()
            .await
            .bookings
            .iter()
            .find(|b| {
                b.time_slot_id == time_slot_id
                    && b.package_code == package_code
                    && b.customer_email == customer_email
            })
            .cloned())
    }

    async fn find_customer_booking(
        &self,
        booking_id: Uuid,
        customer_email: &str,
    ) -> Result<Option<Booking>> {
        self.check(StoreOp::FindCustomerBooking).await?;
        Ok(self
            .tables
            .read()
            .await
            .bookings
            .iter()
            .find(|b| b.id == booking_id && b.customer_email == customer_email)
            .cloned())
    }

    async fn commit_booking(&self, booking: NewBooking) -> Result<Booking> {
        self.check(StoreOp::CommitBooking).await?;
        let mut guard = self.tables.write().await;
        let tables = &mut *guard;

        let package = tables
            .packages
            .get_mut(&booking.package_code)
            .ok_or_else(|| Error::PackageNotFound {
                code: booking.package_code.clone(),
            })?;
        let slot = tables
            .time_slots
            .get_mut(&booking.time_slot_id)
            .ok_or(Error::InvalidTimeSlot)?;

        if package.lessons_remaining <= 0 {
            return Err(Error::NoLessonsRemaining);
        }
        if slot.is_full() {
            return Err(Error::SlotFull);
        }
        let duplicate = tables.bookings.iter().any(|b| {
            b.time_slot_id == booking.time_slot_id
                && b.package_code == booking.package_code
                && b.customer_email == booking.customer_email
        });
        if duplicate {
            return Err(Error::DuplicateBooking);
        }

        slot.current_enrollment += 1;
        package.lessons_remaining -= 1;

        let record = Booking {
            id: Uuid::new_v4(),
            time_slot_id: booking.time_slot_id,
            package_code: booking.package_code,
            customer_email: booking.customer_email,
            customer_name: booking.customer_name,
            customer_phone: booking.customer_phone,
            student_name: booking.student_name,
            student_age: booking.student_age,
            notes: booking.notes,
            status: BookingStatus::Confirmed,
            booking_date: booking.booked_at,
            created_at: booking.booked_at,
        };
        tables.bookings.push(record.clone());
        Ok(record)
    }

    async fn cancel_booking(
        &self,
        booking_id: Uuid,
        customer_email: &str,
    ) -> Result<Option<CancelledBooking>> {
        self.check(StoreOp::CancelBooking).await?;
        let mut tables = self.tables.write().await;

        let Some(index) = tables
            .bookings
            .iter()
            .position(|b| b.id == booking_id && b.customer_email == customer_email)
        else {
            return Ok(None);
        };
        let booking = tables.bookings.remove(index);

        if let Some(slot) = tables.time_slots.get_mut(&booking.time_slot_id) {
            slot.current_enrollment = (slot.current_enrollment - 1).max(0);
        }
        let lessons_remaining = tables.packages.get_mut(&booking.package_code).map(|p| {
            p.lessons_remaining = (p.lessons_remaining + 1).min(p.lessons_total);
            p.lessons_remaining
        });

        Ok(Some(CancelledBooking {
            booking,
            lessons_remaining,
        }))
    }

    async fn upsert_customer(&self, customer: CustomerUpsert) -> Result<Customer> {
        self.check(StoreOp::UpsertCustomer).await?;
        let mut tables = self.tables.write().await;

        let phone = match tables.customers.get(&customer.email) {
            Some(existing) => customer.phone.or_else(|| existing.phone.clone()),
            None => customer.phone,
        };
        let record = Customer {
            email: customer.email,
            name: customer.name,
            phone,
            updated_at: customer.updated_at,
        };
        tables.customers.insert(record.email.clone(), record.clone());
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PackageStatus;
    use chrono::Utc;

    fn package(code: &str, remaining: i32) -> Package {
        Package {
            code: code.to_string(),
            program: "Swim".to_string(),
            lessons_total: 4,
            lessons_remaining: remaining,
            amount_paid: 10000,
            payment_intent_id: None,
            status: PackageStatus::Paid,
            created_at: Utc::now(),
        }
    }

    fn slot(capacity: i32, enrolled: i32) -> TimeSlot {
        TimeSlot {
            id: Uuid::new_v4(),
            program: "Swim".to_string(),
            starts_at: Utc::now(),
            ends_at: Utc::now(),
            max_capacity: capacity,
            current_enrollment: enrolled,
        }
    }

    fn new_booking(slot_id: Uuid, code: &str) -> NewBooking {
        NewBooking {
            time_slot_id: slot_id,
            package_code: code.to_string(),
            customer_email: "pat@example.com".to_string(),
            customer_name: "Pat".to_string(),
            customer_phone: None,
            student_name: "Sam".to_string(),
            student_age: Some(7),
            notes: None,
            booked_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn commit_booking_moves_both_counters() {
        let store = InMemoryRecordStore::new();
        let slot = slot(2, 0);
        store.put_package(package("PKG", 4)).await;
        store.put_time_slot(slot.clone()).await;

        store.commit_booking(new_booking(slot.id, "PKG")).await.unwrap();

        assert_eq!(store.package("PKG").await.unwrap().lessons_remaining, 3);
        assert_eq!(store.time_slot(slot.id).await.unwrap().current_enrollment, 1);
    }

    #[tokio::test]
    async fn commit_booking_rejects_full_slot_without_writing() {
        let store = InMemoryRecordStore::new();
        let slot = slot(1, 1);
        store.put_package(package("PKG", 4)).await;
        store.put_time_slot(slot.clone()).await;

        let result = store.commit_booking(new_booking(slot.id, "PKG")).await;

        assert!(matches!(result, Err(Error::SlotFull)));
        assert!(store.bookings().await.is_empty());
        assert_eq!(store.package("PKG").await.unwrap().lessons_remaining, 4);
    }

    #[tokio::test]
    async fn concurrent_commits_never_exceed_capacity() {
        let store = InMemoryRecordStore::new();
        let slot = slot(1, 0);
        store.put_package(package("A", 4)).await;
        store.put_package(package("B", 4)).await;
        store.put_time_slot(slot.clone()).await;

        let (a, b) = tokio::join!(
            store.commit_booking(new_booking(slot.id, "A")),
            store.commit_booking(new_booking(slot.id, "B")),
        );

        assert_eq!([a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count(), 1);
        assert_eq!(store.time_slot(slot.id).await.unwrap().current_enrollment, 1);
    }

    #[tokio::test]
    async fn cancel_restores_credit() {
        let store = InMemoryRecordStore::new();
        let slot = slot(2, 0);
        store.put_package(package("PKG", 4)).await;
        store.put_time_slot(slot.clone()).await;
        let booking = store.commit_booking(new_booking(slot.id, "PKG")).await.unwrap();
        assert_eq!(store.package("PKG").await.unwrap().lessons_remaining, 3);

        let cancelled = store
            .cancel_booking(booking.id, "pat@example.com")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(cancelled.lessons_remaining, Some(4));
        assert_eq!(store.time_slot(slot.id).await.unwrap().current_enrollment, 0);
        assert!(store.bookings().await.is_empty());
    }

    #[tokio::test]
    async fn cancel_restores_credit_capped_at_total() {
        let store = InMemoryRecordStore::new();
        let slot = slot(2, 0);
        store.put_package(package("PKG", 4)).await;
        store.put_time_slot(slot.clone()).await;
        let booking = store.commit_booking(new_booking(slot.id, "PKG")).await.unwrap();
        // Credit already back at the total, and the slot already emptied.
        store.put_package(package("PKG", 4)).await;
        store.put_time_slot(slot.clone()).await;

        let cancelled = store
            .cancel_booking(booking.id, "pat@example.com")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(cancelled.lessons_remaining, Some(4));
        assert_eq!(store.package("PKG").await.unwrap().lessons_remaining, 4);
        assert_eq!(store.time_slot(slot.id).await.unwrap().current_enrollment, 0);
    }

    #[tokio::test]
    async fn upsert_keeps_phone_when_absent() {
        let store = InMemoryRecordStore::new();
        let mut upsert = CustomerUpsert {
            email: "pat@example.com".to_string(),
            name: "Pat".to_string(),
            phone: Some("555-0100".to_string()),
            updated_at: Utc::now(),
        };
        store.upsert_customer(upsert.clone()).await.unwrap();

        upsert.name = "Patricia".to_string();
        upsert.phone = None;
        let customer = store.upsert_customer(upsert).await.unwrap();

        assert_eq!(customer.name, "Patricia");
        assert_eq!(customer.phone.as_deref(), Some("555-0100"));
    }
}
