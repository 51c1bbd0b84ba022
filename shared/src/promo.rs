//! Free package issuance through promo codes.
//!
//! Two variants:
//! - admin: any lesson count, unlocked by the fixed admin code
//! - public: a single free lesson, unlocked by a well-formed promo code

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use validator::Validate;

use crate::codes::{generate_package_code, ADMIN_PREFIX, FREE_PREFIX};
use crate::error::required;
use crate::models::{NewPackage, PackageStatus};
use crate::store::{CustomerUpsert, RecordStore};
use crate::{Error, Result};

/// Sentinel unlocking admin packages, compared case-insensitively.
pub const ADMIN_PROMO_CODE: &str = "admin";

const ADMIN_CUSTOMER_NAME: &str = "Admin Package Customer";
const MAX_PROMO_CODE_LEN: usize = 32;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AdminPackageRequest {
    #[validate(required, length(min = 1))]
    pub program: Option<String>,
    #[validate(required, range(min = 1))]
    pub lessons: Option<i32>,
    #[validate(required, length(min = 1))]
    pub customer_email: Option<String>,
    #[validate(required, length(min = 1))]
    pub promo_code: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct FreePackageRequest {
    #[validate(required, length(min = 1))]
    pub program: Option<String>,
    #[validate(required, length(min = 1))]
    pub promo_code: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedPackage {
    pub package_code: String,
    pub message: String,
}

/// Acceptance rules for public promo codes.
#[derive(Debug, Clone, Default)]
pub struct PromoPolicy {
    /// When set, only these codes (case-insensitive) are honoured.
    allowed: Option<Vec<String>>,
}

impl PromoPolicy {
    pub fn new(allowed: Option<Vec<String>>) -> Self {
        Self { allowed }
    }

    /// Parse a comma-separated allow-list, ignoring blank entries.
    pub fn from_list(list: &str) -> Self {
        let codes: Vec<String> = list
            .split(',')
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();
        Self::new(Some(codes))
    }

    /// Returns the normalized code if it may be redeemed.
    pub fn check(&self, code: &str) -> Result<String> {
        let code = code.trim();

        let well_formed = !code.is_empty()
            && code.len() <= MAX_PROMO_CODE_LEN
            && code
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !well_formed {
            return Err(Error::InvalidPromoCode);
        }

        if let Some(allowed) = &self.allowed {
            if !allowed.iter().any(|a| a.eq_ignore_ascii_case(code)) {
                return Err(Error::InvalidPromoCode);
            }
        }

        Ok(code.to_string())
    }
}

/// Mint a paid, zero-cost package of `lessons` credits for an admin.
pub async fn issue_admin_package(
    store: &dyn RecordStore,
    request: AdminPackageRequest,
) -> Result<IssuedPackage> {
    request.validate()?;
    let program = required(request.program)?;
    let lessons = required(request.lessons)?;
    let customer_email = required(request.customer_email)?;
    let promo_code = required(request.promo_code)?;

    if !promo_code.eq_ignore_ascii_case(ADMIN_PROMO_CODE) {
        return Err(Error::InvalidPromoCode);
    }

    let now = Utc::now();
    let package = store
        .insert_package(NewPackage {
            code: generate_package_code(ADMIN_PREFIX, now),
            program,
            lessons,
            amount_paid: 0,
            payment_intent_id: None,
            status: PackageStatus::Paid,
            created_at: now,
        })
        .await?;

    info!(package_code = %package.code, lessons, "Admin package created");

    let upsert = CustomerUpsert {
        email: customer_email,
        name: ADMIN_CUSTOMER_NAME.to_string(),
        phone: None,
        updated_at: now,
    };
    if let Err(e) = store.upsert_customer(upsert).await {
        warn!(package_code = %package.code, error = %e, "Customer upsert failed");
    }

    Ok(IssuedPackage {
        package_code: package.code,
        message: "Admin free package created successfully".to_string(),
    })
}

/// Mint a single free lesson for a public promo code.
pub async fn issue_free_package(
    store: &dyn RecordStore,
    policy: &PromoPolicy,
    request: FreePackageRequest,
) -> Result<IssuedPackage> {
    request.validate()?;
    let program = required(request.program)?;
    let promo_code = policy.check(&required(request.promo_code)?)?;

    let now = Utc::now();
    let package = store
        .insert_package(NewPackage {
            code: generate_package_code(FREE_PREFIX, now),
            program,
            lessons: 1,
            amount_paid: 0,
            payment_intent_id: Some(format!("promo_{}", promo_code)),
            status: PackageStatus::Paid,
            created_at: now,
        })
        .await?;

    info!(package_code = %package.code, promo_code = %promo_code, "Free package created");

    Ok(IssuedPackage {
        package_code: package.code,
        message: "Free lesson package created successfully".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::respond;
    use crate::memory::{InMemoryRecordStore, StoreOp};

    fn admin_request(promo_code: &str, lessons: i32) -> AdminPackageRequest {
        AdminPackageRequest {
            program: Some("Private Lessons".to_string()),
            lessons: Some(lessons),
            customer_email: Some("pat@example.com".to_string()),
            promo_code: Some(promo_code.to_string()),
        }
    }

    fn free_request(program: &str, promo_code: &str) -> FreePackageRequest {
        FreePackageRequest {
            program: Some(program.to_string()),
            promo_code: Some(promo_code.to_string()),
        }
    }

    #[tokio::test]
    async fn test_admin_package_any_case() {
        let store = InMemoryRecordStore::new();

        for code in ["ADMIN", "admin", "Admin"] {
            let issued = issue_admin_package(&store, admin_request(code, 5))
                .await
                .unwrap();
            assert!(issued.package_code.starts_with("ADMIN-"));

            let package = store.package(&issued.package_code).await.unwrap();
            assert_eq!(package.lessons_total, 5);
            assert_eq!(package.lessons_remaining, 5);
            assert_eq!(package.amount_paid, 0);
            assert_eq!(package.status, PackageStatus::Paid);
        }

        let customer = store.customer("pat@example.com").await.unwrap();
        assert_eq!(customer.name, ADMIN_CUSTOMER_NAME);
    }

    #[tokio::test]
    async fn test_admin_package_wrong_code() {
        let store = InMemoryRecordStore::new();

        let result = issue_admin_package(&store, admin_request("wrong", 5)).await;

        assert!(matches!(result, Err(Error::InvalidPromoCode)));
    }

    #[tokio::test]
    async fn test_admin_package_missing_fields() {
        let store = InMemoryRecordStore::new();
        let mut request = admin_request("admin", 5);
        request.customer_email = None;

        let result = issue_admin_package(&store, request).await;

        match result {
            Err(Error::Validation(msg)) => assert_eq!(msg, "Missing required fields"),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_admin_package_rejects_non_positive_lessons() {
        let store = InMemoryRecordStore::new();

        let result = issue_admin_package(&store, admin_request("admin", 0)).await;

        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[tokio::test]
    async fn test_admin_package_survives_customer_failure() {
        let store = InMemoryRecordStore::new();
        store.fail_on(StoreOp::UpsertCustomer).await;

        let issued = issue_admin_package(&store, admin_request("admin", 3))
            .await
            .unwrap();

        assert!(store.package(&issued.package_code).await.is_some());
    }

    #[tokio::test]
    async fn test_free_package() {
        let store = InMemoryRecordStore::new();

        let issued = issue_free_package(&store, &PromoPolicy::default(), free_request("X", "SUMMER10"))
            .await
            .unwrap();

        assert!(issued.package_code.starts_with("FREE-"));
        let package = store.package(&issued.package_code).await.unwrap();
        assert_eq!(package.program, "X");
        assert_eq!(package.lessons_total, 1);
        assert_eq!(package.lessons_remaining, 1);
        assert_eq!(package.amount_paid, 0);
        assert!(package.payment_intent_id.unwrap().contains("SUMMER10"));
        // No customer record for the public variant.
        assert!(store.customer("pat@example.com").await.is_none());
    }

    #[tokio::test]
    async fn test_free_package_store_failure() {
        let store = InMemoryRecordStore::new();
        store.fail_on(StoreOp::InsertPackage).await;

        let result =
            issue_free_package(&store, &PromoPolicy::default(), free_request("X", "SUMMER10")).await;

        assert_eq!(result.unwrap_err().status_code(), 500);
    }

    #[test]
    fn test_policy_format() {
        let policy = PromoPolicy::default();

        assert_eq!(policy.check("  SUMMER10 ").unwrap(), "SUMMER10");
        assert!(policy.check("spring_2026-a").is_ok());
        assert!(matches!(policy.check("   "), Err(Error::InvalidPromoCode)));
        assert!(matches!(policy.check("DROP TABLE"), Err(Error::InvalidPromoCode)));
        assert!(matches!(policy.check(&"A".repeat(33)), Err(Error::InvalidPromoCode)));
    }

    #[test]
    fn test_policy_allow_list() {
        let policy = PromoPolicy::from_list("SUMMER10, winter5,,");

        assert!(policy.check("summer10").is_ok());
        assert!(policy.check("WINTER5").is_ok());
        assert!(matches!(policy.check("SPRING"), Err(Error::InvalidPromoCode)));
    }

    #[tokio::test]
    async fn test_issued_package_wire_shape() {
        let store = InMemoryRecordStore::new();
        let issued = issue_free_package(&store, &PromoPolicy::default(), free_request("X", "SUMMER10"))
            .await
            .unwrap();
        let code = issued.package_code.clone();

        let response = respond(Ok(issued), "Failed to create free package").unwrap();
        let body: serde_json::Value = serde_json::from_slice(response.body().as_ref()).unwrap();

        assert_eq!(response.status(), 200);
        assert_eq!(body["success"], true);
        assert_eq!(body["packageCode"], code);
        assert_eq!(body["message"], "Free lesson package created successfully");
        assert!(body.get("package_code").is_none());
    }
}
