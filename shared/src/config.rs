//! Configuration management for Lambda functions.

use std::env;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Database host
    pub db_host: String,
    /// Database name
    pub db_name: String,
    /// ARN of the secret containing database credentials
    pub db_secret_arn: String,
    /// AWS region
    pub aws_region: String,
    /// Sender for confirmation emails; notifications are off when unset
    pub from_email: Option<String>,
    /// Receives a copy of every booking confirmation
    pub business_email: Option<String>,
    /// Comma-separated allow-list for public promo codes
    pub promo_codes: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, env::VarError> {
        Ok(Self {
            db_host: env::var("DATABASE_HOST")?,
            db_name: env::var("DATABASE_NAME").unwrap_or_else(|_| "lessons".to_string()),
            db_secret_arn: env::var("DATABASE_URL_SECRET_ARN")?,
            aws_region: env::var("AWS_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
            from_email: non_empty(env::var("FROM_EMAIL").ok()),
            business_email: non_empty(env::var("BUSINESS_EMAIL").ok()),
            promo_codes: non_empty(env::var("PROMO_CODES").ok()),
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
