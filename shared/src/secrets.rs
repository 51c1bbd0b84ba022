//! Database credentials stored in AWS Secrets Manager.

use aws_sdk_secretsmanager::Client as SecretsClient;
use serde::Deserialize;

use crate::{Error, Result};

/// The JSON document RDS keeps in a database secret.
///
/// `host`, `port` and `dbname` override the environment configuration when
/// the secret carries them.
#[derive(Debug, Deserialize)]
pub struct DatabaseCredentials {
    pub username: String,
    pub password: String,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub dbname: Option<String>,
}

impl DatabaseCredentials {
    pub fn from_secret_string(secret: &str) -> Result<Self> {
        serde_json::from_str(secret)
            .map_err(|e| Error::Config(format!("Malformed database secret: {}", e)))
    }
}

/// Fetch and parse the database secret. Called once per cold start.
pub async fn fetch_database_credentials(
    client: &SecretsClient,
    secret_arn: &str,
) -> Result<DatabaseCredentials> {
    let response = client
        .get_secret_value()
        .secret_id(secret_arn)
        .send()
        .await
        .map_err(|e| Error::Aws(format!("Failed to get database secret: {}", e)))?;

    let secret = response
        .secret_string()
        .ok_or_else(|| Error::Config(format!("Secret {} has no string value", secret_arn)))?;

    DatabaseCredentials::from_secret_string(secret)
}
