//! Process-wide state built once per Lambda cold start.

use std::sync::Arc;

use tracing::{info, warn};

use crate::notifier::{Notifier, SesNotifier};
use crate::postgres::PgRecordStore;
use crate::promo::PromoPolicy;
use crate::store::RecordStore;
use crate::{db, fetch_database_credentials, Config, Error, Result};

/// Application state shared across requests.
pub struct AppState {
    pub store: Arc<dyn RecordStore>,
    pub notifier: Option<Arc<dyn Notifier>>,
    pub promo_policy: PromoPolicy,
}

impl AppState {
    pub fn new(
        store: Arc<dyn RecordStore>,
        notifier: Option<Arc<dyn Notifier>>,
        promo_policy: PromoPolicy,
    ) -> Self {
        Self {
            store,
            notifier,
            promo_policy,
        }
    }

    /// Connect to the database and AWS services described by the environment.
    pub async fn from_env() -> Result<Self> {
        let config = Config::from_env().map_err(|e| Error::Config(e.to_string()))?;

        let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        let secrets_client = aws_sdk_secretsmanager::Client::new(&aws_config);

        let credentials = fetch_database_credentials(&secrets_client, &config.db_secret_arn).await?;
        let pool = db::create_pool(&config, &credentials).await?;

        let notifier: Option<Arc<dyn Notifier>> = match &config.from_email {
            Some(from_email) => Some(Arc::new(SesNotifier::new(
                aws_sdk_ses::Client::new(&aws_config),
                from_email.clone(),
                config.business_email.clone(),
            ))),
            None => {
                warn!("FROM_EMAIL not set, booking confirmations disabled");
                None
            }
        };

        let promo_policy = config
            .promo_codes
            .as_deref()
            .map(PromoPolicy::from_list)
            .unwrap_or_default();

        info!(db_host = %config.db_host, region = %config.aws_region, "Application state initialized");

        Ok(Self::new(
            Arc::new(PgRecordStore::new(pool)),
            notifier,
            promo_policy,
        ))
    }

    pub fn notifier(&self) -> Option<&dyn Notifier> {
        self.notifier.as_deref()
    }
}
