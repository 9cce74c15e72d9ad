use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Url;
use serde::Deserialize;
use tracing::debug;

use configs::PaymentConfig;
use models::PaymentRecord;

use super::{PaymentError, PaymentProvider};
use crate::trial::now_ms;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// User payload of the provider's `api/v2/user` endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserResponse {
    #[serde(default)]
    paid_at: Option<DateTime<Utc>>,
    installed_at: DateTime<Utc>,
    #[serde(default)]
    trial_started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    subscription_status: Option<String>,
}

impl From<UserResponse> for PaymentRecord {
    fn from(user: UserResponse) -> Self {
        let lapsed = matches!(user.subscription_status.as_deref(), Some("past_due" | "canceled"));
        PaymentRecord {
            paid: user.paid_at.is_some() && !lapsed,
            paid_at: user.paid_at.map(|t| t.timestamp_millis()),
            installed_at: user.installed_at.timestamp_millis(),
            trial_started_at: user.trial_started_at.map(|t| t.timestamp_millis()),
        }
    }
}

/// HTTP client for the hosted ExtensionPay API.
pub struct ExtPayClient {
    http: reqwest::Client,
    extension_url: String,
    api_key: Option<String>,
}

impl ExtPayClient {
    pub fn new(cfg: &PaymentConfig) -> Result<Self, PaymentError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| PaymentError::Network(e.to_string()))?;
        Ok(Self {
            http,
            extension_url: format!("{}/extension/{}", cfg.api_base, cfg.extension_id),
            api_key: cfg.api_key.clone(),
        })
    }

    fn page(&self, path: &str, extra: &[(&str, &str)]) -> String {
        let base = format!("{}/{}", self.extension_url, path);
        let mut query: Vec<(&str, &str)> = Vec::new();
        if let Some(key) = self.api_key.as_deref() {
            query.push(("api_key", key));
        }
        query.extend_from_slice(extra);
        if query.is_empty() {
            return base;
        }
        match Url::parse_with_params(&base, &query) {
            Ok(url) => url.to_string(),
            Err(_) => base,
        }
    }
}

#[async_trait]
impl PaymentProvider for ExtPayClient {
    async fn fetch_user(&self) -> Result<PaymentRecord, PaymentError> {
        // Without a key the provider has never seen this install.
        let Some(key) = self.api_key.as_deref() else {
            return Ok(PaymentRecord { paid: false, paid_at: None, installed_at: now_ms(), trial_started_at: None });
        };
        let res = self
            .http
            .get(format!("{}/api/v2/user", self.extension_url))
            .query(&[("api_key", key)])
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| PaymentError::Network(e.to_string()))?;
        if !res.status().is_success() {
            return Err(PaymentError::Status(res.status().as_u16()));
        }
        let user: UserResponse = res.json().await.map_err(|e| PaymentError::Parse(e.to_string()))?;
        debug!(?user, "payment provider user");
        Ok(user.into())
    }

    fn trial_page_url(&self, period: &str) -> String {
        self.page("trial", &[("period", period)])
    }

    fn payment_page_url(&self) -> String {
        self.page("choose-plan", &[])
    }

    fn login_page_url(&self) -> String {
        self.page("reactivate", &[])
    }
}
