//! Payment state: provider seam plus a process-wide cache.
//!
//! The cached record is reused while the user is paid or inside an active
//! trial; otherwise the provider is asked again before answering. After a
//! restart the cache is rebuilt from the persisted payment blob.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use serde_json::json;
use thiserror::Error;
use tracing::{info, instrument, warn};

use models::{PaymentRecord, TrialState};

use crate::analytics::{Analytics, AnalyticsEvent};
use crate::config::ConfigStore;
use crate::errors::ServiceError;
use crate::observability::PAYMENT_FETCH_TOTAL;
use crate::trial::{now_ms, TrialPolicy};

pub mod extpay;

pub use extpay::ExtPayClient;

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("payment provider unreachable: {0}")]
    Network(String),
    #[error("payment provider returned HTTP {0}")]
    Status(u16),
    #[error("unreadable payment provider response: {0}")]
    Parse(String),
}

/// The hosted payment provider.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    async fn fetch_user(&self) -> Result<PaymentRecord, PaymentError>;
    /// `period` is the human trial length, e.g. `"7 day"`.
    fn trial_page_url(&self, period: &str) -> String;
    fn payment_page_url(&self) -> String;
    fn login_page_url(&self) -> String;
}

/// Provider pages the popup may ask to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentPage {
    Trial,
    Payment,
    Login,
}

impl PaymentPage {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "trial" => Some(PaymentPage::Trial),
            "payment" => Some(PaymentPage::Payment),
            "login" => Some(PaymentPage::Login),
            _ => None,
        }
    }
}

pub struct PaymentService {
    provider: Arc<dyn PaymentProvider>,
    store: ConfigStore,
    analytics: Arc<dyn Analytics>,
    policy: TrialPolicy,
    cached: ArcSwapOption<PaymentRecord>,
}

impl PaymentService {
    pub fn new(
        provider: Arc<dyn PaymentProvider>,
        store: ConfigStore,
        analytics: Arc<dyn Analytics>,
        policy: TrialPolicy,
    ) -> Self {
        Self { provider, store, analytics, policy, cached: ArcSwapOption::empty() }
    }

    pub fn policy(&self) -> TrialPolicy {
        self.policy
    }

    pub fn cached(&self) -> Option<PaymentRecord> {
        self.cached.load_full().map(|p| (*p).clone())
    }

    pub fn trial_state(&self, payment: &PaymentRecord) -> TrialState {
        self.policy.state(payment.trial_started_at, now_ms())
    }

    pub fn is_allowed(&self, payment: &PaymentRecord) -> bool {
        self.policy.is_allowed(payment, now_ms())
    }

    /// Cached record when it still grants access, otherwise a fresh one from the provider.
    pub async fn get_if_needed(&self) -> Result<PaymentRecord, ServiceError> {
        if self.cached.load().is_none() {
            self.seed_from_store().await;
        }
        match self.cached() {
            Some(payment) if self.is_allowed(&payment) => Ok(payment),
            _ => self.refresh().await,
        }
    }

    /// Drop the cached record and ask the provider.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Result<PaymentRecord, ServiceError> {
        match self.provider.fetch_user().await {
            Ok(payment) => {
                PAYMENT_FETCH_TOTAL.with_label_values(&["ok"]).inc();
                self.cached.store(Some(Arc::new(payment.clone())));
                let store = self.store.clone();
                let persisted = payment.clone();
                common::tasks::spawn_detached("persist_payment", async move { store.store_payment(&persisted).await });
                info!(paid = payment.paid, "payment state refreshed");
                Ok(payment)
            }
            Err(e) => {
                PAYMENT_FETCH_TOTAL.with_label_values(&["error"]).inc();
                warn!(error = %e, "payment fetch failed");
                self.analytics.track(AnalyticsEvent::Exception, json!({"description": e.to_string(), "fatal": false}));
                Err(e.into())
            }
        }
    }

    pub fn page_url(&self, page: PaymentPage) -> String {
        match page {
            PaymentPage::Trial => self.provider.trial_page_url(&self.policy.period_label()),
            PaymentPage::Payment => self.provider.payment_page_url(),
            PaymentPage::Login => self.provider.login_page_url(),
        }
    }

    async fn seed_from_store(&self) {
        match self.store.payment().await {
            Ok(Some(payment)) => {
                // another task may have fetched meanwhile; keep the fresher value
                self.cached.compare_and_swap(&None::<Arc<PaymentRecord>>, Some(Arc::new(payment)));
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "could not read persisted payment state"),
        }
    }
}
