//! Usage analytics over the GA4 measurement protocol.
//!
//! Events are fire-and-forget: [`Analytics::track`] never blocks or fails the
//! caller. The client id lives in the synced tier, the session in the local
//! tier; both are cached for the lifetime of the process.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::{debug, error};
use uuid::Uuid;

use configs::AnalyticsConfig;
use models::session::{ClientIdAndSession, Session};

use crate::config::ConfigStore;
use crate::errors::ServiceError;
use crate::observability::ANALYTICS_FAILURES_TOTAL;
use crate::trial::now_ms;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalyticsEvent {
    Exception,
    PageView,
    BeginCheckout,
    Initialize,
    Play,
    Dismiss,
    UpdatePrefs,
    SwitchConfig,
    DisableConfig,
    ModifyConfig,
    KeyboardCommand,
}

impl AnalyticsEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalyticsEvent::Exception => "exception",
            AnalyticsEvent::PageView => "page_view",
            AnalyticsEvent::BeginCheckout => "begin_checkout",
            AnalyticsEvent::Initialize => "initialize",
            AnalyticsEvent::Play => "play",
            AnalyticsEvent::Dismiss => "dismiss",
            AnalyticsEvent::UpdatePrefs => "update_prefs",
            AnalyticsEvent::SwitchConfig => "switch_config",
            AnalyticsEvent::DisableConfig => "disable_config",
            AnalyticsEvent::ModifyConfig => "modify_config",
            AnalyticsEvent::KeyboardCommand => "keyboard_command",
        }
    }
}

/// Sink for usage events. Implementations must not block the caller.
pub trait Analytics: Send + Sync {
    /// `params` is expected to be a JSON object; anything else is sent without params.
    fn track(&self, event: AnalyticsEvent, params: Value);
}

#[derive(Debug, thiserror::Error)]
pub enum AnalyticsError {
    #[error("analytics request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("analytics endpoint returned HTTP {0}")]
    Status(u16),
    #[error(transparent)]
    Storage(#[from] ServiceError),
}

#[derive(Debug, Serialize)]
struct EventData<'a> {
    name: &'a str,
    params: Map<String, Value>,
}

#[derive(Debug, Serialize)]
struct PostBody<'a> {
    client_id: &'a str,
    events: Vec<EventData<'a>>,
}

/// Measurement protocol client backed by [`ConfigStore`] for its ids.
#[derive(Clone)]
pub struct MeasurementClient {
    inner: Arc<Inner>,
}

struct Inner {
    http: reqwest::Client,
    cfg: AnalyticsConfig,
    store: ConfigStore,
    ids: Mutex<Option<ClientIdAndSession>>,
}

impl MeasurementClient {
    pub fn new(cfg: AnalyticsConfig, store: ConfigStore) -> Result<Self, AnalyticsError> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { inner: Arc::new(Inner { http, cfg, store, ids: Mutex::new(None) }) })
    }

    /// Resolve the client id and a live session, creating and persisting whichever is missing or stale.
    pub async fn client_id_and_session(&self) -> Result<ClientIdAndSession, AnalyticsError> {
        let inner = &self.inner;
        let mut cached = inner.ids.lock().await;
        let now = now_ms();
        let timeout_ms = i64::try_from(inner.cfg.session_timeout_secs.saturating_mul(1000)).unwrap_or(i64::MAX);

        let client_id = match cached.as_ref() {
            Some(ids) => ids.client_id.clone(),
            None => match inner.store.client_id().await? {
                Some(cid) => cid,
                None => {
                    let cid = Uuid::new_v4().to_string();
                    inner.store.store_client_id(&cid).await?;
                    cid
                }
            },
        };
        let known = match cached.as_ref() {
            Some(ids) => Some(ids.session.clone()),
            None => inner.store.session().await?,
        };
        let session = match known {
            Some(session) if !session.is_expired(now, timeout_ms) => session,
            _ => {
                let session = Session { start_ms: now, session_id: Uuid::new_v4().to_string() };
                inner.store.store_session(&session).await?;
                session
            }
        };

        let ids = ClientIdAndSession { client_id, session };
        *cached = Some(ids.clone());
        Ok(ids)
    }

    /// Send one event and wait for the endpoint to accept it.
    pub async fn post(&self, event: AnalyticsEvent, params: Value) -> Result<(), AnalyticsError> {
        let inner = &self.inner;
        let Some(secret) = inner.cfg.api_secret.as_deref() else {
            error!(event = event.as_str(), "missing analytics api secret; dropping event");
            return Ok(());
        };

        let ids = self.client_id_and_session().await?;
        let now = now_ms();
        let params = self.event_params(event, params, &ids.session, now);
        debug!(event = event.as_str(), ?params, "analytics event");

        // session start moves with every event so it expires only after inactivity
        let touched = Session { start_ms: now, ..ids.session.clone() };
        inner.store.store_session(&touched).await?;
        if let Some(cached) = inner.ids.lock().await.as_mut() {
            cached.session = touched;
        }

        let body = PostBody { client_id: &ids.client_id, events: vec![EventData { name: event.as_str(), params }] };
        let res = inner
            .http
            .post(&inner.cfg.endpoint)
            .query(&[("measurement_id", inner.cfg.measurement_id.as_str()), ("api_secret", secret)])
            .json(&body)
            .send()
            .await?;
        if !res.status().is_success() {
            return Err(AnalyticsError::Status(res.status().as_u16()));
        }
        Ok(())
    }

    fn event_params(&self, event: AnalyticsEvent, params: Value, session: &Session, now: i64) -> Map<String, Value> {
        let mut out = match params {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        out.insert("engagement_time_msec".into(), Value::from((now - session.start_ms).to_string()));
        out.insert("session_id".into(), Value::from(session.session_id.clone()));
        if event == AnalyticsEvent::PageView {
            let path = out.get("page_location").and_then(Value::as_str).unwrap_or_default();
            let location = format!("{}{}", self.inner.cfg.page_location_base, path);
            out.insert("page_location".into(), Value::from(location));
        }
        out
    }
}

impl Analytics for MeasurementClient {
    fn track(&self, event: AnalyticsEvent, params: Value) {
        let client = self.clone();
        common::tasks::spawn_detached("analytics", async move {
            client.post(event, params).await.map_err(|e| {
                ANALYTICS_FAILURES_TOTAL.inc();
                e
            })
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryBackend, StorageTier, TieredStore};
    use serde_json::json;

    fn client(secret: Option<&str>) -> (MeasurementClient, ConfigStore) {
        let store = ConfigStore::new(TieredStore::new(
            MemoryBackend::new(StorageTier::Sync),
            MemoryBackend::new(StorageTier::Local),
        ));
        let cfg = AnalyticsConfig { api_secret: secret.map(str::to_owned), ..AnalyticsConfig::default() };
        (MeasurementClient::new(cfg, store.clone()).unwrap(), store)
    }

    #[tokio::test]
    async fn ids_are_created_once_and_persisted() {
        let (client, store) = client(None);
        let first = client.client_id_and_session().await.unwrap();
        let second = client.client_id_and_session().await.unwrap();
        assert_eq!(first, second);
        assert_eq!(store.client_id().await.unwrap(), Some(first.client_id.clone()));
        assert_eq!(store.session().await.unwrap(), Some(first.session));
    }

    #[tokio::test]
    async fn stale_session_is_replaced() {
        let (client, store) = client(None);
        store.store_client_id("cid-1").await.unwrap();
        let stale = Session { start_ms: now_ms() - 31 * 60 * 1000, session_id: "old".into() };
        store.store_session(&stale).await.unwrap();

        let ids = client.client_id_and_session().await.unwrap();
        assert_eq!(ids.client_id, "cid-1");
        assert_ne!(ids.session.session_id, "old");
    }

    #[tokio::test]
    async fn missing_secret_drops_event_without_touching_storage() {
        let (client, store) = client(None);
        client.post(AnalyticsEvent::Play, json!({"gameName": "Halo"})).await.unwrap();
        assert_eq!(store.client_id().await.unwrap(), None);
    }

    #[test]
    fn page_views_get_the_extension_prefix() {
        let (client, _) = client(Some("secret"));
        let session = Session { start_ms: 1_000, session_id: "s-1".into() };
        let params = client.event_params(AnalyticsEvent::PageView, json!({"page_location": "/popup"}), &session, 1_500);
        assert_eq!(params["page_location"], json!("https://davididol.com/xcloud-keyboard-mouse/EXT/popup"));
        assert_eq!(params["engagement_time_msec"], json!("500"));
        assert_eq!(params["session_id"], json!("s-1"));
    }
}
