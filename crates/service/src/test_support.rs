//! In-memory collaborators for tests of this crate and of the transports built on it.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use models::messages::OutboundMessage;
use models::PaymentRecord;

use crate::analytics::{Analytics, AnalyticsEvent};
use crate::bridge::PageBridge;
use crate::config::ConfigStore;
use crate::payment::{PaymentError, PaymentProvider};
use crate::storage::{JsonMapStore, MemoryBackend, QuotaLimits, StorageError, StorageTier, TieredStore};

/// Config store over two fresh in-memory tiers, returned with both tiers for inspection.
pub fn memory_store() -> (ConfigStore, Arc<MemoryBackend>, Arc<MemoryBackend>) {
    let sync = MemoryBackend::new(StorageTier::Sync);
    let local = MemoryBackend::new(StorageTier::Local);
    (ConfigStore::new(TieredStore::new(sync.clone(), local.clone())), sync, local)
}

/// Config store over JSON file tiers in `dir`; the synced tier enforces `limits`.
pub async fn quota_store(dir: &Path, limits: QuotaLimits) -> Result<ConfigStore, StorageError> {
    let sync = JsonMapStore::open(dir.join("sync.json"), StorageTier::Sync, Some(limits)).await?;
    let local = JsonMapStore::open(dir.join("local.json"), StorageTier::Local, None).await?;
    Ok(ConfigStore::new(TieredStore::new(sync, local)))
}

#[derive(Default)]
pub struct RecordingAnalytics {
    events: Mutex<Vec<(AnalyticsEvent, Value)>>,
}

impl RecordingAnalytics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<(AnalyticsEvent, Value)> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.events().iter().map(|(e, _)| e.as_str()).collect()
    }
}

impl Analytics for RecordingAnalytics {
    fn track(&self, event: AnalyticsEvent, params: Value) {
        if let Ok(mut events) = self.events.lock() {
            events.push((event, params));
        }
    }
}

/// Provider that always answers with the same record, or always fails.
pub struct StaticPaymentProvider {
    record: Mutex<Option<PaymentRecord>>,
    fetches: AtomicUsize,
}

impl StaticPaymentProvider {
    pub fn new(record: PaymentRecord) -> Arc<Self> {
        Arc::new(Self { record: Mutex::new(Some(record)), fetches: AtomicUsize::new(0) })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self { record: Mutex::new(None), fetches: AtomicUsize::new(0) })
    }

    pub fn set_record(&self, record: Option<PaymentRecord>) {
        if let Ok(mut r) = self.record.lock() {
            *r = record;
        }
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentProvider for StaticPaymentProvider {
    async fn fetch_user(&self) -> Result<PaymentRecord, PaymentError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let record = self.record.lock().map_err(|e| PaymentError::Network(e.to_string()))?.clone();
        record.ok_or_else(|| PaymentError::Network("provider offline".into()))
    }

    fn trial_page_url(&self, period: &str) -> String {
        format!("https://pay.test/trial?period={period}")
    }

    fn payment_page_url(&self) -> String {
        "https://pay.test/choose-plan".into()
    }

    fn login_page_url(&self) -> String {
        "https://pay.test/reactivate".into()
    }
}

#[derive(Default)]
pub struct RecordingBridge {
    pages: Mutex<Vec<OutboundMessage>>,
    popup: Mutex<Vec<OutboundMessage>>,
    enabled_tabs: Mutex<BTreeSet<u32>>,
    opened: Mutex<Vec<String>>,
}

impl RecordingBridge {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn page_messages(&self) -> Vec<OutboundMessage> {
        self.pages.lock().map(|m| m.clone()).unwrap_or_default()
    }

    pub fn popup_messages(&self) -> Vec<OutboundMessage> {
        self.popup.lock().map(|m| m.clone()).unwrap_or_default()
    }

    pub fn enabled_tabs(&self) -> Vec<u32> {
        self.enabled_tabs.lock().map(|t| t.iter().copied().collect()).unwrap_or_default()
    }

    pub fn opened_urls(&self) -> Vec<String> {
        self.opened.lock().map(|o| o.clone()).unwrap_or_default()
    }
}

impl PageBridge for RecordingBridge {
    fn send_to_pages(&self, msg: &OutboundMessage) -> usize {
        match self.pages.lock() {
            Ok(mut pages) => {
                pages.push(msg.clone());
                1
            }
            Err(_) => 0,
        }
    }

    fn send_to_popup(&self, msg: &OutboundMessage) -> bool {
        self.popup.lock().map(|mut p| p.push(msg.clone())).is_ok()
    }

    fn enable_action_button(&self, tab_id: u32) {
        if let Ok(mut tabs) = self.enabled_tabs.lock() {
            tabs.insert(tab_id);
        }
    }

    fn open_url(&self, url: &str) {
        if let Ok(mut opened) = self.opened.lock() {
            opened.push(url.to_string());
        }
    }
}
