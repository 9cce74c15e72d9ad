use anyhow::anyhow;
use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub analytics: AnalyticsConfig,
    #[serde(default)]
    pub payment: PaymentConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub worker_threads: Option<usize>,
    /// Address of the admin server exposing `/healthz` and `/metrics`.
    #[serde(default = "default_admin_addr")]
    pub admin_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "127.0.0.1".into(), port: 8787, worker_threads: Some(2), admin_addr: default_admin_addr() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_sync_file")]
    pub sync_file: String,
    #[serde(default = "default_local_file")]
    pub local_file: String,
    #[serde(default)]
    pub sync_quota: SyncQuotaConfig,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            sync_file: default_sync_file(),
            local_file: default_local_file(),
            sync_quota: SyncQuotaConfig::default(),
        }
    }
}

/// Limits of the browser's synced storage area.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncQuotaConfig {
    #[serde(default = "default_max_items")]
    pub max_items: usize,
    #[serde(default = "default_max_bytes_per_item")]
    pub max_bytes_per_item: usize,
    #[serde(default = "default_max_writes_per_minute")]
    pub max_writes_per_minute: u64,
}

impl Default for SyncQuotaConfig {
    fn default() -> Self {
        Self {
            max_items: default_max_items(),
            max_bytes_per_item: default_max_bytes_per_item(),
            max_writes_per_minute: default_max_writes_per_minute(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalyticsConfig {
    #[serde(default = "default_analytics_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_measurement_id")]
    pub measurement_id: String,
    /// Measurement protocol secret; filled from `GA_API_TOKEN` when empty.
    #[serde(default)]
    pub api_secret: Option<String>,
    #[serde(default = "default_page_location_base")]
    pub page_location_base: String,
    #[serde(default = "default_session_timeout")]
    pub session_timeout_secs: u64,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            endpoint: default_analytics_endpoint(),
            measurement_id: default_measurement_id(),
            api_secret: None,
            page_location_base: default_page_location_base(),
            session_timeout_secs: default_session_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfig {
    #[serde(default = "default_payment_api_base")]
    pub api_base: String,
    #[serde(default = "default_extension_id")]
    pub extension_id: String,
    /// Per-install key issued by the payment provider; filled from `EXTPAY_API_KEY` when empty.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_trial_days")]
    pub trial_days: u32,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            api_base: default_payment_api_base(),
            extension_id: default_extension_id(),
            api_key: None,
            trial_days: default_trial_days(),
        }
    }
}

fn default_admin_addr() -> String { "127.0.0.1:9188".into() }
fn default_data_dir() -> String { "data".into() }
fn default_sync_file() -> String { "sync.json".into() }
fn default_local_file() -> String { "local.json".into() }
fn default_max_items() -> usize { 512 }
fn default_max_bytes_per_item() -> usize { 8192 }
fn default_max_writes_per_minute() -> u64 { 120 }
fn default_analytics_endpoint() -> String { "https://www.google-analytics.com/mp/collect".into() }
fn default_measurement_id() -> String { "G-DKKYLRVJYT".into() }
fn default_page_location_base() -> String { "https://davididol.com/xcloud-keyboard-mouse/EXT".into() }
fn default_session_timeout() -> u64 { 30 * 60 }
fn default_payment_api_base() -> String { "https://extensionpay.com".into() }
fn default_extension_id() -> String { "keyboard-and-mouse-for-xbox-xcloud".into() }
fn default_trial_days() -> u32 { 7 }

pub fn load_default() -> Result<AppConfig> {
    let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
    load_from_file(&path)
}

pub fn load_from_file(path: &str) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let cfg: AppConfig = toml::from_str(&content)?;
    Ok(cfg)
}

impl AppConfig {
    /// Load `config.toml` (or `CONFIG_PATH`), falling back to defaults when the file is missing.
    pub fn load_and_validate() -> Result<Self> {
        let mut cfg = match load_default() {
            Ok(cfg) => cfg,
            Err(e) if is_not_found(&e) => AppConfig::default(),
            Err(e) => return Err(e),
        };
        cfg.normalize_and_validate()?;
        Ok(cfg)
    }

    pub fn normalize_and_validate(&mut self) -> Result<()> {
        self.server.normalize()?;
        self.storage.validate()?;
        self.analytics.normalize_from_env();
        self.analytics.validate()?;
        self.payment.normalize_from_env();
        self.payment.validate()?;
        Ok(())
    }
}

fn is_not_found(e: &anyhow::Error) -> bool {
    e.downcast_ref::<std::io::Error>()
        .map(|io| io.kind() == std::io::ErrorKind::NotFound)
        .unwrap_or(false)
}

impl ServerConfig {
    fn normalize(&mut self) -> Result<()> {
        if self.host.trim().is_empty() {
            self.host = "127.0.0.1".to_string();
        }
        if self.port == 0 {
            return Err(anyhow!("server.port must be in 1..=65535"));
        }
        if let Some(w) = self.worker_threads {
            if w == 0 { self.worker_threads = Some(2); }
        } else {
            self.worker_threads = Some(2);
        }
        Ok(())
    }
}

impl StorageConfig {
    pub fn sync_path(&self) -> std::path::PathBuf {
        std::path::Path::new(&self.data_dir).join(&self.sync_file)
    }

    pub fn local_path(&self) -> std::path::PathBuf {
        std::path::Path::new(&self.data_dir).join(&self.local_file)
    }

    fn validate(&self) -> Result<()> {
        if self.sync_file == self.local_file {
            return Err(anyhow!("storage.sync_file and storage.local_file must differ"));
        }
        let q = &self.sync_quota;
        if q.max_items == 0 || q.max_bytes_per_item == 0 || q.max_writes_per_minute == 0 {
            return Err(anyhow!("storage.sync_quota limits must be positive"));
        }
        Ok(())
    }
}

impl AnalyticsConfig {
    pub fn normalize_from_env(&mut self) {
        let missing = self.api_secret.as_deref().map(|s| s.trim().is_empty()).unwrap_or(true);
        if missing {
            self.api_secret = std::env::var("GA_API_TOKEN").ok().filter(|s| !s.trim().is_empty());
        }
    }

    fn validate(&self) -> Result<()> {
        let lower = self.endpoint.to_lowercase();
        if !(lower.starts_with("https://") || lower.starts_with("http://")) {
            return Err(anyhow!("analytics.endpoint must be an http(s) URL"));
        }
        if self.session_timeout_secs == 0 {
            return Err(anyhow!("analytics.session_timeout_secs must be positive"));
        }
        Ok(())
    }
}

impl PaymentConfig {
    pub fn normalize_from_env(&mut self) {
        let missing = self.api_key.as_deref().map(|s| s.trim().is_empty()).unwrap_or(true);
        if missing {
            self.api_key = std::env::var("EXTPAY_API_KEY").ok().filter(|s| !s.trim().is_empty());
        }
        while self.api_base.ends_with('/') {
            self.api_base.pop();
        }
    }

    fn validate(&self) -> Result<()> {
        if self.extension_id.trim().is_empty() {
            return Err(anyhow!("payment.extension_id is empty"));
        }
        if self.trial_days == 0 {
            return Err(anyhow!("payment.trial_days must be >= 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let mut cfg: AppConfig = toml::from_str("").unwrap();
        cfg.normalize_and_validate().unwrap();
        assert_eq!(cfg.storage.sync_quota.max_items, 512);
        assert_eq!(cfg.storage.sync_quota.max_bytes_per_item, 8192);
        assert_eq!(cfg.storage.sync_quota.max_writes_per_minute, 120);
        assert_eq!(cfg.payment.trial_days, 7);
        assert_eq!(cfg.analytics.session_timeout_secs, 1800);
    }

    #[test]
    fn partial_sections_keep_field_defaults() {
        let mut cfg: AppConfig = toml::from_str(
            r#"
            [server]
            host = ""
            port = 9000

            [payment]
            api_base = "https://pay.example.com/"
            trial_days = 3
            "#,
        )
        .unwrap();
        cfg.normalize_and_validate().unwrap();
        assert_eq!(cfg.server.host, "127.0.0.1");
        assert_eq!(cfg.server.admin_addr, "127.0.0.1:9188");
        assert_eq!(cfg.payment.api_base, "https://pay.example.com");
        assert_eq!(cfg.payment.extension_id, "keyboard-and-mouse-for-xbox-xcloud");
    }

    #[test]
    fn rejects_identical_tier_files() {
        let mut cfg: AppConfig = toml::from_str(
            r#"
            [storage]
            sync_file = "same.json"
            local_file = "same.json"
            "#,
        )
        .unwrap();
        assert!(cfg.normalize_and_validate().is_err());
    }
}
