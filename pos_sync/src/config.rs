//! Runtime configuration: parsing, normalization, and loading.
//!
//! Configuration is a TOML document; every section is optional and falls back
//! to defaults:
//!
//! ```toml
//! database_url = "pos_sync.db"
//!
//! [square]
//! base_url = "https://connect.squareup.com"
//! timeout_ms = 30000
//!
//! [clover]
//! rate_limit_per_second = 16
//!
//! [jobs]
//! max_attempts = 3
//! retry_delay_secs = 300
//!
//! [reservations]
//! time_limit_minutes = 45
//!
//! [tokens]
//! refresh_after_days = 8
//!
//! [webhooks]
//! processing_ttl_secs = 300
//!
//! [server]
//! bind = "0.0.0.0:8080"
//! ```
//!
//! Entrypoints:
//! - Parse + normalize from a TOML string: [`load_config_str`]
//! - Parse + normalize from a file path: [`load_config_path`]
//! - Environment overrides (`DATABASE_URL`, `POS_SYNC_BIND`, `POS_SYNC_MAX_ATTEMPTS`):
//!   [`apply_env_overrides`]

use std::{num::NonZeroU32, path::Path, time::Duration};

use anyhow::{Context, bail};
use pos_client::{
    models::Origin,
    providers::{ClientSettings, clover_rest, square_rest},
    rate_limit::CLOVER_CALLS_PER_SECOND,
};
use serde::{Deserialize, Serialize};
use shared_utils::env::{get_env_var_opt, parse_env_var};

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncConfig {
    /// SQLite database path or `sqlite://` URL.
    pub database_url: String,
    pub square: ProviderCfg,
    pub clover: ProviderCfg,
    pub jobs: JobsCfg,
    pub reservations: ReservationsCfg,
    pub tokens: TokensCfg,
    pub webhooks: WebhooksCfg,
    pub server: ServerCfg,
}

/// HTTP settings for one provider.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProviderCfg {
    /// Empty means the provider's production endpoint.
    pub base_url: String,
    /// Per-call timeout; zero means the default of 30s.
    pub timeout_ms: u64,
    /// Page size for offset-paginated listings; zero means 100.
    pub page_limit: u32,
    /// Client-side call budget per merchant.
    pub rate_limit_per_second: Option<u32>,
}

impl ProviderCfg {
    pub fn client_settings(&self) -> ClientSettings {
        ClientSettings {
            base_url: self.base_url.clone(),
            timeout: Duration::from_millis(self.timeout_ms),
            page_limit: self.page_limit,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn rate_limit(&self) -> Option<NonZeroU32> {
        self.rate_limit_per_second.and_then(NonZeroU32::new)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct JobsCfg {
    /// Attempts per unit of work, the first one included.
    pub max_attempts: u32,
    /// Fixed delay between attempts.
    pub retry_delay_secs: u64,
}

impl Default for JobsCfg {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReservationsCfg {
    /// How long a reservation holds stock.
    pub time_limit_minutes: i64,
    /// Interval of the expiry sweep when run as a loop.
    pub sweep_interval_secs: u64,
}

impl Default for ReservationsCfg {
    fn default() -> Self {
        Self {
            time_limit_minutes: 45,
            sweep_interval_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct TokensCfg {
    /// Tokens at least this old are refreshed by the refresh job.
    pub refresh_after_days: i64,
}

impl Default for TokensCfg {
    fn default() -> Self {
        Self {
            refresh_after_days: 8,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct WebhooksCfg {
    /// A PROCESSING claim older than this may be taken over by a redelivery.
    pub processing_ttl_secs: i64,
}

impl Default for WebhooksCfg {
    fn default() -> Self {
        Self {
            processing_ttl_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerCfg {
    pub bind: String,
}

impl Default for ServerCfg {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".into(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        let mut cfg = Self {
            database_url: "pos_sync.db".into(),
            square: ProviderCfg::default(),
            clover: ProviderCfg::default(),
            jobs: JobsCfg::default(),
            reservations: ReservationsCfg::default(),
            tokens: TokensCfg::default(),
            webhooks: WebhooksCfg::default(),
            server: ServerCfg::default(),
        };
        fill_provider_defaults(&mut cfg);
        cfg
    }
}

impl SyncConfig {
    pub fn provider(&self, origin: Origin) -> &ProviderCfg {
        match origin {
            Origin::Square => &self.square,
            Origin::Clover => &self.clover,
        }
    }
}

fn fill_provider_defaults(cfg: &mut SyncConfig) {
    for (p, default_url) in [
        (&mut cfg.square, square_rest::DEFAULT_BASE_URL),
        (&mut cfg.clover, clover_rest::DEFAULT_BASE_URL),
    ] {
        p.base_url = p.base_url.trim().trim_end_matches('/').to_string();
        if p.base_url.is_empty() {
            p.base_url = default_url.to_string();
        }
        if p.timeout_ms == 0 {
            p.timeout_ms = 30_000;
        }
        if p.page_limit == 0 {
            p.page_limit = 100;
        }
    }
    if cfg.clover.rate_limit_per_second.is_none() {
        cfg.clover.rate_limit_per_second = Some(CLOVER_CALLS_PER_SECOND.get());
    }
}

/// Fill defaults, trim URLs, and reject values no job can run with.
pub fn normalize_config(cfg: &mut SyncConfig) -> anyhow::Result<()> {
    cfg.database_url = cfg.database_url.trim().to_string();
    if cfg.database_url.is_empty() {
        bail!("database_url must not be empty");
    }
    fill_provider_defaults(cfg);

    for (name, p) in [("square", &cfg.square), ("clover", &cfg.clover)] {
        if p.rate_limit_per_second == Some(0) {
            bail!("[{name}] rate_limit_per_second must be positive");
        }
    }
    if cfg.jobs.max_attempts == 0 {
        bail!("[jobs] max_attempts must be at least 1");
    }
    if cfg.reservations.time_limit_minutes <= 0 {
        bail!("[reservations] time_limit_minutes must be positive");
    }
    if cfg.tokens.refresh_after_days <= 0 {
        bail!("[tokens] refresh_after_days must be positive");
    }
    if cfg.webhooks.processing_ttl_secs <= 0 {
        bail!("[webhooks] processing_ttl_secs must be positive");
    }
    Ok(())
}

/// Apply `DATABASE_URL`, `POS_SYNC_BIND` and `POS_SYNC_MAX_ATTEMPTS` from the
/// environment when set.
pub fn apply_env_overrides(cfg: &mut SyncConfig) -> anyhow::Result<()> {
    if let Some(url) = get_env_var_opt("DATABASE_URL") {
        cfg.database_url = url.trim().to_string();
    }
    if let Some(bind) = get_env_var_opt("POS_SYNC_BIND") {
        cfg.server.bind = bind.trim().to_string();
    }
    if let Some(attempts) = parse_env_var::<u32>("POS_SYNC_MAX_ATTEMPTS")? {
        cfg.jobs.max_attempts = attempts;
    }
    Ok(())
}

/// Parse and normalize a TOML string.
pub fn load_config_str(s: &str) -> anyhow::Result<SyncConfig> {
    let mut cfg: SyncConfig = toml::from_str(s).context("parse pos_sync config TOML")?;
    normalize_config(&mut cfg)?;
    Ok(cfg)
}

/// Read, parse and normalize a TOML file.
pub fn load_config_path(path: impl AsRef<Path>) -> anyhow::Result<SyncConfig> {
    let path = path.as_ref();
    let s = std::fs::read_to_string(path)
        .with_context(|| format!("read config file {}", path.display()))?;
    load_config_str(&s)
}
