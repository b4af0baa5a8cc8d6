//! Settings file. Every field has a default, so an empty or absent file is valid.

use anyhow::Context;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tickerchat_hub::config::DEFAULT_SYMBOLS;
use tickerchat_hub::{HubConfig, PollerConfig, RelayMode};

/// Signing secret used when none is configured. Fine for local runs only.
pub const DEFAULT_JWT_SECRET: &str = "dev-secret";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub server: ServerSettings,
    pub hub: HubSettings,
    pub poller: PollerSettings,
    pub database: DatabaseSettings,
    pub auth: AuthSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerSettings {
    pub bind: String,
    pub port: u16,
    /// Allowed browser origin. Unset or `*` allows any origin.
    pub cors_origin: Option<String>,
    pub require_ws_auth: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 8000,
            cors_origin: None,
            require_ws_auth: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HubSettings {
    pub relay_mode: RelayMode,
    pub outbound_queue: usize,
}

impl Default for HubSettings {
    fn default() -> Self {
        let hub = HubConfig::default();
        Self {
            relay_mode: hub.relay_mode,
            outbound_queue: hub.outbound_queue,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PollerSettings {
    pub enabled: bool,
    pub symbols: Vec<String>,
    pub period_secs: u64,
    /// Base URL of a server exposing `/api/stock/{symbol}`. Quotes are
    /// generated in-process when unset.
    pub server_url: Option<String>,
    pub request_timeout_secs: u64,
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            symbols: DEFAULT_SYMBOLS.iter().map(|s| s.to_string()).collect(),
            period_secs: 10,
            server_url: None,
            request_timeout_secs: 5,
        }
    }
}

impl PollerSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseSettings {
    /// Postgres URL. Accounts and chat history live in memory when unset.
    pub url: Option<String>,
    pub max_connections: u32,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthSettings {
    pub jwt_secret: String,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            jwt_secret: DEFAULT_JWT_SECRET.to_string(),
        }
    }
}

impl Settings {
    /// Read `path`, or use defaults when no path is given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read settings file {}", path.display()))?;
        Self::from_toml(&raw).with_context(|| format!("invalid settings file {}", path.display()))
    }

    pub fn from_toml(raw: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.bind, self.server.port)
    }

    pub fn hub_config(&self) -> HubConfig {
        HubConfig {
            relay_mode: self.hub.relay_mode,
            outbound_queue: self.hub.outbound_queue,
        }
    }

    pub fn poller_config(&self) -> PollerConfig {
        PollerConfig {
            symbols: self.poller.symbols.clone(),
            period: Duration::from_secs(self.poller.period_secs),
        }
    }
}
