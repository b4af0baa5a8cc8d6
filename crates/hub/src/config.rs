use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Whether a relayed message goes back to the client that sent it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelayMode {
    /// Every connection, the sender included, receives the message.
    #[default]
    Echo,
    /// Every connection except the sender receives the message.
    ExcludeSender,
}

impl std::str::FromStr for RelayMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "echo" => Ok(Self::Echo),
            "exclude_sender" | "exclude" => Ok(Self::ExcludeSender),
            other => Err(format!(
                "unknown relay mode {:?} (expected echo or exclude_sender)",
                other
            )),
        }
    }
}

impl std::fmt::Display for RelayMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Echo => write!(f, "echo"),
            Self::ExcludeSender => write!(f, "exclude_sender"),
        }
    }
}

/// Hub tuning.
#[derive(Debug, Clone)]
pub struct HubConfig {
    pub relay_mode: RelayMode,
    /// Capacity of each connection's outbound queue. A connection whose queue
    /// is full when a broadcast reaches it is dropped.
    pub outbound_queue: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            relay_mode: RelayMode::Echo,
            outbound_queue: 256,
        }
    }
}

/// Symbols polled on every tick when nothing else is configured.
pub const DEFAULT_SYMBOLS: [&str; 6] = ["AAPL", "TSLA", "MSFT", "BTC-USD", "ETH-USD", "RELIANCE.NS"];

/// Quote poller schedule.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Fetched in order, one at a time.
    pub symbols: Vec<String>,
    pub period: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            symbols: DEFAULT_SYMBOLS.iter().map(|s| s.to_string()).collect(),
            period: Duration::from_secs(10),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relay_mode_parse() {
        assert_eq!("echo".parse::<RelayMode>().unwrap(), RelayMode::Echo);
        assert_eq!(
            "exclude-sender".parse::<RelayMode>().unwrap(),
            RelayMode::ExcludeSender
        );
        assert_eq!(
            "EXCLUDE_SENDER".parse::<RelayMode>().unwrap(),
            RelayMode::ExcludeSender
        );
        assert!("broadcast".parse::<RelayMode>().is_err());
        assert_eq!(RelayMode::ExcludeSender.to_string(), "exclude_sender");
    }

    #[test]
    fn test_poller_defaults() {
        let config = PollerConfig::default();
        assert_eq!(config.symbols.len(), 6);
        assert_eq!(config.symbols[0], "AAPL");
        assert_eq!(config.period, Duration::from_secs(10));
    }
}
