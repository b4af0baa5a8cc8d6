use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// Market Data
// ---------------------------------------------------------------------------

/// Number of points in a quote's sparkline.
pub const SPARK_LEN: usize = 20;

/// A point-in-time quote for one symbol.
///
/// Produced per poll tick (or per REST request), broadcast once and then
/// discarded. Not persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteRecord {
    pub symbol: String,
    pub price: f64,
    pub change: f64,
    /// `change / price * 100`, rendered with two decimals.
    pub percent: String,
    /// Recent price points, always `SPARK_LEN` long.
    pub spark: Vec<f64>,
}

impl QuoteRecord {
    /// Build a record, deriving `percent` from `change` and `price`.
    pub fn new(symbol: impl Into<String>, price: f64, change: f64, spark: Vec<f64>) -> Self {
        Self {
            symbol: symbol.into(),
            price,
            change,
            percent: format_percent(change, price),
            spark,
        }
    }

    /// Check the shape invariants a source must honour.
    pub fn validate(&self) -> Result<(), String> {
        if self.symbol.is_empty() {
            return Err("quote has an empty symbol".to_string());
        }
        if self.spark.len() != SPARK_LEN {
            return Err(format!(
                "spark for {} has {} points, expected {}",
                self.symbol,
                self.spark.len(),
                SPARK_LEN
            ));
        }
        if !self.price.is_finite() || !self.change.is_finite() {
            return Err(format!("non-finite price data for {}", self.symbol));
        }
        Ok(())
    }
}

/// Percentage move of `change` relative to `price`, two decimals.
pub fn format_percent(change: f64, price: f64) -> String {
    if price == 0.0 {
        return "0.00".to_string();
    }
    format!("{:.2}", change / price * 100.0)
}

// ---------------------------------------------------------------------------
// Chat
// ---------------------------------------------------------------------------

/// Body of a `chat` envelope.
///
/// Only `from` and `text` are interpreted; any other keys the client sent are
/// kept in `extra` and relayed unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatPayload {
    pub from: String,
    pub text: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChatPayload {
    pub fn new(from: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            text: text.into(),
            extra: Map::new(),
        }
    }
}

/// A chat message about to be written to history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewChatMessage {
    pub from_user: String,
    pub text: String,
    /// Local wall-clock time the message was received (`HH:MM:SS`).
    pub time: String,
    pub delivered: bool,
    pub seen: bool,
    pub created_at: DateTime<Utc>,
}

impl NewChatMessage {
    /// Stamp a received chat payload with the given receive time.
    pub fn received(payload: &ChatPayload, at: DateTime<Utc>) -> Self {
        Self {
            from_user: payload.from.clone(),
            text: payload.text.clone(),
            time: at.with_timezone(&Local).format("%H:%M:%S").to_string(),
            delivered: false,
            seen: false,
            created_at: at,
        }
    }
}

/// A stored chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: i64,
    pub from_user: String,
    pub text: String,
    pub time: String,
    pub created_at: DateTime<Utc>,
    pub delivered: bool,
    pub seen: bool,
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

/// A registered account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    /// PHC-format password hash. Never serialized out.
    #[serde(skip_serializing, default)]
    pub password_hash: String,
}

impl User {
    pub fn identity(&self) -> Identity {
        Identity {
            id: self.id,
            username: self.username.clone(),
        }
    }
}

/// Who a verified bearer token belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    pub id: i64,
    pub username: String,
}
