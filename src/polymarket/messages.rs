//! Polymarket-specific message types

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

// ============================================================================
// Market Channel (WebSocket)
// ============================================================================

/// Text heartbeat sent to the market channel
pub const PING: &str = "PING";
/// Server reply to [`PING`]
pub const PONG: &str = "PONG";

/// Subscribe message for the market channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsSubscribeMessage {
    /// Token IDs to subscribe to
    pub assets_ids: Vec<String>,
    /// Channel type, always `market`
    #[serde(rename = "type")]
    pub channel_type: String,
    /// Enables best bid/ask fields on price changes
    #[serde(default)]
    pub custom_feature_enabled: bool,
}

impl WsSubscribeMessage {
    pub fn market(asset_ids: &[String]) -> Self {
        Self {
            assets_ids: asset_ids.to_vec(),
            channel_type: "market".to_string(),
            custom_feature_enabled: true,
        }
    }
}

/// Book snapshot event
#[derive(Debug, Clone, Deserialize)]
pub struct BookEvent {
    #[serde(default)]
    pub event_type: Option<String>,
    pub asset_id: String,
    #[serde(default)]
    pub market: Option<String>,
    #[serde(default)]
    pub hash: Option<String>,
    #[serde(default, alias = "buys")]
    pub bids: Vec<BookLevel>,
    #[serde(default, alias = "sells")]
    pub asks: Vec<BookLevel>,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub timestamp: Option<String>,
}

/// A price level in the book
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookLevel {
    #[serde(deserialize_with = "string_or_number")]
    pub price: String,
    #[serde(deserialize_with = "string_or_number")]
    pub size: String,
}

/// Price change event.
///
/// Current servers send `price_changes` with an asset id per entry; older
/// ones put `asset_id` at the top level next to `changes`.
#[derive(Debug, Clone, Deserialize)]
pub struct PriceChangeEvent {
    #[serde(default)]
    pub event_type: Option<String>,
    #[serde(default)]
    pub asset_id: Option<String>,
    #[serde(default)]
    pub market: Option<String>,
    #[serde(default)]
    pub price_changes: Vec<PriceChange>,
    #[serde(default)]
    pub changes: Vec<PriceChange>,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub timestamp: Option<String>,
}

/// A single price change
#[derive(Debug, Clone, Deserialize)]
pub struct PriceChange {
    #[serde(default)]
    pub asset_id: Option<String>,
    #[serde(deserialize_with = "string_or_number")]
    pub price: String,
    #[serde(deserialize_with = "string_or_number")]
    pub size: String,
    pub side: String,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub best_bid: Option<String>,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub best_ask: Option<String>,
}

/// Last trade price / trade event
#[derive(Debug, Clone, Deserialize)]
pub struct LastTradePriceEvent {
    #[serde(default)]
    pub event_type: Option<String>,
    pub asset_id: String,
    #[serde(deserialize_with = "string_or_number")]
    pub price: String,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub size: Option<String>,
    #[serde(default)]
    pub side: Option<String>,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub timestamp: Option<String>,
}

// ============================================================================
// Gamma API Response Types (Market Discovery)
// ============================================================================

/// Event from Gamma API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GammaEvent {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, rename = "startDate")]
    pub start_date: Option<String>,
    #[serde(default, rename = "endDate")]
    pub end_date: Option<String>,
    #[serde(default)]
    pub active: Option<bool>,
    #[serde(default)]
    pub closed: Option<bool>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub markets: Vec<GammaMarket>,
}

/// Market from Gamma API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GammaMarket {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub question: String,
    #[serde(default, rename = "conditionId")]
    pub condition_id: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default, rename = "endDate")]
    pub end_date: Option<String>,
    #[serde(default, deserialize_with = "string_list")]
    pub outcomes: Vec<String>,
    #[serde(default, rename = "outcomePrices", deserialize_with = "string_list")]
    pub outcome_prices: Vec<String>,
    #[serde(default, rename = "clobTokenIds", deserialize_with = "string_list")]
    pub clob_token_ids: Vec<String>,
    #[serde(default)]
    pub active: Option<bool>,
    #[serde(default)]
    pub closed: Option<bool>,
}

/// Tag from Gamma API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GammaTag {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
}

/// Sport from Gamma API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GammaSport {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub sport: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub resolution: Option<String>,
    #[serde(default)]
    pub tags: Option<String>,
    #[serde(default)]
    pub series: Option<String>,
}

// ============================================================================
// Lenient field decoding
// ============================================================================

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(de::Error::custom(format!(
            "expected string or number, got {other}"
        ))),
    }
}

fn opt_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Null => Ok(None),
        serde_json::Value::String(s) => Ok(Some(s)),
        serde_json::Value::Number(n) => Ok(Some(n.to_string())),
        other => Err(de::Error::custom(format!(
            "expected string or number, got {other}"
        ))),
    }
}

/// Gamma sends some list fields as a JSON array and some as a string that
/// itself holds a JSON array (`"[\"Yes\", \"No\"]"`).
fn string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let items = match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Null => return Ok(Vec::new()),
        serde_json::Value::Array(items) => items,
        serde_json::Value::String(raw) => match serde_json::from_str(&raw) {
            Ok(serde_json::Value::Array(items)) => items,
            _ => return Ok(Vec::new()),
        },
        _ => return Ok(Vec::new()),
    };

    Ok(items
        .into_iter()
        .filter_map(|item| match item {
            serde_json::Value::String(s) => Some(s),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .collect())
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
