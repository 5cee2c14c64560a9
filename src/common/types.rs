//! Types shared between the feed, the book and the renderer

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Side of the order book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookSide {
    Bid,
    Ask,
}

impl BookSide {
    /// Parse a wire side. Polymarket sends `BUY`/`SELL`; `bid`/`ask` are
    /// accepted as well.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "buy" | "bid" | "bids" => Some(BookSide::Bid),
            "sell" | "ask" | "asks" => Some(BookSide::Ask),
            _ => None,
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            BookSide::Bid => BookSide::Ask,
            BookSide::Ask => BookSide::Bid,
        }
    }
}

impl fmt::Display for BookSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookSide::Bid => write!(f, "bid"),
            BookSide::Ask => write!(f, "ask"),
        }
    }
}

/// A single price level in an order book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceLevel {
    /// Price at this level (0.00 to 1.00 for prediction markets)
    pub price: Decimal,
    /// Total size/quantity at this price level
    pub size: Decimal,
}

impl PriceLevel {
    /// Create a new price level
    pub fn new(price: Decimal, size: Decimal) -> Self {
        Self { price, size }
    }
}

/// Incremental change of a single level of one outcome token's book
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelDelta {
    pub asset_id: String,
    pub side: BookSide,
    pub price: Decimal,
    /// Zero means the level is removed
    pub size: Decimal,
}

/// Last trade print for an outcome token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradePrint {
    pub price: Decimal,
    pub size: Option<Decimal>,
    pub side: Option<BookSide>,
    pub timestamp: Option<DateTime<Utc>>,
}

/// One decoded feed message. Applied to the view and then dropped.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedMessage {
    /// Full book replacement for one outcome token
    Snapshot {
        asset_id: String,
        bids: Vec<PriceLevel>,
        asks: Vec<PriceLevel>,
        timestamp: Option<DateTime<Utc>>,
    },
    /// Level upserts/removals, possibly across several tokens
    Delta {
        changes: Vec<LevelDelta>,
        timestamp: Option<DateTime<Utc>>,
    },
    /// Informational trade print; does not touch levels
    Trade { asset_id: String, print: TradePrint },
    /// Server answered our text ping
    Heartbeat,
    /// Server reported an error on the channel
    Error(String),
}

impl FeedMessage {
    pub fn is_snapshot(&self) -> bool {
        matches!(self, FeedMessage::Snapshot { .. })
    }
}

/// Lifecycle state of the feed session
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Subscribed,
    Streaming,
    Reconnecting {
        attempt: u32,
        delay: Duration,
        reason: String,
    },
    Closed,
}

impl SessionState {
    pub fn is_streaming(&self) -> bool {
        matches!(self, SessionState::Streaming)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Disconnected => write!(f, "disconnected"),
            SessionState::Connecting => write!(f, "connecting..."),
            SessionState::Subscribed => write!(f, "subscribed, waiting for feed..."),
            SessionState::Streaming => write!(f, "streaming"),
            SessionState::Reconnecting {
                attempt,
                delay,
                reason,
            } => write!(
                f,
                "reconnecting in {:.1}s (attempt {}): {}",
                delay.as_secs_f64(),
                attempt,
                reason
            ),
            SessionState::Closed => write!(f, "closed"),
        }
    }
}
