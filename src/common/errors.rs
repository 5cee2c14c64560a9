//! Error types for the application

use std::time::Duration;

use thiserror::Error;

/// Result type alias using our ClientError
pub type Result<T> = std::result::Result<T, ClientError>;

/// Error type for Gamma REST operations
#[derive(Error, Debug)]
pub enum ClientError {
    /// Non-success HTTP status returned by the API
    #[error("Polymarket API error {status}: {message}")]
    Api {
        status: u16,
        message: String,
        body: Option<String>,
    },

    /// HTTP request errors
    #[error("HTTP request error: {0}")]
    HttpRequest(#[from] reqwest::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON parsing error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Resource addressed by slug does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid API response
    #[error("Invalid API response: {0}")]
    InvalidResponse(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ClientError {
    /// HTTP status carried by the error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            ClientError::NotFound(_) => Some(404),
            ClientError::HttpRequest(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Failure to turn an event URL into a single market. Always fatal.
#[derive(Error, Debug)]
pub enum ResolutionError {
    #[error("could not extract an event slug from {0:?}")]
    InvalidEventUrl(String),

    #[error("event not found for slug: {0}")]
    EventNotFound(String),

    #[error("no markets found in event {0}")]
    NoMarkets(String),

    #[error("no market found in event for date text: {0}")]
    NoDateMatch(String),

    #[error("no market found in event for market slug: {0}")]
    NoSlugMatch(String),

    #[error("event has {count} markets; pass --date-text or --market-slug. Example market slugs: {examples}")]
    Ambiguous { count: usize, examples: String },

    #[error("no clobTokenIds found for market {0}")]
    MissingTokenIds(String),

    #[error(transparent)]
    Api(#[from] ClientError),
}

/// Errors inside the feed session. Never fatal: each one ends the current
/// connection and schedules a reconnect, except `Decode` which only drops
/// the offending frame.
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("websocket connect failed: {0}")]
    Connect(String),

    #[error("websocket connect timed out after {0:?}")]
    ConnectTimeout(Duration),

    #[error("websocket send failed: {0}")]
    Send(String),

    #[error("websocket send timed out after {0:?}")]
    SendTimeout(Duration),

    #[error("websocket receive failed: {0}")]
    Receive(String),

    #[error("websocket closed by server{}", .0.as_ref().map(|r| format!(": {r}")).unwrap_or_default())]
    Closed(Option<String>),

    #[error("no frame received for {0:?} (heartbeat timeout)")]
    HeartbeatTimeout(Duration),

    #[error("undecodable frame: {0}")]
    Decode(String),
}

impl From<tokio_tungstenite::tungstenite::Error> for FeedError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        FeedError::Receive(err.to_string())
    }
}

/// Top-level error of a viewer run
#[derive(Error, Debug)]
pub enum ViewerError {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error("terminal error: {0}")]
    Terminal(#[from] std::io::Error),

    #[error(transparent)]
    Client(#[from] ClientError),
}
