//! Polymarket client combining Gamma discovery and the market feed

use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use super::resolver::{MarketQuery, MarketResolver, Resolution};
use super::rest::GammaClient;
use super::websocket::{FeedConfig, FeedSession};
use crate::common::errors::{ResolutionError, Result};
use crate::config::types::AppConfig;
use crate::orderbook::SharedView;

/// Entry point for the viewer: one Gamma client, built once from config,
/// and the feed settings for sessions it hands out
pub struct PolymarketClient {
    gamma: GammaClient,
    feed: FeedConfig,
}

impl PolymarketClient {
    /// Create a new Polymarket client from configuration
    pub fn new(config: &AppConfig) -> Result<Self> {
        Ok(Self {
            gamma: GammaClient::from_config(config)?,
            feed: FeedConfig::from_config(config),
        })
    }

    /// Assemble from parts, e.g. a client pointed at a test server
    pub fn from_parts(gamma: GammaClient, feed: FeedConfig) -> Self {
        Self { gamma, feed }
    }

    /// Get a reference to the Gamma REST client
    pub fn gamma(&self) -> &GammaClient {
        &self.gamma
    }

    pub fn feed_config(&self) -> &FeedConfig {
        &self.feed
    }

    /// Resolve an event URL to one market
    #[instrument(skip(self))]
    pub async fn resolve(&self, query: &MarketQuery) -> std::result::Result<Resolution, ResolutionError> {
        MarketResolver::new(&self.gamma).resolve(query).await
    }

    /// Feed session for every outcome token in `view`
    pub async fn feed_session(&self, view: SharedView, cancel: CancellationToken) -> FeedSession {
        let asset_ids = view.read().await.asset_ids();
        info!(assets = asset_ids.len(), url = %self.feed.url, "Creating feed session");
        FeedSession::new(self.feed.clone(), asset_ids, view, cancel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orderbook::MarketView;

    #[test]
    fn test_client_creation() {
        let client = PolymarketClient::new(&AppConfig::default()).unwrap();
        assert_eq!(client.gamma().base_url(), "https://gamma-api.polymarket.com");
        assert!(client.feed_config().url.ends_with("/ws/market"));
    }

    #[tokio::test]
    async fn test_feed_session_subscribes_all_outcomes() {
        let client = PolymarketClient::new(&AppConfig::default()).unwrap();
        let view = MarketView::new(
            "Event",
            "Question?",
            vec![("Yes".to_string(), "1".to_string()), ("No".to_string(), "2".to_string())],
        )
        .into_shared();

        let session = client.feed_session(view, CancellationToken::new()).await;

        assert_eq!(*session.state().borrow(), crate::common::types::SessionState::Disconnected);
        assert_eq!(session.url(), client.feed_config().url);
    }
}
