//! Everything the renderer needs for one market, shared between the feed
//! session (single writer) and the render tick (reader)

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::book::BookState;
use crate::common::types::{FeedMessage, SessionState};
use crate::polymarket::resolver::Resolution;

/// Market view behind the lock both tasks share
pub type SharedView = Arc<RwLock<MarketView>>;

/// Book of one outcome token
#[derive(Debug, Clone, PartialEq)]
pub struct OutcomeBook {
    pub label: String,
    pub token_id: String,
    pub book: BookState,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarketView {
    pub event_title: String,
    pub market_question: String,
    /// Ordered by label, case-insensitive
    pub outcomes: Vec<OutcomeBook>,
    pub status: SessionState,
    pub last_update: Option<DateTime<Utc>>,
    /// Resolution warning, fixed for the whole run
    pub notice: Option<String>,
    /// Latest error reported by the feed server
    pub feed_error: Option<String>,
}

impl MarketView {
    pub fn new(
        event_title: impl Into<String>,
        market_question: impl Into<String>,
        outcomes: impl IntoIterator<Item = (String, String)>,
    ) -> Self {
        let mut outcomes: Vec<OutcomeBook> = outcomes
            .into_iter()
            .map(|(label, token_id)| OutcomeBook {
                label,
                token_id,
                book: BookState::new(),
            })
            .collect();
        outcomes.sort_by_key(|o| o.label.to_lowercase());

        Self {
            event_title: event_title.into(),
            market_question: market_question.into(),
            outcomes,
            status: SessionState::Disconnected,
            last_update: None,
            notice: None,
            feed_error: None,
        }
    }

    /// Empty view for a resolved market
    pub fn from_resolution(resolution: &Resolution) -> Self {
        let market = &resolution.market;
        let mut view = Self::new(
            resolution.event_title.clone(),
            market.question.clone(),
            market
                .outcomes
                .iter()
                .map(|o| (o.label.clone(), o.token_id.clone())),
        );
        if !resolution.other_matches.is_empty() {
            view.notice = Some(format!(
                "warning: {} other market(s) also matched; showing the first. Others: {}",
                resolution.other_matches.len(),
                resolution.other_matches.join(", ")
            ));
        }
        view
    }

    pub fn into_shared(self) -> SharedView {
        Arc::new(RwLock::new(self))
    }

    /// Token IDs to subscribe to, in display order
    pub fn asset_ids(&self) -> Vec<String> {
        self.outcomes.iter().map(|o| o.token_id.clone()).collect()
    }

    pub fn book(&self, asset_id: &str) -> Option<&BookState> {
        self.outcomes
            .iter()
            .find(|o| o.token_id == asset_id)
            .map(|o| &o.book)
    }

    fn book_mut(&mut self, asset_id: &str) -> Option<&mut BookState> {
        self.outcomes
            .iter_mut()
            .find(|o| o.token_id == asset_id)
            .map(|o| &mut o.book)
    }

    /// Apply one feed message. Returns whether anything visible changed.
    pub fn apply(&mut self, message: FeedMessage) -> bool {
        let (changed, timestamp) = match message {
            FeedMessage::Snapshot {
                asset_id,
                bids,
                asks,
                timestamp,
            } => match self.book_mut(&asset_id) {
                Some(book) => {
                    book.apply_snapshot(bids, asks);
                    (true, timestamp)
                }
                None => {
                    debug!(%asset_id, "snapshot for unknown asset ignored");
                    (false, timestamp)
                }
            },
            FeedMessage::Delta { changes, timestamp } => {
                let mut changed = false;
                for change in changes {
                    if let Some(book) = self.book_mut(&change.asset_id) {
                        changed |= book.apply_delta(change.side, change.price, change.size);
                    }
                }
                (changed, timestamp)
            }
            FeedMessage::Trade { asset_id, print } => {
                let timestamp = print.timestamp;
                match self.book_mut(&asset_id) {
                    Some(book) => {
                        book.record_trade(print);
                        (true, timestamp)
                    }
                    None => (false, timestamp),
                }
            }
            FeedMessage::Heartbeat => (false, None),
            FeedMessage::Error(message) => {
                warn!(%message, "feed reported an error");
                self.feed_error = Some(format!("feed error: {message}"));
                (true, None)
            }
        };

        if changed {
            self.last_update = Some(timestamp.unwrap_or_else(Utc::now));
        }
        changed
    }
}
