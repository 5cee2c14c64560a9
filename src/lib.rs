//! polymarket_book Library
//!
//! Gamma market discovery plus a live terminal order book for one
//! Polymarket market, fed by the public CLOB market websocket.

pub mod common;
pub mod config;
pub mod orderbook;
pub mod polymarket;
pub mod ui;
pub mod viewer;

// Re-export commonly used types
pub use common::errors::{ClientError, FeedError, ResolutionError, Result, ViewerError};
pub use common::types::{BookSide, FeedMessage, LevelDelta, PriceLevel, SessionState, TradePrint};
pub use config::types::AppConfig;
pub use orderbook::{BookState, MarketView, SharedView};
pub use polymarket::{
    FeedConfig, FeedSession, GammaClient, MarketQuery, MarketResolver, PolymarketClient,
    Resolution,
};
pub use viewer::{run_viewer, ExitReason};
