//! Polymarket module - Gamma discovery and the CLOB market channel

pub mod backoff;
pub mod client;
pub mod messages;
pub mod resolver;
pub mod rest;
pub mod websocket;

pub use client::PolymarketClient;
pub use resolver::{MarketQuery, MarketResolver, Resolution};
pub use rest::GammaClient;
pub use websocket::{FeedConfig, FeedSession};
