//! In-memory order book state

pub mod book;
pub mod view;

pub use book::BookState;
pub use view::{MarketView, OutcomeBook, SharedView};
