//! Trait definitions at the REST seam

use async_trait::async_trait;

use super::errors::Result;
use crate::polymarket::messages::GammaEvent;

/// Source of Gamma events.
///
/// The resolver only needs slug lookup; [`GammaClient`] implements it over
/// HTTP and tests substitute a mock.
///
/// [`GammaClient`]: crate::polymarket::rest::GammaClient
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Fetch an event by slug. A missing event is `ClientError::NotFound`.
    async fn event_by_slug(&self, slug: &str) -> Result<GammaEvent>;
}
