//! Wires resolution, the feed session and the renderer together

use std::future::Future;
use std::io;
use std::time::Duration;

use ratatui::{backend::Backend, Terminal};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use crate::common::errors::ViewerError;
use crate::config::types::AppConfig;
use crate::orderbook::{MarketView, SharedView};
use crate::polymarket::{MarketQuery, PolymarketClient};
use crate::ui::{self, ViewerTerminal};

/// How a viewer run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// Shutdown signal received (Ctrl-C)
    Interrupted,
    /// Rendering stopped on its own
    Finished,
}

/// Resolve, then stream and render until Ctrl-C.
///
/// Resolution failures return before the terminal is touched.
pub async fn run_viewer(
    config: &AppConfig,
    query: MarketQuery,
    depth: Option<usize>,
) -> Result<ExitReason, ViewerError> {
    let client = PolymarketClient::new(config)?;
    let view = resolve_view(&client, &query).await?;

    let mut screen = ViewerTerminal::enter()?;
    let reason = stream_into(
        &client,
        view,
        screen.terminal_mut(),
        depth.unwrap_or(config.settings.depth),
        config.settings.render_interval(),
        tokio::signal::ctrl_c(),
    )
    .await;
    drop(screen);
    reason
}

/// Resolve the query and build the empty view for the chosen market
#[instrument(skip(client))]
pub async fn resolve_view(
    client: &PolymarketClient,
    query: &MarketQuery,
) -> Result<SharedView, ViewerError> {
    let resolution = client.resolve(query).await?;
    info!(
        event = %resolution.event_title,
        question = %resolution.market.question,
        tokens = resolution.market.outcomes.len(),
        "Market resolved"
    );
    Ok(MarketView::from_resolution(&resolution).into_shared())
}

/// Run the feed session and the render loop on `terminal` until `shutdown`
/// completes or rendering fails. Both tasks are stopped before returning.
pub async fn stream_into<B, S>(
    client: &PolymarketClient,
    view: SharedView,
    terminal: &mut Terminal<B>,
    depth: usize,
    render_interval: Duration,
    shutdown: S,
) -> Result<ExitReason, ViewerError>
where
    B: Backend,
    S: Future<Output = io::Result<()>>,
{
    let cancel = CancellationToken::new();
    let session = client.feed_session(view.clone(), cancel.child_token()).await;
    let feed = tokio::spawn(session.run());

    let result = tokio::select! {
        rendered = ui::run_render_loop(terminal, view, depth, render_interval, cancel.clone()) => {
            rendered.map(|_| ExitReason::Finished)
        }
        signal = shutdown => {
            info!("Shutdown requested");
            signal.map(|_| ExitReason::Interrupted)
        }
    };

    cancel.cancel();
    if let Err(e) = feed.await {
        warn!(error = %e, "Feed task ended abnormally");
    }
    if let Err(e) = &result {
        error!(error = %e, "Terminal error");
    }
    result.map_err(ViewerError::from)
}
