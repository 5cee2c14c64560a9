//! Terminal renderer: fixed-tick full redraw of the shared market view

pub mod format;
pub mod ladder;

use std::io::{self, Stdout};
use std::time::Duration;

use crossterm::{
    cursor::{Hide, Show},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub use ladder::draw;

use crate::orderbook::SharedView;

/// Rows taken by the frame, header and panel chrome
const CHROME_ROWS: u16 = 14;
/// Lower bound on levels per side whatever the terminal height
const MIN_FITTED_DEPTH: usize = 4;

/// Clamp the requested depth to what fits in `rows` terminal rows
pub fn fit_depth(requested: usize, rows: u16) -> usize {
    let per_side = (rows.saturating_sub(CHROME_ROWS) / 2) as usize;
    requested.min(per_side.max(MIN_FITTED_DEPTH)).max(1)
}

/// Alternate screen with a hidden cursor, restored on drop.
///
/// Raw mode stays off so Ctrl-C still arrives as SIGINT.
pub struct ViewerTerminal {
    terminal: Terminal<CrosstermBackend<Stdout>>,
}

impl ViewerTerminal {
    pub fn enter() -> io::Result<Self> {
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, Hide)?;
        let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;
        terminal.clear()?;
        Ok(Self { terminal })
    }

    pub fn terminal_mut(&mut self) -> &mut Terminal<CrosstermBackend<Stdout>> {
        &mut self.terminal
    }
}

impl Drop for ViewerTerminal {
    fn drop(&mut self) {
        let _ = execute!(self.terminal.backend_mut(), Show, LeaveAlternateScreen);
    }
}

/// Redraw `view` every `interval` until `cancel` fires.
///
/// The read lock is held only while cloning the view. A failed terminal
/// write ends the loop with the IO error.
pub async fn run_render_loop<B: Backend>(
    terminal: &mut Terminal<B>,
    view: SharedView,
    depth: usize,
    interval: Duration,
    cancel: CancellationToken,
) -> io::Result<()> {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    info!(depth, interval_ms = interval.as_millis() as u64, "Render loop started");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let snapshot = view.read().await.clone();
                let fitted = fit_depth(depth, terminal.size()?.height);
                terminal.draw(|frame| draw(frame, &snapshot, fitted))?;
            }
        }
    }

    debug!("Render loop stopped");
    Ok(())
}
