//! Order book ladder: header plus one panel per outcome, asks over bids

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};
use rust_decimal::Decimal;

use super::format::{bar_fill, fmt_cents_1dp, fmt_price_cents, fmt_size, BAR_WIDTH};
use crate::common::types::{BookSide, PriceLevel, SessionState};
use crate::orderbook::{MarketView, OutcomeBook};

const FRAME_TITLE: &str = " Polymarket CLOB ";
const WAITING: &str = "waiting for order book...";
const TOKEN_PREFIX_CHARS: usize = 10;

/// Draw one full frame of `view`, showing at most `depth` levels per side
pub fn draw(frame: &mut Frame, view: &MarketView, depth: usize) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(Span::styled(
            FRAME_TITLE,
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        ));
    let inner = block.inner(frame.area());
    frame.render_widget(block, frame.area());

    let header = header_lines(view);
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(header.len() as u16),
            Constraint::Min(0),
        ])
        .split(inner);

    frame.render_widget(Paragraph::new(header), chunks[0]);
    draw_panels(frame, view, depth, chunks[1]);
}

fn header_lines(view: &MarketView) -> Vec<Line<'static>> {
    let mut lines = vec![Line::from(Span::styled(
        view.event_title.clone(),
        Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
    ))];

    if !view.market_question.is_empty() && view.market_question != view.event_title {
        lines.push(Line::from(Span::styled(
            view.market_question.clone(),
            Style::default().fg(Color::Gray),
        )));
    }

    lines.push(status_line(view));

    if let Some(notice) = &view.notice {
        lines.push(Line::from(Span::styled(
            notice.clone(),
            Style::default().fg(Color::Yellow),
        )));
    }
    if let Some(feed_error) = &view.feed_error {
        lines.push(Line::from(Span::styled(
            feed_error.clone(),
            Style::default().fg(Color::Red),
        )));
    }
    lines
}

fn status_line(view: &MarketView) -> Line<'static> {
    match &view.status {
        SessionState::Streaming => {
            let updated = view
                .last_update
                .map(|ts| ts.to_rfc3339())
                .unwrap_or_else(|| "-".to_string());
            Line::from(Span::styled(
                format!("Updated {updated}"),
                Style::default().fg(Color::DarkGray),
            ))
        }
        state @ SessionState::Reconnecting { .. } => Line::from(Span::styled(
            state.to_string(),
            Style::default().fg(Color::Yellow),
        )),
        state => Line::from(Span::styled(
            state.to_string(),
            Style::default().fg(Color::DarkGray),
        )),
    }
}

fn draw_panels(frame: &mut Frame, view: &MarketView, depth: usize, area: Rect) {
    if view.outcomes.is_empty() {
        return;
    }

    let count = view.outcomes.len() as u32;
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints(view.outcomes.iter().map(|_| Constraint::Ratio(1, count)))
        .split(area);

    for (outcome, column) in view.outcomes.iter().zip(columns.iter()) {
        draw_outcome(frame, outcome, depth, *column);
    }
}

fn draw_outcome(frame: &mut Frame, outcome: &OutcomeBook, depth: usize, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(Span::styled(
            format!(" {} ", outcome.label),
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        ));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let book = &outcome.book;
    let mut lines = vec![subtitle(outcome)];

    if book.is_empty() {
        lines.push(Line::from(Span::styled(
            WAITING,
            Style::default().fg(Color::DarkGray),
        )));
        frame.render_widget(Paragraph::new(lines), inner);
        return;
    }

    let max_size = book.max_size(depth).unwrap_or(Decimal::ZERO);
    let best_bid = book.best_bid().map(|l| l.price);
    let best_ask = book.best_ask().map(|l| l.price);

    // Far-to-near so the best ask sits on the divider
    for level in book.asks_asc(depth).into_iter().rev() {
        let best = Some(level.price) == best_ask;
        lines.push(level_line(level, BookSide::Ask, best, max_size));
    }

    lines.push(Line::from(Span::styled(
        format!("-- {} Bids --", outcome.label.to_uppercase()),
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
    )));

    for level in book.bids_desc(depth) {
        let best = Some(level.price) == best_bid;
        lines.push(level_line(level, BookSide::Bid, best, max_size));
    }

    frame.render_widget(Paragraph::new(lines), inner);
}

fn subtitle(outcome: &OutcomeBook) -> Line<'static> {
    let book = &outcome.book;
    let (mid, spread) = match (book.midpoint(), book.spread()) {
        (Some(mid), Some(spread)) if spread >= Decimal::ZERO => {
            (fmt_cents_1dp(mid), fmt_cents_1dp(spread))
        }
        _ => ("-".to_string(), "-".to_string()),
    };
    let token: String = outcome.token_id.chars().take(TOKEN_PREFIX_CHARS).collect();
    let dim = Style::default().fg(Color::DarkGray);

    Line::from(vec![
        Span::styled(format!("token {token}..."), dim),
        Span::styled("  •  ", dim),
        Span::styled(format!("mid {mid}"), Style::default().fg(Color::LightCyan)),
        Span::styled("  •  ", dim),
        Span::styled(format!("spread {spread}"), Style::default().fg(Color::Magenta)),
    ])
}

fn level_line(level: PriceLevel, side: BookSide, best: bool, max_size: Decimal) -> Line<'static> {
    let color = match side {
        BookSide::Ask => Color::Red,
        BookSide::Bid => Color::Green,
    };
    let mut price_style = Style::default().fg(color);
    if best {
        price_style = price_style.add_modifier(Modifier::BOLD);
    }
    let filled = bar_fill(level.size, max_size, BAR_WIDTH);

    Line::from(vec![
        Span::styled(format!("{:>7} ", fmt_price_cents(level.price)), price_style),
        Span::styled(
            format!("{:>18} ", fmt_size(level.size)),
            Style::default().fg(Color::White),
        ),
        Span::styled("#".repeat(filled), price_style),
        Span::styled(
            ".".repeat(BAR_WIDTH - filled),
            Style::default().fg(Color::DarkGray),
        ),
    ])
}
