//! Market-channel feed session: connect, subscribe, stream, reconnect

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use futures_util::{Sink, SinkExt, StreamExt};
use rust_decimal::Decimal;
use tokio::sync::watch;
use tokio::time::{interval_at, sleep, timeout, Instant, MissedTickBehavior};
use tokio_tungstenite::{connect_async, tungstenite, tungstenite::protocol::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::backoff::Backoff;
use super::messages::*;
use crate::common::errors::FeedError;
use crate::common::types::{BookSide, FeedMessage, LevelDelta, PriceLevel, SessionState, TradePrint};
use crate::config::types::AppConfig;
use crate::orderbook::SharedView;

/// Upper bound on the close frame sent when the session is cancelled
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Market channel URL for a websocket base URL
pub fn market_channel(base_url: &str) -> String {
    format!("{}/ws/market", base_url.trim_end_matches('/'))
}

/// Connection parameters of a feed session
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Full market channel URL
    pub url: String,
    /// How often a text `PING` is sent
    pub heartbeat_interval: Duration,
    /// Silence longer than this drops the connection
    pub heartbeat_timeout: Duration,
    pub connect_timeout: Duration,
    /// A send that has not completed by then drops the connection
    pub send_timeout: Duration,
    pub backoff: Backoff,
}

impl FeedConfig {
    /// Config for the market channel under `base_url`
    pub fn new(base_url: &str) -> Self {
        Self {
            url: market_channel(base_url),
            heartbeat_interval: Duration::from_secs(10),
            heartbeat_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            send_timeout: Duration::from_secs(5),
            backoff: Backoff::default(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        let settings = &config.settings;
        Self::new(&config.polymarket.websocket_url)
            .with_heartbeat(
                Duration::from_secs(settings.heartbeat_interval_seconds),
                Duration::from_secs(settings.heartbeat_timeout_seconds),
            )
            .with_connect_timeout(Duration::from_secs(settings.connect_timeout_seconds))
            .with_send_timeout(Duration::from_secs(settings.send_timeout_seconds))
            .with_backoff(Backoff::from_settings(settings))
    }

    pub fn with_heartbeat(mut self, interval: Duration, timeout: Duration) -> Self {
        self.heartbeat_interval = interval.max(Duration::from_millis(1));
        self.heartbeat_timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }
}

/// Keeps one market's books fed from the websocket until cancelled.
///
/// The session is the only writer of the shared view. Every state change is
/// published on a watch channel and mirrored into the view's status.
pub struct FeedSession {
    config: FeedConfig,
    asset_ids: Vec<String>,
    view: SharedView,
    cancel: CancellationToken,
    state_tx: watch::Sender<SessionState>,
}

impl FeedSession {
    pub fn new(
        config: FeedConfig,
        asset_ids: Vec<String>,
        view: SharedView,
        cancel: CancellationToken,
    ) -> Self {
        let (state_tx, _) = watch::channel(SessionState::Disconnected);
        Self {
            config,
            asset_ids,
            view,
            cancel,
            state_tx,
        }
    }

    /// Subscribe to state changes
    pub fn state(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    pub fn url(&self) -> &str {
        &self.config.url
    }

    /// Run until cancelled. Connection failures are retried forever.
    pub async fn run(self) {
        let mut backoff = self.config.backoff.clone();

        while !self.cancel.is_cancelled() {
            self.set_state(SessionState::Connecting).await;

            let err = match self.connect_and_stream(&mut backoff).await {
                Ok(()) => break,
                Err(e) => e,
            };
            if self.cancel.is_cancelled() {
                break;
            }

            let delay = backoff.next_delay();
            let attempt = backoff.attempts();
            warn!(
                error = %err,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "Feed connection lost, reconnecting"
            );
            self.set_state(SessionState::Reconnecting {
                attempt,
                delay,
                reason: err.to_string(),
            })
            .await;

            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = sleep(delay) => {}
            }
        }

        self.set_state(SessionState::Closed).await;
        info!("Feed session closed");
    }

    async fn set_state(&self, state: SessionState) {
        debug!(%state, "Feed session state");
        self.view.write().await.status = state.clone();
        self.state_tx.send_replace(state);
    }

    /// One connection. `Ok` means cancelled; every `Err` is retried.
    #[instrument(skip_all, fields(url = %self.config.url, assets = self.asset_ids.len()))]
    async fn connect_and_stream(&self, backoff: &mut Backoff) -> Result<(), FeedError> {
        info!("Connecting to market channel");

        let connect = timeout(self.config.connect_timeout, connect_async(self.config.url.as_str()));
        let (ws_stream, _response) = tokio::select! {
            _ = self.cancel.cancelled() => return Ok(()),
            result = connect => result
                .map_err(|_| FeedError::ConnectTimeout(self.config.connect_timeout))?
                .map_err(|e| FeedError::Connect(e.to_string()))?,
        };
        let (mut write, mut read) = ws_stream.split();

        let subscribe = serde_json::to_string(&WsSubscribeMessage::market(&self.asset_ids))
            .map_err(|e| FeedError::Send(e.to_string()))?;
        debug!(message = %subscribe, "Sending subscription");
        let send_timeout = self.config.send_timeout;
        tokio::select! {
            _ = self.cancel.cancelled() => return Ok(()),
            result = send_within(&mut write, Message::Text(subscribe), send_timeout) => result?,
        }
        self.set_state(SessionState::Subscribed).await;

        let heartbeat_timeout = self.config.heartbeat_timeout;
        let mut ping = interval_at(
            Instant::now() + self.config.heartbeat_interval,
            self.config.heartbeat_interval,
        );
        ping.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let idle = sleep(heartbeat_timeout);
        tokio::pin!(idle);
        let mut streaming = false;

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    let limit = CLOSE_TIMEOUT.min(send_timeout);
                    if let Err(e) = send_within(&mut write, Message::Close(None), limit).await {
                        debug!(error = %e, "Close frame not sent");
                    }
                    return Ok(());
                }
                _ = &mut idle => {
                    return Err(FeedError::HeartbeatTimeout(heartbeat_timeout));
                }
                _ = ping.tick() => {
                    send_within(&mut write, Message::Text(PING.to_string()), send_timeout).await?;
                }
                frame = read.next() => {
                    idle.as_mut().reset(Instant::now() + heartbeat_timeout);
                    match frame {
                        Some(Ok(Message::Text(text))) => {
                            self.handle_text(&text, &mut streaming, backoff).await;
                        }
                        Some(Ok(Message::Binary(data))) => {
                            let text = String::from_utf8_lossy(&data);
                            self.handle_text(&text, &mut streaming, backoff).await;
                        }
                        Some(Ok(Message::Ping(data))) => {
                            send_within(&mut write, Message::Pong(data), send_timeout).await?;
                        }
                        Some(Ok(Message::Close(frame))) => {
                            let reason = frame
                                .map(|f| f.reason.to_string())
                                .filter(|r| !r.is_empty());
                            return Err(FeedError::Closed(reason));
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => return Err(e.into()),
                        None => return Err(FeedError::Closed(None)),
                    }
                }
            }
        }
    }

    async fn handle_text(&self, text: &str, streaming: &mut bool, backoff: &mut Backoff) {
        let messages = match parse_frame(text) {
            Ok(messages) => messages,
            Err(e) => {
                warn!(error = %e, frame = %truncate(text, 200), "Skipping undecodable frame");
                return;
            }
        };
        if messages.is_empty() {
            return;
        }

        let first_snapshot = !*streaming && messages.iter().any(FeedMessage::is_snapshot);
        {
            let mut view = self.view.write().await;
            for message in messages {
                view.apply(message);
            }
        }

        if first_snapshot {
            *streaming = true;
            backoff.reset();
            info!("Book snapshot received, streaming");
            self.set_state(SessionState::Streaming).await;
        }
    }
}

/// Send one frame, giving up after `limit`
async fn send_within<S>(write: &mut S, message: Message, limit: Duration) -> Result<(), FeedError>
where
    S: Sink<Message, Error = tungstenite::Error> + Unpin,
{
    match timeout(limit, write.send(message)).await {
        Ok(result) => result.map_err(|e| FeedError::Send(e.to_string())),
        Err(_) => Err(FeedError::SendTimeout(limit)),
    }
}

/// Decode one text frame into feed messages.
///
/// A frame holds either one event object or an array of them. Event types
/// the viewer has no use for decode to nothing.
pub fn parse_frame(text: &str) -> Result<Vec<FeedMessage>, FeedError> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(Vec::new());
    }
    if text.eq_ignore_ascii_case(PONG) {
        return Ok(vec![FeedMessage::Heartbeat]);
    }

    let value: serde_json::Value =
        serde_json::from_str(text).map_err(|e| FeedError::Decode(e.to_string()))?;

    let events = match value {
        serde_json::Value::Array(items) => items,
        other => vec![other],
    };

    let mut messages = Vec::with_capacity(events.len());
    for event in events {
        if let Some(message) = parse_event(event)? {
            messages.push(message);
        }
    }
    Ok(messages)
}

fn parse_event(value: serde_json::Value) -> Result<Option<FeedMessage>, FeedError> {
    if let Some(error) = value.get("error") {
        let message = match error.as_str() {
            Some(s) => s.to_string(),
            None => error.to_string(),
        };
        return Ok(Some(FeedMessage::Error(message)));
    }

    let event_type = value
        .get("event_type")
        .and_then(|v| v.as_str())
        .map(str::to_string);

    match event_type.as_deref() {
        Some("book") => Ok(Some(convert_book(decode(value)?)?)),
        Some("price_change") => Ok(Some(convert_price_change(decode(value)?)?)),
        Some("last_trade_price") | Some("trade") => Ok(Some(convert_trade(decode(value)?)?)),
        Some(other) => {
            debug!(event_type = other, "Ignoring feed event");
            Ok(None)
        }
        // Untagged snapshots
        None if value.get("asset_id").is_some()
            && (value.get("bids").is_some() || value.get("buys").is_some()) =>
        {
            Ok(Some(convert_book(decode(value)?)?))
        }
        None => {
            debug!("Ignoring untyped feed event");
            Ok(None)
        }
    }
}

fn decode<T: serde::de::DeserializeOwned>(value: serde_json::Value) -> Result<T, FeedError> {
    serde_json::from_value(value).map_err(|e| FeedError::Decode(e.to_string()))
}

fn convert_book(event: BookEvent) -> Result<FeedMessage, FeedError> {
    let levels = |levels: Vec<BookLevel>| -> Result<Vec<PriceLevel>, FeedError> {
        levels
            .into_iter()
            .map(|level| {
                Ok(PriceLevel::new(
                    parse_decimal(&level.price)?,
                    parse_decimal(&level.size)?,
                ))
            })
            .collect()
    };

    Ok(FeedMessage::Snapshot {
        bids: levels(event.bids)?,
        asks: levels(event.asks)?,
        timestamp: parse_timestamp(event.timestamp.as_deref()),
        asset_id: event.asset_id,
    })
}

fn convert_price_change(event: PriceChangeEvent) -> Result<FeedMessage, FeedError> {
    let entries = if event.price_changes.is_empty() {
        event.changes
    } else {
        event.price_changes
    };

    let changes = entries
        .into_iter()
        .map(|change| {
            let asset_id = change
                .asset_id
                .or_else(|| event.asset_id.clone())
                .ok_or_else(|| FeedError::Decode("price change without asset_id".to_string()))?;
            let side = BookSide::parse(&change.side)
                .ok_or_else(|| FeedError::Decode(format!("unknown side {:?}", change.side)))?;
            Ok(LevelDelta {
                asset_id,
                side,
                price: parse_decimal(&change.price)?,
                size: parse_decimal(&change.size)?,
            })
        })
        .collect::<Result<Vec<_>, FeedError>>()?;

    Ok(FeedMessage::Delta {
        changes,
        timestamp: parse_timestamp(event.timestamp.as_deref()),
    })
}

fn convert_trade(event: LastTradePriceEvent) -> Result<FeedMessage, FeedError> {
    let size = event.size.as_deref().map(parse_decimal).transpose()?;
    Ok(FeedMessage::Trade {
        print: TradePrint {
            price: parse_decimal(&event.price)?,
            size,
            side: event.side.as_deref().and_then(BookSide::parse),
            timestamp: parse_timestamp(event.timestamp.as_deref()),
        },
        asset_id: event.asset_id,
    })
}

fn parse_decimal(raw: &str) -> Result<Decimal, FeedError> {
    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .map_err(|_| FeedError::Decode(format!("invalid decimal {raw:?}")))
}

/// Milliseconds since the epoch; RFC 3339 is accepted as well
fn parse_timestamp(raw: Option<&str>) -> Option<DateTime<Utc>> {
    let raw = raw?.trim();
    match raw.parse::<i64>() {
        Ok(ms) => Utc.timestamp_millis_opt(ms).single(),
        Err(_) => DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
    }
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
