//! Common test utilities and fixtures

#![allow(dead_code)]

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;
use tokio_tungstenite::{accept_async, tungstenite::Message};

/// What the mock market channel does on one connection, in order
#[derive(Debug, Clone)]
pub enum Step {
    /// Wait for the client's subscription frame
    ExpectSubscribe,
    /// Send a text frame
    Send(String),
    Pause(Duration),
    /// Send a close frame and hang up
    Close,
    /// Hang up without a close frame
    Drop,
    /// Keep the connection open and send nothing, not even PONG
    Silent,
}

/// Scripted stand-in for the CLOB market websocket.
///
/// Each accepted connection runs the next script. When a script ends
/// without hanging up, or no scripts are left, the server keeps the
/// connection open and answers `PING` with `PONG`.
pub struct MockFeedServer {
    pub addr: SocketAddr,
    shutdown: Arc<Notify>,
    connections: Arc<AtomicUsize>,
    received: Arc<Mutex<Vec<String>>>,
}

impl MockFeedServer {
    pub async fn start(scripts: Vec<Vec<Step>>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = Arc::new(Notify::new());
        let connections = Arc::new(AtomicUsize::new(0));
        let received = Arc::new(Mutex::new(Vec::new()));
        let scripts = Arc::new(Mutex::new(VecDeque::from(scripts)));

        let server = Self {
            addr,
            shutdown: shutdown.clone(),
            connections: connections.clone(),
            received: received.clone(),
        };

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        let Ok((stream, _)) = result else { break };
                        connections.fetch_add(1, Ordering::SeqCst);
                        let script = scripts.lock().unwrap().pop_front().unwrap_or_default();
                        let received = received.clone();
                        let shutdown = shutdown.clone();
                        tokio::spawn(async move {
                            Self::handle_connection(stream, script, received, shutdown).await;
                        });
                    }
                    _ = shutdown.notified() => break,
                }
            }
        });

        server
    }

    async fn handle_connection(
        stream: TcpStream,
        script: Vec<Step>,
        received: Arc<Mutex<Vec<String>>>,
        shutdown: Arc<Notify>,
    ) {
        let Ok(ws_stream) = accept_async(stream).await else {
            return;
        };
        let (mut write, mut read) = ws_stream.split();

        for step in script {
            match step {
                Step::ExpectSubscribe => loop {
                    match read.next().await {
                        Some(Ok(Message::Text(text))) => {
                            received.lock().unwrap().push(text);
                            break;
                        }
                        Some(Ok(_)) => continue,
                        _ => return,
                    }
                },
                Step::Send(text) => {
                    if write.send(Message::Text(text)).await.is_err() {
                        return;
                    }
                }
                Step::Pause(duration) => tokio::time::sleep(duration).await,
                Step::Close => {
                    let _ = write.send(Message::Close(None)).await;
                    return;
                }
                Step::Drop => return,
                Step::Silent => {
                    tokio::select! {
                        _ = async { while let Some(Ok(_)) = read.next().await {} } => {}
                        _ = shutdown.notified() => {}
                    }
                    return;
                }
            }
        }

        loop {
            tokio::select! {
                msg = read.next() => match msg {
                    Some(Ok(Message::Text(text))) => {
                        let is_ping = text == "PING";
                        received.lock().unwrap().push(text);
                        if is_ping && write.send(Message::Text("PONG".to_string())).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        received.lock().unwrap().push("<close>".to_string());
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(_)) | None => break,
                },
                _ = shutdown.notified() => break,
            }
        }
    }

    /// Base URL for `FeedConfig::new`; the session appends `/ws/market`
    pub fn base_url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Text frames received from clients, across connections
    pub fn received(&self) -> Vec<String> {
        self.received.lock().unwrap().clone()
    }

    pub fn shutdown(&self) {
        self.shutdown.notify_waiters();
    }
}

impl Drop for MockFeedServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Re-evaluate `$check` until it holds; panics after five seconds
#[allow(unused_macros)]
macro_rules! eventually {
    ($what:expr, $check:expr) => {{
        let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(5);
        loop {
            if $check {
                break;
            }
            if tokio::time::Instant::now() > deadline {
                panic!("timed out waiting for {}", $what);
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
    }};
}

/// Sample feed frames
pub mod frames {
    pub const YES: &str = "1001";
    pub const NO: &str = "1002";

    pub fn book(asset_id: &str, bids: &[(&str, &str)], asks: &[(&str, &str)]) -> String {
        let levels = |levels: &[(&str, &str)]| {
            levels
                .iter()
                .map(|(price, size)| serde_json::json!({"price": price, "size": size}))
                .collect::<Vec<_>>()
        };
        serde_json::json!({
            "event_type": "book",
            "asset_id": asset_id,
            "market": "0xmarket",
            "bids": levels(bids),
            "asks": levels(asks),
            "timestamp": "1700000000000",
        })
        .to_string()
    }

    pub fn price_change(asset_id: &str, price: &str, size: &str, side: &str) -> String {
        serde_json::json!({
            "event_type": "price_change",
            "market": "0xmarket",
            "price_changes": [
                {"asset_id": asset_id, "price": price, "size": size, "side": side}
            ],
            "timestamp": "1700000001000",
        })
        .to_string()
    }
}

/// Sample Gamma payloads
pub mod gamma {
    use serde_json::{json, Value};

    pub fn market(id: &str, slug: &str, question: &str, tokens: [&str; 2]) -> Value {
        json!({
            "id": id,
            "question": question,
            "conditionId": format!("0xcond{id}"),
            "slug": slug,
            "outcomes": "[\"Yes\", \"No\"]",
            "clobTokenIds": format!("[\"{}\", \"{}\"]", tokens[0], tokens[1]),
            "active": true,
            "closed": false
        })
    }

    pub fn strikes_event() -> Value {
        json!({
            "id": "16085",
            "title": "US strikes Iran by...?",
            "slug": "us-strikes-iran-by",
            "markets": [
                market("1", "us-strikes-iran-by-january-31", "US strikes Iran by January 31, 2026?", ["11", "12"]),
                market("2", "us-strikes-iran-by-february-28-2026", "US strikes Iran by February 28, 2026?", ["21", "22"]),
                market("3", "us-strikes-iran-by-march-31", "US strikes Iran by March 31, 2026?", ["31", "32"])
            ]
        })
    }
}
