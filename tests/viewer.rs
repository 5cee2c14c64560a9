//! End-to-end: Gamma resolution, feed session and renderer on a test backend

#[macro_use]
mod common;

use std::time::Duration;

use common::{frames, gamma, MockFeedServer, Step};
use polymarket_book::common::errors::{ResolutionError, ViewerError};
use polymarket_book::polymarket::backoff::Backoff;
use polymarket_book::viewer::{resolve_view, stream_into};
use polymarket_book::{ExitReason, FeedConfig, GammaClient, MarketQuery, PolymarketClient, SessionState};
use ratatui::{backend::TestBackend, Terminal};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn gamma_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/events/slug/us-strikes-iran-by"))
        .respond_with(ResponseTemplate::new(200).set_body_json(gamma::strikes_event()))
        .mount(&server)
        .await;
    server
}

fn client(gamma: &MockServer, feed: &MockFeedServer) -> PolymarketClient {
    PolymarketClient::from_parts(
        GammaClient::new(&gamma.uri()).unwrap(),
        FeedConfig::new(&feed.base_url())
            .with_backoff(Backoff::new(Duration::from_millis(50), Duration::from_millis(100))),
    )
}

fn screen_text(terminal: &Terminal<TestBackend>) -> String {
    let buffer = terminal.backend().buffer();
    buffer
        .content
        .chunks(buffer.area.width as usize)
        .map(|row| row.iter().map(|cell| cell.symbol()).collect::<String>())
        .collect::<Vec<_>>()
        .join("\n")
}

#[test_log::test(tokio::test)]
async fn test_streams_resolved_market_until_shutdown() {
    let gamma = gamma_server().await;
    let feed = MockFeedServer::start(vec![vec![
        Step::ExpectSubscribe,
        Step::Send(frames::book("21", &[("0.40", "1500")], &[("0.42", "30")])),
        Step::Send(frames::book("22", &[("0.57", "12")], &[("0.60", "8")])),
    ]])
    .await;
    let client = client(&gamma, &feed);

    let query = MarketQuery::by_date("https://polymarket.com/event/us-strikes-iran-by", "February 28");
    let view = resolve_view(&client, &query).await.unwrap();

    let watched = view.clone();
    let shutdown = async move {
        eventually!("both books", {
            let view = watched.read().await;
            view.status.is_streaming() && view.outcomes.iter().all(|o| !o.book.is_empty())
        });
        // Leave the renderer a few ticks
        tokio::time::sleep(Duration::from_millis(100)).await;
        Ok::<(), std::io::Error>(())
    };

    let mut terminal = Terminal::new(TestBackend::new(140, 40)).unwrap();
    let reason = stream_into(
        &client,
        view.clone(),
        &mut terminal,
        16,
        Duration::from_millis(10),
        shutdown,
    )
    .await
    .unwrap();

    assert_eq!(reason, ExitReason::Interrupted);
    assert_eq!(view.read().await.status, SessionState::Closed);

    let screen = screen_text(&terminal);
    assert!(screen.contains("US strikes Iran by February 28, 2026?"), "{screen}");
    assert!(screen.contains("-- YES Bids --"), "{screen}");
    assert!(screen.contains("-- NO Bids --"), "{screen}");
    assert!(screen.contains("1,500 contracts"), "{screen}");
    assert!(screen.contains("Updated 2023-11-14T22:13:20+00:00"), "{screen}");
    assert!(screen.contains("token 21..."), "{screen}");

    let subscribe: serde_json::Value = serde_json::from_str(&feed.received()[0]).unwrap();
    assert_eq!(subscribe["assets_ids"], serde_json::json!(["22", "21"]));
}

#[tokio::test]
async fn test_resolution_failure_is_reported_before_streaming() {
    let gamma = gamma_server().await;
    let feed = MockFeedServer::start(vec![]).await;
    let client = client(&gamma, &feed);

    let query = MarketQuery::by_date("https://polymarket.com/event/us-strikes-iran-by", "June 30");
    let err = resolve_view(&client, &query).await.unwrap_err();

    assert!(
        matches!(err, ViewerError::Resolution(ResolutionError::NoDateMatch(_))),
        "{err:?}"
    );
    assert_eq!(err.to_string(), "no market found in event for date text: June 30");
    assert_eq!(feed.connections(), 0);
}
