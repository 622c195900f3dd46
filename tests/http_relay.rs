use std::time::Duration;

use httpmock::Method::{DELETE, GET};
use httpmock::MockServer;
use serde_json::json;

use relay_fetcher::config::{RelayConfig, TransportMode};
use relay_fetcher::error::RelayFetcherError;
use relay_fetcher::interfaces::relay::RelayService;
use relay_fetcher::providers::http_relay::{Credentials, HttpRelayService};
use relay_fetcher::services::transport::LocalTransport;

const BASIC_ALICE: &str = "Basic YWxpY2U6c2VjcmV0";

fn relay_config(base_url: String) -> RelayConfig {
    RelayConfig {
        base_url: Some(base_url),
        username: Some("alice".to_string()),
        password: Some("secret".to_string()),
        timeout_seconds: Some(5),
        connect_timeout_seconds: Some(1),
        transport: TransportMode::Direct,
    }
}

fn credentials() -> Option<Credentials> {
    Some(Credentials {
        username: "alice".to_string(),
        password: "secret".to_string(),
    })
}

#[tokio::test]
async fn fetches_messages_with_basic_auth() {
    let server = MockServer::start_async().await;
    let body = json!({
        "messages": [{"type": 1, "timestamp": 9, "source": "bob", "sourceDevice": 1}],
        "more": false
    });
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/v1/messages/")
                .header("authorization", BASIC_ALICE);
            then.status(200).json_body(body.clone());
        })
        .await;

    let relay = HttpRelayService::new(&relay_config(server.base_url()))
        .await
        .unwrap();
    let fetched = relay.fetch_messages().await.unwrap();

    assert_eq!(fetched, Some(body));
    mock.assert_async().await;
}

#[tokio::test]
async fn acknowledges_with_delete() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(DELETE)
                .path("/v1/messages/bob/1500000000123")
                .header("authorization", BASIC_ALICE);
            then.status(204);
        })
        .await;

    let relay = HttpRelayService::new(&relay_config(server.base_url()))
        .await
        .unwrap();
    relay.acknowledge("bob", 1_500_000_000_123).await.unwrap();

    mock.assert_async().await;
}

#[tokio::test]
async fn error_statuses_are_http_errors() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/v1/messages/");
            then.status(503);
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(DELETE).path("/v1/messages/bob/1");
            then.status(500);
        })
        .await;

    let relay = HttpRelayService::new(&relay_config(server.base_url()))
        .await
        .unwrap();

    let err = relay.fetch_messages().await.unwrap_err();
    assert!(matches!(err, RelayFetcherError::Http(ref msg) if msg.contains("503")));
    let err = relay.acknowledge("bob", 1).await.unwrap_err();
    assert!(matches!(err, RelayFetcherError::Http(_)));
}

#[tokio::test]
async fn empty_body_is_absent_and_garbage_is_a_serialization_error() {
    let empty = MockServer::start_async().await;
    empty
        .mock_async(|when, then| {
            when.method(GET).path("/v1/messages/");
            then.status(200).body("");
        })
        .await;
    let relay = HttpRelayService::new(&relay_config(empty.base_url()))
        .await
        .unwrap();
    assert_eq!(relay.fetch_messages().await.unwrap(), None);

    let garbage = MockServer::start_async().await;
    garbage
        .mock_async(|when, then| {
            when.method(GET).path("/v1/messages/");
            then.status(200).body("<html>captive portal</html>");
        })
        .await;
    let relay = HttpRelayService::new(&relay_config(garbage.base_url()))
        .await
        .unwrap();
    let err = relay.fetch_messages().await.unwrap_err();
    assert!(matches!(err, RelayFetcherError::Serialization(_)));
}

#[tokio::test]
async fn unreachable_relay_is_an_http_error() {
    let server = MockServer::start_async().await;
    let base_url = server.base_url();
    drop(server);

    let relay = HttpRelayService::new(&relay_config(base_url)).await.unwrap();
    let err = relay.fetch_messages().await.unwrap_err();
    assert!(matches!(err, RelayFetcherError::Http(_)));
}

#[tokio::test]
async fn tunnelled_mode_speaks_http_over_the_transport() {
    let server = MockServer::start_async().await;
    let authority = server.base_url().trim_start_matches("http://").to_string();
    let fetch = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/v1/messages/")
                .header("host", authority.as_str())
                .header("authorization", BASIC_ALICE);
            then.status(200)
                .json_body(json!({"messages": [], "more": false}));
        })
        .await;
    let ack = server
        .mock_async(|when, then| {
            when.method(DELETE).path("/v1/messages/bob/7");
            then.status(200);
        })
        .await;

    let relay = HttpRelayService::with_transport(
        server.base_url(),
        credentials(),
        Duration::from_secs(5),
        Box::new(LocalTransport),
    )
    .unwrap();

    let fetched = relay.fetch_messages().await.unwrap();
    assert_eq!(fetched, Some(json!({"messages": [], "more": false})));
    relay.acknowledge("bob", 7).await.unwrap();

    fetch.assert_async().await;
    ack.assert_async().await;
}

#[test]
fn tunnelled_mode_rejects_tls_urls() {
    let result = HttpRelayService::with_transport(
        "https://relay.example.org".to_string(),
        credentials(),
        Duration::from_secs(5),
        Box::new(LocalTransport),
    );
    assert!(matches!(result, Err(RelayFetcherError::Config(_))));
}

#[tokio::test]
async fn missing_base_url_is_a_config_error() {
    let mut config = relay_config(String::new());
    config.base_url = Some("   ".to_string());
    let result = HttpRelayService::new(&config).await;
    assert!(matches!(result, Err(RelayFetcherError::Config(_))));
}
