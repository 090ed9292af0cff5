use search_client::streaming::lifecycle::DEFAULT_APOLOGY;
use search_client::streaming::{SseConnector, StreamLifecycle, StreamState};
use search_client::ApiClient;
use std::sync::Arc;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn stream_server(query: &str, status: u16, body: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/ai-stream"))
        .and(query_param("query", query))
        .respond_with(
            ResponseTemplate::new(status)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(body.to_string()),
        )
        .mount(&server)
        .await;
    server
}

fn lifecycle_for(server: &MockServer) -> StreamLifecycle {
    StreamLifecycle::new(Arc::new(SseConnector::new(ApiClient::new(&server.uri()))))
}

#[tokio::test]
async fn test_answer_streams_until_done() {
    let server = stream_server(
        "what is rust",
        200,
        "data: Hello\n\ndata: ###World\n\ndata: [DONE]\n\n",
    )
    .await;
    let mut lifecycle = lifecycle_for(&server);
    let updates = lifecycle.subscribe();

    lifecycle.start("what is rust");
    assert_eq!(lifecycle.state(), StreamState::Connecting);
    assert!(lifecycle.is_loading());

    assert_eq!(lifecycle.run_to_end().await, StreamState::Closed);
    assert_eq!(lifecycle.text(), "Hello\n\n###World");
    assert!(!lifecycle.is_loading());
    assert!(!lifecycle.is_live());
    assert!(updates.borrow().contains("World"));
}

#[tokio::test]
async fn test_escaped_newlines_are_unescaped() {
    let server = stream_server("rust", 200, "data: line one\\nline two\n\ndata: [DONE]\n\n").await;
    let mut lifecycle = lifecycle_for(&server);

    lifecycle.start("rust");
    lifecycle.run_to_end().await;
    assert_eq!(lifecycle.text(), "line one\nline two");
}

#[tokio::test]
async fn test_hangup_after_text_keeps_the_answer() {
    let server = stream_server("rust", 200, "data: partial answer\n\n").await;
    let mut lifecycle = lifecycle_for(&server);

    lifecycle.start("rust");
    assert_eq!(lifecycle.run_to_end().await, StreamState::Closed);
    assert_eq!(lifecycle.text(), "partial answer");
}

#[tokio::test]
async fn test_hangup_before_text_apologises() {
    let server = stream_server("rust", 200, "").await;
    let mut lifecycle = lifecycle_for(&server);

    lifecycle.start("rust");
    assert_eq!(lifecycle.run_to_end().await, StreamState::Errored);
    assert_eq!(lifecycle.text(), DEFAULT_APOLOGY);
    assert!(!lifecycle.is_loading());
}

#[tokio::test]
async fn test_server_error_apologises() {
    let server = stream_server("rust", 503, "").await;
    let mut lifecycle = lifecycle_for(&server);

    lifecycle.start("rust");
    assert_eq!(lifecycle.run_to_end().await, StreamState::Errored);
    assert_eq!(lifecycle.text(), DEFAULT_APOLOGY);
}

#[tokio::test]
async fn test_named_events_are_not_answer_text() {
    let server = stream_server(
        "rust",
        200,
        "event: ping\ndata: keepalive\n\ndata: hello\n\nevent: status\ndata: thinking\n\ndata: [DONE]\n\n",
    )
    .await;
    let mut lifecycle = lifecycle_for(&server);

    lifecycle.start("rust");
    assert_eq!(lifecycle.run_to_end().await, StreamState::Closed);
    assert_eq!(lifecycle.text(), "hello");
}
