#![allow(missing_docs)]

mod common;

use std::{sync::Arc, time::Duration};

use common::{Script, ScriptedProvider, config};
use objstream::{Field, Schema, StreamError, StreamState, ValidationError, path};
use objstream_http::{AppState, ObjectStream, router};
use serde_json::json;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_json, method, path as url_path},
};

fn analysis() -> Arc<Schema> {
    Arc::new(Schema::object([
        Field::new(
            "sentiment",
            Schema::enumeration(["positive", "negative", "neutral"]),
        ),
        Field::new("topics", Schema::array(Schema::String)),
    ]))
}

/// Serve the real routes on an ephemeral port.
async fn serve(script: Script) -> String {
    serve_with_timeout(script, 2_000).await
}

async fn serve_with_timeout(script: Script, timeout_ms: u64) -> String {
    let provider = ScriptedProvider::new(script);
    let state = AppState::new(provider, &config(timeout_ms));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(state)).await.unwrap();
    });
    format!("http://{address}/api/streaming-structured")
}

fn is_truncated(error: Option<&StreamError>) -> bool {
    matches!(
        error,
        Some(StreamError::ValidationFailure(ValidationError::Truncated(_)))
    )
}

#[tokio::test]
async fn streamed_analysis_settles_successfully() {
    let url = serve(Script::Fragments(vec![
        r#"{"senti"#,
        r#"ment":"pos"#,
        r#"itive","top"#,
        r#"ics":["ai""#,
        r#","ml"]}"#,
    ]))
    .await;

    let mut stream = ObjectStream::new(reqwest::Client::new(), url, analysis());
    assert_eq!(stream.state(), StreamState::Idle);
    stream.submit("AI and ML are great").unwrap();

    let snapshot = stream.settled().await;
    assert_eq!(snapshot.state, StreamState::SettledSuccess);
    assert_eq!(
        snapshot.value,
        Some(json!({"sentiment": "positive", "topics": ["ai", "ml"]}))
    );
    assert_eq!(snapshot.partial, snapshot.value);
    assert_eq!(stream.state(), StreamState::SettledSuccess);
}

#[tokio::test]
async fn dropped_connection_settles_with_validation_error() {
    let url = serve(Script::FailAfter(vec![r#"{"sentiment":"pos"#])).await;

    let mut stream = ObjectStream::new(reqwest::Client::new(), url, analysis());
    stream.submit("hello").unwrap();

    let snapshot = stream.settled().await;
    assert_eq!(snapshot.state, StreamState::SettledError);
    assert_eq!(snapshot.partial, Some(json!({})));
    assert_eq!(
        snapshot.error,
        Some(StreamError::ValidationFailure(
            ValidationError::MissingField {
                path: path!["sentiment"]
            }
        ))
    );
}

#[tokio::test]
async fn provider_failure_after_complete_fields_settles_with_error() {
    let url = serve(Script::FailAfter(vec![
        r#"{"sentiment":"neutral","#,
        r#""topics":["a"]"#,
    ]))
    .await;

    let mut stream = ObjectStream::new(reqwest::Client::new(), url, analysis());
    stream.submit("hello").unwrap();

    let snapshot = stream.settled().await;
    assert_eq!(snapshot.state, StreamState::SettledError);
    assert_eq!(snapshot.value, None);
    assert_eq!(
        snapshot.partial,
        Some(json!({"sentiment": "neutral", "topics": ["a"]}))
    );
    assert!(is_truncated(snapshot.error.as_ref()));
}

#[tokio::test]
async fn server_timeout_after_complete_fields_settles_with_error() {
    let url = serve_with_timeout(
        Script::Stall(vec![r#"{"sentiment":"neutral","topics":["a"]"#]),
        200,
    )
    .await;

    let mut stream = ObjectStream::new(reqwest::Client::new(), url, analysis());
    stream.submit("hello").unwrap();

    let snapshot = stream.settled().await;
    assert_eq!(snapshot.state, StreamState::SettledError);
    assert!(is_truncated(snapshot.error.as_ref()));
}

#[tokio::test]
async fn first_chunk_moves_observers_to_streaming() {
    let url = serve(Script::Stall(vec!["  "])).await;

    let mut stream = ObjectStream::new(reqwest::Client::new(), url, analysis());
    let mut rx = stream.submit("hello").unwrap();

    let snapshot = tokio::time::timeout(
        Duration::from_secs(1),
        rx.wait_for(|snapshot| snapshot.state == StreamState::Streaming),
    )
    .await
    .unwrap()
    .unwrap()
    .clone();
    assert_eq!(snapshot.partial, None);
    assert_eq!(stream.state(), StreamState::Streaming);
}

#[tokio::test]
async fn empty_prompt_makes_no_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut stream = ObjectStream::new(reqwest::Client::new(), server.uri(), analysis());
    assert!(matches!(
        stream.submit(""),
        Err(StreamError::InvalidInput(_))
    ));
    assert_eq!(stream.state(), StreamState::Idle);
}

#[tokio::test]
async fn posts_prompt_and_parses_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(url_path("/api/classifier"))
        .and(body_json(json!({"prompt": "rust"})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"{"sentiment":"neutral","topics":["rust"],"extra":1}"#),
        )
        .expect(1)
        .mount(&server)
        .await;

    let url = format!("{}/api/classifier", server.uri());
    let mut stream = ObjectStream::new(reqwest::Client::new(), url, analysis());
    stream.submit("rust").unwrap();

    let snapshot = stream.settled().await;
    assert_eq!(
        snapshot.value,
        Some(json!({"sentiment": "neutral", "topics": ["rust"]}))
    );
}

#[tokio::test]
async fn server_error_is_a_transport_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(json!({"error": "Failed to process request"})),
        )
        .mount(&server)
        .await;

    let mut stream = ObjectStream::new(reqwest::Client::new(), server.uri(), analysis());
    stream.submit("hello").unwrap();

    let snapshot = stream.settled().await;
    assert_eq!(snapshot.state, StreamState::SettledError);
    assert_eq!(
        snapshot.error,
        Some(StreamError::TransportFailure(
            "server responded with 500 Internal Server Error: Failed to process request".into()
        ))
    );
}

#[tokio::test]
async fn slow_server_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("{}")
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let mut stream = ObjectStream::new(reqwest::Client::new(), server.uri(), analysis())
        .with_timeout(Duration::from_millis(100));
    stream.submit("hello").unwrap();

    let snapshot = stream.settled().await;
    assert_eq!(snapshot.state, StreamState::SettledError);
    assert_eq!(
        snapshot.error,
        Some(StreamError::TransportFailure("timed out after 100ms".into()))
    );
}

#[tokio::test]
async fn resubmitting_observes_only_the_new_stream() {
    let slow = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_json(json!({"prompt": "first"})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"{"sentiment":"negative","topics":[]}"#)
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&slow)
        .await;
    Mock::given(method("POST"))
        .and(body_json(json!({"prompt": "second"})))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(r#"{"sentiment":"positive","topics":[]}"#),
        )
        .mount(&slow)
        .await;

    let mut stream = ObjectStream::new(reqwest::Client::new(), slow.uri(), analysis());
    let first = stream.submit("first").unwrap();
    drop(first);
    stream.submit("second").unwrap();

    let snapshot = stream.settled().await;
    assert_eq!(
        snapshot.value,
        Some(json!({"sentiment": "positive", "topics": []}))
    );
}
