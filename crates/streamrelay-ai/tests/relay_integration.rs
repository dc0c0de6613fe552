//! Integration tests for the relay against a fake upstream

use std::sync::Arc;

use futures::StreamExt;
use serde_json::Value;
use streamrelay_ai::{GeminiAdapter, OpenAIAdapter, Relay, RelayConfig, UpstreamClient};
use streamrelay_contracts::{ChatTurnRequest, RelayEvent};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn disable_system_proxy_for_tests() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        // Safety: set once for the process before any HTTP clients are built.
        unsafe {
            std::env::set_var("STREAMRELAY_DISABLE_SYSTEM_PROXY", "1");
        }
    });
}

fn openai_relay(server: &MockServer) -> Relay {
    disable_system_proxy_for_tests();
    let upstream = UpstreamClient::new(Arc::new(OpenAIAdapter))
        .unwrap()
        .with_api_key("test-key")
        .with_base_url(server.uri());
    Relay::new(upstream, RelayConfig::default())
}

async fn run_turn(relay: &Relay, request: &ChatTurnRequest) -> Vec<RelayEvent> {
    let messages = relay.prepare(request).unwrap();
    relay.stream(messages).collect().await
}

const HELLO_BODY: &str = "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n\
data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\n\
data: [DONE]\n\n";

#[tokio::test]
async fn test_openai_stream_relayed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(HELLO_BODY, "text/event-stream"))
        .expect(1)
        .mount(&server)
        .await;

    let relay = openai_relay(&server);
    let events = run_turn(&relay, &ChatTurnRequest::continue_with(vec![], "Hi")).await;

    assert_eq!(
        events,
        vec![
            RelayEvent::token("Hel"),
            RelayEvent::token("lo"),
            RelayEvent::Done,
        ]
    );
}

#[tokio::test]
async fn test_upstream_request_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw("data: [DONE]\n\n", "text/event-stream"),
        )
        .mount(&server)
        .await;

    let relay = openai_relay(&server);
    run_turn(&relay, &ChatTurnRequest::continue_with(vec![], "y".repeat(8500))).await;

    let requests = server.received_requests().await.unwrap();
    let body: Value = requests[0].body_json().unwrap();
    assert_eq!(body["stream"], Value::Bool(true));
    assert_eq!(body["model"], "gpt-4o-mini");
    assert_eq!(body["messages"][0]["role"], "system");
    assert_eq!(body["messages"][1]["role"], "user");
    assert_eq!(
        body["messages"][1]["content"].as_str().unwrap().chars().count(),
        8000
    );
}

#[tokio::test]
async fn test_upstream_failure_becomes_single_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("rate limited"))
        .mount(&server)
        .await;

    let relay = openai_relay(&server);
    let events = run_turn(&relay, &ChatTurnRequest::continue_with(vec![], "Hi")).await;

    assert_eq!(
        events,
        vec![RelayEvent::error(
            "Upstream request failed: 500 Internal Server Error",
            Some("rate limited".to_string())
        )]
    );
}

#[tokio::test]
async fn test_upstream_failure_with_empty_body_uses_status_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let relay = openai_relay(&server);
    let events = run_turn(&relay, &ChatTurnRequest::continue_with(vec![], "Hi")).await;

    assert_eq!(
        events,
        vec![RelayEvent::error(
            "Upstream request failed: 503 Service Unavailable",
            Some("Service Unavailable".to_string())
        )]
    );
}

#[tokio::test]
async fn test_long_failure_body_is_truncated_on_char_boundary() {
    let server = MockServer::start().await;
    let body = format!("{}é{}", "a".repeat(511), "b".repeat(100));
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string(body))
        .mount(&server)
        .await;

    let relay = openai_relay(&server);
    let events = run_turn(&relay, &ChatTurnRequest::continue_with(vec![], "Hi")).await;

    assert_eq!(events.len(), 1);
    let RelayEvent::Error { message, detail } = &events[0] else {
        panic!("expected an error event, got {:?}", events[0]);
    };
    assert_eq!(message, "Upstream request failed: 500 Internal Server Error");
    let detail = detail.as_deref().unwrap();
    assert!(detail.ends_with("... [truncated]"));
    assert_eq!(detail, format!("{}... [truncated]", "a".repeat(511)));
}

#[tokio::test]
async fn test_unreachable_upstream_becomes_single_error() {
    disable_system_proxy_for_tests();
    let upstream = UpstreamClient::new(Arc::new(OpenAIAdapter))
        .unwrap()
        .with_api_key("test-key")
        .with_base_url("http://127.0.0.1:9");
    let relay = Relay::new(upstream, RelayConfig::default());

    let events = run_turn(&relay, &ChatTurnRequest::continue_with(vec![], "Hi")).await;

    assert_eq!(events.len(), 1);
    assert!(matches!(
        &events[0],
        RelayEvent::Error { message, detail: Some(_) } if message == "Upstream request failed"
    ));
}

#[tokio::test]
async fn test_gemini_stream_relayed() {
    disable_system_proxy_for_tests();
    let server = MockServer::start().await;
    let body: String = ["Hel", "lo"]
        .iter()
        .map(|text| {
            let chunk = serde_json::json!({
                "candidates": [{"content": {"parts": [{"text": text}], "role": "model"}}]
            });
            format!("data: {chunk}\r\n\r\n")
        })
        .collect();
    Mock::given(method("POST"))
        .and(path("/models/gemini-1.5-flash:streamGenerateContent"))
        .and(header("x-goog-api-key", "g-key"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .expect(1)
        .mount(&server)
        .await;

    let upstream = UpstreamClient::new(Arc::new(GeminiAdapter))
        .unwrap()
        .with_api_key("g-key")
        .with_base_url(server.uri());
    let relay = Relay::new(upstream, RelayConfig::default());
    let events = run_turn(&relay, &ChatTurnRequest::continue_with(vec![], "Hi")).await;

    assert_eq!(
        events,
        vec![
            RelayEvent::token("Hel"),
            RelayEvent::token("lo"),
            RelayEvent::Done,
        ]
    );

    let requests = server.received_requests().await.unwrap();
    let sent: Value = requests[0].body_json().unwrap();
    assert!(sent["systemInstruction"]["parts"][0]["text"].is_string());
    assert_eq!(sent["contents"][0]["role"], "user");
}
