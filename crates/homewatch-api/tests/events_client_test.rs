// Integration tests for `EventsClient` using wiremock.

use serde_json::json;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use homewatch_api::{Error, EventsClient, RawNotification};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, EventsClient) {
    let server = MockServer::start().await;
    let base = url::Url::parse(&server.uri()).unwrap();
    let client = EventsClient::with_client(reqwest::Client::new(), base);
    (server, client)
}

fn stored_event(id: u64) -> serde_json::Value {
    json!({
        "id": id,
        "type": "motion_detected",
        "device_id": "raspberry-1",
        "timestamp": "2026-10-15T08:00:00Z",
        "event_id": format!("evt-{id}"),
        "source": "PIR",
        "source_name": "PIR Entrée",
        "location": "Maison",
        "data": {},
        "mqtt_topic": null,
        "original_timestamp": null,
        "metadata": {}
    })
}

// ── Happy-path tests ────────────────────────────────────────────────

#[tokio::test]
async fn test_submit_returns_ack() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/events"))
        .and(body_json(json!({
            "type": "button_pressed",
            "device_id": "raspberry-2",
            "details": { "source": "Button" }
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "success": true,
            "event": { "id": 1_760_515_200_000_u64, "type": "button_pressed", "timestamp": "2026-10-15T08:00:00Z" }
        })))
        .mount(&server)
        .await;

    let raw = RawNotification::new("button_pressed", "raspberry-2").with_detail("source", "Button");
    let ack = client.submit(&raw).await.unwrap();

    assert_eq!(ack.id, 1_760_515_200_000);
    assert_eq!(ack.event_type, "button_pressed");
}

#[tokio::test]
async fn test_recent_passes_limit() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/events"))
        .and(query_param("limit", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([stored_event(2), stored_event(1)])))
        .mount(&server)
        .await;

    let events = client.recent(Some(2)).await.unwrap();

    assert_eq!(events.len(), 2);
    assert_eq!(events[0].id, 2);
    assert_eq!(events[1].source_name, "PIR Entrée");
}

#[tokio::test]
async fn test_get_event() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/events/7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(stored_event(7)))
        .mount(&server)
        .await;

    let event = client.get_event(7).await.unwrap();
    assert_eq!(event.event_id, "evt-7");
    assert_eq!(event.location, "Maison");
}

#[tokio::test]
async fn test_ping() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/ping"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "pong": true, "timestamp": "2026-10-15T08:00:00Z" })),
        )
        .mount(&server)
        .await;

    assert!(client.ping().await.unwrap().pong);
}

// ── Error-path tests ────────────────────────────────────────────────

#[tokio::test]
async fn test_submit_validation_error_is_rejected() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/events"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "success": false,
            "error": "Missing required field: device_id"
        })))
        .mount(&server)
        .await;

    let raw = RawNotification {
        event_type: Some("motion_detected".into()),
        ..RawNotification::default()
    };
    let err = client.submit(&raw).await.unwrap_err();

    match err {
        Error::Rejected { status, message } => {
            assert_eq!(status, 400);
            assert_eq!(message, "Missing required field: device_id");
        }
        other => panic!("expected Rejected, got {other:?}"),
    }
}

#[tokio::test]
async fn test_submit_internal_failure_is_server_error() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/events"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "success": false,
            "error": "broadcast failed"
        })))
        .mount(&server)
        .await;

    let err = client
        .submit(&RawNotification::new("motion_detected", "raspberry-1"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Server { status: 500, .. }));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn test_get_missing_event_is_not_found() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/events/404"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "error": "Event not found" })))
        .mount(&server)
        .await;

    let err = client.get_event(404).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_malformed_body_is_deserialization_error() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/events"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>proxy error</html>"))
        .mount(&server)
        .await;

    let err = client.recent(None).await.unwrap_err();
    match err {
        Error::Deserialization { body, .. } => assert!(body.contains("proxy error")),
        other => panic!("expected Deserialization, got {other:?}"),
    }
}
