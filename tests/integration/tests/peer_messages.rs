//! Integration test: a connector's handling of route messages from a single peer.
//!
//! The peer is a bare recording account, so every message the connector
//! sends back can be observed.

use std::sync::Arc;
use std::time::Duration;

use connector_core::{CustomMessage, RequestMessage, METHOD_BROADCAST_ROUTES};
use connector_integration_tests::{
    connector, eventually, recording_account, test_config, LedgerSpec, RecordingHandler,
};
use connector_ledgers::{InMemoryLedger, LedgerBus, LedgerClient, LedgerError};
use connector_node::Connector;
use connector_routing::RoutingUpdate;
use serde_json::{json, Value};

struct Setup {
    connector: Connector,
    mark: Arc<InMemoryLedger>,
    recorder: Arc<RecordingHandler>,
}

async fn setup() -> Setup {
    let bus = LedgerBus::new();
    let connector = connector(
        &bus,
        "connie",
        test_config(),
        &[
            LedgerSpec { prefix: "usd-ledger.", currency: "USD", connectors: &[] },
            LedgerSpec { prefix: "eur-ledger.", currency: "EUR", connectors: &["mark"] },
        ],
    )
    .await;
    let (mark, recorder) = recording_account(&bus, "eur-ledger.", "mark").await;
    Setup { connector, mark, recorder }
}

fn routes_message(data: Value) -> RequestMessage {
    RequestMessage::with_custom(
        "eur-ledger.",
        "eur-ledger.mark",
        "eur-ledger.connie",
        CustomMessage::new(METHOD_BROADCAST_ROUTES, data),
    )
}

fn advertisement(source_account: &str, destination: &str) -> Value {
    json!({
        "new_routes": [{
            "source_ledger": "eur-ledger.",
            "source_account": source_account,
            "destination_ledger": destination,
            "points": [[0, 0], [1000000, 1500000]],
            "min_message_window": 1000
        }],
        "hold_down_time": 45000,
        "unreachable_through_me": []
    })
}

#[tokio::test]
async fn test_heartbeat_refreshes_without_broadcast() {
    let s = setup().await;
    let heartbeat = RoutingUpdate::heartbeat(Duration::from_secs(90)).to_value().unwrap();
    s.mark.send_request(routes_message(heartbeat)).await.unwrap();

    let peer = s.connector.routing_table().peer("eur-ledger.mark").unwrap();
    assert!(peer.hold_down_expires_at > peer.last_refreshed);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(s.recorder.count(), 0);
}

#[tokio::test]
async fn test_new_route_triggers_one_broadcast() {
    let s = setup().await;
    let payload = advertisement("eur-ledger.mark", "cad-ledger.");
    s.mark.send_request(routes_message(payload.clone())).await.unwrap();

    assert!(s.connector.routing_table().best_route_for("cad-ledger.carl").is_some());
    let recorder = Arc::clone(&s.recorder);
    assert!(eventually(Duration::from_secs(2), || recorder.count() == 1).await);

    let request = s.recorder.requests().remove(0);
    assert_eq!(request.from, "eur-ledger.connie");
    let custom = request.custom.unwrap();
    let (update, _) = RoutingUpdate::parse(&custom.data).unwrap();
    assert!(update
        .new_routes
        .iter()
        .any(|r| r.destination_ledger == "usd-ledger." && r.source_account == "eur-ledger.connie"));
    // routes learned on eur-ledger are not offered back onto it
    assert!(update.new_routes.iter().all(|r| r.destination_ledger != "cad-ledger."));

    // the identical advertisement changes nothing and is not re-broadcast
    s.mark.send_request(routes_message(payload)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(s.recorder.count(), 1);
}

#[tokio::test]
async fn test_impersonated_and_peer_routes_are_dropped() {
    let s = setup().await;
    s.mark
        .send_request(routes_message(advertisement("eur-ledger.mary", "cad-ledger.")))
        .await
        .unwrap();
    s.mark
        .send_request(routes_message(advertisement("eur-ledger.mark", "peer.cad.")))
        .await
        .unwrap();

    let table = s.connector.routing_table();
    assert!(table.best_route_for("cad-ledger.carl").is_none());
    assert!(table.best_route_for("peer.cad.carl").is_none());
    assert!(table.routes_from("eur-ledger.mark").is_empty());

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(s.recorder.count(), 0);
}

#[tokio::test]
async fn test_withdrawal_removes_route() {
    let s = setup().await;
    s.mark
        .send_request(routes_message(advertisement("eur-ledger.mark", "cad-ledger.")))
        .await
        .unwrap();
    assert!(s.connector.routing_table().best_route_for("cad-ledger.carl").is_some());

    let withdrawal = json!({
        "new_routes": [],
        "hold_down_time": 45000,
        "unreachable_through_me": ["cad-ledger."]
    });
    s.mark.send_request(routes_message(withdrawal)).await.unwrap();
    assert!(s.connector.routing_table().best_route_for("cad-ledger.carl").is_none());

    // the withdrawal is passed on to peers
    let recorder = Arc::clone(&s.recorder);
    assert!(
        eventually(Duration::from_secs(2), || {
            recorder.requests().iter().any(|r| {
                r.custom
                    .as_ref()
                    .and_then(|c| RoutingUpdate::parse(&c.data).ok())
                    .is_some_and(|(u, _)| u.unreachable_through_me.contains(&"cad-ledger.".to_string()))
            })
        })
        .await
    );
}

#[tokio::test]
async fn test_malformed_and_unknown_messages() {
    let s = setup().await;

    let empty = RequestMessage {
        ledger: "eur-ledger.".into(),
        from: "eur-ledger.mark".into(),
        to: "eur-ledger.connie".into(),
        ilp: None,
        custom: None,
    };
    assert!(matches!(
        s.mark.send_request(empty).await,
        Err(LedgerError::RequestFailed { .. })
    ));

    let unknown = RequestMessage::with_custom(
        "eur-ledger.",
        "eur-ledger.mark",
        "eur-ledger.connie",
        CustomMessage::new("fetch_everything", json!({})),
    );
    let response = s.mark.send_request(unknown).await.unwrap();
    assert!(response.ilp.is_none());
    assert!(response.custom.is_none());
}
