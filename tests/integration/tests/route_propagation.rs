//! Integration test: two connectors learning and withdrawing routes over a shared ledger.
//!
//! Connector A (connie) sits on usd-ledger and eur-ledger, connector B (mark)
//! on eur-ledger and cad-ledger. Neither can reach the other's far ledger
//! until routes have been exchanged over eur-ledger.

use std::sync::Arc;
use std::time::Duration;

use connector_core::{Packet, QuoteBySourceRequest, RequestMessage};
use connector_integration_tests::{connector, test_config, eventually, LedgerSpec};
use connector_ledgers::{InMemoryLedger, LedgerBus, LedgerClient};
use connector_node::Connector;
use connector_quoting::{QuoteBySourceParams, QuoteError};

const TIMEOUT: Duration = Duration::from_secs(2);

async fn two_connectors(bus: &Arc<LedgerBus>) -> (Connector, Connector) {
    let a = connector(
        bus,
        "connie",
        test_config(),
        &[
            LedgerSpec { prefix: "usd-ledger.", currency: "USD", connectors: &[] },
            LedgerSpec { prefix: "eur-ledger.", currency: "EUR", connectors: &["mark"] },
        ],
    )
    .await;
    let b = connector(
        bus,
        "mark",
        test_config(),
        &[
            LedgerSpec { prefix: "eur-ledger.", currency: "EUR", connectors: &["connie"] },
            LedgerSpec { prefix: "cad-ledger.", currency: "CAD", connectors: &[] },
        ],
    )
    .await;
    (a, b)
}

fn usd_to_cad(amount: u64) -> QuoteBySourceParams {
    QuoteBySourceParams {
        source_account: "usd-ledger.alice".into(),
        destination_account: "cad-ledger.carl".into(),
        source_amount: amount,
        destination_hold_duration: None,
    }
}

#[tokio::test]
async fn test_routes_propagate_between_connectors() {
    let bus = LedgerBus::new();
    let (mut a, mut b) = two_connectors(&bus).await;

    // nothing has been advertised yet
    let err = a.route_builder().quote_by_source(usd_to_cad(1_000)).await.unwrap_err();
    assert!(matches!(err, QuoteError::NoRouteFound { .. }));

    a.start().await.unwrap();
    b.start().await.unwrap();

    let a_table = Arc::clone(a.routing_table());
    assert!(eventually(TIMEOUT, || a_table.best_route_for("cad-ledger.carl").is_some()).await);
    let b_table = Arc::clone(b.routing_table());
    assert!(eventually(TIMEOUT, || b_table.best_route_for("usd-ledger.bob").is_some()).await);

    // usd -> eur at 0.5 locally, eur -> cad at 1.5 through mark, 0.1% slippage per hop
    let quote = a.route_builder().quote_by_source(usd_to_cad(1_000)).await.unwrap();
    assert_eq!(quote.destination_amount, 748);
    assert_eq!(quote.next_hop.as_deref(), Some("eur-ledger.mark"));
    assert_eq!(quote.source_hold_duration, Duration::from_secs(7));

    a.shutdown().await.unwrap();
    b.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_quote_packet_over_the_ledger() {
    let bus = LedgerBus::new();
    let (mut a, mut b) = two_connectors(&bus).await;
    a.start().await.unwrap();
    b.start().await.unwrap();

    let a_table = Arc::clone(a.routing_table());
    assert!(eventually(TIMEOUT, || a_table.best_route_for("cad-ledger.carl").is_some()).await);

    let alice = InMemoryLedger::new(Arc::clone(&bus), "usd-ledger.", "alice", "USD");
    alice.connect().await.unwrap();
    let request = RequestMessage::with_packet(
        "usd-ledger.",
        "usd-ledger.alice",
        "usd-ledger.connie",
        &Packet::QuoteBySourceRequest(QuoteBySourceRequest {
            destination_account: "cad-ledger.carl".into(),
            source_amount: 1_000,
            destination_hold_duration: 5_000,
        }),
    );
    let response = alice.send_request(request).await.unwrap();
    match response.packet().unwrap().unwrap() {
        Packet::QuoteBySourceResponse(resp) => {
            assert_eq!(resp.destination_amount, 748);
            assert_eq!(resp.source_hold_duration, 7_000);
        }
        other => panic!("unexpected packet: {:?}", other),
    }

    // an unknown destination comes back as an error packet naming the connector
    let request = RequestMessage::with_packet(
        "usd-ledger.",
        "usd-ledger.alice",
        "usd-ledger.connie",
        &Packet::QuoteBySourceRequest(QuoteBySourceRequest {
            destination_account: "jpy-ledger.jun".into(),
            source_amount: 1_000,
            destination_hold_duration: 5_000,
        }),
    );
    let response = alice.send_request(request).await.unwrap();
    match response.packet().unwrap().unwrap() {
        Packet::Error(err) => {
            assert_eq!(err.code, "F02");
            assert_eq!(err.forwarded_by, vec!["usd-ledger.connie".to_string()]);
        }
        other => panic!("unexpected packet: {:?}", other),
    }

    a.shutdown().await.unwrap();
    b.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_removed_ledger_is_withdrawn_downstream() {
    let bus = LedgerBus::new();
    let (mut a, mut b) = two_connectors(&bus).await;
    a.start().await.unwrap();
    b.start().await.unwrap();

    let a_table = Arc::clone(a.routing_table());
    assert!(eventually(TIMEOUT, || a_table.best_route_for("cad-ledger.carl").is_some()).await);

    let lost = b.remove_ledger("cad-ledger.").await.unwrap();
    assert!(lost.contains(&"cad-ledger.".to_string()));

    assert!(eventually(TIMEOUT, || a_table.best_route_for("cad-ledger.carl").is_none()).await);
    let err = a.route_builder().quote_by_source(usd_to_cad(1_000)).await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "No route found from: usd-ledger.alice to: cad-ledger.carl"
    );

    a.shutdown().await.unwrap();
    b.shutdown().await.unwrap();
}
