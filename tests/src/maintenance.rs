use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use revpurge_core::couchdb::Step;
use revpurge_core::maintenance::{
    FailurePolicy, MaintenanceError, MaintenanceService, MaintenanceSettings,
};
use revpurge_core::scanner::NetworkScanner;
use serde_json::json;

use crate::couch::fake::FakeCouch;

const DB: &str = "inventory";
const BLOCK: &str = "127.0.0.0/29";
const FIRST: Ipv4Addr = Ipv4Addr::new(127, 0, 0, 1);
const SECOND: Ipv4Addr = Ipv4Addr::new(127, 0, 0, 2);

/// Two instances on the same port: the first lacks the target document.
async fn two_instances() -> (FakeCouch, FakeCouch) {
    let broken = FakeCouch::start(DB).await.unwrap();
    let healthy = FakeCouch::start_on(SocketAddr::new(IpAddr::V4(SECOND), broken.port()), DB)
        .await
        .unwrap();
    healthy.seed(DB, &["2-b", "1-a"], json!({ "owner": "ops" }));
    (broken, healthy)
}

fn service(port: u16, policy: FailurePolicy) -> MaintenanceService {
    let scanner = NetworkScanner::new(Arc::new(|addr: Ipv4Addr, _port: u16| {
        addr == FIRST || addr == SECOND
    }));
    let mut settings = MaintenanceSettings::new(DB, port);
    settings.request_timeout = Duration::from_secs(5);
    settings.policy = policy;
    MaintenanceService::new(scanner, settings).unwrap()
}

#[tokio::test]
async fn isolated_failure_does_not_stop_other_instances() {
    let (broken, healthy) = two_instances().await;

    let summary = service(broken.port(), FailurePolicy::Isolate)
        .run(BLOCK)
        .await
        .unwrap();

    assert_eq!(summary.discovered(), 2);
    assert_eq!(summary.succeeded(), 1);
    assert!(!summary.all_succeeded());

    let failed: Vec<_> = summary.failed().collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].host, FIRST);
    assert_eq!(
        failed[0].result.as_ref().unwrap_err().step,
        Step::FetchDocument
    );

    assert_eq!(healthy.compactions().len(), 1);
    assert_eq!(healthy.document(DB).unwrap()["owner"], "ops");
}

#[tokio::test]
async fn fail_fast_stops_at_first_failed_instance() {
    let (broken, healthy) = two_instances().await;

    let err = service(broken.port(), FailurePolicy::FailFast)
        .run(BLOCK)
        .await
        .unwrap_err();

    match err {
        MaintenanceError::Instance { host, source } => {
            assert_eq!(host, FIRST);
            assert_eq!(source.step, Step::FetchDocument);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(healthy.requests().is_empty());
}

#[tokio::test]
async fn instances_are_purged_in_address_order() {
    let (broken, healthy) = two_instances().await;
    broken.seed(DB, &["1-x"], json!({ "owner": "dev" }));

    let summary = service(broken.port(), FailurePolicy::FailFast)
        .run(BLOCK)
        .await
        .unwrap();

    let hosts: Vec<Ipv4Addr> = summary.outcomes.iter().map(|o| o.host).collect();
    assert_eq!(hosts, [FIRST, SECOND]);
    assert!(summary.all_succeeded());
    assert_eq!(broken.compactions().len(), 1);
    assert_eq!(healthy.compactions().len(), 1);
}
