//! Health probe against the mock and against closed ports

mod common;

use std::time::Duration;

use turnstile::config::TargetConfig;
use turnstile::metrics::{CHECKS, Metrics};
use turnstile::scenarios::{HealthScenario, ProbeStatus, Scenario, probe_label};
use turnstile_testkit::{MockVisitorApi, unreachable_url};

use common::{context, mock_context};

#[tokio::test]
async fn accessible_endpoints_pass() {
    let server = MockVisitorApi::new().spawn().await.unwrap();
    let metrics = Metrics::new();
    let ctx = mock_context(&server, metrics.clone());

    assert!(HealthScenario.iteration(&ctx).await);

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.rate(CHECKS), Some(1.0));
    assert_eq!(snapshot.checks[&probe_label(0)].passes, 1);
    assert_eq!(snapshot.checks[&probe_label(1)].passes, 1);

    // Probes carry no API headers
    for request in server.requests() {
        assert_eq!(request.authorization, None);
    }
}

#[tokio::test]
async fn error_status_is_distinct_from_unreachable() {
    let server = MockVisitorApi::new()
        .with_health_status(503)
        .spawn()
        .await
        .unwrap();
    let ctx = mock_context(&server, Metrics::new());

    let outcomes = HealthScenario::probe_all(&ctx).await;
    assert_eq!(
        outcomes,
        vec![ProbeStatus::Unexpected(503), ProbeStatus::Accessible]
    );
}

#[tokio::test]
async fn closed_port_is_unreachable() {
    let url = unreachable_url().unwrap();
    let target = TargetConfig {
        health_urls: vec![
            format!("{url}/security_desk/visitor"),
            format!("{url}/api/method/visitor_management.custom_api.visitor.get_org"),
        ],
        ..TargetConfig::default()
    };
    let metrics = Metrics::new();
    let ctx = context(&target, metrics.clone(), Duration::from_secs(10));

    let outcomes = HealthScenario::probe_all(&ctx).await;
    assert_eq!(
        outcomes,
        vec![ProbeStatus::Unreachable, ProbeStatus::Unreachable]
    );

    // Failed checks are recorded, never raised
    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.rate(CHECKS), Some(0.0));
    assert_eq!(snapshot.checks[&probe_label(0)].fails, 1);
}
