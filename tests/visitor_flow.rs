//! Visitor flow against the mock visitor-management API

mod common;

use std::time::Duration;

use axum::http::Method;
use serde_json::Value;
use turnstile::client::Endpoint;
use turnstile::config::TargetConfig;
use turnstile::metrics::{CHECKS, HTTP_REQ_FAILED, HTTP_REQS, Metrics};
use turnstile::scenarios::{
    ACTIVE_VISITORS, API_SUCCESS_RATE, CONNECTION_ERRORS, Identity, Scenario, TOTAL_REQUESTS,
    VISITOR_CREATION_TIME, VisitorFlowScenario, check_label, run_flow,
};
use turnstile_testkit::{MockVisitorApi, PseudoGenerator, unreachable_url};

use common::{API_KEY, API_SECRET, context, mock_context, target};

#[tokio::test]
async fn successful_iteration_hits_all_seven_endpoints() {
    let server = MockVisitorApi::new()
        .with_token(API_KEY, API_SECRET)
        .spawn()
        .await
        .unwrap();
    let metrics = Metrics::new();
    let ctx = mock_context(&server, metrics.clone());

    assert!(VisitorFlowScenario.iteration(&ctx).await);

    let requests = server.requests();
    let called: Vec<_> = requests
        .iter()
        .map(|r| r.api_method().unwrap().to_string())
        .collect();
    let expected: Vec<_> = Endpoint::FLOW
        .iter()
        .map(|e| e.method_path().to_string())
        .collect();
    assert_eq!(called, expected);

    let expected_auth = format!("token {API_KEY}:{API_SECRET}");
    for request in &requests {
        assert_eq!(request.authorization.as_deref(), Some(expected_auth.as_str()));
        assert_eq!(request.content_type.as_deref(), Some("application/json"));
    }

    let login = &requests[0];
    assert_eq!(login.method, Method::POST);
    assert_eq!(login.body, "{}");

    let mobile = &requests[3].query["mobile"];
    assert_eq!(mobile.len(), 10);
    assert!(mobile.starts_with("892594"));
    assert_eq!(requests[4].query["mobile"], *mobile);
    assert_eq!(requests[4].query["otp"], "341470");

    assert_eq!(
        requests[6].raw_query.as_deref(),
        Some("location=Open%20Work%20Space%202%20-%20IITMRP%20E%20Block")
    );

    let created = server.created_visitors();
    assert_eq!(created.len(), 1);
    let record = &created[0];
    let visitor_name = record["visitor_name"].as_str().unwrap();
    let test_id = visitor_name.strip_prefix("Visitor-").unwrap();
    assert_eq!(test_id.len(), 6);
    assert_eq!(record["organisation_institution"], format!("Org-{test_id}"));
    assert_eq!(record["email"], format!("visitor{test_id}@test.com"));
    assert_eq!(record["mobile_number"], Value::String(mobile.clone()));
    assert_eq!(record["image"], Value::Null);
    assert_eq!(record["type_of_visit"], "Meeting");
    assert_eq!(record["referral_name"], "EMP4_FH");
    assert_eq!(record["reason"], "Performance Test");

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.count(TOTAL_REQUESTS), Some(7.0));
    assert_eq!(snapshot.count(HTTP_REQS), Some(7.0));
    assert_eq!(snapshot.rate(CHECKS), Some(1.0));
    assert_eq!(snapshot.rate(API_SUCCESS_RATE), Some(1.0));
    assert_eq!(snapshot.rate(HTTP_REQ_FAILED), Some(0.0));
    assert_eq!(snapshot.count(CONNECTION_ERRORS), None);

    let active = snapshot.gauge(ACTIVE_VISITORS).unwrap();
    assert_eq!(active.value, 0.0);
    assert_eq!(active.max, 1.0);
    assert!(snapshot.trend(VISITOR_CREATION_TIME).unwrap().max > 0.0);

    for endpoint in Endpoint::FLOW {
        let tally = snapshot.checks[check_label(endpoint)];
        assert_eq!((tally.passes, tally.fails), (1, 0));
    }
}

#[tokio::test]
async fn rejected_otp_fails_only_its_check() {
    let server = MockVisitorApi::new().with_otp("000000").spawn().await.unwrap();
    let metrics = Metrics::new();
    let ctx = mock_context(&server, metrics.clone());

    assert!(!VisitorFlowScenario.iteration(&ctx).await);

    // The flow keeps going after a non-200
    assert_eq!(server.requests().len(), 7);
    assert_eq!(server.created_visitors().len(), 1);

    let snapshot = metrics.snapshot();
    let otp = snapshot.checks["Verify OTP successful"];
    assert_eq!((otp.passes, otp.fails), (0, 1));
    let create = snapshot.checks["Create Visitor successful"];
    assert_eq!((create.passes, create.fails), (1, 0));

    let checks_rate = snapshot.rate(CHECKS).unwrap();
    assert!((checks_rate - 6.0 / 7.0).abs() < 1e-9);
    assert_eq!(snapshot.rate(API_SUCCESS_RATE), Some(0.0));
    assert_eq!(snapshot.count(CONNECTION_ERRORS), None);
}

#[tokio::test]
async fn failing_endpoint_is_reported_per_step() {
    let server = MockVisitorApi::new()
        .failing("visitor.get_referral", 500)
        .spawn()
        .await
        .unwrap();
    let ctx = mock_context(&server, Metrics::new());

    let identity = Identity::generate(&mut PseudoGenerator::new(42), "892594");
    let steps = run_flow(&ctx, &identity).await.unwrap();

    assert!(!steps.all_passed());
    assert_eq!(steps.get(Endpoint::GetReferrals), Some(false));
    assert_eq!(steps.get(Endpoint::GetOrganizations), Some(true));
    assert_eq!(steps.failed(), vec![Endpoint::GetReferrals]);

    let generated = &server.requests_to("visitor.generate_and_send_otp")[0];
    assert_eq!(generated.query["mobile"], identity.mobile);
}

#[tokio::test]
async fn connection_refused_counts_a_connection_error() {
    let target = target_for_unreachable();
    let metrics = Metrics::new();
    let ctx = context(&target, metrics.clone(), Duration::from_secs(5));

    assert!(!VisitorFlowScenario.iteration(&ctx).await);

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.count(CONNECTION_ERRORS), Some(1.0));
    assert_eq!(snapshot.count(TOTAL_REQUESTS), Some(1.0));
    assert_eq!(snapshot.rate(API_SUCCESS_RATE), Some(0.0));
    assert_eq!(snapshot.rate(HTTP_REQ_FAILED), Some(1.0));
    // Aborted iterations record no checks
    assert!(snapshot.checks.is_empty());
    assert_eq!(snapshot.gauge(ACTIVE_VISITORS).unwrap().value, 0.0);
}

#[tokio::test]
async fn timeout_aborts_the_iteration() {
    let server = MockVisitorApi::new()
        .with_latency(Duration::from_millis(500))
        .spawn()
        .await
        .unwrap();
    let metrics = Metrics::new();
    let ctx = context(&target(&server), metrics.clone(), Duration::from_millis(100));

    assert!(!VisitorFlowScenario.iteration(&ctx).await);

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.count(CONNECTION_ERRORS), Some(1.0));
    assert!(snapshot.checks.is_empty());
}

fn target_for_unreachable() -> TargetConfig {
    let url = unreachable_url().unwrap();
    TargetConfig {
        base_url: url.clone(),
        health_urls: vec![format!("{url}/security_desk/visitor")],
        ..Default::default()
    }
}
