//! Integration tests for the triage REST API.
//!
//! Each test spins up an Axum server on a random port and drives it with
//! reqwest, exercising the real wire contract of a verdict.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::time::timeout;

use mailguard::analyzers::{Analyzer, AnalyzerInput, AnalyzerSet};
use mailguard::api::triage_routes;
use mailguard::config::TriageConfig;
use mailguard::error::AnalyzerError;
use mailguard::triage::{RiskVerdict, Signal, SignalKind, TriageCoordinator};

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Analyzer returning a fixed score, or failing when `score` is `None`.
struct FixedAnalyzer {
    kind: SignalKind,
    score: Option<i64>,
}

#[async_trait]
impl Analyzer for FixedAnalyzer {
    fn kind(&self) -> SignalKind {
        self.kind
    }

    async fn analyze(&self, _input: &AnalyzerInput) -> Result<Signal, AnalyzerError> {
        match self.score {
            Some(score) => Ok(Signal::new(score, format!("fixed score {score}"))),
            None => Err(AnalyzerError::Failed {
                name: self.kind.tool_name().to_string(),
                reason: "service unavailable".into(),
            }),
        }
    }
}

fn fixed_set(url: Option<i64>, domain: Option<i64>, attachment: Option<i64>, social: Option<i64>) -> AnalyzerSet {
    [
        (SignalKind::Url, url),
        (SignalKind::Domain, domain),
        (SignalKind::Attachment, attachment),
        (SignalKind::SocialEngineering, social),
    ]
    .into_iter()
    .fold(AnalyzerSet::new(), |set, (kind, score)| {
        set.with(Arc::new(FixedAnalyzer { kind, score }))
    })
}

/// Start an Axum server on a random port, return its base URL.
async fn start_server(analyzers: AnalyzerSet) -> String {
    let coordinator = Arc::new(TriageCoordinator::new(analyzers, TriageConfig::default()));
    let app = triage_routes(coordinator);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Give the server a moment to start accepting connections.
    tokio::time::sleep(Duration::from_millis(50)).await;

    format!("http://127.0.0.1:{port}")
}

async fn post_triage(base: &str, body: Value) -> reqwest::Response {
    reqwest::Client::new()
        .post(format!("{base}/api/triage"))
        .json(&body)
        .send()
        .await
        .unwrap()
}

fn phishing_request() -> Value {
    json!({
        "sender_email": "attacker@malicious.com",
        "subject": "URGENT: Verify your account now!",
        "body": "Click here: http://192.168.1.1/phishing to verify your account immediately.",
        "attachments": [{"filename": "invoice.pdf.exe", "mime_type": "application/x-msdownload"}]
    })
}

#[tokio::test]
async fn rest_health() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server(AnalyzerSet::new()).await;

        let resp = reqwest::get(format!("{base}/health")).await.unwrap();
        assert_eq!(resp.status(), 200);

        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "mailguard");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn rest_triage_blocks_malicious_sender() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server(fixed_set(Some(0), Some(100), Some(100), Some(0))).await;

        let resp = post_triage(&base, phishing_request()).await;
        assert_eq!(resp.status(), 200);

        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["final_risk_score"], 65);
        assert_eq!(body["classification"], "malicious");
        assert_eq!(body["recommended_action"], "block_sender");
        assert_eq!(
            body["aggregated_scores"],
            json!({
                "url_risk": 0,
                "domain_risk": 100,
                "attachment_risk": 100,
                "social_engineering_risk": 0
            })
        );
        assert_eq!(body["archestra_metadata"]["requires_escalation"], true);
        assert_eq!(body["tool_execution_trace"].as_array().unwrap().len(), 4);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn rest_triage_survives_failed_analyzer() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server(fixed_set(Some(100), None, Some(0), Some(100))).await;

        let resp = post_triage(&base, phishing_request()).await;
        assert_eq!(resp.status(), 200);

        let verdict: RiskVerdict = resp.json().await.unwrap();
        assert_eq!(verdict.tool_execution_trace.len(), 4);
        let domain = &verdict.tool_execution_trace[1];
        assert_eq!(domain.tool_name, "check_domain_reputation");
        assert!(domain.output_summary.contains("service unavailable"));
        assert_eq!(verdict.aggregated_scores.domain_risk, 0);
        assert_eq!(verdict.final_risk_score, 35);
        assert_eq!(verdict.recommended_action.as_str(), "escalate_to_soc");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn rest_triage_total_outage_is_safe() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server(fixed_set(None, None, None, None)).await;

        let resp = post_triage(&base, phishing_request()).await;
        assert_eq!(resp.status(), 200);

        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["final_risk_score"], 0);
        assert_eq!(body["classification"], "safe");
        assert_eq!(body["recommended_action"], "allow");
        assert_eq!(body["confidence_percentage"], 0);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn rest_triage_without_attachments_skips_attachment_analyzer() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server(fixed_set(Some(10), Some(10), Some(100), Some(10))).await;

        let resp = post_triage(
            &base,
            json!({
                "sender_email": "friend@example.com",
                "subject": "Weekend",
                "body": "Hiking on Saturday?"
            }),
        )
        .await;
        assert_eq!(resp.status(), 200);

        let body: Value = resp.json().await.unwrap();
        let tools: Vec<&str> = body["tool_execution_trace"]
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["tool_name"].as_str().unwrap())
            .collect();
        assert_eq!(
            tools,
            vec!["scan_urls", "check_domain_reputation", "detect_social_engineering"]
        );
        assert_eq!(body["aggregated_scores"]["attachment_risk"], 0);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn rest_triage_rejects_missing_sender() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server(fixed_set(Some(0), Some(0), Some(0), Some(0))).await;

        let resp = post_triage(&base, json!({"subject": "hello", "body": "world"})).await;
        assert_eq!(resp.status(), 400);

        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["error"], "Missing sender address");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn rest_triage_mistyped_body_is_json_bad_request() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server(fixed_set(Some(0), Some(0), Some(0), Some(0))).await;

        let resp = post_triage(
            &base,
            json!({"sender_email": 5, "subject": "hello", "body": "world"}),
        )
        .await;
        assert_eq!(resp.status(), 400);

        let body: Value = resp.json().await.unwrap();
        let message = body["error"].as_str().unwrap();
        assert!(message.starts_with("Malformed request body:"), "{message}");
    })
    .await
    .expect("test timed out");
}
