//! Tests de webhooks y endpoints de admin sobre el indice.

mod helpers;

use std::time::Duration;

use axum::http::StatusCode;
use serde_json::Value;

use facade_core::Commit;
use facade_server::Settings;
use facade_server::signature::sign;
use facade_vcs::WebhookEvent;
use facade_vcs::testing::{FAKE_SIGNATURE_HEADER, FakeVcsClient};
use helpers::{SSH_URL, TestApp, app, app_with, encode};

const WEBHOOK_URI: &str = "/rest/api/1/webhooks/gitea";

fn push_body(app: &TestApp, commit_ids: &[&str]) -> Vec<u8> {
    serde_json::to_vec(&vec![WebhookEvent::Pushed {
        coordinates: app.repo.coordinates(),
        commit_ids: commit_ids.iter().map(|c| c.to_string()).collect(),
    }])
    .unwrap()
}

async fn wait_until_scanned(app: &TestApp) -> Value {
    for _ in 0..100 {
        let report: Value = app.client.get("/rest/api/1/admin/index-report").await.json();
        if report[0]["lastScanAt"].is_string() {
            return report;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("repository was never scanned");
}

// === Webhooks ===

#[tokio::test]
async fn push_webhook_indexes_commits() {
    let app = app();
    let body = push_body(&app, &["c1", "c2"]);

    let response = app.client.post_bytes(WEBHOOK_URI, vec![], body).await;

    response.assert_status(StatusCode::ACCEPTED);
    assert_eq!(response.json::<Value>()["events"], 1);

    let ids = [
        Commit::id_for(&app.repo.id, "c1"),
        Commit::id_for(&app.repo.id, "c2"),
    ];
    for _ in 0..100 {
        let c1 = app.state.index.commits.get(&ids[0]).await.unwrap();
        let c2 = app.state.index.commits.get(&ids[1]).await.unwrap();
        if c1.is_some() && c2.is_some() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("pushed commits were not indexed");
}

#[tokio::test]
async fn webhook_without_signature_is_rejected_when_secret_configured() {
    let app = app_with(FakeVcsClient::new("gitea"), Settings::default(), Some("s3cret"));
    let body = push_body(&app, &["c1"]);

    app.client
        .post_bytes(WEBHOOK_URI, vec![], body)
        .await
        .assert_status(StatusCode::UNAUTHORIZED)
        .assert_error_code("INVALID_SIGNATURE");
}

#[tokio::test]
async fn webhook_with_valid_signature_is_accepted() {
    let app = app_with(FakeVcsClient::new("gitea"), Settings::default(), Some("s3cret"));
    let body = push_body(&app, &["c1"]);
    let signature = sign("s3cret", &body);

    app.client
        .post_bytes(WEBHOOK_URI, vec![(FAKE_SIGNATURE_HEADER, signature.as_str())], body)
        .await
        .assert_status(StatusCode::ACCEPTED);
}

#[tokio::test]
async fn webhook_with_wrong_signature_is_rejected() {
    let app = app_with(FakeVcsClient::new("gitea"), Settings::default(), Some("s3cret"));
    let body = push_body(&app, &["c1"]);
    let signature = sign("other", &body);

    app.client
        .post_bytes(WEBHOOK_URI, vec![(FAKE_SIGNATURE_HEADER, signature.as_str())], body)
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn webhook_for_unknown_backend_is_not_found() {
    let app = app();
    let body = push_body(&app, &["c1"]);

    app.client
        .post_bytes("/rest/api/1/webhooks/gitlab", vec![], body)
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_webhook_is_bad_request() {
    app()
        .client
        .post_bytes(WEBHOOK_URI, vec![], b"{not json".to_vec())
        .await
        .assert_status(StatusCode::BAD_REQUEST)
        .assert_error_code("INVALID_ARGUMENT");
}

// === Admin ===

#[tokio::test]
async fn admin_scan_then_find_issue() {
    let app = app();
    let uri = format!("/rest/api/1/admin/scan?sshUrl={}", encode(SSH_URL));

    let response = app.client.post_bytes(&uri, vec![], vec![]).await;
    response.assert_status(StatusCode::ACCEPTED);
    let body: Value = response.json();
    assert_eq!(body["repositoryId"], app.repo.id.as_str());
    assert_eq!(body["submitted"], true);

    let report = wait_until_scanned(&app).await;
    assert_eq!(report.as_array().unwrap().len(), 1);
    assert_eq!(report[0]["scanRequired"], false);

    let found: Value = app.client.get("/rest/api/1/repository/find/BILL-12").await.json();
    assert_eq!(found.as_array().unwrap().len(), 1);
    assert_eq!(found[0]["branches"][0]["name"], "feature/BILL-12");
    assert_eq!(found[0]["commits"][0]["hash"], "f1");
    assert_eq!(found[0]["pullRequests"][0]["index"], 1);
}

#[tokio::test]
async fn find_rejects_malformed_issue_key() {
    app()
        .client
        .get("/rest/api/1/repository/find/bill-12")
        .await
        .assert_status(StatusCode::BAD_REQUEST)
        .assert_error_code("INVALID_ARGUMENT");
}

#[tokio::test]
async fn admin_scan_of_unknown_repository_is_not_found() {
    let uri = format!(
        "/rest/api/1/admin/scan?sshUrl={}",
        encode("ssh://git@gitea.example.com/platform/ghost.git")
    );
    app()
        .client
        .post_bytes(&uri, vec![], vec![])
        .await
        .assert_status(StatusCode::NOT_FOUND);
}
