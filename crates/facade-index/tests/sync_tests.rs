//! End-to-end synchronization tests against the fake backend.

mod common;

use std::time::Duration;

use facade_core::{Commit, Ref, RefType};
use facade_index::collect_all;
use facade_vcs::WebhookEvent;

use common::harness;

async fn settle(h: &common::Harness) {
    for _ in 0..50 {
        let infos = h.index.all_infos(10).await.unwrap();
        if infos.iter().all(|i| !i.scan_required) && h.scheduler.submit_pending().await.unwrap() == 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("scans did not settle");
}

#[tokio::test]
async fn test_rescan_cycle_indexes_discovered_repository() {
    let h = harness(true);

    let summary = h.scheduler.schedule_rescan().await.unwrap();
    assert_eq!(summary.discovered, 1);
    assert_eq!(h.scheduler.submit_pending().await.unwrap(), 1);
    settle(&h).await;

    let refs = collect_all(h.index.refs.as_ref(), Some(&h.repo.id), 10).await.unwrap();
    let commits = collect_all(h.index.commits.as_ref(), Some(&h.repo.id), 10).await.unwrap();
    assert_eq!(refs.len(), 3);
    assert_eq!(commits.len(), 4);
}

#[tokio::test]
async fn test_find_issue_after_scan() {
    let h = harness(true);
    h.scheduler.submit_now(&h.repo).await.unwrap().wait().await;

    let found = h.index.find_issue("BILL-12").await.unwrap();

    assert_eq!(found.len(), 1);
    let references = &found[0];
    assert_eq!(references.repository.id, h.repo.id);
    assert_eq!(references.branches.len(), 1);
    assert_eq!(references.branches[0].name, "feature/BILL-12");
    assert_eq!(references.commits.len(), 1);
    assert_eq!(references.pull_requests.len(), 1);
}

#[tokio::test]
async fn test_webhook_then_scan_converges() {
    let h = harness(true);
    h.scheduler.submit_now(&h.repo).await.unwrap().wait().await;

    h.client.add_commit(&h.repo, "c4", &["c3"], "BILL-13 hotfix");
    h.client.set_branch(&h.repo, "main", "c4");
    h.client.remove_branch(&h.repo, "feature/BILL-12");
    h.ingestor
        .ingest(
            "gitea",
            vec![WebhookEvent::Pushed {
                coordinates: h.repo.coordinates(),
                commit_ids: vec!["c4".to_string()],
            }],
        )
        .await
        .unwrap();
    assert!(
        h.index
            .commits
            .get(&Commit::id_for(&h.repo.id, "c4"))
            .await
            .unwrap()
            .is_some()
    );

    // The deleted branch was never announced; the next scan repairs it.
    h.scheduler.submit_now(&h.repo).await.unwrap().wait().await;

    let feature = Ref::id_for(&h.repo.id, RefType::Branch, "feature/BILL-12");
    assert!(h.index.refs.get(&feature).await.unwrap().is_none());
    let main = Ref::id_for(&h.repo.id, RefType::Branch, "main");
    assert_eq!(h.index.refs.get(&main).await.unwrap().unwrap().commit_id, "c4");
}

#[tokio::test]
async fn test_follower_still_ingests_webhooks() {
    let h = harness(false);

    h.ingestor
        .ingest(
            "gitea",
            vec![WebhookEvent::RefCreated {
                coordinates: h.repo.coordinates(),
                ref_type: RefType::Tag,
                name: "v1.0.0".to_string(),
            }],
        )
        .await
        .unwrap();

    let tag = Ref::id_for(&h.repo.id, RefType::Tag, "v1.0.0");
    assert!(h.index.refs.get(&tag).await.unwrap().is_some());
    assert_eq!(h.scheduler.schedule_rescan().await.unwrap().discovered, 0);
}
