//! Shared fixtures for index integration tests.

use std::sync::Arc;

use facade_core::Repository;
use facade_index::{
    ExecutorSettings, IndexStore, ScanExecutor, ScanSettings, Scanner, StaticLeadership,
    SyncScheduler, WebhookIngestor,
};
use facade_vcs::testing::FakeVcsClient;
use facade_vcs::{Backend, BackendRegistry};

/// A fake backend with one repository, wired to every index component.
pub struct Harness {
    pub client: FakeVcsClient,
    pub repo: Repository,
    pub index: IndexStore,
    pub scheduler: Arc<SyncScheduler>,
    pub ingestor: WebhookIngestor,
}

/// Builds a harness whose repository has history
/// `c1 <- c2 <- c3` on `main` and `c2 <- f1` on `feature/BILL-12`.
pub fn harness(leader: bool) -> Harness {
    let client = FakeVcsClient::new("gitea");
    let repo = client.add_repository("platform", "billing");
    client.add_commit(&repo, "c1", &[], "Initial import");
    client.add_commit(&repo, "c2", &["c1"], "BILL-11 add invoices");
    client.add_commit(&repo, "c3", &["c2"], "BILL-11 fix totals");
    client.add_commit(&repo, "f1", &["c2"], "BILL-12 draft");
    client.set_branch(&repo, "main", "c3");
    client.set_branch(&repo, "feature/BILL-12", "f1");
    client.set_tag(&repo, "v1.0.0", "c2");
    client.add_pull_request(&repo, 1, "BILL-12 draft", "feature/BILL-12", "main");

    let mut registry = BackendRegistry::new();
    registry
        .register(
            Backend::new(Arc::new(client.clone()), "ssh://git@gitea.example.com/*", None).unwrap(),
        )
        .unwrap();
    let registry = Arc::new(registry);

    let index = IndexStore::in_memory();
    let scanner = Arc::new(Scanner::new(
        Arc::clone(&registry),
        index.clone(),
        ScanSettings::default(),
    ));
    let executor = ScanExecutor::start(scanner, ExecutorSettings::default());
    let scheduler = Arc::new(SyncScheduler::new(
        index.clone(),
        Arc::clone(&registry),
        executor,
        Arc::new(StaticLeadership(leader)),
        10,
    ));
    let ingestor = WebhookIngestor::new(registry, index.clone());

    Harness {
        client,
        repo,
        index,
        scheduler,
        ingestor,
    }
}
