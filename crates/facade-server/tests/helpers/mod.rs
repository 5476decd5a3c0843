//! Test helpers para facade-server.

#![allow(dead_code, unused_imports)]

pub mod client;

use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusBuilder;

use facade_core::Repository;
use facade_index::{IndexStore, StaticLeadership};
use facade_server::{AppState, Settings, create_router};
use facade_vcs::testing::FakeVcsClient;
use facade_vcs::{Backend, BackendRegistry};

pub use client::{TestClient, TestResponse};

/// Ssh url del repositorio de fixture.
pub const SSH_URL: &str = "ssh://git@gitea.example.com/platform/billing.git";

/// Servidor completo sobre un backend fake.
pub struct TestApp {
    pub client: TestClient,
    pub fake: FakeVcsClient,
    pub repo: Repository,
    pub state: AppState,
}

/// App con settings por defecto y sin webhook secret.
pub fn app() -> TestApp {
    app_with(FakeVcsClient::new("gitea"), Settings::default(), None)
}

/// Arma la app sobre `fake`, cargando el repositorio `platform/billing`
/// con historia `c1 <- c2 <- c3` en `main`, `c2 <- f1` en
/// `feature/BILL-12`, tag `v1.0.0` en `c2` y el pull request 1.
///
/// Debe correr dentro de un runtime de Tokio.
pub fn app_with(fake: FakeVcsClient, settings: Settings, webhook_secret: Option<&str>) -> TestApp {
    let repo = fake.add_repository("platform", "billing");
    fake.add_commit(&repo, "c1", &[], "Initial import");
    fake.add_commit(&repo, "c2", &["c1"], "BILL-11 add invoices");
    fake.add_commit(&repo, "c3", &["c2"], "BILL-11 fix totals, see PAY-4");
    fake.add_commit(&repo, "f1", &["c2"], "BILL-12 draft");
    fake.set_branch(&repo, "main", "c3");
    fake.set_branch(&repo, "feature/BILL-12", "f1");
    fake.set_tag(&repo, "v1.0.0", "c2");
    fake.add_pull_request(&repo, 1, "BILL-12 draft", "feature/BILL-12", "main");

    let mut registry = BackendRegistry::new();
    registry
        .register(
            Backend::new(
                Arc::new(fake.clone()),
                "ssh://git@gitea.example.com/*",
                webhook_secret.map(String::from),
            )
            .unwrap(),
        )
        .unwrap();

    let state = AppState::new(
        &settings,
        Arc::new(registry),
        IndexStore::in_memory(),
        Arc::new(StaticLeadership(true)),
    );
    // Handle sin instalar el recorder global
    let prometheus = PrometheusBuilder::new().build_recorder().handle();

    TestApp {
        client: TestClient::new(create_router(state.clone(), prometheus)),
        fake,
        repo,
        state,
    }
}

/// Codifica un valor para query string.
pub fn encode(value: &str) -> String {
    value
        .replace('%', "%25")
        .replace(':', "%3A")
        .replace('/', "%2F")
        .replace('@', "%40")
        .replace('+', "%2B")
}
