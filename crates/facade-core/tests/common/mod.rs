#![allow(dead_code)]

use chrono::{TimeZone, Utc};
use facade_core::{Commit, Ref, RefType, Repository, User};

/// Repositorio de fixture en un backend Gitea.
pub fn repository() -> Repository {
    Repository::new(
        "gitea",
        "platform",
        "billing",
        "ssh://git@gitea.example.com/platform/billing.git",
        "https://gitea.example.com/platform/billing",
    )
}

/// Commit de `repository` con fecha fija.
pub fn commit(repository: &Repository, hash: &str, parents: &[&str], message: &str) -> Commit {
    Commit::new(
        &repository.id,
        hash,
        message,
        Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap(),
        User::new("dev").with_email("dev@example.com"),
        parents.iter().map(|p| p.to_string()).collect(),
        format!("{}/commit/{}", repository.web_link, hash),
    )
}

/// Branch de `repository` apuntando a `hash`.
pub fn branch(repository: &Repository, name: &str, hash: &str) -> Ref {
    Ref::new(&repository.id, RefType::Branch, name, hash, "")
}
