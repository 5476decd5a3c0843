//! Normalized VCS model.
//!
//! Every backend adapter maps its provider payloads into these types.

mod commit;
mod pull_request;
mod refs;
mod repository;

pub use commit::{Commit, User};
pub use pull_request::{PullRequest, PullRequestReviewer, PullRequestStatus};
pub use refs::{Ref, RefType};
pub use repository::{Repository, RepositoryCoordinates, RepositoryInfo};
