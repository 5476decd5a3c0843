//! Extractors de Axum para los endpoints del facade.

mod query;
mod request_id;

pub use query::{RangeParams, RepositoryParams};
pub use request_id::RequestId;
