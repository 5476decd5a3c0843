//! Middleware stack del facade.
//!
//! - `RequestIdLayer`: genera o propaga X-Request-Id, que tambien es la
//!   clave de los jobs diferidos
//! - `LoggingLayer`: span `http_request` por request

mod logging;
mod request_id;

pub use logging::{LoggingLayer, LoggingMiddleware};
pub use request_id::{REQUEST_ID_HEADER, RequestIdLayer, RequestIdMiddleware};
