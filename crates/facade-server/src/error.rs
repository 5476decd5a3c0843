use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use facade_core::FacadeError;

use crate::middleware::REQUEST_ID_HEADER;

/// Error de un handler, traducido a una respuesta HTTP.
#[derive(Debug)]
pub struct AppError(pub FacadeError);

impl From<FacadeError> for AppError {
    fn from(error: FacadeError) -> Self {
        Self(error)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorResponse {
    error_code: &'static str,
    error_message: String,
}

/// Cuerpo de un 202: el cliente reintenta con el mismo request id.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StillProcessingResponse {
    request_id: String,
    retry_after: DateTime<Utc>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            FacadeError::StillProcessing {
                request_id,
                retry_after,
            } => return still_processing(request_id, *retry_after),
            FacadeError::NotFound(_) => StatusCode::NOT_FOUND,
            FacadeError::ArgumentsNotCompatible(_) | FacadeError::InvalidArgument(_) => {
                StatusCode::BAD_REQUEST
            },
            FacadeError::InvalidSignature(_) => StatusCode::UNAUTHORIZED,
            FacadeError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!(error = %self.0, "Request failed");
        }

        let body = Json(ErrorResponse {
            error_code: self.0.error_code(),
            error_message: self.0.to_string(),
        });

        (status, body).into_response()
    }
}

fn still_processing(request_id: &str, retry_after: DateTime<Utc>) -> Response {
    let body = Json(StillProcessingResponse {
        request_id: request_id.to_string(),
        retry_after,
    });
    let mut response = (StatusCode::ACCEPTED, body).into_response();

    let http_date = retry_after.format("%a, %d %b %Y %H:%M:%S GMT").to_string();
    if let Ok(value) = HeaderValue::from_str(&http_date) {
        response.headers_mut().insert(header::RETRY_AFTER, value);
    }
    if let Ok(value) = HeaderValue::from_str(request_id) {
        response
            .headers_mut()
            .insert(REQUEST_ID_HEADER.clone(), value);
    }
    response
}
