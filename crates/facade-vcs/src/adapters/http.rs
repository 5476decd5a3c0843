//! Shared JSON-over-HTTP plumbing for the provider adapters.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use facade_core::{FacadeError, Result};

/// Default timeout for a single provider call.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// A reqwest client bound to one provider base url and credential.
#[derive(Debug, Clone)]
pub struct HttpApi {
    client: Client,
    base_url: String,
    service_id: String,
}

impl HttpApi {
    /// Creates a client sending `auth_header: auth_value` with every request.
    ///
    /// # Errors
    ///
    /// Returns `FacadeError::InvalidArgument` if the credential is not a
    /// valid header value or the client cannot be built.
    pub fn new(
        service_id: impl Into<String>,
        base_url: impl Into<String>,
        auth_header: &'static str,
        auth_value: &str,
    ) -> Result<Self> {
        let service_id = service_id.into();
        let mut headers = HeaderMap::new();
        if !auth_value.is_empty() {
            let mut value = HeaderValue::from_str(auth_value).map_err(|_| {
                FacadeError::invalid_argument(format!(
                    "token of backend '{}' is not a valid header value",
                    service_id
                ))
            })?;
            value.set_sensitive(true);
            headers.insert(HeaderName::from_static(auth_header), value);
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .build()
            .map_err(|e| FacadeError::invalid_argument(format!("http client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            service_id,
        })
    }

    pub fn service_id(&self) -> &str {
        &self.service_id
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Builds the absolute url of an API path.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Issues a GET and decodes the JSON response.
    pub async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let request = self.client.get(self.url(path)).query(query);
        self.send(path, request).await
    }

    /// Issues a POST with a JSON body and decodes the JSON response.
    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let request = self.client.post(self.url(path)).json(body);
        self.send(path, request).await
    }

    async fn send<T: DeserializeOwned>(&self, path: &str, request: RequestBuilder) -> Result<T> {
        debug!(backend = %self.service_id, path = %path, "Calling backend");

        let response = request.send().await.map_err(|e| {
            warn!(backend = %self.service_id, path = %path, error = %e, "Backend unreachable");
            FacadeError::unexpected(format!("backend '{}' unreachable: {}", self.service_id, e))
        })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(FacadeError::not_found(format!(
                "{} on backend '{}'",
                path, self.service_id
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(
                backend = %self.service_id,
                path = %path,
                status = %status,
                "Backend call failed"
            );
            return Err(FacadeError::unexpected(format!(
                "backend '{}' answered {} for {}: {}",
                self.service_id, status, path, body
            )));
        }

        response.json::<T>().await.map_err(|e| {
            FacadeError::unexpected(format!(
                "backend '{}' sent an unreadable response for {}: {}",
                self.service_id, path, e
            ))
        })
    }
}
