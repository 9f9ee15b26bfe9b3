//! HTTP client for the Hookline management API.
//!
//! Gated behind the `client` cargo feature so downstream crates that only
//! need the shared types do not pull in `reqwest`.

use reqwest::{Client, StatusCode};
use url::Url;

use crate::objects::{
    FieldErrors, LifecycleEventRequest, RegistrationRequest, RegistrationResponse, RouteResponse,
};

/// Errors produced by [`HooklineClient`].
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Transport-level failure (DNS, TLS, connection reset, …).
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server rejected the registration.
    #[error("validation failed: {0:?}")]
    Invalid(FieldErrors),

    /// The server returned a non-2xx status code.
    #[error("api error: status {status}, body: {body}")]
    Api { status: StatusCode, body: String },

    /// Response body could not be deserialized.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The base URL could not be joined with the endpoint path.
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
}

/// Typed client for registration CRUD and event ingestion.
#[derive(Debug, Clone)]
pub struct HooklineClient {
    http: Client,
    base_url: Url,
}

impl HooklineClient {
    /// `base_url` is the root URL of the server, e.g. `http://hooks.internal:8080`.
    pub fn new(base_url: Url) -> Self {
        Self {
            http: Client::new(),
            base_url,
        }
    }

    /// Replace the default `reqwest::Client`.
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    /// `GET /webhooks`
    pub async fn list(&self) -> Result<Vec<RegistrationResponse>, ClientError> {
        let url = self.base_url.join("/webhooks")?;
        parse_response(self.http.get(url).send().await?).await
    }

    /// `GET /webhooks/{id}`
    pub async fn get(&self, id: i64) -> Result<RegistrationResponse, ClientError> {
        let url = self.base_url.join(&format!("/webhooks/{id}"))?;
        parse_response(self.http.get(url).send().await?).await
    }

    /// `POST /webhooks`
    pub async fn create(
        &self,
        request: &RegistrationRequest,
    ) -> Result<RegistrationResponse, ClientError> {
        let url = self.base_url.join("/webhooks")?;
        parse_response(self.http.post(url).json(request).send().await?).await
    }

    /// `PUT /webhooks/{id}`
    pub async fn update(
        &self,
        id: i64,
        request: &RegistrationRequest,
    ) -> Result<RegistrationResponse, ClientError> {
        let url = self.base_url.join(&format!("/webhooks/{id}"))?;
        parse_response(self.http.put(url).json(request).send().await?).await
    }

    /// `DELETE /webhooks/{id}`
    pub async fn delete(&self, id: i64) -> Result<(), ClientError> {
        let url = self.base_url.join(&format!("/webhooks/{id}"))?;
        let resp = self.http.delete(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ClientError::Api { status, body });
        }
        Ok(())
    }

    /// `POST /events`
    pub async fn send_event(
        &self,
        event: &LifecycleEventRequest,
    ) -> Result<RouteResponse, ClientError> {
        let url = self.base_url.join("/events")?;
        parse_response(self.http.post(url).json(event).send().await?).await
    }
}

async fn parse_response<T: serde::de::DeserializeOwned>(
    resp: reqwest::Response,
) -> Result<T, ClientError> {
    let status = resp.status();
    if status == StatusCode::BAD_REQUEST {
        let bytes = resp.bytes().await?;
        if let Ok(errors) = serde_json::from_slice::<FieldErrors>(&bytes) {
            return Err(ClientError::Invalid(errors));
        }
        let body = String::from_utf8_lossy(&bytes).into_owned();
        return Err(ClientError::Api { status, body });
    }
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(ClientError::Api { status, body });
    }
    let bytes = resp.bytes().await?;
    serde_json::from_slice(&bytes).map_err(ClientError::Json)
}
