use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use shared::error::ErrorBody;
use tokio::sync::broadcast;
use tracing::warn;

use crate::{error::StoreError, session::AuthSession};

/// A backend response reduced to what the stores need: a status code and the
/// raw body, decoded on demand.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    pub body: String,
}

impl Response {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, StoreError> {
        serde_json::from_str(&self.body).map_err(|err| StoreError::Fetch {
            status: Some(self.status),
            message: format!("invalid response body: {err}"),
        })
    }

    /// Best-effort human-readable message from an error body: the backend's
    /// `{message}` shape when present, raw text otherwise.
    pub fn error_message(&self) -> String {
        if let Ok(body) = serde_json::from_str::<ErrorBody>(&self.body) {
            return body.message;
        }
        let trimmed = self.body.trim();
        if trimmed.is_empty() {
            format!("request failed with status {}", self.status)
        } else {
            trimmed.to_string()
        }
    }
}

/// One file in a multipart image upload.
#[derive(Debug, Clone)]
pub struct FilePart {
    pub filename: String,
    pub mime_type: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// The backend answered 401; the stored token has been cleared and the
    /// operator has to log in again.
    Expired,
}

/// Single-shot request/response exchange with the backend. Implementations
/// attach authentication and surface session expiry; they never retry and
/// never cancel in-flight requests.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, path: &str) -> Result<Response, StoreError>;
    async fn post(&self, path: &str, body: Value) -> Result<Response, StoreError>;
    async fn put(&self, path: &str, body: Value) -> Result<Response, StoreError>;
    async fn patch(&self, path: &str, body: Value) -> Result<Response, StoreError>;
    async fn delete(&self, path: &str) -> Result<Response, StoreError>;
    async fn post_multipart(
        &self,
        path: &str,
        parts: Vec<FilePart>,
    ) -> Result<Response, StoreError>;
}

/// reqwest-backed transport. GET requests attach the bearer token only for
/// paths under `/auth` (public listings skip it); every mutating verb sends
/// it when a session exists.
pub struct HttpTransport {
    http: reqwest::Client,
    base_url: String,
    session: Arc<AuthSession>,
    session_events: broadcast::Sender<SessionEvent>,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>, session: Arc<AuthSession>) -> Arc<Self> {
        let (session_events, _) = broadcast::channel(16);
        Arc::new(Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            session,
            session_events,
        })
    }

    pub fn subscribe_session_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.session_events.subscribe()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.session.token().await {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn execute(&self, request: reqwest::RequestBuilder) -> Result<Response, StoreError> {
        let response = request.send().await.map_err(StoreError::network)?;
        let status = response.status().as_u16();
        if status == 401 {
            self.expire_session().await;
            return Err(StoreError::Fetch {
                status: Some(401),
                message: "unauthorized - session expired".to_string(),
            });
        }
        let body = response.text().await.map_err(StoreError::network)?;
        Ok(Response { status, body })
    }

    async fn expire_session(&self) {
        warn!("backend returned 401, invalidating session");
        self.session.logout().await;
        let _ = self.session_events.send(SessionEvent::Expired);
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, path: &str) -> Result<Response, StoreError> {
        let mut request = self.http.get(self.url(path));
        if path.contains("/auth") {
            request = self.authorized(request).await;
        }
        self.execute(request).await
    }

    async fn post(&self, path: &str, body: Value) -> Result<Response, StoreError> {
        let request = self.authorized(self.http.post(self.url(path)).json(&body)).await;
        self.execute(request).await
    }

    async fn put(&self, path: &str, body: Value) -> Result<Response, StoreError> {
        let request = self.authorized(self.http.put(self.url(path)).json(&body)).await;
        self.execute(request).await
    }

    async fn patch(&self, path: &str, body: Value) -> Result<Response, StoreError> {
        let request = self.authorized(self.http.patch(self.url(path)).json(&body)).await;
        self.execute(request).await
    }

    async fn delete(&self, path: &str) -> Result<Response, StoreError> {
        let request = self.authorized(self.http.delete(self.url(path))).await;
        self.execute(request).await
    }

    async fn post_multipart(
        &self,
        path: &str,
        parts: Vec<FilePart>,
    ) -> Result<Response, StoreError> {
        let mut form = reqwest::multipart::Form::new();
        for part in parts {
            let mut file = reqwest::multipart::Part::bytes(part.bytes).file_name(part.filename);
            if let Some(mime) = part.mime_type {
                file = file.mime_str(&mime).map_err(StoreError::network)?;
            }
            form = form.part("images", file);
        }
        let request = self
            .authorized(self.http.post(self.url(path)).multipart(form))
            .await;
        self.execute(request).await
    }
}

/// Inert default used when a store is constructed without a backend.
pub struct MissingTransport;

impl MissingTransport {
    fn unavailable() -> StoreError {
        StoreError::Fetch {
            status: None,
            message: "transport unavailable".to_string(),
        }
    }
}

#[async_trait]
impl Transport for MissingTransport {
    async fn get(&self, _path: &str) -> Result<Response, StoreError> {
        Err(Self::unavailable())
    }

    async fn post(&self, _path: &str, _body: Value) -> Result<Response, StoreError> {
        Err(Self::unavailable())
    }

    async fn put(&self, _path: &str, _body: Value) -> Result<Response, StoreError> {
        Err(Self::unavailable())
    }

    async fn patch(&self, _path: &str, _body: Value) -> Result<Response, StoreError> {
        Err(Self::unavailable())
    }

    async fn delete(&self, _path: &str) -> Result<Response, StoreError> {
        Err(Self::unavailable())
    }

    async fn post_multipart(
        &self,
        _path: &str,
        _parts: Vec<FilePart>,
    ) -> Result<Response, StoreError> {
        Err(Self::unavailable())
    }
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
