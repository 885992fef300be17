use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use shared::protocol::{LoginRequest, LoginResponse, RegisterRequest};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::StoreError;

/// What survives between sessions: the bearer token plus the identity the
/// operator logged in with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredSession {
    pub token: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

/// Persistence seam for the session token (the localStorage analogue).
pub trait TokenStore: Send + Sync {
    fn load(&self) -> Result<Option<StoredSession>>;
    fn save(&self, session: &StoredSession) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

#[derive(Default)]
pub struct MemoryTokenStore {
    inner: std::sync::Mutex<Option<StoredSession>>,
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Option<StoredSession>> {
        Ok(self
            .inner
            .lock()
            .map_err(|_| anyhow::anyhow!("token store lock poisoned"))?
            .clone())
    }

    fn save(&self, session: &StoredSession) -> Result<()> {
        *self
            .inner
            .lock()
            .map_err(|_| anyhow::anyhow!("token store lock poisoned"))? =
            Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self
            .inner
            .lock()
            .map_err(|_| anyhow::anyhow!("token store lock poisoned"))? = None;
        Ok(())
    }
}

/// JSON file on disk, one session per file.
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<Option<StoredSession>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read session file {}", self.path.display()))?;
        let session = serde_json::from_str(&raw)
            .with_context(|| format!("malformed session file {}", self.path.display()))?;
        Ok(Some(session))
    }

    fn save(&self, session: &StoredSession) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let raw = serde_json::to_string_pretty(session)?;
        std::fs::write(&self.path, raw)
            .with_context(|| format!("failed to write session file {}", self.path.display()))?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path).with_context(|| {
                format!("failed to remove session file {}", self.path.display())
            })?;
        }
        Ok(())
    }
}

/// Authentication state for the current operator. Login and register go to
/// the backend's public endpoints with a dedicated HTTP client; everything
/// else in the crate reads the token through this handle.
pub struct AuthSession {
    http: reqwest::Client,
    base_url: String,
    store: Arc<dyn TokenStore>,
    state: Mutex<Option<StoredSession>>,
}

impl AuthSession {
    pub fn new(base_url: impl Into<String>, store: Arc<dyn TokenStore>) -> Arc<Self> {
        let initial = match store.load() {
            Ok(session) => session,
            Err(err) => {
                warn!("failed to load stored session: {err:#}");
                None
            }
        };
        Arc::new(Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            store,
            state: Mutex::new(initial),
        })
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<(), StoreError> {
        let response = self
            .http
            .post(format!("{}/login", self.base_url))
            .json(&LoginRequest {
                email: email.to_string(),
                password: password.to_string(),
            })
            .send()
            .await
            .map_err(StoreError::network)?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(StoreError::network)?;
        if !(200..300).contains(&status) {
            return Err(StoreError::Fetch {
                status: Some(status),
                message: login_error_message(&body, "login failed"),
            });
        }

        let body: LoginResponse = serde_json::from_str(&body).map_err(|err| StoreError::Fetch {
            status: Some(status),
            message: format!("invalid login response: {err}"),
        })?;

        // The backend only returns the token; identity comes from the form.
        let session = StoredSession {
            token: body.token,
            email: Some(email.to_string()),
            role: Some("admin".to_string()),
        };
        self.install(session).await;
        info!(email, "logged in");
        Ok(())
    }

    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<(), StoreError> {
        let response = self
            .http
            .post(format!("{}/register", self.base_url))
            .json(&RegisterRequest {
                name: name.to_string(),
                email: email.to_string(),
                password: password.to_string(),
            })
            .send()
            .await
            .map_err(StoreError::network)?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(StoreError::network)?;
        if !(200..300).contains(&status) {
            return Err(StoreError::Fetch {
                status: Some(status),
                message: login_error_message(&body, "registration failed"),
            });
        }

        let body: LoginResponse = serde_json::from_str(&body).map_err(|err| StoreError::Fetch {
            status: Some(status),
            message: format!("invalid registration response: {err}"),
        })?;

        let session = StoredSession {
            token: body.token,
            email: Some(email.to_string()),
            role: Some("admin".to_string()),
        };
        self.install(session).await;
        info!(email, "registered and logged in");
        Ok(())
    }

    /// The backend has no verification endpoint; a session counts as valid
    /// while a token is present.
    pub async fn verify_token(&self) -> Result<(), StoreError> {
        if self.token().await.is_some() {
            Ok(())
        } else {
            Err(StoreError::Fetch {
                status: None,
                message: "no stored session token".to_string(),
            })
        }
    }

    pub async fn logout(&self) {
        *self.state.lock().await = None;
        if let Err(err) = self.store.clear() {
            warn!("failed to clear stored session: {err:#}");
        }
    }

    pub async fn token(&self) -> Option<String> {
        self.state.lock().await.as_ref().map(|s| s.token.clone())
    }

    pub async fn email(&self) -> Option<String> {
        self.state.lock().await.as_ref().and_then(|s| s.email.clone())
    }

    pub async fn is_authenticated(&self) -> bool {
        self.state.lock().await.is_some()
    }

    async fn install(&self, session: StoredSession) {
        if let Err(err) = self.store.save(&session) {
            warn!("failed to persist session: {err:#}");
        }
        *self.state.lock().await = Some(session);
    }
}

fn login_error_message(body: &str, fallback: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<shared::error::ErrorBody>(body) {
        return parsed.message;
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        fallback.to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "bakery-admin-session-{}-{name}.json",
            std::process::id()
        ))
    }

    #[test]
    fn memory_store_round_trips() {
        let store = MemoryTokenStore::default();
        assert!(store.load().expect("load").is_none());
        store
            .save(&StoredSession {
                token: "t".into(),
                email: Some("a@b.c".into()),
                role: None,
            })
            .expect("save");
        let loaded = store.load().expect("load").expect("present");
        assert_eq!(loaded.token, "t");
        store.clear().expect("clear");
        assert!(store.load().expect("load").is_none());
    }

    #[test]
    fn file_store_round_trips_and_clears() {
        let path = scratch_path("roundtrip");
        let store = FileTokenStore::new(&path);
        let _ = store.clear();

        assert!(store.load().expect("load").is_none());
        store
            .save(&StoredSession {
                token: "file-token".into(),
                email: Some("admin@pastry.test".into()),
                role: Some("admin".into()),
            })
            .expect("save");
        let loaded = store.load().expect("load").expect("present");
        assert_eq!(loaded.token, "file-token");
        assert_eq!(loaded.email.as_deref(), Some("admin@pastry.test"));

        store.clear().expect("clear");
        assert!(store.load().expect("load").is_none());
    }

    #[tokio::test]
    async fn verify_token_requires_a_stored_token() {
        let session = AuthSession::new("http://127.0.0.1:1", Arc::new(MemoryTokenStore::default()));
        let err = session.verify_token().await.expect_err("must fail");
        assert!(matches!(err, StoreError::Fetch { status: None, .. }));

        session
            .install(StoredSession {
                token: "tok".into(),
                email: None,
                role: None,
            })
            .await;
        session.verify_token().await.expect("valid");
        assert!(session.is_authenticated().await);

        session.logout().await;
        assert!(!session.is_authenticated().await);
    }
}
