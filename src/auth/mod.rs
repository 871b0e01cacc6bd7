//! Credential ownership and refresh-token rotation
//!
//! [`AuthCoordinator`] owns the current [`TokenPair`], keeps the authorization
//! default header in sync with it, and persists each rotated refresh token so a
//! later process can resume the session. Refreshes are single-flight: one
//! network refresh at a time per coordinator, and a caller whose token has
//! already been redeemed by someone else returns without touching the network.

mod store;


pub use store::{FileTokenStore, MemoryTokenStore, TokenStore, token_key};

use crate::error::{Error, Result};
use crate::transport::{RequestSpec, Transport, ensure_success, read_json};
use crate::types::{RefreshTokenRequest, TokenPair};
use async_trait::async_trait;
use reqwest::Method;
use std::sync::{Arc, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Relative URL of the token refresh endpoint
pub const REFRESH_TOKEN_PATH: &str = "api/v1/users/tokens/refresh";

/// Exchanges a refresh token for a new token pair
#[async_trait]
pub trait TokenRedeemer: Send + Sync {
    /// Redeem `refresh_token` at the token endpoint
    async fn redeem(&self, refresh_token: &str, cancel: &CancellationToken) -> Result<TokenPair>;
}

/// Redeems refresh tokens over HTTP
///
/// The request bypasses the 401 refresh-and-retry policy: a failing refresh
/// must surface as an error, never trigger another refresh.
#[derive(Clone)]
pub struct HttpTokenRedeemer {
    transport: Transport,
}

impl HttpTokenRedeemer {
    /// Create a redeemer sending through the shared transport
    pub fn new(transport: Transport) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl TokenRedeemer for HttpTokenRedeemer {
    async fn redeem(&self, refresh_token: &str, cancel: &CancellationToken) -> Result<TokenPair> {
        let spec = RequestSpec::new(Method::POST, REFRESH_TOKEN_PATH)
            .accept("application/json")
            .json_body(&RefreshTokenRequest::new(refresh_token))?;

        let response = self.transport.send(&spec, cancel).await?;
        let response = ensure_success(response).await?;
        read_json(response).await
    }
}

#[derive(Default)]
struct AuthState {
    tokens: Option<TokenPair>,
    token_key: Option<String>,
}

/// Owns the credential of one client
pub struct AuthCoordinator {
    transport: Transport,
    authorization_header: String,
    store: Arc<dyn TokenStore>,
    redeemer: Arc<dyn TokenRedeemer>,
    state: RwLock<AuthState>,
    refresh_lock: tokio::sync::Mutex<()>,
}

impl AuthCoordinator {
    /// Create a signed-out coordinator
    pub fn new(
        transport: Transport,
        authorization_header: impl Into<String>,
        store: Arc<dyn TokenStore>,
        redeemer: Arc<dyn TokenRedeemer>,
    ) -> Self {
        Self {
            transport,
            authorization_header: authorization_header.into(),
            store,
            redeemer,
            state: RwLock::new(AuthState::default()),
            refresh_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Whether a credential is currently held
    pub fn is_authenticated(&self) -> bool {
        self.state
            .read()
            .map(|state| state.tokens.is_some())
            .unwrap_or(false)
    }

    /// The refresh token of the current credential
    pub fn current_refresh_token(&self) -> Option<String> {
        self.state
            .read()
            .ok()?
            .tokens
            .as_ref()
            .map(|t| t.refresh_token.clone())
    }

    /// A snapshot of the current credential
    pub fn tokens(&self) -> Option<TokenPair> {
        self.state.read().ok()?.tokens.clone()
    }

    /// Sign in with an initial refresh token
    ///
    /// If a record for this initial token already exists, its content (the token
    /// a previous session rotated to) is redeemed instead of `refresh_token`.
    pub async fn sign_in(&self, refresh_token: &str, cancel: &CancellationToken) -> Result<()> {
        let key = token_key(refresh_token);

        let actual = match self.load_record(&key).await? {
            Some(stored) => {
                info!(token_key = %key, "resuming session from persisted refresh token");
                stored
            }
            None => {
                info!(token_key = %key, "persisting new refresh token record");
                self.save_record(&key, refresh_token).await?;
                refresh_token.to_string()
            }
        };

        self.write_state()?.token_key = Some(key);
        self.refresh(&actual, cancel).await
    }

    /// Redeem `refresh_token` and install the resulting credential
    ///
    /// Serialized: concurrent callers wait for each other. A caller whose token
    /// no longer matches the current credential returns immediately, because a
    /// concurrent refresh already advanced the state.
    pub async fn refresh(&self, refresh_token: &str, cancel: &CancellationToken) -> Result<()> {
        let _guard = self.refresh_lock.lock().await;

        let token_key = {
            let state = self.read_state()?;
            if let Some(current) = &state.tokens
                && current.refresh_token != refresh_token
            {
                debug!("refresh token already redeemed, skipping refresh");
                return Ok(());
            }
            state.token_key.clone()
        };

        let pair = self.redeemer.redeem(refresh_token, cancel).await?;

        if let Some(key) = &token_key {
            self.save_record(key, &pair.refresh_token).await?;
        }

        self.transport.set_default_header(
            &self.authorization_header,
            &format!("Bearer {}", pair.access_token),
        )?;
        self.write_state()?.tokens = Some(pair);

        info!("access token refreshed");
        Ok(())
    }

    /// Drop the credential and the authorization header; no network call
    pub fn sign_out(&self) {
        if let Ok(mut state) = self.state.write() {
            state.tokens = None;
        }
        self.transport.remove_default_header(&self.authorization_header);
    }

    // Stores may do blocking I/O; keep it off the async worker threads.
    async fn load_record(&self, key: &str) -> Result<Option<String>> {
        let store = Arc::clone(&self.store);
        let key = key.to_string();
        tokio::task::spawn_blocking(move || store.load(&key))
            .await
            .map_err(store_task_failed)?
    }

    async fn save_record(&self, key: &str, refresh_token: &str) -> Result<()> {
        let store = Arc::clone(&self.store);
        let key = key.to_string();
        let refresh_token = refresh_token.to_string();
        tokio::task::spawn_blocking(move || store.save(&key, &refresh_token))
            .await
            .map_err(store_task_failed)?
    }

    fn read_state(&self) -> Result<std::sync::RwLockReadGuard<'_, AuthState>> {
        self.state
            .read()
            .map_err(|_| Error::Io(std::io::Error::other("credential lock poisoned")))
    }

    fn write_state(&self) -> Result<std::sync::RwLockWriteGuard<'_, AuthState>> {
        self.state
            .write()
            .map_err(|_| Error::Io(std::io::Error::other("credential lock poisoned")))
    }
}

fn store_task_failed(e: tokio::task::JoinError) -> Error {
    Error::Io(std::io::Error::other(format!("token store task failed: {}", e)))
}
