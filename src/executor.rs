//! Request execution with the 401 refresh-and-retry policy
//!
//! Every endpoint call funnels through [`RequestExecutor`]. A non-success
//! response is mapped to an `N00.<status>` error, except for one recovery path:
//! a 401 whose `WWW-Authenticate` challenge reports an expired token, while a
//! credential is held, triggers exactly one refresh followed by exactly one
//! resend. Any other 401 (or a failure during that attempt) signs the
//! coordinator out.

use crate::auth::AuthCoordinator;
use crate::error::Result;
use crate::transport::{RequestSpec, Transport, ensure_success, read_json};
use reqwest::header::{HeaderMap, WWW_AUTHENTICATE};
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Marker in the challenge parameters of a 401 caused by token expiry
pub const TOKEN_EXPIRED_MARKER: &str = "The token expired at";

/// Sends requests on behalf of every endpoint and high-level operation
#[derive(Clone)]
pub struct RequestExecutor {
    transport: Transport,
    auth: Arc<AuthCoordinator>,
}

impl RequestExecutor {
    /// Create an executor over a shared transport and credential owner
    pub fn new(transport: Transport, auth: Arc<AuthCoordinator>) -> Self {
        Self { transport, auth }
    }

    /// The shared transport
    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// The credential owner
    pub fn auth(&self) -> &Arc<AuthCoordinator> {
        &self.auth
    }

    /// Send a request that is not expected to return content
    pub async fn invoke_unit(&self, spec: &RequestSpec, cancel: &CancellationToken) -> Result<()> {
        let response = self.send(spec, cancel).await?;
        drop(response);
        Ok(())
    }

    /// Send a request and hand back the undisposed response
    ///
    /// Used for header access and streamed bodies; the caller owns the response.
    pub async fn invoke_raw(
        &self,
        spec: &RequestSpec,
        cancel: &CancellationToken,
    ) -> Result<Response> {
        self.send(spec, cancel).await
    }

    /// Send a request and deserialize the JSON body into `T`
    pub async fn invoke_json<T: DeserializeOwned>(
        &self,
        spec: &RequestSpec,
        cancel: &CancellationToken,
    ) -> Result<T> {
        let response = self.send(spec, cancel).await?;
        read_json(response).await
    }

    /// Send with the refresh-and-retry policy; returns only successful responses
    pub async fn send(&self, spec: &RequestSpec, cancel: &CancellationToken) -> Result<Response> {
        // the token the request went out with; a refresh racing the send makes it stale
        let sent_with = self.auth.current_refresh_token();
        let response = self.transport.send(spec, cancel).await?;

        let response = if response.status() == StatusCode::UNAUTHORIZED
            && self.auth.is_authenticated()
        {
            self.recover_unauthorized(spec, response, sent_with, cancel).await
        } else {
            response
        };

        ensure_success(response).await
    }

    async fn recover_unauthorized(
        &self,
        spec: &RequestSpec,
        response: Response,
        sent_with: Option<String>,
        cancel: &CancellationToken,
    ) -> Response {
        if token_expired(response.headers()) {
            match self.refresh_and_resend(spec, sent_with, cancel).await {
                Ok(retried) => {
                    info!(status = %retried.status(), "request resent after token refresh");
                    return retried;
                }
                Err(e) => warn!(error = %e, "token refresh attempt failed, signing out"),
            }
        } else {
            warn!("unauthorized response without token expiry, signing out");
        }

        self.auth.sign_out();
        response
    }

    /// Refresh the credential `sent_with` belonged to, then resend
    ///
    /// When another task already rotated past `sent_with`, the refresh is a
    /// no-op and the resend uses the newer credential.
    async fn refresh_and_resend(
        &self,
        spec: &RequestSpec,
        sent_with: Option<String>,
        cancel: &CancellationToken,
    ) -> Result<Response> {
        if let Some(refresh_token) = sent_with.or_else(|| self.auth.current_refresh_token()) {
            self.auth.refresh(&refresh_token, cancel).await?;
        }
        self.transport.send(spec, cancel).await
    }
}

/// Whether the first `WWW-Authenticate` challenge reports an expired token
pub fn token_expired(headers: &HeaderMap) -> bool {
    let Some(challenge) = headers.get(WWW_AUTHENTICATE) else {
        return false;
    };
    let Ok(challenge) = challenge.to_str() else {
        return false;
    };

    // "<scheme> <parameters>"; only the parameters carry the marker
    challenge
        .trim()
        .split_once(' ')
        .is_some_and(|(_, parameters)| parameters.contains(TOKEN_EXPIRED_MARKER))
}
