//! The stream-token manager.
//!
//! Acquires per-asset tokens through the access-check endpoint and
//! keeps the current one alive by rescheduling its own fetch at 75% of
//! the token lifetime. The pending renewal is an aborted-on-
//! replacement task handle, so a cleared or superseded token can never
//! fire a renewal against a stale asset id.
//!
//! Session state is reached only through the injected header provider;
//! this component never touches the session itself.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use std::time::Instant;

use log::{debug, info, warn};
use reqwest::Response;
use reqwest_middleware::ClientWithMiddleware;
use serde::Deserialize;
use tokio::task::JoinHandle;

use crate::error::{Result, StreamTokenError};
use crate::token::{MediaType, StreamToken, DEFAULT_EXPIRES_IN_SECS};

/// Accessor for the current session header pair. Empty map = no
/// session.
pub type HeaderProvider = Arc<dyn Fn() -> HashMap<String, String> + Send + Sync>;

/// Body of `POST /stream/access-check/{assetId}`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccessCheckResponse {
    #[serde(default)]
    success: bool,
    stream_token: Option<String>,
    expires_in: Option<u64>,
    media_type: Option<MediaType>,
    mime_type: Option<String>,
    #[serde(default, alias = "message")]
    error: Option<String>,
}

#[derive(Default)]
struct TokenState {
    asset_id: Option<String>,
    token: Option<StreamToken>,
    last_error: Option<String>,
}

pub struct StreamTokenManager {
    client: Arc<ClientWithMiddleware>,
    api_base: String,
    headers: HeaderProvider,
    // Sync locks; never held across an await point.
    state: Mutex<TokenState>,
    renewal: Mutex<Option<JoinHandle<()>>>,
    // Handed to renewal tasks so a dropped manager is never revived.
    weak_self: Weak<Self>,
}

impl StreamTokenManager {
    pub fn new(
        client: Arc<ClientWithMiddleware>,
        api_base: impl Into<String>,
        headers: HeaderProvider,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak_self| Self {
            client,
            api_base: api_base.into(),
            headers,
            state: Mutex::new(TokenState::default()),
            renewal: Mutex::new(None),
            weak_self: weak_self.clone(),
        })
    }

    // -- State accessors ---------------------------------------------------

    /// True iff a token is tracked and outside the validity margin.
    pub fn is_token_valid(&self) -> bool {
        let state = self.state.lock().expect("state lock");
        state.token.as_ref().is_some_and(StreamToken::is_valid)
    }

    pub fn current_token(&self) -> Option<StreamToken> {
        self.state.lock().expect("state lock").token.clone()
    }

    pub fn last_error(&self) -> Option<String> {
        self.state.lock().expect("state lock").last_error.clone()
    }

    /// Playback URL derived from the tracked asset and token; `None`
    /// when either is missing.
    pub fn stream_url(&self) -> Option<String> {
        let state = self.state.lock().expect("state lock");
        match (&state.asset_id, &state.token) {
            (Some(asset_id), Some(token)) => Some(self.build_url(asset_id, &token.token)),
            _ => None,
        }
    }

    fn build_url(&self, asset_id: &str, token: &str) -> String {
        format!("{}/stream/{asset_id}?token={token}", self.api_base)
    }

    // -- Acquisition -------------------------------------------------------

    /// Requests a stream token for `asset_id` and starts tracking it.
    ///
    /// Returns the ready-to-use playback URL, or `None` with the
    /// failure recorded in `last_error`. Without a session header no
    /// request is issued at all.
    pub async fn fetch_stream_token(&self, asset_id: &str) -> Option<String> {
        match self.try_fetch(asset_id).await {
            Ok(token) => {
                let delay = token.renewal_delay();
                let url = self.build_url(asset_id, &token.token);
                {
                    let mut state = self.state.lock().expect("state lock");
                    state.asset_id = Some(asset_id.to_string());
                    state.token = Some(token);
                    state.last_error = None;
                }
                self.schedule_renewal(asset_id.to_string(), delay);
                Some(url)
            }
            Err(e) => {
                warn!("stream token fetch for {asset_id} failed: {e}");
                self.state.lock().expect("state lock").last_error = Some(e.to_string());
                None
            }
        }
    }

    async fn try_fetch(&self, asset_id: &str) -> Result<StreamToken> {
        let headers = (self.headers)();
        if headers.is_empty() {
            return Err(StreamTokenError::NotAuthenticated);
        }

        let mut request = self
            .client
            .post(format!("{}/stream/access-check/{asset_id}", self.api_base));
        for (name, value) in &headers {
            request = request.header(name.as_str(), value.as_str());
        }
        let response = request.send().await?;

        if !response.status().is_success() {
            return Err(server_error(response).await);
        }

        let check = response.json::<AccessCheckResponse>().await?;
        let token = match (check.success, check.stream_token) {
            (true, Some(token)) => token,
            _ => {
                return Err(StreamTokenError::AccessDenied(
                    check
                        .error
                        .unwrap_or_else(|| "no stream token granted".to_string()),
                ))
            }
        };

        let stream_token = StreamToken {
            token,
            expires_in: check.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS),
            media_type: check.media_type.unwrap_or(MediaType::Video),
            mime_type: check
                .mime_type
                .unwrap_or_else(|| "video/mp4".to_string()),
            fetched_at: Instant::now(),
        };
        info!(
            "stream token for {asset_id} acquired, {}s lifetime",
            stream_token.expires_in
        );
        Ok(stream_token)
    }

    /// Re-fetches the token for the asset currently being tracked.
    pub async fn refresh_token(&self) -> Option<String> {
        let asset_id = self.state.lock().expect("state lock").asset_id.clone();
        match asset_id {
            Some(asset_id) => self.fetch_stream_token(&asset_id).await,
            None => {
                self.state.lock().expect("state lock").last_error =
                    Some(StreamTokenError::NoAsset.to_string());
                None
            }
        }
    }

    /// Drops the token, the tracked asset, and any error, and cancels
    /// the pending renewal.
    pub fn clear_token(&self) {
        self.cancel_renewal();
        *self.state.lock().expect("state lock") = TokenState::default();
        debug!("stream token cleared");
    }

    // -- Renewal scheduling ------------------------------------------------

    /// Arms the renewal for `asset_id` after `delay`, replacing (and
    /// aborting) any pending one. The task holds only a weak handle,
    /// so a dropped manager is never mutated from a stray timer.
    fn schedule_renewal(&self, asset_id: String, delay: std::time::Duration) {
        let weak = self.weak_self.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(manager) = weak.upgrade() {
                debug!("renewing stream token for {asset_id}");
                manager.fetch_stream_token(&asset_id).await;
            }
        });

        let mut slot = self.renewal.lock().expect("renewal lock");
        if let Some(previous) = slot.replace(handle) {
            // When the renewal task itself re-fetches, `previous` is
            // its own handle; abort only takes effect at an await
            // point and the task has none left, so this is safe.
            previous.abort();
        }
    }

    fn cancel_renewal(&self) {
        if let Some(handle) = self.renewal.lock().expect("renewal lock").take() {
            handle.abort();
        }
    }
}

impl Drop for StreamTokenManager {
    fn drop(&mut self) {
        // Teardown must not leave a timer mutating freed state.
        self.cancel_renewal();
    }
}

async fn server_error(response: Response) -> StreamTokenError {
    #[derive(Deserialize)]
    struct ErrorBody {
        #[serde(alias = "message")]
        error: Option<String>,
    }

    let status = response.status();
    let message = match response.json::<ErrorBody>().await {
        Ok(ErrorBody { error: Some(msg) }) => msg,
        _ => status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string(),
    };
    StreamTokenError::Server {
        status: status.as_u16(),
        message,
    }
}
