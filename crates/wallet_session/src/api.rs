//! Wire types and calls for the wallet endpoints.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::info;
use reqwest::Response;
use reqwest_middleware::ClientWithMiddleware;
use serde::{Deserialize, Serialize};

use crate::entitlements::Entitlement;
use crate::error::{Result, SessionError};
use crate::session::SESSION_HEADER;

#[derive(Debug, Serialize)]
struct NonceRequest<'a> {
    address: &'a str,
}

/// Challenge issued by `POST /wallet/nonce`. The wallet signs
/// `message`; `nonce` is the server's one-time correlation value.
#[derive(Debug, Clone, Deserialize)]
pub struct NonceResponse {
    pub message: String,
    pub nonce: String,
}

#[derive(Debug, Serialize)]
struct VerifyRequest<'a> {
    address: &'a str,
    signature: &'a str,
}

/// Credential issued by `POST /wallet/verify`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub session_token: String,
    pub expires_at: DateTime<Utc>,
}

/// Body of `GET /wallet/session`. `authenticated: false` is the
/// server's explicit rejection; `expires_at` carries an extended
/// expiry when present.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCheckResponse {
    pub authenticated: bool,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct EntitlementsResponse {
    #[serde(default)]
    active: Vec<Entitlement>,
}

/// Servers report failures as `{"error": "..."}` or `{"message": "..."}`.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(alias = "message")]
    error: Option<String>,
}

/// Thin client over the wallet endpoints. Holds no session state; the
/// credential is passed per call.
pub struct WalletApi {
    client: Arc<ClientWithMiddleware>,
    api_base: String,
}

impl WalletApi {
    pub fn new(client: Arc<ClientWithMiddleware>, api_base: impl Into<String>) -> Self {
        Self {
            client,
            api_base: api_base.into(),
        }
    }

    pub async fn request_nonce(&self, address: &str) -> Result<NonceResponse> {
        let response = self
            .client
            .post(format!("{}/wallet/nonce", self.api_base))
            .json(&NonceRequest { address })
            .send()
            .await?;

        if !response.status().is_success() {
            let (status, message) = error_parts(response).await;
            return Err(SessionError::NonceRequest(format!("{status}: {message}")));
        }
        Ok(response.json::<NonceResponse>().await?)
    }

    pub async fn verify(&self, address: &str, signature: &str) -> Result<VerifyResponse> {
        let response = self
            .client
            .post(format!("{}/wallet/verify", self.api_base))
            .json(&VerifyRequest { address, signature })
            .send()
            .await?;

        if !response.status().is_success() {
            let (status, message) = error_parts(response).await;
            return Err(SessionError::Verification(format!("{status}: {message}")));
        }
        Ok(response.json::<VerifyResponse>().await?)
    }

    pub async fn check_session(&self, credential: &str) -> Result<SessionCheckResponse> {
        let response = self
            .client
            .get(format!("{}/wallet/session", self.api_base))
            .header(SESSION_HEADER, credential)
            .send()
            .await?;

        if !response.status().is_success() {
            let (status, message) = error_parts(response).await;
            return Err(SessionError::Server { status, message });
        }
        Ok(response.json::<SessionCheckResponse>().await?)
    }

    pub async fn logout(&self, credential: &str) -> Result<()> {
        let response = self
            .client
            .post(format!("{}/wallet/logout", self.api_base))
            .header(SESSION_HEADER, credential)
            .send()
            .await?;

        if !response.status().is_success() {
            let (status, message) = error_parts(response).await;
            return Err(SessionError::Server { status, message });
        }
        info!("server session invalidated");
        Ok(())
    }

    pub async fn entitlements(&self, credential: &str) -> Result<Vec<Entitlement>> {
        let response = self
            .client
            .get(format!("{}/wallet/entitlements", self.api_base))
            .header(SESSION_HEADER, credential)
            .send()
            .await?;

        if !response.status().is_success() {
            let (status, message) = error_parts(response).await;
            return Err(SessionError::Server { status, message });
        }
        Ok(response.json::<EntitlementsResponse>().await?.active)
    }
}

/// Extracts `(status, server message)` from a non-success response,
/// falling back to the canonical status text when the body is opaque.
async fn error_parts(response: Response) -> (u16, String) {
    let status = response.status();
    let message = match response.json::<ErrorBody>().await {
        Ok(ErrorBody { error: Some(msg) }) => msg,
        _ => status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string(),
    };
    (status.as_u16(), message)
}
