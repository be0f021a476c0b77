//! The session manager: sole owner of the session lifecycle.
//!
//! States: `Unauthenticated → Authenticating → Authenticated`, back to
//! `Unauthenticated` on logout, expiry, or server rejection. Lifecycle
//! operations never propagate errors to the caller; failures land in
//! `last_error` and the operation reports `false`/empty, per the
//! fail-safe policy: clearing local state must never be blocked by a
//! failing network call.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, Weak};

use chrono::Utc;
use log::{info, warn};
use reqwest_middleware::ClientWithMiddleware;

use crate::api::WalletApi;
use crate::entitlements::{grants_access, Entitlement};
use crate::error::{Result, SessionError};
use crate::session::{Session, SESSION_HEADER};
use crate::signer::WalletSigner;
use crate::storage::SessionStore;

/// Header map handed to collaborators that need to authenticate
/// requests. Empty when no session exists.
pub type SessionHeaders = HashMap<String, String>;

#[derive(Default)]
struct ManagerState {
    session: Option<Session>,
    entitlements: Vec<Entitlement>,
    last_error: Option<String>,
}

/// Owns the authentication protocol and the session record. The only
/// component that writes to the session store.
pub struct SessionManager {
    api: WalletApi,
    store: Arc<dyn SessionStore>,
    signer: Option<Arc<dyn WalletSigner>>,
    // Sync lock; never held across an await point.
    state: RwLock<ManagerState>,
    // Single-flight guard: a second authenticate while one is in
    // flight is rejected, not queued.
    authenticating: AtomicBool,
}

/// Resets the single-flight flag when the attempt ends, on every exit
/// path.
struct AuthGuard<'a>(&'a AtomicBool);

impl Drop for AuthGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl SessionManager {
    pub fn new(
        client: Arc<ClientWithMiddleware>,
        api_base: impl Into<String>,
        store: Arc<dyn SessionStore>,
        signer: Option<Arc<dyn WalletSigner>>,
    ) -> Self {
        Self {
            api: WalletApi::new(client, api_base),
            store,
            signer,
            state: RwLock::new(ManagerState::default()),
            authenticating: AtomicBool::new(false),
        }
    }

    // -- State accessors ---------------------------------------------------

    pub fn is_authenticated(&self) -> bool {
        self.state.read().expect("state lock").session.is_some()
    }

    pub fn current_session(&self) -> Option<Session> {
        self.state.read().expect("state lock").session.clone()
    }

    pub fn entitlements(&self) -> Vec<Entitlement> {
        self.state.read().expect("state lock").entitlements.clone()
    }

    pub fn last_error(&self) -> Option<String> {
        self.state.read().expect("state lock").last_error.clone()
    }

    /// Access predicate: true iff an unexpired entitlement for
    /// `asset_id` is held.
    pub fn has_access_to(&self, asset_id: &str) -> bool {
        let state = self.state.read().expect("state lock");
        grants_access(&state.entitlements, asset_id, Utc::now())
    }

    /// The credential as a ready-to-attach header pair, or an empty
    /// map. This accessor is the only session surface collaborators
    /// (the stream-token manager) see.
    pub fn session_header(&self) -> SessionHeaders {
        let state = self.state.read().expect("state lock");
        match &state.session {
            Some(session) => HashMap::from([(
                SESSION_HEADER.to_string(),
                session.credential.clone(),
            )]),
            None => HashMap::new(),
        }
    }

    /// Header accessor decoupled from the manager itself, for handing
    /// to the stream-token manager. Holds only a weak reference and
    /// yields an empty map once the manager is gone.
    pub fn header_provider(manager: &Arc<Self>) -> Arc<dyn Fn() -> SessionHeaders + Send + Sync> {
        let weak: Weak<Self> = Arc::downgrade(manager);
        Arc::new(move || match weak.upgrade() {
            Some(manager) => manager.session_header(),
            None => HashMap::new(),
        })
    }

    // -- Authentication ----------------------------------------------------

    /// Runs the nonce → sign → verify protocol for `address`.
    ///
    /// Returns `true` on success. On failure the reason lands in
    /// `last_error`. A call while another authenticate is in flight is
    /// rejected without issuing any request.
    pub async fn authenticate(&self, address: &str) -> bool {
        if self
            .authenticating
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("authenticate rejected: another attempt is in flight");
            return false;
        }
        let _guard = AuthGuard(&self.authenticating);

        match self.try_authenticate(address).await {
            Ok(()) => {
                self.state.write().expect("state lock").last_error = None;
                // Entitlements are fetched eagerly so access checks
                // work immediately after sign-in.
                self.fetch_entitlements().await;
                true
            }
            Err(e) => {
                warn!("authentication failed: {e}");
                self.state.write().expect("state lock").last_error = Some(e.to_string());
                false
            }
        }
    }

    async fn try_authenticate(&self, address: &str) -> Result<()> {
        let signer = self.signer.clone().ok_or(SessionError::NoWallet)?;

        // Step 1: one-time challenge for this address.
        let nonce = self.api.request_nonce(address).await?;

        // Step 2: the wallet signs the challenge. Suspends until the
        // user approves or declines.
        let signature = signer
            .sign_message(&nonce.message, address)
            .await
            .map_err(SessionError::Signature)?;

        // Step 3: the server checks the signature and issues the
        // credential.
        let verified = self.api.verify(address, &signature).await?;

        let session = Session {
            credential: verified.session_token,
            owner_address: address.to_ascii_lowercase(),
            expires_at: verified.expires_at,
        };

        // Persistence is best-effort: an unwritable profile dir must
        // not undo a server-confirmed sign-in.
        if let Err(e) = self.store.save(&session).await {
            warn!("failed to persist session: {e}");
        }

        info!(
            "authenticated {} until {}",
            session.owner_address, session.expires_at
        );
        self.state.write().expect("state lock").session = Some(session);
        Ok(())
    }

    // -- Teardown ----------------------------------------------------------

    /// Ends the session. The server notification is best-effort; local
    /// state is cleared unconditionally.
    pub async fn logout(&self) {
        let credential = {
            let state = self.state.read().expect("state lock");
            state.session.as_ref().map(|s| s.credential.clone())
        };

        if let Some(credential) = credential {
            if let Err(e) = self.api.logout(&credential).await {
                warn!("server logout failed (ignored): {e}");
            }
        }

        self.clear_local().await;
        self.state.write().expect("state lock").last_error = None;
        info!("logged out");
    }

    /// Drops session and entitlements locally and deletes the
    /// persisted record.
    async fn clear_local(&self) {
        {
            let mut state = self.state.write().expect("state lock");
            state.session = None;
            state.entitlements.clear();
        }
        if let Err(e) = self.store.clear().await {
            warn!("failed to clear persisted session: {e}");
        }
    }

    // -- Validation & refresh ----------------------------------------------

    /// Validates the current credential against the server.
    ///
    /// Returns `true` iff the server confirmed the session. A server
    /// rejection clears local state; a transport failure leaves it
    /// untouched (being offline is not a logout).
    pub async fn refresh_session(&self) -> bool {
        match self.validate_session().await {
            Ok(valid) => valid,
            Err(e) => {
                warn!("session validation unreachable: {e}");
                self.state.write().expect("state lock").last_error = Some(e.to_string());
                false
            }
        }
    }

    /// `Ok(true)` = server-confirmed valid (expiry refreshed when the
    /// server extends it), `Ok(false)` = no session or server said no
    /// (local state cleared), `Err` = could not ask the server.
    async fn validate_session(&self) -> Result<bool> {
        let credential = {
            let state = self.state.read().expect("state lock");
            match &state.session {
                Some(session) => session.credential.clone(),
                None => return Ok(false),
            }
        };

        let check = match self.api.check_session(&credential).await {
            Ok(check) => check,
            Err(e) if e.is_network() => return Err(e),
            Err(e) => {
                // Non-success status: the server rejected the session.
                info!("session rejected by server: {e}");
                self.clear_local().await;
                return Ok(false);
            }
        };

        if !check.authenticated {
            info!("session no longer authenticated");
            self.clear_local().await;
            return Ok(false);
        }

        if let Some(expires_at) = check.expires_at {
            let updated = {
                let mut state = self.state.write().expect("state lock");
                match state.session.as_mut() {
                    Some(session) => {
                        session.expires_at = expires_at;
                        Some(session.clone())
                    }
                    None => None,
                }
            };
            if let Some(session) = updated {
                if let Err(e) = self.store.save(&session).await {
                    warn!("failed to persist refreshed expiry: {e}");
                }
            }
        }

        Ok(true)
    }

    // -- Entitlements ------------------------------------------------------

    /// Replaces the local entitlement collection with the server's
    /// active list. Never raises: any failure yields an empty
    /// collection. A failed fetch and a genuinely empty list are
    /// indistinguishable to callers; the log line keeps them apart for
    /// operators.
    pub async fn fetch_entitlements(&self) -> Vec<Entitlement> {
        let credential = {
            let state = self.state.read().expect("state lock");
            match &state.session {
                Some(session) => session.credential.clone(),
                None => return Vec::new(),
            }
        };

        let entitlements = match self.api.entitlements(&credential).await {
            Ok(list) => list,
            Err(e) => {
                warn!("entitlement fetch failed, defaulting to empty: {e}");
                Vec::new()
            }
        };

        self.state.write().expect("state lock").entitlements = entitlements.clone();
        entitlements
    }

    // -- Hydration ---------------------------------------------------------

    /// Restores a persisted session at process start.
    ///
    /// An expired record is discarded immediately. A live one is
    /// adopted, then checked once against the server: a rejection
    /// clears local state, while a transport failure is advisory only
    /// and the session is kept.
    pub async fn hydrate(&self) {
        let record = match self.store.load().await {
            Ok(record) => record,
            Err(e) => {
                warn!("failed to read persisted session: {e}");
                return;
            }
        };

        let Some(session) = record else {
            return;
        };

        if session.is_expired(Utc::now()) {
            info!("discarding expired persisted session");
            if let Err(e) = self.store.clear().await {
                warn!("failed to clear expired session record: {e}");
            }
            return;
        }

        info!("hydrated session for {}", session.owner_address);
        self.state.write().expect("state lock").session = Some(session);

        match self.validate_session().await {
            Ok(true) => {
                self.fetch_entitlements().await;
            }
            Ok(false) => {
                // Server rejected; validate_session already cleared.
            }
            Err(e) => {
                warn!("startup validation unreachable, keeping session: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemorySessionStore;
    use chrono::Duration;
    use reqwest_middleware::ClientBuilder;

    fn plain_client() -> Arc<ClientWithMiddleware> {
        // No retry middleware: unit tests want fast failures.
        Arc::new(ClientBuilder::new(reqwest::Client::new()).build())
    }

    fn manager_with_store(store: Arc<dyn SessionStore>) -> Arc<SessionManager> {
        // Port 9 is unreachable; tests here never expect a live server.
        Arc::new(SessionManager::new(
            plain_client(),
            "http://127.0.0.1:9",
            store,
            None,
        ))
    }

    fn live_session() -> Session {
        Session {
            credential: "tok1".to_string(),
            owner_address: "0xabc".to_string(),
            expires_at: Utc::now() + Duration::hours(1),
        }
    }

    #[tokio::test]
    async fn session_header_empty_when_unauthenticated() {
        let manager = manager_with_store(Arc::new(MemorySessionStore::new()));
        assert!(manager.session_header().is_empty());
        assert!(!manager.is_authenticated());
    }

    #[tokio::test]
    async fn authenticate_without_signer_sets_no_wallet_error() {
        let manager = manager_with_store(Arc::new(MemorySessionStore::new()));

        let ok = manager.authenticate("0xABC").await;

        assert!(!ok);
        assert_eq!(manager.last_error().as_deref(), Some("No wallet available"));
        assert!(!manager.is_authenticated());
    }

    #[tokio::test]
    async fn hydrate_discards_expired_record() {
        let expired = Session {
            expires_at: Utc::now() - Duration::seconds(1),
            ..live_session()
        };
        let store = Arc::new(MemorySessionStore::seeded(expired));
        let manager = manager_with_store(store.clone());

        manager.hydrate().await;

        assert!(!manager.is_authenticated());
        // The stale record is also gone from the store.
        assert_eq!(store.load().await.expect("load"), None);
    }

    #[tokio::test]
    async fn hydrate_keeps_live_record_when_server_unreachable() {
        let store = Arc::new(MemorySessionStore::seeded(live_session()));
        let manager = manager_with_store(store);

        manager.hydrate().await;

        // Transport failure is advisory: the session survives.
        assert!(manager.is_authenticated());
        assert_eq!(
            manager.session_header().get(SESSION_HEADER).map(String::as_str),
            Some("tok1")
        );
    }

    #[tokio::test]
    async fn refresh_session_without_session_is_false() {
        let manager = manager_with_store(Arc::new(MemorySessionStore::new()));
        assert!(!manager.refresh_session().await);
    }

    #[tokio::test]
    async fn fetch_entitlements_without_session_is_empty_and_silent() {
        let manager = manager_with_store(Arc::new(MemorySessionStore::new()));
        assert!(manager.fetch_entitlements().await.is_empty());
        assert_eq!(manager.last_error(), None);
    }

    #[tokio::test]
    async fn has_access_to_false_without_entitlements() {
        let manager = manager_with_store(Arc::new(MemorySessionStore::new()));
        assert!(!manager.has_access_to("asset1"));
    }

    #[tokio::test]
    async fn header_provider_goes_empty_after_manager_drop() {
        let manager = manager_with_store(Arc::new(MemorySessionStore::new()));
        let provider = SessionManager::header_provider(&manager);
        drop(manager);
        assert!(provider().is_empty());
    }
}
