//! Consumer-facing session facade.
//!
//! Bridges the externally observed wallet identity (owned by the
//! wallet-connection layer, not by us) to the session manager. The
//! reaction to an identity change is a pure transition function so the
//! rules are testable without any wallet or network in the loop.
//!
//! Authentication is never triggered from here automatically: a
//! signature request pops a wallet prompt, so it must always be
//! user-initiated.

use std::sync::Arc;

use crate::entitlements::Entitlement;
use crate::manager::{SessionHeaders, SessionManager};
use crate::session::Session;

/// What an external identity change requires of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityAction {
    /// Identity still matches the session (or there is no session).
    None,
    /// The owning wallet disconnected or switched accounts; the
    /// session must end.
    Logout,
}

/// Pure transition: given the current session and the newly reported
/// wallet address, decide whether the session survives.
///
/// Ownership is checked via [`Session::owned_by`], so comparison is
/// case-insensitive; hex addresses arrive in mixed checksum casings.
pub fn identity_action(session: Option<&Session>, new_address: Option<&str>) -> IdentityAction {
    match (session, new_address) {
        // No session: nothing to protect.
        (None, _) => IdentityAction::None,
        // Session exists but the wallet is gone.
        (Some(_), None) => IdentityAction::Logout,
        (Some(session), Some(address)) => {
            if session.owned_by(address) {
                IdentityAction::None
            } else {
                IdentityAction::Logout
            }
        }
    }
}

/// Read-mostly wrapper over [`SessionManager`] handed to consumers.
#[derive(Clone)]
pub struct SessionContext {
    manager: Arc<SessionManager>,
}

impl SessionContext {
    pub fn new(manager: Arc<SessionManager>) -> Self {
        Self { manager }
    }

    /// Feeds an externally observed wallet identity change through the
    /// transition rules, logging out when required. Returns the action
    /// that was applied.
    pub async fn on_wallet_changed(&self, new_address: Option<&str>) -> IdentityAction {
        let session = self.manager.current_session();

        let action = identity_action(session.as_ref(), new_address);
        if action == IdentityAction::Logout {
            log::info!("wallet identity changed, ending session");
            self.manager.logout().await;
        }
        action
    }

    // -- Operations (all user- or consumer-initiated) ----------------------

    pub async fn authenticate(&self, address: &str) -> bool {
        self.manager.authenticate(address).await
    }

    pub async fn logout(&self) {
        self.manager.logout().await;
    }

    pub async fn refresh_session(&self) -> bool {
        self.manager.refresh_session().await
    }

    pub async fn fetch_entitlements(&self) -> Vec<Entitlement> {
        self.manager.fetch_entitlements().await
    }

    // -- Read-only state ---------------------------------------------------

    pub fn is_authenticated(&self) -> bool {
        self.manager.is_authenticated()
    }

    pub fn current_session(&self) -> Option<Session> {
        self.manager.current_session()
    }

    pub fn entitlements(&self) -> Vec<Entitlement> {
        self.manager.entitlements()
    }

    pub fn has_access_to(&self, asset_id: &str) -> bool {
        self.manager.has_access_to(asset_id)
    }

    pub fn session_header(&self) -> SessionHeaders {
        self.manager.session_header()
    }

    pub fn last_error(&self) -> Option<String> {
        self.manager.last_error()
    }
}
