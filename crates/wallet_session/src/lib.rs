//! Wallet-backed session lifecycle.
//!
//! A user proves ownership of a wallet by signing a server-issued
//! challenge; the server answers with a bearer credential that gates
//! everything else (entitlements, stream access). This crate owns that
//! credential's whole life: acquisition, persistence across restarts,
//! validation, and teardown when the wallet disappears or changes.

pub mod api;
pub mod entitlements;
pub mod error;
pub mod facade;
pub mod manager;
pub mod session;
pub mod signer;
pub mod storage;

pub use entitlements::{Entitlement, PlanType};
pub use error::{Result, SessionError};
pub use facade::{IdentityAction, SessionContext};
pub use manager::{SessionHeaders, SessionManager};
pub use session::{Session, SESSION_HEADER};
pub use signer::WalletSigner;
pub use storage::{FileSessionStore, MemorySessionStore, SessionStore};
