//! Short-lived, per-asset streaming tokens.
//!
//! A stream token authorizes fetching one asset's media for a couple
//! of minutes. The manager here acquires tokens with the session
//! header, tracks their expiry, and quietly renews them before they
//! lapse so long-running playback never sees a dead token.

pub mod error;
pub mod manager;
pub mod token;

pub use error::{Result, StreamTokenError};
pub use manager::{HeaderProvider, StreamTokenManager};
pub use token::{MediaType, StreamToken, DEFAULT_EXPIRES_IN_SECS, VALIDITY_MARGIN};
