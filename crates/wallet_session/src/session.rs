//! The persisted session record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Header carrying the session credential on authenticated calls.
pub const SESSION_HEADER: &str = "X-Wallet-Session";

/// The authenticated relationship between one wallet address and the
/// server. At most one exists per process; it is created by a
/// successful verify, refreshed in place when the server extends the
/// expiry, and destroyed on logout, rejection, or wallet change.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Opaque bearer credential issued by `/wallet/verify`.
    pub credential: String,

    /// Wallet address that produced the signature, as reported by the
    /// wallet. Comparisons against externally observed addresses are
    /// case-insensitive.
    pub owner_address: String,

    /// Server-assigned expiry. A session whose expiry has passed is
    /// never valid, including at hydration time.
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Case-insensitive owner check against an externally reported
    /// wallet address.
    pub fn owned_by(&self, address: &str) -> bool {
        self.owner_address.eq_ignore_ascii_case(address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn session(expires_at: DateTime<Utc>) -> Session {
        Session {
            credential: "tok1".to_string(),
            owner_address: "0xABC".to_string(),
            expires_at,
        }
    }

    #[test]
    fn expired_at_exact_instant() {
        let now = Utc::now();
        assert!(session(now).is_expired(now));
        assert!(session(now - Duration::seconds(1)).is_expired(now));
        assert!(!session(now + Duration::seconds(1)).is_expired(now));
    }

    #[test]
    fn owner_match_ignores_case() {
        let s = session(Utc::now());
        assert!(s.owned_by("0xabc"));
        assert!(s.owned_by("0XABC"));
        assert!(!s.owned_by("0xdef"));
    }

    #[test]
    fn serializes_camel_case() {
        let s = session(Utc::now());
        let json = serde_json::to_value(&s).expect("serialize");
        assert!(json.get("ownerAddress").is_some());
        assert!(json.get("expiresAt").is_some());
    }
}
