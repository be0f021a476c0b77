//! Entitlements: time-boxed grants of access to individual assets.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Purchase duration of an entitlement.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PlanType {
    #[serde(rename = "24h")]
    TwentyFourHour,
    #[serde(rename = "7d")]
    SevenDay,
}

/// One asset-scoped access grant, as returned by
/// `GET /wallet/entitlements`. The collection lives and dies with the
/// session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Entitlement {
    pub id: String,
    pub asset_id: String,
    pub plan_type: PlanType,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Entitlement {
    /// Grants access only while the expiry is strictly in the future.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

/// Access predicate over an entitlement collection: true iff some
/// entitlement for `asset_id` is still active.
pub fn grants_access(entitlements: &[Entitlement], asset_id: &str, now: DateTime<Utc>) -> bool {
    entitlements
        .iter()
        .any(|e| e.asset_id == asset_id && e.is_active(now))
}
