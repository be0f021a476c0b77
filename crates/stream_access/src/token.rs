//! The stream-token record and its validity arithmetic.

use std::time::{Duration, Instant};

use serde::Deserialize;

/// Lifetime assumed when the server omits `expiresIn`.
pub const DEFAULT_EXPIRES_IN_SECS: u64 = 120;

/// A token is presented to the server only while at least this much
/// lifetime remains, absorbing request and processing latency.
pub const VALIDITY_MARGIN: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Video,
    Image,
}

/// One asset's short-lived streaming credential. Exactly one is
/// tracked at a time; a renewal replaces it wholesale.
#[derive(Debug, Clone)]
pub struct StreamToken {
    pub token: String,
    pub expires_in: u64,
    pub media_type: MediaType,
    pub mime_type: String,
    /// Monotonic acquisition instant; validity is elapsed-time
    /// arithmetic and must not jump with the wall clock.
    pub fetched_at: Instant,
}

impl StreamToken {
    /// True while more than [`VALIDITY_MARGIN`] of lifetime remains.
    pub fn is_valid(&self) -> bool {
        match Duration::from_secs(self.expires_in).checked_sub(self.fetched_at.elapsed()) {
            Some(remaining) => remaining > VALIDITY_MARGIN,
            None => false,
        }
    }

    /// When the renewal should fire: 75% of the token's lifetime,
    /// early enough that playback never straddles the expiry.
    pub fn renewal_delay(&self) -> Duration {
        Duration::from_secs(self.expires_in).mul_f64(0.75)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(expires_in: u64, fetched_at: Instant) -> StreamToken {
        StreamToken {
            token: "stream-tok".to_string(),
            expires_in,
            media_type: MediaType::Video,
            mime_type: "video/mp4".to_string(),
            fetched_at,
        }
    }

    #[test]
    fn fresh_token_is_valid() {
        assert!(token(120, Instant::now()).is_valid());
    }

    #[test]
    fn token_inside_margin_is_invalid() {
        // 10s lifetime leaves nothing beyond the 10s margin.
        assert!(!token(10, Instant::now()).is_valid());
    }

    #[test]
    fn elapsed_lifetime_is_invalid() {
        let fetched_at = Instant::now() - Duration::from_secs(200);
        assert!(!token(120, fetched_at).is_valid());
    }

    #[test]
    fn renewal_fires_at_three_quarters() {
        assert_eq!(
            token(120, Instant::now()).renewal_delay(),
            Duration::from_secs(90)
        );
    }

    #[test]
    fn media_type_parses_lowercase() {
        let parsed: MediaType = serde_json::from_str("\"image\"").expect("parse");
        assert_eq!(parsed, MediaType::Image);
    }
}
