//! The external wallet-signing capability.

use async_trait::async_trait;

/// Capability to request a personal-message signature from the user's
/// wallet. Signing suspends until the wallet answers; the user can
/// decline, which surfaces as an `Err`.
///
/// Signature verification itself is server-side; this port never
/// validates anything.
#[async_trait]
pub trait WalletSigner: Send + Sync {
    /// Asks the wallet holding `address` to sign `message`. Returns
    /// the signature string, or an error message when the wallet
    /// refuses or fails.
    async fn sign_message(
        &self,
        message: &str,
        address: &str,
    ) -> std::result::Result<String, String>;
}
