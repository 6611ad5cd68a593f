//! Turning a client's token into a stable [`Identity`].
//!
//! Palisade doesn't manage accounts. A connection presents a token (a
//! session cookie value, an API key, ...) and an [`IdentityProvider`]
//! decides which identity it stands for. Rooms only ever see the result.

use std::future::Future;

use palisade_protocol::Identity;
use rand::Rng;

use crate::SessionError;

/// Longest token [`SessionTokenProvider`] accepts.
pub const MAX_TOKEN_LEN: usize = 128;

/// Resolves a client token into an identity.
///
/// # Example
///
/// ```rust
/// use palisade_protocol::Identity;
/// use palisade_session::{IdentityProvider, SessionError};
///
/// /// Only lets in tokens from a fixed allow-list.
/// struct AllowList(Vec<String>);
///
/// impl IdentityProvider for AllowList {
///     async fn resolve(&self, token: &str) -> Result<Identity, SessionError> {
///         if self.0.iter().any(|t| t == token) {
///             Ok(Identity::new(token))
///         } else {
///             Err(SessionError::AuthFailed("unknown token".into()))
///         }
///     }
/// }
/// ```
pub trait IdentityProvider: Send + Sync + 'static {
    /// Returns the identity behind `token`.
    ///
    /// An empty token means the client has none yet; providers may mint
    /// one or refuse.
    fn resolve(
        &self,
        token: &str,
    ) -> impl Future<Output = Result<Identity, SessionError>> + Send;
}

/// Treats the token as a session id: any non-empty token is taken
/// verbatim, and an empty one gets a freshly minted id the client is
/// expected to keep and present next time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionTokenProvider;

impl IdentityProvider for SessionTokenProvider {
    async fn resolve(&self, token: &str) -> Result<Identity, SessionError> {
        let token = token.trim();
        if token.is_empty() {
            return Ok(generate_identity());
        }
        if token.len() > MAX_TOKEN_LEN {
            return Err(SessionError::AuthFailed(format!(
                "token longer than {MAX_TOKEN_LEN} bytes"
            )));
        }
        Ok(Identity::new(token))
    }
}

/// A random 32-character hex identity (128 bits of entropy).
pub fn generate_identity() -> Identity {
    let mut rng = rand::rng();
    let bytes: [u8; 16] = rng.random();
    Identity(bytes.iter().map(|b| format!("{b:02x}")).collect())
}
