//! Bearer credential validation and identity/role resolution.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod claims;
pub mod jwt;
pub mod oidc;

pub use claims::{generate_jwt, Claims, RealmAccess};
pub use jwt::JwtAuthProvider;
pub use oidc::OidcAuthProvider;

/// Identity translated from a validated credential.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedIdentity {
    /// Provider subject id; must be a UUID to double as the local user id.
    pub subject: String,
    pub username: String,
    pub given_name: String,
    pub family_name: String,
    pub email: String,
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("token is not active")]
    Inactive,

    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("identity provider unreachable: {0}")]
    Transport(String),

    #[error("identity provider responded with status {0}")]
    Status(u16),

    #[error("token is missing claim '{0}'")]
    Claim(&'static str),

    #[error("provider misconfigured: {0}")]
    Config(String),

    #[error("validation timed out after {0:?}")]
    Timeout(Duration),
}

/// External identity provider.
///
/// `validate` is the only call expected to reach the network; the resolve
/// calls work from the token itself.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn validate(&self, token: &str) -> Result<(), ProviderError>;

    async fn resolve_identity(&self, token: &str) -> Result<ResolvedIdentity, ProviderError>;

    async fn resolve_roles(&self, token: &str) -> Result<Vec<String>, ProviderError>;
}
