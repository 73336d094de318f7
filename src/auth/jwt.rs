use async_trait::async_trait;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};

use super::{AuthProvider, Claims, ProviderError, ResolvedIdentity};

/// Validates HS256 tokens signed with a shared secret.
#[derive(Clone)]
pub struct JwtAuthProvider {
    key: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for JwtAuthProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtAuthProvider").finish_non_exhaustive()
    }
}

impl JwtAuthProvider {
    pub fn new(secret: &str) -> Result<Self, ProviderError> {
        if secret.is_empty() {
            return Err(ProviderError::Config("JWT secret is empty".to_string()));
        }
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_aud = false;
        Ok(Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        })
    }

    fn claims(&self, token: &str) -> Result<Claims, ProviderError> {
        decode::<Claims>(token, &self.key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| ProviderError::InvalidToken(e.to_string()))
    }
}

#[async_trait]
impl AuthProvider for JwtAuthProvider {
    async fn validate(&self, token: &str) -> Result<(), ProviderError> {
        self.claims(token).map(|_| ())
    }

    async fn resolve_identity(&self, token: &str) -> Result<ResolvedIdentity, ProviderError> {
        self.claims(token)?.identity()
    }

    async fn resolve_roles(&self, token: &str) -> Result<Vec<String>, ProviderError> {
        Ok(self.claims(token)?.roles())
    }
}
