use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};

use super::{ProviderError, ResolvedIdentity};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RealmAccess {
    #[serde(default)]
    pub roles: Vec<String>,
}

/// Token claims read by both providers. Profile claims are optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default)]
    pub sub: String,
    #[serde(default)]
    pub preferred_username: String,
    #[serde(default)]
    pub given_name: String,
    #[serde(default)]
    pub family_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub realm_access: RealmAccess,
    #[serde(default)]
    pub exp: i64,
    #[serde(default)]
    pub iat: i64,
}

impl Claims {
    pub fn new(sub: impl Into<String>, username: impl Into<String>, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            sub: sub.into(),
            preferred_username: username.into(),
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
            ..Default::default()
        }
    }

    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.realm_access.roles = roles.into_iter().map(Into::into).collect();
        self
    }

    pub fn identity(&self) -> Result<ResolvedIdentity, ProviderError> {
        if self.sub.is_empty() {
            return Err(ProviderError::Claim("sub"));
        }
        Ok(ResolvedIdentity {
            subject: self.sub.clone(),
            username: self.preferred_username.clone(),
            given_name: self.given_name.clone(),
            family_name: self.family_name.clone(),
            email: self.email.clone(),
        })
    }

    pub fn roles(&self) -> Vec<String> {
        self.realm_access.roles.clone()
    }
}

/// Sign claims with an HS256 shared secret.
pub fn generate_jwt(claims: &Claims, secret: &str) -> Result<String, ProviderError> {
    if secret.is_empty() {
        return Err(ProviderError::Config("JWT secret is empty".to_string()));
    }

    let encoding_key = EncodingKey::from_secret(secret.as_bytes());
    encode(&Header::default(), claims, &encoding_key)
        .map_err(|e| ProviderError::InvalidToken(e.to_string()))
}
