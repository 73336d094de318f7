//! Per-request authentication and authorization.
//!
//! [`AuthorizationGate::admit`] turns an `Authorization` header into either a
//! rejection or an [`Admission`] carrying the caller's local user record, their
//! effective permissions and a repository scoped to what they may see.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

use crate::access::{authorized, AccessScope, Action, PageBounds, PageParams, PermissionSet, RoleTable};
use crate::auth::{AuthProvider, ProviderError};
use crate::database::models::User;
use crate::database::{OwnerFilter, ScopedRepository, Store};
use crate::resource::{Resource, ResourceRegistry};

pub const MISSING_BEARER: &str = "unauthorized, missing bearer authorization header";
pub const INVALID_BEARER: &str = "unauthorized, invalid bearer authorization header";

const BEARER: &str = "bearer";

#[derive(Debug, Error)]
pub enum Rejection {
    #[error("{0}")]
    MissingOrMalformedCredential(&'static str),

    #[error("credential rejected: {0}")]
    InvalidCredential(ProviderError),

    #[error("identity resolution failed: {0}")]
    IdentityResolutionFailed(String),

    #[error("user record unavailable: {0}")]
    PersistenceError(String),

    #[error("role resolution failed: {0}")]
    RoleResolutionFailed(ProviderError),

    #[error("no permission for {resource}.{action}")]
    Forbidden { resource: String, action: Action },
}

impl Rejection {
    /// Message safe to return to the client. Root causes stay in the logs.
    pub fn client_message(&self) -> String {
        match self {
            Rejection::MissingOrMalformedCredential(message) => message.to_string(),
            Rejection::InvalidCredential(_) => "unauthorized, invalid or expired token".to_string(),
            Rejection::IdentityResolutionFailed(_) => "unauthorized, unable to resolve identity".to_string(),
            Rejection::PersistenceError(_) => "unauthorized, unable to load user".to_string(),
            Rejection::RoleResolutionFailed(_) => "unauthorized, unable to resolve roles".to_string(),
            Rejection::Forbidden { resource, action } => {
                format!("unauthorized, no permission for {}.{}", resource, action)
            }
        }
    }
}

/// Outcome of a successful gate run, handed to exactly one handler.
#[derive(Debug)]
pub struct Admission {
    pub user: User,
    pub permissions: PermissionSet,
    pub repository: ScopedRepository,
}

/// Extract the token from an `Authorization: Bearer <token>` header value.
///
/// The scheme is matched case-insensitively.
pub fn bearer_token(header: Option<&str>) -> Result<&str, Rejection> {
    let header = match header {
        Some(h) if h.len() > BEARER.len() => h,
        _ => return Err(Rejection::MissingOrMalformedCredential(MISSING_BEARER)),
    };

    let rest = match header.get(..BEARER.len()) {
        Some(scheme) if scheme.eq_ignore_ascii_case(BEARER) => &header[BEARER.len()..],
        _ => return Err(Rejection::MissingOrMalformedCredential(INVALID_BEARER)),
    };
    if !rest.starts_with(char::is_whitespace) {
        return Err(Rejection::MissingOrMalformedCredential(INVALID_BEARER));
    }

    let token = rest.trim();
    if token.is_empty() {
        return Err(Rejection::MissingOrMalformedCredential(MISSING_BEARER));
    }
    Ok(token)
}

// Short, non-reversible token id for log correlation.
fn fingerprint(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    digest[..6].iter().map(|b| format!("{:02x}", b)).collect()
}

/// Shared, read-only authorization pipeline.
#[derive(Clone)]
pub struct AuthorizationGate {
    provider: Arc<dyn AuthProvider>,
    store: Arc<dyn Store>,
    registry: Arc<ResourceRegistry>,
    roles: Arc<RoleTable>,
    bounds: PageBounds,
    validation_timeout: Duration,
}

impl fmt::Debug for AuthorizationGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizationGate")
            .field("resources", &self.registry.names())
            .field("roles", &self.roles.len())
            .field("bounds", &self.bounds)
            .field("validation_timeout", &self.validation_timeout)
            .finish_non_exhaustive()
    }
}

impl AuthorizationGate {
    pub fn new(
        provider: Arc<dyn AuthProvider>,
        store: Arc<dyn Store>,
        registry: Arc<ResourceRegistry>,
        roles: Arc<RoleTable>,
        bounds: PageBounds,
    ) -> Self {
        Self {
            provider,
            store,
            registry,
            roles,
            bounds,
            validation_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_validation_timeout(mut self, timeout: Duration) -> Self {
        self.validation_timeout = timeout;
        self
    }

    pub fn registry(&self) -> &Arc<ResourceRegistry> {
        &self.registry
    }

    /// Run the full pipeline for one request against `resource`.
    #[tracing::instrument(level = "debug", skip_all, fields(resource = %resource, action = %action))]
    pub async fn admit(
        &self,
        authorization: Option<&str>,
        resource: &str,
        action: Action,
        params: &PageParams,
    ) -> Result<Admission, Rejection> {
        let token = bearer_token(authorization).map_err(|e| {
            tracing::warn!("Rejected request for {}: {}", resource, e);
            e
        })?;
        let token_id = fingerprint(token);

        match tokio::time::timeout(self.validation_timeout, self.provider.validate(token)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!("Token {} failed validation: {}", token_id, e);
                return Err(Rejection::InvalidCredential(e));
            }
            Err(_) => {
                tracing::warn!("Token {} validation timed out", token_id);
                return Err(Rejection::InvalidCredential(ProviderError::Timeout(
                    self.validation_timeout,
                )));
            }
        }

        let identity = self.provider.resolve_identity(token).await.map_err(|e| {
            tracing::warn!("Token {} identity resolution failed: {}", token_id, e);
            Rejection::IdentityResolutionFailed(e.to_string())
        })?;
        let user_id = Uuid::parse_str(&identity.subject).map_err(|_| {
            tracing::warn!("Token {} subject '{}' is not a UUID", token_id, identity.subject);
            Rejection::IdentityResolutionFailed(format!("subject '{}' is not a UUID", identity.subject))
        })?;

        let user = self.materialize_user(user_id, &identity).await?;

        let roles = self.provider.resolve_roles(token).await.map_err(|e| {
            tracing::warn!("Token {} role resolution failed: {}", token_id, e);
            Rejection::RoleResolutionFailed(e)
        })?;
        let permissions = self.roles.expand(roles.as_slice());
        tracing::debug!("User {} roles {:?} expand to {} permissions", user_id, roles, permissions.len());

        if !authorized(resource, action, &permissions) {
            tracing::warn!("User {} lacks {}.{}", user_id, resource, action);
            return Err(Rejection::Forbidden {
                resource: resource.to_string(),
                action,
            });
        }

        let scope = AccessScope::new(
            resource,
            params,
            user.id,
            self.registry.is_global(resource),
            &permissions,
            self.bounds,
        );
        let repository = ScopedRepository::new(resource, scope, self.store.clone(), self.registry.clone());

        Ok(Admission {
            user,
            permissions,
            repository,
        })
    }

    /// Load the local user row, inserting it on first sight.
    async fn materialize_user(
        &self,
        user_id: Uuid,
        identity: &crate::auth::ResolvedIdentity,
    ) -> Result<User, Rejection> {
        let table = User::NAME;
        let existing = self
            .store
            .find_by_id(table, OwnerFilter::Unrestricted, user_id)
            .await
            .map_err(|e| {
                tracing::error!("Failed to look up user {}: {}", user_id, e);
                Rejection::PersistenceError(e.to_string())
            })?;

        if existing.is_none() {
            let row = serde_json::to_value(User::from_identity(user_id, identity))
                .map_err(|e| Rejection::PersistenceError(e.to_string()))?;
            match self.store.insert(table, row).await {
                Ok(_) => tracing::info!("Created local user {} ({})", user_id, identity.username),
                // Another request may have inserted the same user first.
                Err(e) => tracing::debug!("Insert of user {} failed, re-reading: {}", user_id, e),
            }
        }

        let row = self
            .store
            .find_by_id(table, OwnerFilter::Unrestricted, user_id)
            .await
            .map_err(|e| {
                tracing::error!("Failed to reload user {}: {}", user_id, e);
                Rejection::PersistenceError(e.to_string())
            })?
            .ok_or_else(|| {
                tracing::error!("User {} missing after insert", user_id);
                Rejection::PersistenceError(format!("user {} could not be saved", user_id))
            })?;

        serde_json::from_value(row).map_err(|e| Rejection::PersistenceError(e.to_string()))
    }
}
