use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::ResolvedIdentity;
use crate::resource::Resource;

/// Local record of a caller, keyed by the identity provider's subject id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct User {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    pub preferred_username: String,
    pub given_name: String,
    pub family_name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl User {
    /// Build the first-use record for a resolved identity.
    pub fn from_identity(id: Uuid, identity: &ResolvedIdentity) -> Self {
        Self {
            id: Some(id),
            preferred_username: identity.username.clone(),
            given_name: identity.given_name.clone(),
            family_name: identity.family_name.clone(),
            email: identity.email.clone(),
            created_at: None,
            updated_at: None,
        }
    }
}

impl Resource for User {
    const NAME: &'static str = "user";

    fn id(&self) -> Option<Uuid> {
        self.id
    }

    fn set_id(&mut self, id: Uuid) {
        self.id = Some(id);
    }
}
