//! Domain object capabilities and the type-erased shape the CRUD engine drives.
//!
//! Callers describe their record types by implementing [`Resource`] (and
//! [`OwnedResource`] for rows scoped to a creating user), then register them with
//! the [`ResourceRegistry`]. The engine only ever sees `Box<dyn DomainObject>`.

use std::fmt::Debug;

use serde::{de::DeserializeOwned, Serialize, Serializer};
use serde_json::Value;
use uuid::Uuid;

pub mod registry;

pub use registry::{RegistryError, ResourceDescriptor, ResourceRegistry};

/// Column / JSON field carrying the owner reference on owned resources.
pub const OWNER_FIELD: &str = "user_id";

/// Visibility shape of a resource, fixed at registration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Ownership {
    /// Rows are visible to every caller holding the right permission.
    Global,
    /// Rows belong to the caller that created them.
    Owned,
}

impl Ownership {
    pub fn is_global(&self) -> bool {
        matches!(self, Ownership::Global)
    }
}

/// Structural validation failure reported by a domain object.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ValidationError(pub String);

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Capability set every registered record type implements.
///
/// `Default` supplies the blank instance the registry manufactures; serde
/// supplies body decoding and row hydration.
pub trait Resource: Serialize + DeserializeOwned + Default + Debug + Send + Sync + 'static {
    /// Resource name used for routes, permission strings and the backing table.
    const NAME: &'static str;

    fn id(&self) -> Option<Uuid>;

    fn set_id(&mut self, id: Uuid);

    fn validate(&self) -> Result<(), ValidationError> {
        Ok(())
    }
}

/// A resource whose rows carry an owner reference.
pub trait OwnedResource: Resource {
    fn owner_id(&self) -> Option<Uuid>;

    fn set_owner_id(&mut self, owner: Uuid);
}

/// Object-safe view of a registered record, produced by the registry.
pub trait DomainObject: Debug + Send + Sync {
    fn resource_name(&self) -> &'static str;

    fn ownership(&self) -> Ownership;

    fn id(&self) -> Option<Uuid>;

    fn set_id(&mut self, id: Uuid);

    fn validate(&self) -> Result<(), ValidationError>;

    /// Replaces the current state with the JSON request body.
    fn decode(&mut self, body: &[u8]) -> Result<(), serde_json::Error>;

    /// Replaces the current state with a stored row.
    fn load(&mut self, row: Value) -> Result<(), serde_json::Error>;

    fn to_value(&self) -> Result<Value, serde_json::Error>;

    fn owner_id(&self) -> Option<Uuid>;

    /// Returns `false` when the object has no owner reference to stamp.
    fn set_owner_id(&mut self, owner: Uuid) -> bool;
}

impl Serialize for dyn DomainObject {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value()
            .map_err(serde::ser::Error::custom)?
            .serialize(serializer)
    }
}

/// Erased wrapper for resources registered as global.
#[derive(Debug, Default)]
pub(crate) struct GlobalObject<T>(pub(crate) T);

/// Erased wrapper for resources registered as owned.
#[derive(Debug, Default)]
pub(crate) struct OwnedObject<T>(pub(crate) T);

impl<T: Resource> DomainObject for GlobalObject<T> {
    fn resource_name(&self) -> &'static str {
        T::NAME
    }

    fn ownership(&self) -> Ownership {
        Ownership::Global
    }

    fn id(&self) -> Option<Uuid> {
        self.0.id()
    }

    fn set_id(&mut self, id: Uuid) {
        self.0.set_id(id)
    }

    fn validate(&self) -> Result<(), ValidationError> {
        self.0.validate()
    }

    fn decode(&mut self, body: &[u8]) -> Result<(), serde_json::Error> {
        self.0 = serde_json::from_slice(body)?;
        Ok(())
    }

    fn load(&mut self, row: Value) -> Result<(), serde_json::Error> {
        self.0 = serde_json::from_value(row)?;
        Ok(())
    }

    fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(&self.0)
    }

    fn owner_id(&self) -> Option<Uuid> {
        None
    }

    fn set_owner_id(&mut self, _owner: Uuid) -> bool {
        false
    }
}

impl<T: OwnedResource> DomainObject for OwnedObject<T> {
    fn resource_name(&self) -> &'static str {
        T::NAME
    }

    fn ownership(&self) -> Ownership {
        Ownership::Owned
    }

    fn id(&self) -> Option<Uuid> {
        self.0.id()
    }

    fn set_id(&mut self, id: Uuid) {
        self.0.set_id(id)
    }

    fn validate(&self) -> Result<(), ValidationError> {
        self.0.validate()
    }

    fn decode(&mut self, body: &[u8]) -> Result<(), serde_json::Error> {
        self.0 = serde_json::from_slice(body)?;
        Ok(())
    }

    fn load(&mut self, row: Value) -> Result<(), serde_json::Error> {
        self.0 = serde_json::from_value(row)?;
        Ok(())
    }

    fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(&self.0)
    }

    fn owner_id(&self) -> Option<Uuid> {
        self.0.owner_id()
    }

    fn set_owner_id(&mut self, owner: Uuid) -> bool {
        self.0.set_owner_id(owner);
        true
    }
}
