use std::collections::HashMap;

use thiserror::Error;

use super::{DomainObject, GlobalObject, OwnedObject, OwnedResource, Ownership, Resource};
use crate::database::models::user::User;

type Constructor = fn() -> Box<dyn DomainObject>;

/// Errors from resource lookups
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("unrecognized resource name: {0}")]
    UnknownResource(String),

    #[error("type registered as {name} does not satisfy the {expected:?} resource shape")]
    TypeMismatch { name: String, expected: Ownership },
}

/// Name, visibility shape and constructor of one registered resource type.
#[derive(Debug, Clone, Copy)]
pub struct ResourceDescriptor {
    name: &'static str,
    ownership: Ownership,
    construct: Constructor,
}

impl ResourceDescriptor {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn ownership(&self) -> Ownership {
        self.ownership
    }

    pub fn is_global(&self) -> bool {
        self.ownership.is_global()
    }
}

fn construct_global<T: Resource>() -> Box<dyn DomainObject> {
    Box::new(GlobalObject(T::default()))
}

fn construct_owned<T: OwnedResource>() -> Box<dyn DomainObject> {
    Box::new(OwnedObject(T::default()))
}

/// Factory map from resource name to descriptor.
///
/// Populated once at startup and shared read-only afterwards; registering while
/// requests are being served is not supported.
#[derive(Debug, Clone, Default)]
pub struct ResourceRegistry {
    resources: HashMap<&'static str, ResourceDescriptor>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the built-in `user` resource.
    pub fn with_users() -> Self {
        let mut registry = Self::new();
        registry.register_global::<User>();
        registry
    }

    pub fn register_global<T: Resource>(&mut self) -> &mut Self {
        self.insert(ResourceDescriptor {
            name: T::NAME,
            ownership: Ownership::Global,
            construct: construct_global::<T>,
        })
    }

    pub fn register_owned<T: OwnedResource>(&mut self) -> &mut Self {
        self.insert(ResourceDescriptor {
            name: T::NAME,
            ownership: Ownership::Owned,
            construct: construct_owned::<T>,
        })
    }

    // Last registration wins.
    fn insert(&mut self, descriptor: ResourceDescriptor) -> &mut Self {
        let name = descriptor.name;
        if self.resources.insert(name, descriptor).is_some() {
            tracing::warn!("Resource '{}' registered twice, keeping the latest", name);
        }
        self
    }

    /// Registered resource names, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.resources.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Manufacture a blank instance of the named resource.
    pub fn instantiate(&self, name: &str) -> Result<Box<dyn DomainObject>, RegistryError> {
        let descriptor = self
            .resources
            .get(name)
            .ok_or_else(|| RegistryError::UnknownResource(name.to_string()))?;

        let object = (descriptor.construct)();
        if object.resource_name() != descriptor.name || object.ownership() != descriptor.ownership {
            return Err(RegistryError::TypeMismatch {
                name: name.to_string(),
                expected: descriptor.ownership,
            });
        }
        Ok(object)
    }

    /// `false` for unknown names; not a confirmation that the resource exists.
    pub fn is_global(&self, name: &str) -> bool {
        self.resources
            .get(name)
            .map(ResourceDescriptor::is_global)
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}
