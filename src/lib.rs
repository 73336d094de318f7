pub mod access;
pub mod auth;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod gate;
pub mod handlers;
pub mod middleware;
pub mod resource;
pub mod server;

pub use access::{AccessScope, Action, PageBounds, PermissionSet, RoleTable};
pub use database::{ListPage, MemoryStore, PgStore, RepositoryError, ScopedRepository, Store};
pub use gate::{Admission, AuthorizationGate, Rejection};
pub use resource::{DomainObject, OwnedResource, Ownership, Resource, ResourceRegistry, ValidationError};
pub use server::{router, AppState};
