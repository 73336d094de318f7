//! Permission evaluation and per-request access scoping.

pub mod permission;
pub mod scope;

pub use permission::{authorized, Action, PermissionSet, RoleTable, RoleTableError};
pub use scope::{AccessScope, PageBounds, PageParams};
