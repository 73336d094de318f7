use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use axum::http::Method;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Operation a permission grants on a resource.
///
/// `Global` is not a CRUD action of its own: holding `<resource>.global` lifts
/// the ownership restriction on reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Read,
    Write,
    Global,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Read => "read",
            Action::Write => "write",
            Action::Global => "global",
        }
    }

    /// `read` for safe methods, `write` for everything that mutates.
    pub fn for_method(method: &Method) -> Self {
        if method == Method::GET || method == Method::HEAD {
            Action::Read
        } else {
            Action::Write
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Effective `<resource>.<action>` strings of one caller for one request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PermissionSet(Vec<String>);

impl PermissionSet {
    pub fn new(permissions: Vec<String>) -> Self {
        Self(permissions)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Case-insensitive check for `<resource>.<action>` in the permission set.
///
/// Resource existence is not checked; unknown resources never match.
pub fn authorized(resource: &str, action: Action, permissions: &PermissionSet) -> bool {
    let wanted = format!("{}.{}", resource, action.as_str());
    permissions.iter().any(|p| p.eq_ignore_ascii_case(&wanted))
}

#[derive(Debug, Error)]
pub enum RoleTableError {
    #[error("failed to read role table {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid role table: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Static role to permission mapping, supplied at startup.
///
/// YAML form:
///
/// ```yaml
/// Customer:
///   - order.read
///   - order.write
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleTable(HashMap<String, Vec<String>>);

impl RoleTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_yaml_str(source: &str) -> Result<Self, RoleTableError> {
        Ok(serde_yaml::from_str(source)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, RoleTableError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| RoleTableError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&source)
    }

    pub fn with_role<I, S>(mut self, role: impl Into<String>, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.0
            .insert(role.into(), permissions.into_iter().map(Into::into).collect());
        self
    }

    /// Union of the permissions mapped to each role. Unknown roles contribute nothing.
    pub fn expand<S: AsRef<str>>(&self, roles: &[S]) -> PermissionSet {
        let mut expanded: Vec<String> = Vec::new();
        for role in roles {
            let Some(permissions) = self.0.get(role.as_ref()) else {
                continue;
            };
            for permission in permissions {
                if !expanded.iter().any(|p| p == permission) {
                    expanded.push(permission.clone());
                }
            }
        }
        PermissionSet(expanded)
    }

    /// Roles sorted by name, for display.
    pub fn roles(&self) -> Vec<(&str, &[String])> {
        let mut roles: Vec<_> = self
            .0
            .iter()
            .map(|(role, perms)| (role.as_str(), perms.as_slice()))
            .collect();
        roles.sort_by(|a, b| a.0.cmp(b.0));
        roles
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
