use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use super::{Store, StoreError};
use crate::access::AccessScope;
use crate::resource::{DomainObject, RegistryError, ResourceRegistry, ValidationError, OWNER_FIELD};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("{resource} {id} not found")]
    NotFound { resource: String, id: Uuid },

    #[error("validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),

    #[error("malformed request body: {0}")]
    MalformedBody(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("stored {resource} row could not be decoded: {source}")]
    CorruptRow {
        resource: String,
        #[source]
        source: serde_json::Error,
    },
}

/// One page of a list call.
#[derive(Debug, Serialize)]
pub struct ListPage {
    pub count: i64,
    pub page: i64,
    pub page_size: i64,
    pub data: Vec<Box<dyn DomainObject>>,
}

/// CRUD over one resource, bound to the access scope of one request.
///
/// Every read and write goes through the scope's owner filter, so rows the
/// caller may not see behave exactly like rows that do not exist.
pub struct ScopedRepository {
    resource: String,
    scope: AccessScope,
    store: Arc<dyn Store>,
    registry: Arc<ResourceRegistry>,
}

impl fmt::Debug for ScopedRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedRepository")
            .field("resource", &self.resource)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

impl ScopedRepository {
    pub fn new(
        resource: impl Into<String>,
        scope: AccessScope,
        store: Arc<dyn Store>,
        registry: Arc<ResourceRegistry>,
    ) -> Self {
        Self {
            resource: resource.into(),
            scope,
            store,
            registry,
        }
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn scope(&self) -> &AccessScope {
        &self.scope
    }

    fn blank(&self) -> Result<Box<dyn DomainObject>, RepositoryError> {
        Ok(self.registry.instantiate(&self.resource)?)
    }

    fn hydrate(&self, row: Value) -> Result<Box<dyn DomainObject>, RepositoryError> {
        let mut object = self.blank()?;
        object.load(row).map_err(|source| RepositoryError::CorruptRow {
            resource: self.resource.clone(),
            source,
        })?;
        Ok(object)
    }

    fn not_found(&self, id: Uuid) -> RepositoryError {
        RepositoryError::NotFound {
            resource: self.resource.clone(),
            id,
        }
    }

    // Blank instance populated from the body and validated.
    fn decode(&self, body: &[u8]) -> Result<Box<dyn DomainObject>, RepositoryError> {
        let mut object = self.blank()?;
        object
            .decode(body)
            .map_err(|e| RepositoryError::MalformedBody(e.to_string()))?;
        object.validate()?;
        Ok(object)
    }

    fn to_row(object: &dyn DomainObject) -> Result<Value, RepositoryError> {
        object
            .to_value()
            .map_err(|e| RepositoryError::Store(StoreError::QueryError(e.to_string())))
    }

    pub async fn list(&self) -> Result<ListPage, RepositoryError> {
        self.blank()?;
        let filter = self.scope.owner_filter();
        let count = self.store.count(&self.resource, filter).await?;
        let rows = self
            .store
            .find_page(&self.resource, filter, self.scope.window())
            .await?;
        let data = rows
            .into_iter()
            .map(|row| self.hydrate(row))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ListPage {
            count,
            page: self.scope.page(),
            page_size: self.scope.page_size(),
            data,
        })
    }

    pub async fn get(&self, id: Uuid) -> Result<Box<dyn DomainObject>, RepositoryError> {
        self.blank()?;
        let row = self
            .store
            .find_by_id(&self.resource, self.scope.owner_filter(), id)
            .await?
            .ok_or_else(|| self.not_found(id))?;
        self.hydrate(row)
    }

    pub async fn create(&self, body: &[u8]) -> Result<Box<dyn DomainObject>, RepositoryError> {
        let mut object = self.decode(body)?;

        if !object.ownership().is_global() {
            let caller = self.scope.caller_id().ok_or_else(|| {
                RepositoryError::Unauthorized("no identity available to own the record".to_string())
            })?;
            object.set_owner_id(caller);
        }

        let mut row = Self::to_row(object.as_ref())?;
        // Ids are always assigned by the store.
        if let Value::Object(map) = &mut row {
            map.remove("id");
        }

        let stored = self.store.insert(&self.resource, row).await?;
        object.load(stored).map_err(|source| RepositoryError::CorruptRow {
            resource: self.resource.clone(),
            source,
        })?;
        tracing::debug!("Created {} {:?}", self.resource, object.id());
        Ok(object)
    }

    /// Full replace of a visible row. The path id wins over any id in the body,
    /// and owned rows keep their existing owner.
    pub async fn update(&self, id: Uuid, body: &[u8]) -> Result<Box<dyn DomainObject>, RepositoryError> {
        let mut object = self.decode(body)?;
        let filter = self.scope.owner_filter();

        let existing = self
            .store
            .find_by_id(&self.resource, filter, id)
            .await?
            .ok_or_else(|| self.not_found(id))?;

        object.set_id(id);
        if !object.ownership().is_global() {
            let owner = existing
                .get(OWNER_FIELD)
                .and_then(Value::as_str)
                .and_then(|s| Uuid::parse_str(s).ok())
                .or(self.scope.caller_id());
            if let Some(owner) = owner {
                object.set_owner_id(owner);
            }
        }

        let row = Self::to_row(object.as_ref())?;
        let stored = self
            .store
            .update(&self.resource, filter, id, row)
            .await?
            .ok_or_else(|| self.not_found(id))?;
        object.load(stored).map_err(|source| RepositoryError::CorruptRow {
            resource: self.resource.clone(),
            source,
        })?;
        Ok(object)
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), RepositoryError> {
        self.blank()?;
        let filter = self.scope.owner_filter();
        if self.store.find_by_id(&self.resource, filter, id).await?.is_none() {
            return Err(self.not_found(id));
        }
        if !self.store.delete(&self.resource, filter, id).await? {
            return Err(self.not_found(id));
        }
        tracing::debug!("Deleted {} {}", self.resource, id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::{PageBounds, PageParams, PermissionSet};
    use crate::catalog;
    use crate::database::MemoryStore;

    struct Fixture {
        store: Arc<MemoryStore>,
        registry: Arc<ResourceRegistry>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                store: Arc::new(MemoryStore::new()),
                registry: Arc::new(catalog::registry()),
            }
        }

        fn repo(&self, resource: &str, caller: Option<Uuid>, perms: &[&str]) -> ScopedRepository {
            self.repo_with(resource, caller, perms, PageParams::default())
        }

        fn repo_with(
            &self,
            resource: &str,
            caller: Option<Uuid>,
            perms: &[&str],
            params: PageParams,
        ) -> ScopedRepository {
            let permissions: PermissionSet = perms.iter().copied().collect();
            let scope = AccessScope::new(
                resource,
                &params,
                caller,
                self.registry.is_global(resource),
                &permissions,
                PageBounds::new(2, 5),
            );
            ScopedRepository::new(resource, scope, self.store.clone(), self.registry.clone())
        }
    }

    fn id_of(object: &dyn DomainObject) -> Uuid {
        object.id().unwrap()
    }

    #[tokio::test]
    async fn create_stamps_caller_as_owner() {
        let fx = Fixture::new();
        let alice = Uuid::new_v4();

        let order = fx
            .repo("order", Some(alice), &[])
            .create(br#"{"quantity": 2, "user_id": "00000000-0000-0000-0000-000000000001"}"#)
            .await
            .unwrap();

        assert_eq!(order.owner_id(), Some(alice));
        assert!(order.id().is_some());
    }

    #[tokio::test]
    async fn create_ignores_client_supplied_id() {
        let fx = Fixture::new();
        let chosen = Uuid::new_v4();
        let body = format!(r#"{{"id": "{}", "name": "lamp", "price": "3.50"}}"#, chosen);

        let product = fx.repo("product", None, &[]).create(body.as_bytes()).await.unwrap();
        assert_ne!(id_of(product.as_ref()), chosen);
    }

    #[tokio::test]
    async fn create_owned_without_identity_is_unauthorized() {
        let fx = Fixture::new();
        let err = fx
            .repo("order", None, &["order.global"])
            .create(br#"{"quantity": 1}"#)
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Unauthorized(_)));
        assert_eq!(fx.store.row_count("order").await, 0);
    }

    #[tokio::test]
    async fn create_reports_malformed_and_invalid_bodies() {
        let fx = Fixture::new();
        let repo = fx.repo("order", Some(Uuid::new_v4()), &[]);

        assert!(matches!(
            repo.create(b"{not json").await.unwrap_err(),
            RepositoryError::MalformedBody(_)
        ));
        assert!(matches!(
            repo.create(br#"{"quantity": 0}"#).await.unwrap_err(),
            RepositoryError::ValidationFailed(_)
        ));
    }

    #[tokio::test]
    async fn other_callers_cannot_see_owned_rows() {
        let fx = Fixture::new();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let order = fx
            .repo("order", Some(alice), &[])
            .create(br#"{"quantity": 1}"#)
            .await
            .unwrap();
        let id = id_of(order.as_ref());

        assert!(fx.repo("order", Some(alice), &[]).get(id).await.is_ok());
        assert!(matches!(
            fx.repo("order", Some(bob), &[]).get(id).await.unwrap_err(),
            RepositoryError::NotFound { .. }
        ));
        assert!(fx.repo("order", Some(bob), &["order.global"]).get(id).await.is_ok());
    }

    #[tokio::test]
    async fn no_identity_sees_nothing() {
        let fx = Fixture::new();
        let alice = Uuid::new_v4();
        let order = fx
            .repo("order", Some(alice), &[])
            .create(br#"{"quantity": 1}"#)
            .await
            .unwrap();

        let anonymous = fx.repo("order", None, &[]);
        let page = anonymous.list().await.unwrap();
        assert_eq!(page.count, 0);
        assert!(page.data.is_empty());
        assert!(matches!(
            anonymous.get(id_of(order.as_ref())).await.unwrap_err(),
            RepositoryError::NotFound { .. }
        ));
    }

    #[tokio::test]
    async fn list_pages_through_visible_rows() {
        let fx = Fixture::new();
        let alice = Uuid::new_v4();
        for _ in 0..3 {
            fx.repo("order", Some(alice), &[])
                .create(br#"{"quantity": 1}"#)
                .await
                .unwrap();
        }
        fx.repo("order", Some(Uuid::new_v4()), &[])
            .create(br#"{"quantity": 1}"#)
            .await
            .unwrap();

        let second = fx
            .repo_with("order", Some(alice), &[], PageParams::new("2", "2"))
            .list()
            .await
            .unwrap();
        assert_eq!(second.count, 3);
        assert_eq!((second.page, second.page_size), (2, 2));
        assert_eq!(second.data.len(), 1);

        let beyond = fx
            .repo_with("order", Some(alice), &[], PageParams::new("9", "2"))
            .list()
            .await
            .unwrap();
        assert_eq!(beyond.count, 3);
        assert!(beyond.data.is_empty());
    }

    #[tokio::test]
    async fn update_uses_path_id_and_replaces_fields() {
        let fx = Fixture::new();
        let alice = Uuid::new_v4();
        let repo = fx.repo("order", Some(alice), &[]);
        let order = repo
            .create(br#"{"quantity": 1, "notes": "leave at door"}"#)
            .await
            .unwrap();
        let id = id_of(order.as_ref());

        let body = format!(r#"{{"id": "{}", "quantity": 4}}"#, Uuid::new_v4());
        let updated = repo.update(id, body.as_bytes()).await.unwrap();

        assert_eq!(updated.id(), Some(id));
        let value = updated.to_value().unwrap();
        assert_eq!(value["quantity"], 4);
        assert_eq!(value["notes"], "");
    }

    #[tokio::test]
    async fn update_keeps_the_existing_owner() {
        let fx = Fixture::new();
        let alice = Uuid::new_v4();
        let admin = Uuid::new_v4();
        let order = fx
            .repo("order", Some(alice), &[])
            .create(br#"{"quantity": 1}"#)
            .await
            .unwrap();
        let id = id_of(order.as_ref());

        let body = format!(r#"{{"quantity": 2, "user_id": "{}"}}"#, admin);
        let updated = fx
            .repo("order", Some(admin), &["order.global"])
            .update(id, body.as_bytes())
            .await
            .unwrap();
        assert_eq!(updated.owner_id(), Some(alice));
    }

    #[tokio::test]
    async fn update_of_invisible_row_is_not_found() {
        let fx = Fixture::new();
        let order = fx
            .repo("order", Some(Uuid::new_v4()), &[])
            .create(br#"{"quantity": 1}"#)
            .await
            .unwrap();

        let err = fx
            .repo("order", Some(Uuid::new_v4()), &[])
            .update(id_of(order.as_ref()), br#"{"quantity": 2}"#)
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound { .. }));
    }

    #[tokio::test]
    async fn delete_removes_then_reports_not_found() {
        let fx = Fixture::new();
        let alice = Uuid::new_v4();
        let repo = fx.repo("order", Some(alice), &[]);
        let order = repo.create(br#"{"quantity": 1}"#).await.unwrap();
        let id = id_of(order.as_ref());

        assert!(matches!(
            fx.repo("order", Some(Uuid::new_v4()), &[]).delete(id).await.unwrap_err(),
            RepositoryError::NotFound { .. }
        ));
        repo.delete(id).await.unwrap();
        assert!(matches!(repo.get(id).await.unwrap_err(), RepositoryError::NotFound { .. }));
        assert!(matches!(repo.delete(id).await.unwrap_err(), RepositoryError::NotFound { .. }));
    }

    #[tokio::test]
    async fn unknown_resource_fails_every_operation() {
        let fx = Fixture::new();
        let repo = fx.repo("invoice", Some(Uuid::new_v4()), &[]);
        assert!(matches!(repo.list().await.unwrap_err(), RepositoryError::Registry(_)));
        assert!(matches!(repo.create(b"{}").await.unwrap_err(), RepositoryError::Registry(_)));
    }
}
