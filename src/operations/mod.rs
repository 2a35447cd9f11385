//! Per-kind operation facades
//!
//! [`KindClient`] fixes the kind parameter of the generic client. Mutating
//! methods carry a [`WriteAction`] descriptor and run the declarative guard
//! before delegating; kind-specific conveniences live next to their kind.

pub mod machine;

use crate::client::{DeleteManyReport, EventStream, ListOptions, ResourceClient, ResourceStream, WatchOptions};
use crate::error::Result;
use crate::gate::{actions, WriteAction};
use crate::resource::{Resource, ResourceSpec};
use futures::TryStreamExt;
use std::marker::PhantomData;
use std::path::Path;

/// Typed facade over [`ResourceClient`] for kind `S`
pub struct KindClient<S: ResourceSpec> {
    client: ResourceClient,
    _kind: PhantomData<fn() -> S>,
}

impl<S: ResourceSpec> Clone for KindClient<S> {
    fn clone(&self) -> Self {
        Self::new(self.client.clone())
    }
}

impl<S: ResourceSpec> std::fmt::Debug for KindClient<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KindClient").field("kind", &S::LABEL).finish()
    }
}

impl<S: ResourceSpec> KindClient<S> {
    pub fn new(client: ResourceClient) -> Self {
        Self {
            client,
            _kind: PhantomData,
        }
    }

    pub fn client(&self) -> &ResourceClient {
        &self.client
    }

    /// Declarative guard: the action descriptor names the operation
    pub(crate) fn guard(&self, action: &WriteAction) -> Result<()> {
        let resource_type = self.client.wire_name::<S>()?;
        self.client
            .gate()
            .enforce(action, &resource_type)
            .map_err(|e| {
                self.client.metrics().record_rejected_write();
                e
            })
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub async fn get(&self, id: &str, namespace: Option<&str>) -> Result<Resource<S>> {
        self.client.get::<S>(id, namespace).await
    }

    pub async fn list(&self, options: ListOptions) -> Result<ResourceStream<S>> {
        self.client.list::<S>(options).await
    }

    /// Collect a full listing
    pub async fn list_all(&self, options: ListOptions) -> Result<Vec<Resource<S>>> {
        self.client.list::<S>(options).await?.try_collect().await
    }

    pub async fn watch(&self, options: WatchOptions) -> Result<EventStream<S>> {
        self.client.watch::<S>(options).await
    }

    // =========================================================================
    // Writes
    // =========================================================================

    pub async fn create(&self, resource: &Resource<S>) -> Result<Resource<S>> {
        self.guard(&actions::CREATE)?;
        self.client.create(resource).await
    }

    pub async fn update(&self, resource: &Resource<S>, current_version: Option<&str>) -> Result<Resource<S>> {
        self.guard(&actions::UPDATE)?;
        self.client.update(resource, current_version).await
    }

    pub async fn delete(&self, id: &str, namespace: Option<&str>) -> Result<()> {
        self.guard(&actions::DELETE)?;
        self.client.delete::<S>(id, namespace).await
    }

    pub async fn apply(&self, resource: &Resource<S>, dry_run: bool) -> Result<Resource<S>> {
        self.guard(&actions::APPLY)?;
        self.client.apply(resource, dry_run).await
    }

    pub async fn apply_yaml(&self, text: &str, dry_run: bool) -> Result<Resource<S>> {
        self.guard(&actions::APPLY)?;
        self.client.apply_yaml::<S>(text, dry_run).await
    }

    pub async fn apply_file(&self, path: impl AsRef<Path>, dry_run: bool) -> Result<Resource<S>> {
        self.guard(&actions::APPLY)?;
        self.client.apply_file::<S>(path, dry_run).await
    }

    pub async fn delete_many(&self, selector: &str, namespace: Option<&str>) -> Result<DeleteManyReport> {
        self.guard(&actions::DELETE_MANY)?;
        self.client.delete_many_detailed::<S>(selector, namespace).await
    }

    pub async fn delete_all(&self, namespace: Option<&str>) -> Result<usize> {
        self.guard(&actions::DELETE_MANY)?;
        self.client.delete_all::<S>(namespace).await
    }
}
