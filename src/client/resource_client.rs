//! Generic operations
//!
//! Get, List, Watch, Create, Update, Delete, Apply, DeleteMany and DeleteAll,
//! each parameterized by the kind's spec type.

use super::options::{DeleteManyReport, ListOptions, WatchOptions};
use super::stream::{guarded, StreamGuard};
use super::{decode_event, decode_resource, EventStream, ResourceClient, ResourceStream};
use crate::error::{Error, Result};
use crate::gate::actions;
use crate::resource::{LabelSelector, Resource, ResourceSpec, SpecPayload};
use crate::transport::{
    CallContext, DestroyRequest, GetRequest, ListRequest, ResourceTransportRef, UpdateRequest,
    Verb, WatchRequest, WireResource,
};
use futures::TryStreamExt;
use regex::Regex;
use std::future::Future;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

fn empty_id<S: ResourceSpec>() -> Error {
    Error::InvalidArgument(format!("{} id must not be empty", S::LABEL))
}

fn validate_filters(selector: &str, id_pattern: Option<&str>) -> Result<()> {
    LabelSelector::parse(selector)?;
    if let Some(pattern) = id_pattern.filter(|p| !p.is_empty()) {
        Regex::new(pattern).map_err(|e| {
            Error::InvalidArgument(format!("invalid id pattern {:?}: {}", pattern, e))
        })?;
    }
    Ok(())
}

impl ResourceClient {
    /// Run a call that also yields to the caller's cancellation token,
    /// returning the value with the call's deadline
    async fn invoke_until<T, F, Fut>(
        &self,
        verb: Verb,
        cancel: &CancellationToken,
        call: F,
    ) -> Result<(T, Instant)>
    where
        F: FnOnce(ResourceTransportRef, CallContext) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut deadline = None;
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::Cancelled { operation: verb.as_str() }),
            result = self.invoke(verb, |transport, ctx| {
                deadline = Some(ctx.deadline);
                call(transport, ctx)
            }) => result,
        };

        let value = result?;
        let deadline = deadline.ok_or_else(|| Error::Internal("call finished without a deadline".into()))?;
        Ok((value, deadline))
    }

    /// Encode a resource for a write: id required, type and namespace filled.
    /// Status rides along on updates only.
    fn prepare_write<S: ResourceSpec>(
        &self,
        verb: Verb,
        resource: &Resource<S>,
        resource_type: &str,
    ) -> Result<WireResource> {
        if resource.id().is_empty() {
            return Err(empty_id::<S>());
        }

        let mut wire = resource.to_wire()?;
        if verb != Verb::Update {
            wire.status = SpecPayload::Absent;
        }
        wire.metadata.resource_type = resource_type.to_string();
        wire.metadata.namespace = self.namespace(Some(&wire.metadata.namespace));
        Ok(wire)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Fetch one resource
    pub async fn get<S: ResourceSpec>(&self, id: &str, namespace: Option<&str>) -> Result<Resource<S>> {
        if id.is_empty() {
            return Err(empty_id::<S>());
        }

        let request = GetRequest {
            namespace: self.namespace(namespace),
            resource_type: self.wire_name::<S>()?.to_string(),
            id: id.to_string(),
        };
        debug!(kind = S::LABEL, id, namespace = %request.namespace, "Getting resource");

        let wire = self
            .invoke(Verb::Get, |transport, ctx| async move {
                transport.get(&ctx, request).await
            })
            .await?;
        Ok(self.decode(wire))
    }

    /// Stream every matching resource.
    ///
    /// The stream is finite and decoded item by item. The call deadline
    /// covers the whole stream; the cancellation token in `options` ends it
    /// early with [`Error::Cancelled`].
    pub async fn list<S: ResourceSpec>(&self, options: ListOptions) -> Result<ResourceStream<S>> {
        let resource_type = self.wire_name::<S>()?;
        validate_filters(&options.selector, options.id_pattern.as_deref())?;

        let ListOptions {
            namespace,
            selector,
            id_pattern,
            offset,
            limit,
            sort_by,
            sort_desc,
            search_terms,
            cancel,
        } = options;
        let request = ListRequest {
            namespace: self.namespace(namespace.as_deref()),
            resource_type: resource_type.to_string(),
            selector,
            id_pattern,
            offset,
            limit,
            sort_by,
            sort_desc,
            search_terms,
        };
        debug!(kind = S::LABEL, namespace = %request.namespace, selector = %request.selector, "Listing resources");

        let cancel = cancel.unwrap_or_default();
        let (inner, deadline) = self
            .invoke_until(Verb::List, &cancel, |transport, ctx| async move {
                transport.list(&ctx, request).await
            })
            .await?;

        let metrics = self.inner.metrics.clone();
        let guard = StreamGuard {
            operation: Verb::List.as_str(),
            cancel,
            deadline: Some(deadline),
            timeout: self.inner.config.timeout,
            metrics: metrics.clone(),
        };
        Ok(guarded(inner, guard, move |wire| decode_resource::<S>(wire, &metrics)))
    }

    /// Subscribe to change events.
    ///
    /// Up to `tail_events` historical events are replayed before any live
    /// one. The deadline only covers opening the subscription; afterwards
    /// the stream runs until cancelled or dropped.
    pub async fn watch<S: ResourceSpec>(&self, options: WatchOptions) -> Result<EventStream<S>> {
        let resource_type = self.wire_name::<S>()?;
        validate_filters(&options.selector, None)?;
        if options.id.as_deref() == Some("") {
            return Err(empty_id::<S>());
        }

        let WatchOptions {
            namespace,
            selector,
            id,
            tail_events,
            cancel,
        } = options;
        let request = WatchRequest {
            namespace: self.namespace(namespace.as_deref()),
            resource_type: resource_type.to_string(),
            selector,
            id,
            tail_events,
        };
        debug!(kind = S::LABEL, namespace = %request.namespace, tail_events, "Watching resources");

        let cancel = cancel.unwrap_or_default();
        let (inner, _) = self
            .invoke_until(Verb::Watch, &cancel, |transport, ctx| async move {
                transport.watch(&ctx, request).await
            })
            .await?;

        let metrics = self.inner.metrics.clone();
        let guard = StreamGuard {
            operation: Verb::Watch.as_str(),
            cancel,
            deadline: None,
            timeout: self.inner.config.timeout,
            metrics: metrics.clone(),
        };
        Ok(guarded(inner, guard, move |wire| decode_event::<S>(wire, &metrics)))
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Create a resource; fails with `AlreadyExists` on a duplicate id
    pub async fn create<S: ResourceSpec>(&self, resource: &Resource<S>) -> Result<Resource<S>> {
        let resource_type = self.wire_name::<S>()?;
        self.check_write(actions::CREATE.operation(), &resource_type)?;
        let wire = self.prepare_write(Verb::Create, resource, &resource_type)?;

        info!(kind = S::LABEL, id = %wire.metadata.id, namespace = %wire.metadata.namespace, "Creating resource");
        let stored = self
            .invoke(Verb::Create, |transport, ctx| async move {
                transport.create(&ctx, wire).await
            })
            .await?;
        Ok(self.decode(stored))
    }

    /// Replace a resource if the server still holds `current_version`,
    /// defaulting to the resource's own version
    pub async fn update<S: ResourceSpec>(
        &self,
        resource: &Resource<S>,
        current_version: Option<&str>,
    ) -> Result<Resource<S>> {
        let resource_type = self.wire_name::<S>()?;
        self.check_write(actions::UPDATE.operation(), &resource_type)?;
        let wire = self.prepare_write(Verb::Update, resource, &resource_type)?;
        let current_version = current_version.unwrap_or(resource.version()).to_string();

        info!(
            kind = S::LABEL,
            id = %wire.metadata.id,
            version = %current_version,
            "Updating resource"
        );
        let request = UpdateRequest {
            resource: wire,
            current_version,
        };
        let stored = self
            .invoke(Verb::Update, |transport, ctx| async move {
                transport.update(&ctx, request).await
            })
            .await?;
        Ok(self.decode(stored))
    }

    /// Delete one resource
    pub async fn delete<S: ResourceSpec>(&self, id: &str, namespace: Option<&str>) -> Result<()> {
        let resource_type = self.wire_name::<S>()?;
        self.check_write(actions::DELETE.operation(), &resource_type)?;
        if id.is_empty() {
            return Err(empty_id::<S>());
        }

        let request = DestroyRequest {
            namespace: self.namespace(namespace),
            resource_type: resource_type.to_string(),
            id: id.to_string(),
        };
        info!(kind = S::LABEL, id, namespace = %request.namespace, "Deleting resource");

        self.invoke(Verb::Destroy, |transport, ctx| async move {
            transport.destroy(&ctx, request).await
        })
        .await
    }

    /// Create or update.
    ///
    /// Reads the current state first: a missing resource is created, an
    /// existing one is updated against the version just read. A dry run
    /// stops after the read and returns `resource` unchanged.
    pub async fn apply<S: ResourceSpec>(&self, resource: &Resource<S>, dry_run: bool) -> Result<Resource<S>> {
        let resource_type = self.wire_name::<S>()?;
        self.check_write(actions::APPLY.operation(), &resource_type)?;

        match self.get::<S>(resource.id(), Some(resource.namespace())).await {
            Ok(existing) => {
                if dry_run {
                    debug!(kind = S::LABEL, id = %resource.id(), "Dry run: would update");
                    return Ok(resource.clone());
                }

                let mut desired = resource.clone();
                if desired.status.is_none() {
                    desired.status = existing.status.clone();
                }
                self.update(&desired, Some(existing.version())).await
            }
            Err(e) if e.is_not_found() => {
                if dry_run {
                    debug!(kind = S::LABEL, id = %resource.id(), "Dry run: would create");
                    return Ok(resource.clone());
                }
                self.create(resource).await
            }
            Err(e) => Err(e),
        }
    }

    // =========================================================================
    // Bulk Deletes
    // =========================================================================

    /// Delete every resource matching `selector`, one at a time.
    ///
    /// Matches are collected before the first delete. Per-item failures are
    /// logged and recorded; they do not stop the sweep.
    pub async fn delete_many_detailed<S: ResourceSpec>(
        &self,
        selector: &str,
        namespace: Option<&str>,
    ) -> Result<DeleteManyReport> {
        let resource_type = self.wire_name::<S>()?;
        self.check_write(actions::DELETE_MANY.operation(), &resource_type)?;

        let mut options = ListOptions::new().selector(selector);
        options.namespace = namespace.map(str::to_string);
        let matches: Vec<Resource<S>> = self.list::<S>(options).await?.try_collect().await?;

        let mut report = DeleteManyReport::default();
        for resource in matches {
            let outcome = self.delete::<S>(resource.id(), Some(resource.namespace())).await;
            match outcome {
                Ok(()) => report.deleted.push(resource.metadata.id),
                Err(e) => {
                    warn!(kind = S::LABEL, id = %resource.id(), error = %e, "Failed to delete resource, continuing");
                    self.inner.metrics.record_bulk_delete_failure();
                    report.failed.insert(resource.metadata.id, e);
                }
            }
        }

        info!(
            kind = S::LABEL,
            deleted = report.deleted.len(),
            failed = report.failed.len(),
            "Bulk delete finished"
        );
        Ok(report)
    }

    /// Delete every resource matching `selector`, returning how many went
    pub async fn delete_many<S: ResourceSpec>(&self, selector: &str, namespace: Option<&str>) -> Result<usize> {
        self.delete_many_detailed::<S>(selector, namespace)
            .await
            .map(|report| report.deleted_count())
    }

    /// Delete every resource of kind `S` in the namespace
    pub async fn delete_all<S: ResourceSpec>(&self, namespace: Option<&str>) -> Result<usize> {
        self.delete_many::<S>("", namespace).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{RequestMetadata, RequestSigner, CLIENT_HEADER};
    use crate::config::ClientConfig;
    use crate::error::Status;
    use crate::gate::ClientMode;
    use crate::kinds::{MachineSpec, MachineStatus};
    use crate::registry::TypeRegistry;
    use crate::resource::{EventKind, SpecPayload};
    use crate::transport::{MemoryTransport, SortField, WireMetadata};
    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use futures::StreamExt;
    use parking_lot::Mutex;
    use serde::{Deserialize, Serialize};
    use std::sync::Arc;
    use std::time::Duration;

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    struct WidgetSpec {
        #[serde(default)]
        color: String,
        #[serde(default)]
        size: u32,
    }

    impl ResourceSpec for WidgetSpec {
        type Status = ();
        const LABEL: &'static str = "Widget";
        const WIRE_TYPE: &'static str = "Widgets.example.dev";
    }

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    struct GizmoSpec {
        teeth: u8,
    }

    impl ResourceSpec for GizmoSpec {
        type Status = ();
        const LABEL: &'static str = "Gizmo";
        const WIRE_TYPE: &'static str = "Gizmos.example.dev";
    }

    #[derive(Default)]
    struct RecordingSigner {
        methods: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl RequestSigner for RecordingSigner {
        async fn sign(&self, method: &str, mut metadata: RequestMetadata) -> Result<RequestMetadata> {
            self.methods.lock().push(method.to_string());
            metadata.insert("x-signature".into(), format!("signed:{}", method));
            Ok(metadata)
        }
    }

    struct Harness {
        client: ResourceClient,
        transport: Arc<MemoryTransport>,
        signer: Arc<RecordingSigner>,
    }

    fn harness_with(mode: ClientMode, timeout: Duration) -> Harness {
        let transport = MemoryTransport::shared();
        let signer = Arc::new(RecordingSigner::default());
        let registry = TypeRegistry::with_builtin_kinds();
        registry.register::<WidgetSpec>("Widgets.example.dev").unwrap();

        let config = ClientConfig::new("memory://test")
            .with_mode(mode)
            .with_timeout(timeout);
        let client = ResourceClient::new(config, transport.clone(), signer.clone(), registry);
        Harness {
            client,
            transport,
            signer,
        }
    }

    fn harness(mode: ClientMode) -> Harness {
        harness_with(mode, Duration::from_secs(5))
    }

    fn widget(id: &str, color: &str) -> Resource<WidgetSpec> {
        Resource::new(
            id,
            WidgetSpec {
                color: color.into(),
                size: 1,
            },
        )
    }

    async fn seed(client: &ResourceClient, items: &[(&str, &str)]) {
        for (id, color) in items {
            let resource = widget(id, "blue").with_label("color", *color);
            client.create(&resource).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_widget_lifecycle() {
        let h = harness(ClientMode::ReadWrite);
        assert_eq!(&*h.client.wire_name::<WidgetSpec>().unwrap(), "Widgets.example.dev");

        let created = h.client.create(&widget("w1", "red")).await.unwrap();
        assert_eq!(created.version(), "1");
        assert_eq!(created.namespace(), "default");
        assert_eq!(created.metadata.resource_type, "Widgets.example.dev");

        let fetched = h.client.get::<WidgetSpec>("w1", None).await.unwrap();
        assert_eq!(fetched.metadata.id, "w1");
        assert_eq!(fetched.spec.color, "red");

        let err = h.client.update(&fetched, Some("42")).await.unwrap_err();
        assert!(err.is_conflict());

        h.client.delete::<WidgetSpec>("w1", None).await.unwrap();
        let err = h.client.get::<WidgetSpec>("w1", None).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_update_defaults_to_own_version() {
        let h = harness(ClientMode::ReadWrite);
        h.client.create(&widget("w1", "red")).await.unwrap();

        let mut current = h.client.get::<WidgetSpec>("w1", None).await.unwrap();
        current.spec.size = 9;
        let updated = h.client.update(&current, None).await.unwrap();
        assert_eq!(updated.version(), "2");
        assert_eq!(updated.spec.size, 9);

        // the version we hold is now stale
        let err = h.client.update(&current, None).await.unwrap_err();
        assert_matches!(err, Error::Remote(Status { code: crate::error::Code::Aborted, .. }));
    }

    #[tokio::test]
    async fn test_duplicate_create() {
        let h = harness(ClientMode::ReadWrite);
        h.client.create(&widget("w1", "red")).await.unwrap();
        let err = h.client.create(&widget("w1", "red")).await.unwrap_err();
        assert!(err.is_already_exists());
    }

    #[tokio::test]
    async fn test_empty_id_is_rejected_locally() {
        let h = harness(ClientMode::ReadWrite);

        assert_matches!(
            h.client.get::<WidgetSpec>("", None).await,
            Err(Error::InvalidArgument(_))
        );
        assert_matches!(
            h.client.delete::<WidgetSpec>("", None).await,
            Err(Error::InvalidArgument(_))
        );
        assert_matches!(
            h.client.create(&widget("", "red")).await,
            Err(Error::InvalidArgument(_))
        );
        assert_eq!(h.transport.calls().total(), 0);
        assert!(h.signer.methods.lock().is_empty());
    }

    #[tokio::test]
    async fn test_unregistered_kind() {
        let h = harness(ClientMode::ReadWrite);
        let err = h.client.get::<GizmoSpec>("g1", None).await.unwrap_err();
        assert_matches!(err, Error::NotRegistered { kind: "Gizmo" });
        assert_eq!(h.transport.calls().total(), 0);
    }

    #[tokio::test]
    async fn test_signs_once_per_call() {
        let h = harness(ClientMode::ReadWrite);
        h.client.create(&widget("w1", "red")).await.unwrap();
        h.client.get::<WidgetSpec>("w1", None).await.unwrap();

        let methods = h.signer.methods.lock().clone();
        assert_eq!(
            methods,
            vec![Verb::Create.method().to_string(), Verb::Get.method().to_string()]
        );
    }

    #[tokio::test]
    async fn test_call_context_carries_signed_headers() {
        let h = harness(ClientMode::ReadWrite);
        let before = Instant::now();
        let ctx = h.client.call_context(Verb::List).await.unwrap();

        assert_eq!(ctx.method, Verb::List.method());
        assert!(ctx.headers.contains_key(CLIENT_HEADER));
        assert_eq!(ctx.headers.get("x-signature").map(String::as_str), Some("signed:/fleet.resources.v1.ResourceService/List"));
        assert!(ctx.deadline >= before + Duration::from_secs(5));
    }

    // =========================================================================
    // Apply
    // =========================================================================

    #[tokio::test]
    async fn test_apply_dry_run_never_writes() {
        let h = harness(ClientMode::ReadWrite);

        let missing = widget("w1", "red");
        let result = h.client.apply(&missing, true).await.unwrap();
        assert_eq!(result, missing);

        h.client.create(&widget("w2", "red")).await.unwrap();
        let changed = widget("w2", "green");
        let result = h.client.apply(&changed, true).await.unwrap();
        assert_eq!(result, changed);

        let calls = h.transport.calls();
        assert_eq!(calls.create, 1);
        assert_eq!(calls.update, 0);
        assert_eq!(calls.get, 2);
    }

    #[tokio::test]
    async fn test_apply_creates_when_missing() {
        let h = harness(ClientMode::ReadWrite);
        let applied = h.client.apply(&widget("w1", "red"), false).await.unwrap();
        assert_eq!(applied.version(), "1");

        let calls = h.transport.calls();
        assert_eq!((calls.get, calls.create, calls.update), (1, 1, 0));
    }

    #[tokio::test]
    async fn test_apply_updates_when_present() {
        let h = harness(ClientMode::ReadWrite);
        h.client.create(&widget("w1", "red")).await.unwrap();

        // no version held locally; apply uses the one it reads
        let applied = h.client.apply(&widget("w1", "green"), false).await.unwrap();
        assert_eq!(applied.version(), "2");
        assert_eq!(applied.spec.color, "green");

        let calls = h.transport.calls();
        assert_eq!((calls.get, calls.create, calls.update), (1, 1, 1));
    }

    #[tokio::test]
    async fn test_apply_surfaces_other_errors() {
        let h = harness(ClientMode::ReadWrite);
        h.transport
            .inject_fault(Verb::Get, "w1", Status::unavailable("maintenance"));

        let err = h.client.apply(&widget("w1", "red"), false).await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(h.transport.calls().mutations(), 0);
    }

    #[tokio::test]
    async fn test_apply_keeps_server_status() {
        let h = harness(ClientMode::ReadWrite);
        let machine = Resource::new(
            "m1",
            MachineSpec {
                management_address: "10.0.0.1".into(),
                connected: true,
            },
        );
        let mut stored = h.client.create(&machine).await.unwrap();
        stored.status = Some(MachineStatus {
            locked: true,
            ..Default::default()
        });
        h.client.update(&stored, None).await.unwrap();

        let applied = h.client.apply(&machine, false).await.unwrap();
        assert!(applied.status.unwrap().locked);
    }

    #[tokio::test]
    async fn test_create_never_writes_status() {
        let h = harness(ClientMode::ReadWrite);
        let mut machine = Resource::new("m1", MachineSpec::default());
        machine.status = Some(MachineStatus {
            locked: true,
            ..Default::default()
        });

        let created = h.client.create(&machine).await.unwrap();
        assert_eq!(created.status, None);
        let fetched = h.client.get::<MachineSpec>("m1", None).await.unwrap();
        assert_eq!(fetched.status, None);
    }

    // =========================================================================
    // Bulk Deletes
    // =========================================================================

    #[tokio::test]
    async fn test_delete_many_without_matches() {
        let h = harness(ClientMode::ReadWrite);
        seed(&h.client, &[("w1", "red")]).await;

        let deleted = h.client.delete_many::<WidgetSpec>("color=green", None).await.unwrap();
        assert_eq!(deleted, 0);
        assert_eq!(h.transport.calls().destroy, 0);
    }

    #[tokio::test]
    async fn test_delete_many_skips_failures() {
        let h = harness(ClientMode::ReadWrite);
        seed(&h.client, &[("w1", "red"), ("w2", "red"), ("w3", "red"), ("w4", "blue")]).await;
        h.transport
            .inject_fault(Verb::Destroy, "w2", Status::unavailable("busy"));

        let report = h
            .client
            .delete_many_detailed::<WidgetSpec>("color=red", None)
            .await
            .unwrap();
        assert_eq!(report.deleted, vec!["w1".to_string(), "w3".to_string()]);
        assert_eq!(report.failed.len(), 1);
        assert!(report.failed["w2"].is_transient());
        assert_eq!(h.transport.calls().destroy, 3);
        assert_eq!(h.client.metrics().snapshot().bulk_delete_failures, 1);

        h.transport.clear_faults();
        assert_eq!(h.client.delete_many::<WidgetSpec>("color=red", None).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_delete_all_is_scoped_to_namespace() {
        let h = harness(ClientMode::ReadWrite);
        seed(&h.client, &[("w1", "red"), ("w2", "blue")]).await;
        h.client
            .create(&widget("w3", "red").in_namespace("edge"))
            .await
            .unwrap();

        assert_eq!(h.client.delete_all::<WidgetSpec>(None).await.unwrap(), 2);
        assert_eq!(h.transport.len(), 1);
        assert!(h.client.get::<WidgetSpec>("w3", Some("edge")).await.is_ok());
    }

    // =========================================================================
    // Write Gate
    // =========================================================================

    #[tokio::test]
    async fn test_read_only_rejects_every_write_before_io() {
        let h = harness(ClientMode::ReadOnly);
        let resource = widget("w1", "red");

        let errors = vec![
            h.client.create(&resource).await.unwrap_err(),
            h.client.update(&resource, Some("1")).await.unwrap_err(),
            h.client.delete::<WidgetSpec>("w1", None).await.unwrap_err(),
            h.client.apply(&resource, false).await.unwrap_err(),
            h.client.apply(&resource, true).await.unwrap_err(),
            h.client.delete_many::<WidgetSpec>("", None).await.unwrap_err(),
            h.client.delete_all::<WidgetSpec>(None).await.unwrap_err(),
        ];

        for err in &errors {
            assert_matches!(err, Error::ReadOnlyMode { resource_type, .. } if resource_type == "Widgets.example.dev");
        }
        assert_eq!(h.transport.calls().total(), 0);
        assert!(h.signer.methods.lock().is_empty());
        assert_eq!(h.client.metrics().snapshot().rejected_writes, errors.len() as u64);
    }

    #[tokio::test]
    async fn test_read_only_still_reads() {
        let h = harness(ClientMode::ReadOnly);
        h.transport.insert_raw(WireResource {
            metadata: WireMetadata {
                namespace: "default".into(),
                resource_type: "Widgets.example.dev".into(),
                id: "w1".into(),
                version: "3".into(),
                ..Default::default()
            },
            spec: SpecPayload::encode(&WidgetSpec::default()).unwrap(),
            status: SpecPayload::Absent,
        });

        assert_eq!(h.client.get::<WidgetSpec>("w1", None).await.unwrap().version(), "3");
        let listed: Vec<_> = h
            .client
            .list::<WidgetSpec>(ListOptions::new())
            .await
            .unwrap()
            .collect()
            .await;
        assert_eq!(listed.len(), 1);
    }

    // =========================================================================
    // List
    // =========================================================================

    #[tokio::test]
    async fn test_list_filters_and_pages() {
        let h = harness(ClientMode::ReadWrite);
        seed(
            &h.client,
            &[("w1", "red"), ("w2", "blue"), ("w3", "red"), ("w4", "red")],
        )
        .await;

        let options = ListOptions::new()
            .selector("color=red")
            .sort_by(SortField::Id, true)
            .limit(2);
        let ids: Vec<String> = h
            .client
            .list::<WidgetSpec>(options)
            .await
            .unwrap()
            .map_ok(|r| r.metadata.id)
            .try_collect()
            .await
            .unwrap();
        assert_eq!(ids, vec!["w4".to_string(), "w3".to_string()]);

        let ids: Vec<String> = h
            .client
            .list::<WidgetSpec>(ListOptions::new().id_pattern("^w[12]$"))
            .await
            .unwrap()
            .map_ok(|r| r.metadata.id)
            .try_collect()
            .await
            .unwrap();
        assert_eq!(ids.len(), 2);
    }

    #[tokio::test]
    async fn test_list_passes_set_selectors_to_server() {
        let h = harness(ClientMode::ReadWrite);
        seed(&h.client, &[("w1", "red"), ("w2", "blue"), ("w3", "green")]).await;
        let before = h.transport.calls().list;

        let mut ids: Vec<String> = h
            .client
            .list::<WidgetSpec>(ListOptions::new().selector("color in (red,green)"))
            .await
            .unwrap()
            .map_ok(|r| r.metadata.id)
            .try_collect()
            .await
            .unwrap();
        ids.sort();
        assert_eq!(ids, vec!["w1".to_string(), "w3".to_string()]);
        assert_eq!(h.transport.calls().list, before + 1);

        let removed = h
            .client
            .delete_many::<WidgetSpec>("color notin (red,green)", None)
            .await
            .unwrap();
        assert_eq!(removed, 1);
    }

    #[tokio::test]
    async fn test_list_rejects_bad_filters_locally() {
        let h = harness(ClientMode::ReadWrite);

        let err = h
            .client
            .list::<WidgetSpec>(ListOptions::new().selector("=red"))
            .await
            .err()
            .unwrap();
        assert_matches!(err, Error::InvalidArgument(_));

        let err = h
            .client
            .list::<WidgetSpec>(ListOptions::new().id_pattern("w[1"))
            .await
            .err()
            .unwrap();
        assert_matches!(err, Error::InvalidArgument(_));
        assert_eq!(h.transport.calls().total(), 0);
    }

    #[tokio::test]
    async fn test_list_decodes_binary_and_broken_specs() {
        let h = harness(ClientMode::ReadWrite);
        let spec = WidgetSpec {
            color: "teal".into(),
            size: 4,
        };
        for (id, payload) in [
            ("w1", SpecPayload::encode_binary(&spec).unwrap()),
            ("w2", SpecPayload::Text("size: [".into())),
            ("w3", SpecPayload::Absent),
        ] {
            h.transport.insert_raw(WireResource {
                metadata: WireMetadata {
                    namespace: "default".into(),
                    resource_type: "Widgets.example.dev".into(),
                    id: id.into(),
                    ..Default::default()
                },
                spec: payload,
                status: SpecPayload::Absent,
            });
        }

        let items: Vec<Resource<WidgetSpec>> = h
            .client
            .list::<WidgetSpec>(ListOptions::new().sort_by(SortField::Id, false))
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].spec, spec);
        assert_eq!(items[1].id(), "w2");
        assert_eq!(items[1].spec, WidgetSpec::default());
        assert_eq!(items[2].spec, WidgetSpec::default());
        assert_eq!(h.client.metrics().snapshot().decode_fallbacks, 1);
    }

    #[tokio::test]
    async fn test_list_with_cancelled_token() {
        let h = harness(ClientMode::ReadWrite);
        seed(&h.client, &[("w1", "red")]).await;

        let token = CancellationToken::new();
        token.cancel();
        let err = h
            .client
            .list::<WidgetSpec>(ListOptions::new().cancel_on(token))
            .await
            .err()
            .unwrap();
        assert_matches!(err, Error::Cancelled { operation: "List" });
    }

    // =========================================================================
    // Deadlines
    // =========================================================================

    #[tokio::test]
    async fn test_unrepresentable_deadline_is_a_config_error() {
        let h = harness_with(ClientMode::ReadWrite, Duration::MAX);

        let err = h.client.get::<WidgetSpec>("w1", None).await.unwrap_err();
        assert_matches!(err, Error::Configuration(_));
        assert_eq!(h.transport.calls().total(), 0);
    }

    #[tokio::test]
    async fn test_unary_deadline() {
        let h = harness_with(ClientMode::ReadWrite, Duration::from_millis(20));
        h.transport.set_latency(Some(Duration::from_millis(500)));

        let err = h.client.get::<WidgetSpec>("w1", None).await.unwrap_err();
        assert_matches!(err, Error::DeadlineExceeded { operation: "Get", .. });
        assert!(err.is_transient());

        let snapshot = h.client.metrics().snapshot();
        assert_eq!(snapshot.verb(Verb::Get).deadline_exceeded, 1);
    }

    #[tokio::test]
    async fn test_watch_outlives_call_timeout() {
        let h = harness_with(ClientMode::ReadWrite, Duration::from_millis(50));
        let mut events = h
            .client
            .watch::<WidgetSpec>(WatchOptions::new())
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(120)).await;
        h.client.create(&widget("w1", "red")).await.unwrap();

        let event = events.next().await.unwrap().unwrap();
        assert_eq!(event.kind, EventKind::Created);
        assert_eq!(event.id(), "w1");
    }

    // =========================================================================
    // Watch
    // =========================================================================

    #[tokio::test]
    async fn test_watch_replays_tail_before_live_events() {
        let h = harness(ClientMode::ReadWrite);
        seed(&h.client, &[("w1", "red"), ("w2", "red"), ("w3", "red")]).await;

        let mut events = h
            .client
            .watch::<WidgetSpec>(WatchOptions::new().tail_events(2))
            .await
            .unwrap();
        h.client.create(&widget("w4", "red")).await.unwrap();

        let mut ids = Vec::new();
        for _ in 0..3 {
            ids.push(events.next().await.unwrap().unwrap().id().to_string());
        }
        assert_eq!(ids, vec!["w2", "w3", "w4"]);
    }

    #[tokio::test]
    async fn test_watch_update_carries_previous() {
        let h = harness(ClientMode::ReadWrite);
        let created = h.client.create(&widget("w1", "red")).await.unwrap();

        let mut events = h
            .client
            .watch::<WidgetSpec>(WatchOptions::new().id("w1"))
            .await
            .unwrap();

        let mut changed = created.clone();
        changed.spec.color = "green".into();
        h.client.update(&changed, None).await.unwrap();
        h.client.delete::<WidgetSpec>("w1", None).await.unwrap();

        let updated = events.next().await.unwrap().unwrap();
        assert_eq!(updated.kind, EventKind::Updated);
        assert_eq!(updated.resource.spec.color, "green");
        assert_eq!(updated.previous.unwrap().spec.color, "red");

        let destroyed = events.next().await.unwrap().unwrap();
        assert_eq!(destroyed.kind, EventKind::Destroyed);
        assert!(destroyed.previous.is_none());
    }

    #[tokio::test]
    async fn test_watch_cancel_and_drop_release_subscription() {
        let h = harness(ClientMode::ReadWrite);
        let token = CancellationToken::new();

        let mut events = h
            .client
            .watch::<WidgetSpec>(WatchOptions::new().cancel_on(token.clone()))
            .await
            .unwrap();
        assert_eq!(h.transport.subscriber_count(), 1);

        token.cancel();
        assert_matches!(events.next().await, Some(Err(Error::Cancelled { operation: "Watch" })));
        assert!(events.next().await.is_none());

        let events = h
            .client
            .watch::<WidgetSpec>(WatchOptions::new())
            .await
            .unwrap();
        drop(events);
        assert_eq!(h.transport.subscriber_count(), 0);
    }
}
