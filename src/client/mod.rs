//! Generic Resource Client
//!
//! One code path serves every registered kind. Each call resolves the kind's
//! wire name, runs the write gate for mutations, signs the request once,
//! derives its deadline and then hands a wire request to the transport.
//!
//! ```text
//! caller ──► ResourceClient<S> ──► TypeRegistry (wire name)
//!                 │
//!                 ├─► WriteGate (mutations only, before any I/O)
//!                 ├─► RequestSigner (once per call)
//!                 ├─► deadline = now + timeout
//!                 └─► ResourceTransport ──► decode with fallback
//! ```

pub mod documents;
pub mod options;
pub mod resource_client;
mod stream;

pub use options::{DeleteManyReport, ListOptions, WatchOptions};

use crate::auth::{NoopSigner, RequestMetadata, RequestSignerRef, CLIENT_HEADER};
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::gate::{ClientMode, WriteGate};
use crate::kinds::{ClusterSpec, ConfigPatchSpec, MachineSetSpec, MachineSpec};
use crate::metrics::ClientMetrics;
use crate::operations::KindClient;
use crate::registry::TypeRegistry;
use crate::resource::{Decoded, EventKind, Resource, ResourceEvent, ResourceSpec};
use crate::transport::{
    CallContext, ResourceTransportRef, TransportConnector, Verb, WireEvent, WireResource,
};
use futures::stream::BoxStream;
use std::future::Future;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Lazily decoded list results
pub type ResourceStream<S> = BoxStream<'static, Result<Resource<S>>>;

/// Lazily decoded watch events
pub type EventStream<S> = BoxStream<'static, Result<ResourceEvent<S>>>;

// =============================================================================
// Resource Client
// =============================================================================

struct ClientInner {
    transport: ResourceTransportRef,
    signer: RequestSignerRef,
    registry: Arc<TypeRegistry>,
    gate: WriteGate,
    config: ClientConfig,
    metrics: Arc<ClientMetrics>,
}

/// Client for the resource-state service. Cheap to clone; clones share the
/// transport, registry and metrics.
#[derive(Clone)]
pub struct ResourceClient {
    inner: Arc<ClientInner>,
}

impl std::fmt::Debug for ResourceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceClient")
            .field("endpoint", &self.inner.config.endpoint)
            .field("mode", &self.inner.gate.mode())
            .field("kinds", &self.inner.registry.len())
            .finish()
    }
}

impl ResourceClient {
    /// Create a client over an established transport
    pub fn new(
        config: ClientConfig,
        transport: ResourceTransportRef,
        signer: RequestSignerRef,
        registry: Arc<TypeRegistry>,
    ) -> Self {
        let gate = WriteGate::new(config.mode);
        Self {
            inner: Arc::new(ClientInner {
                transport,
                signer,
                registry,
                gate,
                config,
                metrics: Arc::new(ClientMetrics::new()),
            }),
        }
    }

    /// Validate `config`, connect through `connector` and build a client
    /// that knows every built-in kind and signs nothing
    pub async fn connect(config: ClientConfig, connector: &dyn TransportConnector) -> Result<Self> {
        Self::connect_with(
            config,
            connector,
            Arc::new(NoopSigner),
            TypeRegistry::with_builtin_kinds(),
        )
        .await
    }

    pub async fn connect_with(
        config: ClientConfig,
        connector: &dyn TransportConnector,
        signer: RequestSignerRef,
        registry: Arc<TypeRegistry>,
    ) -> Result<Self> {
        config.validate()?;
        let transport = connector.connect(&config.endpoint, &config.tls).await?;
        info!(
            endpoint = %config.endpoint,
            mode = %config.mode,
            kinds = registry.len(),
            "Connected resource client"
        );
        Ok(Self::new(config, transport, signer, registry))
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn mode(&self) -> ClientMode {
        self.inner.gate.mode()
    }

    pub fn gate(&self) -> &WriteGate {
        &self.inner.gate
    }

    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.inner.registry
    }

    pub fn metrics(&self) -> &ClientMetrics {
        &self.inner.metrics
    }

    /// Wire type name of `S`
    pub fn wire_name<S: ResourceSpec>(&self) -> Result<Arc<str>> {
        self.inner.registry.wire_name::<S>()
    }

    // =========================================================================
    // Kind Facades
    // =========================================================================

    /// Facade bound to kind `S`
    pub fn kind<S: ResourceSpec>(&self) -> KindClient<S> {
        KindClient::new(self.clone())
    }

    pub fn clusters(&self) -> KindClient<ClusterSpec> {
        self.kind()
    }

    pub fn machines(&self) -> KindClient<MachineSpec> {
        self.kind()
    }

    pub fn machine_sets(&self) -> KindClient<MachineSetSpec> {
        self.kind()
    }

    pub fn config_patches(&self) -> KindClient<ConfigPatchSpec> {
        self.kind()
    }

    // =========================================================================
    // Call Plumbing
    // =========================================================================

    /// Resolve an optional namespace against the configured default
    fn namespace(&self, namespace: Option<&str>) -> String {
        match namespace {
            Some(ns) if !ns.is_empty() => ns.to_string(),
            _ => self.inner.config.default_namespace.clone(),
        }
    }

    /// Explicit write guard, counted when it rejects
    fn check_write(&self, operation: &str, resource_type: &str) -> Result<()> {
        self.inner.gate.check(operation, resource_type).map_err(|e| {
            self.inner.metrics.record_rejected_write();
            e
        })
    }

    /// Sign once, then start the deadline clock
    async fn call_context(&self, verb: Verb) -> Result<CallContext> {
        let mut metadata = RequestMetadata::new();
        metadata.insert(
            CLIENT_HEADER.to_string(),
            format!("{}/{}", crate::NAME, crate::VERSION),
        );

        let headers = self.inner.signer.sign(verb.method(), metadata).await?;
        let deadline = Instant::now()
            .checked_add(self.inner.config.timeout)
            .ok_or_else(|| {
                Error::Configuration(format!(
                    "timeout {:?} overflows the clock",
                    self.inner.config.timeout
                ))
            })?;
        Ok(CallContext {
            method: verb.method(),
            headers,
            deadline,
        })
    }

    fn deadline_exceeded(&self, verb: Verb) -> Error {
        Error::DeadlineExceeded {
            operation: verb.as_str(),
            timeout: self.inner.config.timeout,
        }
    }

    /// Run one transport call under its deadline, recording metrics
    async fn invoke<T, F, Fut>(&self, verb: Verb, call: F) -> Result<T>
    where
        F: FnOnce(ResourceTransportRef, CallContext) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let ctx = self.call_context(verb).await?;
        let deadline = ctx.deadline;
        let metrics = self.inner.metrics.verb(verb);
        metrics.record_request();
        debug!(method = ctx.method, "Invoking transport");

        let result = match tokio::time::timeout_at(deadline, call(self.inner.transport.clone(), ctx)).await {
            Ok(result) => result,
            Err(_) => Err(self.deadline_exceeded(verb)),
        };

        if let Err(e) = &result {
            metrics.record_failure(e);
            debug!(method = verb.method(), error = %e, "Transport call failed");
        }
        result
    }

    // =========================================================================
    // Decoding
    // =========================================================================

    fn decode<S: ResourceSpec>(&self, wire: WireResource) -> Resource<S> {
        decode_resource(wire, &self.inner.metrics)
    }
}

/// Decode a wire resource, falling back to the default spec when the payload
/// is absent or unreadable. Metadata always survives.
pub(crate) fn decode_resource<S: ResourceSpec>(
    wire: WireResource,
    metrics: &ClientMetrics,
) -> Resource<S> {
    let spec = match wire.spec.decode::<S>() {
        Decoded::Value(spec) => spec,
        Decoded::Absent => S::default(),
        Decoded::Failed { encoding, reason } => {
            warn!(
                kind = S::LABEL,
                id = %wire.metadata.id,
                encoding,
                reason = %reason,
                "Spec decode failed, returning default spec"
            );
            metrics.record_decode_fallback();
            S::default()
        }
    };

    let status = match wire.status.decode::<S::Status>() {
        Decoded::Value(status) => Some(status),
        Decoded::Absent => None,
        Decoded::Failed { encoding, reason } => {
            warn!(
                kind = S::LABEL,
                id = %wire.metadata.id,
                encoding,
                reason = %reason,
                "Status decode failed, dropping status"
            );
            metrics.record_decode_fallback();
            None
        }
    };

    Resource::from_parts(wire.metadata.into(), spec, status)
}

pub(crate) fn decode_event<S: ResourceSpec>(
    wire: WireEvent,
    metrics: &ClientMetrics,
) -> ResourceEvent<S> {
    let previous = match wire.kind {
        EventKind::Updated => wire.old.map(|old| decode_resource(old, metrics)),
        _ => None,
    };

    ResourceEvent {
        kind: wire.kind,
        resource: decode_resource(wire.resource, metrics),
        previous,
        total: wire.total.max(0) as u32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinds::{MachineSpec, MachineStatus};
    use crate::resource::SpecPayload;
    use crate::transport::{MemoryConnector, MemoryTransport, WireMetadata};
    use assert_matches::assert_matches;

    fn wire(spec: SpecPayload, status: SpecPayload) -> WireResource {
        WireResource {
            metadata: WireMetadata {
                namespace: "default".into(),
                resource_type: MachineSpec::WIRE_TYPE.into(),
                id: "m1".into(),
                version: "4".into(),
                ..Default::default()
            },
            spec,
            status,
        }
    }

    #[test]
    fn test_decode_text_and_binary() {
        let spec = MachineSpec {
            management_address: "10.0.0.7".into(),
            connected: true,
        };
        let metrics = ClientMetrics::new();

        let text = wire(SpecPayload::encode(&spec).unwrap(), SpecPayload::Absent);
        let decoded: Resource<MachineSpec> = decode_resource(text, &metrics);
        assert_eq!(decoded.spec, spec);
        assert_eq!(decoded.status, None);

        let status = MachineStatus {
            locked: true,
            ..Default::default()
        };
        let binary = wire(
            SpecPayload::encode_binary(&spec).unwrap(),
            SpecPayload::encode_binary(&status).unwrap(),
        );
        let decoded: Resource<MachineSpec> = decode_resource(binary, &metrics);
        assert_eq!(decoded.spec, spec);
        assert_eq!(decoded.status, Some(status));
        assert_eq!(metrics.snapshot().decode_fallbacks, 0);
    }

    #[test]
    fn test_decode_failure_keeps_metadata() {
        let metrics = ClientMetrics::new();
        let broken = wire(
            SpecPayload::Text("connected: [yes".into()),
            SpecPayload::Binary(bytes::Bytes::from_static(&[0xff, 0xff])),
        );

        let decoded: Resource<MachineSpec> = decode_resource(broken, &metrics);
        assert_eq!(decoded.id(), "m1");
        assert_eq!(decoded.version(), "4");
        assert_eq!(decoded.spec, MachineSpec::default());
        assert_eq!(decoded.status, None);
        assert_eq!(metrics.snapshot().decode_fallbacks, 2);
    }

    #[test]
    fn test_decode_binary_when_text_unreadable() {
        let metrics = ClientMetrics::new();
        let spec = MachineSpec {
            management_address: "10.0.0.9".into(),
            connected: true,
        };
        let bytes = bincode::serialize(&spec).unwrap();
        let payload = SpecPayload::from_parts(Some("connected: [broken".into()), Some(bytes.into()));

        let decoded: Resource<MachineSpec> = decode_resource(wire(payload, SpecPayload::Absent), &metrics);
        assert_eq!(decoded.spec, spec);
        assert_eq!(metrics.snapshot().decode_fallbacks, 0);
    }

    #[test]
    fn test_previous_only_for_updates() {
        let metrics = ClientMetrics::new();
        let created = WireEvent {
            kind: EventKind::Created,
            resource: wire(SpecPayload::Absent, SpecPayload::Absent),
            old: Some(wire(SpecPayload::Absent, SpecPayload::Absent)),
            total: -1,
        };
        let event: ResourceEvent<MachineSpec> = decode_event(created.clone(), &metrics);
        assert!(event.previous.is_none());
        assert_eq!(event.total, 0);

        let updated = WireEvent {
            kind: EventKind::Updated,
            total: 3,
            ..created
        };
        let event: ResourceEvent<MachineSpec> = decode_event(updated, &metrics);
        assert_eq!(event.previous.unwrap().id(), "m1");
        assert_eq!(event.total, 3);
    }

    #[tokio::test]
    async fn test_connect_validates_and_routes() {
        let connector = MemoryConnector::new(MemoryTransport::shared());

        let client = ResourceClient::connect(ClientConfig::new("memory://fleet"), &connector)
            .await
            .unwrap();
        assert_eq!(client.mode(), ClientMode::ReadWrite);
        assert!(client.registry().is_registered::<MachineSpec>());

        let err = ResourceClient::connect(ClientConfig::new("https://fleet.example"), &connector)
            .await
            .err()
            .unwrap();
        assert_matches!(err, Error::Configuration(_));
    }
}
