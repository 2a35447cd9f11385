//! In-memory resource-state service
//!
//! Implements the full transport contract against a local store: versioned
//! writes, label selectors, id patterns, sorting and paging, and a bounded
//! event history for tail replay. Every call is counted per verb, and faults
//! can be injected per verb and id.

use super::{
    CallContext, DestroyRequest, GetRequest, ListRequest, ResourceTransport, ResourceTransportRef,
    SortField, TransportConnector, UpdateRequest, Verb, WatchRequest, WireEvent, WireMetadata,
    WireResource, WireStream, WireTimestamp,
};
use crate::config::TlsConfig;
use crate::error::{Code, Error, Result, Status};
use crate::resource::{EventKind, LabelSelector};
use async_trait::async_trait;
use chrono::Utc;
use futures::StreamExt;
use parking_lot::Mutex;
use regex::Regex;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, trace, warn};

// =============================================================================
// Constants
// =============================================================================

/// Events kept for tail replay
pub const DEFAULT_HISTORY_LIMIT: usize = 1024;

/// Live event buffer per subscriber
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Endpoint scheme served by [`MemoryConnector`]
pub const MEMORY_SCHEME: &str = "memory://";

// =============================================================================
// Call Counters
// =============================================================================

/// Snapshot of calls received, per verb
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransportCalls {
    pub get: u64,
    pub list: u64,
    pub watch: u64,
    pub create: u64,
    pub update: u64,
    pub destroy: u64,
}

impl TransportCalls {
    pub fn total(&self) -> u64 {
        self.get + self.list + self.watch + self.mutations()
    }

    pub fn mutations(&self) -> u64 {
        self.create + self.update + self.destroy
    }
}

#[derive(Debug, Default)]
struct CallCounters {
    counts: [AtomicU64; 6],
}

impl CallCounters {
    fn record(&self, verb: Verb) {
        self.counts[verb.index()].fetch_add(1, Ordering::Relaxed);
    }

    fn load(&self, verb: Verb) -> u64 {
        self.counts[verb.index()].load(Ordering::Relaxed)
    }

    fn snapshot(&self) -> TransportCalls {
        TransportCalls {
            get: self.load(Verb::Get),
            list: self.load(Verb::List),
            watch: self.load(Verb::Watch),
            create: self.load(Verb::Create),
            update: self.load(Verb::Update),
            destroy: self.load(Verb::Destroy),
        }
    }
}

// =============================================================================
// Store State
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct ResourceKey {
    namespace: String,
    resource_type: String,
    id: String,
}

impl ResourceKey {
    fn of(meta: &WireMetadata) -> Self {
        Self {
            namespace: meta.namespace.clone(),
            resource_type: meta.resource_type.clone(),
            id: meta.id.clone(),
        }
    }

    fn new(namespace: &str, resource_type: &str, id: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            resource_type: resource_type.to_string(),
            id: id.to_string(),
        }
    }
}

impl std::fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.namespace, self.resource_type, self.id)
    }
}

#[derive(Debug, Default)]
struct StoreState {
    resources: BTreeMap<ResourceKey, WireResource>,
    history: VecDeque<WireEvent>,
}

impl StoreState {
    fn count_of(&self, namespace: &str, resource_type: &str) -> i32 {
        self.resources
            .keys()
            .filter(|k| k.namespace == namespace && k.resource_type == resource_type)
            .count() as i32
    }
}

fn now() -> WireTimestamp {
    let now = Utc::now();
    WireTimestamp {
        seconds: now.timestamp(),
        nanos: now.timestamp_subsec_nanos() as i32,
    }
}

fn next_version(current: &str) -> String {
    current
        .parse::<u64>()
        .map(|v| v + 1)
        .unwrap_or(1)
        .to_string()
}

fn invalid(message: impl Into<String>) -> Error {
    Status::new(Code::InvalidArgument, message).into()
}

// =============================================================================
// Memory Transport
// =============================================================================

/// In-memory implementation of [`ResourceTransport`]
pub struct MemoryTransport {
    state: Mutex<StoreState>,
    events: broadcast::Sender<WireEvent>,
    calls: CallCounters,
    faults: Mutex<HashMap<(Verb, String), Status>>,
    latency: Mutex<Option<Duration>>,
    history_limit: usize,
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::with_history_limit(DEFAULT_HISTORY_LIMIT)
    }

    pub fn with_history_limit(history_limit: usize) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            state: Mutex::new(StoreState::default()),
            events,
            calls: CallCounters::default(),
            faults: Mutex::new(HashMap::new()),
            latency: Mutex::new(None),
            history_limit,
        }
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Calls received so far
    pub fn calls(&self) -> TransportCalls {
        self.calls.snapshot()
    }

    /// Fail every `verb` call addressed to `id` with `status`
    pub fn inject_fault(&self, verb: Verb, id: impl Into<String>, status: Status) {
        self.faults.lock().insert((verb, id.into()), status);
    }

    pub fn clear_faults(&self) {
        self.faults.lock().clear();
    }

    /// Delay every unary response
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.lock() = latency;
    }

    /// Store a resource as-is, bypassing versioning and events
    pub fn insert_raw(&self, resource: WireResource) {
        let key = ResourceKey::of(&resource.metadata);
        self.state.lock().resources.insert(key, resource);
    }

    pub fn len(&self) -> usize {
        self.state.lock().resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Open watch subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.events.receiver_count()
    }

    fn check_fault(&self, verb: Verb, id: &str) -> Result<()> {
        match self.faults.lock().get(&(verb, id.to_string())) {
            Some(status) => Err(status.clone().into()),
            None => Ok(()),
        }
    }

    async fn simulate_latency(&self) {
        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }

    /// Record and broadcast an event while the state lock is held, so replay
    /// snapshots and live subscriptions never interleave
    fn publish(&self, state: &mut StoreState, event: WireEvent) {
        if self.history_limit > 0 {
            if state.history.len() == self.history_limit {
                state.history.pop_front();
            }
            state.history.push_back(event.clone());
        }
        // no subscribers is fine
        let _ = self.events.send(event);
    }
}

fn event_matches(event: &WireEvent, request: &WatchRequest, selector: &LabelSelector) -> bool {
    let meta = &event.resource.metadata;
    meta.namespace == request.namespace
        && meta.resource_type == request.resource_type
        && request.id.as_ref().map_or(true, |id| &meta.id == id)
        && selector.matches(&meta.labels)
}

fn search_matches(resource: &WireResource, terms: &[String]) -> bool {
    terms.iter().all(|term| {
        let term = term.to_lowercase();
        let meta = &resource.metadata;
        meta.id.to_lowercase().contains(&term)
            || meta
                .labels
                .values()
                .any(|value| value.to_lowercase().contains(&term))
    })
}

fn sort_resources(items: &mut [WireResource], field: SortField, desc: bool) {
    items.sort_by(|a, b| {
        let ordering = match field {
            SortField::Id => a.metadata.id.cmp(&b.metadata.id),
            SortField::Created => a.metadata.created.cmp(&b.metadata.created),
            SortField::Updated => a.metadata.updated.cmp(&b.metadata.updated),
        };
        ordering.then_with(|| a.metadata.id.cmp(&b.metadata.id))
    });
    if desc {
        items.reverse();
    }
}

#[async_trait]
impl ResourceTransport for MemoryTransport {
    async fn get(&self, ctx: &CallContext, request: GetRequest) -> Result<WireResource> {
        self.calls.record(Verb::Get);
        trace!(method = ctx.method, id = %request.id, "memory get");
        self.simulate_latency().await;
        self.check_fault(Verb::Get, &request.id)?;

        let key = ResourceKey::new(&request.namespace, &request.resource_type, &request.id);
        self.state
            .lock()
            .resources
            .get(&key)
            .cloned()
            .ok_or_else(|| Status::not_found(format!("resource {} doesn't exist", key)).into())
    }

    async fn list(&self, ctx: &CallContext, request: ListRequest) -> Result<WireStream<WireResource>> {
        self.calls.record(Verb::List);
        trace!(method = ctx.method, resource_type = %request.resource_type, "memory list");
        self.simulate_latency().await;
        self.check_fault(Verb::List, "")?;

        let selector =
            LabelSelector::parse(&request.selector).map_err(|e| invalid(e.to_string()))?;
        let pattern = request
            .id_pattern
            .as_deref()
            .filter(|p| !p.is_empty())
            .map(Regex::new)
            .transpose()
            .map_err(|e| invalid(format!("invalid id pattern: {}", e)))?;

        let mut items: Vec<WireResource> = {
            let state = self.state.lock();
            state
                .resources
                .iter()
                .filter(|(key, _)| {
                    key.namespace == request.namespace && key.resource_type == request.resource_type
                })
                .map(|(_, resource)| resource)
                .filter(|r| selector.matches(&r.metadata.labels))
                .filter(|r| pattern.as_ref().map_or(true, |p| p.is_match(&r.metadata.id)))
                .filter(|r| search_matches(r, &request.search_terms))
                .cloned()
                .collect()
        };

        if let Some(field) = request.sort_by {
            sort_resources(&mut items, field, request.sort_desc);
        }

        let offset = request.offset as usize;
        let limit = if request.limit == 0 {
            usize::MAX
        } else {
            request.limit as usize
        };
        let page: Vec<Result<WireResource>> =
            items.into_iter().skip(offset).take(limit).map(Ok).collect();

        debug!(count = page.len(), resource_type = %request.resource_type, "memory list matched");
        Ok(futures::stream::iter(page).boxed())
    }

    async fn watch(&self, ctx: &CallContext, request: WatchRequest) -> Result<WireStream<WireEvent>> {
        self.calls.record(Verb::Watch);
        trace!(method = ctx.method, resource_type = %request.resource_type, "memory watch");
        self.check_fault(Verb::Watch, request.id.as_deref().unwrap_or(""))?;

        let selector =
            LabelSelector::parse(&request.selector).map_err(|e| invalid(e.to_string()))?;

        // snapshot history and subscribe under one lock
        let (replay, mut receiver) = {
            let state = self.state.lock();
            let mut replay: Vec<WireEvent> = if request.tail_events > 0 {
                state
                    .history
                    .iter()
                    .rev()
                    .filter(|e| event_matches(e, &request, &selector))
                    .take(request.tail_events as usize)
                    .cloned()
                    .collect()
            } else {
                Vec::new()
            };
            replay.reverse();
            (replay, self.events.subscribe())
        };

        let stream = async_stream::stream! {
            for event in replay {
                yield Ok::<_, Error>(event);
            }

            loop {
                match receiver.recv().await {
                    Ok(event) => {
                        if event_matches(&event, &request, &selector) {
                            yield Ok(event);
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "watch subscriber lagged, events dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        };

        Ok(stream.boxed())
    }

    async fn create(&self, ctx: &CallContext, mut resource: WireResource) -> Result<WireResource> {
        self.calls.record(Verb::Create);
        trace!(method = ctx.method, id = %resource.metadata.id, "memory create");
        self.simulate_latency().await;
        self.check_fault(Verb::Create, &resource.metadata.id)?;

        let key = ResourceKey::of(&resource.metadata);
        let mut state = self.state.lock();
        if state.resources.contains_key(&key) {
            return Err(Status::already_exists(format!("resource {} already exists", key)).into());
        }

        let ts = now();
        resource.metadata.version = "1".into();
        resource.metadata.created = Some(ts);
        resource.metadata.updated = Some(ts);
        resource.metadata.phase = 0;
        state.resources.insert(key.clone(), resource.clone());

        let total = state.count_of(&key.namespace, &key.resource_type);
        self.publish(
            &mut state,
            WireEvent {
                kind: EventKind::Created,
                resource: resource.clone(),
                old: None,
                total,
            },
        );

        Ok(resource)
    }

    async fn update(&self, ctx: &CallContext, request: UpdateRequest) -> Result<WireResource> {
        self.calls.record(Verb::Update);
        let UpdateRequest {
            mut resource,
            current_version,
        } = request;
        trace!(method = ctx.method, id = %resource.metadata.id, "memory update");
        self.simulate_latency().await;
        self.check_fault(Verb::Update, &resource.metadata.id)?;

        let key = ResourceKey::of(&resource.metadata);
        let mut state = self.state.lock();
        let old = state
            .resources
            .get(&key)
            .cloned()
            .ok_or_else(|| Status::not_found(format!("resource {} doesn't exist", key)))?;

        if old.metadata.version != current_version {
            return Err(Status::aborted(format!(
                "resource {} update conflict: expected version {:?}, actual version {:?}",
                key, current_version, old.metadata.version
            ))
            .into());
        }

        resource.metadata.version = next_version(&old.metadata.version);
        resource.metadata.created = old.metadata.created;
        resource.metadata.updated = Some(now());
        state.resources.insert(key.clone(), resource.clone());

        let total = state.count_of(&key.namespace, &key.resource_type);
        self.publish(
            &mut state,
            WireEvent {
                kind: EventKind::Updated,
                resource: resource.clone(),
                old: Some(old),
                total,
            },
        );

        Ok(resource)
    }

    async fn destroy(&self, ctx: &CallContext, request: DestroyRequest) -> Result<()> {
        self.calls.record(Verb::Destroy);
        trace!(method = ctx.method, id = %request.id, "memory destroy");
        self.simulate_latency().await;
        self.check_fault(Verb::Destroy, &request.id)?;

        let key = ResourceKey::new(&request.namespace, &request.resource_type, &request.id);
        let mut state = self.state.lock();
        let Some(existing) = state.resources.get(&key) else {
            return Err(Status::not_found(format!("resource {} doesn't exist", key)).into());
        };

        if !existing.metadata.finalizers.is_empty() {
            return Err(Status::new(
                Code::FailedPrecondition,
                format!(
                    "resource {} has pending finalizers {:?}",
                    key, existing.metadata.finalizers
                ),
            )
            .into());
        }

        let removed = state.resources.remove(&key).unwrap_or_default();
        let total = state.count_of(&key.namespace, &key.resource_type);
        self.publish(
            &mut state,
            WireEvent {
                kind: EventKind::Destroyed,
                resource: removed,
                old: None,
                total,
            },
        );

        Ok(())
    }
}

// =============================================================================
// Memory Connector
// =============================================================================

/// Hands out a shared [`MemoryTransport`] for `memory://` endpoints
#[derive(Clone)]
pub struct MemoryConnector {
    transport: Arc<MemoryTransport>,
}

impl MemoryConnector {
    pub fn new(transport: Arc<MemoryTransport>) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl TransportConnector for MemoryConnector {
    async fn connect(&self, endpoint: &str, _tls: &TlsConfig) -> Result<ResourceTransportRef> {
        if !endpoint.starts_with(MEMORY_SCHEME) {
            return Err(Error::Configuration(format!(
                "memory connector cannot serve endpoint {}",
                endpoint
            )));
        }
        debug!(endpoint, "connected in-memory transport");
        Ok(self.transport.clone())
    }
}
