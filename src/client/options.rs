//! Options and results for the generic client operations

use crate::error::Error;
use crate::resource::LabelSelector;
use crate::transport::SortField;
use std::collections::BTreeMap;
use tokio_util::sync::CancellationToken;

// =============================================================================
// List Options
// =============================================================================

/// Filters and paging for [`super::ResourceClient::list`]
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    /// Empty or unset uses the client's default namespace
    pub namespace: Option<String>,
    /// Label selector, e.g. `env=prod,!draft`
    pub selector: String,
    /// Regular expression the id must match
    pub id_pattern: Option<String>,
    pub offset: u32,
    /// 0 means no limit
    pub limit: u32,
    pub sort_by: Option<SortField>,
    pub sort_desc: bool,
    /// Case-insensitive terms matched against id and label values
    pub search_terms: Vec<String>,
    pub cancel: Option<CancellationToken>,
}

impl ListOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = selector.into();
        self
    }

    /// Use a pre-built selector
    pub fn label_selector(mut self, selector: &LabelSelector) -> Self {
        self.selector = selector.to_string();
        self
    }

    pub fn id_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.id_pattern = Some(pattern.into());
        self
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = offset;
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    pub fn sort_by(mut self, field: SortField, descending: bool) -> Self {
        self.sort_by = Some(field);
        self.sort_desc = descending;
        self
    }

    pub fn search(mut self, term: impl Into<String>) -> Self {
        self.search_terms.push(term.into());
        self
    }

    pub fn cancel_on(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

// =============================================================================
// Watch Options
// =============================================================================

/// Filters for [`super::ResourceClient::watch`]
#[derive(Debug, Clone, Default)]
pub struct WatchOptions {
    pub namespace: Option<String>,
    pub selector: String,
    /// Watch a single resource
    pub id: Option<String>,
    /// Historical events to replay before live ones
    pub tail_events: u32,
    pub cancel: Option<CancellationToken>,
}

impl WatchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = selector.into();
        self
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn tail_events(mut self, tail_events: u32) -> Self {
        self.tail_events = tail_events;
        self
    }

    pub fn cancel_on(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

// =============================================================================
// Delete Many Report
// =============================================================================

/// Outcome of a bulk delete
#[derive(Debug, Default)]
pub struct DeleteManyReport {
    /// Ids removed, in deletion order
    pub deleted: Vec<String>,
    /// Ids that could not be removed, with the reason
    pub failed: BTreeMap<String, Error>,
}

impl DeleteManyReport {
    pub fn deleted_count(&self) -> usize {
        self.deleted.len()
    }

    pub fn attempted(&self) -> usize {
        self.deleted.len() + self.failed.len()
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}
