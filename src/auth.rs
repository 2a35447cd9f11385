//! Request signing port
//!
//! Signing is owned by an external collaborator. The client calls the signer
//! exactly once per call with the method path and the outgoing metadata, and
//! attaches whatever headers come back.

use crate::error::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Outgoing request headers
pub type RequestMetadata = BTreeMap<String, String>;

/// Header carrying the client identity
pub const CLIENT_HEADER: &str = "x-fleet-client";

/// Port for request signing
#[async_trait]
pub trait RequestSigner: Send + Sync {
    /// Return the headers to send for `method`
    async fn sign(&self, method: &str, metadata: RequestMetadata) -> Result<RequestMetadata>;
}

pub type RequestSignerRef = Arc<dyn RequestSigner>;

/// Passes metadata through untouched
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSigner;

#[async_trait]
impl RequestSigner for NoopSigner {
    async fn sign(&self, _method: &str, metadata: RequestMetadata) -> Result<RequestMetadata> {
        Ok(metadata)
    }
}

/// Adds a fixed set of headers, e.g. a pre-issued bearer token
#[derive(Debug, Clone, Default)]
pub struct StaticHeaderSigner {
    headers: RequestMetadata,
}

impl StaticHeaderSigner {
    pub fn new(headers: RequestMetadata) -> Self {
        Self { headers }
    }

    pub fn bearer(token: impl AsRef<str>) -> Self {
        let mut headers = RequestMetadata::new();
        headers.insert("authorization".into(), format!("Bearer {}", token.as_ref()));
        Self { headers }
    }
}

#[async_trait]
impl RequestSigner for StaticHeaderSigner {
    async fn sign(&self, _method: &str, mut metadata: RequestMetadata) -> Result<RequestMetadata> {
        metadata.extend(self.headers.clone());
        Ok(metadata)
    }
}
