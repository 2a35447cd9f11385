//! Applying resources from YAML and JSON documents
//!
//! Documents are fully decoded before anything is sent, so a malformed
//! document always fails with [`Error::Parse`] and never reaches the network.

use super::ResourceClient;
use crate::error::{Error, Result};
use crate::resource::{Resource, ResourceMetadata, ResourceSpec};
use serde::Deserialize;
use std::path::Path;
use tracing::info;

/// On-disk shape of a resource: `metadata` plus `spec`
#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "S: ResourceSpec"))]
struct ResourceDocument<S> {
    #[serde(default)]
    metadata: ResourceMetadata,
    #[serde(default)]
    spec: S,
}

impl<S: ResourceSpec> ResourceDocument<S> {
    /// Reject documents declaring another kind
    fn into_resource(self, source_name: &str, wire_name: &str) -> Result<Resource<S>> {
        let declared = self.metadata.resource_type.as_str();
        if !declared.is_empty() && declared != wire_name {
            return Err(Error::parse(
                source_name,
                format!("document type {} does not match kind {} ({})", declared, S::LABEL, wire_name),
            ));
        }
        if self.metadata.id.is_empty() {
            return Err(Error::parse(source_name, "document metadata has no id"));
        }
        Ok(Resource::from_parts(self.metadata, self.spec, None))
    }
}

/// Decode a single YAML document
pub fn parse_yaml<S: ResourceSpec>(source_name: &str, wire_name: &str, text: &str) -> Result<Resource<S>> {
    let document: ResourceDocument<S> =
        serde_yaml::from_str(text).map_err(|e| Error::parse(source_name, e))?;
    document.into_resource(source_name, wire_name)
}

/// Decode a single JSON document
pub fn parse_json<S: ResourceSpec>(source_name: &str, wire_name: &str, text: &str) -> Result<Resource<S>> {
    let document: ResourceDocument<S> =
        serde_json::from_str(text).map_err(|e| Error::parse(source_name, e))?;
    document.into_resource(source_name, wire_name)
}

/// Decode every document of a `---` separated YAML stream
pub fn parse_yaml_stream<S: ResourceSpec>(
    source_name: &str,
    wire_name: &str,
    text: &str,
) -> Result<Vec<Resource<S>>> {
    let mut resources = Vec::new();
    for (index, document) in serde_yaml::Deserializer::from_str(text).enumerate() {
        let name = format!("{} (document {})", source_name, index + 1);
        let document =
            ResourceDocument::<S>::deserialize(document).map_err(|e| Error::parse(&name, e))?;
        resources.push(document.into_resource(&name, wire_name)?);
    }

    if resources.is_empty() {
        return Err(Error::parse(source_name, "no documents found"));
    }
    Ok(resources)
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map_or(false, |ext| ext.eq_ignore_ascii_case("json"))
}

impl ResourceClient {
    /// Decode one YAML document into `S` and [`apply`](Self::apply) it
    pub async fn apply_yaml<S: ResourceSpec>(&self, text: &str, dry_run: bool) -> Result<Resource<S>> {
        let wire_name = self.wire_name::<S>()?;
        let resource = parse_yaml::<S>("yaml document", &wire_name, text)?;
        self.apply(&resource, dry_run).await
    }

    /// Apply every document of a multi-document YAML stream in order,
    /// stopping at the first failure
    pub async fn apply_yaml_documents<S: ResourceSpec>(
        &self,
        text: &str,
        dry_run: bool,
    ) -> Result<Vec<Resource<S>>> {
        let wire_name = self.wire_name::<S>()?;
        let resources = parse_yaml_stream::<S>("yaml stream", &wire_name, text)?;

        let mut applied = Vec::with_capacity(resources.len());
        for resource in &resources {
            applied.push(self.apply(resource, dry_run).await?);
        }
        info!(kind = S::LABEL, count = applied.len(), dry_run, "Applied documents");
        Ok(applied)
    }

    /// Read a file and apply the document in it; `.json` files are decoded
    /// as JSON, anything else as YAML
    pub async fn apply_file<S: ResourceSpec>(
        &self,
        path: impl AsRef<Path>,
        dry_run: bool,
    ) -> Result<Resource<S>> {
        let path = path.as_ref();
        let wire_name = self.wire_name::<S>()?;
        let text = tokio::fs::read_to_string(path).await?;
        let source_name = path.display().to_string();

        let resource = if is_json(path) {
            parse_json::<S>(&source_name, &wire_name, &text)?
        } else {
            parse_yaml::<S>(&source_name, &wire_name, &text)?
        };
        info!(kind = S::LABEL, path = %source_name, dry_run, "Applying file");
        self.apply(&resource, dry_run).await
    }
}
