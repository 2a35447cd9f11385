//! Resource kinds and spec payload encoding
//!
//! A spec travels over the wire in one of two encodings: a textual YAML
//! document or a compact binary form. The transport hands the client a
//! [`SpecPayload`] saying which forms it got. Text is decoded first and
//! binary is the fallback when text is missing or unreadable.

use crate::error::{Error, Result};
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;

// =============================================================================
// Resource Kind Traits
// =============================================================================

/// Observed state reported by the server for a kind
pub trait ResourceStatus:
    Debug + Clone + Default + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
}

impl<T> ResourceStatus for T where
    T: Debug + Clone + Default + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
}

/// Desired state of a resource kind.
///
/// The spec type doubles as the kind marker: the generic client is
/// parameterized by it, and the type registry keys on its `TypeId`.
/// Spec and status types must stay self-describing-free (no
/// `skip_serializing_if`, no untagged enums) so the binary encoding can
/// round-trip them.
pub trait ResourceSpec:
    Debug + Clone + Default + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Server-reported status type; use `()` for kinds without status
    type Status: ResourceStatus;

    /// Local kind label used in logs and errors
    const LABEL: &'static str;

    /// Wire type name registered by `TypeRegistry::register_kind`
    const WIRE_TYPE: &'static str;
}

// =============================================================================
// Spec Payload
// =============================================================================

/// Which encoding a spec (or status) arrived in
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SpecPayload {
    /// YAML document
    Text(String),
    /// bincode-encoded bytes
    Binary(Bytes),
    /// Both forms present; text is tried before binary
    Both { text: String, binary: Bytes },
    /// Kind carries no spec data
    #[default]
    Absent,
}

/// Outcome of decoding a payload
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded<T> {
    Value(T),
    Absent,
    Failed {
        encoding: &'static str,
        reason: String,
    },
}

impl<T: Default> Decoded<T> {
    /// Fall back to the default value on absence or failure
    pub fn unwrap_or_default(self) -> T {
        match self {
            Decoded::Value(value) => value,
            Decoded::Absent | Decoded::Failed { .. } => T::default(),
        }
    }
}

impl<T> Decoded<T> {
    pub fn is_failed(&self) -> bool {
        matches!(self, Decoded::Failed { .. })
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Decoded::Value(value) => Some(value),
            _ => None,
        }
    }
}

impl SpecPayload {
    /// Build a payload from the two optional wire fields.
    ///
    /// Blank text and empty bytes count as absent.
    pub fn from_parts(text: Option<String>, binary: Option<Bytes>) -> Self {
        let text = text.filter(|text| !text.trim().is_empty());
        let binary = binary.filter(|binary| !binary.is_empty());
        match (text, binary) {
            (Some(text), Some(binary)) => SpecPayload::Both { text, binary },
            (Some(text), None) => SpecPayload::Text(text),
            (None, Some(binary)) => SpecPayload::Binary(binary),
            (None, None) => SpecPayload::Absent,
        }
    }

    /// Encode a value in the textual form, the only form the client writes
    pub fn encode<T: Serialize>(value: &T) -> Result<Self> {
        serde_yaml::to_string(value)
            .map(SpecPayload::Text)
            .map_err(|e| Error::Encode(e.to_string()))
    }

    /// Encode a value in the binary form
    pub fn encode_binary<T: Serialize>(value: &T) -> Result<Self> {
        bincode::serialize(value)
            .map(|bytes| SpecPayload::Binary(Bytes::from(bytes)))
            .map_err(|e| Error::Encode(e.to_string()))
    }

    pub fn decode<T: DeserializeOwned>(&self) -> Decoded<T> {
        match self {
            SpecPayload::Text(text) => decode_text(text),
            SpecPayload::Binary(bytes) => decode_binary(bytes),
            SpecPayload::Both { text, binary } => match decode_text(text) {
                Decoded::Value(value) => Decoded::Value(value),
                Decoded::Absent => decode_binary(binary),
                Decoded::Failed { reason, .. } => match decode_binary(binary) {
                    Decoded::Failed { reason: binary_reason, .. } => Decoded::Failed {
                        encoding: "yaml+binary",
                        reason: format!("{}; {}", reason, binary_reason),
                    },
                    decoded => decoded,
                },
            },
            SpecPayload::Absent => Decoded::Absent,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, SpecPayload::Absent)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            SpecPayload::Text(text) | SpecPayload::Both { text, .. } => Some(text),
            _ => None,
        }
    }
}

fn decode_text<T: DeserializeOwned>(text: &str) -> Decoded<T> {
    if text.trim().is_empty() {
        return Decoded::Absent;
    }
    match serde_yaml::from_str(text) {
        Ok(value) => Decoded::Value(value),
        Err(e) => Decoded::Failed {
            encoding: "yaml",
            reason: e.to_string(),
        },
    }
}

fn decode_binary<T: DeserializeOwned>(bytes: &[u8]) -> Decoded<T> {
    match bincode::deserialize(bytes) {
        Ok(value) => Decoded::Value(value),
        Err(e) => Decoded::Failed {
            encoding: "binary",
            reason: e.to_string(),
        },
    }
}
