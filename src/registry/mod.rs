//! Type registry
//!
//! Decouples the generic client's single code path from each kind's wire
//! identifier: adding a kind is one registration, not new RPC plumbing.

pub mod type_registry;

pub use type_registry::{Registration, TypeRegistry};
