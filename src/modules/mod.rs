//! Modules layer - Infrastructure components for external integrations
//!
//! Contains the object-storage client and the metadata persistence backends.

pub mod metadata;
pub mod storage;
