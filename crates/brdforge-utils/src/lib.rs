//! Foundation utilities for brdforge
//!
//! This crate carries the small, dependency-light pieces the rest of the
//! workspace builds on: content fingerprinting, atomic JSON persistence,
//! tracing initialization, and the shared stage identifiers.

pub mod fingerprint;
pub mod logging;
pub mod store;
pub mod types;

pub use fingerprint::{canonical_json, fingerprint};
pub use store::{read_json, write_json_atomic};
pub use types::StageId;
