//! Platform-free domain primitives for the word-cloud pipeline.
//!
//! This crate owns the request/response contract, object key and public-URL
//! derivation, the gateway throttle model, the versioned-bucket storage
//! model, and the pipeline configuration structure. It intentionally
//! excludes AWS SDK and Lambda runtime concerns.

pub mod config;
pub mod contract;
pub mod object_store;
pub mod storage_keys;
pub mod throttle;

/// Milliseconds in one second.
pub const ONE_SEC_MS: u64 = 1_000;
/// Milliseconds in one UTC day; used for quota windows and retention math.
pub const ONE_DAY_MS: u64 = 86_400_000;
