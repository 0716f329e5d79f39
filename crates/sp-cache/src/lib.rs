//! # sp-cache
//!
//! Shared mutable state owned outside the protocol engine.
//!
//! - [`MetadataCache`] - remote party metadata keyed by entity id, refreshed
//!   on a TTL by replacing whole entries
//! - [`IssuedRequestRegistry`] - ids of requests the local party sent, used
//!   to check `InResponseTo` and to detect replays
//!
//! Both are safe to share across threads and never block on I/O.
//!
//! ## Example
//!
//! ```
//! use chrono::{Duration, Utc};
//! use sp_cache::{InMemoryRequestRegistry, IssuedRequestRegistry};
//!
//! let registry = InMemoryRequestRegistry::new(Duration::minutes(5));
//! let now = Utc::now();
//! registry.register("ARQ1", now).unwrap();
//! assert!(registry.register("ARQ1", now).is_err());
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod error;
pub mod metadata;
pub mod registry;

pub use error::{CacheError, CacheResult};
pub use metadata::MetadataCache;
pub use registry::{InMemoryRequestRegistry, IssuedRequestRegistry};
