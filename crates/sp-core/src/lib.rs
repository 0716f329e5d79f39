//! # sp-core
//!
//! Foundational types shared by the SAML service provider crates:
//! configuration loading, the workspace error type, protocol events and the
//! injectable [`Telemetry`] capability.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod config;
pub mod error;
pub mod event;
pub mod telemetry;

pub use config::{MessageKind, ServiceProviderConfig};
pub use error::{Error, Result};
pub use event::{Event, EventOutcome, EventType};
pub use telemetry::Telemetry;
