//! SAML 2.0 types and data structures.
//!
//! Requests, responses, assertions, status, metadata and endpoints, plus the
//! header every protocol message shares.

mod assertion;
mod authentication;
mod authn_request;
mod constants;
mod logout;
mod message;
mod metadata;
mod name_id;
mod response;
mod status;

pub use assertion::*;
pub use authentication::*;
pub use authn_request::*;
pub use constants::*;
pub use logout::*;
pub use message::*;
pub use metadata::*;
pub use name_id::*;
pub use response::*;
pub use status::*;
