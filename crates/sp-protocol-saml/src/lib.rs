//! SAML 2.0 service provider protocol engine.
//!
//! Builds, signs, parses and validates the messages a service provider
//! exchanges with identity providers, and decides what to do with each
//! inbound exchange. Transport (the HTTP pipeline) and session storage stay
//! with the caller.
//!
//! # Architecture
//!
//! - [`types`] - message model: requests, responses, assertions, status,
//!   metadata and endpoints
//! - [`xml`] - XML tree, parser and canonical serializer
//! - [`signature`] - embedded (enveloped) and detached signatures
//! - [`validation`] - accumulated checks over a received message
//! - [`endpoint`] - remote endpoint selection
//! - [`sso`] - `AuthnRequest` building and `Response` consumption
//! - [`logout`] - single logout negotiation
//! - [`bindings`] - HTTP-Redirect and HTTP-POST codecs
//! - [`provider`] - the hosted service provider and remote party lookup
//! - [`error`] - error types
//!
//! # Example
//!
//! ```rust,ignore
//! use sp_protocol_saml::{HostedServiceProvider, SamlBinding};
//!
//! let sp = HostedServiceProvider::from_config(&config, telemetry)?;
//! let outbound = sp.build_authn_request(&idp_metadata, Some(SamlBinding::HttpRedirect), relay_state)?;
//! // render outbound.delivery as a 302 or an auto-submitting form
//! ```
//!
//! # SAML Specifications
//!
//! - [SAML 2.0 Core](https://docs.oasis-open.org/security/saml/v2.0/saml-core-2.0-os.pdf)
//! - [SAML 2.0 Bindings](https://docs.oasis-open.org/security/saml/v2.0/saml-bindings-2.0-os.pdf)
//! - [SAML 2.0 Metadata](https://docs.oasis-open.org/security/saml/v2.0/saml-metadata-2.0-os.pdf)
//! - [Exclusive XML Canonicalization](https://www.w3.org/TR/xml-exc-c14n/)

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod bindings;
pub mod endpoint;
pub mod error;
pub mod logout;
pub mod outbound;
pub mod provider;
pub mod signature;
pub mod sso;
pub mod types;
pub mod validation;
pub mod xml;

pub use error::{SamlError, SamlResult};
pub use logout::{LogoutNegotiator, LogoutOutcome};
pub use outbound::{Delivery, OutboundMessage};
pub use provider::{HostedServiceProvider, RemoteProviders};
pub use types::*;
pub use validation::{ValidationErrorKind, ValidationResult};
