//! Remote endpoint selection.
//!
//! Precedence, first match wins:
//!
//! 1. the endpoint with the requested index
//! 2. the endpoint marked default
//! 3. the first endpoint with the requested binding
//! 4. the first endpoint

use crate::{
    error::{SamlError, SamlResult},
    types::{Endpoint, SamlBinding},
};

/// Picks one endpoint from `endpoints`, or `None` when the list is empty.
#[must_use]
pub fn resolve(
    endpoints: &[Endpoint],
    binding: Option<SamlBinding>,
    index: Option<u32>,
) -> Option<&Endpoint> {
    index
        .and_then(|index| endpoints.iter().find(|e| e.index == Some(index)))
        .or_else(|| endpoints.iter().find(|e| e.is_default))
        .or_else(|| binding.and_then(|binding| endpoints.iter().find(|e| e.binding == binding)))
        .or_else(|| endpoints.first())
}

/// Like [`resolve`], failing with [`SamlError::NoUsableEndpoint`] on an
/// empty list.
pub fn resolve_required<'a>(
    endpoints: &'a [Endpoint],
    binding: Option<SamlBinding>,
    index: Option<u32>,
    entity_id: &str,
    service: &'static str,
) -> SamlResult<&'a Endpoint> {
    resolve(endpoints, binding, index).ok_or_else(|| SamlError::NoUsableEndpoint {
        entity_id: entity_id.to_string(),
        service,
    })
}
