//! Injected logging capability.
//!
//! The engine never logs through ambient global state. A [`Telemetry`] is
//! handed to it at construction and every event is emitted as a child of the
//! span it wraps. A disabled capability emits nothing at all.

use tracing::Span;

use crate::event::{Event, EventOutcome};

/// Logging capability for one hosted service provider.
#[derive(Debug, Clone)]
pub struct Telemetry {
    span: Span,
    enabled: bool,
}

impl Telemetry {
    /// Wraps an existing span.
    #[must_use]
    pub const fn new(span: Span) -> Self {
        Self {
            span,
            enabled: true,
        }
    }

    /// Creates the standard span for a service provider.
    #[must_use]
    pub fn for_entity(entity_id: &str) -> Self {
        Self::new(tracing::info_span!("saml_sp", entity_id = %entity_id))
    }

    /// A capability that records nothing.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            span: Span::none(),
            enabled: false,
        }
    }

    /// Returns the parent span.
    #[must_use]
    pub const fn span(&self) -> &Span {
        &self.span
    }

    /// False for [`Telemetry::disabled`].
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Runs `f` inside the span. Skipped entirely when disabled, so ad hoc
    /// diagnostics written in `f` follow the capability.
    pub fn in_scope<F: FnOnce()>(&self, f: F) {
        if self.enabled {
            self.span.in_scope(f);
        }
    }

    /// Emits an event. Failures are logged at `WARN`, everything else at `INFO`.
    pub fn record(&self, event: &Event) {
        if !self.enabled {
            return;
        }
        let remote = event.remote_entity_id.as_deref().unwrap_or("-");
        let message_id = event.message_id.as_deref().unwrap_or("-");
        let endpoint = event.endpoint.as_deref().unwrap_or("-");

        match event.outcome {
            EventOutcome::Success => tracing::info!(
                parent: &self.span,
                event_id = %event.id,
                event_type = event.event_type.as_str(),
                remote_entity_id = remote,
                message_id,
                in_response_to = event.in_response_to.as_deref(),
                endpoint,
                "SAML protocol event"
            ),
            EventOutcome::Failure => tracing::warn!(
                parent: &self.span,
                event_id = %event.id,
                event_type = event.event_type.as_str(),
                remote_entity_id = remote,
                message_id,
                in_response_to = event.in_response_to.as_deref(),
                error = event.error.as_deref().unwrap_or("-"),
                "SAML protocol event"
            ),
        }
    }
}

impl Default for Telemetry {
    fn default() -> Self {
        Self::disabled()
    }
}
