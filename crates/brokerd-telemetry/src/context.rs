//! Session-scoped tracing context.
//!
//! Every long-running task a session owns (stdio reader, request
//! servicer, subscriber fan-out) enters the same [`tracing::Span`] so
//! log lines from one session can be filtered and correlated, per the
//! teacher's `#[tracing::instrument]`-per-session convention carried
//! into `brokerd-session`.

use brokerd_core::SessionId;
use tracing::Span;

/// Correlates log output for one session across its component tasks.
#[derive(Debug, Clone)]
pub struct SessionContext {
    session_id: SessionId,
    component: &'static str,
    operation: Option<&'static str>,
}

impl SessionContext {
    /// Start a context for `component` (e.g. `"subprocess_session"`,
    /// `"terminal_manager"`) scoped to `session_id`.
    #[must_use]
    pub fn new(session_id: SessionId, component: &'static str) -> Self {
        Self { session_id, component, operation: None }
    }

    /// Narrow the context to a specific operation within the component.
    #[must_use]
    pub fn with_operation(mut self, operation: &'static str) -> Self {
        self.operation = Some(operation);
        self
    }

    /// Build the `tracing::Span` this context describes.
    #[must_use]
    pub fn span(&self) -> Span {
        match self.operation {
            Some(operation) => {
                tracing::info_span!("session", session_id = %self.session_id, component = self.component, operation)
            }
            None => tracing::info_span!("session", session_id = %self.session_id, component = self.component),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_carries_the_session_id_field() {
        let ctx = SessionContext::new(SessionId::new(), "subprocess_session").with_operation("send_prompt");
        let span = ctx.span();
        assert_eq!(span.metadata().unwrap().name(), "session");
    }
}
