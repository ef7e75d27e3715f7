use std::sync::Mutex;

/// One dispatched request, recorded after it completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEvent {
    pub request_id: String,
    /// Action name as sent by the caller, if any.
    pub action: Option<String>,
    /// Qualified table the action targeted.
    pub table: Option<String>,
    pub outcome: AuditOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditOutcome {
    Success,
    Failure { kind: &'static str, status: u16 },
}

/// Trait boundary for audit records.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: AuditEvent);
}

/// Emits audit records as structured `tracing` events on the
/// `meerkat::audit` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: AuditEvent) {
        let action = event.action.as_deref().unwrap_or("-");
        let table = event.table.as_deref().unwrap_or("-");
        match event.outcome {
            AuditOutcome::Success => tracing::info!(
                target: "meerkat::audit",
                request_id = %event.request_id,
                action,
                table,
                "action completed"
            ),
            AuditOutcome::Failure { kind, status } => tracing::warn!(
                target: "meerkat::audit",
                request_id = %event.request_id,
                action,
                table,
                kind,
                status,
                "action failed"
            ),
        }
    }
}

/// Keeps every record in memory.
#[derive(Debug, Default)]
pub struct RecordingAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl RecordingAuditSink {
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl AuditSink for RecordingAuditSink {
    fn record(&self, event: AuditEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

impl<S: AuditSink + ?Sized> AuditSink for std::sync::Arc<S> {
    fn record(&self, event: AuditEvent) {
        (**self).record(event)
    }
}
