//! Pluggable observability hooks (§6 External Interfaces): a structured
//! "audit" sink for lifecycle events, and a free-text "diagnostic logging"
//! sink, each backed by a process-wide registry of installed handlers.
//!
//! Handlers are fire-and-forget: a panicking handler is caught and
//! dropped rather than propagated, so a misbehaving sink cannot take down
//! the caller that triggered the event.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, OnceLock};

/// A structured lifecycle event, as named in spec.md §6 "Observability".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditEvent {
    AssociationEstablished { calling_ae: String, called_ae: String },
    AssociationRejected { calling_ae: String, called_ae: String, reason: String },
    AssociationReleased { calling_ae: String, called_ae: String },
    AssociationAborted { calling_ae: String, called_ae: String, reason: String },
    StoreSent { sop_instance_uid: String },
    StoreReceived { sop_instance_uid: String },
    QueryExecuted { sop_class_uid: String },
    RetrieveStarted { sop_class_uid: String },
    RetrieveCompleted { sop_class_uid: String },
    VerificationPerformed { calling_ae: String },
    CommitmentRequested { transaction_uid: String },
    CommitmentResultReceived { transaction_uid: String },
    ConnectionEstablished { peer: String },
    ConnectionFailed { peer: String, reason: String },
    SecurityEvent { description: String },
}

pub trait AuditSink: Send + Sync {
    fn record(&self, event: &AuditEvent);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogCategory {
    Connection,
    Association,
    Pdu,
    Dimse,
    Query,
    Retrieve,
    Verification,
    StateMachine,
    Performance,
    Storage,
    Audit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticRecord {
    pub level: LogLevel,
    pub category: LogCategory,
    pub message: String,
}

pub trait DiagnosticSink: Send + Sync {
    fn record(&self, record: &DiagnosticRecord);
}

#[derive(Default)]
struct Registry {
    audit: Vec<Arc<dyn AuditSink>>,
    diagnostic: Vec<Arc<dyn DiagnosticSink>>,
}

static REGISTRY: OnceLock<Mutex<Registry>> = OnceLock::new();

fn registry() -> &'static Mutex<Registry> {
    REGISTRY.get_or_init(|| Mutex::new(Registry::default()))
}

/// Installs an audit sink. Installed sinks are never removed; call once
/// per process, typically at startup.
pub fn install_audit_sink(sink: Arc<dyn AuditSink>) {
    registry().lock().unwrap().audit.push(sink);
}

pub fn install_diagnostic_sink(sink: Arc<dyn DiagnosticSink>) {
    registry().lock().unwrap().diagnostic.push(sink);
}

/// Drops every installed sink. Exposed for test isolation between cases
/// that install their own sinks against the shared process-wide registry.
pub fn clear_sinks() {
    let mut reg = registry().lock().unwrap();
    reg.audit.clear();
    reg.diagnostic.clear();
}

pub fn emit_audit(event: AuditEvent) {
    let sinks = registry().lock().unwrap().audit.clone();
    for sink in sinks {
        let _ = catch_unwind(AssertUnwindSafe(|| sink.record(&event)));
    }
}

pub fn emit_diagnostic(level: LogLevel, category: LogCategory, message: impl Into<String>) {
    let record = DiagnosticRecord { level, category, message: message.into() };
    let sinks = registry().lock().unwrap().diagnostic.clone();
    for sink in sinks {
        let _ = catch_unwind(AssertUnwindSafe(|| sink.record(&record)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingAuditSink(Arc<AtomicUsize>);
    impl AuditSink for CountingAuditSink {
        fn record(&self, _event: &AuditEvent) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct PanickingAuditSink;
    impl AuditSink for PanickingAuditSink {
        fn record(&self, _event: &AuditEvent) {
            panic!("misbehaving sink");
        }
    }

    #[test]
    fn installed_sinks_receive_emitted_events() {
        clear_sinks();
        let count = Arc::new(AtomicUsize::new(0));
        install_audit_sink(Arc::new(CountingAuditSink(count.clone())));

        emit_audit(AuditEvent::VerificationPerformed { calling_ae: "SCU".into() });
        assert_eq!(count.load(Ordering::SeqCst), 1);
        clear_sinks();
    }

    #[test]
    fn a_panicking_sink_does_not_stop_other_sinks_or_the_caller() {
        clear_sinks();
        let count = Arc::new(AtomicUsize::new(0));
        install_audit_sink(Arc::new(PanickingAuditSink));
        install_audit_sink(Arc::new(CountingAuditSink(count.clone())));

        emit_audit(AuditEvent::VerificationPerformed { calling_ae: "SCU".into() });
        assert_eq!(count.load(Ordering::SeqCst), 1);
        clear_sinks();
    }
}
