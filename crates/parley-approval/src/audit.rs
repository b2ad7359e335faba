//! Audit trail for permission decisions.

use chrono::{DateTime, Utc};
use parley_core::{Resource, Subject};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

use crate::rule::{RuleAction, RuleId};

/// One evaluated permission decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// The resulting action.
    pub decision: RuleAction,
    /// Who asked.
    pub subject: Subject,
    /// What they asked for.
    pub resource: Resource,
    /// The winning rule, if any rule matched.
    pub matched_rule_id: Option<RuleId>,
    /// Session the evaluation ran in.
    pub session_id: Option<String>,
    /// When the decision was made.
    pub timestamp: DateTime<Utc>,
}

/// Destination for audit records.
pub trait AuditSink: Send + Sync {
    /// Record one decision. Must not fail the evaluation that produced it.
    fn record(&self, record: AuditRecord);
}

/// Writes audit records as structured `tracing` events on the
/// `parley::audit` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, record: AuditRecord) {
        tracing::info!(
            target: "parley::audit",
            decision = %record.decision,
            subject = %record.subject,
            resource = %record.resource,
            matched_rule = record.matched_rule_id.map(|id| id.0),
            session_id = record.session_id.as_deref(),
            "permission decision"
        );
    }
}

/// Keeps audit records in memory, mostly for tests and inspection.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditSink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far.
    #[must_use]
    pub fn records(&self) -> Vec<AuditRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    /// Number of records.
    #[must_use]
    pub fn count(&self) -> usize {
        self.records.lock().map(|records| records.len()).unwrap_or(0)
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, record: AuditRecord) {
        let mut records = self.records.lock().unwrap_or_else(|e| {
            tracing::warn!("audit sink lock poisoned, recovering");
            e.into_inner()
        });
        records.push(record);
    }
}
