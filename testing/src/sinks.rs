use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use errors::{AuditError, SessionSyncError};
use parking_lot::Mutex;
use tenant_core::{SessionContextSync, TenantId, UserId, ViolationRecord, ViolationSink};

/// Session sync that remembers every call.
#[derive(Default)]
pub struct RecordingSessionSync {
    set_calls: Mutex<Vec<(TenantId, UserId)>>,
    clear_calls: AtomicUsize
}

impl RecordingSessionSync {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_calls(&self) -> Vec<(TenantId, UserId)> {
        self.set_calls.lock().clone()
    }

    pub fn clear_calls(&self) -> usize {
        self.clear_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionContextSync for RecordingSessionSync {
    async fn set_tenant_context(
        &self,
        tenant_id: &TenantId,
        user_id: &UserId
    ) -> Result<(), SessionSyncError> {
        self.set_calls
            .lock()
            .push((tenant_id.clone(), user_id.clone()));
        Ok(())
    }

    async fn clear_tenant_context(&self) -> Result<(), SessionSyncError> {
        self.clear_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Session sync against a database without the session procedures.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingSessionSync;

#[async_trait]
impl SessionContextSync for FailingSessionSync {
    async fn set_tenant_context(
        &self,
        _tenant_id: &TenantId,
        _user_id: &UserId
    ) -> Result<(), SessionSyncError> {
        Err(SessionSyncError::ProcedureUnavailable {
            procedure: "set_tenant_context".to_string()
        })
    }

    async fn clear_tenant_context(&self) -> Result<(), SessionSyncError> {
        Err(SessionSyncError::ProcedureUnavailable {
            procedure: "clear_tenant_context".to_string()
        })
    }
}

/// Violation sink that keeps records in memory.
#[derive(Default)]
pub struct RecordingViolationSink {
    records: Mutex<Vec<ViolationRecord>>
}

impl RecordingViolationSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<ViolationRecord> {
        self.records.lock().clone()
    }

    /// Waits until at least `count` records arrived from detached writers.
    pub async fn wait_for(&self, count: usize) {
        for _ in 0..200 {
            if self.records.lock().len() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!(
            "expected {} violation records, got {}",
            count,
            self.records.lock().len()
        );
    }
}

#[async_trait]
impl ViolationSink for RecordingViolationSink {
    fn sink_name(&self) -> &'static str {
        "recording"
    }

    async fn record(&self, violation: ViolationRecord) -> Result<(), AuditError> {
        self.records.lock().push(violation);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FailingViolationSink;

#[async_trait]
impl ViolationSink for FailingViolationSink {
    fn sink_name(&self) -> &'static str {
        "failing"
    }

    async fn record(&self, _violation: ViolationRecord) -> Result<(), AuditError> {
        Err(AuditError::WriteFailed {
            sink: "failing".to_string(),
            reason: "sink rejected write".to_string()
        })
    }
}
