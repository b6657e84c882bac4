//! Best-effort recording of denied cross-tenant attempts.

use std::sync::Arc;

use async_trait::async_trait;
use config::IsolationConfig;
use errors::AuditError;
use metrics::counter;
use tenant_core::{ViolationRecord, ViolationSink};
use tokio::task::JoinHandle;
use tracing::warn;

/// Dispatches violation records to a sink without ever blocking or failing
/// the caller.
#[derive(Clone)]
pub struct ViolationLogger {
    sink: Arc<dyn ViolationSink>,
    enabled: bool
}

impl std::fmt::Debug for ViolationLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViolationLogger")
            .field("sink", &self.sink.sink_name())
            .field("enabled", &self.enabled)
            .finish()
    }
}

impl Default for ViolationLogger {
    fn default() -> Self {
        Self::new(Arc::new(TracingViolationSink))
    }
}

impl ViolationLogger {
    pub fn new(sink: Arc<dyn ViolationSink>) -> Self {
        Self {
            sink,
            enabled: true
        }
    }

    pub fn from_config(sink: Arc<dyn ViolationSink>, config: &IsolationConfig) -> Self {
        Self {
            sink,
            enabled: config.violation_logging_enabled
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Records a denied attempt on a detached task.
    ///
    /// Returns the task handle so callers that care (tests, shutdown hooks)
    /// can wait for it; dropping the handle does not cancel the write.
    /// Returns `None` when logging is disabled or no tokio runtime is
    /// running, in which case the attempt is only logged locally.
    pub fn log_access_violation(
        &self,
        user_id: &str,
        attempted_tenant_id: &str,
        resource_name: &str,
        operation: &str
    ) -> Option<JoinHandle<()>> {
        if !self.enabled {
            return None;
        }

        counter!(
            "tenant_access_violations_total",
            "resource" => resource_name.to_string(),
            "operation" => operation.to_string()
        )
        .increment(1);

        let record = ViolationRecord::new(user_id, attempted_tenant_id, resource_name, operation);

        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                warn!(
                    user_id,
                    attempted_tenant_id,
                    resource_name,
                    operation,
                    "No async runtime, access violation not persisted"
                );
                return None;
            }
        };

        let sink = Arc::clone(&self.sink);
        Some(handle.spawn(async move {
            let sink_name = sink.sink_name();
            if let Err(e) = sink.record(record).await {
                counter!("tenant_violation_log_failures_total", "sink" => sink_name).increment(1);
                errors::swallow("violation_logger", e);
            }
        }))
    }
}

/// Writes violations to the structured log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingViolationSink;

#[async_trait]
impl ViolationSink for TracingViolationSink {
    fn sink_name(&self) -> &'static str {
        "tracing"
    }

    async fn record(&self, violation: ViolationRecord) -> Result<(), AuditError> {
        warn!(
            user_id = %violation.user_id,
            attempted_tenant_id = %violation.attempted_tenant_id,
            resource = %violation.resource_name,
            operation = %violation.operation,
            timestamp = %violation.timestamp,
            "Cross-tenant access denied"
        );
        Ok(())
    }
}
