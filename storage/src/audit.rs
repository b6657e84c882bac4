use async_trait::async_trait;
use errors::AuditError;
use sqlx::PgPool;
use tenant_core::{ViolationRecord, ViolationSink};

use crate::{UNDEFINED_TABLE, has_sqlstate};

/// Appends violation records to `tenant_access_violations`.
#[derive(Clone)]
pub struct PgViolationSink {
    pool: PgPool
}

impl PgViolationSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ViolationSink for PgViolationSink {
    fn sink_name(&self) -> &'static str {
        "postgres"
    }

    async fn record(&self, violation: ViolationRecord) -> Result<(), AuditError> {
        sqlx::query(
            "INSERT INTO tenant_access_violations
                (user_id, attempted_tenant_id, resource_name, operation, occurred_at)
             VALUES ($1, $2, $3, $4, $5)"
        )
        .bind(&violation.user_id)
        .bind(&violation.attempted_tenant_id)
        .bind(&violation.resource_name)
        .bind(&violation.operation)
        .bind(violation.timestamp)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if has_sqlstate(&e, UNDEFINED_TABLE) {
                AuditError::SinkUnavailable {
                    sink: self.sink_name().to_string(),
                    reason: e.to_string()
                }
            } else {
                AuditError::WriteFailed {
                    sink: self.sink_name().to_string(),
                    reason: e.to_string()
                }
            }
        })?;
        Ok(())
    }
}
