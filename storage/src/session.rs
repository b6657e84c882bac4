use async_trait::async_trait;
use errors::SessionSyncError;
use sqlx::{PgPool, Postgres, Transaction};
use tenant_core::{SessionContextSync, TenantId, UserId};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, trace};

use crate::{UNDEFINED_FUNCTION, has_sqlstate};

type RequestTransaction = Transaction<'static, Postgres>;

/// Request-scoped binding of the `set_tenant_context` /
/// `clear_tenant_context` procedures.
///
/// The first `set_tenant_context` opens a transaction on a pooled connection
/// and keeps it for the rest of the request. The procedures set the marker
/// transaction-locally, so only statements run through
/// [`PgSessionSync::transaction`] see it. `clear_tenant_context` commits the
/// transaction; dropping the sync rolls it back. Either way the connection
/// goes back to the pool without a marker.
///
/// Create one per request. Sharing an instance shares the principal.
pub struct PgSessionSync {
    pool: PgPool,
    transaction: Mutex<Option<RequestTransaction>>
}

impl PgSessionSync {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            transaction: Mutex::new(None)
        }
    }

    /// The open request transaction, if the marker has been set.
    pub async fn transaction(&self) -> MutexGuard<'_, Option<RequestTransaction>> {
        self.transaction.lock().await
    }

    pub async fn is_bound(&self) -> bool {
        self.transaction.lock().await.is_some()
    }
}

fn map_error(procedure: &str, error: sqlx::Error) -> SessionSyncError {
    if has_sqlstate(&error, UNDEFINED_FUNCTION) {
        SessionSyncError::ProcedureUnavailable {
            procedure: procedure.to_string()
        }
    } else {
        SessionSyncError::ProcedureFailed {
            procedure: procedure.to_string(),
            reason: error.to_string()
        }
    }
}

#[async_trait]
impl SessionContextSync for PgSessionSync {
    async fn set_tenant_context(
        &self,
        tenant_id: &TenantId,
        user_id: &UserId
    ) -> Result<(), SessionSyncError> {
        let mut slot = self.transaction.lock().await;
        let mut tx = match slot.take() {
            Some(tx) => tx,
            None => self
                .pool
                .begin()
                .await
                .map_err(|e| map_error("set_tenant_context", e))?
        };

        // A failed call aborts the transaction, so it is rolled back on drop.
        sqlx::query("SELECT set_tenant_context($1, $2)")
            .bind(tenant_id.as_str())
            .bind(user_id.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_error("set_tenant_context", e))?;

        *slot = Some(tx);
        trace!(tenant_id = %tenant_id, "Request tenant marker set");
        Ok(())
    }

    async fn clear_tenant_context(&self) -> Result<(), SessionSyncError> {
        let Some(mut tx) = self.transaction.lock().await.take() else {
            return Ok(());
        };

        sqlx::query("SELECT clear_tenant_context()")
            .execute(&mut *tx)
            .await
            .map_err(|e| map_error("clear_tenant_context", e))?;
        tx.commit()
            .await
            .map_err(|e| map_error("clear_tenant_context", e))?;
        debug!("Request tenant marker released");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::postgres::PgPoolOptions;

    #[tokio::test]
    async fn test_clear_without_marker_touches_no_connection() {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unused")
            .unwrap();
        let sync = PgSessionSync::new(pool);

        assert!(sync.clear_tenant_context().await.is_ok());
        assert!(!sync.is_bound().await);
        assert!(sync.transaction().await.is_none());
    }
}
