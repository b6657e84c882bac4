use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::counter;
use sqlx::{PgPool, Row};
use tenant_core::{Membership, MembershipStore, TenantId, UserId};
use thiserror::Error;
use tracing::debug;

use crate::{UNDEFINED_FUNCTION, has_sqlstate};

#[derive(Error, Debug)]
pub enum MembershipStoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Invalid {column} in membership row: {value:?}")]
    InvalidRow { column: &'static str, value: String }
}

/// Reads `organization_members` and `users.default_organization_id`.
#[derive(Clone)]
pub struct PgMembershipStore {
    pool: PgPool
}

impl PgMembershipStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn is_member_direct(
        &self,
        user_id: &UserId,
        tenant_id: &TenantId
    ) -> Result<bool, MembershipStoreError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (
                SELECT 1 FROM organization_members
                WHERE organization_id::text = $1 AND user_id::text = $2 AND left_at IS NULL
            )"
        )
        .bind(tenant_id.as_str())
        .bind(user_id.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }
}

fn parse_tenant(value: String) -> Result<TenantId, MembershipStoreError> {
    TenantId::new(value.clone()).ok_or(MembershipStoreError::InvalidRow {
        column: "organization_id",
        value
    })
}

fn parse_user(value: String) -> Result<UserId, MembershipStoreError> {
    UserId::new(value.clone()).ok_or(MembershipStoreError::InvalidRow {
        column: "user_id",
        value
    })
}

#[async_trait]
impl MembershipStore for PgMembershipStore {
    type Error = MembershipStoreError;

    async fn active_memberships(&self, user_id: &UserId) -> Result<Vec<Membership>, Self::Error> {
        let rows = sqlx::query(
            "SELECT organization_id::text AS organization_id, user_id::text AS user_id, role,
                    joined_at, left_at
             FROM organization_members
             WHERE user_id::text = $1 AND left_at IS NULL
             ORDER BY joined_at ASC"
        )
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        let memberships = rows
            .into_iter()
            .map(|row| -> Result<Membership, MembershipStoreError> {
                Ok(Membership {
                    tenant_id: parse_tenant(row.try_get("organization_id")?)?,
                    user_id: parse_user(row.try_get("user_id")?)?,
                    role: row.try_get("role")?,
                    joined_at: row.try_get::<DateTime<Utc>, _>("joined_at")?,
                    left_at: row.try_get::<Option<DateTime<Utc>>, _>("left_at")?
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        debug!(user_id = %user_id, count = memberships.len(), "Loaded memberships");
        Ok(memberships)
    }

    async fn default_tenant(&self, user_id: &UserId) -> Result<Option<TenantId>, Self::Error> {
        let value: Option<Option<String>> = sqlx::query_scalar(
            "SELECT default_organization_id::text FROM users WHERE id::text = $1"
        )
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        value.flatten().map(parse_tenant).transpose()
    }

    /// Uses the `is_org_member` procedure, falling back to a direct query
    /// when the database does not define it.
    async fn is_member(&self, user_id: &UserId, tenant_id: &TenantId) -> Result<bool, Self::Error> {
        let result: Result<bool, sqlx::Error> = sqlx::query_scalar("SELECT is_org_member($1, $2)")
            .bind(tenant_id.as_str())
            .bind(user_id.as_str())
            .fetch_one(&self.pool)
            .await;

        match result {
            Ok(is_member) => Ok(is_member),
            Err(e) if has_sqlstate(&e, UNDEFINED_FUNCTION) => {
                counter!("membership_check_fallbacks_total").increment(1);
                debug!("is_org_member not defined, using direct membership query");
                self.is_member_direct(user_id, tenant_id).await
            }
            Err(e) => Err(e.into())
        }
    }
}
