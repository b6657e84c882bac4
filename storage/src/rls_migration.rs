use config::{IsolationConfig, is_sql_identifier};
use sqlx::{AssertSqlSafe, PgPool};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum RlsMigrationError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Not a valid SQL identifier: {name}")]
    InvalidIdentifier { name: String }
}

/// Tables that received a tenant isolation policy, and the configured ones
/// that do not exist yet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RlsMigrationReport {
    pub protected: Vec<String>,
    pub skipped: Vec<String>
}

const SESSION_PROCEDURES: [&str; 3] = [
    "CREATE OR REPLACE FUNCTION set_tenant_context(p_tenant_id text, p_user_id text)
     RETURNS void LANGUAGE plpgsql AS $$
     BEGIN
         PERFORM set_config('app.tenant_id', p_tenant_id, true);
         PERFORM set_config('app.user_id', p_user_id, true);
     END;
     $$",
    "CREATE OR REPLACE FUNCTION clear_tenant_context()
     RETURNS void LANGUAGE plpgsql AS $$
     BEGIN
         PERFORM set_config('app.tenant_id', '', true);
         PERFORM set_config('app.user_id', '', true);
     END;
     $$",
    "CREATE OR REPLACE FUNCTION is_org_member(p_organization_id text, p_user_id text)
     RETURNS boolean LANGUAGE plpgsql STABLE SECURITY DEFINER AS $$
     BEGIN
         RETURN EXISTS (
             SELECT 1 FROM organization_members
             WHERE organization_id::text = p_organization_id
               AND user_id::text = p_user_id
               AND left_at IS NULL
         );
     END;
     $$"
];

const VIOLATION_TABLE: [&str; 2] = [
    "CREATE TABLE IF NOT EXISTS tenant_access_violations (
        id BIGSERIAL PRIMARY KEY,
        user_id TEXT NOT NULL,
        attempted_tenant_id TEXT NOT NULL,
        resource_name TEXT NOT NULL,
        operation TEXT NOT NULL,
        occurred_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )",
    "CREATE INDEX IF NOT EXISTS idx_tenant_access_violations_tenant_time
        ON tenant_access_violations(attempted_tenant_id, occurred_at DESC)"
];

/// Installs the session procedures, the violation table and a tenant
/// isolation policy on every table in `config.rls_tables`.
///
/// Idempotent. Configured tables that do not exist are skipped.
pub async fn run_rls_migration(
    pool: &PgPool,
    config: &IsolationConfig
) -> Result<RlsMigrationReport, RlsMigrationError> {
    if !is_sql_identifier(&config.tenant_column) {
        return Err(RlsMigrationError::InvalidIdentifier {
            name: config.tenant_column.clone()
        });
    }

    for statement in SESSION_PROCEDURES.iter().chain(VIOLATION_TABLE.iter()) {
        sqlx::query(AssertSqlSafe(*statement)).execute(pool).await?;
    }

    let mut report = RlsMigrationReport::default();
    for table in &config.rls_tables {
        if !is_sql_identifier(table) {
            return Err(RlsMigrationError::InvalidIdentifier {
                name: table.clone()
            });
        }

        if table_exists(pool, table).await? {
            enable_rls_for_table(pool, table, &config.tenant_column).await?;
            report.protected.push(table.clone());
        } else {
            warn!(table = %table, "RLS table does not exist, skipping");
            report.skipped.push(table.clone());
        }
    }

    info!(
        protected = report.protected.len(),
        skipped = report.skipped.len(),
        "RLS migration applied"
    );
    Ok(report)
}

async fn table_exists(pool: &PgPool, table: &str) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar("SELECT to_regclass($1) IS NOT NULL")
        .bind(table)
        .fetch_one(pool)
        .await
}

async fn enable_rls_for_table(pool: &PgPool, table: &str, column: &str) -> Result<(), sqlx::Error> {
    let enable_rls = format!("ALTER TABLE {} ENABLE ROW LEVEL SECURITY", table);
    sqlx::query(AssertSqlSafe(enable_rls.as_str()))
        .execute(pool)
        .await?;

    let policy_name = format!("{}_tenant_isolation", table);
    let drop_policy = format!("DROP POLICY IF EXISTS {} ON {}", policy_name, table);
    sqlx::query(AssertSqlSafe(drop_policy.as_str()))
        .execute(pool)
        .await?;

    // Active tenant, or any tenant the session's user is a member of.
    let create_policy = format!(
        "CREATE POLICY {policy} ON {table} FOR ALL USING (
            {column}::text = current_setting('app.tenant_id', true)
            OR is_org_member({column}::text, current_setting('app.user_id', true))
        )",
        policy = policy_name,
        table = table,
        column = column
    );
    sqlx::query(AssertSqlSafe(create_policy.as_str()))
        .execute(pool)
        .await?;

    Ok(())
}
