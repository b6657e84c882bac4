use sqlx::{AssertSqlSafe, PgPool, postgres::PgRow};
use tenant_core::{TenantContext, TenantFilter};

/// Builds a query whose first parameter is always the tenant predicate.
///
/// Each query runs in its own transaction with `app.tenant_id` and
/// `app.user_id` set transaction-locally, so row-level security sees the
/// same principal as the application filter.
pub struct TenantQueryBuilder<'a> {
    pool: &'a PgPool,
    tenant_id: String,
    user_id: String,
    filter: TenantFilter,
    tenant_column: String,
    columns: String,
    table: String,
    conditions: Vec<String>,
    params: Vec<String>,
    order_by: Option<String>,
    limit: Option<u32>
}

macro_rules! bound_query {
    ($builder:expr, $sql:expr) => {{
        let mut query = sqlx::query(AssertSqlSafe($sql.as_str()));
        query = match &$builder.filter {
            TenantFilter::Single(tenant_id) => query.bind(tenant_id.as_str().to_string()),
            TenantFilter::AnyOf(_) => query.bind($builder.filter.bind_values())
        };
        for param in &$builder.params {
            query = query.bind(param.clone());
        }
        query
    }};
}

const SET_SESSION: &str =
    "SELECT set_config('app.tenant_id', $1, true), set_config('app.user_id', $2, true)";

impl<'a> TenantQueryBuilder<'a> {
    /// Scoped by `ctx.tenant_filter()`: the active tenant in strict mode,
    /// every accessible tenant otherwise.
    pub fn new(pool: &'a PgPool, ctx: &TenantContext) -> Self {
        Self {
            pool,
            tenant_id: ctx.tenant_id().to_string(),
            user_id: ctx.user_id().to_string(),
            filter: ctx.tenant_filter(),
            tenant_column: "organization_id".to_string(),
            columns: "*".to_string(),
            table: String::new(),
            conditions: Vec::new(),
            params: Vec::new(),
            order_by: None,
            limit: None
        }
    }

    pub fn tenant_column(mut self, column: &str) -> Self {
        self.tenant_column = column.to_string();
        self
    }

    pub fn select(mut self, columns: &str) -> Self {
        self.columns = columns.to_string();
        self
    }

    pub fn from(mut self, table: &str) -> Self {
        self.table = table.to_string();
        self
    }

    /// Adds an `AND` condition. Use [`TenantQueryBuilder::next_param`] for
    /// its placeholders and [`TenantQueryBuilder::bind`] for the values.
    pub fn where_clause(mut self, condition: &str) -> Self {
        self.conditions.push(condition.to_string());
        self
    }

    pub fn bind(mut self, value: impl Into<String>) -> Self {
        self.params.push(value.into());
        self
    }

    /// Placeholder number of the next bound value.
    pub fn next_param(&self) -> usize {
        self.params.len() + 2
    }

    pub fn order_by(mut self, order: &str) -> Self {
        self.order_by = Some(order.to_string());
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn tenant_filter(&self) -> &TenantFilter {
        &self.filter
    }

    pub fn build_query(&self) -> String {
        let mut query = format!(
            "SELECT {} FROM {} WHERE {}",
            self.columns,
            self.table,
            self.filter.sql_predicate(&self.tenant_column, 1)
        );
        for condition in &self.conditions {
            query = format!("{} AND {}", query, condition);
        }
        if let Some(order) = &self.order_by {
            query = format!("{} ORDER BY {}", query, order);
        }
        if let Some(limit) = self.limit {
            query = format!("{} LIMIT {}", query, limit);
        }
        query
    }

    pub async fn fetch_all(self) -> Result<Vec<PgRow>, sqlx::Error> {
        let sql = self.build_query();
        let mut tx = self.pool.begin().await?;
        sqlx::query(SET_SESSION)
            .bind(&self.tenant_id)
            .bind(&self.user_id)
            .execute(&mut *tx)
            .await?;
        let rows = bound_query!(self, sql).fetch_all(&mut *tx).await?;
        tx.commit().await?;
        Ok(rows)
    }

    pub async fn fetch_optional(self) -> Result<Option<PgRow>, sqlx::Error> {
        let sql = self.build_query();
        let mut tx = self.pool.begin().await?;
        sqlx::query(SET_SESSION)
            .bind(&self.tenant_id)
            .bind(&self.user_id)
            .execute(&mut *tx)
            .await?;
        let row = bound_query!(self, sql).fetch_optional(&mut *tx).await?;
        tx.commit().await?;
        Ok(row)
    }

    /// Number of rows the scoped query returns.
    pub async fn count(self) -> Result<i64, sqlx::Error> {
        let sql = format!("SELECT COUNT(*) FROM ({}) AS scoped", self.build_query());
        let mut tx = self.pool.begin().await?;
        sqlx::query(SET_SESSION)
            .bind(&self.tenant_id)
            .bind(&self.user_id)
            .execute(&mut *tx)
            .await?;
        let row = bound_query!(self, sql).fetch_one(&mut *tx).await?;
        tx.commit().await?;
        sqlx::Row::try_get(&row, 0)
    }
}
