use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Global role of an authenticated principal.
///
/// `Admin` is a platform-wide override: an admin may act as any tenant, with
/// or without a membership.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    Viewer,
    Member,
    Editor,
    Manager,
    Admin
}

impl Role {
    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    pub fn new(id: String) -> Option<Self> {
        if id.is_empty() || id.len() > 100 {
            None
        } else {
            Some(Self(id))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl std::fmt::Display for TenantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for TenantId {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string()).ok_or_else(|| anyhow::anyhow!("Invalid tenant ID: {s:?}"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: String) -> Option<Self> {
        if id.is_empty() || id.len() > 100 {
            None
        } else {
            Some(Self(id))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for UserId {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string()).ok_or_else(|| anyhow::anyhow!("Invalid user ID: {s:?}"))
    }
}

/// A row of the membership store.
///
/// `left_at` set means the membership was revoked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Membership {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub role: String,
    pub joined_at: DateTime<Utc>,
    pub left_at: Option<DateTime<Utc>>
}

impl Membership {
    pub fn is_active(&self) -> bool {
        self.left_at.is_none()
    }
}

/// A membership after primary-tenant resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedMembership {
    pub tenant_id: TenantId,
    pub role: String,
    pub is_primary: bool
}

/// Inputs to context resolution. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextOptions {
    pub strict_mode: Option<bool>,
    pub override_tenant_id: Option<TenantId>
}

impl ContextOptions {
    pub fn strict() -> Self {
        Self {
            strict_mode: Some(true),
            override_tenant_id: None
        }
    }

    #[must_use]
    pub fn with_strict_mode(mut self, strict: bool) -> Self {
        self.strict_mode = Some(strict);
        self
    }

    #[must_use]
    pub fn with_override(mut self, tenant_id: TenantId) -> Self {
        self.override_tenant_id = Some(tenant_id);
        self
    }
}

/// Authorization context for one request.
///
/// Immutable once built: every field is private and there are no setters.
/// A narrower context is obtained by deriving a new value, see
/// [`TenantContext::scoped_to`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantContext {
    tenant_id: TenantId,
    user_id: UserId,
    role: Role,
    accessible_tenants: BTreeSet<TenantId>,
    strict_mode: bool
}

impl TenantContext {
    pub fn new(
        tenant_id: TenantId,
        user_id: UserId,
        role: Role,
        accessible_tenants: BTreeSet<TenantId>,
        strict_mode: bool
    ) -> Self {
        Self {
            tenant_id,
            user_id,
            role,
            accessible_tenants,
            strict_mode
        }
    }

    pub fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn role(&self) -> &Role {
        &self.role
    }

    pub fn accessible_tenants(&self) -> &BTreeSet<TenantId> {
        &self.accessible_tenants
    }

    pub fn strict_mode(&self) -> bool {
        self.strict_mode
    }

    /// Admins may access every tenant; everybody else only their memberships.
    pub fn can_access(&self, tenant_id: &TenantId) -> bool {
        self.role.is_admin() || self.accessible_tenants.contains(tenant_id)
    }

    /// Copy of this context pinned to `tenant_id` in strict mode.
    ///
    /// Performs no access check; callers go through the context manager.
    #[must_use]
    pub fn scoped_to(&self, tenant_id: TenantId) -> Self {
        Self {
            tenant_id,
            user_id: self.user_id.clone(),
            role: self.role.clone(),
            accessible_tenants: self.accessible_tenants.clone(),
            strict_mode: true
        }
    }

    /// The tenant predicate repositories must apply.
    pub fn tenant_filter(&self) -> TenantFilter {
        if self.strict_mode {
            TenantFilter::Single(self.tenant_id.clone())
        } else {
            TenantFilter::AnyOf(self.accessible_tenants.clone())
        }
    }
}

/// Tenant scope for a repository query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind", content = "tenants")]
pub enum TenantFilter {
    Single(TenantId),
    AnyOf(BTreeSet<TenantId>)
}

impl TenantFilter {
    pub fn contains(&self, tenant_id: &TenantId) -> bool {
        match self {
            TenantFilter::Single(id) => id == tenant_id,
            TenantFilter::AnyOf(ids) => ids.contains(tenant_id)
        }
    }

    pub fn is_single(&self) -> bool {
        matches!(self, TenantFilter::Single(_))
    }

    pub fn tenant_ids(&self) -> Vec<&TenantId> {
        match self {
            TenantFilter::Single(id) => vec![id],
            TenantFilter::AnyOf(ids) => ids.iter().collect()
        }
    }

    /// SQL predicate on `column` using positional parameter `$param`.
    ///
    /// A single tenant binds a text value, a set binds a text array.
    pub fn sql_predicate(&self, column: &str, param: usize) -> String {
        match self {
            TenantFilter::Single(_) => format!("{column} = ${param}"),
            TenantFilter::AnyOf(_) => format!("{column} = ANY(${param})")
        }
    }

    pub fn bind_values(&self) -> Vec<String> {
        self.tenant_ids()
            .into_iter()
            .map(|id| id.as_str().to_string())
            .collect()
    }
}

/// A denied cross-tenant attempt. Write-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViolationRecord {
    pub user_id: String,
    pub attempted_tenant_id: String,
    pub resource_name: String,
    pub operation: String,
    pub timestamp: DateTime<Utc>
}

impl ViolationRecord {
    pub fn new(
        user_id: &str,
        attempted_tenant_id: &str,
        resource_name: &str,
        operation: &str
    ) -> Self {
        Self {
            user_id: user_id.to_string(),
            attempted_tenant_id: attempted_tenant_id.to_string(),
            resource_name: resource_name.to_string(),
            operation: operation.to_string(),
            timestamp: Utc::now()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn tid(id: &str) -> TenantId {
        TenantId::new(id.to_string()).unwrap()
    }

    fn ctx(role: Role, tenants: &[&str], strict: bool) -> TenantContext {
        TenantContext::new(
            tid(tenants[0]),
            UserId::new("u1".to_string()).unwrap(),
            role,
            tenants.iter().map(|t| tid(t)).collect(),
            strict
        )
    }

    #[test]
    fn test_tenant_id_validation() {
        assert!(TenantId::new("acme".to_string()).is_some());
        assert!(TenantId::new(String::new()).is_none());
        assert!(TenantId::new("a".repeat(100)).is_some());
        assert!(TenantId::new("a".repeat(101)).is_none());
        assert!(TenantId::from_str("").is_err());
        assert!(UserId::from_str("").is_err());
    }

    #[test]
    fn test_role_parses_lowercase() {
        assert_eq!(Role::from_str("admin").unwrap(), Role::Admin);
        assert_eq!(Role::from_str("member").unwrap(), Role::Member);
        assert_eq!(Role::Manager.to_string(), "manager");
        assert!(Role::from_str("root").is_err());
        assert!(Role::Admin.is_admin());
        assert!(!Role::Manager.is_admin());
    }

    #[test]
    fn test_can_access_member_and_admin() {
        let member = ctx(Role::Member, &["t1", "t2"], false);
        assert!(member.can_access(&tid("t2")));
        assert!(!member.can_access(&tid("t9")));

        let admin = ctx(Role::Admin, &["t1"], false);
        assert!(admin.can_access(&tid("t9")));
    }

    #[test]
    fn test_scoped_to_forces_strict_and_keeps_source() {
        let source = ctx(Role::Member, &["t1", "t2"], false);
        let scoped = source.scoped_to(tid("t2"));

        assert_eq!(scoped.tenant_id(), &tid("t2"));
        assert!(scoped.strict_mode());
        assert_eq!(scoped.user_id(), source.user_id());
        assert_eq!(source.tenant_id(), &tid("t1"));
        assert!(!source.strict_mode());
    }

    #[test]
    fn test_tenant_filter_follows_mode() {
        let permissive = ctx(Role::Member, &["t1", "t2"], false).tenant_filter();
        assert!(!permissive.is_single());
        assert!(permissive.contains(&tid("t2")));
        assert_eq!(permissive.sql_predicate("tenant_id", 1), "tenant_id = ANY($1)");
        assert_eq!(permissive.bind_values(), vec!["t1", "t2"]);

        let strict = ctx(Role::Member, &["t1", "t2"], true).tenant_filter();
        assert_eq!(strict, TenantFilter::Single(tid("t1")));
        assert!(!strict.contains(&tid("t2")));
        assert_eq!(strict.sql_predicate("organization_id", 3), "organization_id = $3");
    }

    #[test]
    fn test_membership_active() {
        let mut membership = Membership {
            tenant_id: tid("t1"),
            user_id: UserId::new("u1".to_string()).unwrap(),
            role: "member".to_string(),
            joined_at: Utc::now(),
            left_at: None
        };
        assert!(membership.is_active());
        membership.left_at = Some(Utc::now());
        assert!(!membership.is_active());
    }

    #[test]
    fn test_context_serializes_camel_case() {
        let json = serde_json::to_value(ctx(Role::Member, &["t1"], true)).unwrap();
        assert_eq!(json["tenantId"], "t1");
        assert_eq!(json["strictMode"], true);
        assert_eq!(json["role"], "member");
    }
}
