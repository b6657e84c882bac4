use std::collections::BTreeSet;
use std::sync::Arc;

use context::{
    ContextManager, ContextResolver, DenialReason, GuardedRepository, ViolationLogger
};
use errors::{ResolutionError, TenancyError};
use tenant_core::{ContextOptions, Role, TenantFilter, TenantId, TenantScopedRepository};
use testing::{
    CountingRepository, InMemoryMembershipStore, RecordingViolationSink, RepositoryError,
    context_for, tenant, user
};

const UNIVERSE: [&str; 5] = ["t1", "t2", "t3", "t4", "t9"];

fn principal_with_two_memberships() -> ContextResolver<InMemoryMembershipStore> {
    let store = InMemoryMembershipStore::new();
    store.add_membership("u1", "t1", "member", 30);
    store.add_membership("u1", "t2", "member", 2);
    ContextResolver::new(Arc::new(store))
}

fn set(ids: &[&str]) -> BTreeSet<TenantId> {
    ids.iter().map(|id| tenant(id)).collect()
}

#[test]
fn test_strict_context_accepts_only_the_active_tenant() {
    for role in [Role::Member, Role::Admin] {
        let manager =
            ContextManager::from_context(context_for("u1", role, &["t2", "t1", "t3"], true));
        for candidate in UNIVERSE {
            let outcome = manager.validate_tenant_access(&tenant(candidate));
            assert_eq!(outcome.is_valid(), candidate == "t2", "{candidate}");
        }
    }
}

#[test]
fn test_permissive_member_accepts_exactly_the_accessible_set() {
    let accessible = ["t1", "t3"];
    let manager = ContextManager::from_context(context_for("u1", Role::Editor, &accessible, false));

    for candidate in UNIVERSE {
        let outcome = manager.validate_tenant_access(&tenant(candidate));
        assert_eq!(outcome.is_valid(), accessible.contains(&candidate), "{candidate}");
        if !outcome.is_valid() {
            assert!(matches!(outcome.error(), Some(DenialReason::AccessDenied { .. })));
        }
    }
}

#[test]
fn test_admin_can_access_every_tenant() {
    for strict in [false, true] {
        let manager =
            ContextManager::from_context(context_for("root", Role::Admin, &["t1"], strict));
        for candidate in UNIVERSE {
            assert!(manager.can_access_tenant(&tenant(candidate)));
        }
    }
}

#[test]
fn test_scoped_context_mirrors_can_access() {
    let manager =
        ContextManager::from_context(context_for("u1", Role::Member, &["t1", "t2"], false));
    let before = manager.context().cloned();

    for candidate in UNIVERSE {
        let scoped = manager.create_scoped_context(&tenant(candidate));
        assert_eq!(scoped.is_some(), manager.can_access_tenant(&tenant(candidate)));
        if let Some(scoped) = scoped {
            assert!(scoped.strict_mode());
            assert_eq!(scoped.tenant_id(), &tenant(candidate));
        }
    }

    let after = manager.context().cloned();
    assert_eq!(
        before.map(|c| (c.tenant_id().clone(), c.strict_mode())),
        after.map(|c| (c.tenant_id().clone(), c.strict_mode()))
    );
}

#[test]
fn test_hard_accessors_fail_before_initialization() {
    let mut manager = ContextManager::new();

    assert!(matches!(manager.tenant_id(), Err(TenancyError::NotInitialized { .. })));
    assert!(matches!(manager.user_id(), Err(TenancyError::NotInitialized { .. })));
    assert!(matches!(manager.tenant_filter(), Err(TenancyError::NotInitialized { .. })));

    manager.initialize(context_for("u1", Role::Member, &["t1"], false));
    assert!(manager.tenant_id().is_ok());

    manager.clear();
    assert!(matches!(manager.tenant_filter(), Err(TenancyError::NotInitialized { .. })));
}

#[tokio::test]
async fn test_zero_memberships_yield_no_context() {
    let resolver = ContextResolver::new(Arc::new(InMemoryMembershipStore::new()));

    for role in [Role::Member, Role::Admin] {
        let result = resolver
            .resolve_context(&user("ghost"), role, &ContextOptions::default())
            .await;
        assert!(matches!(result, Err(ResolutionError::NoMemberships { .. })));
    }
}

#[tokio::test]
async fn test_guarded_repository_without_context_never_reaches_delegate() {
    let manager = ContextManager::new();
    let repo = CountingRepository::new("assignments");
    let guarded = GuardedRepository::new(&manager, repo.clone());

    let result = guarded.list(&TenantFilter::AnyOf(set(&["t1", "t2"]))).await;

    assert!(matches!(
        result,
        Err(RepositoryError::Tenancy(TenancyError::ContextRequired { .. }))
    ));
    assert_eq!(repo.calls(), 0);
}

#[tokio::test]
async fn test_scenario_member_default_options() {
    let resolver = principal_with_two_memberships();
    let ctx = resolver
        .resolve_context(&user("u1"), Role::Member, &ContextOptions::default())
        .await
        .unwrap();

    assert_eq!(ctx.tenant_id(), &tenant("t1"));
    assert_eq!(ctx.accessible_tenants(), &set(&["t1", "t2"]));
    assert!(!ctx.strict_mode());

    let mut manager = ContextManager::new();
    manager.initialize(ctx);
    assert_eq!(manager.tenant_filter().unwrap(), TenantFilter::AnyOf(set(&["t1", "t2"])));
}

#[tokio::test]
async fn test_scenario_member_strict_mode() {
    let resolver = principal_with_two_memberships();
    let ctx = resolver
        .resolve_context(&user("u1"), Role::Member, &ContextOptions::strict())
        .await
        .unwrap();

    let mut manager = ContextManager::new();
    manager.initialize(ctx);

    assert_eq!(manager.tenant_filter().unwrap(), TenantFilter::Single(tenant("t1")));
    let outcome = manager.validate_tenant_access(&tenant("t2"));
    assert!(matches!(
        outcome.error(),
        Some(DenialReason::StrictModeMismatch { .. })
    ));
}

#[tokio::test]
async fn test_scenario_admin_override_outside_memberships() {
    let resolver = principal_with_two_memberships();
    let options = ContextOptions::default().with_override(tenant("t9"));

    let ctx = resolver
        .resolve_context(&user("u1"), Role::Admin, &options)
        .await
        .unwrap();

    assert_eq!(ctx.tenant_id(), &tenant("t9"));
}

#[tokio::test]
async fn test_scenario_member_override_outside_memberships() {
    let resolver = principal_with_two_memberships();
    let options = ContextOptions::default().with_override(tenant("t9"));

    let result = resolver
        .resolve_context(&user("u1"), Role::Member, &options)
        .await;

    assert_eq!(
        result.unwrap_err(),
        ResolutionError::AccessDenied {
            user_id: "u1".to_string(),
            tenant_id: "t9".to_string()
        }
    );
}

#[tokio::test]
async fn test_admin_scoped_operation_uses_nested_manager() {
    let sink = Arc::new(RecordingViolationSink::new());
    let outer = ContextManager::from_context(context_for("root", Role::Admin, &["t1"], false))
        .with_violation_logger(ViolationLogger::new(sink.clone()));
    let repo = CountingRepository::new("positions");

    let nested = outer.scoped(&tenant("t4")).unwrap();
    let guarded = GuardedRepository::new(&nested, repo.clone());

    assert!(guarded.get(&tenant("t4"), "p1").await.is_ok());
    assert!(guarded.get(&tenant("t1"), "p1").await.is_err());
    assert_eq!(repo.calls(), 1);

    sink.wait_for(1).await;
    assert_eq!(sink.records()[0].attempted_tenant_id, "t1");
    assert!(!outer.is_strict_mode());
}
