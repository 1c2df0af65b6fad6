mod common;

use common::{build_test_context, FakeTenant};
use std::time::Duration;
use vmsync_cloud::FetchContext;
use vmsync_common::types::{ListQuery, SubscriptionStatus};
use vmsync_server::sync::orchestrator::ACCOUNT_NOT_FOUND;
use vmsync_server::{AccountSyncOrchestrator, SyncError};
use vmsync_storage::VmFilter;

fn ctx() -> FetchContext {
    FetchContext::with_timeout(Duration::from_secs(30))
}

#[tokio::test]
async fn should_isolate_account_failures_when_syncing_many() {
    let tc = build_test_context().await.unwrap();
    tc.cloud.add_tenant(
        "tenant-x",
        FakeTenant::default()
            .with_subscription("sub-x1", "PayAsYouGo_2014-09-01")
            .with_vms("sub-x1", &[("web", "running"), ("db", "deallocated")]),
    );
    tc.cloud.add_tenant(
        "tenant-y",
        FakeTenant {
            fail_subscriptions: true,
            ..FakeTenant::default()
        },
    );
    let x = tc.add_account("u1", "x@example.com", "tenant-x").await.unwrap();
    let y = tc.add_account("u1", "y@example.com", "tenant-y").await.unwrap();

    let orchestrator = AccountSyncOrchestrator::new(tc.default_env());
    let report = orchestrator
        .sync_many(&ctx(), "u1", &[x.id.clone(), y.id.clone()])
        .await
        .unwrap();

    assert_eq!(report.successes.len(), 1);
    let success = &report.successes[0];
    assert_eq!(success.account_id, x.id);
    assert_eq!(success.subscription_count, 1);
    assert_eq!(success.vm_count, 2);
    assert_eq!(success.message, "synced 1 subscriptions and 2 virtual machines");

    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].account_id, y.id);
    assert!(!report.is_fully_successful());

    let x_after = tc.store.get_account(&x.id).await.unwrap().unwrap();
    assert_eq!(x_after.subscription_status, SubscriptionStatus::Normal);
    assert_eq!(x_after.vm_count, 2);
    let vms = tc
        .store
        .list_vms(
            &VmFilter {
                account_id: x.id.clone(),
                ..VmFilter::default()
            },
            ListQuery::default(),
        )
        .await
        .unwrap();
    assert_eq!(vms.total, 2);

    let y_after = tc.store.get_account(&y.id).await.unwrap().unwrap();
    assert_eq!(y_after.subscription_status, SubscriptionStatus::Error);
    assert_eq!(y_after.vm_count, 0);
}

#[tokio::test]
async fn should_report_account_not_found_when_account_missing_or_foreign() {
    let tc = build_test_context().await.unwrap();
    tc.cloud.add_tenant(
        "tenant-x",
        FakeTenant::default().with_subscription("sub-x1", "PayAsYouGo_2014-09-01"),
    );
    let x = tc.add_account("u1", "x@example.com", "tenant-x").await.unwrap();

    let orchestrator = AccountSyncOrchestrator::new(tc.default_env());
    let report = orchestrator
        .sync_many(&ctx(), "u2", &[x.id.clone(), "missing".to_string()])
        .await
        .unwrap();

    assert!(report.successes.is_empty());
    assert_eq!(report.failures.len(), 2);
    assert!(report
        .failures
        .iter()
        .all(|f| f.message == ACCOUNT_NOT_FOUND));
    assert_eq!(tc.cloud.connects(), 0);

    let untouched = tc.store.get_account(&x.id).await.unwrap().unwrap();
    assert_eq!(untouched.subscription_status, SubscriptionStatus::Normal);
}

#[tokio::test]
async fn should_reject_request_when_account_list_is_empty() {
    let tc = build_test_context().await.unwrap();
    let orchestrator = AccountSyncOrchestrator::new(tc.default_env());

    let err = orchestrator.sync_many(&ctx(), "u1", &[]).await.unwrap_err();
    assert!(matches!(err, SyncError::InvalidRequest(_)));

    let err = orchestrator
        .sync_many(&ctx(), "u1", &["  ".to_string()])
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::InvalidRequest(_)));
}

#[tokio::test]
async fn should_sync_duplicate_account_ids_once() {
    let tc = build_test_context().await.unwrap();
    tc.cloud.add_tenant(
        "tenant-x",
        FakeTenant::default()
            .with_subscription("sub-x1", "PayAsYouGo_2014-09-01")
            .with_vms("sub-x1", &[("web", "running")]),
    );
    let x = tc.add_account("u1", "x@example.com", "tenant-x").await.unwrap();

    let orchestrator = AccountSyncOrchestrator::new(tc.default_env());
    let report = orchestrator
        .sync_many(&ctx(), "u1", &[x.id.clone(), x.id.clone()])
        .await
        .unwrap();

    assert_eq!(report.successes.len(), 1);
    assert!(report.failures.is_empty());
}

#[tokio::test]
async fn should_keep_subscriptions_when_vm_sync_fails() {
    let tc = build_test_context().await.unwrap();
    tc.cloud.add_tenant(
        "tenant-x",
        FakeTenant {
            fail_vms: true,
            ..FakeTenant::default().with_subscription("sub-x1", "MSDN_2014-09-01")
        },
    );
    let x = tc.add_account("u1", "x@example.com", "tenant-x").await.unwrap();

    let orchestrator = AccountSyncOrchestrator::new(tc.default_env());
    let report = orchestrator
        .sync_many(&ctx(), "u1", &[x.id.clone()])
        .await
        .unwrap();

    assert!(report.successes.is_empty());
    assert_eq!(report.failures.len(), 1);
    assert!(report.failures[0].message.contains("compute listing unavailable"));

    let subs = tc
        .store
        .list_subscriptions(&x.id, ListQuery::default())
        .await
        .unwrap();
    assert_eq!(subs.total, 1);
    assert_eq!(subs.items[0].subscription_id, "sub-x1");

    let after = tc.store.get_account(&x.id).await.unwrap().unwrap();
    assert_eq!(after.subscription_status, SubscriptionStatus::Error);
}

#[tokio::test]
async fn should_succeed_with_zero_vms_when_subscription_is_empty() {
    let tc = build_test_context().await.unwrap();
    tc.cloud.add_tenant(
        "tenant-x",
        FakeTenant::default().with_subscription("sub-x1", "PayAsYouGo_2014-09-01"),
    );
    let x = tc.add_account("u1", "x@example.com", "tenant-x").await.unwrap();

    let orchestrator = AccountSyncOrchestrator::new(tc.default_env());
    let report = orchestrator
        .sync_many(&ctx(), "u1", &[x.id.clone()])
        .await
        .unwrap();

    assert!(report.is_fully_successful());
    assert_eq!(report.successes[0].vm_count, 0);
    let after = tc.store.get_account(&x.id).await.unwrap().unwrap();
    assert_eq!(after.vm_count, 0);
    assert_eq!(after.subscription_status, SubscriptionStatus::Normal);
}

#[tokio::test]
async fn should_fail_account_when_every_vm_fails_enrichment() {
    let tc = build_test_context().await.unwrap();
    tc.cloud.add_tenant(
        "tenant-x",
        FakeTenant {
            fail_instance_views: true,
            ..FakeTenant::default()
                .with_subscription("sub-x1", "PayAsYouGo_2014-09-01")
                .with_vms(
                    "sub-x1",
                    &[("vm-a", "running"), ("vm-b", "running"), ("vm-c", "deallocated")],
                )
        },
    );
    let x = tc.add_account("u1", "x@example.com", "tenant-x").await.unwrap();

    let orchestrator = AccountSyncOrchestrator::new(tc.default_env());
    let report = orchestrator
        .sync_many(&ctx(), "u1", &[x.id.clone()])
        .await
        .unwrap();

    assert!(report.successes.is_empty());
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].account_id, x.id);
    assert!(report.failures[0].message.contains("AuthorizationFailed"));

    let after = tc.store.get_account(&x.id).await.unwrap().unwrap();
    assert_eq!(after.subscription_status, SubscriptionStatus::Error);
    assert_eq!(after.vm_count, 0);
}
