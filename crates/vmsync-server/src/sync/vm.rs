use super::{budget_for, credential_for, SyncEnv};
use crate::error::{Result, SyncError};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use vmsync_cloud::vm::{VmFetcher, VmRecord};
use vmsync_cloud::{CloudError, CredentialContext, FetchContext};
use vmsync_common::types::{SubscriptionStatus, SyncStats};
use vmsync_storage::{AccountRow, ReconcileOutcome, SubscriptionRow, VmRow, VmScope};

/// 一次 VM 同步的结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmSyncSummary {
    pub stats: SyncStats,
    pub outcome: ReconcileOutcome,
    /// 同步后账号缓存的 VM 数
    pub account_vm_count: i64,
}

pub struct VmSyncService {
    env: SyncEnv,
}

impl VmSyncService {
    pub fn new(env: SyncEnv) -> Self {
        Self { env }
    }

    /// 同步单个订阅的 VM。订阅内没有 VM 时返回 `no valid VM records found`
    pub async fn sync(
        &self,
        ctx: &FetchContext,
        user_id: &str,
        account_id: &str,
        subscription_id: &str,
    ) -> Result<VmSyncSummary> {
        let account = self.env.authorize(user_id, account_id).await?;
        let subscription = self
            .env
            .authorize_subscription(&account, subscription_id)
            .await?;
        let _guard = self.env.locks.acquire(&account.id).await;

        let credential = credential_for(&account);
        let synced = self
            .sync_subscription(ctx, &account, &credential, &subscription)
            .await;
        let (stats, outcome) = match synced {
            Ok(res) => res,
            Err(e) => {
                self.env
                    .mark_status(&account.id, SubscriptionStatus::Error)
                    .await;
                return Err(e);
            }
        };
        self.finish(&account, stats, outcome).await
    }

    /// 同步账号下全部有效订阅的 VM。
    ///
    /// 没有 VM 的订阅计为 0 台且不参与对账；其他抓取错误终止整个账号。
    /// 已授权且持有账号锁时调用。
    pub(crate) async fn sync_account(
        &self,
        ctx: &FetchContext,
        account: &AccountRow,
    ) -> Result<VmSyncSummary> {
        let subscriptions = self.env.store.active_subscriptions(&account.id).await?;
        let credential = credential_for(account);

        let mut stats = SyncStats::default();
        let mut outcome = ReconcileOutcome::default();
        for subscription in &subscriptions {
            match self
                .sync_subscription(ctx, account, &credential, subscription)
                .await
            {
                Ok((sub_stats, sub_outcome)) => {
                    stats.total_vms += sub_stats.total_vms;
                    stats.running_vms += sub_stats.running_vms;
                    stats.stopped_vms += sub_stats.stopped_vms;
                    outcome.inserted += sub_outcome.inserted;
                    outcome.updated += sub_outcome.updated;
                    outcome.removed += sub_outcome.removed;
                }
                Err(SyncError::Fetch(CloudError::NoRecords(_))) => {
                    tracing::info!(
                        account_id = %account.id,
                        subscription_id = %subscription.subscription_id,
                        "Subscription has no virtual machines"
                    );
                }
                Err(e) => {
                    self.env
                        .mark_status(&account.id, SubscriptionStatus::Error)
                        .await;
                    return Err(e);
                }
            }
        }

        self.finish(account, stats, outcome).await
    }

    async fn sync_subscription(
        &self,
        ctx: &FetchContext,
        account: &AccountRow,
        credential: &CredentialContext,
        subscription: &SubscriptionRow,
    ) -> Result<(SyncStats, ReconcileOutcome)> {
        let fetch_ctx = ctx.child(Some(self.env.settings.vm_fetch_timeout()));
        let fetcher = VmFetcher::new(self.env.connector.clone(), self.env.settings.max_concurrent);

        let records = fetcher
            .fetch(&fetch_ctx, credential, &subscription.subscription_id)
            .await
            .map_err(|e| {
                tracing::error!(
                    account_id = %account.id,
                    subscription_id = %subscription.subscription_id,
                    error = %e,
                    "VM fetch failed"
                );
                SyncError::from(e)
            })?;

        let stats = SyncStats::from_power_states(records.iter().map(|r| r.power_state));
        let rows = records
            .into_iter()
            .map(|record| to_row(&account.id, record))
            .collect();
        let scope = VmScope::subscription(&account.id, &subscription.subscription_id);
        let outcome = self
            .env
            .store
            .reconcile_vms(&scope, rows, self.env.settings.vm_removal, &budget_for(ctx))
            .await?;

        tracing::info!(
            account_id = %account.id,
            subscription_id = %subscription.subscription_id,
            total = stats.total_vms,
            running = stats.running_vms,
            stopped = stats.stopped_vms,
            inserted = outcome.inserted,
            updated = outcome.updated,
            removed = outcome.removed,
            "Virtual machines synced"
        );
        Ok((stats, outcome))
    }

    async fn finish(
        &self,
        account: &AccountRow,
        stats: SyncStats,
        outcome: ReconcileOutcome,
    ) -> Result<VmSyncSummary> {
        let count = self.env.store.count_account_vms(&account.id).await?;
        let account_vm_count = i64::try_from(count).unwrap_or(i64::MAX);
        self.env
            .store
            .update_vm_count(&account.id, account_vm_count)
            .await?;
        self.env
            .mark_status(&account.id, SubscriptionStatus::Normal)
            .await;
        Ok(VmSyncSummary {
            stats,
            outcome,
            account_vm_count,
        })
    }
}

fn to_row(account_id: &str, record: VmRecord) -> VmRow {
    let now = Utc::now();
    VmRow {
        id: String::new(),
        vm_id: record.vm_id,
        account_id: account_id.to_string(),
        subscription_id: record.subscription_id,
        name: record.name,
        resource_group: record.resource_group,
        location: record.location,
        vm_size: record.vm_size,
        provisioning_state: record.provisioning_state,
        power_state: record.power_state,
        private_ips: record.private_ips,
        public_ips: record.public_ips,
        public_ip_name: record.public_ip_name,
        os_type: record.os_type,
        os_image: record.os_image,
        cores: record.cores,
        memory_gb: record.memory_gb,
        dns_alias: record.dns_alias,
        os_disk_size_gb: record.os_disk_size_gb,
        data_disks: record.data_disks,
        tags: record.tags,
        sync_status: String::new(),
        last_sync_at: now,
        remote_created_at: record.created_at,
        deleted_at: None,
        created_at: now,
        updated_at: now,
    }
}
