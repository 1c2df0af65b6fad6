use super::subscription::SubscriptionSyncService;
use super::vm::VmSyncService;
use super::SyncEnv;
use crate::error::{Result, SyncError};
use std::collections::HashSet;
use std::sync::Arc;
use vmsync_cloud::FetchContext;
use vmsync_common::types::{AccountSyncFailure, AccountSyncSuccess, SyncReport};
use vmsync_storage::AccountRow;

pub const ACCOUNT_NOT_FOUND: &str = "account not found";

/// 多账号同步：每个账号一个任务，账号之间互不影响。
///
/// 账号内先同步订阅再同步 VM；任一步失败整个账号记为失败，
/// 但已经提交的订阅数据保留。
pub struct AccountSyncOrchestrator {
    env: SyncEnv,
    subscriptions: Arc<SubscriptionSyncService>,
    vms: Arc<VmSyncService>,
}

impl AccountSyncOrchestrator {
    pub fn new(env: SyncEnv) -> Self {
        Self {
            subscriptions: Arc::new(SubscriptionSyncService::new(env.clone())),
            vms: Arc::new(VmSyncService::new(env.clone())),
            env,
        }
    }

    /// 只有账号列表为空时返回错误，其余情况都体现在报告里
    pub async fn sync_many(
        &self,
        ctx: &FetchContext,
        user_id: &str,
        account_ids: &[String],
    ) -> Result<SyncReport> {
        let mut seen = HashSet::new();
        let account_ids: Vec<&String> = account_ids
            .iter()
            .filter(|id| !id.trim().is_empty() && seen.insert(id.as_str()))
            .collect();
        if account_ids.is_empty() {
            return Err(SyncError::InvalidRequest(
                "account id list is empty".to_string(),
            ));
        }

        let mut report = SyncReport::default();
        let mut accounts = Vec::with_capacity(account_ids.len());
        for account_id in account_ids {
            match self.env.store.get_account(account_id).await {
                Ok(Some(account)) if account.user_id == user_id => accounts.push(account),
                Ok(_) => report.failures.push(AccountSyncFailure {
                    account_id: account_id.clone(),
                    message: ACCOUNT_NOT_FOUND.to_string(),
                }),
                Err(e) => {
                    tracing::error!(account_id = %account_id, error = %e, "Failed to load account");
                    report.failures.push(AccountSyncFailure {
                        account_id: account_id.clone(),
                        message: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            user_id,
            accounts = accounts.len(),
            missing = report.failures.len(),
            "Starting account sync"
        );

        let mut tasks = Vec::with_capacity(accounts.len());
        for account in accounts {
            let account_id = account.id.clone();
            let env = self.env.clone();
            let subscriptions = Arc::clone(&self.subscriptions);
            let vms = Arc::clone(&self.vms);
            let ctx = ctx.child(None);

            let task = tokio::spawn(async move {
                let _guard = env.locks.acquire(&account.id).await;
                sync_one(&ctx, &subscriptions, &vms, &account).await
            });
            tasks.push((account_id, task));
        }

        for (account_id, task) in tasks {
            match task.await {
                Ok(Ok(success)) => report.successes.push(success),
                Ok(Err(e)) => {
                    tracing::warn!(account_id = %account_id, error = %e, "Account sync failed");
                    report.failures.push(AccountSyncFailure {
                        account_id,
                        message: e.to_string(),
                    });
                }
                Err(e) => {
                    tracing::error!(
                        account_id = %account_id,
                        error = %e,
                        "Account sync task panicked"
                    );
                    report.failures.push(AccountSyncFailure {
                        account_id,
                        message: format!("sync task aborted: {e}"),
                    });
                }
            }
        }

        tracing::info!(
            user_id,
            succeeded = report.successes.len(),
            failed = report.failures.len(),
            "Account sync finished"
        );
        Ok(report)
    }
}

async fn sync_one(
    ctx: &FetchContext,
    subscriptions: &SubscriptionSyncService,
    vms: &VmSyncService,
    account: &AccountRow,
) -> Result<AccountSyncSuccess> {
    let subs = subscriptions.sync_account(ctx, account).await?;
    let vm = vms.sync_account(ctx, account).await?;
    Ok(AccountSyncSuccess {
        account_id: account.id.clone(),
        message: format!(
            "synced {} subscriptions and {} virtual machines",
            subs.fetched, vm.stats.total_vms
        ),
        subscription_count: subs.fetched,
        vm_count: vm.stats.total_vms,
    })
}
