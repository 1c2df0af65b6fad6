//! Per-kind sync services and the multi-account orchestrator.
//!
//! Every service follows the same chain: authorize the caller against the
//! account (and subscription), build a [`CredentialContext`], fetch, reconcile
//! and update the account's derived fields.

pub mod catalog;
pub mod dns;
pub mod lock;
pub mod orchestrator;
pub mod subscription;
pub mod vm;

use crate::config::SyncSettings;
use crate::error::{Result, SyncError};
use lock::AccountLocks;
use std::sync::Arc;
use vmsync_cloud::{ApiConnector, CredentialContext, FetchContext};
use vmsync_common::types::SubscriptionStatus;
use vmsync_storage::{AccountRow, ReconcileBudget, SubscriptionRow, SyncStore};

/// 对账沿用调用方的截止时间与取消信号
pub(crate) fn budget_for(ctx: &FetchContext) -> ReconcileBudget {
    ReconcileBudget::new(ctx.deadline(), ctx.cancel_token())
}

/// 同步服务共享的依赖
#[derive(Clone)]
pub struct SyncEnv {
    pub store: Arc<SyncStore>,
    pub connector: Arc<dyn ApiConnector>,
    pub settings: SyncSettings,
    pub locks: AccountLocks,
}

impl SyncEnv {
    pub fn new(
        store: Arc<SyncStore>,
        connector: Arc<dyn ApiConnector>,
        settings: SyncSettings,
    ) -> Self {
        Self {
            store,
            connector,
            settings,
            locks: AccountLocks::new(),
        }
    }

    /// 账号存在且属于 `user_id`
    pub(crate) async fn authorize(&self, user_id: &str, account_id: &str) -> Result<AccountRow> {
        let account = self
            .store
            .get_account(account_id)
            .await?
            .ok_or_else(|| SyncError::not_found("account", account_id))?;
        if account.user_id != user_id {
            tracing::warn!(user_id, account_id, "Account belongs to another user");
            return Err(SyncError::Unauthorized(format!(
                "account {account_id} does not belong to user {user_id}"
            )));
        }
        Ok(account)
    }

    /// 订阅存在、未删除且属于该账号
    pub(crate) async fn authorize_subscription(
        &self,
        account: &AccountRow,
        subscription_id: &str,
    ) -> Result<SubscriptionRow> {
        self.store
            .get_active_subscription(&account.id, subscription_id)
            .await?
            .ok_or_else(|| SyncError::not_found("subscription", subscription_id))
    }

    /// 状态标记失败只记录日志
    pub(crate) async fn mark_status(&self, account_id: &str, status: SubscriptionStatus) {
        if let Err(e) = self.store.update_subscription_status(account_id, status).await {
            tracing::error!(
                account_id,
                status = %status,
                error = %e,
                "Failed to update account subscription status"
            );
        }
    }
}

pub(crate) fn credential_for(account: &AccountRow) -> CredentialContext {
    CredentialContext::new(
        account.tenant_id.clone(),
        account.client_id.clone(),
        account.client_secret.clone(),
        account.display_name.clone(),
    )
}
