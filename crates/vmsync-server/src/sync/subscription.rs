use super::{budget_for, credential_for, SyncEnv};
use crate::error::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use vmsync_cloud::subscription::{SubscriptionFetcher, SubscriptionRecord};
use vmsync_cloud::FetchContext;
use vmsync_common::types::SubscriptionStatus;
use vmsync_storage::{AccountRow, ReconcileOutcome, SubscriptionRow};

/// 一次订阅同步的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionSyncSummary {
    /// 本次抓取到的订阅数
    pub fetched: usize,
    pub outcome: ReconcileOutcome,
}

pub struct SubscriptionSyncService {
    env: SyncEnv,
}

impl SubscriptionSyncService {
    pub fn new(env: SyncEnv) -> Self {
        Self { env }
    }

    /// 同步账号下全部订阅；未出现在本次抓取中的订阅被软删除
    pub async fn sync(
        &self,
        ctx: &FetchContext,
        user_id: &str,
        account_id: &str,
    ) -> Result<SubscriptionSyncSummary> {
        let account = self.env.authorize(user_id, account_id).await?;
        let _guard = self.env.locks.acquire(&account.id).await;
        self.sync_account(ctx, &account).await
    }

    /// 已授权且持有账号锁时调用
    pub(crate) async fn sync_account(
        &self,
        ctx: &FetchContext,
        account: &AccountRow,
    ) -> Result<SubscriptionSyncSummary> {
        let fetch_ctx = ctx.child(Some(self.env.settings.subscription_fetch_timeout()));
        let credential = credential_for(account);
        let fetcher = SubscriptionFetcher::new(self.env.connector.clone());

        let records = match fetcher.fetch(&fetch_ctx, &credential).await {
            Ok(records) => records,
            Err(e) => {
                tracing::error!(account_id = %account.id, error = %e, "Subscription fetch failed");
                self.env
                    .mark_status(&account.id, SubscriptionStatus::Error)
                    .await;
                return Err(e.into());
            }
        };

        let fetched = records.len();
        let rows = records
            .into_iter()
            .map(|record| to_row(&account.id, record))
            .collect();
        let outcome = self
            .env
            .store
            .reconcile_subscriptions(&account.id, rows, &budget_for(ctx))
            .await?;

        self.env
            .mark_status(&account.id, SubscriptionStatus::Normal)
            .await;
        tracing::info!(
            account_id = %account.id,
            fetched,
            inserted = outcome.inserted,
            updated = outcome.updated,
            removed = outcome.removed,
            "Subscriptions synced"
        );
        Ok(SubscriptionSyncSummary { fetched, outcome })
    }
}

fn to_row(account_id: &str, record: SubscriptionRecord) -> SubscriptionRow {
    let now = Utc::now();
    SubscriptionRow {
        id: String::new(),
        account_id: account_id.to_string(),
        subscription_id: record.subscription_id,
        display_name: record.display_name,
        state: record.state,
        policies: record.policies,
        authorization_source: record.authorization_source,
        subscription_type: record.subscription_type.as_str().to_string(),
        start_date: record.start_date,
        end_date: record.end_date,
        spending_limit: record.spending_limit,
        last_sync_at: now,
        deleted_at: None,
        created_at: now,
        updated_at: now,
    }
}
