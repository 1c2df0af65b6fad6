use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ActiveValue::Unchanged, ColumnTrait, DatabaseConnection,
    DatabaseTransaction, EntityTrait, Order, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use vmsync_common::types::{ListQuery, ListResult};

use super::{to_db, to_utc, SyncStore};
use crate::entities::subscription::{self, Column as SubCol, Entity as SubEntity};
use crate::error::Result;
use crate::reconcile::{ReconcileBudget, ReconcileOutcome, ReconcileTarget, RemovalPolicy};

/// 订阅数据行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionRow {
    /// 本地行 ID；新抓取的行可留空，插入时生成
    pub id: String,
    pub account_id: String,
    pub subscription_id: String,
    pub display_name: String,
    pub state: String,
    pub policies: BTreeMap<String, String>,
    pub authorization_source: String,
    pub subscription_type: String,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub spending_limit: String,
    pub last_sync_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn model_to_subscription(m: subscription::Model) -> Result<SubscriptionRow> {
    Ok(SubscriptionRow {
        policies: serde_json::from_str(&m.policies)?,
        start_date: m.start_date.map(to_utc),
        end_date: m.end_date.map(to_utc),
        last_sync_at: to_utc(m.last_sync_at),
        deleted_at: m.deleted_at.map(to_utc),
        created_at: to_utc(m.created_at),
        updated_at: to_utc(m.updated_at),
        id: m.id,
        account_id: m.account_id,
        subscription_id: m.subscription_id,
        display_name: m.display_name,
        state: m.state,
        authorization_source: m.authorization_source,
        subscription_type: m.subscription_type,
        spending_limit: m.spending_limit,
    })
}

/// 订阅表的对账适配，作用域为单个账号
pub struct SubscriptionTable;

#[async_trait]
impl ReconcileTarget for SubscriptionTable {
    type Row = SubscriptionRow;
    type Scope = String;

    const KIND: &'static str = "subscription";

    fn key(row: &SubscriptionRow) -> String {
        row.subscription_id.clone()
    }

    fn is_removed(row: &SubscriptionRow) -> bool {
        row.deleted_at.is_some()
    }

    async fn load_scope(
        &self,
        db: &DatabaseConnection,
        account_id: &String,
    ) -> Result<Vec<SubscriptionRow>> {
        let models = SubEntity::find()
            .filter(SubCol::AccountId.eq(account_id.as_str()))
            .all(db)
            .await?;
        models.into_iter().map(model_to_subscription).collect()
    }

    async fn insert_batch(
        &self,
        txn: &DatabaseTransaction,
        rows: &[SubscriptionRow],
    ) -> Result<()> {
        let now = to_db(Utc::now());
        let mut models = Vec::with_capacity(rows.len());
        for row in rows {
            models.push(subscription::ActiveModel {
                id: Set(vmsync_common::id::next_id()),
                account_id: Set(row.account_id.clone()),
                subscription_id: Set(row.subscription_id.clone()),
                display_name: Set(row.display_name.clone()),
                state: Set(row.state.clone()),
                policies: Set(serde_json::to_string(&row.policies)?),
                authorization_source: Set(row.authorization_source.clone()),
                subscription_type: Set(row.subscription_type.clone()),
                start_date: Set(row.start_date.map(to_db)),
                end_date: Set(row.end_date.map(to_db)),
                spending_limit: Set(row.spending_limit.clone()),
                last_sync_at: Set(now),
                deleted_at: Set(None),
                created_at: Set(now),
                updated_at: Set(now),
            });
        }
        SubEntity::insert_many(models)
            .exec_without_returning(txn)
            .await?;
        Ok(())
    }

    async fn update_row(
        &self,
        txn: &DatabaseTransaction,
        existing: &SubscriptionRow,
        fresh: &SubscriptionRow,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let am = subscription::ActiveModel {
            id: Unchanged(existing.id.clone()),
            display_name: Set(fresh.display_name.clone()),
            state: Set(fresh.state.clone()),
            policies: Set(serde_json::to_string(&fresh.policies)?),
            authorization_source: Set(fresh.authorization_source.clone()),
            subscription_type: Set(fresh.subscription_type.clone()),
            start_date: Set(fresh.start_date.map(to_db)),
            end_date: Set(fresh.end_date.map(to_db)),
            spending_limit: Set(fresh.spending_limit.clone()),
            last_sync_at: Set(to_db(now)),
            deleted_at: Set(None),
            updated_at: Set(to_db(now)),
            ..Default::default()
        };
        am.update(txn).await?;
        Ok(())
    }

    async fn mark_removed(
        &self,
        txn: &DatabaseTransaction,
        rows: &[SubscriptionRow],
        policy: RemovalPolicy,
        now: DateTime<Utc>,
    ) -> Result<u64> {
        // 订阅没有启用标记，Disable 与 SoftDelete 同样处理
        if policy == RemovalPolicy::Retain {
            return Ok(0);
        }
        let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
        let res = SubEntity::update_many()
            .col_expr(SubCol::DeletedAt, Expr::value(Some(to_db(now))))
            .col_expr(SubCol::UpdatedAt, Expr::value(to_db(now)))
            .filter(SubCol::Id.is_in(ids))
            .exec(txn)
            .await?;
        Ok(res.rows_affected)
    }
}

impl SyncStore {
    // ---- subscriptions ----

    /// 用一次完整抓取结果对账某账号的订阅；未出现的订阅被软删除
    pub async fn reconcile_subscriptions(
        &self,
        account_id: &str,
        rows: Vec<SubscriptionRow>,
        budget: &ReconcileBudget,
    ) -> Result<ReconcileOutcome> {
        self.reconciler
            .reconcile(
                self.db(),
                &SubscriptionTable,
                &account_id.to_string(),
                rows,
                RemovalPolicy::SoftDelete,
                budget,
            )
            .await
    }

    /// 列出账号下的订阅（不含已软删除）
    pub async fn list_subscriptions(
        &self,
        account_id: &str,
        query: ListQuery,
    ) -> Result<ListResult<SubscriptionRow>> {
        let base = SubEntity::find()
            .filter(SubCol::AccountId.eq(account_id))
            .filter(SubCol::DeletedAt.is_null());
        let total = base.clone().count(self.db()).await?;
        let models = base
            .order_by(SubCol::SubscriptionId, Order::Asc)
            .limit(query.limit)
            .offset(query.offset)
            .all(self.db())
            .await?;
        let items = models
            .into_iter()
            .map(model_to_subscription)
            .collect::<Result<Vec<_>>>()?;
        Ok(ListResult { items, total })
    }

    /// 账号下全部有效订阅
    pub async fn active_subscriptions(&self, account_id: &str) -> Result<Vec<SubscriptionRow>> {
        let models = SubEntity::find()
            .filter(SubCol::AccountId.eq(account_id))
            .filter(SubCol::DeletedAt.is_null())
            .order_by(SubCol::SubscriptionId, Order::Asc)
            .all(self.db())
            .await?;
        models.into_iter().map(model_to_subscription).collect()
    }

    pub async fn get_active_subscription(
        &self,
        account_id: &str,
        subscription_id: &str,
    ) -> Result<Option<SubscriptionRow>> {
        let model = SubEntity::find()
            .filter(SubCol::AccountId.eq(account_id))
            .filter(SubCol::SubscriptionId.eq(subscription_id))
            .filter(SubCol::DeletedAt.is_null())
            .one(self.db())
            .await?;
        model.map(model_to_subscription).transpose()
    }

    pub async fn count_active_subscriptions(&self, account_id: &str) -> Result<u64> {
        let count = SubEntity::find()
            .filter(SubCol::AccountId.eq(account_id))
            .filter(SubCol::DeletedAt.is_null())
            .count(self.db())
            .await?;
        Ok(count)
    }
}
