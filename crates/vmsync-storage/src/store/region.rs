use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ActiveValue::Unchanged, ColumnTrait, DatabaseConnection,
    DatabaseTransaction, EntityTrait, Order, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
};
use serde::{Deserialize, Serialize};
use vmsync_common::types::{ListQuery, ListResult};

use super::{to_db, to_utc, SyncStore};
use crate::entities::vm_region::{self, Column as RegionCol, Entity as RegionEntity};
use crate::error::Result;
use crate::reconcile::{ReconcileBudget, ReconcileOutcome, ReconcileTarget, RemovalPolicy};

/// 区域目录数据行
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionRow {
    pub id: String,
    pub name: String,
    pub display_name: String,
    pub regional_display_name: String,
    pub region_type: String,
    pub category: String,
    pub geography: String,
    pub geography_group: String,
    pub enabled: bool,
    pub last_sync_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn model_to_region(m: vm_region::Model) -> RegionRow {
    RegionRow {
        id: m.id,
        name: m.name,
        display_name: m.display_name,
        regional_display_name: m.regional_display_name,
        region_type: m.region_type,
        category: m.category,
        geography: m.geography,
        geography_group: m.geography_group,
        enabled: m.enabled,
        last_sync_at: to_utc(m.last_sync_at),
        created_at: to_utc(m.created_at),
        updated_at: to_utc(m.updated_at),
    }
}

/// 区域表的对账适配，全局作用域
pub struct RegionTable;

#[async_trait]
impl ReconcileTarget for RegionTable {
    type Row = RegionRow;
    type Scope = ();

    const KIND: &'static str = "region";

    fn key(row: &RegionRow) -> String {
        row.name.clone()
    }

    fn is_removed(row: &RegionRow) -> bool {
        !row.enabled
    }

    async fn load_scope(&self, db: &DatabaseConnection, _: &()) -> Result<Vec<RegionRow>> {
        let models = RegionEntity::find().all(db).await?;
        Ok(models.into_iter().map(model_to_region).collect())
    }

    async fn insert_batch(&self, txn: &DatabaseTransaction, rows: &[RegionRow]) -> Result<()> {
        let now = to_db(Utc::now());
        let models = rows.iter().map(|row| vm_region::ActiveModel {
            id: Set(vmsync_common::id::next_id()),
            name: Set(row.name.clone()),
            display_name: Set(row.display_name.clone()),
            regional_display_name: Set(row.regional_display_name.clone()),
            region_type: Set(row.region_type.clone()),
            category: Set(row.category.clone()),
            geography: Set(row.geography.clone()),
            geography_group: Set(row.geography_group.clone()),
            enabled: Set(true),
            last_sync_at: Set(now),
            created_at: Set(now),
            updated_at: Set(now),
        });
        RegionEntity::insert_many(models)
            .exec_without_returning(txn)
            .await?;
        Ok(())
    }

    async fn update_row(
        &self,
        txn: &DatabaseTransaction,
        existing: &RegionRow,
        fresh: &RegionRow,
        now: DateTime<Utc>,
    ) -> Result<()> {
        vm_region::ActiveModel {
            id: Unchanged(existing.id.clone()),
            display_name: Set(fresh.display_name.clone()),
            regional_display_name: Set(fresh.regional_display_name.clone()),
            region_type: Set(fresh.region_type.clone()),
            category: Set(fresh.category.clone()),
            geography: Set(fresh.geography.clone()),
            geography_group: Set(fresh.geography_group.clone()),
            enabled: Set(true),
            last_sync_at: Set(to_db(now)),
            updated_at: Set(to_db(now)),
            ..Default::default()
        }
        .update(txn)
        .await?;
        Ok(())
    }

    async fn mark_removed(
        &self,
        txn: &DatabaseTransaction,
        rows: &[RegionRow],
        policy: RemovalPolicy,
        now: DateTime<Utc>,
    ) -> Result<u64> {
        if policy == RemovalPolicy::Retain {
            return Ok(0);
        }
        let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
        let res = RegionEntity::update_many()
            .col_expr(RegionCol::Enabled, Expr::value(false))
            .col_expr(RegionCol::UpdatedAt, Expr::value(to_db(now)))
            .filter(RegionCol::Id.is_in(ids))
            .exec(txn)
            .await?;
        Ok(res.rows_affected)
    }
}

impl SyncStore {
    // ---- regions ----

    pub async fn reconcile_regions(
        &self,
        rows: Vec<RegionRow>,
        budget: &ReconcileBudget,
    ) -> Result<ReconcileOutcome> {
        self.reconciler
            .reconcile(self.db(), &RegionTable, &(), rows, RemovalPolicy::Disable, budget)
            .await
    }

    pub async fn list_regions(
        &self,
        enabled_only: bool,
        query: ListQuery,
    ) -> Result<ListResult<RegionRow>> {
        let mut base = RegionEntity::find();
        if enabled_only {
            base = base.filter(RegionCol::Enabled.eq(true));
        }
        let total = base.clone().count(self.db()).await?;
        let models = base
            .order_by(RegionCol::Name, Order::Asc)
            .limit(query.limit)
            .offset(query.offset)
            .all(self.db())
            .await?;
        Ok(ListResult {
            items: models.into_iter().map(model_to_region).collect(),
            total,
        })
    }

    pub async fn get_region(&self, name: &str) -> Result<Option<RegionRow>> {
        let model = RegionEntity::find()
            .filter(RegionCol::Name.eq(name))
            .one(self.db())
            .await?;
        Ok(model.map(model_to_region))
    }
}
