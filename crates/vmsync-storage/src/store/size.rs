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
use crate::entities::vm_size::{self, Column as SizeCol, Entity as SizeEntity};
use crate::error::Result;
use crate::reconcile::{ReconcileBudget, ReconcileOutcome, ReconcileTarget, RemovalPolicy};

/// 规格目录数据行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SizeRow {
    pub id: String,
    pub location: String,
    pub name: String,
    pub cores: i32,
    pub memory_gb: f64,
    pub max_data_disks: i32,
    pub os_disk_size_mb: i64,
    pub resource_disk_size_mb: i64,
    pub family: String,
    pub category: String,
    pub available: bool,
    pub last_sync_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn model_to_size(m: vm_size::Model) -> SizeRow {
    SizeRow {
        id: m.id,
        location: m.location,
        name: m.name,
        cores: m.cores,
        memory_gb: m.memory_gb,
        max_data_disks: m.max_data_disks,
        os_disk_size_mb: m.os_disk_size_mb,
        resource_disk_size_mb: m.resource_disk_size_mb,
        family: m.family,
        category: m.category,
        available: m.available,
        last_sync_at: to_utc(m.last_sync_at),
        created_at: to_utc(m.created_at),
        updated_at: to_utc(m.updated_at),
    }
}

/// 规格表的对账适配，作用域为区域
pub struct SizeTable;

#[async_trait]
impl ReconcileTarget for SizeTable {
    type Row = SizeRow;
    type Scope = String;

    const KIND: &'static str = "size";

    fn key(row: &SizeRow) -> String {
        row.name.to_lowercase()
    }

    fn is_removed(row: &SizeRow) -> bool {
        !row.available
    }

    async fn load_scope(&self, db: &DatabaseConnection, location: &String) -> Result<Vec<SizeRow>> {
        let models = SizeEntity::find()
            .filter(SizeCol::Location.eq(location.as_str()))
            .all(db)
            .await?;
        Ok(models.into_iter().map(model_to_size).collect())
    }

    async fn insert_batch(&self, txn: &DatabaseTransaction, rows: &[SizeRow]) -> Result<()> {
        let now = to_db(Utc::now());
        let models = rows.iter().map(|row| vm_size::ActiveModel {
            id: Set(vmsync_common::id::next_id()),
            location: Set(row.location.clone()),
            name: Set(row.name.clone()),
            cores: Set(row.cores),
            memory_gb: Set(row.memory_gb),
            max_data_disks: Set(row.max_data_disks),
            os_disk_size_mb: Set(row.os_disk_size_mb),
            resource_disk_size_mb: Set(row.resource_disk_size_mb),
            family: Set(row.family.clone()),
            category: Set(row.category.clone()),
            available: Set(true),
            last_sync_at: Set(now),
            created_at: Set(now),
            updated_at: Set(now),
        });
        SizeEntity::insert_many(models)
            .exec_without_returning(txn)
            .await?;
        Ok(())
    }

    async fn update_row(
        &self,
        txn: &DatabaseTransaction,
        existing: &SizeRow,
        fresh: &SizeRow,
        now: DateTime<Utc>,
    ) -> Result<()> {
        vm_size::ActiveModel {
            id: Unchanged(existing.id.clone()),
            cores: Set(fresh.cores),
            memory_gb: Set(fresh.memory_gb),
            max_data_disks: Set(fresh.max_data_disks),
            os_disk_size_mb: Set(fresh.os_disk_size_mb),
            resource_disk_size_mb: Set(fresh.resource_disk_size_mb),
            family: Set(fresh.family.clone()),
            category: Set(fresh.category.clone()),
            available: Set(true),
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
        rows: &[SizeRow],
        policy: RemovalPolicy,
        now: DateTime<Utc>,
    ) -> Result<u64> {
        if policy == RemovalPolicy::Retain {
            return Ok(0);
        }
        let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
        let res = SizeEntity::update_many()
            .col_expr(SizeCol::Available, Expr::value(false))
            .col_expr(SizeCol::UpdatedAt, Expr::value(to_db(now)))
            .filter(SizeCol::Id.is_in(ids))
            .exec(txn)
            .await?;
        Ok(res.rows_affected)
    }
}

impl SyncStore {
    // ---- sizes ----

    pub async fn reconcile_sizes(
        &self,
        location: &str,
        rows: Vec<SizeRow>,
        budget: &ReconcileBudget,
    ) -> Result<ReconcileOutcome> {
        self.reconciler
            .reconcile(
                self.db(),
                &SizeTable,
                &location.to_string(),
                rows,
                RemovalPolicy::Disable,
                budget,
            )
            .await
    }

    pub async fn list_sizes(
        &self,
        location: &str,
        available_only: bool,
        query: ListQuery,
    ) -> Result<ListResult<SizeRow>> {
        let mut base = SizeEntity::find().filter(SizeCol::Location.eq(location));
        if available_only {
            base = base.filter(SizeCol::Available.eq(true));
        }
        let total = base.clone().count(self.db()).await?;
        let models = base
            .order_by(SizeCol::Cores, Order::Asc)
            .order_by(SizeCol::Name, Order::Asc)
            .limit(query.limit)
            .offset(query.offset)
            .all(self.db())
            .await?;
        Ok(ListResult {
            items: models.into_iter().map(model_to_size).collect(),
            total,
        })
    }
}
