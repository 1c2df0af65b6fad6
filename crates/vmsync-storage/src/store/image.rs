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
use crate::entities::vm_image::{self, Column as ImageCol, Entity as ImageEntity};
use crate::error::Result;
use crate::reconcile::{ReconcileBudget, ReconcileOutcome, ReconcileTarget, RemovalPolicy};

/// 镜像目录数据行
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRow {
    pub id: String,
    pub location: String,
    pub publisher: String,
    pub offer: String,
    pub sku: String,
    pub version: String,
    pub os_type: String,
    pub display_name: String,
    pub enabled: bool,
    pub last_sync_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ImageRow {
    /// `publisher:offer:sku`
    pub fn catalog_key(&self) -> String {
        format!("{}:{}:{}", self.publisher, self.offer, self.sku).to_lowercase()
    }
}

fn model_to_image(m: vm_image::Model) -> ImageRow {
    ImageRow {
        id: m.id,
        location: m.location,
        publisher: m.publisher,
        offer: m.offer,
        sku: m.sku,
        version: m.version,
        os_type: m.os_type,
        display_name: m.display_name,
        enabled: m.enabled,
        last_sync_at: to_utc(m.last_sync_at),
        created_at: to_utc(m.created_at),
        updated_at: to_utc(m.updated_at),
    }
}

/// 镜像表的对账适配，作用域为区域
pub struct ImageTable;

#[async_trait]
impl ReconcileTarget for ImageTable {
    type Row = ImageRow;
    type Scope = String;

    const KIND: &'static str = "image";

    fn key(row: &ImageRow) -> String {
        row.catalog_key()
    }

    fn is_removed(row: &ImageRow) -> bool {
        !row.enabled
    }

    async fn load_scope(
        &self,
        db: &DatabaseConnection,
        location: &String,
    ) -> Result<Vec<ImageRow>> {
        let models = ImageEntity::find()
            .filter(ImageCol::Location.eq(location.as_str()))
            .all(db)
            .await?;
        Ok(models.into_iter().map(model_to_image).collect())
    }

    async fn insert_batch(&self, txn: &DatabaseTransaction, rows: &[ImageRow]) -> Result<()> {
        let now = to_db(Utc::now());
        let models = rows.iter().map(|row| vm_image::ActiveModel {
            id: Set(vmsync_common::id::next_id()),
            location: Set(row.location.clone()),
            publisher: Set(row.publisher.clone()),
            offer: Set(row.offer.clone()),
            sku: Set(row.sku.clone()),
            version: Set(row.version.clone()),
            os_type: Set(row.os_type.clone()),
            display_name: Set(row.display_name.clone()),
            enabled: Set(true),
            last_sync_at: Set(now),
            created_at: Set(now),
            updated_at: Set(now),
        });
        ImageEntity::insert_many(models)
            .exec_without_returning(txn)
            .await?;
        Ok(())
    }

    async fn update_row(
        &self,
        txn: &DatabaseTransaction,
        existing: &ImageRow,
        fresh: &ImageRow,
        now: DateTime<Utc>,
    ) -> Result<()> {
        vm_image::ActiveModel {
            id: Unchanged(existing.id.clone()),
            version: Set(fresh.version.clone()),
            os_type: Set(fresh.os_type.clone()),
            display_name: Set(fresh.display_name.clone()),
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
        rows: &[ImageRow],
        policy: RemovalPolicy,
        now: DateTime<Utc>,
    ) -> Result<u64> {
        if policy == RemovalPolicy::Retain {
            return Ok(0);
        }
        let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
        let res = ImageEntity::update_many()
            .col_expr(ImageCol::Enabled, Expr::value(false))
            .col_expr(ImageCol::UpdatedAt, Expr::value(to_db(now)))
            .filter(ImageCol::Id.is_in(ids))
            .exec(txn)
            .await?;
        Ok(res.rows_affected)
    }
}

impl SyncStore {
    // ---- images ----

    pub async fn reconcile_images(
        &self,
        location: &str,
        rows: Vec<ImageRow>,
        budget: &ReconcileBudget,
    ) -> Result<ReconcileOutcome> {
        self.reconciler
            .reconcile(
                self.db(),
                &ImageTable,
                &location.to_string(),
                rows,
                RemovalPolicy::Disable,
                budget,
            )
            .await
    }

    pub async fn list_images(
        &self,
        location: Option<&str>,
        enabled_only: bool,
        query: ListQuery,
    ) -> Result<ListResult<ImageRow>> {
        let mut base = ImageEntity::find();
        if let Some(location) = location {
            base = base.filter(ImageCol::Location.eq(location));
        }
        if enabled_only {
            base = base.filter(ImageCol::Enabled.eq(true));
        }
        let total = base.clone().count(self.db()).await?;
        let models = base
            .order_by(ImageCol::Publisher, Order::Asc)
            .order_by(ImageCol::Offer, Order::Asc)
            .order_by(ImageCol::Sku, Order::Asc)
            .limit(query.limit)
            .offset(query.offset)
            .all(self.db())
            .await?;
        Ok(ListResult {
            items: models.into_iter().map(model_to_image).collect(),
            total,
        })
    }
}
