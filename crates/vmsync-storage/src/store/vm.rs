use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ActiveValue::Unchanged, ColumnTrait, Condition,
    DatabaseConnection, DatabaseTransaction, EntityTrait, Order, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Select,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use vmsync_common::types::{DataDisk, ListQuery, ListResult, PowerState};

use super::{to_db, to_utc, SyncStore};
use crate::entities::virtual_machine::{self, Column as VmCol, Entity as VmEntity};
use crate::error::Result;
use crate::reconcile::{ReconcileBudget, ReconcileOutcome, ReconcileTarget, RemovalPolicy};

pub const VM_SYNC_STATUS_SYNCED: &str = "synced";
pub const VM_SYNC_STATUS_STALE: &str = "stale";

/// 虚拟机数据行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VmRow {
    pub id: String,
    pub vm_id: String,
    pub account_id: String,
    pub subscription_id: String,
    pub name: String,
    pub resource_group: String,
    pub location: String,
    pub vm_size: String,
    pub provisioning_state: String,
    pub power_state: PowerState,
    pub private_ips: Vec<String>,
    pub public_ips: Vec<String>,
    pub public_ip_name: String,
    pub os_type: String,
    pub os_image: String,
    pub cores: i32,
    pub memory_gb: f64,
    pub dns_alias: String,
    pub os_disk_size_gb: Option<i32>,
    pub data_disks: Vec<DataDisk>,
    pub tags: BTreeMap<String, String>,
    pub sync_status: String,
    pub last_sync_at: DateTime<Utc>,
    /// 云端创建时间
    pub remote_created_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// VM 对账作用域：账号，可选收窄到单个订阅
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmScope {
    pub account_id: String,
    pub subscription_id: Option<String>,
}

impl VmScope {
    pub fn subscription(account_id: &str, subscription_id: &str) -> Self {
        Self {
            account_id: account_id.to_string(),
            subscription_id: Some(subscription_id.to_string()),
        }
    }
}

/// VM 列表过滤条件
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VmFilter {
    pub account_id: String,
    pub subscription_id: Option<String>,
    pub power_state: Option<PowerState>,
    pub name_contains: Option<String>,
    #[serde(default)]
    pub include_deleted: bool,
}

fn model_to_vm(m: virtual_machine::Model) -> Result<VmRow> {
    Ok(VmRow {
        power_state: PowerState::from_raw(&m.power_state),
        private_ips: serde_json::from_str(&m.private_ips)?,
        public_ips: serde_json::from_str(&m.public_ips)?,
        data_disks: serde_json::from_str(&m.data_disks)?,
        tags: serde_json::from_str(&m.tags)?,
        last_sync_at: to_utc(m.last_sync_at),
        remote_created_at: m.remote_created_at.map(to_utc),
        deleted_at: m.deleted_at.map(to_utc),
        created_at: to_utc(m.created_at),
        updated_at: to_utc(m.updated_at),
        id: m.id,
        vm_id: m.vm_id,
        account_id: m.account_id,
        subscription_id: m.subscription_id,
        name: m.name,
        resource_group: m.resource_group,
        location: m.location,
        vm_size: m.vm_size,
        provisioning_state: m.provisioning_state,
        public_ip_name: m.public_ip_name,
        os_type: m.os_type,
        os_image: m.os_image,
        cores: m.cores,
        memory_gb: m.memory_gb,
        dns_alias: m.dns_alias,
        os_disk_size_gb: m.os_disk_size_gb,
        sync_status: m.sync_status,
    })
}

/// 抓取方拥有的字段；插入与更新共用
fn fetched_fields(
    am: &mut virtual_machine::ActiveModel,
    row: &VmRow,
    now: DateTime<Utc>,
) -> Result<()> {
    am.account_id = Set(row.account_id.clone());
    am.subscription_id = Set(row.subscription_id.clone());
    am.name = Set(row.name.clone());
    am.resource_group = Set(row.resource_group.clone());
    am.location = Set(row.location.clone());
    am.vm_size = Set(row.vm_size.clone());
    am.provisioning_state = Set(row.provisioning_state.clone());
    am.power_state = Set(row.power_state.as_str().to_string());
    am.private_ips = Set(serde_json::to_string(&row.private_ips)?);
    am.public_ips = Set(serde_json::to_string(&row.public_ips)?);
    am.public_ip_name = Set(row.public_ip_name.clone());
    am.os_type = Set(row.os_type.clone());
    am.os_image = Set(row.os_image.clone());
    am.cores = Set(row.cores);
    am.memory_gb = Set(row.memory_gb);
    am.dns_alias = Set(row.dns_alias.clone());
    am.os_disk_size_gb = Set(row.os_disk_size_gb);
    am.data_disks = Set(serde_json::to_string(&row.data_disks)?);
    am.tags = Set(serde_json::to_string(&row.tags)?);
    am.sync_status = Set(VM_SYNC_STATUS_SYNCED.to_string());
    am.last_sync_at = Set(to_db(now));
    am.remote_created_at = Set(row.remote_created_at.map(to_db));
    am.deleted_at = Set(None);
    am.updated_at = Set(to_db(now));
    Ok(())
}

/// 虚拟机表的对账适配
pub struct VmTable;

#[async_trait]
impl ReconcileTarget for VmTable {
    type Row = VmRow;
    type Scope = VmScope;

    const KIND: &'static str = "virtual_machine";

    fn key(row: &VmRow) -> String {
        row.vm_id.to_lowercase()
    }

    fn is_removed(row: &VmRow) -> bool {
        row.deleted_at.is_some() || row.sync_status == VM_SYNC_STATUS_STALE
    }

    async fn load_scope(&self, db: &DatabaseConnection, scope: &VmScope) -> Result<Vec<VmRow>> {
        let mut query = VmEntity::find().filter(VmCol::AccountId.eq(scope.account_id.as_str()));
        if let Some(ref sub) = scope.subscription_id {
            query = query.filter(VmCol::SubscriptionId.eq(sub.as_str()));
        }
        let models = query.all(db).await?;
        models.into_iter().map(model_to_vm).collect()
    }

    async fn insert_batch(&self, txn: &DatabaseTransaction, rows: &[VmRow]) -> Result<()> {
        let now = Utc::now();
        let mut models = Vec::with_capacity(rows.len());
        for row in rows {
            let mut am = virtual_machine::ActiveModel {
                id: Set(vmsync_common::id::next_id()),
                vm_id: Set(row.vm_id.clone()),
                created_at: Set(to_db(now)),
                ..Default::default()
            };
            fetched_fields(&mut am, row, now)?;
            models.push(am);
        }
        // vm_id 全局唯一；同一 VM 曾归属其他账号时转移到当前账号
        let on_conflict = OnConflict::column(VmCol::VmId)
            .update_columns([
                VmCol::AccountId,
                VmCol::SubscriptionId,
                VmCol::Name,
                VmCol::ResourceGroup,
                VmCol::Location,
                VmCol::VmSize,
                VmCol::ProvisioningState,
                VmCol::PowerState,
                VmCol::PrivateIps,
                VmCol::PublicIps,
                VmCol::PublicIpName,
                VmCol::OsType,
                VmCol::OsImage,
                VmCol::Cores,
                VmCol::MemoryGb,
                VmCol::DnsAlias,
                VmCol::OsDiskSizeGb,
                VmCol::DataDisks,
                VmCol::Tags,
                VmCol::SyncStatus,
                VmCol::LastSyncAt,
                VmCol::RemoteCreatedAt,
                VmCol::DeletedAt,
                VmCol::UpdatedAt,
            ])
            .to_owned();
        VmEntity::insert_many(models)
            .on_conflict(on_conflict)
            .exec_without_returning(txn)
            .await?;
        Ok(())
    }

    async fn update_row(
        &self,
        txn: &DatabaseTransaction,
        existing: &VmRow,
        fresh: &VmRow,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let mut am = virtual_machine::ActiveModel {
            id: Unchanged(existing.id.clone()),
            ..Default::default()
        };
        fetched_fields(&mut am, fresh, now)?;
        am.update(txn).await?;
        Ok(())
    }

    async fn mark_removed(
        &self,
        txn: &DatabaseTransaction,
        rows: &[VmRow],
        policy: RemovalPolicy,
        now: DateTime<Utc>,
    ) -> Result<u64> {
        let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
        let update = match policy {
            RemovalPolicy::Retain => return Ok(0),
            RemovalPolicy::SoftDelete => VmEntity::update_many()
                .col_expr(VmCol::DeletedAt, Expr::value(Some(to_db(now)))),
            RemovalPolicy::Disable => VmEntity::update_many()
                .col_expr(VmCol::SyncStatus, Expr::value(VM_SYNC_STATUS_STALE)),
        };
        let res = update
            .col_expr(VmCol::UpdatedAt, Expr::value(to_db(now)))
            .filter(VmCol::Id.is_in(ids))
            .exec(txn)
            .await?;
        Ok(res.rows_affected)
    }
}

fn apply_filter(filter: &VmFilter) -> Select<VmEntity> {
    let mut query = VmEntity::find().filter(VmCol::AccountId.eq(filter.account_id.as_str()));
    if let Some(ref sub) = filter.subscription_id {
        query = query.filter(VmCol::SubscriptionId.eq(sub.as_str()));
    }
    if let Some(state) = filter.power_state {
        query = query.filter(VmCol::PowerState.eq(state.as_str()));
    }
    if let Some(ref name) = filter.name_contains {
        query = query.filter(VmCol::Name.contains(name.as_str()));
    }
    if !filter.include_deleted {
        query = query.filter(VmCol::DeletedAt.is_null());
    }
    query
}

impl SyncStore {
    // ---- virtual machines ----

    /// 对账一个作用域内的 VM，移除策略由调用方配置
    pub async fn reconcile_vms(
        &self,
        scope: &VmScope,
        rows: Vec<VmRow>,
        policy: RemovalPolicy,
        budget: &ReconcileBudget,
    ) -> Result<ReconcileOutcome> {
        self.reconciler
            .reconcile(self.db(), &VmTable, scope, rows, policy, budget)
            .await
    }

    pub async fn list_vms(&self, filter: &VmFilter, query: ListQuery) -> Result<ListResult<VmRow>> {
        let base = apply_filter(filter);
        let total = base.clone().count(self.db()).await?;
        let models = base
            .order_by(VmCol::Name, Order::Asc)
            .limit(query.limit)
            .offset(query.offset)
            .all(self.db())
            .await?;
        let items = models
            .into_iter()
            .map(model_to_vm)
            .collect::<Result<Vec<_>>>()?;
        Ok(ListResult { items, total })
    }

    pub async fn get_vm(&self, vm_id: &str) -> Result<Option<VmRow>> {
        let model = VmEntity::find()
            .filter(VmCol::VmId.eq(vm_id))
            .one(self.db())
            .await?;
        model.map(model_to_vm).transpose()
    }

    /// 账号下未删除的 VM 数
    pub async fn count_account_vms(&self, account_id: &str) -> Result<u64> {
        let count = VmEntity::find()
            .filter(VmCol::AccountId.eq(account_id))
            .filter(VmCol::DeletedAt.is_null())
            .count(self.db())
            .await?;
        Ok(count)
    }

    /// 设置 DNS 标签后刷新引用该公网 IP 的 VM 的 DNS 别名
    pub async fn update_dns_alias_by_public_ip(
        &self,
        account_id: &str,
        subscription_id: &str,
        resource_group: &str,
        public_ip_name: &str,
        dns_alias: &str,
    ) -> Result<u64> {
        let res = VmEntity::update_many()
            .col_expr(VmCol::DnsAlias, Expr::value(dns_alias))
            .col_expr(VmCol::UpdatedAt, Expr::value(to_db(Utc::now())))
            .filter(
                Condition::all()
                    .add(VmCol::AccountId.eq(account_id))
                    .add(VmCol::SubscriptionId.eq(subscription_id))
                    .add(VmCol::ResourceGroup.eq(resource_group))
                    .add(VmCol::PublicIpName.eq(public_ip_name)),
            )
            .exec(self.db())
            .await?;
        Ok(res.rows_affected)
    }
}
