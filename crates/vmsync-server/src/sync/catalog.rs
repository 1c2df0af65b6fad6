//! Region, image and size catalogs. Reference data shared by every account;
//! the account and subscription only supply the credential and the scope.

use super::{budget_for, credential_for, SyncEnv};
use crate::error::{Result, SyncError};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use vmsync_cloud::image::{ImageFetcher, ImageRecord};
use vmsync_cloud::region::{RegionFetcher, RegionRecord};
use vmsync_cloud::size::{SizeFetcher, SizeRecord};
use vmsync_cloud::{CredentialContext, FetchContext};
use vmsync_common::types::SubscriptionStatus;
use vmsync_storage::{ImageRow, ReconcileOutcome, RegionRow, SizeRow};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogSyncSummary {
    pub fetched: usize,
    pub outcome: ReconcileOutcome,
}

pub struct CatalogSyncService {
    env: SyncEnv,
}

impl CatalogSyncService {
    pub fn new(env: SyncEnv) -> Self {
        Self { env }
    }

    /// 同步订阅可见的区域；消失的区域被禁用
    pub async fn sync_regions(
        &self,
        ctx: &FetchContext,
        user_id: &str,
        account_id: &str,
        subscription_id: &str,
    ) -> Result<CatalogSyncSummary> {
        let (account_id, credential) = self.prepare(user_id, account_id, subscription_id).await?;
        let fetch_ctx = ctx.child(Some(self.env.settings.catalog_fetch_timeout()));

        let fetcher = RegionFetcher::new(self.env.connector.clone());
        let records = self
            .checked(&account_id, fetcher.fetch(&fetch_ctx, &credential, subscription_id).await)
            .await?;

        let fetched = records.len();
        let rows = records.into_iter().map(region_row).collect();
        let outcome = self.env.store.reconcile_regions(rows, &budget_for(ctx)).await?;
        self.env
            .mark_status(&account_id, SubscriptionStatus::Normal)
            .await;
        tracing::info!(
            account_id = %account_id,
            fetched,
            inserted = outcome.inserted,
            updated = outcome.updated,
            removed = outcome.removed,
            "Regions synced"
        );
        Ok(CatalogSyncSummary { fetched, outcome })
    }

    /// 同步某区域的规格目录；消失的规格标记为不可用
    pub async fn sync_sizes(
        &self,
        ctx: &FetchContext,
        user_id: &str,
        account_id: &str,
        subscription_id: &str,
        location: &str,
    ) -> Result<CatalogSyncSummary> {
        let location = normalize_location(location)?;
        let (account_id, credential) = self.prepare(user_id, account_id, subscription_id).await?;
        let fetch_ctx = ctx.child(Some(self.env.settings.catalog_fetch_timeout()));

        let fetcher = SizeFetcher::new(self.env.connector.clone());
        let records = self
            .checked(
                &account_id,
                fetcher
                    .fetch(&fetch_ctx, &credential, subscription_id, &location)
                    .await,
            )
            .await?;

        let fetched = records.len();
        let rows = records
            .into_iter()
            .map(|record| size_row(&location, record))
            .collect();
        let outcome = self
            .env
            .store
            .reconcile_sizes(&location, rows, &budget_for(ctx))
            .await?;
        self.env
            .mark_status(&account_id, SubscriptionStatus::Normal)
            .await;
        tracing::info!(
            account_id = %account_id,
            location = %location,
            fetched,
            inserted = outcome.inserted,
            updated = outcome.updated,
            removed = outcome.removed,
            "VM sizes synced"
        );
        Ok(CatalogSyncSummary { fetched, outcome })
    }

    /// 解析常用镜像在某区域的最新版本；未解析到的镜像被禁用
    pub async fn sync_images(
        &self,
        ctx: &FetchContext,
        user_id: &str,
        account_id: &str,
        subscription_id: &str,
        location: &str,
    ) -> Result<CatalogSyncSummary> {
        let location = normalize_location(location)?;
        let (account_id, credential) = self.prepare(user_id, account_id, subscription_id).await?;
        let fetch_ctx = ctx.child(Some(self.env.settings.catalog_fetch_timeout()));

        let fetcher = ImageFetcher::new(
            self.env.connector.clone(),
            self.env.settings.max_concurrent,
        );
        let records = self
            .checked(
                &account_id,
                fetcher
                    .fetch(&fetch_ctx, &credential, subscription_id, &location)
                    .await,
            )
            .await?;

        let fetched = records.len();
        let rows = records
            .into_iter()
            .map(|record| image_row(&location, record))
            .collect();
        let outcome = self
            .env
            .store
            .reconcile_images(&location, rows, &budget_for(ctx))
            .await?;
        self.env
            .mark_status(&account_id, SubscriptionStatus::Normal)
            .await;
        tracing::info!(
            account_id = %account_id,
            location = %location,
            fetched,
            inserted = outcome.inserted,
            updated = outcome.updated,
            removed = outcome.removed,
            "Image catalog synced"
        );
        Ok(CatalogSyncSummary { fetched, outcome })
    }

    async fn prepare(
        &self,
        user_id: &str,
        account_id: &str,
        subscription_id: &str,
    ) -> Result<(String, CredentialContext)> {
        let account = self.env.authorize(user_id, account_id).await?;
        self.env
            .authorize_subscription(&account, subscription_id)
            .await?;
        Ok((account.id.clone(), credential_for(&account)))
    }

    async fn checked<T>(
        &self,
        account_id: &str,
        fetched: vmsync_cloud::Result<T>,
    ) -> Result<T> {
        match fetched {
            Ok(records) => Ok(records),
            Err(e) => {
                tracing::error!(account_id, error = %e, "Catalog fetch failed");
                self.env
                    .mark_status(account_id, SubscriptionStatus::Error)
                    .await;
                Err(e.into())
            }
        }
    }
}

fn normalize_location(location: &str) -> Result<String> {
    let location = location.trim().to_lowercase();
    if location.is_empty() {
        return Err(SyncError::InvalidRequest("location is required".to_string()));
    }
    Ok(location)
}

fn region_row(record: RegionRecord) -> RegionRow {
    let now = Utc::now();
    RegionRow {
        id: String::new(),
        name: record.name,
        display_name: record.display_name,
        regional_display_name: record.regional_display_name,
        region_type: record.region_type,
        category: record.category,
        geography: record.geography,
        geography_group: record.geography_group,
        enabled: true,
        last_sync_at: now,
        created_at: now,
        updated_at: now,
    }
}

fn size_row(location: &str, record: SizeRecord) -> SizeRow {
    let now = Utc::now();
    SizeRow {
        id: String::new(),
        location: location.to_string(),
        name: record.name,
        cores: record.cores,
        memory_gb: record.memory_gb,
        max_data_disks: record.max_data_disks,
        os_disk_size_mb: record.os_disk_size_mb,
        resource_disk_size_mb: record.resource_disk_size_mb,
        family: record.family,
        category: record.category,
        available: true,
        last_sync_at: now,
        created_at: now,
        updated_at: now,
    }
}

fn image_row(location: &str, record: ImageRecord) -> ImageRow {
    let now = Utc::now();
    ImageRow {
        id: String::new(),
        location: location.to_string(),
        publisher: record.publisher,
        offer: record.offer,
        sku: record.sku,
        version: record.version,
        os_type: record.os_type,
        display_name: record.display_name,
        enabled: true,
        last_sync_at: now,
        created_at: now,
        updated_at: now,
    }
}
