use crate::arm::ArmVmSize;
use crate::context::FetchContext;
use crate::credentials::CredentialContext;
use crate::error::Result;
use crate::pager::collect_pages;
use crate::{ApiConnector, ManagementApi};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub struct SizeRecord {
    pub name: String,
    pub location: String,
    pub cores: i32,
    pub memory_gb: f64,
    pub max_data_disks: i32,
    pub os_disk_size_mb: i64,
    pub resource_disk_size_mb: i64,
    pub family: String,
    pub category: String,
}

/// VM size catalog of one location.
pub struct SizeFetcher {
    connector: Arc<dyn ApiConnector>,
}

impl SizeFetcher {
    pub fn new(connector: Arc<dyn ApiConnector>) -> Self {
        Self { connector }
    }

    pub async fn fetch(
        &self,
        ctx: &FetchContext,
        credential: &CredentialContext,
        subscription_id: &str,
        location: &str,
    ) -> Result<Vec<SizeRecord>> {
        credential.validate()?;
        let api = ctx.run(self.connector.connect(credential)).await?;
        let records = list_sizes(&api, ctx, subscription_id, location).await?;
        tracing::info!(
            subscription_id,
            location,
            count = records.len(),
            "Fetched VM size catalog"
        );
        Ok(records)
    }
}

/// Shared with the VM fetcher, which needs cores and memory per size name.
pub(crate) async fn list_sizes(
    api: &Arc<dyn ManagementApi>,
    ctx: &FetchContext,
    subscription_id: &str,
    location: &str,
) -> Result<Vec<SizeRecord>> {
    let raw = collect_pages(ctx, "vm_sizes", |link| {
        let api = Arc::clone(api);
        let subscription_id = subscription_id.to_string();
        let location = location.to_string();
        async move { api.list_vm_sizes(&subscription_id, &location, link).await }
    })
    .await?;

    Ok(raw
        .into_iter()
        .filter(|s| !s.name.is_empty())
        .map(|s| to_record(s, location))
        .collect())
}

fn to_record(size: ArmVmSize, location: &str) -> SizeRecord {
    let family = size_family(&size.name);
    let category = size_category(&family).to_string();
    SizeRecord {
        location: location.to_string(),
        cores: size.number_of_cores,
        memory_gb: size.memory_in_mb as f64 / 1024.0,
        max_data_disks: size.max_data_disk_count,
        os_disk_size_mb: size.os_disk_size_in_mb,
        resource_disk_size_mb: size.resource_disk_size_in_mb,
        family,
        category,
        name: size.name,
    }
}

/// Leading letters after the tier prefix: `Standard_NC6s_v3` → `NC`.
pub fn size_family(name: &str) -> String {
    let bare = name
        .strip_prefix("Standard_")
        .or_else(|| name.strip_prefix("Basic_"))
        .unwrap_or(name);
    bare.chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect::<String>()
        .to_ascii_uppercase()
}

pub fn size_category(family: &str) -> &'static str {
    // 多字母前缀优先匹配
    if family.starts_with('N') {
        return "gpu";
    }
    if family.starts_with('H') {
        return "hpc";
    }
    match family.chars().next() {
        Some('B') => "burstable",
        Some('A') | Some('D') => "general_purpose",
        Some('E') | Some('M') | Some('G') => "memory_optimized",
        Some('F') => "compute_optimized",
        Some('L') => "storage_optimized",
        _ => "other",
    }
}
