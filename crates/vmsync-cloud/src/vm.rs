use crate::arm::{ArmDnsSettings, ArmInstanceView, ArmVirtualMachine};
use crate::context::FetchContext;
use crate::credentials::CredentialContext;
use crate::error::{CloudError, Result};
use crate::fanout::BoundedTaskGroup;
use crate::pager::collect_pages;
use crate::size::list_sizes;
use crate::{resource_group_from_id, resource_name_from_id, ApiConnector, ManagementApi};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use vmsync_common::types::{DataDisk, PowerState};

pub const NO_VM_RECORDS: &str = "no valid VM records found";

/// Normalised VM with network, disk and size enrichment applied.
#[derive(Debug, Clone, PartialEq)]
pub struct VmRecord {
    pub vm_id: String,
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
    pub created_at: Option<DateTime<Utc>>,
}

/// size name (lowercase) → (cores, memory GB)
type SizeTable = HashMap<String, (i32, f64)>;

/// Lists the VMs of one subscription and enriches each one concurrently.
pub struct VmFetcher {
    connector: Arc<dyn ApiConnector>,
    concurrency: usize,
}

impl VmFetcher {
    pub fn new(connector: Arc<dyn ApiConnector>, concurrency: usize) -> Self {
        Self {
            connector,
            concurrency,
        }
    }

    /// Fetch and enrich every VM in `subscription_id`.
    ///
    /// VMs whose secondary calls fail are skipped. When the deadline passes the
    /// VMs finished so far are returned; with none finished the result is
    /// [`CloudError::Timeout`]. An empty subscription is [`CloudError::NoRecords`].
    /// When every listed VM fails enrichment the first failure is returned.
    pub async fn fetch(
        &self,
        ctx: &FetchContext,
        credential: &CredentialContext,
        subscription_id: &str,
    ) -> Result<Vec<VmRecord>> {
        credential.validate()?;
        let api = ctx.run(self.connector.connect(credential)).await?;

        let vms = collect_pages(ctx, "virtual_machines", |link| {
            let api = Arc::clone(&api);
            let subscription_id = subscription_id.to_string();
            async move { api.list_virtual_machines(&subscription_id, link).await }
        })
        .await?;

        if vms.is_empty() {
            return Err(CloudError::NoRecords(NO_VM_RECORDS.to_string()));
        }

        let sizes = Arc::new(load_size_tables(&api, ctx, subscription_id, &vms).await);

        let mut group = BoundedTaskGroup::new(ctx, self.concurrency);
        for vm in vms {
            let api = Arc::clone(&api);
            let sizes = Arc::clone(&sizes);
            let subscription_id = subscription_id.to_string();
            group.spawn(vm.name.clone(), async move {
                enrich_vm(api.as_ref(), &subscription_id, vm, &sizes).await
            });
        }

        let mut outcome = group.join().await;
        for (name, err) in &outcome.failed {
            tracing::warn!(vm = %name, subscription_id, error = %err, "Skipping VM");
        }

        if outcome.completed.is_empty() {
            if outcome.interrupted || ctx.is_expired() {
                return Err(CloudError::Timeout);
            }
            if outcome.failed.is_empty() {
                return Err(CloudError::NoRecords(NO_VM_RECORDS.to_string()));
            }
            // 列出的 VM 全部补全失败视为抓取失败，而不是空订阅
            tracing::error!(
                subscription_id,
                failed = outcome.failed.len(),
                "Every virtual machine failed enrichment"
            );
            return Err(outcome.failed.swap_remove(0).1);
        }

        if outcome.interrupted {
            tracing::warn!(
                subscription_id,
                completed = outcome.completed.len(),
                dropped = outcome.failed.len(),
                "VM fetch deadline reached, returning partial result"
            );
        } else {
            tracing::info!(
                subscription_id,
                count = outcome.completed.len(),
                skipped = outcome.failed.len(),
                "Fetched virtual machines"
            );
        }

        Ok(outcome.completed)
    }
}

/// One size catalog per distinct location. A failing location only loses
/// its cores/memory enrichment.
async fn load_size_tables(
    api: &Arc<dyn ManagementApi>,
    ctx: &FetchContext,
    subscription_id: &str,
    vms: &[ArmVirtualMachine],
) -> HashMap<String, SizeTable> {
    let mut locations: Vec<String> = vms.iter().map(|vm| vm.location.to_lowercase()).collect();
    locations.sort();
    locations.dedup();

    let mut tables = HashMap::new();
    for location in locations {
        match list_sizes(api, ctx, subscription_id, &location).await {
            Ok(sizes) => {
                let table: SizeTable = sizes
                    .into_iter()
                    .map(|s| (s.name.to_lowercase(), (s.cores, s.memory_gb)))
                    .collect();
                tables.insert(location, table);
            }
            Err(e) => {
                tracing::warn!(location = %location, error = %e, "Failed to load VM size catalog");
            }
        }
    }
    tables
}

async fn enrich_vm(
    api: &dyn ManagementApi,
    subscription_id: &str,
    vm: ArmVirtualMachine,
    sizes: &HashMap<String, SizeTable>,
) -> Result<VmRecord> {
    let view = api.get_instance_view(&vm.id).await?;
    let (provisioning_state, power_state) = states_from_view(&view);

    let mut private_ips = Vec::new();
    let mut public_ips = Vec::new();
    let mut public_ip_name = String::new();
    let mut dns_alias = String::new();

    for nic_ref in &vm.properties.network_profile.network_interfaces {
        if nic_ref.id.is_empty() {
            continue;
        }
        let nic = api.get_network_interface(&nic_ref.id).await?;
        for ip_config in &nic.properties.ip_configurations {
            if let Some(private_ip) = ip_config
                .properties
                .private_ip_address
                .as_deref()
                .filter(|ip| !ip.is_empty())
            {
                private_ips.push(private_ip.to_string());
            }

            let Some(public_ref) = ip_config
                .properties
                .public_ip_address
                .as_ref()
                .filter(|r| !r.id.is_empty())
            else {
                continue;
            };
            let public_ip = api.get_public_ip(&public_ref.id).await?;
            if let Some(address) = public_ip.properties.ip_address.filter(|a| !a.is_empty()) {
                public_ips.push(address);
            }
            if public_ip_name.is_empty() {
                public_ip_name = if public_ip.name.is_empty() {
                    resource_name_from_id(&public_ref.id)
                } else {
                    public_ip.name.clone()
                };
            }
            if dns_alias.is_empty() {
                if let Some(settings) = public_ip.properties.dns_settings.as_ref() {
                    dns_alias = dns_alias_for(settings, &vm.location);
                }
            }
        }
    }

    let storage = &vm.properties.storage_profile;
    let os_image = storage
        .image_reference
        .as_ref()
        .map(|img| {
            let mut descriptor = format!("{}:{}:{}", img.publisher, img.offer, img.sku);
            if !img.version.is_empty() && !img.version.eq_ignore_ascii_case("latest") {
                descriptor.push(':');
                descriptor.push_str(&img.version);
            }
            descriptor
        })
        .unwrap_or_default();
    let os_type = storage
        .os_disk
        .as_ref()
        .map(|d| d.os_type.clone())
        .unwrap_or_default();
    let os_disk_size_gb = storage.os_disk.as_ref().and_then(|d| d.disk_size_gb);
    let data_disks = storage
        .data_disks
        .iter()
        .filter_map(|disk| {
            let size_gb = disk.disk_size_gb.unwrap_or(0);
            if disk.name.is_empty() || size_gb <= 0 {
                return None;
            }
            Some(DataDisk {
                name: disk.name.clone(),
                size_gb,
                lun: disk.lun,
                storage_account_type: disk
                    .managed_disk
                    .as_ref()
                    .map(|m| m.storage_account_type.clone())
                    .unwrap_or_default(),
            })
        })
        .collect();

    let vm_size = vm.properties.hardware_profile.vm_size.clone();
    let (cores, memory_gb) = sizes
        .get(&vm.location.to_lowercase())
        .and_then(|table| table.get(&vm_size.to_lowercase()))
        .copied()
        .unwrap_or((0, 0.0));

    let created_at = vm
        .properties
        .time_created
        .as_deref()
        .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
        .map(|t| t.with_timezone(&Utc));

    Ok(VmRecord {
        resource_group: resource_group_from_id(&vm.id).unwrap_or_default(),
        subscription_id: subscription_id.to_string(),
        provisioning_state: if provisioning_state.is_empty() {
            vm.properties.provisioning_state.clone()
        } else {
            provisioning_state
        },
        power_state,
        private_ips,
        public_ips,
        public_ip_name,
        os_type,
        os_image,
        cores,
        memory_gb,
        dns_alias,
        os_disk_size_gb,
        data_disks,
        tags: vm.tags.into_iter().collect(),
        created_at,
        vm_size,
        name: vm.name,
        location: vm.location,
        vm_id: vm.id,
    })
}

/// `ProvisioningState/succeeded` and `PowerState/running` status codes.
fn states_from_view(view: &ArmInstanceView) -> (String, PowerState) {
    let mut provisioning = String::new();
    let mut power = PowerState::Unknown;
    for status in &view.statuses {
        if let Some(state) = status.code.strip_prefix("ProvisioningState/") {
            provisioning = state.to_string();
        } else if status.code.starts_with("PowerState/") {
            power = PowerState::from_raw(&status.code);
        }
    }
    (provisioning, power)
}

/// FQDN when present, otherwise `{label}.{location}.cloudapp.azure.com`.
pub fn dns_alias_for(settings: &ArmDnsSettings, location: &str) -> String {
    if let Some(fqdn) = settings.fqdn.as_deref().filter(|f| !f.is_empty()) {
        return fqdn.to_string();
    }
    match settings.domain_name_label.as_deref().filter(|l| !l.is_empty()) {
        Some(label) => format!("{label}.{location}.cloudapp.azure.com"),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests;
