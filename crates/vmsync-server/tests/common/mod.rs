#![allow(dead_code)]

use anyhow::Result;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use vmsync_cloud::arm::{
    ArmImage, ArmImageVersion, ArmInstanceView, ArmLocation, ArmNetworkInterface, ArmPublicIp,
    ArmSubscription, ArmVirtualMachine, ArmVmSize,
};
use vmsync_cloud::{ApiConnector, CloudError, CredentialContext, ManagementApi, Page};
use vmsync_common::types::SubscriptionStatus;
use vmsync_server::config::SyncSettings;
use vmsync_server::SyncEnv;
use vmsync_storage::{AccountRow, SyncStore};

pub struct TestContext {
    pub temp_dir: TempDir,
    pub store: Arc<SyncStore>,
    pub cloud: Arc<FakeCloud>,
}

impl TestContext {
    pub fn env(&self, settings: SyncSettings) -> SyncEnv {
        SyncEnv::new(
            Arc::clone(&self.store),
            Arc::clone(&self.cloud) as Arc<dyn ApiConnector>,
            settings,
        )
    }

    pub fn default_env(&self) -> SyncEnv {
        self.env(SyncSettings::default())
    }

    /// 账号的 tenant_id 即 FakeCloud 中的租户名
    pub async fn add_account(
        &self,
        user_id: &str,
        email: &str,
        tenant: &str,
    ) -> Result<AccountRow> {
        let now = Utc::now();
        let row = AccountRow {
            id: vmsync_common::id::next_id(),
            user_id: user_id.to_string(),
            login_email: email.to_string(),
            display_name: email.to_string(),
            tenant_id: tenant.to_string(),
            client_id: format!("{tenant}-client"),
            client_secret: format!("{tenant}-secret"),
            subscription_status: SubscriptionStatus::Normal,
            vm_count: 0,
            created_at: now,
            updated_at: now,
        };
        Ok(self.store.insert_account(&row).await?)
    }
}

pub async fn build_test_context() -> Result<TestContext> {
    vmsync_common::id::init(1, 1);
    let temp_dir = tempfile::tempdir()?;
    let db_url = format!("sqlite://{}/vmsync.db?mode=rwc", temp_dir.path().display());
    let store = Arc::new(SyncStore::new(&db_url, temp_dir.path()).await?);
    Ok(TestContext {
        temp_dir,
        store,
        cloud: Arc::new(FakeCloud::default()),
    })
}

fn from_json<T: DeserializeOwned>(value: Value) -> T {
    serde_json::from_value(value).expect("fixture should deserialize")
}

fn remote_error(message: &str) -> CloudError {
    CloudError::RemoteApi {
        status: 500,
        code: "InternalServerError".to_string(),
        message: message.to_string(),
    }
}

/// Scripted tenant. Every secondary call (instance view, NIC, public IP) is
/// counted so tests can observe peak concurrency.
#[derive(Default)]
pub struct FakeTenant {
    pub subscriptions: Vec<ArmSubscription>,
    pub vms: HashMap<String, Vec<ArmVirtualMachine>>,
    /// lowercase VM resource id → `running`, `deallocated`, ...
    pub power_states: HashMap<String, String>,
    pub locations: Vec<ArmLocation>,
    pub sizes: Vec<ArmVmSize>,
    /// `publisher:offer:sku` → versions
    pub image_versions: HashMap<String, Vec<String>>,
    pub fail_subscriptions: bool,
    pub fail_vms: bool,
    /// Instance views answer 403 while the VM listing still works.
    pub fail_instance_views: bool,
    pub secondary_delay: Duration,
    pub public_ips: Mutex<HashMap<String, ArmPublicIp>>,
    pub in_flight: AtomicUsize,
    pub peak: AtomicUsize,
}

impl FakeTenant {
    pub fn with_subscription(mut self, subscription_id: &str, quota_id: &str) -> Self {
        self.subscriptions.push(from_json(json!({
            "id": format!("/subscriptions/{subscription_id}"),
            "subscriptionId": subscription_id,
            "displayName": format!("Subscription {subscription_id}"),
            "state": "Enabled",
            "authorizationSource": "RoleBased",
            "subscriptionPolicies": {
                "locationPlacementId": "Public_2014-09-01",
                "quotaId": quota_id,
                "spendingLimit": "Off"
            }
        })));
        self
    }

    pub fn with_vms(mut self, subscription_id: &str, names: &[(&str, &str)]) -> Self {
        let mut vms = Vec::with_capacity(names.len());
        for (name, power) in names {
            self.power_states.insert(
                vm_resource_id(subscription_id, name).to_lowercase(),
                power.to_string(),
            );
            vms.push(fake_vm(subscription_id, name));
        }
        self.vms.insert(subscription_id.to_string(), vms);
        self
    }

    pub fn with_locations(mut self, names: &[&str]) -> Self {
        self.locations = names
            .iter()
            .map(|name| {
                from_json(json!({
                    "name": name,
                    "displayName": name.to_uppercase(),
                    "regionalDisplayName": format!("(US) {name}"),
                    "metadata": {
                        "regionType": "Physical",
                        "regionCategory": "Recommended",
                        "geography": "United States",
                        "geographyGroup": "US"
                    }
                }))
            })
            .collect();
        self
    }

    pub fn with_sizes(mut self, names: &[(&str, i32, i64)]) -> Self {
        self.sizes = names
            .iter()
            .map(|(name, cores, memory_mb)| {
                from_json(json!({
                    "name": name,
                    "numberOfCores": cores,
                    "memoryInMB": memory_mb,
                    "maxDataDiskCount": 4,
                    "osDiskSizeInMB": 1047552,
                    "resourceDiskSizeInMB": 8192
                }))
            })
            .collect();
        self
    }

    pub fn with_image(
        mut self,
        publisher: &str,
        offer: &str,
        sku: &str,
        versions: &[&str],
    ) -> Self {
        self.image_versions.insert(
            format!("{publisher}:{offer}:{sku}"),
            versions.iter().map(|v| v.to_string()).collect(),
        );
        self
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    async fn secondary<T>(&self, value: T) -> vmsync_cloud::Result<T> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if !self.secondary_delay.is_zero() {
            tokio::time::sleep(self.secondary_delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(value)
    }
}

pub fn fake_vm(subscription_id: &str, name: &str) -> ArmVirtualMachine {
    let id = vm_resource_id(subscription_id, name);
    from_json(json!({
        "id": id,
        "name": name,
        "location": "eastus",
        "tags": { "owner": "ops" },
        "properties": {
            "vmId": format!("{name}-guid"),
            "provisioningState": "Succeeded",
            "timeCreated": "2024-05-01T08:00:00Z",
            "hardwareProfile": { "vmSize": "Standard_B2s" },
            "storageProfile": {
                "imageReference": {
                    "publisher": "Canonical",
                    "offer": "ubuntu-24_04-lts",
                    "sku": "server",
                    "version": "latest"
                },
                "osDisk": { "osType": "Linux", "name": format!("{name}-os"), "diskSizeGB": 30 }
            },
            "networkProfile": {
                "networkInterfaces": [{ "id": nic_id(subscription_id, name) }]
            }
        }
    }))
}

pub fn vm_resource_id(subscription_id: &str, name: &str) -> String {
    format!("/subscriptions/{subscription_id}/resourceGroups/rg-app/providers/Microsoft.Compute/virtualMachines/{name}")
}

pub fn nic_id(subscription_id: &str, vm_name: &str) -> String {
    format!("/subscriptions/{subscription_id}/resourceGroups/rg-app/providers/Microsoft.Network/networkInterfaces/{vm_name}-nic")
}

pub fn public_ip_id(subscription_id: &str, name: &str) -> String {
    format!("/subscriptions/{subscription_id}/resourceGroups/rg-app/providers/Microsoft.Network/publicIPAddresses/{name}")
}

#[async_trait::async_trait]
impl ManagementApi for FakeTenant {
    async fn list_subscriptions(&self, _: Option<String>) -> vmsync_cloud::Result<Page<ArmSubscription>> {
        if self.fail_subscriptions {
            return Err(remote_error("subscription listing unavailable"));
        }
        Ok(Page::last(self.subscriptions.clone()))
    }

    async fn list_virtual_machines(
        &self,
        subscription_id: &str,
        _: Option<String>,
    ) -> vmsync_cloud::Result<Page<ArmVirtualMachine>> {
        if self.fail_vms {
            return Err(remote_error("compute listing unavailable"));
        }
        Ok(Page::last(
            self.vms.get(subscription_id).cloned().unwrap_or_default(),
        ))
    }

    async fn get_instance_view(
        &self,
        vm_resource_id: &str,
    ) -> vmsync_cloud::Result<ArmInstanceView> {
        if self.fail_instance_views {
            return Err(CloudError::RemoteApi {
                status: 403,
                code: "AuthorizationFailed".to_string(),
                message: format!("no read access to {vm_resource_id}"),
            });
        }
        let power = self
            .power_states
            .get(&vm_resource_id.to_lowercase())
            .cloned()
            .unwrap_or_else(|| "running".to_string());
        self.secondary(from_json(json!({
            "statuses": [
                { "code": "ProvisioningState/succeeded" },
                { "code": format!("PowerState/{power}") }
            ]
        })))
        .await
    }

    async fn get_network_interface(
        &self,
        nic_id: &str,
    ) -> vmsync_cloud::Result<ArmNetworkInterface> {
        let nic_name = nic_id.rsplit('/').next().unwrap_or_default();
        let vm_name = nic_name.trim_end_matches("-nic");
        let subscription_id = nic_id.split('/').nth(2).unwrap_or_default();
        self.secondary(from_json(json!({
            "id": nic_id,
            "name": nic_name,
            "properties": {
                "ipConfigurations": [{
                    "name": "ipconfig1",
                    "properties": {
                        "privateIPAddress": "10.0.0.4",
                        "publicIPAddress": {
                            "id": public_ip_id(subscription_id, &format!("{vm_name}-ip"))
                        }
                    }
                }]
            }
        })))
        .await
    }

    async fn get_public_ip(&self, public_ip_id: &str) -> vmsync_cloud::Result<ArmPublicIp> {
        let stored = self
            .public_ips
            .lock()
            .unwrap()
            .get(&public_ip_id.to_lowercase())
            .cloned();
        let ip = stored.unwrap_or_else(|| {
            from_json(json!({
                "id": public_ip_id,
                "name": public_ip_id.rsplit('/').next().unwrap_or_default(),
                "location": "eastus",
                "properties": { "ipAddress": "20.1.2.3" }
            }))
        });
        self.secondary(ip).await
    }

    async fn put_public_ip(&self, public_ip: &ArmPublicIp) -> vmsync_cloud::Result<ArmPublicIp> {
        let mut stored = public_ip.clone();
        if let Some(settings) = stored.properties.dns_settings.as_mut() {
            if let Some(label) = settings.domain_name_label.clone() {
                settings.fqdn = Some(format!("{label}.{}.cloudapp.azure.com", stored.location));
            }
        }
        self.public_ips
            .lock()
            .unwrap()
            .insert(public_ip.id.to_lowercase(), stored.clone());
        Ok(stored)
    }

    async fn list_vm_sizes(
        &self,
        _: &str,
        _: &str,
        _: Option<String>,
    ) -> vmsync_cloud::Result<Page<ArmVmSize>> {
        Ok(Page::last(self.sizes.clone()))
    }

    async fn list_locations(
        &self,
        _: &str,
        _: Option<String>,
    ) -> vmsync_cloud::Result<Page<ArmLocation>> {
        Ok(Page::last(self.locations.clone()))
    }

    async fn list_image_versions(
        &self,
        _: &str,
        location: &str,
        publisher: &str,
        offer: &str,
        sku: &str,
    ) -> vmsync_cloud::Result<Vec<ArmImageVersion>> {
        let versions = self
            .image_versions
            .get(&format!("{publisher}:{offer}:{sku}"))
            .cloned()
            .unwrap_or_default();
        Ok(versions
            .into_iter()
            .map(|name| from_json(json!({ "name": name, "location": location })))
            .collect())
    }

    async fn get_image(
        &self,
        _: &str,
        _: &str,
        _: &str,
        _: &str,
        _: &str,
        version: &str,
    ) -> vmsync_cloud::Result<ArmImage> {
        Ok(from_json(json!({
            "name": version,
            "properties": { "osDiskImage": { "operatingSystem": "Linux" } }
        })))
    }
}

/// Routes each credential to the tenant registered under its `tenant_id`.
#[derive(Default)]
pub struct FakeCloud {
    tenants: Mutex<HashMap<String, Arc<FakeTenant>>>,
    connects: AtomicUsize,
}

impl FakeCloud {
    pub fn add_tenant(&self, tenant_id: &str, tenant: FakeTenant) -> Arc<FakeTenant> {
        let tenant = Arc::new(tenant);
        self.tenants
            .lock()
            .unwrap()
            .insert(tenant_id.to_string(), Arc::clone(&tenant));
        tenant
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ApiConnector for FakeCloud {
    async fn connect(
        &self,
        credential: &CredentialContext,
    ) -> vmsync_cloud::Result<Arc<dyn ManagementApi>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let tenant = self
            .tenants
            .lock()
            .unwrap()
            .get(&credential.tenant_id)
            .cloned();
        match tenant {
            Some(tenant) => Ok(tenant as Arc<dyn ManagementApi>),
            None => Err(CloudError::Credential(format!(
                "unknown tenant {}",
                credential.tenant_id
            ))),
        }
    }
}
