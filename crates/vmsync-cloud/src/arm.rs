//! Wire shapes of the Azure Resource Manager responses the fetchers consume.
//!
//! Only the fields the sync engine reads are typed; everything else on the
//! resources that are written back (public IPs) is carried through `extra`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// ARM list envelope: `{ "value": [...], "nextLink": "..." }`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArmList<T> {
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
    #[serde(default)]
    pub next_link: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubResource {
    #[serde(default)]
    pub id: String,
}

// ---- subscriptions ----

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArmSubscription {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub subscription_id: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub authorization_source: String,
    #[serde(default)]
    pub subscription_policies: Option<ArmSubscriptionPolicies>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArmSubscriptionPolicies {
    #[serde(default)]
    pub location_placement_id: String,
    #[serde(default)]
    pub quota_id: String,
    #[serde(default)]
    pub spending_limit: String,
}

// ---- virtual machines ----

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArmVirtualMachine {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub tags: HashMap<String, String>,
    #[serde(default)]
    pub properties: ArmVmProperties,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArmVmProperties {
    #[serde(default)]
    pub vm_id: String,
    #[serde(default)]
    pub provisioning_state: String,
    #[serde(default)]
    pub time_created: Option<String>,
    #[serde(default)]
    pub hardware_profile: ArmHardwareProfile,
    #[serde(default)]
    pub storage_profile: ArmStorageProfile,
    #[serde(default)]
    pub network_profile: ArmNetworkProfile,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArmHardwareProfile {
    #[serde(default)]
    pub vm_size: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArmStorageProfile {
    #[serde(default)]
    pub image_reference: Option<ArmImageReference>,
    #[serde(default)]
    pub os_disk: Option<ArmOsDisk>,
    #[serde(default)]
    pub data_disks: Vec<ArmDataDisk>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArmImageReference {
    #[serde(default)]
    pub publisher: String,
    #[serde(default)]
    pub offer: String,
    #[serde(default)]
    pub sku: String,
    #[serde(default)]
    pub version: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArmOsDisk {
    #[serde(default)]
    pub os_type: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "diskSizeGB")]
    pub disk_size_gb: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArmDataDisk {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub lun: i32,
    #[serde(default, rename = "diskSizeGB")]
    pub disk_size_gb: Option<i32>,
    #[serde(default)]
    pub managed_disk: Option<ArmManagedDisk>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArmManagedDisk {
    #[serde(default)]
    pub storage_account_type: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArmNetworkProfile {
    #[serde(default)]
    pub network_interfaces: Vec<SubResource>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArmInstanceView {
    #[serde(default)]
    pub statuses: Vec<ArmInstanceStatus>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArmInstanceStatus {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub display_status: String,
}

// ---- network ----

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArmNetworkInterface {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub properties: ArmNetworkInterfaceProperties,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArmNetworkInterfaceProperties {
    #[serde(default)]
    pub ip_configurations: Vec<ArmIpConfiguration>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArmIpConfiguration {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub properties: ArmIpConfigurationProperties,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArmIpConfigurationProperties {
    #[serde(default, rename = "privateIPAddress")]
    pub private_ip_address: Option<String>,
    #[serde(default, rename = "publicIPAddress")]
    pub public_ip_address: Option<SubResource>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArmPublicIp {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub properties: ArmPublicIpProperties,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArmPublicIpProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dns_settings: Option<ArmDnsSettings>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArmDnsSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain_name_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fqdn: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

// ---- catalogs ----

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArmVmSize {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub number_of_cores: i32,
    #[serde(default, rename = "memoryInMB")]
    pub memory_in_mb: i64,
    #[serde(default)]
    pub max_data_disk_count: i32,
    #[serde(default, rename = "osDiskSizeInMB")]
    pub os_disk_size_in_mb: i64,
    #[serde(default, rename = "resourceDiskSizeInMB")]
    pub resource_disk_size_in_mb: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArmLocation {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub regional_display_name: String,
    #[serde(default)]
    pub metadata: Option<ArmLocationMetadata>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArmLocationMetadata {
    #[serde(default)]
    pub region_type: String,
    #[serde(default)]
    pub region_category: String,
    #[serde(default)]
    pub geography: String,
    #[serde(default)]
    pub geography_group: String,
}

/// Entry of `.../skus/{sku}/versions`; `name` is the version string.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArmImageVersion {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub location: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArmImage {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub properties: ArmImageProperties,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArmImageProperties {
    #[serde(default)]
    pub os_disk_image: Option<ArmOsDiskImage>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArmOsDiskImage {
    #[serde(default)]
    pub operating_system: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_parse_vm_with_disk_size_fields() {
        let vm: ArmVirtualMachine = serde_json::from_value(serde_json::json!({
            "id": "/subscriptions/s1/resourceGroups/rg-web/providers/Microsoft.Compute/virtualMachines/web-1",
            "name": "web-1",
            "location": "eastus",
            "properties": {
                "hardwareProfile": { "vmSize": "Standard_B2s" },
                "storageProfile": {
                    "osDisk": { "osType": "Linux", "diskSizeGB": 30 },
                    "dataDisks": [{ "name": "data0", "lun": 0, "diskSizeGB": 128,
                                    "managedDisk": { "storageAccountType": "Premium_LRS" } }]
                }
            }
        }))
        .expect("vm should parse");

        assert_eq!(vm.properties.hardware_profile.vm_size, "Standard_B2s");
        let os_disk = vm.properties.storage_profile.os_disk.expect("os disk");
        assert_eq!(os_disk.disk_size_gb, Some(30));
        assert_eq!(vm.properties.storage_profile.data_disks[0].disk_size_gb, Some(128));
    }

    #[test]
    fn should_keep_unknown_public_ip_fields_when_reserialized() {
        let ip: ArmPublicIp = serde_json::from_value(serde_json::json!({
            "id": "/subscriptions/s1/resourceGroups/rg/providers/Microsoft.Network/publicIPAddresses/ip1",
            "name": "ip1",
            "location": "eastus",
            "sku": { "name": "Standard" },
            "properties": {
                "ipAddress": "20.1.2.3",
                "publicIPAllocationMethod": "Static"
            }
        }))
        .expect("public ip should parse");

        let value = serde_json::to_value(&ip).expect("serialize");
        assert_eq!(value["sku"]["name"], "Standard");
        assert_eq!(value["properties"]["publicIPAllocationMethod"], "Static");
        assert_eq!(value["properties"]["ipAddress"], "20.1.2.3");
    }

    #[test]
    fn should_read_ip_configuration_with_arm_field_casing() {
        let nic: ArmNetworkInterface = serde_json::from_value(serde_json::json!({
            "id": "/subscriptions/s1/resourceGroups/rg/providers/Microsoft.Network/networkInterfaces/nic1",
            "name": "nic1",
            "properties": {
                "ipConfigurations": [{
                    "name": "ipconfig1",
                    "properties": {
                        "privateIPAddress": "10.0.0.4",
                        "publicIPAddress": {
                            "id": "/subscriptions/s1/resourceGroups/rg/providers/Microsoft.Network/publicIPAddresses/ip1"
                        }
                    }
                }]
            }
        }))
        .expect("nic should parse");

        let props = &nic.properties.ip_configurations[0].properties;
        assert_eq!(props.private_ip_address.as_deref(), Some("10.0.0.4"));
        assert!(props
            .public_ip_address
            .as_ref()
            .is_some_and(|r| r.id.ends_with("/ip1")));
    }
}
