use super::*;
use crate::arm::{
    ArmImage, ArmImageVersion, ArmIpConfiguration, ArmIpConfigurationProperties, ArmLocation,
    ArmNetworkInterface, ArmNetworkInterfaceProperties, ArmNetworkProfile, ArmPublicIp,
    ArmPublicIpProperties, ArmSubscription, ArmVmProperties, ArmVmSize, ArmInstanceStatus,
    ArmHardwareProfile, SubResource,
};
use crate::Page;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Default)]
struct FakeApi {
    vms: Vec<ArmVirtualMachine>,
    failing_views: HashSet<String>,
    /// Instance views that only answer long after any test deadline.
    slow_views: HashSet<String>,
    delay: Duration,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl FakeApi {
    async fn track<T>(&self, value: T) -> Result<T> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(value)
    }
}

#[async_trait::async_trait]
impl ManagementApi for FakeApi {
    async fn list_subscriptions(&self, _: Option<String>) -> Result<Page<ArmSubscription>> {
        Ok(Page::last(vec![]))
    }

    async fn list_virtual_machines(
        &self,
        _: &str,
        _: Option<String>,
    ) -> Result<Page<ArmVirtualMachine>> {
        Ok(Page::last(self.vms.clone()))
    }

    async fn get_instance_view(&self, vm_id: &str) -> Result<ArmInstanceView> {
        if self.failing_views.contains(vm_id) {
            return Err(CloudError::RemoteApi {
                status: 500,
                code: "InternalServerError".to_string(),
                message: "instance view unavailable".to_string(),
            });
        }
        if self.slow_views.contains(vm_id) {
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
        self.track(ArmInstanceView {
            statuses: vec![
                ArmInstanceStatus {
                    code: "ProvisioningState/succeeded".to_string(),
                    display_status: "Provisioning succeeded".to_string(),
                },
                ArmInstanceStatus {
                    code: "PowerState/running".to_string(),
                    display_status: "VM running".to_string(),
                },
            ],
        })
        .await
    }

    async fn get_network_interface(&self, nic_id: &str) -> Result<ArmNetworkInterface> {
        self.track(ArmNetworkInterface {
            id: nic_id.to_string(),
            name: resource_name_from_id(nic_id),
            properties: ArmNetworkInterfaceProperties {
                ip_configurations: vec![ArmIpConfiguration {
                    name: "ipconfig1".to_string(),
                    properties: ArmIpConfigurationProperties {
                        private_ip_address: Some("10.0.0.4".to_string()),
                        public_ip_address: Some(SubResource {
                            id: format!("{nic_id}-pip"),
                        }),
                    },
                }],
            },
        })
        .await
    }

    async fn get_public_ip(&self, public_ip_id: &str) -> Result<ArmPublicIp> {
        self.track(ArmPublicIp {
            id: public_ip_id.to_string(),
            name: resource_name_from_id(public_ip_id),
            location: "eastus".to_string(),
            properties: ArmPublicIpProperties {
                ip_address: Some("20.0.0.1".to_string()),
                dns_settings: Some(ArmDnsSettings {
                    domain_name_label: Some("web".to_string()),
                    fqdn: None,
                    extra: Default::default(),
                }),
                extra: Default::default(),
            },
            extra: Default::default(),
        })
        .await
    }

    async fn put_public_ip(&self, public_ip: &ArmPublicIp) -> Result<ArmPublicIp> {
        Ok(public_ip.clone())
    }

    async fn list_vm_sizes(&self, _: &str, _: &str, _: Option<String>) -> Result<Page<ArmVmSize>> {
        Ok(Page::last(vec![ArmVmSize {
            name: "Standard_B2s".to_string(),
            number_of_cores: 2,
            memory_in_mb: 4096,
            ..Default::default()
        }]))
    }

    async fn list_locations(&self, _: &str, _: Option<String>) -> Result<Page<ArmLocation>> {
        Ok(Page::last(vec![]))
    }

    async fn list_image_versions(
        &self,
        _: &str,
        _: &str,
        _: &str,
        _: &str,
        _: &str,
    ) -> Result<Vec<ArmImageVersion>> {
        Ok(vec![])
    }

    async fn get_image(&self, _: &str, _: &str, _: &str, _: &str, _: &str, _: &str) -> Result<ArmImage> {
        Ok(ArmImage::default())
    }
}

struct FakeConnector(Arc<FakeApi>);

#[async_trait::async_trait]
impl ApiConnector for FakeConnector {
    async fn connect(&self, _: &CredentialContext) -> Result<Arc<dyn ManagementApi>> {
        Ok(Arc::clone(&self.0) as Arc<dyn ManagementApi>)
    }
}

fn vm(index: usize) -> ArmVirtualMachine {
    let id = format!(
        "/subscriptions/sub-1/resourceGroups/rg-app/providers/Microsoft.Compute/virtualMachines/vm-{index}"
    );
    ArmVirtualMachine {
        id: id.clone(),
        name: format!("vm-{index}"),
        location: "eastus".to_string(),
        tags: HashMap::from([("env".to_string(), "prod".to_string())]),
        properties: ArmVmProperties {
            hardware_profile: ArmHardwareProfile {
                vm_size: "Standard_B2s".to_string(),
            },
            network_profile: ArmNetworkProfile {
                network_interfaces: vec![SubResource {
                    id: format!("{id}-nic"),
                }],
            },
            time_created: Some("2024-01-02T03:04:05Z".to_string()),
            ..Default::default()
        },
    }
}

fn credential() -> CredentialContext {
    CredentialContext::new("tenant", "client", "secret", "acct")
}

fn fetcher(api: Arc<FakeApi>, concurrency: usize) -> VmFetcher {
    VmFetcher::new(Arc::new(FakeConnector(api)), concurrency)
}

#[tokio::test]
async fn should_enrich_vms_with_network_and_size_details() {
    let api = Arc::new(FakeApi {
        vms: vec![vm(1)],
        ..Default::default()
    });
    let ctx = FetchContext::with_timeout(Duration::from_secs(5));

    let records = fetcher(api, 5)
        .fetch(&ctx, &credential(), "sub-1")
        .await
        .expect("fetch should succeed");

    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.resource_group, "rg-app");
    assert_eq!(record.power_state, PowerState::Running);
    assert_eq!(record.provisioning_state, "succeeded");
    assert_eq!(record.private_ips, vec!["10.0.0.4".to_string()]);
    assert_eq!(record.public_ips, vec!["20.0.0.1".to_string()]);
    assert_eq!(record.dns_alias, "web.eastus.cloudapp.azure.com");
    assert_eq!(record.cores, 2);
    assert!((record.memory_gb - 4.0).abs() < f64::EPSILON);
    assert!(record.created_at.is_some());
    assert_eq!(record.tags.get("env").map(String::as_str), Some("prod"));
}

#[tokio::test]
async fn should_skip_vm_whose_secondary_call_fails() {
    let failing = vm(2);
    let api = Arc::new(FakeApi {
        vms: vec![vm(1), failing.clone(), vm(3)],
        failing_views: HashSet::from([failing.id.clone()]),
        ..Default::default()
    });
    let ctx = FetchContext::with_timeout(Duration::from_secs(5));

    let records = fetcher(api, 5)
        .fetch(&ctx, &credential(), "sub-1")
        .await
        .expect("fetch should succeed");

    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.vm_id != failing.id));
}

#[tokio::test]
async fn should_return_first_failure_when_every_vm_fails_enrichment() {
    let vms: Vec<ArmVirtualMachine> = (1..=3).map(vm).collect();
    let api = Arc::new(FakeApi {
        failing_views: vms.iter().map(|v| v.id.clone()).collect(),
        vms,
        ..Default::default()
    });
    let ctx = FetchContext::with_timeout(Duration::from_secs(5));

    let err = fetcher(api, 5)
        .fetch(&ctx, &credential(), "sub-1")
        .await
        .expect_err("no VM survived enrichment");

    assert!(matches!(err, CloudError::RemoteApi { status: 500, .. }));
    assert_ne!(err.to_string(), NO_VM_RECORDS);
}

#[tokio::test]
async fn should_return_finished_vms_when_deadline_passes_mid_enrichment() {
    let vms: Vec<ArmVirtualMachine> = (1..=4).map(vm).collect();
    let api = Arc::new(FakeApi {
        slow_views: HashSet::from([vms[2].id.clone(), vms[3].id.clone()]),
        vms,
        ..Default::default()
    });
    let ctx = FetchContext::with_timeout(Duration::from_millis(300));

    let records = fetcher(api, 5)
        .fetch(&ctx, &credential(), "sub-1")
        .await
        .expect("partial result is not an error");

    let mut names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
    names.sort();
    assert_eq!(names, vec!["vm-1", "vm-2"]);
}

#[tokio::test]
async fn should_fail_with_no_records_when_subscription_is_empty() {
    let api = Arc::new(FakeApi::default());
    let ctx = FetchContext::with_timeout(Duration::from_secs(5));

    let err = fetcher(api, 5)
        .fetch(&ctx, &credential(), "sub-1")
        .await
        .expect_err("empty VM listing is an error");

    assert_eq!(err.to_string(), NO_VM_RECORDS);
}

#[tokio::test]
async fn should_time_out_when_deadline_is_zero() {
    let api = Arc::new(FakeApi {
        vms: (0..10).map(vm).collect(),
        ..Default::default()
    });
    let ctx = FetchContext::with_timeout(Duration::ZERO);

    let err = fetcher(api, 5)
        .fetch(&ctx, &credential(), "sub-1")
        .await
        .expect_err("zero timeout must fail");

    assert!(err.is_timeout());
}

#[tokio::test]
async fn should_bound_secondary_call_concurrency() {
    let api = Arc::new(FakeApi {
        vms: (0..25).map(vm).collect(),
        delay: Duration::from_millis(5),
        ..Default::default()
    });
    let ctx = FetchContext::with_timeout(Duration::from_secs(30));

    let records = fetcher(Arc::clone(&api), 3)
        .fetch(&ctx, &credential(), "sub-1")
        .await
        .expect("fetch should succeed");

    assert_eq!(records.len(), 25);
    assert!(api.peak.load(Ordering::SeqCst) <= 3);
}

#[test]
fn should_prefer_fqdn_for_dns_alias() {
    let settings = ArmDnsSettings {
        domain_name_label: Some("web".to_string()),
        fqdn: Some("web.westeurope.cloudapp.azure.com".to_string()),
        extra: Default::default(),
    };
    assert_eq!(dns_alias_for(&settings, "eastus"), "web.westeurope.cloudapp.azure.com");
    assert_eq!(dns_alias_for(&ArmDnsSettings::default(), "eastus"), "");
}
