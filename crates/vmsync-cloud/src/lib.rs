pub mod arm;
pub mod azure;
pub mod context;
pub mod credentials;
pub mod dns;
pub mod error;
pub mod fanout;
pub mod image;
pub mod pager;
pub mod region;
pub mod size;
pub mod subscription;
pub mod subscription_type;
pub mod vm;

use arm::{
    ArmImage, ArmImageVersion, ArmInstanceView, ArmLocation, ArmNetworkInterface, ArmPublicIp,
    ArmSubscription, ArmVirtualMachine, ArmVmSize,
};
use std::sync::Arc;

pub use context::FetchContext;
pub use credentials::CredentialContext;
pub use error::{CloudError, Result};

/// One page of a remote listing.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_link: Option<String>,
}

impl<T> Page<T> {
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            next_link: None,
        }
    }
}

/// Remote management API for one authenticated tenant.
///
/// Listing calls take the `next_link` of the previous page (`None` for the
/// first page). Resource ids are full ARM ids.
#[async_trait::async_trait]
pub trait ManagementApi: Send + Sync {
    async fn list_subscriptions(&self, next_link: Option<String>) -> Result<Page<ArmSubscription>>;

    async fn list_virtual_machines(
        &self,
        subscription_id: &str,
        next_link: Option<String>,
    ) -> Result<Page<ArmVirtualMachine>>;

    async fn get_instance_view(&self, vm_resource_id: &str) -> Result<ArmInstanceView>;

    async fn get_network_interface(&self, nic_id: &str) -> Result<ArmNetworkInterface>;

    async fn get_public_ip(&self, public_ip_id: &str) -> Result<ArmPublicIp>;

    /// Create-or-update of a public IP resource; returns the stored resource.
    async fn put_public_ip(&self, public_ip: &ArmPublicIp) -> Result<ArmPublicIp>;

    async fn list_vm_sizes(
        &self,
        subscription_id: &str,
        location: &str,
        next_link: Option<String>,
    ) -> Result<Page<ArmVmSize>>;

    async fn list_locations(
        &self,
        subscription_id: &str,
        next_link: Option<String>,
    ) -> Result<Page<ArmLocation>>;

    async fn list_image_versions(
        &self,
        subscription_id: &str,
        location: &str,
        publisher: &str,
        offer: &str,
        sku: &str,
    ) -> Result<Vec<ArmImageVersion>>;

    async fn get_image(
        &self,
        subscription_id: &str,
        location: &str,
        publisher: &str,
        offer: &str,
        sku: &str,
        version: &str,
    ) -> Result<ArmImage>;
}

/// Exchanges a credential set for an authenticated [`ManagementApi`].
#[async_trait::async_trait]
pub trait ApiConnector: Send + Sync {
    async fn connect(&self, credential: &CredentialContext) -> Result<Arc<dyn ManagementApi>>;
}

/// `/subscriptions/{sub}/resourceGroups/{rg}/...` → `rg`.
pub fn resource_group_from_id(resource_id: &str) -> Option<String> {
    let mut parts = resource_id.split('/');
    while let Some(part) = parts.next() {
        if part.eq_ignore_ascii_case("resourceGroups") {
            return parts.next().filter(|s| !s.is_empty()).map(str::to_string);
        }
    }
    None
}

/// Last path segment of an ARM id (the resource name).
pub fn resource_name_from_id(resource_id: &str) -> String {
    resource_id
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string()
}
