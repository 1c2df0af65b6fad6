use crate::arm::{
    ArmImage, ArmImageVersion, ArmInstanceView, ArmList, ArmLocation, ArmNetworkInterface,
    ArmPublicIp, ArmSubscription, ArmVirtualMachine, ArmVmSize,
};
use crate::credentials::CredentialContext;
use crate::error::{CloudError, Result};
use crate::{ApiConnector, ManagementApi, Page};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

const SUBSCRIPTION_API_VERSION: &str = "2022-12-01";
const COMPUTE_API_VERSION: &str = "2024-03-01";
const NETWORK_API_VERSION: &str = "2023-09-01";

/// Endpoints and HTTP settings of the Azure connector.
#[derive(Debug, Clone)]
pub struct AzureSettings {
    pub authority_host: String,
    pub management_endpoint: String,
    pub request_timeout: Duration,
}

impl Default for AzureSettings {
    fn default() -> Self {
        Self {
            authority_host: "https://login.microsoftonline.com".to_string(),
            management_endpoint: "https://management.azure.com".to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Client-credentials token exchange followed by ARM REST calls.
pub struct AzureConnector {
    client: Client,
    settings: AzureSettings,
}

impl AzureConnector {
    pub fn new(settings: AzureSettings) -> Result<Self> {
        let client = Client::builder()
            .use_rustls_tls()
            .timeout(settings.request_timeout)
            .build()
            .map_err(|e| CloudError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, settings })
    }

    async fn acquire_token(&self, credential: &CredentialContext) -> Result<String> {
        let url = format!(
            "{}/{}/oauth2/v2.0/token",
            self.settings.authority_host.trim_end_matches('/'),
            credential.tenant_id
        );
        let scope = format!(
            "{}/.default",
            self.settings.management_endpoint.trim_end_matches('/')
        );
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", credential.client_id.as_str()),
            ("client_secret", credential.client_secret.as_str()),
            ("scope", scope.as_str()),
        ];

        let response = self.client.post(&url).form(&form).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let reason = serde_json::from_str::<TokenError>(&body)
                .map(|e| format!("{}: {}", e.error, e.error_description))
                .unwrap_or_else(|_| format!("status {status}"));
            return Err(CloudError::Credential(format!(
                "token exchange failed for tenant {}: {reason}",
                credential.tenant_id
            )));
        }

        let token: TokenResponse = serde_json::from_str(&body)?;
        if token.access_token.is_empty() {
            return Err(CloudError::Credential(
                "token endpoint returned an empty access token".to_string(),
            ));
        }
        Ok(token.access_token)
    }
}

#[async_trait::async_trait]
impl ApiConnector for AzureConnector {
    async fn connect(&self, credential: &CredentialContext) -> Result<Arc<dyn ManagementApi>> {
        credential.validate()?;
        let token = self.acquire_token(credential).await?;
        tracing::debug!(
            tenant_id = %credential.tenant_id,
            account = %credential.display_name,
            "Acquired management API token"
        );
        Ok(Arc::new(AzureApi {
            client: self.client.clone(),
            endpoint: self
                .settings
                .management_endpoint
                .trim_end_matches('/')
                .to_string(),
            token,
        }))
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: String,
}

#[derive(Deserialize)]
struct TokenError {
    #[serde(default)]
    error: String,
    #[serde(default)]
    error_description: String,
}

#[derive(Deserialize, Default)]
struct ArmErrorBody {
    #[serde(default)]
    error: ArmErrorDetail,
}

#[derive(Deserialize, Default)]
struct ArmErrorDetail {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

/// Management API bound to one bearer token.
pub struct AzureApi {
    client: Client,
    endpoint: String,
    token: String,
}

impl AzureApi {
    fn url(&self, path: &str, api_version: &str) -> String {
        format!("{}{}?api-version={}", self.endpoint, path, api_version)
    }

    async fn send<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T> {
        let response = request.bearer_auth(&self.token).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(CloudError::RateLimited(body));
        }
        if !status.is_success() {
            let detail = serde_json::from_str::<ArmErrorBody>(&body)
                .unwrap_or_default()
                .error;
            return Err(CloudError::RemoteApi {
                status: status.as_u16(),
                code: detail.code,
                message: if detail.message.is_empty() {
                    body
                } else {
                    detail.message
                },
            });
        }

        Ok(serde_json::from_str(&body)?)
    }

    async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        self.send(self.client.get(url)).await
    }

    async fn list<T: DeserializeOwned>(
        &self,
        first_url: String,
        next_link: Option<String>,
    ) -> Result<Page<T>> {
        let url = next_link.unwrap_or(first_url);
        let list: ArmList<T> = self.get(&url).await?;
        Ok(Page {
            items: list.value,
            next_link: list.next_link,
        })
    }

    fn image_sku_path(
        subscription_id: &str,
        location: &str,
        publisher: &str,
        offer: &str,
        sku: &str,
    ) -> String {
        format!(
            "/subscriptions/{subscription_id}/providers/Microsoft.Compute/locations/{location}/publishers/{publisher}/artifacttypes/vmimage/offers/{offer}/skus/{sku}/versions"
        )
    }
}

#[async_trait::async_trait]
impl ManagementApi for AzureApi {
    async fn list_subscriptions(&self, next_link: Option<String>) -> Result<Page<ArmSubscription>> {
        self.list(self.url("/subscriptions", SUBSCRIPTION_API_VERSION), next_link)
            .await
    }

    async fn list_virtual_machines(
        &self,
        subscription_id: &str,
        next_link: Option<String>,
    ) -> Result<Page<ArmVirtualMachine>> {
        let path =
            format!("/subscriptions/{subscription_id}/providers/Microsoft.Compute/virtualMachines");
        self.list(self.url(&path, COMPUTE_API_VERSION), next_link)
            .await
    }

    async fn get_instance_view(&self, vm_resource_id: &str) -> Result<ArmInstanceView> {
        let path = format!("{vm_resource_id}/instanceView");
        self.get(&self.url(&path, COMPUTE_API_VERSION)).await
    }

    async fn get_network_interface(&self, nic_id: &str) -> Result<ArmNetworkInterface> {
        self.get(&self.url(nic_id, NETWORK_API_VERSION)).await
    }

    async fn get_public_ip(&self, public_ip_id: &str) -> Result<ArmPublicIp> {
        self.get(&self.url(public_ip_id, NETWORK_API_VERSION)).await
    }

    async fn put_public_ip(&self, public_ip: &ArmPublicIp) -> Result<ArmPublicIp> {
        let url = self.url(&public_ip.id, NETWORK_API_VERSION);
        self.send(self.client.put(&url).json(public_ip)).await
    }

    async fn list_vm_sizes(
        &self,
        subscription_id: &str,
        location: &str,
        next_link: Option<String>,
    ) -> Result<Page<ArmVmSize>> {
        let path = format!(
            "/subscriptions/{subscription_id}/providers/Microsoft.Compute/locations/{location}/vmSizes"
        );
        self.list(self.url(&path, COMPUTE_API_VERSION), next_link)
            .await
    }

    async fn list_locations(
        &self,
        subscription_id: &str,
        next_link: Option<String>,
    ) -> Result<Page<ArmLocation>> {
        let path = format!("/subscriptions/{subscription_id}/locations");
        self.list(self.url(&path, SUBSCRIPTION_API_VERSION), next_link)
            .await
    }

    async fn list_image_versions(
        &self,
        subscription_id: &str,
        location: &str,
        publisher: &str,
        offer: &str,
        sku: &str,
    ) -> Result<Vec<ArmImageVersion>> {
        let path = Self::image_sku_path(subscription_id, location, publisher, offer, sku);
        self.get(&self.url(&path, COMPUTE_API_VERSION)).await
    }

    async fn get_image(
        &self,
        subscription_id: &str,
        location: &str,
        publisher: &str,
        offer: &str,
        sku: &str,
        version: &str,
    ) -> Result<ArmImage> {
        let path = format!(
            "{}/{version}",
            Self::image_sku_path(subscription_id, location, publisher, offer, sku)
        );
        self.get(&self.url(&path, COMPUTE_API_VERSION)).await
    }
}
