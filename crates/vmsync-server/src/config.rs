use serde::{Deserialize, Serialize};
use std::time::Duration;
use vmsync_cloud::azure::AzureSettings;
use vmsync_storage::RemovalPolicy;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub azure: AzureConfig,
    #[serde(default)]
    pub sync: SyncSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    /// 完整连接 URL；为空时使用 `data_dir` 下的 SQLite 文件
    #[serde(default)]
    pub url: Option<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            url: None,
        }
    }
}

impl DatabaseConfig {
    pub fn connection_url(&self) -> String {
        match self.url {
            Some(ref url) if !url.trim().is_empty() => url.clone(),
            _ => format!("sqlite://{}/vmsync.db?mode=rwc", self.data_dir),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AzureConfig {
    #[serde(default = "default_authority_host")]
    pub authority_host: String,
    #[serde(default = "default_management_endpoint")]
    pub management_endpoint: String,
    /// 单个 HTTP 请求超时（秒）
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for AzureConfig {
    fn default() -> Self {
        Self {
            authority_host: default_authority_host(),
            management_endpoint: default_management_endpoint(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl AzureConfig {
    pub fn settings(&self) -> AzureSettings {
        AzureSettings {
            authority_host: self.authority_host.clone(),
            management_endpoint: self.management_endpoint.clone(),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    /// VM 抓取整体超时，含每台 VM 的网卡/公网 IP 二次调用
    #[serde(default = "default_vm_fetch_timeout_secs")]
    pub vm_fetch_timeout_secs: u64,
    #[serde(default = "default_subscription_fetch_timeout_secs")]
    pub subscription_fetch_timeout_secs: u64,
    /// 区域/镜像/规格目录抓取超时
    #[serde(default = "default_catalog_fetch_timeout_secs")]
    pub catalog_fetch_timeout_secs: u64,
    /// VM 二次调用与镜像解析的并发上限
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    #[serde(default = "default_reconcile_chunk_size")]
    pub reconcile_chunk_size: usize,
    /// 本次抓取中消失的 VM 如何处理
    #[serde(default)]
    pub vm_removal: RemovalPolicy,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            vm_fetch_timeout_secs: default_vm_fetch_timeout_secs(),
            subscription_fetch_timeout_secs: default_subscription_fetch_timeout_secs(),
            catalog_fetch_timeout_secs: default_catalog_fetch_timeout_secs(),
            max_concurrent: default_max_concurrent(),
            reconcile_chunk_size: default_reconcile_chunk_size(),
            vm_removal: RemovalPolicy::default(),
        }
    }
}

impl SyncSettings {
    pub fn vm_fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.vm_fetch_timeout_secs)
    }

    pub fn subscription_fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.subscription_fetch_timeout_secs)
    }

    pub fn catalog_fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.catalog_fetch_timeout_secs)
    }
}

fn default_data_dir() -> String {
    "data".to_string()
}

fn default_authority_host() -> String {
    "https://login.microsoftonline.com".to_string()
}

fn default_management_endpoint() -> String {
    "https://management.azure.com".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_vm_fetch_timeout_secs() -> u64 {
    300
}

fn default_subscription_fetch_timeout_secs() -> u64 {
    30
}

fn default_catalog_fetch_timeout_secs() -> u64 {
    60
}

fn default_max_concurrent() -> usize {
    5
}

fn default_reconcile_chunk_size() -> usize {
    100
}

impl SyncConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }
}
