use crate::context::FetchContext;
use crate::credentials::CredentialContext;
use crate::error::{CloudError, Result};
use crate::fanout::BoundedTaskGroup;
use crate::{ApiConnector, ManagementApi};
use std::cmp::Ordering;
use std::sync::Arc;

/// Marketplace image tracked by the image catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageSpec {
    pub publisher: &'static str,
    pub offer: &'static str,
    pub sku: &'static str,
    pub display_name: &'static str,
}

const fn spec(
    publisher: &'static str,
    offer: &'static str,
    sku: &'static str,
    display_name: &'static str,
) -> ImageSpec {
    ImageSpec {
        publisher,
        offer,
        sku,
        display_name,
    }
}

pub const POPULAR_IMAGES: &[ImageSpec] = &[
    spec("Canonical", "0001-com-ubuntu-server-jammy", "22_04-lts-gen2", "Ubuntu 22.04 LTS"),
    spec("Canonical", "0001-com-ubuntu-server-focal", "20_04-lts-gen2", "Ubuntu 20.04 LTS"),
    spec("Canonical", "0001-com-ubuntu-minimal-jammy", "minimal-22_04-lts-gen2", "Ubuntu 22.04 LTS Minimal"),
    spec("OpenLogic", "CentOS", "7_9-gen2", "CentOS 7.9"),
    spec("OpenLogic", "CentOS", "8_5-gen2", "CentOS 8.5"),
    spec("debian", "debian-11", "11-gen2", "Debian 11"),
    spec("debian", "debian-12", "12-gen2", "Debian 12"),
    spec("SUSE", "sles-15-sp5", "gen2", "SUSE Linux Enterprise 15 SP5"),
    spec("SUSE", "opensuse-leap-15-5", "gen2", "openSUSE Leap 15.5"),
    spec("almalinux", "almalinux", "8-gen2", "Alma Linux 8"),
    spec("almalinux", "almalinux", "9-gen2", "Alma Linux 9"),
    spec("kinvolk", "flatcar-container-linux-free", "stable-gen2", "Flatcar Container Linux"),
    spec("MicrosoftWindowsServer", "WindowsServer", "2022-datacenter-g2", "Windows Server 2022 Datacenter"),
    spec("MicrosoftWindowsServer", "WindowsServer", "2019-datacenter-gensecond", "Windows Server 2019 Datacenter"),
    spec("MicrosoftWindowsServer", "WindowsServer", "2016-datacenter-gensecond", "Windows Server 2016 Datacenter"),
    spec("MicrosoftWindowsDesktop", "Windows-11", "win11-22h2-pro", "Windows 11 Pro"),
    spec("MicrosoftWindowsDesktop", "Windows-10", "win10-22h2-pro", "Windows 10 Pro"),
    spec("MicrosoftWindowsServer", "WindowsServer", "2022-datacenter-core-g2", "Windows Server 2022 Core"),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRecord {
    pub location: String,
    pub publisher: String,
    pub offer: String,
    pub sku: String,
    pub version: String,
    pub os_type: String,
    pub display_name: String,
}

impl ImageRecord {
    /// `publisher:offer:sku`
    pub fn catalog_key(&self) -> String {
        format!("{}:{}:{}", self.publisher, self.offer, self.sku)
    }
}

/// Resolves [`POPULAR_IMAGES`] to their latest version in one location.
pub struct ImageFetcher {
    connector: Arc<dyn ApiConnector>,
    concurrency: usize,
    specs: Vec<ImageSpec>,
}

impl ImageFetcher {
    pub fn new(connector: Arc<dyn ApiConnector>, concurrency: usize) -> Self {
        Self {
            connector,
            concurrency,
            specs: POPULAR_IMAGES.to_vec(),
        }
    }

    pub fn with_specs(mut self, specs: Vec<ImageSpec>) -> Self {
        self.specs = specs;
        self
    }

    pub async fn fetch(
        &self,
        ctx: &FetchContext,
        credential: &CredentialContext,
        subscription_id: &str,
        location: &str,
    ) -> Result<Vec<ImageRecord>> {
        credential.validate()?;
        let api = ctx.run(self.connector.connect(credential)).await?;

        let mut group = BoundedTaskGroup::new(ctx, self.concurrency);
        for image in &self.specs {
            let api = Arc::clone(&api);
            let image = *image;
            let subscription_id = subscription_id.to_string();
            let location = location.to_string();
            group.spawn(
                format!("{}:{}:{}", image.publisher, image.offer, image.sku),
                async move { resolve_image(api, &subscription_id, &location, image).await },
            );
        }

        let mut outcome = group.join().await;
        for (key, err) in &outcome.failed {
            tracing::warn!(image = %key, location, error = %err, "Skipping image");
        }

        if outcome.completed.is_empty() {
            if outcome.interrupted {
                return Err(CloudError::Timeout);
            }
            // 没有任何镜像解析成功时按整体失败处理，避免把目录全部禁用
            if !outcome.failed.is_empty() {
                return Err(outcome.failed.swap_remove(0).1);
            }
        }
        let records: Vec<ImageRecord> = outcome.completed.into_iter().flatten().collect();

        tracing::info!(
            subscription_id,
            location,
            count = records.len(),
            skipped = outcome.failed.len(),
            "Fetched image catalog"
        );
        Ok(records)
    }
}

/// `None` when the image has no published versions in this location.
async fn resolve_image(
    api: Arc<dyn ManagementApi>,
    subscription_id: &str,
    location: &str,
    image: ImageSpec,
) -> Result<Option<ImageRecord>> {
    let versions = api
        .list_image_versions(subscription_id, location, image.publisher, image.offer, image.sku)
        .await?;

    let Some(latest) = versions
        .iter()
        .map(|v| v.name.as_str())
        .filter(|v| !v.is_empty())
        .max_by(|a, b| compare_versions(a, b))
    else {
        return Ok(None);
    };

    let detail = api
        .get_image(
            subscription_id,
            location,
            image.publisher,
            image.offer,
            image.sku,
            latest,
        )
        .await?;

    Ok(Some(ImageRecord {
        location: location.to_string(),
        publisher: image.publisher.to_string(),
        offer: image.offer.to_string(),
        sku: image.sku.to_string(),
        version: latest.to_string(),
        os_type: detail
            .properties
            .os_disk_image
            .map(|d| d.operating_system)
            .unwrap_or_default(),
        display_name: image.display_name.to_string(),
    }))
}

/// Dotted numeric comparison, `22.04.202401010` > `22.04.202312010`.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let mut left = a.split('.');
    let mut right = b.split('.');
    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (Some(_), None) => return Ordering::Greater,
            (None, Some(_)) => return Ordering::Less,
            (Some(l), Some(r)) => {
                let ord = match (l.parse::<u64>(), r.parse::<u64>()) {
                    (Ok(l), Ok(r)) => l.cmp(&r),
                    _ => l.cmp(r),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}
