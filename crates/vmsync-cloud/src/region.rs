use crate::arm::ArmLocation;
use crate::context::FetchContext;
use crate::credentials::CredentialContext;
use crate::error::Result;
use crate::pager::collect_pages;
use crate::ApiConnector;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionRecord {
    pub name: String,
    pub display_name: String,
    pub regional_display_name: String,
    pub region_type: String,
    pub category: String,
    pub geography: String,
    pub geography_group: String,
}

/// Locations visible to one subscription.
pub struct RegionFetcher {
    connector: Arc<dyn ApiConnector>,
}

impl RegionFetcher {
    pub fn new(connector: Arc<dyn ApiConnector>) -> Self {
        Self { connector }
    }

    pub async fn fetch(
        &self,
        ctx: &FetchContext,
        credential: &CredentialContext,
        subscription_id: &str,
    ) -> Result<Vec<RegionRecord>> {
        credential.validate()?;
        let api = ctx.run(self.connector.connect(credential)).await?;

        let raw = collect_pages(ctx, "regions", |link| {
            let api = Arc::clone(&api);
            let subscription_id = subscription_id.to_string();
            async move { api.list_locations(&subscription_id, link).await }
        })
        .await?;

        let records: Vec<RegionRecord> = raw
            .into_iter()
            .filter(|loc| !loc.name.is_empty())
            .map(to_record)
            .collect();
        tracing::info!(subscription_id, count = records.len(), "Fetched regions");
        Ok(records)
    }
}

fn to_record(loc: ArmLocation) -> RegionRecord {
    let metadata = loc.metadata.unwrap_or_default();
    RegionRecord {
        name: loc.name,
        display_name: loc.display_name,
        regional_display_name: loc.regional_display_name,
        region_type: metadata.region_type,
        category: metadata.region_category,
        geography: metadata.geography,
        geography_group: metadata.geography_group,
    }
}
