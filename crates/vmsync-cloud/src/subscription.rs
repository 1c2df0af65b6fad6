use crate::arm::ArmSubscription;
use crate::context::FetchContext;
use crate::credentials::CredentialContext;
use crate::error::Result;
use crate::pager::collect_pages;
use crate::subscription_type::{infer_subscription_type, normalize_spending_limit};
use crate::ApiConnector;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use vmsync_common::types::SubscriptionType;

/// Normalised subscription as returned by [`SubscriptionFetcher::fetch`].
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionRecord {
    pub subscription_id: String,
    pub display_name: String,
    pub state: String,
    pub policies: BTreeMap<String, String>,
    pub authorization_source: String,
    pub subscription_type: SubscriptionType,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub spending_limit: String,
}

/// Tenant-wide subscription listing.
pub struct SubscriptionFetcher {
    connector: Arc<dyn ApiConnector>,
}

impl SubscriptionFetcher {
    pub fn new(connector: Arc<dyn ApiConnector>) -> Self {
        Self { connector }
    }

    pub async fn fetch(
        &self,
        ctx: &FetchContext,
        credential: &CredentialContext,
    ) -> Result<Vec<SubscriptionRecord>> {
        credential.validate()?;
        let api = ctx.run(self.connector.connect(credential)).await?;

        let raw = collect_pages(ctx, "subscriptions", |link| {
            let api = Arc::clone(&api);
            async move { api.list_subscriptions(link).await }
        })
        .await?;

        let now = Utc::now();
        let records: Vec<SubscriptionRecord> = raw
            .into_iter()
            .filter_map(|sub| to_record(sub, now))
            .collect();

        tracing::info!(
            account = %credential.display_name,
            count = records.len(),
            "Fetched subscriptions"
        );
        Ok(records)
    }
}

/// `/subscriptions/{id}` → `id`.
pub fn subscription_id_from_resource_id(resource_id: &str) -> Option<String> {
    let parts: Vec<&str> = resource_id.split('/').collect();
    if parts.len() >= 3 && parts[1].eq_ignore_ascii_case("subscriptions") && !parts[2].is_empty() {
        Some(parts[2].to_string())
    } else {
        None
    }
}

fn to_record(sub: ArmSubscription, now: DateTime<Utc>) -> Option<SubscriptionRecord> {
    let subscription_id = if sub.subscription_id.is_empty() {
        subscription_id_from_resource_id(&sub.id)?
    } else {
        sub.subscription_id
    };

    let policies = sub.subscription_policies.unwrap_or_default();
    let spending_limit = normalize_spending_limit(&policies.spending_limit);
    let inferred = infer_subscription_type(&policies.quota_id, now);

    let mut policy_bag = BTreeMap::new();
    policy_bag.insert(
        "locationPlacementId".to_string(),
        policies.location_placement_id,
    );
    policy_bag.insert("quotaId".to_string(), policies.quota_id);
    policy_bag.insert("spendingLimit".to_string(), spending_limit.clone());

    Some(SubscriptionRecord {
        subscription_id,
        display_name: sub.display_name,
        state: sub.state,
        policies: policy_bag,
        authorization_source: sub.authorization_source,
        subscription_type: inferred.subscription_type,
        start_date: inferred.start_date,
        end_date: inferred.end_date,
        spending_limit,
    })
}
