use super::{credential_for, SyncEnv};
use crate::error::Result;
use vmsync_cloud::dns::DnsLabelSetter;
use vmsync_cloud::FetchContext;

/// 设置公网 IP 的 DNS 标签，不经过对账流程
pub struct DnsLabelService {
    env: SyncEnv,
}

impl DnsLabelService {
    pub fn new(env: SyncEnv) -> Self {
        Self { env }
    }

    /// 返回生效后的 FQDN，并刷新引用该公网 IP 的 VM 的 DNS 别名
    #[allow(clippy::too_many_arguments)]
    pub async fn set_dns_label(
        &self,
        ctx: &FetchContext,
        user_id: &str,
        account_id: &str,
        subscription_id: &str,
        resource_group: &str,
        public_ip_name: &str,
        label: &str,
    ) -> Result<String> {
        let account = self.env.authorize(user_id, account_id).await?;
        self.env
            .authorize_subscription(&account, subscription_id)
            .await?;
        let credential = credential_for(&account);

        let setter = DnsLabelSetter::new(self.env.connector.clone());
        let fqdn = setter
            .set_label(
                ctx,
                &credential,
                subscription_id,
                resource_group,
                public_ip_name,
                label,
            )
            .await?;

        match self
            .env
            .store
            .update_dns_alias_by_public_ip(
                &account.id,
                subscription_id,
                resource_group,
                public_ip_name,
                &fqdn,
            )
            .await
        {
            Ok(updated) => {
                tracing::debug!(
                    account_id = %account.id,
                    public_ip = public_ip_name,
                    vms = updated,
                    "Refreshed VM DNS aliases"
                );
            }
            Err(e) => {
                tracing::warn!(
                    account_id = %account.id,
                    public_ip = public_ip_name,
                    error = %e,
                    "DNS label set but VM alias refresh failed"
                );
            }
        }
        Ok(fqdn)
    }
}
