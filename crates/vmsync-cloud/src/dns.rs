use crate::arm::ArmDnsSettings;
use crate::context::FetchContext;
use crate::credentials::CredentialContext;
use crate::error::{CloudError, Result};
use crate::ApiConnector;
use std::sync::Arc;

/// Sets `dnsSettings.domainNameLabel` on a public IP and returns the FQDN
/// reported after the write.
pub struct DnsLabelSetter {
    connector: Arc<dyn ApiConnector>,
}

impl DnsLabelSetter {
    pub fn new(connector: Arc<dyn ApiConnector>) -> Self {
        Self { connector }
    }

    pub async fn set_label(
        &self,
        ctx: &FetchContext,
        credential: &CredentialContext,
        subscription_id: &str,
        resource_group: &str,
        public_ip_name: &str,
        label: &str,
    ) -> Result<String> {
        validate_dns_label(label)?;
        credential.validate()?;
        let api = ctx.run(self.connector.connect(credential)).await?;

        let public_ip_id = format!(
            "/subscriptions/{subscription_id}/resourceGroups/{resource_group}/providers/Microsoft.Network/publicIPAddresses/{public_ip_name}"
        );

        let mut public_ip = ctx.run(api.get_public_ip(&public_ip_id)).await?;
        let settings = public_ip
            .properties
            .dns_settings
            .get_or_insert_with(ArmDnsSettings::default);
        settings.domain_name_label = Some(label.to_string());
        settings.fqdn = None;

        ctx.run(api.put_public_ip(&public_ip)).await?;

        let refreshed = ctx.run(api.get_public_ip(&public_ip_id)).await?;
        let fqdn = refreshed
            .properties
            .dns_settings
            .and_then(|s| s.fqdn)
            .filter(|f| !f.is_empty())
            .unwrap_or_else(|| format!("{label}.{}.cloudapp.azure.com", refreshed.location));

        tracing::info!(
            subscription_id,
            resource_group,
            public_ip = public_ip_name,
            fqdn = %fqdn,
            "DNS label updated"
        );
        Ok(fqdn)
    }
}

/// 3-63 chars of lowercase letters, digits and hyphens, starting with a letter
/// and not ending with a hyphen.
pub fn validate_dns_label(label: &str) -> Result<()> {
    let valid_len = (3..=63).contains(&label.len());
    let valid_chars = label
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    let valid_start = label.chars().next().is_some_and(|c| c.is_ascii_lowercase());
    if valid_len && valid_chars && valid_start && !label.ends_with('-') {
        Ok(())
    } else {
        Err(CloudError::InvalidArgument(format!(
            "invalid DNS label: {label:?}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_validate_dns_labels() {
        assert!(validate_dns_label("web-01").is_ok());
        assert!(validate_dns_label("ab").is_err());
        assert!(validate_dns_label("Web").is_err());
        assert!(validate_dns_label("1web").is_err());
        assert!(validate_dns_label("web-").is_err());
        assert!(validate_dns_label("web_01").is_err());
    }
}
