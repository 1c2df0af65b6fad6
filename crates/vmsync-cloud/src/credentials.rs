use crate::error::{CloudError, Result};

/// Service-principal identity for one account.
///
/// Built per sync from the stored account row and passed explicitly into every
/// fetcher call. The secret never appears in `Debug` output.
#[derive(Clone)]
pub struct CredentialContext {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
    pub display_name: String,
}

impl CredentialContext {
    pub fn new(
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            display_name: display_name.into(),
        }
    }

    /// Tenant, client id and secret must all be present.
    pub fn validate(&self) -> Result<()> {
        if self.tenant_id.trim().is_empty() {
            return Err(CloudError::Credential("tenant id is empty".to_string()));
        }
        if self.client_id.trim().is_empty() {
            return Err(CloudError::Credential("client id is empty".to_string()));
        }
        if self.client_secret.is_empty() {
            return Err(CloudError::Credential("client secret is empty".to_string()));
        }
        Ok(())
    }
}

impl std::fmt::Debug for CredentialContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialContext")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"***")
            .field("display_name", &self.display_name)
            .finish()
    }
}
