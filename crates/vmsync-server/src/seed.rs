use anyhow::Context;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use vmsync_common::types::SubscriptionStatus;
use vmsync_storage::{AccountRow, SyncStore};

// ---- Accounts seed file types (used by `seed-accounts` CLI subcommand) ----

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountsSeedFile {
    #[serde(default)]
    pub accounts: Vec<SeedAccount>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedAccount {
    pub user_id: String,
    pub login_email: String,
    #[serde(default)]
    pub display_name: String,
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
}

impl AccountsSeedFile {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read seed file '{path}'"))?;
        let seed: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse seed file '{path}'"))?;
        Ok(seed)
    }
}

/// 导入云账号。
///
/// 按 `(user_id, login_email)` 幂等：已存在的账号只更新名称与凭据，
/// 保留同步状态与 VM 计数。返回写入的账号数。
pub async fn seed_accounts(store: &SyncStore, seed: &AccountsSeedFile) -> anyhow::Result<usize> {
    let mut synced = 0usize;
    for def in &seed.accounts {
        if def.user_id.trim().is_empty() || def.login_email.trim().is_empty() {
            tracing::warn!(
                login_email = %def.login_email,
                "Seed account missing user_id or login_email, skipping"
            );
            continue;
        }

        let now = Utc::now();
        let display_name = if def.display_name.is_empty() {
            def.login_email.clone()
        } else {
            def.display_name.clone()
        };
        let existing = store
            .find_account_by_email(&def.user_id, &def.login_email)
            .await?;

        let row = AccountRow {
            id: existing
                .as_ref()
                .map(|a| a.id.clone())
                .unwrap_or_else(vmsync_common::id::next_id),
            user_id: def.user_id.clone(),
            login_email: def.login_email.clone(),
            display_name,
            tenant_id: def.tenant_id.clone(),
            client_id: def.client_id.clone(),
            client_secret: def.client_secret.clone(),
            subscription_status: SubscriptionStatus::Normal,
            vm_count: 0,
            created_at: now,
            updated_at: now,
        };

        if let Some(existing) = existing {
            store
                .update_account_credentials(&existing.id, &row)
                .await
                .with_context(|| format!("Failed to update account {}", def.login_email))?;
            tracing::info!(
                id = %existing.id,
                login_email = %def.login_email,
                "Updated seed account"
            );
        } else {
            store
                .insert_account(&row)
                .await
                .with_context(|| format!("Failed to insert account {}", def.login_email))?;
            tracing::info!(id = %row.id, login_email = %def.login_email, "Inserted seed account");
        }
        synced += 1;
    }

    tracing::info!(synced, total = seed.accounts.len(), "Seed accounts imported");
    Ok(synced)
}
