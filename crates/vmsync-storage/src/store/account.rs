use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, Order, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect,
};
use serde::{Deserialize, Serialize};
use vmsync_common::types::{ListQuery, ListResult, SubscriptionStatus};

use super::{to_db, to_utc, SyncStore};
use crate::entities::account::{self, Column as AcctCol, Entity as AcctEntity};
use crate::error::{Result, StorageError};

/// 云账号数据行（`client_secret` 为明文，仅在存储层加解密）
#[derive(Clone, Serialize, Deserialize)]
pub struct AccountRow {
    pub id: String,
    pub user_id: String,
    pub login_email: String,
    pub display_name: String,
    pub tenant_id: String,
    pub client_id: String,
    #[serde(skip_serializing)]
    pub client_secret: String,
    pub subscription_status: SubscriptionStatus,
    pub vm_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl std::fmt::Debug for AccountRow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountRow")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("login_email", &self.login_email)
            .field("display_name", &self.display_name)
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("subscription_status", &self.subscription_status)
            .field("vm_count", &self.vm_count)
            .finish_non_exhaustive()
    }
}

impl SyncStore {
    fn model_to_account(&self, m: account::Model) -> Result<AccountRow> {
        let client_secret = self.cipher.decrypt(&m.client_secret)?;
        Ok(AccountRow {
            client_secret,
            subscription_status: m.subscription_status.parse().unwrap_or_default(),
            created_at: to_utc(m.created_at),
            updated_at: to_utc(m.updated_at),
            id: m.id,
            user_id: m.user_id,
            login_email: m.login_email,
            display_name: m.display_name,
            tenant_id: m.tenant_id,
            client_id: m.client_id,
            vm_count: m.vm_count,
        })
    }

    // ---- accounts ----

    pub async fn insert_account(&self, row: &AccountRow) -> Result<AccountRow> {
        let now = Utc::now();
        let am = account::ActiveModel {
            id: Set(row.id.clone()),
            user_id: Set(row.user_id.clone()),
            login_email: Set(row.login_email.clone()),
            display_name: Set(row.display_name.clone()),
            tenant_id: Set(row.tenant_id.clone()),
            client_id: Set(row.client_id.clone()),
            client_secret: Set(self.cipher.encrypt(&row.client_secret)?),
            subscription_status: Set(row.subscription_status.to_string()),
            vm_count: Set(row.vm_count),
            created_at: Set(to_db(now)),
            updated_at: Set(to_db(now)),
        };
        let model = am.insert(self.db()).await?;
        self.model_to_account(model)
    }

    /// Replaces identity and credential fields, keeps status and VM count.
    pub async fn update_account_credentials(
        &self,
        id: &str,
        row: &AccountRow,
    ) -> Result<AccountRow> {
        let model = AcctEntity::find_by_id(id).one(self.db()).await?;
        let m = model.ok_or_else(|| StorageError::NotFound {
            entity: "account",
            id: id.to_string(),
        })?;
        let mut am: account::ActiveModel = m.into();
        am.display_name = Set(row.display_name.clone());
        am.tenant_id = Set(row.tenant_id.clone());
        am.client_id = Set(row.client_id.clone());
        am.client_secret = Set(self.cipher.encrypt(&row.client_secret)?);
        am.updated_at = Set(to_db(Utc::now()));
        let updated = am.update(self.db()).await?;
        self.model_to_account(updated)
    }

    pub async fn get_account(&self, id: &str) -> Result<Option<AccountRow>> {
        let model = AcctEntity::find_by_id(id).one(self.db()).await?;
        model.map(|m| self.model_to_account(m)).transpose()
    }

    pub async fn find_account_by_email(
        &self,
        user_id: &str,
        login_email: &str,
    ) -> Result<Option<AccountRow>> {
        let model = AcctEntity::find()
            .filter(AcctCol::UserId.eq(user_id))
            .filter(AcctCol::LoginEmail.eq(login_email))
            .one(self.db())
            .await?;
        model.map(|m| self.model_to_account(m)).transpose()
    }

    pub async fn list_accounts(
        &self,
        user_id: &str,
        query: ListQuery,
    ) -> Result<ListResult<AccountRow>> {
        let base = AcctEntity::find().filter(AcctCol::UserId.eq(user_id));
        let total = base.clone().count(self.db()).await?;
        let models = base
            .order_by(AcctCol::CreatedAt, Order::Desc)
            .limit(query.limit)
            .offset(query.offset)
            .all(self.db())
            .await?;
        let items = models
            .into_iter()
            .map(|m| self.model_to_account(m))
            .collect::<Result<Vec<_>>>()?;
        Ok(ListResult { items, total })
    }

    pub async fn update_subscription_status(
        &self,
        id: &str,
        status: SubscriptionStatus,
    ) -> Result<()> {
        let res = AcctEntity::update_many()
            .col_expr(
                AcctCol::SubscriptionStatus,
                sea_orm::sea_query::Expr::value(status.to_string()),
            )
            .col_expr(
                AcctCol::UpdatedAt,
                sea_orm::sea_query::Expr::value(to_db(Utc::now())),
            )
            .filter(AcctCol::Id.eq(id))
            .exec(self.db())
            .await?;
        if res.rows_affected == 0 {
            return Err(StorageError::NotFound {
                entity: "account",
                id: id.to_string(),
            });
        }
        Ok(())
    }

    pub async fn update_vm_count(&self, id: &str, vm_count: i64) -> Result<()> {
        let res = AcctEntity::update_many()
            .col_expr(AcctCol::VmCount, sea_orm::sea_query::Expr::value(vm_count))
            .col_expr(
                AcctCol::UpdatedAt,
                sea_orm::sea_query::Expr::value(to_db(Utc::now())),
            )
            .filter(AcctCol::Id.eq(id))
            .exec(self.db())
            .await?;
        if res.rows_affected == 0 {
            return Err(StorageError::NotFound {
                entity: "account",
                id: id.to_string(),
            });
        }
        Ok(())
    }
}
