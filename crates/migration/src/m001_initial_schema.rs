use sea_orm_migration::prelude::*;

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m001_initial_schema"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // accounts 先建，其余表按 account_id 归属
        manager.get_connection().execute_unprepared(UP_SQL).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared(DOWN_SQL)
            .await?;
        Ok(())
    }
}

const UP_SQL: &str = "
PRAGMA journal_mode=WAL;

CREATE TABLE IF NOT EXISTS accounts (
    id TEXT PRIMARY KEY NOT NULL,
    user_id TEXT NOT NULL,
    login_email TEXT NOT NULL,
    display_name TEXT NOT NULL,
    tenant_id TEXT NOT NULL,
    client_id TEXT NOT NULL,
    client_secret TEXT NOT NULL,
    subscription_status TEXT NOT NULL DEFAULT 'normal',
    vm_count INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE(user_id, login_email)
);
CREATE INDEX IF NOT EXISTS idx_accounts_user_id ON accounts(user_id);

CREATE TABLE IF NOT EXISTS subscriptions (
    id TEXT PRIMARY KEY NOT NULL,
    account_id TEXT NOT NULL,
    subscription_id TEXT NOT NULL,
    display_name TEXT NOT NULL,
    state TEXT NOT NULL,
    policies TEXT NOT NULL DEFAULT '{}',
    authorization_source TEXT NOT NULL DEFAULT '',
    subscription_type TEXT NOT NULL DEFAULT 'Other',
    start_date TEXT,
    end_date TEXT,
    spending_limit TEXT NOT NULL DEFAULT '',
    last_sync_at TEXT NOT NULL,
    deleted_at TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE(account_id, subscription_id)
);
CREATE INDEX IF NOT EXISTS idx_subscriptions_account_id ON subscriptions(account_id);

CREATE TABLE IF NOT EXISTS virtual_machines (
    id TEXT PRIMARY KEY NOT NULL,
    vm_id TEXT NOT NULL UNIQUE,
    account_id TEXT NOT NULL,
    subscription_id TEXT NOT NULL,
    name TEXT NOT NULL,
    resource_group TEXT NOT NULL,
    location TEXT NOT NULL,
    vm_size TEXT NOT NULL,
    provisioning_state TEXT NOT NULL,
    power_state TEXT NOT NULL,
    private_ips TEXT NOT NULL DEFAULT '[]',
    public_ips TEXT NOT NULL DEFAULT '[]',
    public_ip_name TEXT NOT NULL DEFAULT '',
    os_type TEXT NOT NULL DEFAULT '',
    os_image TEXT NOT NULL DEFAULT '',
    cores INTEGER NOT NULL DEFAULT 0,
    memory_gb REAL NOT NULL DEFAULT 0,
    dns_alias TEXT NOT NULL DEFAULT '',
    os_disk_size_gb INTEGER,
    data_disks TEXT NOT NULL DEFAULT '[]',
    tags TEXT NOT NULL DEFAULT '{}',
    sync_status TEXT NOT NULL DEFAULT 'synced',
    last_sync_at TEXT NOT NULL,
    remote_created_at TEXT,
    deleted_at TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_virtual_machines_account_id ON virtual_machines(account_id);
CREATE INDEX IF NOT EXISTS idx_virtual_machines_subscription ON virtual_machines(account_id, subscription_id);

CREATE TABLE IF NOT EXISTS vm_regions (
    id TEXT PRIMARY KEY NOT NULL,
    name TEXT NOT NULL UNIQUE,
    display_name TEXT NOT NULL,
    regional_display_name TEXT NOT NULL DEFAULT '',
    region_type TEXT NOT NULL DEFAULT '',
    category TEXT NOT NULL DEFAULT '',
    geography TEXT NOT NULL DEFAULT '',
    geography_group TEXT NOT NULL DEFAULT '',
    enabled INTEGER NOT NULL DEFAULT 1,
    last_sync_at TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS vm_images (
    id TEXT PRIMARY KEY NOT NULL,
    location TEXT NOT NULL,
    publisher TEXT NOT NULL,
    offer TEXT NOT NULL,
    sku TEXT NOT NULL,
    version TEXT NOT NULL,
    os_type TEXT NOT NULL DEFAULT '',
    display_name TEXT NOT NULL DEFAULT '',
    enabled INTEGER NOT NULL DEFAULT 1,
    last_sync_at TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE(location, publisher, offer, sku)
);
CREATE INDEX IF NOT EXISTS idx_vm_images_location ON vm_images(location);

CREATE TABLE IF NOT EXISTS vm_sizes (
    id TEXT PRIMARY KEY NOT NULL,
    location TEXT NOT NULL,
    name TEXT NOT NULL,
    cores INTEGER NOT NULL,
    memory_gb REAL NOT NULL,
    max_data_disks INTEGER NOT NULL DEFAULT 0,
    os_disk_size_mb INTEGER NOT NULL DEFAULT 0,
    resource_disk_size_mb INTEGER NOT NULL DEFAULT 0,
    family TEXT NOT NULL DEFAULT '',
    category TEXT NOT NULL DEFAULT '',
    available INTEGER NOT NULL DEFAULT 1,
    last_sync_at TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE(location, name)
);
CREATE INDEX IF NOT EXISTS idx_vm_sizes_location ON vm_sizes(location);
";

const DOWN_SQL: &str = "
DROP TABLE IF EXISTS vm_sizes;
DROP TABLE IF EXISTS vm_images;
DROP TABLE IF EXISTS vm_regions;
DROP TABLE IF EXISTS virtual_machines;
DROP TABLE IF EXISTS subscriptions;
DROP TABLE IF EXISTS accounts;
";
