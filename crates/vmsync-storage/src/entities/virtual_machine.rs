use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "virtual_machines")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    #[sea_orm(unique)]
    pub vm_id: String,
    pub account_id: String,
    pub subscription_id: String,
    pub name: String,
    pub resource_group: String,
    pub location: String,
    pub vm_size: String,
    pub provisioning_state: String,
    pub power_state: String,
    /// JSON array
    pub private_ips: String,
    /// JSON array
    pub public_ips: String,
    pub public_ip_name: String,
    pub os_type: String,
    pub os_image: String,
    pub cores: i32,
    pub memory_gb: f64,
    pub dns_alias: String,
    pub os_disk_size_gb: Option<i32>,
    /// JSON array of data disks
    pub data_disks: String,
    /// JSON object
    pub tags: String,
    pub sync_status: String,
    pub last_sync_at: DateTimeWithTimeZone,
    pub remote_created_at: Option<DateTimeWithTimeZone>,
    pub deleted_at: Option<DateTimeWithTimeZone>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
