use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "vm_sizes")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub location: String,
    pub name: String,
    pub cores: i32,
    pub memory_gb: f64,
    pub max_data_disks: i32,
    pub os_disk_size_mb: i64,
    pub resource_disk_size_mb: i64,
    pub family: String,
    pub category: String,
    pub available: bool,
    pub last_sync_at: DateTimeWithTimeZone,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
