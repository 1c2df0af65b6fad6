use crate::error::Result;
use crate::reconcile::Reconciler;
use crate::secret::SecretCipher;
use chrono::{DateTime, Utc};
use migration::{Migrator, MigratorTrait};
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection};
use std::path::Path;

pub mod account;
pub mod image;
pub mod region;
pub mod size;
pub mod subscription;
pub mod vm;

pub use account::AccountRow;
pub use image::{ImageRow, ImageTable};
pub use region::{RegionRow, RegionTable};
pub use size::{SizeRow, SizeTable};
pub use subscription::{SubscriptionRow, SubscriptionTable};
pub use vm::{VmFilter, VmRow, VmScope, VmTable, VM_SYNC_STATUS_STALE, VM_SYNC_STATUS_SYNCED};

/// 同步数据库的统一访问层。
///
/// 所有方法均为 `async fn`，底层使用 SeaORM + SQLite。
/// 资源表只通过 [`Reconciler`] 写入。
pub struct SyncStore {
    pub(crate) db: DatabaseConnection,
    pub(crate) cipher: SecretCipher,
    pub(crate) reconciler: Reconciler,
}

impl SyncStore {
    /// 连接并初始化数据库。
    ///
    /// - `db_url`：完整连接 URL，例如 `sqlite:///data/vmsync.db?mode=rwc`
    /// - `data_dir`：本地数据目录，存放 client secret 加密密钥文件
    ///
    /// 自动运行 `sea-orm-migration` 迁移。
    pub async fn new(db_url: &str, data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        let db = Database::connect(db_url).await?;

        if db_url.starts_with("sqlite:") {
            db.execute_unprepared("PRAGMA journal_mode=WAL;").await?;
        }

        Migrator::up(&db, None).await?;

        let cipher = SecretCipher::load_or_create(data_dir)?;
        tracing::info!(db_url = %db_url, "Initialized sync store");

        Ok(Self {
            db,
            cipher,
            reconciler: Reconciler::default(),
        })
    }

    /// Rows per reconciliation transaction.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.reconciler = Reconciler::new(chunk_size);
        self
    }

    pub(crate) fn db(&self) -> &DatabaseConnection {
        &self.db
    }
}

pub(crate) fn to_utc(dt: DateTimeWithTimeZone) -> DateTime<Utc> {
    dt.with_timezone(&Utc)
}

pub(crate) fn to_db(dt: DateTime<Utc>) -> DateTimeWithTimeZone {
    dt.fixed_offset()
}
