//! Azure account sync service: fetches subscriptions, virtual machines and
//! catalogs per account and reconciles them into the local store.

pub mod config;
pub mod error;
pub mod seed;
pub mod sync;

pub use error::{Result, SyncError};
pub use sync::catalog::CatalogSyncService;
pub use sync::dns::DnsLabelService;
pub use sync::orchestrator::AccountSyncOrchestrator;
pub use sync::subscription::SubscriptionSyncService;
pub use sync::vm::VmSyncService;
pub use sync::SyncEnv;
