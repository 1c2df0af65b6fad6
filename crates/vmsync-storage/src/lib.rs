//! Local mirror of cloud accounts and their synced resources.
//!
//! [`SyncStore`] owns the SeaORM connection. Resource tables are written only
//! through [`reconcile::Reconciler`]; account rows are created by the seed
//! flow and touched by syncs only for status and VM count.

pub mod entities;
pub mod error;
pub mod reconcile;
pub mod secret;
mod store;


pub use reconcile::{ReconcileBudget, ReconcileOutcome, RemovalPolicy};
pub use store::*;
