//! Generic diff-and-apply of a fetched snapshot against the persisted one.
//!
//! For one scope: load every persisted row (removed ones included), match
//! fresh rows by key, update the matches, insert the rest and apply the
//! removal policy to persisted keys that were not fetched. Writes are chunked;
//! each chunk is one transaction and the removals ride in the last chunk, so a
//! snapshot that fits in one chunk is applied atomically. The caller's
//! [`ReconcileBudget`] is checked before every chunk.

use crate::error::{Result, StorageError};
use chrono::{DateTime, Utc};
use sea_orm::{DatabaseConnection, DatabaseTransaction, TransactionTrait};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_CHUNK_SIZE: usize = 100;

/// What happens to persisted rows whose key is absent from the fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RemovalPolicy {
    /// Leave them untouched.
    #[default]
    Retain,
    /// Stamp `deleted_at`; a later fetch of the same key clears it.
    SoftDelete,
    /// Clear the enabled/available flag; a later fetch sets it again.
    Disable,
}

/// Deadline and cancellation a reconciliation runs under.
///
/// Once exhausted no further chunk is started; chunks already committed stay.
#[derive(Debug, Clone)]
pub struct ReconcileBudget {
    deadline: Option<Instant>,
    cancel: CancellationToken,
}

impl Default for ReconcileBudget {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl ReconcileBudget {
    pub fn new(deadline: Instant, cancel: CancellationToken) -> Self {
        Self {
            deadline: Some(deadline),
            cancel,
        }
    }

    pub fn unbounded() -> Self {
        Self {
            deadline: None,
            cancel: CancellationToken::new(),
        }
    }

    fn exhausted(&self) -> Option<&'static str> {
        if self.cancel.is_cancelled() {
            return Some("cancelled");
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some("deadline exceeded"),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileOutcome {
    pub inserted: usize,
    pub updated: usize,
    pub removed: usize,
}

/// One resource table as seen by the [`Reconciler`].
#[async_trait::async_trait]
pub trait ReconcileTarget: Send + Sync {
    type Row: Clone + Send + Sync + 'static;
    type Scope: Send + Sync;

    const KIND: &'static str;

    fn key(row: &Self::Row) -> String;

    /// Already soft-deleted or disabled.
    fn is_removed(row: &Self::Row) -> bool;

    async fn load_scope(
        &self,
        db: &DatabaseConnection,
        scope: &Self::Scope,
    ) -> Result<Vec<Self::Row>>;

    async fn insert_batch(&self, txn: &DatabaseTransaction, rows: &[Self::Row]) -> Result<()>;

    /// Copy the fields the fetch owns from `fresh` onto `existing` and restore it.
    async fn update_row(
        &self,
        txn: &DatabaseTransaction,
        existing: &Self::Row,
        fresh: &Self::Row,
        now: DateTime<Utc>,
    ) -> Result<()>;

    async fn mark_removed(
        &self,
        txn: &DatabaseTransaction,
        rows: &[Self::Row],
        policy: RemovalPolicy,
        now: DateTime<Utc>,
    ) -> Result<u64>;
}

/// Row-level changes computed before anything is written.
#[derive(Debug, Clone)]
pub struct ReconcilePlan<R> {
    pub inserts: Vec<R>,
    /// (persisted, fresh)
    pub updates: Vec<(R, R)>,
    pub removals: Vec<R>,
}

impl<R> ReconcilePlan<R> {
    pub fn is_empty(&self) -> bool {
        self.inserts.is_empty() && self.updates.is_empty() && self.removals.is_empty()
    }
}

/// Pure diff. Duplicate fresh keys collapse to the last occurrence.
pub fn plan<T: ReconcileTarget>(
    persisted: Vec<T::Row>,
    fresh: Vec<T::Row>,
    policy: RemovalPolicy,
) -> ReconcilePlan<T::Row> {
    let mut fresh_index: HashMap<String, usize> = HashMap::new();
    let mut deduped: Vec<T::Row> = Vec::with_capacity(fresh.len());
    for row in fresh {
        let key = T::key(&row);
        match fresh_index.get(&key) {
            Some(&i) => deduped[i] = row,
            None => {
                fresh_index.insert(key, deduped.len());
                deduped.push(row);
            }
        }
    }

    let mut persisted_by_key: HashMap<String, T::Row> = HashMap::with_capacity(persisted.len());
    for row in persisted {
        persisted_by_key.insert(T::key(&row), row);
    }

    let mut inserts = Vec::new();
    let mut updates = Vec::new();
    let mut seen = HashSet::with_capacity(deduped.len());
    for row in deduped {
        let key = T::key(&row);
        match persisted_by_key.get(&key) {
            Some(existing) => updates.push((existing.clone(), row)),
            None => inserts.push(row),
        }
        seen.insert(key);
    }

    let removals = if policy == RemovalPolicy::Retain {
        Vec::new()
    } else {
        persisted_by_key
            .into_iter()
            .filter(|(key, row)| !seen.contains(key) && !T::is_removed(row))
            .map(|(_, row)| row)
            .collect()
    };

    ReconcilePlan {
        inserts,
        updates,
        removals,
    }
}

enum Op<R> {
    Insert(R),
    Update(R, R),
}

#[derive(Debug, Clone, Copy)]
pub struct Reconciler {
    chunk_size: usize,
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE)
    }
}

impl Reconciler {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub async fn reconcile<T: ReconcileTarget>(
        &self,
        db: &DatabaseConnection,
        target: &T,
        scope: &T::Scope,
        fresh: Vec<T::Row>,
        policy: RemovalPolicy,
        budget: &ReconcileBudget,
    ) -> Result<ReconcileOutcome> {
        let persisted = target.load_scope(db, scope).await?;
        let plan = plan::<T>(persisted, fresh, policy);
        let mut outcome = ReconcileOutcome::default();
        if plan.is_empty() {
            return Ok(outcome);
        }

        let mut ops: Vec<Op<T::Row>> =
            Vec::with_capacity(plan.inserts.len() + plan.updates.len());
        ops.extend(plan.inserts.into_iter().map(Op::Insert));
        ops.extend(plan.updates.into_iter().map(|(old, new)| Op::Update(old, new)));
        let removals = plan.removals;

        let empty: &[Op<T::Row>] = &[];
        let chunks: Vec<&[Op<T::Row>]> = if ops.is_empty() {
            vec![empty]
        } else {
            ops.chunks(self.chunk_size).collect()
        };
        let total = chunks.len();
        let last = total - 1;

        for (index, chunk) in chunks.into_iter().enumerate() {
            if let Some(reason) = budget.exhausted() {
                tracing::warn!(
                    kind = T::KIND,
                    chunk = index,
                    committed_inserts = outcome.inserted,
                    committed_updates = outcome.updated,
                    reason,
                    "Reconciliation stopped before chunk"
                );
                return Err(StorageError::Persistence {
                    kind: T::KIND,
                    message: format!("{reason} after {index} of {total} chunks"),
                });
            }
            let removal_rows: &[T::Row] = if index == last {
                removals.as_slice()
            } else {
                &[]
            };
            match self
                .apply_chunk(db, target, chunk, removal_rows, policy)
                .await
            {
                Ok((inserted, updated, removed)) => {
                    outcome.inserted += inserted;
                    outcome.updated += updated;
                    outcome.removed += removed;
                }
                Err(e) => {
                    tracing::error!(
                        kind = T::KIND,
                        chunk = index,
                        committed_inserts = outcome.inserted,
                        committed_updates = outcome.updated,
                        error = %e,
                        "Reconciliation chunk rolled back"
                    );
                    return Err(StorageError::Persistence {
                        kind: T::KIND,
                        message: e.to_string(),
                    });
                }
            }
        }

        tracing::debug!(
            kind = T::KIND,
            inserted = outcome.inserted,
            updated = outcome.updated,
            removed = outcome.removed,
            "Reconciled"
        );
        Ok(outcome)
    }

    async fn apply_chunk<T: ReconcileTarget>(
        &self,
        db: &DatabaseConnection,
        target: &T,
        chunk: &[Op<T::Row>],
        removals: &[T::Row],
        policy: RemovalPolicy,
    ) -> Result<(usize, usize, usize)> {
        let now = Utc::now();
        let txn = db.begin().await?;

        let inserts: Vec<T::Row> = chunk
            .iter()
            .filter_map(|op| match op {
                Op::Insert(row) => Some(row.clone()),
                Op::Update(..) => None,
            })
            .collect();
        if !inserts.is_empty() {
            target.insert_batch(&txn, &inserts).await?;
        }

        let mut updated = 0usize;
        for op in chunk {
            if let Op::Update(existing, fresh) = op {
                target.update_row(&txn, existing, fresh, now).await?;
                updated += 1;
            }
        }

        let removed = if removals.is_empty() {
            0
        } else {
            target.mark_removed(&txn, removals, policy, now).await? as usize
        };

        txn.commit().await?;
        Ok((inserts.len(), updated, removed))
    }
}
