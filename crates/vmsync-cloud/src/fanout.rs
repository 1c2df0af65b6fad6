use crate::context::FetchContext;
use crate::error::{CloudError, Result};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Results of a [`BoundedTaskGroup`] once every unit has finished.
#[derive(Debug)]
pub struct GroupOutcome<T> {
    pub completed: Vec<T>,
    pub failed: Vec<(String, CloudError)>,
    /// At least one unit was cut off by the deadline or cancellation.
    pub interrupted: bool,
}

/// Semaphore-bounded set of tasks sharing one deadline.
///
/// Every unit runs under the group's [`FetchContext`], so no unit outlives the
/// deadline. Units still queued on the semaphore when the deadline passes give
/// up without running. Dropping the group aborts whatever is still in flight.
pub struct BoundedTaskGroup<T> {
    ctx: FetchContext,
    semaphore: Arc<Semaphore>,
    tasks: JoinSet<(String, Result<T>)>,
}

impl<T: Send + 'static> BoundedTaskGroup<T> {
    pub fn new(ctx: &FetchContext, limit: usize) -> Self {
        Self {
            ctx: ctx.child(None),
            semaphore: Arc::new(Semaphore::new(limit.max(1))),
            tasks: JoinSet::new(),
        }
    }

    pub fn context(&self) -> &FetchContext {
        &self.ctx
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn spawn<F>(&mut self, label: impl Into<String>, unit: F)
    where
        F: Future<Output = Result<T>> + Send + 'static,
    {
        let label = label.into();
        let sem = Arc::clone(&self.semaphore);
        let ctx = self.ctx.clone();

        self.tasks.spawn(async move {
            let permit = ctx
                .run(async move {
                    sem.acquire_owned()
                        .await
                        .map_err(|_| CloudError::Cancelled)
                })
                .await;
            let result = match permit {
                Ok(_permit) => ctx.run(unit).await,
                Err(e) => Err(e),
            };
            (label, result)
        });
    }

    /// Wait for every unit. Failed units are reported, never propagated.
    pub async fn join(mut self) -> GroupOutcome<T> {
        let mut outcome = GroupOutcome {
            completed: Vec::with_capacity(self.tasks.len()),
            failed: Vec::new(),
            interrupted: false,
        };

        while let Some(joined) = self.tasks.join_next().await {
            match joined {
                Ok((_, Ok(value))) => outcome.completed.push(value),
                Ok((label, Err(e))) => {
                    if matches!(e, CloudError::Timeout | CloudError::Cancelled) {
                        outcome.interrupted = true;
                    }
                    outcome.failed.push((label, e));
                }
                Err(e) => {
                    tracing::error!(error = %e, "Fan-out task panicked");
                    outcome.failed.push(("<panicked>".to_string(), CloudError::Cancelled));
                }
            }
        }

        self.ctx.cancel();
        outcome
    }
}
