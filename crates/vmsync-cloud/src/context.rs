use crate::error::{CloudError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Deadline and cancellation scope shared by every remote call of one fetch.
///
/// Cloning shares the same token, [`FetchContext::child`] creates a scope
/// that is cancelled with its parent but can also be cancelled on its own.
#[derive(Debug, Clone)]
pub struct FetchContext {
    deadline: Instant,
    cancel: CancellationToken,
}

impl FetchContext {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            deadline: Instant::now() + timeout,
            cancel: CancellationToken::new(),
        }
    }

    /// Child scope whose deadline never exceeds the parent's.
    pub fn child(&self, timeout: Option<Duration>) -> Self {
        let deadline = match timeout {
            Some(t) => self.deadline.min(Instant::now() + t),
            None => self.deadline,
        };
        Self {
            deadline,
            cancel: self.cancel.child_token(),
        }
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Token cancelled together with this scope, for work that outlives the fetch.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.child_token()
    }

    /// Drive `fut` until it completes, the deadline passes or the scope is cancelled.
    pub async fn run<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        if self.cancel.is_cancelled() {
            return Err(CloudError::Cancelled);
        }
        if self.is_expired() {
            return Err(CloudError::Timeout);
        }

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(CloudError::Cancelled),
            res = tokio::time::timeout_at(self.deadline, fut) => match res {
                Ok(inner) => inner,
                Err(_) => Err(CloudError::Timeout),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn should_time_out_immediately_with_zero_timeout() {
        let ctx = FetchContext::with_timeout(Duration::ZERO);
        let res: Result<u32> = ctx.run(async { Ok(1) }).await;
        assert!(matches!(res, Err(CloudError::Timeout)));
    }

    #[tokio::test]
    async fn should_return_cancelled_when_parent_is_cancelled() {
        let parent = FetchContext::with_timeout(Duration::from_secs(30));
        let child = parent.child(None);
        parent.cancel();
        let res: Result<u32> = child.run(async { Ok(1) }).await;
        assert!(matches!(res, Err(CloudError::Cancelled)));
    }

    #[tokio::test]
    async fn should_time_out_slow_future() {
        let ctx = FetchContext::with_timeout(Duration::from_millis(20));
        let res: Result<u32> = ctx
            .run(async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(1)
            })
            .await;
        assert!(matches!(res, Err(CloudError::Timeout)));
    }

    #[tokio::test]
    async fn should_cancel_derived_token_with_scope() {
        let ctx = FetchContext::with_timeout(Duration::from_secs(30));
        let token = ctx.cancel_token();
        assert!(!token.is_cancelled());
        ctx.cancel();
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn should_cap_child_deadline_at_parent_deadline() {
        let parent = FetchContext::with_timeout(Duration::from_millis(50));
        let child = parent.child(Some(Duration::from_secs(60)));
        assert!(child.deadline() <= parent.deadline());
    }
}
