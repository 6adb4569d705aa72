//! Job cancellation: typed causes, parent/child contexts and wait-for-completion tokens.

mod registry;
pub use registry::{CancelKey, CancelRegistry};

use std::{
    fmt,
    sync::{Arc, OnceLock},
    time::Duration,
};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// How often [`CancelToken::cancel_and_wait`] wakes up while the job is still draining.
const WAIT_POLL: Duration = Duration::from_millis(100);

/// Why a job context was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelCause {
    /// A termination request for the job's cohort.
    Terminate,
    /// The scheduler is shutting down.
    Shutdown,
}

impl fmt::Display for CancelCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CancelCause::Terminate => "terminate",
            CancelCause::Shutdown => "shutdown",
        })
    }
}

struct Node {
    token: CancellationToken,
    cause: OnceLock<CancelCause>,
    parent: Option<JobContext>,
}

/// Cancellation context handed to handlers.
///
/// Cancelling a context cancels every context derived from it; [`cause`](Self::cause) reports the
/// nearest cause recorded on the way up, defaulting to [`CancelCause::Shutdown`] for the root.
#[derive(Clone)]
pub struct JobContext {
    node: Arc<Node>,
}

impl JobContext {
    pub fn root(token: CancellationToken) -> Self {
        Self {
            node: Arc::new(Node {
                token,
                cause: OnceLock::new(),
                parent: None,
            }),
        }
    }

    pub fn child(&self) -> Self {
        Self {
            node: Arc::new(Node {
                token: self.node.token.child_token(),
                cause: OnceLock::new(),
                parent: Some(self.clone()),
            }),
        }
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.node.token.is_cancelled()
    }

    pub async fn cancelled(&self) {
        self.node.token.cancelled().await
    }

    #[inline]
    pub fn token(&self) -> &CancellationToken {
        &self.node.token
    }

    /// `None` while the context is live.
    pub fn cause(&self) -> Option<CancelCause> {
        if !self.is_cancelled() {
            return None;
        }
        let mut node = Some(self);
        while let Some(ctx) = node {
            if let Some(cause) = ctx.node.cause.get() {
                return Some(*cause);
            }
            node = ctx.node.parent.as_ref();
        }
        Some(CancelCause::Shutdown)
    }

    /// Record `cause` (first one wins) and cancel.
    pub fn cancel(&self, cause: CancelCause) {
        let _ = self.node.cause.set(cause);
        self.node.token.cancel();
    }
}

impl fmt::Debug for JobContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobContext")
            .field("cancelled", &self.is_cancelled())
            .field("cause", &self.cause())
            .finish()
    }
}

/// Handle that cancels one job and waits until the job reports it is done.
#[derive(Debug)]
pub struct CancelToken {
    ctx: JobContext,
    done: watch::Sender<bool>,
}

impl CancelToken {
    /// Derive a child context of `parent` together with its token.
    pub fn new(parent: &JobContext) -> (JobContext, Arc<CancelToken>) {
        let ctx = parent.child();
        let (done, _) = watch::channel(false);
        let token = Arc::new(CancelToken {
            ctx: ctx.clone(),
            done,
        });
        (ctx, token)
    }

    pub fn context(&self) -> &JobContext {
        &self.ctx
    }

    /// Mark the job as finished. Safe to call any number of times.
    pub fn signal_done(&self) {
        self.done.send_replace(true);
    }

    pub fn is_done(&self) -> bool {
        *self.done.borrow()
    }

    /// Cancel with `cause`, then wait until [`signal_done`](Self::signal_done) has been called.
    pub async fn cancel_and_wait(&self, cause: CancelCause) {
        self.ctx.cancel(cause);

        let mut rx = self.done.subscribe();
        loop {
            match tokio::time::timeout(WAIT_POLL, rx.wait_for(|done| *done)).await {
                Ok(_) => return,
                Err(_) => trace!(%cause, "job still draining after cancel"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn cause_is_inherited_from_parent() {
        let root = JobContext::root(CancellationToken::new());
        let (cohort, _) = CancelToken::new(&root);
        let (job, _) = CancelToken::new(&cohort);

        assert_eq!(job.cause(), None);
        cohort.cancel(CancelCause::Terminate);

        assert!(job.is_cancelled());
        assert_eq!(job.cause(), Some(CancelCause::Terminate));
        assert!(!root.is_cancelled());
    }

    #[test]
    fn root_cancellation_defaults_to_shutdown() {
        let token = CancellationToken::new();
        let root = JobContext::root(token.clone());
        let job = root.child();

        token.cancel();
        assert_eq!(job.cause(), Some(CancelCause::Shutdown));
    }

    #[test]
    fn first_cause_wins() {
        let root = JobContext::root(CancellationToken::new());
        root.cancel(CancelCause::Terminate);
        root.cancel(CancelCause::Shutdown);
        assert_eq!(root.cause(), Some(CancelCause::Terminate));
    }

    #[tokio::test]
    async fn cancel_and_wait_returns_after_signal_done() {
        let root = JobContext::root(CancellationToken::new());
        let (ctx, token) = CancelToken::new(&root);
        let finished = Arc::new(AtomicBool::new(false));

        let job = {
            let token = Arc::clone(&token);
            let finished = Arc::clone(&finished);
            tokio::spawn(async move {
                ctx.cancelled().await;
                tokio::time::sleep(Duration::from_millis(250)).await;
                finished.store(true, Ordering::SeqCst);
                token.signal_done();
            })
        };

        token.cancel_and_wait(CancelCause::Terminate).await;
        assert!(finished.load(Ordering::SeqCst));
        assert!(token.is_done());
        job.await.unwrap();
    }

    #[tokio::test]
    async fn cancel_and_wait_on_finished_job_returns_immediately() {
        let root = JobContext::root(CancellationToken::new());
        let (_ctx, token) = CancelToken::new(&root);
        token.signal_done();
        token.signal_done();

        tokio::time::timeout(
            Duration::from_millis(50),
            token.cancel_and_wait(CancelCause::Terminate),
        )
        .await
        .unwrap();
    }
}
