//! Task handles for asynchronous sync runs.
//!
//! `spawn_sync` is the engine-side face of the external task layer's
//! sync trigger: it starts a run in the background and hands back a
//! handle the caller can poll, await, or cancel. Failure descriptions
//! carry the error display (remote URL, failing tag or digest) so a
//! failed task is diagnosable without server logs.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use harborsync_state::{RepositoryId, VersionRef};

use crate::remote::Remote;
use crate::sync::{CancelToken, SyncOrchestrator};

/// Lifecycle of one sync task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskState {
    Waiting,
    Running,
    Completed(VersionRef),
    Failed(String),
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Completed(_) | TaskState::Failed(_))
    }
}

/// Handle to a background sync run.
pub struct TaskHandle {
    id: Uuid,
    cancel: CancelToken,
    state: watch::Receiver<TaskState>,
    join: JoinHandle<()>,
}

impl TaskHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Snapshot of the current task state.
    pub fn state(&self) -> TaskState {
        self.state.borrow().clone()
    }

    /// Request cancellation. Honored at the next stage boundary; a run
    /// that already reached its commit finishes normally.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the task to reach a terminal state.
    pub async fn wait(mut self) -> TaskState {
        while !self.state.borrow().is_terminal() {
            if self.state.changed().await.is_err() {
                break;
            }
        }
        let state = self.state.borrow().clone();
        // The worker has already published its terminal state; reap it.
        let _ = self.join.await;
        state
    }
}

/// Start a sync run in the background and return its handle.
pub fn spawn_sync(
    orchestrator: Arc<SyncOrchestrator>,
    repository: RepositoryId,
    remote: Remote,
) -> TaskHandle {
    let id = Uuid::new_v4();
    let cancel = CancelToken::new();
    let (tx, rx) = watch::channel(TaskState::Waiting);

    let worker_cancel = cancel.clone();
    let join = tokio::spawn(async move {
        let _ = tx.send(TaskState::Running);
        match orchestrator.sync(repository, &remote, &worker_cancel).await {
            Ok(outcome) => {
                info!(task = %id, version = outcome.version.number,
                      changed = outcome.changed, "sync task completed");
                let _ = tx.send(TaskState::Completed(outcome.version));
            }
            Err(err) => {
                warn!(task = %id, error = %err, "sync task failed");
                let _ = tx.send(TaskState::Failed(err.to_string()));
            }
        }
    });

    TaskHandle {
        id,
        cancel,
        state: rx,
        join,
    }
}
