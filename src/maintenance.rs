//! Owned periodic background tasks.
//!
//! A [`MaintenanceTask`] holds only a weak reference to the state it
//! maintains, so it never keeps its owner alive. It is aborted by
//! [`MaintenanceTask::shutdown`] or when dropped.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Repeating background job tied to the lifetime of its owner.
#[derive(Debug)]
pub struct MaintenanceTask {
    name: &'static str,
    handle: Option<JoinHandle<()>>,
}

impl MaintenanceTask {
    /// Spawns `tick` every `period` on the current tokio runtime.
    ///
    /// The first run happens one full period after spawning. Outside a
    /// runtime nothing is spawned and the returned task is inert.
    pub fn spawn<T, F, Fut>(name: &'static str, owner: &Arc<T>, period: Duration, mut tick: F) -> Self
    where
        T: Send + Sync + 'static,
        F: FnMut(Arc<T>) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let weak = Arc::downgrade(owner);

        let handle = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => Some(runtime.spawn(async move {
                let mut interval = tokio::time::interval(period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                // first tick resolves immediately
                interval.tick().await;

                loop {
                    interval.tick().await;
                    let Some(owner) = weak.upgrade() else {
                        break;
                    };
                    tick(owner).await;
                }

                tracing::debug!(task = name, "Owner dropped, maintenance task exiting");
            })),
            Err(_) => {
                tracing::warn!(task = name, "No tokio runtime available, maintenance disabled");
                None
            }
        };

        Self { name, handle }
    }

    /// Task name, for logging.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Whether the background job is still scheduled.
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stops the background job. Idempotent.
    pub fn shutdown(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            tracing::debug!(task = self.name, "Maintenance task stopped");
        }
    }
}

impl Drop for MaintenanceTask {
    fn drop(&mut self) {
        self.shutdown();
    }
}
