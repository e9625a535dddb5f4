//! Fixed-interval refresh for a `TabularView`.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::data::data_source::DataSource;
use crate::data::tabular_view::TabularView;

/// Owns a running poll. Cancelling or dropping the handle stops the task
/// at its next wake-up.
pub struct PollHandle {
    shutdown: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl PollHandle {
    pub fn cancel(&self) {
        let _ = self.shutdown.send(true);
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Cancel and wait for the task to exit
    pub async fn stop(mut self) {
        self.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "poll task ended abnormally");
            }
        }
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl<S: DataSource + 'static> TabularView<S> {
    /// Reload the current page every `every`, starting immediately.
    ///
    /// The task only holds a weak reference: once the view is torn down or
    /// every clone is dropped, the loop exits on its next tick.
    pub fn start_polling(&self, every: Duration) -> PollHandle {
        let (shutdown, mut stop) = watch::channel(false);
        let weak = self.downgrade();

        let task = tokio::spawn(async move {
            let mut tick = tokio::time::interval(every);
            tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                // a pending stop wins over a ready tick
                tokio::select! {
                    biased;
                    changed = stop.changed() => {
                        if changed.is_err() || *stop.borrow() {
                            break;
                        }
                        continue;
                    }
                    _ = tick.tick() => {}
                }

                let Some(shared) = weak.upgrade() else {
                    break;
                };
                let view = TabularView::from_shared(shared);
                if view.is_closed() {
                    break;
                }
                if let Err(e) = view.reload().await {
                    // keep polling; the view already recorded the failure
                    debug!(error = %e, "poll reload failed");
                }
            }
            debug!("poll loop exited");
        });

        PollHandle {
            shutdown,
            task: Some(task),
        }
    }
}
