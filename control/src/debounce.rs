//! Trailing-edge debouncer
//!
//! Collapses a burst of `trigger()` calls into one run of a bound action,
//! started no earlier than `window` after the last call. The action always
//! runs on the same worker task, so two runs never overlap. A panicking run
//! is logged and the worker keeps serving later triggers.

use crate::apis::cache::ResourceKind;
use crate::apis::subscription::{ChangeEvent, ChangeListener};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace};

/// Handle used to request a run of the bound action
#[derive(Clone, Debug)]
pub struct Debouncer {
    notify: Arc<Notify>,
}

impl Debouncer {
    /// Spawn the worker task and return a trigger handle
    ///
    /// The worker exits once `cancel` fires. A pending trigger that has
    /// not fired yet is dropped; a run already in progress completes.
    pub fn spawn<F>(
        window: Duration,
        cancel: CancellationToken,
        action: F,
    ) -> (Self, JoinHandle<()>)
    where
        F: FnMut() + Send + 'static,
    {
        let notify = Arc::new(Notify::new());
        let handle = tokio::spawn(run_worker(Arc::clone(&notify), window, cancel, action));
        (Self { notify }, handle)
    }

    /// Request a run; cheap and safe from any task
    pub fn trigger(&self) {
        // notify_one stores at most one permit, so bursts collapse
        self.notify.notify_one();
    }
}

impl ChangeListener for Debouncer {
    fn on_change(&self, kind: ResourceKind, event: &ChangeEvent) {
        trace!("{} {}, scheduling rebuild", kind, event);
        self.trigger();
    }
}

async fn run_worker<F>(
    notify: Arc<Notify>,
    window: Duration,
    cancel: CancellationToken,
    mut action: F,
) where
    F: FnMut() + Send + 'static,
{
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = notify.notified() => {}
        }

        // Quiet period: every new trigger restarts the window
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Debouncer cancelled with a pending trigger");
                    return;
                }
                _ = notify.notified() => continue,
                _ = tokio::time::sleep(window) => break,
            }
        }

        if let Err(panic) = catch_unwind(AssertUnwindSafe(&mut action)) {
            error!("Debounced action panicked: {}", panic_message(panic.as_ref()));
        }
    }

    debug!("Debouncer stopped");
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic payload"
    }
}
