//! [`FollowerSink`] – receives validated commands for the follower arm.
//!
//! A background task decodes every frame on the follower topic, stores the
//! newest command in a [`watch`] channel, and optionally drives a
//! [`JointWriter`].  Readers never block the receive task.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use telerelay_hal::JointWriter;
use telerelay_middleware::FrameSubscriber;
use telerelay_types::FollowerCommand;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, Default)]
struct SinkCounters {
    received: AtomicU64,
    decode_errors: AtomicU64,
    write_failures: AtomicU64,
}

/// Handle to a running follower receive task.
pub struct FollowerSink {
    latest: watch::Receiver<Option<FollowerCommand>>,
    counters: Arc<SinkCounters>,
    task: JoinHandle<()>,
}

impl FollowerSink {
    /// Start receiving from `subscriber` until `shutdown` turns `true` or
    /// the subscriber closes.
    ///
    /// When `writer` is given, every decoded command is applied to it.
    pub fn spawn(
        mut subscriber: Box<dyn FrameSubscriber>,
        mut writer: Option<Box<dyn JointWriter>>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Self {
        let (tx, latest) = watch::channel(None);
        let counters = Arc::new(SinkCounters::default());

        let task_counters = Arc::clone(&counters);
        let task = tokio::spawn(async move {
            info!(topic = %subscriber.topic(), "follower sink started");
            while !*shutdown.borrow() {
                tokio::select! {
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                    frame = subscriber.recv() => {
                        let Some(frame) = frame else {
                            warn!(topic = %subscriber.topic(), "follower subscription closed");
                            break;
                        };
                        let command = match frame.parse_json::<FollowerCommand>() {
                            Ok(command) => command,
                            Err(e) => {
                                task_counters.decode_errors.fetch_add(1, Ordering::Relaxed);
                                warn!(error = %e, "failed to decode follower command");
                                continue;
                            }
                        };
                        task_counters.received.fetch_add(1, Ordering::Relaxed);
                        debug!(seq = ?command.seq, "follower command received");

                        if let Some(writer) = writer.as_mut()
                            && let Err(e) = writer.write(&command)
                        {
                            task_counters.write_failures.fetch_add(1, Ordering::Relaxed);
                            warn!(error = %e, seq = ?command.seq, "follower write failed");
                        }
                        tx.send_replace(Some(command));
                    }
                }
            }
            info!("follower sink stopped");
        });

        Self {
            latest,
            counters,
            task,
        }
    }

    /// The newest command received, `None` before the first one.
    pub fn latest(&self) -> Option<FollowerCommand> {
        self.latest.borrow().clone()
    }

    /// Return the newest command, waiting up to `timeout` for the first one
    /// to arrive.
    pub async fn wait_for_command(&self, timeout: Duration) -> Option<FollowerCommand> {
        let mut rx = self.latest.clone();
        let command = match tokio::time::timeout(timeout, rx.wait_for(Option::is_some)).await {
            Ok(Ok(command)) => command.clone(),
            // Sender gone: the task exited, keep whatever it left behind.
            Ok(Err(_)) => self.latest(),
            Err(_) => {
                warn!(timeout_ms = timeout.as_millis() as u64, "timed out waiting for follower command");
                None
            }
        };
        command
    }

    /// A receiver that changes on every new command.
    pub fn watch(&self) -> watch::Receiver<Option<FollowerCommand>> {
        self.latest.clone()
    }

    /// Commands decoded successfully.
    pub fn received(&self) -> u64 {
        self.counters.received.load(Ordering::Relaxed)
    }

    /// Frames that could not be decoded.
    pub fn decode_errors(&self) -> u64 {
        self.counters.decode_errors.load(Ordering::Relaxed)
    }

    /// Commands the [`JointWriter`] rejected.
    pub fn write_failures(&self) -> u64 {
        self.counters.write_failures.load(Ordering::Relaxed)
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the receive task to exit.
    pub async fn join(self) {
        if let Err(e) = self.task.await {
            warn!(error = %e, "follower sink task failed");
        }
    }
}
