// [apps/gateway/src/audit_buffer.rs]
//! Optional async audit path. When `GatewayConfig::async_audit` is set, the
//! execution engine hands audit entries to a bounded channel instead of
//! awaiting the datastore write in line; a single drain task persists them
//! in arrival order. `flush_and_close` drops the sender explicitly and
//! waits for the drain task to empty the channel, so a `SIGINT`/`SIGTERM`
//! never discards a buffered entry even though `AppState` holds the buffer
//! behind a shared `Arc`.

use meridian_domain::audit::AuditEntry;
use meridian_store::AuditRepository;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};

pub struct AsyncAuditBuffer {
    sender: Mutex<Option<mpsc::Sender<AuditEntry>>>,
    drain_task: Mutex<Option<JoinHandle<()>>>,
}

impl AsyncAuditBuffer {
    pub fn spawn(audit: Arc<AuditRepository>, capacity: usize) -> Arc<Self> {
        let (sender, mut receiver) = mpsc::channel::<AuditEntry>(capacity.max(1));

        let drain_task = tokio::spawn(async move {
            while let Some(entry) = receiver.recv().await {
                if let Err(err) = audit.append(entry).await {
                    warn!(error = %err, "buffered audit entry failed to persist");
                }
            }
            info!("audit buffer drained and closed");
        });

        Arc::new(Self {
            sender: Mutex::new(Some(sender)),
            drain_task: Mutex::new(Some(drain_task)),
        })
    }

    /// Queues `entry` without waiting on the datastore. Applies backpressure
    /// (blocks the caller) only once the bounded channel is full, rather
    /// than silently dropping entries. A no-op once the buffer has been
    /// closed by `flush_and_close`.
    pub async fn submit(&self, entry: AuditEntry) {
        let sender = self.sender.lock().await.clone();
        if let Some(sender) = sender {
            if sender.send(entry).await.is_err() {
                warn!("audit buffer closed, entry dropped");
            }
        } else {
            warn!("audit buffer already closed, entry dropped");
        }
    }

    /// Closes the channel and waits for every already-queued entry to be
    /// persisted. Safe to call more than once; later calls are no-ops.
    pub async fn flush_and_close(&self) {
        self.sender.lock().await.take();
        let handle = self.drain_task.lock().await.take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}
