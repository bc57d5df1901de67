//! Debounced writer for event content bodies.
//!
//! The rich-text editor reports every keystroke-level change. Edits are
//! buffered per event and written once the stream has been quiet for the
//! debounce window, so a burst of edits collapses into the latest body.

use crate::error::{FailedWrite, StoreError};
use crate::id::EventId;
use crate::model::EntityRef;
use crate::store::EntityStore;
use futures::future::join_all;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

enum Command {
    Edit { event: EventId, content: Value },
    Flush(oneshot::Sender<Vec<FailedWrite>>),
}

/// Handle to a background task that saves event content.
pub struct ContentSaver {
    tx: mpsc::UnboundedSender<Command>,
    task: JoinHandle<()>,
}

impl ContentSaver {
    /// Spawn the writer task on the current tokio runtime.
    pub fn spawn<S: EntityStore + 'static>(store: Arc<S>, debounce: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(store, debounce, rx));
        Self { tx, task }
    }

    /// Buffer a new body for `event`, replacing any unsaved one.
    pub fn save(&self, event: EventId, content: Value) -> Result<(), StoreError> {
        self.tx
            .send(Command::Edit { event, content })
            .map_err(|_| StoreError::Unavailable)
    }

    /// Write everything buffered now and report what failed.
    pub async fn flush(&self) -> Vec<FailedWrite> {
        let (reply, done) = oneshot::channel();
        if self.tx.send(Command::Flush(reply)).is_err() {
            return Vec::new();
        }
        done.await.unwrap_or_default()
    }

    /// Flush and stop the writer task.
    pub async fn close(self) -> Vec<FailedWrite> {
        let failed = self.flush().await;
        drop(self.tx);
        if let Err(e) = self.task.await {
            warn!(error = %e, "content saver task ended abnormally");
        }
        failed
    }
}

async fn run<S: EntityStore>(
    store: Arc<S>,
    debounce: Duration,
    mut rx: mpsc::UnboundedReceiver<Command>,
) {
    let mut pending: HashMap<EventId, Value> = HashMap::new();

    loop {
        let command = if pending.is_empty() {
            rx.recv().await
        } else {
            match tokio::time::timeout(debounce, rx.recv()).await {
                Ok(command) => command,
                Err(_) => {
                    let failed = write_pending(store.as_ref(), &mut pending).await;
                    if !failed.is_empty() {
                        warn!(failed = failed.len(), "content writes failed");
                    }
                    continue;
                }
            }
        };

        match command {
            Some(Command::Edit { event, content }) => {
                pending.insert(event, content);
            }
            Some(Command::Flush(reply)) => {
                let failed = write_pending(store.as_ref(), &mut pending).await;
                let _ = reply.send(failed);
            }
            None => {
                let failed = write_pending(store.as_ref(), &mut pending).await;
                if !failed.is_empty() {
                    warn!(failed = failed.len(), "content writes failed on shutdown");
                }
                break;
            }
        }
    }
}

async fn write_pending<S: EntityStore + ?Sized>(
    store: &S,
    pending: &mut HashMap<EventId, Value>,
) -> Vec<FailedWrite> {
    let writes = pending.drain().map(|(event, content)| async move {
        match store.save_event_content(event, content).await {
            Ok(true) => None,
            Ok(false) => {
                debug!(event = %event, "dropping content for removed event");
                None
            }
            Err(error) => Some(FailedWrite {
                entity: EntityRef::Event(event),
                error,
            }),
        }
    });
    join_all(writes).await.into_iter().flatten().collect()
}
