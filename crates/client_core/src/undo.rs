use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use shared::domain::{ProductId, ProductStatus};
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
};
use tracing::{info, warn};

use crate::{catalog::Product, catalog::ProductStore, error::StoreError};

/// Default undo window for a soft-delete.
pub const UNDO_WINDOW: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub enum UndoEvent {
    Armed { id: ProductId, seconds: u64 },
    Tick { id: ProductId, remaining: u64 },
    /// The window ran out; the product stays logically deleted. No backend
    /// call is made on expiry.
    Expired { id: ProductId },
    Restored { id: ProductId },
    RestoreFailed { id: ProductId, message: String },
}

struct PendingDelete {
    id: ProductId,
    previous_status: ProductStatus,
    generation: u64,
    timer: JoinHandle<()>,
}

/// Bounded-window reversal for the most recent soft-delete.
///
/// At most one delete is pending process-wide. Arming while a window is live
/// aborts the old countdown task and replaces it; the earlier product stays
/// deleted, only its notification window closes early. This is a UX safety
/// net: the product is logically deleted server-side either way.
pub struct UndoController {
    store: Arc<ProductStore>,
    window: Duration,
    pending: Mutex<Option<PendingDelete>>,
    generation: AtomicU64,
    events: broadcast::Sender<UndoEvent>,
}

impl UndoController {
    pub fn new(store: Arc<ProductStore>) -> Arc<Self> {
        Self::with_window(store, UNDO_WINDOW)
    }

    pub fn with_window(store: Arc<ProductStore>, window: Duration) -> Arc<Self> {
        let (events, _) = broadcast::channel(64);
        Arc::new(Self {
            store,
            window,
            pending: Mutex::new(None),
            generation: AtomicU64::new(0),
            events,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<UndoEvent> {
        self.events.subscribe()
    }

    /// Soft-deletes the product and arms the undo window in one step. This is
    /// the delete entry point presentation code should use.
    pub async fn delete(self: &Arc<Self>, id: ProductId) -> Result<Product, StoreError> {
        let (product, previous_status) = self.store.soft_delete(id).await?;
        self.arm(product.id, previous_status).await;
        Ok(product)
    }

    /// Starts the countdown for one pending deletion. A live countdown is
    /// aborted and replaced; its product is NOT auto-restored.
    pub async fn arm(self: &Arc<Self>, id: ProductId, previous_status: ProductStatus) {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let seconds = self.window.as_secs().max(1);
        let timer = self.spawn_countdown(id, generation, seconds);

        let replaced = self.pending.lock().await.replace(PendingDelete {
            id,
            previous_status,
            generation,
            timer,
        });
        if let Some(old) = replaced {
            old.timer.abort();
            info!(old = %old.id, new = %id, "undo window replaced, earlier delete stays final");
        }
        let _ = self.events.send(UndoEvent::Armed { id, seconds });
    }

    fn spawn_countdown(self: &Arc<Self>, id: ProductId, generation: u64, seconds: u64) -> JoinHandle<()> {
        let controller = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            interval.tick().await; // first tick completes immediately
            let mut remaining = seconds;
            while remaining > 0 {
                interval.tick().await;
                remaining -= 1;
                let _ = controller.events.send(UndoEvent::Tick { id, remaining });
            }
            controller.finalize(id, generation).await;
        })
    }

    /// Clears the pending slot when the countdown reaches zero. Generation
    /// checked so a superseded timer can never clear a newer window.
    async fn finalize(&self, id: ProductId, generation: u64) {
        {
            let mut pending = self.pending.lock().await;
            match pending.as_ref() {
                Some(current) if current.generation == generation => *pending = None,
                _ => return,
            }
        }
        let _ = self.events.send(UndoEvent::Expired { id });
        info!(id = %id, "undo window expired, delete is final");
    }

    /// Explicit user undo. Restores the pending product to the status it held
    /// before the delete. The pending window is consumed whichever way the
    /// restore lands; on failure the product stays deleted and the error is
    /// reported, with no retry.
    pub async fn cancel(&self) -> Result<Option<Product>, StoreError> {
        let Some(pending) = self.pending.lock().await.take() else {
            return Ok(None);
        };
        pending.timer.abort();

        match self
            .store
            .restore(pending.id, pending.previous_status)
            .await
        {
            Ok(product) => {
                let _ = self.events.send(UndoEvent::Restored { id: pending.id });
                info!(id = %pending.id, status = %product.status, "delete undone");
                Ok(Some(product))
            }
            Err(err) => {
                warn!(id = %pending.id, "restore failed: {err}");
                let _ = self.events.send(UndoEvent::RestoreFailed {
                    id: pending.id,
                    message: err.to_string(),
                });
                Err(err)
            }
        }
    }

    /// Id of the delete currently awaiting expiry, if any.
    pub async fn pending_delete(&self) -> Option<ProductId> {
        self.pending.lock().await.as_ref().map(|p| p.id)
    }
}

#[cfg(test)]
#[path = "tests/undo_tests.rs"]
mod tests;
