// ── Reactive entity streams ──
//
// Subscription type for watching one session's entity table.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::model::{EntityKey, NetworkEntity};
use crate::store::EntitySnapshot;

/// A subscription to a session's networks.
///
/// Holds the snapshot seen last; `changed()` waits for the next one.
/// Readers never see the live table, only immutable copies.
pub struct EntityStream {
    current: EntitySnapshot,
    receiver: watch::Receiver<EntitySnapshot>,
}

impl EntityStream {
    pub(crate) fn new(receiver: watch::Receiver<EntitySnapshot>) -> Self {
        let current = receiver.borrow().clone();
        Self { current, receiver }
    }

    /// The snapshot captured at creation or by the last `changed()`.
    pub fn current(&self) -> &EntitySnapshot {
        &self.current
    }

    /// The newest snapshot, without marking it seen.
    pub fn latest(&self) -> EntitySnapshot {
        self.receiver.borrow().clone()
    }

    /// Look up one network in the current snapshot.
    pub fn get(&self, key: EntityKey) -> Option<Arc<NetworkEntity>> {
        self.current.iter().find(|e| e.key == key).cloned()
    }

    /// Wait for the next change. `None` once the session has shut down.
    pub async fn changed(&mut self) -> Option<EntitySnapshot> {
        self.receiver.changed().await.ok()?;
        let snap = self.receiver.borrow_and_update().clone();
        self.current = Arc::clone(&snap);
        Some(snap)
    }

    /// Convert into a `Stream` yielding every snapshot, starting with the
    /// current one.
    pub fn into_stream(self) -> EntityWatchStream {
        EntityWatchStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` adapter over an [`EntityStream`].
pub struct EntityWatchStream {
    inner: WatchStream<EntitySnapshot>,
}

impl Stream for EntityWatchStream {
    type Item = EntitySnapshot;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
