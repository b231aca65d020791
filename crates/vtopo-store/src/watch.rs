//! In-process registry of single-fire watches.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use tokio::sync::oneshot;
use tracing::debug;

use crate::types::{Watch, WatchEvent};

/// Registrations between full sweeps for abandoned watchers.
const SWEEP_INTERVAL: u64 = 256;

type Watchers = HashMap<String, Vec<oneshot::Sender<WatchEvent>>>;

#[derive(Default)]
struct Inner {
    watchers: Watchers,
    registrations: u64,
}

/// Pending watches keyed by node path.
///
/// Every registered watch fires at most once: `fire` drains all watchers of
/// a path. Watchers whose receiver was dropped are discarded, either when
/// their path fires or when a later registration sweeps them out.
#[derive(Default)]
pub struct WatchRegistry {
    inner: Mutex<Inner>,
}

impl WatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a watch on `path`.
    pub fn register(&self, path: &str) -> Watch {
        let (tx, rx) = oneshot::channel();
        let mut inner = self.lock();
        inner.registrations += 1;
        if inner.registrations % SWEEP_INTERVAL == 0 {
            sweep(&mut inner.watchers);
        }
        let senders = inner.watchers.entry(path.to_string()).or_default();
        senders.retain(|tx| !tx.is_closed());
        senders.push(tx);
        rx
    }

    /// Deliver `event` to every watcher of `path`. Returns how many watchers
    /// were still listening.
    pub fn fire(&self, path: &str, event: WatchEvent) -> usize {
        let senders = self.lock().watchers.remove(path).unwrap_or_default();
        let delivered = deliver(senders, &event);
        if delivered > 0 {
            debug!(%path, ?event, delivered, "watch fired");
        }
        delivered
    }

    /// Deliver a session event to every pending watcher.
    pub fn fire_all(&self, event: WatchEvent) -> usize {
        let all: Vec<_> = self.lock().watchers.drain().flat_map(|(_, v)| v).collect();
        deliver(all, &event)
    }

    /// Number of paths with at least one pending watcher.
    pub fn pending_paths(&self) -> usize {
        self.lock().watchers.len()
    }

    /// Number of watchers held for `path`, listening or not.
    pub fn pending_on(&self, path: &str) -> usize {
        self.lock().watchers.get(path).map_or(0, Vec::len)
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn deliver(senders: Vec<oneshot::Sender<WatchEvent>>, event: &WatchEvent) -> usize {
    senders
        .into_iter()
        .map(|tx| tx.send(event.clone()).is_ok())
        .filter(|sent| *sent)
        .count()
}

/// Drop watchers whose receiver is gone, and paths left with none.
fn sweep(watchers: &mut Watchers) {
    watchers.retain(|_, senders| {
        senders.retain(|tx| !tx.is_closed());
        !senders.is_empty()
    });
}
