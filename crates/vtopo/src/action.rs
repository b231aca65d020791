//! Remote tablet actions.
//!
//! A caller enqueues an action as a sequential node under the tablet's
//! `action` root. The tablet executes it and writes a completion record with
//! the same sequence name under `actionlog`; the caller learns about
//! completion by watching for that record. Completed records are removed by
//! [`ActionQueue::purge_tablet_actions`].

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};
use vtopo_store::{ANY_VERSION, CreateMode, NodeStore, StoreError, Watch, WatchEvent, join_path};

use crate::backoff::RetryPolicy;
use crate::error::{AtPath, TopoError, TopoResult};
use crate::naming::TabletAlias;
use crate::paths;

/// States of [`ActionQueue::wait_for_tablet_action`].
enum WaitState {
    /// Check for the completion record and arm a watch.
    Polling,
    /// Record absent; waiting on the armed watch.
    Watching(Watch),
    /// The store misbehaved; wait before polling again.
    Backoff(Duration),
    /// Record exists.
    Done,
}

#[derive(Clone)]
pub struct ActionQueue {
    store: Arc<dyn NodeStore>,
    retry: RetryPolicy,
}

/// Resolves once `cancel` holds `true`. Never resolves if the sender side is
/// gone without having cancelled.
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    if cancel.wait_for(|c| *c).await.is_err() {
        std::future::pending::<()>().await;
    }
}

impl ActionQueue {
    pub fn new(store: Arc<dyn NodeStore>, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    /// Enqueue `payload` for the tablet. Returns the path of the action
    /// node; its last segment is the assigned sequence number.
    pub fn write_tablet_action(&self, alias: &TabletAlias, payload: &[u8]) -> TopoResult<String> {
        let root = paths::tablet_action_root(alias)?;
        // Trailing slash: the sequential node becomes a child of the root,
        // not a sibling.
        let action_path = self
            .store
            .create(&format!("{root}/"), payload, CreateMode::Sequential)
            .at(&root)?;
        debug!(%alias, path = %action_path, "tablet action queued");
        Ok(action_path)
    }

    /// Read a queued action's payload.
    pub fn read_tablet_action(&self, action_path: &str) -> TopoResult<Vec<u8>> {
        let (data, _) = self.store.get(action_path).at(action_path)?;
        Ok(data)
    }

    /// Sequence names of every action queued for the tablet, oldest first.
    pub fn list_tablet_actions(&self, alias: &TabletAlias) -> TopoResult<Vec<String>> {
        let root = paths::tablet_action_root(alias)?;
        let (mut names, _) = self.store.children(&root).at(&root)?;
        names.sort();
        Ok(names)
    }

    /// Record the outcome of an action. This is the tablet's side of the
    /// protocol and is what wakes [`wait_for_tablet_action`].
    ///
    /// [`wait_for_tablet_action`]: ActionQueue::wait_for_tablet_action
    pub fn complete_tablet_action(&self, action_path: &str, result: &[u8]) -> TopoResult<()> {
        let log_path = paths::action_log_path(action_path)?;
        self.store
            .create(&log_path, result, CreateMode::Persistent)
            .at(&log_path)?;
        debug!(path = %log_path, "tablet action completed");
        Ok(())
    }

    /// Block until the action at `action_path` has a completion record and
    /// return that record's payload.
    ///
    /// Store errors while polling are absorbed with a jittered delay. Fails
    /// with `Timeout` once `timeout` elapses, or with `Interrupted` when
    /// `cancel` becomes `true`; cancellation is only observed while waiting,
    /// never in the middle of a store call.
    pub async fn wait_for_tablet_action(
        &self,
        action_path: &str,
        timeout: Duration,
        mut cancel: watch::Receiver<bool>,
    ) -> TopoResult<Vec<u8>> {
        let log_path = paths::action_log_path(action_path)?;
        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);

        let mut state = WaitState::Polling;
        loop {
            state = match state {
                WaitState::Polling => match self.store.exists_w(&log_path) {
                    Ok((Some(_), _)) => WaitState::Done,
                    Ok((None, armed)) => WaitState::Watching(armed),
                    Err(e) => {
                        let delay = self.retry.next_delay();
                        warn!(path = %log_path, error = %e, ?delay, "unexpected store error, delaying retry");
                        WaitState::Backoff(delay)
                    }
                },
                WaitState::Watching(armed) => tokio::select! {
                    event = armed => match event {
                        Ok(WatchEvent::Created) => WaitState::Done,
                        Ok(event) => {
                            // The watch is spent; poll again to re-arm it.
                            warn!(path = %log_path, ?event, "unexpected watch event");
                            WaitState::Polling
                        }
                        Err(_) => {
                            let delay = self.retry.next_delay();
                            warn!(path = %log_path, ?delay, "watch dropped by store, delaying retry");
                            WaitState::Backoff(delay)
                        }
                    },
                    _ = &mut deadline => return Err(TopoError::Timeout(log_path)),
                    _ = cancelled(&mut cancel) => return Err(TopoError::Interrupted(log_path)),
                },
                WaitState::Backoff(delay) => tokio::select! {
                    _ = tokio::time::sleep(delay) => WaitState::Polling,
                    _ = &mut deadline => return Err(TopoError::Timeout(log_path)),
                    _ = cancelled(&mut cancel) => return Err(TopoError::Interrupted(log_path)),
                },
                WaitState::Done => break,
            };
        }

        let (data, _) = self
            .store
            .get(&log_path)
            .map_err(|source| TopoError::Wrapped {
                path: log_path.clone(),
                source,
            })?;
        debug!(path = %log_path, "tablet action finished");
        Ok(data)
    }

    /// Delete completed action records whose payload satisfies
    /// `can_be_purged`, oldest sequence first. Returns how many were deleted.
    ///
    /// Every entry is attempted even if some fail; failures are reported
    /// together as `PurgeIncomplete`.
    pub fn purge_tablet_actions<F>(&self, alias: &TabletAlias, can_be_purged: F) -> TopoResult<usize>
    where
        F: Fn(&[u8]) -> bool,
    {
        let root = paths::tablet_action_log_root(alias)?;
        let (mut names, _) = self.store.children(&root).at(&root)?;
        names.sort();

        let mut purged = 0;
        let mut failures = Vec::new();
        for name in names {
            let path = join_path(&root, &name);
            let data = match self.store.get(&path) {
                Ok((data, _)) => data,
                // Purged concurrently.
                Err(StoreError::NoNode(_)) => continue,
                Err(e) => {
                    failures.push(TopoError::from_store(&path, e));
                    continue;
                }
            };
            if !can_be_purged(&data) {
                continue;
            }
            match self.store.delete(&path, ANY_VERSION) {
                Ok(()) => purged += 1,
                Err(StoreError::NoNode(_)) => {}
                Err(e) => {
                    warn!(%path, error = %e, "failed to purge action log entry");
                    failures.push(TopoError::from_store(&path, e));
                }
            }
        }

        if failures.is_empty() {
            info!(%alias, purged, "tablet action log purged");
            Ok(purged)
        } else {
            Err(TopoError::PurgeIncomplete {
                path: root,
                purged,
                failures,
            })
        }
    }
}
