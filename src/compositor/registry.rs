use crate::compositor::handle::lock_compositor;
use crate::compositor::{CompositorId, WindowCompositor};
use crate::render::broker::ResourceBroker;
use crate::render::frame::ResourceId;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

/// Signals that the browser finished closing a session.
///
/// Resources the session may still be reading from are retired against the
/// ticket and only released once it is acknowledged.
#[derive(Debug, Clone, Default)]
pub struct CloseTicket(Arc<AtomicBool>);

impl CloseTicket {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acknowledge(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_acknowledged(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

struct Retired {
    owner: CompositorId,
    ticket: CloseTicket,
    broker: Arc<dyn ResourceBroker>,
    resources: Vec<ResourceId>,
}

/// Table of live compositors.
///
/// Compositors register themselves on creation and deregister on teardown.
/// The table holds weak references only; ownership stays with the
/// [`CompositorHandle`](crate::compositor::CompositorHandle)s.
///
/// Retired resources are reaped by every `consume` and every teardown. Once
/// the last compositor is gone nothing does that anymore, so a host shutting
/// down should call [`reap_retired`](Self::reap_retired) after the browser
/// acknowledged the pending closes.
#[derive(Default)]
pub struct WindowRegistry {
    windows: Mutex<HashMap<CompositorId, Weak<Mutex<WindowCompositor>>>>,
    retired: Mutex<Vec<Retired>>,
}

fn recover<T>(result: std::sync::LockResult<MutexGuard<'_, T>>) -> MutexGuard<'_, T> {
    result.unwrap_or_else(|poisoned| {
        log::warn!("registry lock poisoned, recovering");
        poisoned.into_inner()
    })
}

impl WindowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, id: CompositorId, compositor: &Arc<Mutex<WindowCompositor>>) {
        recover(self.windows.lock()).insert(id, Arc::downgrade(compositor));
    }

    /// Returns true if the compositor was registered.
    pub fn remove(&self, id: CompositorId) -> bool {
        recover(self.windows.lock()).remove(&id).is_some()
    }

    pub fn get(&self, id: CompositorId) -> Option<Arc<Mutex<WindowCompositor>>> {
        recover(self.windows.lock()).get(&id)?.upgrade()
    }

    pub fn len(&self) -> usize {
        recover(self.windows.lock()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn ids(&self) -> Vec<CompositorId> {
        recover(self.windows.lock()).keys().copied().collect()
    }

    /// Runs `f` on every live compositor, in no particular order.
    ///
    /// The table is snapshotted first, so compositors may be added or removed
    /// from other threads (or from `f`) while this runs. Must not be called
    /// while holding a compositor lock.
    pub fn for_each(&self, mut f: impl FnMut(&mut WindowCompositor)) {
        let snapshot: Vec<Arc<Mutex<WindowCompositor>>> = recover(self.windows.lock())
            .values()
            .filter_map(Weak::upgrade)
            .collect();

        for compositor in &snapshot {
            let mut guard = lock_compositor(compositor);
            if !guard.state().is_torn_down() {
                f(&mut *guard);
            }
        }
    }

    /// Parks resources until `ticket` is acknowledged.
    pub fn retire(
        &self,
        owner: CompositorId,
        ticket: CloseTicket,
        broker: Arc<dyn ResourceBroker>,
        resources: Vec<ResourceId>,
    ) {
        if resources.is_empty() {
            return;
        }
        log::debug!(
            "retiring {} resources of compositor {owner} until its session closes",
            resources.len()
        );
        recover(self.retired.lock()).push(Retired {
            owner,
            ticket,
            broker,
            resources,
        });
    }

    /// Releases retired resources whose session close was acknowledged.
    /// Returns how many resources were released.
    pub fn reap_retired(&self) -> usize {
        let ready: Vec<Retired> = {
            let mut retired = recover(self.retired.lock());
            let (ready, waiting): (Vec<Retired>, Vec<Retired>) = std::mem::take(&mut *retired)
                .into_iter()
                .partition(|r| r.ticket.is_acknowledged());
            *retired = waiting;
            ready
        };

        let mut released = 0;
        for entry in ready {
            for id in &entry.resources {
                entry.broker.release(*id);
            }
            log::debug!(
                "released {} retired resources of compositor {}",
                entry.resources.len(),
                entry.owner
            );
            released += entry.resources.len();
        }
        released
    }

    /// Number of resources waiting for a session close.
    pub fn retired_count(&self) -> usize {
        recover(self.retired.lock())
            .iter()
            .map(|r| r.resources.len())
            .sum()
    }
}
