//! Per-channel, per-role registry of live connections.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use stul_core::{ConnectionId, Role};

use super::connection::ConnectionHandle;

struct Slots {
    next_id: u64,
    entries: HashMap<ConnectionId, Arc<ConnectionHandle>>,
}

/// Id-keyed set of connection handles for one role of one channel.
///
/// Every call takes the lock once and releases it before returning. Delivery
/// to a [`snapshot`](Self::snapshot) happens outside the lock, so a slow peer
/// never blocks registration, deregistration or other deliveries.
pub struct ConnectionRegistry {
    role: Role,
    inner: Mutex<Slots>,
}

impl ConnectionRegistry {
    /// Empty registry for `role`.
    pub fn new(role: Role) -> Self {
        Self {
            role,
            inner: Mutex::new(Slots {
                next_id: 0,
                entries: HashMap::new(),
            }),
        }
    }

    /// Role this registry holds.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Insert `handle` under a fresh id. Ids are never reused.
    pub fn register(&self, handle: Arc<ConnectionHandle>) -> ConnectionId {
        debug_assert_eq!(handle.role(), self.role, "handle registered under the wrong role");
        let mut slots = self.inner.lock();
        let id = ConnectionId::new(slots.next_id);
        slots.next_id += 1;
        let _ = slots.entries.insert(id, handle);
        id
    }

    /// Remove `id` if present. Removing an absent id is a no-op.
    pub fn deregister(&self, id: ConnectionId) -> Option<Arc<ConnectionHandle>> {
        self.inner.lock().entries.remove(&id)
    }

    /// Point-in-time copy of the live entries.
    pub fn snapshot(&self) -> Vec<(ConnectionId, Arc<ConnectionHandle>)> {
        self.inner
            .lock()
            .entries
            .iter()
            .map(|(id, handle)| (*id, Arc::clone(handle)))
            .collect()
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Whether no entry is live.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use tokio::sync::mpsc;

    fn handle_for(role: Role) -> Arc<ConnectionHandle> {
        let (tx, _rx) = mpsc::channel(1);
        Arc::new(ConnectionHandle::new(role, tx))
    }

    fn handle() -> Arc<ConnectionHandle> {
        handle_for(Role::Client)
    }

    #[test]
    fn register_then_deregister_restores_size() {
        let reg = ConnectionRegistry::new(Role::Client);
        let _ = reg.register(handle());
        let before = reg.len();
        let id = reg.register(handle());
        assert_eq!(reg.len(), before + 1);
        assert!(reg.deregister(id).is_some());
        assert_eq!(reg.len(), before);
    }

    #[test]
    fn deregister_twice_is_noop() {
        let reg = ConnectionRegistry::new(Role::Host);
        let id = reg.register(handle_for(Role::Host));
        assert!(reg.deregister(id).is_some());
        assert!(reg.deregister(id).is_none());
        assert!(reg.is_empty());
    }

    #[test]
    fn ids_are_unique_and_not_reused() {
        let reg = ConnectionRegistry::new(Role::Client);
        let a = reg.register(handle());
        let b = reg.register(handle());
        assert_ne!(a, b);
        let _ = reg.deregister(a);
        let c = reg.register(handle());
        assert_ne!(c, a);
        assert_ne!(c, b);
    }

    #[test]
    fn snapshot_is_detached() {
        let reg = ConnectionRegistry::new(Role::Client);
        let a = reg.register(handle());
        let b = reg.register(handle());
        let snap = reg.snapshot();
        assert_eq!(snap.len(), 2);

        let _ = reg.deregister(a);
        let _ = reg.register(handle());
        assert_eq!(snap.len(), 2);
        let ids: HashSet<_> = snap.iter().map(|(id, _)| *id).collect();
        assert!(ids.contains(&a) && ids.contains(&b));
    }

    #[test]
    fn snapshot_shares_handles() {
        let reg = ConnectionRegistry::new(Role::Host);
        let h = handle_for(Role::Host);
        let id = reg.register(Arc::clone(&h));
        let snap = reg.snapshot();
        assert_eq!(snap[0].0, id);
        assert!(Arc::ptr_eq(&snap[0].1, &h));
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "wrong role")]
    fn register_rejects_other_role() {
        let reg = ConnectionRegistry::new(Role::Host);
        let _ = reg.register(handle_for(Role::Client));
    }

    #[test]
    fn concurrent_register_deregister() {
        let reg = Arc::new(ConnectionRegistry::new(Role::Client));
        let threads: Vec<_> = (0..8)
            .map(|_| {
                let reg = Arc::clone(&reg);
                std::thread::spawn(move || {
                    let mut ids = Vec::new();
                    for _ in 0..200 {
                        ids.push(reg.register(handle()));
                    }
                    for id in ids.iter().step_by(2) {
                        assert!(reg.deregister(*id).is_some());
                    }
                    ids
                })
            })
            .collect();

        let mut all = HashSet::new();
        for t in threads {
            for id in t.join().unwrap() {
                assert!(all.insert(id), "duplicate id {id}");
            }
        }
        assert_eq!(all.len(), 1600);
        assert_eq!(reg.len(), 800);
    }
}
