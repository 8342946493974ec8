//! Session registry: routes external writes to live sessions by id.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::RwLock;
use tracing::trace;

use longeron_core::config::SocketConfig;
use longeron_core::service::Sid;

use crate::session::{Collaborators, DestroyFn, Session};

/// Map of session id to live session.
///
/// Lookups take a read lock and run on any worker; create and remove take
/// the write lock. Ids count up from 1 and are never reused.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<Sid, Arc<Session>>>,
    next_sid: AtomicU64,
}

impl SessionRegistry {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Construct a session wired with `collaborators`, a snapshot of the
    /// socket options, and a destroy hook that removes it from this map.
    pub fn create(
        self: &Arc<Self>,
        collaborators: Collaborators,
        config: SocketConfig,
    ) -> Arc<Session> {
        let sid = self.next_sid.fetch_add(1, Ordering::Relaxed) + 1;

        let registry = Arc::downgrade(self);
        let destroy: DestroyFn = Box::new(move |sid| {
            if let Some(registry) = registry.upgrade() {
                registry.remove(sid);
            }
        });

        let session = Session::new(sid, collaborators, config, destroy);
        self.sessions.write().insert(sid, session.clone());
        trace!(sid, "session created");
        session
    }

    /// Shared-read lookup.
    #[must_use]
    pub fn lookup(&self, sid: Sid) -> Option<Arc<Session>> {
        self.sessions.read().get(&sid).cloned()
    }

    /// Drop the registry's strong reference to `sid`.
    pub fn remove(&self, sid: Sid) {
        if self.sessions.write().remove(&sid).is_some() {
            trace!(sid, "session removed");
        }
    }

    /// Strong references to every live session, for broadcast operations
    /// like a controller stop.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Arc<Session>> {
        self.sessions.read().values().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}
