use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::error::ChatError;
use crate::types::UserId;

/// Something that can receive outbound text for one client.
///
/// `deliver` is called while the registry lock is held, so it must not
/// block. The live implementation enqueues onto the connection's writer
/// task; tests use an in-memory recorder.
pub trait Notifier: Send + Sync {
    fn deliver(&self, text: Arc<str>) -> Result<(), ChatError>;
}

struct Member {
    id: UserId,
    notifier: Arc<dyn Notifier>,
}

/// The set of live sessions and the broadcast fan-out.
///
/// Register, deregister and broadcast all go through one mutex, so every
/// broadcast is totally ordered against every membership change.
pub struct Registry {
    members: Mutex<Vec<Member>>,
    next_id: AtomicU64,
    max_members: usize,
}

impl Registry {
    pub fn new(max_members: usize) -> Self {
        Self {
            members: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            max_members,
        }
    }

    /// Allocate an identity for a newly accepted connection.
    ///
    /// Strictly increasing and never reused, whatever the population does.
    pub fn next_id(&self) -> UserId {
        UserId::new(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    pub fn max_members(&self) -> usize {
        self.max_members
    }

    /// Add a member unless the registry is full.
    ///
    /// The capacity check and the insert happen under the same lock. The
    /// returned guard deregisters the member when dropped.
    pub fn register(
        self: &Arc<Self>,
        id: UserId,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Registration, ChatError> {
        self.insert(id, notifier, None)
    }

    /// Like `register`, but `greeting` is delivered to the new member
    /// inside the same critical section, so it precedes any broadcast the
    /// member can see. A rejected member is never greeted.
    pub fn register_with_greeting(
        self: &Arc<Self>,
        id: UserId,
        notifier: Arc<dyn Notifier>,
        greeting: &str,
    ) -> Result<Registration, ChatError> {
        self.insert(id, notifier, Some(greeting))
    }

    fn insert(
        self: &Arc<Self>,
        id: UserId,
        notifier: Arc<dyn Notifier>,
        greeting: Option<&str>,
    ) -> Result<Registration, ChatError> {
        let mut members = self.members.lock();
        if members.len() >= self.max_members {
            return Err(ChatError::ServerFull {
                max: self.max_members,
            });
        }
        if members.iter().any(|m| m.id == id) {
            return Err(ChatError::AlreadyRegistered(id));
        }
        if let Some(greeting) = greeting {
            // A failed greeting still admits; the session's own read loop
            // notices the dead connection.
            if let Err(e) = notifier.deliver(Arc::from(greeting)) {
                tracing::warn!(user = %id, error = %e, "greeting failed");
            }
        }
        members.push(Member { id, notifier });
        drop(members);

        Ok(Registration {
            id,
            registry: Arc::clone(self),
        })
    }

    /// Remove a member. Returns `false` if it was already gone.
    pub fn deregister(&self, id: UserId) -> bool {
        let mut members = self.members.lock();
        match members.iter().position(|m| m.id == id) {
            Some(index) => {
                members.remove(index);
                true
            }
            None => false,
        }
    }

    /// Deliver `text` to every registered member, the sender included.
    ///
    /// A failed delivery is logged and skipped; the failing member is
    /// cleaned up by its own session. Returns how many deliveries succeeded.
    pub fn broadcast(&self, text: &str, sender: UserId) -> usize {
        let text: Arc<str> = Arc::from(text);
        let members = self.members.lock();
        let mut delivered = 0;
        for member in members.iter() {
            match member.notifier.deliver(Arc::clone(&text)) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::warn!(%sender, recipient = %member.id, error = %e, "delivery failed");
                }
            }
        }
        tracing::trace!(%sender, delivered, "broadcast");
        delivered
    }

    pub fn len(&self) -> usize {
        self.members.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: UserId) -> bool {
        self.members.lock().iter().any(|m| m.id == id)
    }
}

/// RAII membership: dropping the guard removes the member from the
/// registry. Deregistration is idempotent, so an explicit
/// `Registry::deregister` beforehand is harmless.
pub struct Registration {
    id: UserId,
    registry: Arc<Registry>,
}

impl Registration {
    pub fn id(&self) -> UserId {
        self.id
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.registry.deregister(self.id);
    }
}
