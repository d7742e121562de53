//! Arena of live sessions.
//!
//! Sessions live in slots addressed by a [`SessionId`]. A slot's
//! generation is bumped on removal, so stale handles never reach a newer
//! session that reuses the slot. Walk order is insertion order, kept
//! separately from slot positions; removed handles stay in it as
//! tombstones until the next compaction.

use std::fmt;

use super::Session;

/// Stable handle to a session in a [`Context`](super::Context).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId {
    index: u32,
    generation: u32,
}

impl SessionId {
    pub(crate) fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Slot index.
    pub fn index(&self) -> u32 {
        self.index
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.index, self.generation)
    }
}

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    session: Option<Session>,
}

/// Session collection owned by a context.
#[derive(Debug, Default)]
pub struct Registry {
    slots: Vec<Slot>,
    free: Vec<u32>,
    /// Handles in insertion order, tombstones included.
    order: Vec<SessionId>,
    len: usize,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether no session is live.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Insert a session built for its freshly assigned handle.
    pub fn insert_with(&mut self, build: impl FnOnce(SessionId) -> Session) -> SessionId {
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                self.slots.push(Slot::default());
                (self.slots.len() - 1) as u32
            }
        };

        let slot = &mut self.slots[index as usize];
        debug_assert!(slot.session.is_none(), "free list pointed at a live slot");
        let id = SessionId::new(index, slot.generation);
        slot.session = Some(build(id));
        self.order.push(id);
        self.len += 1;
        id
    }

    /// Look up a session.
    pub fn get(&self, id: SessionId) -> Option<&Session> {
        self.slot(id)?.session.as_ref()
    }

    /// Look up a session mutably.
    pub fn get_mut(&mut self, id: SessionId) -> Option<&mut Session> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.session.as_mut()
    }

    /// Take a session out, invalidating its handle.
    pub fn remove(&mut self, id: SessionId) -> Option<Session> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        let session = slot.session.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.len -= 1;

        if self.order.len() > 2 * self.len + 16 {
            self.compact();
        }
        Some(session)
    }

    /// Handles of all live sessions in insertion order.
    ///
    /// The returned snapshot stays safe to walk while sessions are
    /// removed: removed handles simply stop resolving.
    pub fn ids(&self) -> Vec<SessionId> {
        self.order
            .iter()
            .copied()
            .filter(|&id| self.get(id).is_some())
            .collect()
    }

    /// Remove every session.
    pub fn drain(&mut self) -> Vec<Session> {
        let sessions = self
            .ids()
            .into_iter()
            .filter_map(|id| self.remove(id))
            .collect();
        debug_assert_eq!(self.len, 0);
        self.order.clear();
        sessions
    }

    fn compact(&mut self) {
        let slots = &self.slots;
        self.order.retain(|id| {
            slots
                .get(id.index as usize)
                .is_some_and(|slot| slot.generation == id.generation && slot.session.is_some())
        });
    }

    fn slot(&self, id: SessionId) -> Option<&Slot> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
    }
}
