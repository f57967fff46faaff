use crate::config::LockPolicy;
use crate::error::{Error, Result};
use crate::event::Event;
use std::collections::HashMap;
use std::fmt;

/// Identifier of an [`EventHandle`], unique for the life of its
/// dispatcher
///
/// [`EventHandle`]: struct.EventHandle.html
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId(u64);

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

struct Slot {
    tx: flume::Sender<Event>,
    paused: bool,
}

/// Fan-out set of handle backlogs
///
/// Each registered handle owns the receiving end of an unbounded
/// channel.  Every published event is cloned into each backlog that
/// is listening, so a slow consumer accumulates backlog without
/// holding up anyone else.
pub(crate) struct Registry {
    slots: HashMap<HandleId, Slot>,
    next_id: u64,
    locked: Option<HandleId>,
    policy: LockPolicy,
    closed: bool,
}

impl Registry {
    pub(crate) fn new(policy: LockPolicy) -> Self {
        Self {
            slots: HashMap::new(),
            next_id: 1,
            locked: None,
            policy,
            closed: false,
        }
    }

    /// Add a backlog.  It only sees events published from now on.
    pub(crate) fn register(&mut self) -> Result<(HandleId, flume::Receiver<Event>)> {
        if self.closed {
            return Err(Error::Shutdown);
        }
        let id = HandleId(self.next_id);
        self.next_id += 1;
        let (tx, rx) = flume::unbounded();
        self.slots.insert(id, Slot { tx, paused: false });
        tracing::debug!(handle = %id, "event handle registered");
        Ok((id, rx))
    }

    /// Drop a backlog, releasing the lock if it held it
    pub(crate) fn remove(&mut self, id: HandleId) {
        if self.slots.remove(&id).is_some() {
            tracing::debug!(handle = %id, "event handle removed");
        }
        if self.locked == Some(id) {
            self.locked = None;
        }
    }

    pub(crate) fn holder(&self) -> Option<HandleId> {
        self.locked
    }

    /// Take the interaction lock.  Taking it again is a no-op.
    pub(crate) fn lock(&mut self, id: HandleId) -> Result<()> {
        match self.locked {
            Some(holder) if holder != id => Err(Error::LockHeld { holder }),
            _ => {
                self.locked = Some(id);
                Ok(())
            }
        }
    }

    /// Release the lock if `id` holds it
    pub(crate) fn unlock(&mut self, id: HandleId) {
        if self.locked == Some(id) {
            self.locked = None;
        }
    }

    pub(crate) fn set_paused(&mut self, id: HandleId, paused: bool) {
        if let Some(slot) = self.slots.get_mut(&id) {
            slot.paused = paused;
        }
    }

    pub(crate) fn is_paused(&self, id: HandleId) -> bool {
        self.slots.get(&id).map_or(false, |slot| slot.paused)
    }

    /// Deliver a copy of the event to every listening backlog.  Under
    /// the exclusive policy only the lock holder listens whilst the
    /// lock is held.
    pub(crate) fn publish(&mut self, ev: Event) {
        let only = match self.policy {
            LockPolicy::Exclusive => self.locked,
            LockPolicy::Advisory => None,
        };
        let mut gone = Vec::new();
        for (id, slot) in self.slots.iter() {
            if slot.paused || only.map_or(false, |holder| holder != *id) {
                continue;
            }
            if slot.tx.send(ev).is_err() {
                gone.push(*id);
            }
        }
        for id in gone {
            self.remove(id);
        }
    }

    /// Disconnect every backlog and refuse new ones.  Events already
    /// queued can still be read.
    pub(crate) fn close_all(&mut self) {
        self.closed = true;
        self.locked = None;
        self.slots.clear();
    }
}
