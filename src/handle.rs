use crate::broadcast::HandleId;
use crate::dispatcher::{session_ops, Origin, Shared};
use crate::error::{Error, Result};
use crate::event::{Coord, Event};
use crate::session::{Mode, Session};
use crate::style::{Color, Effects, Style};
use crate::terminal::Terminal;
use crate::termout::{Clear, Command};
use std::sync::{Arc, Weak};
use std::time::Duration;

/// Lifecycle state of an [`EventHandle`]
///
/// [`EventHandle`]: struct.EventHandle.html
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    Active,
    /// Holding the interaction lock
    Locked,
    /// Stopped, or the dispatcher is gone.  Nothing more can be done
    /// with the handle.
    Closed,
}

/// A listener's access to the terminal session
///
/// Each handle has its own backlog of input events, filled from the
/// moment the handle was created, plus access to all the output and
/// mode operations of the [`Dispatcher`].  Output from all handles
/// goes through the same buffer and session under the dispatcher's
/// lock.
///
/// The handle refers to the dispatcher without keeping it alive.
/// Once the dispatcher is dropped, every operation fails with
/// `Error::Shutdown`.  Polling needs `&mut self`, so only the current
/// owner of the handle can consume its events; the handle is `Send`,
/// so it may be moved to another thread.
///
/// Dropping the handle is equivalent to [`EventHandle::stop`].
///
/// [`Dispatcher`]: struct.Dispatcher.html
/// [`EventHandle::stop`]: struct.EventHandle.html#method.stop
pub struct EventHandle {
    id: HandleId,
    shared: Weak<Shared>,
    rx: flume::Receiver<Event>,
    closed: bool,
}

impl EventHandle {
    pub(crate) fn new(id: HandleId, shared: Weak<Shared>, rx: flume::Receiver<Event>) -> Self {
        Self {
            id,
            shared,
            rx,
            closed: false,
        }
    }

    pub fn id(&self) -> HandleId {
        self.id
    }

    pub fn state(&self) -> HandleState {
        if self.closed {
            return HandleState::Closed;
        }
        match self.shared.upgrade() {
            None => HandleState::Closed,
            Some(shared) => {
                if shared.registry.lock().holder() == Some(self.id) {
                    HandleState::Locked
                } else {
                    HandleState::Active
                }
            }
        }
    }

    /// Take the oldest event from the backlog, or `None` if it is
    /// empty.  Never blocks.
    pub fn poll_async(&mut self) -> Result<Option<Event>> {
        self.check_open()?;
        match self.rx.try_recv() {
            Ok(ev) => Ok(Some(ev)),
            Err(flume::TryRecvError::Empty) => Ok(None),
            Err(flume::TryRecvError::Disconnected) => Err(self.disconnected()),
        }
    }

    /// Discard everything in the backlog except the most recent
    /// event, and return that.  Other handles are unaffected.  Never
    /// blocks.
    pub fn poll_latest_async(&mut self) -> Result<Option<Event>> {
        self.check_open()?;
        match self.rx.try_iter().last() {
            Some(ev) => Ok(Some(ev)),
            None if self.rx.is_disconnected() => Err(self.disconnected()),
            None => Ok(None),
        }
    }

    /// Wait for the next event
    pub fn poll_sync(&mut self) -> Result<Event> {
        self.check_open()?;
        self.rx.recv().map_err(|_| self.disconnected())
    }

    /// Wait up to `timeout` for the next event
    pub fn poll_timeout(&mut self, timeout: Duration) -> Result<Option<Event>> {
        self.check_open()?;
        match self.rx.recv_timeout(timeout) {
            Ok(ev) => Ok(Some(ev)),
            Err(flume::RecvTimeoutError::Timeout) => Ok(None),
            Err(flume::RecvTimeoutError::Disconnected) => Err(self.disconnected()),
        }
    }

    /// Take the interaction lock, e.g. whilst a menu is open.  Fails
    /// with `Error::LockHeld` if another handle has it.  Whether other
    /// handles are held off depends on the configured `LockPolicy`.
    pub fn lock(&self) -> Result<()> {
        self.with_shared(|shared, _| {
            shared.take_lock(self.id)?;
            tracing::debug!(handle = %self.id, "interaction lock taken");
            Ok(())
        })
    }

    /// Release the interaction lock.  Does nothing if this handle
    /// doesn't hold it.
    pub fn unlock(&self) -> Result<()> {
        self.with_shared(|shared, _| {
            shared.registry.lock().unlock(self.id);
            Ok(())
        })
    }

    /// Stop receiving events until resumed.  Events arriving in the
    /// meantime never reach this handle's backlog.
    pub fn pause(&self) -> Result<()> {
        self.with_shared(|shared, _| {
            shared.registry.lock().set_paused(self.id, true);
            Ok(())
        })
    }

    pub fn resume(&self) -> Result<()> {
        self.with_shared(|shared, _| {
            shared.registry.lock().set_paused(self.id, false);
            Ok(())
        })
    }

    pub fn is_paused(&self) -> Result<bool> {
        self.with_shared(|shared, _| Ok(shared.registry.lock().is_paused(self.id)))
    }

    /// Close the handle, releasing its backlog and its lock if held.
    /// Other handles are unaffected.  Every later call fails with
    /// `Error::Closed`.
    pub fn stop(&mut self) -> Result<()> {
        self.check_open()?;
        self.release();
        Ok(())
    }

    /// Ask the terminal for the real cursor position and record it
    pub fn sync_pos(&self) -> Result<Coord> {
        self.with_shared(|shared, origin| shared.sync_pos(origin))
    }

    fn check_open(&self) -> Result<()> {
        if self.closed {
            Err(Error::Closed)
        } else {
            Ok(())
        }
    }

    // Reason for the backlog being disconnected
    fn disconnected(&self) -> Error {
        match self.shared.upgrade() {
            Some(shared) => match shared.check_alive() {
                Err(e) => e,
                Ok(()) => Error::Closed,
            },
            None => Error::Shutdown,
        }
    }

    fn with_shared<R>(&self, f: impl FnOnce(&Shared, Origin) -> Result<R>) -> Result<R> {
        self.check_open()?;
        let shared: Arc<Shared> = self.shared.upgrade().ok_or(Error::Shutdown)?;
        f(&shared, Origin::Handle(self.id))
    }

    fn run<R>(&self, f: impl FnOnce(&mut Terminal) -> Result<R>) -> Result<R> {
        self.with_shared(|shared, origin| shared.run(origin, f))
    }

    fn read<R>(&self, f: impl FnOnce(&Session) -> R) -> Result<R> {
        self.with_shared(|shared, _| shared.read(f))
    }

    fn release(&mut self) {
        self.closed = true;
        if let Some(shared) = self.shared.upgrade() {
            shared.registry.lock().remove(self.id);
        }
    }
}

impl EventHandle {
    session_ops!();
}

impl Drop for EventHandle {
    fn drop(&mut self) {
        if !self.closed {
            self.release();
        }
    }
}
