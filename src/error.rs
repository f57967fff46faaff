use crate::HandleId;
use std::io;
use thiserror::Error;

/// Errors reported by the [`Dispatcher`] and its [`EventHandle`]s
///
/// Errors local to one handle never disturb other handles or the
/// session.  A [`Error::Device`] failure is different: the terminal
/// mode may be unrecoverable at that point, so the whole session is
/// marked as failed and every later call reports
/// [`Error::SessionFailed`].
///
/// [`Dispatcher`]: struct.Dispatcher.html
/// [`EventHandle`]: struct.EventHandle.html
#[derive(Debug, Error)]
pub enum Error {
    /// A coordinate outside the current terminal size was passed to
    /// `goto`, `mark_at` or restored from a screen mark.  The call was
    /// rejected and the session is unchanged.
    #[error("coordinate ({col}, {row}) is outside the {width}x{height} terminal")]
    InvalidCoordinate {
        col: u16,
        row: u16,
        width: u16,
        height: u16,
    },

    /// `switch_to` referenced a screen that was never created
    #[error("screen {0} does not exist")]
    UnknownScreen(usize),

    /// The handle was stopped
    #[error("event handle is closed")]
    Closed,

    /// The dispatcher has been shut down
    #[error("dispatcher has been shut down")]
    Shutdown,

    /// An earlier device failure terminated the session
    #[error("terminal session failed: {0}")]
    SessionFailed(String),

    /// Another handle holds the interaction lock and the dispatcher is
    /// enforcing it
    #[error("interaction is locked by handle {holder}")]
    Locked { holder: HandleId },

    /// `lock` was called while another handle holds the lock
    #[error("lock is already held by handle {holder}")]
    LockHeld { holder: HandleId },

    /// The terminal did not answer a cursor position request in time
    #[error("terminal did not report the cursor position")]
    ReportTimeout,

    /// I/O failure on the terminal device
    #[error("terminal device error: {0}")]
    Device(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
