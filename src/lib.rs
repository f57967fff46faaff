//! Terminal session dispatch with multiplexed event handles
//!
//! A single [`Dispatcher`] owns the terminal: the device, the output
//! buffer and the session state (raw or cooked mode, current screen,
//! mouse capture, cursor visibility, style and cursor position).  Any
//! number of [`EventHandle`]s can be created from it, each of which
//! may be moved to its own thread.  Handles issue output and mode
//! changes through the dispatcher's lock, and each receives its own
//! copy of every input event decoded after it was created.
//!
//! ## Output
//!
//! Drawing, cursor and style commands are buffered and only sent to
//! the terminal on `flush`, as a single write.  The session state is
//! updated as commands are buffered, so queries reflect output that
//! hasn't been flushed yet.  Mode changes flush first.
//!
//! ## Input
//!
//! A dedicated thread reads the terminal input, decodes keypresses and
//! mouse reports, and fans them out to the handles' backlogs.  A lone
//! `Esc` is reported once the escape timeout expires with no sequence
//! following it.  Handles may poll without blocking, block, or block
//! with a timeout.  For Stakker applications, [`Listener`] forwards a
//! handle's events to a `Fwd`.
//!
//! ## Screens
//!
//! Screen 0 is the main screen.  `switch` creates further screens on
//! the terminal's alternate buffer.  Each screen remembers its own
//! modes and cursor mark, which are restored on `switch_to`.
//!
//! ## Devices
//!
//! [`Tty`] drives the process's controlling terminal on UNIX.
//! [`VirtualDevice`] is an in-memory terminal for headless use and
//! testing.  Dropping the dispatcher restores the terminal to cooked
//! mode on the main screen.
//!
//! [`Dispatcher`]: struct.Dispatcher.html
//! [`EventHandle`]: struct.EventHandle.html
//! [`Listener`]: struct.Listener.html
//! [`Tty`]: struct.Tty.html
//! [`VirtualDevice`]: struct.VirtualDevice.html

#![deny(rust_2018_idioms)]

mod broadcast;
mod config;
mod decoder;
mod device;
mod dispatcher;
mod error;
mod event;
mod handle;
mod key;
mod listener;
mod session;
mod style;
mod terminal;
mod termout;

pub use broadcast::HandleId;
pub use config::{Config, LockPolicy};
pub use decoder::{Decoder, Feed};
pub use device::{Device, DeviceReader, VirtualConsole, VirtualDevice, Wake};
pub use dispatcher::Dispatcher;
pub use error::{Error, Result};
pub use event::{Coord, Event, EventKind, Key, Mouse, MouseButton, Payload};
pub use handle::{EventHandle, HandleState};
pub use key::{decode, Step, Token};
pub use listener::Listener;
pub use session::{Mode, ScreenMeta, Session};
pub use style::{Color, Effects, Style};
pub use termout::{Clear, Command, TermOut};

#[cfg(unix)]
mod os_mio_unix;
#[cfg(unix)]
use os_mio_unix as os_glue;
#[cfg(unix)]
pub use os_glue::Tty;

#[cfg(not(unix))]
std::compile_error!("OS interface not yet implemented on this platform");
