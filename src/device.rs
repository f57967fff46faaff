//! Terminal device boundary
//!
//! The [`Device`] trait is the only way the dispatcher touches the
//! physical terminal.  Input is read through a separate
//! [`DeviceReader`] half, which is moved onto the input pump thread
//! so that reading never contends with output.
//!
//! [`VirtualDevice`] is an in-memory device for headless runs and
//! tests.  It is driven from the other side by a [`VirtualConsole`].

use crate::event::Coord;
use crate::session::Mode;
use parking_lot::Mutex;
use std::io::{Error, ErrorKind, Result};
use std::sync::Arc;
use std::time::Duration;

/// Reason [`DeviceReader::wait`] returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    /// Input bytes are ready to read
    Input,
    /// The terminal window changed size
    Resize,
    /// Nothing happened before the timeout
    Timeout,
}

/// Input half of a terminal device
pub trait DeviceReader: Send {
    /// Wait up to `timeout` for input or a resize
    fn wait(&mut self, timeout: Duration) -> Result<Wake>;

    /// Append all immediately available input to `buf` without
    /// blocking.  Returns the number of bytes added, which may be 0.
    fn read(&mut self, buf: &mut Vec<u8>) -> Result<usize>;
}

/// Output and control half of a terminal device
pub trait Device: Send {
    /// Take the input half.  This may only be done once.
    fn reader(&mut self) -> Result<Box<dyn DeviceReader>>;

    /// Write all of `data`, or fail
    fn write(&mut self, data: &[u8]) -> Result<()>;

    /// Current size as (width, height)
    fn query_size(&mut self) -> Result<(u16, u16)>;

    /// Current cursor position.  `None` means the device can't answer
    /// directly, and the position has to be requested in-band with a
    /// cursor report sequence.
    fn query_cursor(&mut self) -> Result<Option<Coord>>;

    fn set_mode(&mut self, mode: Mode) -> Result<()>;
    fn set_alt_screen(&mut self, on: bool) -> Result<()>;
    fn set_mouse_capture(&mut self, on: bool) -> Result<()>;
    fn set_cursor_visible(&mut self, on: bool) -> Result<()>;

    /// Generate a standalone function that makes a best effort to
    /// restore the terminal to normal from its current state,
    /// ignoring errors.  This is for use from a panic handler.
    /// Devices with nothing to restore return `None`.
    fn cleanup_fn(&mut self) -> Option<Box<dyn Fn() + Send + Sync + 'static>>;
}

enum Input {
    Bytes(Vec<u8>),
    Resize,
}

#[derive(Debug)]
struct Probe {
    output: Vec<u8>,
    writes: usize,
    size: (u16, u16),
    cursor: Option<Coord>,
    mode: Mode,
    alt_screen: bool,
    alt_screen_calls: usize,
    mouse_capture: bool,
    cursor_visible: bool,
    failing: bool,
}

impl Probe {
    fn check(&self) -> Result<()> {
        if self.failing {
            Err(Error::new(ErrorKind::BrokenPipe, "virtual terminal hung up"))
        } else {
            Ok(())
        }
    }
}

/// In-memory terminal device
///
/// Everything written is captured, every mode change is recorded, and
/// input is whatever the paired [`VirtualConsole`] sends.  Dropping
/// the console looks like a hang-up to the reader.
pub struct VirtualDevice {
    probe: Arc<Mutex<Probe>>,
    input: Option<flume::Receiver<Input>>,
}

impl VirtualDevice {
    /// Create a device of the given size, along with the console that
    /// drives it
    pub fn new(width: u16, height: u16) -> (Self, VirtualConsole) {
        let probe = Arc::new(Mutex::new(Probe {
            output: Vec::new(),
            writes: 0,
            size: (width, height),
            cursor: None,
            mode: Mode::Cooked,
            alt_screen: false,
            alt_screen_calls: 0,
            mouse_capture: false,
            cursor_visible: true,
            failing: false,
        }));
        let (tx, rx) = flume::unbounded();
        let device = Self {
            probe: probe.clone(),
            input: Some(rx),
        };
        (device, VirtualConsole { probe, input: tx })
    }

    fn update(&mut self, f: impl FnOnce(&mut Probe)) -> Result<()> {
        let mut probe = self.probe.lock();
        probe.check()?;
        f(&mut probe);
        Ok(())
    }
}

impl Device for VirtualDevice {
    fn reader(&mut self) -> Result<Box<dyn DeviceReader>> {
        match self.input.take() {
            Some(rx) => Ok(Box::new(VirtualReader {
                rx,
                ready: Vec::new(),
                resized: false,
            })),
            None => Err(Error::new(ErrorKind::Other, "input reader already taken")),
        }
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        self.update(|p| {
            p.output.extend_from_slice(data);
            p.writes += 1;
        })
    }

    fn query_size(&mut self) -> Result<(u16, u16)> {
        let probe = self.probe.lock();
        probe.check()?;
        Ok(probe.size)
    }

    fn query_cursor(&mut self) -> Result<Option<Coord>> {
        let probe = self.probe.lock();
        probe.check()?;
        Ok(probe.cursor)
    }

    fn set_mode(&mut self, mode: Mode) -> Result<()> {
        self.update(|p| p.mode = mode)
    }

    fn set_alt_screen(&mut self, on: bool) -> Result<()> {
        self.update(|p| {
            p.alt_screen = on;
            p.alt_screen_calls += 1;
        })
    }

    fn set_mouse_capture(&mut self, on: bool) -> Result<()> {
        self.update(|p| p.mouse_capture = on)
    }

    fn set_cursor_visible(&mut self, on: bool) -> Result<()> {
        self.update(|p| p.cursor_visible = on)
    }

    fn cleanup_fn(&mut self) -> Option<Box<dyn Fn() + Send + Sync + 'static>> {
        None
    }
}

struct VirtualReader {
    rx: flume::Receiver<Input>,
    ready: Vec<u8>,
    resized: bool,
}

impl VirtualReader {
    fn accept(&mut self, input: Input) -> Wake {
        match input {
            Input::Bytes(data) => {
                self.ready.extend_from_slice(&data);
                Wake::Input
            }
            Input::Resize => Wake::Resize,
        }
    }
}

impl DeviceReader for VirtualReader {
    fn wait(&mut self, timeout: Duration) -> Result<Wake> {
        if !self.ready.is_empty() {
            return Ok(Wake::Input);
        }
        if self.resized {
            self.resized = false;
            return Ok(Wake::Resize);
        }
        match self.rx.recv_timeout(timeout) {
            Ok(input) => Ok(self.accept(input)),
            Err(flume::RecvTimeoutError::Timeout) => Ok(Wake::Timeout),
            Err(flume::RecvTimeoutError::Disconnected) => Err(Error::new(
                ErrorKind::UnexpectedEof,
                "virtual console disconnected",
            )),
        }
    }

    fn read(&mut self, buf: &mut Vec<u8>) -> Result<usize> {
        // Gather anything else already queued, stopping at a resize
        // so that it is reported by the next wait
        while !self.resized {
            match self.rx.try_recv() {
                Ok(Input::Bytes(data)) => self.ready.extend_from_slice(&data),
                Ok(Input::Resize) => self.resized = true,
                Err(_) => break,
            }
        }
        let count = self.ready.len();
        buf.append(&mut self.ready);
        Ok(count)
    }
}

/// Far side of a [`VirtualDevice`]: acts as the user and the terminal
/// emulator
#[derive(Clone)]
pub struct VirtualConsole {
    probe: Arc<Mutex<Probe>>,
    input: flume::Sender<Input>,
}

impl VirtualConsole {
    /// Type some input.  Returns false if the reader has gone.
    pub fn send_input(&self, data: &[u8]) -> bool {
        self.input.send(Input::Bytes(data.to_vec())).is_ok()
    }

    /// Change the window size and signal the resize
    pub fn resize(&self, width: u16, height: u16) -> bool {
        self.probe.lock().size = (width, height);
        self.input.send(Input::Resize).is_ok()
    }

    /// Make `query_cursor` answer directly with this position, or
    /// with `None` to require an in-band report
    pub fn set_cursor(&self, at: Option<Coord>) {
        self.probe.lock().cursor = at;
    }

    /// Make every device call fail from now on, as if the terminal
    /// had hung up
    pub fn hang_up(&self) {
        self.probe.lock().failing = true;
    }

    /// Everything written so far
    pub fn output(&self) -> Vec<u8> {
        self.probe.lock().output.clone()
    }

    /// Take everything written so far, clearing the record
    pub fn take_output(&self) -> Vec<u8> {
        std::mem::take(&mut self.probe.lock().output)
    }

    /// Number of `write` calls made on the device
    pub fn write_count(&self) -> usize {
        self.probe.lock().writes
    }

    pub fn mode(&self) -> Mode {
        self.probe.lock().mode
    }

    pub fn alt_screen(&self) -> bool {
        self.probe.lock().alt_screen
    }

    /// Number of `set_alt_screen` calls made on the device
    pub fn alt_screen_calls(&self) -> usize {
        self.probe.lock().alt_screen_calls
    }

    pub fn mouse_capture(&self) -> bool {
        self.probe.lock().mouse_capture
    }

    pub fn cursor_visible(&self) -> bool {
        self.probe.lock().cursor_visible
    }
}
