use crate::broadcast::{HandleId, Registry};
use crate::config::{Config, LockPolicy};
use crate::decoder::Decoder;
use crate::device::{Device, DeviceReader, Wake};
use crate::error::{Error, Result};
use crate::event::Coord;
use crate::handle::EventHandle;
use crate::key::Token;
use crate::session::{Mode, Session};
use crate::style::{Color, Effects, Style};
use crate::terminal::Terminal;
use crate::termout::{Clear, Command};
use parking_lot::{Mutex, MutexGuard};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

/// Who is asking.  Only handles are subject to the lock policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Origin {
    Dispatcher,
    Handle(HandleId),
}

/// State shared between the dispatcher, its handles and the input
/// pump
pub(crate) struct Shared {
    term: Mutex<Terminal>,
    pub(crate) registry: Mutex<Registry>,
    report: Mutex<Option<flume::Sender<Coord>>>,
    running: AtomicBool,
    failure: Mutex<Option<String>>,
    config: Config,
}

impl Shared {
    pub(crate) fn check_alive(&self) -> Result<()> {
        if let Some(reason) = &*self.failure.lock() {
            return Err(Error::SessionFailed(reason.clone()));
        }
        if !self.running.load(Ordering::Acquire) {
            return Err(Error::Shutdown);
        }
        Ok(())
    }

    fn check_lock(&self, origin: Origin) -> Result<()> {
        if let (LockPolicy::Exclusive, Origin::Handle(id)) = (self.config.lock_policy, origin) {
            if let Some(holder) = self.registry.lock().holder() {
                if holder != id {
                    return Err(Error::Locked { holder });
                }
            }
        }
        Ok(())
    }

    fn lock_term(&self, origin: Origin) -> Result<MutexGuard<'_, Terminal>> {
        self.check_alive()?;
        let term = self.term.lock();
        // A failure may have happened whilst waiting for the lock.  The
        // interaction lock only changes hands under the session lock,
        // so it can't be taken between this check and the operation.
        self.check_alive()?;
        self.check_lock(origin)?;
        Ok(term)
    }

    /// Give the interaction lock to a handle.  Any session operation
    /// in progress completes first.
    pub(crate) fn take_lock(&self, id: HandleId) -> Result<()> {
        self.check_alive()?;
        let _term = self.term.lock();
        self.registry.lock().lock(id)
    }

    /// Run a session operation under the session lock.  A device
    /// failure kills the session.
    pub(crate) fn run<R>(
        &self,
        origin: Origin,
        f: impl FnOnce(&mut Terminal) -> Result<R>,
    ) -> Result<R> {
        let mut term = self.lock_term(origin)?;
        let result = f(&mut term);
        drop(term);
        self.check_device(result)
    }

    /// Read the session under the session lock
    pub(crate) fn read<R>(&self, f: impl FnOnce(&Session) -> R) -> Result<R> {
        self.check_alive()?;
        Ok(f(self.term.lock().session()))
    }

    fn check_device<R>(&self, result: Result<R>) -> Result<R> {
        if let Err(Error::Device(e)) = &result {
            self.fail(e);
        }
        result
    }

    /// Mark the session as failed and disconnect every handle
    fn fail(&self, err: &std::io::Error) {
        let mut failure = self.failure.lock();
        if failure.is_none() {
            tracing::error!(error = %err, "terminal device failed, session terminated");
            *failure = Some(err.to_string());
            drop(failure);
            self.registry.lock().close_all();
        }
    }

    /// Ask the terminal where the cursor really is, and resync the
    /// session with the answer
    pub(crate) fn sync_pos(&self, origin: Origin) -> Result<Coord> {
        let mut term = self.lock_term(origin)?;
        let result = self.sync_pos_locked(&mut term);
        drop(term);
        self.check_device(result)
    }

    fn sync_pos_locked(&self, term: &mut Terminal) -> Result<Coord> {
        if let Some(at) = term.query_cursor()? {
            term.set_cursor(at);
            return Ok(at);
        }

        let (tx, rx) = flume::bounded(1);
        *self.report.lock() = Some(tx);
        let answer = self.await_report(term, &rx);
        self.report.lock().take();
        match answer? {
            Some(at) => {
                term.set_cursor(at);
                Ok(at)
            }
            None => {
                tracing::warn!("no cursor position report from terminal");
                Err(Error::ReportTimeout)
            }
        }
    }

    // The report comes back as input, which is only passed through
    // promptly in raw mode
    fn await_report(
        &self,
        term: &mut Terminal,
        rx: &flume::Receiver<Coord>,
    ) -> Result<Option<Coord>> {
        let cooked = term.session().mode() == Mode::Cooked;
        if cooked {
            term.device_mode(Mode::Raw)?;
        }
        let sent = term.request_cursor_report();
        let answer = match sent {
            Ok(()) => rx.recv_timeout(self.config.report_timeout).ok(),
            Err(_) => None,
        };
        if cooked {
            term.device_mode(Mode::Cooked)?;
        }
        sent?;
        Ok(answer)
    }

    fn deliver(&self, token: Token) {
        match token {
            Token::Event(ev) => {
                tracing::trace!(?ev, "input event");
                self.registry.lock().publish(ev);
            }
            Token::CursorReport(at) => match self.report.lock().take() {
                Some(tx) => {
                    let _ = tx.send(at);
                }
                None => tracing::trace!(?at, "unrequested cursor report dropped"),
            },
        }
    }

    // Returns false if the session was busy and the size should be
    // refreshed later
    fn try_refresh_size(&self) -> bool {
        match self.term.try_lock() {
            Some(mut term) => {
                let result = term.refresh_size();
                drop(term);
                let _ = self.check_device(result);
                true
            }
            None => false,
        }
    }
}

// Input pump: the only reader of the device's input.  Decodes what
// arrives and fans it out to the handles.
fn pump(shared: Arc<Shared>, mut reader: Box<dyn DeviceReader>) {
    let timeout = shared.config.escape_timeout;
    let mut decoder = Decoder::new();
    let mut inbuf = Vec::new();
    let mut last_input = Instant::now();
    let mut resize_pending = false;
    tracing::debug!("input pump started");

    while shared.running.load(Ordering::Acquire) {
        if resize_pending {
            resize_pending = !shared.try_refresh_size();
        }
        let wait = if decoder.has_pending() {
            timeout.saturating_sub(last_input.elapsed())
        } else {
            timeout
        };
        let wake = match reader.wait(wait) {
            Ok(wake) => wake,
            Err(e) => {
                if shared.running.load(Ordering::Acquire) {
                    shared.fail(&e);
                }
                break;
            }
        };
        match wake {
            Wake::Resize => resize_pending = true,
            Wake::Input => {
                inbuf.clear();
                if let Err(e) = reader.read(&mut inbuf) {
                    shared.fail(&e);
                    break;
                }
                last_input = Instant::now();
                for token in decoder.feed(&inbuf) {
                    shared.deliver(token);
                }
            }
            Wake::Timeout => {
                // Nothing followed, so an incomplete sequence is taken
                // as-is.  This is how a lone Esc gets through.
                if decoder.has_pending() && last_input.elapsed() >= timeout {
                    for token in decoder.force() {
                        shared.deliver(token);
                    }
                }
            }
        }
    }
    tracing::debug!("input pump stopped");
}

/// Generates the output and session operations shared by
/// `Dispatcher` and `EventHandle`.  The implementing type provides
/// `run`, `read` and `sync_origin`.
macro_rules! session_ops {
    () => {
        /// Move the cursor to (col, row).  A position outside the
        /// current terminal size is rejected with
        /// `Error::InvalidCoordinate` and the cursor stays where it
        /// was.
        pub fn goto(&self, col: u16, row: u16) -> Result<()> {
            self.run(|t| t.append(Command::Goto(col, row)))
        }

        /// Move the cursor up, stopping at the top row
        pub fn up(&self, n: u16) -> Result<()> {
            self.run(|t| t.append(Command::Up(n)))
        }

        pub fn down(&self, n: u16) -> Result<()> {
            self.run(|t| t.append(Command::Down(n)))
        }

        pub fn left(&self, n: u16) -> Result<()> {
            self.run(|t| t.append(Command::Left(n)))
        }

        pub fn right(&self, n: u16) -> Result<()> {
            self.run(|t| t.append(Command::Right(n)))
        }

        pub fn clear(&self, region: Clear) -> Result<()> {
            self.run(|t| t.append(Command::Clear(region)))
        }

        /// Ask the terminal window to change size.  The session size
        /// follows once the terminal reports the change.
        pub fn resize(&self, width: u16, height: u16) -> Result<()> {
            self.run(|t| t.append(Command::Resize(width, height)))
        }

        /// Buffer text for output.  The recorded cursor moves right by
        /// one column per character, stopping at the edge.
        pub fn prints(&self, text: &str) -> Result<()> {
            self.run(|t| t.append(Command::Text(text.to_string())))
        }

        /// Buffer text and flush
        pub fn printf(&self, text: &str) -> Result<()> {
            self.run(|t| {
                t.append(Command::Text(text.to_string()))?;
                t.flush()
            })
        }

        /// Write all buffered output to the terminal in one go
        pub fn flush(&self) -> Result<()> {
            self.run(|t| t.flush())
        }

        /// Append a raw command
        pub fn append(&self, cmd: Command) -> Result<()> {
            self.run(|t| t.append(cmd))
        }

        pub fn set_fg(&self, color: Color) -> Result<()> {
            self.run(|t| t.append(Command::SetFg(color)))
        }

        pub fn set_bg(&self, color: Color) -> Result<()> {
            self.run(|t| t.append(Command::SetBg(color)))
        }

        pub fn set_fx(&self, fx: Effects) -> Result<()> {
            self.run(|t| t.append(Command::SetFx(fx)))
        }

        pub fn set_styles(&self, fg: Color, bg: Color, fx: Effects) -> Result<()> {
            self.run(|t| t.set_style(Style { fg, bg, fx }))
        }

        pub fn reset_styles(&self) -> Result<()> {
            self.run(|t| t.append(Command::ResetStyles))
        }

        /// Switch to raw mode.  Does nothing if already raw.
        pub fn raw(&self) -> Result<()> {
            self.run(|t| t.set_mode(Mode::Raw))
        }

        /// Switch to cooked mode.  Does nothing if already cooked.
        pub fn cook(&self) -> Result<()> {
            self.run(|t| t.set_mode(Mode::Cooked))
        }

        pub fn enable_mouse(&self) -> Result<()> {
            self.run(|t| t.set_mouse(true))
        }

        pub fn disable_mouse(&self) -> Result<()> {
            self.run(|t| t.set_mouse(false))
        }

        pub fn show_cursor(&self) -> Result<()> {
            self.run(|t| t.set_cursor_visible(true))
        }

        pub fn hide_cursor(&self) -> Result<()> {
            self.run(|t| t.set_cursor_visible(false))
        }

        /// Save the cursor position of the current screen and switch
        /// to a new screen on the alternate buffer.  The new screen
        /// starts in cooked mode with the mouse off and the cursor at
        /// the top left.  Returns the new screen's id.
        pub fn switch(&self) -> Result<usize> {
            self.run(|t| t.switch())
        }

        /// Switch to a screen created earlier, restoring its modes and
        /// cursor position.  Screen 0 is the main screen.
        pub fn switch_to(&self, id: usize) -> Result<()> {
            self.run(|t| t.switch_to(id))
        }

        /// Return to the main screen
        pub fn to_main(&self) -> Result<()> {
            self.switch_to(0)
        }

        /// Save the cursor position as the current screen's mark
        pub fn mark(&self) -> Result<()> {
            self.run(|t| t.mark())
        }

        pub fn mark_at(&self, col: u16, row: u16) -> Result<()> {
            self.run(|t| t.mark_at(Coord::new(col, row)))
        }

        /// Move the cursor to the current screen's mark
        pub fn load(&self) -> Result<()> {
            self.run(|t| t.load())
        }

        /// Re-read the terminal size from the device
        pub fn refresh_size(&self) -> Result<(u16, u16)> {
            self.run(|t| t.refresh_size())
        }

        /// Cursor position as recorded by the session
        pub fn coord(&self) -> Result<Coord> {
            self.read(|s| s.cursor())
        }

        /// Terminal size as (width, height)
        pub fn size(&self) -> Result<(u16, u16)> {
            self.read(|s| s.size())
        }

        pub fn style(&self) -> Result<Style> {
            self.read(|s| s.style())
        }

        pub fn screen(&self) -> Result<usize> {
            self.read(|s| s.screen())
        }

        pub fn mode(&self) -> Result<Mode> {
            self.read(|s| s.mode())
        }

        /// Consistent copy of the whole session state
        pub fn snapshot(&self) -> Result<Session> {
            self.read(|s| s.clone())
        }
    };
}

pub(crate) use session_ops;

/// Owner of the terminal session
///
/// The dispatcher holds the device, the output buffer and the session
/// state behind a single lock, and runs an input pump thread that
/// decodes input and broadcasts it to every [`EventHandle`].  All
/// output and mode operations are available both here and on the
/// handles.
///
/// Dropping the dispatcher (or calling [`Dispatcher::shutdown`])
/// restores the terminal and disconnects all the handles.
///
/// [`EventHandle`]: struct.EventHandle.html
/// [`Dispatcher::shutdown`]: struct.Dispatcher.html#method.shutdown
pub struct Dispatcher {
    shared: Arc<Shared>,
    pump: Option<JoinHandle<()>>,
}

impl Dispatcher {
    /// Take over the given device with the default configuration
    pub fn new(device: impl Device + 'static) -> Result<Self> {
        Self::with_config(device, Config::default())
    }

    pub fn with_config(device: impl Device + 'static, config: Config) -> Result<Self> {
        let mut device: Box<dyn Device> = Box::new(device);
        let reader = device.reader()?;
        let size = device.query_size()?;
        let policy = config.lock_policy;
        let shared = Arc::new(Shared {
            term: Mutex::new(Terminal::new(device, size)),
            registry: Mutex::new(Registry::new(policy)),
            report: Mutex::new(None),
            running: AtomicBool::new(true),
            failure: Mutex::new(None),
            config,
        });
        let shared2 = shared.clone();
        let pump = std::thread::Builder::new()
            .name("tuitty-input".into())
            .spawn(move || pump(shared2, reader))?;
        tracing::debug!(width = size.0, height = size.1, ?policy, "dispatcher started");
        Ok(Self {
            shared,
            pump: Some(pump),
        })
    }

    /// Create a handle that receives every event decoded from now on
    pub fn listen(&self) -> Result<EventHandle> {
        self.shared.check_alive()?;
        let (id, rx) = self.shared.registry.lock().register()?;
        Ok(EventHandle::new(id, Arc::downgrade(&self.shared), rx))
    }

    /// Same as [`Dispatcher::listen`].  Handles are `Send`, so the
    /// result may be moved to another thread.
    ///
    /// [`Dispatcher::listen`]: struct.Dispatcher.html#method.listen
    pub fn spawn(&self) -> Result<EventHandle> {
        self.listen()
    }

    /// Handle currently holding the interaction lock, if any
    pub fn lock_holder(&self) -> Option<HandleId> {
        self.shared.registry.lock().holder()
    }

    /// Ask the terminal for the real cursor position and record it.
    /// Fails with `Error::ReportTimeout` if the terminal doesn't
    /// answer in time.
    pub fn sync_pos(&self) -> Result<Coord> {
        self.shared.sync_pos(Origin::Dispatcher)
    }

    /// Restore the terminal and disconnect all handles, reporting any
    /// failure doing so
    pub fn shutdown(mut self) -> Result<()> {
        self.close()
    }

    fn close(&mut self) -> Result<()> {
        let pump = match self.pump.take() {
            Some(pump) => pump,
            None => return Ok(()),
        };
        let failed = self.shared.failure.lock().is_some();
        self.shared.running.store(false, Ordering::Release);
        let result = self.shared.term.lock().teardown();
        self.shared.registry.lock().close_all();
        if pump.join().is_err() {
            tracing::error!("input pump panicked");
        }
        tracing::debug!("dispatcher shut down");
        match result {
            // Nothing more can be expected of a dead device
            Err(_) if failed => Ok(()),
            result => result,
        }
    }

    fn run<R>(&self, f: impl FnOnce(&mut Terminal) -> Result<R>) -> Result<R> {
        self.shared.run(Origin::Dispatcher, f)
    }

    fn read<R>(&self, f: impl FnOnce(&Session) -> R) -> Result<R> {
        self.shared.read(f)
    }
}

impl Dispatcher {
    session_ops!();
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!(error = %e, "failed to restore terminal");
        }
    }
}
