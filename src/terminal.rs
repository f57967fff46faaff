use crate::device::Device;
use crate::error::Result;
use crate::event::Coord;
use crate::session::{Mode, Session};
use crate::style::Style;
use crate::termout::{Command, TermOut, CURSOR_REPORT};
use std::panic::PanicHookInfo;
use std::sync::Arc;

type PanicHook = Arc<Box<dyn Fn(&PanicHookInfo<'_>) + 'static + Sync + Send>>;

/// The terminal as seen from inside the dispatcher's session lock:
/// session state, output buffer and device, always updated together
///
/// Every mode change goes through here, so the device never gets out
/// of step with the session.  Pending output is flushed before any
/// mode change, so that it lands on the screen it was drawn for.
///
/// # Panic handling
///
/// When Rust panics, the terminal must be restored to its normal
/// state otherwise things would be left in a bad state for the user
/// (in cooked mode with no echo, requiring the user to blindly type
/// `reset` on the command-line).  So if the device provides a cleanup
/// function, this code saves a copy of the current panic handler
/// (using `std::panic::take_hook`), and then installs its own handler
/// that does terminal cleanup before calling on to the saved panic
/// handler.  This means that if any custom panic handler is needed by
/// the application, then it must be set up before the dispatcher is
/// created.
pub(crate) struct Terminal {
    session: Session,
    out: TermOut,
    device: Box<dyn Device>,
    panic_hook: Option<PanicHook>,
}

impl Terminal {
    pub(crate) fn new(mut device: Box<dyn Device>, size: (u16, u16)) -> Self {
        let panic_hook = device
            .cleanup_fn()
            .map(|_| Arc::new(std::panic::take_hook()));
        let mut this = Self {
            session: Session::new(size),
            out: TermOut::new(),
            device,
            panic_hook,
        };
        this.update_panic_hook();
        this
    }

    pub(crate) fn session(&self) -> &Session {
        &self.session
    }

    /// Append a command to the output buffer, updating the session to
    /// match.  A rejected command leaves both untouched.
    pub(crate) fn append(&mut self, cmd: Command) -> Result<()> {
        self.session.apply(&cmd)?;
        self.out.append(&cmd, &self.session.style());
        Ok(())
    }

    /// Send all buffered output to the device in a single write
    pub(crate) fn flush(&mut self) -> Result<()> {
        if !self.out.is_empty() {
            let data = self.out.drain();
            self.device.write(&data)?;
        }
        Ok(())
    }

    pub(crate) fn set_mode(&mut self, mode: Mode) -> Result<()> {
        if self.session.mode() != mode {
            self.flush()?;
            self.device.set_mode(mode)?;
            self.session.current_mut().mode = mode;
            tracing::debug!(?mode, "terminal mode changed");
            self.update_panic_hook();
        }
        Ok(())
    }

    pub(crate) fn set_mouse(&mut self, on: bool) -> Result<()> {
        if self.session.mouse_enabled() != on {
            self.flush()?;
            self.device.set_mouse_capture(on)?;
            self.session.current_mut().mouse_enabled = on;
            self.update_panic_hook();
        }
        Ok(())
    }

    pub(crate) fn set_cursor_visible(&mut self, on: bool) -> Result<()> {
        if self.session.cursor_visible() != on {
            self.flush()?;
            self.device.set_cursor_visible(on)?;
            self.session.current_mut().cursor_visible = on;
            self.update_panic_hook();
        }
        Ok(())
    }

    /// Create a new screen and switch to it.  Returns its id.  The new
    /// screen starts cooked with the mouse off.
    pub(crate) fn switch(&mut self) -> Result<usize> {
        self.flush()?;
        let current = *self.session.current();
        // All screens but the main one share the one alternate buffer
        if self.session.screen() == 0 {
            self.device.set_alt_screen(true)?;
        }
        if current.mode != Mode::Cooked {
            self.device.set_mode(Mode::Cooked)?;
        }
        if current.mouse_enabled {
            self.device.set_mouse_capture(false)?;
        }
        self.session.save_mark();
        let id = self.session.push_screen();
        self.session.set_screen(id);
        self.session.set_cursor(Coord::default());
        self.out.append(&Command::Goto(0, 0), &self.session.style());
        self.flush()?;
        tracing::debug!(screen = id, "switched to new screen");
        self.update_panic_hook();
        Ok(id)
    }

    /// Switch to an existing screen, restoring its modes and moving
    /// the cursor to its mark
    pub(crate) fn switch_to(&mut self, id: usize) -> Result<()> {
        let target = *self.session.meta(id)?;
        self.session.check(target.mark)?;
        let from = self.session.screen();
        self.flush()?;
        if from != id {
            self.session.save_mark();
            let current = *self.session.current();
            if (from == 0) != (id == 0) {
                self.device.set_alt_screen(id != 0)?;
            }
            if current.mode != target.mode {
                self.device.set_mode(target.mode)?;
            }
            if current.mouse_enabled != target.mouse_enabled {
                self.device.set_mouse_capture(target.mouse_enabled)?;
            }
            if current.cursor_visible != target.cursor_visible {
                self.device.set_cursor_visible(target.cursor_visible)?;
            }
            self.session.set_screen(id);
            tracing::debug!(from, to = id, "switched screen");
        }
        self.append(Command::Goto(target.mark.col, target.mark.row))?;
        self.flush()?;
        self.update_panic_hook();
        Ok(())
    }

    /// Save the cursor as the current screen's mark
    pub(crate) fn mark(&mut self) -> Result<()> {
        self.session.check(self.session.cursor())?;
        self.session.save_mark();
        Ok(())
    }

    pub(crate) fn mark_at(&mut self, at: Coord) -> Result<()> {
        self.session.check(at)?;
        self.session.current_mut().mark = at;
        Ok(())
    }

    /// Move the cursor back to the current screen's mark
    pub(crate) fn load(&mut self) -> Result<()> {
        let mark = self.session.current().mark;
        self.append(Command::Goto(mark.col, mark.row))
    }

    pub(crate) fn set_style(&mut self, style: Style) -> Result<()> {
        self.append(Command::SetStyles(style.fg, style.bg, style.fx))
    }

    pub(crate) fn refresh_size(&mut self) -> Result<(u16, u16)> {
        let size = self.device.query_size()?;
        if size != self.session.size() {
            tracing::debug!(width = size.0, height = size.1, "terminal resized");
            self.session.set_size(size);
        }
        Ok(size)
    }

    /// Ask the device where the cursor is.  `None` means the answer
    /// has to come back in-band.
    pub(crate) fn query_cursor(&mut self) -> Result<Option<Coord>> {
        Ok(self.device.query_cursor()?)
    }

    /// Flush and send an in-band cursor position request
    pub(crate) fn request_cursor_report(&mut self) -> Result<()> {
        self.flush()?;
        self.device.write(CURSOR_REPORT)?;
        Ok(())
    }

    /// Temporarily switch the device mode without recording it in the
    /// session.  Used whilst waiting for a report in cooked mode.
    pub(crate) fn device_mode(&mut self, mode: Mode) -> Result<()> {
        self.device.set_mode(mode)?;
        self.update_panic_hook();
        Ok(())
    }

    pub(crate) fn set_cursor(&mut self, at: Coord) {
        self.session.set_cursor(at);
    }

    /// Restore the terminal to how the shell expects it: styles reset,
    /// mouse off, cursor shown, main screen and cooked mode.  Unsent
    /// output is dropped.
    pub(crate) fn teardown(&mut self) -> Result<()> {
        let result = self.restore();
        self.remove_panic_hook();
        result
    }

    fn restore(&mut self) -> Result<()> {
        self.out.discard();
        self.append(Command::ResetStyles)?;
        self.flush()?;
        self.set_mouse(false)?;
        self.set_cursor_visible(true)?;
        if self.session.screen() != 0 {
            self.session.save_mark();
            self.device.set_alt_screen(false)?;
            let current = *self.session.current();
            self.session.set_screen(0);
            let main = self.session.current_mut();
            main.mode = current.mode;
            main.mouse_enabled = false;
            main.cursor_visible = true;
        }
        self.set_mode(Mode::Cooked)
    }

    // Install a panic hook that outputs the device's current cleanup
    // sequence, restores cooked mode and then does the saved panic
    // action (e.g. dump out backtrace).  This should be called every
    // time the terminal modes change.
    fn update_panic_hook(&mut self) {
        if let Some(defhook) = self.panic_hook.clone() {
            // Discard old hook
            let _ = std::panic::take_hook();
            match self.device.cleanup_fn() {
                Some(cleanup_fn) => std::panic::set_hook(Box::new(move |info| {
                    cleanup_fn();
                    defhook(info);
                })),
                None => std::panic::set_hook(Box::new(move |info| defhook(info))),
            }
        }
    }

    fn remove_panic_hook(&mut self) {
        if let Some(defhook) = self.panic_hook.take() {
            let _ = std::panic::take_hook();
            std::panic::set_hook(Box::new(move |info| defhook(info)));
        }
    }
}
