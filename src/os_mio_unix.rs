//! Handle WINCH through a UNIX signal forwarded through a pipe to
//! MIO.  Dump output data straight to stdout FD, with a blocking
//! call.  This will block the whole thread if the TTY is in XOFF.

use crate::device::{Device, DeviceReader, Wake};
use crate::event::Coord;
use crate::session::Mode;
use crate::termout::{ALT_SCREEN_OFF, ALT_SCREEN_ON, CURSOR_HIDE, CURSOR_SHOW, MOUSE_OFF, MOUSE_ON};
use libc::{c_int, c_ushort, c_void, ioctl, size_t, TIOCGWINSZ};
use mio::unix::SourceFd;
use mio::{Events, Interest, Poll, Token};
use signal_hook::SigId;
use std::io::{Error, ErrorKind, Result};
use std::mem;
use std::os::unix::io::AsRawFd;
use std::os::unix::net::UnixStream;
use std::time::Duration;

#[repr(C)]
#[derive(Default)]
struct WinSize {
    row: c_ushort,
    col: c_ushort,
    xpixel: c_ushort,
    ypixel: c_ushort,
}

const STDIN_FD: c_int = 0;
const STDOUT_FD: c_int = 1;

const STDIN: Token = Token(0);
const WINCH: Token = Token(1);

/// The process's controlling terminal, on stdin and stdout
pub struct Tty {
    saved: Option<libc::termios>,
    alt_screen: bool,
    mouse_capture: bool,
    cursor_hidden: bool,
    reader_taken: bool,
}

impl Tty {
    /// Fails if standard input is not a TTY
    pub fn new() -> Result<Self> {
        if 0 == unsafe { libc::isatty(STDIN_FD) } {
            return Err(Error::new(ErrorKind::Other, "Standard input is not a TTY"));
        }
        Ok(Self {
            saved: None,
            alt_screen: false,
            mouse_capture: false,
            cursor_hidden: false,
            reader_taken: false,
        })
    }

    fn write_aux(mut data: &[u8]) -> Result<()> {
        while !data.is_empty() {
            let cnt = unsafe {
                libc::write(
                    STDOUT_FD,
                    &data[0] as *const _ as *const c_void,
                    data.len() as size_t,
                )
            };
            if cnt < 0 {
                if errno::errno().0 == libc::EINTR {
                    continue;
                }
                return Err(Error::last_os_error());
            }
            data = &data[cnt as usize..];
        }
        Ok(())
    }

    // Set terminal into raw mode if not already in raw mode, and save
    // previous state so that it can be restored
    fn termios_set_raw(&mut self) -> Result<()> {
        if self.saved.is_some() {
            return Ok(());
        }

        let mut tbuf = mem::MaybeUninit::uninit();
        if 0 > unsafe { libc::tcgetattr(STDIN_FD, tbuf.as_mut_ptr()) } {
            return Err(Error::new(
                Error::last_os_error().kind(),
                "Unable to get terminal mode",
            ));
        }
        let mut tbuf = unsafe { tbuf.assume_init() };

        let saved = tbuf;
        unsafe { libc::cfmakeraw(&mut tbuf as *mut _) };

        if 0 > unsafe { libc::tcsetattr(STDIN_FD, libc::TCSANOW, &tbuf as *const libc::termios) } {
            return Err(Error::new(
                Error::last_os_error().kind(),
                "Unable to set terminal raw mode",
            ));
        }
        self.saved = Some(saved);
        Ok(())
    }

    // Restore terminal settings
    fn termios_restore(&mut self) -> Result<()> {
        if let Some(saved) = self.saved.take() {
            if 0 > unsafe {
                libc::tcsetattr(STDIN_FD, libc::TCSANOW, &saved as *const libc::termios)
            } {
                return Err(Error::new(
                    Error::last_os_error().kind(),
                    "Unable to restore terminal mode",
                ));
            }
        }
        Ok(())
    }

    // Sequence undoing whatever modes are currently applied
    fn reset_sequence(&self) -> Vec<u8> {
        let mut reset = b"\x1B[0m".to_vec();
        if self.mouse_capture {
            reset.extend_from_slice(MOUSE_OFF);
        }
        if self.cursor_hidden {
            reset.extend_from_slice(CURSOR_SHOW);
        }
        if self.alt_screen {
            reset.extend_from_slice(ALT_SCREEN_OFF);
        }
        reset
    }
}

impl Device for Tty {
    fn reader(&mut self) -> Result<Box<dyn DeviceReader>> {
        if self.reader_taken {
            return Err(Error::new(ErrorKind::Other, "input reader already taken"));
        }
        let reader = TtyReader::new()?;
        self.reader_taken = true;
        Ok(Box::new(reader))
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        Self::write_aux(data)
    }

    fn query_size(&mut self) -> Result<(u16, u16)> {
        let mut ws = WinSize::default();
        match unsafe { ioctl(STDOUT_FD, TIOCGWINSZ, &mut ws as *mut _ as *mut u8) } {
            -1 => Err(Error::last_os_error()),
            _ => Ok((ws.col, ws.row)),
        }
    }

    fn query_cursor(&mut self) -> Result<Option<Coord>> {
        // Only the terminal knows, so it has to be asked in-band
        Ok(None)
    }

    fn set_mode(&mut self, mode: Mode) -> Result<()> {
        match mode {
            Mode::Raw => self.termios_set_raw(),
            Mode::Cooked => self.termios_restore(),
        }
    }

    fn set_alt_screen(&mut self, on: bool) -> Result<()> {
        Self::write_aux(if on { ALT_SCREEN_ON } else { ALT_SCREEN_OFF })?;
        self.alt_screen = on;
        Ok(())
    }

    fn set_mouse_capture(&mut self, on: bool) -> Result<()> {
        Self::write_aux(if on { MOUSE_ON } else { MOUSE_OFF })?;
        self.mouse_capture = on;
        Ok(())
    }

    fn set_cursor_visible(&mut self, on: bool) -> Result<()> {
        Self::write_aux(if on { CURSOR_SHOW } else { CURSOR_HIDE })?;
        self.cursor_hidden = !on;
        Ok(())
    }

    fn cleanup_fn(&mut self) -> Option<Box<dyn Fn() + Send + Sync + 'static>> {
        let saved = self.saved;
        let reset = self.reset_sequence();
        Some(Box::new(move || {
            let _ = Self::write_aux(&reset[..]);
            if let Some(saved) = saved {
                unsafe { libc::tcsetattr(STDIN_FD, libc::TCSANOW, &saved as *const libc::termios) };
            };
        }))
    }
}

/// Input half of [`Tty`]: stdin and the WINCH pipe, polled by MIO
struct TtyReader {
    poll: Poll,
    events: Events,
    winch: UnixStream,
    sigid: SigId,
    stdin_flags: c_int,
    input_ready: bool,
    resized: bool,
}

impl TtyReader {
    fn new() -> Result<Self> {
        let poll = Poll::new()?;

        // Setup notification of WINCH signals
        let (read, write) = UnixStream::pair()?;
        read.set_nonblocking(true)?;
        let sigid = signal_hook::pipe::register(signal_hook::SIGWINCH, write)?;
        let fd = read.as_raw_fd();
        if let Err(e) = poll
            .registry()
            .register(&mut SourceFd(&fd), WINCH, Interest::READABLE)
        {
            signal_hook::unregister(sigid);
            return Err(e);
        }

        // Setup notification of input
        let stdin_flags = unsafe { libc::fcntl(STDIN_FD, libc::F_GETFL) };
        if 0 > stdin_flags
            || 0 > unsafe { libc::fcntl(STDIN_FD, libc::F_SETFL, stdin_flags | libc::O_NONBLOCK) }
        {
            signal_hook::unregister(sigid);
            return Err(Error::last_os_error());
        }
        let this = Self {
            poll,
            events: Events::with_capacity(16),
            winch: read,
            sigid,
            stdin_flags,
            input_ready: false,
            resized: false,
        };
        this.poll
            .registry()
            .register(&mut SourceFd(&STDIN_FD), STDIN, Interest::READABLE)?;
        Ok(this)
    }

    // Read all bytes from the notification pipe, to make sure we get a
    // new Ready notification for the next byte sent
    fn drain_winch(&mut self) {
        let fd = self.winch.as_raw_fd();
        let mut buf = [0u8; 32];
        while 0 < unsafe { libc::read(fd, &mut buf[0] as *mut u8 as *mut _, buf.len()) } {}
    }
}

impl DeviceReader for TtyReader {
    fn wait(&mut self, timeout: Duration) -> Result<Wake> {
        // Readiness is edge-triggered, so anything seen but not yet
        // handled is remembered until it has been
        if !self.input_ready && !self.resized {
            match self.poll.poll(&mut self.events, Some(timeout)) {
                Err(e) if e.kind() == ErrorKind::Interrupted => (),
                Err(e) => return Err(e),
                Ok(()) => {
                    for ev in self.events.iter() {
                        match ev.token() {
                            STDIN => self.input_ready = true,
                            WINCH => self.resized = true,
                            _ => (),
                        }
                    }
                }
            }
        }
        if self.resized {
            self.resized = false;
            self.drain_winch();
            return Ok(Wake::Resize);
        }
        if self.input_ready {
            return Ok(Wake::Input);
        }
        Ok(Wake::Timeout)
    }

    // Read all available stdin data into given Vec
    fn read(&mut self, inbuf: &mut Vec<u8>) -> Result<usize> {
        let mut buf = [0u8; 32];
        let start = inbuf.len();
        loop {
            let cnt = unsafe { libc::read(STDIN_FD, &mut buf[0] as *mut u8 as *mut _, buf.len()) };
            if cnt < 0 {
                #[allow(unreachable_patterns)]
                match errno::errno().0 {
                    libc::EINTR => continue,
                    libc::EWOULDBLOCK | libc::EAGAIN => {
                        self.input_ready = false;
                        break;
                    }
                    _ => return Err(Error::last_os_error()),
                }
            }
            if cnt == 0 {
                if inbuf.len() == start {
                    return Err(Error::new(ErrorKind::UnexpectedEof, "Terminal hung up"));
                }
                break;
            }
            inbuf.extend_from_slice(&buf[..cnt as usize]);
        }
        Ok(inbuf.len() - start)
    }
}

impl Drop for TtyReader {
    fn drop(&mut self) {
        unsafe { libc::fcntl(STDIN_FD, libc::F_SETFL, self.stdin_flags) };
        // This call cleans up the UnixStream write end
        signal_hook::unregister(self.sigid);
    }
}
