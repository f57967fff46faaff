use crate::style::{Color, Effects, Style};
use std::io::{Result, Write};

/// Region erased by [`Command::Clear`]
///
/// [`Command::Clear`]: enum.Command.html#variant.Clear
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Clear {
    /// The whole screen
    All,
    /// From the cursor to the end of the screen
    CursorDown,
    /// From the start of the screen to the cursor
    CursorUp,
    /// The whole of the cursor line
    CurrentLine,
    /// From the cursor to the end of the line
    UntilNewLine,
}

/// Drawing, cursor and style command accepted by the output buffer
///
/// Coordinates are 0-based, column first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Goto(u16, u16),
    Up(u16),
    Down(u16),
    Left(u16),
    Right(u16),
    Clear(Clear),
    /// Text to output as-is.  The content is not interpreted.
    Text(String),
    SetFg(Color),
    SetBg(Color),
    SetFx(Effects),
    SetStyles(Color, Color, Effects),
    ResetStyles,
    /// Ask the terminal window to resize to (width, height)
    Resize(u16, u16),
}

// Mode sequences used by the ANSI device
pub(crate) const ALT_SCREEN_ON: &[u8] = b"\x1B[?1049h";
pub(crate) const ALT_SCREEN_OFF: &[u8] = b"\x1B[?1049l";
pub(crate) const MOUSE_ON: &[u8] = b"\x1B[?1000h\x1B[?1002h\x1B[?1015h\x1B[?1006h";
pub(crate) const MOUSE_OFF: &[u8] = b"\x1B[?1006l\x1B[?1015l\x1B[?1002l\x1B[?1000l";
pub(crate) const CURSOR_SHOW: &[u8] = b"\x1B[?25h\x1B[?0c";
pub(crate) const CURSOR_HIDE: &[u8] = b"\x1B[?25l\x1B[?1c";
pub(crate) const CURSOR_REPORT: &[u8] = b"\x1B[6n";

/// Output buffer for the terminal
///
/// This just buffers byte data on the way to the terminal.  It allows
/// batching up a whole screen update into a single write, to try to
/// avoid tearing and to keep the output of concurrent handles from
/// interleaving.  It lives inside the dispatcher's session lock, and
/// is drained to the device on `flush`.
#[derive(Debug, Default)]
pub struct TermOut {
    buf: Vec<u8>,
}

impl TermOut {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encode a command onto the end of the buffer.  `style` is the
    /// style in force once the command has taken effect.  Effects can
    /// only be switched off all together, so `SetFx` and `SetStyles`
    /// go out as a reset followed by the whole of `style`.
    pub fn append(&mut self, cmd: &Command, style: &Style) {
        match cmd {
            Command::Goto(col, row) => self.to(*row, *col),
            Command::Up(n) => self.csi_n(*n, b'A'),
            Command::Down(n) => self.csi_n(*n, b'B'),
            Command::Right(n) => self.csi_n(*n, b'C'),
            Command::Left(n) => self.csi_n(*n, b'D'),
            Command::Clear(region) => {
                let seq: &[u8] = match region {
                    Clear::All => b"\x1B[2J",
                    Clear::CursorDown => b"\x1B[J",
                    Clear::CursorUp => b"\x1B[1J",
                    Clear::CurrentLine => b"\x1B[2K",
                    Clear::UntilNewLine => b"\x1B[K",
                };
                self.out(seq);
            }
            Command::Text(text) => self.out(text.as_bytes()),
            Command::SetFg(color) => self.colour(*color, 38),
            Command::SetBg(color) => self.colour(*color, 48),
            Command::SetFx(_) | Command::SetStyles(..) => self.style(style),
            Command::ResetStyles => self.attr_reset(),
            Command::Resize(w, h) => {
                self.out(b"\x1B[8;");
                self.out_num(*h);
                self.out1(b';');
                self.out_num(*w);
                self.out1(b't');
            }
        }
    }

    /// Data waiting to be written to the terminal
    pub fn data(&self) -> &[u8] {
        &self.buf[..]
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Take all the buffered data, leaving the buffer empty
    pub(crate) fn drain(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.buf)
    }

    /// Drop all buffered data without sending it
    pub fn discard(&mut self) {
        self.buf.clear();
    }

    /// Add a chunk of byte data to the output buffer.
    ///
    /// See also the `Write` implementation, which allows use of
    /// `write!` and `writeln!` to add data to the buffer.
    #[inline]
    pub fn out(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Add a single byte to the output buffer.
    pub fn out1(&mut self, v1: u8) {
        self.buf.push(v1);
    }

    /// Add a decimal number to the output buffer, as used in control
    /// sequences.
    pub fn out_num(&mut self, v: u16) {
        let mut digits = [0u8; 5];
        let mut i = digits.len();
        let mut v = v;
        loop {
            i -= 1;
            digits[i] = (v % 10) as u8 + b'0';
            v /= 10;
            if v == 0 {
                break;
            }
        }
        self.out(&digits[i..]);
    }

    /// Add ANSI sequence to move cursor to the given coordinates.
    /// Note that coordinates are row-first, with (0,0) as top-left.
    pub fn to(&mut self, y: u16, x: u16) {
        self.out(b"\x1B[");
        self.out_num(y.saturating_add(1));
        self.out1(b';');
        self.out_num(x.saturating_add(1));
        self.out1(b'H');
    }

    /// Add ANSI sequence to reset attributes to the default
    pub fn attr_reset(&mut self) {
        self.out(b"\x1B[0m");
    }

    // Relative cursor motion.  A count of zero would be taken as one
    // by the terminal, so nothing is output.
    fn csi_n(&mut self, n: u16, fin: u8) {
        if n != 0 {
            self.out(b"\x1B[");
            self.out_num(n);
            self.out1(fin);
        }
    }

    fn colour(&mut self, color: Color, base: u16) {
        self.out(b"\x1B[");
        match color {
            Color::Reset => self.out_num(base + 1),
            Color::Rgb { r, g, b } => {
                self.out_num(base);
                for v in [2, r.into(), g.into(), b.into()] {
                    self.out1(b';');
                    self.out_num(v);
                }
            }
            _ => {
                self.out_num(base);
                self.out(b";5;");
                self.out_num(color.palette().map_or(0, u16::from));
            }
        }
        self.out1(b'm');
    }

    // Reset, then set up the whole style from scratch
    fn style(&mut self, style: &Style) {
        self.attr_reset();
        if style.fg != Color::Reset {
            self.colour(style.fg, 38);
        }
        if style.bg != Color::Reset {
            self.colour(style.bg, 48);
        }
        self.effects(style.fx.difference(Effects::RESET));
    }

    fn effects(&mut self, fx: Effects) {
        for code in fx.sgr_codes() {
            self.out(b"\x1B[");
            self.out_num(code);
            self.out1(b'm');
        }
    }
}

impl Write for TermOut {
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    /// Logically we consider the final destination of the Write trait
    /// to be the buffer.  So this `flush` call does nothing.  In
    /// general we'll want to gather all the updates into one big
    /// flush to avoid tearing on the terminal.
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}
