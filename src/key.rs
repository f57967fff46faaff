//! Decoding of raw terminal input bytes
//!
//! Covers the common xterm/rxvt/linux-console keypress sequences and
//! the X10, SGR (1006) and rxvt (1015) mouse encodings.  Anything that
//! isn't recognised is skipped, because terminals routinely emit
//! vendor-specific sequences and these must never break the session.

use crate::event::{Coord, Event, Key, Mouse, MouseButton};

/// Longest CSI sequence accepted before the bytes are discarded
const MAX_CSI_LEN: usize = 32;

/// Item produced by the decoder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    /// Input event to broadcast to listeners
    Event(Event),
    /// Answer to a cursor position request (`Esc [ 6 n`)
    CursorReport(Coord),
}

/// Result of decoding from the start of a byte slice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Need more bytes to decide
    Incomplete,
    /// Discard this many bytes, they don't decode to anything useful
    Skip(usize),
    /// Token decoded from this many bytes
    Token(usize, Token),
}

/// Decode a single token from the start of `buf`.  If `force` is set
/// then a partial sequence is not left waiting for more data: a
/// dangling `Esc` prefix is reported as an `Esc` keypress.  This is
/// used once the escape timeout expires without more input arriving.
pub fn decode(buf: &[u8], force: bool) -> Step {
    let first = match buf.first() {
        Some(&b) => b,
        None => return Step::Incomplete,
    };
    match first {
        0x1B => decode_esc(buf, force),
        b'\r' | b'\n' => key(1, Key::Enter),
        b'\t' => key(1, Key::Tab),
        0x7F => key(1, Key::Backspace),
        c @ 0x01..=0x1A => key(1, Key::Ctrl((c - 0x01 + b'a') as char)),
        c @ 0x1C..=0x1F => key(1, Key::Ctrl((c - 0x1C + b'4') as char)),
        0 => key(1, Key::Null),
        _ => match utf8_char(buf) {
            Utf8::Char(len, ch) => key(len, Key::Char(ch)),
            Utf8::Incomplete if !force => Step::Incomplete,
            _ => Step::Skip(1),
        },
    }
}

fn key(len: usize, key: Key) -> Step {
    Step::Token(len, Token::Event(Event::Key(key)))
}

fn decode_esc(buf: &[u8], force: bool) -> Step {
    // Forced partial sequences: `Esc` plus one byte that would have
    // started a sequence is taken as Alt plus that byte
    let partial = |alt: char| {
        if !force {
            Step::Incomplete
        } else if buf.len() == 2 {
            key(2, Key::Alt(alt))
        } else {
            key(1, Key::Esc)
        }
    };
    match buf.get(1) {
        None if force => key(1, Key::Esc),
        None => Step::Incomplete,
        Some(b'O') => match buf.get(2) {
            None => partial('O'),
            Some(&c @ b'P'..=b'S') => key(3, Key::F(1 + c - b'P')),
            Some(b'A') => key(3, Key::Up),
            Some(b'B') => key(3, Key::Down),
            Some(b'C') => key(3, Key::Right),
            Some(b'D') => key(3, Key::Left),
            Some(b'H') => key(3, Key::Home),
            Some(b'F') => key(3, Key::End),
            Some(_) => Step::Skip(3),
        },
        Some(b'[') => decode_csi(buf, partial('[')),
        Some(0x1B) => key(2, Key::Esc),
        Some(_) => match utf8_char(&buf[1..]) {
            Utf8::Char(len, ch) => key(1 + len, Key::Alt(ch)),
            Utf8::Incomplete if !force => Step::Incomplete,
            Utf8::Incomplete => key(1, Key::Esc),
            Utf8::Invalid => Step::Skip(2),
        },
    }
}

// `buf` starts with `Esc [`.  `incomplete` is what to return if the
// sequence is cut short.
fn decode_csi(buf: &[u8], incomplete: Step) -> Step {
    match buf.get(2) {
        None => return incomplete,
        // Linux console F1-F5
        Some(b'[') => {
            return match buf.get(3) {
                None => incomplete,
                Some(&v @ b'A'..=b'E') => key(4, Key::F(1 + v - b'A')),
                Some(_) => Step::Skip(4),
            }
        }
        Some(b'M') => return x10_mouse(buf).unwrap_or(incomplete),
        _ => (),
    }

    let mut end = 2;
    loop {
        match buf.get(end) {
            None if end >= MAX_CSI_LEN => return Step::Skip(end),
            None => return incomplete,
            Some(&b) if (0x40..=0x7E).contains(&b) => break,
            Some(&b) if b < 0x20 => return Step::Skip(end),
            Some(_) => end += 1,
        }
    }
    let params = &buf[2..end];
    let len = end + 1;
    let token = match (params.first(), buf[end]) {
        (None, fin) => plain_csi(fin).map(|k| Token::Event(Event::Key(k))),
        (Some(b'<'), fin @ (b'M' | b'm')) => sgr_mouse(&params[1..], fin),
        (Some(b'0'..=b'9'), b'M') => rxvt_mouse(params),
        (Some(b'0'..=b'9'), b'~') => special_key(params),
        (Some(b'0'..=b'9'), b'R') => cursor_report(params),
        (Some(b'0'..=b'9'), fin) => modified_key(params, fin),
        _ => None,
    };
    match token {
        Some(token) => Step::Token(len, token),
        None => Step::Skip(len),
    }
}

fn plain_csi(fin: u8) -> Option<Key> {
    Some(match fin {
        b'A' => Key::Up,
        b'B' => Key::Down,
        b'C' => Key::Right,
        b'D' => Key::Left,
        b'H' => Key::Home,
        b'F' => Key::End,
        b'Z' => Key::BackTab,
        _ => return None,
    })
}

// Semicolon-separated decimal parameters.  Empty parameters count as
// zero.
fn params(buf: &[u8]) -> Option<Vec<u16>> {
    std::str::from_utf8(buf)
        .ok()?
        .split(';')
        .map(|n| if n.is_empty() { Some(0) } else { n.parse().ok() })
        .collect()
}

// Convert 1-based terminal coordinates to 0-based
fn coord(col: u16, row: u16) -> Coord {
    Coord::new(col.saturating_sub(1), row.saturating_sub(1))
}

fn mouse(m: Mouse) -> Option<Token> {
    Some(Token::Event(Event::Mouse(m)))
}

// X10 encoding: `Esc [ M Cb Cx Cy` with each value offset by 32
fn x10_mouse(buf: &[u8]) -> Option<Step> {
    if buf.len() < 6 {
        return None;
    }
    let cb = buf[3].wrapping_sub(32);
    let at = coord(
        u16::from(buf[4].saturating_sub(32)),
        u16::from(buf[5].saturating_sub(32)),
    );
    let wheel = cb & 0x40 != 0;
    let m = match cb & 0b11 {
        0 if wheel => Mouse::Press(MouseButton::WheelUp, at),
        0 => Mouse::Press(MouseButton::Left, at),
        1 if wheel => Mouse::Press(MouseButton::WheelDown, at),
        1 => Mouse::Press(MouseButton::Middle, at),
        2 => Mouse::Press(MouseButton::Right, at),
        _ => Mouse::Release(at),
    };
    Some(Step::Token(6, Token::Event(Event::Mouse(m))))
}

// SGR encoding: `Esc [ < Cb ; Cx ; Cy M` (press) or `... m` (release)
fn sgr_mouse(buf: &[u8], fin: u8) -> Option<Token> {
    let nums = params(buf)?;
    if nums.len() < 3 {
        return None;
    }
    let at = coord(nums[1], nums[2]);
    // Strip the shift/meta/ctrl modifier bits
    let button = match nums[0] & !0b1_1100 {
        0 => MouseButton::Left,
        1 => MouseButton::Middle,
        2 => MouseButton::Right,
        64 => MouseButton::WheelUp,
        65 => MouseButton::WheelDown,
        32..=34 => return mouse(Mouse::Hold(at)),
        3 => return mouse(Mouse::Release(at)),
        _ => return None,
    };
    match fin {
        b'M' => mouse(Mouse::Press(button, at)),
        _ => mouse(Mouse::Release(at)),
    }
}

// rxvt encoding: `Esc [ Cb ; Cx ; Cy M`
fn rxvt_mouse(buf: &[u8]) -> Option<Token> {
    let nums = params(buf)?;
    if nums.len() < 3 {
        return None;
    }
    let at = coord(nums[1], nums[2]);
    match nums[0] {
        32 => mouse(Mouse::Press(MouseButton::Left, at)),
        33 => mouse(Mouse::Press(MouseButton::Middle, at)),
        34 => mouse(Mouse::Press(MouseButton::Right, at)),
        35 => mouse(Mouse::Release(at)),
        64 => mouse(Mouse::Hold(at)),
        96 => mouse(Mouse::Press(MouseButton::WheelUp, at)),
        97 => mouse(Mouse::Press(MouseButton::WheelDown, at)),
        _ => None,
    }
}

// `Esc [ N ~`.  Modified forms (e.g. `Esc [ 3 ; 2 ~`) are dropped.
fn special_key(buf: &[u8]) -> Option<Token> {
    let nums = params(buf)?;
    if nums.len() != 1 {
        return None;
    }
    let key = match nums[0] {
        1 | 7 => Key::Home,
        2 => Key::Insert,
        3 => Key::Delete,
        4 | 8 => Key::End,
        5 => Key::PageUp,
        6 => Key::PageDown,
        v @ 11..=15 => Key::F((v - 10) as u8),
        v @ 17..=21 => Key::F((v - 11) as u8),
        v @ 23..=24 => Key::F((v - 12) as u8),
        _ => return None,
    };
    Some(Token::Event(Event::Key(key)))
}

// `Esc [ row ; col R`
fn cursor_report(buf: &[u8]) -> Option<Token> {
    match params(buf)?[..] {
        [row, col] => Some(Token::CursorReport(coord(col, row))),
        _ => None,
    }
}

// `Esc [ 1 ; mod X` with mod 5 = Ctrl, 2 = Shift
fn modified_key(buf: &[u8], fin: u8) -> Option<Token> {
    let nums = params(buf)?;
    let key = match (nums.get(1).copied()?, fin) {
        (5, b'A') => Key::CtrlUp,
        (5, b'B') => Key::CtrlDown,
        (5, b'C') => Key::CtrlRight,
        (5, b'D') => Key::CtrlLeft,
        (2, b'A') => Key::ShiftUp,
        (2, b'B') => Key::ShiftDown,
        (2, b'C') => Key::ShiftRight,
        (2, b'D') => Key::ShiftLeft,
        _ => return None,
    };
    Some(Token::Event(Event::Key(key)))
}

enum Utf8 {
    Char(usize, char),
    Incomplete,
    Invalid,
}

fn utf8_char(buf: &[u8]) -> Utf8 {
    let len = match buf[0] {
        0x00..=0x7F => 1,
        0xC2..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF4 => 4,
        _ => return Utf8::Invalid,
    };
    if buf.len() < len {
        return if buf[1..].iter().all(|b| b & 0xC0 == 0x80) {
            Utf8::Incomplete
        } else {
            Utf8::Invalid
        };
    }
    match std::str::from_utf8(&buf[..len]) {
        Ok(s) => match s.chars().next() {
            Some(ch) => Utf8::Char(len, ch),
            None => Utf8::Invalid,
        },
        Err(_) => Utf8::Invalid,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ev(len: usize, ev: impl Into<Event>) -> Step {
        Step::Token(len, Token::Event(ev.into()))
    }

    #[test]
    fn control_bytes() {
        assert_eq!(decode(b"\r", false), ev(1, Key::Enter));
        assert_eq!(decode(b"\n", false), ev(1, Key::Enter));
        assert_eq!(decode(b"\t", false), ev(1, Key::Tab));
        assert_eq!(decode(b"\x7F", false), ev(1, Key::Backspace));
        assert_eq!(decode(b"\x01", false), ev(1, Key::Ctrl('a')));
        assert_eq!(decode(b"\x1A", false), ev(1, Key::Ctrl('z')));
        assert_eq!(decode(b"\x1C", false), ev(1, Key::Ctrl('4')));
        assert_eq!(decode(b"\0", false), ev(1, Key::Null));
    }

    #[test]
    fn characters() {
        assert_eq!(decode(b"ab", false), ev(1, Key::Char('a')));
        assert_eq!(decode("é".as_bytes(), false), ev(2, Key::Char('é')));
        assert_eq!(decode("賀x".as_bytes(), false), ev(3, Key::Char('賀')));
        // Partial multi-byte character waits for the rest
        assert_eq!(decode(&"賀".as_bytes()[..2], false), Step::Incomplete);
        assert_eq!(decode(&"賀".as_bytes()[..2], true), Step::Skip(1));
        assert_eq!(decode(b"\xFF", false), Step::Skip(1));
    }

    #[test]
    fn navigation_and_function_keys() {
        assert_eq!(decode(b"\x1B[A", false), ev(3, Key::Up));
        assert_eq!(decode(b"\x1B[D", false), ev(3, Key::Left));
        assert_eq!(decode(b"\x1B[Z", false), ev(3, Key::BackTab));
        assert_eq!(decode(b"\x1BOQ", false), ev(3, Key::F(2)));
        assert_eq!(decode(b"\x1BOH", false), ev(3, Key::Home));
        assert_eq!(decode(b"\x1B[[C", false), ev(4, Key::F(3)));
        assert_eq!(decode(b"\x1B[3~", false), ev(4, Key::Delete));
        assert_eq!(decode(b"\x1B[6~", false), ev(4, Key::PageDown));
        assert_eq!(decode(b"\x1B[15~", false), ev(5, Key::F(5)));
        assert_eq!(decode(b"\x1B[17~", false), ev(5, Key::F(6)));
        assert_eq!(decode(b"\x1B[24~", false), ev(5, Key::F(12)));
    }

    #[test]
    fn modified_arrows() {
        assert_eq!(decode(b"\x1B[1;5A", false), ev(6, Key::CtrlUp));
        assert_eq!(decode(b"\x1B[1;5D", false), ev(6, Key::CtrlLeft));
        assert_eq!(decode(b"\x1B[1;2C", false), ev(6, Key::ShiftRight));
        assert_eq!(decode(b"\x1B[1;3C", false), Step::Skip(6));
    }

    #[test]
    fn alt_and_escape() {
        assert_eq!(decode(b"\x1Bx", false), ev(2, Key::Alt('x')));
        assert_eq!(decode(b"\x1B\x1B", false), ev(2, Key::Esc));
        assert_eq!(decode(b"\x1B", false), Step::Incomplete);
        assert_eq!(decode(b"\x1B", true), ev(1, Key::Esc));
        assert_eq!(decode(b"\x1B[", false), Step::Incomplete);
        assert_eq!(decode(b"\x1B[", true), ev(2, Key::Alt('[')));
        assert_eq!(decode(b"\x1B[1;", false), Step::Incomplete);
        assert_eq!(decode(b"\x1B[1;", true), ev(1, Key::Esc));
    }

    #[test]
    fn mouse_encodings() {
        let at = Coord::new(9, 4);
        assert_eq!(
            decode(b"\x1B[<0;10;5M", false),
            ev(10, Mouse::Press(MouseButton::Left, at))
        );
        assert_eq!(decode(b"\x1B[<0;10;5m", false), ev(10, Mouse::Release(at)));
        assert_eq!(decode(b"\x1B[<32;10;5M", false), ev(11, Mouse::Hold(at)));
        assert_eq!(
            decode(b"\x1B[<65;10;5M", false),
            ev(11, Mouse::Press(MouseButton::WheelDown, at))
        );
        assert_eq!(
            decode(b"\x1B[34;10;5M", false),
            ev(10, Mouse::Press(MouseButton::Right, at))
        );
        assert_eq!(
            decode(&[0x1B, b'[', b'M', 32, 32 + 10, 32 + 5], false),
            ev(6, Mouse::Press(MouseButton::Left, at))
        );
        assert_eq!(decode(&[0x1B, b'[', b'M', 32], false), Step::Incomplete);
    }

    #[test]
    fn cursor_report() {
        assert_eq!(
            decode(b"\x1B[5;10R", false),
            Step::Token(7, Token::CursorReport(Coord::new(9, 4)))
        );
    }

    #[test]
    fn unknown_sequences_are_skipped() {
        assert_eq!(decode(b"\x1B[?1;2cX", false), Step::Skip(7));
        assert_eq!(decode(b"\x1B[99~", false), Step::Skip(5));
        assert_eq!(decode(b"\x1BOx", false), Step::Skip(3));
        assert_eq!(decode(b"\x1B[1\r", false), Step::Skip(3));
    }
}
