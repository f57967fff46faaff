/// A 0-based terminal position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Coord {
    pub col: u16,
    pub row: u16,
}

impl Coord {
    pub const fn new(col: u16, row: u16) -> Self {
        Self { col, row }
    }
}

impl From<(u16, u16)> for Coord {
    fn from((col, row): (u16, u16)) -> Self {
        Self { col, row }
    }
}

/// Decoded keypress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Null,
    Backspace,
    Enter,
    Left,
    Right,
    Up,
    Down,
    Home,
    End,
    PageUp,
    PageDown,
    Tab,
    BackTab,
    Delete,
    Insert,
    /// Function key F1 to F12
    F(u8),
    /// Printable character
    Char(char),
    /// Alt (Meta) plus a character, sent as `Esc` then the character
    Alt(char),
    /// Ctrl plus a letter (`'a'..='z'`) or one of `'4'..='7'`
    Ctrl(char),
    Esc,
    CtrlLeft,
    CtrlRight,
    CtrlUp,
    CtrlDown,
    ShiftLeft,
    ShiftRight,
    ShiftUp,
    ShiftDown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    WheelUp,
    WheelDown,
}

/// Decoded mouse report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mouse {
    Press(MouseButton, Coord),
    Release(Coord),
    /// Motion with a button held (drag)
    Hold(Coord),
}

/// A decoded input event, as delivered to every listening handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    Key(Key),
    Mouse(Mouse),
}

/// The kind of an [`Event`] with its payload stripped away
///
/// [`Event`]: enum.Event.html
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Null,
    Backspace,
    Enter,
    Left,
    Right,
    Up,
    Down,
    Home,
    End,
    PageUp,
    PageDown,
    Tab,
    BackTab,
    Delete,
    Insert,
    Function(u8),
    Char,
    Alt,
    Ctrl,
    Esc,
    CtrlLeft,
    CtrlRight,
    CtrlUp,
    CtrlDown,
    ShiftLeft,
    ShiftRight,
    ShiftUp,
    ShiftDown,
    MousePress(MouseButton),
    MouseRelease,
    MouseHold,
}

/// Data carried by an [`Event`].  Which variant appears is fixed by
/// the event's kind: character keys carry a `Char`, mouse events
/// carry a `Coord`, everything else carries `None`.
///
/// [`Event`]: enum.Event.html
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Payload {
    None,
    Char(char),
    Coord(Coord),
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match *self {
            Event::Key(key) => match key {
                Key::Null => EventKind::Null,
                Key::Backspace => EventKind::Backspace,
                Key::Enter => EventKind::Enter,
                Key::Left => EventKind::Left,
                Key::Right => EventKind::Right,
                Key::Up => EventKind::Up,
                Key::Down => EventKind::Down,
                Key::Home => EventKind::Home,
                Key::End => EventKind::End,
                Key::PageUp => EventKind::PageUp,
                Key::PageDown => EventKind::PageDown,
                Key::Tab => EventKind::Tab,
                Key::BackTab => EventKind::BackTab,
                Key::Delete => EventKind::Delete,
                Key::Insert => EventKind::Insert,
                Key::F(n) => EventKind::Function(n),
                Key::Char(_) => EventKind::Char,
                Key::Alt(_) => EventKind::Alt,
                Key::Ctrl(_) => EventKind::Ctrl,
                Key::Esc => EventKind::Esc,
                Key::CtrlLeft => EventKind::CtrlLeft,
                Key::CtrlRight => EventKind::CtrlRight,
                Key::CtrlUp => EventKind::CtrlUp,
                Key::CtrlDown => EventKind::CtrlDown,
                Key::ShiftLeft => EventKind::ShiftLeft,
                Key::ShiftRight => EventKind::ShiftRight,
                Key::ShiftUp => EventKind::ShiftUp,
                Key::ShiftDown => EventKind::ShiftDown,
            },
            Event::Mouse(Mouse::Press(btn, _)) => EventKind::MousePress(btn),
            Event::Mouse(Mouse::Release(_)) => EventKind::MouseRelease,
            Event::Mouse(Mouse::Hold(_)) => EventKind::MouseHold,
        }
    }

    pub fn payload(&self) -> Payload {
        match *self {
            Event::Key(Key::Char(c)) | Event::Key(Key::Alt(c)) | Event::Key(Key::Ctrl(c)) => {
                Payload::Char(c)
            }
            Event::Key(_) => Payload::None,
            Event::Mouse(Mouse::Press(_, at))
            | Event::Mouse(Mouse::Release(at))
            | Event::Mouse(Mouse::Hold(at)) => Payload::Coord(at),
        }
    }
}

impl From<Key> for Event {
    fn from(key: Key) -> Self {
        Event::Key(key)
    }
}

impl From<Mouse> for Event {
    fn from(mouse: Mouse) -> Self {
        Event::Mouse(mouse)
    }
}
