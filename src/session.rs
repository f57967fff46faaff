use crate::error::{Error, Result};
use crate::event::Coord;
use crate::style::Style;
use crate::termout::Command;

/// Terminal input mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Line-buffered with echo, as the shell leaves it
    Cooked,
    /// Keystrokes delivered immediately and unprocessed
    Raw,
}

/// Settings remembered for each screen.  Switching back to a screen
/// restores these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenMeta {
    pub mode: Mode,
    pub mouse_enabled: bool,
    pub cursor_visible: bool,
    /// Saved cursor position
    pub mark: Coord,
}

/// Session state: the record of what mode the terminal is in
///
/// Screen 0 is the main screen; every other screen is a logical
/// screen drawn on the terminal's alternate buffer.  The mode flags
/// reported here are those of the current screen, and they always
/// match what has been applied to the device.
///
/// The dispatcher owns the only live copy.  `Dispatcher::snapshot`
/// hands out clones taken under the session lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    screens: Vec<ScreenMeta>,
    screen: usize,
    style: Style,
    cursor: Coord,
    size: (u16, u16),
}

impl Session {
    pub(crate) fn new(size: (u16, u16)) -> Self {
        Self {
            screens: vec![ScreenMeta {
                mode: Mode::Cooked,
                mouse_enabled: false,
                cursor_visible: true,
                mark: Coord::default(),
            }],
            screen: 0,
            style: Style::default(),
            cursor: Coord::default(),
            size,
        }
    }

    /// Index of the current screen, 0 being the main screen
    pub fn screen(&self) -> usize {
        self.screen
    }

    /// Metadata of all screens created so far, indexed by screen id
    pub fn screens(&self) -> &[ScreenMeta] {
        &self.screens[..]
    }

    pub fn mode(&self) -> Mode {
        self.current().mode
    }

    pub fn mouse_enabled(&self) -> bool {
        self.current().mouse_enabled
    }

    pub fn cursor_visible(&self) -> bool {
        self.current().cursor_visible
    }

    /// Style applied to text written from now on
    pub fn style(&self) -> Style {
        self.style
    }

    /// Last known cursor position.  This follows all cursor motion
    /// commands, including those still waiting in the output buffer.
    /// Text is taken to advance the column by one cell per character,
    /// stopping at the right edge.  Control characters and wide
    /// characters in the text are not accounted for.
    pub fn cursor(&self) -> Coord {
        self.cursor
    }

    /// Terminal size: (width, height)
    pub fn size(&self) -> (u16, u16) {
        self.size
    }

    /// Saved cursor position of the given screen
    pub fn mark(&self, screen: usize) -> Option<Coord> {
        self.screens.get(screen).map(|meta| meta.mark)
    }

    pub(crate) fn current(&self) -> &ScreenMeta {
        &self.screens[self.screen]
    }

    pub(crate) fn current_mut(&mut self) -> &mut ScreenMeta {
        &mut self.screens[self.screen]
    }

    pub(crate) fn meta(&self, screen: usize) -> Result<&ScreenMeta> {
        self.screens.get(screen).ok_or(Error::UnknownScreen(screen))
    }

    /// Reject a coordinate outside the current size
    pub(crate) fn check(&self, at: Coord) -> Result<()> {
        let (width, height) = self.size;
        if at.col < width && at.row < height {
            Ok(())
        } else {
            Err(Error::InvalidCoordinate {
                col: at.col,
                row: at.row,
                width,
                height,
            })
        }
    }

    /// Update the state to reflect a command about to be appended to
    /// the output buffer.  On error nothing is changed.
    pub(crate) fn apply(&mut self, cmd: &Command) -> Result<()> {
        let (width, height) = self.size;
        let max_col = width.saturating_sub(1);
        let max_row = height.saturating_sub(1);
        match cmd {
            Command::Goto(col, row) => {
                let at = Coord::new(*col, *row);
                self.check(at)?;
                self.cursor = at;
            }
            Command::Up(n) => self.cursor.row = self.cursor.row.saturating_sub(*n),
            Command::Down(n) => self.cursor.row = self.cursor.row.saturating_add(*n).min(max_row),
            Command::Left(n) => self.cursor.col = self.cursor.col.saturating_sub(*n),
            Command::Right(n) => self.cursor.col = self.cursor.col.saturating_add(*n).min(max_col),
            Command::SetFg(color) => self.style.fg = *color,
            Command::SetBg(color) => self.style.bg = *color,
            Command::SetFx(fx) => self.style.fx = *fx,
            Command::SetStyles(fg, bg, fx) => {
                self.style = Style {
                    fg: *fg,
                    bg: *bg,
                    fx: *fx,
                }
            }
            Command::ResetStyles => self.style = Style::default(),
            Command::Text(text) => {
                let len = u16::try_from(text.chars().count()).unwrap_or(u16::MAX);
                self.cursor.col = self.cursor.col.saturating_add(len).min(max_col);
            }
            Command::Clear(_) | Command::Resize(..) => (),
        }
        Ok(())
    }

    /// Save the cursor as the current screen's mark
    pub(crate) fn save_mark(&mut self) {
        let cursor = self.cursor;
        self.current_mut().mark = cursor;
    }

    /// Add a screen, cooked with the mouse off and its mark at the
    /// origin.  Cursor visibility carries over.  Returns the new
    /// screen id.
    pub(crate) fn push_screen(&mut self) -> usize {
        let meta = ScreenMeta {
            mode: Mode::Cooked,
            mouse_enabled: false,
            mark: Coord::default(),
            ..*self.current()
        };
        self.screens.push(meta);
        self.screens.len() - 1
    }

    pub(crate) fn set_screen(&mut self, screen: usize) {
        self.screen = screen;
    }

    pub(crate) fn set_cursor(&mut self, at: Coord) {
        self.cursor = at;
    }

    pub(crate) fn set_size(&mut self, size: (u16, u16)) {
        self.size = size;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::{Color, Effects};

    #[test]
    fn goto_outside_size_is_rejected() {
        let mut s = Session::new((80, 24));
        s.apply(&Command::Goto(5, 5)).unwrap();
        match s.apply(&Command::Goto(10, 24)) {
            Err(Error::InvalidCoordinate {
                col: 10,
                row: 24,
                width: 80,
                height: 24,
            }) => (),
            other => panic!("unexpected {:?}", other),
        }
        assert!(s.apply(&Command::Goto(80, 0)).is_err());
        assert_eq!(s.cursor(), Coord::new(5, 5));
        s.apply(&Command::Goto(79, 23)).unwrap();
        assert_eq!(s.cursor(), Coord::new(79, 23));
    }

    #[test]
    fn relative_moves_stop_at_edges() {
        let mut s = Session::new((10, 5));
        s.apply(&Command::Goto(2, 2)).unwrap();
        s.apply(&Command::Up(10)).unwrap();
        assert_eq!(s.cursor(), Coord::new(2, 0));
        s.apply(&Command::Down(3)).unwrap();
        assert_eq!(s.cursor(), Coord::new(2, 3));
        s.apply(&Command::Down(3)).unwrap();
        assert_eq!(s.cursor(), Coord::new(2, 4));
        s.apply(&Command::Right(100)).unwrap();
        assert_eq!(s.cursor(), Coord::new(9, 4));
        s.apply(&Command::Left(4)).unwrap();
        assert_eq!(s.cursor(), Coord::new(5, 4));
    }

    #[test]
    fn style_is_tracked_until_reset() {
        let mut s = Session::new((80, 24));
        s.apply(&Command::SetFg(Color::Green)).unwrap();
        s.apply(&Command::SetBg(Color::Rgb { r: 1, g: 2, b: 3 })).unwrap();
        s.apply(&Command::SetFx(Effects::UNDERLINE)).unwrap();
        s.apply(&Command::SetFx(Effects::BOLD | Effects::DIM)).unwrap();
        s.apply(&Command::Text("abc".into())).unwrap();
        assert_eq!(
            s.style(),
            Style {
                fg: Color::Green,
                bg: Color::Rgb { r: 1, g: 2, b: 3 },
                fx: Effects::BOLD | Effects::DIM,
            }
        );
        s.apply(&Command::ResetStyles).unwrap();
        assert_eq!(s.style(), Style::default());
    }

    #[test]
    fn text_advances_column_to_right_edge() {
        let mut s = Session::new((10, 5));
        s.apply(&Command::Goto(2, 1)).unwrap();
        s.apply(&Command::Text("héllo".into())).unwrap();
        assert_eq!(s.cursor(), Coord::new(7, 1));
        s.apply(&Command::Text("world".into())).unwrap();
        assert_eq!(s.cursor(), Coord::new(9, 1));
        s.apply(&Command::Text(String::new())).unwrap();
        assert_eq!(s.cursor(), Coord::new(9, 1));
    }

    #[test]
    fn new_screen_starts_cooked_without_mouse() {
        let mut s = Session::new((80, 24));
        s.current_mut().mode = Mode::Raw;
        s.current_mut().mouse_enabled = true;
        s.current_mut().cursor_visible = false;
        s.apply(&Command::Goto(3, 4)).unwrap();
        s.save_mark();
        let id = s.push_screen();
        assert_eq!(id, 1);
        let meta = s.meta(1).unwrap();
        assert_eq!(meta.mode, Mode::Cooked);
        assert!(!meta.mouse_enabled);
        assert!(!meta.cursor_visible);
        assert_eq!(s.meta(0).unwrap().mode, Mode::Raw);
        assert_eq!(meta.mark, Coord::new(0, 0));
        assert_eq!(s.mark(0), Some(Coord::new(3, 4)));
        assert!(matches!(s.meta(2), Err(Error::UnknownScreen(2))));
    }
}
