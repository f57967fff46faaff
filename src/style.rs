use bitflags::bitflags;

/// Terminal colour, as used for foreground and background
///
/// The named colours map onto the 16-colour ANSI palette through the
/// 256-colour escape (`38;5;N`), which keeps bright and dark variants
/// distinct on terminals that would otherwise render bold as bright.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Color {
    #[default]
    Reset,
    Black,
    DarkGrey,
    Red,
    DarkRed,
    Green,
    DarkGreen,
    Yellow,
    DarkYellow,
    Blue,
    DarkBlue,
    Magenta,
    DarkMagenta,
    Cyan,
    DarkCyan,
    White,
    Grey,
    Rgb { r: u8, g: u8, b: u8 },
    AnsiValue(u8),
}

impl Color {
    // Palette index for named colours
    pub(crate) fn palette(self) -> Option<u8> {
        Some(match self {
            Color::Black => 0,
            Color::DarkRed => 1,
            Color::DarkGreen => 2,
            Color::DarkYellow => 3,
            Color::DarkBlue => 4,
            Color::DarkMagenta => 5,
            Color::DarkCyan => 6,
            Color::Grey => 7,
            Color::DarkGrey => 8,
            Color::Red => 9,
            Color::Green => 10,
            Color::Yellow => 11,
            Color::Blue => 12,
            Color::Magenta => 13,
            Color::Cyan => 14,
            Color::White => 15,
            Color::AnsiValue(v) => v,
            Color::Reset | Color::Rgb { .. } => return None,
        })
    }
}

bitflags! {
    /// Text effects.  Each flag corresponds to one SGR parameter.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Effects: u16 {
        const RESET = 1 << 0;
        const BOLD = 1 << 1;
        const DIM = 1 << 2;
        const UNDERLINE = 1 << 4;
        const REVERSE = 1 << 7;
        const HIDE = 1 << 8;
    }
}

impl Effects {
    /// SGR parameters for the set flags, in ascending order
    pub(crate) fn sgr_codes(self) -> impl Iterator<Item = u16> {
        (0..9u16).filter(move |bit| self.bits() & (1 << bit) != 0)
    }
}

impl Default for Effects {
    fn default() -> Self {
        Effects::RESET
    }
}

/// Style applied to text written after it is set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Style {
    pub fg: Color,
    pub bg: Color,
    pub fx: Effects,
}
