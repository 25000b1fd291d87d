//! Color definitions for console output.

use colored::{ColoredString, Colorize};

/// RGB color applied with the colored crate's truecolor method.
#[derive(Clone, Copy, Debug)]
pub struct ThemeColor(pub u8, pub u8, pub u8);

impl ThemeColor {
    pub fn rgb(&self) -> (u8, u8, u8) {
        (self.0, self.1, self.2)
    }

    pub fn paint(&self, s: &str) -> ColoredString {
        let (r, g, b) = self.rgb();
        s.truecolor(r, g, b)
    }
}

// Color constants for consistent theming
pub mod theme {
    use super::ThemeColor;

    pub const GREEN: ThemeColor = ThemeColor(142, 192, 124);
    pub const RED: ThemeColor = ThemeColor(204, 36, 29);
    pub const GOLD: ThemeColor = ThemeColor(215, 153, 33);
    pub const YELLOW: ThemeColor = ThemeColor(250, 189, 47);
    pub const BLUE: ThemeColor = ThemeColor(131, 165, 152);
    pub const CYAN: ThemeColor = ThemeColor(86, 182, 194);
}
