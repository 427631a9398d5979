//! Catppuccin-inspired palette for terminal output, mapped onto the
//! standard ANSI colors so it renders on any terminal.

use colored::{ColoredString, Colorize};

use crate::status::Status;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Palette {
    Red,
    Maroon,
    Peach,
    Yellow,
    Green,
    Sky,
    Lavender,
    Text,
    Subtext0,
    Overlay1,
}

impl Palette {
    pub fn paint(self, text: &str) -> ColoredString {
        match self {
            Palette::Red => text.bright_red(),
            Palette::Maroon => text.red(),
            Palette::Peach => text.yellow(),
            Palette::Yellow => text.bright_yellow(),
            Palette::Green => text.bright_green(),
            Palette::Sky => text.bright_cyan(),
            Palette::Lavender => text.bright_purple(),
            Palette::Text => text.bright_white(),
            Palette::Subtext0 => text.white(),
            Palette::Overlay1 => text.bright_black(),
        }
    }
}

impl From<Status> for Palette {
    fn from(status: Status) -> Self {
        match status {
            Status::Expired => Palette::Maroon,
            Status::Critical | Status::Error => Palette::Red,
            Status::Warning => Palette::Peach,
            Status::Good => Palette::Green,
            Status::Timeout => Palette::Yellow,
            Status::Unknown => Palette::Overlay1,
        }
    }
}

/// Shorthands for the palette roles used by the formatters and the CLI.
pub trait CatppuccinExt {
    fn ctp(&self, color: Palette) -> ColoredString;

    fn ctp_red(&self) -> ColoredString {
        self.ctp(Palette::Red)
    }

    fn sky(&self) -> ColoredString {
        self.ctp(Palette::Sky)
    }

    fn lavender(&self) -> ColoredString {
        self.ctp(Palette::Lavender)
    }

    fn ctp_white(&self) -> ColoredString {
        self.ctp(Palette::Text)
    }

    fn subtext0(&self) -> ColoredString {
        self.ctp(Palette::Subtext0)
    }

    fn overlay1(&self) -> ColoredString {
        self.ctp(Palette::Overlay1)
    }

    fn status_color(&self, status: Status) -> ColoredString {
        self.ctp(status.into())
    }
}

impl<S: AsRef<str>> CatppuccinExt for S {
    fn ctp(&self, color: Palette) -> ColoredString {
        color.paint(self.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_tiers_share_red() {
        assert_eq!(Palette::from(Status::Critical), Palette::Red);
        assert_eq!(Palette::from(Status::Error), Palette::Red);
        assert_ne!(Palette::from(Status::Expired), Palette::from(Status::Good));
    }
}
