use serde::{Deserialize, Serialize};
use std::fmt;

/// An RGBA color, the script engine's native color representation.
///
/// The script-facing text form is `rgb(r,g,b)` when fully opaque and
/// `rgba(r,g,b,a)` otherwise; both re-parse through the builtin functions
/// of the same names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn is_opaque(&self) -> bool {
        self.a == 255
    }

    /// Parse a `#rrggbb` or `#rrggbbaa` hex form.
    pub fn from_hex(s: &str) -> Option<Self> {
        let hex = s.strip_prefix('#')?;
        let byte = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
        match hex.len() {
            6 => Some(Self::rgb(byte(0)?, byte(2)?, byte(4)?)),
            8 => Some(Self::rgba(byte(0)?, byte(2)?, byte(4)?, byte(6)?)),
            _ => None,
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_opaque() {
            write!(f, "rgb({},{},{})", self.r, self.g, self.b)
        } else {
            write!(f, "rgba({},{},{},{})", self.r, self.g, self.b, self.a)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_forms() {
        assert_eq!(Color::rgb(255, 0, 16).to_string(), "rgb(255,0,16)");
        assert_eq!(Color::rgba(1, 2, 3, 128).to_string(), "rgba(1,2,3,128)");
    }

    #[test]
    fn hex_parsing() {
        assert_eq!(Color::from_hex("#ff0010"), Some(Color::rgb(255, 0, 16)));
        assert_eq!(Color::from_hex("#01020380"), Some(Color::rgba(1, 2, 3, 128)));
        assert_eq!(Color::from_hex("ff0010"), None);
        assert_eq!(Color::from_hex("#ff001"), None);
    }
}
