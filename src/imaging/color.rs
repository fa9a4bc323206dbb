//! Background color normalization.
//!
//! Accepts `#rgb`, `rgb`, `#rrggbb` and `rrggbb` (any case). Shorthand is
//! expanded by doubling each nibble, so `#abc` and `aabbcc` are the same
//! color. Every other shape is rejected.

use std::fmt;

/// An opaque RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HexColor {
    rgb: [u8; 3],
}

impl HexColor {
    pub fn parse(input: &str) -> Option<Self> {
        let digits = input.trim();
        let digits = digits.strip_prefix('#').unwrap_or(digits);
        if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        let nibbles: Vec<u8> = digits
            .bytes()
            .map(|b| (b as char).to_digit(16).unwrap_or(0) as u8)
            .collect();
        let rgb = match nibbles.as_slice() {
            [r, g, b] => [r * 17, g * 17, b * 17],
            [r1, r2, g1, g2, b1, b2] => [r1 * 16 + r2, g1 * 16 + g2, b1 * 16 + b2],
            _ => return None,
        };
        Some(Self { rgb })
    }

    pub fn rgb(self) -> [u8; 3] {
        self.rgb
    }

    /// Six lowercase hex digits, no `#`.
    pub fn hex(self) -> String {
        let [r, g, b] = self.rgb;
        format!("{r:02x}{g:02x}{b:02x}")
    }
}

impl fmt::Display for HexColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.hex())
    }
}
