//! ARGB colors as stored in settings
//!
//! Stored colors are either integers (ARGB, possibly negative when written by a
//! signed 32-bit producer) or hex strings (`RRGGBB`, `AARRGGBB`, optional `#`).

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Color(u32);

impl Color {
    pub const BLACK: Color = Color(0xFF00_0000);
    pub const WHITE: Color = Color(0xFFFF_FFFF);
    pub const RED: Color = Color(0xFFFF_0000);
    pub const GREEN: Color = Color(0xFF00_FF00);
    pub const YELLOW: Color = Color(0xFFFF_FF00);

    pub const fn from_argb32(argb: u32) -> Self {
        Self(argb)
    }

    pub const fn argb32(self) -> u32 {
        self.0
    }

    /// Interpret a stored integer, keeping only the low 32 bits
    pub fn from_stored(value: i64) -> Self {
        Self(value as u32)
    }

    /// Parse `RRGGBB` or `AARRGGBB` with an optional `#` prefix.
    /// Six-digit colors are fully opaque.
    pub fn parse(hex: &str) -> Option<Self> {
        let digits = hex.trim().trim_start_matches('#');
        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        match digits.len() {
            6 => u32::from_str_radix(digits, 16).ok().map(|rgb| Self(0xFF00_0000 | rgb)),
            8 => u32::from_str_radix(digits, 16).ok().map(Self),
            _ => None,
        }
    }

    pub fn alpha(self) -> u8 {
        (self.0 >> 24) as u8
    }

    pub fn red(self) -> u8 {
        (self.0 >> 16) as u8
    }

    pub fn green(self) -> u8 {
        (self.0 >> 8) as u8
    }

    pub fn blue(self) -> u8 {
        self.0 as u8
    }

    /// 24-bit pixel value (alpha dropped) for TrueColor visuals
    pub fn rgb24(self) -> u32 {
        self.0 & 0x00FF_FFFF
    }

    pub fn to_hex_string(self) -> String {
        format!("#{:08X}", self.0)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex_string())
    }
}
