use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{ChromaError, Result};

/// 8-bit colour in RGB channel order, the same order frames store pixels in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Color = Color::new(0, 0, 0);
    pub const WHITE: Color = Color::new(255, 255, 255);
    pub const RED: Color = Color::new(255, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub const fn channels(self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }

    /// Decodes `#RRGGBB` (leading `#` optional, case-insensitive).
    pub fn from_hex(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        let digits = trimmed.strip_prefix('#').unwrap_or(trimmed);
        if digits.len() != 6 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ChromaError::Configuration(format!(
                "expected a colour like #RRGGBB, got '{input}'"
            )));
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&digits[range], 16).map_err(|err| {
                ChromaError::Configuration(format!("invalid hex colour '{input}': {err}"))
            })
        };
        Ok(Self::new(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }

    pub fn to_hex(self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Color {
    type Err = ChromaError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

impl TryFrom<String> for Color {
    type Error = ChromaError;

    fn try_from(value: String) -> Result<Self> {
        Self::from_hex(&value)
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_hex()
    }
}

/// Inclusive per-channel acceptance range around a target colour.
///
/// Each channel is tested on its own, so the accepted set is an axis-aligned
/// box in RGB space rather than a sphere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToleranceBand {
    pub lower: [u8; 3],
    pub upper: [u8; 3],
}

impl ToleranceBand {
    pub fn new(target: Color, tolerance: u32) -> Self {
        let mut lower = [0u8; 3];
        let mut upper = [0u8; 3];
        for (idx, channel) in target.channels().into_iter().enumerate() {
            let value = u32::from(channel);
            lower[idx] = value.saturating_sub(tolerance) as u8;
            upper[idx] = value.saturating_add(tolerance).min(255) as u8;
        }
        Self { lower, upper }
    }

    pub fn contains(&self, color: Color) -> bool {
        color
            .channels()
            .into_iter()
            .enumerate()
            .all(|(idx, value)| (self.lower[idx]..=self.upper[idx]).contains(&value))
    }
}
