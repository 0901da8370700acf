use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, bail, Result};
use serde::{de::Error as DeError, Deserialize, Deserializer};

use crate::error_codes::LedError;

/// Pixels added around the cell area: border, background inset and glare.
pub const FRAME_MARGIN_PIXELS: u32 = 13;
/// Each cell is a 2x2 LED plus a 1px gap.
pub const CELL_PITCH_PIXELS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Direction {
    #[default]
    Left,
    Right,
    Up,
    Down,
    None,
}

impl Direction {
    pub const ALL: [Direction; 5] = [
        Direction::Left,
        Direction::Right,
        Direction::Up,
        Direction::Down,
        Direction::None,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
            Self::Up => "up",
            Self::Down => "down",
            Self::None => "none",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = LedError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|direction| direction.as_str() == normalized)
            .ok_or_else(|| {
                LedError::invalid_argument(format!(
                    "direction can only be one of \"left\", \"right\", \"up\", \"down\", or \"none\". Not \"{normalized}\"."
                ))
            })
    }
}

impl<'de> Deserialize<'de> for Direction {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(|error: LedError| D::Error::custom(error.message))
    }
}

/// Opaque RGB color, written as `#RRGGBB` or `#RGB` in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const WHITE: Color = Color::rgb(255, 255, 255);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn to_rgba(self) -> [u8; 4] {
        [self.r, self.g, self.b, 255]
    }

    pub fn to_hex(self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

impl FromStr for Color {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        let digits = value
            .trim()
            .strip_prefix('#')
            .ok_or_else(|| anyhow!("color '{value}' must start with '#'"))?;
        if !digits.chars().all(|ch| ch.is_ascii_hexdigit()) {
            bail!("color '{value}' contains non-hex digits");
        }

        let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&digits[range], 16);
        match digits.len() {
            6 => Ok(Self::rgb(channel(0..2)?, channel(2..4)?, channel(4..6)?)),
            3 => {
                let short = |index: usize| -> Result<u8> {
                    let nibble = channel(index..index + 1)?;
                    Ok(nibble * 17)
                };
                Ok(Self::rgb(short(0)?, short(1)?, short(2)?))
            }
            _ => bail!("color '{value}' must be #RRGGBB or #RGB"),
        }
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(|error: anyhow::Error| D::Error::custom(error))
    }
}

/// Palette of one document. Every document starts from its own copy of
/// [`ColorConfig::default`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ColorConfig {
    pub border: Color,
    pub background: Color,
    pub glare: Color,
    pub pixel_off_light: Color,
    pub pixel_off_dark: Color,
    pub pixel_on_light: Color,
    pub pixel_on_dark: Color,
}

impl Default for ColorConfig {
    fn default() -> Self {
        Self {
            border: Color::rgb(0x00, 0x00, 0x00),
            background: Color::rgb(0x22, 0x22, 0x22),
            glare: Color::rgb(0x66, 0x66, 0x66),
            pixel_off_light: Color::rgb(0x88, 0x00, 0x00),
            pixel_off_dark: Color::rgb(0x66, 0x00, 0x00),
            pixel_on_light: Color::rgb(0xFF, 0x66, 0x66),
            pixel_on_dark: Color::rgb(0xFF, 0x00, 0x00),
        }
    }
}

impl ColorConfig {
    /// (light, dark) pair for a lit or unlit cell.
    pub fn cell_colors(&self, is_on: bool) -> (Color, Color) {
        if is_on {
            (self.pixel_on_light, self.pixel_on_dark)
        } else {
            (self.pixel_off_light, self.pixel_off_dark)
        }
    }
}

/// How a scene pixel is judged "on" while scrolling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnPixelRule {
    /// RGB equals pure black, alpha ignored.
    #[default]
    RgbBlack,
    /// Full RGBA equals opaque black. Matches older renders that compared
    /// whole pixel tuples.
    OpaqueBlack,
}

impl OnPixelRule {
    pub fn is_on(self, pixel: [u8; 4]) -> bool {
        match self {
            Self::RgbBlack => pixel[..3] == [0, 0, 0],
            Self::OpaqueBlack => pixel == [0, 0, 0, 255],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MatrixSize {
    columns: u32,
    rows: u32,
}

impl MatrixSize {
    pub fn new(columns: u32, rows: u32) -> Result<Self> {
        if columns < 1 {
            return Err(LedError::invalid_construction("Minimum width = 1").into());
        }
        if rows < 1 {
            return Err(LedError::invalid_construction("Minimum height = 1").into());
        }
        Ok(Self { columns, rows })
    }

    /// Inverse of the pixel formulas; used when adopting an existing GIF.
    pub fn from_pixels(width: u32, height: u32) -> Result<Self> {
        let fits = |pixels: u32| {
            pixels > FRAME_MARGIN_PIXELS && (pixels - FRAME_MARGIN_PIXELS) % CELL_PITCH_PIXELS == 0
        };
        if !fits(width) || !fits(height) {
            return Err(LedError::size_mismatch(format!(
                "({width}, {height}) is not a valid LED matrix size: each side must be 3 * cells + 13"
            ))
            .into());
        }
        Self::new(
            (width - FRAME_MARGIN_PIXELS) / CELL_PITCH_PIXELS,
            (height - FRAME_MARGIN_PIXELS) / CELL_PITCH_PIXELS,
        )
    }

    pub fn columns(&self) -> u32 {
        self.columns
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn columns_pixels(&self) -> u32 {
        CELL_PITCH_PIXELS * self.columns + FRAME_MARGIN_PIXELS
    }

    pub fn rows_pixels(&self) -> u32 {
        CELL_PITCH_PIXELS * self.rows + FRAME_MARGIN_PIXELS
    }

    pub fn pixel_dimensions(&self) -> (u32, u32) {
        (self.columns_pixels(), self.rows_pixels())
    }
}
