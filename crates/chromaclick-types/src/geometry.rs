use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{ChromaError, Result};

/// Absolute pixel position, origin at the top-left of the captured surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: u32,
    pub y: u32,
}

impl Point {
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Half-open rectangle `[x1, x2) x [y1, y2)` in frame pixel coordinates.
///
/// Serialised as `[x1, y1, x2, y2]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "[u32; 4]", into = "[u32; 4]")]
pub struct Region {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

impl Region {
    pub const fn new(x1: u32, y1: u32, x2: u32, y2: u32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub const fn full(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }

    pub fn width(&self) -> u32 {
        self.x2.saturating_sub(self.x1)
    }

    pub fn height(&self) -> u32 {
        self.y2.saturating_sub(self.y1)
    }

    pub fn is_degenerate(&self) -> bool {
        self.x1 >= self.x2 || self.y1 >= self.y2
    }

    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.x2 <= width && self.y2 <= height
    }

    pub fn contains(&self, point: Point) -> bool {
        (self.x1..self.x2).contains(&point.x) && (self.y1..self.y2).contains(&point.y)
    }

    pub fn origin(&self) -> Point {
        Point::new(self.x1, self.y1)
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})-({}, {})", self.x1, self.y1, self.x2, self.y2)
    }
}

impl From<[u32; 4]> for Region {
    fn from([x1, y1, x2, y2]: [u32; 4]) -> Self {
        Self::new(x1, y1, x2, y2)
    }
}

impl From<Region> for [u32; 4] {
    fn from(region: Region) -> Self {
        [region.x1, region.y1, region.x2, region.y2]
    }
}

/// Parses `x1,y1,x2,y2`.
impl FromStr for Region {
    type Err = ChromaError;

    fn from_str(s: &str) -> Result<Self> {
        let values = s
            .split(',')
            .map(|part| part.trim().parse::<u32>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|err| ChromaError::Configuration(format!("invalid region '{s}': {err}")))?;
        match values.as_slice() {
            [x1, y1, x2, y2] => Ok(Self::new(*x1, *y1, *x2, *y2)),
            _ => Err(ChromaError::Configuration(format!(
                "region '{s}' must have four comma-separated values"
            ))),
        }
    }
}
