use std::path::Path;

use chrono::{DateTime, Utc};
use image::RgbImage;

use crate::{color::Color, geometry::Region, ChromaError, Result};

/// A single still capture: dense RGB grid, origin at the top-left.
///
/// Frames are never mutated after construction; masks and crops are derived.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    width: u32,
    height: u32,
    /// Packed RGB bytes, row-major.
    data: Vec<u8>,
    captured_at: DateTime<Utc>,
}

impl Frame {
    pub fn from_rgb(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let expected = (width as usize) * (height as usize) * 3;
        if data.len() != expected {
            return Err(ChromaError::Capture(format!(
                "RGB buffer for {width}x{height} frame has {} bytes, expected {expected}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
            captured_at: Utc::now(),
        })
    }

    /// Screen grabbers hand out RGBA; alpha is dropped.
    pub fn from_rgba(width: u32, height: u32, rgba: &[u8]) -> Result<Self> {
        let expected = (width as usize) * (height as usize) * 4;
        if rgba.len() != expected {
            return Err(ChromaError::Capture(format!(
                "RGBA buffer for {width}x{height} frame has {} bytes, expected {expected}",
                rgba.len()
            )));
        }
        let data = rgba
            .chunks_exact(4)
            .flat_map(|px| [px[0], px[1], px[2]])
            .collect();
        Self::from_rgb(width, height, data)
    }

    pub fn from_fn(width: u32, height: u32, mut pixel: impl FnMut(u32, u32) -> Color) -> Self {
        let mut data = Vec::with_capacity((width as usize) * (height as usize) * 3);
        for y in 0..height {
            for x in 0..width {
                data.extend_from_slice(&pixel(x, y).channels());
            }
        }
        Self {
            width,
            height,
            data,
            captured_at: Utc::now(),
        }
    }

    pub fn filled(width: u32, height: u32, color: Color) -> Self {
        Self::from_fn(width, height, |_, _| color)
    }

    pub fn from_image(image: RgbImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            width,
            height,
            data: image.into_raw(),
            captured_at: Utc::now(),
        }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let image = image::open(path_ref).map_err(|err| {
            ChromaError::Capture(format!("unable to load {}: {err}", path_ref.display()))
        })?;
        Ok(Self::from_image(image.to_rgb8()))
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn bounds(&self) -> Region {
        Region::full(self.width, self.height)
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    /// Colour at `(x, y)`; `None` outside the frame.
    pub fn pixel(&self, x: u32, y: u32) -> Option<Color> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = ((y as usize) * (self.width as usize) + x as usize) * 3;
        Some(Color::new(
            self.data[idx],
            self.data[idx + 1],
            self.data[idx + 2],
        ))
    }

    pub fn to_image(&self) -> Option<RgbImage> {
        RgbImage::from_raw(self.width, self.height, self.data.clone())
    }
}
