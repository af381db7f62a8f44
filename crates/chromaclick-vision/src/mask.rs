use chromaclick_types::{
    color::{Color, ToleranceBand},
    frame::Frame,
    geometry::Region,
};

/// Binary image with the same extent as the region it was computed over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    width: u32,
    height: u32,
    bits: Vec<bool>,
}

impl Mask {
    pub fn from_fn(width: u32, height: u32, mut set: impl FnMut(u32, u32) -> bool) -> Self {
        let mut bits = Vec::with_capacity((width as usize) * (height as usize));
        for y in 0..height {
            for x in 0..width {
                bits.push(set(x, y));
            }
        }
        Self {
            width,
            height,
            bits,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// `false` outside the mask.
    pub fn get(&self, x: u32, y: u32) -> bool {
        x < self.width && y < self.height && self.bits[self.index(x, y)]
    }

    pub fn count(&self) -> usize {
        self.bits.iter().filter(|bit| **bit).count()
    }

    pub(crate) fn index(&self, x: u32, y: u32) -> usize {
        (y as usize) * (self.width as usize) + x as usize
    }
}

/// Marks every pixel of `region` whose channels all sit inside the tolerance
/// band around `target`. Mask coordinates are relative to the region origin.
pub fn match_color(frame: &Frame, region: Region, target: Color, tolerance: u32) -> Mask {
    let band = ToleranceBand::new(target, tolerance);
    Mask::from_fn(region.width(), region.height(), |x, y| {
        frame
            .pixel(region.x1 + x, region.y1 + y)
            .is_some_and(|px| band.contains(px))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marks_only_pixels_inside_band() {
        let frame = Frame::from_fn(4, 1, |x, _| match x {
            0 => Color::new(200, 10, 10),
            1 => Color::new(210, 0, 20),
            2 => Color::new(211, 10, 10),
            _ => Color::BLACK,
        });
        let mask = match_color(&frame, frame.bounds(), Color::new(200, 10, 10), 10);
        assert!(mask.get(0, 0));
        assert!(mask.get(1, 0));
        assert!(!mask.get(2, 0));
        assert!(!mask.get(3, 0));
        assert_eq!(mask.count(), 2);
    }

    #[test]
    fn box_band_not_euclidean() {
        // Distance sqrt(3 * 20^2) ~ 34.6 exceeds 20, but each channel is within 20.
        let frame = Frame::filled(1, 1, Color::new(120, 120, 120));
        let mask = match_color(&frame, frame.bounds(), Color::new(100, 100, 100), 20);
        assert!(mask.get(0, 0));
    }

    #[test]
    fn single_channel_outside_band_excludes_pixel() {
        let target = Color::new(50, 60, 70);
        let tolerance = 5;
        let frame = Frame::from_fn(3, 1, |x, _| match x {
            0 => Color::new(56, 60, 70),
            1 => Color::new(50, 54, 70),
            _ => Color::new(50, 60, 76),
        });
        let mask = match_color(&frame, frame.bounds(), target, tolerance);
        assert_eq!(mask.count(), 0);
    }

    #[test]
    fn region_mask_is_region_local() {
        let frame = Frame::from_fn(10, 10, |x, y| {
            if (x, y) == (6, 7) {
                Color::RED
            } else {
                Color::BLACK
            }
        });
        let region = Region::new(5, 5, 9, 9);
        let mask = match_color(&frame, region, Color::RED, 0);
        assert_eq!((mask.width(), mask.height()), (4, 4));
        assert!(mask.get(1, 2));
        assert_eq!(mask.count(), 1);
    }

    #[test]
    fn out_of_range_reads_are_false() {
        let mask = Mask::from_fn(2, 2, |_, _| true);
        assert!(!mask.get(2, 0));
        assert!(!mask.get(0, 2));
    }
}
