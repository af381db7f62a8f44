use std::collections::VecDeque;

use chromaclick_types::{
    config::{Connectivity, DEFAULT_MIN_AREA},
    geometry::{Point, Region},
};
use tracing::debug;

use crate::mask::Mask;

const FOUR_NEIGHBOURS: [(i32, i32); 4] = [(0, -1), (-1, 0), (1, 0), (0, 1)];
const EIGHT_NEIGHBOURS: [(i32, i32); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

fn offsets(connectivity: Connectivity) -> &'static [(i32, i32)] {
    match connectivity {
        Connectivity::Four => &FOUR_NEIGHBOURS,
        Connectivity::Eight => &EIGHT_NEIGHBOURS,
    }
}

/// The background always uses the complementary rule so holes are well defined.
fn complement(connectivity: Connectivity) -> Connectivity {
    match connectivity {
        Connectivity::Four => Connectivity::Eight,
        Connectivity::Eight => Connectivity::Four,
    }
}

/// Mean pixel position of a component.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Centroid {
    pub x: f64,
    pub y: f64,
}

impl Centroid {
    /// Truncates toward zero, the way integer pixel coordinates are derived
    /// from moment ratios.
    pub fn to_point(self) -> Point {
        Point::new(self.x as u32, self.y as u32)
    }
}

/// A connected group of mask pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct Blob {
    pub area: usize,
    pub centroid: Centroid,
    /// Tight bounding box, end-exclusive.
    pub bounds: Region,
}

impl Blob {
    /// Moves the blob from region-local into frame coordinates.
    pub fn translate(&self, origin: Point) -> Blob {
        let (dx, dy) = (origin.x, origin.y);
        Blob {
            area: self.area,
            centroid: Centroid {
                x: self.centroid.x + f64::from(dx),
                y: self.centroid.y + f64::from(dy),
            },
            bounds: Region::new(
                self.bounds.x1 + dx,
                self.bounds.y1 + dy,
                self.bounds.x2 + dx,
                self.bounds.y2 + dy,
            ),
        }
    }
}

/// Finds external connected components in a mask.
///
/// Components are discovered in row-major order of their first pixel.
/// A component sitting inside a hole of another component is not external
/// and is never reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlobDetector {
    min_area: usize,
    connectivity: Connectivity,
}

impl Default for BlobDetector {
    fn default() -> Self {
        Self {
            min_area: DEFAULT_MIN_AREA,
            connectivity: Connectivity::Eight,
        }
    }
}

impl BlobDetector {
    pub fn new(min_area: usize) -> Self {
        Self {
            min_area,
            ..Self::default()
        }
    }

    pub fn with_connectivity(mut self, connectivity: Connectivity) -> Self {
        self.connectivity = connectivity;
        self
    }

    pub fn min_area(&self) -> usize {
        self.min_area
    }

    /// First external component whose area is strictly greater than
    /// `min_area`, in discovery order. Not the largest one.
    pub fn find_best(&self, mask: &Mask) -> Option<Blob> {
        let best = self
            .external_components(mask)
            .into_iter()
            .find(|blob| blob.area > self.min_area);
        debug!(
            min_area = self.min_area,
            found = best.is_some(),
            "blob search finished"
        );
        best
    }

    /// Every external component regardless of area, in discovery order.
    pub fn external_components(&self, mask: &Mask) -> Vec<Blob> {
        let (width, height) = (mask.width(), mask.height());
        let outside = outside_background(mask, complement(self.connectivity));
        let mut visited = vec![false; (width as usize) * (height as usize)];
        let mut blobs = Vec::new();

        for y in 0..height {
            for x in 0..width {
                let idx = mask.index(x, y);
                if visited[idx] || !mask.get(x, y) {
                    continue;
                }
                let component = self.grow(mask, &mut visited, x, y, &outside);
                if component.external {
                    if let Some(blob) = component.into_blob() {
                        blobs.push(blob);
                    }
                }
            }
        }
        blobs
    }

    fn grow(
        &self,
        mask: &Mask,
        visited: &mut [bool],
        seed_x: u32,
        seed_y: u32,
        outside: &[bool],
    ) -> Component {
        let mut component = Component::new(seed_x, seed_y);
        let mut queue = VecDeque::from([(seed_x, seed_y)]);
        visited[mask.index(seed_x, seed_y)] = true;

        while let Some((x, y)) = queue.pop_front() {
            component.add(x, y);

            if !component.external && faces_outside(mask, outside, x, y) {
                component.external = true;
            }

            for (nx, ny) in neighbours(mask, x, y, offsets(self.connectivity)) {
                let idx = mask.index(nx, ny);
                if !visited[idx] && mask.get(nx, ny) {
                    visited[idx] = true;
                    queue.push_back((nx, ny));
                }
            }
        }
        component
    }
}

struct Component {
    area: usize,
    sum_x: u64,
    sum_y: u64,
    min_x: u32,
    min_y: u32,
    max_x: u32,
    max_y: u32,
    external: bool,
}

impl Component {
    fn new(x: u32, y: u32) -> Self {
        Self {
            area: 0,
            sum_x: 0,
            sum_y: 0,
            min_x: x,
            min_y: y,
            max_x: x,
            max_y: y,
            external: false,
        }
    }

    fn add(&mut self, x: u32, y: u32) {
        self.area += 1;
        self.sum_x += u64::from(x);
        self.sum_y += u64::from(y);
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
    }

    fn into_blob(self) -> Option<Blob> {
        if self.area == 0 {
            return None;
        }
        let area = self.area as f64;
        Some(Blob {
            area: self.area,
            centroid: Centroid {
                x: self.sum_x as f64 / area,
                y: self.sum_y as f64 / area,
            },
            bounds: Region::new(self.min_x, self.min_y, self.max_x + 1, self.max_y + 1),
        })
    }
}

fn neighbours<'a>(
    mask: &'a Mask,
    x: u32,
    y: u32,
    offsets: &'a [(i32, i32)],
) -> impl Iterator<Item = (u32, u32)> + 'a {
    offsets.iter().filter_map(move |(dx, dy)| {
        let nx = i64::from(x) + i64::from(*dx);
        let ny = i64::from(y) + i64::from(*dy);
        if nx < 0 || ny < 0 || nx >= i64::from(mask.width()) || ny >= i64::from(mask.height()) {
            None
        } else {
            Some((nx as u32, ny as u32))
        }
    })
}

/// A foreground pixel on the mask edge, or next to outside background,
/// lies on an outer boundary.
fn faces_outside(mask: &Mask, outside: &[bool], x: u32, y: u32) -> bool {
    if x == 0 || y == 0 || x + 1 == mask.width() || y + 1 == mask.height() {
        return true;
    }
    neighbours(mask, x, y, &FOUR_NEIGHBOURS).any(|(nx, ny)| outside[mask.index(nx, ny)])
}

/// Background pixels connected to the mask edge.
fn outside_background(mask: &Mask, connectivity: Connectivity) -> Vec<bool> {
    let (width, height) = (mask.width(), mask.height());
    let mut outside = vec![false; (width as usize) * (height as usize)];
    let mut queue = VecDeque::new();

    let seed = |x: u32, y: u32, outside: &mut Vec<bool>, queue: &mut VecDeque<(u32, u32)>| {
        let idx = mask.index(x, y);
        if !mask.get(x, y) && !outside[idx] {
            outside[idx] = true;
            queue.push_back((x, y));
        }
    };
    for x in 0..width {
        seed(x, 0, &mut outside, &mut queue);
        if height > 1 {
            seed(x, height - 1, &mut outside, &mut queue);
        }
    }
    for y in 0..height {
        seed(0, y, &mut outside, &mut queue);
        if width > 1 {
            seed(width - 1, y, &mut outside, &mut queue);
        }
    }

    while let Some((x, y)) = queue.pop_front() {
        for (nx, ny) in neighbours(mask, x, y, offsets(connectivity)) {
            let idx = mask.index(nx, ny);
            if !outside[idx] && !mask.get(nx, ny) {
                outside[idx] = true;
                queue.push_back((nx, ny));
            }
        }
    }
    outside
}
