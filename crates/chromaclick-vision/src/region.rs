use chromaclick_types::{geometry::Region, ChromaError, Result};

/// Resolves the region a detection runs over.
///
/// No request means the whole frame. A request must be non-degenerate and lie
/// within `[0, width] x [0, height]`; anything else is rejected, never clamped.
pub fn clip_region(width: u32, height: u32, requested: Option<Region>) -> Result<Region> {
    let Some(region) = requested else {
        return Ok(Region::full(width, height));
    };
    if region.is_degenerate() || !region.fits_within(width, height) {
        return Err(ChromaError::InvalidRegion {
            region,
            width,
            height,
        });
    }
    Ok(region)
}
