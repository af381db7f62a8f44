//! Colour thresholding and blob extraction over still frames.
//!
//! Everything here is synchronous and side-effect free: a frame goes in,
//! a [`Mask`] or a [`Blob`] comes out.

mod blob;
mod mask;
mod region;

pub use blob::{Blob, BlobDetector, Centroid};
pub use chromaclick_types::config::Connectivity;
pub use mask::{match_color, Mask};
pub use region::clip_region;
