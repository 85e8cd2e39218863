//! Per-layer raster transformation: crop, then scale, then rotate.

pub mod crop;
pub mod rotate;
pub mod scale;

use crate::{
    assets::decode::decode_image,
    foundation::core::CropRect,
    foundation::error::CollageResult,
    render::raster::Raster,
};

/// Transform parameters stored on a leaf layer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TransformParams {
    /// Optional crop in source pixel space; empty rectangles mean "no crop".
    pub crop: Option<CropRect>,
    /// Target width after scaling.
    pub width: u32,
    /// Target height after scaling.
    pub height: u32,
    /// Signed rotation in degrees, clockwise on screen.
    pub rotation_deg: f64,
}

/// Stateless, deterministic crop → scale → rotate pipeline.
pub struct TransformEngine;

impl TransformEngine {
    /// Apply `params` to an already decoded raster.
    pub fn apply(source: Raster, params: &TransformParams) -> CollageResult<Raster> {
        let cropped = crop::crop(source, params.crop)?;
        let scaled = scale::scale(cropped, params.width, params.height)?;
        rotate::rotate(scaled, params.rotation_deg)
    }

    /// Decode `bytes` and apply `params`.
    pub fn apply_bytes(bytes: &[u8], params: &TransformParams) -> CollageResult<Raster> {
        let source = decode_image(bytes)?;
        Self::apply(source, params)
    }
}

#[cfg(test)]
#[path = "../tests/unit/transform/pipeline.rs"]
mod tests;
