//! Crop stage.

use crate::{
    foundation::core::CropRect, foundation::error::CollageResult, render::raster::Raster,
};

/// Extract `crop` from `src`, or pass `src` through when there is no crop.
///
/// A rectangle outside the source bounds is a geometry error; it is never
/// clamped.
pub fn crop(src: Raster, crop: Option<CropRect>) -> CollageResult<Raster> {
    let Some(rect) = crop else {
        return Ok(src);
    };
    match rect.resolve(src.width, src.height)? {
        None => Ok(src),
        Some((x, y, w, h)) if x == 0 && y == 0 && w == src.width && h == src.height => Ok(src),
        Some((x, y, w, h)) => src.sub_image(x, y, w, h),
    }
}
