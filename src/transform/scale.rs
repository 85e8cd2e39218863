//! Bilinear resize stage.

use crate::{
    foundation::error::{CollageError, CollageResult},
    render::raster::{EdgeMode, Raster},
};

/// Resize `src` to `width`x`height` with bilinear interpolation.
pub fn scale(src: Raster, width: u32, height: u32) -> CollageResult<Raster> {
    if width == 0 || height == 0 {
        return Err(CollageError::geometry(format!(
            "scale target must be non-zero, got {width}x{height}"
        )));
    }
    if src.dimensions() == (width, height) {
        return Ok(src);
    }
    if src.width == 0 || src.height == 0 {
        return Err(CollageError::geometry("cannot scale an empty raster"));
    }

    let sx = f64::from(src.width) / f64::from(width);
    let sy = f64::from(src.height) / f64::from(height);

    let mut out = Raster::transparent(width, height)?;
    for y in 0..height {
        let v = (f64::from(y) + 0.5) * sy;
        for x in 0..width {
            let u = (f64::from(x) + 0.5) * sx;
            out.put_pixel(x, y, src.sample_bilinear(u, v, EdgeMode::Clamp));
        }
    }
    Ok(out)
}
