//! Rotation stage.

use kurbo::{Affine, Point, Vec2};

use crate::{
    foundation::error::CollageResult,
    render::raster::{EdgeMode, Raster},
};

/// Slack absorbed before flooring the bounding box, so that trigonometric
/// noise at exact quarter turns does not lose a pixel.
const BOUNDS_EPSILON: f64 = 1e-9;

/// Reduce signed degrees into `[0, 360)`.
pub fn normalize_degrees(deg: f64) -> f64 {
    let r = deg.rem_euclid(360.0);
    if r >= 360.0 { 0.0 } else { r }
}

/// Whether rotating by `deg` changes the raster at all.
pub fn is_identity_rotation(deg: f64) -> bool {
    deg % 360.0 == 0.0
}

/// Size of the axis-aligned box enclosing a `w`x`h` raster rotated by `deg`.
pub fn rotated_bounds(w: u32, h: u32, deg: f64) -> (u32, u32) {
    let theta = normalize_degrees(deg).to_radians();
    let (sin, cos) = (theta.sin().abs(), theta.cos().abs());
    let (w, h) = (f64::from(w), f64::from(h));
    let new_w = (w * cos + h * sin + BOUNDS_EPSILON).floor().max(1.0);
    let new_h = (h * cos + w * sin + BOUNDS_EPSILON).floor().max(1.0);
    (new_w as u32, new_h as u32)
}

/// Rotate `src` clockwise (screen coordinates, y down) by `deg` about its center.
///
/// The output is sized to the rotated bounding box; pixels not covered by the
/// source stay transparent.
pub fn rotate(src: Raster, deg: f64) -> CollageResult<Raster> {
    if is_identity_rotation(deg) {
        return Ok(src);
    }
    let (new_w, new_h) = rotated_bounds(src.width, src.height, deg);
    let theta = normalize_degrees(deg).to_radians();

    let src_center = Vec2::new(f64::from(src.width) / 2.0, f64::from(src.height) / 2.0);
    let dst_center = Vec2::new(f64::from(new_w) / 2.0, f64::from(new_h) / 2.0);

    // dst = T(dst_center) * R(theta) * T(-src_center) * src
    let forward =
        Affine::translate(dst_center) * Affine::rotate(theta) * Affine::translate(-src_center);
    let inverse = forward.inverse();

    let mut out = Raster::transparent(new_w, new_h)?;
    for y in 0..new_h {
        for x in 0..new_w {
            let p = inverse * Point::new(f64::from(x) + 0.5, f64::from(y) + 0.5);
            let px = src.sample_bilinear(p.x, p.y, EdgeMode::Transparent);
            if px[3] != 0 {
                out.put_pixel(x, y, px);
            }
        }
    }
    Ok(out)
}
