use crate::render::raster::{PremulRgba8, Raster};

/// Source-over blend of two premultiplied pixels.
pub fn over(dst: PremulRgba8, src: PremulRgba8) -> PremulRgba8 {
    if src[3] == 0 {
        return dst;
    }
    if src[3] == 255 {
        return src;
    }

    let inv = 255u16 - u16::from(src[3]);

    let mut out = [0u8; 4];
    for i in 0..4 {
        let dc = mul_div255(u16::from(dst[i]), inv);
        out[i] = src[i].saturating_add(dc);
    }
    out
}

/// Paint `src` onto `dst` with its top-left corner at `(x, y)`.
///
/// Offsets may be negative or push `src` past the canvas; the overlap is
/// clipped and everything outside it is left untouched.
pub fn paint_at(dst: &mut Raster, src: &Raster, x: i32, y: i32) {
    let (dw, dh) = (i64::from(dst.width), i64::from(dst.height));
    let (sw, sh) = (i64::from(src.width), i64::from(src.height));
    let (x, y) = (i64::from(x), i64::from(y));

    let x0 = x.max(0);
    let y0 = y.max(0);
    let x1 = (x + sw).min(dw);
    let y1 = (y + sh).min(dh);
    if x0 >= x1 || y0 >= y1 {
        return;
    }

    let span = ((x1 - x0) as usize) * 4;
    for dy in y0..y1 {
        let sy = dy - y;
        let sx = x0 - x;
        let s_start = ((sy * sw + sx) as usize) * 4;
        let d_start = ((dy * dw + x0) as usize) * 4;
        let s_row = &src.data[s_start..s_start + span];
        let d_row = &mut dst.data[d_start..d_start + span];
        for (d, s) in d_row.chunks_exact_mut(4).zip(s_row.chunks_exact(4)) {
            let out = over([d[0], d[1], d[2], d[3]], [s[0], s[1], s[2], s[3]]);
            d.copy_from_slice(&out);
        }
    }
}

fn mul_div255(x: u16, y: u16) -> u8 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u8
}

#[cfg(test)]
#[path = "../../tests/unit/render/composite.rs"]
mod tests;
