use std::io::Cursor;

use anyhow::Context;

use crate::{foundation::error::CollageResult, render::raster::Raster};

/// Encode a raster as PNG with straight (non-premultiplied) alpha.
pub fn encode_png(raster: &Raster) -> CollageResult<Vec<u8>> {
    let mut straight = raster.data.clone();
    unpremultiply_rgba8_in_place(&mut straight);

    let mut buf = Vec::new();
    image::write_buffer_with_format(
        &mut Cursor::new(&mut buf),
        &straight,
        raster.width,
        raster.height,
        image::ExtendedColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .context("encode png")?;
    Ok(buf)
}

fn unpremultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = u16::from(px[3]);
        if a == 0 || a == 255 {
            continue;
        }
        for c in px.iter_mut().take(3) {
            *c = ((u16::from(*c) * 255 + a / 2) / a).min(255) as u8;
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/assets/encode.rs"]
mod tests;
