use crate::{
    foundation::error::{CollageError, CollageResult},
    render::raster::Raster,
};

/// Decode encoded image bytes (PNG, JPEG, GIF, BMP, ...) into a premultiplied raster.
///
/// Sources without alpha gain an opaque alpha channel.
pub fn decode_image(bytes: &[u8]) -> CollageResult<Raster> {
    let dyn_img = image::load_from_memory(bytes)
        .map_err(|e| CollageError::decode(format!("decode image from memory: {e}")))?;
    let rgba = dyn_img.to_rgba8();
    let (width, height) = rgba.dimensions();

    let mut rgba8_premul = rgba.into_raw();
    premultiply_rgba8_in_place(&mut rgba8_premul);

    Raster::from_premul(width, height, rgba8_premul)
}

/// Read only the dimensions of encoded image bytes.
pub fn probe_dimensions(bytes: &[u8]) -> CollageResult<(u32, u32)> {
    let reader = image::ImageReader::new(std::io::Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| CollageError::decode(format!("guess image format: {e}")))?;
    reader
        .into_dimensions()
        .map_err(|e| CollageError::decode(format!("read image dimensions: {e}")))
}

fn premultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = px[3] as u16;
        if a == 0 {
            px[0] = 0;
            px[1] = 0;
            px[2] = 0;
            continue;
        }
        px[0] = ((px[0] as u16 * a + 127) / 255) as u8;
        px[1] = ((px[1] as u16 * a + 127) / 255) as u8;
        px[2] = ((px[2] as u16 * a + 127) / 255) as u8;
    }
}

#[cfg(test)]
#[path = "../../tests/unit/assets/decode.rs"]
mod tests;
