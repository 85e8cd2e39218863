use crate::foundation::error::{CollageError, CollageResult};

/// Premultiplied RGBA8 pixel.
pub type PremulRgba8 = [u8; 4];

/// Largest width or height of a newly allocated raster.
pub const MAX_RASTER_DIM: u32 = 16_384;

/// Owned pixel buffer in row-major premultiplied RGBA8.
///
/// Every raster produced by this crate carries an alpha channel, whatever the
/// format of the bytes it was decoded from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Raster {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// `width * height * 4` bytes.
    pub data: Vec<u8>,
}

/// How the sampler treats coordinates outside the raster.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EdgeMode {
    /// Repeat the nearest edge pixel (used when resizing).
    Clamp,
    /// Outside pixels are fully transparent (used when rotating).
    Transparent,
}

impl Raster {
    /// Allocate a fully transparent raster.
    ///
    /// Sizes above [`MAX_RASTER_DIM`] on either side, and allocations the
    /// system refuses, are geometry errors.
    pub fn transparent(width: u32, height: u32) -> CollageResult<Self> {
        if width > MAX_RASTER_DIM || height > MAX_RASTER_DIM {
            return Err(CollageError::geometry(format!(
                "raster {width}x{height} is too large (max {MAX_RASTER_DIM}x{MAX_RASTER_DIM})"
            )));
        }
        let len = byte_len(width, height)?;
        let mut data = Vec::new();
        data.try_reserve_exact(len).map_err(|e| {
            CollageError::geometry(format!("cannot allocate raster {width}x{height}: {e}"))
        })?;
        data.resize(len, 0);
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Allocate a raster filled with one premultiplied color.
    pub fn filled(width: u32, height: u32, px: PremulRgba8) -> CollageResult<Self> {
        let mut out = Self::transparent(width, height)?;
        for chunk in out.data.chunks_exact_mut(4) {
            chunk.copy_from_slice(&px);
        }
        Ok(out)
    }

    /// Wrap an existing premultiplied buffer.
    pub fn from_premul(width: u32, height: u32, data: Vec<u8>) -> CollageResult<Self> {
        if data.len() != byte_len(width, height)? {
            return Err(CollageError::validation(format!(
                "raster buffer of {} bytes does not match {width}x{height}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Dimensions as `(width, height)`.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    #[inline]
    fn index(&self, x: u32, y: u32) -> usize {
        ((y as usize) * (self.width as usize) + (x as usize)) * 4
    }

    /// Read one pixel; `None` outside the raster.
    pub fn pixel(&self, x: u32, y: u32) -> Option<PremulRgba8> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = self.index(x, y);
        Some([
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ])
    }

    /// Write one pixel; writes outside the raster are ignored.
    pub fn put_pixel(&mut self, x: u32, y: u32, px: PremulRgba8) {
        if x >= self.width || y >= self.height {
            return;
        }
        let i = self.index(x, y);
        self.data[i..i + 4].copy_from_slice(&px);
    }

    fn texel(&self, x: i64, y: i64, edge: EdgeMode) -> [f32; 4] {
        let (w, h) = (i64::from(self.width), i64::from(self.height));
        let (x, y) = match edge {
            EdgeMode::Clamp => (x.clamp(0, w - 1), y.clamp(0, h - 1)),
            EdgeMode::Transparent => {
                if x < 0 || y < 0 || x >= w || y >= h {
                    return [0.0; 4];
                }
                (x, y)
            }
        };
        let i = self.index(x as u32, y as u32);
        [
            f32::from(self.data[i]),
            f32::from(self.data[i + 1]),
            f32::from(self.data[i + 2]),
            f32::from(self.data[i + 3]),
        ]
    }

    /// Bilinear sample at continuous pixel coordinates where pixel `(i, j)`
    /// has its center at `(i + 0.5, j + 0.5)`.
    pub fn sample_bilinear(&self, x: f64, y: f64, edge: EdgeMode) -> PremulRgba8 {
        if self.width == 0 || self.height == 0 {
            return [0; 4];
        }
        let fx = x - 0.5;
        let fy = y - 0.5;
        let x0 = fx.floor();
        let y0 = fy.floor();
        let tx = (fx - x0) as f32;
        let ty = (fy - y0) as f32;
        let (x0, y0) = (x0 as i64, y0 as i64);

        let p00 = self.texel(x0, y0, edge);
        let p10 = self.texel(x0 + 1, y0, edge);
        let p01 = self.texel(x0, y0 + 1, edge);
        let p11 = self.texel(x0 + 1, y0 + 1, edge);

        let mut out = [0u8; 4];
        for c in 0..4 {
            let top = p00[c] + (p10[c] - p00[c]) * tx;
            let bottom = p01[c] + (p11[c] - p01[c]) * tx;
            let v = top + (bottom - top) * ty;
            out[c] = v.round().clamp(0.0, 255.0) as u8;
        }
        // Keep the premultiplied invariant c <= a after rounding.
        for c in 0..3 {
            out[c] = out[c].min(out[3]);
        }
        out
    }

    /// Copy out the sub-rectangle `(x, y, w, h)`, which must lie inside the raster.
    pub fn sub_image(&self, x: u32, y: u32, w: u32, h: u32) -> CollageResult<Self> {
        let fits = x.checked_add(w).is_some_and(|r| r <= self.width)
            && y.checked_add(h).is_some_and(|b| b <= self.height);
        if !fits {
            return Err(CollageError::geometry(format!(
                "sub-image ({x}, {y}, {w}x{h}) exceeds raster {}x{}",
                self.width, self.height
            )));
        }
        let mut out = Self::transparent(w, h)?;
        let row_bytes = (w as usize) * 4;
        for row in 0..h {
            let src = self.index(x, y + row);
            let dst = out.index(0, row);
            out.data[dst..dst + row_bytes].copy_from_slice(&self.data[src..src + row_bytes]);
        }
        Ok(out)
    }
}

fn byte_len(width: u32, height: u32) -> CollageResult<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(4))
        .ok_or_else(|| CollageError::geometry(format!("raster {width}x{height} is too large")))
}

#[cfg(test)]
#[path = "../../tests/unit/render/raster.rs"]
mod tests;
