use std::fmt;

use crate::foundation::error::{CollageError, CollageResult};

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(
            Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize,
            serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "#{}"), self.0)
            }
        }
    };
}

id_type!(
    /// Identity of a layer node (leaf or group).
    LayerId,
    "layer"
);
id_type!(
    /// Identity of a collage.
    CollageId,
    "collage"
);
id_type!(
    /// Identity of a stored source or rendered image record.
    ImageId,
    "image"
);
id_type!(
    /// Identity of a user (resource owner).
    UserId,
    "user"
);

/// Top-left placement of a layer on the canvas, in pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Position {
    /// Horizontal offset; may be negative (layer partially off-canvas).
    pub x: i32,
    /// Vertical offset; may be negative.
    pub y: i32,
}

impl Position {
    /// Build a position from its coordinates.
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Output canvas dimensions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct CanvasSize {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl CanvasSize {
    /// Build a canvas size; both dimensions must be non-zero.
    pub fn new(width: u32, height: u32) -> CollageResult<Self> {
        if width == 0 || height == 0 {
            return Err(CollageError::validation(format!(
                "canvas size must be non-zero, got {width}x{height}"
            )));
        }
        Ok(Self { width, height })
    }
}

/// Crop rectangle in source-raster pixel space.
///
/// Fields are signed so that malformed requests survive storage and are
/// rejected with a geometry error when the layer is transformed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct CropRect {
    /// Left edge.
    pub x: i32,
    /// Top edge.
    pub y: i32,
    /// Width.
    pub width: i32,
    /// Height.
    pub height: i32,
}

impl CropRect {
    /// Build a crop rectangle.
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// A rectangle with a zero dimension (and nothing negative) means "no crop".
    pub fn is_empty(self) -> bool {
        self.width >= 0 && self.height >= 0 && (self.width == 0 || self.height == 0)
    }

    /// Resolve against a source of `src_w`x`src_h` pixels.
    ///
    /// Returns `Ok(None)` for an empty rectangle and the checked unsigned
    /// rectangle `(x, y, w, h)` otherwise.
    pub fn resolve(self, src_w: u32, src_h: u32) -> CollageResult<Option<(u32, u32, u32, u32)>> {
        if self.is_empty() {
            return Ok(None);
        }
        if self.x < 0 || self.y < 0 || self.width <= 0 || self.height <= 0 {
            return Err(CollageError::geometry(format!(
                "crop rectangle {self} has negative origin or non-positive size"
            )));
        }
        let (x, y, w, h) = (
            self.x as u32,
            self.y as u32,
            self.width as u32,
            self.height as u32,
        );
        let fits_x = x.checked_add(w).is_some_and(|r| r <= src_w);
        let fits_y = y.checked_add(h).is_some_and(|b| b <= src_h);
        if !fits_x || !fits_y {
            return Err(CollageError::geometry(format!(
                "crop rectangle {self} exceeds source bounds {src_w}x{src_h}"
            )));
        }
        Ok(Some((x, y, w, h)))
    }
}

impl fmt::Display for CropRect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}, {}x{})",
            self.x, self.y, self.width, self.height
        )
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
