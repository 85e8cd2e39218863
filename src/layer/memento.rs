use crate::foundation::core::{CropRect, LayerId, Position};

/// Immutable snapshot of one leaf's mutable transform fields.
///
/// Mementos only live on the in-memory history stacks; they are never persisted.
#[derive(Clone, Debug, PartialEq)]
pub struct Memento {
    pub(crate) layer_id: LayerId,
    pub(crate) position: Position,
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) rotation_deg: f64,
    pub(crate) crop: Option<CropRect>,
}

impl Memento {
    /// Leaf this snapshot belongs to.
    pub fn layer_id(&self) -> LayerId {
        self.layer_id
    }

    /// Captured position.
    pub fn position(&self) -> Position {
        self.position
    }

    /// Captured target size.
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Captured rotation in signed degrees.
    pub fn rotation_deg(&self) -> f64 {
        self.rotation_deg
    }

    /// Captured crop rectangle.
    pub fn crop(&self) -> Option<CropRect> {
        self.crop
    }
}
