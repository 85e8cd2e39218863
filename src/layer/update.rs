use std::{fmt, str::FromStr};

use crate::foundation::{
    core::CropRect,
    error::{CollageError, CollageResult},
};

/// Rotation applied by [`LayerAction::RotateLeft`] / [`LayerAction::RotateRight`].
pub const ROTATION_STEP_DEG: f64 = 90.0;

/// Partial update of a leaf's transform fields.
///
/// Every field is optional; absent fields leave the current value untouched.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LayerUpdate {
    /// New target width.
    pub width: Option<u32>,
    /// New target height.
    pub height: Option<u32>,
    /// New rotation in signed degrees (replaces, does not add).
    pub rotation_angle: Option<f64>,
    /// Crop left edge.
    pub crop_x: Option<i32>,
    /// Crop top edge.
    pub crop_y: Option<i32>,
    /// Crop width.
    pub crop_width: Option<i32>,
    /// Crop height.
    pub crop_height: Option<i32>,
    /// New horizontal position.
    pub x: Option<i32>,
    /// New vertical position.
    pub y: Option<i32>,
}

impl LayerUpdate {
    /// Whether no field is set.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Whether any crop field is set.
    pub fn touches_crop(&self) -> bool {
        self.crop_x.is_some()
            || self.crop_y.is_some()
            || self.crop_width.is_some()
            || self.crop_height.is_some()
    }

    /// Reject values that can never describe a valid leaf.
    pub fn validate(&self) -> CollageResult<()> {
        if self.width == Some(0) || self.height == Some(0) {
            return Err(CollageError::geometry("layer width and height must be non-zero"));
        }
        if let Some(deg) = self.rotation_angle
            && !deg.is_finite()
        {
            return Err(CollageError::geometry("rotation angle must be finite"));
        }
        Ok(())
    }

    /// Merge the crop fields into `current`, keeping fields that are absent.
    pub fn merged_crop(&self, current: Option<CropRect>) -> Option<CropRect> {
        if !self.touches_crop() {
            return current;
        }
        let base = current.unwrap_or_default();
        Some(CropRect {
            x: self.crop_x.unwrap_or(base.x),
            y: self.crop_y.unwrap_or(base.y),
            width: self.crop_width.unwrap_or(base.width),
            height: self.crop_height.unwrap_or(base.height),
        })
    }
}

/// Single-step layer action.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerAction {
    /// Rotate 90° counter-clockwise.
    RotateLeft,
    /// Rotate 90° clockwise.
    RotateRight,
    /// Remove the layer from its collage.
    Delete,
}

impl LayerAction {
    /// Wire name of the action.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RotateLeft => "rotate_left",
            Self::RotateRight => "rotate_right",
            Self::Delete => "delete",
        }
    }

    /// Rotation delta in degrees, if this action rotates.
    pub fn rotation_delta(self) -> Option<f64> {
        match self {
            Self::RotateLeft => Some(-ROTATION_STEP_DEG),
            Self::RotateRight => Some(ROTATION_STEP_DEG),
            Self::Delete => None,
        }
    }
}

impl FromStr for LayerAction {
    type Err = CollageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "rotate_left" => Ok(Self::RotateLeft),
            "rotate_right" => Ok(Self::RotateRight),
            "delete" => Ok(Self::Delete),
            other => Err(CollageError::validation(format!(
                "unknown layer action '{other}'"
            ))),
        }
    }
}

impl fmt::Display for LayerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/layer/update.rs"]
mod tests;
