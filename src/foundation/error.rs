use std::sync::{Mutex, MutexGuard};

use crate::foundation::core::LayerId;

/// Convenience result type used across the crate.
pub type CollageResult<T> = Result<T, CollageError>;

/// Top-level error taxonomy used by engine APIs.
#[derive(thiserror::Error, Debug)]
pub enum CollageError {
    /// A referenced collage, layer or image does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Illegal lifecycle transition, or an edit outside the Draft state.
    #[error("state error: {0}")]
    State(String),

    /// Invalid crop or scale geometry.
    #[error("geometry error: {0}")]
    Geometry(String),

    /// Source bytes could not be decoded into a raster.
    #[error("decode error: {0}")]
    Decode(String),

    /// Memento operations are only defined for leaf layers.
    #[error("operation not supported for layer group {0}")]
    UnsupportedForGroup(LayerId),

    /// The acting user does not own the referenced resource.
    #[error("ownership error: {0}")]
    Ownership(String),

    /// Malformed caller input.
    #[error("validation error: {0}")]
    Validation(String),

    /// Errors when serializing or deserializing data structures.
    #[error("serialization error: {0}")]
    Serde(String),

    /// A render was abandoned through its cancel flag.
    #[error("render cancelled")]
    Cancelled,

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Payload-free discriminant of [`CollageError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`CollageError::NotFound`].
    NotFound,
    /// See [`CollageError::State`].
    State,
    /// See [`CollageError::Geometry`].
    Geometry,
    /// See [`CollageError::Decode`].
    Decode,
    /// See [`CollageError::UnsupportedForGroup`].
    UnsupportedForGroup,
    /// See [`CollageError::Ownership`].
    Ownership,
    /// See [`CollageError::Validation`].
    Validation,
    /// See [`CollageError::Serde`].
    Serde,
    /// See [`CollageError::Cancelled`].
    Cancelled,
    /// See [`CollageError::Other`].
    Other,
}

impl CollageError {
    /// Build a [`CollageError::NotFound`] value.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Build a [`CollageError::State`] value.
    pub fn state(msg: impl Into<String>) -> Self {
        Self::State(msg.into())
    }

    /// Build a [`CollageError::Geometry`] value.
    pub fn geometry(msg: impl Into<String>) -> Self {
        Self::Geometry(msg.into())
    }

    /// Build a [`CollageError::Decode`] value.
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Build a [`CollageError::Ownership`] value.
    pub fn ownership(msg: impl Into<String>) -> Self {
        Self::Ownership(msg.into())
    }

    /// Build a [`CollageError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`CollageError::Serde`] value.
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }

    /// Discriminant of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::State(_) => ErrorKind::State,
            Self::Geometry(_) => ErrorKind::Geometry,
            Self::Decode(_) => ErrorKind::Decode,
            Self::UnsupportedForGroup(_) => ErrorKind::UnsupportedForGroup,
            Self::Ownership(_) => ErrorKind::Ownership,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Serde(_) => ErrorKind::Serde,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Other(_) => ErrorKind::Other,
        }
    }

    /// Per-leaf render failures are skipped by the compositor instead of aborting.
    pub fn is_leaf_local(&self) -> bool {
        matches!(self.kind(), ErrorKind::Decode | ErrorKind::Geometry)
    }
}

/// Lock `m`, mapping a poisoned lock to [`CollageError::Other`].
pub fn lock<'a, T>(m: &'a Mutex<T>, what: &str) -> CollageResult<MutexGuard<'a, T>> {
    m.lock()
        .map_err(|_| CollageError::Other(anyhow::anyhow!("{what} lock poisoned")))
}

impl From<serde_json::Error> for CollageError {
    fn from(e: serde_json::Error) -> Self {
        Self::serde(e.to_string())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
