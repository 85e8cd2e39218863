use std::fmt;

use crate::foundation::error::{CollageError, CollageResult};

/// Lifecycle state of a collage.
///
/// ```text
/// Draft --publish--> Published
/// Draft | Published --archive--> Archived
/// Archived --restore--> Draft
/// ```
///
/// Only `Draft` permits edits.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CollageStatus {
    /// Editable working copy (initial state).
    #[default]
    Draft,
    /// Frozen for viewing.
    Published,
    /// Hidden; must be restored before any edit.
    Archived,
}

impl CollageStatus {
    /// Stored name of the status.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::Published => "PUBLISHED",
            Self::Archived => "ARCHIVED",
        }
    }

    /// Fails with a state error unless edits are allowed.
    pub fn check_can_edit(self) -> CollageResult<()> {
        match self {
            Self::Draft => Ok(()),
            Self::Published => Err(CollageError::state(
                "cannot edit a PUBLISHED collage; archive and restore it first",
            )),
            Self::Archived => Err(CollageError::state(
                "cannot edit an ARCHIVED collage; restore it first",
            )),
        }
    }

    /// Whether edits are allowed.
    pub fn can_edit(self) -> bool {
        self.check_can_edit().is_ok()
    }

    /// State after `publish`. Publishing a published collage is a no-op.
    pub fn publish(self) -> CollageResult<Self> {
        match self {
            Self::Draft | Self::Published => Ok(Self::Published),
            Self::Archived => Err(CollageError::state(
                "cannot publish an ARCHIVED collage; restore it first",
            )),
        }
    }

    /// State after `archive`. Archiving an archived collage is a no-op.
    pub fn archive(self) -> CollageResult<Self> {
        Ok(Self::Archived)
    }

    /// State after `restore`; only legal from `Archived`.
    pub fn restore(self) -> CollageResult<Self> {
        match self {
            Self::Archived => Ok(Self::Draft),
            other => Err(CollageError::state(format!(
                "cannot restore a {} collage",
                other.as_str()
            ))),
        }
    }
}

impl fmt::Display for CollageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/collage/lifecycle.rs"]
mod tests;
