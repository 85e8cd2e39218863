//! Collage editing engine: layered image composition with undo/redo.
//!
//! A [`Collage`] owns a canvas and a forest of [`LayerNode`]s. Leaves draw one
//! source image through a fixed crop → scale → rotate pipeline
//! ([`TransformEngine`]); groups own child layers and forward updates to every
//! descendant leaf.
//!
//! # Pipeline overview
//!
//! 1. **Edit**: [`CollageEditor`] checks ownership and the lifecycle state,
//!    captures a history step, mutates the tree and persists it through an
//!    [`EntityStore`].
//! 2. **Transform**: each leaf's source bytes are read from a [`BlobStore`],
//!    decoded and transformed into a premultiplied [`Raster`].
//! 3. **Composite**: the [`Compositor`] paints transformed leaves in ascending
//!    z-order onto the canvas; leaves that fail are skipped and reported.
//! 4. **Publish**: rendered canvases are encoded as PNG and stored as new
//!    [`ImageRecord`]s.
//!
//! Design constraints:
//!
//! - **No unsafe**: `unsafe` is forbidden in this crate.
//! - **Deterministic renders**: the same collage always yields the same pixels,
//!   whether leaves are transformed in parallel or not.
//! - **No IO in the core**: bytes enter and leave through [`BlobStore`] and
//!   records through [`EntityStore`].
//! - **Premultiplied RGBA8** end-to-end; PNG output carries straight alpha.
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod assets;
mod collage;
mod editor;
mod foundation;
mod history;
mod layer;
mod render;

/// Per-layer raster transformation (crop, scale, rotate).
pub mod transform;

pub use assets::decode::{decode_image, probe_dimensions};
pub use assets::encode::encode_png;
pub use assets::store::{BlobHandle, BlobStore, DirBlobStore, MemoryBlobStore, sha256_hex};
pub use collage::lifecycle::CollageStatus;
pub use collage::model::{Collage, ImageRecord};
pub use editor::service::{
    ALLOWED_IMAGE_FORMATS, Actor, CollageEditor, EditorOpts, RenderedCollage,
};
pub use editor::store::{EntityStore, MemoryEntityStore};
pub use foundation::core::{CanvasSize, CollageId, CropRect, ImageId, LayerId, Position, UserId};
pub use foundation::error::{CollageError, CollageResult, ErrorKind};
pub use history::manager::{CollageHistory, HistoryManager, HistorySlot, HistoryStep};
pub use layer::memento::Memento;
pub use layer::node::{
    LayerCommon, LayerGroup, LayerNode, LeafFailure, LeafLayer, SourceImage, find_node,
    forest_leaves, next_z_index, paint_order,
};
pub use layer::update::{LayerAction, LayerUpdate, ROTATION_STEP_DEG};
pub use render::composite::{over, paint_at};
pub use render::compositor::{CancelFlag, Compositor, CompositorOpts, RenderOutcome};
pub use render::raster::{EdgeMode, MAX_RASTER_DIM, PremulRgba8, Raster};
pub use transform::{TransformEngine, TransformParams};
