//! Editing entry points.
//!
//! Every collage-scoped operation runs under that collage's history lock:
//! ownership and lifecycle are checked, history is captured, the tree is
//! mutated and the result persisted without another request on the same
//! collage interleaving. Renders take a snapshot under the lock and release
//! it before any pixel work.

use std::collections::BTreeMap;

use crate::{
    assets::decode::decode_image,
    assets::encode::encode_png,
    assets::store::BlobStore,
    collage::lifecycle::CollageStatus,
    collage::model::{Collage, ImageRecord},
    editor::store::EntityStore,
    foundation::core::{CanvasSize, CollageId, ImageId, LayerId, UserId},
    foundation::error::{CollageError, CollageResult, lock},
    history::manager::{CollageHistory, HistoryManager, HistorySlot, HistoryStep},
    layer::node::{LayerCommon, LayerGroup, LayerNode, LeafFailure, LeafLayer, SourceImage},
    layer::node::{next_z_index, siblings_of_mut},
    layer::update::{LayerAction, LayerUpdate},
    render::compositor::{CancelFlag, Compositor, CompositorOpts},
    render::raster::Raster,
};

/// Image formats accepted by [`CollageEditor::register_image`].
pub const ALLOWED_IMAGE_FORMATS: [&str; 5] = ["jpg", "jpeg", "png", "gif", "bmp"];

/// The authenticated user on whose behalf an operation runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Actor {
    /// Acting user.
    pub user: UserId,
}

impl Actor {
    /// Actor for `user`.
    pub const fn new(user: UserId) -> Self {
        Self { user }
    }
}

/// Editor configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EditorOpts {
    /// Compositor used by renders and previews.
    pub compositor: CompositorOpts,
    /// Cap on each undo/redo stack; `None` keeps every step.
    pub history_depth: Option<usize>,
}

/// A stored render and the leaves that were left out of it.
#[derive(Debug)]
pub struct RenderedCollage {
    /// Record of the stored PNG.
    pub image: ImageRecord,
    /// Leaves skipped during compositing.
    pub skipped: Vec<LeafFailure>,
}

/// Which checks run before a locked collage operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Gate {
    /// Owner only (lifecycle transitions, deletion).
    Owner,
    /// Owner and `Draft` status (every tree mutation).
    Edit,
}

/// Orchestrates collages, history and rendering over the two stores.
pub struct CollageEditor<B, E> {
    blobs: B,
    entities: E,
    history: HistoryManager,
    compositor: Compositor,
}

impl<B: BlobStore, E: EntityStore> CollageEditor<B, E> {
    /// Build an editor; fails if the compositor's thread pool cannot be built.
    pub fn new(blobs: B, entities: E, opts: EditorOpts) -> CollageResult<Self> {
        Ok(Self {
            blobs,
            entities,
            history: HistoryManager::new(opts.history_depth),
            compositor: Compositor::new(opts.compositor)?,
        })
    }

    /// Blob store collaborator.
    pub fn blobs(&self) -> &B {
        &self.blobs
    }

    /// Entity store collaborator.
    pub fn entities(&self) -> &E {
        &self.entities
    }

    /// Shared history registry.
    pub fn history(&self) -> &HistoryManager {
        &self.history
    }

    /// Validate, decode and store an uploaded image.
    #[tracing::instrument(skip(self, bytes), fields(len = bytes.len()))]
    pub fn register_image(
        &self,
        actor: Actor,
        bytes: &[u8],
        format: &str,
    ) -> CollageResult<ImageRecord> {
        let format = format.trim().trim_start_matches('.').to_ascii_lowercase();
        if !ALLOWED_IMAGE_FORMATS.contains(&format.as_str()) {
            return Err(CollageError::validation(format!(
                "image format '{format}' is not one of {ALLOWED_IMAGE_FORMATS:?}"
            )));
        }
        if bytes.is_empty() {
            return Err(CollageError::validation("cannot store an empty image"));
        }
        let raster = decode_image(bytes)?;
        let blob = self.blobs.store(bytes)?;
        let record = ImageRecord {
            id: self.entities.next_image_id(),
            owner: actor.user,
            blob,
            width: raster.width,
            height: raster.height,
            format,
            title: None,
        };
        self.entities.save_image(&record)?;
        tracing::debug!(image = %record.id, "image registered");
        Ok(record)
    }

    /// Load an image record owned by `actor`.
    pub fn image(&self, actor: Actor, image_id: ImageId) -> CollageResult<ImageRecord> {
        let image = self.entities.load_image(image_id)?;
        image.check_owner(actor.user)?;
        Ok(image)
    }

    /// Image records owned by `actor`.
    pub fn images(&self, actor: Actor) -> CollageResult<Vec<ImageRecord>> {
        self.entities.images_of(actor.user)
    }

    /// Set the title of an image.
    pub fn rename_image(
        &self,
        actor: Actor,
        image_id: ImageId,
        title: impl Into<String>,
    ) -> CollageResult<ImageRecord> {
        let mut image = self.image(actor, image_id)?;
        image.title = Some(title.into());
        self.entities.save_image(&image)?;
        Ok(image)
    }

    /// Delete an image, every collage that draws it, and its bytes.
    #[tracing::instrument(skip(self))]
    pub fn delete_image(&self, actor: Actor, image_id: ImageId) -> CollageResult<()> {
        let image = self.image(actor, image_id)?;
        for collage_id in self.entities.collages_using_image(image_id)? {
            let slot = self.history.slot(collage_id)?;
            let guard = lock(&slot, "collage history")?;
            match self.entities.delete_collage(collage_id) {
                Ok(()) | Err(CollageError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
            drop(guard);
            self.history.forget(collage_id)?;
            tracing::debug!(collage = %collage_id, "cascade-deleted collage");
        }
        self.blobs.delete(&image.blob)?;
        self.entities.delete_image(image_id)
    }

    /// Create an empty draft collage.
    #[tracing::instrument(skip(self, name))]
    pub fn create_collage(
        &self,
        actor: Actor,
        name: impl Into<String>,
        canvas: CanvasSize,
    ) -> CollageResult<Collage> {
        let canvas = CanvasSize::new(canvas.width, canvas.height)?;
        let collage = Collage::new(self.entities.next_collage_id(), name, actor.user, canvas);
        self.entities.save_collage(&collage)?;
        Ok(collage)
    }

    /// Load a collage owned by `actor`.
    pub fn collage(&self, actor: Actor, collage_id: CollageId) -> CollageResult<Collage> {
        let collage = self.entities.load_collage(collage_id)?;
        collage.check_owner(actor.user)?;
        Ok(collage)
    }

    /// Ids of the collages owned by `actor`.
    pub fn collages(&self, actor: Actor) -> CollageResult<Vec<CollageId>> {
        self.entities.collages_of(actor.user)
    }

    /// The layer to edit for `image_id`: the first leaf drawing it in one of
    /// the actor's collages, or a new single-layer collage sized to the image.
    #[tracing::instrument(skip(self))]
    pub fn open_editor_for_image(
        &self,
        actor: Actor,
        image_id: ImageId,
    ) -> CollageResult<(CollageId, LayerId)> {
        let image = self.image(actor, image_id)?;
        if let Some(found) = self.entities.find_layer_for_image(actor.user, image_id)? {
            return Ok(found);
        }
        let collage = self.create_collage(
            actor,
            format!("Collage_for_image_{}", image_id.0),
            CanvasSize::new(image.width, image.height)?,
        )?;
        let layer = self.add_image_layer(actor, collage.id, image_id)?;
        Ok((collage.id, layer))
    }

    /// Delete a collage with its layers and history, whatever its status.
    #[tracing::instrument(skip(self))]
    pub fn delete_collage(&self, actor: Actor, collage_id: CollageId) -> CollageResult<()> {
        let slot = self.slot_of(collage_id)?;
        {
            let _guard = lock(&slot, "collage history")?;
            let collage = self
                .entities
                .load_collage(collage_id)
                .map_err(|e| self.vanished(collage_id, &slot, e))?;
            collage.check_owner(actor.user)?;
            self.entities.delete_collage(collage_id)?;
        }
        self.history.forget(collage_id)
    }

    /// `Draft -> Published`; a no-op when already published.
    pub fn publish(&self, actor: Actor, collage_id: CollageId) -> CollageResult<CollageStatus> {
        self.transition(actor, collage_id, CollageStatus::publish)
    }

    /// `Draft | Published -> Archived`; a no-op when already archived.
    pub fn archive(&self, actor: Actor, collage_id: CollageId) -> CollageResult<CollageStatus> {
        self.transition(actor, collage_id, CollageStatus::archive)
    }

    /// `Archived -> Draft`.
    pub fn restore(&self, actor: Actor, collage_id: CollageId) -> CollageResult<CollageStatus> {
        self.transition(actor, collage_id, CollageStatus::restore)
    }

    fn transition(
        &self,
        actor: Actor,
        collage_id: CollageId,
        step: fn(CollageStatus) -> CollageResult<CollageStatus>,
    ) -> CollageResult<CollageStatus> {
        self.locked(actor, collage_id, Gate::Owner, |collage, _| {
            let next = step(collage.status)?;
            let changed = next != collage.status;
            if changed {
                tracing::debug!(
                    collage = %collage.id,
                    from = %collage.status,
                    to = %next,
                    "status changed"
                );
            }
            collage.status = next;
            Ok((next, changed))
        })
    }

    /// Add a leaf drawing `image_id` at the origin, on top of every layer.
    #[tracing::instrument(skip(self))]
    pub fn add_image_layer(
        &self,
        actor: Actor,
        collage_id: CollageId,
        image_id: ImageId,
    ) -> CollageResult<LayerId> {
        self.locked(actor, collage_id, Gate::Edit, |collage, _| {
            let image = self.entities.load_image(image_id)?;
            image.check_owner(actor.user)?;
            let leaf = LeafLayer::new(
                LayerCommon::new(self.entities.next_layer_id(), collage.id, 0),
                SourceImage {
                    image: image.id,
                    blob: image.blob,
                },
                image.width,
                image.height,
            );
            Ok((collage.push_layer(LayerNode::Leaf(leaf)), true))
        })
    }

    /// Move top-level layers into a new group placed above every layer.
    ///
    /// Members keep their z-indices and therefore their relative order.
    #[tracing::instrument(skip(self))]
    pub fn group_layers(
        &self,
        actor: Actor,
        collage_id: CollageId,
        layer_ids: &[LayerId],
    ) -> CollageResult<LayerId> {
        self.locked(actor, collage_id, Gate::Edit, |collage, _| {
            if layer_ids.is_empty() {
                return Err(CollageError::validation("cannot group zero layers"));
            }
            for (i, id) in layer_ids.iter().enumerate() {
                if layer_ids[..i].contains(id) {
                    return Err(CollageError::validation(format!("{id} listed twice")));
                }
                if !collage.layers.iter().any(|n| n.id() == *id) {
                    collage.layer(*id)?;
                    return Err(CollageError::validation(format!(
                        "{id} is not a top-level layer"
                    )));
                }
            }
            let z_index = collage.next_z_index();
            let (children, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut collage.layers)
                .into_iter()
                .partition(|n| layer_ids.contains(&n.id()));
            collage.layers = rest;
            let group_id = self.entities.next_layer_id();
            collage.layers.push(LayerNode::Group(LayerGroup {
                common: LayerCommon::new(group_id, collage.id, z_index),
                children,
            }));
            Ok((group_id, true))
        })
    }

    /// Partial update of a leaf, or of every leaf of a group, as one undo step.
    #[tracing::instrument(skip(self))]
    pub fn update_layer(
        &self,
        actor: Actor,
        layer_id: LayerId,
        update: &LayerUpdate,
    ) -> CollageResult<LayerNode> {
        let collage_id = self.collage_of(layer_id)?;
        self.locked(actor, collage_id, Gate::Edit, |collage, history| {
            update.validate()?;
            let node = collage.layer(layer_id)?;
            history.capture(HistoryStep::capture("update", node));
            let node = collage.layer_mut(layer_id)?;
            node.apply_update(update)?;
            Ok((node.clone(), true))
        })
    }

    /// Rotate by a quarter turn or delete; returns the node unless deleted.
    #[tracing::instrument(skip(self))]
    pub fn layer_action(
        &self,
        actor: Actor,
        layer_id: LayerId,
        action: LayerAction,
    ) -> CollageResult<Option<LayerNode>> {
        let collage_id = self.collage_of(layer_id)?;
        self.locked(actor, collage_id, Gate::Edit, |collage, history| {
            let node = collage.layer(layer_id)?;
            history.capture(HistoryStep::capture(action.as_str(), node));
            match action.rotation_delta() {
                Some(delta) => {
                    let node = collage.layer_mut(layer_id)?;
                    node.rotate_by(delta);
                    Ok((Some(node.clone()), true))
                }
                None => {
                    collage.remove_layer(layer_id)?;
                    Ok((None, true))
                }
            }
        })
    }

    /// Prototype-clone a layer next to the original, on top of its siblings.
    ///
    /// Creating the copy is not an undoable step.
    #[tracing::instrument(skip(self))]
    pub fn duplicate_layer(&self, actor: Actor, layer_id: LayerId) -> CollageResult<LayerId> {
        let collage_id = self.collage_of(layer_id)?;
        self.locked(actor, collage_id, Gate::Edit, |collage, _| {
            let collage_ref = collage.id;
            let siblings = siblings_of_mut(&mut collage.layers, layer_id).ok_or_else(|| {
                CollageError::not_found(format!("{layer_id} in {collage_ref}"))
            })?;
            let z_index = next_z_index(siblings);
            let copy = siblings
                .iter()
                .find(|n| n.id() == layer_id)
                .map(|n| n.duplicate(z_index, &mut || self.entities.next_layer_id()))
                .ok_or_else(|| CollageError::not_found(format!("{layer_id}")))?;
            let id = copy.id();
            siblings.push(copy);
            Ok((id, true))
        })
    }

    /// Set effect parameter `key` on a leaf, or on every leaf of a group.
    ///
    /// Effect parameters are not part of the undo history.
    #[tracing::instrument(skip(self, value))]
    pub fn set_layer_effect(
        &self,
        actor: Actor,
        layer_id: LayerId,
        key: &str,
        value: serde_json::Value,
    ) -> CollageResult<LayerNode> {
        let key = key.trim();
        if key.is_empty() {
            return Err(CollageError::validation("effect name must not be empty"));
        }
        let collage_id = self.collage_of(layer_id)?;
        self.locked(actor, collage_id, Gate::Edit, |collage, _| {
            let node = collage.layer_mut(layer_id)?;
            for leaf in node.leaves_mut() {
                leaf.effects.insert(key.to_string(), value.clone());
            }
            Ok((node.clone(), true))
        })
    }

    /// Remove effect parameter `key`; `Ok(false)` when no leaf carried it.
    #[tracing::instrument(skip(self))]
    pub fn remove_layer_effect(
        &self,
        actor: Actor,
        layer_id: LayerId,
        key: &str,
    ) -> CollageResult<bool> {
        let collage_id = self.collage_of(layer_id)?;
        self.locked(actor, collage_id, Gate::Edit, |collage, _| {
            let node = collage.layer_mut(layer_id)?;
            let mut removed = false;
            for leaf in node.leaves_mut() {
                removed |= leaf.effects.remove(key.trim()).is_some();
            }
            Ok((removed, removed))
        })
    }

    /// Effect parameters of a leaf.
    pub fn layer_effects(
        &self,
        actor: Actor,
        layer_id: LayerId,
    ) -> CollageResult<BTreeMap<String, serde_json::Value>> {
        let collage_id = self.collage_of(layer_id)?;
        let snapshot = self.snapshot(actor, collage_id)?;
        match snapshot.layer(layer_id)? {
            LayerNode::Leaf(leaf) => Ok(leaf.effects.clone()),
            LayerNode::Group(_) => Err(CollageError::UnsupportedForGroup(layer_id)),
        }
    }

    /// Revert the latest step; `Ok(false)` when there is nothing to undo.
    #[tracing::instrument(skip(self))]
    pub fn undo(&self, actor: Actor, collage_id: CollageId) -> CollageResult<bool> {
        self.locked(actor, collage_id, Gate::Edit, |collage, history| {
            let changed = history.undo(collage)?;
            Ok((changed, changed))
        })
    }

    /// Re-apply the latest undone step; `Ok(false)` when there is nothing to redo.
    #[tracing::instrument(skip(self))]
    pub fn redo(&self, actor: Actor, collage_id: CollageId) -> CollageResult<bool> {
        self.locked(actor, collage_id, Gate::Edit, |collage, history| {
            let changed = history.redo(collage)?;
            Ok((changed, changed))
        })
    }

    /// Whether an undo step is available.
    pub fn can_undo(&self, collage_id: CollageId) -> CollageResult<bool> {
        match self.history.get(collage_id)? {
            Some(slot) => Ok(lock(&slot, "collage history")?.can_undo()),
            None => Ok(false),
        }
    }

    /// Whether a redo step is available.
    pub fn can_redo(&self, collage_id: CollageId) -> CollageResult<bool> {
        match self.history.get(collage_id)? {
            Some(slot) => Ok(lock(&slot, "collage history")?.can_redo()),
            None => Ok(false),
        }
    }

    /// Flatten a collage, store it as PNG and record it as a new image of `actor`.
    ///
    /// Nothing is stored when the render fails or is cancelled.
    #[tracing::instrument(skip(self, cancel))]
    pub fn render_collage(
        &self,
        actor: Actor,
        collage_id: CollageId,
        cancel: &CancelFlag,
    ) -> CollageResult<RenderedCollage> {
        let snapshot = self.snapshot(actor, collage_id)?;
        let outcome = self
            .compositor
            .render_collage(&snapshot, &self.blobs, cancel)?;
        let png = encode_png(&outcome.raster)?;
        if cancel.is_cancelled() {
            return Err(CollageError::Cancelled);
        }
        let blob = self.blobs.store(&png)?;
        let image = ImageRecord {
            id: self.entities.next_image_id(),
            owner: actor.user,
            blob,
            width: outcome.raster.width,
            height: outcome.raster.height,
            format: "png".to_string(),
            title: Some(snapshot.name.clone()),
        };
        self.entities.save_image(&image)?;
        tracing::info!(
            collage = %collage_id,
            image = %image.id,
            skipped = outcome.skipped.len(),
            "collage rendered"
        );
        Ok(RenderedCollage {
            image,
            skipped: outcome.skipped,
        })
    }

    /// Transform a single leaf; decode and geometry errors abort.
    #[tracing::instrument(skip(self))]
    pub fn preview_layer(&self, actor: Actor, layer_id: LayerId) -> CollageResult<Raster> {
        let collage_id = self.collage_of(layer_id)?;
        let snapshot = self.snapshot(actor, collage_id)?;
        match snapshot.layer(layer_id)? {
            LayerNode::Leaf(leaf) => self.compositor.preview_leaf(leaf, &self.blobs),
            LayerNode::Group(_) => Err(CollageError::UnsupportedForGroup(layer_id)),
        }
    }

    fn collage_of(&self, layer_id: LayerId) -> CollageResult<CollageId> {
        self.entities
            .collage_for_layer(layer_id)?
            .ok_or_else(|| CollageError::not_found(format!("{layer_id}")))
    }

    /// Owned copy of a collage taken under its lock.
    fn snapshot(&self, actor: Actor, collage_id: CollageId) -> CollageResult<Collage> {
        let slot = self.slot_of(collage_id)?;
        let _guard = lock(&slot, "collage history")?;
        let collage = self
            .entities
            .load_collage(collage_id)
            .map_err(|e| self.vanished(collage_id, &slot, e))?;
        collage.check_owner(actor.user)?;
        Ok(collage)
    }

    /// History slot of a collage that exists; unknown ids register nothing.
    fn slot_of(&self, collage_id: CollageId) -> CollageResult<HistorySlot> {
        if let Some(slot) = self.history.get(collage_id)? {
            return Ok(slot);
        }
        self.entities.load_collage(collage_id)?;
        self.history.slot(collage_id)
    }

    /// Drop the slot of a collage deleted while we waited for its lock.
    fn vanished(&self, collage_id: CollageId, slot: &HistorySlot, e: CollageError) -> CollageError {
        if matches!(e, CollageError::NotFound(_))
            && let Err(forget) = self.history.forget_slot(collage_id, slot)
        {
            return forget;
        }
        e
    }

    /// Run `f` on a collage while holding its history lock.
    ///
    /// Every check happens before `f` runs. `f` returns its value and whether
    /// the collage changed; changed collages get a new revision and are saved.
    /// When saving fails the history is put back as it was before `f`.
    fn locked<T>(
        &self,
        actor: Actor,
        collage_id: CollageId,
        gate: Gate,
        f: impl FnOnce(&mut Collage, &mut CollageHistory) -> CollageResult<(T, bool)>,
    ) -> CollageResult<T> {
        let slot = self.slot_of(collage_id)?;
        let mut history = lock(&slot, "collage history")?;
        let mut collage = self
            .entities
            .load_collage(collage_id)
            .map_err(|e| self.vanished(collage_id, &slot, e))?;
        collage.check_owner(actor.user)?;
        if gate == Gate::Edit {
            collage.check_can_edit()?;
        }
        let checkpoint = history.clone();
        let (out, changed) = f(&mut collage, &mut *history)?;
        if changed {
            collage.touch();
            if let Err(e) = self.entities.save_collage(&collage) {
                *history = checkpoint;
                return Err(e);
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/editor/service.rs"]
mod tests;
