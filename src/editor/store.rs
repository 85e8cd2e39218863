use std::{
    collections::BTreeMap,
    sync::{
        Mutex,
        atomic::{AtomicU64, Ordering},
    },
};

use crate::{
    collage::model::{Collage, ImageRecord},
    foundation::core::{CollageId, ImageId, LayerId, UserId},
    foundation::error::{CollageError, CollageResult, lock},
};

/// Persistence collaborator for collages and image records.
///
/// Loaded collages come back with every sibling list sorted by z-index.
pub trait EntityStore: Send + Sync {
    /// Load collage `id`; unknown ids are `NotFound`.
    fn load_collage(&self, id: CollageId) -> CollageResult<Collage>;

    /// Insert or replace a collage (and with it, its whole layer tree).
    fn save_collage(&self, collage: &Collage) -> CollageResult<()>;

    /// Remove a collage and its layers; unknown ids are `NotFound`.
    fn delete_collage(&self, id: CollageId) -> CollageResult<()>;

    /// Ids of the collages owned by `owner`.
    fn collages_of(&self, owner: UserId) -> CollageResult<Vec<CollageId>>;

    /// Load image record `id`; unknown ids are `NotFound`.
    fn load_image(&self, id: ImageId) -> CollageResult<ImageRecord>;

    /// Insert or replace an image record.
    fn save_image(&self, image: &ImageRecord) -> CollageResult<()>;

    /// Remove an image record; unknown ids are `NotFound`.
    fn delete_image(&self, id: ImageId) -> CollageResult<()>;

    /// Image records owned by `owner`, in id order.
    fn images_of(&self, owner: UserId) -> CollageResult<Vec<ImageRecord>>;

    /// Collage that contains layer `id`, if any.
    fn collage_for_layer(&self, id: LayerId) -> CollageResult<Option<CollageId>>;

    /// Collages with at least one leaf drawing `image`.
    fn collages_using_image(&self, image: ImageId) -> CollageResult<Vec<CollageId>>;

    /// First leaf drawing `image` inside a collage owned by `owner`.
    fn find_layer_for_image(
        &self,
        owner: UserId,
        image: ImageId,
    ) -> CollageResult<Option<(CollageId, LayerId)>>;

    /// Allocate a fresh layer id.
    fn next_layer_id(&self) -> LayerId;

    /// Allocate a fresh collage id.
    fn next_collage_id(&self) -> CollageId;

    /// Allocate a fresh image id.
    fn next_image_id(&self) -> ImageId;
}

/// In-process [`EntityStore`], one mutex per table.
#[derive(Debug)]
pub struct MemoryEntityStore {
    collages: Mutex<BTreeMap<CollageId, Collage>>,
    images: Mutex<BTreeMap<ImageId, ImageRecord>>,
    next_layer: AtomicU64,
    next_collage: AtomicU64,
    next_image: AtomicU64,
}

impl Default for MemoryEntityStore {
    fn default() -> Self {
        Self {
            collages: Mutex::new(BTreeMap::new()),
            images: Mutex::new(BTreeMap::new()),
            next_layer: AtomicU64::new(1),
            next_collage: AtomicU64::new(1),
            next_image: AtomicU64::new(1),
        }
    }
}

impl MemoryEntityStore {
    /// Empty store; ids start at 1.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored collages.
    pub fn collage_count(&self) -> usize {
        self.collages.lock().map(|c| c.len()).unwrap_or(0)
    }

    /// Number of stored image records.
    pub fn image_count(&self) -> usize {
        self.images.lock().map(|i| i.len()).unwrap_or(0)
    }
}

impl EntityStore for MemoryEntityStore {
    fn load_collage(&self, id: CollageId) -> CollageResult<Collage> {
        let mut collage = lock(&self.collages, "collage table")?
            .get(&id)
            .cloned()
            .ok_or_else(|| CollageError::not_found(format!("{id}")))?;
        collage.normalize();
        Ok(collage)
    }

    fn save_collage(&self, collage: &Collage) -> CollageResult<()> {
        lock(&self.collages, "collage table")?.insert(collage.id, collage.clone());
        Ok(())
    }

    fn delete_collage(&self, id: CollageId) -> CollageResult<()> {
        lock(&self.collages, "collage table")?
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| CollageError::not_found(format!("{id}")))
    }

    fn collages_of(&self, owner: UserId) -> CollageResult<Vec<CollageId>> {
        Ok(lock(&self.collages, "collage table")?
            .values()
            .filter(|c| c.owner == owner)
            .map(|c| c.id)
            .collect())
    }

    fn load_image(&self, id: ImageId) -> CollageResult<ImageRecord> {
        lock(&self.images, "image table")?
            .get(&id)
            .cloned()
            .ok_or_else(|| CollageError::not_found(format!("{id}")))
    }

    fn save_image(&self, image: &ImageRecord) -> CollageResult<()> {
        lock(&self.images, "image table")?.insert(image.id, image.clone());
        Ok(())
    }

    fn delete_image(&self, id: ImageId) -> CollageResult<()> {
        lock(&self.images, "image table")?
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| CollageError::not_found(format!("{id}")))
    }

    fn images_of(&self, owner: UserId) -> CollageResult<Vec<ImageRecord>> {
        Ok(lock(&self.images, "image table")?
            .values()
            .filter(|i| i.owner == owner)
            .cloned()
            .collect())
    }

    fn collage_for_layer(&self, id: LayerId) -> CollageResult<Option<CollageId>> {
        Ok(lock(&self.collages, "collage table")?
            .values()
            .find(|c| c.contains_layer(id))
            .map(|c| c.id))
    }

    fn collages_using_image(&self, image: ImageId) -> CollageResult<Vec<CollageId>> {
        Ok(lock(&self.collages, "collage table")?
            .values()
            .filter(|c| c.uses_image(image))
            .map(|c| c.id)
            .collect())
    }

    fn find_layer_for_image(
        &self,
        owner: UserId,
        image: ImageId,
    ) -> CollageResult<Option<(CollageId, LayerId)>> {
        let collages = lock(&self.collages, "collage table")?;
        for c in collages.values().filter(|c| c.owner == owner) {
            if let Some(leaf) = c.leaf_for_image(image) {
                return Ok(Some((c.id, leaf.common.id)));
            }
        }
        Ok(None)
    }

    fn next_layer_id(&self) -> LayerId {
        LayerId(self.next_layer.fetch_add(1, Ordering::Relaxed))
    }

    fn next_collage_id(&self) -> CollageId {
        CollageId(self.next_collage.fetch_add(1, Ordering::Relaxed))
    }

    fn next_image_id(&self) -> ImageId {
        ImageId(self.next_image.fetch_add(1, Ordering::Relaxed))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/editor/store.rs"]
mod tests;
