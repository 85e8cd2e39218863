use std::collections::HashSet;

use crate::{
    assets::store::BlobHandle,
    collage::lifecycle::CollageStatus,
    foundation::core::{CanvasSize, CollageId, ImageId, LayerId, UserId},
    foundation::error::{CollageError, CollageResult},
    layer::node::{
        LayerNode, LeafLayer, find_node, find_node_mut, forest_leaves, next_z_index, remove_node,
        sort_siblings,
    },
};

/// A canvas plus the forest of top-level layers painted onto it.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Collage {
    /// Collage identity.
    pub id: CollageId,
    /// Display name.
    pub name: String,
    /// Owning user.
    pub owner: UserId,
    /// Output canvas size.
    pub canvas: CanvasSize,
    /// Top-level layers; each list is kept sorted by z-index.
    #[serde(default)]
    pub layers: Vec<LayerNode>,
    /// Lifecycle state; the only persisted part of the state machine.
    #[serde(default)]
    pub status: CollageStatus,
    /// Bumped on every persisted mutation.
    #[serde(default)]
    pub revision: u64,
}

impl Collage {
    /// Empty draft collage.
    pub fn new(id: CollageId, name: impl Into<String>, owner: UserId, canvas: CanvasSize) -> Self {
        Self {
            id,
            name: name.into(),
            owner,
            canvas,
            layers: Vec::new(),
            status: CollageStatus::Draft,
            revision: 0,
        }
    }

    /// Fails with a state error unless the collage is a draft.
    pub fn check_can_edit(&self) -> CollageResult<()> {
        self.status.check_can_edit()
    }

    /// Fails with an ownership error unless `user` owns the collage.
    pub fn check_owner(&self, user: UserId) -> CollageResult<()> {
        if self.owner != user {
            return Err(CollageError::ownership(format!(
                "{} is not owned by {user}",
                self.id
            )));
        }
        Ok(())
    }

    /// Every leaf in paint order.
    pub fn leaves(&self) -> Vec<&LeafLayer> {
        forest_leaves(&self.layers)
    }

    /// Layer `id` anywhere in the tree.
    pub fn layer(&self, id: LayerId) -> CollageResult<&LayerNode> {
        find_node(&self.layers, id)
            .ok_or_else(|| CollageError::not_found(format!("{id} in {}", self.id)))
    }

    /// Layer `id` anywhere in the tree, mutably.
    pub fn layer_mut(&mut self, id: LayerId) -> CollageResult<&mut LayerNode> {
        let collage = self.id;
        find_node_mut(&mut self.layers, id)
            .ok_or_else(|| CollageError::not_found(format!("{id} in {collage}")))
    }

    /// Whether layer `id` is part of this collage.
    pub fn contains_layer(&self, id: LayerId) -> bool {
        find_node(&self.layers, id).is_some()
    }

    /// Z-index for a new top-level layer.
    pub fn next_z_index(&self) -> i32 {
        next_z_index(&self.layers)
    }

    /// Append a top-level layer above every existing one.
    ///
    /// The node's z-index and collage back-reference are overwritten.
    pub fn push_layer(&mut self, mut node: LayerNode) -> LayerId {
        node.common_mut().z_index = self.next_z_index();
        node.set_collage(self.id);
        let id = node.id();
        self.layers.push(node);
        id
    }

    /// Detach layer `id` and its subtree.
    pub fn remove_layer(&mut self, id: LayerId) -> CollageResult<LayerNode> {
        remove_node(&mut self.layers, id)
            .ok_or_else(|| CollageError::not_found(format!("{id} in {}", self.id)))
    }

    /// Whether any leaf draws `image`.
    pub fn uses_image(&self, image: ImageId) -> bool {
        self.leaves().iter().any(|l| l.source.image == image)
    }

    /// First leaf (in paint order) that draws `image`.
    pub fn leaf_for_image(&self, image: ImageId) -> Option<&LeafLayer> {
        self.leaves().into_iter().find(|l| l.source.image == image)
    }

    /// Ids of every node, depth first.
    pub fn layer_ids(&self) -> Vec<LayerId> {
        fn walk(nodes: &[LayerNode], out: &mut Vec<LayerId>) {
            for n in nodes {
                out.push(n.id());
                if let LayerNode::Group(g) = n {
                    walk(&g.children, out);
                }
            }
        }
        let mut out = Vec::new();
        walk(&self.layers, &mut out);
        out
    }

    /// Sort every sibling list by z-index and repair collage back-references.
    pub fn normalize(&mut self) {
        sort_siblings(&mut self.layers);
        for node in &mut self.layers {
            node.set_collage(self.id);
        }
    }

    /// Record a persisted mutation.
    pub fn touch(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }

    /// Structural checks for collages coming from outside the editor.
    pub fn validate(&self) -> CollageResult<()> {
        if self.canvas.width == 0 || self.canvas.height == 0 {
            return Err(CollageError::validation(format!(
                "{} has an empty canvas {}x{}",
                self.id, self.canvas.width, self.canvas.height
            )));
        }
        let mut seen = HashSet::new();
        validate_siblings(self.id, &self.layers, &mut seen)
    }
}

fn validate_siblings(
    collage: CollageId,
    siblings: &[LayerNode],
    seen: &mut HashSet<LayerId>,
) -> CollageResult<()> {
    let mut z_seen = HashSet::new();
    for node in siblings {
        let id = node.id();
        if !seen.insert(id) {
            return Err(CollageError::validation(format!("duplicate layer id {id}")));
        }
        if !z_seen.insert(node.z_index()) {
            return Err(CollageError::validation(format!(
                "{id} repeats sibling z-index {}",
                node.z_index()
            )));
        }
        if node.common().collage != collage {
            return Err(CollageError::validation(format!(
                "{id} belongs to {}, not {collage}",
                node.common().collage
            )));
        }
        match node {
            LayerNode::Leaf(l) => {
                if l.width == 0 || l.height == 0 {
                    return Err(CollageError::validation(format!(
                        "{id} has an empty target size {}x{}",
                        l.width, l.height
                    )));
                }
            }
            LayerNode::Group(g) => validate_siblings(collage, &g.children, seen)?,
        }
    }
    Ok(())
}

/// A stored image: an uploaded source or a rendered collage.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ImageRecord {
    /// Image identity.
    pub id: ImageId,
    /// Owning user.
    pub owner: UserId,
    /// Encoded bytes in the blob store.
    pub blob: BlobHandle,
    /// Pixel width of the decoded image.
    pub width: u32,
    /// Pixel height of the decoded image.
    pub height: u32,
    /// Lower-case file format, e.g. `png`.
    pub format: String,
    /// Optional user-facing title.
    #[serde(default)]
    pub title: Option<String>,
}

impl ImageRecord {
    /// Fails with an ownership error unless `user` owns the image.
    pub fn check_owner(&self, user: UserId) -> CollageResult<()> {
        if self.owner != user {
            return Err(CollageError::ownership(format!(
                "{} is not owned by {user}",
                self.id
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/collage/model.rs"]
mod tests;
