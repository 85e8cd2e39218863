use std::collections::BTreeMap;

use crate::{
    assets::store::{BlobHandle, BlobStore},
    foundation::core::{CollageId, CropRect, ImageId, LayerId, Position},
    foundation::error::{CollageError, CollageResult},
    layer::memento::Memento,
    layer::update::LayerUpdate,
    render::composite::paint_at,
    render::raster::Raster,
    transform::{TransformEngine, TransformParams},
};

/// Fields shared by leaves and groups.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LayerCommon {
    /// Layer identity.
    pub id: LayerId,
    /// Top-left placement on the canvas.
    #[serde(default)]
    pub position: Position,
    /// Signed rotation in degrees; only reduced modulo 360 when rendering.
    #[serde(default)]
    pub rotation_deg: f64,
    /// Paint order among siblings (ascending).
    pub z_index: i32,
    /// Owning collage (back-reference by id, never an owning pointer).
    pub collage: CollageId,
}

/// Reference to an externally stored source image.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SourceImage {
    /// Image record id.
    pub image: ImageId,
    /// Bytes behind the image.
    pub blob: BlobHandle,
}

/// A layer that draws one source image.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LeafLayer {
    /// Shared layer fields.
    pub common: LayerCommon,
    /// Source image drawn by this layer.
    pub source: SourceImage,
    /// Target render width (may differ from the source width).
    pub width: u32,
    /// Target render height.
    pub height: u32,
    /// Optional crop applied before scaling.
    #[serde(default)]
    pub crop: Option<CropRect>,
    /// Opaque effect parameters carried for an effects collaborator.
    #[serde(default)]
    pub effects: BTreeMap<String, serde_json::Value>,
}

/// A layer that owns an ordered list of child layers.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LayerGroup {
    /// Shared layer fields.
    pub common: LayerCommon,
    /// Children, each owned by this group only.
    #[serde(default)]
    pub children: Vec<LayerNode>,
}

/// Layer tree node: either a leaf image or a group of nodes.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LayerNode {
    /// Image layer.
    Leaf(LeafLayer),
    /// Group layer.
    Group(LayerGroup),
}

/// A leaf that could not be rendered, with the reason.
#[derive(Debug)]
pub struct LeafFailure {
    /// The skipped leaf.
    pub layer: LayerId,
    /// Why it was skipped.
    pub error: CollageError,
}

impl LayerCommon {
    /// Common fields at the origin, unrotated.
    pub fn new(id: LayerId, collage: CollageId, z_index: i32) -> Self {
        Self {
            id,
            position: Position::default(),
            rotation_deg: 0.0,
            z_index,
            collage,
        }
    }
}

impl LeafLayer {
    /// Uncropped, unrotated leaf at the origin.
    pub fn new(common: LayerCommon, source: SourceImage, width: u32, height: u32) -> Self {
        Self {
            common,
            source,
            width,
            height,
            crop: None,
            effects: BTreeMap::new(),
        }
    }

    /// Transform parameters stored on this leaf.
    pub fn params(&self) -> TransformParams {
        TransformParams {
            crop: self.crop,
            width: self.width,
            height: self.height,
            rotation_deg: self.common.rotation_deg,
        }
    }

    /// Read the source bytes and run the transform pipeline.
    ///
    /// A source blob that cannot be read counts as an undecodable source.
    pub fn transformed(&self, blobs: &dyn BlobStore) -> CollageResult<Raster> {
        let bytes = blobs.read(&self.source.blob).map_err(|e| {
            CollageError::decode(format!(
                "source '{}' of {} is unreadable: {e}",
                self.source.blob, self.common.id
            ))
        })?;
        TransformEngine::apply_bytes(&bytes, &self.params())
    }

    /// Overwrite only the fields present in `update`.
    fn apply_update_unchecked(&mut self, update: &LayerUpdate) {
        if let Some(w) = update.width {
            self.width = w;
        }
        if let Some(h) = update.height {
            self.height = h;
        }
        if let Some(deg) = update.rotation_angle {
            self.common.rotation_deg = deg;
        }
        if let Some(x) = update.x {
            self.common.position.x = x;
        }
        if let Some(y) = update.y {
            self.common.position.y = y;
        }
        self.crop = update.merged_crop(self.crop);
    }

    /// Snapshot the transform fields.
    pub fn create_memento(&self) -> Memento {
        Memento {
            layer_id: self.common.id,
            position: self.common.position,
            width: self.width,
            height: self.height,
            rotation_deg: self.common.rotation_deg,
            crop: self.crop,
        }
    }

    /// Restore the transform fields from a snapshot of this same leaf.
    pub fn restore_from_memento(&mut self, memento: &Memento) -> CollageResult<()> {
        if memento.layer_id != self.common.id {
            return Err(CollageError::validation(format!(
                "memento for {} cannot restore {}",
                memento.layer_id, self.common.id
            )));
        }
        self.common.position = memento.position;
        self.width = memento.width;
        self.height = memento.height;
        self.common.rotation_deg = memento.rotation_deg;
        self.crop = memento.crop;
        Ok(())
    }
}

impl LayerNode {
    /// Shared fields.
    pub fn common(&self) -> &LayerCommon {
        match self {
            Self::Leaf(l) => &l.common,
            Self::Group(g) => &g.common,
        }
    }

    /// Shared fields, mutably.
    pub fn common_mut(&mut self) -> &mut LayerCommon {
        match self {
            Self::Leaf(l) => &mut l.common,
            Self::Group(g) => &mut g.common,
        }
    }

    /// Layer identity.
    pub fn id(&self) -> LayerId {
        self.common().id
    }

    /// Paint order among siblings.
    pub fn z_index(&self) -> i32 {
        self.common().z_index
    }

    /// Whether this node is a group.
    pub fn is_group(&self) -> bool {
        matches!(self, Self::Group(_))
    }

    /// Leaf payload, if this is a leaf.
    pub fn as_leaf(&self) -> Option<&LeafLayer> {
        match self {
            Self::Leaf(l) => Some(l),
            Self::Group(_) => None,
        }
    }

    /// Leaf payload, mutably.
    pub fn as_leaf_mut(&mut self) -> Option<&mut LeafLayer> {
        match self {
            Self::Leaf(l) => Some(l),
            Self::Group(_) => None,
        }
    }

    /// Descendant leaves (or this leaf) in paint order.
    pub fn leaves(&self) -> Vec<&LeafLayer> {
        let mut out = Vec::new();
        collect_leaves(self, &mut out);
        out
    }

    /// Descendant leaves (or this leaf), mutably, in storage order.
    pub fn leaves_mut(&mut self) -> Vec<&mut LeafLayer> {
        let mut out = Vec::new();
        collect_leaves_mut(self, &mut out);
        out
    }

    /// Number of nodes in this subtree, including `self`.
    pub fn node_count(&self) -> usize {
        match self {
            Self::Leaf(_) => 1,
            Self::Group(g) => 1 + g.children.iter().map(Self::node_count).sum::<usize>(),
        }
    }

    /// Painter's-algorithm render onto `canvas`.
    ///
    /// A leaf is transformed and painted at its position; a group renders its
    /// children in ascending z-order. Leaves that fail to transform are
    /// skipped and reported, siblings still render.
    pub fn render(&self, canvas: &mut Raster, blobs: &dyn BlobStore) -> Vec<LeafFailure> {
        let mut failures = Vec::new();
        for leaf in self.leaves() {
            match leaf.transformed(blobs) {
                Ok(raster) => paint_at(
                    canvas,
                    &raster,
                    leaf.common.position.x,
                    leaf.common.position.y,
                ),
                Err(error) => failures.push(LeafFailure {
                    layer: leaf.common.id,
                    error,
                }),
            }
        }
        failures
    }

    /// Partial update; a group applies it to every descendant leaf.
    ///
    /// The update is validated once up front, so either every leaf changes or none does.
    pub fn apply_update(&mut self, update: &LayerUpdate) -> CollageResult<()> {
        update.validate()?;
        for leaf in self.leaves_mut() {
            leaf.apply_update_unchecked(update);
        }
        Ok(())
    }

    /// Add `delta_deg` to the rotation of this leaf or of every descendant leaf.
    pub fn rotate_by(&mut self, delta_deg: f64) {
        for leaf in self.leaves_mut() {
            leaf.common.rotation_deg += delta_deg;
        }
    }

    /// Prototype clone: a structurally independent deep copy with fresh ids.
    ///
    /// The root of the copy gets `z_index`; descendants keep their relative
    /// order. Effect maps and child lists are copied, never shared.
    pub fn duplicate(&self, z_index: i32, next_id: &mut dyn FnMut() -> LayerId) -> LayerNode {
        let mut copy = self.clone_with_fresh_ids(next_id);
        copy.common_mut().z_index = z_index;
        copy
    }

    fn clone_with_fresh_ids(&self, next_id: &mut dyn FnMut() -> LayerId) -> LayerNode {
        match self {
            Self::Leaf(l) => {
                let mut common = l.common.clone();
                common.id = next_id();
                Self::Leaf(LeafLayer {
                    common,
                    source: l.source.clone(),
                    width: l.width,
                    height: l.height,
                    crop: l.crop,
                    effects: l.effects.clone(),
                })
            }
            Self::Group(g) => {
                let mut common = g.common.clone();
                common.id = next_id();
                let mut children = Vec::with_capacity(g.children.len());
                for child in &g.children {
                    children.push(child.clone_with_fresh_ids(&mut *next_id));
                }
                Self::Group(LayerGroup { common, children })
            }
        }
    }

    /// Snapshot this leaf; groups have no memento representation.
    pub fn create_memento(&self) -> CollageResult<Memento> {
        match self {
            Self::Leaf(l) => Ok(l.create_memento()),
            Self::Group(g) => Err(CollageError::UnsupportedForGroup(g.common.id)),
        }
    }

    /// Restore this leaf from a snapshot; groups have no memento representation.
    pub fn restore_from_memento(&mut self, memento: &Memento) -> CollageResult<()> {
        match self {
            Self::Leaf(l) => l.restore_from_memento(memento),
            Self::Group(g) => Err(CollageError::UnsupportedForGroup(g.common.id)),
        }
    }

    /// Point every node of the subtree at `collage`.
    pub fn set_collage(&mut self, collage: CollageId) {
        self.common_mut().collage = collage;
        if let Self::Group(g) = self {
            for child in &mut g.children {
                child.set_collage(collage);
            }
        }
    }

    /// Sort children by z-index at every level (stable).
    pub fn sort_by_z(&mut self) {
        if let Self::Group(g) = self {
            sort_siblings(&mut g.children);
        }
    }
}

fn collect_leaves<'a>(node: &'a LayerNode, out: &mut Vec<&'a LeafLayer>) {
    match node {
        LayerNode::Leaf(l) => out.push(l),
        LayerNode::Group(g) => {
            for child in paint_order(&g.children) {
                collect_leaves(child, out);
            }
        }
    }
}

fn collect_leaves_mut<'a>(node: &'a mut LayerNode, out: &mut Vec<&'a mut LeafLayer>) {
    match node {
        LayerNode::Leaf(l) => out.push(l),
        LayerNode::Group(g) => {
            for child in &mut g.children {
                collect_leaves_mut(child, out);
            }
        }
    }
}

/// Siblings in ascending z-order; ties keep storage order.
pub fn paint_order(siblings: &[LayerNode]) -> Vec<&LayerNode> {
    let mut ordered: Vec<&LayerNode> = siblings.iter().collect();
    ordered.sort_by_key(|n| n.z_index());
    ordered
}

/// Every leaf of a forest in paint order.
pub fn forest_leaves(roots: &[LayerNode]) -> Vec<&LeafLayer> {
    let mut out = Vec::new();
    for root in paint_order(roots) {
        collect_leaves(root, &mut out);
    }
    out
}

/// Z-index for a node appended on top of `siblings`: `max + 1`, or `0` when empty.
pub fn next_z_index(siblings: &[LayerNode]) -> i32 {
    siblings
        .iter()
        .map(LayerNode::z_index)
        .max()
        .map_or(0, |z| z.saturating_add(1))
}

/// Sort a sibling list (and all nested lists) by z-index.
pub fn sort_siblings(siblings: &mut [LayerNode]) {
    siblings.sort_by_key(LayerNode::z_index);
    for node in siblings.iter_mut() {
        node.sort_by_z();
    }
}

/// Depth-first lookup by id.
pub fn find_node(roots: &[LayerNode], id: LayerId) -> Option<&LayerNode> {
    for node in roots {
        if node.id() == id {
            return Some(node);
        }
        if let LayerNode::Group(g) = node
            && let Some(found) = find_node(&g.children, id)
        {
            return Some(found);
        }
    }
    None
}

/// Depth-first lookup by id, mutably.
pub fn find_node_mut(roots: &mut [LayerNode], id: LayerId) -> Option<&mut LayerNode> {
    for node in roots.iter_mut() {
        if node.id() == id {
            return Some(node);
        }
        if let LayerNode::Group(g) = node
            && let Some(found) = find_node_mut(&mut g.children, id)
        {
            return Some(found);
        }
    }
    None
}

/// The sibling list that directly contains `id`.
pub fn siblings_of_mut(roots: &mut Vec<LayerNode>, id: LayerId) -> Option<&mut Vec<LayerNode>> {
    if roots.iter().any(|n| n.id() == id) {
        return Some(roots);
    }
    for node in roots.iter_mut() {
        if let LayerNode::Group(g) = node
            && let Some(found) = siblings_of_mut(&mut g.children, id)
        {
            return Some(found);
        }
    }
    None
}

/// Detach the node `id` (with its subtree) from the forest.
pub fn remove_node(roots: &mut Vec<LayerNode>, id: LayerId) -> Option<LayerNode> {
    let siblings = siblings_of_mut(roots, id)?;
    let idx = siblings.iter().position(|n| n.id() == id)?;
    Some(siblings.remove(idx))
}

#[cfg(test)]
#[path = "../../tests/unit/layer/node.rs"]
mod tests;
