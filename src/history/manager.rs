//! Per-collage undo/redo built on leaf mementos.
//!
//! Each collage gets its own [`CollageHistory`] behind its own mutex. The
//! outer map lock is only held while looking up or creating a slot, so work
//! on one collage never blocks work on another.

use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex},
};

use crate::{
    collage::model::Collage,
    foundation::core::{CollageId, LayerId},
    foundation::error::{CollageResult, lock},
    layer::memento::Memento,
    layer::node::LayerNode,
};

/// One user-visible action: a memento per affected leaf.
#[derive(Clone, Debug, PartialEq)]
pub struct HistoryStep {
    label: &'static str,
    mementos: Vec<Memento>,
}

impl HistoryStep {
    /// Snapshot every leaf under `node` (the node itself when it is a leaf).
    pub fn capture(label: &'static str, node: &LayerNode) -> Self {
        Self {
            label,
            mementos: node.leaves().into_iter().map(|l| l.create_memento()).collect(),
        }
    }

    /// Snapshot the current state of the leaves referenced by `other`.
    fn capture_current(other: &Self, collage: &Collage) -> CollageResult<Self> {
        let mut mementos = Vec::with_capacity(other.mementos.len());
        for m in &other.mementos {
            mementos.push(collage.layer(m.layer_id())?.create_memento()?);
        }
        Ok(Self {
            label: other.label,
            mementos,
        })
    }

    /// Name of the action that produced this step.
    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Captured snapshots.
    pub fn mementos(&self) -> &[Memento] {
        &self.mementos
    }

    /// Leaves this step restores.
    pub fn layer_ids(&self) -> impl Iterator<Item = LayerId> + '_ {
        self.mementos.iter().map(Memento::layer_id)
    }

    /// Whether the step carries no snapshot (an action on an empty group).
    pub fn is_empty(&self) -> bool {
        self.mementos.is_empty()
    }
}

/// Undo and redo stacks of a single collage.
#[derive(Clone, Debug, Default)]
pub struct CollageHistory {
    undo: VecDeque<HistoryStep>,
    redo: VecDeque<HistoryStep>,
    depth: Option<usize>,
}

/// Which stack a replay pops from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Direction {
    Undo,
    Redo,
}

impl CollageHistory {
    /// Empty history; `depth` caps each stack, dropping the oldest steps first.
    pub fn new(depth: Option<usize>) -> Self {
        Self {
            undo: VecDeque::new(),
            redo: VecDeque::new(),
            depth,
        }
    }

    /// Record `step` before an edit and drop the whole redo history.
    pub fn capture(&mut self, step: HistoryStep) {
        if step.is_empty() {
            return;
        }
        tracing::debug!(
            label = step.label,
            leaves = step.mementos.len(),
            "capture undo state"
        );
        push_capped(&mut self.undo, step, self.depth);
        self.redo.clear();
    }

    /// Revert the most recent step on `collage`.
    ///
    /// Returns `Ok(false)` when there is nothing to undo. When the step
    /// references a leaf that no longer exists the step is discarded,
    /// nothing is modified and `NotFound` is returned.
    pub fn undo(&mut self, collage: &mut Collage) -> CollageResult<bool> {
        self.replay(Direction::Undo, collage)
    }

    /// Re-apply the most recently undone step on `collage`.
    ///
    /// Same failure rules as [`CollageHistory::undo`].
    pub fn redo(&mut self, collage: &mut Collage) -> CollageResult<bool> {
        self.replay(Direction::Redo, collage)
    }

    fn replay(&mut self, dir: Direction, collage: &mut Collage) -> CollageResult<bool> {
        let (from, to) = match dir {
            Direction::Undo => (&mut self.undo, &mut self.redo),
            Direction::Redo => (&mut self.redo, &mut self.undo),
        };
        let Some(step) = from.pop_back() else {
            return Ok(false);
        };
        // All referenced leaves must exist before anything is restored.
        let inverse = HistoryStep::capture_current(&step, collage)?;
        for m in &step.mementos {
            collage.layer_mut(m.layer_id())?.restore_from_memento(m)?;
        }
        tracing::debug!(label = step.label, ?dir, "replayed history step");
        push_capped(to, inverse, self.depth);
        Ok(true)
    }

    /// Number of undoable steps.
    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    /// Number of redoable steps.
    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }

    /// Whether [`CollageHistory::undo`] has a step to pop.
    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    /// Whether [`CollageHistory::redo`] has a step to pop.
    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    /// Drop both stacks.
    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }
}

fn push_capped(stack: &mut VecDeque<HistoryStep>, step: HistoryStep, depth: Option<usize>) {
    stack.push_back(step);
    if let Some(max) = depth {
        while stack.len() > max {
            stack.pop_front();
        }
    }
}

/// Shared handle to one collage's history.
pub type HistorySlot = Arc<Mutex<CollageHistory>>;

/// Registry of per-collage histories.
#[derive(Debug, Default)]
pub struct HistoryManager {
    slots: Mutex<HashMap<CollageId, HistorySlot>>,
    depth: Option<usize>,
}

impl HistoryManager {
    /// Registry whose stacks are capped at `depth` steps (unbounded for `None`).
    pub fn new(depth: Option<usize>) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            depth,
        }
    }

    /// Slot for `collage`, created on first use.
    pub fn slot(&self, collage: CollageId) -> CollageResult<HistorySlot> {
        let mut slots = lock(&self.slots, "history registry")?;
        Ok(slots
            .entry(collage)
            .or_insert_with(|| Arc::new(Mutex::new(CollageHistory::new(self.depth))))
            .clone())
    }

    /// Slot for `collage` if one exists; never creates one.
    pub fn get(&self, collage: CollageId) -> CollageResult<Option<HistorySlot>> {
        Ok(lock(&self.slots, "history registry")?.get(&collage).cloned())
    }

    /// Forget the history of a deleted collage.
    pub fn forget(&self, collage: CollageId) -> CollageResult<()> {
        lock(&self.slots, "history registry")?.remove(&collage);
        Ok(())
    }

    /// Forget `collage` only while `slot` is still the registered one.
    pub fn forget_slot(&self, collage: CollageId, slot: &HistorySlot) -> CollageResult<()> {
        let mut slots = lock(&self.slots, "history registry")?;
        if slots.get(&collage).is_some_and(|s| Arc::ptr_eq(s, slot)) {
            slots.remove(&collage);
        }
        Ok(())
    }

    /// Number of collages with a history slot.
    pub fn tracked(&self) -> usize {
        self.slots.lock().map(|s| s.len()).unwrap_or(0)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/history/manager.rs"]
mod tests;
