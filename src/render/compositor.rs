use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Instant,
};

use rayon::prelude::*;

use crate::{
    assets::store::BlobStore,
    collage::model::Collage,
    foundation::error::{CollageError, CollageResult},
    layer::node::{LeafFailure, LeafLayer},
    render::composite::paint_at,
    render::raster::{PremulRgba8, Raster},
};

/// Compositor configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompositorOpts {
    /// Transform leaves on a worker pool; painting stays sequential.
    pub parallel: bool,
    /// Worker count; `None` uses rayon's default.
    pub threads: Option<usize>,
    /// Canvas color before any layer is painted (premultiplied).
    pub clear_rgba: PremulRgba8,
}

impl Default for CompositorOpts {
    fn default() -> Self {
        Self {
            parallel: true,
            threads: None,
            clear_rgba: [0, 0, 0, 0],
        }
    }
}

/// Shared flag a caller sets to abandon an in-flight render.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// Fresh, unset flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    fn check(&self) -> CollageResult<()> {
        if self.is_cancelled() {
            return Err(CollageError::Cancelled);
        }
        Ok(())
    }
}

/// A flattened collage plus the leaves that could not be drawn.
#[derive(Debug)]
pub struct RenderOutcome {
    /// Premultiplied canvas.
    pub raster: Raster,
    /// Leaves skipped because their transform failed.
    pub skipped: Vec<LeafFailure>,
    /// Number of leaves painted.
    pub painted: usize,
}

/// Flattens collages onto a canvas.
#[derive(Debug)]
pub struct Compositor {
    opts: CompositorOpts,
    pool: Option<rayon::ThreadPool>,
}

impl Compositor {
    /// Build a compositor, including its worker pool when `opts.parallel` is set.
    pub fn new(opts: CompositorOpts) -> CollageResult<Self> {
        let pool = if opts.parallel {
            Some(build_thread_pool(opts.threads)?)
        } else {
            None
        };
        Ok(Self { opts, pool })
    }

    /// Active options.
    pub fn opts(&self) -> &CompositorOpts {
        &self.opts
    }

    /// Render every leaf of `collage` in paint order.
    ///
    /// A leaf whose transform fails is skipped and reported in
    /// [`RenderOutcome::skipped`]. The render only fails when every leaf
    /// fails (with the first leaf's error), when the canvas cannot be
    /// allocated, or when `cancel` is set.
    #[tracing::instrument(skip(self, collage, blobs, cancel), fields(collage = %collage.id))]
    pub fn render_collage(
        &self,
        collage: &Collage,
        blobs: &dyn BlobStore,
        cancel: &CancelFlag,
    ) -> CollageResult<RenderOutcome> {
        let mut canvas = Raster::filled(
            collage.canvas.width,
            collage.canvas.height,
            self.opts.clear_rgba,
        )?;
        let leaves = collage.leaves();
        cancel.check()?;

        let transformed: Vec<CollageResult<Raster>> = match &self.pool {
            Some(pool) => pool.install(|| {
                leaves
                    .par_iter()
                    .map(|leaf| transform_leaf(leaf, blobs, cancel))
                    .collect()
            }),
            None => leaves
                .iter()
                .map(|leaf| transform_leaf(leaf, blobs, cancel))
                .collect(),
        };

        let mut skipped = Vec::new();
        let mut painted = 0usize;
        for (leaf, result) in leaves.iter().zip(transformed) {
            cancel.check()?;
            match result {
                Ok(raster) => {
                    paint_at(
                        &mut canvas,
                        &raster,
                        leaf.common.position.x,
                        leaf.common.position.y,
                    );
                    painted += 1;
                }
                Err(error) if !error.is_leaf_local() => return Err(error),
                Err(error) => {
                    tracing::warn!(layer_id = %leaf.common.id, %error, "skipping layer");
                    skipped.push(LeafFailure {
                        layer: leaf.common.id,
                        error,
                    });
                }
            }
        }

        if painted == 0 && !skipped.is_empty() {
            return Err(skipped.swap_remove(0).error);
        }
        tracing::debug!(painted, skipped = skipped.len(), "collage rendered");
        Ok(RenderOutcome {
            raster: canvas,
            skipped,
            painted,
        })
    }

    /// Transform a single leaf without painting it; any error aborts.
    pub fn preview_leaf(&self, leaf: &LeafLayer, blobs: &dyn BlobStore) -> CollageResult<Raster> {
        leaf.transformed(blobs)
    }
}

fn transform_leaf(
    leaf: &LeafLayer,
    blobs: &dyn BlobStore,
    cancel: &CancelFlag,
) -> CollageResult<Raster> {
    cancel.check()?;
    let t0 = Instant::now();
    let out = leaf.transformed(blobs);
    tracing::debug!(
        layer_id = %leaf.common.id,
        elapsed_us = t0.elapsed().as_micros() as u64,
        ok = out.is_ok(),
        "leaf transformed"
    );
    out
}

fn build_thread_pool(threads: Option<usize>) -> CollageResult<rayon::ThreadPool> {
    if let Some(n) = threads
        && n == 0
    {
        return Err(CollageError::validation(
            "compositor 'threads' must be >= 1 when set",
        ));
    }

    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(n) = threads {
        builder = builder.num_threads(n);
    }
    builder
        .build()
        .map_err(|e| CollageError::Other(anyhow::anyhow!("failed to build rayon thread pool: {e}")))
}

#[cfg(test)]
#[path = "../../tests/unit/render/compositor.rs"]
mod tests;
