use std::{
    io::Cursor,
    sync::atomic::{AtomicBool, Ordering},
};

use super::*;
use crate::{
    assets::store::{DirBlobStore, MemoryBlobStore},
    editor::store::MemoryEntityStore,
    foundation::error::ErrorKind,
};

type Editor = CollageEditor<MemoryBlobStore, MemoryEntityStore>;

const ALICE: Actor = Actor::new(UserId(1));
const BOB: Actor = Actor::new(UserId(2));

fn editor() -> Editor {
    CollageEditor::new(
        MemoryBlobStore::new(),
        MemoryEntityStore::new(),
        EditorOpts {
            compositor: CompositorOpts {
                parallel: false,
                ..CompositorOpts::default()
            },
            history_depth: None,
        },
    )
    .unwrap()
}

fn png(w: u32, h: u32, rgba: [u8; 4]) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(w, h, image::Rgba(rgba));
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

fn setup(ed: &Editor) -> (CollageId, LayerId) {
    let img = ed
        .register_image(ALICE, &png(8, 6, [255, 0, 0, 255]), "png")
        .unwrap();
    ed.open_editor_for_image(ALICE, img.id).unwrap()
}

fn width(ed: &Editor, layer: LayerId) -> u32 {
    let c = ed.collage(ALICE, ed.collage_of(layer).unwrap()).unwrap();
    c.layer(layer).unwrap().as_leaf().unwrap().width
}

fn resize(w: u32) -> LayerUpdate {
    LayerUpdate {
        width: Some(w),
        ..LayerUpdate::default()
    }
}

#[test]
fn register_image_checks_format_and_payload() {
    let ed = editor();
    let bytes = png(3, 2, [0, 0, 0, 255]);
    let rec = ed.register_image(ALICE, &bytes, ".PNG").unwrap();
    assert_eq!((rec.width, rec.height), (3, 2));
    assert_eq!(rec.format, "png");
    assert_eq!(rec.owner, UserId(1));

    let err = ed.register_image(ALICE, &bytes, "tiff").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    let err = ed.register_image(ALICE, &[], "png").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    let err = ed.register_image(ALICE, b"nope", "jpg").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Decode);
    assert_eq!(ed.blobs().len(), 1);
}

#[test]
fn open_editor_creates_once_then_reuses() {
    let ed = editor();
    let img = ed
        .register_image(ALICE, &png(8, 6, [1, 2, 3, 255]), "png")
        .unwrap();
    let (collage_id, layer) = ed.open_editor_for_image(ALICE, img.id).unwrap();
    assert_eq!(
        ed.open_editor_for_image(ALICE, img.id).unwrap(),
        (collage_id, layer)
    );

    let c = ed.collage(ALICE, collage_id).unwrap();
    assert_eq!(c.name, format!("Collage_for_image_{}", img.id.0));
    assert_eq!((c.canvas.width, c.canvas.height), (8, 6));
    let leaf = c.layer(layer).unwrap().as_leaf().unwrap();
    assert_eq!((leaf.width, leaf.height, leaf.common.z_index), (8, 6, 0));

    assert_eq!(
        ed.open_editor_for_image(BOB, img.id).unwrap_err().kind(),
        ErrorKind::Ownership
    );
}

#[test]
fn added_layers_stack_upwards() {
    let ed = editor();
    let (collage_id, _) = setup(&ed);
    let img = ed
        .register_image(ALICE, &png(2, 2, [0, 0, 255, 255]), "png")
        .unwrap();
    for _ in 0..3 {
        ed.add_image_layer(ALICE, collage_id, img.id).unwrap();
    }
    let z: Vec<i32> = ed
        .collage(ALICE, collage_id)
        .unwrap()
        .layers
        .iter()
        .map(LayerNode::z_index)
        .collect();
    assert_eq!(z, vec![0, 1, 2, 3]);
}

#[test]
fn foreign_image_cannot_be_added() {
    let ed = editor();
    let (collage_id, layer) = setup(&ed);
    let theirs = ed
        .register_image(BOB, &png(2, 2, [0, 0, 0, 255]), "png")
        .unwrap();
    assert_eq!(
        ed.add_image_layer(ALICE, collage_id, theirs.id)
            .unwrap_err()
            .kind(),
        ErrorKind::Ownership
    );
    assert_eq!(
        ed.update_layer(BOB, layer, &resize(3)).unwrap_err().kind(),
        ErrorKind::Ownership
    );
}

#[test]
fn update_undo_redo_roundtrip() {
    let ed = editor();
    let (collage_id, layer) = setup(&ed);
    ed.update_layer(ALICE, layer, &resize(20)).unwrap();
    ed.update_layer(ALICE, layer, &resize(30)).unwrap();
    assert!(ed.can_undo(collage_id).unwrap());

    assert!(ed.undo(ALICE, collage_id).unwrap());
    assert!(ed.undo(ALICE, collage_id).unwrap());
    assert!(!ed.undo(ALICE, collage_id).unwrap());
    assert_eq!(width(&ed, layer), 8);

    assert!(ed.redo(ALICE, collage_id).unwrap());
    assert_eq!(width(&ed, layer), 20);

    ed.update_layer(ALICE, layer, &resize(50)).unwrap();
    assert!(!ed.can_redo(collage_id).unwrap());
    assert!(!ed.redo(ALICE, collage_id).unwrap());
    assert_eq!(width(&ed, layer), 50);
}

#[test]
fn invalid_update_leaves_no_history() {
    let ed = editor();
    let (collage_id, layer) = setup(&ed);
    let err = ed.update_layer(ALICE, layer, &resize(0)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Geometry);
    assert!(!ed.can_undo(collage_id).unwrap());
}

#[test]
fn non_draft_collages_reject_edits_before_capture() {
    let ed = editor();
    let (collage_id, layer) = setup(&ed);
    ed.update_layer(ALICE, layer, &resize(20)).unwrap();

    for status in [CollageStatus::Published, CollageStatus::Archived] {
        if status == CollageStatus::Published {
            ed.publish(ALICE, collage_id).unwrap();
        } else {
            ed.archive(ALICE, collage_id).unwrap();
        }
        let before = ed.collage(ALICE, collage_id).unwrap();
        let errors = [
            ed.update_layer(ALICE, layer, &resize(9)).map(|_| ()),
            ed.layer_action(ALICE, layer, LayerAction::RotateLeft)
                .map(|_| ()),
            ed.duplicate_layer(ALICE, layer).map(|_| ()),
            ed.undo(ALICE, collage_id).map(|_| ()),
            ed.redo(ALICE, collage_id).map(|_| ()),
            ed.group_layers(ALICE, collage_id, &[layer]).map(|_| ()),
        ];
        for e in errors {
            assert_eq!(e.unwrap_err().kind(), ErrorKind::State, "{status}");
        }
        assert_eq!(ed.collage(ALICE, collage_id).unwrap(), before);
    }

    assert_eq!(
        ed.publish(ALICE, collage_id).unwrap_err().kind(),
        ErrorKind::State
    );
    assert_eq!(ed.restore(ALICE, collage_id).unwrap(), CollageStatus::Draft);
    assert!(ed.undo(ALICE, collage_id).unwrap());
    assert_eq!(width(&ed, layer), 8);
}

#[test]
fn noop_transitions_do_not_bump_revision() {
    let ed = editor();
    let (collage_id, _) = setup(&ed);
    ed.archive(ALICE, collage_id).unwrap();
    let rev = ed.collage(ALICE, collage_id).unwrap().revision;
    assert_eq!(ed.archive(ALICE, collage_id).unwrap(), CollageStatus::Archived);
    assert_eq!(ed.collage(ALICE, collage_id).unwrap().revision, rev);
    assert_eq!(
        ed.restore(ALICE, collage_id).unwrap(),
        CollageStatus::Draft
    );
    assert_eq!(
        ed.restore(ALICE, collage_id).unwrap_err().kind(),
        ErrorKind::State
    );
}

#[test]
fn rotate_actions_are_undoable() {
    let ed = editor();
    let (collage_id, layer) = setup(&ed);
    let node = ed
        .layer_action(ALICE, layer, LayerAction::RotateRight)
        .unwrap()
        .unwrap();
    assert_eq!(node.common().rotation_deg, 90.0);
    ed.layer_action(ALICE, layer, LayerAction::RotateLeft)
        .unwrap();
    ed.layer_action(ALICE, layer, LayerAction::RotateLeft)
        .unwrap();
    let c = ed.collage(ALICE, collage_id).unwrap();
    assert_eq!(c.layer(layer).unwrap().common().rotation_deg, -90.0);

    ed.undo(ALICE, collage_id).unwrap();
    let c = ed.collage(ALICE, collage_id).unwrap();
    assert_eq!(c.layer(layer).unwrap().common().rotation_deg, 0.0);
}

#[test]
fn undo_of_deleted_leaf_is_not_found_and_discarded() {
    let ed = editor();
    let (collage_id, layer) = setup(&ed);
    ed.update_layer(ALICE, layer, &resize(20)).unwrap();
    assert!(
        ed.layer_action(ALICE, layer, LayerAction::Delete)
            .unwrap()
            .is_none()
    );
    let before = ed.collage(ALICE, collage_id).unwrap();
    assert!(before.layers.is_empty());

    assert_eq!(
        ed.undo(ALICE, collage_id).unwrap_err().kind(),
        ErrorKind::NotFound
    );
    assert_eq!(ed.collage(ALICE, collage_id).unwrap(), before);
    assert!(!ed.can_redo(collage_id).unwrap());
    assert_eq!(
        ed.undo(ALICE, collage_id).unwrap_err().kind(),
        ErrorKind::NotFound
    );
    assert!(!ed.can_undo(collage_id).unwrap());
}

#[test]
fn duplicate_goes_on_top_and_is_independent() {
    let ed = editor();
    let (collage_id, layer) = setup(&ed);
    let copy = ed.duplicate_layer(ALICE, layer).unwrap();
    assert_ne!(copy, layer);
    assert!(!ed.can_undo(collage_id).unwrap());

    ed.update_layer(ALICE, copy, &resize(3)).unwrap();
    assert_eq!(width(&ed, layer), 8);
    assert_eq!(width(&ed, copy), 3);

    let c = ed.collage(ALICE, collage_id).unwrap();
    assert_eq!(c.layer(copy).unwrap().z_index(), 1);
    assert_eq!(ed.collage_of(copy).unwrap(), collage_id);
}

#[test]
fn group_edit_is_one_undo_step() {
    let ed = editor();
    let (collage_id, first) = setup(&ed);
    let img = ed
        .register_image(ALICE, &png(2, 2, [0, 255, 0, 255]), "png")
        .unwrap();
    let second = ed.add_image_layer(ALICE, collage_id, img.id).unwrap();
    let group = ed
        .group_layers(ALICE, collage_id, &[first, second])
        .unwrap();

    let c = ed.collage(ALICE, collage_id).unwrap();
    assert_eq!(c.layers.len(), 1);
    assert_eq!(c.layers[0].id(), group);
    assert_eq!(c.layers[0].z_index(), 2);

    ed.update_layer(ALICE, group, &resize(40)).unwrap();
    assert_eq!(width(&ed, first), 40);
    assert_eq!(width(&ed, second), 40);

    assert!(ed.undo(ALICE, collage_id).unwrap());
    assert_eq!(width(&ed, first), 8);
    assert_eq!(width(&ed, second), 2);
    assert!(!ed.can_undo(collage_id).unwrap());

    let copy = ed.duplicate_layer(ALICE, group).unwrap();
    let c = ed.collage(ALICE, collage_id).unwrap();
    assert_eq!(c.leaves().len(), 4);
    assert_eq!(c.layer(copy).unwrap().z_index(), 3);
}

#[test]
fn grouping_rejects_bad_member_lists() {
    let ed = editor();
    let (collage_id, layer) = setup(&ed);
    let kind = |ids: &[LayerId]| {
        ed.group_layers(ALICE, collage_id, ids)
            .unwrap_err()
            .kind()
    };
    assert_eq!(kind(&[]), ErrorKind::Validation);
    assert_eq!(kind(&[layer, layer]), ErrorKind::Validation);
    assert_eq!(kind(&[LayerId(999)]), ErrorKind::NotFound);
}

#[test]
fn preview_of_group_is_unsupported() {
    let ed = editor();
    let (collage_id, layer) = setup(&ed);
    let raster = ed.preview_layer(ALICE, layer).unwrap();
    assert_eq!(raster.dimensions(), (8, 6));

    let group = ed.group_layers(ALICE, collage_id, &[layer]).unwrap();
    assert_eq!(
        ed.preview_layer(ALICE, group).unwrap_err().kind(),
        ErrorKind::UnsupportedForGroup
    );
    assert_eq!(
        ed.preview_layer(ALICE, LayerId(999)).unwrap_err().kind(),
        ErrorKind::NotFound
    );
}

#[test]
fn render_stores_png_owned_by_actor() {
    let ed = editor();
    let (collage_id, _) = setup(&ed);
    let before = ed.blobs().len();
    let out = ed
        .render_collage(ALICE, collage_id, &CancelFlag::new())
        .unwrap();
    assert!(out.skipped.is_empty());
    assert_eq!(out.image.owner, UserId(1));
    assert_eq!(out.image.format, "png");
    assert_eq!((out.image.width, out.image.height), (8, 6));
    assert_eq!(ed.blobs().len(), before + 1);

    let stored = ed.blobs().read(&out.image.blob).unwrap();
    let decoded = decode_image(&stored).unwrap();
    assert_eq!(decoded.pixel(0, 0), Some([255, 0, 0, 255]));
}

#[test]
fn cancelled_render_stores_nothing() {
    let ed = editor();
    let (collage_id, _) = setup(&ed);
    let before = ed.blobs().len();
    let flag = CancelFlag::new();
    flag.cancel();
    let err = ed.render_collage(ALICE, collage_id, &flag).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert_eq!(ed.blobs().len(), before);
}

#[test]
fn rendering_published_collage_is_allowed() {
    let ed = editor();
    let (collage_id, _) = setup(&ed);
    ed.publish(ALICE, collage_id).unwrap();
    assert!(ed.render_collage(ALICE, collage_id, &CancelFlag::new()).is_ok());
    assert_eq!(
        ed.render_collage(BOB, collage_id, &CancelFlag::new())
            .unwrap_err()
            .kind(),
        ErrorKind::Ownership
    );
}

#[test]
fn deleting_image_cascades_to_collages() {
    let ed = editor();
    let img = ed
        .register_image(ALICE, &png(4, 4, [9, 9, 9, 255]), "png")
        .unwrap();
    let (first, layer) = ed.open_editor_for_image(ALICE, img.id).unwrap();
    let other = ed
        .create_collage(ALICE, "other", CanvasSize::new(4, 4).unwrap())
        .unwrap();
    ed.add_image_layer(ALICE, other.id, img.id).unwrap();
    let unrelated = ed
        .create_collage(ALICE, "unrelated", CanvasSize::new(4, 4).unwrap())
        .unwrap();
    ed.update_layer(ALICE, layer, &resize(2)).unwrap();

    assert_eq!(
        ed.delete_image(BOB, img.id).unwrap_err().kind(),
        ErrorKind::Ownership
    );
    ed.delete_image(ALICE, img.id).unwrap();

    assert_eq!(ed.collages(ALICE).unwrap(), vec![unrelated.id]);
    assert!(ed.collage(ALICE, first).is_err());
    assert!(!ed.blobs().contains(&img.blob));
    assert!(ed.image(ALICE, img.id).is_err());
    assert_eq!(ed.history().tracked(), 0);
}

#[test]
fn rename_and_delete_collage() {
    let ed = editor();
    let (collage_id, layer) = setup(&ed);
    let img = ed.collage(ALICE, collage_id).unwrap().leaves()[0].source.image;
    let renamed = ed.rename_image(ALICE, img, "holiday").unwrap();
    assert_eq!(renamed.title.as_deref(), Some("holiday"));
    assert!(ed.rename_image(BOB, img, "mine").is_err());

    assert_eq!(
        ed.delete_collage(BOB, collage_id).unwrap_err().kind(),
        ErrorKind::Ownership
    );
    ed.archive(ALICE, collage_id).unwrap();
    ed.delete_collage(ALICE, collage_id).unwrap();
    assert_eq!(
        ed.update_layer(ALICE, layer, &resize(2)).unwrap_err().kind(),
        ErrorKind::NotFound
    );
}

#[test]
fn create_collage_rejects_empty_canvas() {
    let ed = editor();
    let err = ed
        .create_collage(
            ALICE,
            "x",
            CanvasSize {
                width: 0,
                height: 3,
            },
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[test]
fn identical_uploads_keep_separate_bytes_on_disk() {
    let root = std::env::temp_dir().join(format!("collage-editor-dup-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&root);
    let ed = CollageEditor::new(
        DirBlobStore::new(&root),
        MemoryEntityStore::new(),
        EditorOpts::default(),
    )
    .unwrap();
    let bytes = png(4, 4, [0, 128, 0, 255]);
    let a = ed.register_image(ALICE, &bytes, "png").unwrap();
    let b = ed.register_image(ALICE, &bytes, "png").unwrap();
    assert_ne!(a.blob, b.blob);
    let (collage_id, _) = ed.open_editor_for_image(ALICE, b.id).unwrap();

    ed.delete_image(ALICE, a.id).unwrap();
    assert_eq!(ed.blobs().read(&b.blob).unwrap(), bytes);
    let out = ed
        .render_collage(ALICE, collage_id, &CancelFlag::new())
        .unwrap();
    assert!(out.skipped.is_empty());
    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn unknown_collages_leave_no_history_behind() {
    let ed = editor();
    for id in 1000..1100 {
        let err = ed.undo(ALICE, CollageId(id)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
    assert!(!ed.can_undo(CollageId(5000)).unwrap());
    assert!(!ed.can_redo(CollageId(5000)).unwrap());
    assert_eq!(
        ed.delete_collage(ALICE, CollageId(5000)).unwrap_err().kind(),
        ErrorKind::NotFound
    );
    assert_eq!(
        ed.render_collage(ALICE, CollageId(5000), &CancelFlag::new())
            .unwrap_err()
            .kind(),
        ErrorKind::NotFound
    );
    assert_eq!(ed.history().tracked(), 0);

    let (collage_id, _) = setup(&ed);
    assert_eq!(ed.history().tracked(), 1);
    ed.delete_collage(ALICE, collage_id).unwrap();
    assert_eq!(ed.history().tracked(), 0);
}

#[test]
fn concurrent_edits_on_one_collage_do_not_interleave() {
    const THREADS: u32 = 8;
    let ed = editor();
    let (collage_id, layer) = setup(&ed);
    let revision = ed.collage(ALICE, collage_id).unwrap().revision;

    std::thread::scope(|s| {
        for i in 0..THREADS {
            let ed = &ed;
            s.spawn(move || {
                ed.update_layer(ALICE, layer, &resize(10 + i)).unwrap();
                assert!(ed.undo(ALICE, collage_id).unwrap());
            });
        }
    });

    assert_eq!(width(&ed, layer), 8);
    assert!(!ed.can_undo(collage_id).unwrap());
    let slot = ed.history().slot(collage_id).unwrap();
    let redo = lock(&slot, "test").unwrap().redo_len();
    assert!((1..=THREADS as usize).contains(&redo));
    assert_eq!(
        ed.collage(ALICE, collage_id).unwrap().revision,
        revision + 2 * u64::from(THREADS)
    );
}

#[test]
fn images_lists_only_own_records() {
    let ed = editor();
    let mine = ed
        .register_image(ALICE, &png(2, 2, [1, 1, 1, 255]), "png")
        .unwrap();
    ed.register_image(BOB, &png(2, 2, [2, 2, 2, 255]), "png")
        .unwrap();
    assert_eq!(ed.images(ALICE).unwrap(), vec![mine]);
    assert_eq!(ed.images(BOB).unwrap().len(), 1);
    assert!(ed.images(Actor::new(UserId(3))).unwrap().is_empty());
}

#[test]
fn effects_are_set_removed_and_stay_independent_on_copies() {
    let ed = editor();
    let (collage_id, layer) = setup(&ed);
    ed.set_layer_effect(ALICE, layer, "blur", serde_json::json!({ "radius": 2 }))
        .unwrap();
    let copy = ed.duplicate_layer(ALICE, layer).unwrap();
    ed.set_layer_effect(ALICE, copy, "blur", serde_json::json!({ "radius": 9 }))
        .unwrap();
    ed.set_layer_effect(ALICE, copy, "sepia", serde_json::json!(true))
        .unwrap();

    let original = ed.layer_effects(ALICE, layer).unwrap();
    assert_eq!(original.len(), 1);
    assert_eq!(original["blur"], serde_json::json!({ "radius": 2 }));
    assert_eq!(ed.layer_effects(ALICE, copy).unwrap().len(), 2);

    assert!(ed.remove_layer_effect(ALICE, copy, "blur").unwrap());
    assert!(!ed.remove_layer_effect(ALICE, copy, "blur").unwrap());
    assert_eq!(ed.layer_effects(ALICE, layer).unwrap().len(), 1);
    assert!(!ed.can_undo(collage_id).unwrap());

    assert_eq!(
        ed.set_layer_effect(ALICE, layer, " ", serde_json::json!(1))
            .unwrap_err()
            .kind(),
        ErrorKind::Validation
    );
    assert_eq!(
        ed.set_layer_effect(BOB, layer, "blur", serde_json::json!(1))
            .unwrap_err()
            .kind(),
        ErrorKind::Ownership
    );
    ed.publish(ALICE, collage_id).unwrap();
    assert_eq!(
        ed.remove_layer_effect(ALICE, layer, "blur")
            .unwrap_err()
            .kind(),
        ErrorKind::State
    );
}

/// Entity store whose saves can be switched to fail.
struct FlakyEntities {
    inner: MemoryEntityStore,
    fail_saves: AtomicBool,
}

impl EntityStore for FlakyEntities {
    fn load_collage(&self, id: CollageId) -> CollageResult<Collage> {
        self.inner.load_collage(id)
    }
    fn save_collage(&self, collage: &Collage) -> CollageResult<()> {
        if self.fail_saves.load(Ordering::Relaxed) {
            return Err(CollageError::Other(anyhow::anyhow!("disk full")));
        }
        self.inner.save_collage(collage)
    }
    fn delete_collage(&self, id: CollageId) -> CollageResult<()> {
        self.inner.delete_collage(id)
    }
    fn collages_of(&self, owner: UserId) -> CollageResult<Vec<CollageId>> {
        self.inner.collages_of(owner)
    }
    fn load_image(&self, id: ImageId) -> CollageResult<ImageRecord> {
        self.inner.load_image(id)
    }
    fn save_image(&self, image: &ImageRecord) -> CollageResult<()> {
        self.inner.save_image(image)
    }
    fn delete_image(&self, id: ImageId) -> CollageResult<()> {
        self.inner.delete_image(id)
    }
    fn images_of(&self, owner: UserId) -> CollageResult<Vec<ImageRecord>> {
        self.inner.images_of(owner)
    }
    fn collage_for_layer(&self, id: LayerId) -> CollageResult<Option<CollageId>> {
        self.inner.collage_for_layer(id)
    }
    fn collages_using_image(&self, image: ImageId) -> CollageResult<Vec<CollageId>> {
        self.inner.collages_using_image(image)
    }
    fn find_layer_for_image(
        &self,
        owner: UserId,
        image: ImageId,
    ) -> CollageResult<Option<(CollageId, LayerId)>> {
        self.inner.find_layer_for_image(owner, image)
    }
    fn next_layer_id(&self) -> LayerId {
        self.inner.next_layer_id()
    }
    fn next_collage_id(&self) -> CollageId {
        self.inner.next_collage_id()
    }
    fn next_image_id(&self) -> ImageId {
        self.inner.next_image_id()
    }
}

#[test]
fn failed_save_leaves_history_untouched() {
    let ed = CollageEditor::new(
        MemoryBlobStore::new(),
        FlakyEntities {
            inner: MemoryEntityStore::new(),
            fail_saves: AtomicBool::new(false),
        },
        EditorOpts::default(),
    )
    .unwrap();
    let img = ed
        .register_image(ALICE, &png(8, 6, [255, 0, 0, 255]), "png")
        .unwrap();
    let (collage_id, layer) = ed.open_editor_for_image(ALICE, img.id).unwrap();
    ed.update_layer(ALICE, layer, &resize(20)).unwrap();

    ed.entities().fail_saves.store(true, Ordering::Relaxed);
    assert_eq!(
        ed.update_layer(ALICE, layer, &resize(30)).unwrap_err().kind(),
        ErrorKind::Other
    );
    assert!(ed.undo(ALICE, collage_id).is_err());
    let slot = ed.history().slot(collage_id).unwrap();
    {
        let h = lock(&slot, "test").unwrap();
        assert_eq!((h.undo_len(), h.redo_len()), (1, 0));
    }

    ed.entities().fail_saves.store(false, Ordering::Relaxed);
    assert!(ed.undo(ALICE, collage_id).unwrap());
    let c = ed.collage(ALICE, collage_id).unwrap();
    assert_eq!(c.layer(layer).unwrap().as_leaf().unwrap().width, 8);
    assert!(ed.can_redo(collage_id).unwrap());
}
