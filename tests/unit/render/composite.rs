use super::*;

#[test]
fn over_src_alpha_0_is_noop() {
    let dst = [10, 20, 30, 40];
    let src = [0, 0, 0, 0];
    assert_eq!(over(dst, src), dst);
}

#[test]
fn over_src_opaque_replaces_dst() {
    let dst = [0, 0, 0, 255];
    let src = [255, 0, 0, 255];
    assert_eq!(over(dst, src), src);
}

#[test]
fn over_dst_transparent_returns_src() {
    let dst = [0, 0, 0, 0];
    let src = [100, 110, 120, 200];
    assert_eq!(over(dst, src), src);
}

#[test]
fn over_half_alpha_mixes() {
    let dst = [0, 0, 255, 255];
    let src = [128, 0, 0, 128];
    assert_eq!(over(dst, src), [128, 0, 127, 255]);
}

#[test]
fn paint_at_clips_negative_offsets() {
    let mut canvas = Raster::transparent(4, 4).unwrap();
    let src = Raster::filled(3, 3, [255, 255, 255, 255]).unwrap();
    paint_at(&mut canvas, &src, -1, -2);

    assert_eq!(canvas.pixel(0, 0), Some([255, 255, 255, 255]));
    assert_eq!(canvas.pixel(1, 0), Some([255, 255, 255, 255]));
    assert_eq!(canvas.pixel(2, 0), Some([0, 0, 0, 0]));
    assert_eq!(canvas.pixel(0, 1), Some([0, 0, 0, 0]));
}

#[test]
fn paint_at_fully_outside_is_noop() {
    let mut canvas = Raster::transparent(2, 2).unwrap();
    let src = Raster::filled(2, 2, [1, 2, 3, 255]).unwrap();
    paint_at(&mut canvas, &src, 5, 0);
    paint_at(&mut canvas, &src, 0, -2);
    assert!(canvas.data.iter().all(|&b| b == 0));
}

#[test]
fn later_paint_wins() {
    let mut canvas = Raster::transparent(2, 1).unwrap();
    paint_at(&mut canvas, &Raster::filled(2, 1, [255, 0, 0, 255]).unwrap(), 0, 0);
    paint_at(&mut canvas, &Raster::filled(1, 1, [0, 255, 0, 255]).unwrap(), 1, 0);
    assert_eq!(canvas.pixel(0, 0), Some([255, 0, 0, 255]));
    assert_eq!(canvas.pixel(1, 0), Some([0, 255, 0, 255]));
}
