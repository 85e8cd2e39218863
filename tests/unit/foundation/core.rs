use super::*;
use crate::foundation::error::ErrorKind;

#[test]
fn canvas_size_rejects_zero() {
    assert!(CanvasSize::new(0, 10).is_err());
    assert_eq!(
        CanvasSize::new(4, 3).unwrap(),
        CanvasSize {
            width: 4,
            height: 3
        }
    );
}

#[test]
fn crop_zero_area_means_no_crop() {
    assert_eq!(CropRect::new(5, 5, 0, 10).resolve(20, 20).unwrap(), None);
    assert_eq!(CropRect::default().resolve(1, 1).unwrap(), None);
}

#[test]
fn crop_inside_bounds_resolves() {
    let r = CropRect::new(2, 3, 10, 5).resolve(12, 8).unwrap();
    assert_eq!(r, Some((2, 3, 10, 5)));
}

#[test]
fn crop_exceeding_bounds_is_geometry_error() {
    let err = CropRect::new(5, 0, 10, 4).resolve(12, 8).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Geometry);
}

#[test]
fn crop_negative_is_geometry_error() {
    let err = CropRect::new(-1, 0, 4, 4).resolve(12, 8).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Geometry);
    let err = CropRect::new(0, 0, -4, 4).resolve(12, 8).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Geometry);
}

#[test]
fn ids_display_with_prefix() {
    assert_eq!(LayerId(3).to_string(), "layer#3");
    assert_eq!(CollageId(9).to_string(), "collage#9");
}
