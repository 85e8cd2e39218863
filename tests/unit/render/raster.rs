use super::*;

#[test]
fn transparent_is_zeroed() {
    let r = Raster::transparent(3, 2).unwrap();
    assert_eq!(r.data.len(), 24);
    assert!(r.data.iter().all(|&b| b == 0));
}

#[test]
fn oversized_allocation_is_an_error() {
    let err = Raster::transparent(200_000, 200_000).unwrap_err();
    assert!(matches!(err, CollageError::Geometry(_)));
    assert!(Raster::filled(MAX_RASTER_DIM + 1, 1, [0; 4]).is_err());
    assert!(Raster::transparent(MAX_RASTER_DIM, 1).is_ok());
}

#[test]
fn from_premul_checks_length() {
    assert!(Raster::from_premul(2, 2, vec![0; 15]).is_err());
    assert!(Raster::from_premul(2, 2, vec![0; 16]).is_ok());
}

#[test]
fn bilinear_at_pixel_center_is_exact() {
    let mut r = Raster::transparent(2, 1).unwrap();
    r.put_pixel(0, 0, [10, 20, 30, 255]);
    r.put_pixel(1, 0, [200, 100, 50, 255]);
    assert_eq!(r.sample_bilinear(0.5, 0.5, EdgeMode::Clamp), [10, 20, 30, 255]);
    assert_eq!(r.sample_bilinear(1.5, 0.5, EdgeMode::Clamp), [200, 100, 50, 255]);
}

#[test]
fn bilinear_midpoint_averages() {
    let mut r = Raster::transparent(2, 1).unwrap();
    r.put_pixel(0, 0, [0, 0, 0, 255]);
    r.put_pixel(1, 0, [200, 200, 200, 255]);
    assert_eq!(r.sample_bilinear(1.0, 0.5, EdgeMode::Clamp), [100, 100, 100, 255]);
}

#[test]
fn transparent_edge_fades_out() {
    let r = Raster::filled(1, 1, [255, 255, 255, 255]).unwrap();
    assert_eq!(r.sample_bilinear(-3.0, 0.5, EdgeMode::Transparent), [0, 0, 0, 0]);
    assert_eq!(r.sample_bilinear(-3.0, 0.5, EdgeMode::Clamp), [255, 255, 255, 255]);
    let half = r.sample_bilinear(0.0, 0.5, EdgeMode::Transparent);
    assert_eq!(half[3], 128);
}

#[test]
fn sub_image_copies_rows() {
    let mut r = Raster::transparent(3, 3).unwrap();
    r.put_pixel(1, 1, [9, 9, 9, 9]);
    r.put_pixel(2, 2, [7, 7, 7, 7]);
    let sub = r.sub_image(1, 1, 2, 2).unwrap();
    assert_eq!(sub.dimensions(), (2, 2));
    assert_eq!(sub.pixel(0, 0), Some([9, 9, 9, 9]));
    assert_eq!(sub.pixel(1, 1), Some([7, 7, 7, 7]));
    assert!(r.sub_image(2, 2, 2, 1).is_err());
}
