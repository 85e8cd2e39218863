pub mod composite;
pub mod compositor;
pub mod raster;
