//! Card layout: regions files, the atlas grid, and cropping.

pub mod crop;
pub mod grid;
pub mod regions;

pub use crop::{crop_absolute, draw_grid_overlay};
pub use grid::{CardCell, CardGrid};
pub use regions::{load_regions, save_regions, validate_regions, Region};
