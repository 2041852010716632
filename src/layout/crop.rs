//! Cropping card regions out of the atlas and drawing the grid overlay.

use image::{Rgba, RgbaImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

use super::grid::CardGrid;
use super::regions::Region;

const CELL_COLOR: Rgba<u8> = Rgba([255, 0, 0, 255]);
const REGION_COLOR: Rgba<u8> = Rgba([0, 200, 255, 255]);

/// Crops an absolute pixel rectangle from the atlas.
///
/// The rectangle is clamped to the atlas bounds, so a request running past the
/// right or bottom edge yields a smaller image rather than a panic.
pub fn crop_absolute(img: &RgbaImage, x: u32, y: u32, width: u32, height: u32) -> RgbaImage {
    let (w, h) = img.dimensions();

    let x0 = x.min(w);
    let y0 = y.min(h);
    let rw = width.min(w - x0);
    let rh = height.min(h - y0);

    image::imageops::crop_imm(img, x0, y0, rw, rh).to_image()
}

/// Draws cell borders and every region rectangle onto a copy of the atlas.
pub fn draw_grid_overlay(atlas: &RgbaImage, grid: &CardGrid, regions: &[Region]) -> RgbaImage {
    let mut canvas = atlas.clone();

    for cell in grid.cells() {
        let card = Rect::at(cell.offset_x as i32, cell.offset_y as i32)
            .of_size(grid.card_width, grid.card_height);
        draw_hollow_rect_mut(&mut canvas, card, CELL_COLOR);

        for region in regions.iter().filter(|r| r.width > 0 && r.height > 0) {
            let (x_abs, y_abs) = cell.absolute(region);
            let rect = Rect::at(x_abs as i32, y_abs as i32).of_size(region.width, region.height);
            draw_hollow_rect_mut(&mut canvas, rect, REGION_COLOR);
        }
    }

    canvas
}
