//! Atlas grid arithmetic.
//!
//! An atlas is split into `cols x rows` cards of a fixed size, enumerated in
//! row-major order. Any partial column or row left over at the right or
//! bottom edge is ignored.

use anyhow::{bail, Result};

use super::regions::Region;

/// Grid layout of an atlas.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CardGrid {
    pub atlas_width: u32,
    pub atlas_height: u32,
    pub card_width: u32,
    pub card_height: u32,
    pub cols: u32,
    pub rows: u32,
}

/// One card cell of the grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CardCell {
    pub index: u32,
    pub col: u32,
    pub row: u32,
    pub offset_x: u32,
    pub offset_y: u32,
}

impl CardGrid {
    /// Computes the grid for an atlas. Fails if not even one card fits.
    pub fn new(atlas_size: (u32, u32), card_size: (u32, u32)) -> Result<Self> {
        let (atlas_width, atlas_height) = atlas_size;
        let (card_width, card_height) = card_size;

        if card_width == 0 || card_height == 0 {
            bail!("Card size {}x{} must be non-zero", card_width, card_height);
        }

        let cols = atlas_width / card_width;
        let rows = atlas_height / card_height;
        if cols == 0 || rows == 0 {
            bail!(
                "Card size {}x{} is larger than atlas {}x{}",
                card_width,
                card_height,
                atlas_width,
                atlas_height
            );
        }

        Ok(Self {
            atlas_width,
            atlas_height,
            card_width,
            card_height,
            cols,
            rows,
        })
    }

    /// Number of cards in the grid.
    pub fn len(&self) -> u32 {
        self.cols * self.rows
    }

    /// Highest valid card index.
    pub fn max_index(&self) -> u32 {
        self.len() - 1
    }

    /// Returns the cell at a row-major index.
    pub fn cell(&self, index: u32) -> Option<CardCell> {
        if index >= self.len() {
            return None;
        }
        let col = index % self.cols;
        let row = index / self.cols;
        Some(CardCell {
            index,
            col,
            row,
            offset_x: col * self.card_width,
            offset_y: row * self.card_height,
        })
    }

    /// Iterates all cells in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = CardCell> + '_ {
        (0..self.len()).filter_map(move |i| self.cell(i))
    }
}

impl CardCell {
    /// Absolute atlas coordinates of a region's top-left corner in this cell.
    pub fn absolute(&self, region: &Region) -> (u32, u32) {
        (self.offset_x + region.x, self.offset_y + region.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_dimensions() {
        let grid = CardGrid::new((535 * 10, 752 * 7), (535, 752)).unwrap();
        assert_eq!(grid.cols, 10);
        assert_eq!(grid.rows, 7);
        assert_eq!(grid.len(), 70);
        assert_eq!(grid.max_index(), 69);
    }

    #[test]
    fn test_partial_cells_ignored() {
        let grid = CardGrid::new((250, 130), (100, 60)).unwrap();
        assert_eq!((grid.cols, grid.rows), (2, 2));
        assert_eq!(grid.cells().count(), 4);
    }

    #[test]
    fn test_grid_is_deterministic() {
        let a = CardGrid::new((1000, 900), (123, 45)).unwrap();
        let b = CardGrid::new((1000, 900), (123, 45)).unwrap();
        assert_eq!(a, b);
        assert!(a.cells().eq(b.cells()));
    }

    #[test]
    fn test_card_larger_than_atlas() {
        assert!(CardGrid::new((100, 100), (101, 50)).is_err());
        assert!(CardGrid::new((100, 100), (50, 101)).is_err());
        assert!(CardGrid::new((100, 100), (0, 10)).is_err());
    }

    #[test]
    fn test_cells_row_major() {
        let grid = CardGrid::new((300, 200), (100, 100)).unwrap();
        let cells: Vec<CardCell> = grid.cells().collect();
        assert_eq!(cells.len(), 6);
        assert_eq!((cells[2].col, cells[2].row), (2, 0));
        assert_eq!((cells[3].col, cells[3].row), (0, 1));
        assert_eq!((cells[4].offset_x, cells[4].offset_y), (100, 100));
        assert!(grid.cell(6).is_none());
    }

    #[test]
    fn test_absolute_is_offset_plus_region() {
        let grid = CardGrid::new((300, 200), (100, 100)).unwrap();
        let region = Region {
            name: "cost".to_string(),
            x: 7,
            y: 11,
            width: 10,
            height: 10,
        };
        for cell in grid.cells() {
            let (x_abs, y_abs) = cell.absolute(&region);
            assert_eq!(x_abs, cell.col * 100 + 7);
            assert_eq!(y_abs, cell.row * 100 + 11);
        }
    }
}
