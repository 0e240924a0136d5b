//! The 2-D occupancy grid: allocation, fixed-cell/group painting, and the
//! paint/erase primitives every local move is built from (spec §3, §4.C).
//!
//! The grid is a flat arena indexed `[y * width + x]`, never a grid of
//! boxed rows — pixels are plain data, and a cell's footprint is a pure
//! index range into that arena. Back-references are `CellId`/`GroupId`
//! indices, never pointers, so painting and erasing are index updates with
//! no aliasing concerns.

use dp_db::Design;
use dp_errors::{GeometricError, InvariantError};
use dp_geometry::{Cell, CellId, Geometry, Grid as GridCoord, GroupId, Macro, Power};
use tracing::{debug, trace};

/// One cell of the occupancy grid.
#[derive(Debug, Clone, Copy)]
pub struct Pixel {
    pub cell: Option<CellId>,
    pub group: Option<GroupId>,
    pub is_valid: bool,
    pub x_pos: GridCoord,
    pub y_pos: GridCoord,
}

/// The occupancy grid plus the per-row power polarity it was built with.
pub struct Grid {
    width: GridCoord,
    height: GridCoord,
    pixels: Vec<Pixel>,
    row_top_power: Vec<Power>,
}

impl Grid {
    fn new(width: GridCoord, height: GridCoord, row_top_power: Vec<Power>) -> Self {
        let mut pixels = Vec::with_capacity((width as usize) * (height as usize));
        for y in 0..height {
            for x in 0..width {
                pixels.push(Pixel {
                    cell: None,
                    group: None,
                    is_valid: true,
                    x_pos: x,
                    y_pos: y,
                });
            }
        }
        Self {
            width,
            height,
            pixels,
            row_top_power,
        }
    }

    pub fn width(&self) -> GridCoord {
        self.width
    }

    pub fn height(&self) -> GridCoord {
        self.height
    }

    fn idx(&self, x: GridCoord, y: GridCoord) -> usize {
        (y as usize) * (self.width as usize) + (x as usize)
    }

    pub fn pixel(&self, x: GridCoord, y: GridCoord) -> &Pixel {
        &self.pixels[self.idx(x, y)]
    }

    fn pixel_mut(&mut self, x: GridCoord, y: GridCoord) -> &mut Pixel {
        let i = self.idx(x, y);
        &mut self.pixels[i]
    }

    pub fn row_top_power(&self, y: GridCoord) -> Power {
        self.row_top_power[y as usize]
    }

    pub fn in_bounds(&self, x: GridCoord, y: GridCoord) -> bool {
        x >= 0 && y >= 0 && x < self.width && y < self.height
    }

    /// True iff the `w x h` window anchored at `(x, y)` is entirely inside
    /// the grid, `is_valid`, unoccupied, and region-compatible with `cell`
    /// (invariants 4 and 5; invariant 3's power test is a separate
    /// per-anchor-row check since it doesn't vary with the window's x).
    pub fn is_window_legal(&self, cell: &Cell, x: GridCoord, y: GridCoord, w: GridCoord, h: GridCoord) -> bool {
        if x < 0 || y < 0 || x + w > self.width || y + h > self.height {
            return false;
        }
        for yy in y..y + h {
            for xx in x..x + w {
                let px = self.pixel(xx, yy);
                if !px.is_valid || px.cell.is_some() {
                    return false;
                }
                if cell.in_group() {
                    if px.group != cell.group {
                        return false;
                    }
                } else if px.group.is_some() {
                    return false;
                }
            }
        }
        true
    }

    /// Paint `cell`'s padded footprint at `(x, y)` and update its anchor
    /// fields so `(x_pos, y_pos)` and `(x_coord, y_coord)` stay in sync
    /// with the pixels it occupies.
    pub fn paint(&mut self, id: CellId, cell: &mut Cell, geometry: &Geometry, x: GridCoord, y: GridCoord) {
        let w = geometry.grid_nearest_width(cell);
        let h = geometry.grid_nearest_height(cell);
        for yy in y..y + h {
            for xx in x..x + w {
                self.pixel_mut(xx, yy).cell = Some(id);
            }
        }
        cell.x_pos = x;
        cell.y_pos = y;
        cell.x_coord = geometry.core.x_min + x as dp_geometry::Dbu * geometry.site_width;
        cell.y_coord = geometry.core.y_min + y as dp_geometry::Dbu * geometry.row_height;
        cell.is_placed = true;
        trace!(target: "dplace.grid", cell = cell.name.as_str(), x, y, "paint_pixel");
    }

    /// Clear the pixels `cell` currently occupies, per its own
    /// `(x_pos, y_pos)`. A no-op pair with `paint` at the same anchor:
    /// `erase(c); paint(c, c.x_pos, c.y_pos)` restores the grid exactly.
    pub fn erase(&mut self, id: CellId, cell: &mut Cell, geometry: &Geometry) {
        if !cell.is_placed {
            return;
        }
        let w = geometry.grid_nearest_width(cell);
        let h = geometry.grid_nearest_height(cell);
        for yy in cell.y_pos..cell.y_pos + h {
            for xx in cell.x_pos..cell.x_pos + w {
                let px = self.pixel_mut(xx, yy);
                if px.cell == Some(id) {
                    px.cell = None;
                }
            }
        }
        cell.is_placed = false;
        trace!(target: "dplace.grid", cell = cell.name.as_str(), "erase_pixel");
    }

    /// Check every §3 invariant across every placed, non-fixed cell.
    /// Returns the first violation found, naming the offending cell/pixel.
    pub fn check_invariants(&self, cells: &[Cell], macros: &[Macro]) -> Result<(), InvariantError> {
        for (i, cell) in cells.iter().enumerate() {
            if cell.is_fixed || !cell.is_placed {
                continue;
            }
            self.check_cell_invariants(CellId(i), cell, macros)?;
        }
        Ok(())
    }

    /// Row height of `cell`'s macro is authoritative for the invariant
    /// check; the claimed width is recovered by scanning pixels rightward
    /// from `x_pos` so a stale anchor is caught rather than trusted.
    fn check_cell_invariants(&self, id: CellId, cell: &Cell, macros: &[Macro]) -> Result<(), InvariantError> {
        let macro_ = &macros[cell.macro_id.0];
        let h = macro_.height_rows as GridCoord;

        if cell.x_pos < 0 || cell.y_pos < 0 || cell.y_pos + h > self.height || cell.x_pos >= self.width {
            return Err(InvariantError::FootprintOutsideGrid { cell: id });
        }

        // Scan rightward from x_pos until we hit a pixel not owned by this
        // cell; that is the cell's actual claimed width.
        let mut w = 0;
        while cell.x_pos + w < self.width && self.pixel(cell.x_pos + w, cell.y_pos).cell == Some(id) {
            w += 1;
        }
        if w == 0 {
            return Err(InvariantError::CoverageInvalidPixel {
                x: cell.x_pos,
                y: cell.y_pos,
                cell: id,
            });
        }
        if cell.x_pos + w > self.width {
            return Err(InvariantError::FootprintOutsideGrid { cell: id });
        }

        for yy in cell.y_pos..cell.y_pos + h {
            for xx in cell.x_pos..cell.x_pos + w {
                let px = self.pixel(xx, yy);
                if px.cell != Some(id) || !px.is_valid {
                    return Err(InvariantError::CoverageInvalidPixel { x: xx, y: yy, cell: id });
                }
                if cell.in_group() {
                    if px.group != cell.group {
                        return Err(InvariantError::RegionMismatch { cell: id });
                    }
                } else if px.group.is_some() {
                    return Err(InvariantError::RegionMismatch { cell: id });
                }
            }
        }

        // Odd-height footprints have their bottom and top row on the same
        // rail by construction (alternation over an even offset), so a
        // cell's orientation can always be chosen to match; only
        // even-height footprints straddle both rails and need checking
        // (mirrors the parity test `diamond_search`/`bin_search` place by).
        if h % 2 == 0 {
            if let Some(top_power) = macro_.top_power {
                let top_row = cell.y_pos + h - 1;
                if self.row_top_power(top_row) != top_power {
                    return Err(InvariantError::PowerMismatch { cell: id });
                }
            }
        }

        Ok(())
    }
}

/// Build the grid per spec §4.C: allocate, paint fixed cells, mark group
/// regions, then validate that no non-group cell's global-placed anchor
/// falls inside a group region.
pub fn build_grid(design: &dyn Design) -> Result<Grid, GeometricError> {
    let geometry = design.geometry();
    let width = geometry.grid_width();
    let height = geometry.grid_height();
    let row_power = design.rows().iter().map(|r| r.top_power).collect();
    let mut grid = Grid::new(width, height, row_power);

    for (i, cell) in design.cells().iter().enumerate() {
        if !cell.is_fixed {
            continue;
        }
        let id = CellId(i);
        let footprint = dp_geometry::Rect::new(
            cell.x_coord,
            cell.y_coord,
            cell.x_coord + geometry.padded_width(cell),
            cell.y_coord + cell.height,
        );
        if !footprint.inside(&geometry.core) {
            return Err(GeometricError::FixedCellOutsideCore { cell: id });
        }
        let gx = geometry.grid_x(cell.x_coord);
        let gy = geometry.grid_y(cell.y_coord);
        let w = geometry.grid_nearest_width(cell);
        let h = geometry.grid_nearest_height(cell);
        for yy in gy..gy + h {
            for xx in gx..gx + w {
                if !grid.in_bounds(xx, yy) {
                    continue;
                }
                let px = grid.pixel_mut(xx, yy);
                if let Some(existing) = px.cell {
                    return Err(GeometricError::FixedCellOverlap { a: existing, b: id });
                }
                px.cell = Some(id);
            }
        }
        debug!(target: "dplace.grid", cell = cell.name.as_str(), "painted fixed cell");
    }

    for (gi, group) in design.groups().iter().enumerate() {
        let gid = GroupId(gi);
        for region in &group.regions {
            if !region.inside(&geometry.core) {
                return Err(GeometricError::GroupRegionOutsideCore { group: gid });
            }
            let x0 = geometry.grid_x(region.x_min);
            let y0 = geometry.grid_y(region.y_min);
            let x1 = geometry.grid_x(region.x_max);
            let y1 = geometry.grid_y(region.y_max);
            for yy in y0..y1 {
                for xx in x0..x1 {
                    if grid.in_bounds(xx, yy) {
                        grid.pixel_mut(xx, yy).group = Some(gid);
                    }
                }
            }
        }
    }

    for (i, cell) in design.cells().iter().enumerate() {
        if cell.is_fixed || cell.in_group() {
            continue;
        }
        let gx = geometry.grid_x(cell.global_x);
        let gy = geometry.grid_y(cell.global_y);
        if grid.in_bounds(gx, gy) {
            if let Some(gid) = grid.pixel(gx, gy).group {
                return Err(GeometricError::NonGroupCellInsideGroupRegion {
                    cell: CellId(i),
                    group: gid,
                });
            }
        }
    }

    debug!(target: "dplace.grid", width, height, "grid built");
    Ok(grid)
}
