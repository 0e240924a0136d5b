//! Filler-cell insertion (spec §4.L `filler_placement`).
//!
//! Not part of the core legality model: run after `legalize` to tile every
//! leftover run of empty, valid, non-group sites in each row with
//! fixed-width instances of a chosen filler macro. Filler cells are marked
//! `is_fixed` so a later `legalize` run treats them as obstacles rather
//! than movable cells.

use dp_db::{Design, InMemoryDesign};
use dp_geometry::{Cell, CellId, MacroId};
use dp_grid::Grid;
use tracing::debug;

/// Tile empty row runs with `filler_macro` instances. Returns the number
/// of filler cells inserted; any leftover sites too narrow for one more
/// filler cell are reported via `unfilled_sites`.
pub fn fill_gaps(design: &mut InMemoryDesign, grid: &mut Grid, filler_macro: MacroId) -> (usize, usize) {
    let geometry = design.geometry();
    let filler_width_sites = {
        let m = &design.macros[filler_macro.0];
        (m.width / geometry.site_width).max(1) as i32
    };

    let mut inserted = 0;
    let mut unfilled_sites = 0;

    for y in 0..grid.height() {
        let mut x = 0;
        while x < grid.width() {
            if !is_empty(grid, x, y) {
                x += 1;
                continue;
            }
            let mut run = 0;
            while x + run < grid.width() && is_empty(grid, x + run, y) {
                run += 1;
            }
            let count = run / filler_width_sites;
            for k in 0..count {
                let gx = x + k * filler_width_sites;
                let dbu_x = geometry.core.x_min + gx as i64 * geometry.site_width;
                let dbu_y = geometry.core.y_min + y as i64 * geometry.row_height;
                let mut cell = Cell::new_movable(
                    format!("FILLER_{y}_{gx}"),
                    filler_macro,
                    filler_width_sites as i64 * geometry.site_width,
                    geometry.row_height,
                    dbu_x,
                    dbu_y,
                );
                cell.is_fixed = true;
                let id = CellId(design.cells.len());
                design.cells.push(cell);
                grid.paint(id, &mut design.cells[id.0], &geometry, gx, y);
                inserted += 1;
            }
            unfilled_sites += run - count * filler_width_sites;
            x += run;
        }
    }

    debug!(target: "dplace.filler", inserted, unfilled_sites, "filler placement complete");
    (inserted, unfilled_sites)
}

fn is_empty(grid: &Grid, x: i32, y: i32) -> bool {
    let px = grid.pixel(x, y);
    px.is_valid && px.cell.is_none() && px.group.is_none()
}
