//! Local refinement moves: shift, swap, and refine (spec §4.G).
//!
//! Each move either fully commits or leaves the grid exactly as it found
//! it; a partial failure partway through a multi-cell move rolls back
//! every pixel it touched rather than leaving a dangling erase.

use std::collections::HashSet;

use dp_config::LegalizeOptions;
use dp_db::Design;
use dp_errors::RecoverableError;
use dp_geometry::{manhattan, Cell, CellId, Dbu, Geometry, Grid as GridCoord, Rect};
use dp_grid::Grid;

use crate::placer::{design_utilization, map_move};

fn dist_benefit(cell: &Cell, target_x: Dbu, target_y: Dbu) -> Dbu {
    let curr = manhattan(cell.x_coord, cell.y_coord, cell.global_x, cell.global_y);
    let new = manhattan(cell.global_x, cell.global_y, target_x, target_y);
    new - curr
}

/// Every unique, non-fixed cell whose footprint intersects `rect`.
fn cells_in_region(grid: &Grid, geometry: &Geometry, rect: Rect, cells: &[Cell]) -> Vec<CellId> {
    let x0 = geometry.grid_x(rect.x_min).max(0);
    let y0 = geometry.grid_y(rect.y_min).max(0);
    let x1 = geometry.grid_x(rect.x_max).min(grid.width());
    let y1 = geometry.grid_y(rect.y_max).min(grid.height());

    let mut seen = HashSet::new();
    let mut list = Vec::new();
    for y in y0..y1 {
        for x in x0..x1 {
            if let Some(id) = grid.pixel(x, y).cell {
                if cells[id.0].is_fixed {
                    continue;
                }
                if seen.insert(id) {
                    list.push(id);
                }
            }
        }
    }
    list
}

/// Erase a 3x-padded envelope of cells around `target` (restricted to
/// cells whose group membership matches `target`'s), then re-place
/// `target` and every displaced neighbor at its own global-placement
/// input. Any single placement failure rolls every pixel this call
/// touched back to where it started.
///
/// `Ok(false)` means `target` itself had no legal slot (nothing moved);
/// `Err(RefinementFailure)` means a displaced neighbor failed to replay,
/// which also rolls the whole move back.
pub fn shift_move(
    design: &mut dyn Design,
    grid: &mut Grid,
    options: &LegalizeOptions,
    target: CellId,
) -> Result<bool, RecoverableError> {
    let geometry = design.geometry();
    let util = design_utilization(design);
    let fixed_count = design.cells().iter().filter(|c| c.is_fixed).count();

    let (gx, gy, padded_w, height, group_flag) = {
        let cell = &design.cells()[target.0];
        (cell.global_x, cell.global_y, geometry.padded_width(cell), cell.height, cell.in_group())
    };
    let envelope = Rect::new(
        (gx - padded_w * 3).max(geometry.core.x_min),
        (gy - height * 3).max(geometry.core.y_min),
        (gx + padded_w * 3).min(geometry.core.x_max),
        (gy + height * 3).min(geometry.core.y_max),
    );

    let neighbors: Vec<CellId> = {
        let cells = design.cells();
        cells_in_region(grid, &geometry, envelope, cells)
            .into_iter()
            .filter(|id| *id != target && cells[id.0].in_group() == group_flag)
            .collect()
    };

    let target_snapshot = {
        let c = &design.cells()[target.0];
        (c.x_pos, c.y_pos)
    };
    let neighbor_snapshot: Vec<(CellId, GridCoord, GridCoord)> = {
        let cells = design.cells();
        neighbors.iter().map(|&id| (id, cells[id.0].x_pos, cells[id.0].y_pos)).collect()
    };

    let rollback = |design: &mut dyn Design, grid: &mut Grid, geometry: &Geometry| {
        {
            let cell = &mut design.cells_mut()[target.0];
            grid.erase(target, cell, geometry);
        }
        let (tx, ty) = target_snapshot;
        {
            let cell = &mut design.cells_mut()[target.0];
            grid.paint(target, cell, geometry, tx, ty);
        }
        for &(id, x, y) in &neighbor_snapshot {
            {
                let cell = &mut design.cells_mut()[id.0];
                grid.erase(id, cell, geometry);
            }
            let cell = &mut design.cells_mut()[id.0];
            grid.paint(id, cell, geometry, x, y);
        }
    };

    for &id in &neighbors {
        let cell = &mut design.cells_mut()[id.0];
        grid.erase(id, cell, &geometry);
    }
    {
        let cell = &mut design.cells_mut()[target.0];
        grid.erase(target, cell, &geometry);
    }

    let target_slot = {
        let cell = &design.cells()[target.0];
        map_move(grid, cell, design, &geometry, options, gx, gy, util, fixed_count)
    };
    let Some((tx, ty)) = target_slot else {
        rollback(design, grid, &geometry);
        return Ok(false);
    };
    {
        let cell = &mut design.cells_mut()[target.0];
        grid.paint(target, cell, &geometry, tx, ty);
    }

    for &id in &neighbors {
        let (nx, ny) = {
            let cell = &design.cells()[id.0];
            (cell.global_x, cell.global_y)
        };
        let slot = {
            let cell = &design.cells()[id.0];
            map_move(grid, cell, design, &geometry, options, nx, ny, util, fixed_count)
        };
        match slot {
            Some((nxp, nyp)) => {
                let cell = &mut design.cells_mut()[id.0];
                grid.paint(id, cell, &geometry, nxp, nyp);
            }
            None => {
                rollback(design, grid, &geometry);
                return Err(RecoverableError::RefinementFailure { cell: target });
            }
        }
    }
    Ok(true)
}

/// Swap the grid positions of two same-macro, non-fixed cells when doing
/// so strictly reduces their combined displacement from global-placement
/// input.
pub fn swap_move(design: &mut dyn Design, grid: &mut Grid, a: CellId, b: CellId) -> bool {
    if a == b {
        return false;
    }
    let geometry = design.geometry();
    let (macro_a, macro_b, fixed_a, fixed_b) = {
        let cells = design.cells();
        (cells[a.0].macro_id, cells[b.0].macro_id, cells[a.0].is_fixed, cells[b.0].is_fixed)
    };
    if macro_a != macro_b || fixed_a || fixed_b {
        return false;
    }

    let benefit = {
        let cells = design.cells();
        dist_benefit(&cells[a.0], cells[b.0].x_coord, cells[b.0].y_coord)
            + dist_benefit(&cells[b.0], cells[a.0].x_coord, cells[a.0].y_coord)
    };
    if benefit >= 0 {
        return false;
    }

    let (ax, ay) = {
        let c = &design.cells()[a.0];
        (c.x_pos, c.y_pos)
    };
    let (bx, by) = {
        let c = &design.cells()[b.0];
        (c.x_pos, c.y_pos)
    };

    {
        let cell = &mut design.cells_mut()[a.0];
        grid.erase(a, cell, &geometry);
    }
    {
        let cell = &mut design.cells_mut()[b.0];
        grid.erase(b, cell, &geometry);
    }
    {
        let cell = &mut design.cells_mut()[a.0];
        grid.paint(a, cell, &geometry, bx, by);
    }
    {
        let cell = &mut design.cells_mut()[b.0];
        grid.paint(b, cell, &geometry, ax, ay);
    }
    true
}

/// Search for a strictly closer legal slot for `target` within
/// `max_displacement_rows` of its current position; commit only if it
/// strictly reduces displacement from global-placement input.
pub fn refine_move(design: &mut dyn Design, grid: &mut Grid, options: &LegalizeOptions, target: CellId) -> bool {
    let geometry = design.geometry();
    let util = design_utilization(design);
    let fixed_count = design.cells().iter().filter(|c| c.is_fixed).count();
    let (gx, gy) = {
        let c = &design.cells()[target.0];
        (c.global_x, c.global_y)
    };

    let found = {
        let cell = &design.cells()[target.0];
        map_move(grid, cell, design, &geometry, options, gx, gy, util, fixed_count)
    };
    let Some((px, py)) = found else {
        return false;
    };

    let new_x = geometry.core.x_min + px as Dbu * geometry.site_width;
    let new_y = geometry.core.y_min + py as Dbu * geometry.row_height;
    let new_dist = manhattan(gx, gy, new_x, new_y);
    if new_dist / geometry.row_height > options.max_displacement_rows {
        return false;
    }

    let benefit = {
        let cell = &design.cells()[target.0];
        dist_benefit(cell, new_x, new_y)
    };
    if benefit >= 0 {
        return false;
    }

    {
        let cell = &mut design.cells_mut()[target.0];
        grid.erase(target, cell, &geometry);
    }
    {
        let cell = &mut design.cells_mut()[target.0];
        grid.paint(target, cell, &geometry, px, py);
    }
    true
}
