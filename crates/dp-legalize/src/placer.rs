//! Initial placement (spec §4.D): descending-area ordering, ties broken
//! by input order, each cell mapped via a two-pass diamond search.

use dp_config::LegalizeOptions;
use dp_db::Design;
use dp_errors::RecoverableError;
use dp_geometry::{Cell, CellId, Dbu, Geometry, Grid as GridCoord};
use dp_grid::Grid;
use dp_search::diamond_search;
use tracing::debug;

/// Fraction of the core's area claimed by movable cells. Feeds the
/// diamond-search ring-step divisor (dense designs search more finely).
pub fn design_utilization(design: &dyn Design) -> f64 {
    let geometry = design.geometry();
    let core_area = geometry.core.width() * geometry.core.height();
    if core_area <= 0 {
        return 0.0;
    }
    let movable_area: Dbu = design.cells().iter().filter(|c| !c.is_fixed).map(Cell::area).sum();
    movable_area as f64 / core_area as f64
}

/// Map `cell` near `(target_x, target_y)`: a diamond search to a
/// candidate pixel, then a second diamond search from that pixel's own
/// coordinates to see if an even closer legal slot exists nearby. Falls
/// back to the first candidate when the refinement search finds nothing.
pub(crate) fn map_move(
    grid: &Grid,
    cell: &Cell,
    design: &dyn Design,
    geometry: &Geometry,
    options: &LegalizeOptions,
    target_x: Dbu,
    target_y: Dbu,
    util: f64,
    fixed_count: usize,
) -> Option<(GridCoord, GridCoord)> {
    let group = cell.group.map(|g| &design.groups()[g.0]);
    let first = diamond_search(grid, cell, design.macros(), geometry, group, options, target_x, target_y, util, fixed_count)?;

    let refine_x = geometry.core.x_min + first.0 as Dbu * geometry.site_width;
    let refine_y = geometry.core.y_min + first.1 as Dbu * geometry.row_height;
    let refined = diamond_search(
        grid, cell, design.macros(), geometry, group, options, refine_x, refine_y, util, fixed_count,
    );
    refined.or(Some(first))
}

/// Place every movable cell, in descending-area order (ties by input
/// index), at the closest legal slot to its global-placement input.
/// Returns one `RecoverableError::PlacementFailure` per cell that could
/// not be placed; those cells are left unplaced rather than aborting
/// the run.
pub fn initial_placement(design: &mut dyn Design, grid: &mut Grid, options: &LegalizeOptions) -> Vec<RecoverableError> {
    let geometry = design.geometry();
    let util = design_utilization(design);
    let fixed_count = design.cells().iter().filter(|c| c.is_fixed).count();

    let mut order: Vec<usize> = design
        .cells()
        .iter()
        .enumerate()
        .filter(|(_, c)| !c.is_fixed)
        .map(|(i, _)| i)
        .collect();
    {
        let cells = design.cells();
        order.sort_by(|&a, &b| cells[b].area().cmp(&cells[a].area()).then(a.cmp(&b)));
    }

    let mut failures = Vec::new();
    for idx in order {
        let (target_x, target_y) = {
            let cell = &design.cells()[idx];
            (cell.global_x, cell.global_y)
        };
        let found = {
            let cell = &design.cells()[idx];
            map_move(grid, cell, design, &geometry, options, target_x, target_y, util, fixed_count)
        };
        match found {
            Some((gx, gy)) => {
                let cell = &mut design.cells_mut()[idx];
                grid.paint(CellId(idx), cell, &geometry, gx, gy);
            }
            None => {
                debug!(target: "dplace.placer", cell = idx, "initial placement failed");
                failures.push(RecoverableError::PlacementFailure { cell: CellId(idx) });
            }
        }
    }
    failures
}

#[cfg(test)]
mod tests {
    use super::*;
    use dp_db::InMemoryDesign;
    use dp_geometry::{Macro, MacroId, MacroPin, Rect};

    fn design() -> InMemoryDesign {
        let core = Rect::new(0, 0, 200, 40);
        let mut d = InMemoryDesign::new(10, 20, core);
        d.macros.push(Macro {
            name: "BUF".into(),
            width: 10,
            height_rows: 1,
            top_power: None,
            is_multi_row: false,
            pins: vec![MacroPin {
                name: "A".into(),
                geometry: vec![],
            }],
        });
        d
    }

    #[test]
    fn larger_cells_are_placed_before_smaller_ones() {
        let mut d = design();
        d.cells.push(Cell::new_movable("small", MacroId(0), 10, 20, 0, 0));
        let mut big = Cell::new_movable("big", MacroId(0), 20, 20, 0, 0);
        big.width = 20;
        d.cells.push(big);
        let opts = LegalizeOptions::default();
        let mut grid = dp_grid::build_grid(&d).unwrap();
        let failures = initial_placement(&mut d, &mut grid, &opts);
        assert!(failures.is_empty());
        assert!(d.cells[0].is_placed);
        assert!(d.cells[1].is_placed);
    }
}
