//! Top-level detailed-placement legalization (spec §4, §6).
//!
//! `legalize` wires the whole pipeline together: power assignment, grid
//! construction, initial placement, a refinement loop of local moves run
//! to convergence, a final invariant check, and the metrics report. Fatal
//! errors (bad config, infeasible fixed geometry, a broken invariant) abort
//! the run; per-cell placement and refinement failures are recoverable and
//! are counted in the report instead.

mod moves;
mod padding;
mod placer;
mod power;

pub use moves::{refine_move, shift_move, swap_move};
pub use padding::{apply_padding, contradictory_padding};
pub use placer::{design_utilization, initial_placement};
pub use power::assign_power;

use dp_config::LegalizeOptions;
use dp_db::Design;
use dp_errors::{LegalizeError, RecoverableError};
use dp_geometry::CellId;
use dp_grid::Grid;
use dp_metrics::{displacement_stats, group_utilization, hpwl, DisplacementStats, GroupUtilization};
use tracing::{debug, info, warn};

/// Outcome of a complete `legalize` run.
#[derive(Debug, Clone, PartialEq)]
pub struct LegalizeReport {
    pub cells_placed: usize,
    pub cells_unplaced: usize,
    /// Total moves committed across the whole refinement loop (`refine_move`,
    /// `shift_move`, and `swap_move` combined).
    pub refinement_moves_applied: usize,
    pub recoverable_errors: Vec<RecoverableError>,
    pub displacement: DisplacementStats,
    pub hpwl_initial_microns: f64,
    pub hpwl_final_microns: f64,
    pub group_utilization: Vec<GroupUtilization>,
}

/// Run the full pipeline against `design`, mutating it in place to its
/// legalized state. Returns a `LegalizeError` for anything that makes
/// the design itself infeasible; per-cell placement misses are reported
/// rather than propagated.
pub fn legalize(design: &mut dyn Design, options: &LegalizeOptions) -> Result<LegalizeReport, LegalizeError> {
    let hpwl_initial_microns = hpwl(design, true);

    padding::apply_padding(design, options)?;
    power::assign_power(design, options)?;
    let mut grid = dp_grid::build_grid(design)?;

    let mut recoverable_errors = placer::initial_placement(design, &mut grid, options);
    let (refinement_moves_applied, refinement_errors) = run_refinement(design, &mut grid, options);
    recoverable_errors.extend(refinement_errors);

    grid.check_invariants(design.cells(), design.macros())?;

    let cells_placed = design.cells().iter().filter(|c| !c.is_fixed && c.is_placed).count();
    let cells_unplaced = design.cells().iter().filter(|c| !c.is_fixed && !c.is_placed).count();

    if cells_unplaced > 0 {
        warn!(target: "dplace.legalize", cells_unplaced, "some cells could not be legally placed");
    } else {
        info!(target: "dplace.legalize", cells_placed, refinement_moves_applied, "legalization complete");
    }

    let displacement = displacement_stats(design);
    let hpwl_final_microns = hpwl(design, false);
    let group_utilization = group_utilization(design);

    Ok(LegalizeReport {
        cells_placed,
        cells_unplaced,
        refinement_moves_applied,
        recoverable_errors,
        displacement,
        hpwl_initial_microns,
        hpwl_final_microns,
        group_utilization,
    })
}

fn movable_placed_ids(design: &dyn Design) -> Vec<CellId> {
    design
        .cells()
        .iter()
        .enumerate()
        .filter(|(_, c)| !c.is_fixed && c.is_placed)
        .map(|(i, _)| CellId(i))
        .collect()
}

/// Run `refine_move`, `shift_move`, and `swap_move` over every movable,
/// placed cell, repeating full passes until one commits no move or
/// `options.refinement_pass_cap` passes have run (spec §4.G). Within a
/// pass, `shift_move` is only tried for a cell `refine_move` couldn't
/// improve, and `swap_move` runs over adjacent pairs in two offset
/// sub-passes so every neighboring pair gets a chance.
fn run_refinement(design: &mut dyn Design, grid: &mut Grid, options: &LegalizeOptions) -> (usize, Vec<RecoverableError>) {
    let mut applied = 0;
    let mut errors = Vec::new();

    for pass in 0..options.refinement_pass_cap {
        let ids = movable_placed_ids(design);
        let mut improved = false;

        for &id in &ids {
            if moves::refine_move(design, grid, options, id) {
                applied += 1;
                improved = true;
                continue;
            }
            match moves::shift_move(design, grid, options, id) {
                Ok(true) => {
                    applied += 1;
                    improved = true;
                }
                Ok(false) => {}
                Err(e) => {
                    debug!(target: "dplace.legalize", cell = ?id, "{e}");
                    errors.push(e);
                }
            }
        }

        for start in 0..2usize {
            let mut i = start;
            while i + 1 < ids.len() {
                if moves::swap_move(design, grid, ids[i], ids[i + 1]) {
                    applied += 1;
                    improved = true;
                }
                i += 2;
            }
        }

        if !improved {
            debug!(target: "dplace.legalize", pass, "refinement converged");
            break;
        }
    }

    (applied, errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dp_db::InMemoryDesign;
    use dp_geometry::{Cell, Macro, MacroId, MacroPin, Power, Rect};

    fn design() -> InMemoryDesign {
        let core = Rect::new(0, 0, 200, 40);
        let mut d = InMemoryDesign::new(10, 20, core);
        d.macros.push(Macro {
            name: "BUF".into(),
            width: 10,
            height_rows: 1,
            top_power: Some(Power::Vdd),
            is_multi_row: false,
            pins: vec![MacroPin {
                name: "A".into(),
                geometry: vec![],
            }],
        });
        d
    }

    #[test]
    fn legalize_places_every_movable_cell_in_an_empty_core() {
        let mut d = design();
        d.cells.push(Cell::new_movable("a", MacroId(0), 10, 20, 13, 3));
        d.cells.push(Cell::new_movable("b", MacroId(0), 10, 20, 77, 15));
        let opts = LegalizeOptions::default();
        let report = legalize(&mut d, &opts).unwrap();
        assert_eq!(report.cells_placed, 2);
        assert_eq!(report.cells_unplaced, 0);
        assert!(d.cells.iter().all(|c| c.is_placed));
    }

    #[test]
    fn legalize_resolves_two_overlapping_global_placements() {
        let mut d = design();
        d.cells.push(Cell::new_movable("a", MacroId(0), 10, 20, 50, 0));
        d.cells.push(Cell::new_movable("b", MacroId(0), 10, 20, 50, 0));
        let opts = LegalizeOptions::default();
        let report = legalize(&mut d, &opts).unwrap();
        assert_eq!(report.cells_unplaced, 0);
        assert_ne!(d.cells[0].x_pos, d.cells[1].x_pos);
    }
}
