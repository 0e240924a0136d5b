//! Property tests for the universal invariants every `legalize` run must
//! uphold, regardless of the specific cell layout fed in.

use dp_config::LegalizeOptions;
use dp_db::{Design, InMemoryDesign};
use dp_geometry::{Cell, MacroId, MacroPin, Macro, Power, Rect};
use dp_legalize::{legalize, swap_move};
use proptest::prelude::*;

const CORE_W: i64 = 2000;
const CORE_H: i64 = 400;
const SITE_W: i64 = 10;
const ROW_H: i64 = 20;

fn design_with_cells(targets: &[(i64, i64)]) -> InMemoryDesign {
    let mut d = InMemoryDesign::new(SITE_W, ROW_H, Rect::new(0, 0, CORE_W, CORE_H));
    d.macros.push(Macro {
        name: "BUF".into(),
        width: SITE_W,
        height_rows: 1,
        top_power: Some(Power::Vdd),
        is_multi_row: false,
        pins: vec![MacroPin {
            name: "A".into(),
            geometry: vec![],
        }],
    });
    for (i, &(gx, gy)) in targets.iter().enumerate() {
        d.cells.push(Cell::new_movable(format!("c{i}"), MacroId(0), SITE_W, ROW_H, gx, gy));
    }
    d
}

proptest! {
    /// Every cell `legalize` manages to place ends up on a footprint
    /// entirely inside the grid, with every invariant of the grid builder
    /// holding (coverage, exclusion, region, core legality).
    #[test]
    fn legalized_designs_satisfy_grid_invariants(
        targets in prop::collection::vec((0i64..CORE_W, 0i64..CORE_H), 1..12)
    ) {
        let mut d = design_with_cells(&targets);
        let opts = LegalizeOptions::default();
        let report = legalize(&mut d, &opts).unwrap();

        let mut grid = dp_grid::build_grid(&d).unwrap();
        let geometry = d.geometry();
        for i in 0..d.cells.len() {
            if d.cells[i].is_placed {
                let (x, y) = (d.cells[i].x_pos, d.cells[i].y_pos);
                grid.paint(dp_geometry::CellId(i), &mut d.cells[i], &geometry, x, y);
            }
        }
        prop_assert!(grid.check_invariants(&d.cells, &d.macros).is_ok());
        prop_assert_eq!(report.cells_placed + report.cells_unplaced, targets.len());
    }

    /// `swap_move` either leaves both cells exactly where it found them
    /// (benefit not strictly negative) or trades their grid positions
    /// exactly (no partial or off-by-one repaint).
    #[test]
    fn swap_move_either_trades_positions_exactly_or_changes_nothing(
        ax in 0i64..CORE_W, bx in 0i64..CORE_W
    ) {
        let mut d = design_with_cells(&[]);
        let mut grid = dp_grid::build_grid(&d).unwrap();
        let geometry = d.geometry();

        let mut a = Cell::new_movable("a", MacroId(0), SITE_W, ROW_H, ax, 0);
        let mut b = Cell::new_movable("b", MacroId(0), SITE_W, ROW_H, bx, 0);
        let ax_site = geometry.grid_x(ax).rem_euclid(geometry.grid_width().max(1));
        let bx_site = (ax_site + 1) % geometry.grid_width().max(2);
        grid.paint(dp_geometry::CellId(0), &mut a, &geometry, ax_site, 0);
        grid.paint(dp_geometry::CellId(1), &mut b, &geometry, bx_site, 0);
        d.cells.push(a);
        d.cells.push(b);

        let before_a = (d.cells[0].x_pos, d.cells[0].y_pos);
        let before_b = (d.cells[1].x_pos, d.cells[1].y_pos);

        let id_a = dp_geometry::CellId(0);
        let id_b = dp_geometry::CellId(1);
        let committed = swap_move(&mut d, &mut grid, id_a, id_b);

        let after_a = (d.cells[0].x_pos, d.cells[0].y_pos);
        let after_b = (d.cells[1].x_pos, d.cells[1].y_pos);
        if committed {
            prop_assert_eq!(after_a, before_b);
            prop_assert_eq!(after_b, before_a);
        } else {
            prop_assert_eq!(after_a, before_a);
            prop_assert_eq!(after_b, before_b);
        }
        prop_assert!(grid.check_invariants(&d.cells, &d.macros).is_ok());
    }
}
