//! Global placement padding (spec §4.J, §3 padding, `set_placement_padding`).
//!
//! `options.padding_left`/`padding_right` is a design-wide default applied
//! to every movable cell that hasn't already been given explicit per-cell
//! padding (the CLI's `set-placement-padding` command writes that explicit
//! value directly onto `Cell::pad_left`/`pad_right` before `legalize` runs).

use dp_config::LegalizeOptions;
use dp_db::Design;
use dp_errors::ConfigError;
use dp_geometry::CellId;

/// Apply the options-level default padding to every non-fixed cell that
/// has no padding of its own yet, then reject any cell (explicit or
/// defaulted) whose padding leaves no usable width.
///
/// Aborts on the first contradictory cell it finds: `legalize`'s pipeline
/// wants to fail the whole run as soon as the design is known infeasible
/// rather than keep scanning. `set-placement-padding` wants every offender
/// instead of just one, so it uses `contradictory_padding` below rather
/// than this function.
pub fn apply_padding(design: &mut dyn Design, options: &LegalizeOptions) -> Result<(), ConfigError> {
    let site_width = design.site_width();
    for cell in design.cells_mut() {
        if cell.is_fixed {
            continue;
        }
        if cell.pad_left == 0 && cell.pad_right == 0 {
            cell.pad_left = options.padding_left;
            cell.pad_right = options.padding_right;
        }
        let pad_dbu = (cell.pad_left as i64 + cell.pad_right as i64) * site_width;
        if pad_dbu >= cell.width {
            return Err(ConfigError::ContradictoryPadding {
                left: cell.pad_left,
                right: cell.pad_right,
                site_width,
            });
        }
    }
    Ok(())
}

/// Every non-fixed cell that would reject `options`' padding, without
/// mutating `design`. A cell that already carries its own explicit padding
/// is checked against that value rather than `options`', matching the
/// precedence `apply_padding` applies when it actually commits padding.
pub fn contradictory_padding(design: &dyn Design, options: &LegalizeOptions) -> Vec<CellId> {
    let site_width = design.site_width();
    design
        .cells()
        .iter()
        .enumerate()
        .filter(|(_, cell)| !cell.is_fixed)
        .filter_map(|(i, cell)| {
            let (left, right) = if cell.pad_left == 0 && cell.pad_right == 0 {
                (options.padding_left, options.padding_right)
            } else {
                (cell.pad_left, cell.pad_right)
            };
            let pad_dbu = (left as i64 + right as i64) * site_width;
            (pad_dbu >= cell.width).then_some(CellId(i))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use dp_db::InMemoryDesign;
    use dp_geometry::{Cell, MacroId, Rect};

    fn design() -> InMemoryDesign {
        InMemoryDesign::new(10, 20, Rect::new(0, 0, 200, 40))
    }

    #[test]
    fn default_padding_applies_when_cell_has_none() {
        let mut d = design();
        d.cells.push(Cell::new_movable("a", MacroId(0), 50, 20, 0, 0));
        let mut opts = LegalizeOptions::default();
        opts.padding_left = 1;
        opts.padding_right = 1;
        apply_padding(&mut d, &opts).unwrap();
        assert_eq!(d.cells[0].pad_left, 1);
        assert_eq!(d.cells[0].pad_right, 1);
    }

    #[test]
    fn explicit_cell_padding_is_not_overridden() {
        let mut d = design();
        let mut c = Cell::new_movable("a", MacroId(0), 50, 20, 0, 0);
        c.pad_left = 3;
        d.cells.push(c);
        let mut opts = LegalizeOptions::default();
        opts.padding_left = 1;
        apply_padding(&mut d, &opts).unwrap();
        assert_eq!(d.cells[0].pad_left, 3);
        assert_eq!(d.cells[0].pad_right, 0);
    }

    #[test]
    fn padding_that_consumes_the_whole_width_is_rejected() {
        let mut d = design();
        d.cells.push(Cell::new_movable("a", MacroId(0), 20, 20, 0, 0));
        let mut opts = LegalizeOptions::default();
        opts.padding_left = 1;
        opts.padding_right = 1;
        let err = apply_padding(&mut d, &opts).unwrap_err();
        assert!(matches!(err, ConfigError::ContradictoryPadding { .. }));
    }

    #[test]
    fn contradictory_padding_reports_every_rejecting_cell_not_just_the_first() {
        let mut d = design();
        d.cells.push(Cell::new_movable("a", MacroId(0), 20, 20, 0, 0));
        d.cells.push(Cell::new_movable("b", MacroId(0), 50, 20, 0, 0));
        d.cells.push(Cell::new_movable("c", MacroId(0), 20, 20, 0, 0));
        let mut opts = LegalizeOptions::default();
        opts.padding_left = 1;
        opts.padding_right = 1;
        let rejected = contradictory_padding(&d, &opts);
        assert_eq!(rejected, vec![CellId(0), CellId(2)]);
    }

    #[test]
    fn contradictory_padding_is_empty_when_all_cells_are_compatible() {
        let mut d = design();
        d.cells.push(Cell::new_movable("a", MacroId(0), 50, 20, 0, 0));
        let mut opts = LegalizeOptions::default();
        opts.padding_left = 1;
        opts.padding_right = 1;
        assert!(contradictory_padding(&d, &opts).is_empty());
    }
}
