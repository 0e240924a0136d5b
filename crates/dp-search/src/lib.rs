//! Diamond search and bin search: the heart of detailed placement (spec
//! §4.E, §4.F).
//!
//! `diamond_search` enumerates candidate anchors ring by ring around a
//! target coordinate in order of increasing Manhattan distance, calling
//! `bin_search` at each candidate to test a narrow horizontal window for a
//! fully legal slot. The `×5` envelope stretch and `×10` ring step bias
//! the search along rows, since row movement is far more expensive than
//! column movement (power polarity, row snap).

use dp_config::LegalizeOptions;
use dp_geometry::{manhattan, Cell, Dbu, Geometry, Grid as GridCoord, Group, Macro};
use dp_grid::Grid;
use tracing::trace;

/// Test a `bin_search_window`-site horizontal window anchored at
/// `(anchor_x, anchor_y)` for a fully legal slot. `target_x_grid` decides
/// scan direction: rightward-preferring when the desired column is to the
/// right of the window, leftward-preferring otherwise.
pub fn bin_search(
    grid: &Grid,
    cell: &Cell,
    macros: &[Macro],
    geometry: &Geometry,
    options: &LegalizeOptions,
    target_x_grid: GridCoord,
    anchor_x: GridCoord,
    anchor_y: GridCoord,
) -> Option<(GridCoord, GridCoord)> {
    if anchor_y < 0 || anchor_x < 0 {
        return None;
    }
    let macro_ = &macros[cell.macro_id.0];
    let w = geometry.grid_nearest_width(cell);
    let h = geometry.grid_nearest_height(cell);

    if anchor_y + h > grid.height() {
        return None;
    }
    if h % 2 == 0 && Some(grid.row_top_power(anchor_y)) == macro_.top_power {
        return None;
    }

    let window = options.bin_search_window;
    let indices: Box<dyn Iterator<Item = GridCoord>> = if target_x_grid > anchor_x {
        Box::new((0..window).rev())
    } else {
        Box::new(0..window)
    };

    for i in indices {
        if anchor_x + i + w > grid.width() {
            continue;
        }
        if grid.is_window_legal(cell, anchor_x + i, anchor_y, w, h) {
            return Some((anchor_x + i, anchor_y));
        }
    }
    None
}

/// Find a legal anchor for `cell` close to `(target_x, target_y)` (DBU),
/// enumerating rings of increasing Manhattan-distance radius. `group`
/// must be `Some` iff the cell belongs to a group, clipping the search
/// envelope to that group's region bounding box. `design_util` and
/// `fixed_inst_count` select the ring step divisor, matching the
/// reference implementation's density-aware search density.
#[allow(clippy::too_many_arguments)]
pub fn diamond_search(
    grid: &Grid,
    cell: &Cell,
    macros: &[Macro],
    geometry: &Geometry,
    group: Option<&Group>,
    options: &LegalizeOptions,
    target_x: Dbu,
    target_y: Dbu,
    design_util: f64,
    fixed_inst_count: usize,
) -> Option<(GridCoord, GridCoord)> {
    let x_pos = geometry.grid_x(target_x);
    let y_pos = geometry.grid_y(target_y);
    let h = options.diamond_search_height;
    let stretch = options.envelope_stretch;
    let cell_w = geometry.grid_nearest_width(cell);
    let cell_h = geometry.grid_nearest_height(cell);

    let (x_start, x_end, y_start, y_end) = if let Some(g) = group {
        let Some(bb) = g.bounding_box() else {
            return None;
        };
        (
            (x_pos - h * stretch).max(geometry.grid_x(bb.x_min)),
            (x_pos + h * stretch).min(geometry.grid_x(bb.x_max) - cell_w),
            (y_pos - h).max(geometry.grid_y(bb.y_min)),
            (y_pos + h).min(geometry.grid_y(bb.y_max) - cell_h),
        )
    } else {
        (
            (x_pos - h * stretch).max(0),
            (x_pos + h * stretch).min(grid.width() - cell_w),
            (y_pos - h).max(0),
            (y_pos + h).min(grid.height() - cell_h),
        )
    };

    if x_start > x_end || y_start > y_end {
        return None;
    }

    let clamp_x = |x: GridCoord| x.clamp(x_start, x_end);
    let clamp_y = |y: GridCoord| y.clamp(y_start, y_end);

    if let Some(p) = bin_search(grid, cell, macros, geometry, options, x_pos, clamp_x(x_pos), clamp_y(y_pos)) {
        return Some(p);
    }

    let div = if design_util > options.density_threshold || fixed_inst_count > 0 {
        options.diamond_div_dense
    } else {
        options.diamond_div_sparse
    };
    if div <= 0 {
        return None;
    }

    let dist_to_target = |ax: GridCoord, ay: GridCoord| -> Dbu {
        let dbu_x = geometry.core.x_min + ax as Dbu * geometry.site_width;
        let dbu_y = geometry.core.y_min + ay as Dbu * geometry.row_height;
        manhattan(target_x, target_y, dbu_x, dbu_y)
    };

    let ring_limit = h * 2 / div;
    for i in 1..ring_limit {
        let mut found: Vec<(GridCoord, GridCoord)> = Vec::with_capacity((i as usize) * 4);

        for j in 1..i * 2 {
            let x_offset = -((j + 1) / 2);
            let y_offset = if j % 2 == 1 { (i * 2 - j) / 2 } else { -((i * 2 - j) / 2) };
            let bx = clamp_x(x_pos + x_offset * options.ring_step);
            let by = clamp_y(y_pos + y_offset);
            if let Some(p) = bin_search(grid, cell, macros, geometry, options, x_pos, bx, by) {
                found.push(p);
            }
        }

        for j in 1..(i + 1) * 2 {
            let x_offset = (j - 1) / 2;
            let y_offset = if j % 2 == 1 {
                ((i + 1) * 2 - j) / 2
            } else {
                -(((i + 1) * 2 - j) / 2)
            };
            let bx = clamp_x(x_pos + x_offset * options.ring_step);
            let by = clamp_y(y_pos + y_offset);
            if let Some(p) = bin_search(grid, cell, macros, geometry, options, x_pos, bx, by) {
                found.push(p);
            }
        }

        if let Some(&best) = found.iter().min_by_key(|(ax, ay)| dist_to_target(*ax, *ay)) {
            trace!(target: "dplace.diamond_search", cell = cell.name.as_str(), ring = i, "found candidate");
            return Some(best);
        }
    }
    None
}
