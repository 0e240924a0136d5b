//! Post-legalization reporting: displacement statistics, HPWL, and group
//! utilization (spec §4.H).
//!
//! Every legality decision elsewhere in this workspace is exact integer
//! arithmetic in DBU; this is the one crate that converts to floating
//! point, and only for display.

use dp_db::Design;
use dp_geometry::{Dbu, Rect, Terminal};

/// Database units per micron, used only to render `hpwl_microns`.
pub const DBU_PER_MICRON: Dbu = 1000;

fn dbu_to_microns(v: Dbu) -> f64 {
    v as f64 / DBU_PER_MICRON as f64
}

/// Per-cell displacement summary (spec §4.H), all in DBU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DisplacementStats {
    pub avg_displacement: Dbu,
    pub sum_displacement: Dbu,
    pub max_displacement: Dbu,
}

/// Sum, max, and mean Manhattan displacement of every cell from its
/// frozen global-placement input. An empty design reports all zeros
/// rather than dividing by zero.
pub fn displacement_stats(design: &dyn Design) -> DisplacementStats {
    let geometry = design.geometry();
    let cells = design.cells();
    let mut sum = 0;
    let mut max = 0;
    for cell in cells {
        let d = geometry.displacement(cell);
        sum += d;
        if d > max {
            max = d;
        }
    }
    let avg = if cells.is_empty() { 0 } else { sum / cells.len() as Dbu };
    DisplacementStats {
        avg_displacement: avg,
        sum_displacement: sum,
        max_displacement: max,
    }
}

fn grow(acc: Option<Rect>, x: Dbu, y: Dbu) -> Option<Rect> {
    match acc {
        None => Some(Rect::new(x, y, x, y)),
        Some(r) => Some(Rect::new(r.x_min.min(x), r.y_min.min(y), r.x_max.max(x), r.y_max.max(y))),
    }
}

/// Half-perimeter wirelength summed over every net, in microns.
/// `initial` selects the cell coordinate used for instance terminals:
/// the frozen global-placement input when `true`, the current placed
/// location when `false` (spec §4.H, initial vs. final HPWL).
pub fn hpwl(design: &dyn Design, initial: bool) -> f64 {
    let geometry = design.geometry();
    let cells = design.cells();
    let mut total: Dbu = 0;

    for net in design.nets() {
        let mut bbox: Option<Rect> = None;
        for terminal in &net.terminals {
            match terminal {
                Terminal::Instance(it) => {
                    let cell = &cells[it.cell.0];
                    let (base_x, base_y) = if initial {
                        geometry.init_location(cell)
                    } else {
                        (cell.x_coord, cell.y_coord)
                    };
                    let point = it
                        .pin_index
                        .and_then(|pin_idx| design.macros()[cell.macro_id.0].pins.get(pin_idx))
                        .and_then(|pin| pin.geometry.first())
                        .map(|rect| (base_x + (rect.x_min + rect.x_max) / 2, base_y + (rect.y_min + rect.y_max) / 2))
                        .unwrap_or((base_x, base_y));
                    bbox = grow(bbox, point.0, point.1);
                }
                Terminal::Block(bt) => {
                    if !bt.is_placed {
                        continue;
                    }
                    if let Some(rect) = bt.pins.first() {
                        let cx = (rect.x_min + rect.x_max) / 2;
                        let cy = (rect.y_min + rect.y_max) / 2;
                        bbox = grow(bbox, cx, cy);
                    }
                }
            }
        }
        if let Some(b) = bbox {
            total += b.width() + b.height();
        }
    }
    dbu_to_microns(total)
}

/// Utilization report for one region-constrained group (spec §4.H).
#[derive(Debug, Clone, PartialEq)]
pub struct GroupUtilization {
    pub name: String,
    pub region_count: usize,
    pub cell_count: usize,
    pub region_area: Dbu,
    pub avail_region_area: Dbu,
    pub cell_area: Dbu,
    pub utilization: f64,
    pub avail_utilization: f64,
}

/// Region and available-region area, cell area, and both utilization
/// ratios for every group. The reference implementation shrinks each
/// region's available area by hard-coded 200/2000-DBU margins; here the
/// margin is derived from the design's own site width and row height,
/// so the shrinkage scales with the library instead of assuming a fixed
/// process.
pub fn group_utilization(design: &dyn Design) -> Vec<GroupUtilization> {
    let geometry = design.geometry();
    design
        .groups()
        .iter()
        .map(|group| {
            let mut region_area: Dbu = 0;
            let mut avail_region_area: Dbu = 0;
            for rect in &group.regions {
                region_area += rect.width() * rect.height();

                let avail_w = rect.width() - rect.x_max % geometry.site_width + rect.x_min % geometry.site_width
                    - geometry.site_width;
                let avail_h = rect.height() - rect.y_max % geometry.row_height + rect.y_min % geometry.row_height
                    - 10 * geometry.row_height;
                avail_region_area += avail_w.max(0) * avail_h.max(0);
            }

            let cell_area: Dbu = group
                .members
                .iter()
                .map(|id| design.cells()[id.0].area())
                .sum();

            let utilization = if region_area > 0 {
                cell_area as f64 / region_area as f64
            } else {
                0.0
            };
            let avail_utilization = if avail_region_area > 0 {
                cell_area as f64 / avail_region_area as f64
            } else {
                0.0
            };

            GroupUtilization {
                name: group.name.clone(),
                region_count: group.regions.len(),
                cell_count: group.members.len(),
                region_area,
                avail_region_area,
                cell_area,
                utilization,
                avail_utilization,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use dp_db::InMemoryDesign;
    use dp_geometry::{BlockTerminal, Cell, InstTerminal, MacroId, MacroPin, Macro, Net};

    fn base_design() -> InMemoryDesign {
        let core = Rect::new(0, 0, 1000, 1000);
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
    fn displacement_stats_empty_design_is_zero() {
        let d = base_design();
        let stats = displacement_stats(&d);
        assert_eq!(stats, DisplacementStats::default());
    }

    #[test]
    fn displacement_stats_tracks_sum_and_max() {
        let mut d = base_design();
        let mut a = Cell::new_movable("a", MacroId(0), 10, 20, 0, 0);
        a.x_coord = 30;
        a.y_coord = 0;
        a.is_placed = true;
        let mut b = Cell::new_movable("b", MacroId(0), 10, 20, 100, 0);
        b.x_coord = 100;
        b.y_coord = 0;
        b.is_placed = true;
        d.cells.push(a);
        d.cells.push(b);
        let stats = displacement_stats(&d);
        assert_eq!(stats.sum_displacement, 30);
        assert_eq!(stats.max_displacement, 30);
        assert_eq!(stats.avg_displacement, 15);
    }

    #[test]
    fn hpwl_sums_net_bounding_box_perimeters() {
        let mut d = base_design();
        let mut a = Cell::new_movable("a", MacroId(0), 10, 20, 0, 0);
        a.x_coord = 0;
        a.y_coord = 0;
        a.is_placed = true;
        let mut b = Cell::new_movable("b", MacroId(0), 10, 20, 100, 0);
        b.x_coord = 100;
        b.y_coord = 50;
        b.is_placed = true;
        d.cells.push(a);
        d.cells.push(b);
        d.nets.push(Net {
            name: "n0".into(),
            terminals: vec![
                Terminal::Instance(InstTerminal {
                    cell: dp_geometry::CellId(0),
                    pin_index: None,
                }),
                Terminal::Instance(InstTerminal {
                    cell: dp_geometry::CellId(1),
                    pin_index: None,
                }),
            ],
        });
        // perimeter = dx(100) + dy(50) = 150 DBU = 0.15 microns.
        assert_eq!(hpwl(&d, false), 0.15);
    }

    #[test]
    fn hpwl_ignores_unplaced_block_terminals() {
        let mut d = base_design();
        d.nets.push(Net {
            name: "n0".into(),
            terminals: vec![Terminal::Block(BlockTerminal {
                pins: vec![Rect::new(0, 0, 10, 10)],
                is_placed: false,
            })],
        });
        assert_eq!(hpwl(&d, false), 0.0);
    }

    #[test]
    fn group_utilization_reports_zero_for_empty_region() {
        let mut d = base_design();
        d.groups.push(dp_geometry::Group {
            name: "G".into(),
            regions: vec![],
            members: vec![],
        });
        let reports = group_utilization(&d);
        assert_eq!(reports[0].utilization, 0.0);
        assert_eq!(reports[0].avail_utilization, 0.0);
    }
}
