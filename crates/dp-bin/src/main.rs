//! `dplace`: a thin CLI front-end over the detailed-placement core (spec
//! §4.L). Parses a small textual design file, runs one of the four
//! command-surface operations against it, and reports the result.
//!
//! Exit code is `0` on success; any error variant below maps to a
//! non-zero exit, satisfying §6 without needing a custom exit-code path:
//! `anyhow`'s `main` wrapper already turns a returned `Err` into a
//! non-zero process exit.

mod design_file;
mod filler;

use std::path::{Path, PathBuf};
use std::sync::Once;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use dp_config::{ConfigFile, LegalizeOptions, PlacementSection};
use dp_db::{Design, InMemoryDesign};
use dp_geometry::MacroId;
use dp_grid::Grid;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;

#[derive(Parser, Debug)]
#[command(name = "dplace", version, about = "Grid-based detailed placement and legalization")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run `legalize(options)` over a design file and report the outcome.
    Legalize {
        design: PathBuf,
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        max_displacement_rows: Option<i64>,
        #[arg(long)]
        padding_left: Option<u32>,
        #[arg(long)]
        padding_right: Option<u32>,
        /// `vdd`, `vss`, or `undefined`.
        #[arg(long)]
        initial_power: Option<String>,
        #[arg(long)]
        disallow_one_site_gaps: bool,
    },
    /// Validate that a design file's given cell coordinates already form
    /// a legal placement, without moving anything.
    CheckPlacement { design: PathBuf },
    /// Apply a global left/right padding default to every movable cell
    /// and report the cells it would reject as contradictory.
    SetPlacementPadding {
        design: PathBuf,
        padding_left: u32,
        padding_right: u32,
    },
    /// Tile leftover empty row sites in an already-legal design with a
    /// filler macro.
    FillerPlacement {
        design: PathBuf,
        filler_macro: String,
    },
}

struct AppStartup {
    log_guard: Option<WorkerGuard>,
}

impl AppStartup {
    fn new() -> Self {
        Self { log_guard: None }
    }

    fn configure_logging(&mut self) -> Result<()> {
        let file_appender = tracing_appender::rolling::never(".", "dplace.log");
        let (nb_writer, guard) = tracing_appender::non_blocking(file_appender);
        match tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_writer(nb_writer)
            .try_init()
        {
            Ok(_) => self.log_guard = Some(guard),
            Err(_) => {
                // A global subscriber is already installed (e.g. under a test
                // harness); drop the guard so the writer shuts down cleanly.
            }
        }
        Ok(())
    }

    fn install_panic_hook() {
        static HOOK: Once = Once::new();
        HOOK.call_once(|| {
            let default_panic = std::panic::take_hook();
            std::panic::set_hook(Box::new(move |info| {
                error!(target: "dplace.panic", ?info, "panic");
                default_panic(info);
            }));
        });
    }
}

fn main() -> Result<()> {
    let mut startup = AppStartup::new();
    startup.configure_logging()?;
    AppStartup::install_panic_hook();

    let args = Args::parse();
    match args.command {
        Command::Legalize {
            design,
            config,
            max_displacement_rows,
            padding_left,
            padding_right,
            initial_power,
            disallow_one_site_gaps,
        } => run_legalize(
            &design,
            config,
            PlacementSection {
                max_displacement_rows,
                padding_left,
                padding_right,
                initial_power,
                disallow_one_site_gaps: if disallow_one_site_gaps { Some(true) } else { None },
                ..Default::default()
            },
        ),
        Command::CheckPlacement { design } => run_check_placement(&design),
        Command::SetPlacementPadding {
            design,
            padding_left,
            padding_right,
        } => run_set_placement_padding(&design, padding_left, padding_right),
        Command::FillerPlacement { design, filler_macro } => run_filler_placement(&design, &filler_macro),
    }
}

fn load_options(config: Option<PathBuf>, overrides: PlacementSection) -> LegalizeOptions {
    let file = dp_config::load_from(config);
    dp_config::effective_options(&file, &overrides)
}

fn run_legalize(design_path: &Path, config: Option<PathBuf>, overrides: PlacementSection) -> Result<()> {
    let mut design =
        design_file::parse_design_file(design_path).with_context(|| format!("parsing {}", design_path.display()))?;
    let options = load_options(config, overrides);

    let report = dp_legalize::legalize(&mut design, &options).map_err(|e| anyhow!(e))?;

    println!("cells placed:    {}", report.cells_placed);
    println!("cells unplaced:  {}", report.cells_unplaced);
    println!("refinement moves: {}", report.refinement_moves_applied);
    println!("hpwl (initial):  {:.3} um", report.hpwl_initial_microns);
    println!("hpwl (final):    {:.3} um", report.hpwl_final_microns);
    println!(
        "displacement:    avg {} sum {} max {} dbu",
        report.displacement.avg_displacement, report.displacement.sum_displacement, report.displacement.max_displacement
    );
    for g in &report.group_utilization {
        println!(
            "group {}: {} cells, utilization {:.1}% (available {:.1}%)",
            g.name,
            g.cell_count,
            g.utilization * 100.0,
            g.avail_utilization * 100.0
        );
    }
    for e in &report.recoverable_errors {
        warn!(target: "dplace.report", "{e}");
    }

    if report.cells_unplaced > 0 {
        return Err(anyhow!("{} cell(s) could not be legally placed", report.cells_unplaced));
    }
    info!(target: "dplace.report", "legalize run complete");
    Ok(())
}

/// Treat every non-fixed cell's parsed coordinate as its final placed
/// location rather than a global-placement input, so `check-placement`
/// and `filler-placement` can validate a design file that was already
/// legalized elsewhere.
fn mark_all_cells_placed(design: &mut InMemoryDesign) {
    let geometry = design.geometry();
    for cell in &mut design.cells {
        if cell.is_fixed {
            continue;
        }
        cell.x_pos = geometry.grid_x(cell.x_coord);
        cell.y_pos = geometry.grid_y(cell.y_coord);
        cell.is_placed = true;
    }
}

/// Build the occupancy grid and paint every placed cell onto it (not just
/// the fixed ones `dp_grid::build_grid` paints), so invariant checks see
/// the design's complete footprint.
fn build_full_grid(design: &mut InMemoryDesign) -> Result<Grid> {
    let geometry = design.geometry();
    let mut grid = dp_grid::build_grid(design).map_err(|e| anyhow!(e))?;
    for i in 0..design.cells.len() {
        if design.cells[i].is_fixed || !design.cells[i].is_placed {
            continue;
        }
        let (x, y) = (design.cells[i].x_pos, design.cells[i].y_pos);
        grid.paint(dp_geometry::CellId(i), &mut design.cells[i], &geometry, x, y);
    }
    Ok(grid)
}

fn run_check_placement(design_path: &Path) -> Result<()> {
    let mut design =
        design_file::parse_design_file(design_path).with_context(|| format!("parsing {}", design_path.display()))?;
    mark_all_cells_placed(&mut design);
    let grid = build_full_grid(&mut design)?;
    match grid.check_invariants(&design.cells, &design.macros) {
        Ok(()) => {
            println!("placement is legal: {} cells checked", design.cells.iter().filter(|c| !c.is_fixed).count());
            Ok(())
        }
        Err(e) => {
            println!("placement is illegal: {e}");
            Err(anyhow!(e))
        }
    }
}

fn run_set_placement_padding(design_path: &Path, padding_left: u32, padding_right: u32) -> Result<()> {
    let design =
        design_file::parse_design_file(design_path).with_context(|| format!("parsing {}", design_path.display()))?;
    let mut options = LegalizeOptions::default();
    options.padding_left = padding_left;
    options.padding_right = padding_right;

    let total = design.cells.iter().filter(|c| !c.is_fixed).count();
    let rejected = dp_legalize::contradictory_padding(&design, &options);

    if rejected.is_empty() {
        println!("padding left={padding_left} right={padding_right} is compatible with all {total} movable cell(s)");
        return Ok(());
    }

    for id in &rejected {
        println!(
            "cell {} rejects padding left={padding_left} right={padding_right}",
            design.cells[id.0].name
        );
    }
    Err(anyhow!(
        "{} of {total} movable cell(s) reject padding left={padding_left} right={padding_right}",
        rejected.len()
    ))
}

fn run_filler_placement(design_path: &Path, filler_macro: &str) -> Result<()> {
    let mut design =
        design_file::parse_design_file(design_path).with_context(|| format!("parsing {}", design_path.display()))?;
    let filler_id = design
        .macros
        .iter()
        .position(|m| m.name == filler_macro)
        .map(MacroId)
        .ok_or_else(|| anyhow!("no macro named `{filler_macro}` in the design library"))?;

    mark_all_cells_placed(&mut design);
    let mut grid = build_full_grid(&mut design)?;
    grid.check_invariants(&design.cells, &design.macros)
        .map_err(|e| anyhow!("refusing to fill gaps in an illegal placement: {e}"))?;

    let (inserted, unfilled_sites) = filler::fill_gaps(&mut design, &mut grid, filler_id);
    println!("inserted {inserted} filler cell(s), {unfilled_sites} site(s) left unfilled");
    Ok(())
}
