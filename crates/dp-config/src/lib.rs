//! Layered configuration for `legalize(options)` (spec §4.J).
//!
//! Three layers, lowest to highest precedence: struct defaults, an
//! optional `dplace.toml` file, then explicit caller/CLI overrides. Parse
//! errors in the file fall back to defaults rather than aborting, matching
//! the forward-compatible tolerance this codebase already uses for its own
//! TOML configuration.

use serde::Deserialize;
use std::{fs, path::PathBuf};
use tracing::{debug, warn};

/// Power-rail intent for the bottom row, or `Undefined` to let power
/// assignment infer it from the macro library (spec §4.B).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PowerIntent {
    Vdd,
    Vss,
    #[default]
    Undefined,
}

impl PowerIntent {
    fn parse(s: &str) -> Option<PowerIntent> {
        match s.to_ascii_lowercase().as_str() {
            "vdd" => Some(PowerIntent::Vdd),
            "vss" => Some(PowerIntent::Vss),
            "undefined" => Some(PowerIntent::Undefined),
            _ => None,
        }
    }
}

/// Tunable options for one `legalize` run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LegalizeOptions {
    /// Maximum displacement a `refine_move` may introduce, expressed as a
    /// multiple of `row_height`.
    pub max_displacement_rows: i64,
    pub padding_left: u32,
    pub padding_right: u32,
    pub initial_power: PowerIntent,
    pub disallow_one_site_gaps: bool,
    /// `H` in the diamond-search envelope (spec §4.E).
    pub diamond_search_height: i32,
    /// Horizontal envelope stretch multiplier (`×5` in the reference).
    pub envelope_stretch: i32,
    /// Horizontal step multiplier per ring offset (`×10` in the reference).
    pub ring_step: i32,
    /// `div` used when design utilization is below `density_threshold`
    /// and no fixed instances are present.
    pub diamond_div_sparse: i32,
    /// `div` used otherwise (dense designs, or any fixed instance).
    pub diamond_div_dense: i32,
    pub density_threshold: f64,
    /// Width of the bin-search window, in sites.
    pub bin_search_window: i32,
    /// Upper bound on full refinement passes (spec §4.G: "a fixed
    /// iteration cap"). A pass that commits no move ends the loop early.
    pub refinement_pass_cap: u32,
}

impl Default for LegalizeOptions {
    fn default() -> Self {
        Self {
            max_displacement_rows: 100,
            padding_left: 0,
            padding_right: 0,
            initial_power: PowerIntent::Undefined,
            disallow_one_site_gaps: false,
            diamond_search_height: 10,
            envelope_stretch: 5,
            ring_step: 10,
            diamond_div_sparse: 4,
            diamond_div_dense: 1,
            density_threshold: 0.6,
            bin_search_window: 10,
            refinement_pass_cap: 10,
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct PlacementSection {
    pub max_displacement_rows: Option<i64>,
    pub padding_left: Option<u32>,
    pub padding_right: Option<u32>,
    pub initial_power: Option<String>,
    pub disallow_one_site_gaps: Option<bool>,
    pub diamond_search_height: Option<i32>,
    pub envelope_stretch: Option<i32>,
    pub ring_step: Option<i32>,
    pub diamond_div_sparse: Option<i32>,
    pub diamond_div_dense: Option<i32>,
    pub density_threshold: Option<f64>,
    pub bin_search_window: Option<i32>,
    pub refinement_pass_cap: Option<u32>,
}

/// The parsed shape of `dplace.toml`. Unknown top-level keys are ignored
/// by serde's default tolerance, allowing forward evolution.
#[derive(Debug, Deserialize, Default, Clone)]
pub struct ConfigFile {
    #[serde(default)]
    pub placement: PlacementSection,
}

/// Best-effort config path: a local `dplace.toml` takes precedence over
/// the platform config directory.
pub fn discover() -> PathBuf {
    let local = PathBuf::from("dplace.toml");
    if local.exists() {
        return local;
    }
    if let Some(dir) = dirs::config_dir() {
        return dir.join("dplace").join("dplace.toml");
    }
    PathBuf::from("dplace.toml")
}

/// Load `dplace.toml` from `path` (or the discovered default location).
/// A missing file or a parse error both fall back to `ConfigFile::default()`
/// rather than failing the run; only explicit caller overrides and struct
/// defaults are load-bearing in that case.
pub fn load_from(path: Option<PathBuf>) -> ConfigFile {
    let path = path.unwrap_or_else(discover);
    match fs::read_to_string(&path) {
        Ok(content) => match toml::from_str::<ConfigFile>(&content) {
            Ok(file) => {
                debug!(target: "dplace.config", path = %path.display(), "loaded config file");
                file
            }
            Err(e) => {
                warn!(target: "dplace.config", path = %path.display(), error = %e, "failed to parse config file, using defaults");
                ConfigFile::default()
            }
        },
        Err(_) => ConfigFile::default(),
    }
}

/// Apply the file layer over struct defaults, then `overrides` (typically
/// CLI flags) over the result. Each layer only replaces a field when the
/// layer actually specifies it.
pub fn effective_options(file: &ConfigFile, overrides: &PlacementSection) -> LegalizeOptions {
    let defaults = LegalizeOptions::default();
    let p = &file.placement;

    let pick_i64 = |o: Option<i64>, f: Option<i64>, d: i64| o.or(f).unwrap_or(d);
    let pick_u32 = |o: Option<u32>, f: Option<u32>, d: u32| o.or(f).unwrap_or(d);
    let pick_i32 = |o: Option<i32>, f: Option<i32>, d: i32| o.or(f).unwrap_or(d);
    let pick_bool = |o: Option<bool>, f: Option<bool>, d: bool| o.or(f).unwrap_or(d);
    let pick_f64 = |o: Option<f64>, f: Option<f64>, d: f64| o.or(f).unwrap_or(d);

    let initial_power = overrides
        .initial_power
        .as_deref()
        .and_then(PowerIntent::parse)
        .or_else(|| p.initial_power.as_deref().and_then(PowerIntent::parse))
        .unwrap_or(defaults.initial_power);

    LegalizeOptions {
        max_displacement_rows: pick_i64(
            overrides.max_displacement_rows,
            p.max_displacement_rows,
            defaults.max_displacement_rows,
        ),
        padding_left: pick_u32(overrides.padding_left, p.padding_left, defaults.padding_left),
        padding_right: pick_u32(overrides.padding_right, p.padding_right, defaults.padding_right),
        initial_power,
        disallow_one_site_gaps: pick_bool(
            overrides.disallow_one_site_gaps,
            p.disallow_one_site_gaps,
            defaults.disallow_one_site_gaps,
        ),
        diamond_search_height: pick_i32(
            overrides.diamond_search_height,
            p.diamond_search_height,
            defaults.diamond_search_height,
        ),
        envelope_stretch: pick_i32(overrides.envelope_stretch, p.envelope_stretch, defaults.envelope_stretch),
        ring_step: pick_i32(overrides.ring_step, p.ring_step, defaults.ring_step),
        diamond_div_sparse: pick_i32(
            overrides.diamond_div_sparse,
            p.diamond_div_sparse,
            defaults.diamond_div_sparse,
        ),
        diamond_div_dense: pick_i32(
            overrides.diamond_div_dense,
            p.diamond_div_dense,
            defaults.diamond_div_dense,
        ),
        density_threshold: pick_f64(overrides.density_threshold, p.density_threshold, defaults.density_threshold),
        bin_search_window: pick_i32(overrides.bin_search_window, p.bin_search_window, defaults.bin_search_window),
        refinement_pass_cap: pick_u32(
            overrides.refinement_pass_cap,
            p.refinement_pass_cap,
            defaults.refinement_pass_cap,
        ),
    }
}
