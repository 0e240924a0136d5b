//! Typed error taxonomy for detailed placement (see spec §7).
//!
//! Fatal kinds (`ConfigError`, `GeometricError`, `InvariantError`) abort a
//! run and are returned as `Err` from `legalize`. Recoverable kinds
//! (`RecoverableError`) never abort a run; they are accumulated in the
//! report returned by `legalize` and counted, never propagated as `Err`.

use dp_geometry::{CellId, GroupId};

/// Configuration errors, detected before any grid mutation.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error(
        "a multi-row macro is present but no initial power rail was declared; \
         pass `initial_power` or remove the multi-height cells"
    )]
    MissingPowerIntent,

    #[error("no macro in the library declares a defined VDD/VSS top_power; cannot seed row polarity")]
    NoDefinedPowerMacro,

    #[error(
        "padding is contradictory: left={left} right={right} leaves no usable width at site_width={site_width}"
    )]
    ContradictoryPadding {
        left: u32,
        right: u32,
        site_width: i64,
    },
}

/// Geometric infeasibility detected while building the grid, before any
/// movable cell is placed.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum GeometricError {
    #[error("fixed cell {cell:?} extends outside the core box")]
    FixedCellOutsideCore { cell: CellId },

    #[error("fixed cells {a:?} and {b:?} overlap")]
    FixedCellOverlap { a: CellId, b: CellId },

    #[error("group {group:?} region lies outside the core box")]
    GroupRegionOutsideCore { group: GroupId },

    #[error(
        "cell {cell:?} does not belong to group {group:?} but its global-placed anchor falls inside that group's region"
    )]
    NonGroupCellInsideGroupRegion { cell: CellId, group: GroupId },
}

/// A §3 invariant found broken at the end of a run. Treated as a bug in
/// the legalizer itself rather than bad input.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum InvariantError {
    #[error("pixel ({x}, {y}) is claimed by cell {cell:?} but marked invalid")]
    CoverageInvalidPixel { x: i32, y: i32, cell: CellId },

    #[error("pixel ({x}, {y}) references both cell {a:?} and cell {b:?}")]
    ExclusionViolated { x: i32, y: i32, a: CellId, b: CellId },

    #[error("cell {cell:?} top row power does not match its macro's top_power")]
    PowerMismatch { cell: CellId },

    #[error("cell {cell:?} occupies a pixel outside its group's regions (or inside another group's)")]
    RegionMismatch { cell: CellId },

    #[error("cell {cell:?} footprint extends outside the grid bounds")]
    FootprintOutsideGrid { cell: CellId },
}

/// Fatal errors that abort a `legalize` run before it completes.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum LegalizeError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Geometric(#[from] GeometricError),
    #[error(transparent)]
    Invariant(#[from] InvariantError),
}

/// Non-fatal failures that are logged and counted in the run's report but
/// never abort legalization and never leave the grid mutated.
#[derive(Debug, Clone, Copy, thiserror::Error, PartialEq, Eq)]
pub enum RecoverableError {
    #[error("no legal slot found for cell {cell:?} within the diamond-search envelope")]
    PlacementFailure { cell: CellId },

    #[error("local move for cell {cell:?} rolled back: replay of a displaced neighbor failed")]
    RefinementFailure { cell: CellId },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_message_names_the_problem() {
        let e = ConfigError::ContradictoryPadding {
            left: 5,
            right: 5,
            site_width: 10,
        };
        let msg = e.to_string();
        assert!(msg.contains("left=5"));
        assert!(msg.contains("right=5"));
    }

    #[test]
    fn recoverable_error_names_the_offending_cell() {
        let e = RecoverableError::PlacementFailure { cell: CellId(7) };
        assert!(e.to_string().contains("CellId(7)"));
    }

    #[test]
    fn legalize_error_wraps_each_fatal_kind() {
        let e: LegalizeError = GeometricError::FixedCellOutsideCore { cell: CellId(1) }.into();
        assert!(matches!(e, LegalizeError::Geometric(_)));
    }
}
