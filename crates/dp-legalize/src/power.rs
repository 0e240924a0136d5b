//! Row power-rail assignment (spec §4.B).
//!
//! Polarity seeds from an explicit `initial_power` override when given,
//! otherwise from the first single-row macro in the library that
//! declares a `top_power`, then alternates row by row.

use dp_config::{LegalizeOptions, PowerIntent};
use dp_db::Design;
use dp_errors::ConfigError;
use dp_geometry::Power;

pub fn assign_power(design: &mut dyn Design, options: &LegalizeOptions) -> Result<(), ConfigError> {
    let mut macro_top_power = None;
    let mut found_multi = false;
    for m in design.macros() {
        if m.is_multi_row {
            found_multi = true;
        } else if macro_top_power.is_none() {
            if let Some(p) = m.top_power {
                macro_top_power = Some(p);
            }
        }
    }

    if found_multi && options.initial_power == PowerIntent::Undefined {
        return Err(ConfigError::MissingPowerIntent);
    }

    let seed = match options.initial_power {
        PowerIntent::Vdd => Power::Vdd,
        PowerIntent::Vss => Power::Vss,
        PowerIntent::Undefined => macro_top_power.ok_or(ConfigError::NoDefinedPowerMacro)?,
    };

    let mut row_power = seed;
    for row in design.rows_mut() {
        row.top_power = row_power;
        row_power = row_power.flipped();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dp_db::InMemoryDesign;
    use dp_geometry::{Macro, MacroPin, Rect};

    fn design_with_macro(top_power: Option<Power>, is_multi_row: bool) -> InMemoryDesign {
        let core = Rect::new(0, 0, 100, 100);
        let mut d = InMemoryDesign::new(10, 20, core);
        d.macros.push(Macro {
            name: "M".into(),
            width: 10,
            height_rows: if is_multi_row { 2 } else { 1 },
            top_power,
            is_multi_row,
            pins: vec![MacroPin {
                name: "A".into(),
                geometry: vec![],
            }],
        });
        d
    }

    #[test]
    fn rows_alternate_from_macro_seed() {
        let mut d = design_with_macro(Some(Power::Vdd), false);
        let opts = LegalizeOptions::default();
        assign_power(&mut d, &opts).unwrap();
        assert_eq!(d.rows[0].top_power, Power::Vdd);
        assert_eq!(d.rows[1].top_power, Power::Vss);
        assert_eq!(d.rows[2].top_power, Power::Vdd);
    }

    #[test]
    fn explicit_override_beats_macro_seed() {
        let mut d = design_with_macro(Some(Power::Vdd), false);
        let mut opts = LegalizeOptions::default();
        opts.initial_power = PowerIntent::Vss;
        assign_power(&mut d, &opts).unwrap();
        assert_eq!(d.rows[0].top_power, Power::Vss);
    }

    #[test]
    fn multi_row_without_power_intent_is_an_error() {
        let mut d = design_with_macro(None, true);
        let opts = LegalizeOptions::default();
        let err = assign_power(&mut d, &opts).unwrap_err();
        assert_eq!(err, ConfigError::MissingPowerIntent);
    }

    #[test]
    fn no_defined_power_macro_is_an_error() {
        let mut d = design_with_macro(None, false);
        let opts = LegalizeOptions::default();
        let err = assign_power(&mut d, &opts).unwrap_err();
        assert_eq!(err, ConfigError::NoDefinedPowerMacro);
    }
}
