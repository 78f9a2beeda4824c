//! Public constructors for the six elementary component kinds.
//!
//! Every constructor takes a value in its natural unit (ohms, farads,
//! henries, volts, amps) plus an SI [`Prefix`] multiplier, mirroring how a
//! circuit description written by hand names component values (`4.7k`,
//! `100n`, …) rather than always spelling out base units.

use num_complex::Complex64;

use super::{Capacitor, Component, Core, CurrentSource, Impedance, Inductor, Resistor, VoltageSource};
use crate::error::{CircuitError, Result};
use crate::units::Prefix;

/// An ideal voltage source with EMF `emf * prefix`.
pub fn voltage_source(label: impl Into<String>, emf: Complex64, prefix: Prefix) -> Component {
    Component::VoltageSource(VoltageSource { core: Core::new(label), emf: emf * prefix.value() })
}

/// An ideal current source with current `amperage * prefix`.
pub fn current_source(label: impl Into<String>, amperage: Complex64, prefix: Prefix) -> Component {
    Component::CurrentSource(CurrentSource { core: Core::new(label), amperage: amperage * prefix.value() })
}

/// A resistor of resistance `resistance * prefix` ohms. Fails only if the
/// resulting value is not finite; zero (a short circuit) and negative
/// values are both valid I-V characteristics.
pub fn resistor(label: impl Into<String>, resistance: f64, prefix: Prefix) -> Result<Component> {
    let value = resistance * prefix.value();
    if !value.is_finite() {
        return Err(CircuitError::domain("resistor resistance must be finite"));
    }
    Ok(Component::Resistor(Resistor { core: Core::new(label), resistance: value }))
}

/// A capacitor of capacitance `capacitance * prefix` farads. Fails if the
/// capacitance is zero (an ideal zero-farad capacitor has no characteristic)
/// or non-finite; negative capacitance is otherwise a valid I-V
/// characteristic.
pub fn capacitor(label: impl Into<String>, capacitance: f64, prefix: Prefix) -> Result<Component> {
    let value = capacitance * prefix.value();
    if !value.is_finite() {
        return Err(CircuitError::domain("capacitor capacitance must be finite"));
    }
    if value == 0.0 {
        return Err(CircuitError::domain("ideal capacitor with zero capacitance has no characteristic"));
    }
    Ok(Component::Capacitor(Capacitor { core: Core::new(label), capacitance: value }))
}

/// An inductor of inductance `inductance * prefix` henries.
pub fn inductor(label: impl Into<String>, inductance: f64, prefix: Prefix) -> Component {
    Component::Inductor(Inductor { core: Core::new(label), inductance: inductance * prefix.value() })
}

/// A generalized complex impedance `z * prefix`.
pub fn impedance(label: impl Into<String>, z: Complex64, prefix: Prefix) -> Component {
    Component::Impedance(Impedance { core: Core::new(label), impedance: z * prefix.value() })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_capacitance_is_rejected_at_construction() {
        assert!(capacitor("C1", 0.0, Prefix::Micro).is_err());
    }

    #[test]
    fn negative_capacitance_is_accepted_at_construction() {
        assert!(capacitor("C1", -1.0, Prefix::Micro).is_ok());
    }

    #[test]
    fn zero_resistance_is_a_valid_short_circuit() {
        let Component::Resistor(r) = resistor("R_short", 0.0, Prefix::Unit).unwrap() else {
            panic!("expected a resistor");
        };
        assert_eq!(r.resistance, 0.0);
    }

    #[test]
    fn negative_resistance_is_accepted_at_construction() {
        assert!(resistor("R1", -10.0, Prefix::Unit).is_ok());
    }

    #[test]
    fn prefix_scales_the_stored_value() {
        let Component::Resistor(r) = resistor("R1", 4.7, Prefix::Kilo).unwrap() else {
            panic!("expected a resistor");
        };
        assert!((r.resistance - 4700.0).abs() < 1e-9);
    }
}
