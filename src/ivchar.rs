//! Linear current–voltage characteristics and their series/parallel
//! algebra.
//!
//! An [`IVChar`] represents the relation `a*V + b*I = c` for a two-terminal
//! component, discriminated into the two forms the solver actually needs:
//! fixed-current (`I = c`) and impedance form (`V + b*I = c`, `a` is
//! implicitly `true`). Coefficients are always plain complex numbers —
//! `IVChar` itself never carries autodiff state, since it is purely a
//! function of the angular frequency ω, not of the solver's unknowns. See
//! [`crate::phasor::Phasor`] for how a characteristic is evaluated against
//! either a plain complex voltage/current or an autodiff [`Scalar`].

use num_complex::Complex64;

use crate::error::{CircuitError, Result};
use crate::phasor::Phasor;

/// A linear I–V relation, `I = c` (fixed current) or `V + b*I = c`
/// (impedance form, `b = 0` meaning fixed voltage).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IVChar {
    /// `true` for impedance form (`V + b*I = c`), `false` for fixed
    /// current (`I = c`).
    a: bool,
    b: Complex64,
    c: Complex64,
}

impl IVChar {
    /// Build a fixed-current characteristic, `I = c`.
    pub fn fixed_current(c: Complex64) -> Self {
        IVChar { a: false, b: Complex64::new(1.0, 0.0), c }
    }

    /// Build an impedance-form characteristic, `V + b*I = c`.
    pub fn impedance_form(b: Complex64, c: Complex64) -> Self {
        IVChar { a: true, b, c }
    }

    /// `I = 0`.
    pub fn open_circuit() -> Self {
        IVChar::fixed_current(Complex64::new(0.0, 0.0))
    }

    /// `V = 0`.
    pub fn short_circuit() -> Self {
        IVChar::impedance_form(Complex64::new(0.0, 0.0), Complex64::new(0.0, 0.0))
    }

    /// `I = c` (b is irrelevant in this form).
    pub fn has_fixed_current(&self) -> bool {
        !self.a
    }

    /// `V = c` (a=true, b=0).
    pub fn has_fixed_voltage(&self) -> bool {
        self.a && self.b == Complex64::new(0.0, 0.0)
    }

    /// The equivalent impedance `Z = -b`, meaningful only in impedance
    /// form.
    pub fn impedance_coefficient(&self) -> Complex64 {
        -self.b
    }

    /// The free coefficient `c`.
    pub fn free_coefficient(&self) -> Complex64 {
        self.c
    }

    /// Flip terminals: negate `c`.
    pub fn inverted(&self) -> Self {
        IVChar { a: self.a, b: self.b, c: -self.c }
    }

    /// Current flowing through the component for a given terminal
    /// voltage. Fails if the characteristic is fixed-voltage (an ideal
    /// voltage source does not constrain its own current).
    pub fn current_at_voltage<T: Phasor>(&self, voltage: T) -> Result<T> {
        if self.has_fixed_voltage() {
            return Err(CircuitError::configuration(
                "cannot apply voltage to a constant-voltage component",
            ));
        }
        if self.has_fixed_current() {
            return Ok(voltage.constant_like(self.c));
        }
        // I = (V - c) / (-b)
        Ok(voltage.add_const(-self.c).div_const(-self.b))
    }

    /// Voltage across the component for a given terminal current. Fails
    /// if the characteristic is fixed-current (an ideal current source
    /// does not constrain its own voltage).
    pub fn voltage_at_current<T: Phasor>(&self, current: T) -> Result<T> {
        if self.has_fixed_current() {
            return Err(CircuitError::configuration(
                "cannot apply current to a constant-current component",
            ));
        }
        if self.has_fixed_voltage() {
            return Ok(current.constant_like(self.c));
        }
        // V = -b*I + c
        Ok(current.mul_const(-self.b).add_const(self.c))
    }

    /// Combine two characteristics as if connected terminal-to-terminal.
    pub fn series(&self, other: &IVChar) -> Result<IVChar> {
        if self.has_fixed_current() && other.has_fixed_current() {
            return Err(CircuitError::configuration(
                "cannot connect two constant-current components in series",
            ));
        }
        if self.has_fixed_current() {
            return Ok(*self);
        }
        if other.has_fixed_current() {
            return Ok(*other);
        }
        Ok(IVChar::impedance_form(self.b + other.b, self.c + other.c))
    }

    /// Combine two characteristics as if connected across the same
    /// terminals.
    pub fn parallel(&self, other: &IVChar) -> Result<IVChar> {
        if self.has_fixed_voltage() && other.has_fixed_voltage() {
            return Err(CircuitError::configuration(
                "cannot connect two constant-voltage components in parallel",
            ));
        }
        if self.has_fixed_current() {
            if other.has_fixed_current() {
                return Ok(IVChar::fixed_current(self.c + other.c));
            }
            return Ok(IVChar::impedance_form(other.b, other.c + other.b * self.c));
        }
        if other.has_fixed_current() {
            return Ok(IVChar::impedance_form(self.b, self.c + self.b * other.c));
        }
        let denom = self.b + other.b;
        Ok(IVChar::impedance_form(
            (self.b * other.b) / denom,
            (self.c * other.b + other.c * self.b) / denom,
        ))
    }
}

impl std::ops::Not for IVChar {
    type Output = IVChar;
    fn not(self) -> IVChar {
        self.inverted()
    }
}

/// Evaluate an elementary component's characteristic at angular frequency
/// `ω`, with the ω=0 and degenerate-value special cases of the component
/// design table.
pub(crate) fn resistor_characteristic(resistance: f64) -> IVChar {
    IVChar::impedance_form(Complex64::new(-resistance, 0.0), Complex64::new(0.0, 0.0))
}

pub(crate) fn capacitor_characteristic(capacitance: f64, omega: f64) -> Result<IVChar> {
    if capacitance == 0.0 {
        return Err(CircuitError::domain("ideal capacitor with zero capacitance has no characteristic"));
    }
    if omega == 0.0 {
        return Ok(IVChar::open_circuit());
    }
    Ok(IVChar::impedance_form(Complex64::new(0.0, 1.0 / (omega * capacitance)), Complex64::new(0.0, 0.0)))
}

pub(crate) fn inductor_characteristic(inductance: f64, omega: f64) -> IVChar {
    if omega == 0.0 {
        return IVChar::short_circuit();
    }
    IVChar::impedance_form(Complex64::new(0.0, -omega * inductance), Complex64::new(0.0, 0.0))
}

pub(crate) fn impedance_characteristic(z: Complex64) -> IVChar {
    IVChar::impedance_form(-z, Complex64::new(0.0, 0.0))
}

pub(crate) fn voltage_source_characteristic(emf: Complex64) -> IVChar {
    IVChar::impedance_form(Complex64::new(0.0, 0.0), emf)
}

pub(crate) fn current_source_characteristic(amperage: Complex64) -> IVChar {
    IVChar::fixed_current(amperage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn close(a: Complex64, b: Complex64) {
        assert_abs_diff_eq!(a.re, b.re, epsilon = 1e-9);
        assert_abs_diff_eq!(a.im, b.im, epsilon = 1e-9);
    }

    #[test]
    fn double_inversion_is_identity() {
        let z = IVChar::impedance_form(Complex64::new(2.0, -1.0), Complex64::new(3.0, 4.0));
        close((!(!z)).free_coefficient(), z.free_coefficient());
    }

    #[test]
    fn series_with_short_circuit_is_identity() {
        let z = IVChar::impedance_form(Complex64::new(2.0, -1.0), Complex64::new(3.0, 4.0));
        let combined = z.series(&IVChar::short_circuit()).unwrap();
        close(combined.impedance_coefficient(), z.impedance_coefficient());
        close(combined.free_coefficient(), z.free_coefficient());
    }

    #[test]
    fn parallel_with_open_circuit_is_identity() {
        let z = IVChar::impedance_form(Complex64::new(2.0, -1.0), Complex64::new(3.0, 4.0));
        let combined = z.parallel(&IVChar::open_circuit()).unwrap();
        close(combined.impedance_coefficient(), z.impedance_coefficient());
        close(combined.free_coefficient(), z.free_coefficient());
    }

    #[test]
    fn series_is_associative_up_to_floating_point_error() {
        let x = IVChar::impedance_form(Complex64::new(1.0, 0.0), Complex64::new(2.0, 0.0));
        let y = IVChar::impedance_form(Complex64::new(3.0, 0.0), Complex64::new(4.0, 0.0));
        let z = IVChar::impedance_form(Complex64::new(5.0, 0.0), Complex64::new(6.0, 0.0));
        let left = x.series(&y).unwrap().series(&z).unwrap();
        let right = x.series(&y.series(&z).unwrap()).unwrap();
        close(left.impedance_coefficient(), right.impedance_coefficient());
        close(left.free_coefficient(), right.free_coefficient());
    }

    #[test]
    fn two_current_sources_in_series_is_rejected() {
        let a = IVChar::fixed_current(Complex64::new(1.0, 0.0));
        let b = IVChar::fixed_current(Complex64::new(2.0, 0.0));
        assert!(a.series(&b).is_err());
    }

    #[test]
    fn two_voltage_sources_in_parallel_is_rejected() {
        let a = IVChar::short_circuit().inverted(); // still fixed-voltage (V=0)
        let b = IVChar::impedance_form(Complex64::new(0.0, 0.0), Complex64::new(5.0, 0.0));
        assert!(a.parallel(&b).is_err());
    }

    #[test]
    fn resistor_current_at_voltage_matches_ohms_law() {
        let r = resistor_characteristic(100.0);
        let i = r.current_at_voltage(Complex64::new(12.0, 0.0)).unwrap();
        close(i, Complex64::new(0.12, 0.0));
    }

    #[test]
    fn capacitor_is_open_at_dc() {
        let c = capacitor_characteristic(1e-6, 0.0).unwrap();
        assert!(c.has_fixed_current());
        close(c.free_coefficient(), Complex64::new(0.0, 0.0));
    }

    #[test]
    fn inductor_is_short_at_dc() {
        let l = inductor_characteristic(1e-3, 0.0);
        assert!(l.has_fixed_voltage());
    }

    #[test]
    fn zero_capacitance_is_a_domain_error() {
        assert!(capacitor_characteristic(0.0, 1000.0).is_err());
    }
}
