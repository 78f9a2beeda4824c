//! Two-terminal components and the trees built from them.
//!
//! A [`Component`] is one of six elementary kinds (voltage source, current
//! source, resistor, capacitor, inductor, impedance) or one of two
//! composites (series, parallel) built from other components. Every
//! variant shares a [`Core`]: a label, an `orientation`, a cached
//! characteristic, and the component's last-computed electrical state.
//!
//! State propagation (`apply_current`/`apply_voltage`) and characteristic
//! evaluation are written once, generically over [`Phasor`], so the same
//! code drives both the solver's symbolic optimization loop
//! (`T = Scalar`) and its numeric finalization pass (`T = Complex64`).

mod composite;
mod elementary;

pub use composite::{Parallel, Series};
pub use elementary::{capacitor, current_source, impedance, inductor, resistor, voltage_source};

use num_complex::Complex64;

use crate::autodiff::Scalar;
use crate::error::{CircuitError, Result};
use crate::ivchar::IVChar;
use crate::phasor::Phasor;

/// The electrical state of a component: either symbolic (mid-solve,
/// carrying autodiff scalars) or numeric (after finalization).
#[derive(Debug, Clone)]
pub enum ElectricalState {
    Symbolic { current: Scalar, voltage: Scalar },
    Numeric { current: Complex64, voltage: Complex64 },
}

impl ElectricalState {
    /// The `(current, voltage)` pair, if this state is numeric.
    pub fn as_numeric(&self) -> Option<(Complex64, Complex64)> {
        match self {
            ElectricalState::Numeric { current, voltage } => Some((*current, *voltage)),
            ElectricalState::Symbolic { .. } => None,
        }
    }
}

/// Fields shared by every [`Component`] variant.
#[derive(Debug, Clone)]
pub(crate) struct Core {
    label: String,
    orientation: i8,
    cache: Option<(IVChar, f64)>,
    state: Option<ElectricalState>,
}

impl Core {
    pub(crate) fn new(label: impl Into<String>) -> Self {
        Core { label: label.into(), orientation: 1, cache: None, state: None }
    }
}

/// An elementary voltage source, EMF `emf` (ω-independent).
#[derive(Debug, Clone)]
pub struct VoltageSource {
    pub(crate) core: Core,
    pub(crate) emf: Complex64,
}

/// An elementary current source, current `amperage` (ω-independent).
#[derive(Debug, Clone)]
pub struct CurrentSource {
    pub(crate) core: Core,
    pub(crate) amperage: Complex64,
}

/// An elementary resistor of resistance `resistance` ohms.
#[derive(Debug, Clone)]
pub struct Resistor {
    pub(crate) core: Core,
    pub(crate) resistance: f64,
}

/// An elementary capacitor of capacitance `capacitance` farads.
#[derive(Debug, Clone)]
pub struct Capacitor {
    pub(crate) core: Core,
    pub(crate) capacitance: f64,
}

/// An elementary inductor of inductance `inductance` henries.
#[derive(Debug, Clone)]
pub struct Inductor {
    pub(crate) core: Core,
    pub(crate) inductance: f64,
}

/// A generalized complex impedance.
#[derive(Debug, Clone)]
pub struct Impedance {
    pub(crate) core: Core,
    pub(crate) impedance: Complex64,
}

/// A two-terminal component: one of the six elementary kinds, or a
/// composite built from other components.
#[derive(Debug, Clone)]
pub enum Component {
    VoltageSource(VoltageSource),
    CurrentSource(CurrentSource),
    Resistor(Resistor),
    Capacitor(Capacitor),
    Inductor(Inductor),
    Impedance(Impedance),
    Series(Series),
    Parallel(Parallel),
}

impl Component {
    fn core(&self) -> &Core {
        match self {
            Component::VoltageSource(c) => &c.core,
            Component::CurrentSource(c) => &c.core,
            Component::Resistor(c) => &c.core,
            Component::Capacitor(c) => &c.core,
            Component::Inductor(c) => &c.core,
            Component::Impedance(c) => &c.core,
            Component::Series(c) => &c.core,
            Component::Parallel(c) => &c.core,
        }
    }

    fn core_mut(&mut self) -> &mut Core {
        match self {
            Component::VoltageSource(c) => &mut c.core,
            Component::CurrentSource(c) => &mut c.core,
            Component::Resistor(c) => &mut c.core,
            Component::Capacitor(c) => &mut c.core,
            Component::Inductor(c) => &mut c.core,
            Component::Impedance(c) => &mut c.core,
            Component::Series(c) => &mut c.core,
            Component::Parallel(c) => &mut c.core,
        }
    }

    /// The component's label.
    pub fn label(&self) -> &str {
        &self.core().label
    }

    /// `+1` or `-1`.
    pub fn orientation(&self) -> i8 {
        self.core().orientation
    }

    /// Negate this component's orientation in place.
    pub fn flip(&mut self) {
        self.core_mut().orientation *= -1;
    }

    /// Negate this component's orientation, consuming and returning it.
    pub fn flipped(mut self) -> Self {
        self.flip();
        self
    }

    /// The last electrical state recorded by `apply_current`/
    /// `apply_voltage`, if any.
    pub fn state(&self) -> Option<&ElectricalState> {
        self.core().state.as_ref()
    }

    fn raw_characteristic(&mut self, omega: f64) -> Result<IVChar> {
        match self {
            Component::VoltageSource(x) => {
                if let Some((iv, w)) = x.core.cache {
                    if w == omega {
                        return Ok(iv);
                    }
                }
                let iv = crate::ivchar::voltage_source_characteristic(x.emf);
                x.core.cache = Some((iv, omega));
                Ok(iv)
            }
            Component::CurrentSource(x) => {
                if let Some((iv, w)) = x.core.cache {
                    if w == omega {
                        return Ok(iv);
                    }
                }
                let iv = crate::ivchar::current_source_characteristic(x.amperage);
                x.core.cache = Some((iv, omega));
                Ok(iv)
            }
            Component::Resistor(x) => {
                if let Some((iv, w)) = x.core.cache {
                    if w == omega {
                        return Ok(iv);
                    }
                }
                let iv = crate::ivchar::resistor_characteristic(x.resistance);
                x.core.cache = Some((iv, omega));
                Ok(iv)
            }
            Component::Capacitor(x) => {
                if let Some((iv, w)) = x.core.cache {
                    if w == omega {
                        return Ok(iv);
                    }
                }
                let iv = crate::ivchar::capacitor_characteristic(x.capacitance, omega)?;
                x.core.cache = Some((iv, omega));
                Ok(iv)
            }
            Component::Inductor(x) => {
                if let Some((iv, w)) = x.core.cache {
                    if w == omega {
                        return Ok(iv);
                    }
                }
                let iv = crate::ivchar::inductor_characteristic(x.inductance, omega);
                x.core.cache = Some((iv, omega));
                Ok(iv)
            }
            Component::Impedance(x) => {
                if let Some((iv, w)) = x.core.cache {
                    if w == omega {
                        return Ok(iv);
                    }
                }
                let iv = crate::ivchar::impedance_characteristic(x.impedance);
                x.core.cache = Some((iv, omega));
                Ok(iv)
            }
            Component::Series(s) => composite::series_characteristic(s, omega),
            Component::Parallel(p) => composite::parallel_characteristic(p, omega),
        }
    }

    /// This component's I–V characteristic at `omega`, inverted if
    /// `with_orientation` and the component's orientation is `-1`.
    pub fn characteristic(&mut self, omega: f64, with_orientation: bool) -> Result<IVChar> {
        let orientation = self.orientation();
        let raw = self.raw_characteristic(omega)?;
        Ok(if with_orientation && orientation == -1 { !raw } else { raw })
    }

    /// Drive `current` through this component, recording the resulting
    /// `(current, voltage)` state. `omega` selects the characteristic;
    /// `recursive` controls whether composites propagate into their
    /// children. Orientation is assumed to already have been applied by
    /// the caller — see the module documentation.
    pub fn apply_current<T: Phasor>(&mut self, current: T, omega: f64, recursive: bool) -> Result<(T, T)> {
        match self {
            Component::Series(s) => return composite::apply_current_series(s, current, omega, recursive),
            Component::Parallel(p) => return composite::apply_current_parallel(p, current, omega, recursive),
            _ => {}
        }
        let raw = self.raw_characteristic(omega)?;
        let voltage = raw.voltage_at_current(current.clone())?;
        self.core_mut().state = Some(T::pack_state(current.clone(), voltage.clone()));
        Ok((current, voltage))
    }

    /// Drive `voltage` across this component, recording the resulting
    /// `(current, voltage)` state. See [`Component::apply_current`] for
    /// the orientation contract.
    pub fn apply_voltage<T: Phasor>(&mut self, voltage: T, omega: f64, recursive: bool) -> Result<(T, T)> {
        match self {
            Component::Series(s) => return composite::apply_voltage_series(s, voltage, omega, recursive),
            Component::Parallel(p) => return composite::apply_voltage_parallel(p, voltage, omega, recursive),
            _ => {}
        }
        let raw = self.raw_characteristic(omega)?;
        let current = raw.current_at_voltage(voltage.clone())?;
        self.core_mut().state = Some(T::pack_state(current.clone(), voltage.clone()));
        Ok((current, voltage))
    }

    /// Combine two components in series (`&`). If either operand is
    /// already a [`Series`], the other is absorbed into it rather than
    /// nesting a new composite.
    pub fn in_series_with(self, other: Component) -> Result<Component> {
        match (self, other) {
            (Component::Series(mut s), other) => {
                composite::absorb_into_series(&mut s, other)?;
                Ok(Component::Series(s))
            }
            (this, Component::Series(mut s)) => {
                composite::absorb_into_series(&mut s, this)?;
                Ok(Component::Series(s))
            }
            (this, other) => {
                let mut s = Series::empty();
                composite::absorb_into_series(&mut s, this)?;
                composite::absorb_into_series(&mut s, other)?;
                Ok(Component::Series(s))
            }
        }
    }

    /// Combine two components in parallel (`|`). Symmetric to
    /// [`Component::in_series_with`].
    pub fn in_parallel_with(self, other: Component) -> Result<Component> {
        match (self, other) {
            (Component::Parallel(mut p), other) => {
                composite::absorb_into_parallel(&mut p, other)?;
                Ok(Component::Parallel(p))
            }
            (this, Component::Parallel(mut p)) => {
                composite::absorb_into_parallel(&mut p, this)?;
                Ok(Component::Parallel(p))
            }
            (this, other) => {
                let mut p = Parallel::empty();
                composite::absorb_into_parallel(&mut p, this)?;
                composite::absorb_into_parallel(&mut p, other)?;
                Ok(Component::Parallel(p))
            }
        }
    }

    /// Find the rounded `(current, voltage)` pair recorded for the
    /// component with this label, searching the whole tree. Returns
    /// `None` if no component with that label has a numeric state.
    pub fn state_at(&self, label: &str) -> Option<(Complex64, Complex64)> {
        if self.label() == label {
            if let Some((current, voltage)) = self.state().and_then(ElectricalState::as_numeric) {
                return Some((round5(current), round5(voltage)));
            }
        }
        match self {
            Component::Series(s) => composite::find_state_in(&s.children, &s.singular, label),
            Component::Parallel(p) => composite::find_state_in(&p.children, &p.singular, label),
            _ => None,
        }
    }
}

impl std::ops::BitAnd for Component {
    type Output = Result<Component>;
    fn bitand(self, rhs: Component) -> Result<Component> {
        self.in_series_with(rhs)
    }
}

impl std::ops::BitOr for Component {
    type Output = Result<Component>;
    fn bitor(self, rhs: Component) -> Result<Component> {
        self.in_parallel_with(rhs)
    }
}

impl std::ops::Not for Component {
    type Output = Component;
    fn not(self) -> Component {
        self.flipped()
    }
}

fn round5(z: Complex64) -> Complex64 {
    Complex64::new(round_digits(z.re, 5), round_digits(z.im, 5))
}

fn round_digits(x: f64, digits: i32) -> f64 {
    let factor = 10f64.powi(digits);
    (x * factor).round() / factor
}

pub(crate) fn configuration_error(message: impl Into<String>) -> CircuitError {
    CircuitError::configuration(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::Prefix;
    use approx::assert_abs_diff_eq;

    fn close(a: Complex64, b: Complex64) {
        assert_abs_diff_eq!(a.re, b.re, epsilon = 1e-9);
        assert_abs_diff_eq!(a.im, b.im, epsilon = 1e-9);
    }

    #[test]
    fn resistor_apply_voltage_matches_ohms_law() {
        let mut r = resistor("R1", 100.0, Prefix::Unit).unwrap();
        let (current, _) = r.apply_voltage(Complex64::new(10.0, 0.0), 0.0, false).unwrap();
        close(current, Complex64::new(0.1, 0.0));
    }

    #[test]
    fn series_of_resistors_adds_impedances() {
        let r1 = resistor("R1", 100.0, Prefix::Unit).unwrap();
        let r2 = resistor("R2", 200.0, Prefix::Unit).unwrap();
        let mut combined = (r1 & r2).unwrap();
        let iv = combined.characteristic(0.0, false).unwrap();
        close(iv.impedance_coefficient(), Complex64::new(300.0, 0.0));
    }

    #[test]
    fn parallel_of_resistors_combines_as_expected() {
        let r1 = resistor("R1", 100.0, Prefix::Unit).unwrap();
        let r2 = resistor("R2", 100.0, Prefix::Unit).unwrap();
        let mut combined = (r1 | r2).unwrap();
        let iv = combined.characteristic(0.0, false).unwrap();
        close(iv.impedance_coefficient(), Complex64::new(50.0, 0.0));
    }

    #[test]
    fn two_current_sources_in_series_is_a_configuration_error() {
        let a = current_source("I1", Complex64::new(1.0, 0.0), Prefix::Unit);
        let b = current_source("I2", Complex64::new(2.0, 0.0), Prefix::Unit);
        assert!((a & b).is_err());
    }

    #[test]
    fn two_voltage_sources_in_parallel_is_a_configuration_error() {
        let a = voltage_source("V1", Complex64::new(5.0, 0.0), Prefix::Unit);
        let b = voltage_source("V2", Complex64::new(9.0, 0.0), Prefix::Unit);
        assert!((a | b).is_err());
    }

    #[test]
    fn flip_twice_is_identity() {
        let r = resistor("R1", 50.0, Prefix::Unit).unwrap();
        let flipped_twice = r.clone().flipped().flipped();
        assert_eq!(flipped_twice.orientation(), r.orientation());
    }

    /// Binding Scenario A: a voltage source in series with a single
    /// resistor, driven by an external short (`apply_voltage(0, …)`), the
    /// same "solve this branch in isolation" idiom the full solver's
    /// single-branch fast path relies on.
    #[test]
    fn simple_series_source_and_resistor_matches_ohms_law() {
        let r1 = resistor("R1", 100.0, Prefix::Unit).unwrap();
        let e1 = voltage_source("E1", Complex64::new(12.0, 0.0), Prefix::Unit);
        let mut circuit = e1.flipped().in_series_with(r1).unwrap();
        circuit.apply_voltage(Complex64::new(0.0, 0.0), 0.0, true).unwrap();

        let (current, voltage) = circuit.state_at("R1").unwrap();
        close(voltage, Complex64::new(12.0, 0.0));
        close(current, Complex64::new(0.12, 0.0));
    }

    /// Binding Scenario B: a voltage source in series with two resistors
    /// in parallel.
    #[test]
    fn simple_parallel_two_resistors_matches_the_combined_conductance() {
        let r1 = resistor("R1", 100.0, Prefix::Unit).unwrap();
        let r2 = resistor("R2", 400.0, Prefix::Unit).unwrap();
        let e1 = voltage_source("E1", Complex64::new(100.0, 0.0), Prefix::Unit);
        let load = (r1 | r2).unwrap();
        let mut circuit = e1.flipped().in_series_with(load).unwrap();
        let (source_current, _voltage) = circuit.apply_voltage(Complex64::new(0.0, 0.0), 0.0, true).unwrap();

        close(source_current, Complex64::new(100.0 * (1.0 / 100.0 + 1.0 / 400.0), 0.0));
        let (_, r1_voltage) = circuit.state_at("R1").unwrap();
        close(r1_voltage, Complex64::new(100.0, 0.0));
    }

    /// Binding Scenario C: a series R-L-C loop driven at a fixed nonzero
    /// angular frequency, exercising the reactive elementary
    /// characteristics through the same composite recursion as A and B.
    #[test]
    fn series_rlc_at_high_frequency_matches_the_reference_solution() {
        let omega = 1e4;
        let r = resistor("R", 100.0, Prefix::Unit).unwrap();
        let l = inductor("L", 1.0, Prefix::Milli);
        let cap = capacitor("C", 1.0, Prefix::Micro).unwrap();
        let e = voltage_source("E", Complex64::new(12.0, 0.0), Prefix::Unit);

        let mut circuit = e.flipped();
        circuit = circuit.in_series_with(r).unwrap();
        circuit = circuit.in_series_with(l).unwrap();
        circuit = circuit.in_series_with(cap).unwrap();
        let (current, _voltage) = circuit.apply_voltage(Complex64::new(0.0, 0.0), omega, true).unwrap();

        let expected_current = Complex64::new(12.0, 0.0) / Complex64::new(100.0, -90.0);
        close(current, expected_current);

        let (_, l_voltage) = circuit.state_at("L").unwrap();
        close(l_voltage, Complex64::new(0.0, omega * 0.001) * current);
    }

    #[test]
    fn state_at_finds_a_leaf_inside_a_composite() {
        let r1 = resistor("R1", 100.0, Prefix::Unit).unwrap();
        let r2 = resistor("R2", 200.0, Prefix::Unit).unwrap();
        let mut combined = (r1 & r2).unwrap();
        combined.apply_voltage(Complex64::new(30.0, 0.0), 0.0, true).unwrap();
        let (current, voltage) = combined.state_at("R1").expect("R1 should have a recorded state");
        close(current, Complex64::new(0.1, 0.0));
        close(voltage, Complex64::new(10.0, 0.0));
    }
}
