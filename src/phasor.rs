//! The [`Phasor`] abstraction lets [`crate::ivchar::IVChar`] evaluation and
//! component state propagation be written once and reused both during the
//! solver's optimization loop (where voltages and currents are
//! [`crate::autodiff::Scalar`]s, tracked for backpropagation) and during
//! finalization (where they are plain [`Complex64`] numbers).

use num_complex::Complex64;

use crate::autodiff::Scalar;
use crate::components::ElectricalState;

/// A complex-valued quantity that can be combined with plain complex
/// constants. Implemented for [`Complex64`] (direct arithmetic) and for
/// [`Scalar`] (arithmetic that extends the autodiff graph).
pub trait Phasor: Clone {
    /// `self + k`.
    fn add_const(&self, k: Complex64) -> Self;
    /// `self * k`.
    fn mul_const(&self, k: Complex64) -> Self;
    /// `self / k`.
    fn div_const(&self, k: Complex64) -> Self;
    /// `self + other`, both of the same kind. Used by composite state
    /// propagation to accumulate a residual voltage or current across a
    /// set of children.
    fn add(&self, other: &Self) -> Self;
    /// A same-kind value carrying the constant `k`, ignoring `self`'s own
    /// value — used by [`crate::ivchar::IVChar`]'s fixed-current/
    /// fixed-voltage branches, whose result does not depend on the input.
    fn constant_like(&self, k: Complex64) -> Self;
    /// `-self`.
    fn negate(&self) -> Self {
        self.mul_const(Complex64::new(-1.0, 0.0))
    }
    /// `self - other`.
    fn sub(&self, other: &Self) -> Self {
        self.add(&other.negate())
    }
    /// `self * k` for a real scalar `k` (orientation is always ±1).
    fn scale(&self, k: f64) -> Self {
        self.mul_const(Complex64::new(k, 0.0))
    }
    /// Package a `(current, voltage)` pair into the component's state
    /// representation.
    fn pack_state(current: Self, voltage: Self) -> ElectricalState;
}

impl Phasor for Complex64 {
    fn add_const(&self, k: Complex64) -> Self {
        self + k
    }
    fn mul_const(&self, k: Complex64) -> Self {
        self * k
    }
    fn div_const(&self, k: Complex64) -> Self {
        self / k
    }
    fn add(&self, other: &Self) -> Self {
        self + other
    }
    fn constant_like(&self, k: Complex64) -> Self {
        k
    }
    fn pack_state(current: Self, voltage: Self) -> ElectricalState {
        ElectricalState::Numeric { current, voltage }
    }
}

impl Phasor for Scalar {
    fn add_const(&self, k: Complex64) -> Self {
        Scalar::add_const(self, k)
    }
    fn mul_const(&self, k: Complex64) -> Self {
        Scalar::mul_const(self, k)
    }
    fn div_const(&self, k: Complex64) -> Self {
        Scalar::div_const(self, k)
    }
    fn add(&self, other: &Self) -> Self {
        Scalar::add(self, other)
    }
    fn constant_like(&self, k: Complex64) -> Self {
        Scalar::constant_like(self, k)
    }
    fn pack_state(current: Self, voltage: Self) -> ElectricalState {
        ElectricalState::Symbolic { current, voltage }
    }
}
