//! A branch: a node pair plus the component tree connecting them.

use crate::components::Component;
use crate::error::{CircuitError, Result};

/// A circuit branch between two nodes. Construction always yields a
/// canonical form with `source <= sink`; if the caller's terminals arrive
/// the other way round they are swapped and the body's orientation is
/// flipped to compensate, so `source`/`sink` always describe the same
/// physical connection regardless of the order the caller wrote them in.
#[derive(Debug, Clone)]
pub struct Branch {
    pub source: i64,
    pub sink: i64,
    pub body: Component,
}

impl Branch {
    /// Build a branch from an ordered pair of terminals and the list of
    /// components it carries, collapsing the list into one composite via
    /// repeated series combination (`Series() & c1 & c2 & …`). A single
    /// component is used directly rather than wrapped in a trivial
    /// one-child series.
    ///
    /// Fails if the components cannot be composed (e.g. two fixed-current
    /// sources given in series), or if `components` is empty.
    pub fn new(source: i64, sink: i64, components: Vec<Component>) -> Result<Branch> {
        let mut iter = components.into_iter();
        let mut body = iter
            .next()
            .ok_or_else(|| CircuitError::configuration("a branch needs at least one component"))?;
        for component in iter {
            body = body.in_series_with(component)?;
        }
        let (source, sink, body) = if source > sink { (sink, source, body.flipped()) } else { (source, sink, body) };
        Ok(Branch { source, sink, body })
    }

    /// The unordered terminal pair, for grouping branches that connect
    /// the same two nodes.
    pub fn terminal_pair(&self) -> (i64, i64) {
        (self.source, self.sink)
    }

    /// Whether this branch's body is a top-level ideal voltage source
    /// (the component whose own current is unconstrained by its I-V
    /// relation, and so needs a dedicated solver unknown).
    pub fn is_voltage_source(&self) -> bool {
        matches!(self.body, Component::VoltageSource(_))
    }

    /// The terminal opposite `node`. Used by the reducer when walking a
    /// chain of branches through a shared interior node.
    pub fn other_terminal(&self, node: i64) -> i64 {
        if self.source == node {
            self.sink
        } else {
            self.source
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::resistor;
    use crate::units::Prefix;
    use num_complex::Complex64;

    #[test]
    fn swapped_terminals_are_canonicalized() {
        let r = resistor("R1", 100.0, Prefix::Unit).unwrap();
        let branch = Branch::new(5, 2, vec![r]).unwrap();
        assert_eq!(branch.source, 2);
        assert_eq!(branch.sink, 5);
        assert_eq!(branch.body.orientation(), -1);
    }

    #[test]
    fn ordered_terminals_keep_orientation() {
        let r = resistor("R1", 100.0, Prefix::Unit).unwrap();
        let branch = Branch::new(2, 5, vec![r]).unwrap();
        assert_eq!(branch.source, 2);
        assert_eq!(branch.sink, 5);
        assert_eq!(branch.body.orientation(), 1);
    }

    #[test]
    fn multiple_components_compose_in_series() {
        let r1 = resistor("R1", 100.0, Prefix::Unit).unwrap();
        let r2 = resistor("R2", 200.0, Prefix::Unit).unwrap();
        let mut branch = Branch::new(0, 1, vec![r1, r2]).unwrap();
        let iv = branch.body.characteristic(0.0, false).unwrap();
        assert!((iv.impedance_coefficient() - Complex64::new(300.0, 0.0)).norm() < 1e-9);
    }

    #[test]
    fn empty_component_list_is_rejected() {
        assert!(Branch::new(0, 1, vec![]).is_err());
    }
}
