//! # phasorsolve
//!
//! A linear electric circuit solver for DC and single-frequency AC phasor
//! analysis.
//!
//! This library provides:
//! - A typed two-terminal component algebra (resistors, capacitors,
//!   inductors, ideal sources, general impedances, and the series/parallel
//!   composites built from them)
//! - A reverse-mode automatic differentiation engine over complex scalars
//! - A topological reducer that folds series chains and parallel bundles
//!   before solving
//! - A KCL-residual gradient-descent solver that finds node potentials and
//!   branch currents at a given angular frequency
//!
//! ## Architecture
//!
//! - [`units`] - SI magnitude prefixes shared by every component constructor
//! - [`error`] - the crate's unified error type
//! - [`autodiff`] - the reverse-mode differentiation arena (`Tape`/`Scalar`)
//! - [`phasor`] - the `Phasor` trait genericizing component code over plain
//!   complex numbers and autodiff scalars
//! - [`ivchar`] - linear current-voltage characteristics and their algebra
//! - [`components`] - the two-terminal `Component` tree
//! - [`branch`] - a node pair plus the component tree connecting them
//! - [`reducer`] - topological series/parallel circuit reduction
//! - [`optimizer`] - the gradient-descent stepping rules driving the solver
//! - [`solver`] - [`CircuitSolver`], the entry point for solving a circuit
//!
//! ## Usage
//!
//! ```
//! use num_complex::Complex64;
//! use phasorsolve::{resistor, voltage_source, Branch, CircuitSolver, Prefix};
//!
//! let source = voltage_source("E1", Complex64::new(5.0, 0.0), Prefix::Unit);
//! let load = resistor("R1", 100.0, Prefix::Unit).unwrap();
//! let branch = Branch::new(0, 1, vec![source, load]).unwrap();
//!
//! let mut solver = CircuitSolver::new(vec![branch]).unwrap();
//! let report = solver.solve(0.0).unwrap();
//! assert!(report.converged);
//! ```

pub mod autodiff;
pub mod branch;
pub mod components;
pub mod error;
pub mod ivchar;
pub mod optimizer;
pub mod phasor;
pub mod reducer;
pub mod solver;
pub mod units;

pub use branch::Branch;
pub use components::{capacitor, current_source, impedance, inductor, resistor, voltage_source, Component};
pub use error::{CircuitError, Result};
pub use optimizer::{Adam, Newton, Optimizer};
pub use reducer::reduce_circuit;
pub use solver::{CircuitSolver, SolveReport};
pub use units::Prefix;
