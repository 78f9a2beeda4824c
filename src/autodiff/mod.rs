//! Reverse-mode automatic differentiation over complex scalars.
//!
//! The solver's residual (Kirchhoff's current law evaluated at a trial set
//! of node potentials and voltage-source branch currents) is a real-valued
//! function of complex unknowns. This module builds the small expression
//! graph that residual evaluation produces, and differentiates it with a
//! single reverse pass.
//!
//! Every node lives in a [`Tape`] (an arena, not a tree of `Rc<RefCell<_>>`
//! nodes): each [`Scalar`] is a cheap handle — a tape reference plus an
//! index — so cloning a `Scalar` never deep-copies the graph. Leaf scalars
//! (solver parameters) occupy the low indices of the arena and are never
//! removed; every node created during one residual evaluation is appended
//! after them and is discarded in one call to [`Tape::reset_to_leaves`]
//! once `backward()` has run, instead of being dropped one node at a time.

mod scalar;
mod tape;

pub use scalar::Scalar;
pub use tape::{Node, Op, Tape};
