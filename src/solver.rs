//! The KCL-residual gradient-descent circuit solver.
//!
//! [`CircuitSolver`] treats phasor analysis as an unconstrained minimization
//! problem: node potentials and voltage-source branch currents are complex
//! unknowns, and the objective is the mean squared net current flowing out
//! of every node (Kirchhoff's current law, violated exactly when the trial
//! potentials/currents are wrong). [`crate::optimizer::Adam`] descends this
//! objective using gradients computed by [`crate::autodiff`] until the loss
//! stops improving, then a final pass pushes the converged potentials back
//! through every branch to record each component's own current and voltage.
//!
//! A node potential pinned relative to another node by an ideal voltage
//! source (rather than independently optimized) is not given its own
//! optimizer parameter. It is folded into a single `Scalar::add_const` node
//! once, at construction — see [`PotentialKind::Dependent`] — and its
//! cached `.data` is refreshed from its parent after every optimizer step
//! by [`CircuitSolver::refresh_dependent_potentials`], mirroring
//! `circuit_solver.py`'s `_update_dependent_nodes`.

use std::collections::HashMap;

use num_complex::Complex64;

use crate::autodiff::{Scalar, Tape};
use crate::branch::Branch;
use crate::components::Component;
use crate::error::{CircuitError, Result};
use crate::optimizer::{Adam, Optimizer};
use crate::phasor::Phasor;
use crate::reducer::reduce_circuit;

const MAX_EPOCHS: usize = 10_000;
const ZERO_LOSS_ABS_TOL: f64 = 1e-30;
const STALL_REL_TOL: f64 = 1e-15;

/// How a node's potential is determined.
#[derive(Clone, Copy)]
enum PotentialKind {
    /// An independent unknown (or, for the reference node, a constant `0`
    /// that is simply never registered with the optimizer).
    Leaf,
    /// Pinned to `potential(on) + offset` by an ideal voltage source branch
    /// between this node and `on`.
    Dependent { on: i64, offset: Complex64 },
}

struct Discovery {
    order: Vec<i64>,
    kind: HashMap<i64, PotentialKind>,
    potentials: HashMap<i64, Scalar>,
    branch_currents: HashMap<usize, Scalar>,
    reference_node: i64,
}

impl Discovery {
    fn insert_leaf(&mut self, node: i64, tape: &Tape, value: Complex64) {
        self.order.push(node);
        self.kind.insert(node, PotentialKind::Leaf);
        self.potentials.insert(node, tape.leaf(value));
    }

    fn insert_dependent(&mut self, node: i64, on: i64, offset: Complex64) {
        let scalar = self.potentials[&on].add_const(offset);
        self.order.push(node);
        self.kind.insert(node, PotentialKind::Dependent { on, offset });
        self.potentials.insert(node, scalar);
    }
}

fn voltage_source_emf(component: &Component) -> Complex64 {
    match component {
        Component::VoltageSource(v) => v.emf,
        _ => unreachable!("caller already checked is_voltage_source"),
    }
}

fn isclose(a: f64, b: f64, rel_tol: f64, abs_tol: f64) -> bool {
    (a - b).abs() <= (rel_tol * a.abs().max(b.abs())).max(abs_tol)
}

/// Walk the branch list once, establishing a reference node (the source of
/// the first voltage-source branch encountered, or the first branch's
/// source if there are none) and the dependent-potential chain every other
/// ideal voltage source branch induces. Every remaining node not reached
/// this way becomes an independent leaf at `0`.
fn discover_potentials(branches: &[Branch], tape: &Tape) -> Result<Discovery> {
    let zero = Complex64::new(0.0, 0.0);
    let mut discovery = Discovery {
        order: Vec::new(),
        kind: HashMap::new(),
        potentials: HashMap::new(),
        branch_currents: HashMap::new(),
        reference_node: 0,
    };
    let mut reference_node: Option<i64> = None;

    for (i, branch) in branches.iter().enumerate() {
        if !branch.is_voltage_source() {
            continue;
        }
        let voltage_delta = voltage_source_emf(&branch.body) * Complex64::new(branch.body.orientation() as f64, 0.0);

        match reference_node {
            None => {
                reference_node = Some(branch.source);
                discovery.insert_leaf(branch.source, tape, zero);
                discovery.insert_dependent(branch.sink, branch.source, -voltage_delta);
            }
            Some(_) if !discovery.potentials.contains_key(&branch.source) => {
                if !discovery.potentials.contains_key(&branch.sink) {
                    discovery.insert_leaf(branch.source, tape, zero);
                    discovery.insert_dependent(branch.sink, branch.source, -voltage_delta);
                } else {
                    discovery.insert_dependent(branch.source, branch.sink, voltage_delta);
                }
            }
            Some(_) => {
                if !discovery.potentials.contains_key(&branch.sink) {
                    discovery.insert_dependent(branch.sink, branch.source, -voltage_delta);
                } else {
                    let observed = discovery.potentials[&branch.source].data() - discovery.potentials[&branch.sink].data();
                    if !isclose(observed.re, voltage_delta.re, 1e-9, 0.0) || !isclose(observed.im, voltage_delta.im, 1e-9, 0.0) {
                        return Err(CircuitError::configuration(format!(
                            "voltage source loop is inconsistent at nodes {} and {}",
                            branch.source, branch.sink
                        )));
                    }
                }
            }
        }
        discovery.branch_currents.insert(i, tape.leaf(zero));
    }

    for branch in branches {
        if reference_node.is_none() {
            reference_node = Some(branch.source);
            discovery.insert_leaf(branch.source, tape, zero);
        }
        if !discovery.potentials.contains_key(&branch.source) {
            discovery.insert_leaf(branch.source, tape, zero);
        }
        if !discovery.potentials.contains_key(&branch.sink) {
            discovery.insert_leaf(branch.sink, tape, zero);
        }
    }

    discovery.reference_node =
        reference_node.ok_or_else(|| CircuitError::configuration("a circuit needs at least one branch"))?;
    Ok(discovery)
}

fn accumulate(node_currents: &mut HashMap<i64, Scalar>, node: i64, contribution: Scalar) {
    node_currents.entry(node).and_modify(|acc| *acc = acc.add(&contribution)).or_insert(contribution);
}

/// The result of [`CircuitSolver::solve`].
pub struct SolveReport {
    /// The loss value recorded at the end of every epoch, in order. Empty
    /// for the single-branch fast path, which needs no iteration.
    pub history: Vec<f64>,
    /// Every node's potential, rounded to 5 decimal places.
    pub potentials: HashMap<i64, Complex64>,
    /// Whether the loop reached the convergence tolerance (or took the
    /// single-branch fast path) rather than exhausting `MAX_EPOCHS`.
    pub converged: bool,
}

/// Solves a linear circuit for its node potentials and branch currents by
/// minimizing the mean squared KCL residual.
pub struct CircuitSolver {
    tape: Tape,
    branches: Vec<Branch>,
    order: Vec<i64>,
    kind: HashMap<i64, PotentialKind>,
    potentials: HashMap<i64, Scalar>,
    reference_node: i64,
    branch_currents: HashMap<usize, Scalar>,
    optimizer: Box<dyn Optimizer>,
}

impl CircuitSolver {
    /// Build a solver over `branches` (first topologically reduced, see
    /// [`crate::reducer`]), using [`Adam`] as the default optimizer.
    pub fn new(branches: Vec<Branch>) -> Result<Self> {
        Self::with_optimizer(branches, Adam::new)
    }

    /// As [`CircuitSolver::new`], but with a caller-supplied optimizer
    /// constructor taking the collected list of independent parameters:
    /// every node potential that is not the reference node and not pinned
    /// by a voltage source, plus one current per ideal voltage source
    /// branch.
    pub fn with_optimizer<O, F>(branches: Vec<Branch>, make_optimizer: F) -> Result<Self>
    where
        O: Optimizer + 'static,
        F: FnOnce(Vec<Scalar>) -> O,
    {
        if branches.is_empty() {
            return Err(CircuitError::configuration("a circuit needs at least one branch"));
        }
        let branches = reduce_circuit(branches)?;
        let tape = Tape::new();
        let discovery = discover_potentials(&branches, &tape)?;

        let mut parameters: Vec<Scalar> = Vec::new();
        for node in &discovery.order {
            if *node == discovery.reference_node {
                continue;
            }
            if let PotentialKind::Leaf = discovery.kind[node] {
                parameters.push(discovery.potentials[node].clone());
            }
        }
        parameters.extend(discovery.branch_currents.values().cloned());
        tape.commit_leaves();
        let optimizer: Box<dyn Optimizer> = Box::new(make_optimizer(parameters));

        Ok(CircuitSolver {
            tape,
            branches,
            order: discovery.order,
            kind: discovery.kind,
            potentials: discovery.potentials,
            reference_node: discovery.reference_node,
            branch_currents: discovery.branch_currents,
            optimizer,
        })
    }

    /// Find node potentials and branch currents at angular frequency
    /// `omega` by minimizing the KCL residual. Never returns an error for
    /// non-convergence: a loop that exhausts its epoch budget is reported
    /// through [`SolveReport::converged`] instead, since the best estimate
    /// found so far is still meaningful.
    pub fn solve(&mut self, omega: f64) -> Result<SolveReport> {
        if self.branches.len() == 1 {
            let zero = Complex64::new(0.0, 0.0);
            let current_driven = matches!(self.branches[0].body, Component::VoltageSource(_) | Component::Parallel(_));
            if current_driven {
                self.branches[0].body.apply_current(zero, omega, true)?;
            } else {
                self.branches[0].body.apply_voltage(zero, omega, true)?;
            }
            return Ok(SolveReport { history: Vec::new(), potentials: self.rounded_potentials(), converged: true });
        }

        let mut history = Vec::new();
        let mut converged = false;
        for epoch in 0..MAX_EPOCHS {
            let loss = self.loss(omega)?;
            let loss_value = loss.data().re;
            history.push(loss_value);

            let stalled = epoch > 0 && isclose(history[epoch - 1], loss_value, STALL_REL_TOL, 0.0);
            if loss_value.abs() <= ZERO_LOSS_ABS_TOL || stalled {
                converged = true;
                break;
            }

            self.optimizer.zero_grad();
            loss.backward();
            self.optimizer.step(loss_value);
            self.refresh_dependent_potentials();
            self.tape.reset_to_leaves();
        }

        self.finalize_branches(omega)?;
        Ok(SolveReport { history, potentials: self.rounded_potentials(), converged })
    }

    /// Recompute every dependent node's cached `.data` from its parent's
    /// latest value plus its stored offset, in discovery order (a node's
    /// parent is always discovered before the node itself, so one linear
    /// pass is enough). Independent leaves need no refresh: their `.data`
    /// was already updated in place by the optimizer step.
    fn refresh_dependent_potentials(&self) {
        for node in &self.order {
            if let PotentialKind::Dependent { on, offset } = self.kind[node] {
                let value = self.potentials[&on].data() + offset;
                self.potentials[node].set_data(value);
            }
        }
    }

    fn loss(&mut self, omega: f64) -> Result<Scalar> {
        let mut node_currents: HashMap<i64, Scalar> = HashMap::new();
        for (j, branch) in self.branches.iter_mut().enumerate() {
            let orientation = branch.body.orientation() as f64;
            let (branch_current, _branch_voltage) = if branch.is_voltage_source() {
                let scaled = self.branch_currents[&j].scale(orientation);
                branch.body.apply_current(scaled, omega, false)?
            } else {
                let diff = self.potentials[&branch.source].sub(&self.potentials[&branch.sink]);
                branch.body.apply_voltage(diff.scale(orientation), omega, false)?
            };
            let contribution = branch_current.scale(orientation);
            accumulate(&mut node_currents, branch.source, contribution.clone());
            accumulate(&mut node_currents, branch.sink, contribution.negate());
        }

        let count = node_currents.len();
        let mut total: Option<Scalar> = None;
        for node_current in node_currents.values() {
            let squared = node_current.abs_sq();
            total = Some(match total {
                Some(running) => running.add(&squared),
                None => squared,
            });
        }
        let total = total.ok_or_else(|| CircuitError::configuration("circuit has no nodes to balance"))?;
        Ok(total.div_const(Complex64::new(count as f64, 0.0)))
    }

    /// Push the converged potentials and branch currents back through every
    /// branch, recursively, so every leaf component's own state reflects
    /// the final solution.
    fn finalize_branches(&mut self, omega: f64) -> Result<()> {
        for branch in self.branches.iter_mut() {
            if branch.is_voltage_source() {
                continue;
            }
            let orientation = branch.body.orientation() as f64;
            let diff = (self.potentials[&branch.source].data() - self.potentials[&branch.sink].data()) * orientation;
            branch.body.apply_voltage(diff, omega, true)?;
        }
        for (&j, current) in self.branch_currents.iter() {
            let data = current.data();
            let branch = &mut self.branches[j];
            let orientation = branch.body.orientation() as f64;
            branch.body.apply_current(data * orientation, omega, true)?;
        }
        Ok(())
    }

    fn rounded_potentials(&self) -> HashMap<i64, Complex64> {
        self.order.iter().map(|node| (*node, round5(self.potentials[node].data()))).collect()
    }

    /// The rounded `(current, voltage)` recorded for the component with
    /// this label, searching every branch. `None` if no component with
    /// that label has been solved yet.
    pub fn state_at(&self, label: &str) -> Option<(Complex64, Complex64)> {
        self.branches.iter().find_map(|branch| branch.body.state_at(label))
    }
}

fn round5(z: Complex64) -> Complex64 {
    let factor = 1e5;
    Complex64::new((z.re * factor).round() / factor, (z.im * factor).round() / factor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{current_source, impedance, resistor, voltage_source};
    use crate::units::Prefix;
    use approx::assert_abs_diff_eq;

    fn close(actual: Complex64, expected: Complex64) {
        assert_abs_diff_eq!(actual.re, expected.re, epsilon = 1e-6);
        assert_abs_diff_eq!(actual.im, expected.im, epsilon = 1e-6);
    }

    /// Two resistors sharing both terminals: the topological reducer folds
    /// this down to a single branch, taking the single-branch fast path.
    #[test]
    fn single_branch_resistor_pair_takes_the_fast_path() {
        let r1 = resistor("R1", 100.0, Prefix::Unit).unwrap();
        let r2 = resistor("R2", 100.0, Prefix::Unit).unwrap();
        let branches = vec![Branch::new(0, 1, vec![r1]).unwrap(), Branch::new(0, 1, vec![r2]).unwrap()];
        let mut solver = CircuitSolver::new(branches).unwrap();
        let report = solver.solve(0.0).unwrap();
        assert!(report.converged);
        assert!(report.history.is_empty());
    }

    /// A classic two-node resistor bridge fed by two current sources and one
    /// voltage source, taken from a worked textbook example; exact current
    /// and voltage values below are the reference solution.
    #[test]
    fn mitic_textbook_bridge_matches_the_reference_solution() {
        let r1 = resistor("R1", 200.0, Prefix::Unit).unwrap();
        let r2 = resistor("R2", 100.0, Prefix::Unit).unwrap();
        let r3 = resistor("R3", 100.0, Prefix::Unit).unwrap();
        let r4 = resistor("R4", 50.0, Prefix::Unit).unwrap();
        let r5 = resistor("R5", 100.0, Prefix::Unit).unwrap();
        let e1 = voltage_source("E1", Complex64::new(1.0, 0.0), Prefix::Unit);
        let j1 = current_source("J1", Complex64::new(20.0, 0.0), Prefix::Milli);
        let j2 = current_source("J2", Complex64::new(10.0, 0.0), Prefix::Milli);

        let branches = vec![
            Branch::new(1, 4, vec![j1, r1]).unwrap(),
            Branch::new(1, 4, vec![r2]).unwrap(),
            Branch::new(1, 2, vec![r3]).unwrap(),
            Branch::new(2, 3, vec![r4, !e1]).unwrap(),
            Branch::new(2, 3, vec![r5]).unwrap(),
            Branch::new(3, 4, vec![j2]).unwrap(),
        ];

        let mut solver = CircuitSolver::new(branches).unwrap();
        let report = solver.solve(0.0).unwrap();
        assert!(report.converged);

        let (r1_current, r1_voltage) = solver.state_at("R1").unwrap();
        close(r1_current, Complex64::new(20e-3, 0.0));
        close(r1_voltage, Complex64::new(4.0, 0.0));

        let (r2_current, r2_voltage) = solver.state_at("R2").unwrap();
        close(r2_current, Complex64::new(-30e-3, 0.0));
        close(r2_voltage, Complex64::new(-3.0, 0.0));

        let (r3_current, r3_voltage) = solver.state_at("R3").unwrap();
        close(r3_current, Complex64::new(10e-3, 0.0));
        close(r3_voltage, Complex64::new(1.0, 0.0));

        let (r4_current, r4_voltage) = solver.state_at("R4").unwrap();
        close(r4_current, Complex64::new(40e-3 / 3.0, 0.0));
        close(r4_voltage, Complex64::new(2.0 / 3.0, 0.0));

        let (e1_current, _) = solver.state_at("E1").unwrap();
        close(e1_current, Complex64::new(40e-3 / 3.0, 0.0));

        let (r5_current, r5_voltage) = solver.state_at("R5").unwrap();
        close(r5_current, Complex64::new(-10e-3 / 3.0, 0.0));
        close(r5_voltage, Complex64::new(-1.0 / 3.0, 0.0));
    }

    /// A five-node network with five independent voltage sources, taken
    /// from a worked mesh-analysis example (MITIC 12.7).
    #[test]
    fn five_source_mesh_matches_the_reference_solution() {
        let r1 = resistor("R1", 1.0, Prefix::Unit).unwrap();
        let r2 = resistor("R2", 2.0, Prefix::Unit).unwrap();
        let r3 = resistor("R3", 1.0, Prefix::Unit).unwrap();
        let r4 = resistor("R4", 2.0, Prefix::Unit).unwrap();
        let r5 = resistor("R5", 1.0, Prefix::Unit).unwrap();
        let e1 = voltage_source("E1", Complex64::new(1.0, 0.0), Prefix::Unit);
        let e2 = voltage_source("E2", Complex64::new(2.0, 0.0), Prefix::Unit);
        let e3 = voltage_source("E3", Complex64::new(3.0, 0.0), Prefix::Unit);
        let e4 = voltage_source("E4", Complex64::new(7.0, 0.0), Prefix::Unit);
        let e5 = voltage_source("E5", Complex64::new(3.0, 0.0), Prefix::Unit);

        let branches = vec![
            Branch::new(1, 2, vec![e1, r1]).unwrap(),
            Branch::new(1, 3, vec![!e2, r2]).unwrap(),
            Branch::new(1, 4, vec![!e3, r3]).unwrap(),
            Branch::new(2, 3, vec![r5]).unwrap(),
            Branch::new(2, 4, vec![r4, !e4]).unwrap(),
            Branch::new(3, 4, vec![e5]).unwrap(),
        ];

        let mut solver = CircuitSolver::new(branches).unwrap();
        let report = solver.solve(0.0).unwrap();
        assert!(report.converged);

        close(solver.state_at("R1").unwrap().0, Complex64::new(-1.0, 0.0));
        close(solver.state_at("R2").unwrap().0, Complex64::new(-1.0, 0.0));
        close(solver.state_at("R3").unwrap().0, Complex64::new(2.0, 0.0));
        close(solver.state_at("R4").unwrap().0, Complex64::new(3.0, 0.0));
        close(solver.state_at("R5").unwrap().0, Complex64::new(-4.0, 0.0));
        close(solver.state_at("E5").unwrap().0, Complex64::new(-5.0, 0.0));
    }

    /// A complex-impedance network with two voltage sources and one current
    /// source, driven at a fixed nonzero angular frequency via a general
    /// [`impedance`] component rather than L/C primitives (MITIC 8.1).
    #[test]
    fn complex_impedance_network_matches_the_reference_solution() {
        let z1 = impedance("Z1", Complex64::new(0.5, -1.0), Prefix::Unit);
        let z2 = impedance("Z2", Complex64::new(0.0, -2.0), Prefix::Unit);
        let z3 = impedance("Z3", Complex64::new(1.0, 0.0), Prefix::Unit);
        let z4 = impedance("Z4", Complex64::new(1.0, -0.5), Prefix::Unit);
        let z5 = impedance("Z5", Complex64::new(0.0, 1.0), Prefix::Unit);
        let e1 = voltage_source("E1", Complex64::new(3.0, -2.0), Prefix::Unit);
        let e2 = voltage_source("E2", Complex64::new(-1.0, 0.0), Prefix::Unit);
        let j = current_source("J", Complex64::new(1.0, -1.0), Prefix::Unit);

        let branches = vec![
            Branch::new(1, 2, vec![z4]).unwrap(),
            Branch::new(1, 3, vec![j, z2]).unwrap(),
            Branch::new(1, 4, vec![!e1, z1]).unwrap(),
            Branch::new(2, 3, vec![z5]).unwrap(),
            Branch::new(2, 4, vec![z3]).unwrap(),
            Branch::new(3, 4, vec![!e2]).unwrap(),
        ];

        let mut solver = CircuitSolver::new(branches).unwrap();
        let report = solver.solve(1.0).unwrap();
        assert!(report.converged);

        close(solver.state_at("Z1").unwrap().0, Complex64::new(1.0, 0.0));
        close(solver.state_at("Z3").unwrap().0, Complex64::new(-1.0, -1.0));
        close(solver.state_at("E2").unwrap().0, Complex64::new(0.0, 1.0));
        close(solver.state_at("Z4").unwrap().0, Complex64::new(-2.0, 1.0));
        close(solver.state_at("Z5").unwrap().0, Complex64::new(-1.0, 2.0));
    }

    #[test]
    fn empty_branch_list_is_rejected() {
        assert!(CircuitSolver::new(Vec::new()).is_err());
    }
}
