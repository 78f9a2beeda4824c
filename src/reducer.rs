//! Topological circuit reduction.
//!
//! Merging series chains and parallel bundles before handing branches to the
//! solver shrinks the unknown set the optimizer has to search over. It is a
//! pure optimization: [`crate::solver::CircuitSolver`] produces the same
//! node potentials whether or not a circuit has been reduced first, since
//! reduction only folds components whose combined I-V characteristic is
//! exactly equal to the originals' — it never changes what the network
//! computes.
//!
//! Reduction alternates two passes to a fixed point: collapsing any interior
//! node with exactly two incident branches into a single series branch
//! (`reduce_series`), and collapsing every set of branches sharing a
//! terminal pair into one parallel branch (`reduce_parallel`). Unlike the
//! reference implementation this is grounded on, `reduce_series` here runs
//! to its own local fixed point in a single call rather than performing one
//! merge per node per pass; the two formulations reach the same reduced
//! circuit, just in a different number of outer alternations. See
//! `DESIGN.md` for why.

use std::collections::HashMap;

use crate::branch::Branch;
use crate::error::{CircuitError, Result};

/// Alternately collapse series chains and parallel bundles until the branch
/// count stops changing.
pub fn reduce_circuit(branches: Vec<Branch>) -> Result<Vec<Branch>> {
    let mut reduced = reduce_series(branches)?;
    reduced = reduce_parallel(reduced)?;
    let mut count = reduced.len();
    let mut series_next = true;
    loop {
        reduced = if series_next { reduce_series(reduced)? } else { reduce_parallel(reduced)? };
        series_next = !series_next;
        if reduced.len() == count {
            break;
        }
        count = reduced.len();
    }
    Ok(reduced)
}

/// Collapse every interior node with exactly two incident branches into a
/// single branch spanning the two far terminals, repeating until no such
/// node remains. A self-loop branch counts once toward its single node's
/// degree and is never itself a merge candidate.
fn reduce_series(mut branches: Vec<Branch>) -> Result<Vec<Branch>> {
    loop {
        let mut incidence: HashMap<i64, Vec<usize>> = HashMap::new();
        for (i, b) in branches.iter().enumerate() {
            incidence.entry(b.source).or_default().push(i);
            if b.sink != b.source {
                incidence.entry(b.sink).or_default().push(i);
            }
        }
        let mut nodes: Vec<i64> = incidence.keys().copied().collect();
        nodes.sort_unstable();
        let merge_at = nodes.into_iter().find_map(|node| {
            let incident = &incidence[&node];
            if incident.len() == 2 && incident[0] != incident[1] {
                Some((node, incident[0], incident[1]))
            } else {
                None
            }
        });
        let Some((node, idx_a, idx_b)) = merge_at else {
            break;
        };

        let (hi, lo) = if idx_a > idx_b { (idx_a, idx_b) } else { (idx_b, idx_a) };
        let removed_hi = branches.remove(hi);
        let removed_lo = branches.remove(lo);
        let branch_a = if idx_a == hi { removed_hi.clone() } else { removed_lo.clone() };
        let branch_b = if idx_b == hi { removed_hi } else { removed_lo };

        let other_a = branch_a.other_terminal(node);
        let other_b = branch_b.other_terminal(node);
        let (first, first_other, second, second_other) =
            if other_a <= other_b { (branch_a, other_a, branch_b, other_b) } else { (branch_b, other_b, branch_a, other_a) };

        // `first` connects first_other -> node, `second` connects node -> second_other.
        let invert_first = first.source == node;
        let invert_second = second.source != node;
        let body_first = if invert_first { first.body.flipped() } else { first.body };
        let body_second = if invert_second { second.body.flipped() } else { second.body };
        let merged = body_first.in_series_with(body_second)?;
        branches.push(Branch::new(first_other, second_other, vec![merged])?);
    }
    Ok(branches)
}

/// Group branches by their (already-canonical) terminal pair and fold every
/// group of more than one into a single parallel branch.
fn reduce_parallel(branches: Vec<Branch>) -> Result<Vec<Branch>> {
    let mut order: Vec<(i64, i64)> = Vec::new();
    let mut groups: HashMap<(i64, i64), Vec<Branch>> = HashMap::new();
    for branch in branches {
        let key = branch.terminal_pair();
        if !groups.contains_key(&key) {
            order.push(key);
        }
        groups.entry(key).or_default().push(branch);
    }
    let mut result = Vec::with_capacity(order.len());
    for key in order {
        let group = groups
            .remove(&key)
            .ok_or_else(|| CircuitError::configuration("reducer lost track of a terminal pair"))?;
        let mut iter = group.into_iter();
        let first = iter
            .next()
            .ok_or_else(|| CircuitError::configuration("reducer produced an empty terminal-pair group"))?;
        let Some(second) = iter.next() else {
            result.push(first);
            continue;
        };
        let mut body = first.body.in_parallel_with(second.body)?;
        for branch in iter {
            body = body.in_parallel_with(branch.body)?;
        }
        result.push(Branch::new(key.0, key.1, vec![body])?);
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::resistor;
    use crate::units::Prefix;
    use num_complex::Complex64;

    #[test]
    fn two_resistors_in_series_through_an_interior_node_collapse_to_one_branch() {
        let r1 = resistor("R1", 100.0, Prefix::Unit).unwrap();
        let r2 = resistor("R2", 200.0, Prefix::Unit).unwrap();
        let branches = vec![Branch::new(0, 1, vec![r1]).unwrap(), Branch::new(1, 2, vec![r2]).unwrap()];
        let reduced = reduce_circuit(branches).unwrap();
        assert_eq!(reduced.len(), 1);
        let mut merged = reduced.into_iter().next().unwrap();
        assert_eq!(merged.terminal_pair(), (0, 2));
        let iv = merged.body.characteristic(0.0, false).unwrap();
        assert!((iv.impedance_coefficient() - Complex64::new(300.0, 0.0)).norm() < 1e-9);
    }

    #[test]
    fn two_resistors_between_the_same_terminals_collapse_in_parallel() {
        let r1 = resistor("R1", 100.0, Prefix::Unit).unwrap();
        let r2 = resistor("R2", 100.0, Prefix::Unit).unwrap();
        let branches = vec![Branch::new(0, 1, vec![r1]).unwrap(), Branch::new(0, 1, vec![r2]).unwrap()];
        let reduced = reduce_circuit(branches).unwrap();
        assert_eq!(reduced.len(), 1);
        let mut merged = reduced.into_iter().next().unwrap();
        let iv = merged.body.characteristic(0.0, false).unwrap();
        assert!((iv.impedance_coefficient() - Complex64::new(50.0, 0.0)).norm() < 1e-9);
    }

    #[test]
    fn a_three_node_ring_reduces_to_a_single_equivalent_branch() {
        let r1 = resistor("R1", 10.0, Prefix::Unit).unwrap();
        let r2 = resistor("R2", 10.0, Prefix::Unit).unwrap();
        let r3 = resistor("R3", 10.0, Prefix::Unit).unwrap();
        let branches = vec![
            Branch::new(0, 1, vec![r1]).unwrap(),
            Branch::new(1, 2, vec![r2]).unwrap(),
            Branch::new(2, 0, vec![r3]).unwrap(),
        ];
        let reduced = reduce_circuit(branches).unwrap();
        assert_eq!(reduced.len(), 1);
    }

    #[test]
    fn branches_with_disjoint_terminal_pairs_are_left_alone() {
        let r1 = resistor("R1", 10.0, Prefix::Unit).unwrap();
        let r2 = resistor("R2", 20.0, Prefix::Unit).unwrap();
        let branches = vec![Branch::new(0, 1, vec![r1]).unwrap(), Branch::new(2, 3, vec![r2]).unwrap()];
        let reduced = reduce_circuit(branches).unwrap();
        assert_eq!(reduced.len(), 2);
    }
}
