//! The arena that owns autodiff nodes.

use std::cell::RefCell;
use std::rc::Rc;

use num_complex::Complex64;

use super::scalar::Scalar;

/// The operation that produced a node, together with the indices of its
/// parents (if any). Matching on `Op` during `backward()` is how each
/// node pushes its contribution to its parents' gradients — see the table
/// in the crate's component-design documentation for the per-op formula.
#[derive(Debug, Clone, Copy)]
pub enum Op {
    /// A leaf: no parents, eligible to be an optimizer parameter.
    Leaf,
    /// `a + b`
    Add(usize, usize),
    /// `a + k` for a plain complex constant `k`.
    AddConst(usize, Complex64),
    /// `a * b`
    Mul(usize, usize),
    /// `a * k` for a plain complex constant `k`.
    MulConst(usize, Complex64),
    /// `a / k` for a plain complex constant `k`.
    DivConst(usize, Complex64),
    /// `|a|^2`
    AbsSq(usize),
    /// `Re(a)`
    Re(usize),
    /// `Im(a)`
    Im(usize),
    /// `arg(a)`
    Arg(usize),
}

/// A single node in the autodiff arena.
#[derive(Debug, Clone, Copy)]
pub struct Node {
    pub data: Complex64,
    pub grad: Complex64,
    pub op: Op,
}

impl Node {
    fn leaf(data: Complex64) -> Self {
        Self {
            data,
            grad: Complex64::new(0.0, 0.0),
            op: Op::Leaf,
        }
    }
}

/// Arena of autodiff nodes. Indices `0..leaf_count` are permanent leaves;
/// everything appended after them is interior scratch for one residual
/// evaluation and is dropped in bulk by [`Tape::reset_to_leaves`].
#[derive(Debug, Default)]
pub struct TapeInner {
    nodes: Vec<Node>,
    leaf_count: usize,
}

/// Shared handle to a [`TapeInner`]. Cloning a [`Scalar`] clones this `Rc`,
/// never the underlying node storage.
#[derive(Debug, Clone)]
pub struct Tape(pub(crate) Rc<RefCell<TapeInner>>);

impl Tape {
    /// Create an empty tape.
    pub fn new() -> Self {
        Tape(Rc::new(RefCell::new(TapeInner {
            nodes: Vec::new(),
            leaf_count: 0,
        })))
    }

    /// Create a new leaf scalar with the given data. Leaves created before
    /// any [`Tape::reset_to_leaves`] call remain leaves forever; a leaf
    /// created after interior nodes already exist is only a "leaf" in the
    /// no-parents sense and is not swept by `reset_to_leaves` unless it is
    /// promoted with [`Tape::commit_leaves`].
    pub fn leaf(&self, data: Complex64) -> Scalar {
        let idx = {
            let mut inner = self.0.borrow_mut();
            inner.nodes.push(Node::leaf(data));
            inner.nodes.len() - 1
        };
        Scalar {
            tape: self.clone(),
            idx,
        }
    }

    /// Mark every node currently in the tape as a permanent leaf, so that
    /// a subsequent [`Tape::reset_to_leaves`] preserves them. Solver setup
    /// calls this once, after all parameter leaves have been created and
    /// before the optimization loop starts building interior nodes.
    pub fn commit_leaves(&self) {
        let mut inner = self.0.borrow_mut();
        inner.leaf_count = inner.nodes.len();
    }

    /// Number of nodes currently on the tape (leaves + interior).
    pub fn len(&self) -> usize {
        self.0.borrow().nodes.len()
    }

    /// Whether the tape holds no nodes at all.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Truncate the arena back to its committed leaf prefix, discarding
    /// every interior node built since the last residual evaluation. Leaf
    /// `.data`/`.grad` are left untouched; callers that want gradients
    /// zeroed should do so explicitly (this mirrors the "leaves live until
    /// the solver is destroyed" lifecycle: resetting the tape must never
    /// silently reset a parameter's value).
    pub fn reset_to_leaves(&self) {
        let mut inner = self.0.borrow_mut();
        let leaf_count = inner.leaf_count;
        inner.nodes.truncate(leaf_count);
    }

    pub(crate) fn push(&self, node: Node) -> usize {
        let mut inner = self.0.borrow_mut();
        inner.nodes.push(node);
        inner.nodes.len() - 1
    }

    pub(crate) fn node(&self, idx: usize) -> Node {
        self.0.borrow().nodes[idx]
    }

    pub(crate) fn set_data(&self, idx: usize, data: Complex64) {
        self.0.borrow_mut().nodes[idx].data = data;
    }

    pub(crate) fn set_grad(&self, idx: usize, grad: Complex64) {
        self.0.borrow_mut().nodes[idx].grad = grad;
    }

    pub(crate) fn add_grad(&self, idx: usize, contribution: Complex64) {
        self.0.borrow_mut().nodes[idx].grad += contribution;
    }

    pub(crate) fn same_tape(&self, other: &Tape) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Default for Tape {
    fn default() -> Self {
        Self::new()
    }
}
