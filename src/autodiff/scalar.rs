//! A handle into a [`Tape`]: the autodiff node type used throughout the
//! solver.

use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

use num_complex::Complex64;

use super::tape::{Node, Op, Tape};

/// A complex scalar participating in the reverse-mode autodiff graph.
///
/// Cloning a `Scalar` is cheap: it is a [`Tape`] handle (an `Rc` clone)
/// plus an index, never a copy of the graph. A `Scalar` is a *leaf* if it
/// has no parents ([`Scalar::is_leaf`]); only leaves may be registered as
/// optimizer parameters.
#[derive(Debug, Clone)]
pub struct Scalar {
    pub(crate) tape: Tape,
    pub(crate) idx: usize,
}

impl Scalar {
    /// The tape this scalar belongs to.
    pub fn tape(&self) -> &Tape {
        &self.tape
    }

    fn node(&self) -> Node {
        self.tape.node(self.idx)
    }

    /// Current value.
    pub fn data(&self) -> Complex64 {
        self.node().data
    }

    /// Set the value directly. Used by optimizer steps (which only ever
    /// mutate leaf data) and by the solver's dependent-potential refresh
    /// pass (which recomputes a non-leaf's cached `.data` from its
    /// defining expression after every optimizer step).
    pub fn set_data(&self, data: Complex64) {
        self.tape.set_data(self.idx, data);
    }

    /// Accumulated gradient, in the Wirtinger convention `dL/dx - i*dL/dy`
    /// for a real loss `L` of `z = x + iy`.
    pub fn grad(&self) -> Complex64 {
        self.node().grad
    }

    /// Zero this scalar's accumulated gradient.
    pub fn zero_grad(&self) {
        self.tape.set_grad(self.idx, Complex64::new(0.0, 0.0));
    }

    /// A leaf has no parents: it was created directly by [`Tape::leaf`]
    /// and never as the result of an operation.
    pub fn is_leaf(&self) -> bool {
        matches!(self.node().op, Op::Leaf)
    }

    /// Produce a fresh leaf-like constant on the same tape as `self`,
    /// ignoring `self`'s own value. Used for the fixed-current/
    /// fixed-voltage branches of [`crate::ivchar::IVChar`] evaluation,
    /// where the result does not depend on the input at all but still
    /// needs to be a node on the right tape to participate in the graph.
    pub fn constant_like(&self, k: Complex64) -> Scalar {
        self.tape.leaf(k)
    }

    /// `self + other`, both as `Scalar`s.
    pub fn add(&self, other: &Scalar) -> Scalar {
        debug_assert!(self.tape.same_tape(&other.tape), "scalars from different tapes");
        let data = self.data() + other.data();
        let idx = self.tape.push(Node {
            data,
            grad: Complex64::new(0.0, 0.0),
            op: Op::Add(self.idx, other.idx),
        });
        Scalar { tape: self.tape.clone(), idx }
    }

    /// `self + k` for a plain complex constant `k`.
    pub fn add_const(&self, k: Complex64) -> Scalar {
        let data = self.data() + k;
        let idx = self.tape.push(Node {
            data,
            grad: Complex64::new(0.0, 0.0),
            op: Op::AddConst(self.idx, k),
        });
        Scalar { tape: self.tape.clone(), idx }
    }

    /// `self * other`, both as `Scalar`s.
    pub fn mul(&self, other: &Scalar) -> Scalar {
        debug_assert!(self.tape.same_tape(&other.tape), "scalars from different tapes");
        let data = self.data() * other.data();
        let idx = self.tape.push(Node {
            data,
            grad: Complex64::new(0.0, 0.0),
            op: Op::Mul(self.idx, other.idx),
        });
        Scalar { tape: self.tape.clone(), idx }
    }

    /// `self * k` for a plain complex constant `k`.
    pub fn mul_const(&self, k: Complex64) -> Scalar {
        let data = self.data() * k;
        let idx = self.tape.push(Node {
            data,
            grad: Complex64::new(0.0, 0.0),
            op: Op::MulConst(self.idx, k),
        });
        Scalar { tape: self.tape.clone(), idx }
    }

    /// `self / k` for a plain complex constant `k`.
    pub fn div_const(&self, k: Complex64) -> Scalar {
        let data = self.data() / k;
        let idx = self.tape.push(Node {
            data,
            grad: Complex64::new(0.0, 0.0),
            op: Op::DivConst(self.idx, k),
        });
        Scalar { tape: self.tape.clone(), idx }
    }

    /// `|self|^2`, real-valued (imaginary part always zero).
    pub fn abs_sq(&self) -> Scalar {
        let data = Complex64::new(self.data().norm_sqr(), 0.0);
        let idx = self.tape.push(Node {
            data,
            grad: Complex64::new(0.0, 0.0),
            op: Op::AbsSq(self.idx),
        });
        Scalar { tape: self.tape.clone(), idx }
    }

    /// `Re(self)`, as a real-valued scalar.
    pub fn re(&self) -> Scalar {
        let data = Complex64::new(self.data().re, 0.0);
        let idx = self.tape.push(Node {
            data,
            grad: Complex64::new(0.0, 0.0),
            op: Op::Re(self.idx),
        });
        Scalar { tape: self.tape.clone(), idx }
    }

    /// `i*Im(self)`.
    pub fn im(&self) -> Scalar {
        let data = Complex64::new(0.0, self.data().im);
        let idx = self.tape.push(Node {
            data,
            grad: Complex64::new(0.0, 0.0),
            op: Op::Im(self.idx),
        });
        Scalar { tape: self.tape.clone(), idx }
    }

    /// `arg(self)`, as a real-valued scalar.
    pub fn arg(&self) -> Scalar {
        let data = Complex64::new(self.data().arg(), 0.0);
        let idx = self.tape.push(Node {
            data,
            grad: Complex64::new(0.0, 0.0),
            op: Op::Arg(self.idx),
        });
        Scalar { tape: self.tape.clone(), idx }
    }

    /// Negation, `self * -1`.
    pub fn negate(&self) -> Scalar {
        self.mul_const(Complex64::new(-1.0, 0.0))
    }

    /// Run reverse-mode backpropagation rooted at `self`. Seeds `self.grad
    /// = 1` and visits every ancestor exactly once, in reverse topological
    /// order, pushing each node's contribution to its parents' gradients
    /// per the table in the module documentation.
    pub fn backward(&self) {
        let mut visited = vec![false; self.tape.len()];
        let mut topo = Vec::new();
        build_topo(&self.tape, self.idx, &mut visited, &mut topo);

        self.tape.set_grad(self.idx, Complex64::new(1.0, 0.0));

        for idx in topo.into_iter().rev() {
            let node = self.tape.node(idx);
            let grad = node.grad;
            match node.op {
                Op::Leaf => {}
                Op::Add(a, b) => {
                    self.tape.add_grad(a, grad);
                    self.tape.add_grad(b, grad);
                }
                Op::AddConst(a, _) => {
                    self.tape.add_grad(a, grad);
                }
                Op::Mul(a, b) => {
                    let a_data = self.tape.node(a).data;
                    let b_data = self.tape.node(b).data;
                    self.tape.add_grad(a, b_data * grad);
                    self.tape.add_grad(b, a_data * grad);
                }
                Op::MulConst(a, k) => {
                    self.tape.add_grad(a, k * grad);
                }
                Op::DivConst(a, k) => {
                    self.tape.add_grad(a, grad / k);
                }
                Op::AbsSq(a) => {
                    let a_data = self.tape.node(a).data;
                    self.tape.add_grad(a, a_data.conj() * (2.0 * grad.re));
                }
                Op::Re(a) => {
                    self.tape.add_grad(a, Complex64::new(grad.re, 0.0));
                }
                Op::Im(a) => {
                    self.tape.add_grad(a, Complex64::new(0.0, -grad.re));
                }
                Op::Arg(a) => {
                    let a_data = self.tape.node(a).data;
                    let denom = a_data.norm_sqr();
                    let contribution = -grad.re * Complex64::new(a_data.im, a_data.re) / denom;
                    self.tape.add_grad(a, contribution);
                }
            }
        }
    }
}

fn build_topo(tape: &Tape, idx: usize, visited: &mut [bool], topo: &mut Vec<usize>) {
    if visited[idx] {
        return;
    }
    visited[idx] = true;
    match tape.node(idx).op {
        Op::Leaf => {}
        Op::AddConst(a, _) | Op::MulConst(a, _) | Op::DivConst(a, _) | Op::AbsSq(a) | Op::Re(a) | Op::Im(a) | Op::Arg(a) => {
            build_topo(tape, a, visited, topo);
        }
        Op::Add(a, b) | Op::Mul(a, b) => {
            build_topo(tape, a, visited, topo);
            build_topo(tape, b, visited, topo);
        }
    }
    topo.push(idx);
}

impl Add for &Scalar {
    type Output = Scalar;
    fn add(self, rhs: &Scalar) -> Scalar {
        Scalar::add(self, rhs)
    }
}

impl Add for Scalar {
    type Output = Scalar;
    fn add(self, rhs: Scalar) -> Scalar {
        Scalar::add(&self, &rhs)
    }
}

impl Sub for &Scalar {
    type Output = Scalar;
    fn sub(self, rhs: &Scalar) -> Scalar {
        Scalar::add(self, &rhs.negate())
    }
}

impl Sub for Scalar {
    type Output = Scalar;
    fn sub(self, rhs: Scalar) -> Scalar {
        Scalar::add(&self, &rhs.negate())
    }
}

impl Neg for &Scalar {
    type Output = Scalar;
    fn neg(self) -> Scalar {
        self.negate()
    }
}

impl Neg for Scalar {
    type Output = Scalar;
    fn neg(self) -> Scalar {
        self.negate()
    }
}

impl Mul<f64> for &Scalar {
    type Output = Scalar;
    fn mul(self, rhs: f64) -> Scalar {
        self.mul_const(Complex64::new(rhs, 0.0))
    }
}

impl Mul<f64> for Scalar {
    type Output = Scalar;
    fn mul(self, rhs: f64) -> Scalar {
        self.mul_const(Complex64::new(rhs, 0.0))
    }
}

impl AddAssign for Scalar {
    fn add_assign(&mut self, rhs: Scalar) {
        *self = Scalar::add(self, &rhs);
    }
}

impl SubAssign for Scalar {
    fn sub_assign(&mut self, rhs: Scalar) {
        *self = Scalar::add(self, &rhs.negate());
    }
}
