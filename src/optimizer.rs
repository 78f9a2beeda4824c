//! Gradient-based optimizers driving the KCL-residual minimization loop.
//!
//! The solver treats circuit analysis as an unconstrained minimization of
//! a real-valued residual over a set of complex unknowns (node potentials
//! and voltage-source branch currents). Both optimizers below step each
//! parameter by its Wirtinger gradient (`dL/dx - i*dL/dy`, see
//! [`crate::autodiff`]); they differ only in how the step size and search
//! direction are shaped.

use num_complex::Complex64;

use crate::autodiff::Scalar;

/// A stepping rule for the solver's optimization loop. `step` is called
/// once per epoch with the freshly computed scalar loss, after
/// `loss.backward()` has populated every parameter's gradient; it is
/// expected to mutate each parameter's `.data` in place and leave the
/// gradients for the caller to zero before the next epoch.
pub trait Optimizer {
    fn step(&mut self, loss: f64);

    /// Zero every parameter's accumulated gradient.
    fn zero_grad(&self) {
        for param in self.parameters() {
            param.zero_grad();
        }
    }

    fn parameters(&self) -> &[Scalar];
}

/// A single adaptive-step gradient descent, scaling the whole step by the
/// current loss over the total squared gradient norm. Well suited to the
/// near-quadratic residual a single-branch or lightly-coupled circuit
/// produces, where a second-order-ish step size converges in very few
/// epochs.
pub struct Newton {
    parameters: Vec<Scalar>,
}

impl Newton {
    pub fn new(parameters: Vec<Scalar>) -> Self {
        Newton { parameters }
    }
}

impl Optimizer for Newton {
    fn step(&mut self, loss: f64) {
        let grad_norm_sq: f64 = self.parameters.iter().map(|p| p.grad().norm_sqr()).sum();
        if grad_norm_sq == 0.0 {
            return;
        }
        let lr = 0.01 * loss / grad_norm_sq;
        for param in &self.parameters {
            let step = param.grad().conj() * lr;
            param.set_data(param.data() - step);
        }
    }

    fn parameters(&self) -> &[Scalar] {
        &self.parameters
    }
}

const ADAM_BETA_M: f64 = 0.75;
const ADAM_BETA_V: f64 = 0.9;
const ADAM_EPSILON: f64 = 1e-30;
const ADAM_INITIAL_LR: f64 = 1.0;

/// Adam with a loss-aware learning rate: the rate is boosted 1.2x after an
/// epoch that improves on the previous loss, and cut by 10x after one that
/// doesn't, in place of a fixed schedule. The first epoch always counts as
/// an improvement, since `prev_loss` starts at `+inf`. `v` (the
/// second-moment estimate) is deliberately left without bias correction,
/// matching the reference this is grounded on — see `DESIGN.md`.
pub struct Adam {
    parameters: Vec<Scalar>,
    m: Vec<Complex64>,
    v: Vec<f64>,
    beta_m_pow: f64,
    beta_v_pow: f64,
    lr: f64,
    prev_loss: f64,
}

impl Adam {
    pub fn new(parameters: Vec<Scalar>) -> Self {
        let n = parameters.len();
        Adam {
            parameters,
            m: vec![Complex64::new(0.0, 0.0); n],
            v: vec![0.0; n],
            beta_m_pow: 1.0,
            beta_v_pow: 1.0,
            lr: ADAM_INITIAL_LR,
            prev_loss: f64::INFINITY,
        }
    }
}

impl Optimizer for Adam {
    fn step(&mut self, loss: f64) {
        self.beta_m_pow *= ADAM_BETA_M;
        self.beta_v_pow *= ADAM_BETA_V;
        if loss > self.prev_loss {
            self.lr /= 10.0;
        } else {
            self.lr *= 1.2;
        }
        for (i, param) in self.parameters.iter().enumerate() {
            let grad = param.grad();
            self.m[i] = (self.m[i] * ADAM_BETA_M + grad.conj() * (1.0 - ADAM_BETA_M)) / (1.0 - self.beta_m_pow);
            self.v[i] = self.v[i] * ADAM_BETA_V + grad.norm_sqr() * (1.0 - ADAM_BETA_V);
            let denom = self.v[i].sqrt() + ADAM_EPSILON;
            let step = self.m[i] * (self.lr / denom);
            param.set_data(param.data() - step);
        }
        self.prev_loss = loss;
    }

    fn parameters(&self) -> &[Scalar] {
        &self.parameters
    }
}
