use ndarray::{Array1, ArrayView1, ArrayViewMut1, Zip};

use super::{Optimizer, optimizer::check_len};
use crate::Result;

/// Adam, with optional decoupled weight decay.
#[derive(Debug, Clone)]
pub struct Adam {
    learning_rate: f32,
    betas: (f32, f32),
    epsilon: f32,
    weight_decay: f32,
    step: i32,
    /// First and second moment estimates of the gradient.
    m: Array1<f32>,
    v: Array1<f32>,
}

impl Adam {
    /// Creates a new `Adam` optimizer.
    ///
    /// # Arguments
    /// * `len` - The amount of parameters this instance should hold.
    /// * `learning_rate` - The small coefficient that modulates the amount of training per update.
    /// * `beta1`, `beta2` - The decay rates of the moment estimates.
    /// * `epsilon` - Keeps the update finite when the second moment is zero.
    pub fn new(len: usize, learning_rate: f32, beta1: f32, beta2: f32, epsilon: f32) -> Self {
        Self {
            learning_rate,
            betas: (beta1, beta2),
            epsilon,
            weight_decay: 0.,
            step: 0,
            m: Array1::zeros(len),
            v: Array1::zeros(len),
        }
    }

    /// An `Adam` optimizer with the usual `0.9`, `0.999` and `1e-8` hyperparameters.
    pub fn with_defaults(len: usize, learning_rate: f32) -> Self {
        Self::new(len, learning_rate, 0.9, 0.999, 1e-8)
    }

    /// Shrinks every parameter by `learning_rate * weight_decay` on each update, apart from
    /// the gradient step.
    pub fn weight_decay(mut self, weight_decay: f32) -> Self {
        self.weight_decay = weight_decay;
        self
    }
}

impl Optimizer for Adam {
    fn update_params(&mut self, params: &mut [f32], grad: &[f32]) -> Result<()> {
        check_len("gradient", params.len(), grad.len())?;
        check_len("moments", self.m.len(), params.len())?;

        self.step += 1;
        let (b1, b2) = self.betas;
        let eps = self.epsilon;
        let lr = self.learning_rate;

        let bias1 = 1. - b1.powi(self.step);
        let bias2 = 1. - b2.powi(self.step);
        let step_size = lr * bias2.sqrt() / bias1;
        let decay = 1. - lr * self.weight_decay;

        Zip::from(ArrayViewMut1::from(params))
            .and(ArrayView1::from(grad))
            .and(&mut self.m)
            .and(&mut self.v)
            .for_each(|p, &g, m, v| {
                *m = b1 * *m + (1. - b1) * g;
                *v = b2 * *v + (1. - b2) * g * g;
                *p = *p * decay - step_size * *m / (v.sqrt() + eps);
            });

        Ok(())
    }

    fn learning_rate(&self) -> f32 {
        self.learning_rate
    }

    fn set_learning_rate(&mut self, learning_rate: f32) {
        self.learning_rate = learning_rate;
    }
}
