use ndarray::{ArrayView1, ArrayViewMut1, Zip};

use super::{Optimizer, optimizer::check_len};
use crate::Result;

/// Gradient descent optimization algorithm.
#[derive(Debug, Clone)]
pub struct GradientDescent {
    learning_rate: f32,
}

impl GradientDescent {
    /// Returns a new `GradientDescent`.
    ///
    /// # Arguments
    /// * `learning_rate` - The *length* of the steps taken on `update_params`.
    pub fn new(learning_rate: f32) -> Self {
        Self { learning_rate }
    }
}

impl Optimizer for GradientDescent {
    /// Makes a step in the opposite direction of the gradient, with a length of
    /// `learning_rate`.
    fn update_params(&mut self, params: &mut [f32], grad: &[f32]) -> Result<()> {
        check_len("gradient", params.len(), grad.len())?;

        let lr = self.learning_rate;
        Zip::from(ArrayViewMut1::from(params))
            .and(ArrayView1::from(grad))
            .for_each(|p, &g| *p -= lr * g);

        Ok(())
    }

    fn learning_rate(&self) -> f32 {
        self.learning_rate
    }

    fn set_learning_rate(&mut self, learning_rate: f32) {
        self.learning_rate = learning_rate;
    }
}
