use ndarray::{Array1, ArrayView1, ArrayViewMut1, Zip};

use super::{Optimizer, optimizer::check_len};
use crate::Result;

/// Gradient descent that keeps a running velocity per parameter.
#[derive(Debug, Clone)]
pub struct GradientDescentWithMomentum {
    learning_rate: f32,
    momentum: f32,
    velocity: Array1<f32>,
}

impl GradientDescentWithMomentum {
    /// Creates a new `GradientDescentWithMomentum` optimizer.
    ///
    /// # Arguments
    /// * `len` - The amount of parameters this instance should hold.
    /// * `learning_rate` - The small coefficient that modulates the amount of training per update.
    /// * `momentum` - How much of the previous velocity is kept on each update.
    pub fn new(len: usize, learning_rate: f32, momentum: f32) -> Self {
        Self {
            learning_rate,
            momentum,
            velocity: Array1::zeros(len),
        }
    }
}

impl Optimizer for GradientDescentWithMomentum {
    fn update_params(&mut self, params: &mut [f32], grad: &[f32]) -> Result<()> {
        check_len("gradient", params.len(), grad.len())?;
        check_len("velocity", self.velocity.len(), params.len())?;

        let (lr, mu) = (self.learning_rate, self.momentum);

        Zip::from(ArrayViewMut1::from(params))
            .and(ArrayView1::from(grad))
            .and(&mut self.velocity)
            .for_each(|p, &g, v| {
                *v = mu * *v + g;
                *p -= lr * *v;
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn velocity_builds_up() {
        let mut opt = GradientDescentWithMomentum::new(1, 1.0, 0.5);
        let mut params = [0.0];

        opt.update_params(&mut params, &[1.0]).unwrap();
        opt.update_params(&mut params, &[1.0]).unwrap();

        assert_eq!(params, [-2.5]);
    }

    #[test]
    fn state_must_match_the_model() {
        let mut opt = GradientDescentWithMomentum::new(3, 1.0, 0.5);
        assert!(opt.update_params(&mut [0.0], &[1.0]).is_err());
    }
}
