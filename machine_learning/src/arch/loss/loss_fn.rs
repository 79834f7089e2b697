use ndarray::{Array2, ArrayView2};

use crate::{MlErr, Result};

/// A differentiable measure of how far a prediction is from its target.
pub trait LossFn {
    /// Computes the mean loss over the batch.
    ///
    /// # Errors
    /// Returns `MlErr::SizeMismatch` if `y_pred` and `y` don't have the same shape.
    fn loss(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> Result<f32>;

    /// Computes the derivative of `loss` with respect to `y_pred`.
    fn loss_prime(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> Result<Array2<f32>>;
}

pub(super) fn check_shapes(y_pred: &ArrayView2<f32>, y: &ArrayView2<f32>) -> Result<()> {
    if y_pred.dim() != y.dim() {
        return Err(MlErr::SizeMismatch {
            what: "loss targets",
            got: y.len(),
            expected: y_pred.len(),
        });
    }

    Ok(())
}
