use ndarray::{Array2, ArrayView2, Axis};

use super::{LossFn, loss_fn::check_shapes};
use crate::Result;

/// Softmax cross entropy over raw logits, with one-hot targets.
#[derive(Debug, Default, Clone, Copy)]
pub struct CrossEntropy;

impl CrossEntropy {
    pub fn new() -> Self {
        Self
    }

    /// Row-wise `log(softmax(logits))`, shifted by the row maximum to stay finite.
    fn log_softmax(logits: ArrayView2<f32>) -> Array2<f32> {
        let mut out = logits.to_owned();

        for mut row in out.axis_iter_mut(Axis(0)) {
            let max = row.fold(f32::NEG_INFINITY, |m, &x| m.max(x));
            let lse = row.mapv(|x| (x - max).exp()).sum().ln() + max;
            row.mapv_inplace(|x| x - lse);
        }

        out
    }
}

impl LossFn for CrossEntropy {
    fn loss(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> Result<f32> {
        check_shapes(&y_pred, &y)?;

        let n = y_pred.nrows().max(1) as f32;
        let log_p = Self::log_softmax(y_pred);
        Ok(-(&log_p * &y).sum() / n)
    }

    fn loss_prime(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> Result<Array2<f32>> {
        check_shapes(&y_pred, &y)?;

        let n = y_pred.nrows().max(1) as f32;
        let p = Self::log_softmax(y_pred).mapv(f32::exp);
        Ok((p - &y) / n)
    }
}
