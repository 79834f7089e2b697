use crate::{MlErr, Result};

/// Defines the strategy for updating model parameters based on calculated gradients.
pub trait Optimizer {
    /// Updates the provided parameters using the accumulated gradient.
    ///
    /// # Arguments
    /// * `params` - The parameters to update.
    /// * `grad` - A reference to the model's gradient.
    ///
    /// # Errors
    /// `MlErr::SizeMismatch` if `grad`, or the optimizer's own state, doesn't match the
    /// size of `params`.
    fn update_params(&mut self, params: &mut [f32], grad: &[f32]) -> Result<()>;

    fn learning_rate(&self) -> f32;

    fn set_learning_rate(&mut self, learning_rate: f32);
}

pub(super) fn check_len(what: &'static str, expected: usize, got: usize) -> Result<()> {
    if expected != got {
        return Err(MlErr::SizeMismatch {
            what,
            got,
            expected,
        });
    }

    Ok(())
}
