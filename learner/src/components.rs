use crate::{data::Split, error::Result};

/// The model as seen by the learner: something that can switch between training and
/// evaluation, and stop tracking gradients.
pub trait Model {
    fn set_training(&mut self, training: bool);

    fn training(&self) -> bool;

    /// Whether gradients are being tracked; always true for models without any bookkeeping.
    fn grad_enabled(&self) -> bool {
        true
    }

    /// Enables or disables gradient bookkeeping; models without any can ignore it.
    fn set_grad_enabled(&mut self, _enabled: bool) {}
}

/// A source of batches for each split.
pub trait DataSource {
    type Batch;
    type Loader: Iterator<Item = Result<Self::Batch>>;

    /// Returns a fresh pass over the batches of `split`.
    ///
    /// # Errors
    /// If the split can't be loaded.
    fn loader(&mut self, split: Split) -> Result<Self::Loader>;

    /// The amount of samples in `batch`, used to weight per batch metrics.
    fn batch_len(batch: &Self::Batch) -> usize;
}

/// The part of an optimizer the learner and its callbacks need to see.
pub trait Optimizer {
    fn lr(&self) -> f32;

    fn set_lr(&mut self, lr: f32);
}

/// Bundles the types of the collaborators a `Learner` orchestrates.
pub trait Components: 'static {
    type Model: Model;
    type Data: DataSource;
    type Output;
    type LossFn;
    type Optimizer: Optimizer;
}

/// Shorthand for the batch type of some `Components`.
pub type BatchOf<T> = <<T as Components>::Data as DataSource>::Batch;
