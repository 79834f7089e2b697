use machine_learning::{
    arch::{Sequential, loss::LossFn},
    optimization::Optimizer as MlOptimizer,
};
use ndarray::Array2;

use crate::{
    callback::Callback,
    components::{Components, Model, Optimizer},
    data::DataLoaders,
    error::LearnerErr,
    hook::{Hook, HookSet, Op},
    learner::{Learner, Specialization, State},
    signal::Flow,
};

/// The collaborators of a learner training a `Sequential` model.
#[derive(Debug, Clone, Copy)]
pub struct MlStack;

impl Components for MlStack {
    type Model = Sequential;
    type Data = DataLoaders;
    type Output = Array2<f32>;
    type LossFn = Box<dyn LossFn>;
    type Optimizer = Box<dyn MlOptimizer>;
}

impl Model for Sequential {
    fn set_training(&mut self, training: bool) {
        Sequential::set_training(self, training);
    }

    fn training(&self) -> bool {
        Sequential::training(self)
    }

    fn grad_enabled(&self) -> bool {
        Sequential::grad_enabled(self)
    }

    fn set_grad_enabled(&mut self, enabled: bool) {
        Sequential::set_grad_enabled(self, enabled);
    }
}

impl Optimizer for Box<dyn MlOptimizer> {
    fn lr(&self) -> f32 {
        self.learning_rate()
    }

    fn set_lr(&mut self, lr: f32) {
        self.set_learning_rate(lr);
    }
}

/// The usual training operations of a `Sequential`: forward, loss, backpropagation and an
/// optimizer step.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrainSteps;

impl Specialization<MlStack> for TrainSteps {
    fn provides(&self, _op: Op) -> bool {
        true
    }

    fn predict(&mut self, learn: &mut State<MlStack>) -> Flow {
        let batch = learn.batch.as_ref().ok_or(LearnerErr::MissingState("batch"))?;
        learn.preds = Some(learn.model.forward(batch.x.view())?);
        Ok(())
    }

    fn get_loss(&mut self, learn: &mut State<MlStack>) -> Flow {
        let batch = learn.batch()?;
        let preds = learn.preds()?;
        let loss = learn.loss_fn.loss(preds.view(), batch.y.view())?;
        learn.loss = Some(loss);
        Ok(())
    }

    fn backward(&mut self, learn: &mut State<MlStack>) -> Flow {
        let batch = learn.batch.as_ref().ok_or(LearnerErr::MissingState("batch"))?;
        let preds = learn.preds.as_ref().ok_or(LearnerErr::MissingState("preds"))?;
        let d = learn.loss_fn.loss_prime(preds.view(), batch.y.view())?;
        learn.model.backward(d)?;
        Ok(())
    }

    fn step(&mut self, learn: &mut State<MlStack>) -> Flow {
        let opt = learn.opt.as_mut().ok_or(LearnerErr::MissingState("opt"))?;
        learn.model.optimize(&mut **opt)?;
        Ok(())
    }

    fn zero_grad(&mut self, learn: &mut State<MlStack>) -> Flow {
        learn.model.zero_grad();
        Ok(())
    }
}

/// A learner that knows how to train a `Sequential` on its own.
pub type TrainLearner = Learner<MlStack, TrainSteps>;

impl Learner<MlStack, TrainSteps> {
    /// Creates a `TrainLearner`.
    pub fn train(
        model: Sequential,
        data: DataLoaders,
        loss_fn: Box<dyn LossFn>,
        lr: f32,
    ) -> Self {
        Learner::specialized(model, data, loss_fn, lr, TrainSteps)
    }
}

const OPS: HookSet = HookSet::of(&[
    Hook::Predict,
    Hook::GetLoss,
    Hook::Backward,
    Hook::Step,
    Hook::ZeroGrad,
]);

/// The training operations of `TrainSteps` as a callback, for plain learners.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrainCB {
    steps: TrainSteps,
}

impl TrainCB {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Callback<MlStack> for TrainCB {
    fn hooks(&self) -> HookSet {
        OPS
    }

    fn predict(&mut self, learn: &mut State<MlStack>) -> Flow {
        self.steps.predict(learn)
    }

    fn get_loss(&mut self, learn: &mut State<MlStack>) -> Flow {
        self.steps.get_loss(learn)
    }

    fn backward(&mut self, learn: &mut State<MlStack>) -> Flow {
        self.steps.backward(learn)
    }

    fn step(&mut self, learn: &mut State<MlStack>) -> Flow {
        self.steps.step(learn)
    }

    fn zero_grad(&mut self, learn: &mut State<MlStack>) -> Flow {
        self.steps.zero_grad(learn)
    }
}

/// Keeps a fraction of the previous gradients instead of clearing them.
#[derive(Debug, Clone, Copy)]
pub struct MomentumCB {
    momentum: f32,
}

impl MomentumCB {
    pub fn new(momentum: f32) -> Self {
        Self { momentum }
    }
}

impl Default for MomentumCB {
    fn default() -> Self {
        Self::new(0.85)
    }
}

impl Callback<MlStack> for MomentumCB {
    fn hooks(&self) -> HookSet {
        HookSet::of(&[Hook::ZeroGrad])
    }

    fn zero_grad(&mut self, learn: &mut State<MlStack>) -> Flow {
        learn.model.scale_grad(self.momentum);
        Ok(())
    }
}
