use log::info;

use crate::{
    callback::Callback,
    callbacks::{EpochMetrics, LRFinderCB, LrPoint},
    components::{BatchOf, Components, DataSource, Model},
    data::Split,
    dispatch::{CallbackId, CallbackSet},
    error::{LearnerErr, Result},
    hook::{Hook, Op},
    phase::{Phased, with_cbs},
    signal::{Flow, Interrupt, Phase},
};

/// Builds the optimizer of a fit from the model and the learning rate.
pub type OptFunc<T> = Box<
    dyn Fn(&<T as Components>::Model, f32) -> Result<<T as Components>::Optimizer>,
>;

/// Everything callbacks get to see and change during a fit.
///
/// The fields that only make sense inside some phase (`opt`, `batch`, `preds`, `loss`) are
/// optional; the accessors of the same name fail with `LearnerErr::MissingState` when read
/// outside of it.
pub struct State<T: Components> {
    pub model: T::Model,
    pub data: T::Data,
    pub loss_fn: T::LossFn,
    /// The default learning rate of a fit.
    pub lr: f32,
    pub opt: Option<T::Optimizer>,
    pub n_epochs: usize,
    pub epoch: usize,
    pub iter: usize,
    pub split: Split,
    pub batch: Option<BatchOf<T>>,
    pub preds: Option<T::Output>,
    pub loss: Option<f32>,
    /// The summary of the last finished epoch, when a metrics callback publishes one.
    pub metrics: Option<EpochMetrics>,
}

impl<T: Components> State<T> {
    pub fn new(model: T::Model, data: T::Data, loss_fn: T::LossFn, lr: f32) -> Self {
        Self {
            model,
            data,
            loss_fn,
            lr,
            opt: None,
            n_epochs: 0,
            epoch: 0,
            iter: 0,
            split: Split::Train,
            batch: None,
            preds: None,
            loss: None,
            metrics: None,
        }
    }

    /// Whether the current epoch trains the model.
    pub fn training(&self) -> bool {
        self.model.training()
    }

    pub fn batch(&self) -> Result<&BatchOf<T>> {
        self.batch.as_ref().ok_or(LearnerErr::MissingState("batch"))
    }

    pub fn batch_mut(&mut self) -> Result<&mut BatchOf<T>> {
        self.batch.as_mut().ok_or(LearnerErr::MissingState("batch"))
    }

    pub fn preds(&self) -> Result<&T::Output> {
        self.preds.as_ref().ok_or(LearnerErr::MissingState("preds"))
    }

    pub fn loss(&self) -> Result<f32> {
        self.loss.ok_or(LearnerErr::MissingState("loss"))
    }

    pub fn opt(&self) -> Result<&T::Optimizer> {
        self.opt.as_ref().ok_or(LearnerErr::MissingState("opt"))
    }

    pub fn opt_mut(&mut self) -> Result<&mut T::Optimizer> {
        self.opt.as_mut().ok_or(LearnerErr::MissingState("opt"))
    }

    /// Drops everything a batch left behind.
    fn clear_batch(&mut self) {
        self.batch = None;
        self.preds = None;
        self.loss = None;
    }

    /// The amount of samples in the current batch.
    pub fn batch_len(&self) -> Result<usize> {
        self.batch().map(<T::Data as DataSource>::batch_len)
    }
}

/// The training operations a kind of learner brings on its own.
///
/// Callbacks handling an operation always take precedence over the specialization.
pub trait Specialization<T: Components> {
    fn provides(&self, op: Op) -> bool;

    fn predict(&mut self, _learn: &mut State<T>) -> Flow {
        Err(LearnerErr::Unsupported(Op::Predict).into())
    }

    fn get_loss(&mut self, _learn: &mut State<T>) -> Flow {
        Err(LearnerErr::Unsupported(Op::GetLoss).into())
    }

    fn backward(&mut self, _learn: &mut State<T>) -> Flow {
        Err(LearnerErr::Unsupported(Op::Backward).into())
    }

    fn step(&mut self, _learn: &mut State<T>) -> Flow {
        Err(LearnerErr::Unsupported(Op::Step).into())
    }

    fn zero_grad(&mut self, _learn: &mut State<T>) -> Flow {
        Err(LearnerErr::Unsupported(Op::ZeroGrad).into())
    }

    fn run(&mut self, op: Op, learn: &mut State<T>) -> Flow {
        match op {
            Op::Predict => self.predict(learn),
            Op::GetLoss => self.get_loss(learn),
            Op::Backward => self.backward(learn),
            Op::Step => self.step(learn),
            Op::ZeroGrad => self.zero_grad(learn),
        }
    }
}

/// The plain learner, every operation coming from its callbacks.
impl<T: Components> Specialization<T> for () {
    fn provides(&self, _op: Op) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Callbacks,
    Specialization,
    Missing,
}

/// The options of a single `fit`.
pub struct FitOptions<T: Components> {
    pub train: bool,
    pub valid: bool,
    pub cbs: Vec<Box<dyn Callback<T>>>,
    pub lr: Option<f32>,
}

impl<T: Components> Default for FitOptions<T> {
    fn default() -> Self {
        Self {
            train: true,
            valid: true,
            cbs: Vec::new(),
            lr: None,
        }
    }
}

impl<T: Components> FitOptions<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn train(mut self, train: bool) -> Self {
        self.train = train;
        self
    }

    pub fn valid(mut self, valid: bool) -> Self {
        self.valid = valid;
        self
    }

    /// Adds a callback registered only for the duration of the fit.
    pub fn cb<C: Callback<T> + 'static>(mut self, cb: C) -> Self {
        self.cbs.push(Box::new(cb));
        self
    }

    pub fn lr(mut self, lr: f32) -> Self {
        self.lr = Some(lr);
        self
    }
}

/// The options of a learning rate search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LrFindOptions {
    /// The factor the learning rate is multiplied by after each batch.
    pub gamma: f32,
    /// How many times worse than the best loss the search tolerates.
    pub max_mult: f32,
    pub start_lr: f32,
    pub max_epochs: usize,
}

impl Default for LrFindOptions {
    fn default() -> Self {
        Self {
            gamma: 1.3,
            max_mult: 3.,
            start_lr: 1e-5,
            max_epochs: 10,
        }
    }
}

/// Runs the training loop of a model, delegating every customizable step to callbacks.
///
/// `S` provides the training operations no callback handles; the plain `Learner` has none.
pub struct Learner<T: Components, S = ()> {
    state: State<T>,
    cbs: CallbackSet<T>,
    steps: S,
    opt_func: Option<OptFunc<T>>,
    ops: [Source; 5],
}

impl<T: Components> Learner<T> {
    /// Creates a plain `Learner`, every operation coming from its callbacks.
    pub fn new(model: T::Model, data: T::Data, loss_fn: T::LossFn, lr: f32) -> Self {
        Self::specialized(model, data, loss_fn, lr, ())
    }
}

impl<T: Components, S: Specialization<T>> Learner<T, S> {
    /// Creates a `Learner` whose missing operations fall back to `steps`.
    ///
    /// # Arguments
    /// * `model` - The model to train.
    /// * `data` - Where the batches come from.
    /// * `loss_fn` - The loss function.
    /// * `lr` - The learning rate used when a fit doesn't set one.
    /// * `steps` - The learner's own training operations.
    pub fn specialized(
        model: T::Model,
        data: T::Data,
        loss_fn: T::LossFn,
        lr: f32,
        steps: S,
    ) -> Self {
        let mut learn = Self {
            state: State::new(model, data, loss_fn, lr),
            cbs: CallbackSet::new(),
            steps,
            opt_func: None,
            ops: [Source::Missing; 5],
        };

        learn.resolve_ops();
        learn
    }

    /// Registers every callback of `cbs`.
    pub fn with_callbacks<I>(mut self, cbs: I) -> Self
    where
        I: IntoIterator<Item = Box<dyn Callback<T>>>,
    {
        for cb in cbs {
            self.cbs.add(cb);
        }

        self.resolve_ops();
        self
    }

    /// Sets the factory of the optimizer each fit trains with.
    pub fn with_opt_func<F>(mut self, opt_func: F) -> Self
    where
        F: Fn(&T::Model, f32) -> Result<T::Optimizer> + 'static,
    {
        self.opt_func = Some(Box::new(opt_func));
        self
    }

    pub fn add_cb<C: Callback<T> + 'static>(&mut self, cb: C) -> CallbackId {
        let id = self.cbs.add(Box::new(cb));
        self.resolve_ops();
        id
    }

    pub fn remove_cb(&mut self, id: CallbackId) -> Option<Box<dyn Callback<T>>> {
        let cb = self.cbs.remove(id);
        self.resolve_ops();
        cb
    }

    pub fn callbacks(&self) -> &CallbackSet<T> {
        &self.cbs
    }

    pub fn state(&self) -> &State<T> {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut State<T> {
        &mut self.state
    }

    pub fn into_state(self) -> State<T> {
        self.state
    }

    /// Trains and/or validates the model for `n_epochs`.
    ///
    /// The callbacks of `opts` are registered for this fit only, and removed however it ends.
    /// A new optimizer is built for the fit with `opts.lr`, or the learner's rate if unset.
    ///
    /// # Errors
    /// Any failure raised during the fit, or `LearnerErr::UncaughtSignal` if a cancellation
    /// escaped its phase.
    pub fn fit(&mut self, n_epochs: usize, opts: FitOptions<T>) -> Result<()> {
        let FitOptions {
            train,
            valid,
            cbs,
            lr,
        } = opts;

        let extras: Vec<_> = cbs.into_iter().map(|cb| self.cbs.add(cb)).collect();
        self.resolve_ops();

        let result = self.run_fit(n_epochs, train, valid, lr);

        for id in extras {
            self.cbs.remove(id);
        }

        self.resolve_ops();
        result
    }

    /// Runs one epoch over the training split if `training`, the test split otherwise.
    ///
    /// Meant to run inside of a fit; any interruption other than the epoch's own
    /// cancellation is handed back to the caller.
    pub fn one_epoch(&mut self, training: bool) -> Flow {
        self.state.model.set_training(training);
        self.state.split = if training { Split::Train } else { Split::Test };

        with_cbs(self, Phase::Epoch, |learn| {
            let loader = learn.state.data.loader(learn.state.split)?;

            for (iter, batch) in loader.enumerate() {
                learn.state.iter = iter;
                learn.state.batch = Some(batch?);

                let flow = with_cbs(learn, Phase::Batch, Self::one_batch);
                learn.state.clear_batch();
                flow?;
            }

            Ok(())
        })
    }

    /// Looks for a good learning rate by growing it geometrically from `opts.start_lr` on
    /// every training batch until the loss blows up.
    ///
    /// # Returns
    /// The learning rates tried along with their loss.
    pub fn lr_find(&mut self, opts: LrFindOptions) -> Result<Vec<LrPoint>> {
        let finder = LRFinderCB::new(opts.gamma, opts.max_mult);
        let history = finder.history();

        let fit = FitOptions::new().lr(opts.start_lr).cb(finder);
        self.fit(opts.max_epochs, fit)?;

        Ok(history.take())
    }

    fn run_fit(
        &mut self,
        n_epochs: usize,
        train: bool,
        valid: bool,
        lr: Option<f32>,
    ) -> Result<()> {
        let lr = lr.unwrap_or(self.state.lr);

        self.state.n_epochs = n_epochs;
        self.state.epoch = 0;
        self.state.opt = match &self.opt_func {
            Some(opt_func) => Some(opt_func(&self.state.model, lr)?),
            None => None,
        };

        info!("fitting for {n_epochs} epochs with lr {lr}");
        with_cbs(self, Phase::Fit, |learn| learn.epochs(train, valid))
            .map_err(Interrupt::into_err)
    }

    fn epochs(&mut self, train: bool, valid: bool) -> Flow {
        for epoch in 0..self.state.n_epochs {
            self.state.epoch = epoch;

            if train {
                self.one_epoch(true)?;
            }

            if valid {
                self.validate()?;
            }
        }

        Ok(())
    }

    fn validate(&mut self) -> Flow {
        let grad_enabled = self.state.model.grad_enabled();
        self.state.model.set_grad_enabled(false);
        let flow = self.one_epoch(false);
        self.state.model.set_grad_enabled(grad_enabled);
        flow
    }

    fn one_batch(&mut self) -> Flow {
        self.run_op(Op::Predict)?;
        self.callback(Hook::AfterPredict)?;
        self.run_op(Op::GetLoss)?;
        self.callback(Hook::AfterLoss)?;

        if self.state.training() {
            self.run_op(Op::Backward)?;
            self.callback(Hook::AfterBackward)?;
            self.run_op(Op::Step)?;
            self.callback(Hook::AfterStep)?;
            self.run_op(Op::ZeroGrad)?;
        }

        Ok(())
    }

    fn run_op(&mut self, op: Op) -> Flow {
        match self.ops[op.index()] {
            Source::Callbacks => self.cbs.dispatch(op.into(), &mut self.state),
            Source::Specialization => self.steps.run(op, &mut self.state),
            Source::Missing => Err(LearnerErr::Unsupported(op).into()),
        }
    }

    fn resolve_ops(&mut self) {
        for op in Op::ALL {
            self.ops[op.index()] = if self.cbs.provides(op) {
                Source::Callbacks
            } else if self.steps.provides(op) {
                Source::Specialization
            } else {
                Source::Missing
            };
        }
    }
}

impl<T: Components, S: Specialization<T>> Phased for Learner<T, S> {
    fn callback(&mut self, hook: Hook) -> Flow {
        self.cbs.dispatch(hook, &mut self.state)
    }
}
