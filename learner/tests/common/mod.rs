#![allow(dead_code)]

use std::{cell::RefCell, rc::Rc};

use learner::{
    Callback, Components, DataSource, Flow, Hook, HookSet, Learner, LearnerErr, Model, Op,
    Optimizer, Result, Specialization, Split, State,
    callbacks::{Device, ToDevice},
};

/// Collaborators that do no math: each batch is a single number which is also its
/// prediction and its loss.
pub struct Mock;

impl Components for Mock {
    type Model = MockModel;
    type Data = VecData;
    type Output = f32;
    type LossFn = ();
    type Optimizer = MockOpt;
}

pub struct MockModel {
    training: bool,
    pub grad_enabled: bool,
    pub grad_toggles: Vec<bool>,
}

impl Default for MockModel {
    fn default() -> Self {
        Self {
            training: true,
            grad_enabled: true,
            grad_toggles: Vec::new(),
        }
    }
}

impl Model for MockModel {
    fn set_training(&mut self, training: bool) {
        self.training = training;
    }

    fn training(&self) -> bool {
        self.training
    }

    fn grad_enabled(&self) -> bool {
        self.grad_enabled
    }

    fn set_grad_enabled(&mut self, enabled: bool) {
        self.grad_enabled = enabled;
        self.grad_toggles.push(enabled);
    }
}

impl ToDevice for MockModel {
    fn to_device(&mut self, _device: Device) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MockBatch(pub f32);

impl ToDevice for MockBatch {
    fn to_device(&mut self, _device: Device) -> Result<()> {
        Ok(())
    }
}

/// One batch per value of each split.
pub struct VecData {
    pub train: Vec<f32>,
    pub test: Vec<f32>,
}

impl DataSource for VecData {
    type Batch = MockBatch;
    type Loader = std::vec::IntoIter<Result<MockBatch>>;

    fn loader(&mut self, split: Split) -> Result<Self::Loader> {
        let values = match split {
            Split::Train => &self.train,
            Split::Test => &self.test,
        };

        let batches: Vec<_> = values.iter().map(|&v| Ok(MockBatch(v))).collect();
        Ok(batches.into_iter())
    }

    fn batch_len(_batch: &Self::Batch) -> usize {
        1
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MockOpt {
    pub lr: f32,
}

impl Optimizer for MockOpt {
    fn lr(&self) -> f32 {
        self.lr
    }

    fn set_lr(&mut self, lr: f32) {
        self.lr = lr;
    }
}

/// Predicts the batch value and uses it as the loss.
pub struct MockSteps;

impl Specialization<Mock> for MockSteps {
    fn provides(&self, _op: Op) -> bool {
        true
    }

    fn predict(&mut self, learn: &mut State<Mock>) -> Flow {
        learn.preds = Some(learn.batch()?.0);
        Ok(())
    }

    fn get_loss(&mut self, learn: &mut State<Mock>) -> Flow {
        learn.loss = Some(*learn.preds()?);
        Ok(())
    }

    fn backward(&mut self, _learn: &mut State<Mock>) -> Flow {
        Ok(())
    }

    fn step(&mut self, _learn: &mut State<Mock>) -> Flow {
        Ok(())
    }

    fn zero_grad(&mut self, _learn: &mut State<Mock>) -> Flow {
        Ok(())
    }
}

pub fn data(train: &[f32], test: &[f32]) -> VecData {
    VecData {
        train: train.to_vec(),
        test: test.to_vec(),
    }
}

/// A learner over `Mock` that trains with `MockSteps` and builds a `MockOpt` on every fit.
pub fn learner(train: &[f32], test: &[f32]) -> Learner<Mock, MockSteps> {
    Learner::<Mock, MockSteps>::specialized(
        MockModel::default(),
        data(train, test),
        (),
        0.1,
        MockSteps,
    )
    .with_opt_func(|_, lr| Ok(MockOpt { lr }))
}

pub type Log = Rc<RefCell<Vec<String>>>;

type React = Box<dyn FnMut(Hook, &mut State<Mock>) -> Flow>;

/// Logs every hook it handles as `"<name>:<hook>"`, then runs its reaction.
pub struct Rec {
    name: &'static str,
    order: i32,
    hooks: HookSet,
    exclusive: HookSet,
    log: Log,
    react: React,
}

impl Rec {
    pub fn new(name: &'static str, log: &Log) -> Self {
        Self {
            name,
            order: 0,
            hooks: Hook::ALL.into_iter().filter(|h| !is_op(*h)).collect(),
            exclusive: HookSet::EMPTY,
            log: log.clone(),
            react: Box::new(|_, _| Ok(())),
        }
    }

    pub fn order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    pub fn hooks(mut self, hooks: HookSet) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn exclusive(mut self, exclusive: HookSet) -> Self {
        self.exclusive = exclusive;
        self
    }

    pub fn react<F>(mut self, react: F) -> Self
    where
        F: FnMut(Hook, &mut State<Mock>) -> Flow + 'static,
    {
        self.react = Box::new(react);
        self
    }
}

impl Callback<Mock> for Rec {
    fn name(&self) -> &str {
        self.name
    }

    fn order(&self) -> i32 {
        self.order
    }

    fn hooks(&self) -> HookSet {
        self.hooks
    }

    fn exclusive(&self) -> HookSet {
        self.exclusive
    }

    fn call(&mut self, hook: Hook, learn: &mut State<Mock>) -> Flow {
        self.log.borrow_mut().push(format!("{}:{hook}", self.name));
        (self.react)(hook, learn)
    }
}

pub fn is_op(hook: Hook) -> bool {
    Op::ALL.into_iter().any(|op| Hook::from(op) == hook)
}

pub fn new_log() -> Log {
    Rc::default()
}

/// The hooks logged by `name`, without the name.
pub fn hooks_of(log: &Log, name: &str) -> Vec<String> {
    let prefix = format!("{name}:");
    log.borrow()
        .iter()
        .filter_map(|entry| entry.strip_prefix(&prefix).map(str::to_string))
        .collect()
}

pub fn custom(msg: &str) -> LearnerErr {
    LearnerErr::Custom(msg.to_string())
}
