use std::{cell::RefCell, collections::BTreeMap, rc::Rc};

use log::info;
use ndarray::{ArrayView1, Axis};
use serde::{Deserialize, Serialize};

use crate::{
    callback::Callback,
    components::Components,
    data::Split,
    error::Result,
    hook::{Hook, HookSet},
    learner::State,
    signal::Flow,
    train::MlStack,
};

/// A weighted running mean.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MeanMetric {
    total: f64,
    weight: f64,
}

impl MeanMetric {
    pub fn update(&mut self, value: f32, weight: f32) {
        self.total += f64::from(value) * f64::from(weight);
        self.weight += f64::from(weight);
    }

    /// The mean so far, `NaN` before the first update.
    pub fn compute(&self) -> f32 {
        (self.total / self.weight) as f32
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// A value computed over the batches of an epoch.
pub trait Metric<T: Components> {
    fn name(&self) -> &str;

    /// Accounts for the current batch.
    fn update(&mut self, learn: &State<T>) -> Result<()>;

    fn compute(&self) -> f32;

    fn reset(&mut self);
}

/// The share of samples whose highest scoring output matches the highest target.
#[derive(Debug, Clone, Default)]
pub struct Accuracy {
    mean: MeanMetric,
}

impl Accuracy {
    pub fn new() -> Self {
        Self::default()
    }

    fn argmax(row: ArrayView1<f32>) -> Option<usize> {
        row.iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
            .map(|(i, _)| i)
    }
}

impl Metric<MlStack> for Accuracy {
    fn name(&self) -> &str {
        "accuracy"
    }

    fn update(&mut self, learn: &State<MlStack>) -> Result<()> {
        let preds = learn.preds()?;
        let batch = learn.batch()?;

        let hits = preds
            .axis_iter(Axis(0))
            .zip(batch.y.axis_iter(Axis(0)))
            .filter(|(p, y)| Self::argmax(p.view()) == Self::argmax(y.view()))
            .count();

        let n = batch.len();
        if n > 0 {
            self.mean.update(hits as f32 / n as f32, n as f32);
        }

        Ok(())
    }

    fn compute(&self) -> f32 {
        self.mean.compute()
    }

    fn reset(&mut self) {
        self.mean.reset();
    }
}

/// What an epoch ended with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    pub epoch: usize,
    pub split: Split,
    pub loss: f32,
    pub metrics: BTreeMap<String, f32>,
}

impl EpochMetrics {
    /// The named metrics as a JSON object, undefined values as `null`.
    pub fn metrics_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.metrics)?)
    }
}

/// Tracks the mean loss and the given metrics over each epoch, logging them and publishing
/// them as the learner's `metrics` when the epoch ends.
pub struct MetricsCB<T: Components> {
    metrics: Vec<Box<dyn Metric<T>>>,
    loss: MeanMetric,
    history: Rc<RefCell<Vec<EpochMetrics>>>,
}

impl<T: Components> Default for MetricsCB<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Components> MetricsCB<T> {
    pub const ORDER: i32 = 0;

    pub fn new() -> Self {
        Self {
            metrics: Vec::new(),
            loss: MeanMetric::default(),
            history: Rc::default(),
        }
    }

    pub fn with<M: Metric<T> + 'static>(mut self, metric: M) -> Self {
        self.metrics.push(Box::new(metric));
        self
    }

    /// A handle on every epoch summary produced so far.
    pub fn history(&self) -> Rc<RefCell<Vec<EpochMetrics>>> {
        self.history.clone()
    }
}

impl<T: Components> Callback<T> for MetricsCB<T> {
    fn order(&self) -> i32 {
        Self::ORDER
    }

    fn hooks(&self) -> HookSet {
        HookSet::of(&[Hook::BeforeEpoch, Hook::AfterBatch, Hook::AfterEpoch])
    }

    fn before_epoch(&mut self, _learn: &mut State<T>) -> Flow {
        self.loss.reset();
        self.metrics.iter_mut().for_each(|m| m.reset());
        Ok(())
    }

    fn after_batch(&mut self, learn: &mut State<T>) -> Flow {
        for metric in &mut self.metrics {
            metric.update(learn)?;
        }

        self.loss.update(learn.loss()?, learn.batch_len()? as f32);
        Ok(())
    }

    fn after_epoch(&mut self, learn: &mut State<T>) -> Flow {
        let summary = EpochMetrics {
            epoch: learn.epoch,
            split: learn.split,
            loss: self.loss.compute(),
            metrics: self
                .metrics
                .iter()
                .map(|m| (m.name().to_string(), m.compute()))
                .collect(),
        };

        let metrics = summary.metrics_json()?;
        info!(
            epoch = summary.epoch,
            split = summary.split.name(),
            loss = summary.loss;
            "{metrics}"
        );

        self.history.borrow_mut().push(summary.clone());
        learn.metrics = Some(summary);
        Ok(())
    }
}
