use std::{cell::RefCell, rc::Rc};

use log::info;
use serde::Serialize;

use super::MetricsCB;
use crate::{
    callback::{Callback, after},
    components::Components,
    hook::{Hook, HookSet},
    learner::State,
    signal::Flow,
};

/// The loss of every training batch and the mean loss of every validation epoch.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LossCurves {
    pub train: Vec<f32>,
    pub valid: Vec<f32>,
}

/// Logs the progress of a fit every `periodicity` training batches and keeps its loss
/// curves. Validation losses are taken from the epoch summary, so it runs after `MetricsCB`.
#[derive(Debug, Clone)]
pub struct ProgressCB {
    periodicity: usize,
    curves: Rc<RefCell<LossCurves>>,
}

impl ProgressCB {
    pub fn new(periodicity: usize) -> Self {
        Self {
            periodicity: periodicity.max(1),
            curves: Rc::default(),
        }
    }

    pub fn curves(&self) -> Rc<RefCell<LossCurves>> {
        self.curves.clone()
    }
}

impl Default for ProgressCB {
    fn default() -> Self {
        Self::new(10)
    }
}

impl<T: Components> Callback<T> for ProgressCB {
    fn order(&self) -> i32 {
        after(&[MetricsCB::<T>::ORDER])
    }

    fn hooks(&self) -> HookSet {
        HookSet::of(&[Hook::BeforeFit, Hook::AfterBatch, Hook::AfterEpoch])
    }

    fn before_fit(&mut self, learn: &mut State<T>) -> Flow {
        *self.curves.borrow_mut() = LossCurves::default();
        info!("starting fit of {} epochs", learn.n_epochs);
        Ok(())
    }

    fn after_batch(&mut self, learn: &mut State<T>) -> Flow {
        if !learn.training() {
            return Ok(());
        }

        let loss = learn.loss()?;
        self.curves.borrow_mut().train.push(loss);

        if learn.iter % self.periodicity == 0 {
            info!("epoch {} batch {}: loss {loss:.3}", learn.epoch, learn.iter);
        }

        Ok(())
    }

    fn after_epoch(&mut self, learn: &mut State<T>) -> Flow {
        if learn.training() {
            return Ok(());
        }

        if let Some(metrics) = &learn.metrics {
            self.curves.borrow_mut().valid.push(metrics.loss);
        }

        Ok(())
    }
}
