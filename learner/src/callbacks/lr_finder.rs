use std::{cell::RefCell, rc::Rc};

use log::info;
use serde::Serialize;

use super::{ExponentialLr, LrScheduler};
use crate::{
    callback::Callback,
    components::{Components, Optimizer},
    hook::{Hook, HookSet},
    learner::State,
    signal::{Flow, Interrupt},
};

/// A learning rate tried by the finder and the loss it gave.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LrPoint {
    pub lr: f32,
    pub loss: f32,
}

/// Grows the learning rate after every training batch, recording the loss, until the loss
/// gets `max_mult` times worse than the best seen or stops being finite.
///
/// Validation epochs are skipped entirely.
#[derive(Debug, Clone)]
pub struct LRFinderCB {
    sched: ExponentialLr,
    max_mult: f32,
    min: f32,
    history: Rc<RefCell<Vec<LrPoint>>>,
}

impl LRFinderCB {
    pub fn new(gamma: f32, max_mult: f32) -> Self {
        Self {
            sched: ExponentialLr::new(gamma),
            max_mult,
            min: f32::INFINITY,
            history: Rc::default(),
        }
    }

    pub fn history(&self) -> Rc<RefCell<Vec<LrPoint>>> {
        self.history.clone()
    }
}

impl<T: Components> Callback<T> for LRFinderCB {
    fn hooks(&self) -> HookSet {
        HookSet::of(&[Hook::BeforeFit, Hook::AfterBatch, Hook::AfterFit])
    }

    fn before_fit(&mut self, _learn: &mut State<T>) -> Flow {
        self.min = f32::INFINITY;
        self.history.borrow_mut().clear();
        Ok(())
    }

    fn after_batch(&mut self, learn: &mut State<T>) -> Flow {
        if !learn.training() {
            return Err(Interrupt::CancelEpoch);
        }

        let loss = learn.loss()?;
        let opt = learn.opt_mut()?;
        let lr = opt.lr();
        self.history.borrow_mut().push(LrPoint { lr, loss });

        if loss < self.min {
            self.min = loss;
        }

        if !loss.is_finite() || loss > self.min * self.max_mult {
            return Err(Interrupt::CancelFit);
        }

        opt.set_lr(self.sched.next_lr(lr));
        Ok(())
    }

    fn after_fit(&mut self, _learn: &mut State<T>) -> Flow {
        info!(
            "learning rate search ran out of epochs after {} batches",
            self.history.borrow().len()
        );
        Ok(())
    }
}
