use std::f32::consts::PI;

use crate::{
    callback::Callback,
    components::{Components, Optimizer},
    hook::{Hook, HookSet},
    learner::State,
    signal::Flow,
};

/// Decides the learning rate of the next batch.
pub trait LrScheduler {
    /// The rate to start a fit with, if the scheduler imposes one.
    fn initial_lr(&self) -> Option<f32> {
        None
    }

    /// Advances one batch, given the current rate.
    fn next_lr(&mut self, lr: f32) -> f32;
}

/// Multiplies the learning rate by `gamma` on every step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExponentialLr {
    gamma: f32,
}

impl ExponentialLr {
    pub fn new(gamma: f32) -> Self {
        Self { gamma }
    }
}

impl LrScheduler for ExponentialLr {
    fn next_lr(&mut self, lr: f32) -> f32 {
        lr * self.gamma
    }
}

/// Warms the learning rate up to `max_lr` then anneals it back down, both along a cosine.
#[derive(Debug, Clone, PartialEq)]
pub struct OneCycleLr {
    max_lr: f32,
    total_steps: usize,
    pct_start: f32,
    div_factor: f32,
    final_div_factor: f32,
    step: usize,
}

impl OneCycleLr {
    /// Creates a new `OneCycleLr`.
    ///
    /// # Arguments
    /// * `max_lr` - The peak learning rate.
    /// * `total_steps` - The amount of training batches of the whole fit.
    pub fn new(max_lr: f32, total_steps: usize) -> Self {
        Self {
            max_lr,
            total_steps: total_steps.max(1),
            pct_start: 0.25,
            div_factor: 25.,
            final_div_factor: 1e4,
            step: 0,
        }
    }

    /// The share of steps spent warming up.
    pub fn pct_start(mut self, pct_start: f32) -> Self {
        self.pct_start = pct_start.clamp(0., 1.);
        self
    }

    fn start_lr(&self) -> f32 {
        self.max_lr / self.div_factor
    }

    fn lr_at(&self, step: usize) -> f32 {
        let warmup = (self.pct_start * self.total_steps as f32).max(1.);
        let step = step.min(self.total_steps) as f32;

        if step < warmup {
            cos_anneal(self.start_lr(), self.max_lr, step / warmup)
        } else {
            let min_lr = self.start_lr() / self.final_div_factor;
            let rest = (self.total_steps as f32 - warmup).max(1.);
            cos_anneal(self.max_lr, min_lr, (step - warmup) / rest)
        }
    }
}

fn cos_anneal(start: f32, end: f32, pct: f32) -> f32 {
    end + (start - end) / 2. * ((PI * pct).cos() + 1.)
}

impl LrScheduler for OneCycleLr {
    fn initial_lr(&self) -> Option<f32> {
        Some(self.lr_at(0))
    }

    fn next_lr(&mut self, _lr: f32) -> f32 {
        self.step += 1;
        self.lr_at(self.step)
    }
}

/// Steps a scheduler after every training batch.
#[derive(Debug, Clone)]
pub struct BatchSchedulerCB<S> {
    sched: S,
}

impl<S: LrScheduler> BatchSchedulerCB<S> {
    pub fn new(sched: S) -> Self {
        Self { sched }
    }
}

impl<T: Components, S: LrScheduler> Callback<T> for BatchSchedulerCB<S> {
    fn hooks(&self) -> HookSet {
        HookSet::of(&[Hook::BeforeFit, Hook::AfterBatch])
    }

    fn before_fit(&mut self, learn: &mut State<T>) -> Flow {
        if let Some(lr) = self.sched.initial_lr() {
            learn.opt_mut()?.set_lr(lr);
        }

        Ok(())
    }

    fn after_batch(&mut self, learn: &mut State<T>) -> Flow {
        if learn.training() {
            let opt = learn.opt_mut()?;
            let lr = self.sched.next_lr(opt.lr());
            opt.set_lr(lr);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponential_multiplies() {
        let mut sched = ExponentialLr::new(2.);
        assert_eq!(sched.next_lr(0.5), 1.);
    }

    #[test]
    fn one_cycle_peaks_then_decays() {
        let mut sched = OneCycleLr::new(1., 100);
        let start = sched.initial_lr().unwrap();
        let lrs: Vec<f32> = (0..100).map(|_| sched.next_lr(0.)).collect();

        assert!((start - 0.04).abs() < 1e-6);
        assert!((lrs[24] - 1.).abs() < 1e-6);
        assert!(lrs[99] < start);
        assert!(lrs.windows(2).take(24).all(|w| w[0] < w[1]));
        assert!(lrs.windows(2).skip(24).all(|w| w[0] >= w[1]));
    }
}
