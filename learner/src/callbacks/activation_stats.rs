use std::{cell::RefCell, rc::Rc};

use serde::Serialize;

use crate::{
    callback::Callback,
    hook::{Hook, HookSet},
    learner::State,
    signal::Flow,
    train::MlStack,
};

/// The mean and standard deviation of one layer's output, one entry per training batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LayerStats {
    pub means: Vec<f32>,
    pub stds: Vec<f32>,
}

/// Keeps track of how the activations of every layer evolve during training.
#[derive(Debug, Clone, Default)]
pub struct ActivationStatsCB {
    stats: Rc<RefCell<Vec<LayerStats>>>,
}

impl ActivationStatsCB {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> Rc<RefCell<Vec<LayerStats>>> {
        self.stats.clone()
    }
}

impl Callback<MlStack> for ActivationStatsCB {
    fn hooks(&self) -> HookSet {
        HookSet::of(&[Hook::BeforeFit, Hook::AfterPredict])
    }

    fn before_fit(&mut self, learn: &mut State<MlStack>) -> Flow {
        let layers = learn.model.layers().len();
        *self.stats.borrow_mut() = vec![LayerStats::default(); layers];
        Ok(())
    }

    fn after_predict(&mut self, learn: &mut State<MlStack>) -> Flow {
        if !learn.training() {
            return Ok(());
        }

        let mut stats = self.stats.borrow_mut();
        for (layer, act) in stats.iter_mut().zip(learn.model.activations()) {
            let Some(act) = act else {
                continue;
            };

            layer.means.push(act.mean().unwrap_or(f32::NAN));
            layer.stds.push(act.std(0.));
        }

        Ok(())
    }
}
