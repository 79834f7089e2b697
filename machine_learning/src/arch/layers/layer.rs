use ndarray::{Array2, ArrayView2};

use super::{Dense, dense::Cache};
use crate::{Result, arch::activations::ActFn};

#[derive(Clone, Debug)]
pub enum Layer {
    Dense(Dense),
}

impl Layer {
    pub fn dense(dim: (usize, usize), act_fn: Option<ActFn>) -> Self {
        Self::Dense(Dense::new(dim, act_fn))
    }

    pub fn size(&self) -> usize {
        match self {
            Self::Dense(l) => l.size(),
        }
    }

    /// Returns the `(fan_in, fan_out)` of the layer, used for initialization.
    pub fn fans(&self) -> (usize, usize) {
        match self {
            Self::Dense(l) => l.dim(),
        }
    }

    /// Returns how many of the layer's parameters are weights, the rest being biases.
    pub fn weights_len(&self) -> usize {
        let (fan_in, fan_out) = self.fans();
        fan_in * fan_out
    }

    pub fn cache(&self) -> Option<&Cache> {
        match self {
            Self::Dense(l) => l.cache(),
        }
    }

    pub fn forward(
        &mut self,
        params: &[f32],
        x: ArrayView2<f32>,
        record: bool,
    ) -> Result<Array2<f32>> {
        match self {
            Self::Dense(l) => l.forward(params, x, record),
        }
    }

    pub fn backward(
        &self,
        cache: &Cache,
        params: &[f32],
        grad: &mut [f32],
        d: Array2<f32>,
    ) -> Result<Array2<f32>> {
        match self {
            Self::Dense(l) => l.backward(cache, params, grad, d),
        }
    }
}
