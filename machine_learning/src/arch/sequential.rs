use ndarray::{Array2, ArrayView2};
use rand::Rng;

use super::layers::Layer;
use crate::{MlErr, Result, init::Init, optimization::Optimizer};

/// A sequential model: information flows forward when computing an output and backward when
/// computing the *deltas* of its layers.
///
/// The model owns one flat buffer of parameters and one of gradients, each layer reading the
/// slice at its own offset.
#[derive(Clone, Debug)]
pub struct Sequential {
    layers: Vec<Layer>,
    params: Vec<f32>,
    grad: Vec<f32>,
    training: bool,
    grad_enabled: bool,
}

impl Sequential {
    /// Creates a new `Sequential` with every parameter set to zero.
    ///
    /// # Arguments
    /// * `layers` - The layers the sequential is composed of.
    ///
    /// # Returns
    /// A new `Sequential` instance.
    pub fn new<I>(layers: I) -> Self
    where
        I: IntoIterator<Item = Layer>,
    {
        let layers: Vec<_> = layers.into_iter().collect();
        let size = layers.iter().map(Layer::size).sum();

        Self {
            layers,
            params: vec![0.; size],
            grad: vec![0.; size],
            training: true,
            grad_enabled: true,
        }
    }

    /// Creates a new `Sequential` from already known parameters.
    ///
    /// # Errors
    /// `MlErr::SizeMismatch` if `params` doesn't match the size of the layers.
    pub fn with_params<I>(layers: I, params: Vec<f32>) -> Result<Self>
    where
        I: IntoIterator<Item = Layer>,
    {
        let mut model = Self::new(layers);

        if params.len() != model.size() {
            return Err(MlErr::SizeMismatch {
                what: "model parameters",
                got: params.len(),
                expected: model.size(),
            });
        }

        model.params = params;
        Ok(model)
    }

    /// Initializes every layer's weights with `init` and zeroes the biases.
    pub fn init<R: Rng + ?Sized>(&mut self, init: &Init, rng: &mut R) -> Result<()> {
        let mut offset = 0;

        for layer in &self.layers {
            let size = layer.size();
            let (weights, biases) =
                self.params[offset..offset + size].split_at_mut(layer.weights_len());

            init.fill(weights, layer.fans(), rng)?;
            biases.fill(0.);
            offset += size;
        }

        Ok(())
    }

    /// Returns the amount of parameters in the model.
    pub fn size(&self) -> usize {
        self.params.len()
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn params(&self) -> &[f32] {
        &self.params
    }

    pub fn grad(&self) -> &[f32] {
        &self.grad
    }

    pub fn params_and_grad_mut(&mut self) -> (&mut [f32], &mut [f32]) {
        (&mut self.params, &mut self.grad)
    }

    pub fn training(&self) -> bool {
        self.training
    }

    pub fn set_training(&mut self, training: bool) {
        self.training = training;
    }

    pub fn grad_enabled(&self) -> bool {
        self.grad_enabled
    }

    pub fn set_grad_enabled(&mut self, enabled: bool) {
        self.grad_enabled = enabled;
    }

    /// Makes a forward pass through the network.
    ///
    /// Layers keep what the backward pass needs only when the model is training with gradients
    /// enabled.
    ///
    /// # Arguments
    /// * `x` - The input data, one sample per row.
    ///
    /// # Returns
    /// The prediction for the given input or an error if occurred.
    pub fn forward(&mut self, x: ArrayView2<f32>) -> Result<Array2<f32>> {
        let record = self.training && self.grad_enabled;
        let Self { layers, params, .. } = self;

        let (first, rest) = layers.split_first_mut().ok_or(MlErr::EmptyModel)?;
        let mut offset = first.size();
        let mut out = first.forward(&params[..offset], x, record)?;

        for layer in rest {
            let size = layer.size();
            out = layer.forward(&params[offset..offset + size], out.view(), record)?;
            offset += size;
        }

        Ok(out)
    }

    /// Backpropagates `d`, the derivative of the loss with respect to the last output, adding
    /// each layer's contribution to the gradient buffer.
    ///
    /// # Errors
    /// `MlErr::MissingForward` if the last forward pass wasn't recorded.
    pub fn backward(&mut self, mut d: Array2<f32>) -> Result<()> {
        let Self {
            layers,
            params,
            grad,
            ..
        } = self;

        if layers.is_empty() {
            return Err(MlErr::EmptyModel);
        }

        let mut end = params.len();

        for (i, layer) in layers.iter().enumerate().rev() {
            let start = end - layer.size();
            let cache = layer.cache().ok_or(MlErr::MissingForward { layer: i })?;
            d = layer.backward(cache, &params[start..end], &mut grad[start..end], d)?;
            end = start;
        }

        Ok(())
    }

    /// Takes one optimization step with the accumulated gradient.
    pub fn optimize<O: Optimizer + ?Sized>(&mut self, optimizer: &mut O) -> Result<()> {
        optimizer.update_params(&mut self.params, &self.grad)
    }

    pub fn zero_grad(&mut self) {
        self.grad.fill(0.);
    }

    /// Multiplies the accumulated gradient by `factor` instead of clearing it.
    pub fn scale_grad(&mut self, factor: f32) {
        self.grad.iter_mut().for_each(|g| *g *= factor);
    }

    /// Returns the output of each layer for the last recorded forward pass.
    pub fn activations(&self) -> Vec<Option<ArrayView2<'_, f32>>> {
        self.layers
            .iter()
            .map(|layer| layer.cache().map(|cache| cache.output()))
            .collect()
    }
}
