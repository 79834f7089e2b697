use ndarray::{linalg, prelude::*};

use crate::{MlErr, Result, arch::activations::ActFn};

/// What a `Dense` layer remembers from its last recorded forward pass.
#[derive(Clone, Debug)]
pub struct Cache {
    x: Array2<f32>,
    z: Array2<f32>,
    a: Array2<f32>,
}

impl Cache {
    /// The layer's output for the recorded batch.
    pub fn output(&self) -> ArrayView2<'_, f32> {
        self.a.view()
    }
}

/// A fully connected layer whose parameters live outside of it, laid out as the
/// `dim.0 x dim.1` weight matrix followed by `dim.1` biases.
#[derive(Clone, Debug)]
pub struct Dense {
    dim: (usize, usize),
    act_fn: Option<ActFn>,
    size: usize,
    cache: Option<Cache>,
}

impl Dense {
    /// Creates a new `Dense` layer.
    ///
    /// # Arguments
    /// * `dim` - The input and output dimensions.
    /// * `act_fn` - The activation applied to the output, if any.
    pub fn new(dim: (usize, usize), act_fn: Option<ActFn>) -> Self {
        Self {
            dim,
            size: (dim.0 + 1) * dim.1,
            act_fn,
            cache: None,
        }
    }

    /// Returns the size of this layer.
    ///
    /// # Returns
    /// The amount of parameters this layer has.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn dim(&self) -> (usize, usize) {
        self.dim
    }

    pub fn cache(&self) -> Option<&Cache> {
        self.cache.as_ref()
    }

    /// Computes `act_fn(x * w + b)`.
    ///
    /// # Arguments
    /// * `params` - This layer's slice of parameters.
    /// * `x` - The input batch, one sample per row.
    /// * `record` - Whether to keep what the backward pass needs.
    ///
    /// # Returns
    /// The layer's output or an error if the shapes don't line up.
    pub fn forward(
        &mut self,
        params: &[f32],
        x: ArrayView2<f32>,
        record: bool,
    ) -> Result<Array2<f32>> {
        if x.ncols() != self.dim.0 {
            return Err(MlErr::SizeMismatch {
                what: "dense layer input",
                got: x.ncols(),
                expected: self.dim.0,
            });
        }

        let (w, b) = self.view_params(params)?;
        let mut z = x.dot(&w);
        z += &b;

        let a = match &self.act_fn {
            Some(act_fn) => z.mapv(|z| act_fn.f(z)),
            None => z.clone(),
        };

        self.cache = record.then(|| Cache {
            x: x.to_owned(),
            z,
            a: a.clone(),
        });

        Ok(a)
    }

    /// Accumulates this layer's gradient and returns the delta for the previous layer.
    ///
    /// # Arguments
    /// * `cache` - The recorded forward pass.
    /// * `params` - This layer's slice of parameters.
    /// * `grad` - This layer's slice of the gradient, added to rather than overwritten.
    /// * `d` - The derivative of the loss with respect to this layer's output.
    pub fn backward(
        &self,
        cache: &Cache,
        params: &[f32],
        grad: &mut [f32],
        mut d: Array2<f32>,
    ) -> Result<Array2<f32>> {
        if d.dim() != cache.z.dim() {
            return Err(MlErr::SizeMismatch {
                what: "dense layer delta",
                got: d.len(),
                expected: cache.z.len(),
            });
        }

        if let Some(act_fn) = &self.act_fn {
            d.zip_mut_with(&cache.z, |d, &z| *d *= act_fn.df(z));
        }

        let (w, _) = self.view_params(params)?;
        let (mut dw, mut db) = self.view_grad(grad)?;
        linalg::general_mat_mul(1.0, &cache.x.t(), &d, 1.0, &mut dw);
        db += &d.sum_axis(Axis(0));

        Ok(d.dot(&w.t()))
    }

    /// Gives a view of the raw gradient slice as the delta weights and delta biases of this layer.
    fn view_grad<'a>(
        &self,
        grad: &'a mut [f32],
    ) -> Result<(ArrayViewMut2<'a, f32>, ArrayViewMut1<'a, f32>)> {
        self.check_len("dense layer gradient", grad.len())?;

        let w_size = self.size - self.dim.1;
        let (dw_raw, db_raw) = grad.split_at_mut(w_size);
        let dw = ArrayViewMut2::from_shape(self.dim, dw_raw)?;
        let db = ArrayViewMut1::from_shape(self.dim.1, db_raw)?;
        Ok((dw, db))
    }

    /// Gives a view of the raw parameter slice as the weights and biases of this layer.
    fn view_params<'a>(
        &self,
        params: &'a [f32],
    ) -> Result<(ArrayView2<'a, f32>, ArrayView1<'a, f32>)> {
        self.check_len("dense layer parameters", params.len())?;

        let w_size = self.size - self.dim.1;
        let weights = ArrayView2::from_shape(self.dim, &params[..w_size])?;
        let biases = ArrayView1::from_shape(self.dim.1, &params[w_size..])?;
        Ok((weights, biases))
    }

    fn check_len(&self, what: &'static str, got: usize) -> Result<()> {
        if got != self.size {
            return Err(MlErr::SizeMismatch {
                what,
                got,
                expected: self.size,
            });
        }

        Ok(())
    }
}
