use rand::Rng;
use rand_distr::{Distribution, Normal, Uniform};

use crate::{MlErr, Result};

/// How a layer's weights are initialized.
#[derive(Clone, Debug, PartialEq)]
pub enum Init {
    Const(f32),
    Uniform { low: f32, high: f32 },
    Normal { mean: f32, std_dev: f32 },
    /// Normal with `std_dev = sqrt(2 / fan_in)`, suited to rectifiers.
    KaimingNormal,
    /// Uniform in `±sqrt(6 / (fan_in + fan_out))`.
    XavierUniform,
}

impl Init {
    /// Fills `weights` following this initialization.
    ///
    /// # Arguments
    /// * `weights` - The weights to overwrite.
    /// * `fans` - The `(fan_in, fan_out)` of the layer owning the weights.
    /// * `rng` - The random number generator.
    ///
    /// # Errors
    /// `MlErr::InvalidDistribution` if the resulting distribution is invalid.
    pub fn fill<R: Rng + ?Sized>(
        &self,
        weights: &mut [f32],
        (fan_in, fan_out): (usize, usize),
        rng: &mut R,
    ) -> Result<()> {
        match *self {
            Init::Const(value) => {
                weights.fill(value);
                Ok(())
            }
            Init::Uniform { low, high } => sample(uniform(low, high)?, weights, rng),
            Init::Normal { mean, std_dev } => sample(normal(mean, std_dev)?, weights, rng),
            Init::KaimingNormal => {
                let std_dev = (2. / fan_in.max(1) as f32).sqrt();
                sample(normal(0., std_dev)?, weights, rng)
            }
            Init::XavierUniform => {
                let range = (6. / (fan_in + fan_out).max(1) as f32).sqrt();
                sample(uniform(-range, range)?, weights, rng)
            }
        }
    }
}

fn uniform(low: f32, high: f32) -> Result<Uniform<f32>> {
    Uniform::new(low, high).map_err(|e| MlErr::InvalidDistribution(e.to_string()))
}

fn normal(mean: f32, std_dev: f32) -> Result<Normal<f32>> {
    Normal::new(mean, std_dev).map_err(|e| MlErr::InvalidDistribution(e.to_string()))
}

fn sample<D, R>(distribution: D, weights: &mut [f32], rng: &mut R) -> Result<()>
where
    D: Distribution<f32>,
    R: Rng + ?Sized,
{
    for w in weights {
        *w = distribution.sample(rng);
    }

    Ok(())
}
