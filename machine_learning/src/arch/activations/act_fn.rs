use super::{Relu, Sigmoid};

/// An element-wise activation function applied at the output of a layer.
#[derive(Clone, Debug)]
pub enum ActFn {
    Sigmoid(Sigmoid),
    Relu(Relu),
}

impl ActFn {
    pub fn sigmoid(amp: f32) -> Self {
        Self::Sigmoid(Sigmoid::new(amp))
    }

    pub fn relu() -> Self {
        Self::Relu(Relu::default())
    }

    /// A leaky rectifier shifted down by `sub`.
    ///
    /// # Arguments
    /// * `leak` - The slope for negative inputs.
    /// * `sub` - The amount subtracted from every output.
    pub fn general_relu(leak: f32, sub: f32) -> Self {
        Self::Relu(Relu::new(leak, sub))
    }

    pub fn f(&self, x: f32) -> f32 {
        match self {
            Self::Sigmoid(a) => a.f(x),
            Self::Relu(a) => a.f(x),
        }
    }

    pub fn df(&self, x: f32) -> f32 {
        match self {
            Self::Sigmoid(a) => a.df(x),
            Self::Relu(a) => a.df(x),
        }
    }
}
