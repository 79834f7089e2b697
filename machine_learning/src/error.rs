use std::{
    error::Error,
    fmt::{self, Display},
};

use ndarray::ShapeError;

/// The result type used in the entire machine learning module.
pub type Result<T> = std::result::Result<T, MlErr>;

/// The machine learning module's error type.
#[derive(Debug)]
pub enum MlErr {
    SizeMismatch {
        what: &'static str,
        got: usize,
        expected: usize,
    },
    Shape(ShapeError),
    MissingForward {
        layer: usize,
    },
    EmptyModel,
    EmptyDataset,
    OutOfRange {
        index: usize,
        len: usize,
    },
    InvalidDistribution(String),
}

impl Display for MlErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MlErr::SizeMismatch {
                what,
                got,
                expected,
            } => write!(
                f,
                "There's a size mismatch in {what}, got {got} and expected {expected}"
            ),
            MlErr::Shape(e) => write!(f, "Failed to view the data with the requested shape: {e}"),
            MlErr::MissingForward { layer } => write!(
                f,
                "Tried to run a backward pass through layer {layer} without a recorded forward pass"
            ),
            MlErr::EmptyModel => write!(f, "The model has no layers"),
            MlErr::EmptyDataset => write!(f, "The dataset has no samples"),
            MlErr::OutOfRange { index, len } => {
                write!(f, "Sample {index} is out of range for a dataset of {len}")
            }
            MlErr::InvalidDistribution(detail) => {
                write!(f, "Invalid parameter distribution: {detail}")
            }
        }
    }
}

impl Error for MlErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            MlErr::Shape(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ShapeError> for MlErr {
    fn from(value: ShapeError) -> Self {
        Self::Shape(value)
    }
}
