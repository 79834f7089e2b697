pub mod activations;
pub mod layers;
pub mod loss;
mod sequential;

pub use sequential::Sequential;
