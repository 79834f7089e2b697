mod dense;
mod layer;

pub use dense::{Cache, Dense};
pub use layer::Layer;
