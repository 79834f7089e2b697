pub mod callback;
pub mod callbacks;
pub mod components;
pub mod config;
pub mod data;
pub mod dispatch;
pub mod error;
pub mod hook;
pub mod learner;
pub mod phase;
pub mod signal;
pub mod train;

pub use callback::Callback;
pub use components::{Components, DataSource, Model, Optimizer};
pub use config::{LearnerBuilder, RunConfig};
pub use data::{Batch, DataLoader, DataLoaders, Split};
pub use dispatch::{CallbackId, CallbackSet};
pub use error::{LearnerErr, Result};
pub use hook::{Hook, HookSet, Op};
pub use learner::{FitOptions, Learner, LrFindOptions, Specialization, State};
pub use signal::{Flow, Interrupt, Phase};
pub use train::{MlStack, TrainCB, TrainLearner, TrainSteps};
