use std::{fs, path::Path};

use log::info;
use machine_learning::{
    Dataset,
    arch::{
        Sequential,
        activations::ActFn,
        layers::Layer,
        loss::{CrossEntropy, LossFn, Mse},
    },
    init::Init,
    optimization::{
        Adam, GradientDescent, GradientDescentWithMomentum, Optimizer as MlOptimizer,
    },
};
use rand::{SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};

use crate::{
    callbacks::{
        Accuracy, ActivationStatsCB, BatchSchedulerCB, Device, DeviceCB, MetricsCB, OneCycleLr,
        ProgressCB, RecorderCB,
    },
    data::DataLoaders,
    error::{LearnerErr, Result},
    learner::LrFindOptions,
    train::{MomentumCB, TrainLearner},
};

/// The specification for the `ActFn` enum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActFnSpec {
    Sigmoid { amp: f32 },
    Relu,
    GeneralRelu { leak: f32, sub: f32 },
}

/// The specification for the `Layer` enum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerSpec {
    Dense {
        dim: (usize, usize),
        act_fn: Option<ActFnSpec>,
    },
}

/// The specification for the model's weight initialization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitSpec {
    Const { value: f32 },
    Uniform { low: f32, high: f32 },
    Normal { mean: f32, std_dev: f32 },
    #[default]
    KaimingNormal,
    XavierUniform,
}

/// The specification for the `Sequential` model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelSpec {
    Sequential {
        layers: Vec<LayerSpec>,
        #[serde(default)]
        init: InitSpec,
    },
}

/// The specification for the optimizer built on every fit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizerSpec {
    Adam {
        beta1: f32,
        beta2: f32,
        epsilon: f32,
        #[serde(default)]
        weight_decay: f32,
    },
    GradientDescent,
    GradientDescentWithMomentum { momentum: f32 },
}

/// The specification for the `LossFn` trait.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossFnSpec {
    Mse,
    CrossEntropy,
}

/// The specification for a `Dataset`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSpec {
    pub data: Vec<f32>,
    pub x_size: usize,
    pub y_size: usize,
}

/// The specification for the `DataLoaders`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSpec {
    pub train: DatasetSpec,
    pub test: DatasetSpec,
    pub batch_size: usize,
    /// Reshuffle the training split on every epoch.
    #[serde(default)]
    pub shuffle: bool,
}

/// The specification for the stock callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallbackSpec {
    Metrics {
        #[serde(default)]
        accuracy: bool,
    },
    Device {
        #[serde(default)]
        device: Device,
    },
    Progress {
        periodicity: usize,
    },
    Momentum {
        momentum: f32,
    },
    OneCycle {
        max_lr: f32,
    },
    Recorder,
    ActivationStats,
}

/// The specification for a learning rate search.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LrFindSpec {
    pub gamma: f32,
    pub max_mult: f32,
    pub start_lr: f32,
    pub max_epochs: usize,
}

impl From<LrFindSpec> for LrFindOptions {
    fn from(spec: LrFindSpec) -> Self {
        Self {
            gamma: spec.gamma,
            max_mult: spec.max_mult,
            start_lr: spec.start_lr,
            max_epochs: spec.max_epochs,
        }
    }
}

/// Everything needed to run a fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub model: ModelSpec,
    pub optimizer: OptimizerSpec,
    pub loss: LossFnSpec,
    pub dataset: DataSpec,
    pub epochs: usize,
    pub lr: f32,
    pub seed: Option<u64>,
    #[serde(default)]
    pub callbacks: Vec<CallbackSpec>,
    pub lr_find: Option<LrFindSpec>,
}

impl RunConfig {
    /// Reads and validates a config from a JSON file.
    ///
    /// # Errors
    /// If the file can't be read, isn't valid JSON for a `RunConfig` or fails validation.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the config makes sense as a whole.
    ///
    /// # Errors
    /// `LearnerErr::Config` describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        let invalid = |detail: String| Err(LearnerErr::Config(detail));

        if !(self.lr.is_finite() && self.lr > 0.) {
            return invalid(format!("the learning rate must be positive, got {}", self.lr));
        }

        if self.dataset.batch_size == 0 {
            return invalid("the batch size must be positive".into());
        }

        let ModelSpec::Sequential { layers, .. } = &self.model;
        let (Some(first), Some(last)) = (layers.first(), layers.last()) else {
            return invalid("the model needs at least one layer".into());
        };

        for pair in layers.windows(2) {
            let (LayerSpec::Dense { dim: a, .. }, LayerSpec::Dense { dim: b, .. }) =
                (pair[0], pair[1]);

            if a.1 != b.0 {
                return invalid(format!("layer output {} doesn't feed input {}", a.1, b.0));
            }
        }

        let LayerSpec::Dense { dim: (x_size, _), .. } = *first;
        let LayerSpec::Dense { dim: (_, y_size), .. } = *last;

        for (name, split) in [("train", &self.dataset.train), ("test", &self.dataset.test)] {
            if (split.x_size, split.y_size) != (x_size, y_size) {
                return invalid(format!(
                    "the {name} split has {}x{} samples but the model maps {x_size} to {y_size}",
                    split.x_size, split.y_size
                ));
            }
        }

        Ok(())
    }
}

/// Builds `TrainLearner`s given a `RunConfig`.
#[derive(Debug, Default)]
pub struct LearnerBuilder;

impl LearnerBuilder {
    /// Creates a new `LearnerBuilder`.
    pub fn new() -> Self {
        Self
    }

    /// Builds a new `TrainLearner` following a config.
    ///
    /// # Arguments
    /// * `config` - The validated config of the run.
    ///
    /// # Errors
    /// If the datasets or the initialization described by `config` are invalid.
    pub fn build(&self, config: &RunConfig) -> Result<TrainLearner> {
        let mut rng = self.generate_rng(config.seed);
        let model = self.resolve_model(&config.model, &mut rng)?;
        let data = self.resolve_data(&config.dataset, config.seed)?;
        let loss = self.resolve_loss(config.loss);
        let optimizer = config.optimizer;

        let mut learn = TrainLearner::train(model, data, loss, config.lr)
            .with_opt_func(move |model, lr| Ok(Self::resolve_optimizer(optimizer, model, lr)));

        self.resolve_callbacks(config, &mut learn);
        info!("built learner with {} callbacks", learn.callbacks().len());
        Ok(learn)
    }

    fn resolve_model(&self, spec: &ModelSpec, rng: &mut StdRng) -> Result<Sequential> {
        match spec {
            ModelSpec::Sequential { layers, init } => {
                let layers = layers.iter().map(|ls| self.resolve_layer(*ls));
                let mut model = Sequential::new(layers);
                model.init(&self.resolve_init(*init), rng)?;
                Ok(model)
            }
        }
    }

    fn resolve_layer(&self, spec: LayerSpec) -> Layer {
        match spec {
            LayerSpec::Dense { dim, act_fn } => {
                Layer::dense(dim, act_fn.map(Self::resolve_act_fn))
            }
        }
    }

    fn resolve_act_fn(spec: ActFnSpec) -> ActFn {
        match spec {
            ActFnSpec::Sigmoid { amp } => ActFn::sigmoid(amp),
            ActFnSpec::Relu => ActFn::relu(),
            ActFnSpec::GeneralRelu { leak, sub } => ActFn::general_relu(leak, sub),
        }
    }

    fn resolve_init(&self, spec: InitSpec) -> Init {
        match spec {
            InitSpec::Const { value } => Init::Const(value),
            InitSpec::Uniform { low, high } => Init::Uniform { low, high },
            InitSpec::Normal { mean, std_dev } => Init::Normal { mean, std_dev },
            InitSpec::KaimingNormal => Init::KaimingNormal,
            InitSpec::XavierUniform => Init::XavierUniform,
        }
    }

    fn resolve_data(&self, spec: &DataSpec, seed: Option<u64>) -> Result<DataLoaders> {
        let train = self.resolve_dataset(&spec.train)?;
        let test = self.resolve_dataset(&spec.test)?;
        let dls = DataLoaders::new(train, test, spec.batch_size)?;

        Ok(match (spec.shuffle, seed) {
            (true, Some(seed)) => dls.shuffled(seed),
            (true, None) => dls.shuffled(rand::random()),
            (false, _) => dls,
        })
    }

    fn resolve_dataset(&self, spec: &DatasetSpec) -> Result<Dataset> {
        Ok(Dataset::new(spec.data.clone(), spec.x_size, spec.y_size)?)
    }

    fn resolve_loss(&self, spec: LossFnSpec) -> Box<dyn LossFn> {
        match spec {
            LossFnSpec::Mse => Box::new(Mse::new()),
            LossFnSpec::CrossEntropy => Box::new(CrossEntropy::new()),
        }
    }

    fn resolve_optimizer(
        spec: OptimizerSpec,
        model: &Sequential,
        lr: f32,
    ) -> Box<dyn MlOptimizer> {
        match spec {
            OptimizerSpec::GradientDescent => Box::new(GradientDescent::new(lr)),
            OptimizerSpec::GradientDescentWithMomentum { momentum } => {
                Box::new(GradientDescentWithMomentum::new(model.size(), lr, momentum))
            }
            OptimizerSpec::Adam {
                beta1,
                beta2,
                epsilon,
                weight_decay,
            } => Box::new(
                Adam::new(model.size(), lr, beta1, beta2, epsilon).weight_decay(weight_decay),
            ),
        }
    }

    fn resolve_callbacks(&self, config: &RunConfig, learn: &mut TrainLearner) {
        let batches_per_epoch = config
            .dataset
            .train
            .data
            .len()
            .checked_div(config.dataset.train.x_size + config.dataset.train.y_size)
            .unwrap_or_default()
            .div_ceil(config.dataset.batch_size);

        for spec in &config.callbacks {
            match *spec {
                CallbackSpec::Metrics { accuracy } => {
                    let metrics = MetricsCB::new();
                    if accuracy {
                        learn.add_cb(metrics.with(Accuracy::new()));
                    } else {
                        learn.add_cb(metrics);
                    }
                }
                CallbackSpec::Device { device } => {
                    learn.add_cb(DeviceCB::new(device));
                }
                CallbackSpec::Progress { periodicity } => {
                    learn.add_cb(ProgressCB::new(periodicity));
                }
                CallbackSpec::Momentum { momentum } => {
                    learn.add_cb(MomentumCB::new(momentum));
                }
                CallbackSpec::OneCycle { .. } if config.lr_find.is_some() => {
                    info!("skipping the one cycle schedule during a learning rate search");
                }
                CallbackSpec::OneCycle { max_lr } => {
                    let total_steps = batches_per_epoch * config.epochs;
                    learn.add_cb(BatchSchedulerCB::new(OneCycleLr::new(max_lr, total_steps)));
                }
                CallbackSpec::Recorder => {
                    learn.add_cb(RecorderCB::lr_and_loss());
                }
                CallbackSpec::ActivationStats => {
                    learn.add_cb(ActivationStatsCB::new());
                }
            }
        }
    }

    fn generate_rng(&self, seed: Option<u64>) -> StdRng {
        match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        }
    }
}
