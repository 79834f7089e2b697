use std::{
    collections::HashMap,
    fmt::{self, Display},
    sync::Arc,
};

use log::debug;
use machine_learning::Dataset;
use ndarray::Array2;
use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};
use serde::{Deserialize, Serialize};

use crate::{
    components::DataSource,
    error::{LearnerErr, Result},
};

/// The splits a learner trains and validates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Split {
    Train,
    Test,
}

impl Split {
    pub fn name(&self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Test => "test",
        }
    }
}

impl Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A batch of samples, one per row.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub x: Array2<f32>,
    pub y: Array2<f32>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.x.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One pass over a dataset, in batches.
#[derive(Debug, Clone)]
pub struct DataLoader {
    dataset: Arc<Dataset>,
    order: Arc<[usize]>,
    batch_size: usize,
    pos: usize,
}

impl DataLoader {
    /// The amount of batches left in this pass.
    pub fn remaining(&self) -> usize {
        (self.order.len() - self.pos).div_ceil(self.batch_size)
    }
}

impl Iterator for DataLoader {
    type Item = Result<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.order.len() {
            return None;
        }

        let end = (self.pos + self.batch_size).min(self.order.len());
        let indices = &self.order[self.pos..end];
        self.pos = end;

        let batch = self
            .dataset
            .select(indices)
            .map(|(x, y)| Batch { x, y })
            .map_err(LearnerErr::from);

        Some(batch)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.remaining();
        (n, Some(n))
    }
}

/// The train and test datasets of a fit, handed out in batches.
///
/// The sample order of each split is computed once and cached until `invalidate` is called.
/// With a shuffle seed the training split is the exception: every loader over it walks a
/// fresh permutation, so each epoch sees its own order.
pub struct DataLoaders {
    splits: HashMap<Split, Arc<Dataset>>,
    batch_size: usize,
    rng: Option<StdRng>,
    cache: HashMap<Split, Arc<[usize]>>,
}

impl DataLoaders {
    /// Creates a new `DataLoaders`.
    ///
    /// # Arguments
    /// * `train` - The training split.
    /// * `test` - The validation split.
    /// * `batch_size` - The maximum amount of samples per batch.
    ///
    /// # Errors
    /// `LearnerErr::Config` if `batch_size` is zero.
    pub fn new(train: Dataset, test: Dataset, batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(LearnerErr::Config("the batch size must be positive".into()));
        }

        let splits = HashMap::from([
            (Split::Train, Arc::new(train)),
            (Split::Test, Arc::new(test)),
        ]);

        Ok(Self {
            splits,
            batch_size,
            rng: None,
            cache: HashMap::new(),
        })
    }

    /// Shuffles the training split with a generator seeded by `seed`.
    pub fn shuffled(mut self, seed: u64) -> Self {
        self.rng = Some(StdRng::seed_from_u64(seed));
        self.cache.remove(&Split::Train);
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn dataset(&self, split: Split) -> Result<&Dataset> {
        self.splits
            .get(&split)
            .map(Arc::as_ref)
            .ok_or(LearnerErr::MissingState(split.name()))
    }

    /// Forgets the cached sample orders, the next loaders recompute them.
    pub fn invalidate(&mut self) {
        self.cache.clear();
    }

    /// Returns the first batch of `split` without touching the cache.
    pub fn peek(&self, split: Split) -> Result<Batch> {
        let dataset = self.dataset(split)?;
        let (x, y) = dataset.rows(0, self.batch_size)?;

        Ok(Batch {
            x: x.to_owned(),
            y: y.to_owned(),
        })
    }

    fn order(&mut self, split: Split) -> Result<Arc<[usize]>> {
        let len = self.dataset(split)?.len();

        if let (Split::Train, Some(rng)) = (split, self.rng.as_mut()) {
            let mut order: Vec<_> = (0..len).collect();
            order.shuffle(rng);
            return Ok(order.into());
        }

        if let Some(order) = self.cache.get(&split) {
            return Ok(order.clone());
        }

        let order: Vec<_> = (0..len).collect();
        debug!(split = split.name(), samples = len; "caching sample order");
        let order: Arc<[usize]> = order.into();
        self.cache.insert(split, order.clone());
        Ok(order)
    }
}

impl DataSource for DataLoaders {
    type Batch = Batch;
    type Loader = DataLoader;

    fn loader(&mut self, split: Split) -> Result<Self::Loader> {
        let order = self.order(split)?;
        let dataset = self
            .splits
            .get(&split)
            .cloned()
            .ok_or(LearnerErr::MissingState(split.name()))?;

        Ok(DataLoader {
            dataset,
            order,
            batch_size: self.batch_size,
            pos: 0,
        })
    }

    fn batch_len(batch: &Self::Batch) -> usize {
        batch.len()
    }
}
