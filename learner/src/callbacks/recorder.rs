use std::{cell::RefCell, collections::BTreeMap, rc::Rc};

use crate::{
    callback::Callback,
    components::{Components, Optimizer},
    error::Result,
    hook::{Hook, HookSet},
    learner::State,
    signal::Flow,
};

type Probe<T> = Box<dyn Fn(&State<T>) -> Result<f32>>;

/// Records named values after every training batch.
pub struct RecorderCB<T: Components> {
    probes: Vec<(String, Probe<T>)>,
    records: Rc<RefCell<BTreeMap<String, Vec<f32>>>>,
}

impl<T: Components> Default for RecorderCB<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Components> RecorderCB<T> {
    pub fn new() -> Self {
        Self {
            probes: Vec::new(),
            records: Rc::default(),
        }
    }

    /// Records the learning rate and the loss.
    pub fn lr_and_loss() -> Self {
        Self::new()
            .with("lr", |learn| learn.opt().map(|opt| opt.lr()))
            .with("loss", |learn| learn.loss())
    }

    /// Adds a value named `name`, computed by `probe`.
    pub fn with<F>(mut self, name: &str, probe: F) -> Self
    where
        F: Fn(&State<T>) -> Result<f32> + 'static,
    {
        self.probes.push((name.to_string(), Box::new(probe)));
        self
    }

    pub fn records(&self) -> Rc<RefCell<BTreeMap<String, Vec<f32>>>> {
        self.records.clone()
    }
}

impl<T: Components> Callback<T> for RecorderCB<T> {
    fn hooks(&self) -> HookSet {
        HookSet::of(&[Hook::BeforeFit, Hook::AfterBatch])
    }

    fn before_fit(&mut self, _learn: &mut State<T>) -> Flow {
        let mut records = self.records.borrow_mut();
        records.clear();

        for (name, _) in &self.probes {
            records.insert(name.clone(), Vec::new());
        }

        Ok(())
    }

    fn after_batch(&mut self, learn: &mut State<T>) -> Flow {
        if !learn.training() {
            return Ok(());
        }

        let mut records = self.records.borrow_mut();
        for (name, probe) in &self.probes {
            let value = probe(learn)?;
            records.entry(name.clone()).or_default().push(value);
        }

        Ok(())
    }
}
