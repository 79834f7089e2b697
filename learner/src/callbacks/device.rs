use log::debug;
use machine_learning::arch::Sequential;
use serde::{Deserialize, Serialize};

use crate::{
    callback::Callback,
    components::{BatchOf, Components},
    data::Batch,
    error::Result,
    hook::{Hook, HookSet},
    learner::State,
    signal::Flow,
};

/// Where models and batches live.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Device {
    #[default]
    Cpu,
}

/// Something that can be moved to a `Device`.
pub trait ToDevice {
    fn to_device(&mut self, device: Device) -> Result<()>;
}

impl ToDevice for Sequential {
    fn to_device(&mut self, device: Device) -> Result<()> {
        match device {
            Device::Cpu => Ok(()),
        }
    }
}

impl ToDevice for Batch {
    fn to_device(&mut self, device: Device) -> Result<()> {
        match device {
            Device::Cpu => Ok(()),
        }
    }
}

/// Moves the model to its device when the fit starts, and each batch before it's used.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeviceCB {
    device: Device,
}

impl DeviceCB {
    pub fn new(device: Device) -> Self {
        Self { device }
    }
}

impl<T> Callback<T> for DeviceCB
where
    T: Components,
    T::Model: ToDevice,
    BatchOf<T>: ToDevice,
{
    fn hooks(&self) -> HookSet {
        HookSet::of(&[Hook::BeforeFit, Hook::BeforeBatch])
    }

    fn before_fit(&mut self, learn: &mut State<T>) -> Flow {
        debug!("moving model to {:?}", self.device);
        learn.model.to_device(self.device)?;
        Ok(())
    }

    fn before_batch(&mut self, learn: &mut State<T>) -> Flow {
        learn.batch_mut()?.to_device(self.device)?;
        Ok(())
    }
}
