use crate::{
    components::Components,
    hook::{Hook, HookSet},
    learner::State,
    signal::Flow,
};

/// Something that takes part in a fit by handling some of its hooks.
///
/// Implementors declare the hooks they handle through `hooks` and override the matching
/// methods, the rest of them being no-ops. A handler can end the current batch, epoch or fit
/// by returning the corresponding cancellation, or fail the whole fit with an error.
///
/// # Ordering
/// Handlers of the same hook run in ascending `order`, ties resolved by registration order.
/// A hook listed in `exclusive` runs *only* this callback's handler, every other one being
/// skipped.
pub trait Callback<T: Components> {
    fn name(&self) -> &str {
        let full = std::any::type_name::<Self>();
        let path = full.split('<').next().unwrap_or(full);
        path.rsplit("::").next().unwrap_or(path)
    }

    fn order(&self) -> i32 {
        0
    }

    /// The hooks this callback handles.
    fn hooks(&self) -> HookSet;

    /// The hooks this callback wants to handle alone.
    fn exclusive(&self) -> HookSet {
        HookSet::EMPTY
    }

    fn before_fit(&mut self, _learn: &mut State<T>) -> Flow {
        Ok(())
    }

    fn after_fit(&mut self, _learn: &mut State<T>) -> Flow {
        Ok(())
    }

    fn cleanup_fit(&mut self, _learn: &mut State<T>) -> Flow {
        Ok(())
    }

    fn before_epoch(&mut self, _learn: &mut State<T>) -> Flow {
        Ok(())
    }

    fn after_epoch(&mut self, _learn: &mut State<T>) -> Flow {
        Ok(())
    }

    fn cleanup_epoch(&mut self, _learn: &mut State<T>) -> Flow {
        Ok(())
    }

    fn before_batch(&mut self, _learn: &mut State<T>) -> Flow {
        Ok(())
    }

    fn after_batch(&mut self, _learn: &mut State<T>) -> Flow {
        Ok(())
    }

    fn cleanup_batch(&mut self, _learn: &mut State<T>) -> Flow {
        Ok(())
    }

    fn after_predict(&mut self, _learn: &mut State<T>) -> Flow {
        Ok(())
    }

    fn after_loss(&mut self, _learn: &mut State<T>) -> Flow {
        Ok(())
    }

    fn after_backward(&mut self, _learn: &mut State<T>) -> Flow {
        Ok(())
    }

    fn after_step(&mut self, _learn: &mut State<T>) -> Flow {
        Ok(())
    }

    fn predict(&mut self, _learn: &mut State<T>) -> Flow {
        Ok(())
    }

    fn get_loss(&mut self, _learn: &mut State<T>) -> Flow {
        Ok(())
    }

    fn backward(&mut self, _learn: &mut State<T>) -> Flow {
        Ok(())
    }

    fn step(&mut self, _learn: &mut State<T>) -> Flow {
        Ok(())
    }

    fn zero_grad(&mut self, _learn: &mut State<T>) -> Flow {
        Ok(())
    }

    /// Runs the handler of `hook`.
    fn call(&mut self, hook: Hook, learn: &mut State<T>) -> Flow {
        match hook {
            Hook::BeforeFit => self.before_fit(learn),
            Hook::AfterFit => self.after_fit(learn),
            Hook::CleanupFit => self.cleanup_fit(learn),
            Hook::BeforeEpoch => self.before_epoch(learn),
            Hook::AfterEpoch => self.after_epoch(learn),
            Hook::CleanupEpoch => self.cleanup_epoch(learn),
            Hook::BeforeBatch => self.before_batch(learn),
            Hook::AfterBatch => self.after_batch(learn),
            Hook::CleanupBatch => self.cleanup_batch(learn),
            Hook::AfterPredict => self.after_predict(learn),
            Hook::AfterLoss => self.after_loss(learn),
            Hook::AfterBackward => self.after_backward(learn),
            Hook::AfterStep => self.after_step(learn),
            Hook::Predict => self.predict(learn),
            Hook::GetLoss => self.get_loss(learn),
            Hook::Backward => self.backward(learn),
            Hook::Step => self.step(learn),
            Hook::ZeroGrad => self.zero_grad(learn),
        }
    }
}

/// An order that runs right after every callback of `orders`.
pub fn after(orders: &[i32]) -> i32 {
    orders.iter().max().map_or(0, |o| o + 1)
}

/// An order that runs right before every callback of `orders`.
pub fn before(orders: &[i32]) -> i32 {
    orders.iter().min().map_or(0, |o| o - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_orders() {
        assert_eq!(after(&[0, 3, 1]), 4);
        assert_eq!(before(&[0, 3, -1]), -2);
        assert_eq!(after(&[]), 0);
    }
}
