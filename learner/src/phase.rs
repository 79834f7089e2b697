use log::{debug, warn};

use crate::{
    hook::Hook,
    signal::{Flow, Phase},
};

/// Something able to run the callbacks of a hook.
pub trait Phased {
    fn callback(&mut self, hook: Hook) -> Flow;
}

/// Runs `body` wrapped in the lifecycle of `phase`.
///
/// Dispatches `before_<phase>`, runs `body`, then dispatches `after_<phase>`. The
/// cancellation of `phase` raised anywhere in there is swallowed, while any other
/// interruption keeps going up. Whatever happens, `cleanup_<phase>` is dispatched last.
///
/// # Returns
/// The outcome of the phase, or the outcome of the cleanup if that one failed.
pub fn with_cbs<L, F>(learn: &mut L, phase: Phase, body: F) -> Flow
where
    L: Phased + ?Sized,
    F: FnOnce(&mut L) -> Flow,
{
    let outcome = match run(learn, phase, body) {
        Err(signal) if signal.cancels(phase) => {
            debug!("{phase} cancelled");
            Ok(())
        }
        outcome => outcome,
    };

    match learn.callback(phase.cleanup()) {
        Ok(()) => outcome,
        Err(cleanup) => {
            if let Err(replaced) = outcome {
                warn!("cleanup of {phase} failed, dropping the previous outcome: {replaced}");
            }

            Err(cleanup)
        }
    }
}

fn run<L, F>(learn: &mut L, phase: Phase, body: F) -> Flow
where
    L: Phased + ?Sized,
    F: FnOnce(&mut L) -> Flow,
{
    learn.callback(phase.before())?;
    body(learn)?;
    learn.callback(phase.after())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::LearnerErr, signal::Interrupt};

    /// Records hooks and fails on the ones it is told to.
    #[derive(Default)]
    struct Recorder {
        seen: Vec<Hook>,
        fail_on: Option<(Hook, fn() -> Interrupt)>,
    }

    impl Recorder {
        fn failing(hook: Hook, signal: fn() -> Interrupt) -> Self {
            Self {
                seen: Vec::new(),
                fail_on: Some((hook, signal)),
            }
        }
    }

    impl Phased for Recorder {
        fn callback(&mut self, hook: Hook) -> Flow {
            self.seen.push(hook);
            match self.fail_on {
                Some((h, signal)) if h == hook => Err(signal()),
                _ => Ok(()),
            }
        }
    }

    #[test]
    fn runs_before_body_after_cleanup() {
        let mut rec = Recorder::default();
        let flow = with_cbs(&mut rec, Phase::Epoch, |r| r.callback(Hook::Predict));

        assert!(flow.is_ok());
        assert_eq!(
            rec.seen,
            [Hook::BeforeEpoch, Hook::Predict, Hook::AfterEpoch, Hook::CleanupEpoch]
        );
    }

    #[test]
    fn own_cancel_is_swallowed_and_after_skipped() {
        let mut rec = Recorder::default();
        let flow = with_cbs(&mut rec, Phase::Batch, |_| Err(Interrupt::CancelBatch));

        assert!(flow.is_ok());
        assert_eq!(rec.seen, [Hook::BeforeBatch, Hook::CleanupBatch]);
    }

    #[test]
    fn foreign_cancel_widens() {
        let mut rec = Recorder::default();
        let flow = with_cbs(&mut rec, Phase::Batch, |_| Err(Interrupt::CancelFit));

        assert!(matches!(flow, Err(Interrupt::CancelFit)));
        assert_eq!(rec.seen, [Hook::BeforeBatch, Hook::CleanupBatch]);
    }

    #[test]
    fn cancel_from_before_skips_body() {
        let mut rec = Recorder::failing(Hook::BeforeFit, || Interrupt::CancelFit);
        let mut ran = false;
        let flow = with_cbs(&mut rec, Phase::Fit, |_| {
            ran = true;
            Ok(())
        });

        assert!(flow.is_ok());
        assert!(!ran);
        assert_eq!(rec.seen, [Hook::BeforeFit, Hook::CleanupFit]);
    }

    #[test]
    fn failing_cleanup_replaces_outcome() {
        let mut rec = Recorder::failing(Hook::CleanupEpoch, || {
            LearnerErr::Custom("cleanup".into()).into()
        });
        let flow = with_cbs(&mut rec, Phase::Epoch, |_| Err(Interrupt::CancelFit));

        assert!(matches!(
            flow,
            Err(Interrupt::Failed(LearnerErr::Custom(msg))) if msg == "cleanup"
        ));
    }
}
