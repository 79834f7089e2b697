use std::{
    error::Error,
    fmt::{self, Display},
};

use machine_learning::MlErr;

use crate::{error::LearnerErr, hook::Hook};

/// The three nested phases of a fit, outermost first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Fit,
    Epoch,
    Batch,
}

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Phase::Fit => "fit",
            Phase::Epoch => "epoch",
            Phase::Batch => "batch",
        }
    }

    pub fn before(&self) -> Hook {
        match self {
            Phase::Fit => Hook::BeforeFit,
            Phase::Epoch => Hook::BeforeEpoch,
            Phase::Batch => Hook::BeforeBatch,
        }
    }

    pub fn after(&self) -> Hook {
        match self {
            Phase::Fit => Hook::AfterFit,
            Phase::Epoch => Hook::AfterEpoch,
            Phase::Batch => Hook::AfterBatch,
        }
    }

    pub fn cleanup(&self) -> Hook {
        match self {
            Phase::Fit => Hook::CleanupFit,
            Phase::Epoch => Hook::CleanupEpoch,
            Phase::Batch => Hook::CleanupBatch,
        }
    }
}

impl Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Anything that stops the normal flow of a fit: either a request to cancel one of the
/// phases or a failure.
///
/// A cancellation is only caught by the wrapper of the phase it names; everything else
/// keeps widening outwards through `?`.
#[derive(Debug)]
pub enum Interrupt {
    CancelBatch,
    CancelEpoch,
    CancelFit,
    Failed(LearnerErr),
}

impl Interrupt {
    /// Returns the cancellation signal owned by `phase`.
    pub fn cancel(phase: Phase) -> Self {
        match phase {
            Phase::Fit => Self::CancelFit,
            Phase::Epoch => Self::CancelEpoch,
            Phase::Batch => Self::CancelBatch,
        }
    }

    /// The phase this signal cancels, `None` for failures.
    pub fn phase(&self) -> Option<Phase> {
        match self {
            Self::CancelBatch => Some(Phase::Batch),
            Self::CancelEpoch => Some(Phase::Epoch),
            Self::CancelFit => Some(Phase::Fit),
            Self::Failed(_) => None,
        }
    }

    /// Whether the wrapper of `phase` swallows this signal.
    pub fn cancels(&self, phase: Phase) -> bool {
        self.phase() == Some(phase)
    }

    /// Turns whatever escaped a fit into an error.
    pub fn into_err(self) -> LearnerErr {
        match self {
            Self::CancelBatch => LearnerErr::UncaughtSignal(Phase::Batch),
            Self::CancelEpoch => LearnerErr::UncaughtSignal(Phase::Epoch),
            Self::CancelFit => LearnerErr::UncaughtSignal(Phase::Fit),
            Self::Failed(e) => e,
        }
    }
}

impl Display for Interrupt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CancelBatch => write!(f, "cancel batch"),
            Self::CancelEpoch => write!(f, "cancel epoch"),
            Self::CancelFit => write!(f, "cancel fit"),
            Self::Failed(e) => write!(f, "{e}"),
        }
    }
}

impl Error for Interrupt {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Failed(e) => Some(e),
            _ => None,
        }
    }
}

impl From<LearnerErr> for Interrupt {
    fn from(value: LearnerErr) -> Self {
        Self::Failed(value)
    }
}

impl From<MlErr> for Interrupt {
    fn from(value: MlErr) -> Self {
        Self::Failed(value.into())
    }
}

/// The outcome of running a hook or a phase; `Ok(())` lets the fit continue.
pub type Flow = std::result::Result<(), Interrupt>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_cancel_belongs_to_one_phase() {
        for phase in [Phase::Fit, Phase::Epoch, Phase::Batch] {
            let signal = Interrupt::cancel(phase);
            assert!(signal.cancels(phase));
            assert_eq!(signal.phase(), Some(phase));
        }

        assert!(!Interrupt::CancelEpoch.cancels(Phase::Batch));
        assert!(!Interrupt::from(LearnerErr::MissingState("loss")).cancels(Phase::Fit));
    }

    #[test]
    fn leaked_signals_become_errors() {
        assert!(matches!(
            Interrupt::CancelEpoch.into_err(),
            LearnerErr::UncaughtSignal(Phase::Epoch)
        ));
        assert!(matches!(
            Interrupt::from(LearnerErr::MissingState("batch")).into_err(),
            LearnerErr::MissingState("batch")
        ));
    }
}
