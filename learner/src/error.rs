use std::{
    error::Error,
    fmt::{self, Display},
    io,
};

use machine_learning::MlErr;

use crate::{hook::Op, signal::Phase};

/// The result type used in the entire learner crate.
pub type Result<T> = std::result::Result<T, LearnerErr>;

/// The learner's error type.
#[derive(Debug)]
pub enum LearnerErr {
    /// Neither a callback nor the learner's specialization provides the operation.
    Unsupported(Op),
    /// A piece of state was read outside of the phase that sets it.
    MissingState(&'static str),
    /// A cancellation signal escaped every phase that could have caught it.
    UncaughtSignal(Phase),
    Ml(MlErr),
    Io(io::Error),
    Json(serde_json::Error),
    Config(String),
    /// A failure raised by user code, usually a callback.
    Custom(String),
}

impl Display for LearnerErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LearnerErr::Unsupported(op) => write!(
                f,
                "No callback nor the learner itself provides the `{}` operation",
                op.name()
            ),
            LearnerErr::MissingState(what) => {
                write!(f, "The learner has no `{what}` at this point of the fit")
            }
            LearnerErr::UncaughtSignal(phase) => {
                write!(f, "A cancel {phase} signal was raised outside of its phase")
            }
            LearnerErr::Ml(e) => write!(f, "Machine learning error: {e}"),
            LearnerErr::Io(e) => write!(f, "IO error: {e}"),
            LearnerErr::Json(e) => write!(f, "Invalid JSON: {e}"),
            LearnerErr::Config(detail) => write!(f, "Invalid configuration: {detail}"),
            LearnerErr::Custom(detail) => write!(f, "{detail}"),
        }
    }
}

impl Error for LearnerErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            LearnerErr::Ml(e) => Some(e),
            LearnerErr::Io(e) => Some(e),
            LearnerErr::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<MlErr> for LearnerErr {
    fn from(value: MlErr) -> Self {
        Self::Ml(value)
    }
}

impl From<io::Error> for LearnerErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for LearnerErr {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}
