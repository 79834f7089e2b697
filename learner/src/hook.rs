use std::{
    fmt::{self, Display},
    ops::BitOr,
};

/// Every point of a fit at which callbacks can act.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hook {
    BeforeFit,
    AfterFit,
    CleanupFit,
    BeforeEpoch,
    AfterEpoch,
    CleanupEpoch,
    BeforeBatch,
    AfterBatch,
    CleanupBatch,
    AfterPredict,
    AfterLoss,
    AfterBackward,
    AfterStep,
    Predict,
    GetLoss,
    Backward,
    Step,
    ZeroGrad,
}

impl Hook {
    pub const ALL: [Hook; 18] = [
        Hook::BeforeFit,
        Hook::AfterFit,
        Hook::CleanupFit,
        Hook::BeforeEpoch,
        Hook::AfterEpoch,
        Hook::CleanupEpoch,
        Hook::BeforeBatch,
        Hook::AfterBatch,
        Hook::CleanupBatch,
        Hook::AfterPredict,
        Hook::AfterLoss,
        Hook::AfterBackward,
        Hook::AfterStep,
        Hook::Predict,
        Hook::GetLoss,
        Hook::Backward,
        Hook::Step,
        Hook::ZeroGrad,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Hook::BeforeFit => "before_fit",
            Hook::AfterFit => "after_fit",
            Hook::CleanupFit => "cleanup_fit",
            Hook::BeforeEpoch => "before_epoch",
            Hook::AfterEpoch => "after_epoch",
            Hook::CleanupEpoch => "cleanup_epoch",
            Hook::BeforeBatch => "before_batch",
            Hook::AfterBatch => "after_batch",
            Hook::CleanupBatch => "cleanup_batch",
            Hook::AfterPredict => "after_predict",
            Hook::AfterLoss => "after_loss",
            Hook::AfterBackward => "after_backward",
            Hook::AfterStep => "after_step",
            Hook::Predict => "predict",
            Hook::GetLoss => "get_loss",
            Hook::Backward => "backward",
            Hook::Step => "step",
            Hook::ZeroGrad => "zero_grad",
        }
    }

    /// The position of this hook in `Hook::ALL`.
    pub fn index(self) -> usize {
        self as usize
    }
}

impl Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The training operations a learner resolves from its callbacks or its specialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Predict,
    GetLoss,
    Backward,
    Step,
    ZeroGrad,
}

impl Op {
    pub const ALL: [Op; 5] = [Op::Predict, Op::GetLoss, Op::Backward, Op::Step, Op::ZeroGrad];

    pub fn name(&self) -> &'static str {
        Hook::from(*self).name()
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

impl From<Op> for Hook {
    fn from(value: Op) -> Self {
        match value {
            Op::Predict => Hook::Predict,
            Op::GetLoss => Hook::GetLoss,
            Op::Backward => Hook::Backward,
            Op::Step => Hook::Step,
            Op::ZeroGrad => Hook::ZeroGrad,
        }
    }
}

impl Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A set of hooks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HookSet(u32);

impl HookSet {
    pub const EMPTY: HookSet = HookSet(0);

    /// Builds a set out of a list of hooks, usable in constants.
    pub const fn of(hooks: &[Hook]) -> Self {
        let mut bits = 0;
        let mut i = 0;

        while i < hooks.len() {
            bits |= 1 << hooks[i] as u32;
            i += 1;
        }

        Self(bits)
    }

    pub fn contains(&self, hook: Hook) -> bool {
        self.0 & (1 << hook as u32) != 0
    }

    pub fn with(self, hook: Hook) -> Self {
        Self(self.0 | 1 << hook as u32)
    }

    pub fn union(self, other: HookSet) -> Self {
        Self(self.0 | other.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn iter(&self) -> impl Iterator<Item = Hook> + '_ {
        Hook::ALL.into_iter().filter(|hook| self.contains(*hook))
    }
}

impl BitOr<Hook> for HookSet {
    type Output = HookSet;

    fn bitor(self, rhs: Hook) -> Self::Output {
        self.with(rhs)
    }
}

impl BitOr for HookSet {
    type Output = HookSet;

    fn bitor(self, rhs: HookSet) -> Self::Output {
        self.union(rhs)
    }
}

impl FromIterator<Hook> for HookSet {
    fn from_iter<I: IntoIterator<Item = Hook>>(iter: I) -> Self {
        iter.into_iter().fold(Self::EMPTY, Self::with)
    }
}
