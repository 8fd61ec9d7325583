use nullflow_ir::Anchor;
use serde::{Deserialize, Serialize};

/// The taxonomy of nullability violations the engine reports.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum ProblemKind {
    AssigningNullToNotNull,
    PassingNullToNotNullParameter,
    PassingNullableToUnannotatedParameter,
    DereferencingPossiblyNull,
    ReturningNullFromNotNullMethod,
    UnboxingPossiblyNull,
    CastAlwaysFails,
}

/// A single violation, reported at most once per (anchor, kind).
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Problem {
    pub anchor: Anchor,
    pub kind: ProblemKind,
}

/// How an analysis run ended. Reports from a `TooComplex` run are partial and
/// must not be acted on.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RunStatus {
    Completed,
    TooComplex,
}

/// Which outcomes of a branching instruction were ever reached.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Reachability {
    Never,
    TrueOnly,
    FalseOnly,
    Both,
}

/// Per-instruction reachability bookkeeping accumulated during a run.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct BranchMarks {
    pub true_reachable: bool,
    pub false_reachable: bool,
}

impl BranchMarks {
    pub fn classification(&self) -> Reachability {
        match (self.true_reachable, self.false_reachable) {
            (false, false) => Reachability::Never,
            (true, false) => Reachability::TrueOnly,
            (false, true) => Reachability::FalseOnly,
            (true, true) => Reachability::Both,
        }
    }
}
