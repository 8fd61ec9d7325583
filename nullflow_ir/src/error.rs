use thiserror::Error;

/// A structural defect in a front-end-supplied instruction sequence.
#[derive(Debug, Error)]
pub enum FlowError {
    /// A control flow must contain at least one instruction.
    #[error("attempted to construct a control flow with zero instructions")]
    EmptyFlow,
    /// A goto referenced an instruction index outside the sequence.
    #[error("instruction {instruction} branches to {target}, which is out of range")]
    BranchOutOfRange { instruction: usize, target: usize },
    /// Control can fall off the end of the sequence.
    #[error("the last instruction must be a goto or a finish")]
    MissingFinish,
}
