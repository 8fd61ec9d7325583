use nullflow_ir::FlowError;
use thiserror::Error;

/// A non-recoverable internal error: a contract breach in the instruction
/// stream itself, never a normal analysis outcome.
#[derive(Debug, Error)]
pub enum NullflowError {
    /// An instruction popped from an empty operand stack; the front end built
    /// a malformed flow.
    #[error("operand stack underflow at instruction {0}")]
    StackUnderflow(usize),
    /// A successor index escaped the instruction sequence.
    #[error("instruction offset {0} is outside the control flow")]
    InvalidInstructionOffset(usize),
    /// An analysis was started with no initial memory state.
    #[error("an analysis requires at least one initial memory state")]
    EmptyInitialStates,
    #[error(transparent)]
    Flow(#[from] FlowError),
}
