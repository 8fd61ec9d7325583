use serde::{Deserialize, Serialize};

/// A single slot of a method contract: either a precondition on an argument's
/// nullness/truth value, or the forced outcome of the call.
///
/// `Fail` is only meaningful as a result: it means the call is known to throw
/// or abort when the preconditions hold.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContractValue {
    Any,
    Null,
    NotNull,
    True,
    False,
    Fail,
}

/// A declared precondition-to-postcondition fact about a call target.
///
/// When every argument satisfies its constraint, the call's return value is
/// forced to `result` (or the call is known to fail). Contracts are applied in
/// declaration order; a call may carry several.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MethodContract {
    pub args: Vec<ContractValue>,
    pub result: ContractValue,
}

impl MethodContract {
    pub fn new(args: Vec<ContractValue>, result: ContractValue) -> Self {
        Self { args, result }
    }

    /// A contract with no argument preconditions.
    pub fn unconditional(result: ContractValue) -> Self {
        Self {
            args: vec![],
            result,
        }
    }
}
