use crate::call_site::CallSite;
use crate::place::Place;
use crate::types::ValueType;
use serde::{Deserialize, Serialize};

/// An opaque source location carried through to violation reports.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Anchor(pub u32);

/// Binary operators the abstract domain understands.
///
/// `Undefined` stands for any operator the front end chose not to model; the
/// engine pushes an unknown result for it and treats it as non-branching.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Plus,
    InstanceOf,
    Undefined,
}

/// One node of the pre-built control-flow graph.
///
/// The default successor of every instruction is the next one in sequence;
/// only gotos carry explicit absolute targets. Instructions are immutable:
/// reachability and constancy are bookkeeping the engine keeps on the side.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Instruction {
    /// Push the value of a place onto the operand stack. Reads participate in
    /// constant-place tracking; writes (the target of an assignment) do not.
    Push {
        place: Place,
        anchor: Anchor,
        is_write: bool,
    },
    /// Discard the top of the operand stack.
    Pop,
    /// Pop a source and a destination and bind the destination.
    /// `initializer` marks a declaration-site assignment.
    Assign { anchor: Anchor, initializer: bool },
    /// Pop two operands and apply a binary operator, possibly forking.
    Binop { op: BinOp, anchor: Anchor },
    /// Pop a condition and branch to `target` when it is true (or false, when
    /// `negated`).
    ConditionalGoto {
        target: usize,
        negated: bool,
        anchor: Anchor,
    },
    Goto { target: usize },
    /// Assert that the value on top of the stack conforms to `target`.
    /// `operand` describes the casted expression so the engine can reason
    /// about it symbolically.
    TypeCast {
        operand: Place,
        target: ValueType,
        anchor: Anchor,
    },
    /// Pop a qualifier that is about to be dereferenced for a field access.
    FieldReference { anchor: Anchor },
    /// Pop the returned value and check it against the enclosing method's
    /// not-null requirement.
    CheckReturnValue { anchor: Anchor },
    MethodCall(CallSite),
    /// Terminal instruction; the state reaching it is collected as a result.
    Finish,
}

impl Instruction {
    /// The explicit branch target, for instructions that have one.
    pub fn branch_target(&self) -> Option<usize> {
        match self {
            Instruction::ConditionalGoto { target, .. } | Instruction::Goto { target } => {
                Some(*target)
            }
            _ => None,
        }
    }

    /// Whether control never falls through to the next instruction.
    pub fn terminates_sequence(&self) -> bool {
        matches!(self, Instruction::Goto { .. } | Instruction::Finish)
    }
}
