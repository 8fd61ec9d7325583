use crate::error::FlowError;
use crate::instruction::Instruction;
use serde::{Deserialize, Serialize};

/// Anything the engine can pull instructions out of.
pub trait InstructionStore {
    fn instruction_at(&self, index: usize) -> Option<&Instruction>;
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Stores that know where an analysis of them should begin.
pub trait EntryPoint {
    fn entry(&self) -> usize;
}

/// An ordered, immutable instruction sequence built by an external front end.
///
/// Construction validates the structural invariants the engine relies on:
/// non-emptiness, in-range branch targets, and no fall-through off the end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlFlow {
    instructions: Vec<Instruction>,
}

impl ControlFlow {
    pub fn new(instructions: Vec<Instruction>) -> Result<Self, FlowError> {
        if instructions.is_empty() {
            return Err(FlowError::EmptyFlow);
        }
        for (index, instruction) in instructions.iter().enumerate() {
            if let Some(target) = instruction.branch_target() {
                if target >= instructions.len() {
                    return Err(FlowError::BranchOutOfRange {
                        instruction: index,
                        target,
                    });
                }
            }
        }
        match instructions.last() {
            Some(last) if last.terminates_sequence() => Ok(Self { instructions }),
            _ => Err(FlowError::MissingFinish),
        }
    }

    pub fn instruction(&self, index: usize) -> Option<&Instruction> {
        self.instructions.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Instruction> {
        self.instructions.iter()
    }
}

impl InstructionStore for ControlFlow {
    fn instruction_at(&self, index: usize) -> Option<&Instruction> {
        self.instruction(index)
    }

    fn len(&self) -> usize {
        self.instructions.len()
    }
}

impl EntryPoint for ControlFlow {
    fn entry(&self) -> usize {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::Anchor;

    #[test]
    fn rejects_empty_flow() {
        assert!(matches!(ControlFlow::new(vec![]), Err(FlowError::EmptyFlow)));
    }

    #[test]
    fn rejects_out_of_range_branch() {
        let result = ControlFlow::new(vec![
            Instruction::Goto { target: 5 },
            Instruction::Finish,
        ]);
        assert!(matches!(
            result,
            Err(FlowError::BranchOutOfRange {
                instruction: 0,
                target: 5
            })
        ));
    }

    #[test]
    fn rejects_fall_through_off_the_end() {
        let result = ControlFlow::new(vec![Instruction::Pop]);
        assert!(matches!(result, Err(FlowError::MissingFinish)));
    }

    #[test]
    fn accepts_well_formed_flow() {
        let flow = ControlFlow::new(vec![
            Instruction::Assign {
                anchor: Anchor(0),
                initializer: false,
            },
            Instruction::Finish,
        ])
        .unwrap();
        assert_eq!(flow.len(), 2);
        assert_eq!(flow.entry(), 0);
    }
}
