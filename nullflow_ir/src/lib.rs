pub mod call_site;
pub mod contract;
pub(crate) mod error;
pub mod flow;
pub mod instruction;
pub mod nullability;
pub mod place;
pub mod types;

pub use call_site::{CallKind, CallSite};
pub use contract::{ContractValue, MethodContract};
pub use error::FlowError;
pub use flow::{ControlFlow, EntryPoint, InstructionStore};
pub use instruction::{Anchor, BinOp, Instruction};
pub use nullability::Nullability;
pub use place::{ConstLiteral, Place, VarId, VariableDescriptor};
pub use types::{ClassType, PrimitiveType, ValueType};
