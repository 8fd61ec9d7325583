mod call;
mod error;
pub mod graph;
pub mod problem;
pub mod runner;
pub mod state;
pub mod value;
pub mod visitor;

pub use nullflow_ir as ir;

pub use error::NullflowError;
pub use graph::ExploredFlow;
pub use problem::{Problem, ProblemKind, Reachability, RunStatus};
pub use runner::{AnalysisResult, DataFlowRunner, RunnerConfig};
pub use state::MemoryState;
pub use value::factory::ValueFactory;
pub use value::Value;
pub use visitor::StandardVisitor;
