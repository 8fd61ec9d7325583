use crate::error::NullflowError;
use crate::graph::ExploredFlow;
use crate::problem::{Problem, Reachability, RunStatus};
use crate::state::MemoryState;
use crate::value::factory::ValueFactory;
use crate::value::Value;
use crate::visitor::StandardVisitor;
use nullflow_ir::{Anchor, EntryPoint, InstructionStore};
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::{trace, warn};

/// Exploration limits. The defaults match production use; tests shrink them
/// to exercise the giving-up paths at a manageable scale.
#[derive(Debug, Copy, Clone)]
pub struct RunnerConfig {
    /// Cap on live states produced by contract application at one call site.
    pub max_states_per_branch: usize,
    /// Global budget of (instruction, state) visits for a whole run.
    pub max_state_visits: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_states_per_branch: 300,
            max_state_visits: 30_000,
        }
    }
}

/// Everything a finished run produced. When `status` is
/// [`RunStatus::TooComplex`] the rest is partial and must not be acted on.
#[derive(Debug)]
pub struct AnalysisResult {
    pub status: RunStatus,
    pub problems: Vec<Problem>,
    pub reachability: HashMap<usize, Reachability>,
    pub constant_values: HashMap<Anchor, Value>,
    pub terminal_states: Vec<MemoryState>,
    pub explored: ExploredFlow,
}

/// The worklist fixed-point driver.
///
/// Exploration is breadth-first over (instruction index, memory state) pairs.
/// A canonicalized visited set makes re-visitation idempotent: the same pair
/// is processed at most once, so loops terminate once their states stop
/// changing.
pub struct DataFlowRunner {
    factory: ValueFactory,
    config: RunnerConfig,
}

impl DataFlowRunner {
    pub fn new(factory: ValueFactory, config: RunnerConfig) -> Self {
        Self { factory, config }
    }

    pub fn factory(&self) -> &ValueFactory {
        &self.factory
    }

    /// Analyze from the store's entry point with a single empty state.
    pub fn analyze<F>(
        &self,
        flow: &F,
        visitor: &mut StandardVisitor,
    ) -> Result<AnalysisResult, NullflowError>
    where
        F: InstructionStore + EntryPoint,
    {
        self.analyze_with_states(flow, visitor, vec![MemoryState::new()])
    }

    /// Analyze with caller-supplied initial states, e.g. parameter
    /// assumptions prepared by a front end.
    pub fn analyze_with_states<F>(
        &self,
        flow: &F,
        visitor: &mut StandardVisitor,
        initial_states: Vec<MemoryState>,
    ) -> Result<AnalysisResult, NullflowError>
    where
        F: InstructionStore + EntryPoint,
    {
        if initial_states.is_empty() {
            return Err(NullflowError::EmptyInitialStates);
        }
        let entry = flow.entry();
        let mut worklist: VecDeque<(usize, MemoryState)> = initial_states
            .into_iter()
            .map(|state| (entry, state))
            .collect();
        let mut visited: HashSet<(usize, MemoryState)> = HashSet::new();
        let mut explored = ExploredFlow::new();
        explored.add_node(entry);
        let mut status = RunStatus::Completed;
        let mut visits = 0usize;

        while let Some((index, state)) = worklist.pop_front() {
            if !visited.insert((index, state.clone())) {
                continue;
            }
            visits += 1;
            if visits > self.config.max_state_visits {
                warn!(visits, "state-visit budget exhausted, giving up");
                status = RunStatus::TooComplex;
                break;
            }
            let instruction = flow
                .instruction_at(index)
                .ok_or(NullflowError::InvalidInstructionOffset(index))?;
            trace!(index, "visiting");
            let successors =
                visitor.visit(index, instruction, state, self.config.max_states_per_branch)?;
            for (next, next_state) in successors {
                if next >= flow.len() {
                    return Err(NullflowError::InvalidInstructionOffset(next));
                }
                explored.add_edge(index, next);
                worklist.push_back((next, next_state));
            }
        }

        Ok(AnalysisResult {
            status,
            problems: visitor.problems().to_vec(),
            reachability: visitor.reachability(),
            constant_values: visitor.constant_reference_values(),
            terminal_states: visitor.terminal_states().to_vec(),
            explored,
        })
    }
}
