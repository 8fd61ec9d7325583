use crate::call::{force_not_null, CallHelper};
use crate::error::NullflowError;
use crate::problem::{BranchMarks, Problem, ProblemKind, Reachability};
use crate::state::MemoryState;
use crate::value::factory::ValueFactory;
use crate::value::{ConstValue, RelationOp, Value};
use internment::Intern;
use itertools::Itertools;
use nullflow_ir::{Anchor, BinOp, CallKind, CallSite, Instruction, Nullability, Place, ValueType};
use std::collections::{HashMap, HashSet};
use tracing::trace;

/// What has been observed flowing through a read of a place. A second,
/// different observation (or any non-constant one) poisons the slot.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum ConstObservation {
    Value(Value),
    Any,
}

/// The transfer functions of the analysis, one per instruction kind, plus the
/// per-run bookkeeping they accumulate: violation reports, branch
/// reachability, observed constants, instance-of usefulness and the states
/// that reached the end of the flow.
///
/// A visitor is single-use: it belongs to exactly one run.
pub struct StandardVisitor {
    factory: ValueFactory,
    call_helper: CallHelper,
    constants: HashMap<Anchor, ConstObservation>,
    reachability: HashMap<usize, BranchMarks>,
    visited_instanceof: HashSet<Anchor>,
    useful_instanceof: HashSet<Anchor>,
    can_be_null: HashSet<Anchor>,
    seen_problems: HashSet<Problem>,
    problems: Vec<Problem>,
    terminal_states: Vec<MemoryState>,
    suppress_constant_conditions: Option<Box<dyn Fn(Anchor) -> bool>>,
}

impl StandardVisitor {
    pub fn new(factory: ValueFactory) -> Self {
        Self {
            call_helper: CallHelper::new(factory.clone()),
            factory,
            constants: HashMap::new(),
            reachability: HashMap::new(),
            visited_instanceof: HashSet::new(),
            useful_instanceof: HashSet::new(),
            can_be_null: HashSet::new(),
            seen_problems: HashSet::new(),
            problems: Vec::new(),
            terminal_states: Vec::new(),
            suppress_constant_conditions: None,
        }
    }

    /// Install a predicate deciding which anchors should not have their
    /// statically decided branch outcomes recorded as one-sided. A suppressed
    /// anchor is marked reachable on both sides, so downstream consumers will
    /// not flag it as a constant condition.
    pub fn with_constant_condition_suppression(
        mut self,
        predicate: impl Fn(Anchor) -> bool + 'static,
    ) -> Self {
        self.suppress_constant_conditions = Some(Box::new(predicate));
        self
    }

    /// Run one instruction on one state, yielding the successor pairs of
    /// (instruction index, memory state) the runner must still explore.
    pub fn visit(
        &mut self,
        index: usize,
        instruction: &Instruction,
        mut state: MemoryState,
        max_states_per_branch: usize,
    ) -> Result<Vec<(usize, MemoryState)>, NullflowError> {
        match instruction {
            Instruction::Push {
                place,
                anchor,
                is_write,
            } => self.visit_push(index, place, *anchor, *is_write, state),
            Instruction::Pop => {
                self.pop(index, &mut state)?;
                Ok(Self::next(index, state))
            }
            Instruction::Assign {
                anchor,
                initializer,
            } => self.visit_assign(index, *anchor, *initializer, state),
            Instruction::Binop { op, anchor } => self.visit_binop(index, *op, *anchor, state),
            Instruction::ConditionalGoto {
                target,
                negated,
                anchor,
            } => self.visit_conditional_goto(index, *target, *negated, *anchor, state),
            Instruction::Goto { target } => Ok(vec![(*target, state)]),
            Instruction::TypeCast {
                operand,
                target,
                anchor,
            } => self.visit_type_cast(index, operand, target, *anchor, state),
            Instruction::FieldReference { anchor } => {
                self.visit_field_reference(index, *anchor, state)
            }
            Instruction::CheckReturnValue { anchor } => {
                self.visit_check_return_value(index, *anchor, state)
            }
            Instruction::MethodCall(call) => {
                self.visit_method_call(index, call, state, max_states_per_branch)
            }
            Instruction::Finish => {
                self.terminal_states.push(state);
                Ok(vec![])
            }
        }
    }

    fn next(index: usize, state: MemoryState) -> Vec<(usize, MemoryState)> {
        vec![(index + 1, state)]
    }

    fn pop(&self, index: usize, state: &mut MemoryState) -> Result<Value, NullflowError> {
        state.pop().ok_or(NullflowError::StackUnderflow(index))
    }

    fn report(&mut self, anchor: Anchor, kind: ProblemKind) {
        let problem = Problem { anchor, kind };
        if self.seen_problems.insert(problem) {
            trace!(?anchor, ?kind, "recorded violation");
            self.problems.push(problem);
        }
    }

    fn mark(&mut self, index: usize, outcome: bool) {
        let marks = self.reachability.entry(index).or_default();
        if outcome {
            marks.true_reachable = true;
        } else {
            marks.false_reachable = true;
        }
    }

    fn suppressed(&self, anchor: Anchor) -> bool {
        self.suppress_constant_conditions
            .as_ref()
            .is_some_and(|p| p(anchor))
    }

    fn mark_decided(&mut self, index: usize, anchor: Anchor, outcome: bool) {
        if self.suppressed(anchor) {
            self.mark(index, true);
            self.mark(index, false);
        } else {
            self.mark(index, outcome);
        }
    }

    fn visit_push(
        &mut self,
        index: usize,
        place: &Place,
        anchor: Anchor,
        is_write: bool,
        mut state: MemoryState,
    ) -> Result<Vec<(usize, MemoryState)>, NullflowError> {
        let value = self.factory.value_for_place(place);
        if !is_write {
            self.observe_constant(anchor, &state, value);
        }
        state.push(value);
        Ok(Self::next(index, state))
    }

    fn observe_constant(&mut self, anchor: Anchor, state: &MemoryState, value: Value) {
        let observed = match value {
            Value::Const(c) => {
                matches!(c.as_ref(), ConstValue::Null | ConstValue::Bool(_)).then_some(value)
            }
            Value::Variable(var) => state.get_constant(var).and_then(|c| {
                matches!(c.as_ref(), ConstValue::Null | ConstValue::Bool(_))
                    .then_some(Value::Const(c))
            }),
            _ => None,
        };
        let next = match (self.constants.get(&anchor), observed) {
            (None, Some(v)) => ConstObservation::Value(v),
            (Some(ConstObservation::Value(prev)), Some(v)) if *prev == v => return,
            _ => ConstObservation::Any,
        };
        self.constants.insert(anchor, next);
    }

    fn visit_assign(
        &mut self,
        index: usize,
        anchor: Anchor,
        initializer: bool,
        mut state: MemoryState,
    ) -> Result<Vec<(usize, MemoryState)>, NullflowError> {
        let mut source = self.pop(index, &mut state)?;
        let dest = self.pop(index, &mut state)?;
        if let Some(var) = dest.as_variable() {
            // binding a value that aliases the destination (itself, or a
            // chain hanging off it) would go stale the moment it is rebound,
            // so only its type and current nullability are kept
            if let Some(src) = source.as_variable() {
                if src.id == var.id || src.is_qualified_by(var.as_ref()) {
                    let derived = if state.is_not_null(source) {
                        Nullability::NotNull
                    } else if state.check_not_nullable(source) {
                        Nullability::Nullable
                    } else {
                        Nullability::Unknown
                    };
                    source = self.factory.type_value(src.ty.clone(), derived);
                }
            }
            if var.inherent_nullability.is_not_null() && state.check_not_nullable(source) {
                self.report(anchor, ProblemKind::AssigningNullToNotNull);
                // trust the declaration from here on
                source = self.factory.type_value(var.ty.clone(), Nullability::NotNull);
            }
            if !var.is_volatile {
                state.set_var_value(var, source);
                // only a nullable-declared variable keeps the initializer fact
                if initializer
                    && var.inherent_nullability.is_nullable()
                    && !state.is_not_null(source)
                {
                    state.set_nullability_fact(var, Nullability::Nullable);
                }
            }
        }
        state.push(dest);
        Ok(Self::next(index, state))
    }

    fn visit_binop(
        &mut self,
        index: usize,
        op: BinOp,
        anchor: Anchor,
        mut state: MemoryState,
    ) -> Result<Vec<(usize, MemoryState)>, NullflowError> {
        let right = self.pop(index, &mut state)?;
        let left = self.pop(index, &mut state)?;
        let rel_op = match op {
            BinOp::Eq => RelationOp::Eq,
            BinOp::Ne => RelationOp::Ne,
            BinOp::Lt => RelationOp::Lt,
            BinOp::Le => RelationOp::Le,
            BinOp::Gt => RelationOp::Gt,
            BinOp::Ge => RelationOp::Ge,
            BinOp::InstanceOf => {
                self.visited_instanceof.insert(anchor);
                if !state.is_not_null(left) {
                    self.can_be_null.insert(anchor);
                }
                return self.relation_fork(index, anchor, left, right, RelationOp::InstanceOf, state);
            }
            BinOp::Plus => {
                state.push(self.factory.non_null_string());
                return Ok(Self::next(index, state));
            }
            BinOp::Undefined => {
                self.mark(index, true);
                self.mark(index, false);
                state.push(Value::Unknown);
                return Ok(Self::next(index, state));
            }
        };
        if let Some(outcome) = self.constant_comparison(&state, left, right, rel_op) {
            self.mark_decided(index, anchor, outcome);
            state.push(self.factory.boolean(outcome));
            return Ok(Self::next(index, state));
        }
        self.relation_fork(index, anchor, left, right, rel_op, state)
    }

    /// Decide a comparison statically, from known constants or from the
    /// declared value range of a primitive variable.
    fn constant_comparison(
        &self,
        state: &MemoryState,
        left: Value,
        right: Value,
        op: RelationOp,
    ) -> Option<bool> {
        let left_const = Self::constant_of(state, left);
        let right_const = Self::constant_of(state, right);
        if let (Some(a), Some(b)) = (left_const, right_const) {
            if let (Some(x), Some(y)) = (a.as_int(), b.as_int()) {
                return op.eval_int(x, y);
            }
            return match op {
                RelationOp::Eq => Some(a == b),
                RelationOp::Ne => Some(a != b),
                _ => None,
            };
        }
        if let (Some(var), Some(c)) = (left.as_variable(), right_const) {
            return Self::range_decides(op, var.ty.clone(), c);
        }
        if let (Some(c), Some(var)) = (left_const, right.as_variable()) {
            return Self::range_decides(op.symmetric()?, var.ty.clone(), c);
        }
        None
    }

    fn range_decides(op: RelationOp, ty: ValueType, c: Intern<ConstValue>) -> Option<bool> {
        let compared = c.as_int()?;
        let (min, max) = ty.as_primitive()?.range()?;
        crate::state::range_comparison(op, compared, min, max)
    }

    fn constant_of(state: &MemoryState, value: Value) -> Option<Intern<ConstValue>> {
        match value {
            Value::Const(c) => Some(c),
            Value::Variable(var) => state.get_constant(var),
            _ => None,
        }
    }

    fn relation_fork(
        &mut self,
        index: usize,
        anchor: Anchor,
        left: Value,
        right: Value,
        op: RelationOp,
        state: MemoryState,
    ) -> Result<Vec<(usize, MemoryState)>, NullflowError> {
        let Some(Value::Relation(relation)) = self.factory.relation(left, right, op, false) else {
            // incomparable operands: the outcome is unknowable
            if op == RelationOp::InstanceOf {
                // an unknowable check must never read as redundant
                self.useful_instanceof.insert(anchor);
            }
            let mut state = state;
            self.mark(index, true);
            self.mark(index, false);
            state.push(Value::Unknown);
            return Ok(Self::next(index, state));
        };
        let mut successors = Vec::with_capacity(2);
        let mut true_state = state.create_copy();
        if true_state.apply_condition(relation) {
            self.mark(index, true);
            true_state.push(self.factory.boolean(true));
            successors.push((index + 1, true_state));
        }
        let mut false_state = state;
        if false_state.apply_condition(relation.negated()) {
            self.mark(index, false);
            false_state.push(self.factory.boolean(false));
            successors.push((index + 1, false_state));
        }
        if op == RelationOp::InstanceOf && successors.len() == 2 {
            // the check could go either way, so it narrows something
            self.useful_instanceof.insert(anchor);
        }
        Ok(successors)
    }

    fn visit_conditional_goto(
        &mut self,
        index: usize,
        target: usize,
        negated: bool,
        anchor: Anchor,
        mut state: MemoryState,
    ) -> Result<Vec<(usize, MemoryState)>, NullflowError> {
        let condition = self.pop(index, &mut state)?;
        let known = match condition {
            Value::Const(c) => c.as_bool(),
            Value::Variable(var) => state.get_constant(var).and_then(|c| c.as_bool()),
            _ => None,
        };
        if let Some(value) = known {
            self.mark_decided(index, anchor, value);
            let successor = if value != negated { target } else { index + 1 };
            return Ok(vec![(successor, state)]);
        }
        self.mark(index, true);
        self.mark(index, false);
        let jump_state = state.create_copy();
        Ok(vec![(target, jump_state), (index + 1, state)])
    }

    fn visit_type_cast(
        &mut self,
        index: usize,
        operand: &Place,
        target: &ValueType,
        anchor: Anchor,
        mut state: MemoryState,
    ) -> Result<Vec<(usize, MemoryState)>, NullflowError> {
        let value = self.pop(index, &mut state)?;
        if target.is_primitive() {
            // casting a reference to a primitive unboxes it
            if state.check_not_nullable(value) {
                self.report(anchor, ProblemKind::UnboxingPossiblyNull);
                force_not_null(&self.factory, &mut state, value);
            }
            state.push(self.factory.unboxed(value));
            return Ok(Self::next(index, state));
        }
        let operand_value = match operand {
            Place::Unknown => value,
            _ => self.factory.value_for_place(operand),
        };
        let target_value = self
            .factory
            .type_value(target.clone(), Nullability::Unknown);
        if let Some(Value::Relation(relation)) =
            self.factory
                .relation(operand_value, target_value, RelationOp::InstanceOf, false)
        {
            if !state.apply_instanceof_or_null(relation) {
                self.report(anchor, ProblemKind::CastAlwaysFails);
            }
        }
        state.push(value);
        Ok(Self::next(index, state))
    }

    fn visit_field_reference(
        &mut self,
        index: usize,
        anchor: Anchor,
        mut state: MemoryState,
    ) -> Result<Vec<(usize, MemoryState)>, NullflowError> {
        let qualifier = self.pop(index, &mut state)?;
        if state.check_not_nullable(qualifier) {
            self.report(anchor, ProblemKind::DereferencingPossiblyNull);
            force_not_null(&self.factory, &mut state, qualifier);
        }
        Ok(Self::next(index, state))
    }

    fn visit_check_return_value(
        &mut self,
        index: usize,
        anchor: Anchor,
        mut state: MemoryState,
    ) -> Result<Vec<(usize, MemoryState)>, NullflowError> {
        let value = self.pop(index, &mut state)?;
        if state.check_not_nullable(value) {
            self.report(anchor, ProblemKind::ReturningNullFromNotNullMethod);
            force_not_null(&self.factory, &mut state, value);
        }
        Ok(Self::next(index, state))
    }

    fn visit_method_call(
        &mut self,
        index: usize,
        call: &CallSite,
        mut state: MemoryState,
        max_states_per_branch: usize,
    ) -> Result<Vec<(usize, MemoryState)>, NullflowError> {
        let mut argument_problems = Vec::new();
        let Some(popped) =
            self.call_helper
                .pop_call_arguments(call, &mut state, &mut argument_problems)
        else {
            return Err(NullflowError::StackUnderflow(index));
        };
        for problem in argument_problems {
            self.report(problem.anchor, problem.kind);
        }
        match call.kind {
            // a constructor has no receiver to dereference
            CallKind::Constructor => {}
            CallKind::Regular => {
                if state.check_not_nullable(popped.qualifier) {
                    self.report(call.anchor, ProblemKind::DereferencingPossiblyNull);
                    force_not_null(&self.factory, &mut state, popped.qualifier);
                }
            }
            CallKind::Unboxing => {
                if state.check_not_nullable(popped.qualifier) {
                    self.report(call.anchor, ProblemKind::UnboxingPossiblyNull);
                    force_not_null(&self.factory, &mut state, popped.qualifier);
                }
            }
        }
        let default_result = match call.kind {
            CallKind::Unboxing => self.factory.unboxed(popped.qualifier),
            CallKind::Regular | CallKind::Constructor => {
                self.call_helper.default_result(index, call)
            }
        };
        let mut successors = self.call_helper.add_contract_results(
            call,
            state,
            default_result,
            &popped.params,
            max_states_per_branch,
        );
        // an opaque call invalidates field knowledge in every outcome,
        // including what contract narrowing just learned about fields
        if call.flushes_fields {
            for successor in &mut successors {
                successor.flush_fields();
            }
        }
        Ok(successors
            .into_iter()
            .map(|state| (index + 1, state))
            .collect_vec())
    }

    // --- queries over the finished run ---

    pub fn problems(&self) -> &[Problem] {
        &self.problems
    }

    pub fn terminal_states(&self) -> &[MemoryState] {
        &self.terminal_states
    }

    /// Per-branching-instruction reachability classification.
    pub fn reachability(&self) -> HashMap<usize, Reachability> {
        self.reachability
            .iter()
            .map(|(&index, marks)| (index, marks.classification()))
            .collect()
    }

    /// Whether the instance-of at this anchor was explored but never able to
    /// go both ways. An operand whose nullness was undecided disqualifies the
    /// anchor: the check may still be guarding against null.
    pub fn is_instanceof_redundant(&self, anchor: Anchor) -> bool {
        self.visited_instanceof.contains(&anchor)
            && !self.useful_instanceof.contains(&anchor)
            && !self.can_be_null.contains(&anchor)
    }

    /// Whether the operand of the instance-of at this anchor was possibly
    /// null on some path.
    pub fn can_be_null(&self, anchor: Anchor) -> bool {
        self.can_be_null.contains(&anchor)
    }

    /// Places through which exactly one null-or-boolean constant ever flowed.
    pub fn constant_reference_values(&self) -> HashMap<Anchor, Value> {
        self.constants
            .iter()
            .filter_map(|(&anchor, observation)| match observation {
                ConstObservation::Value(value) => Some((anchor, *value)),
                ConstObservation::Any => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nullflow_ir::{
        ClassType, ConstLiteral, ContractValue, MethodContract, PrimitiveType, VarId,
        VariableDescriptor,
    };

    const CAP: usize = 300;

    fn visitor() -> StandardVisitor {
        StandardVisitor::new(ValueFactory::new(false))
    }

    fn not_null_var(id: u32) -> VariableDescriptor {
        VariableDescriptor::new(
            VarId(id),
            "x",
            ValueType::Object(ClassType::new("Object", vec![])),
            Nullability::NotNull,
        )
    }

    #[test]
    fn assigning_null_to_not_null_reports_and_repairs() {
        let mut v = visitor();
        let descriptor = not_null_var(1);
        let dest = v.factory.variable(&descriptor);

        let mut state = MemoryState::new();
        state.push(dest);
        state.push(v.factory.null());

        let successors = v
            .visit(
                0,
                &Instruction::Assign {
                    anchor: Anchor(3),
                    initializer: false,
                },
                state,
                CAP,
            )
            .unwrap();
        assert_eq!(
            v.problems(),
            &[Problem {
                anchor: Anchor(3),
                kind: ProblemKind::AssigningNullToNotNull,
            }]
        );
        let (next, state) = &successors[0];
        assert_eq!(*next, 1);
        // the declaration is trusted after the report
        assert!(state.is_not_null(dest));
        assert_eq!(state.peek(), Some(dest));
    }

    #[test]
    fn volatile_destination_is_never_bound() {
        let mut v = visitor();
        let descriptor = VariableDescriptor::new(
            VarId(2),
            "v",
            ValueType::string(),
            Nullability::Unknown,
        )
        .volatile();
        let dest = v.factory.variable(&descriptor);

        let mut state = MemoryState::new();
        state.push(dest);
        state.push(v.factory.null());
        let successors = v
            .visit(
                0,
                &Instruction::Assign {
                    anchor: Anchor(1),
                    initializer: false,
                },
                state,
                CAP,
            )
            .unwrap();
        let (_, state) = &successors[0];
        assert_eq!(state.get_constant(dest.as_variable().unwrap()), None);
    }

    #[test]
    fn out_of_range_comparison_produces_one_false_successor() {
        let mut v = visitor();
        let byte = v.factory.variable(&VariableDescriptor::new(
            VarId(3),
            "b",
            ValueType::Primitive(PrimitiveType::Byte),
            Nullability::Unknown,
        ));

        let mut state = MemoryState::new();
        state.push(byte);
        state.push(v.factory.int(1000));
        let successors = v
            .visit(
                0,
                &Instruction::Binop {
                    op: BinOp::Eq,
                    anchor: Anchor(5),
                },
                state,
                CAP,
            )
            .unwrap();
        assert_eq!(successors.len(), 1);
        assert_eq!(successors[0].1.peek(), Some(v.factory.boolean(false)));
        assert_eq!(v.reachability()[&0], Reachability::FalseOnly);
    }

    #[test]
    fn null_comparison_forks_and_narrows_both_sides() {
        let mut v = visitor();
        let o = v.factory.variable(&VariableDescriptor::new(
            VarId(4),
            "o",
            ValueType::Object(ClassType::new("Object", vec![])),
            Nullability::Unknown,
        ));

        let mut state = MemoryState::new();
        state.push(o);
        state.push(v.factory.null());
        let successors = v
            .visit(
                0,
                &Instruction::Binop {
                    op: BinOp::Eq,
                    anchor: Anchor(6),
                },
                state,
                CAP,
            )
            .unwrap();
        assert_eq!(successors.len(), 2);
        assert_eq!(v.reachability()[&0], Reachability::Both);
        let null_side = &successors[0].1;
        assert!(null_side.is_null(o));
        let not_null_side = &successors[1].1;
        assert!(not_null_side.is_not_null(o));
    }

    #[test]
    fn constant_condition_takes_one_edge() {
        let mut v = visitor();
        let mut state = MemoryState::new();
        state.push(v.factory.boolean(true));
        let successors = v
            .visit(
                2,
                &Instruction::ConditionalGoto {
                    target: 9,
                    negated: false,
                    anchor: Anchor(8),
                },
                state,
                CAP,
            )
            .unwrap();
        assert_eq!(successors.len(), 1);
        assert_eq!(successors[0].0, 9);
        assert_eq!(v.reachability()[&2], Reachability::TrueOnly);
    }

    #[test]
    fn suppressed_anchor_is_marked_both_ways() {
        let mut v = StandardVisitor::new(ValueFactory::new(false))
            .with_constant_condition_suppression(|anchor| anchor == Anchor(8));
        let mut state = MemoryState::new();
        state.push(v.factory.boolean(true));
        v.visit(
            2,
            &Instruction::ConditionalGoto {
                target: 9,
                negated: false,
                anchor: Anchor(8),
            },
            state,
            CAP,
        )
        .unwrap();
        assert_eq!(v.reachability()[&2], Reachability::Both);
    }

    #[test]
    fn push_observations_poison_on_second_value() {
        let mut v = visitor();
        let push = |v: &mut StandardVisitor, literal: ConstLiteral| {
            v.visit(
                0,
                &Instruction::Push {
                    place: Place::Constant(literal),
                    anchor: Anchor(1),
                    is_write: false,
                },
                MemoryState::new(),
                CAP,
            )
            .unwrap();
        };
        push(&mut v, ConstLiteral::Null);
        assert_eq!(
            v.constant_reference_values().get(&Anchor(1)),
            Some(&v.factory.null())
        );
        push(&mut v, ConstLiteral::Bool(true));
        assert!(v.constant_reference_values().is_empty());
    }

    #[test]
    fn impossible_cast_is_flagged_once() {
        let mut v = visitor();
        let a = VariableDescriptor::new(
            VarId(5),
            "a",
            ValueType::Object(ClassType::new("A", vec![])),
            Nullability::NotNull,
        );
        let cast = Instruction::TypeCast {
            operand: Place::Variable(a.clone()),
            target: ValueType::Object(ClassType::new("B", vec![])),
            anchor: Anchor(9),
        };

        for _ in 0..2 {
            let mut state = MemoryState::new();
            state.push(v.factory.variable(&a));
            v.visit(0, &cast, state, CAP).unwrap();
        }
        assert_eq!(
            v.problems(),
            &[Problem {
                anchor: Anchor(9),
                kind: ProblemKind::CastAlwaysFails,
            }]
        );
    }

    #[test]
    fn dereferencing_a_nullable_qualifier_is_reported() {
        let mut v = visitor();
        let o = v.factory.variable(&VariableDescriptor::new(
            VarId(6),
            "o",
            ValueType::Object(ClassType::new("Object", vec![])),
            Nullability::Nullable,
        ));
        let mut state = MemoryState::new();
        state.push(o);
        let successors = v
            .visit(
                0,
                &Instruction::FieldReference { anchor: Anchor(10) },
                state,
                CAP,
            )
            .unwrap();
        assert_eq!(v.problems()[0].kind, ProblemKind::DereferencingPossiblyNull);
        // optimistic repair: downstream code sees it as not-null
        assert!(successors[0].1.is_not_null(o));
    }

    #[test]
    fn field_facts_from_contracts_do_not_survive_a_flushing_call() {
        let mut v = visitor();
        let base = VariableDescriptor::new(
            VarId(20),
            "a",
            ValueType::Object(ClassType::new("A", vec![])),
            Nullability::NotNull,
        );
        let field_descriptor = VariableDescriptor::new(
            VarId(21),
            "f",
            ValueType::Object(ClassType::new("Object", vec![])),
            Nullability::Unknown,
        )
        .field_of(base);
        let field = v.factory.variable(&field_descriptor);

        // opaque() marks the call as field-flushing
        let mut call = CallSite::opaque(Anchor(12), 1);
        call.args = vec![Nullability::Nullable];
        call.contracts = vec![MethodContract::new(
            vec![ContractValue::Null],
            ContractValue::Fail,
        )];

        let mut state = MemoryState::new();
        state.push(Value::Unknown); // qualifier
        state.push(field);
        let successors = v
            .visit(0, &Instruction::MethodCall(call), state, CAP)
            .unwrap();

        // one failing state (field was null) and one residual
        assert_eq!(successors.len(), 2);
        let residual = successors
            .iter()
            .map(|(_, s)| s)
            .find(|s| s.peek() == Some(Value::Unknown))
            .unwrap();
        // the residual learned `f != null`, but the call wiped field facts
        assert!(!residual.is_not_null(field));
    }

    #[test]
    fn initializer_fact_follows_the_declaration() {
        let mut v = visitor();
        let dest = v.factory.variable(&VariableDescriptor::new(
            VarId(22),
            "u",
            ValueType::Object(ClassType::new("Object", vec![])),
            Nullability::Unknown,
        ));
        let source = v.factory.variable(&VariableDescriptor::new(
            VarId(23),
            "n",
            ValueType::Object(ClassType::new("Object", vec![])),
            Nullability::Nullable,
        ));

        // an unannotated destination does not inherit the source's
        // nullability at its initializer
        let mut state = MemoryState::new();
        state.push(dest);
        state.push(source);
        let successors = v
            .visit(
                0,
                &Instruction::Assign {
                    anchor: Anchor(13),
                    initializer: true,
                },
                state,
                CAP,
            )
            .unwrap();
        assert!(!successors[0].1.check_not_nullable(dest));

        // a nullable-declared destination stays a violation candidate
        let nullable_dest = v.factory.variable(&VariableDescriptor::new(
            VarId(24),
            "m",
            ValueType::Object(ClassType::new("Object", vec![])),
            Nullability::Nullable,
        ));
        let mut state = MemoryState::new();
        state.push(nullable_dest);
        state.push(Value::Unknown);
        let successors = v
            .visit(
                0,
                &Instruction::Assign {
                    anchor: Anchor(14),
                    initializer: true,
                },
                state,
                CAP,
            )
            .unwrap();
        assert!(successors[0].1.check_not_nullable(nullable_dest));
    }

    #[test]
    fn instance_of_bookkeeping() {
        let mut v = visitor();
        let o = v.factory.variable(&VariableDescriptor::new(
            VarId(7),
            "o",
            ValueType::Object(ClassType::new("Object", vec![])),
            Nullability::Nullable,
        ));
        let target = v.factory.type_value(
            ValueType::Object(ClassType::new("A", vec!["Object".to_string()])),
            Nullability::Unknown,
        );

        let mut state = MemoryState::new();
        state.push(o);
        state.push(target);
        let successors = v
            .visit(
                0,
                &Instruction::Binop {
                    op: BinOp::InstanceOf,
                    anchor: Anchor(11),
                },
                state,
                CAP,
            )
            .unwrap();
        assert_eq!(successors.len(), 2);
        assert!(v.can_be_null(Anchor(11)));
        assert!(!v.is_instanceof_redundant(Anchor(11)));
    }
}
