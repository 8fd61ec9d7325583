use crate::problem::{Problem, ProblemKind};
use crate::state::MemoryState;
use crate::value::factory::ValueFactory;
use crate::value::{RelationOp, RelationValue, Value};
use internment::Intern;
use nullflow_ir::{CallKind, CallSite, ContractValue, Nullability};
use std::collections::HashMap;
use tracing::debug;

/// Repair a value the analysis has decided to trust as non-null from here on.
/// A variable bound to the null constant is rebound to an opaque non-null
/// instance of its declared type; otherwise only the fact table changes.
pub(crate) fn force_not_null(factory: &ValueFactory, state: &mut MemoryState, value: Value) {
    if let Some(var) = value.as_variable() {
        if state.is_null(value) {
            state.set_var_value(
                var,
                factory.type_value(var.ty.clone(), Nullability::NotNull),
            );
        } else {
            state.set_nullability_fact(var, Nullability::NotNull);
        }
    }
}

/// The call's inputs after popping, ready for contract evaluation.
pub(crate) struct PoppedCall {
    pub qualifier: Value,
    /// One value per declared parameter; a vararg tail collapses into a
    /// single trailing opaque slot.
    pub params: Vec<Value>,
}

enum Condition {
    /// No constraint; the precondition trivially holds.
    Always,
    /// The precondition can never hold for this argument.
    Never,
    Relation(Intern<RelationValue>),
}

/// Pops and validates call inputs and applies method contracts.
///
/// The contract-independent return nullability of a call site never changes
/// across visits, so it is memoized per instruction index.
pub(crate) struct CallHelper {
    factory: ValueFactory,
    return_nullability: HashMap<usize, Nullability>,
}

impl CallHelper {
    pub fn new(factory: ValueFactory) -> Self {
        Self {
            factory,
            return_nullability: HashMap::new(),
        }
    }

    /// Pop a call's inputs in reverse push order: deferred closures first,
    /// then positional arguments, the named-argument bundle, and finally the
    /// qualifier. Each positional argument is checked against its required
    /// nullability. `None` signals stack underflow.
    pub fn pop_call_arguments(
        &self,
        call: &CallSite,
        state: &mut MemoryState,
        problems: &mut Vec<Problem>,
    ) -> Option<PoppedCall> {
        for _ in 0..call.closure_args {
            state.pop()?;
        }
        let mut positional = vec![Value::Unknown; call.args.len()];
        for slot in positional.iter_mut().rev() {
            *slot = state.pop()?;
        }
        for (i, (required, value)) in call.args.iter().zip(positional.iter()).enumerate() {
            // Arguments spread into a vararg tail have no per-slot annotation.
            let in_vararg_tail =
                call.vararg_call && call.param_count > 0 && i >= call.param_count - 1;
            if in_vararg_tail || !state.check_not_nullable(*value) {
                continue;
            }
            match required {
                Nullability::NotNull => {
                    problems.push(Problem {
                        anchor: call.anchor,
                        kind: ProblemKind::PassingNullToNotNullParameter,
                    });
                    force_not_null(&self.factory, state, *value);
                }
                Nullability::Unknown => {
                    problems.push(Problem {
                        anchor: call.anchor,
                        kind: ProblemKind::PassingNullableToUnannotatedParameter,
                    });
                }
                Nullability::Nullable => {}
            }
        }
        if call.named_args {
            state.pop()?;
        }
        let qualifier = state.pop()?;

        let mut params = Vec::with_capacity(call.param_count);
        for i in 0..call.param_count {
            if call.vararg_call && i == call.param_count - 1 {
                params.push(Value::Unknown);
            } else {
                params.push(positional.get(i).copied().unwrap_or(Value::Unknown));
            }
        }
        Some(PoppedCall { qualifier, params })
    }

    /// The contract-independent nullability of the call's return value.
    /// Constructors always produce a fresh instance; otherwise the explicit
    /// annotation wins, then the accessor's property annotation, then the
    /// run's unannotated-member policy.
    pub fn return_nullability(&mut self, index: usize, call: &CallSite) -> Nullability {
        if let Some(&memoized) = self.return_nullability.get(&index) {
            return memoized;
        }
        let nullability = match call.kind {
            CallKind::Constructor => Nullability::NotNull,
            CallKind::Regular | CallKind::Unboxing => call
                .return_annotation
                .or(call.accessor_annotation)
                .unwrap_or({
                    if self.factory.unknown_members_nullable() {
                        Nullability::Nullable
                    } else {
                        Nullability::Unknown
                    }
                }),
        };
        self.return_nullability.insert(index, nullability);
        nullability
    }

    /// The value the call leaves on the stack when no contract fires.
    pub fn default_result(&mut self, index: usize, call: &CallSite) -> Value {
        let nullability = self.return_nullability(index, call);
        match &call.return_type {
            Some(ty) if ty.is_reference() => self.factory.type_value(ty.clone(), nullability),
            Some(_) | None => Value::Unknown,
        }
    }

    /// Apply the call's contracts to a state, producing one successor per
    /// distinguishable outcome, each with its result already pushed.
    ///
    /// Contracts apply in declaration order: a state satisfying every
    /// precondition of a contract gets that contract's forced result; the
    /// residual states flow into the next contract, and whatever survives all
    /// of them gets the default result. If the fork count ever exceeds
    /// `max_states`, all contract-derived states are discarded and the single
    /// baseline successor is kept.
    pub fn add_contract_results(
        &self,
        call: &CallSite,
        entry_state: MemoryState,
        default_result: Value,
        args: &[Value],
        max_states: usize,
    ) -> Vec<MemoryState> {
        if call.contracts.is_empty() {
            let mut state = entry_state;
            state.push(default_result);
            return vec![state];
        }
        let baseline = entry_state.clone();
        let mut current = vec![entry_state];
        let mut finals: Vec<MemoryState> = Vec::new();
        for contract in &call.contracts {
            if !contract.args.is_empty() && contract.args.len() != args.len() {
                continue;
            }
            let mut residual = Vec::new();
            'states: for mut state in current {
                for (i, &precondition) in contract.args.iter().enumerate() {
                    let condition = match self.condition_for_arg(args[i], precondition) {
                        Condition::Always => continue,
                        Condition::Never => {
                            residual.push(state);
                            continue 'states;
                        }
                        Condition::Relation(relation) => relation,
                    };
                    let mut negation = state.create_copy();
                    if negation.apply_condition(condition.negated()) {
                        residual.push(negation);
                    }
                    if !state.apply_condition(condition) {
                        continue 'states;
                    }
                }
                state.push(self.forced_result(contract.result, call, default_result));
                finals.push(state);
            }
            current = residual;
            if finals.len() + current.len() > max_states {
                debug!(
                    contracts = call.contracts.len(),
                    max_states, "contract fork explosion, keeping the plain call result"
                );
                let mut state = baseline;
                state.push(default_result);
                return vec![state];
            }
            if current.is_empty() {
                break;
            }
        }
        for mut state in current {
            state.push(default_result);
            finals.push(state);
        }
        finals
    }

    fn condition_for_arg(&self, arg: Value, precondition: ContractValue) -> Condition {
        let relation = match precondition {
            ContractValue::Any | ContractValue::Fail => return Condition::Always,
            ContractValue::Null => {
                self.factory
                    .relation(arg, self.factory.null(), RelationOp::Eq, false)
            }
            ContractValue::NotNull => {
                self.factory
                    .relation(arg, self.factory.null(), RelationOp::Ne, false)
            }
            ContractValue::True => {
                self.factory
                    .relation(arg, self.factory.boolean(true), RelationOp::Eq, false)
            }
            ContractValue::False => {
                self.factory
                    .relation(arg, self.factory.boolean(false), RelationOp::Eq, false)
            }
        };
        match relation {
            Some(Value::Relation(relation)) => Condition::Relation(relation),
            _ => Condition::Never,
        }
    }

    fn forced_result(
        &self,
        result: ContractValue,
        call: &CallSite,
        default_result: Value,
    ) -> Value {
        match result {
            ContractValue::Any => default_result,
            ContractValue::Null => self.factory.null(),
            ContractValue::True => self.factory.boolean(true),
            ContractValue::False => self.factory.boolean(false),
            ContractValue::Fail => self.factory.contract_fail(),
            ContractValue::NotNull => match &call.return_type {
                Some(ty) if ty.is_reference() => {
                    self.factory.type_value(ty.clone(), Nullability::NotNull)
                }
                _ => default_result,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nullflow_ir::{Anchor, ClassType, MethodContract, ValueType, VarId, VariableDescriptor};

    fn factory() -> ValueFactory {
        ValueFactory::new(false)
    }

    fn helper() -> CallHelper {
        CallHelper::new(factory())
    }

    fn nullable_var(f: &ValueFactory, id: u32) -> Value {
        f.variable(&VariableDescriptor::new(
            VarId(id),
            "o",
            ValueType::Object(ClassType::new("Object", vec![])),
            Nullability::Nullable,
        ))
    }

    #[test]
    fn pop_order_recovers_the_qualifier() {
        let f = factory();
        let qualifier = nullable_var(&f, 1);
        let mut call = CallSite::opaque(Anchor(1), 2);
        call.named_args = true;
        call.closure_args = 1;

        let mut state = MemoryState::new();
        state.push(qualifier);
        state.push(Value::Unknown); // named bundle
        state.push(f.int(1));
        state.push(f.int(2));
        state.push(Value::Unknown); // closure

        let mut problems = Vec::new();
        let popped = helper()
            .pop_call_arguments(&call, &mut state, &mut problems)
            .unwrap();
        assert_eq!(popped.qualifier, qualifier);
        assert_eq!(popped.params, vec![f.int(1), f.int(2)]);
        assert_eq!(state.stack_depth(), 0);
        assert!(problems.is_empty());
    }

    #[test]
    fn null_argument_to_not_null_parameter_is_reported_and_coerced() {
        let f = factory();
        let arg = nullable_var(&f, 2);
        let mut call = CallSite::opaque(Anchor(7), 1);
        call.args = vec![Nullability::NotNull];

        let mut state = MemoryState::new();
        state.push(Value::Unknown); // qualifier
        state.push(arg);

        let mut problems = Vec::new();
        helper()
            .pop_call_arguments(&call, &mut state, &mut problems)
            .unwrap();
        assert_eq!(
            problems,
            vec![Problem {
                anchor: Anchor(7),
                kind: ProblemKind::PassingNullToNotNullParameter,
            }]
        );
        assert!(state.is_not_null(arg));
    }

    #[test]
    fn nullable_argument_to_unannotated_parameter_is_report_only() {
        let f = factory();
        let arg = nullable_var(&f, 3);
        let call = CallSite::opaque(Anchor(8), 1);

        let mut state = MemoryState::new();
        state.push(Value::Unknown);
        state.push(arg);

        let mut problems = Vec::new();
        helper()
            .pop_call_arguments(&call, &mut state, &mut problems)
            .unwrap();
        assert_eq!(
            problems[0].kind,
            ProblemKind::PassingNullableToUnannotatedParameter
        );
        // no coercion for the weaker report
        assert!(!state.is_not_null(arg));
    }

    #[test]
    fn underflow_surfaces_as_none() {
        let call = CallSite::opaque(Anchor(9), 2);
        let mut state = MemoryState::new();
        state.push(Value::Unknown);
        let mut problems = Vec::new();
        assert!(helper()
            .pop_call_arguments(&call, &mut state, &mut problems)
            .is_none());
    }

    #[test]
    fn constructor_results_are_not_null_and_memoized() {
        let mut call = CallSite::opaque(Anchor(2), 0);
        call.kind = CallKind::Constructor;
        call.return_type = Some(ValueType::Object(ClassType::new("A", vec![])));

        let mut helper = helper();
        assert_eq!(helper.return_nullability(0, &call), Nullability::NotNull);

        // later visits reuse the memoized answer even if the site changed
        call.kind = CallKind::Regular;
        assert_eq!(helper.return_nullability(0, &call), Nullability::NotNull);

        let result = helper.default_result(0, &call);
        assert!(result.as_typed().unwrap().is_not_null());
    }

    #[test]
    fn unannotated_return_follows_the_policy() {
        let mut call = CallSite::opaque(Anchor(3), 0);
        call.return_type = Some(ValueType::string());

        let mut lenient = CallHelper::new(ValueFactory::new(false));
        assert_eq!(lenient.return_nullability(0, &call), Nullability::Unknown);

        let mut strict = CallHelper::new(ValueFactory::new(true));
        assert_eq!(strict.return_nullability(0, &call), Nullability::Nullable);
    }

    #[test]
    fn contradicted_contract_yields_only_the_baseline() {
        let f = factory();
        let mut call = CallSite::opaque(Anchor(4), 1);
        call.contracts = vec![MethodContract::new(
            vec![ContractValue::NotNull],
            ContractValue::Null,
        )];

        // the argument is the null literal, so `arg != null` can never hold
        let successors = helper().add_contract_results(
            &call,
            MemoryState::new(),
            Value::Unknown,
            &[f.null()],
            300,
        );
        assert_eq!(successors.len(), 1);
        assert_eq!(successors[0].peek(), Some(Value::Unknown));
    }

    #[test]
    fn satisfied_contract_forces_the_result() {
        let f = factory();
        let mut call = CallSite::opaque(Anchor(5), 1);
        call.contracts = vec![MethodContract::new(
            vec![ContractValue::Null],
            ContractValue::Fail,
        )];

        let arg = nullable_var(&f, 4);
        let successors =
            helper().add_contract_results(&call, MemoryState::new(), Value::Unknown, &[arg], 300);
        // one state where the argument was null (forced fail), one residual
        assert_eq!(successors.len(), 2);
        assert!(successors
            .iter()
            .any(|s| s.peek().is_some_and(|v| v.is_contract_fail())));
        assert!(successors
            .iter()
            .any(|s| s.peek() == Some(Value::Unknown)));
    }

    #[test]
    fn fork_explosion_falls_back_to_the_baseline() {
        let f = factory();
        let mut call = CallSite::opaque(Anchor(6), 1);
        call.contracts = vec![MethodContract::new(
            vec![ContractValue::Null],
            ContractValue::Null,
        )];

        let arg = nullable_var(&f, 5);
        let successors =
            helper().add_contract_results(&call, MemoryState::new(), Value::Unknown, &[arg], 1);
        assert_eq!(successors.len(), 1);
        assert_eq!(successors[0].peek(), Some(Value::Unknown));
    }
}
