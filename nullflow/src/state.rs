use crate::value::{ConstValue, RelationOp, RelationValue, Value, VariableValue};
use internment::Intern;
use nullflow_ir::{Nullability, VarId};
use std::collections::BTreeMap;

/// Statically decide a comparison of a value confined to `[min, max]` against
/// the constant `compared`. `None` means the outcome depends on the runtime
/// value.
pub(crate) fn range_comparison(
    op: RelationOp,
    compared: i64,
    min: i64,
    max: i64,
) -> Option<bool> {
    if compared < min || compared > max {
        match op {
            RelationOp::Eq => return Some(false),
            RelationOp::Ne => return Some(true),
            _ => {}
        }
    }
    match op {
        RelationOp::Lt => {
            if compared <= min {
                Some(false)
            } else if compared > max {
                Some(true)
            } else {
                None
            }
        }
        RelationOp::Le => {
            if compared < min {
                Some(false)
            } else if compared >= max {
                Some(true)
            } else {
                None
            }
        }
        RelationOp::Gt => {
            if compared >= max {
                Some(false)
            } else if compared < min {
                Some(true)
            } else {
                None
            }
        }
        RelationOp::Ge => {
            if compared > max {
                Some(false)
            } else if compared <= min {
                Some(true)
            } else {
                None
            }
        }
        RelationOp::Eq | RelationOp::Ne | RelationOp::InstanceOf => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Binding {
    var: Intern<VariableValue>,
    value: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Fact {
    var: Intern<VariableValue>,
    nullability: Nullability,
}

/// The abstract state of one explored path: an operand stack plus everything
/// the run has learned about variables so far.
///
/// States are forked by cloning; the clones share no mutable substructure.
/// Structural equality and hashing make states usable as worklist
/// canonicalization keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct MemoryState {
    stack: Vec<Value>,
    bindings: BTreeMap<VarId, Binding>,
    facts: BTreeMap<VarId, Fact>,
    /// Conditions applied on this path, normalized, for contradiction checks.
    relations: Vec<Intern<RelationValue>>,
}

impl MemoryState {
    pub fn new() -> Self {
        Self::default()
    }

    /// An independent deep copy; mutation of either side never affects the
    /// other. Stack depth is preserved.
    pub fn create_copy(&self) -> Self {
        self.clone()
    }

    pub fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    /// `None` signals stack underflow: a malformed instruction stream, which
    /// the visitor escalates as an internal error.
    pub fn pop(&mut self) -> Option<Value> {
        self.stack.pop()
    }

    pub fn peek(&self) -> Option<Value> {
        self.stack.last().copied()
    }

    pub fn stack_depth(&self) -> usize {
        self.stack.len()
    }

    /// Bind a variable to a new value, as an assignment does. Previous
    /// narrowing of the variable no longer holds and is dropped.
    pub fn set_var_value(&mut self, var: Intern<VariableValue>, value: Value) {
        self.relations.retain(|r| !r.mentions(var.id));
        self.facts.remove(&var.id);
        let derived = if self.value_is_not_null(value) {
            Nullability::NotNull
        } else if value.is_null_const() {
            Nullability::Nullable
        } else if let Some(t) = value.as_typed() {
            t.nullability
        } else {
            Nullability::Unknown
        };
        if derived != Nullability::Unknown {
            self.set_nullability_fact(var, derived);
        }
        self.bindings.insert(var.id, Binding { var, value });
    }

    /// Record a derived nullability fact, overriding the variable's inherent
    /// one for the rest of this path.
    pub fn set_nullability_fact(&mut self, var: Intern<VariableValue>, nullability: Nullability) {
        self.facts.insert(var.id, Fact { var, nullability });
    }

    fn nullability_of(&self, var: Intern<VariableValue>) -> Nullability {
        self.facts
            .get(&var.id)
            .map(|f| f.nullability)
            .unwrap_or(var.inherent_nullability)
    }

    /// The constant a variable is currently bound to, if any. Follows chains
    /// of variable-to-variable bindings.
    pub fn get_constant(&self, var: Intern<VariableValue>) -> Option<Intern<ConstValue>> {
        let mut current = var;
        for _ in 0..8 {
            match self.bindings.get(&current.id).map(|b| b.value)? {
                Value::Const(c) => return Some(c),
                Value::Variable(next) => current = next,
                _ => return None,
            }
        }
        None
    }

    pub fn is_not_null(&self, value: Value) -> bool {
        self.value_is_not_null(value)
    }

    fn value_is_not_null(&self, value: Value) -> bool {
        self.not_null_within(value, 8)
    }

    // Bounded because variable-to-variable bindings can form chains.
    fn not_null_within(&self, value: Value, depth: u8) -> bool {
        match value {
            Value::Const(c) => !c.is_null(),
            Value::Typed(t) => t.is_not_null(),
            Value::Variable(var) => {
                if self.nullability_of(var) == Nullability::NotNull {
                    return true;
                }
                if depth == 0 {
                    return false;
                }
                match self.bindings.get(&var.id).map(|b| b.value) {
                    Some(bound) if bound != value => self.not_null_within(bound, depth - 1),
                    _ => false,
                }
            }
            Value::Unknown | Value::Relation(_) => false,
        }
    }

    pub fn is_null(&self, value: Value) -> bool {
        match value {
            Value::Const(c) => c.is_null(),
            Value::Variable(var) => self
                .get_constant(var)
                .is_some_and(|c| c.is_null()),
            _ => false,
        }
    }

    /// True means the value is *not* provably non-null where non-null is
    /// required: a violation candidate. Unknown values stay silent.
    pub fn check_not_nullable(&self, value: Value) -> bool {
        match value {
            Value::Const(c) => c.is_null(),
            Value::Typed(t) => t.nullability.is_nullable(),
            Value::Variable(var) => {
                !self.value_is_not_null(value) && self.nullability_of(var).is_nullable()
            }
            Value::Unknown | Value::Relation(_) => false,
        }
    }

    /// Invalidate everything known about field-qualified variables.
    /// Conservative handling of calls with unknown side effects.
    pub fn flush_fields(&mut self) {
        self.bindings.retain(|_, b| !b.var.is_field);
        self.facts.retain(|_, f| !f.var.is_field);
        self.relations.retain(|r| !r.mentions_field());
    }

    fn record_relation(&mut self, relation: Intern<RelationValue>) {
        if !self.relations.contains(&relation) {
            self.relations.push(relation);
        }
    }

    fn normalized(relation: &RelationValue, op: RelationOp, negated: bool) -> Intern<RelationValue> {
        Intern::new(RelationValue {
            left: relation.left,
            right: relation.right,
            op,
            negated,
        })
    }

    /// Narrow the state so the relation holds. Returns `false` when the
    /// relation is provably unsatisfiable here, meaning the branch is dead;
    /// the state must then be discarded.
    pub fn apply_condition(&mut self, relation: Intern<RelationValue>) -> bool {
        let (op, negated_instance_of) = relation.effective_op();
        if op == RelationOp::InstanceOf {
            return self.apply_instance_of(&relation, negated_instance_of);
        }
        let normalized = Self::normalized(&relation, op, false);
        if self.relations.contains(&normalized) {
            return true;
        }
        if let Some(complement) = op.negated() {
            if self
                .relations
                .contains(&Self::normalized(&relation, complement, false))
            {
                return false;
            }
        }

        let left = normalized.left;
        let right = normalized.right;

        if let (Some(lc), Some(rc)) = (left.as_const(), right.as_const()) {
            return Self::eval_const_relation(lc, rc, op);
        }
        if let (Some(var), Some(c)) = (left.as_variable(), right.as_const()) {
            return self.apply_var_const(normalized, var, c, op);
        }
        if let (Some(c), Some(var)) = (left.as_const(), right.as_variable()) {
            if let Some(symmetric) = op.symmetric() {
                let flipped = Intern::new(RelationValue {
                    left: right,
                    right: left,
                    op: symmetric,
                    negated: false,
                });
                return self.apply_var_const(flipped, var, c, symmetric);
            }
        }
        if let (Some(t), true) = (left.as_typed(), right.is_null_const()) {
            match op {
                RelationOp::Eq => return !t.is_not_null(),
                RelationOp::Ne => return true,
                _ => {}
            }
        }

        self.record_relation(normalized);
        true
    }

    fn eval_const_relation(
        left: Intern<ConstValue>,
        right: Intern<ConstValue>,
        op: RelationOp,
    ) -> bool {
        if let (Some(a), Some(b)) = (left.as_int(), right.as_int()) {
            if let Some(outcome) = op.eval_int(a, b) {
                return outcome;
            }
        }
        // Interning makes structural equality identity; the contract-fail
        // sentinel is equal only to itself.
        match op {
            RelationOp::Eq => left == right,
            RelationOp::Ne => left != right,
            _ => true,
        }
    }

    fn apply_var_const(
        &mut self,
        normalized: Intern<RelationValue>,
        var: Intern<VariableValue>,
        constant: Intern<ConstValue>,
        op: RelationOp,
    ) -> bool {
        if constant.is_null() {
            return match op {
                RelationOp::Eq => {
                    if self.value_is_not_null(Value::Variable(var)) {
                        false
                    } else {
                        self.set_nullability_fact(var, Nullability::Nullable);
                        self.bindings.insert(
                            var.id,
                            Binding {
                                var,
                                value: Value::Const(constant),
                            },
                        );
                        true
                    }
                }
                RelationOp::Ne => {
                    if self.is_null(Value::Variable(var)) {
                        false
                    } else {
                        if !self.value_is_not_null(Value::Variable(var)) {
                            self.set_nullability_fact(var, Nullability::NotNull);
                        }
                        true
                    }
                }
                _ => {
                    self.record_relation(normalized);
                    true
                }
            };
        }

        if let Some(known) = self.get_constant(var) {
            return Self::eval_const_relation(known, constant, op);
        }

        // No known value: the declared primitive range may still decide it.
        if let Some(compared) = constant.as_int() {
            if let Some((min, max)) = var.ty.as_primitive().and_then(|p| p.range()) {
                if let Some(outcome) = range_comparison(op, compared, min, max) {
                    return outcome;
                }
            }
        }

        match op {
            RelationOp::Eq => {
                // Learning an exact value is a binding, not a relation.
                self.bindings.insert(
                    var.id,
                    Binding {
                        var,
                        value: Value::Const(constant),
                    },
                );
                true
            }
            _ => {
                self.record_relation(normalized);
                true
            }
        }
    }

    fn apply_instance_of(&mut self, relation: &RelationValue, negated: bool) -> bool {
        let left = relation.left;
        let Some(target) = relation.right.as_typed() else {
            return true;
        };
        let left_type = left.value_type();
        if !negated {
            // `null instanceof T` is false for every T.
            if self.is_null(left) {
                return false;
            }
            if let Some(lt) = &left_type {
                let compatible =
                    target.ty.is_assignable_from(lt) || lt.is_assignable_from(&target.ty);
                if !compatible {
                    return false;
                }
            }
            // Passing the check implies the value was not null.
            if let Some(var) = left.as_variable() {
                self.set_nullability_fact(var, Nullability::NotNull);
            }
            self.record_relation(Self::normalized(relation, RelationOp::InstanceOf, false));
            true
        } else {
            if self.is_null(left) {
                return true;
            }
            if let Some(lt) = &left_type {
                if target.ty.is_assignable_from(lt) && self.value_is_not_null(left) {
                    return false;
                }
            }
            self.record_relation(Self::normalized(relation, RelationOp::InstanceOf, true));
            true
        }
    }

    /// Cast flavor of instance-of: a possibly-null value always passes, since
    /// casting null succeeds at runtime.
    pub fn apply_instanceof_or_null(&mut self, relation: Intern<RelationValue>) -> bool {
        let left = relation.left;
        if self.is_null(left) {
            return true;
        }
        let Some(target) = relation.right.as_typed() else {
            return true;
        };
        match left.value_type() {
            Some(lt) => {
                let compatible =
                    target.ty.is_assignable_from(&lt) || lt.is_assignable_from(&target.ty);
                compatible || !self.value_is_not_null(left)
            }
            None => true,
        }
    }
}
