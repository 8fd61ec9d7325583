use crate::value::{ConstValue, RelationOp, RelationValue, TypeValue, Value, VariableValue};
use internment::Intern;
use nullflow_ir::{ConstLiteral, Nullability, Place, ValueType, VariableDescriptor};

/// Canonical constructor for symbolic values.
///
/// Repeated calls with structurally equal payload return the identical
/// interned instance, so value identity comparison is valid for equality.
/// One factory is created per analysis run; it carries the run's nullability
/// policy but no mutable state, so cloning it is cheap.
#[derive(Debug, Clone)]
pub struct ValueFactory {
    unknown_members_nullable: bool,
}

impl ValueFactory {
    /// `unknown_members_nullable` is the policy for members lacking explicit
    /// nullability annotations: when set, unknown-declared nullability is
    /// treated as nullable.
    pub fn new(unknown_members_nullable: bool) -> Self {
        Self {
            unknown_members_nullable,
        }
    }

    pub fn unknown_members_nullable(&self) -> bool {
        self.unknown_members_nullable
    }

    pub fn constant(&self, value: ConstValue) -> Value {
        Value::Const(Intern::new(value))
    }

    pub fn boolean(&self, value: bool) -> Value {
        self.constant(ConstValue::Bool(value))
    }

    pub fn int(&self, value: i64) -> Value {
        self.constant(ConstValue::Int(value))
    }

    pub fn null(&self) -> Value {
        self.constant(ConstValue::Null)
    }

    /// The sentinel a contract forces as the result of a call known to fail.
    pub fn contract_fail(&self) -> Value {
        self.constant(ConstValue::ContractFail)
    }

    pub fn variable(&self, descriptor: &VariableDescriptor) -> Value {
        Value::Variable(self.intern_variable(descriptor))
    }

    fn intern_variable(&self, descriptor: &VariableDescriptor) -> Intern<VariableValue> {
        let qualifier = descriptor
            .qualifier
            .as_deref()
            .map(|q| self.intern_variable(q));
        Intern::new(VariableValue {
            id: descriptor.id,
            name: descriptor.name.clone(),
            ty: descriptor.ty.clone(),
            inherent_nullability: descriptor.nullability,
            qualifier,
            is_field: descriptor.is_field,
            is_volatile: descriptor.is_volatile,
        })
    }

    /// A "some instance of this type" value. Unknown nullability collapses to
    /// nullable under the factory's policy flag.
    pub fn type_value(&self, ty: ValueType, nullability: Nullability) -> Value {
        let nullability = match nullability {
            Nullability::Unknown if self.unknown_members_nullable => Nullability::Nullable,
            other => other,
        };
        Value::Typed(Intern::new(TypeValue { ty, nullability }))
    }

    /// The result of string concatenation: a fresh non-null string.
    pub fn non_null_string(&self) -> Value {
        Value::Typed(Intern::new(TypeValue {
            ty: ValueType::string(),
            nullability: Nullability::NotNull,
        }))
    }

    /// Build a relation value, canonicalizing constants to the right-hand
    /// side. Returns `None` when the operands are not comparable, e.g.
    /// primitively-incompatible types or a primitive against null.
    pub fn relation(
        &self,
        left: Value,
        right: Value,
        op: RelationOp,
        negated: bool,
    ) -> Option<Value> {
        if left.as_const().is_some() && right.as_variable().is_some() {
            if let Some(symmetric) = op.symmetric() {
                return self.relation(right, left, symmetric, negated);
            }
        }
        if !Self::comparable(&left, &right, op) {
            return None;
        }
        Some(Value::Relation(Intern::new(RelationValue {
            left,
            right,
            op,
            negated,
        })))
    }

    fn comparable(left: &Value, right: &Value, op: RelationOp) -> bool {
        if op == RelationOp::InstanceOf {
            // The target of an instance-of check must be a reference type.
            return match right.as_typed() {
                Some(target) => {
                    target.ty.is_reference()
                        && !left.value_type().is_some_and(|ty| ty.is_primitive())
                }
                None => false,
            };
        }
        if left.is_null_const() || right.is_null_const() {
            let other = if left.is_null_const() { right } else { left };
            return !other.value_type().is_some_and(|ty| ty.is_primitive());
        }
        match (left.value_type(), right.value_type()) {
            (Some(a), Some(b)) => a.can_be_compared_with(&b),
            _ => true,
        }
    }

    /// The symbolic value for a place read by a push instruction.
    pub fn value_for_place(&self, place: &Place) -> Value {
        match place {
            Place::Variable(descriptor) => self.variable(descriptor),
            Place::Constant(literal) => self.constant(Self::literal(literal)),
            // a type literal is itself never null
            Place::Type(ty) => self.type_value(ty.clone(), Nullability::NotNull),
            Place::Unknown => Value::Unknown,
        }
    }

    fn literal(literal: &ConstLiteral) -> ConstValue {
        match literal {
            ConstLiteral::Null => ConstValue::Null,
            ConstLiteral::Bool(b) => ConstValue::Bool(*b),
            ConstLiteral::Int(v) => ConstValue::Int(*v),
            ConstLiteral::Str(s) => ConstValue::Str(s.clone()),
        }
    }

    /// The value left on the stack after unboxing. Constants survive;
    /// everything else collapses to unknown, since no primitive twin is
    /// tracked per boxed value.
    pub fn unboxed(&self, value: Value) -> Value {
        match value {
            Value::Const(_) => value,
            _ => Value::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nullflow_ir::{PrimitiveType, VarId};

    fn factory() -> ValueFactory {
        ValueFactory::new(false)
    }

    fn int_var(id: u32) -> Value {
        factory().variable(&VariableDescriptor::new(
            VarId(id),
            "n",
            ValueType::Primitive(PrimitiveType::Int),
            Nullability::Unknown,
        ))
    }

    #[test]
    fn constants_are_deduplicated() {
        let f = factory();
        assert_eq!(f.int(5), f.int(5));
        assert_eq!(f.null(), f.null());
        assert_ne!(f.int(5), f.int(6));
    }

    #[test]
    fn constant_on_the_left_is_rewritten_symmetrically() {
        let f = factory();
        let rel = f
            .relation(f.int(3), int_var(1), RelationOp::Lt, false)
            .unwrap();
        let Value::Relation(rel) = rel else {
            panic!("expected a relation");
        };
        assert_eq!(rel.op, RelationOp::Gt);
        assert_eq!(rel.left, int_var(1));
        assert_eq!(rel.right, f.int(3));
    }

    #[test]
    fn incomparable_operands_produce_no_relation() {
        let f = factory();
        let flag = f.variable(&VariableDescriptor::new(
            VarId(9),
            "flag",
            ValueType::Primitive(PrimitiveType::Boolean),
            Nullability::Unknown,
        ));
        assert!(f.relation(flag, f.int(1), RelationOp::Eq, false).is_none());
        assert!(f.relation(int_var(1), f.null(), RelationOp::Eq, false).is_none());
    }

    #[test]
    fn policy_flag_collapses_unknown_to_nullable() {
        let strict = ValueFactory::new(true);
        let value = strict.type_value(ValueType::string(), Nullability::Unknown);
        assert_eq!(
            value.as_typed().unwrap().nullability,
            Nullability::Nullable
        );
    }
}
