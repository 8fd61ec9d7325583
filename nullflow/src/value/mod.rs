pub mod display;
pub mod factory;

use internment::Intern;
use nullflow_ir::{Nullability, PrimitiveType, ValueType, VarId};

/// An interned literal known to the analysis.
///
/// `ContractFail` is a distinguished sentinel a contract forces as the return
/// value of a call known to throw; it compares equal only to itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConstValue {
    Null,
    Bool(bool),
    Int(i64),
    Str(String),
    ContractFail,
}

impl ConstValue {
    pub fn is_null(&self) -> bool {
        matches!(self, ConstValue::Null)
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            ConstValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConstValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

/// A source-level variable or qualified-access chain.
///
/// The inherent nullability is the declaration-level fact; it never changes
/// during a run. Narrowed facts live in the memory state.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VariableValue {
    pub id: VarId,
    pub name: String,
    pub ty: ValueType,
    pub inherent_nullability: Nullability,
    pub qualifier: Option<Intern<VariableValue>>,
    pub is_field: bool,
    pub is_volatile: bool,
}

impl VariableValue {
    /// Whether this variable's qualifier chain is rooted at `root`, i.e. this
    /// is a field access hanging off `root`.
    pub fn is_qualified_by(&self, root: &VariableValue) -> bool {
        let mut qualifier = self.qualifier;
        while let Some(q) = qualifier {
            if q.id == root.id {
                return true;
            }
            qualifier = q.qualifier;
        }
        false
    }
}

/// "Some unknown instance of this type, known (not) nullable."
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeValue {
    pub ty: ValueType,
    pub nullability: Nullability,
}

impl TypeValue {
    pub fn is_not_null(&self) -> bool {
        self.nullability.is_not_null()
    }
}

/// The binary predicates relation values can express.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum RelationOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    InstanceOf,
}

impl RelationOp {
    /// The complementary operator, when one exists. `InstanceOf` has none;
    /// its negation is carried on the relation's flag instead.
    pub fn negated(self) -> Option<Self> {
        match self {
            RelationOp::Eq => Some(RelationOp::Ne),
            RelationOp::Ne => Some(RelationOp::Eq),
            RelationOp::Lt => Some(RelationOp::Ge),
            RelationOp::Ge => Some(RelationOp::Lt),
            RelationOp::Gt => Some(RelationOp::Le),
            RelationOp::Le => Some(RelationOp::Gt),
            RelationOp::InstanceOf => None,
        }
    }

    /// The operator obtained by swapping the two operands.
    pub fn symmetric(self) -> Option<Self> {
        match self {
            RelationOp::Eq => Some(RelationOp::Eq),
            RelationOp::Ne => Some(RelationOp::Ne),
            RelationOp::Lt => Some(RelationOp::Gt),
            RelationOp::Gt => Some(RelationOp::Lt),
            RelationOp::Le => Some(RelationOp::Ge),
            RelationOp::Ge => Some(RelationOp::Le),
            RelationOp::InstanceOf => None,
        }
    }

    /// Evaluate the relation on two known integers.
    pub fn eval_int(self, left: i64, right: i64) -> Option<bool> {
        match self {
            RelationOp::Eq => Some(left == right),
            RelationOp::Ne => Some(left != right),
            RelationOp::Lt => Some(left < right),
            RelationOp::Le => Some(left <= right),
            RelationOp::Gt => Some(left > right),
            RelationOp::Ge => Some(left >= right),
            RelationOp::InstanceOf => None,
        }
    }
}

/// A binary predicate over two symbolic values, with a negation flag.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RelationValue {
    pub left: Value,
    pub right: Value,
    pub op: RelationOp,
    pub negated: bool,
}

impl RelationValue {
    /// Structural negation: the same predicate with the flag flipped.
    /// Negating twice yields the original interned relation.
    pub fn negated(&self) -> Intern<RelationValue> {
        Intern::new(RelationValue {
            negated: !self.negated,
            ..self.clone()
        })
    }

    /// The effective operator once the negation flag is folded in, plus
    /// whether a residual negation remains (only for instance-of).
    pub fn effective_op(&self) -> (RelationOp, bool) {
        if !self.negated {
            return (self.op, false);
        }
        match self.op.negated() {
            Some(op) => (op, false),
            None => (self.op, true),
        }
    }

    /// Whether either endpoint is the given variable.
    pub fn mentions(&self, id: VarId) -> bool {
        self.left.is_variable(id) || self.right.is_variable(id)
    }

    /// Whether either endpoint is a field-qualified variable.
    pub fn mentions_field(&self) -> bool {
        [self.left, self.right].iter().any(|v| match v {
            Value::Variable(var) => var.is_field,
            _ => false,
        })
    }
}

/// A symbolic value. All payload is interned, so values of the same logical
/// identity are the same instance within a run and identity comparison is
/// valid for equality.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    /// Bottom information: any fact about it is "don't know".
    Unknown,
    Const(Intern<ConstValue>),
    Variable(Intern<VariableValue>),
    Typed(Intern<TypeValue>),
    Relation(Intern<RelationValue>),
}

impl Value {
    pub fn as_const(&self) -> Option<Intern<ConstValue>> {
        match self {
            Value::Const(c) => Some(*c),
            _ => None,
        }
    }

    pub fn as_variable(&self) -> Option<Intern<VariableValue>> {
        match self {
            Value::Variable(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_typed(&self) -> Option<Intern<TypeValue>> {
        match self {
            Value::Typed(t) => Some(*t),
            _ => None,
        }
    }

    fn is_variable(&self, id: VarId) -> bool {
        matches!(self, Value::Variable(v) if v.id == id)
    }

    /// The declared type of the value, when one is known.
    ///
    /// Integer literals are typed as `long` so they compare with any integral
    /// variable; the null literal and the contract-fail sentinel are untyped.
    pub fn value_type(&self) -> Option<ValueType> {
        match self {
            Value::Variable(v) => Some(v.ty.clone()),
            Value::Typed(t) => Some(t.ty.clone()),
            Value::Const(c) => match c.as_ref() {
                ConstValue::Bool(_) => Some(ValueType::Primitive(PrimitiveType::Boolean)),
                ConstValue::Int(_) => Some(ValueType::Primitive(PrimitiveType::Long)),
                ConstValue::Str(_) => Some(ValueType::string()),
                ConstValue::Null | ConstValue::ContractFail => None,
            },
            Value::Unknown | Value::Relation(_) => None,
        }
    }

    pub fn is_null_const(&self) -> bool {
        matches!(self, Value::Const(c) if c.is_null())
    }

    pub fn is_contract_fail(&self) -> bool {
        matches!(self, Value::Const(c) if matches!(c.as_ref(), ConstValue::ContractFail))
    }
}
