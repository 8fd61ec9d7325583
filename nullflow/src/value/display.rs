use crate::value::{ConstValue, RelationOp, Value};
use std::fmt::{Display, Formatter};

impl Display for ConstValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ConstValue::Null => write!(f, "null"),
            ConstValue::Bool(b) => write!(f, "{b}"),
            ConstValue::Int(v) => write!(f, "{v}"),
            ConstValue::Str(s) => write!(f, "{s:?}"),
            ConstValue::ContractFail => write!(f, "<contract-fail>"),
        }
    }
}

impl Display for RelationOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let symbol = match self {
            RelationOp::Eq => "==",
            RelationOp::Ne => "!=",
            RelationOp::Lt => "<",
            RelationOp::Le => "<=",
            RelationOp::Gt => ">",
            RelationOp::Ge => ">=",
            RelationOp::InstanceOf => "instanceof",
        };
        write!(f, "{symbol}")
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Unknown => write!(f, "?"),
            Value::Const(c) => write!(f, "{}", c.as_ref()),
            Value::Variable(v) => write!(f, "{}", v.name),
            Value::Typed(t) => write!(f, "<{:?} {:?}>", t.ty, t.nullability),
            Value::Relation(r) => {
                if r.negated {
                    write!(f, "!({} {} {})", r.left, r.op, r.right)
                } else {
                    write!(f, "{} {} {}", r.left, r.op, r.right)
                }
            }
        }
    }
}
