use crate::nullability::Nullability;
use crate::types::ValueType;
use serde::{Deserialize, Serialize};

/// Front-end-assigned identity of a variable or qualified-access chain.
///
/// Two descriptors with the same id denote the same source-level place; the
/// engine relies on this for binding and narrowing.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct VarId(pub u32);

/// Everything the engine needs to know about a source-level variable.
///
/// A field access chain like `a.b.c` is a descriptor for `c` whose qualifier
/// is the descriptor for `a.b`, and so on. Inherent nullability is the
/// declaration-level fact and never changes during a run; the engine keeps its
/// own derived facts per memory state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VariableDescriptor {
    pub id: VarId,
    pub name: String,
    pub ty: ValueType,
    pub nullability: Nullability,
    pub qualifier: Option<Box<VariableDescriptor>>,
    pub is_field: bool,
    pub is_volatile: bool,
}

impl VariableDescriptor {
    pub fn new(
        id: VarId,
        name: impl Into<String>,
        ty: ValueType,
        nullability: Nullability,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            ty,
            nullability,
            qualifier: None,
            is_field: false,
            is_volatile: false,
        }
    }

    pub fn field_of(mut self, qualifier: VariableDescriptor) -> Self {
        self.qualifier = Some(Box::new(qualifier));
        self.is_field = true;
        self
    }

    pub fn volatile(mut self) -> Self {
        self.is_volatile = true;
        self
    }
}

/// A literal constant appearing in the instruction stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConstLiteral {
    Null,
    Bool(bool),
    Int(i64),
    Str(String),
}

/// What a `Push` instruction reads: a variable, a literal, a type literal
/// (the right operand of an instance-of check), or something the front end
/// could not resolve.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Place {
    Variable(VariableDescriptor),
    Constant(ConstLiteral),
    Type(ValueType),
    Unknown,
}
