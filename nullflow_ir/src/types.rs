use serde::{Deserialize, Serialize};

/// The primitive types the abstract domain distinguishes.
///
/// Integral primitives carry a statically known value range that the engine
/// uses to decide comparisons against out-of-range constants without forking.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrimitiveType {
    Boolean,
    Byte,
    Short,
    Int,
    Long,
    Char,
    Float,
    Double,
}

impl PrimitiveType {
    /// The inclusive value range of an integral primitive.
    ///
    /// `None` for booleans and floating-point types; range narrowing is
    /// skipped for those.
    pub fn range(&self) -> Option<(i64, i64)> {
        match self {
            PrimitiveType::Byte => Some((i8::MIN as i64, i8::MAX as i64)),
            PrimitiveType::Short => Some((i16::MIN as i64, i16::MAX as i64)),
            PrimitiveType::Int => Some((i32::MIN as i64, i32::MAX as i64)),
            PrimitiveType::Long => Some((i64::MIN, i64::MAX)),
            PrimitiveType::Char => Some((0, u16::MAX as i64)),
            PrimitiveType::Boolean | PrimitiveType::Float | PrimitiveType::Double => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        !matches!(self, PrimitiveType::Boolean)
    }
}

/// A reference type as the front end sees it: a name plus the names of all of
/// its ancestors, so assignability can be answered without a type system.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClassType {
    pub name: String,
    pub ancestors: Vec<String>,
}

impl ClassType {
    pub fn new(name: impl Into<String>, ancestors: Vec<String>) -> Self {
        Self {
            name: name.into(),
            ancestors,
        }
    }

    /// The canonical string type, used for concatenation results.
    pub fn string() -> Self {
        Self::new("String", vec!["Object".to_string()])
    }
}

/// A declared type: either a primitive or a reference type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    Primitive(PrimitiveType),
    Object(ClassType),
}

impl ValueType {
    pub fn string() -> Self {
        ValueType::Object(ClassType::string())
    }

    pub fn is_primitive(&self) -> bool {
        matches!(self, ValueType::Primitive(_))
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, ValueType::Object(_))
    }

    pub fn as_primitive(&self) -> Option<PrimitiveType> {
        match self {
            ValueType::Primitive(p) => Some(*p),
            ValueType::Object(_) => None,
        }
    }

    /// Whether a value of type `other` can be used where `self` is expected.
    pub fn is_assignable_from(&self, other: &ValueType) -> bool {
        match (self, other) {
            (ValueType::Primitive(a), ValueType::Primitive(b)) => a == b,
            (ValueType::Object(a), ValueType::Object(b)) => {
                a.name == b.name || b.ancestors.contains(&a.name)
            }
            _ => false,
        }
    }

    /// Whether values of the two types may appear on either side of a
    /// relational operator. Primitively-incompatible operands cannot.
    pub fn can_be_compared_with(&self, other: &ValueType) -> bool {
        match (self, other) {
            (ValueType::Primitive(a), ValueType::Primitive(b)) => {
                a.is_numeric() == b.is_numeric()
            }
            (ValueType::Primitive(_), _) | (_, ValueType::Primitive(_)) => false,
            (ValueType::Object(_), ValueType::Object(_)) => true,
        }
    }
}
