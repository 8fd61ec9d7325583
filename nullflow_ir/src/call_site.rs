use crate::contract::MethodContract;
use crate::instruction::Anchor;
use crate::nullability::Nullability;
use crate::types::ValueType;
use serde::{Deserialize, Serialize};

/// What kind of call a [`CallSite`] is. Unboxing calls report a different
/// problem kind when the qualifier may be null.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CallKind {
    Regular,
    Constructor,
    Unboxing,
}

/// Read-only facts about a method call, supplied by the front end.
///
/// The engine treats these as opaque: it never resolves methods itself. The
/// call pushes, in order, the qualifier, the named-argument bundle (if any),
/// the positional arguments, and finally any deferred closure arguments; the
/// engine pops them in reverse.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallSite {
    pub anchor: Anchor,
    /// Required nullability of each positional argument, in source order.
    pub args: Vec<Nullability>,
    /// Number of deferred closure-style arguments pushed after the positional
    /// ones.
    pub closure_args: usize,
    /// Whether a named-argument bundle was pushed before the positional
    /// arguments.
    pub named_args: bool,
    /// Declared parameter count of the resolved target, if any.
    pub param_count: usize,
    /// Whether extra arguments are spread into a vararg tail.
    pub vararg_call: bool,
    pub contracts: Vec<MethodContract>,
    pub kind: CallKind,
    pub return_type: Option<ValueType>,
    /// Explicit nullability annotation on the return value.
    pub return_annotation: Option<Nullability>,
    /// Annotation delegated from the backing property when the target is an
    /// accessor method.
    pub accessor_annotation: Option<Nullability>,
    /// Whether the call is opaque to the analysis and all field bindings must
    /// be invalidated after it.
    pub flushes_fields: bool,
}

impl CallSite {
    /// A call about which nothing is known beyond its argument count.
    pub fn opaque(anchor: Anchor, args: usize) -> Self {
        Self {
            anchor,
            args: vec![Nullability::Unknown; args],
            closure_args: 0,
            named_args: false,
            param_count: args,
            vararg_call: false,
            contracts: vec![],
            kind: CallKind::Regular,
            return_type: None,
            return_annotation: None,
            accessor_annotation: None,
            flushes_fields: true,
        }
    }
}
