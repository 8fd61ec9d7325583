use serde::{Deserialize, Serialize};

/// Declaration-level nullability of a variable, parameter, or return value.
///
/// `Unknown` means the front end found no annotation; whether such members are
/// treated as nullable is an engine-side policy decision.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Nullability {
    NotNull,
    Nullable,
    Unknown,
}

impl Nullability {
    pub fn is_not_null(&self) -> bool {
        matches!(self, Nullability::NotNull)
    }

    pub fn is_nullable(&self) -> bool {
        matches!(self, Nullability::Nullable)
    }
}
