//! Structured symbol names and their C spelling.

use std::fmt;

use serde::{Deserialize, Serialize};

/// What kind of storage a symbol names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NameKind {
    /// User variable (`z`, `count`)
    Local,
    /// User-visible parameter (`@bailout`)
    Param,
    /// Predefined variable the runtime provides (`#pixel`)
    Builtin,
    /// Compiler-introduced temporary
    Temp,
}

/// A symbol's identity: the formula scope it belongs to, its kind, and its
/// lowercase base name without sigil.
///
/// Merged formulas keep their own scope prefix (`cf0`, `cf1`, `t0`), so two
/// formulas that both use `count` end up with distinct C names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SymbolName {
    pub prefix: Option<String>,
    pub kind: NameKind,
    pub base: String,
}

impl SymbolName {
    pub fn new(kind: NameKind, base: impl Into<String>, prefix: Option<&str>) -> Self {
        Self {
            prefix: prefix.map(str::to_string),
            kind,
            base: base.into().to_ascii_lowercase(),
        }
    }

    pub fn local(base: impl Into<String>, prefix: Option<&str>) -> Self {
        Self::new(NameKind::Local, base, prefix)
    }

    pub fn param(base: impl Into<String>, prefix: Option<&str>) -> Self {
        Self::new(NameKind::Param, base, prefix)
    }

    /// Builtins are shared by every formula in a compilation unit.
    pub fn builtin(base: impl Into<String>) -> Self {
        Self::new(NameKind::Builtin, base, None)
    }

    pub fn temp(index: usize, prefix: Option<&str>) -> Self {
        Self::new(NameKind::Temp, index.to_string(), prefix)
    }

    /// The same name moved into `prefix`'s scope, unless it is shared.
    pub fn scoped(&self, prefix: &str) -> Self {
        match (self.kind, &self.prefix) {
            (NameKind::Builtin, _) => self.clone(),
            (_, Some(existing)) => Self {
                prefix: Some(format!("{}{}", prefix, existing)),
                ..self.clone()
            },
            (_, None) => Self {
                prefix: Some(prefix.to_string()),
                ..self.clone()
            },
        }
    }

    /// Identifier used for this symbol in generated C.
    pub fn c_name(&self) -> String {
        let prefix = self.prefix.as_deref().unwrap_or("");
        match self.kind {
            NameKind::Local => format!("{}f{}", prefix, self.base),
            NameKind::Param => format!("t__a_{}{}", prefix, self.base),
            NameKind::Builtin => format!("t__h_{}", self.base),
            NameKind::Temp => format!("t__{}tmp{}", prefix, self.base),
        }
    }
}

impl fmt::Display for SymbolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.c_name())
    }
}
