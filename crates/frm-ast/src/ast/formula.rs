//! Formula, section and setting nodes.

use serde::{Deserialize, Serialize};

use super::{Expr, Stmt};
use crate::foundation::Type;

/// Name given to statements that appear before any section header.
pub const NAMELESS_SECTION: &str = "nameless";

/// Name given to the part of a Fractint body after its `:` separator.
pub const NAMELESS_LOOP_SECTION: &str = "nameless_loop";

/// Root of a parsed file: the formulas in source order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Formlist {
    pub formulas: Vec<Formula>,
}

impl Formlist {
    /// Find a formula by id. Exact matches win over case-insensitive ones.
    pub fn get(&self, id: &str) -> Option<&Formula> {
        self.formulas
            .iter()
            .find(|f| f.id == id)
            .or_else(|| self.formulas.iter().find(|f| f.id.eq_ignore_ascii_case(id)))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.formulas.iter().map(|f| f.id.as_str())
    }
}

/// One `name { ... }` block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Formula {
    pub id: String,
    /// Fractint symmetry annotation, e.g. `XAXIS` in `mandel (XAXIS) {`.
    pub symmetry: Option<String>,
    /// Line of the formula header.
    pub pos: usize,
    /// Last source line belonging to this formula, filled in after parse.
    pub last_line: usize,
    pub sections: Vec<Section>,
}

impl Formula {
    pub fn new(id: impl Into<String>, pos: usize) -> Self {
        Self {
            id: id.into(),
            symmetry: None,
            pos,
            last_line: pos,
            sections: Vec::new(),
        }
    }

    /// First section with the given (lowercase) name.
    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name == name)
    }

    /// Syntax errors embedded in this formula.
    pub fn syntax_errors(&self) -> impl Iterator<Item = &SyntaxError> {
        self.sections.iter().filter_map(|s| match &s.body {
            SectionBody::Error(e) => Some(e),
            _ => None,
        })
    }

    /// The source lines `pos..=last_line` of `source`.
    pub fn source_text(&self, source: &str) -> String {
        source
            .lines()
            .skip(self.pos.saturating_sub(1))
            .take((self.last_line + 1).saturating_sub(self.pos))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// A named part of a formula body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    /// Lowercased section name, or [`NAMELESS_SECTION`].
    pub name: String,
    pub pos: usize,
    pub body: SectionBody,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SectionBody {
    Stmts(Vec<Stmt>),
    Settings(Vec<Setting>),
    /// The parser gave up on the rest of this formula here.
    Error(SyntaxError),
}

/// A syntax error captured inside a formula.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntaxError {
    pub line: usize,
    pub message: String,
}

/// An entry of a `default:` (or other settings) section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Setting {
    pub kind: SettingKind,
    pub pos: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SettingKind {
    /// `name = value`
    Set { name: String, value: SetValue },
    /// `[type] param name ... endparam`
    Param {
        ty: Option<Type>,
        name: String,
        settings: Vec<Setting>,
    },
    /// `[type] func name ... endfunc`
    Func {
        ty: Option<Type>,
        name: String,
        settings: Vec<Setting>,
    },
    /// `heading ... endheading`
    Heading { settings: Vec<Setting> },
}

impl Setting {
    pub fn new(kind: SettingKind, pos: usize) -> Self {
        Self { kind, pos }
    }

    /// Find a `name = value` entry in a settings list.
    pub fn find<'a>(settings: &'a [Setting], name: &str) -> Option<&'a SetValue> {
        settings.iter().find_map(|s| match &s.kind {
            SettingKind::Set { name: n, value } if n.eq_ignore_ascii_case(name) => Some(value),
            _ => None,
        })
    }
}

/// Right-hand side of a setting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SetValue {
    Expr(Expr),
    /// One or more adjacent string literals (`enum = "a" "b" "c"`).
    Strings(Vec<String>),
    /// A function reference such as `default = sin()`.
    FuncRef(String),
    /// A bracketed, possibly multi-line list of values.
    List(Vec<Expr>),
}
