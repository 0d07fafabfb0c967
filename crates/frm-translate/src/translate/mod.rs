//! Formula AST to IR translation.
//!
//! One [`translate`] call turns a parsed formula into a [`TranslatedFormula`]:
//! a symbol table, one IR tree per executable section, parameter metadata,
//! and every diagnostic found along the way. Translation keeps going after
//! errors, so a broken formula reports everything that is wrong with it.
//!
//! The formula kind decides which sections are meaningful and which standard
//! parameters are injected:
//!
//! - `Fractal` gets `@_gradient` and a bailout test
//! - `ColorFunc` gets `@_density`, `@_offset` and the `@_transfer` function,
//!   applied to every gradient lookup and to the final `#index`
//! - `Transform` runs a `transform` section on the pixel
//! - `GradientFunc` only records its settings

mod colorfunc;
mod defaults;
mod expr;
mod stmt;

pub use defaults::{FuncInfo, MetaValue, ParamInfo, const_eval};

use frm_ast::{Formula, NAMELESS_LOOP_SECTION, NAMELESS_SECTION, SectionBody, Stmt, Value};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ErrorKind, TranslateError};
use crate::ir::{Label, Stm};
use crate::symbol::SymbolTable;

/// C name of the flag the bailout section sets.
pub const BAILOUT_VAR: &str = "t__h_bailout";

/// Executable sections in the order the generated code runs them.
pub const SECTION_ORDER: &[&str] = &["global", "transform", "init", "loop", "bailout", "final"];

/// What role a formula plays in a compilation unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FormulaKind {
    Fractal,
    ColorFunc,
    Transform,
    GradientFunc,
}

impl FormulaKind {
    /// Sections this kind of formula executes.
    pub fn sections(self) -> &'static [&'static str] {
        match self {
            FormulaKind::Fractal => &["global", "init", "loop", "bailout", "final"],
            FormulaKind::ColorFunc => &["global", "init", "loop", "final"],
            FormulaKind::Transform => &["global", "transform"],
            FormulaKind::GradientFunc => &[],
        }
    }
}

/// Per-compile choices that are not part of the formula source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslateOptions {
    /// Function parameter selections overriding the formula's defaults,
    /// keyed by lowercase name without `@` (`fn1` -> `cos`).
    pub func_overrides: IndexMap<String, String>,
}

/// Result of translating one formula, possibly merged with others.
#[derive(Debug, Clone, PartialEq)]
pub struct TranslatedFormula {
    pub id: String,
    pub kind: FormulaKind,
    /// Scope prefix of this formula's names.
    pub prefix: Option<String>,
    pub symbols: SymbolTable,
    /// IR per section; merged sections are keyed `<prefix>_<section>`.
    pub sections: IndexMap<String, Stm>,
    /// Settings per settings section (`default`, `gradient`, ...).
    pub metadata: IndexMap<String, Vec<(String, MetaValue)>>,
    pub params: IndexMap<String, ParamInfo>,
    pub funcs: IndexMap<String, FuncInfo>,
    pub diagnostics: Vec<TranslateError>,
}

impl TranslatedFormula {
    /// Error messages in the order they were found.
    pub fn errors(&self) -> Vec<String> {
        self.diagnostics
            .iter()
            .filter(|d| d.is_error())
            .map(ToString::to_string)
            .collect()
    }

    /// Warning messages in the order they were found.
    pub fn warnings(&self) -> Vec<String> {
        self.diagnostics
            .iter()
            .filter(|d| !d.is_error())
            .map(ToString::to_string)
            .collect()
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(TranslateError::is_error)
    }

    /// Default value of every parameter slot, in slot order.
    pub fn default_params(&self) -> Vec<Value> {
        self.symbols.default_params()
    }

    /// A `default:` section setting such as `title` or `maxiter`.
    pub fn setting(&self, name: &str) -> Option<&MetaValue> {
        self.metadata
            .get("default")?
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    }

    /// Fold another translated formula into this compilation unit.
    ///
    /// `other` must have been translated with scope `prefix` so its names
    /// cannot clash with ours. Its sections are appended as
    /// `<prefix>_<section>` and its parameters take the next free slots.
    pub fn merge(&mut self, other: &TranslatedFormula, prefix: &str) {
        if other.prefix.as_deref() != Some(prefix) {
            self.diagnostics.push(TranslateError::internal(
                0,
                format!(
                    "formula '{}' translated with scope {:?} merged as '{}'",
                    other.id, other.prefix, prefix
                ),
            ));
        }
        self.symbols.merge(&other.symbols, prefix);
        for (name, stm) in &other.sections {
            self.sections
                .insert(format!("{}_{}", prefix, name), stm.clone());
        }
        for (name, info) in &other.params {
            self.params
                .insert(format!("{}:{}", prefix, name), info.clone());
        }
        for (name, info) in &other.funcs {
            self.funcs.insert(format!("{}:{}", prefix, name), info.clone());
        }
        self.diagnostics.extend(other.diagnostics.iter().cloned());
    }
}

/// Translate one formula.
///
/// # Parameters
///
/// * `formula` - Parsed formula
/// * `kind` - Role of the formula
/// * `prefix` - Scope for its names; `None` for the main formula
/// * `options` - Function parameter overrides
///
/// # Returns
///
/// The translated formula. Check [`TranslatedFormula::has_errors`] before
/// generating code from it.
pub fn translate(
    formula: &Formula,
    kind: FormulaKind,
    prefix: Option<&str>,
    options: &TranslateOptions,
) -> TranslatedFormula {
    let mut translator = Translator::new(kind, prefix, options);
    translator.run(formula);
    debug!(
        formula = %formula.id,
        ?kind,
        errors = translator.diagnostics.iter().filter(|d| d.is_error()).count(),
        "translated"
    );
    TranslatedFormula {
        id: formula.id.clone(),
        kind,
        prefix: prefix.map(str::to_string),
        symbols: translator.symbols,
        sections: translator.sections,
        metadata: translator.metadata,
        params: translator.params,
        funcs: translator.funcs,
        diagnostics: translator.diagnostics,
    }
}

pub(crate) struct Translator<'o> {
    kind: FormulaKind,
    options: &'o TranslateOptions,
    symbols: SymbolTable,
    sections: IndexMap<String, Stm>,
    metadata: IndexMap<String, Vec<(String, MetaValue)>>,
    params: IndexMap<String, ParamInfo>,
    funcs: IndexMap<String, FuncInfo>,
    diagnostics: Vec<TranslateError>,
    labels: usize,
}

impl<'o> Translator<'o> {
    fn new(kind: FormulaKind, prefix: Option<&str>, options: &'o TranslateOptions) -> Self {
        Self {
            kind,
            options,
            symbols: SymbolTable::new(prefix),
            sections: IndexMap::new(),
            metadata: IndexMap::new(),
            params: IndexMap::new(),
            funcs: IndexMap::new(),
            diagnostics: Vec::new(),
            labels: 0,
        }
    }

    fn run(&mut self, formula: &Formula) {
        for err in formula.syntax_errors() {
            self.diagnostics.push(TranslateError::new(
                ErrorKind::Syntax,
                err.line,
                err.message.clone(),
            ));
        }

        self.inject_standard_params(formula.pos);

        for section in &formula.sections {
            if let SectionBody::Settings(settings) = &section.body {
                if section.name == "default" {
                    self.default_section(settings);
                } else {
                    self.record_settings(&section.name, settings);
                }
            }
        }

        if self.kind == FormulaKind::GradientFunc {
            return;
        }

        let sources = self.statement_sections(formula);
        for (name, (_, pos)) in &sources {
            if !self.kind.sections().contains(name) {
                self.diagnostics.push(TranslateError::warning(
                    ErrorKind::AmbiguousSection,
                    *pos,
                    format!("section '{}' is ignored in this kind of formula", name),
                ));
            }
        }

        for name in SECTION_ORDER {
            if !self.kind.sections().contains(name) {
                continue;
            }
            let ir = match (sources.get(name), *name) {
                (Some((stmts, pos)), "bailout") => self.bailout_section(stmts, *pos),
                (Some((stmts, _)), _) => Stm::Seq(self.stmt_list(stmts)),
                (None, "bailout") => {
                    self.diagnostics.push(TranslateError::warning(
                        ErrorKind::MissingBailout,
                        formula.pos,
                        "No bailout condition specified",
                    ));
                    continue;
                }
                (None, _) => continue,
            };
            self.sections.insert(name.to_string(), ir);
        }

        if self.kind == FormulaKind::ColorFunc {
            self.finish_color_index(formula.pos);
        }
    }

    /// Map section names to statements, reinterpreting a legacy body.
    ///
    /// A legacy body's last statement is the bailout test and the rest is
    /// the loop; a Fractint `:` puts everything before it in init. Explicit
    /// sections win over the legacy reading, with a warning.
    fn statement_sections<'f>(
        &mut self,
        formula: &'f Formula,
    ) -> IndexMap<&'static str, (&'f [Stmt], usize)> {
        let mut explicit: IndexMap<&'static str, (&'f [Stmt], usize)> = IndexMap::new();
        let mut nameless: Option<(&'f [Stmt], usize)> = None;
        let mut nameless_loop: Option<(&'f [Stmt], usize)> = None;

        for section in &formula.sections {
            let SectionBody::Stmts(stmts) = &section.body else {
                continue;
            };
            let entry = (stmts.as_slice(), section.pos);
            match section.name.as_str() {
                NAMELESS_SECTION => nameless = Some(entry),
                NAMELESS_LOOP_SECTION => nameless_loop = Some(entry),
                name => {
                    if let Some(known) = SECTION_ORDER.iter().find(|s| **s == name) {
                        explicit.insert(*known, entry);
                    }
                }
            }
        }

        let mut legacy: Vec<(&'static str, (&'f [Stmt], usize))> = Vec::new();
        match self.kind {
            FormulaKind::Fractal => {
                let (init, iterated) = match (nameless, nameless_loop) {
                    (Some(init), Some(iterated)) => (Some(init), Some(iterated)),
                    (iterated, None) => (None, iterated),
                    (None, Some(iterated)) => (None, Some(iterated)),
                };
                if let Some(init) = init {
                    legacy.push(("init", init));
                }
                if let Some((stmts, pos)) = iterated {
                    if let Some((last, rest)) = stmts.split_last() {
                        legacy.push(("loop", (rest, pos)));
                        legacy.push(("bailout", (std::slice::from_ref(last), last.pos)));
                    }
                }
            }
            FormulaKind::ColorFunc => {
                if let Some(body) = nameless {
                    legacy.push(("final", body));
                }
            }
            FormulaKind::Transform => {
                if let Some(body) = nameless {
                    legacy.push(("transform", body));
                }
            }
            FormulaKind::GradientFunc => {}
        }

        for (name, entry) in legacy {
            if explicit.contains_key(name) {
                self.diagnostics.push(TranslateError::warning(
                    ErrorKind::AmbiguousSection,
                    entry.1,
                    format!(
                        "formula has both an unnamed section and an explicit '{}' section; using '{}'",
                        name, name
                    ),
                ));
            } else {
                explicit.insert(name, entry);
            }
        }
        explicit
    }

    fn new_label(&mut self) -> Label {
        let label = Label::new(format!(
            "t__{}label{}",
            self.symbols.prefix().unwrap_or(""),
            self.labels
        ));
        self.labels += 1;
        label
    }
}
