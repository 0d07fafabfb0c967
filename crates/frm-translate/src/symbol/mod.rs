//! Symbol table for one formula (or a merged compilation unit).
//!
//! Keys are lowercase and keep their sigil: `z`, `@bailout`, `#pixel`.
//! Lookups follow aliases, so `pixel`, `#pixel` and `PIXEL` name the same
//! variable. Standard library names can never be redefined.
//!
//! Parameters get their slot the first time they are inserted, in insertion
//! order, each taking as many consecutive slots as its type is wide.

mod name;
mod stdlib;

pub use name::{NameKind, SymbolName};
pub use stdlib::{Func, StdLib, TYPE_CONSTRUCTORS, stdlib};

use frm_ast::{Type, Value};
use indexmap::IndexMap;
use tracing::trace;

use crate::error::{ErrorKind, Result, TranslateError};

/// A variable, parameter, builtin or temporary.
#[derive(Debug, Clone, PartialEq)]
pub struct Var {
    pub name: SymbolName,
    pub ty: Type,
    /// Initial value; the default for parameters.
    pub value: Value,
    pub line: usize,
    /// First parameter slot, for parameters that occupy any.
    pub slot: Option<usize>,
    /// Explicitly declared rather than created on first use.
    pub declared: bool,
    /// Array dimensions, empty for non-arrays.
    pub dims: Vec<usize>,
    /// Enumerated values of an `enum` parameter.
    pub enum_values: Vec<String>,
}

impl Var {
    pub fn new(name: SymbolName, ty: Type, line: usize) -> Self {
        Self {
            name,
            ty,
            value: ty.default_value(),
            line,
            slot: None,
            declared: false,
            dims: Vec::new(),
            enum_values: Vec::new(),
        }
    }

    pub fn with_value(mut self, value: Value) -> Self {
        self.value = value;
        self
    }

    pub fn c_name(&self) -> String {
        self.name.c_name()
    }

    pub fn is_param(&self) -> bool {
        self.name.kind == NameKind::Param
    }
}

/// A function-valued parameter (`func fn1 ... endfunc`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuncParam {
    pub name: SymbolName,
    /// Standard library function currently selected.
    pub function: String,
    /// Declared return type, if any.
    pub ty: Option<Type>,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Symbol {
    Var(Var),
    FuncParam(FuncParam),
    /// Another key this one stands for.
    Alias(String),
}

impl Symbol {
    pub fn line(&self) -> usize {
        match self {
            Symbol::Var(v) => v.line,
            Symbol::FuncParam(f) => f.line,
            Symbol::Alias(_) => 0,
        }
    }
}

/// Variables every formula can read and write.
const BUILTINS: &[(&str, Type)] = &[
    ("#pixel", Type::Complex),
    ("#zwpixel", Type::Complex),
    ("#numiter", Type::Int),
    ("#maxiter", Type::Int),
    ("#index", Type::Float),
    ("#solid", Type::Bool),
    ("#fate", Type::Int),
    ("#color", Type::Color),
    ("#inside", Type::Bool),
    ("#pi", Type::Float),
    ("#e", Type::Float),
    ("#rand", Type::Complex),
    ("#x", Type::Int),
    ("#y", Type::Int),
    ("#whitesq", Type::Bool),
    ("#scrnpix", Type::Complex),
    ("#center", Type::Complex),
    ("#magn", Type::Float),
    ("#dist", Type::Float),
];

/// Alternative spellings, mostly from Fractint.
const ALIASES: &[(&str, &str)] = &[
    ("#z", "z"),
    ("pixel", "#pixel"),
    ("pi", "#pi"),
    ("maxit", "#maxiter"),
    ("rand", "#rand"),
    ("whitesq", "#whitesq"),
    ("scrnpix", "#scrnpix"),
    ("p1", "@p1"),
    ("p2", "@p2"),
    ("p3", "@p3"),
    ("p4", "@p4"),
    ("p5", "@p5"),
    ("fn1", "@fn1"),
    ("fn2", "@fn2"),
    ("fn3", "@fn3"),
    ("fn4", "@fn4"),
];

/// Key of the gradient parameter every coloring lookup reads.
pub const GRADIENT_PARAM: &str = "@_gradient";

fn key(name: &str) -> String {
    name.to_ascii_lowercase()
}

/// Strip the sigil from a key.
fn base(key: &str) -> &str {
    key.trim_start_matches(['@', '#'])
}

#[derive(Debug, Clone, PartialEq)]
pub struct SymbolTable {
    prefix: Option<String>,
    symbols: IndexMap<String, Symbol>,
    next_slot: usize,
    temps: usize,
}

impl SymbolTable {
    /// A fresh table with the builtins, aliases and the shared `z`.
    ///
    /// # Parameters
    ///
    /// * `prefix` - Scope for names this table creates; `None` for the main
    ///   formula of a compilation unit.
    pub fn new(prefix: Option<&str>) -> Self {
        let mut symbols = IndexMap::new();
        for (name, ty) in BUILTINS {
            let mut var = Var::new(SymbolName::builtin(base(name)), *ty, 0);
            var.declared = true;
            match *name {
                "#pi" => var.value = Value::Float(std::f64::consts::PI),
                "#e" => var.value = Value::Float(std::f64::consts::E),
                "#magn" => var.value = Value::Float(1.0),
                _ => {}
            }
            symbols.insert(name.to_string(), Symbol::Var(var));
        }
        for (alias, target) in ALIASES {
            symbols.insert(alias.to_string(), Symbol::Alias(target.to_string()));
        }
        // `z` belongs to no formula in particular: colorings read the
        // fractal's final value.
        symbols.insert(
            "z".to_string(),
            Symbol::Var(Var::new(SymbolName::local("z", None), Type::Complex, 0)),
        );

        Self {
            prefix: prefix.map(str::to_string),
            symbols,
            next_slot: 0,
            temps: 0,
        }
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// Key `name` resolves to after following aliases.
    pub fn resolve_key(&self, name: &str) -> String {
        let mut k = key(name);
        // Alias chains are short; the bound guards against cycles.
        for _ in 0..4 {
            match self.symbols.get(&k) {
                Some(Symbol::Alias(target)) => k = target.clone(),
                _ => break,
            }
        }
        k
    }

    /// Case-insensitive lookup following aliases.
    pub fn get(&self, name: &str) -> Option<&Symbol> {
        self.symbols.get(&self.resolve_key(name))
    }

    pub fn get_var(&self, name: &str) -> Option<&Var> {
        match self.get(name)? {
            Symbol::Var(v) => Some(v),
            _ => None,
        }
    }

    fn get_var_mut(&mut self, name: &str) -> Option<&mut Var> {
        let k = self.resolve_key(name);
        match self.symbols.get_mut(&k)? {
            Symbol::Var(v) => Some(v),
            _ => None,
        }
    }

    pub fn func_param(&self, name: &str) -> Option<&FuncParam> {
        match self.get(name)? {
            Symbol::FuncParam(f) => Some(f),
            _ => None,
        }
    }

    /// Whether `name` is a symbol or a standard library function.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some() || stdlib().contains(name)
    }

    /// Insert or replace a symbol, redirecting through aliases.
    ///
    /// Parameters are given their slots here if they have none yet.
    ///
    /// # Errors
    ///
    /// `NoOverride` when `name` is a standard library function.
    pub fn set(&mut self, name: &str, symbol: Symbol) -> Result<()> {
        let k = self.resolve_key(name);
        if stdlib().contains(&k) {
            return Err(TranslateError::new(
                ErrorKind::NoOverride,
                symbol.line(),
                format!("'{}' is a predefined function and cannot be redefined", name),
            ));
        }
        let symbol = match symbol {
            Symbol::Var(mut var) => {
                self.assign_slot(&mut var);
                Symbol::Var(var)
            }
            other => other,
        };
        trace!(key = %k, "symbol set");
        self.symbols.insert(k, symbol);
        Ok(())
    }

    fn assign_slot(&mut self, var: &mut Var) {
        if var.is_param() && var.slot.is_none() && var.ty.slots() > 0 {
            var.slot = Some(self.next_slot);
            self.next_slot += var.ty.slots();
        }
    }

    /// Declare a parameter from the default section.
    ///
    /// # Errors
    ///
    /// `Redeclaration` when the parameter already exists.
    pub fn declare_param(&mut self, name: &str, ty: Type, value: Value, line: usize) -> Result<&Var> {
        let k = format!("@{}", key(name.trim_start_matches('@')));
        if self.symbols.contains_key(&k) {
            return Err(TranslateError::new(
                ErrorKind::Redeclaration,
                line,
                format!("parameter '{}' declared more than once", k),
            ));
        }
        let prefix = if k == GRADIENT_PARAM { None } else { self.prefix.clone() };
        let mut var = Var::new(SymbolName::param(base(&k), prefix.as_deref()), ty, line)
            .with_value(value);
        var.declared = true;
        self.set(&k, Symbol::Var(var))?;
        self.get_var(&k)
            .ok_or_else(|| TranslateError::internal(line, format!("lost parameter '{}'", k)))
    }

    /// Look up a parameter, creating it as a complex parameter on first use.
    pub fn param(&mut self, name: &str, line: usize) -> Result<&Var> {
        let k = self.resolve_key(name);
        if !self.symbols.contains_key(&k) {
            let prefix = if k == GRADIENT_PARAM { None } else { self.prefix.clone() };
            let ty = if k == GRADIENT_PARAM {
                Type::Gradient
            } else {
                Type::Complex
            };
            let var = Var::new(SymbolName::param(base(&k), prefix.as_deref()), ty, line);
            self.set(&k, Symbol::Var(var))?;
        }
        self.get_var(&k).ok_or_else(|| {
            TranslateError::new(
                ErrorKind::NotAValue,
                line,
                format!("'{}' is a function, not a value", name),
            )
        })
    }

    /// Look up a variable, creating an undeclared complex local on first use.
    pub fn local(&mut self, name: &str, line: usize) -> Result<&Var> {
        let k = self.resolve_key(name);
        if k.starts_with('@') {
            return self.param(&k, line);
        }
        if !self.symbols.contains_key(&k) {
            if stdlib().contains(&k) {
                return Err(TranslateError::new(
                    ErrorKind::NotAValue,
                    line,
                    format!("'{}' is a function, not a value", name),
                ));
            }
            if k.starts_with('#') {
                return Err(TranslateError::new(
                    ErrorKind::UndefinedName,
                    line,
                    format!("unknown predefined symbol '{}'", name),
                ));
            }
            let var = Var::new(SymbolName::local(&k, self.prefix.as_deref()), Type::Complex, line);
            self.set(&k, Symbol::Var(var))?;
        }
        self.get_var(&k).ok_or_else(|| {
            TranslateError::new(
                ErrorKind::NotAValue,
                line,
                format!("'{}' is a function, not a value", name),
            )
        })
    }

    /// Declare a typed local.
    ///
    /// Redeclaring with the same type is allowed; a different type is not.
    pub fn declare_local(&mut self, name: &str, ty: Type, dims: Vec<usize>, line: usize) -> Result<&Var> {
        let k = self.resolve_key(name);
        if let Some(existing) = self.get_var_mut(&k) {
            if existing.ty != ty {
                return Err(TranslateError::new(
                    ErrorKind::Redeclaration,
                    line,
                    format!(
                        "'{}' already has type {}, cannot redeclare as {}",
                        name, existing.ty, ty
                    ),
                ));
            }
            existing.declared = true;
            existing.dims = dims;
        } else {
            if k.starts_with(['@', '#']) {
                return Err(TranslateError::new(
                    ErrorKind::InvalidAssignment,
                    line,
                    format!("cannot declare '{}' as a variable", name),
                ));
            }
            let mut var = Var::new(SymbolName::local(&k, self.prefix.as_deref()), ty, line);
            var.declared = true;
            var.dims = dims;
            self.set(&k, Symbol::Var(var))?;
        }
        self.get_var(&k)
            .ok_or_else(|| TranslateError::internal(line, format!("lost variable '{}'", name)))
    }

    /// A fresh compiler temporary.
    pub fn new_temp(&mut self, ty: Type) -> Var {
        let var = Var::new(SymbolName::temp(self.temps, self.prefix.as_deref()), ty, 0);
        self.symbols
            .insert(format!("$tmp{}", self.temps), Symbol::Var(var.clone()));
        self.temps += 1;
        var
    }

    /// Select a standard library function for a function parameter.
    pub fn set_func_param(&mut self, name: &str, function: &str, ty: Option<Type>, line: usize) -> Result<()> {
        if !stdlib().contains(function) {
            return Err(TranslateError::new(
                ErrorKind::UndefinedName,
                line,
                format!("unknown function '{}' for '{}'", function, name),
            ));
        }
        let k = format!("@{}", key(name.trim_start_matches('@')));
        let func = FuncParam {
            name: SymbolName::param(base(&k), self.prefix.as_deref()),
            function: key(function),
            ty,
            line,
        };
        self.set(&k, Symbol::FuncParam(func))
    }

    /// Index of `text` among an enum parameter's values.
    pub fn resolve_enum(&self, param: &str, text: &str) -> Option<i64> {
        let var = self.get_var(param)?;
        var.enum_values
            .iter()
            .position(|v| v.eq_ignore_ascii_case(text))
            .map(|i| i as i64)
    }

    pub fn set_enum_values(&mut self, param: &str, values: Vec<String>) {
        if let Some(var) = self.get_var_mut(param) {
            var.enum_values = values;
        }
    }

    /// Functions a function parameter could be set to when it is called
    /// with `args` and must return `ret`. Operators are excluded.
    pub fn available_param_functions(&self, ret: Type, args: &[Type]) -> Vec<String> {
        stdlib()
            .functions_matching(ret, args)
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    /// Parameters in slot order.
    pub fn parameters(&self) -> impl Iterator<Item = &Var> {
        self.symbols.values().filter_map(|s| match s {
            Symbol::Var(v) if v.is_param() => Some(v),
            _ => None,
        })
    }

    /// Function parameters in declaration order.
    pub fn func_params(&self) -> impl Iterator<Item = &FuncParam> {
        self.symbols.values().filter_map(|s| match s {
            Symbol::FuncParam(f) => Some(f),
            _ => None,
        })
    }

    /// Every variable of any kind, merged ones included.
    pub fn variables(&self) -> impl Iterator<Item = &Var> {
        self.symbols.values().filter_map(|s| match s {
            Symbol::Var(v) => Some(v),
            _ => None,
        })
    }

    /// Number of parameter slots in use.
    pub fn slot_count(&self) -> usize {
        self.next_slot
    }

    /// Default value of every parameter slot, in slot order.
    pub fn default_params(&self) -> Vec<Value> {
        let mut params: Vec<&Var> = self.parameters().filter(|v| v.slot.is_some()).collect();
        params.sort_by_key(|v| v.slot);
        params.iter().flat_map(|v| v.value.to_slots()).collect()
    }

    /// Fold another table into this one.
    ///
    /// The other table's parameters are re-slotted after this table's, in
    /// their original order. Its locals, temporaries and function parameters
    /// are kept under `prefix`-scoped keys nobody can spell in source. Shared
    /// symbols (builtins, `z`, the gradient) are not duplicated.
    pub fn merge(&mut self, other: &SymbolTable, prefix: &str) {
        let mut params: Vec<(&String, &Var)> = Vec::new();
        for (k, symbol) in &other.symbols {
            match symbol {
                Symbol::Alias(_) => {}
                Symbol::Var(v) if v.name.kind == NameKind::Builtin => {}
                Symbol::Var(v) if v.name.prefix.is_none() && self.symbols.contains_key(k) => {}
                Symbol::Var(v) if v.is_param() => params.push((k, v)),
                other_symbol => {
                    self.symbols
                        .insert(format!("{}:{}", prefix, k), other_symbol.clone());
                }
            }
        }

        params.sort_by_key(|(_, v)| v.slot);
        for (k, v) in params {
            let mut var = v.clone();
            var.slot = None;
            self.assign_slot(&mut var);
            let merged_key = if var.name.prefix.is_none() {
                k.clone()
            } else {
                format!("{}:{}", prefix, k)
            };
            self.symbols.insert(merged_key, Symbol::Var(var));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_insensitive_lookup() {
        let mut t = SymbolTable::new(None);
        t.local("Count", 1).unwrap();
        assert!(t.get("COUNT").is_some());
        assert!(t.contains("count"));
    }

    #[test]
    fn test_aliases_resolve() {
        let t = SymbolTable::new(None);
        assert_eq!(t.get_var("pixel").unwrap().c_name(), "t__h_pixel");
        assert_eq!(t.get_var("#z").unwrap().c_name(), "fz");
        assert_eq!(t.resolve_key("MAXIT"), "#maxiter");
    }

    #[test]
    fn test_stdlib_cannot_be_redefined() {
        let mut t = SymbolTable::new(None);
        let var = Var::new(SymbolName::local("sin", None), Type::Float, 3);
        let err = t.set("sin", Symbol::Var(var)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::NoOverride);
        assert_eq!(err.line, 3);
    }

    #[test]
    fn test_slots_are_insertion_ordered_and_width_sized() {
        let mut t = SymbolTable::new(None);
        let slots: Vec<Option<usize>> = [
            ("a", Type::Int),
            ("b", Type::Complex),
            ("c", Type::Hyper),
            ("d", Type::Int),
        ]
        .iter()
        .map(|(n, ty)| t.declare_param(n, *ty, ty.default_value(), 1).unwrap().slot)
        .collect();
        assert_eq!(slots, vec![Some(0), Some(1), Some(3), Some(7)]);
        assert_eq!(t.slot_count(), 8);
    }

    #[test]
    fn test_lazy_param_is_complex() {
        let mut t = SymbolTable::new(None);
        let p = t.param("@power", 2).unwrap();
        assert_eq!(p.ty, Type::Complex);
        assert_eq!(p.slot, Some(0));
        assert_eq!(t.param("p1", 3).unwrap().slot, Some(2));
    }

    #[test]
    fn test_redeclaring_param_is_error() {
        let mut t = SymbolTable::new(None);
        t.declare_param("x", Type::Float, Value::Float(1.0), 1).unwrap();
        let err = t.declare_param("x", Type::Float, Value::Float(1.0), 2).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Redeclaration);
    }

    #[test]
    fn test_declare_local_type_conflict() {
        let mut t = SymbolTable::new(None);
        t.declare_local("z", Type::Complex, vec![], 1).unwrap();
        assert!(t.declare_local("z", Type::Float, vec![], 2).is_err());
    }

    #[test]
    fn test_enum_resolution() {
        let mut t = SymbolTable::new(None);
        t.declare_param("mode", Type::Int, Value::Int(0), 1).unwrap();
        t.set_enum_values("mode", vec!["One".into(), "Two".into()]);
        assert_eq!(t.resolve_enum("@mode", "two"), Some(1));
        assert_eq!(t.resolve_enum("@mode", "three"), None);
    }

    #[test]
    fn test_copy_is_independent() {
        let t = SymbolTable::new(None);
        let mut c = t.clone();
        c.local("w", 1).unwrap();
        assert!(t.get("w").is_none());
        assert!(c.get("w").is_some());
    }

    #[test]
    fn test_merge_reslots_params() {
        let mut main = SymbolTable::new(None);
        main.declare_param("_gradient", Type::Gradient, Value::Int(0), 1).unwrap();
        main.declare_param("bailout", Type::Float, Value::Float(4.0), 1).unwrap();

        let mut cf = SymbolTable::new(Some("cf0"));
        cf.declare_param("_density", Type::Float, Value::Float(1.0), 1).unwrap();
        cf.param(GRADIENT_PARAM, 2).unwrap();
        cf.local("count", 3).unwrap();

        main.merge(&cf, "cf0");
        let params: Vec<(String, Option<usize>)> =
            main.parameters().map(|v| (v.c_name(), v.slot)).collect();
        assert_eq!(
            params,
            vec![
                ("t__a__gradient".to_string(), Some(0)),
                ("t__a_bailout".to_string(), Some(1)),
                ("t__a_cf0_density".to_string(), Some(2)),
            ]
        );
        assert!(main.variables().any(|v| v.c_name() == "cf0fcount"));
        assert!(main.get("count").is_none());
    }

    #[test]
    fn test_default_params_flatten() {
        let mut t = SymbolTable::new(None);
        t.declare_param("_gradient", Type::Gradient, Value::Int(0), 1).unwrap();
        t.declare_param("c", Type::Complex, Value::Complex(1.0, 2.0), 1).unwrap();
        assert_eq!(
            t.default_params(),
            vec![Value::Int(0), Value::Float(1.0), Value::Float(2.0)]
        );
    }

    #[test]
    fn test_available_functions() {
        let t = SymbolTable::new(None);
        let fns = t.available_param_functions(Type::Complex, &[Type::Complex]);
        assert!(fns.iter().any(|f| f == "sqr"));
        assert!(!fns.iter().any(|f| f == "+"));
    }
}
