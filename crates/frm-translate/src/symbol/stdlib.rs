//! The standard library: every operator and built-in function signature.
//!
//! Overloads are registered in a fixed order and resolution walks them in
//! that order, so the registration order below is part of the language
//! semantics: `z^2` picks `(complex, float)` because it is the first
//! castable `^` overload for `(complex, int)`.

use std::sync::OnceLock;

use frm_ast::Type;
use indexmap::IndexMap;

/// One overload of an operator or function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Func {
    pub name: &'static str,
    pub args: Vec<Type>,
    pub ret: Type,
}

impl Func {
    /// Operators are registered under their symbol (`+`, `==`, `t__neg`) and
    /// are never offered as user-selectable functions.
    pub fn is_operator(&self) -> bool {
        !self.name.starts_with(|c: char| c.is_ascii_alphabetic()) || self.name.starts_with("t__")
    }

    fn matches_exactly(&self, args: &[Type]) -> bool {
        self.args == args
    }

    fn matches_with_casts(&self, args: &[Type]) -> bool {
        self.args.len() == args.len()
            && args
                .iter()
                .zip(&self.args)
                .all(|(from, to)| Type::can_be_cast(*from, *to))
    }
}

/// Registry of overload lists keyed by lowercase name.
#[derive(Debug, Default)]
pub struct StdLib {
    funcs: IndexMap<&'static str, Vec<Func>>,
}

/// Returns the process-wide standard library, building it on first use.
pub fn stdlib() -> &'static StdLib {
    static STDLIB: OnceLock<StdLib> = OnceLock::new();
    STDLIB.get_or_init(build_stdlib)
}

impl StdLib {
    fn add(&mut self, name: &'static str, args: &[Type], ret: Type) {
        self.funcs.entry(name).or_default().push(Func {
            name,
            args: args.to_vec(),
            ret,
        });
    }

    /// Overloads registered under `name`, if any.
    pub fn overloads(&self, name: &str) -> Option<&[Func]> {
        self.funcs
            .get(name.to_ascii_lowercase().as_str())
            .map(Vec::as_slice)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.overloads(name).is_some()
    }

    /// Resolve a call: the first exact match wins, otherwise the first
    /// overload every argument can be cast to.
    ///
    /// # Parameters
    ///
    /// * `name` - Operator symbol or function name
    /// * `args` - Argument types at the call site
    ///
    /// # Returns
    ///
    /// The chosen overload, or `None` when nothing accepts `args`.
    pub fn resolve(&self, name: &str, args: &[Type]) -> Option<&Func> {
        let overloads = self.overloads(name)?;
        overloads
            .iter()
            .find(|f| f.matches_exactly(args))
            .or_else(|| overloads.iter().find(|f| f.matches_with_casts(args)))
    }

    /// All overloads in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Func> {
        self.funcs.values().flatten()
    }

    /// Names of the non-operator functions with an overload callable as
    /// `ret name(args)`.
    pub fn functions_matching(&self, ret: Type, args: &[Type]) -> Vec<&'static str> {
        self.funcs
            .iter()
            .filter(|(name, _)| !TYPE_CONSTRUCTORS.contains(name))
            .filter(|(_, overloads)| {
                overloads.iter().any(|f| {
                    !f.is_operator() && f.ret == ret && f.matches_with_casts(args)
                })
            })
            .map(|(name, _)| *name)
            .collect()
    }
}

macro_rules! overloads {
    ($lib:ident, [$($name:expr),+ $(,)?], $(($($arg:ident),*) -> $ret:ident),+ $(,)?) => {
        for name in [$($name),+] {
            $( $lib.add(name, &[$(Type::$arg),*], Type::$ret); )+
        }
    };
}

/// Type names that double as conversion or constructor functions, as in
/// `float(i)` or `color(r, g, b, a)`. They are never offered as values for
/// function parameters.
pub const TYPE_CONSTRUCTORS: &[&str] = &["bool", "int", "float", "complex", "hyper", "color"];

/// Functions defined for both real and complex arguments.
const REAL_AND_COMPLEX: &[&str] = &[
    "sin", "cos", "tan", "cotan", "sinh", "cosh", "tanh", "cotanh", "asin", "acos", "atan",
    "asinh", "acosh", "atanh", "exp", "log", "sqrt", "sqr", "ident", "zero", "one", "recip",
];

fn build_stdlib() -> StdLib {
    let mut lib = StdLib::default();

    // Arithmetic
    overloads!(lib, ["+", "-"],
        (Int, Int) -> Int,
        (Float, Float) -> Float,
        (Complex, Complex) -> Complex,
        (Hyper, Hyper) -> Hyper,
        (Color, Color) -> Color,
    );
    overloads!(lib, ["*"],
        (Int, Int) -> Int,
        (Float, Float) -> Float,
        (Complex, Complex) -> Complex,
        (Hyper, Hyper) -> Hyper,
        (Color, Float) -> Color,
    );
    overloads!(lib, ["/"],
        (Float, Float) -> Float,
        (Complex, Complex) -> Complex,
        (Hyper, Float) -> Hyper,
        (Color, Float) -> Color,
    );
    overloads!(lib, ["%"], (Int, Int) -> Int, (Float, Float) -> Float);
    overloads!(lib, ["^"],
        (Float, Float) -> Float,
        (Complex, Float) -> Complex,
        (Complex, Complex) -> Complex,
    );
    overloads!(lib, ["t__neg"],
        (Int) -> Int,
        (Float) -> Float,
        (Complex) -> Complex,
        (Hyper) -> Hyper,
        (Color) -> Color,
    );

    // Comparison and logic
    overloads!(lib, ["==", "!="],
        (Int, Int) -> Bool,
        (Float, Float) -> Bool,
        (Complex, Complex) -> Bool,
        (Hyper, Hyper) -> Bool,
    );
    overloads!(lib, ["<", "<=", ">", ">="],
        (Int, Int) -> Bool,
        (Float, Float) -> Bool,
        (Complex, Complex) -> Bool,
    );
    overloads!(lib, ["&&", "||"], (Bool, Bool) -> Bool);
    overloads!(lib, ["!"], (Bool) -> Bool);

    // Real and complex math
    for name in REAL_AND_COMPLEX {
        overloads!(lib, [*name], (Float) -> Float, (Complex) -> Complex);
    }
    overloads!(lib, ["sqr", "ident"], (Hyper) -> Hyper);
    overloads!(lib, ["abs"], (Int) -> Int, (Float) -> Float, (Complex) -> Complex);
    overloads!(lib, ["min", "max"], (Int, Int) -> Int, (Float, Float) -> Float);
    overloads!(lib, ["fmod"], (Float, Float) -> Float);
    overloads!(lib, ["round", "floor", "ceil", "trunc"],
        (Float) -> Int,
        (Complex) -> Complex,
    );
    overloads!(lib, ["conj", "flip"], (Complex) -> Complex);
    overloads!(lib, ["cabs"], (Complex) -> Float, (Hyper) -> Float);
    overloads!(lib, ["atan2"], (Complex) -> Float);
    overloads!(lib, ["cmag"], (Complex) -> Float, (Hyper) -> Float);
    overloads!(lib, ["real", "imag"], (Complex) -> Float, (Hyper) -> Float);

    // Distance measures built from the real and imaginary parts
    overloads!(lib,
        ["real2", "imag2", "manhattan", "manhattanish", "max2", "min2", "quad"],
        (Complex) -> Float,
    );

    // Type conversions and constructors
    overloads!(lib, ["bool"],
        (Bool) -> Bool,
        (Int) -> Bool,
        (Float) -> Bool,
        (Complex) -> Bool,
        (Hyper) -> Bool,
    );
    overloads!(lib, ["int"], (Int) -> Int, (Float) -> Int);
    overloads!(lib, ["float"], (Float) -> Float);
    overloads!(lib, ["complex"], (Float, Float) -> Complex, (Complex) -> Complex);
    overloads!(lib, ["hyper"],
        (Float, Float, Float, Float) -> Hyper,
        (Complex, Complex) -> Hyper,
        (Hyper) -> Hyper,
    );
    overloads!(lib, ["hyper_ri", "hyper_jk"], (Hyper) -> Complex);

    // Colors
    overloads!(lib, ["rgb", "hsl", "hsv"], (Float, Float, Float) -> Color);
    overloads!(lib, ["rgba", "hsla", "hsva"], (Float, Float, Float, Float) -> Color);
    overloads!(lib, ["color"], (Float, Float, Float, Float) -> Color, (Color) -> Color);
    overloads!(lib, ["red", "green", "blue", "alpha", "hue", "sat", "lum"], (Color) -> Float);
    overloads!(lib, ["blend", "compose"], (Color, Color, Float) -> Color);
    overloads!(lib, ["mergenormal", "mergemultiply"], (Color, Color) -> Color);
    overloads!(lib, ["gradient"], (Float) -> Color);

    lib
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match_wins() {
        let f = stdlib().resolve("+", &[Type::Float, Type::Float]).unwrap();
        assert_eq!(f.ret, Type::Float);
    }

    #[test]
    fn test_castable_match_in_order() {
        let f = stdlib().resolve("+", &[Type::Int, Type::Float]).unwrap();
        assert_eq!(f.args, vec![Type::Float, Type::Float]);

        let f = stdlib().resolve("^", &[Type::Complex, Type::Int]).unwrap();
        assert_eq!(f.args, vec![Type::Complex, Type::Float]);
    }

    #[test]
    fn test_no_match() {
        assert!(stdlib().resolve("sin", &[Type::String]).is_none());
        assert!(stdlib().resolve("nosuchfn", &[Type::Float]).is_none());
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        assert!(stdlib().contains("SIN"));
    }

    #[test]
    fn test_operators_detected() {
        let lib = stdlib();
        assert!(lib.overloads("t__neg").unwrap()[0].is_operator());
        assert!(lib.overloads("==").unwrap()[0].is_operator());
        assert!(!lib.overloads("sin").unwrap()[0].is_operator());
    }

    #[test]
    fn test_functions_matching_excludes_operators() {
        let names = stdlib().functions_matching(Type::Complex, &[Type::Complex]);
        assert!(names.contains(&"sin"));
        assert!(names.contains(&"conj"));
        assert!(!names.contains(&"t__neg"));
        assert!(!names.contains(&"cmag"));
        assert!(!names.contains(&"complex"));
    }

    #[test]
    fn test_type_constructors_resolve() {
        let lib = stdlib();
        let f = lib.resolve("float", &[Type::Int]).unwrap();
        assert_eq!((f.args.as_slice(), f.ret), ([Type::Float].as_slice(), Type::Float));
        let f = lib.resolve("int", &[Type::Float]).unwrap();
        assert_eq!(f.ret, Type::Int);
        let f = lib.resolve("bool", &[Type::Complex]).unwrap();
        assert_eq!(f.args, vec![Type::Complex]);
        let f = lib.resolve("color", &[Type::Int, Type::Float, Type::Float, Type::Float]).unwrap();
        assert_eq!(f.ret, Type::Color);
        assert!(lib.resolve("int", &[Type::Complex]).is_none());
        let f = lib.resolve("int", &[Type::Bool]).unwrap();
        assert_eq!(f.args, vec![Type::Int]);
    }

    #[test]
    fn test_min_max_keep_ints() {
        let f = stdlib().resolve("max", &[Type::Int, Type::Int]).unwrap();
        assert_eq!(f.ret, Type::Int);
        let f = stdlib().resolve("min", &[Type::Int, Type::Float]).unwrap();
        assert_eq!(f.ret, Type::Float);
    }
}
