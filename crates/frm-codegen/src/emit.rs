//! C source emission.
//!
//! Wraps the generated sections in the fixed shared-object ABI:
//!
//! ```c
//! pf_obj *pf_new(void);
//! void pf_init(pf_obj *pfo, double *pos_params, struct s_param *params, int nparams);
//! void pf_calc(pf_obj *pfo, const double *params, int maxiter,
//!              int x, int y, int aa,
//!              int *pnIters, int *pFate, double *pDist, int *pSolid,
//!              int *pDirectColorFlag, double *pColors);
//! void pf_kill(pf_obj *pfo);
//! ```
//!
//! `pf_init` copies the parameters and runs every `global` section once;
//! locals those sections touch are saved in the object. `pf_calc` runs the
//! per-pixel program: transforms, `init`, then `loop` and `bailout` until
//! the bailout test fails or `maxiter` is reached, then `final`. Coloring
//! formulas merged as `cf0` (outside) and `cf1` (inside) run after the
//! fractal's section of the same name; their `final` only runs for pixels
//! on their side.
//!
//! Nothing but the four `pf_*` functions is exported.

use std::collections::HashMap;

use frm_ast::{Type, Value};
use frm_translate::{Exp, NameKind, Stm, TranslatedFormula, Var};
use indexmap::IndexSet;
use tracing::debug;

use crate::canon::Canonicalizer;
use crate::codegen::{CodeGen, CodegenOptions, Scalar};
use crate::error::Result;
use crate::insn::format_float;
use crate::optimize::peephole;

/// Symbols the generated library exports.
pub const EXPORTED_SYMBOLS: [&str; 4] = ["pf_new", "pf_init", "pf_calc", "pf_kill"];

/// Length of the position parameter array passed to `pf_init`.
pub const N_POS_PARAMS: usize = 11;

/// Prefix of the coloring formula that colors pixels inside the set.
const INSIDE_PREFIX: &str = "cf1";

const PRELUDE: &str = r#"#include <stdio.h>
#include <stdlib.h>
#include <string.h>
#include <math.h>

#define N_POS_PARAMS 11

struct s_param {
    int t;
    int intval;
    double doubleval;
    void *gradient;
    void *image;
};

struct frm_gradient {
    void (*lookup)(void *gradient, double index, double *rgba);
};

static void t__gradient(void *gradient, double index, double *rgba)
{
    struct frm_gradient *g = (struct frm_gradient *)gradient;
    if (g && g->lookup) {
        g->lookup(gradient, index, rgba);
        return;
    }
    index = index - floor(index);
    rgba[0] = index;
    rgba[1] = index;
    rgba[2] = index;
    rgba[3] = 1.0;
}

static inline void t__hsv2rgb(double h, double s, double v, double a, double *rgba)
{
    double f, p, q, t;
    int i;
    h = fmod(h, 6.0);
    if (h < 0.0)
        h += 6.0;
    i = (int)floor(h);
    f = h - i;
    p = v * (1.0 - s);
    q = v * (1.0 - s * f);
    t = v * (1.0 - s * (1.0 - f));
    switch (i) {
    case 0: rgba[0] = v; rgba[1] = t; rgba[2] = p; break;
    case 1: rgba[0] = q; rgba[1] = v; rgba[2] = p; break;
    case 2: rgba[0] = p; rgba[1] = v; rgba[2] = t; break;
    case 3: rgba[0] = p; rgba[1] = q; rgba[2] = v; break;
    case 4: rgba[0] = t; rgba[1] = p; rgba[2] = v; break;
    default: rgba[0] = v; rgba[1] = p; rgba[2] = q; break;
    }
    rgba[3] = a;
}

static inline void t__hsl2rgb(double h, double s, double l, double a, double *rgba)
{
    double v = l + s * fmin(l, 1.0 - l);
    double sv = v == 0.0 ? 0.0 : 2.0 * (1.0 - l / v);
    t__hsv2rgb(h, sv, v, a, rgba);
}

static inline void t__rgb2hsl(double r, double g, double b, double *hsl)
{
    double hi = fmax(r, fmax(g, b));
    double lo = fmin(r, fmin(g, b));
    double d = hi - lo;
    hsl[2] = (hi + lo) * 0.5;
    if (d == 0.0) {
        hsl[0] = 0.0;
        hsl[1] = 0.0;
        return;
    }
    hsl[1] = hsl[2] > 0.5 ? d / (2.0 - hi - lo) : d / (hi + lo);
    if (hi == r)
        hsl[0] = fmod((g - b) / d + 6.0, 6.0);
    else if (hi == g)
        hsl[0] = (b - r) / d + 2.0;
    else
        hsl[0] = (r - g) / d + 4.0;
}
"#;

/// Generate the complete C source for a translated compilation unit.
///
/// # Parameters
///
/// - `formula` - the fractal, with any coloring and transform formulas
///   already merged into it
/// - `options` - peephole optimization and assignment tracing
///
/// # Errors
///
/// [`CodegenError`](crate::CodegenError) when the IR contains a shape code
/// generation has no rule for. These are compiler bugs, not user errors.
pub fn generate(formula: &TranslatedFormula, options: &CodegenOptions) -> Result<String> {
    let mut emitter = Emitter::new(formula, *options);
    let source = emitter.emit()?;
    debug!(
        formula = %formula.id,
        sections = formula.sections.len(),
        bytes = source.len(),
        "generated C"
    );
    Ok(source)
}

/// Which C function a set of declarations is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Function {
    Init,
    Calc,
}

struct Emitter<'a> {
    formula: &'a TranslatedFormula,
    options: CodegenOptions,
    canon: Canonicalizer,
    vars: HashMap<String, &'a Var>,
}

impl<'a> Emitter<'a> {
    fn new(formula: &'a TranslatedFormula, options: CodegenOptions) -> Self {
        let vars = formula
            .symbols
            .variables()
            .map(|v| (v.c_name(), v))
            .collect();
        Self {
            formula,
            options,
            canon: Canonicalizer::new(),
            vars,
        }
    }

    fn emit(&mut self) -> Result<String> {
        let globals = self.global_locals();

        let mut out = CWriter::default();
        out.raw(PRELUDE);
        self.emit_struct(&mut out, &globals);
        emit_new(&mut out);
        self.emit_init(&mut out, &globals)?;
        self.emit_calc(&mut out, &globals)?;
        emit_kill(&mut out);
        Ok(out.finish())
    }

    fn emit_struct(&self, out: &mut CWriter, globals: &[&'a Var]) {
        out.line("struct pf_real {");
        out.indent();
        out.line("struct s_param *p;");
        out.line("int nparams;");
        out.line("double pos_params[N_POS_PARAMS];");
        for var in globals {
            for decl in member_decls(var) {
                out.line(&decl);
            }
        }
        out.dedent();
        out.line("};");
        out.line("");
        out.line("typedef struct pf_real pf_obj;");
        out.line("");
    }

    fn emit_init(&mut self, out: &mut CWriter, globals: &[&'a Var]) -> Result<()> {
        let mut gen = CodeGen::new(&self.formula.symbols, self.options);
        let keys = self.keys("global");
        let body = self.sections(&mut gen, &keys)?;

        out.line("void pf_init(pf_obj *pfo, double *pos_params, struct s_param *params, int nparams)");
        out.line("{");
        out.indent();
        out.line("int t__i;");
        out.line("if (!pfo) {");
        out.line("    return;");
        out.line("}");
        out.line("free(pfo->p);");
        out.line("pfo->p = NULL;");
        out.line("pfo->nparams = 0;");
        out.line("if (params && nparams > 0) {");
        out.line("    pfo->p = calloc((size_t)nparams, sizeof(struct s_param));");
        out.line("    if (pfo->p) {");
        out.line("        memcpy(pfo->p, params, (size_t)nparams * sizeof(struct s_param));");
        out.line("        pfo->nparams = nparams;");
        out.line("    }");
        out.line("}");
        out.line("for (t__i = 0; t__i < N_POS_PARAMS; t__i++) {");
        out.line("    pfo->pos_params[t__i] = pos_params ? pos_params[t__i] : 0.0;");
        out.line("}");
        out.line("{");
        out.indent();
        self.declarations(out, &gen, Function::Init);
        out.lines(&body);
        for var in globals {
            for (name, _) in var_parts(var) {
                if var.ty.is_array() {
                    out.line(&format!("memcpy(pfo->{0}, {0}, sizeof({0}));", name));
                } else {
                    out.line(&format!("pfo->{0} = {0};", name));
                }
            }
        }
        out.dedent();
        out.line("}");
        out.dedent();
        out.line("}");
        out.line("");
        Ok(())
    }

    fn emit_calc(&mut self, out: &mut CWriter, globals: &[&'a Var]) -> Result<()> {
        let mut gen = CodeGen::new(&self.formula.symbols, self.options);
        let (transform_keys, init_keys) = (self.keys("transform"), self.keys("init"));
        let transform = self.sections(&mut gen, &transform_keys)?;
        let init = self.sections(&mut gen, &init_keys)?;
        let (own_loop, merged_loops): (Vec<String>, Vec<String>) =
            self.keys("loop").into_iter().partition(|k| !k.contains('_'));
        let loop_body = self.sections(&mut gen, &own_loop)?;
        let bailout_keys = self.keys("bailout");
        let bailout = self.sections(&mut gen, &bailout_keys)?;
        let extra_loops = self.sections(&mut gen, &merged_loops)?;
        let finals = self.keys("final");
        let (shared_final, side_finals): (Vec<String>, Vec<String>) =
            finals.into_iter().partition(|k| !k.contains('_'));
        let (inside_final, outside_final): (Vec<String>, Vec<String>) = side_finals
            .into_iter()
            .partition(|k| k.starts_with(&format!("{}_", INSIDE_PREFIX)));
        let final_code = self.sections(&mut gen, &shared_final)?;
        let inside_code = self.sections(&mut gen, &inside_final)?;
        let outside_code = self.sections(&mut gen, &outside_final)?;

        out.line("void pf_calc(pf_obj *pfo, const double *params, int maxiter,");
        out.line("             int x, int y, int aa,");
        out.line("             int *pnIters, int *pFate, double *pDist, int *pSolid,");
        out.line("             int *pDirectColorFlag, double *pColors)");
        out.line("{");
        out.indent();
        self.declarations(out, &gen, Function::Calc);
        out.line("int t__h_bailout = 1;");
        for var in globals {
            for (name, _) in var_parts(var) {
                if var.ty.is_array() {
                    out.line(&format!("memcpy({0}, pfo->{0}, sizeof({0}));", name));
                } else {
                    out.line(&format!("{0} = pfo->{0};", name));
                }
            }
        }
        out.line("(void)aa;");
        out.line("");
        out.lines(&transform);
        out.line("fz_re = t__h_zwpixel_re;");
        out.line("fz_im = t__h_zwpixel_im;");
        out.lines(&init);
        out.line("while (t__h_numiter < t__h_maxiter) {");
        out.indent();
        out.lines(&loop_body);
        out.lines(&bailout);
        out.line("if (!t__h_bailout) {");
        out.line("    break;");
        out.line("}");
        out.lines(&extra_loops);
        out.line("t__h_numiter++;");
        out.dedent();
        out.line("}");
        out.line("t__h_inside = t__h_numiter >= t__h_maxiter;");
        out.line("t__h_fate = t__h_inside ? 1 : 0;");
        out.lines(&final_code);
        out.line("if (t__h_inside) {");
        out.indent();
        out.lines(&inside_code);
        out.dedent();
        out.line("} else {");
        out.indent();
        out.lines(&outside_code);
        out.dedent();
        out.line("}");
        out.line("");
        out.line("*pnIters = t__h_numiter;");
        out.line("*pFate = t__h_fate;");
        out.line("*pDist = t__h_index;");
        out.line("*pSolid = t__h_solid;");
        out.line(&format!("*pDirectColorFlag = {};", self.direct_color() as i32));
        for (i, part) in Type::Color.parts().iter().enumerate() {
            out.line(&format!("pColors[{}] = t__h_color{};", i, part));
        }
        out.dedent();
        out.line("}");
        out.line("");
        Ok(())
    }

    /// Section keys for one phase: the fractal's own first, then merged
    /// formulas' in merge order.
    fn keys(&self, phase: &str) -> Vec<String> {
        let suffix = format!("_{}", phase);
        let (own, merged): (Vec<&String>, Vec<&String>) = self
            .formula
            .sections
            .keys()
            .filter(|k| k.as_str() == phase || k.ends_with(&suffix))
            .partition(|k| k.as_str() == phase);
        own.into_iter().chain(merged).cloned().collect()
    }

    /// Canonicalize, select and format the named sections in order.
    fn sections(&mut self, gen: &mut CodeGen, keys: &[String]) -> Result<Vec<String>> {
        let mut lines = Vec::new();
        for key in keys {
            let Some(stm) = self.formula.sections.get(key) else {
                continue;
            };
            let stms = self.canon.canonicalize(stm)?;
            let mut insns = gen.section(&stms)?;
            if self.options.optimize {
                insns = peephole(insns);
            }
            lines.push(format!("/* {} */", key));
            for insn in &insns {
                lines.push(insn.format()?);
            }
        }
        Ok(lines)
    }

    /// Declarations at the top of `pf_init` or `pf_calc`.
    fn declarations(&self, out: &mut CWriter, gen: &CodeGen, function: Function) {
        let symbols = &self.formula.symbols;

        for var in symbols.variables().filter(|v| v.name.kind == NameKind::Builtin) {
            let base = var.name.base.as_str();
            let scalar = Scalar::of(var.ty);
            for (i, (name, default)) in var_parts(var).into_iter().enumerate() {
                let init = builtin_init(base, i, function).unwrap_or(default);
                out.line(&format!("{} {} = {};", scalar.c_type(), name, init));
            }
        }

        for var in symbols.parameters() {
            let Some(slot) = var.slot else {
                continue;
            };
            if var.ty == Type::String {
                continue;
            }
            let (c_type, field) = match var.ty {
                Type::Bool | Type::Int => ("int", "intval"),
                Type::Gradient => ("void *", "gradient"),
                Type::Image => ("void *", "image"),
                _ => ("double", "doubleval"),
            };
            for (i, (name, default)) in var_parts(var).into_iter().enumerate() {
                let default = if c_type == "void *" {
                    "NULL".to_string()
                } else {
                    default
                };
                out.line(&format!(
                    "{} {} = (pfo->p && pfo->nparams > {s}) ? pfo->p[{s}].{} : {};",
                    c_type,
                    name,
                    field,
                    default,
                    s = slot + i
                ));
            }
        }

        for var in symbols
            .variables()
            .filter(|v| matches!(v.name.kind, NameKind::Local | NameKind::Temp))
        {
            for decl in local_decls(&var.c_name(), var.ty, &var.value, &var.dims) {
                out.line(&decl);
            }
        }

        for (name, ty) in gen.extra_vars() {
            for decl in local_decls(name, *ty, &ty.default_value(), &[]) {
                out.line(&decl);
            }
        }

        for (name, scalar) in gen.temps() {
            out.line(&format!("{} {};", scalar.c_type(), name));
        }
    }

    /// Locals the `global` sections touch, which `pf_init` saves and every
    /// `pf_calc` restores.
    fn global_locals(&self) -> Vec<&'a Var> {
        let mut names = IndexSet::new();
        for key in self.keys("global") {
            if let Some(stm) = self.formula.sections.get(&key) {
                collect_vars(stm, &mut names);
            }
        }
        names
            .iter()
            .filter_map(|n| self.vars.get(n).copied())
            .filter(|v| matches!(v.name.kind, NameKind::Local | NameKind::Temp))
            .collect()
    }

    /// Whether a merged coloring formula assigns `#color` itself.
    fn direct_color(&self) -> bool {
        self.formula
            .sections
            .iter()
            .filter(|(k, _)| k.contains('_'))
            .any(|(_, stm)| writes(stm, "t__h_color"))
    }
}

fn emit_new(out: &mut CWriter) {
    out.line("pf_obj *pf_new(void)");
    out.line("{");
    out.line("    return (pf_obj *)calloc(1, sizeof(pf_obj));");
    out.line("}");
    out.line("");
}

fn emit_kill(out: &mut CWriter) {
    out.line("void pf_kill(pf_obj *pfo)");
    out.line("{");
    out.line("    if (pfo) {");
    out.line("        free(pfo->p);");
    out.line("        free(pfo);");
    out.line("    }");
    out.line("}");
}

/// Initial value of a builtin part, when it is not the variable's default.
fn builtin_init(base: &str, part: usize, function: Function) -> Option<String> {
    let calc = function == Function::Calc;
    let text = match (base, part) {
        ("pixel", 0) if calc => "params[0]",
        ("pixel", 1) if calc => "params[1]",
        ("zwpixel", 0) if calc => "params[2]",
        ("zwpixel", 1) if calc => "params[3]",
        ("maxiter", _) if calc => "maxiter",
        ("x", _) if calc => "x",
        ("y", _) if calc => "y",
        ("scrnpix", 0) if calc => "(double)x",
        ("scrnpix", 1) if calc => "(double)y",
        ("whitesq", _) if calc => "((x + y) % 2) == 0",
        ("rand", _) => "(double)rand() / RAND_MAX * 2.0 - 1.0",
        ("center", 0) => "pfo->pos_params[0]",
        ("center", 1) => "pfo->pos_params[1]",
        ("magn", _) => "pfo->pos_params[4]",
        _ => return None,
    };
    Some(text.to_string())
}

/// Each scalar part of a variable: its C name and its initial value.
fn var_parts(var: &Var) -> Vec<(String, String)> {
    let c_name = var.c_name();
    let element = var.ty.element_type().unwrap_or(var.ty);
    let value = var
        .value
        .cast(element)
        .unwrap_or_else(|| element.default_value());
    let slots = value.to_slots();
    element
        .parts()
        .iter()
        .enumerate()
        .map(|(i, suffix)| {
            let init = slots.get(i).map(c_literal).unwrap_or_else(|| "0".to_string());
            (format!("{}{}", c_name, suffix), init)
        })
        .collect()
}

/// Declarations of a local variable, one per part.
fn local_decls(name: &str, ty: Type, value: &Value, dims: &[usize]) -> Vec<String> {
    if let Some(element) = ty.element_type() {
        let len: usize = dims.iter().product::<usize>().max(1);
        let scalar = Scalar::of(element);
        return element
            .parts()
            .iter()
            .map(|suffix| format!("{} {}{}[{}] = {{0}};", scalar.c_type(), name, suffix, len))
            .collect();
    }
    let scalar = Scalar::of(ty);
    let slots = value
        .cast(ty)
        .unwrap_or_else(|| ty.default_value())
        .to_slots();
    ty.parts()
        .iter()
        .enumerate()
        .map(|(i, suffix)| {
            let init = slots.get(i).map(c_literal).unwrap_or_else(|| "0".to_string());
            format!("{} {}{} = {};", scalar.c_type(), name, suffix, init)
        })
        .collect()
}

/// Struct members for a saved global local.
fn member_decls(var: &Var) -> Vec<String> {
    let element = var.ty.element_type().unwrap_or(var.ty);
    let scalar = Scalar::of(element);
    let len = var.dims.iter().product::<usize>().max(1);
    element
        .parts()
        .iter()
        .map(|suffix| {
            if var.ty.is_array() {
                format!("{} {}{}[{}];", scalar.c_type(), var.c_name(), suffix, len)
            } else {
                format!("{} {}{};", scalar.c_type(), var.c_name(), suffix)
            }
        })
        .collect()
}

fn c_literal(value: &Value) -> String {
    match value {
        Value::Bool(b) => (*b as i32).to_string(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => format_float(*f),
        other => other
            .as_f64()
            .map(format_float)
            .unwrap_or_else(|| "0".to_string()),
    }
}

fn collect_vars(stm: &Stm, out: &mut IndexSet<String>) {
    match stm {
        Stm::Move { dest, src } => {
            collect_exp(dest, out);
            collect_exp(src, out);
        }
        Stm::Seq(stms) => stms.iter().for_each(|s| collect_vars(s, out)),
        Stm::CJump { left, right, .. } => {
            collect_exp(left, out);
            collect_exp(right, out);
        }
        Stm::Exp(e) => collect_exp(e, out),
        Stm::Jump(_) | Stm::Label(_) => {}
    }
}

fn collect_exp(exp: &Exp, out: &mut IndexSet<String>) {
    match exp {
        Exp::Var { name, .. } => {
            out.insert(name.clone());
        }
        Exp::Const { .. } => {}
        Exp::Binop { left, right, .. } => {
            collect_exp(left, out);
            collect_exp(right, out);
        }
        Exp::Unop { operand, .. } => collect_exp(operand, out),
        Exp::Call { args, .. } => args.iter().for_each(|a| collect_exp(a, out)),
        Exp::Cast { expr, .. } => collect_exp(expr, out),
        Exp::ESeq { stm, exp, .. } => {
            collect_vars(stm, out);
            collect_exp(exp, out);
        }
    }
}

/// Whether `stm` assigns the variable `name` anywhere.
fn writes(stm: &Stm, name: &str) -> bool {
    match stm {
        Stm::Move {
            dest: Exp::Var { name: dest, .. },
            src,
        } => dest == name || writes_exp(src, name),
        Stm::Move { src, .. } => writes_exp(src, name),
        Stm::Seq(stms) => stms.iter().any(|s| writes(s, name)),
        Stm::CJump { left, right, .. } => writes_exp(left, name) || writes_exp(right, name),
        Stm::Exp(e) => writes_exp(e, name),
        Stm::Jump(_) | Stm::Label(_) => false,
    }
}

fn writes_exp(exp: &Exp, name: &str) -> bool {
    match exp {
        Exp::ESeq { stm, exp, .. } => writes(stm, name) || writes_exp(exp, name),
        Exp::Binop { left, right, .. } => writes_exp(left, name) || writes_exp(right, name),
        Exp::Unop { operand, .. } => writes_exp(operand, name),
        Exp::Call { args, .. } => args.iter().any(|a| writes_exp(a, name)),
        Exp::Cast { expr, .. } => writes_exp(expr, name),
        Exp::Var { .. } | Exp::Const { .. } => false,
    }
}

/// Indenting line buffer.
#[derive(Debug, Default)]
struct CWriter {
    out: String,
    depth: usize,
}

impl CWriter {
    fn line(&mut self, text: &str) {
        if !text.is_empty() {
            for _ in 0..self.depth {
                self.out.push_str("    ");
            }
            self.out.push_str(text);
        }
        self.out.push('\n');
    }

    fn lines(&mut self, lines: &[String]) {
        for line in lines {
            self.line(line);
        }
    }

    fn raw(&mut self, text: &str) {
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn indent(&mut self) {
        self.depth += 1;
    }

    fn dedent(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    fn finish(self) -> String {
        self.out
    }
}
