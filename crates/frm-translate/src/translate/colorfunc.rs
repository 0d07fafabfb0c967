//! Standard parameters injected per formula kind, and the coloring
//! post-processing `transfer(x) * density + offset`.

use frm_ast::{BinaryOp, Type, Value};

use super::{FormulaKind, FuncInfo, Translator};
use crate::error::{ErrorKind, Result, TranslateError};
use crate::ir::{Exp, Stm};
use crate::symbol::GRADIENT_PARAM;

const TRANSFER: &str = "_transfer";
const TRANSFER_PARAM: &str = "@_transfer";
const DENSITY: &str = "@_density";
const OFFSET: &str = "@_offset";

impl Translator<'_> {
    pub(super) fn inject_standard_params(&mut self, line: usize) {
        let result = match self.kind {
            FormulaKind::Fractal => self
                .symbols
                .declare_param(GRADIENT_PARAM, Type::Gradient, Value::Int(0), line)
                .map(|_| ()),
            FormulaKind::ColorFunc => self.inject_color_params(line),
            FormulaKind::Transform | FormulaKind::GradientFunc => Ok(()),
        };
        if let Err(err) = result {
            self.diagnostics.push(err);
        }
    }

    fn inject_color_params(&mut self, line: usize) -> Result<()> {
        self.symbols
            .declare_param(DENSITY, Type::Float, Value::Float(1.0), line)?;
        self.symbols
            .declare_param(OFFSET, Type::Float, Value::Float(0.0), line)?;

        let selected = self
            .options
            .func_overrides
            .get(TRANSFER)
            .cloned()
            .unwrap_or_else(|| "ident".to_string());
        self.symbols
            .set_func_param(TRANSFER, &selected, Some(Type::Float), line)?;
        self.funcs.insert(
            TRANSFER.to_string(),
            FuncInfo {
                name: TRANSFER.to_string(),
                default: "ident".to_string(),
                selected: selected.to_ascii_lowercase(),
                caption: None,
            },
        );
        Ok(())
    }

    /// `transfer(x) * @_density + @_offset`
    pub(super) fn apply_transfer(&mut self, x: Exp, line: usize) -> Result<Exp> {
        let function = self
            .symbols
            .func_param(TRANSFER_PARAM)
            .map(|f| f.function.clone())
            .unwrap_or_else(|| "ident".to_string());
        let (func, args) = self.resolve(&function, vec![x], line)?;
        let mut transferred = Exp::call(function.as_str(), args, func.ret);
        if func.ret != Type::Float {
            if !Type::can_be_cast(func.ret, Type::Float) {
                return Err(TranslateError::new(
                    ErrorKind::TypeMismatch,
                    line,
                    format!("transfer function '{}' does not return a float", function),
                ));
            }
            transferred = Exp::cast(transferred, Type::Float);
        }

        let density = self.symbols.param(DENSITY, line)?;
        let density = Exp::var(density.c_name(), density.ty);
        let offset = self.symbols.param(OFFSET, line)?;
        let offset = Exp::var(offset.c_name(), offset.ty);

        Ok(Exp::binop(
            BinaryOp::Add,
            Exp::binop(BinaryOp::Mul, transferred, density, Type::Float),
            offset,
            Type::Float,
        ))
    }

    /// Append `#index = transfer(#index) * @_density + @_offset` to `final`.
    pub(super) fn finish_color_index(&mut self, line: usize) {
        let index = match self.symbols.get_var("#index") {
            Some(var) => Exp::var(var.c_name(), var.ty),
            None => {
                self.diagnostics
                    .push(TranslateError::internal(line, "#index is not defined"));
                return;
            }
        };
        let value = match self.apply_transfer(index.clone(), line) {
            Ok(value) => value,
            Err(err) => {
                self.diagnostics.push(err);
                return;
            }
        };
        let assign = Stm::mov(index, value);
        match self.sections.entry("final".to_string()).or_insert_with(Stm::nop) {
            Stm::Seq(stms) => stms.push(assign),
            other => *other = Stm::Seq(vec![other.clone(), assign]),
        }
    }
}
