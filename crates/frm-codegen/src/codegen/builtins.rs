//! Standard library functions.
//!
//! Real overloads map onto `<math.h>`; complex and hypercomplex ones are
//! built from scalar operations and a handful of complex primitives
//! (`cmul`, `cdiv`, `clog`, `cexp`, `csqrt`).

use frm_ast::Type;

use super::expr::{four, rebuild, two};
use super::{CodeGen, Scalar};
use crate::error::{CodegenError, Result};
use crate::insn::{Arg, Insn, ScalarOp};

impl CodeGen {
    /// Expand a call to `func` with already converted arguments.
    pub(super) fn call(&mut self, func: &str, args: Vec<(Arg, Type)>, ret: Type) -> Result<Arg> {
        let types: Vec<Type> = args.iter().map(|(_, t)| *t).collect();
        let mut args: Vec<Arg> = args.into_iter().map(|(a, _)| a).collect();

        if func == "gradient" {
            return self.gradient(args);
        }

        match types.as_slice() {
            [Type::Float] => {
                let x = single(args)?;
                self.real_call(func, x)
            }
            [Type::Int] if func == "abs" => {
                let x = single(args)?;
                Ok(self.oper1(Scalar::Int, "{d0} = abs({s0});", vec![x]))
            }
            [Type::Int, Type::Int] => {
                let template = match func {
                    "min" => "{d0} = {s0} < {s1} ? {s0} : {s1};",
                    "max" => "{d0} = {s0} > {s1} ? {s0} : {s1};",
                    _ => return Err(unknown(func, &types)),
                };
                Ok(self.oper1(Scalar::Int, template, args))
            }
            [Type::Complex] => {
                let x = single(args)?;
                self.complex_call(func, x)
            }
            [Type::Hyper] => {
                let x = single(args)?;
                self.hyper_call(func, x)
            }
            [Type::Color] => {
                let [r, g, b, a] = four(single(args)?)?;
                match func {
                    "red" => Ok(r),
                    "green" => Ok(g),
                    "blue" => Ok(b),
                    "alpha" => Ok(a),
                    "hue" | "sat" | "lum" => {
                        let index = match func {
                            "hue" => 0,
                            "sat" => 1,
                            _ => 2,
                        };
                        let template = format!(
                            "{{ double t__h[3]; t__rgb2hsl({{s0}}, {{s1}}, {{s2}}, t__h); {{d0}} = t__h[{}]; }}",
                            index
                        );
                        Ok(self.oper1(Scalar::Double, template, vec![r, g, b]))
                    }
                    _ => Err(unknown(func, &types)),
                }
            }
            [Type::Color, Type::Color] => {
                let [base, top] = <[Arg; 2]>::try_from(args)
                    .map_err(|_| CodegenError::internal("merge takes two colors"))?;
                self.merge(func, base, top)
            }
            [Type::Color, Type::Color, Type::Float] => {
                let [base, top, amount] = <[Arg; 3]>::try_from(args)
                    .map_err(|_| CodegenError::internal("blend takes two colors and an amount"))?;
                self.blend(func, base, top, amount)
            }
            [Type::Float, Type::Float] if func == "complex" => {
                let im = args.pop();
                let re = args.pop();
                match (re, im) {
                    (Some(re), Some(im)) => Ok(Arg::complex(re, im)),
                    _ => Err(unknown(func, &types)),
                }
            }
            [Type::Float, Type::Float] => {
                let template = match func {
                    "min" => "{d0} = fmin({s0}, {s1});",
                    "max" => "{d0} = fmax({s0}, {s1});",
                    "fmod" => "{d0} = fmod({s0}, {s1});",
                    _ => return Err(unknown(func, &types)),
                };
                Ok(self.oper1(Scalar::Double, template, args))
            }
            [Type::Complex, Type::Complex] if func == "hyper" => {
                let parts: Vec<Arg> = args.into_iter().flat_map(Arg::into_parts).collect();
                rebuild(parts, Type::Hyper)
            }
            [Type::Float, Type::Float, Type::Float] => {
                args.push(Arg::Float(1.0));
                match func {
                    "rgb" => rebuild(args, Type::Color),
                    "hsl" | "hsv" => Ok(self.from_hue(func, args)),
                    _ => Err(unknown(func, &types)),
                }
            }
            [Type::Float, Type::Float, Type::Float, Type::Float] => match func {
                "hyper" => rebuild(args, Type::Hyper),
                "rgba" | "color" => rebuild(args, Type::Color),
                "hsla" => Ok(self.from_hue("hsl", args)),
                "hsva" => Ok(self.from_hue("hsv", args)),
                _ => Err(unknown(func, &types)),
            },
            _ => Err(unknown(func, &types)),
        }
        .and_then(|result| {
            if result.parts().len() == ret.parts().len() {
                Ok(result)
            } else {
                Err(CodegenError::internal(format!(
                    "'{}' produced the wrong shape for {}",
                    func, ret
                )))
            }
        })
    }

    fn real_call(&mut self, func: &str, x: Arg) -> Result<Arg> {
        let d = Scalar::Double;
        Ok(match func {
            "sin" | "cos" | "tan" | "sinh" | "cosh" | "tanh" | "asin" | "acos" | "atan"
            | "asinh" | "acosh" | "atanh" | "exp" | "log" | "sqrt" | "floor" | "ceil" => {
                let template = format!("{{d0}} = {}({{s0}});", func);
                let value = self.oper1(d, template, vec![x]);
                match func {
                    "floor" | "ceil" => self.oper1(Scalar::Int, "{d0} = (int){s0};", vec![value]),
                    _ => value,
                }
            }
            "cotan" => self.oper1(d, "{d0} = 1.0 / tan({s0});", vec![x]),
            "cotanh" => self.oper1(d, "{d0} = 1.0 / tanh({s0});", vec![x]),
            "abs" => self.oper1(d, "{d0} = fabs({s0});", vec![x]),
            "sqr" => self.dbin(ScalarOp::Mul, x.clone(), x),
            "recip" => self.dbin(ScalarOp::Div, Arg::Float(1.0), x),
            "ident" => x,
            "zero" => Arg::Float(0.0),
            "one" => Arg::Float(1.0),
            "round" => self.oper1(Scalar::Int, "{d0} = (int)floor({s0} + 0.5);", vec![x]),
            "trunc" | "int" => self.oper1(Scalar::Int, "{d0} = (int){s0};", vec![x]),
            other => return Err(unknown(other, &[Type::Float])),
        })
    }

    fn complex_call(&mut self, func: &str, z: Arg) -> Result<Arg> {
        let d = Scalar::Double;
        match func {
            "ident" => Ok(z),
            "zero" => Ok(Arg::complex(Arg::Float(0.0), Arg::Float(0.0))),
            "one" => Ok(Arg::complex(Arg::Float(1.0), Arg::Float(0.0))),
            "sqr" => self.csqr(&z),
            "recip" => {
                let one = Arg::complex(Arg::Float(1.0), Arg::Float(0.0));
                self.cdiv(&one, &z)
            }
            "exp" => self.cexp(&z),
            "log" => self.clog(&z),
            "sqrt" => self.csqrt(&z),
            "sin" | "cos" | "sinh" | "cosh" => self.ctrig(func, &z),
            "tan" | "cotan" | "tanh" | "cotanh" => {
                let (sin, cos) = if func.ends_with('h') {
                    ("sinh", "cosh")
                } else {
                    ("sin", "cos")
                };
                let s = self.ctrig(sin, &z)?;
                let c = self.ctrig(cos, &z)?;
                if func.starts_with("co") {
                    self.cdiv(&c, &s)
                } else {
                    self.cdiv(&s, &c)
                }
            }
            "asin" => {
                // -i log(iz + sqrt(1 - z^2))
                let root = self.sqrt_one_minus_sqr(&z)?;
                let iz = times_i(self, &z)?;
                let sum = self.cadd(&iz, &root)?;
                let log = self.clog(&sum)?;
                times_minus_i(self, &log)
            }
            "acos" => {
                // -i log(z + i sqrt(1 - z^2))
                let root = self.sqrt_one_minus_sqr(&z)?;
                let iroot = times_i(self, &root)?;
                let sum = self.cadd(&z, &iroot)?;
                let log = self.clog(&sum)?;
                times_minus_i(self, &log)
            }
            "atan" => {
                // i/2 (log(1 - iz) - log(1 + iz))
                let one = Arg::complex(Arg::Float(1.0), Arg::Float(0.0));
                let iz = times_i(self, &z)?;
                let a = self.csub(&one, &iz)?;
                let b = self.cadd(&one, &iz)?;
                let la = self.clog(&a)?;
                let lb = self.clog(&b)?;
                let diff = self.csub(&la, &lb)?;
                let half = self.cscale(&diff, Arg::Float(0.5))?;
                times_i(self, &half)
            }
            "asinh" => {
                // log(z + sqrt(z^2 + 1))
                let one = Arg::complex(Arg::Float(1.0), Arg::Float(0.0));
                let sq = self.csqr(&z)?;
                let inner = self.cadd(&sq, &one)?;
                let root = self.csqrt(&inner)?;
                let sum = self.cadd(&z, &root)?;
                self.clog(&sum)
            }
            "acosh" => {
                // log(z + sqrt(z + 1) sqrt(z - 1))
                let one = Arg::complex(Arg::Float(1.0), Arg::Float(0.0));
                let plus = self.cadd(&z, &one)?;
                let minus = self.csub(&z, &one)?;
                let a = self.csqrt(&plus)?;
                let b = self.csqrt(&minus)?;
                let product = self.cmul(&a, &b)?;
                let sum = self.cadd(&z, &product)?;
                self.clog(&sum)
            }
            "atanh" => {
                // log((1 + z) / (1 - z)) / 2
                let one = Arg::complex(Arg::Float(1.0), Arg::Float(0.0));
                let num = self.cadd(&one, &z)?;
                let den = self.csub(&one, &z)?;
                let q = self.cdiv(&num, &den)?;
                let log = self.clog(&q)?;
                self.cscale(&log, Arg::Float(0.5))
            }
            "abs" | "round" | "floor" | "ceil" | "trunc" => {
                let template = match func {
                    "abs" => "{d0} = fabs({s0});",
                    "round" => "{d0} = floor({s0} + 0.5);",
                    "floor" => "{d0} = floor({s0});",
                    "ceil" => "{d0} = ceil({s0});",
                    _ => "{d0} = trunc({s0});",
                };
                let [re, im] = two(z)?;
                let re = self.oper1(d, template, vec![re]);
                let im = self.oper1(d, template, vec![im]);
                Ok(Arg::complex(re, im))
            }
            "conj" => {
                let [re, im] = two(z)?;
                let im = self.oper1(d, "{d0} = -{s0};", vec![im]);
                Ok(Arg::complex(re, im))
            }
            "flip" => {
                let [re, im] = two(z)?;
                Ok(Arg::complex(im, re))
            }
            "cabs" => {
                let [re, im] = two(z)?;
                Ok(self.oper1(d, "{d0} = hypot({s0}, {s1});", vec![re, im]))
            }
            "atan2" => {
                let [re, im] = two(z)?;
                Ok(self.oper1(d, "{d0} = atan2({s1}, {s0});", vec![re, im]))
            }
            "cmag" => self.magnitude(z),
            "real" => Ok(two(z)?[0].clone()),
            "imag" => Ok(two(z)?[1].clone()),
            "real2" | "imag2" => {
                let [re, im] = two(z)?;
                let part = if func == "real2" { re } else { im };
                Ok(self.dbin(ScalarOp::Mul, part.clone(), part))
            }
            "manhattan" | "manhattanish" | "max2" | "min2" | "quad" => {
                let template = match func {
                    "manhattan" => "{d0} = fabs({s0}) + fabs({s1});",
                    "manhattanish" => "{d0} = {s0} + {s1};",
                    "max2" => "{d0} = fmax({s0} * {s0}, {s1} * {s1});",
                    "min2" => "{d0} = fmin({s0} * {s0}, {s1} * {s1});",
                    _ => "{d0} = {s0} * {s0} * {s0} * {s0} + {s1} * {s1} * {s1} * {s1};",
                };
                let [re, im] = two(z)?;
                Ok(self.oper1(d, template, vec![re, im]))
            }
            other => Err(unknown(other, &[Type::Complex])),
        }
    }

    fn hyper_call(&mut self, func: &str, h: Arg) -> Result<Arg> {
        match func {
            "ident" => Ok(h),
            "sqr" => self.hmul(&h, &h),
            "cmag" => self.magnitude(h),
            "cabs" => {
                let m = self.magnitude(h)?;
                Ok(self.oper1(Scalar::Double, "{d0} = sqrt({s0});", vec![m]))
            }
            _ => {
                let [a, b, c, d] = four(h)?;
                match func {
                    "real" => Ok(a),
                    "imag" => Ok(b),
                    "hyper_ri" => Ok(Arg::complex(a, b)),
                    "hyper_jk" => Ok(Arg::complex(c, d)),
                    other => Err(unknown(other, &[Type::Hyper])),
                }
            }
        }
    }

    /// Sum of the squares of every part.
    fn magnitude(&mut self, x: Arg) -> Result<Arg> {
        let mut squares = x
            .into_parts()
            .into_iter()
            .map(|p| self.dbin(ScalarOp::Mul, p.clone(), p));
        let first = squares
            .next()
            .ok_or_else(|| CodegenError::internal("magnitude of an empty value"))?;
        let rest: Vec<Arg> = squares.collect();
        Ok(rest
            .into_iter()
            .fold(first, |acc, sq| self.dbin(ScalarOp::Add, acc, sq)))
    }

    /// `hsl(h, s, l, a)` or `hsv(h, s, v, a)` with the hue in `[0, 6)`.
    fn from_hue(&mut self, model: &str, args: Vec<Arg>) -> Arg {
        let dests = self.four_temps();
        self.emit(Insn::oper(
            format!(
                "{{ double t__c[4]; t__{}2rgb({{s0}}, {{s1}}, {{s2}}, {{s3}}, t__c); {{d0}} = t__c[0]; {{d1}} = t__c[1]; {{d2}} = t__c[2]; {{d3}} = t__c[3]; }}",
                model
            ),
            dests.to_vec(),
            args,
        ));
        Arg::color(dests)
    }

    /// `blend` mixes every channel by `amount`. `compose` lays `top` over
    /// `base` weighted by `amount` times the top alpha and keeps the base
    /// alpha.
    fn blend(&mut self, func: &str, base: Arg, top: Arg, amount: Arg) -> Result<Arg> {
        let base = four(base)?;
        let top = four(top)?;
        let weight = match func {
            "blend" => amount,
            "compose" => self.dbin(ScalarOp::Mul, amount, top[3].clone()),
            other => return Err(unknown(other, &[Type::Color, Type::Color, Type::Float])),
        };
        let mut parts = Vec::with_capacity(4);
        for (i, (b, t)) in base.into_iter().zip(top).enumerate() {
            if i == 3 && func == "compose" {
                parts.push(b);
                continue;
            }
            let diff = self.dbin(ScalarOp::Sub, t, b.clone());
            let scaled = self.dbin(ScalarOp::Mul, diff, weight.clone());
            parts.push(self.dbin(ScalarOp::Add, b, scaled));
        }
        rebuild(parts, Type::Color)
    }

    /// Blend modes: the color channels of `top` merged onto `base`, with the
    /// alpha of `top`.
    fn merge(&mut self, func: &str, base: Arg, top: Arg) -> Result<Arg> {
        match func {
            "mergenormal" => Ok(top),
            "mergemultiply" => {
                let [br, bg, bb, _] = four(base)?;
                let [tr, tg, tb, ta] = four(top)?;
                let r = self.dbin(ScalarOp::Mul, br, tr);
                let g = self.dbin(ScalarOp::Mul, bg, tg);
                let b = self.dbin(ScalarOp::Mul, bb, tb);
                Ok(Arg::color([r, g, b, ta]))
            }
            other => Err(unknown(other, &[Type::Color, Type::Color])),
        }
    }

    /// `gradient(handle, x)`: four color channels from the gradient object.
    fn gradient(&mut self, args: Vec<Arg>) -> Result<Arg> {
        let [handle, x] = <[Arg; 2]>::try_from(args)
            .map_err(|_| CodegenError::internal("gradient takes a handle and an index"))?;
        let dests = self.four_temps();
        self.emit(Insn::oper(
            "{ double t__c[4]; t__gradient({s0}, {s1}, t__c); {d0} = t__c[0]; {d1} = t__c[1]; {d2} = t__c[2]; {d3} = t__c[3]; }",
            dests.to_vec(),
            vec![handle, x],
        ));
        Ok(Arg::color(dests))
    }

    pub(super) fn cadd(&mut self, x: &Arg, y: &Arg) -> Result<Arg> {
        let ([a, b], [c, d]) = (two(x.clone())?, two(y.clone())?);
        let re = self.dbin(ScalarOp::Add, a, c);
        let im = self.dbin(ScalarOp::Add, b, d);
        Ok(Arg::complex(re, im))
    }

    pub(super) fn csub(&mut self, x: &Arg, y: &Arg) -> Result<Arg> {
        let ([a, b], [c, d]) = (two(x.clone())?, two(y.clone())?);
        let re = self.dbin(ScalarOp::Sub, a, c);
        let im = self.dbin(ScalarOp::Sub, b, d);
        Ok(Arg::complex(re, im))
    }

    fn cscale(&mut self, x: &Arg, k: Arg) -> Result<Arg> {
        let [a, b] = two(x.clone())?;
        let re = self.dbin(ScalarOp::Mul, a, k.clone());
        let im = self.dbin(ScalarOp::Mul, b, k);
        Ok(Arg::complex(re, im))
    }

    /// `(a + bi)(c + di) = (ac - bd) + (ad + bc)i`
    pub(super) fn cmul(&mut self, x: &Arg, y: &Arg) -> Result<Arg> {
        let ([a, b], [c, d]) = (two(x.clone())?, two(y.clone())?);
        let ac = self.dbin(ScalarOp::Mul, a.clone(), c.clone());
        let bd = self.dbin(ScalarOp::Mul, b.clone(), d.clone());
        let ad = self.dbin(ScalarOp::Mul, a, d);
        let bc = self.dbin(ScalarOp::Mul, b, c);
        let re = self.dbin(ScalarOp::Sub, ac, bd);
        let im = self.dbin(ScalarOp::Add, ad, bc);
        Ok(Arg::complex(re, im))
    }

    /// `(a + bi)^2 = (a^2 - b^2) + 2abi`
    pub(super) fn csqr(&mut self, x: &Arg) -> Result<Arg> {
        let [a, b] = two(x.clone())?;
        let aa = self.dbin(ScalarOp::Mul, a.clone(), a.clone());
        let bb = self.dbin(ScalarOp::Mul, b.clone(), b.clone());
        let re = self.dbin(ScalarOp::Sub, aa, bb);
        let ab = self.dbin(ScalarOp::Mul, a, b);
        let im = self.dbin(ScalarOp::Add, ab.clone(), ab);
        Ok(Arg::complex(re, im))
    }

    /// `((ac + bd) + (bc - ad)i) / (c^2 + d^2)`
    pub(super) fn cdiv(&mut self, x: &Arg, y: &Arg) -> Result<Arg> {
        let ([a, b], [c, d]) = (two(x.clone())?, two(y.clone())?);
        let cc = self.dbin(ScalarOp::Mul, c.clone(), c.clone());
        let dd = self.dbin(ScalarOp::Mul, d.clone(), d.clone());
        let denom = self.dbin(ScalarOp::Add, cc, dd);
        let ac = self.dbin(ScalarOp::Mul, a.clone(), c.clone());
        let bd = self.dbin(ScalarOp::Mul, b.clone(), d.clone());
        let bc = self.dbin(ScalarOp::Mul, b, c);
        let ad = self.dbin(ScalarOp::Mul, a, d);
        let re_num = self.dbin(ScalarOp::Add, ac, bd);
        let im_num = self.dbin(ScalarOp::Sub, bc, ad);
        let re = self.dbin(ScalarOp::Div, re_num, denom.clone());
        let im = self.dbin(ScalarOp::Div, im_num, denom);
        Ok(Arg::complex(re, im))
    }

    /// Quaternion-style product with commuting units: `ij = ji = k`,
    /// `i^2 = j^2 = -1`, `k^2 = 1`.
    pub(super) fn hmul(&mut self, x: &Arg, y: &Arg) -> Result<Arg> {
        let p = four(x.clone())?;
        let q = four(y.clone())?;
        // (sign, part of x, part of y) for each output part
        const TERMS: [[(bool, usize, usize); 4]; 4] = [
            [(true, 0, 0), (false, 1, 1), (false, 2, 2), (true, 3, 3)],
            [(true, 0, 1), (true, 1, 0), (false, 2, 3), (false, 3, 2)],
            [(true, 0, 2), (false, 1, 3), (true, 2, 0), (false, 3, 1)],
            [(true, 0, 3), (true, 1, 2), (true, 2, 1), (true, 3, 0)],
        ];
        let mut parts = Vec::with_capacity(4);
        for terms in TERMS {
            let mut acc: Option<Arg> = None;
            for (positive, i, j) in terms {
                let product = self.dbin(ScalarOp::Mul, p[i].clone(), q[j].clone());
                acc = Some(match acc {
                    None if positive => product,
                    None => self.oper1(Scalar::Double, "{d0} = -{s0};", vec![product]),
                    Some(sum) if positive => self.dbin(ScalarOp::Add, sum, product),
                    Some(sum) => self.dbin(ScalarOp::Sub, sum, product),
                });
            }
            parts.push(acc.ok_or_else(|| CodegenError::internal("empty hyper product"))?);
        }
        rebuild(parts, Type::Hyper)
    }

    /// `log|z| + i arg(z)`
    pub(super) fn clog(&mut self, z: &Arg) -> Result<Arg> {
        let [a, b] = two(z.clone())?;
        let re = self.oper1(Scalar::Double, "{d0} = log(hypot({s0}, {s1}));", vec![a.clone(), b.clone()]);
        let im = self.oper1(Scalar::Double, "{d0} = atan2({s1}, {s0});", vec![a, b]);
        Ok(Arg::complex(re, im))
    }

    /// `e^a (cos b + i sin b)`
    pub(super) fn cexp(&mut self, z: &Arg) -> Result<Arg> {
        let [a, b] = two(z.clone())?;
        let ea = self.oper1(Scalar::Double, "{d0} = exp({s0});", vec![a]);
        let cos = self.oper1(Scalar::Double, "{d0} = cos({s0});", vec![b.clone()]);
        let sin = self.oper1(Scalar::Double, "{d0} = sin({s0});", vec![b]);
        let re = self.dbin(ScalarOp::Mul, ea.clone(), cos);
        let im = self.dbin(ScalarOp::Mul, ea, sin);
        Ok(Arg::complex(re, im))
    }

    /// Principal square root, branch cut on the negative real axis.
    fn csqrt(&mut self, z: &Arg) -> Result<Arg> {
        let [a, b] = two(z.clone())?;
        let r = self.oper1(Scalar::Double, "{d0} = hypot({s0}, {s1});", vec![a.clone(), b.clone()]);
        let re = self.oper1(Scalar::Double, "{d0} = sqrt(({s0} + {s1}) * 0.5);", vec![r.clone(), a.clone()]);
        let im = self.oper1(
            Scalar::Double,
            "{d0} = copysign(sqrt(({s0} - {s1}) * 0.5), {s2});",
            vec![r, a, b],
        );
        Ok(Arg::complex(re, im))
    }

    fn sqrt_one_minus_sqr(&mut self, z: &Arg) -> Result<Arg> {
        let one = Arg::complex(Arg::Float(1.0), Arg::Float(0.0));
        let sq = self.csqr(z)?;
        let diff = self.csub(&one, &sq)?;
        self.csqrt(&diff)
    }

    /// `sin`, `cos`, `sinh` or `cosh` of a complex number.
    fn ctrig(&mut self, func: &str, z: &Arg) -> Result<Arg> {
        let [a, b] = two(z.clone())?;
        let d = Scalar::Double;
        let (re, im) = match func {
            "sin" => (
                "{d0} = sin({s0}) * cosh({s1});",
                "{d0} = cos({s0}) * sinh({s1});",
            ),
            "cos" => (
                "{d0} = cos({s0}) * cosh({s1});",
                "{d0} = -(sin({s0}) * sinh({s1}));",
            ),
            "sinh" => (
                "{d0} = sinh({s0}) * cos({s1});",
                "{d0} = cosh({s0}) * sin({s1});",
            ),
            "cosh" => (
                "{d0} = cosh({s0}) * cos({s1});",
                "{d0} = sinh({s0}) * sin({s1});",
            ),
            other => return Err(unknown(other, &[Type::Complex])),
        };
        let re = self.oper1(d, re, vec![a.clone(), b.clone()]);
        let im = self.oper1(d, im, vec![a, b]);
        Ok(Arg::complex(re, im))
    }

    /// `z^p` for real `p`, in polar form; zero stays zero.
    pub(super) fn cpow_real(&mut self, z: &Arg, p: Arg) -> Result<Arg> {
        let [a, b] = two(z.clone())?;
        let re = self.scalar_temp(Scalar::Double);
        let im = self.scalar_temp(Scalar::Double);
        self.emit(Insn::oper(
            "if ({s0} == 0.0 && {s1} == 0.0) { {d0} = 0.0; {d1} = 0.0; } else { double t__m = pow({s0} * {s0} + {s1} * {s1}, {s2} * 0.5); double t__t = atan2({s1}, {s0}) * {s2}; {d0} = t__m * cos(t__t); {d1} = t__m * sin(t__t); }",
            vec![re.clone(), im.clone()],
            vec![a, b, p],
        ));
        Ok(Arg::complex(re, im))
    }
}

fn single(args: Vec<Arg>) -> Result<Arg> {
    let [x] = <[Arg; 1]>::try_from(args)
        .map_err(|_| CodegenError::internal("expected one argument"))?;
    Ok(x)
}

fn times_i(cg: &mut CodeGen, z: &Arg) -> Result<Arg> {
    let [a, b] = two(z.clone())?;
    let re = cg.oper1(Scalar::Double, "{d0} = -{s0};", vec![b]);
    Ok(Arg::complex(re, a))
}

fn times_minus_i(cg: &mut CodeGen, z: &Arg) -> Result<Arg> {
    let [a, b] = two(z.clone())?;
    let im = cg.oper1(Scalar::Double, "{d0} = -{s0};", vec![a]);
    Ok(Arg::complex(b, im))
}

fn unknown(func: &str, types: &[Type]) -> CodegenError {
    let types: Vec<String> = types.iter().map(Type::to_string).collect();
    CodegenError::internal(format!(
        "no code for '{}' on ({})",
        func,
        types.join(", ")
    ))
}

#[cfg(test)]
mod tests {
    use super::super::CodegenOptions;
    use super::*;
    use frm_translate::SymbolTable;

    fn gen() -> CodeGen {
        CodeGen::new(&SymbolTable::new(None), CodegenOptions::default())
    }

    fn z() -> Arg {
        Arg::complex(Arg::temp("fz_re"), Arg::temp("fz_im"))
    }

    fn text(cg: &mut CodeGen) -> Vec<String> {
        cg.section(&[])
            .unwrap()
            .iter()
            .map(|i| i.format().unwrap())
            .collect()
    }

    #[test]
    fn test_cabs_uses_hypot() {
        let mut cg = gen();
        let r = cg.call("cabs", vec![(z(), Type::Complex)], Type::Float).unwrap();
        assert_eq!(r, Arg::temp("t__0"));
        assert_eq!(text(&mut cg), vec!["t__0 = hypot(fz_re, fz_im);"]);
    }

    #[test]
    fn test_real_and_imag_are_free() {
        let mut cg = gen();
        let r = cg.call("imag", vec![(z(), Type::Complex)], Type::Float).unwrap();
        assert_eq!(r, Arg::temp("fz_im"));
        assert!(text(&mut cg).is_empty());
    }

    #[test]
    fn test_every_complex_function_has_code() {
        for func in [
            "sin", "cos", "tan", "cotan", "sinh", "cosh", "tanh", "cotanh", "asin", "acos",
            "atan", "asinh", "acosh", "atanh", "exp", "log", "sqrt", "sqr", "ident", "zero",
            "one", "recip", "abs", "round", "floor", "ceil", "trunc", "conj", "flip",
        ] {
            let result = gen().call(func, vec![(z(), Type::Complex)], Type::Complex);
            assert!(result.is_ok(), "{} failed: {:?}", func, result);
            let result = gen().call(func, vec![(Arg::temp("fx"), Type::Float)], Type::Float);
            let expected_ok = !matches!(func, "conj" | "flip");
            assert_eq!(result.is_ok(), expected_ok, "real {}", func);
        }
    }

    #[test]
    fn test_rgb_gets_opaque_alpha() {
        let mut cg = gen();
        let c = cg
            .call(
                "rgb",
                vec![
                    (Arg::Float(1.0), Type::Float),
                    (Arg::Float(0.5), Type::Float),
                    (Arg::Float(0.0), Type::Float),
                ],
                Type::Color,
            )
            .unwrap();
        assert_eq!(c.parts()[3], &Arg::Float(1.0));
    }

    #[test]
    fn test_hyper_square_has_four_parts() {
        let h = Arg::hyper([
            Arg::temp("h_re"),
            Arg::temp("h_i"),
            Arg::temp("h_j"),
            Arg::temp("h_k"),
        ]);
        let mut cg = gen();
        let sq = cg.call("sqr", vec![(h, Type::Hyper)], Type::Hyper).unwrap();
        assert_eq!(sq.parts().len(), 4);
        let lines = text(&mut cg);
        // 16 products, 12 sums
        assert_eq!(lines.iter().filter(|l| l.contains(" * ")).count(), 16);
        assert_eq!(lines.len(), 28);
    }

    #[test]
    fn test_gradient_fills_four_channels() {
        let mut cg = gen();
        let c = cg
            .call(
                "gradient",
                vec![
                    (Arg::temp("t__a__gradient"), Type::Gradient),
                    (Arg::temp("fx"), Type::Float),
                ],
                Type::Color,
            )
            .unwrap();
        assert_eq!(c.parts().len(), 4);
        let lines = text(&mut cg);
        assert!(lines[0].contains("t__gradient(t__a__gradient, fx, t__c);"));
        assert!(lines[0].contains("t__3 = t__c[3];"));
    }

    #[test]
    fn test_int_of_float_truncates() {
        let mut cg = gen();
        cg.call("int", vec![(Arg::temp("fx"), Type::Float)], Type::Int).unwrap();
        assert_eq!(text(&mut cg), vec!["t__0 = (int)fx;"]);
    }

    #[test]
    fn test_color_constructor_keeps_alpha() {
        let args = [0.1, 0.2, 0.3, 0.4].map(|x| (Arg::Float(x), Type::Float)).to_vec();
        let c = gen().call("color", args, Type::Color).unwrap();
        assert_eq!(c.parts()[3], &Arg::Float(0.4));
    }

    #[test]
    fn test_min_max() {
        let mut cg = gen();
        let ints = vec![(Arg::temp("fi"), Type::Int), (Arg::temp("fj"), Type::Int)];
        cg.call("max", ints, Type::Int).unwrap();
        let floats = vec![(Arg::temp("fx"), Type::Float), (Arg::Float(1.0), Type::Float)];
        cg.call("min", floats, Type::Float).unwrap();
        assert_eq!(
            text(&mut cg),
            vec!["t__0 = fi > fj ? fi : fj;", "t__1 = fmin(fx, 1.0);"]
        );
    }

    #[test]
    fn test_distance_measures() {
        for func in ["real2", "imag2", "manhattan", "manhattanish", "max2", "min2", "quad"] {
            let mut cg = gen();
            let r = cg.call(func, vec![(z(), Type::Complex)], Type::Float);
            assert!(r.is_ok(), "{} failed: {:?}", func, r);
            assert_eq!(text(&mut cg).len(), 1, "{}", func);
        }
        let mut cg = gen();
        cg.call("manhattan", vec![(z(), Type::Complex)], Type::Float).unwrap();
        assert_eq!(text(&mut cg), vec!["t__0 = fabs(fz_re) + fabs(fz_im);"]);
    }

    #[test]
    fn test_hsl_goes_through_helper() {
        let mut cg = gen();
        let args = [2.0, 1.0, 0.5].map(|x| (Arg::Float(x), Type::Float)).to_vec();
        let c = cg.call("hsl", args, Type::Color).unwrap();
        assert_eq!(c.parts().len(), 4);
        let lines = text(&mut cg);
        assert!(lines[0].contains("t__hsl2rgb(2.0, 1.0, 0.5, 1.0, t__c);"), "{}", lines[0]);
    }

    #[test]
    fn test_hue_reads_helper_slot() {
        let mut cg = gen();
        let color = Arg::color([
            Arg::temp("fc_re"),
            Arg::temp("fc_i"),
            Arg::temp("fc_j"),
            Arg::temp("fc_k"),
        ]);
        cg.call("lum", vec![(color, Type::Color)], Type::Float).unwrap();
        let lines = text(&mut cg);
        assert!(lines[0].contains("t__rgb2hsl(fc_re, fc_i, fc_j, t__h); t__0 = t__h[2];"));
    }

    #[test]
    fn test_compose_keeps_base_alpha() {
        let base = Arg::color([Arg::temp("a0"), Arg::temp("a1"), Arg::temp("a2"), Arg::temp("a3")]);
        let top = Arg::color([Arg::temp("b0"), Arg::temp("b1"), Arg::temp("b2"), Arg::temp("b3")]);
        let args = vec![
            (base.clone(), Type::Color),
            (top.clone(), Type::Color),
            (Arg::temp("k"), Type::Float),
        ];
        let c = gen().call("compose", args, Type::Color).unwrap();
        assert_eq!(c.parts()[3], &Arg::temp("a3"));

        let merged = gen()
            .call("mergenormal", vec![(base, Type::Color), (top.clone(), Type::Color)], Type::Color)
            .unwrap();
        assert_eq!(merged, top);
    }

    #[test]
    fn test_unknown_function_is_internal_error() {
        assert!(gen()
            .call("nosuch", vec![(Arg::Float(1.0), Type::Float)], Type::Float)
            .is_err());
    }
}
