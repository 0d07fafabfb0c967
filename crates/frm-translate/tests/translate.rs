//! End-to-end translation of parsed formulas.

use frm_ast::{Type, Value};
use frm_parser::parse;
use frm_translate::{
    BAILOUT_VAR, ErrorKind, Exp, FormulaKind, MetaValue, Stm, TranslateOptions, TranslatedFormula,
    translate,
};

fn translate_src(src: &str, kind: FormulaKind, prefix: Option<&str>) -> TranslatedFormula {
    translate_with(src, kind, prefix, &TranslateOptions::default())
}

fn translate_with(
    src: &str,
    kind: FormulaKind,
    prefix: Option<&str>,
    options: &TranslateOptions,
) -> TranslatedFormula {
    let formlist = parse(src).expect("preprocess failed");
    translate(&formlist.formulas[0], kind, prefix, options)
}

fn fractal(src: &str) -> TranslatedFormula {
    translate_src(src, FormulaKind::Fractal, None)
}

fn kinds(f: &TranslatedFormula) -> Vec<ErrorKind> {
    f.diagnostics
        .iter()
        .filter(|d| d.is_error())
        .map(|d| d.kind)
        .collect()
}

fn visit_exp<'a>(e: &'a Exp, out: &mut Vec<&'a Exp>) {
    out.push(e);
    match e {
        Exp::Binop { left, right, .. } => {
            visit_exp(left, out);
            visit_exp(right, out);
        }
        Exp::Unop { operand, .. } => visit_exp(operand, out),
        Exp::Call { args, .. } => args.iter().for_each(|a| visit_exp(a, out)),
        Exp::Cast { expr, .. } => visit_exp(expr, out),
        Exp::ESeq { stm, exp, .. } => {
            visit_stm(stm, out);
            visit_exp(exp, out);
        }
        Exp::Var { .. } | Exp::Const { .. } => {}
    }
}

fn visit_stm<'a>(s: &'a Stm, out: &mut Vec<&'a Exp>) {
    match s {
        Stm::Move { dest, src } => {
            visit_exp(dest, out);
            visit_exp(src, out);
        }
        Stm::Seq(stms) => stms.iter().for_each(|s| visit_stm(s, out)),
        Stm::CJump { left, right, .. } => {
            visit_exp(left, out);
            visit_exp(right, out);
        }
        Stm::Exp(e) => visit_exp(e, out),
        Stm::Jump(_) | Stm::Label(_) => {}
    }
}

/// Names of every function called in a section.
fn calls(f: &TranslatedFormula, section: &str) -> Vec<String> {
    let mut exps = Vec::new();
    visit_stm(&f.sections[section], &mut exps);
    exps.iter()
        .filter_map(|e| match e {
            Exp::Call { func, .. } => Some(func.clone()),
            _ => None,
        })
        .collect()
}

fn flat(stm: &Stm) -> Vec<&Stm> {
    match stm {
        Stm::Seq(stms) => stms.iter().flat_map(flat).collect(),
        other => vec![other],
    }
}

#[test]
fn test_circle_default_params() {
    let f = fractal(
        "test_circle { loop: z = pixel bailout: |z| < @bailout default: float param bailout default = 4.0 endparam }",
    );
    assert!(f.errors().is_empty(), "{:?}", f.errors());
    assert_eq!(f.default_params(), vec![Value::Int(0), Value::Float(4.0)]);
    assert_eq!(f.params["bailout"].ty, Type::Float);

    let bailout = flat(&f.sections["bailout"]);
    match bailout.last() {
        Some(Stm::Move { dest, src }) => {
            assert_eq!(*dest, Exp::var(BAILOUT_VAR, Type::Bool));
            assert_eq!(src.ty(), Type::Bool);
        }
        other => panic!("expected bailout move, got {:?}", other),
    }
}

#[test]
fn test_undeclared_variables_are_complex() {
    let f = fractal("f {\ninit:\nx = (1,3)\ny = x\nint i = 4\nloop:\nbailout:\n|z| < 4\n}");
    assert!(f.errors().is_empty(), "{:?}", f.errors());
    assert_eq!(f.symbols.get_var("x").unwrap().ty, Type::Complex);
    assert_eq!(f.symbols.get_var("y").unwrap().ty, Type::Complex);
    assert_eq!(f.symbols.get_var("i").unwrap().ty, Type::Int);
    assert_eq!(f.symbols.get_var("i").unwrap().c_name(), "fi");
}

#[test]
fn test_type_error_names_types_and_expression() {
    let f = fractal("f {\ninit:\nint i = (1,2) + z\nbailout:\n|z| < 4\n}");
    let errors = f.errors();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].starts_with("3: "), "{}", errors[0]);
    assert!(errors[0].contains("complex"));
    assert!(errors[0].contains("expected int"));
}

#[test]
fn test_errors_accumulate() {
    let f = fractal("f {\ninit:\nsin = 1\nx = cos\nint i = \"s\"\nbailout:\n|z| < 4\n}");
    assert_eq!(
        kinds(&f),
        vec![ErrorKind::NoOverride, ErrorKind::NotAValue, ErrorKind::TypeMismatch]
    );
}

#[test]
fn test_missing_bailout_is_a_warning() {
    let f = fractal("f {\nloop:\nz = z*z + pixel\n}");
    assert!(!f.has_errors());
    assert!(f
        .warnings()
        .iter()
        .any(|w| w.contains("No bailout condition specified")));
}

#[test]
fn test_no_matching_overload() {
    let f = fractal("f {\nloop:\nz = sin(\"x\")\nbailout:\n|z| < 4\n}");
    let errors = f.errors();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("(string)"), "{}", errors[0]);
    assert!(errors[0].contains("'sin'"));
}

#[test]
fn test_legacy_two_argument_call() {
    let f = fractal("f {\nloop:\nz = exp(1, 0)\nbailout:\n|z| < 4\n}");
    assert!(f.errors().is_empty(), "{:?}", f.errors());
    assert_eq!(calls(&f, "loop"), vec!["exp"]);

    let f = fractal("f {\nloop:\nz = exp(z, z)\nbailout:\n|z| < 4\n}");
    assert_eq!(kinds(&f), vec![ErrorKind::NoMatchingOverload]);
}

#[test]
fn test_implicit_conversion_warns() {
    let f = fractal("f {\ninit:\nfloat r = 2.0\nw = r\nbailout:\n|z| < 4\n}");
    assert!(!f.has_errors());
    assert!(f
        .warnings()
        .iter()
        .any(|w| w.contains("conversion from float to complex")));
}

#[test]
fn test_constant_conversion_is_silent() {
    let f = fractal("f {\ninit:\nw = 1\nfloat r = 3\nbailout:\n|z| < 4\n}");
    assert!(f.diagnostics.is_empty(), "{:?}", f.diagnostics);
}

#[test]
fn test_and_is_short_circuit() {
    let f = fractal("f {\nloop:\nif |z| > 1 && real(z) < 2\nz = 0\nendif\nbailout:\n|z| < 4\n}");
    assert!(f.errors().is_empty(), "{:?}", f.errors());

    let mut exps = Vec::new();
    visit_stm(&f.sections["loop"], &mut exps);
    let eseq = exps
        .iter()
        .find_map(|e| match e {
            Exp::ESeq { stm, .. } => Some(flat(stm)),
            _ => None,
        })
        .expect("short-circuit lowers to an eseq");

    // move, cjump, label(rhs), move, jump, label(done)
    assert_eq!(eseq.len(), 6);
    match (eseq[1], eseq[2]) {
        (Stm::CJump { t, .. }, Stm::Label(rhs)) => assert_eq!(t, rhs),
        other => panic!("unexpected shape {:?}", other),
    }
    assert!(!exps
        .iter()
        .any(|e| matches!(e, Exp::Binop { op: frm_ast::BinaryOp::And, .. })));
}

#[test]
fn test_or_skips_rhs_when_true() {
    let f = fractal("f {\nloop:\nz = z\nbailout:\n|z| < 4 || real(z) > 0\n}");
    let mut exps = Vec::new();
    visit_stm(&f.sections["bailout"], &mut exps);
    let eseq = exps
        .iter()
        .find_map(|e| match e {
            Exp::ESeq { stm, .. } => Some(flat(stm)),
            _ => None,
        })
        .unwrap();
    match (eseq[1], eseq[2], eseq[5]) {
        (Stm::CJump { t, f, .. }, Stm::Label(rhs), Stm::Label(done)) => {
            assert_eq!(f, rhs);
            assert_eq!(t, done);
        }
        other => panic!("unexpected shape {:?}", other),
    }
}

#[test]
fn test_while_shape() {
    let f = fractal("f {\ninit:\nint i = 0\nwhile i < 3\ni = i + 1\nendwhile\nbailout:\n|z| < 4\n}");
    assert!(f.errors().is_empty(), "{:?}", f.errors());
    let stms = flat(&f.sections["init"]);
    // move, label(start), cjump, label(body), move, jump(start), label(done)
    match (stms[1], stms[2], stms[3], stms[5], stms[6]) {
        (
            Stm::Label(start),
            Stm::CJump { t, f: done, .. },
            Stm::Label(body),
            Stm::Jump(back),
            Stm::Label(end),
        ) => {
            assert_eq!(t, body);
            assert_eq!(back, start);
            assert_eq!(done, end);
        }
        other => panic!("unexpected shape {:?}", other),
    }
}

#[test]
fn test_non_boolean_condition_compared_to_zero() {
    let f = fractal("f {\ninit:\nint i = 2\nif i\nz = 1\nendif\nbailout:\n|z| < 4\n}");
    assert!(f.errors().is_empty(), "{:?}", f.errors());
    let stms = flat(&f.sections["init"]);
    match stms[1] {
        Stm::CJump { left, .. } => match left {
            Exp::Binop { op, right, .. } => {
                assert_eq!(*op, frm_ast::BinaryOp::Ne);
                assert_eq!(**right, Exp::constant(Value::Int(0)));
            }
            other => panic!("expected comparison, got {:?}", other),
        },
        other => panic!("expected cjump, got {:?}", other),
    }
}

#[test]
fn test_legacy_body_becomes_loop_and_bailout() {
    let f = fractal("mandel (XAXIS) {\nz = pixel:\nz = z*z + pixel, |z| <= 4\n}");
    assert!(f.errors().is_empty(), "{:?}", f.errors());
    assert!(f.sections.contains_key("init"));
    assert_eq!(flat(&f.sections["loop"]).len(), 1);
    assert_eq!(flat(&f.sections["bailout"]).len(), 1);
}

#[test]
fn test_explicit_section_conflict_warns() {
    let f = fractal("f {\nz = 1, |z| < 2\nbailout:\n|z| < 4\n}");
    assert!(!f.has_errors());
    assert!(f.warnings().iter().any(|w| w.contains("'bailout'")));
}

#[test]
fn test_enum_parameter() {
    let src = r#"f {
loop:
  if @mode == "two"
    z = z*z
  endif
bailout:
  |z| < 4
default:
  int param mode
    enum = "one" "two"
    default = "two"
  endparam
}"#;
    let f = fractal(src);
    assert!(f.errors().is_empty(), "{:?}", f.errors());
    assert_eq!(f.default_params(), vec![Value::Int(0), Value::Int(1)]);
    assert_eq!(f.params["mode"].enum_values, vec!["one", "two"]);

    let bad = fractal(&src.replace("== \"two\"", "== \"three\""));
    assert_eq!(kinds(&bad), vec![ErrorKind::UnknownEnumValue]);
}

#[test]
fn test_function_parameter_and_override() {
    let src = "f {\nloop:\nz = fn1(z) + @fn2(z)\nbailout:\n|z| < 4\ndefault:\nfunc fn1\ndefault = sin()\nendfunc\nfunc fn2\nendfunc\n}";
    let f = fractal(src);
    assert!(f.errors().is_empty(), "{:?}", f.errors());
    assert_eq!(calls(&f, "loop"), vec!["sin", "ident"]);

    let mut options = TranslateOptions::default();
    options.func_overrides.insert("fn1".into(), "cos".into());
    let f = translate_with(src, FormulaKind::Fractal, None, &options);
    assert_eq!(calls(&f, "loop"), vec!["cos", "ident"]);
    assert_eq!(f.funcs["fn1"].selected, "cos");
    assert_eq!(f.funcs["fn1"].default, "sin");
}

#[test]
fn test_default_metadata() {
    let f = fractal(
        "f {\nbailout:\n|z| < 4\ndefault:\ntitle = \"Mandel\"\nmaxiter = 256\ncenter = (-0.5, 0)\nmethod = multipass\n}",
    );
    assert!(f.errors().is_empty(), "{:?}", f.errors());
    assert_eq!(
        f.setting("title"),
        Some(&MetaValue::Strings(vec!["Mandel".into()]))
    );
    assert_eq!(f.setting("maxiter"), Some(&MetaValue::Value(Value::Int(256))));
    assert_eq!(
        f.setting("center"),
        Some(&MetaValue::Value(Value::Complex(-0.5, 0.0)))
    );
    assert_eq!(f.setting("method"), Some(&MetaValue::Ident("multipass".into())));
}

#[test]
fn test_arrays() {
    let f = fractal("f {\ninit:\nfloat arr[10]\narr[1] = 2\nw = arr[1]\nbailout:\n|z| < 4\n}");
    assert!(f.errors().is_empty(), "{:?}", f.errors());
    assert_eq!(f.symbols.get_var("arr").unwrap().dims, vec![10]);

    let f = fractal("f {\ninit:\nfloat arr[10]\nw = arr[1, 2]\nbailout:\n|z| < 4\n}");
    assert_eq!(kinds(&f), vec![ErrorKind::ArrayArity]);
}

#[test]
fn test_redeclaration_with_other_type() {
    let f = fractal("f {\ninit:\nint i = 1\nfloat i = 2\nbailout:\n|z| < 4\n}");
    assert_eq!(kinds(&f), vec![ErrorKind::Redeclaration]);
}

#[test]
fn test_syntax_errors_are_reported() {
    let f = fractal("f {\ninit:\nz = = 1\n}");
    assert_eq!(kinds(&f), vec![ErrorKind::Syntax]);
    assert!(f.errors()[0].contains("Syntax error"));
}

#[test]
fn test_colorfunc_injects_params_and_transfers_index() {
    let f = translate_src(
        "c {\nfinal:\n#index = 0.5\n#color = gradient(0.3)\n}",
        FormulaKind::ColorFunc,
        Some("cf0"),
    );
    assert!(f.errors().is_empty(), "{:?}", f.errors());

    let names: Vec<String> = f.symbols.parameters().map(|p| p.c_name()).collect();
    assert_eq!(
        names,
        vec!["t__a_cf0_density", "t__a_cf0_offset", "t__a__gradient"]
    );

    let stms = flat(&f.sections["final"]);
    match stms.last() {
        Some(Stm::Move { dest, src }) => {
            assert_eq!(*dest, Exp::var("t__h_index", Type::Float));
            assert!(matches!(src, Exp::Binop { op: frm_ast::BinaryOp::Add, .. }));
        }
        other => panic!("expected #index transfer, got {:?}", other),
    }

    match stms[1] {
        Stm::Move {
            src: Exp::Call { func, args, .. },
            ..
        } => {
            assert_eq!(func, "gradient");
            assert_eq!(args[0], Exp::var("t__a__gradient", Type::Gradient));
            assert!(matches!(args[1], Exp::Binop { .. }));
        }
        other => panic!("expected gradient call, got {:?}", other),
    }
}

#[test]
fn test_merge_appends_sections_and_slots() {
    let mut main = fractal(
        "test_circle { loop: z = pixel bailout: |z| < @bailout default: float param bailout default = 4.0 endparam }",
    );
    let outer = translate_src("c {\nfinal:\n#index = 0.5\n}", FormulaKind::ColorFunc, Some("cf0"));
    main.merge(&outer, "cf0");

    assert!(main.errors().is_empty(), "{:?}", main.errors());
    assert!(main.sections.contains_key("cf0_final"));
    assert_eq!(
        main.default_params(),
        vec![
            Value::Int(0),
            Value::Float(4.0),
            Value::Float(1.0),
            Value::Float(0.0)
        ]
    );
}

#[test]
fn test_translation_is_deterministic() {
    let src = "f {\ninit:\nint i = 0\nloop:\nz = z^2 + pixel\ni = i + 1\nbailout:\n|z| < 4 && i < 100\n}";
    assert_eq!(fractal(src), fractal(src));
}

#[test]
fn test_gradient_formula_records_settings() {
    let f = translate_src(
        "grad {\ngradient:\n  title=\"g\" smooth=no\n  index=0 color=5153516\n  index=399 color=0\n}",
        FormulaKind::GradientFunc,
        None,
    );
    assert!(f.errors().is_empty(), "{:?}", f.errors());
    assert!(f.sections.is_empty());
    let gradient = &f.metadata["gradient"];
    assert_eq!(gradient.len(), 6);
    assert_eq!(gradient[2], ("index".to_string(), MetaValue::Value(Value::Int(0))));
}

#[test]
fn test_transform_section() {
    let f = translate_src(
        "t {\ntransform:\n#pixel = #pixel * @scale\ndefault:\nfloat param scale\ndefault = 2.0\nendparam\n}",
        FormulaKind::Transform,
        Some("t0"),
    );
    assert!(f.errors().is_empty(), "{:?}", f.errors());
    assert!(f.sections.contains_key("transform"));
    assert_eq!(f.symbols.get_var("@scale").unwrap().c_name(), "t__a_t0scale");
}

/// Source of each move into a user variable in `section`, by C name.
fn moves<'a>(f: &'a TranslatedFormula, section: &str) -> Vec<(&'a str, &'a Exp)> {
    flat(&f.sections[section])
        .into_iter()
        .filter_map(|s| match s {
            Stm::Move {
                dest: Exp::Var { name, .. },
                src,
            } => Some((name.as_str(), src)),
            _ => None,
        })
        .collect()
}

#[test]
fn test_type_constructor_calls() {
    let f = fractal(
        "f {\ninit:\nfloat a = float(3)\nint i = int(2.7)\nfloat g = float(i)\nint k = int(g)\nbool b = bool(z)\ncolor c = color(0.5, g, 0, 1)\nbailout:\n|z| < 4\n}",
    );
    assert!(f.errors().is_empty(), "{:?}", f.errors());
    assert!(
        f.diagnostics
            .iter()
            .all(|d| d.kind != ErrorKind::ImplicitConversion),
        "{:?}",
        f.diagnostics
    );

    let init = moves(&f, "init");
    let src = |name: &str| {
        init.iter()
            .find(|(n, _)| *n == name)
            .map(|(_, e)| *e)
            .unwrap()
    };
    assert_eq!(src("fa"), &Exp::constant(Value::Float(3.0)));
    assert_eq!(src("fi"), &Exp::constant(Value::Int(2)));
    assert!(matches!(src("fg"), Exp::Cast { ty: Type::Float, .. }));
    assert!(matches!(src("fb"), Exp::Cast { ty: Type::Bool, .. }));
    assert_eq!(src("fc").ty(), Type::Color);

    let called = calls(&f, "init");
    assert!(called.contains(&"int".to_string()), "{:?}", called);
    assert!(called.contains(&"color".to_string()), "{:?}", called);
    assert!(!called.contains(&"float".to_string()));
    assert!(!called.contains(&"bool".to_string()));
}

#[test]
fn test_type_constructor_rejects_impossible_conversion() {
    let f = fractal("f {\ninit:\nint i = int(z)\nbailout:\n|z| < 4\n}");
    assert_eq!(kinds(&f), vec![ErrorKind::NoMatchingOverload]);
}

#[test]
fn test_errors_in_guarded_bodies_survive_a_bad_condition() {
    let f = fractal(
        "f {\ninit:\nif bogusfn(1) > 0\nfloat x = nosuch2\nendif\nwhile bogusfn2(1)\nfloat y = rgb(1,0,0)\nendwhile\nrepeat\nint k = (1,2)\nuntil bogusfn3(2)\nbailout:\n|z| < 4\n}",
    );
    let errors = f.errors();
    let lines: Vec<&str> = errors
        .iter()
        .filter_map(|e| e.split(':').next())
        .collect();
    assert_eq!(lines, ["3", "4", "6", "7", "10", "11"], "{:?}", errors);
    assert!(errors[0].contains("bogusfn"));
    assert!(errors[3].contains("expected float"), "{}", errors[3]);
}

#[test]
fn test_library_functions_for_colorings() {
    let f = translate_src(
        "c {\nfinal:\nfloat dist = manhattan(#z) + real2(#z) + min(1.0, 2.0) + max(3, 4)\ncolor col = blend(hsl(1.0, 0.5, 0.5), rgb(1, 0, 0), 0.25)\nfloat shade = hue(col) + lum(col) + sat(col)\n#color = compose(col, mergenormal(col, hsv(2.0, 1.0, 1.0)), 0.5)\n}",
        FormulaKind::ColorFunc,
        None,
    );
    assert!(f.errors().is_empty(), "{:?}", f.errors());
    let called = calls(&f, "final");
    for name in ["manhattan", "real2", "min", "max", "blend", "hsl", "hue", "compose", "hsv"] {
        assert!(called.iter().any(|c| c == name), "{} not in {:?}", name, called);
    }
}
