//! Formula-level parsing: sections, settings, statements and recovery.

use frm_ast::{
    NAMELESS_LOOP_SECTION, NAMELESS_SECTION, SectionBody, SetValue, Setting, SettingKind, Stmt,
    StmtKind, Type,
};
use frm_lexer::tokenize;
use frm_parser::{OrphanSyntaxErrorPolicy, ParseErrorKind, parse, parse_tokens_with};

fn stmts(body: &SectionBody) -> &[Stmt] {
    match body {
        SectionBody::Stmts(s) => s,
        other => panic!("expected statements, got {:?}", other),
    }
}

fn settings(body: &SectionBody) -> &[Setting] {
    match body {
        SectionBody::Settings(s) => s,
        other => panic!("expected settings, got {:?}", other),
    }
}

#[test]
fn test_one_line_formula_with_sections() {
    let src = "test_circle { loop: z = pixel bailout: |z| < @bailout default: float param bailout default = 4.0 endparam }";
    let formlist = parse(src).unwrap();
    assert_eq!(formlist.formulas.len(), 1);

    let f = &formlist.formulas[0];
    assert_eq!(f.id, "test_circle");
    assert_eq!(f.syntax_errors().count(), 0);
    let names: Vec<&str> = f.sections.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["loop", "bailout", "default"]);

    let default = settings(&f.section("default").unwrap().body);
    match &default[0].kind {
        SettingKind::Param { ty, name, settings } => {
            assert_eq!(*ty, Some(Type::Float));
            assert_eq!(name, "bailout");
            assert!(matches!(
                Setting::find(settings, "default"),
                Some(SetValue::Expr(_))
            ));
        }
        other => panic!("expected param, got {:?}", other),
    }
}

#[test]
fn test_multiline_sections() {
    let src = r#"
Mandelbrot {
init:
  z = 0
loop:
  z = z^2 + #pixel
bailout:
  |z| < @bailout
default:
  title = "Mandelbrot"
  param bailout
    caption = "Bailout value"
    default = 4.0
    min = 1
  endparam
  func fn1
    default = sin()
  endfunc
  int param mode
    enum = "one" "two" "three"
  endparam
}
"#;
    let formlist = parse(src).unwrap();
    let f = &formlist.formulas[0];
    assert_eq!(f.id, "Mandelbrot");
    assert_eq!(f.pos, 2);
    assert_eq!(f.syntax_errors().count(), 0);

    let default = settings(&f.section("default").unwrap().body);
    assert!(matches!(
        Setting::find(default, "title"),
        Some(SetValue::Strings(s)) if s == &vec!["Mandelbrot".to_string()]
    ));
    let func = default
        .iter()
        .find_map(|s| match &s.kind {
            SettingKind::Func { name, settings, .. } if name == "fn1" => Some(settings),
            _ => None,
        })
        .unwrap();
    assert_eq!(
        Setting::find(func, "default"),
        Some(&SetValue::FuncRef("sin".into()))
    );
    let mode = default
        .iter()
        .find_map(|s| match &s.kind {
            SettingKind::Param { name, settings, ty } if name == "mode" => Some((ty, settings)),
            _ => None,
        })
        .unwrap();
    assert_eq!(*mode.0, Some(Type::Int));
    assert!(matches!(
        Setting::find(mode.1, "enum"),
        Some(SetValue::Strings(s)) if s.len() == 3
    ));
}

#[test]
fn test_legacy_body_is_nameless() {
    let formlist = parse("old {\nz = z*z + c\n|z| < 4\n}\n").unwrap();
    let f = &formlist.formulas[0];
    assert_eq!(f.sections.len(), 1);
    assert_eq!(f.sections[0].name, NAMELESS_SECTION);
    assert_eq!(stmts(&f.sections[0].body).len(), 2);
}

#[test]
fn test_fractint_colon_separator() {
    let formlist = parse("frac (XAXIS) {\nz = pixel, c = z:\nz = z*z + c, |z| < 4\n}").unwrap();
    let f = &formlist.formulas[0];
    assert_eq!(f.id, "frac");
    assert_eq!(f.symmetry.as_deref(), Some("XAXIS"));
    assert_eq!(f.sections[0].name, NAMELESS_SECTION);
    assert_eq!(stmts(&f.sections[0].body).len(), 2);
    assert_eq!(f.sections[1].name, NAMELESS_LOOP_SECTION);
    assert_eq!(stmts(&f.sections[1].body).len(), 2);
}

#[test]
fn test_control_flow() {
    let src = r#"
cf {
loop:
  if x > 1
    y = 1
  elseif x > 0
    y = 2
  else
    y = 3
  endif
  while i < 10
    i = i + 1
  endwhile
  repeat
    i = i - 1
  until i == 0
}
"#;
    let formlist = parse(src).unwrap();
    let f = &formlist.formulas[0];
    assert_eq!(f.syntax_errors().count(), 0);
    let body = stmts(&f.section("loop").unwrap().body);
    assert_eq!(body.len(), 3);

    match &body[0].kind {
        StmtKind::If { then, otherwise, .. } => {
            assert_eq!(then.len(), 1);
            assert_eq!(otherwise.len(), 1);
            match &otherwise[0].kind {
                StmtKind::If { otherwise, .. } => assert_eq!(otherwise.len(), 1),
                other => panic!("expected nested if, got {:?}", other),
            }
        }
        other => panic!("expected if, got {:?}", other),
    }
    assert!(matches!(body[1].kind, StmtKind::While { .. }));
    assert!(matches!(body[2].kind, StmtKind::Repeat { .. }));
}

#[test]
fn test_declarations() {
    let src = "d {\ninit:\nint i = 4\ncomplex z\nfloat arr[10]\ncomplex w = complex(1, 2)\n}";
    let formlist = parse(src).unwrap();
    let body = stmts(&formlist.formulas[0].section("init").unwrap().body);
    assert!(matches!(
        &body[0].kind,
        StmtKind::Decl { ty: Type::Int, name, init: Some(_) } if name == "i"
    ));
    assert!(matches!(
        &body[1].kind,
        StmtKind::Decl { ty: Type::Complex, init: None, .. }
    ));
    assert!(matches!(
        &body[2].kind,
        StmtKind::DeclArray { ty: Type::Float, dims, .. } if dims.len() == 1
    ));
    assert!(matches!(&body[3].kind, StmtKind::Decl { init: Some(_), .. }));
}

#[test]
fn test_error_isolated_to_one_formula() {
    let src = "good1 {\nz = 1\n}\nbad {\nz = = 2\n}\ngood2 {\nz = 3\n}\n";
    let formlist = parse(src).unwrap();
    assert_eq!(formlist.formulas.len(), 3);

    assert_eq!(formlist.formulas[0].syntax_errors().count(), 0);
    let errors: Vec<_> = formlist.formulas[1].syntax_errors().collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].line, 5);
    assert!(errors[0].message.starts_with("Syntax error"));
    assert_eq!(formlist.formulas[2].syntax_errors().count(), 0);
    assert_eq!(formlist.formulas[2].id, "good2");
}

#[test]
fn test_unterminated_formula_reports_error() {
    let formlist = parse("open {\nz = 1\n").unwrap();
    assert_eq!(formlist.formulas.len(), 1);
    assert_eq!(formlist.formulas[0].syntax_errors().count(), 1);
}

#[test]
fn test_lexical_error_inside_formula() {
    let formlist = parse("bad {\nz = 1 $ 2\n}\n").unwrap();
    assert_eq!(formlist.formulas[0].syntax_errors().count(), 1);
}

#[test]
fn test_orphan_errors_discarded_by_default() {
    let src = "stray junk = 1\nok {\nz = 1\n}\n";
    let formlist = parse(src).unwrap();
    assert_eq!(formlist.formulas.len(), 1);
    assert_eq!(formlist.formulas[0].id, "ok");
    assert_eq!(formlist.formulas[0].syntax_errors().count(), 0);
}

#[test]
fn test_orphan_errors_collected_on_request() {
    let lexemes = tokenize("stray junk\nok {\nz = 1\n}\n");
    let (formlist, orphans) = parse_tokens_with(&lexemes, OrphanSyntaxErrorPolicy::Collect);
    assert_eq!(formlist.formulas.len(), 1);
    assert_eq!(orphans.len(), 1);
    assert_eq!(orphans[0].kind, ParseErrorKind::UnexpectedToken);
    assert_eq!(orphans[0].line, 1);
}

#[test]
fn test_last_line_and_source_text() {
    let src = "a {\nz = 1\n}\n\nb {\nz = 2\n}";
    let formlist = parse(src).unwrap();
    assert_eq!(formlist.formulas[0].last_line, 4);
    assert_eq!(formlist.formulas[1].pos, 5);
    assert_eq!(formlist.formulas[1].last_line, 7);
    assert_eq!(
        formlist.formulas[1].source_text(src),
        "b {\nz = 2\n}"
    );
}

#[test]
fn test_comment_formula_and_comments_ignored() {
    let src = "comment {\n anything { here\n}\n; a comment\nreal {\nz = 1 ; trailing\n}\n";
    let formlist = parse(src).unwrap();
    assert_eq!(formlist.formulas.len(), 1);
    assert_eq!(formlist.formulas[0].id, "real");
    assert_eq!(formlist.formulas[0].pos, 5);
}

#[test]
fn test_preprocessor_applied() {
    let src = "$define fast\nf {\n$ifdef fast\nz = 1\n$else\nz = 2, w = 3\n$endif\n}\n";
    let formlist = parse(src).unwrap();
    let body = stmts(&formlist.formulas[0].sections[0].body);
    assert_eq!(body.len(), 1);
    assert_eq!(body[0].pos, 4);
}

#[test]
fn test_preprocessor_error_is_fatal() {
    assert!(parse("$ifdef x\nf {\n}\n").is_err());
}

#[test]
fn test_gradient_settings_share_lines() {
    let src = "grad {\ngradient:\n  title=\"g\" smooth=no\n  index=0 color=5153516\n  index=399 color=0\n}";
    let formlist = parse(src).unwrap();
    let f = &formlist.formulas[0];
    assert_eq!(f.syntax_errors().count(), 0);
    assert_eq!(settings(&f.section("gradient").unwrap().body).len(), 6);
}
