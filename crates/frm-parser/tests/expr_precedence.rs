//! Expression precedence and associativity tests.
//!
//! Expressions are parsed as the single statement of a one-line legacy
//! formula and dug back out of the tree.

use frm_ast::{BinaryOp, Expr, ExprKind, SectionBody, StmtKind, UnaryOp, Value};
use frm_parser::parse;

/// Helper to parse an expression from source.
fn parse_expr(source: &str) -> Expr {
    let formlist = parse(&format!("f {{\n{}\n}}\n", source)).expect("preprocess failed");
    let formula = &formlist.formulas[0];
    match &formula.sections[0].body {
        SectionBody::Stmts(stmts) => match &stmts[0].kind {
            StmtKind::Expr(e) => e.clone(),
            other => panic!("expected expression statement, got {:?}", other),
        },
        other => panic!("expected statements, got {:?}", other),
    }
}

fn binop(expr: &Expr) -> (BinaryOp, &Expr, &Expr) {
    match &expr.kind {
        ExprKind::Binop { op, left, right } => (*op, left, right),
        other => panic!("expected binop, got {:?}", other),
    }
}

fn id(expr: &Expr) -> &str {
    match &expr.kind {
        ExprKind::Id(name) => name,
        other => panic!("expected id, got {:?}", other),
    }
}

#[test]
fn test_mul_binds_tighter_than_add() {
    let e = parse_expr("a + b * c");
    let (op, left, right) = binop(&e);
    assert_eq!(op, BinaryOp::Add);
    assert_eq!(id(left), "a");
    assert_eq!(binop(right).0, BinaryOp::Mul);
}

#[test]
fn test_subtraction_left_associative() {
    let e = parse_expr("a - b - c");
    let (op, left, right) = binop(&e);
    assert_eq!(op, BinaryOp::Sub);
    assert_eq!(binop(left).0, BinaryOp::Sub);
    assert_eq!(id(right), "c");
}

#[test]
fn test_power_right_associative() {
    let e = parse_expr("a ^ b ^ c");
    let (op, left, right) = binop(&e);
    assert_eq!(op, BinaryOp::Pow);
    assert_eq!(id(left), "a");
    assert_eq!(binop(right).0, BinaryOp::Pow);
}

#[test]
fn test_negation_applies_after_power() {
    let e = parse_expr("-z^2");
    match &e.kind {
        ExprKind::Unop { op, operand } => {
            assert_eq!(*op, UnaryOp::Neg);
            assert_eq!(binop(operand).0, BinaryOp::Pow);
        }
        other => panic!("expected unop, got {:?}", other),
    }
}

#[test]
fn test_power_of_negative_exponent() {
    let e = parse_expr("z^-2");
    let (op, _, right) = binop(&e);
    assert_eq!(op, BinaryOp::Pow);
    assert!(matches!(right.kind, ExprKind::Unop { op: UnaryOp::Neg, .. }));
}

#[test]
fn test_negation_binds_tighter_than_mul() {
    let e = parse_expr("-a * b");
    let (op, left, _) = binop(&e);
    assert_eq!(op, BinaryOp::Mul);
    assert!(matches!(left.kind, ExprKind::Unop { .. }));
}

#[test]
fn test_and_or_share_a_level() {
    // Left associative at one level: (a || b) && c
    let e = parse_expr("a || b && c");
    let (op, left, right) = binop(&e);
    assert_eq!(op, BinaryOp::And);
    assert_eq!(binop(left).0, BinaryOp::Or);
    assert_eq!(id(right), "c");
}

#[test]
fn test_comparison_below_arithmetic() {
    let e = parse_expr("a + 1 < b * 2 && c");
    let (op, left, _) = binop(&e);
    assert_eq!(op, BinaryOp::And);
    let (cmp, l, r) = binop(left);
    assert_eq!(cmp, BinaryOp::Lt);
    assert_eq!(binop(l).0, BinaryOp::Add);
    assert_eq!(binop(r).0, BinaryOp::Mul);
}

#[test]
fn test_assignment_right_associative() {
    let e = parse_expr("a = b = 3");
    match &e.kind {
        ExprKind::Assign { target, value } => {
            assert_eq!(id(target), "a");
            assert!(matches!(value.kind, ExprKind::Assign { .. }));
        }
        other => panic!("expected assign, got {:?}", other),
    }
}

#[test]
fn test_assignment_below_boolean() {
    let e = parse_expr("a = b || c");
    match &e.kind {
        ExprKind::Assign { value, .. } => assert_eq!(binop(value).0, BinaryOp::Or),
        other => panic!("expected assign, got {:?}", other),
    }
}

#[test]
fn test_magnitude_is_cmag_call() {
    let e = parse_expr("|z| < 4");
    let (_, left, _) = binop(&e);
    match &left.kind {
        ExprKind::Funcall { name, args } => {
            assert_eq!(name, "cmag");
            assert_eq!(args.len(), 1);
        }
        other => panic!("expected funcall, got {:?}", other),
    }
}

#[test]
fn test_tuples() {
    match parse_expr("(1, 2)").kind {
        ExprKind::Funcall { name, args } => {
            assert_eq!(name, "complex");
            assert_eq!(args.len(), 2);
        }
        other => panic!("expected complex tuple, got {:?}", other),
    }
    match parse_expr("(1, 2, 3, 4)").kind {
        ExprKind::Funcall { name, .. } => assert_eq!(name, "hyper"),
        other => panic!("expected hyper tuple, got {:?}", other),
    }
}

#[test]
fn test_literals() {
    assert_eq!(parse_expr("3").as_const(), Some(&Value::Int(3)));
    assert_eq!(parse_expr("3.5").as_const(), Some(&Value::Float(3.5)));
    assert_eq!(parse_expr("2i").as_const(), Some(&Value::Complex(0.0, 2.0)));
    assert_eq!(parse_expr("true").as_const(), Some(&Value::Bool(true)));
}

#[test]
fn test_calls_and_lookups() {
    match parse_expr("sin(z + 1)").kind {
        ExprKind::Funcall { name, args } => {
            assert_eq!(name, "sin");
            assert_eq!(args.len(), 1);
        }
        other => panic!("expected funcall, got {:?}", other),
    }
    match parse_expr("arr[1, 2]").kind {
        ExprKind::ArrayLookup { name, indices } => {
            assert_eq!(name, "arr");
            assert_eq!(indices.len(), 2);
        }
        other => panic!("expected lookup, got {:?}", other),
    }
    match parse_expr("complex(1, 2)").kind {
        ExprKind::Funcall { name, .. } => assert_eq!(name, "complex"),
        other => panic!("expected constructor, got {:?}", other),
    }
}
