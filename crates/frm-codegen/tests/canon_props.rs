//! Canonicalization preserves meaning.
//!
//! Random programs over four int variables, with assignments buried inside
//! expressions and nested if/else shapes, are run twice: once directly from
//! their structure, once by interpreting the canonical statement list.

use std::collections::HashMap;

use frm_ast::{BinaryOp, Type, Value};
use frm_codegen::{Block, Canonicalizer};
use frm_translate::{Exp, Label, Stm};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum GExp {
    Var(usize),
    Const(i64),
    Bin(BinaryOp, Box<GExp>, Box<GExp>),
    /// `v = first`, then the value of `then`
    Assign(usize, Box<GExp>, Box<GExp>),
}

#[derive(Debug, Clone)]
enum GStm {
    Move(usize, GExp),
    /// `if a < b { .. } else { .. }`
    If(GExp, GExp, Vec<GStm>, Vec<GStm>),
    Seq(Vec<GStm>),
}

fn gexp() -> impl Strategy<Value = GExp> {
    let leaf = prop_oneof![
        (0..4usize).prop_map(GExp::Var),
        (-5i64..5).prop_map(GExp::Const),
    ];
    leaf.prop_recursive(4, 24, 3, |inner| {
        prop_oneof![
            (
                prop_oneof![
                    Just(BinaryOp::Add),
                    Just(BinaryOp::Sub),
                    Just(BinaryOp::Mul)
                ],
                inner.clone(),
                inner.clone()
            )
                .prop_map(|(op, a, b)| GExp::Bin(op, Box::new(a), Box::new(b))),
            (0..4usize, inner.clone(), inner)
                .prop_map(|(v, a, b)| GExp::Assign(v, Box::new(a), Box::new(b))),
        ]
    })
}

fn gstm() -> impl Strategy<Value = GStm> {
    let leaf = (0..4usize, gexp()).prop_map(|(v, e)| GStm::Move(v, e));
    leaf.prop_recursive(3, 16, 4, |inner| {
        prop_oneof![
            (
                gexp(),
                gexp(),
                prop::collection::vec(inner.clone(), 0..3),
                prop::collection::vec(inner.clone(), 0..3)
            )
                .prop_map(|(a, b, t, f)| GStm::If(a, b, t, f)),
            prop::collection::vec(inner, 1..4).prop_map(GStm::Seq),
        ]
    })
}

fn arith(op: BinaryOp, a: i64, b: i64) -> i64 {
    match op {
        BinaryOp::Add => a.wrapping_add(b),
        BinaryOp::Sub => a.wrapping_sub(b),
        BinaryOp::Mul => a.wrapping_mul(b),
        other => panic!("no arithmetic for {}", other),
    }
}

fn compare(op: BinaryOp, a: i64, b: i64) -> bool {
    match op {
        BinaryOp::Lt => a < b,
        BinaryOp::Le => a <= b,
        BinaryOp::Gt => a > b,
        BinaryOp::Ge => a >= b,
        BinaryOp::Eq => a == b,
        BinaryOp::Ne => a != b,
        other => panic!("no comparison for {}", other),
    }
}

fn eval(e: &GExp, env: &mut [i64; 4]) -> i64 {
    match e {
        GExp::Var(v) => env[*v],
        GExp::Const(c) => *c,
        GExp::Bin(op, a, b) => {
            let x = eval(a, env);
            let y = eval(b, env);
            arith(*op, x, y)
        }
        GExp::Assign(v, first, then) => {
            env[*v] = eval(first, env);
            eval(then, env)
        }
    }
}

fn exec(s: &GStm, env: &mut [i64; 4]) {
    match s {
        GStm::Move(v, e) => env[*v] = eval(e, env),
        GStm::If(a, b, t, f) => {
            let x = eval(a, env);
            let y = eval(b, env);
            let branch = if x < y { t } else { f };
            branch.iter().for_each(|s| exec(s, env));
        }
        GStm::Seq(stms) => stms.iter().for_each(|s| exec(s, env)),
    }
}

fn var(v: usize) -> Exp {
    Exp::var(format!("v{}", v), Type::Int)
}

fn lower_exp(e: &GExp) -> Exp {
    match e {
        GExp::Var(v) => var(*v),
        GExp::Const(c) => Exp::constant(Value::Int(*c)),
        GExp::Bin(op, a, b) => Exp::binop(*op, lower_exp(a), lower_exp(b), Type::Int),
        GExp::Assign(v, first, then) => {
            Exp::eseq(Stm::mov(var(*v), lower_exp(first)), lower_exp(then))
        }
    }
}

fn lower(s: &GStm, labels: &mut usize) -> Stm {
    match s {
        GStm::Move(v, e) => Stm::mov(var(*v), lower_exp(e)),
        GStm::If(a, b, t, f) => {
            let mut fresh = |what: &str| {
                *labels += 1;
                Label::new(format!("{}{}", what, labels))
            };
            let (lt, lf, done) = (fresh("then"), fresh("else"), fresh("done"));
            let mut stms = vec![
                Stm::CJump {
                    op: BinaryOp::Lt,
                    left: lower_exp(a),
                    right: lower_exp(b),
                    t: lt.clone(),
                    f: lf.clone(),
                },
                Stm::Label(lt),
            ];
            stms.extend(t.iter().map(|s| lower(s, labels)));
            stms.push(Stm::Jump(done.clone()));
            stms.push(Stm::Label(lf));
            stms.extend(f.iter().map(|s| lower(s, labels)));
            stms.push(Stm::Label(done));
            Stm::Seq(stms)
        }
        GStm::Seq(stms) => Stm::Seq(stms.iter().map(|s| lower(s, labels)).collect()),
    }
}

fn pure(e: &Exp, env: &HashMap<String, i64>) -> i64 {
    match e {
        Exp::Var { name, .. } => env.get(name).copied().unwrap_or(0),
        Exp::Const {
            value: Value::Int(c),
            ..
        } => *c,
        Exp::Binop { op, left, right, .. } => arith(*op, pure(left, env), pure(right, env)),
        other => panic!("impure or unexpected expression {:?}", other),
    }
}

fn run(stms: &[Stm], env: &mut HashMap<String, i64>) {
    let labels: HashMap<&Label, usize> = stms
        .iter()
        .enumerate()
        .filter_map(|(i, s)| match s {
            Stm::Label(l) => Some((l, i)),
            _ => None,
        })
        .collect();
    let mut pc = 0;
    let mut fuel = 100_000;
    while pc < stms.len() {
        fuel -= 1;
        assert!(fuel > 0, "canonical program does not terminate");
        match &stms[pc] {
            Stm::Move {
                dest: Exp::Var { name, .. },
                src,
            } => {
                let value = pure(src, env);
                env.insert(name.clone(), value);
                pc += 1;
            }
            Stm::CJump {
                op,
                left,
                right,
                t,
                f,
            } => {
                let target = if compare(*op, pure(left, env), pure(right, env)) {
                    t
                } else {
                    f
                };
                pc = labels[target];
            }
            Stm::Jump(l) => pc = labels[l],
            Stm::Label(_) => pc += 1,
            other => panic!("unexpected canonical statement {:?}", other),
        }
    }
}

fn has_eseq(e: &Exp) -> bool {
    match e {
        Exp::ESeq { .. } => true,
        Exp::Binop { left, right, .. } => has_eseq(left) || has_eseq(right),
        Exp::Unop { operand, .. } => has_eseq(operand),
        Exp::Call { args, .. } => args.iter().any(has_eseq),
        Exp::Cast { expr, .. } => has_eseq(expr),
        Exp::Var { .. } | Exp::Const { .. } => false,
    }
}

proptest! {
    #[test]
    fn canonical_form_evaluates_identically(
        program in prop::collection::vec(gstm(), 1..5),
        start in prop::array::uniform4(-10i64..10),
    ) {
        let mut counter = 0;
        let tree = Stm::Seq(program.iter().map(|s| lower(s, &mut counter)).collect());

        let mut expected = start;
        program.iter().for_each(|s| exec(s, &mut expected));

        let canonical = Canonicalizer::new().canonicalize(&tree).unwrap();
        let mut env: HashMap<String, i64> = (0..4).map(|i| (format!("v{}", i), start[i])).collect();
        run(&canonical, &mut env);

        for (i, want) in expected.iter().enumerate() {
            prop_assert_eq!(env[&format!("v{}", i)], *want);
        }
    }

    #[test]
    fn canonical_form_is_flat_and_scheduled(program in prop::collection::vec(gstm(), 1..5)) {
        let mut counter = 0;
        let tree = Stm::Seq(program.iter().map(|s| lower(s, &mut counter)).collect());
        let canonical = Canonicalizer::new().canonicalize(&tree).unwrap();

        let defined: Vec<&Label> = canonical
            .iter()
            .filter_map(|s| match s {
                Stm::Label(l) => Some(l),
                _ => None,
            })
            .collect();
        for (i, stm) in canonical.iter().enumerate() {
            match stm {
                Stm::Seq(_) => prop_assert!(false, "nested sequence at {}", i),
                Stm::Move { dest, src } => prop_assert!(!has_eseq(dest) && !has_eseq(src)),
                Stm::Exp(e) => prop_assert!(!has_eseq(e)),
                Stm::CJump { left, right, t, f, .. } => {
                    prop_assert!(!has_eseq(left) && !has_eseq(right));
                    prop_assert_eq!(canonical.get(i + 1), Some(&Stm::Label(f.clone())));
                    prop_assert!(defined.contains(&t));
                }
                Stm::Jump(l) => prop_assert!(defined.contains(&l)),
                Stm::Label(_) => {}
            }
        }
    }

    #[test]
    fn basic_blocks_are_well_formed(program in prop::collection::vec(gstm(), 1..5)) {
        let mut counter = 0;
        let tree = Stm::Seq(program.iter().map(|s| lower(s, &mut counter)).collect());
        let mut canon = Canonicalizer::new();
        let linear = canon.linearize(&tree).unwrap();
        let (blocks, _) = canon.basic_blocks(linear);
        prop_assert!(blocks.iter().all(Block::is_well_formed));
    }
}
