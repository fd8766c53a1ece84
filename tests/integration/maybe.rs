mod common;

use common::*;
use lowering::ast::{BinaryOp, Expr, Stmt};
use lowering::ir::eval::Val;
use lowering::sema::{SemType, TypeEnv};
use lowering::FunctionDef;

fn maybe_i32() -> SemType {
    SemType::maybe(SemType::i32())
}

fn m() -> Expr {
    var("m", maybe_i32())
}

fn x() -> Expr {
    var("x", SemType::i32())
}

fn just(v: i128) -> Val {
    Val::Agg(vec![i32v(0), i64v(v)])
}

fn nothing() -> Val {
    Val::Agg(vec![i32v(1), i64v(0)])
}

fn call(method: &str, args: Vec<Expr>, ret: SemType) -> Expr {
    Expr::method(m(), method, args).with_ty(ret)
}

fn on_maybe(name: &str, body: Expr, ret: SemType) -> FunctionDef {
    FunctionDef::new(name, ret, body).param("m", maybe_i32())
}

fn lower_one(body: Expr, ret: SemType) -> lowering::LoweringOutput {
    lower(on_maybe("f", body, ret))
}

fn payload(v: &Val) -> Option<i128> {
    match union_parts(v) {
        (0, Some(p)) => Some(as_int(p)),
        _ => None,
    }
}

// ── Construction ─────────────────────────────────────────────────

#[test]
fn just_and_nothing_layout() {
    let out = lower_in(
        TypeEnv::new(),
        vec![
            FunctionDef::new("some", maybe_i32(), Expr::just(x(), SemType::i32())).param("x", SemType::i32()),
            FunctionDef::new("none", maybe_i32(), Expr::nothing(SemType::i32())),
        ],
    );
    assert_clean(&out);
    assert!(out.module.to_string().starts_with("%Maybe__I32 = type { i32, i64 }"));
    assert_eq!(payload(&run(&out, "some", vec![i32v(-4)])), Some(-4));
    assert_eq!(union_parts(&run(&out, "none", vec![])).0, 1);
}

// ── Predicates and extractors ────────────────────────────────────

#[test]
fn tag_predicates() {
    let out = lower_in(
        TypeEnv::new(),
        vec![
            on_maybe("is_just", call("is_just", vec![], SemType::bool()), SemType::bool()),
            on_maybe("is_none", call("is_none", vec![], SemType::bool()), SemType::bool()),
        ],
    );
    assert!(as_bool(&run(&out, "is_just", vec![just(1)])));
    assert!(!as_bool(&run(&out, "is_just", vec![nothing()])));
    assert!(as_bool(&run(&out, "is_none", vec![nothing()])));
    assert_eq!(out.coverage.count("Maybe::is_just"), 1);
}

#[test]
fn unwrap_or_selects_default() {
    let out = lower_one(call("unwrap_or", vec![Expr::int(9)], SemType::i32()), SemType::i32());
    assert_clean(&out);
    assert!(function_ir(&out, "f").contains("select i1"));
    assert_eq!(as_int(&run(&out, "f", vec![just(5)])), 5);
    assert_eq!(as_int(&run(&out, "f", vec![nothing()])), 9);
}

#[test]
fn unwrap_or_else_runs_lambda_only_when_empty() {
    let lambda = Expr::lambda(&[], Expr::int(-1));
    let out = lower_one(call("unwrap_or_else", vec![lambda], SemType::i32()), SemType::i32());
    assert_clean(&out);
    let ir = function_ir(&out, "f");
    assert!(ir.contains("maybe_unwrap_or_else_nothing"), "{ir}");
    assert_eq!(as_int(&run(&out, "f", vec![just(3)])), 3);
    assert_eq!(as_int(&run(&out, "f", vec![nothing()])), -1);
}

#[test]
fn unwrap_or_default_uses_zero() {
    let out = lower_one(call("unwrap_or_default", vec![], SemType::i32()), SemType::i32());
    assert_eq!(as_int(&run(&out, "f", vec![nothing()])), 0);
    assert_eq!(as_int(&run(&out, "f", vec![just(8)])), 8);
}

// ── Combinators ──────────────────────────────────────────────────

#[test]
fn map_inlines_lambda_in_present_arm() {
    let double = Expr::lambda(&[("x", SemType::i32())], Expr::binary(BinaryOp::Mul, x(), Expr::int(2)));
    let out = lower_one(call("map", vec![double], maybe_i32()), maybe_i32());
    assert_clean(&out);
    let ir = function_ir(&out, "f");
    for label in ["maybe_map_just", "maybe_map_nothing", "maybe_map_end", "map_ret"] {
        assert!(ir.contains(label), "missing {label}:\n{ir}");
    }
    assert!(ir.contains("phi %Maybe__I32"), "{ir}");
    assert_eq!(payload(&run(&out, "f", vec![just(21)])), Some(42));
    assert_eq!(union_parts(&run(&out, "f", vec![nothing()])).0, 1);
    assert_eq!(out.coverage.count("Maybe::map"), 1);
}

#[test]
fn map_with_named_function() {
    let mut env = TypeEnv::new();
    env.add_func("negate", vec![SemType::i32()], SemType::i32());
    let negate = FunctionDef::new("negate", SemType::i32(), Expr::unary(lowering::ast::UnaryOp::Neg, x()))
        .param("x", SemType::i32());
    let f = on_maybe("f", call("map", vec![Expr::ident("negate")], maybe_i32()), maybe_i32());
    let out = lower_in(env, vec![negate, f]);
    assert_clean(&out);
    assert!(function_ir(&out, "f").contains("call i32 @tml_negate(i32"));
    assert_eq!(payload(&run(&out, "f", vec![just(6)])), Some(-6));
}

#[test]
fn return_inside_lambda_leaves_only_the_lambda() {
    let body = Expr::block(
        vec![Stmt::Expr(Expr::if_else(
            Expr::binary(BinaryOp::Gt, x(), Expr::int(100)),
            Expr::ret(Some(Expr::int(0))),
            None,
        ))],
        Some(Expr::binary(BinaryOp::Add, x(), Expr::int(1))),
    );
    let lambda = Expr::lambda(&[("x", SemType::i32())], body);
    let out = lower_one(call("map", vec![lambda], maybe_i32()), maybe_i32());
    assert_clean(&out);
    assert_eq!(payload(&run(&out, "f", vec![just(200)])), Some(0));
    assert_eq!(payload(&run(&out, "f", vec![just(5)])), Some(6));
}

#[test]
fn and_then_flattens() {
    let positive = Expr::if_else(
        Expr::binary(BinaryOp::Gt, x(), Expr::int(0)),
        Expr::just(x(), SemType::i32()),
        Some(Expr::nothing(SemType::i32())),
    )
    .with_ty(maybe_i32());
    let lambda = Expr::lambda(&[("x", SemType::i32())], positive);
    let out = lower_one(call("and_then", vec![lambda], maybe_i32()), maybe_i32());
    assert_clean(&out);
    assert_eq!(payload(&run(&out, "f", vec![just(4)])), Some(4));
    assert_eq!(union_parts(&run(&out, "f", vec![just(-4)])).0, 1);
    assert_eq!(union_parts(&run(&out, "f", vec![nothing()])).0, 1);
}

#[test]
fn filter_discards_rejected_payload() {
    let keep_big = Expr::lambda(&[("x", SemType::i32())], Expr::binary(BinaryOp::Gt, x(), Expr::int(3)));
    let out = lower_one(call("filter", vec![keep_big], maybe_i32()), maybe_i32());
    assert_clean(&out);
    assert!(function_ir(&out, "f").contains("maybe_filter_keep"));
    assert_eq!(payload(&run(&out, "f", vec![just(7)])), Some(7));
    assert_eq!(union_parts(&run(&out, "f", vec![just(2)])).0, 1);
}

#[test]
fn contains_compares_payload() {
    let out = lower_one(call("contains", vec![Expr::int(3)], SemType::bool()), SemType::bool());
    assert!(as_bool(&run(&out, "f", vec![just(3)])));
    assert!(!as_bool(&run(&out, "f", vec![just(4)])));
    assert!(!as_bool(&run(&out, "f", vec![nothing()])));
}

#[test]
fn map_or_applies_or_defaults() {
    let inc = Expr::lambda(&[("x", SemType::i32())], Expr::binary(BinaryOp::Add, x(), Expr::int(1)));
    let out = lower_one(call("map_or", vec![Expr::int(-1), inc], SemType::i32()), SemType::i32());
    assert_clean(&out);
    assert_eq!(as_int(&run(&out, "f", vec![just(1)])), 2);
    assert_eq!(as_int(&run(&out, "f", vec![nothing()])), -1);
}

#[test]
fn one_of_is_exclusive() {
    let other = maybe_i32();
    let body = call("one_of", vec![var("o", other.clone())], maybe_i32());
    let out = lower(on_maybe("f", body, maybe_i32()).param("o", other));
    assert_clean(&out);
    assert_eq!(payload(&run(&out, "f", vec![just(1), nothing()])), Some(1));
    assert_eq!(payload(&run(&out, "f", vec![nothing(), just(2)])), Some(2));
    assert_eq!(union_parts(&run(&out, "f", vec![just(1), just(2)])).0, 1);
    assert_eq!(union_parts(&run(&out, "f", vec![nothing(), nothing()])).0, 1);
}

#[test]
fn builtin_combinator_shadows_user_impl() {
    let mut env = TypeEnv::new();
    env.add_func("Maybe::map", vec![SemType::i32()], maybe_i32());
    let id = Expr::lambda(&[("x", SemType::i32())], x());
    let out = lower_in(env, vec![on_maybe("f", call("map", vec![id], maybe_i32()), maybe_i32())]);
    assert_clean(&out);
    assert!(!function_ir(&out, "f").contains("@tml_Maybe_map"));
}

// ── Argument diagnostics ─────────────────────────────────────────

#[test]
fn map_requires_a_lambda() {
    let out = lower_one(call("map", vec![Expr::int(1)], maybe_i32()), maybe_i32());
    assert_eq!(codes(&out), vec!["C016"]);
    assert_eq!(out.diagnostics[0].message, "map requires a closure argument");
}

#[test]
fn unknown_function_argument() {
    let out = lower_one(call("map", vec![Expr::ident("nope")], maybe_i32()), maybe_i32());
    assert_eq!(codes(&out), vec!["C017"]);
    assert_eq!(out.diagnostics[0].message, "'nope' is not a function");
}

#[test]
fn map_or_argument_checks() {
    let out = lower_one(call("map_or", vec![Expr::int(0)], SemType::i32()), SemType::i32());
    assert_eq!(codes(&out), vec!["C018"]);

    let out = lower_one(call("map_or", vec![Expr::int(0), Expr::int(1)], SemType::i32()), SemType::i32());
    assert_eq!(codes(&out), vec!["C020"]);
}

#[test]
fn unwrap_or_requires_default() {
    let out = lower_one(call("unwrap_or", vec![], SemType::i32()), SemType::i32());
    assert_eq!(codes(&out), vec!["C015"]);
}
