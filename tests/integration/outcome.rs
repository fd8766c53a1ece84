mod common;

use common::*;
use lowering::ast::{BinaryOp, Expr};
use lowering::config::LowerConfig;
use lowering::ir::eval::{Evaluator, Val};
use lowering::sema::{SemType, TypeEnv};
use lowering::FunctionDef;

fn res() -> SemType {
    SemType::outcome(SemType::i32(), SemType::i32())
}

fn r() -> Expr {
    var("r", res())
}

fn e() -> Expr {
    var("e", SemType::i32())
}

fn ok(v: i128) -> Val {
    Val::Agg(vec![i32v(0), i64v(v)])
}

fn err(v: i128) -> Val {
    Val::Agg(vec![i32v(1), i64v(v)])
}

fn call(method: &str, args: Vec<Expr>, ret: SemType) -> Expr {
    Expr::method(r(), method, args).with_ty(ret)
}

fn lower_one(body: Expr, ret: SemType) -> lowering::LoweringOutput {
    lower(FunctionDef::new("f", ret, body).param("r", res()))
}

fn inc(name: &str, by: i128) -> Expr {
    Expr::lambda(&[(name, SemType::i32())], Expr::binary(BinaryOp::Add, var(name, SemType::i32()), Expr::int(by)))
}

fn parts(v: &Val) -> (i128, i128) {
    let (tag, payload) = union_parts(v);
    (tag, payload.map(as_int).unwrap_or_default())
}

// ── Construction ─────────────────────────────────────────────────

#[test]
fn variants_carry_tags() {
    let str_res = SemType::outcome(SemType::i32(), SemType::str());
    let ok_body = Expr::variant("Outcome", "Ok", Some(Expr::int(5))).with_ty(str_res.clone());
    let err_body = Expr::variant("Outcome", "Err", Some(Expr::str("bad"))).with_ty(str_res.clone());
    let out = lower_in(
        TypeEnv::new(),
        vec![FunctionDef::new("good", str_res.clone(), ok_body), FunctionDef::new("bad", str_res, err_body)],
    );
    assert_clean(&out);
    assert!(out.module.to_string().contains("%Outcome__I32__Str = type { i32, i64 }"));
    assert_eq!(parts(&run(&out, "good", vec![])), (0, 5));
    assert_eq!(union_parts(&run(&out, "bad", vec![])).0, 1);
}

#[test]
fn untyped_err_defaults_ok_side_to_unit() {
    let body = Expr::variant("Outcome", "Err", Some(Expr::str("bad")));
    let ty = SemType::outcome(SemType::unit(), SemType::str());
    let out = lower(FunctionDef::new("f", ty, body));
    assert!(out.module.to_string().contains("%Outcome__Unit__Str"));
}

// ── Predicates and extractors ────────────────────────────────────

#[test]
fn is_ok_and_unwrap_or() {
    let out = lower_in(
        TypeEnv::new(),
        vec![
            FunctionDef::new("is_ok", SemType::bool(), call("is_ok", vec![], SemType::bool())).param("r", res()),
            FunctionDef::new("or", SemType::i32(), call("unwrap_or", vec![Expr::int(-1)], SemType::i32()))
                .param("r", res()),
        ],
    );
    assert_clean(&out);
    assert!(as_bool(&run(&out, "is_ok", vec![ok(1)])));
    assert!(!as_bool(&run(&out, "is_ok", vec![err(1)])));
    assert_eq!(as_int(&run(&out, "or", vec![ok(8)])), 8);
    assert_eq!(as_int(&run(&out, "or", vec![err(8)])), -1);
    assert_eq!(out.coverage.count("Outcome::unwrap_or"), 1);
}

#[test]
fn unwrap_err_reads_error_payload() {
    let out = lower_one(call("unwrap_err", vec![], SemType::i32()), SemType::i32());
    assert_eq!(as_int(&run(&out, "f", vec![err(33)])), 33);
}

#[test]
fn unwrap_or_else_passes_the_error() {
    let double = Expr::lambda(&[("e", SemType::i32())], Expr::binary(BinaryOp::Mul, e(), Expr::int(2)));
    let out = lower_one(call("unwrap_or_else", vec![double], SemType::i32()), SemType::i32());
    assert_clean(&out);
    assert!(function_ir(&out, "f").contains("outcome_unwrap_or_else_err"));
    assert_eq!(as_int(&run(&out, "f", vec![err(7)])), 14);
    assert_eq!(as_int(&run(&out, "f", vec![ok(7)])), 7);
}

#[test]
fn ok_and_err_convert_to_maybe() {
    let maybe = SemType::maybe(SemType::i32());
    let out = lower_in(
        TypeEnv::new(),
        vec![
            FunctionDef::new("ok", maybe.clone(), call("ok", vec![], maybe.clone())).param("r", res()),
            FunctionDef::new("err", maybe.clone(), call("err", vec![], maybe)).param("r", res()),
        ],
    );
    assert_clean(&out);
    assert_eq!(parts(&run(&out, "ok", vec![ok(5)])), (0, 5));
    assert_eq!(union_parts(&run(&out, "ok", vec![err(5)])).0, 1);
    assert_eq!(parts(&run(&out, "err", vec![err(9)])), (0, 9));
}

// ── Combinators ──────────────────────────────────────────────────

#[test]
fn map_touches_only_ok() {
    let out = lower_one(call("map", vec![inc("x", 1)], res()), res());
    assert_clean(&out);
    assert_eq!(parts(&run(&out, "f", vec![ok(3)])), (0, 4));
    assert_eq!(parts(&run(&out, "f", vec![err(3)])), (1, 3));
}

#[test]
fn map_err_touches_only_err() {
    let out = lower_one(call("map_err", vec![inc("e", 100)], res()), res());
    assert_clean(&out);
    assert_eq!(parts(&run(&out, "f", vec![ok(3)])), (0, 3));
    assert_eq!(parts(&run(&out, "f", vec![err(3)])), (1, 103));
}

#[test]
fn and_then_chains() {
    let x = || var("x", SemType::i32());
    let checked = Expr::if_else(
        Expr::binary(BinaryOp::Lt, x(), Expr::int(10)),
        Expr::variant("Outcome", "Ok", Some(x())).with_ty(res()),
        Some(Expr::variant("Outcome", "Err", Some(Expr::int(-1))).with_ty(res())),
    )
    .with_ty(res());
    let lambda = Expr::lambda(&[("x", SemType::i32())], checked);
    let out = lower_one(call("and_then", vec![lambda], res()), res());
    assert_clean(&out);
    assert_eq!(parts(&run(&out, "f", vec![ok(4)])), (0, 4));
    assert_eq!(parts(&run(&out, "f", vec![ok(40)])), (1, -1));
    assert_eq!(parts(&run(&out, "f", vec![err(2)])), (1, 2));
}

#[test]
fn map_or_defaults_on_err() {
    let out = lower_one(call("map_or", vec![Expr::int(0), inc("x", 5)], SemType::i32()), SemType::i32());
    assert_clean(&out);
    assert_eq!(as_int(&run(&out, "f", vec![ok(1)])), 6);
    assert_eq!(as_int(&run(&out, "f", vec![err(1)])), 0);
}

#[test]
fn is_ok_and_runs_predicate() {
    let even = Expr::lambda(
        &[("x", SemType::i32())],
        Expr::binary(
            BinaryOp::Eq,
            Expr::binary(BinaryOp::Rem, var("x", SemType::i32()), Expr::int(2)),
            Expr::int(0),
        ),
    );
    let out = lower_one(call("is_ok_and", vec![even], SemType::bool()), SemType::bool());
    assert_clean(&out);
    assert!(as_bool(&run(&out, "f", vec![ok(4)])));
    assert!(!as_bool(&run(&out, "f", vec![ok(5)])));
    assert!(!as_bool(&run(&out, "f", vec![err(4)])));
}

#[test]
fn alt_keeps_ok_receiver_and_also_replaces_it() {
    let other = || var("o", res());
    let out = lower_in(
        TypeEnv::new(),
        vec![
            FunctionDef::new("alt", res(), call("alt", vec![other()], res())).param("r", res()).param("o", res()),
            FunctionDef::new("also", res(), call("also", vec![other()], res())).param("r", res()).param("o", res()),
        ],
    );
    assert_eq!(parts(&run(&out, "alt", vec![ok(1), ok(2)])), (0, 1));
    assert_eq!(parts(&run(&out, "alt", vec![err(1), ok(2)])), (0, 2));
    assert_eq!(parts(&run(&out, "also", vec![ok(1), ok(2)])), (0, 2));
    assert_eq!(parts(&run(&out, "also", vec![err(1), ok(2)])), (1, 1));
}

#[test]
fn contains_err_compares_strings_through_runtime() {
    let str_res = SemType::outcome(SemType::i32(), SemType::str());
    let body = Expr::method(var("r", str_res.clone()), "contains_err", vec![Expr::str("boom")]).with_ty(SemType::bool());
    let out = lower(FunctionDef::new("f", SemType::bool(), body).param("r", str_res));
    assert_clean(&out);
    assert!(out.module.externs().contains_key("str_eq"));

    let runtime = LowerConfig::default().runtime;
    let mut ev = Evaluator::new(&out.module, &runtime);
    let boom = ev.heap.new_string("boom");
    let hit = ev.call("tml_f", vec![Val::Agg(vec![i32v(1), boom])]).unwrap();
    assert_eq!(hit.as_bool(), Some(true));
    let other = ev.heap.new_string("fizz");
    let miss = ev.call("tml_f", vec![Val::Agg(vec![i32v(1), other])]).unwrap();
    assert_eq!(miss.as_bool(), Some(false));
}

// ── Argument diagnostics ─────────────────────────────────────────

#[test]
fn missing_function_argument() {
    let out = lower_one(call("map", vec![], res()), res());
    assert_eq!(codes(&out), vec!["C017"]);
    assert_eq!(out.diagnostics[0].message, "map requires a function argument");
}

#[test]
fn non_callable_argument() {
    let out = lower_one(call("map_err", vec![Expr::int(3)], res()), res());
    assert_eq!(codes(&out), vec!["C021"]);
    assert_eq!(out.diagnostics[0].message, "map_err requires a closure or function reference");
}

#[test]
fn map_or_needs_two_arguments() {
    let out = lower_one(call("map_or", vec![inc("x", 1)], SemType::i32()), SemType::i32());
    assert_eq!(codes(&out), vec!["C018"]);
}
