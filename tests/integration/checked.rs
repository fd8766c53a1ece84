mod common;

use common::*;
use lowering::ast::Expr;
use lowering::ir::eval::Val;
use lowering::sema::{PrimKind, SemType, TypeEnv};
use lowering::{FunctionDef, LoweringOutput};

fn checked_fn(name: &str, kind: PrimKind, method: &str) -> FunctionDef {
    let ty = SemType::prim(kind);
    let ret = SemType::maybe(ty.clone());
    let body = Expr::method(var("x", ty.clone()), method, vec![var("y", ty.clone())]).with_ty(ret.clone());
    FunctionDef::new(name, ret, body).param("x", ty.clone()).param("y", ty)
}

fn unary_checked_fn(name: &str, kind: PrimKind, method: &str) -> FunctionDef {
    let ty = SemType::prim(kind);
    let ret = SemType::maybe(ty.clone());
    let body = Expr::method(var("x", ty.clone()), method, vec![]).with_ty(ret.clone());
    FunctionDef::new(name, ret, body).param("x", ty)
}

/// Payload of a `Just`, None for `Nothing`.
fn eval(out: &LoweringOutput, name: &str, bits: u32, args: &[i128]) -> Option<i128> {
    let vals = args.iter().map(|a| Val::int(bits, *a)).collect();
    let result = run(out, name, vals);
    match union_parts(&result) {
        (0, Some(p)) => Some(as_int(p)),
        (1, _) => None,
        other => panic!("not a Maybe: {other:?}"),
    }
}

// ── Overflow intrinsics ──────────────────────────────────────────

#[test]
fn signed_add_overflow_is_nothing() {
    let out = lower(checked_fn("add", PrimKind::I8, "checked_add"));
    assert_clean(&out);
    assert!(out.module.externs().contains_key("llvm.sadd.with.overflow.i8"));
    let ir = function_ir(&out, "add");
    for label in ["checked_just", "checked_nothing", "checked_end"] {
        assert!(ir.contains(label), "missing {label}:\n{ir}");
    }
    assert_eq!(eval(&out, "add", 8, &[127, 1]), None);
    assert_eq!(eval(&out, "add", 8, &[100, 1]), Some(101));
    assert_eq!(eval(&out, "add", 8, &[-128, -1]), None);
    assert_eq!(out.coverage.count("CheckedAdd::checked_add"), 1);
}

#[test]
fn unsigned_add_uses_unsigned_intrinsic() {
    let out = lower(checked_fn("add", PrimKind::U8, "checked_add"));
    assert!(out.module.externs().contains_key("llvm.uadd.with.overflow.i8"));
    assert_eq!(eval(&out, "add", 8, &[200, 100]), None);
    assert_eq!(eval(&out, "add", 8, &[200, 50]), Some(250));
}

#[test]
fn unsigned_sub_below_zero() {
    let out = lower(checked_fn("sub", PrimKind::U32, "checked_sub"));
    assert_eq!(eval(&out, "sub", 32, &[0, 1]), None);
    assert_eq!(eval(&out, "sub", 32, &[10, 3]), Some(7));
}

#[test]
fn signed_mul_overflow() {
    let out = lower(checked_fn("mul", PrimKind::I32, "checked_mul"));
    assert!(out.module.externs().contains_key("llvm.smul.with.overflow.i32"));
    assert_eq!(eval(&out, "mul", 32, &[65_536, 65_536]), None);
    assert_eq!(eval(&out, "mul", 32, &[-3, 7]), Some(-21));
}

// ── Division ─────────────────────────────────────────────────────

#[test]
fn division_by_zero_is_nothing() {
    let out = lower_in(
        TypeEnv::new(),
        vec![checked_fn("div", PrimKind::I64, "checked_div"), checked_fn("rem", PrimKind::I64, "checked_rem")],
    );
    assert_clean(&out);
    assert_eq!(eval(&out, "div", 64, &[7, 0]), None);
    assert_eq!(eval(&out, "div", 64, &[7, 2]), Some(3));
    assert_eq!(eval(&out, "rem", 64, &[7, 0]), None);
    assert_eq!(eval(&out, "rem", 64, &[-7, 2]), Some(-1));
}

// ── Negation and shifts ──────────────────────────────────────────

#[test]
fn signed_neg_of_min_is_nothing() {
    let out = lower(unary_checked_fn("neg", PrimKind::I8, "checked_neg"));
    assert_eq!(eval(&out, "neg", 8, &[-128]), None);
    assert_eq!(eval(&out, "neg", 8, &[5]), Some(-5));
}

#[test]
fn unsigned_neg_only_of_zero() {
    let out = lower(unary_checked_fn("neg", PrimKind::U8, "checked_neg"));
    assert_eq!(eval(&out, "neg", 8, &[0]), Some(0));
    assert_eq!(eval(&out, "neg", 8, &[3]), None);
}

#[test]
fn shift_past_width_is_nothing() {
    let out = lower_in(
        TypeEnv::new(),
        vec![checked_fn("shl", PrimKind::I32, "checked_shl"), checked_fn("shr", PrimKind::U8, "checked_shr")],
    );
    assert_clean(&out);
    assert_eq!(eval(&out, "shl", 32, &[1, 32]), None);
    assert_eq!(eval(&out, "shl", 32, &[1, 3]), Some(8));
    assert_eq!(eval(&out, "shr", 8, &[0x80, 8]), None);
    assert_eq!(eval(&out, "shr", 8, &[0x80, 7]), Some(1));
}

// ── Diagnostics ──────────────────────────────────────────────────

#[test]
fn missing_operand_reports() {
    let i32t = SemType::i32();
    let ret = SemType::maybe(i32t.clone());
    let body = Expr::method(var("x", i32t.clone()), "checked_add", vec![]).with_ty(ret.clone());
    let out = lower(FunctionDef::new("f", ret, body).param("x", i32t));
    assert_eq!(codes(&out), vec!["C008"]);
    assert_eq!(out.diagnostics[0].message, "Missing argument for checked_add");
}

#[test]
fn unsupported_checked_method_is_unknown() {
    let out = lower(checked_fn("pow", PrimKind::I32, "checked_pow"));
    assert_eq!(codes(&out), vec!["C006"]);
}
