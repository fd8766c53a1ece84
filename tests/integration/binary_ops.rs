mod common;

use common::*;
use lowering::ast::{BinaryOp, Expr, UnaryOp};
use lowering::config::{AmbiguousPointerAdd, LowerConfig};
use lowering::ir::eval::{EvalError, Val};
use lowering::sema::{PrimKind, SemType, TypeEnv};
use lowering::FunctionDef;

fn binary_fn(name: &str, op: BinaryOp, lhs_ty: SemType, rhs_ty: SemType, ret: SemType) -> FunctionDef {
    FunctionDef::new(name, ret, Expr::binary(op, var("a", lhs_ty.clone()), var("b", rhs_ty.clone())))
        .param("a", lhs_ty)
        .param("b", rhs_ty)
}

// ── Arithmetic ───────────────────────────────────────────────────

#[test]
fn add_i32_ir() {
    let out = lower(binary_fn("add", BinaryOp::Add, SemType::i32(), SemType::i32(), SemType::i32()));
    assert_clean(&out);
    insta::assert_snapshot!(out.module.to_string(), @r"
    define i32 @tml_add(i32 %t0, i32 %t1) {
    entry:
      %t2 = alloca i32
      store i32 %t0, ptr %t2
      %t3 = alloca i32
      store i32 %t1, ptr %t3
      %t4 = load i32, ptr %t2
      %t5 = load i32, ptr %t3
      ; coverage: Add::add
      %t6 = add nsw i32 %t4, %t5
      ret i32 %t6
    }
    ");
    assert_eq!(as_int(&run(&out, "add", vec![i32v(3), i32v(4)])), 7);
}

#[test]
fn add_wraps_at_declared_width() {
    let out = lower(binary_fn("add", BinaryOp::Add, SemType::i32(), SemType::i32(), SemType::i32()));
    assert_eq!(as_int(&run(&out, "add", vec![i32v(i32::MAX as i128), i32v(1)])), i32::MIN as i128);
}

#[test]
fn mixed_width_operands_widen() {
    let out = lower(binary_fn("mix", BinaryOp::Add, SemType::i32(), SemType::i64(), SemType::i64()));
    assert_clean(&out);
    let ir = function_ir(&out, "mix");
    assert!(ir.contains("sext i32"), "{ir}");
    assert!(ir.contains("add nsw i64"), "{ir}");
    assert_eq!(as_int(&run(&out, "mix", vec![i32v(-1), i64v(10)])), 9);
}

#[test]
fn untyped_left_literal_takes_right_type() {
    let body = Expr::binary(BinaryOp::Add, Expr::int(1), var("x", SemType::i64()));
    let out = lower(FunctionDef::new("inc", SemType::i64(), body).param("x", SemType::i64()));
    assert!(function_ir(&out, "inc").contains("add nsw i64 1, %t2"));
    assert_eq!(as_int(&run(&out, "inc", vec![i64v(41)])), 42);
}

#[test]
fn float_with_untyped_literal() {
    let body = Expr::binary(BinaryOp::Add, var("x", SemType::f64()), Expr::int(2));
    let out = lower(FunctionDef::new("f", SemType::f64(), body).param("x", SemType::f64()));
    assert!(function_ir(&out, "f").contains("fadd double"));
    assert_eq!(run(&out, "f", vec![Val::Float(0.5)]).as_f64(), Some(2.5));
}

#[test]
fn unsigned_division_and_remainder() {
    let u32t = SemType::prim(PrimKind::U32);
    let out = lower_in(
        TypeEnv::new(),
        vec![
            binary_fn("div", BinaryOp::Div, u32t.clone(), u32t.clone(), u32t.clone()),
            binary_fn("rem", BinaryOp::Rem, u32t.clone(), u32t.clone(), u32t),
        ],
    );
    assert!(function_ir(&out, "div").contains("udiv i32"));
    assert!(function_ir(&out, "rem").contains("urem i32"));
    let r = run(&out, "div", vec![i32v(4_294_967_295), i32v(2)]);
    assert_eq!(r.as_u128(), Some(2_147_483_647));
}

#[test]
fn signed_division_by_zero_traps_in_evaluator() {
    let out = lower(binary_fn("div", BinaryOp::Div, SemType::i32(), SemType::i32(), SemType::i32()));
    assert!(function_ir(&out, "div").contains("sdiv i32"));
    assert!(matches!(try_run(&out, "div", vec![i32v(1), i32v(0)]), Err(EvalError::DivisionByZero)));
}

#[test]
fn shift_right_follows_signedness() {
    let u32t = SemType::prim(PrimKind::U32);
    let out = lower_in(
        TypeEnv::new(),
        vec![
            binary_fn("sar", BinaryOp::Shr, SemType::i32(), SemType::i32(), SemType::i32()),
            binary_fn("shr", BinaryOp::Shr, u32t.clone(), u32t.clone(), u32t),
        ],
    );
    assert!(function_ir(&out, "sar").contains("ashr i32"));
    assert!(function_ir(&out, "shr").contains("lshr i32"));
    assert_eq!(as_int(&run(&out, "sar", vec![i32v(-8), i32v(1)])), -4);
    assert_eq!(run(&out, "shr", vec![i32v(-8), i32v(1)]).as_u128(), Some(0x7FFF_FFFC));
}

// ── Comparisons ──────────────────────────────────────────────────

#[test]
fn unsigned_compare_uses_unsigned_predicate() {
    let u8t = SemType::prim(PrimKind::U8);
    let out = lower(binary_fn("lt", BinaryOp::Lt, u8t.clone(), u8t, SemType::bool()));
    assert!(function_ir(&out, "lt").contains("icmp ult i8"));
    assert!(!as_bool(&run(&out, "lt", vec![Val::int(8, 200), Val::int(8, 100)])));
}

#[test]
fn signed_compare_uses_signed_predicate() {
    let i8t = SemType::prim(PrimKind::I8);
    let out = lower(binary_fn("lt", BinaryOp::Lt, i8t.clone(), i8t, SemType::bool()));
    assert!(function_ir(&out, "lt").contains("icmp slt i8"));
    assert!(as_bool(&run(&out, "lt", vec![Val::int(8, -56), Val::int(8, 100)])));
}

#[test]
fn float_compare_is_ordered() {
    let out = lower(binary_fn("ge", BinaryOp::Ge, SemType::f64(), SemType::f64(), SemType::bool()));
    assert!(function_ir(&out, "ge").contains("fcmp oge double"));
    assert!(as_bool(&run(&out, "ge", vec![Val::Float(2.0), Val::Float(2.0)])));
}

#[test]
fn logical_and_or() {
    let out = lower_in(
        TypeEnv::new(),
        vec![
            binary_fn("both", BinaryOp::And, SemType::bool(), SemType::bool(), SemType::bool()),
            binary_fn("either", BinaryOp::Or, SemType::bool(), SemType::bool(), SemType::bool()),
        ],
    );
    assert!(!as_bool(&run(&out, "both", vec![Val::bool(true), Val::bool(false)])));
    assert!(as_bool(&run(&out, "either", vec![Val::bool(true), Val::bool(false)])));
    // Neither operator is an abstract operation.
    assert_eq!(out.coverage.hits.len(), 0);
}

// ── Strings and pointers ─────────────────────────────────────────

#[test]
fn string_concatenation_calls_runtime() {
    let out = lower(binary_fn("cat", BinaryOp::Add, SemType::str(), SemType::str(), SemType::str()));
    assert_clean(&out);
    assert!(out.module.externs().contains_key("str_concat_opt"));
    assert_eq!(run_str(&out, "cat", &["ab", "cd"]), "abcd");
}

#[test]
fn string_equality_normalizes_runtime_result() {
    let out = lower_in(
        TypeEnv::new(),
        vec![
            binary_fn("eq", BinaryOp::Eq, SemType::str(), SemType::str(), SemType::bool()),
            binary_fn("ne", BinaryOp::Ne, SemType::str(), SemType::str(), SemType::bool()),
        ],
    );
    let ir = function_ir(&out, "eq");
    assert!(ir.contains("call i32 @str_eq"), "{ir}");
    assert!(ir.contains("icmp ne i32"), "{ir}");

    let mut ev = lowering::ir::eval::Evaluator::new(&out.module, &LowerConfig::default().runtime);
    let a = ev.heap.new_string("x");
    let b = ev.heap.new_string("x");
    assert_eq!(ev.call("tml_eq", vec![a.clone(), b.clone()]).unwrap().as_bool(), Some(true));
    assert_eq!(ev.call("tml_ne", vec![a, b]).unwrap().as_bool(), Some(false));
}

fn untyped_pointer_add() -> FunctionDef {
    // The checker resolved neither operand of `+`.
    let body = Expr::binary(BinaryOp::Add, Expr::ident("a"), Expr::ident("b"));
    FunctionDef::new("join", SemType::str(), body).param("a", SemType::str()).param("b", SemType::str())
}

#[test]
fn ambiguous_pointer_add_warns_and_concatenates() {
    let out = lower(untyped_pointer_add());
    assert_eq!(codes(&out), vec!["W001"]);
    assert!(!out.has_errors());
    assert_eq!(run_str(&out, "join", &["a", "b"]), "ab");
}

#[test]
fn ambiguous_pointer_add_can_be_rejected() {
    let mut config = LowerConfig::default();
    config.lowering.ambiguous_pointer_add = AmbiguousPointerAdd::Reject;
    let out = lower_with(TypeEnv::new(), vec![untyped_pointer_add()], &config);
    assert_eq!(codes(&out), vec!["C030"]);
    assert!(out.has_errors());
    assert!(!out.module.externs().contains_key("str_concat_opt"));
}

// ── Unary operators and coverage ─────────────────────────────────

#[test]
fn negation_and_not() {
    let out = lower_in(
        TypeEnv::new(),
        vec![
            FunctionDef::new("neg", SemType::i32(), Expr::unary(UnaryOp::Neg, var("x", SemType::i32())))
                .param("x", SemType::i32()),
            FunctionDef::new("not", SemType::bool(), Expr::unary(UnaryOp::Not, var("b", SemType::bool())))
                .param("b", SemType::bool()),
        ],
    );
    assert_eq!(as_int(&run(&out, "neg", vec![i32v(5)])), -5);
    assert!(as_bool(&run(&out, "not", vec![Val::bool(false)])));
    assert_eq!(out.coverage.count("Neg::neg"), 1);
    assert_eq!(out.coverage.count("Not::not"), 1);
}

#[test]
fn coverage_can_be_disabled() {
    let mut config = LowerConfig::default();
    config.lowering.coverage = false;
    let f = binary_fn("add", BinaryOp::Add, SemType::i32(), SemType::i32(), SemType::i32());
    let out = lower_with(TypeEnv::new(), vec![f], &config);
    assert_eq!(out.coverage.count("Add::add"), 0);
    assert!(!function_ir(&out, "add").contains("coverage"));
}

#[test]
fn executed_markers_match_emitted_ones() {
    let out = lower(binary_fn("mul", BinaryOp::Mul, SemType::i64(), SemType::i64(), SemType::i64()));
    let mut ev = lowering::ir::eval::Evaluator::new(&out.module, &LowerConfig::default().runtime);
    ev.call("tml_mul", vec![i64v(6), i64v(7)]).unwrap();
    assert_eq!(ev.executed.count("Mul::mul"), out.coverage.count("Mul::mul"));
}
