//! Operand unification checked against native Rust arithmetic.

#[path = "../integration/common/mod.rs"]
mod common;

use common::*;
use lowering::ast::{BinaryOp, Expr};
use lowering::ir::eval::Val;
use lowering::sema::{PrimKind, SemType};
use lowering::FunctionDef;
use proptest::prelude::*;

fn binary_fn(op: BinaryOp, lhs: SemType, rhs: SemType, ret: SemType) -> FunctionDef {
    FunctionDef::new("f", ret, Expr::binary(op, var("a", lhs.clone()), var("b", rhs.clone())))
        .param("a", lhs)
        .param("b", rhs)
}

#[test]
fn prop_narrow_signed_widens_by_sign_extension() {
    let out = lower(binary_fn(BinaryOp::Add, SemType::prim(PrimKind::I8), SemType::i64(), SemType::i64()));
    assert_clean(&out);
    proptest!(|(a in any::<i8>(), b in -1_000_000_000_000i64..1_000_000_000_000)| {
        let got = as_int(&run(&out, "f", vec![Val::int(8, i128::from(a)), i64v(i128::from(b))]));
        prop_assert_eq!(got, i128::from(i64::from(a) + b));
    });
}

#[test]
fn prop_narrow_unsigned_widens_by_zero_extension() {
    let u8t = SemType::prim(PrimKind::U8);
    let u32t = SemType::prim(PrimKind::U32);
    let out = lower(binary_fn(BinaryOp::Add, u8t, u32t.clone(), u32t));
    assert_clean(&out);
    proptest!(|(a in any::<u8>(), b in any::<u32>())| {
        let got = run(&out, "f", vec![Val::int(8, i128::from(a)), Val::int(32, i128::from(b))]);
        prop_assert_eq!(got.as_u128(), Some(u128::from(b.wrapping_add(u32::from(a)))));
    });
}

#[test]
fn prop_mixed_width_compare_is_signed() {
    let out = lower(binary_fn(BinaryOp::Lt, SemType::i32(), SemType::i64(), SemType::bool()));
    assert_clean(&out);
    proptest!(|(a in any::<i32>(), b in any::<i64>())| {
        let got = as_bool(&run(&out, "f", vec![i32v(i128::from(a)), i64v(i128::from(b))]));
        prop_assert_eq!(got, i64::from(a) < b);
    });
}

#[test]
fn prop_unsigned_operand_makes_compare_unsigned() {
    let u8t = SemType::prim(PrimKind::U8);
    let lt = lower(binary_fn(BinaryOp::Lt, SemType::i32(), u8t.clone(), SemType::bool()));
    let gt = lower(binary_fn(BinaryOp::Gt, SemType::i32(), u8t, SemType::bool()));
    assert_clean(&lt);
    assert!(function_ir(&lt, "f").contains("icmp ult i32"));
    assert!(function_ir(&gt, "f").contains("icmp ugt i32"));
    proptest!(|(a in any::<i32>(), b in any::<u8>())| {
        let args = || vec![i32v(i128::from(a)), Val::int(8, i128::from(b))];
        // The signed operand is read as its unsigned bit pattern.
        prop_assert_eq!(as_bool(&run(&lt, "f", args())), (a as u32) < u32::from(b));
        prop_assert_eq!(as_bool(&run(&gt, "f", args())), (a as u32) > u32::from(b));
    });
}

#[test]
fn prop_integer_promotes_to_float() {
    let out = lower(binary_fn(BinaryOp::Mul, SemType::i32(), SemType::f64(), SemType::f64()));
    assert_clean(&out);
    proptest!(|(a in -1_000_000i32..1_000_000, b in -1000.0f64..1000.0)| {
        let got = run(&out, "f", vec![i32v(i128::from(a)), Val::Float(b)]).as_f64();
        prop_assert_eq!(got, Some(f64::from(a) * b));
    });
}
