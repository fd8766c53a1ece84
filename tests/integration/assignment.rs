mod common;

use common::*;
use lowering::ast::{BinaryOp, Expr, Stmt, UnaryOp};
use lowering::ir::eval::Val;
use lowering::sema::{FieldDef, PrimKind, SemType, StructDef, TypeEnv};
use lowering::span::Span;
use lowering::FunctionDef;

fn point() -> SemType {
    SemType::named("Point", vec![])
}

fn point_env() -> TypeEnv {
    let mut env = TypeEnv::new();
    env.add_struct(StructDef {
        name: "Point".into(),
        type_params: vec![],
        fields: vec![
            FieldDef { name: "x".into(), ty: SemType::i32() },
            FieldDef { name: "y".into(), ty: SemType::i32() },
        ],
    });
    env
}

fn field(object: Expr, name: &str) -> Expr {
    Expr::field(object, name).with_ty(SemType::i32())
}

fn add(lhs: Expr, rhs: Expr) -> Expr {
    Expr::binary(BinaryOp::Add, lhs, rhs).with_ty(SemType::i32())
}

// ── Plain assignment ─────────────────────────────────────────────

#[test]
fn assign_to_local() {
    let body = Expr::block(
        vec![
            Stmt::Let { name: "y".into(), ty: Some(SemType::i32()), value: Expr::int(1) },
            Stmt::Expr(Expr::assign(var("y", SemType::i32()), add(var("x", SemType::i32()), Expr::int(1)))),
        ],
        Some(var("y", SemType::i32())),
    );
    let out = lower(FunctionDef::new("f", SemType::i32(), body).param("x", SemType::i32()));
    assert_clean(&out);
    assert_eq!(as_int(&run(&out, "f", vec![i32v(5)])), 6);
}

#[test]
fn assign_to_struct_field() {
    let p = || var("p", point());
    let body = Expr::block(
        vec![Stmt::Expr(Expr::assign(field(p(), "x"), Expr::int(9)))],
        Some(add(field(p(), "x"), field(p(), "y"))),
    );
    let out = lower_in(point_env(), vec![FunctionDef::new("f", SemType::i32(), body).param("p", point())]);
    assert_clean(&out);
    assert!(function_ir(&out, "f").contains("getelementptr inbounds %Point, ptr"));
    assert_eq!(as_int(&run(&out, "f", vec![Val::Agg(vec![i32v(1), i32v(2)])])), 11);
}

#[test]
fn assign_to_tuple_element() {
    let pair = SemType::Tuple(vec![SemType::i32(), SemType::i32()]);
    let t = || var("t", pair.clone());
    let body = Expr::block(
        vec![Stmt::Expr(Expr::assign(field(t(), "1"), Expr::int(5)))],
        Some(add(field(t(), "0"), field(t(), "1"))),
    );
    let out = lower(FunctionDef::new("f", SemType::i32(), body).param("t", pair.clone()));
    assert_clean(&out);
    assert_eq!(as_int(&run(&out, "f", vec![Val::Agg(vec![i32v(3), i32v(100)])])), 8);
}

#[test]
fn literal_is_not_assignable() {
    let body = Expr::block(vec![Stmt::Expr(Expr::assign(Expr::int(1), Expr::int(2)))], None);
    let out = lower(FunctionDef::new("f", SemType::unit(), body));
    assert_eq!(codes(&out), vec!["C003"]);
    assert_eq!(out.diagnostics[0].message, "Invalid assignment target");
}

// ── Compound assignment ──────────────────────────────────────────

#[test]
fn compound_add_on_local() {
    let body = Expr::block(
        vec![Stmt::Expr(Expr::compound_assign(BinaryOp::Add, var("x", SemType::i32()), Expr::int(5)))],
        Some(var("x", SemType::i32())),
    );
    let out = lower(FunctionDef::new("f", SemType::i32(), body).param("x", SemType::i32()));
    assert_clean(&out);
    assert!(function_ir(&out, "f").contains("add nsw i32"));
    assert_eq!(as_int(&run(&out, "f", vec![i32v(10)])), 15);
    assert_eq!(out.coverage.count("Add::add"), 1);
}

#[test]
fn compound_on_unsigned_local_wraps() {
    let u8t = SemType::prim(PrimKind::U8);
    let body = Expr::block(
        vec![Stmt::Expr(Expr::compound_assign(BinaryOp::Add, var("x", u8t.clone()), Expr::int(10)))],
        Some(var("x", u8t.clone())),
    );
    let out = lower(FunctionDef::new("f", u8t.clone(), body).param("x", u8t));
    assert!(function_ir(&out, "f").contains("add nuw i8"));
    assert_eq!(as_int(&run(&out, "f", vec![Val::int(8, 250)])), 4);
}

#[test]
fn compound_on_field_is_rejected() {
    let body = Expr::block(
        vec![Stmt::Expr(Expr::compound_assign(BinaryOp::Add, field(var("p", point()), "x"), Expr::int(1)))],
        None,
    );
    let out = lower_in(point_env(), vec![FunctionDef::new("f", SemType::unit(), body).param("p", point())]);
    assert_eq!(codes(&out), vec!["C003"]);
    assert_eq!(out.diagnostics[0].message, "Invalid compound assignment target");
}

#[test]
fn compound_logical_operator_is_rejected() {
    let body = Expr::block(
        vec![Stmt::Expr(Expr::compound_assign(
            BinaryOp::And,
            var("b", SemType::bool()).at(Span::new(4, 5)),
            Expr::bool(true).at(Span::new(13, 17)),
        ))],
        None,
    );
    let out = lower(FunctionDef::new("f", SemType::unit(), body).param("b", SemType::bool()));
    assert_eq!(codes(&out), vec!["C003"]);
    assert_eq!(out.diagnostics[0].message, "Operator and cannot be compound-assigned");
    // Reported over the whole `b &&= true`.
    assert_eq!(out.diagnostics[0].span, Span::new(4, 17));
}

// ── Addresses ────────────────────────────────────────────────────

#[test]
fn write_through_address_of_local() {
    let ptr_ty = SemType::Ptr { mutable: true, inner: Box::new(SemType::i32()) };
    let p = || var("p", ptr_ty.clone());
    let address = Expr::unary(UnaryOp::Ref { mutable: true }, var("x", SemType::i32())).with_ty(ptr_ty.clone());
    let deref = || Expr::unary(UnaryOp::Deref, p()).with_ty(SemType::i32());
    let body = Expr::block(
        vec![
            Stmt::Let { name: "p".into(), ty: None, value: address },
            Stmt::Expr(Expr::assign(deref(), Expr::int(7))),
        ],
        Some(add(var("x", SemType::i32()), deref())),
    );
    let out = lower(FunctionDef::new("f", SemType::i32(), body).param("x", SemType::i32()));
    assert_clean(&out);
    assert_eq!(as_int(&run(&out, "f", vec![i32v(1)])), 14);
}

#[test]
fn address_of_temporary_is_rejected() {
    let ptr_ty = SemType::ptr(SemType::i32());
    let body = Expr::unary(UnaryOp::Ref { mutable: false }, Expr::int(3)).with_ty(ptr_ty.clone());
    let out = lower(FunctionDef::new("f", ptr_ty, body));
    assert_eq!(codes(&out), vec!["C003"]);
}
