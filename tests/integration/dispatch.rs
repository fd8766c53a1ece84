mod common;

use common::*;
use lowering::ast::{BinaryOp, Expr, Stmt};
use lowering::config::LowerConfig;
use lowering::ir::eval::{Evaluator, Pointer, Val};
use lowering::sema::{
    BehaviorDef, BehaviorMethod, ClassDef, ClassMethod, FieldDef, PrimKind, SemType, StructDef, TypeEnv,
};
use lowering::FunctionDef;

fn point() -> SemType {
    SemType::named("Point", vec![])
}

fn this_ref(ty: SemType) -> SemType {
    SemType::Ref { mutable: false, inner: Box::new(ty) }
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

fn point_sum() -> FunctionDef {
    let this = || var("this", this_ref(point()));
    let body = Expr::binary(
        BinaryOp::Add,
        Expr::field(this(), "x").with_ty(SemType::i32()),
        Expr::field(this(), "y").with_ty(SemType::i32()),
    );
    FunctionDef::new("Point::sum", SemType::i32(), body).param("this", this_ref(point())).in_impl(point())
}

fn method_on(recv: Expr, method: &str, args: Vec<Expr>, ret: SemType) -> Expr {
    Expr::method(recv, method, args).with_ty(ret)
}

// ── Resolution failures ──────────────────────────────────────────

#[test]
fn unknown_method_reports_and_continues() {
    let body = method_on(var("x", SemType::i32()), "frob", vec![], SemType::i32());
    let out = lower(FunctionDef::new("f", SemType::i32(), body).param("x", SemType::i32()));
    assert_eq!(codes(&out), vec!["C006"]);
    assert_eq!(out.diagnostics[0].message, "Unknown method: frob");
    // The placeholder keeps the function well formed.
    assert!(function_ir(&out, "f").contains("ret i32"));
}

#[test]
fn unknown_static_method_names_the_type() {
    let body = Expr::method(Expr::type_path("Point"), "nope", vec![]).with_ty(SemType::i32());
    let out = lower_in(point_env(), vec![FunctionDef::new("f", SemType::i32(), body)]);
    assert_eq!(codes(&out), vec!["C006"]);
    assert_eq!(out.diagnostics[0].message, "Unknown method: Point::nope");
}

// ── Impl methods ─────────────────────────────────────────────────

#[test]
fn local_impl_receives_pointer_to_receiver() {
    let mut env = point_env();
    env.add_func("Point::sum", vec![], SemType::i32());
    let total = FunctionDef::new("total", SemType::i32(), method_on(var("p", point()), "sum", vec![], SemType::i32()))
        .param("p", point());
    let out = lower_in(env, vec![point_sum(), total]);
    assert_clean(&out);
    assert!(function_ir(&out, "total").contains("call i32 @tml_Point_sum(ptr"));
    let v = run(&out, "total", vec![Val::Agg(vec![i32v(3), i32v(4)])]);
    assert_eq!(as_int(&v), 7);
}

#[test]
fn imported_impl_is_called_by_symbol() {
    let mut env = point_env();
    env.add_module_func("Point::norm", vec![SemType::i64()], SemType::i64());
    let body = method_on(var("p", point()), "norm", vec![Expr::int(2)], SemType::i64());
    let out = lower_in(env, vec![FunctionDef::new("f", SemType::i64(), body).param("p", point())]);
    assert_clean(&out);
    let ir = function_ir(&out, "f");
    assert!(ir.contains("call i64 @tml_Point_norm(ptr"), "{ir}");
    assert!(ir.contains(", i64 2)"), "{ir}");
}

#[test]
fn static_call_has_no_receiver() {
    let mut env = point_env();
    env.add_func("Point::origin", vec![], point());
    let body = Expr::method(Expr::type_path("Point"), "origin", vec![]).with_ty(point());
    let out = lower_in(env, vec![FunctionDef::new("f", point(), body)]);
    assert_clean(&out);
    assert!(function_ir(&out, "f").contains("call %Point @tml_Point_origin()"));
}

// ── Dynamic and virtual dispatch ─────────────────────────────────

fn shape_env() -> TypeEnv {
    let mut env = TypeEnv::new();
    env.add_behavior(BehaviorDef {
        name: "Shape".into(),
        type_params: vec![],
        methods: vec![
            BehaviorMethod { name: "area".into(), params: vec![], ret: SemType::f64(), has_default: false },
            BehaviorMethod { name: "scale".into(), params: vec![SemType::f64()], ret: SemType::f64(), has_default: false },
        ],
    });
    env
}

#[test]
fn dyn_call_goes_through_vtable_slot() {
    let dyn_shape = SemType::Dyn("Shape".into());
    let body = method_on(var("s", dyn_shape.clone()), "scale", vec![Expr::int(2)], SemType::f64());
    let out = lower_in(shape_env(), vec![FunctionDef::new("f", SemType::f64(), body).param("s", dyn_shape)]);
    assert_clean(&out);
    let ir = function_ir(&out, "f");
    assert!(ir.contains("extractvalue"), "{ir}");
    assert!(ir.contains("getelementptr ptr, ptr"), "{ir}");
    assert!(ir.contains(", i64 1\n"), "{ir}");
    assert!(ir.contains("double 2.0"), "{ir}");
    assert_eq!(out.coverage.count("Shape::scale"), 1);
}

fn animal_env() -> TypeEnv {
    let mut env = TypeEnv::new();
    env.add_class(ClassDef {
        name: "Animal".into(),
        extends: None,
        fields: vec![FieldDef { name: "legs".into(), ty: SemType::i32() }],
        methods: vec![
            ClassMethod { name: "speak".into(), params: vec![], ret: SemType::str(), vtable_slot: Some(0) },
            ClassMethod { name: "legs".into(), params: vec![], ret: SemType::i32(), vtable_slot: None },
        ],
    });
    env.add_class(ClassDef { name: "Dog".into(), extends: Some("Animal".into()), fields: vec![], methods: vec![] });
    env
}

#[test]
fn virtual_method_loads_vtable_from_instance() {
    let dog = SemType::named("Dog", vec![]);
    let body = method_on(var("d", dog.clone()), "speak", vec![], SemType::str());
    let out = lower_in(animal_env(), vec![FunctionDef::new("f", SemType::str(), body).param("d", dog)]);
    assert_clean(&out);
    let ir = function_ir(&out, "f");
    assert!(ir.contains("getelementptr inbounds %Dog"), "{ir}");
    assert!(!ir.contains("@tml_Animal_speak"), "{ir}");
}

#[test]
fn inherited_non_virtual_method_is_direct() {
    let dog = SemType::named("Dog", vec![]);
    let body = method_on(var("d", dog.clone()), "legs", vec![], SemType::i32());
    let out = lower_in(animal_env(), vec![FunctionDef::new("f", SemType::i32(), body).param("d", dog)]);
    assert_clean(&out);
    assert!(function_ir(&out, "f").contains("call i32 @tml_Animal_legs(ptr"));
}

// ── Primitive intrinsics ─────────────────────────────────────────

#[test]
fn comparison_methods_inline() {
    let body = method_on(var("x", SemType::i32()), "lt", vec![var("y", SemType::i32())], SemType::bool());
    let out = lower(FunctionDef::new("f", SemType::bool(), body).param("x", SemType::i32()).param("y", SemType::i32()));
    assert_clean(&out);
    assert!(function_ir(&out, "f").contains("icmp slt i32"));
    assert!(as_bool(&run(&out, "f", vec![i32v(-1), i32v(0)])));
    assert_eq!(out.coverage.count("Ord::lt"), 1);
}

#[test]
fn min_max_and_clamp() {
    let x = || var("x", SemType::i64());
    let out = lower_in(
        TypeEnv::new(),
        vec![
            FunctionDef::new("lo", SemType::i64(), method_on(x(), "min", vec![Expr::int(10)], SemType::i64()))
                .param("x", SemType::i64()),
            FunctionDef::new(
                "clamp",
                SemType::i64(),
                method_on(x(), "clamp", vec![Expr::int(0), Expr::int(100)], SemType::i64()),
            )
            .param("x", SemType::i64()),
        ],
    );
    assert_clean(&out);
    assert_eq!(as_int(&run(&out, "lo", vec![i64v(42)])), 10);
    assert_eq!(as_int(&run(&out, "lo", vec![i64v(-3)])), -3);
    assert_eq!(as_int(&run(&out, "clamp", vec![i64v(-5)])), 0);
    assert_eq!(as_int(&run(&out, "clamp", vec![i64v(500)])), 100);
    assert_eq!(as_int(&run(&out, "clamp", vec![i64v(50)])), 50);
}

#[test]
fn abs_on_signed_and_unsigned() {
    let u16t = SemType::prim(PrimKind::U16);
    let out = lower_in(
        TypeEnv::new(),
        vec![
            FunctionDef::new("a", SemType::i32(), method_on(var("x", SemType::i32()), "abs", vec![], SemType::i32()))
                .param("x", SemType::i32()),
            FunctionDef::new("u", u16t.clone(), method_on(var("x", u16t.clone()), "abs", vec![], u16t.clone()))
                .param("x", u16t),
        ],
    );
    assert_eq!(as_int(&run(&out, "a", vec![i32v(-9)])), 9);
    assert_eq!(as_int(&run(&out, "a", vec![i32v(9)])), 9);
    assert_eq!(run(&out, "u", vec![Val::int(16, 40_000)]).as_u128(), Some(40_000));
}

#[test]
fn cmp_builds_ordering() {
    let ordering = SemType::named("Ordering", vec![]);
    let body = method_on(var("x", SemType::i32()), "cmp", vec![var("y", SemType::i32())], ordering.clone());
    let out = lower(FunctionDef::new("f", ordering, body).param("x", SemType::i32()).param("y", SemType::i32()));
    assert_clean(&out);
    let tag = |a, b| as_int(run(&out, "f", vec![i32v(a), i32v(b)]).field(0).unwrap());
    assert_eq!(tag(1, 2), 0);
    assert_eq!(tag(2, 2), 1);
    assert_eq!(tag(3, 2), 2);
    assert_eq!(out.coverage.count("Ord::cmp"), 1);
}

#[test]
fn int_to_string_through_runtime() {
    let body = method_on(var("x", SemType::i32()), "to_string", vec![], SemType::str());
    let out = lower(FunctionDef::new("f", SemType::str(), body).param("x", SemType::i32()));
    assert!(function_ir(&out, "f").contains("sext i32"));
    let mut ev = lowering::ir::eval::Evaluator::new(&out.module, &lowering::LowerConfig::default().runtime);
    let s = ev.call("tml_f", vec![i32v(-12)]).unwrap();
    assert_eq!(ev.heap.string(&s), Some("-12"));
}

#[test]
fn behavior_default_on_primitive() {
    let mut env = TypeEnv::new();
    env.add_behavior(BehaviorDef {
        name: "Describe".into(),
        type_params: vec![],
        methods: vec![BehaviorMethod { name: "describe".into(), params: vec![], ret: SemType::str(), has_default: true }],
    })
    .add_impl("I32", "Describe");
    let body = method_on(var("x", SemType::i32()), "describe", vec![], SemType::str());
    let out = lower_in(env, vec![FunctionDef::new("f", SemType::str(), body).param("x", SemType::i32())]);
    assert_clean(&out);
    assert!(function_ir(&out, "f").contains("call ptr @tml_Describe_describe(i32"));
    assert_eq!(out.coverage.count("Describe::describe"), 1);
}

#[test]
fn method_on_primitive_alias() {
    let mut env = TypeEnv::new();
    env.aliases.insert("Meters".into(), SemType::f64());
    env.add_func("Meters::to_feet", vec![], SemType::f64());
    let meters = SemType::named("Meters", vec![]);
    let body = method_on(var("m", meters.clone()), "to_feet", vec![], SemType::f64());
    let out = lower_in(env, vec![FunctionDef::new("f", SemType::f64(), body).param("m", meters)]);
    assert_clean(&out);
    assert!(function_ir(&out, "f").contains("call double @tml_Meters_to_feet(double"));
}

// ── Builtin handles ──────────────────────────────────────────────

#[test]
fn file_methods_call_runtime() {
    let file = SemType::named("File", vec![]);
    let body = Expr::block(
        vec![Stmt::Expr(method_on(var("h", file.clone()), "close", vec![], SemType::unit()))],
        None,
    );
    let out = lower(FunctionDef::new("f", SemType::unit(), body).param("h", file));
    assert_clean(&out);
    assert!(out.module.externs().contains_key("file_close"));
    assert_eq!(out.coverage.count("File::close"), 1);
}

// ── Receivers behind fields and pointers ─────────────────────────

fn counter() -> SemType {
    SemType::named("Counter", vec![])
}

fn outer() -> SemType {
    SemType::named("Outer", vec![])
}

/// `Counter { n }`, `Outer { inner: Counter }` and `Counter::bump(&mut self)`.
fn counter_env() -> TypeEnv {
    let mut env = TypeEnv::new();
    env.add_struct(StructDef {
        name: "Counter".into(),
        type_params: vec![],
        fields: vec![FieldDef { name: "n".into(), ty: SemType::i32() }],
    })
    .add_struct(StructDef {
        name: "Outer".into(),
        type_params: vec![],
        fields: vec![FieldDef { name: "inner".into(), ty: counter() }],
    })
    .add_func("Counter::bump", vec![], SemType::unit());
    env
}

fn counter_bump() -> FunctionDef {
    let this_ty = SemType::Ref { mutable: true, inner: Box::new(counter()) };
    let n = || Expr::field(var("this", this_ty.clone()), "n").with_ty(SemType::i32());
    let body = Expr::assign(n(), Expr::binary(BinaryOp::Add, n(), Expr::int(1)).with_ty(SemType::i32()));
    FunctionDef::new("Counter::bump", SemType::unit(), body).param("this", this_ty.clone()).in_impl(counter())
}

/// `{ <path>.inner.bump(); <path>.inner.n }`
fn bump_then_read(path: impl Fn() -> Expr) -> Expr {
    let inner = || Expr::field(path(), "inner").with_ty(counter());
    Expr::block(
        vec![Stmt::Expr(method_on(inner(), "bump", vec![], SemType::unit()))],
        Some(Expr::field(inner(), "n").with_ty(SemType::i32())),
    )
}

fn outer_val(n: i128) -> Val {
    Val::Agg(vec![Val::Agg(vec![i32v(n)])])
}

#[test]
fn nested_field_receiver_is_mutated_in_place() {
    let body = bump_then_read(|| var("o", outer()));
    let out = lower_in(counter_env(), vec![counter_bump(), FunctionDef::new("f", SemType::i32(), body).param("o", outer())]);
    assert_clean(&out);
    let ir = function_ir(&out, "f");
    assert!(ir.contains("getelementptr inbounds %Outer, ptr"), "{ir}");
    assert!(ir.contains("call void @tml_Counter_bump(ptr"), "{ir}");
    assert_eq!(as_int(&run(&out, "f", vec![outer_val(4)])), 5);
}

#[test]
fn receiver_through_pointer_field_writes_to_pointee() {
    let mut env = counter_env();
    let target = SemType::Ptr { mutable: true, inner: Box::new(outer()) };
    env.add_struct(StructDef {
        name: "Link".into(),
        type_params: vec![],
        fields: vec![FieldDef { name: "target".into(), ty: target.clone() }],
    });
    let link = SemType::named("Link", vec![]);
    let body = bump_then_read(|| Expr::field(var("l", link.clone()), "target").with_ty(target.clone()));
    let out = lower_in(env, vec![counter_bump(), FunctionDef::new("f", SemType::i32(), body).param("l", link.clone())]);
    assert_clean(&out);

    let mut ev = Evaluator::new(&out.module, &LowerConfig::default().runtime);
    ev.heap.slots.push(outer_val(10));
    let pointee = Pointer::Slot { alloc: 0, path: vec![] };
    let v = ev.call("tml_f", vec![Val::Agg(vec![Val::Ptr(pointee)])]).unwrap();
    assert_eq!(as_int(&v), 11);
    assert_eq!(ev.heap.slots[0], outer_val(11));
}

#[test]
fn receiver_inside_shared_block() {
    let shared = SemType::named("Shared", vec![outer()]);
    let body = bump_then_read(|| var("s", shared.clone()));
    let out = lower_in(counter_env(), vec![counter_bump(), FunctionDef::new("f", SemType::i32(), body).param("s", shared)]);
    assert_clean(&out);
    let ir = function_ir(&out, "f");
    assert!(ir.contains("getelementptr inbounds { i64, i64, %Outer }, ptr"), "{ir}");

    let mut ev = Evaluator::new(&out.module, &LowerConfig::default().runtime);
    ev.heap.slots.push(Val::Agg(vec![i64v(1), i64v(0), outer_val(1)]));
    let block = Pointer::Slot { alloc: 0, path: vec![] };
    let v = ev.call("tml_f", vec![Val::Agg(vec![Val::Ptr(block)])]).unwrap();
    assert_eq!(as_int(&v), 2);
    // Counts untouched, value updated.
    assert_eq!(ev.heap.slots[0], Val::Agg(vec![i64v(1), i64v(0), outer_val(2)]));
}
