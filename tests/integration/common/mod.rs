#![allow(dead_code)]

use std::process::Command;

use lowering::ast::Expr;
use lowering::config::LowerConfig;
use lowering::ir::eval::{EvalError, Evaluator, Val};
use lowering::sema::{SemType, TypeEnv};
use lowering::{lower_unit, FunctionDef, LoweringOutput, LoweringUnit};

pub fn lowerc() -> Command {
    Command::new(env!("CARGO_BIN_EXE_lowerc"))
}

pub fn lower_with(env: TypeEnv, functions: Vec<FunctionDef>, config: &LowerConfig) -> LoweringOutput {
    lower_unit(&LoweringUnit { env, functions }, config).unwrap()
}

pub fn lower_in(env: TypeEnv, functions: Vec<FunctionDef>) -> LoweringOutput {
    lower_with(env, functions, &LowerConfig::default())
}

pub fn lower(func: FunctionDef) -> LoweringOutput {
    lower_in(TypeEnv::new(), vec![func])
}

/// Identifier typed by the checker.
pub fn var(name: &str, ty: SemType) -> Expr {
    Expr::ident(name).with_ty(ty)
}

pub fn codes(out: &LoweringOutput) -> Vec<&'static str> {
    out.diagnostics.iter().map(|d| d.code.as_str()).collect()
}

pub fn assert_clean(out: &LoweringOutput) {
    assert!(out.diagnostics.is_empty(), "unexpected diagnostics: {:?}\n{}", out.diagnostics, out.module);
}

/// Printed IR of the lowered function `name` (unprefixed).
pub fn function_ir(out: &LoweringOutput, name: &str) -> String {
    out.module
        .function(&format!("tml_{name}"))
        .map(|f| f.to_string())
        .unwrap_or_else(|| panic!("no function tml_{name} in\n{}", out.module))
}

pub fn try_run(out: &LoweringOutput, name: &str, args: Vec<Val>) -> Result<Val, EvalError> {
    let mut ev = Evaluator::new(&out.module, &LowerConfig::default().runtime);
    ev.call(&format!("tml_{name}"), args)
}

pub fn run(out: &LoweringOutput, name: &str, args: Vec<Val>) -> Val {
    try_run(out, name, args).unwrap_or_else(|e| panic!("evaluating {name}: {e}\n{}", out.module))
}

/// Run a function taking and returning strings.
pub fn run_str(out: &LoweringOutput, name: &str, args: &[&str]) -> String {
    let mut ev = Evaluator::new(&out.module, &LowerConfig::default().runtime);
    let vals = args.iter().map(|a| ev.heap.new_string(*a)).collect();
    let result = ev
        .call(&format!("tml_{name}"), vals)
        .unwrap_or_else(|e| panic!("evaluating {name}: {e}\n{}", out.module));
    ev.heap.string(&result).unwrap_or_else(|| panic!("{name} returned {result:?}")).to_string()
}

pub fn i32v(v: i128) -> Val {
    Val::int(32, v)
}

pub fn i64v(v: i128) -> Val {
    Val::int(64, v)
}

pub fn as_int(v: &Val) -> i128 {
    v.as_i128().unwrap_or_else(|| panic!("expected an integer, got {v:?}"))
}

pub fn as_bool(v: &Val) -> bool {
    v.as_bool().unwrap_or_else(|| panic!("expected a bool, got {v:?}"))
}

/// `(tag, payload)` of a tagged-union value.
pub fn union_parts(v: &Val) -> (i128, Option<&Val>) {
    let tag = v.field(0).and_then(Val::as_i128).unwrap_or_else(|| panic!("expected a union, got {v:?}"));
    (tag, v.field(1))
}
