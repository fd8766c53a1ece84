//! Expression lowering: one `LowerContext` per function body, walking the
//! typed tree and appending instructions through the block builder.

mod binary;
mod call;
mod checked;
mod coerce;
mod collections;
mod dispatch;
mod expr;
mod generic;
mod impls;
mod lambda;
mod layout;
mod maybe;
mod ordering;
mod outcome;
mod place;
mod pointer;
mod primitive;

use std::collections::HashMap;

use tracing::debug;

use crate::ast::{Expr, ExprKind};
use crate::config::LowerConfig;
use crate::coverage::CoverageLog;
use crate::diagnostics::{Diagnostic, ErrorCode, LowerError};
use crate::ir::{FloatKind, Function, FunctionBuilder, IsaType, Module, Operand, TypedValue};
use crate::sema::{SemType, SemaEnv, TypeSubst, WhereConstraint};
use crate::span::Span;

use super::runtime::RuntimeRegistry;
use super::FunctionDef;

pub(crate) use lambda::ReturnRedirect;

/// A named local. Every local lives in a stack slot; `by_ref` locals hold a
/// pointer to the real storage instead (`ref` and `mut ref` parameters,
/// filter parameters over structured payloads).
#[derive(Debug, Clone)]
pub(crate) struct Local {
    pub ptr: Operand,
    pub ty: IsaType,
    pub sem: Option<SemType>,
    pub by_ref: bool,
}

#[derive(Debug, Default)]
pub(crate) struct LocalTable {
    vars: HashMap<String, Local>,
}

impl LocalTable {
    pub fn get(&self, name: &str) -> Option<&Local> {
        self.vars.get(name)
    }

    /// Bind `name`, returning whatever it shadowed.
    pub fn bind(&mut self, name: &str, local: Local) -> Option<Local> {
        self.vars.insert(name.to_string(), local)
    }

    /// Undo a `bind`.
    pub fn restore(&mut self, name: &str, prev: Option<Local>) {
        match prev {
            Some(local) => {
                self.vars.insert(name.to_string(), local);
            }
            None => {
                self.vars.remove(name);
            }
        }
    }
}

pub(crate) struct LowerContext<'a> {
    env: &'a dyn SemaEnv,
    config: &'a LowerConfig,
    runtime: &'a RuntimeRegistry,
    module: &'a mut Module,
    coverage: &'a mut CoverageLog,
    diagnostics: &'a mut Vec<Diagnostic>,
    builder: FunctionBuilder,
    locals: LocalTable,
    /// Active type-parameter bindings (plus `Self` inside impls).
    type_subs: TypeSubst,
    where_constraints: Vec<WhereConstraint>,
    /// Symbol of the function being lowered, used to name lifted closures.
    fn_symbol: String,
    ret_ty: IsaType,
    /// Set while a lambda body is inlined; `return` targets it instead of
    /// leaving the function.
    redirect: Option<ReturnRedirect>,
    lifted: u32,
}

/// Shared state a lowering session hands to every function it lowers.
pub(crate) struct Session<'a> {
    pub env: &'a dyn SemaEnv,
    pub config: &'a LowerConfig,
    pub runtime: &'a RuntimeRegistry,
    pub module: &'a mut Module,
    pub coverage: &'a mut CoverageLog,
    pub diagnostics: &'a mut Vec<Diagnostic>,
}

/// Lower one function definition into `session.module`.
pub(crate) fn lower_function(func: &FunctionDef, session: Session<'_>) -> Result<(), LowerError> {
    let Session { env, config, runtime, module, coverage, diagnostics } = session;

    let mut type_subs = func.type_subs.clone();
    if let Some(impl_ty) = &func.impl_type {
        type_subs.insert("Self".to_string(), impl_ty.clone());
    }

    let symbol = config.user_symbol(&func.name.replace("::", "_"));
    let mut cx = LowerContext {
        env,
        config,
        runtime,
        module,
        coverage,
        diagnostics,
        builder: FunctionBuilder::new(),
        locals: LocalTable::default(),
        type_subs,
        where_constraints: func.where_constraints.clone(),
        fn_symbol: symbol.clone(),
        ret_ty: IsaType::Void,
        redirect: None,
        lifted: 0,
    };
    let ret_sem = func.ret.substitute(&cx.type_subs);
    cx.ret_ty = cx.isa_of(&ret_sem);
    debug!(function = %symbol, ret = %cx.ret_ty, "lowering function");

    let mut params = Vec::with_capacity(func.params.len());
    for p in &func.params {
        let sem = p.ty.substitute(&cx.type_subs);
        let reg = cx.builder.fresh_reg();
        match &sem {
            SemType::Ref { inner, .. } => {
                // The caller passes the address of its storage.
                let value = TypedValue::new(reg, IsaType::Ptr);
                params.push(value.clone());
                let inner_ty = cx.isa_of(inner);
                let slot = cx.builder.alloca(&IsaType::Ptr);
                cx.builder.store(value, slot.clone());
                cx.locals.bind(
                    &p.name,
                    Local { ptr: slot, ty: inner_ty, sem: Some((**inner).clone()), by_ref: true },
                );
            }
            _ => {
                let ty = cx.isa_of(&sem);
                let value = TypedValue::new(reg, ty);
                params.push(value.clone());
                cx.bind_local(&p.name, value, Some(sem));
            }
        }
    }

    let result = cx.lower_expr(&func.body)?;
    if cx.builder.current_block_unterminated() {
        let ret_ty = cx.ret_ty.clone();
        if ret_ty.is_void() {
            cx.builder.ret(None);
        } else {
            let v = if result.ty.is_void() { cx.placeholder(&ret_ty) } else { cx.coerce_to(result, &ret_ty) };
            cx.builder.ret(Some(v));
        }
    }

    let LowerContext { builder, module, ret_ty, .. } = cx;
    module.functions.push(Function { name: symbol, params, ret: ret_ty, blocks: builder.finish() });
    Ok(())
}

impl<'a> LowerContext<'a> {
    /// Lower an expression and return the value it produces. Void-typed
    /// expressions yield `TypedValue::void()`.
    pub(crate) fn lower_expr(&mut self, expr: &Expr) -> Result<TypedValue, LowerError> {
        self.lower_expr_hinted(expr, None)
    }

    /// Like `lower_expr`, but an untyped literal takes `hint` as its type.
    pub(crate) fn lower_expr_hinted(
        &mut self,
        expr: &Expr,
        hint: Option<&IsaType>,
    ) -> Result<TypedValue, LowerError> {
        match &expr.kind {
            ExprKind::Int { value, suffix } => Ok(self.lower_int_literal(expr, *value, *suffix, hint)),
            ExprKind::Float { value, suffix } => Ok(self.lower_float_literal(expr, *value, *suffix, hint)),
            ExprKind::Bool(b) => Ok(TypedValue::bool(*b)),
            ExprKind::Str(s) => Ok(self.string_literal(s)),
            ExprKind::Null => Ok(TypedValue::null()),
            ExprKind::Unit => Ok(TypedValue::void()),
            ExprKind::Ident(name) => self.lower_ident(expr, name),
            ExprKind::TypePath { name, .. } => {
                self.diag(ErrorCode::UnknownVariable, format!("Unknown variable: {name}"), expr.span);
                Ok(self.placeholder_for(expr))
            }
            ExprKind::Binary { op, lhs, rhs } => self.lower_binary(expr, *op, lhs, rhs),
            ExprKind::Unary { op, operand } => self.lower_unary(expr, *op, operand),
            ExprKind::Assign { target, value } => self.lower_assign(target, value),
            ExprKind::CompoundAssign { op, target, value } => self.lower_compound_assign(*op, target, value),
            ExprKind::Field { object, field } => self.lower_field(expr, object, field),
            ExprKind::MethodCall { receiver, method, args } => {
                self.lower_method_call(expr, receiver, method, args)
            }
            ExprKind::Call { callee, args } => self.lower_call(expr, callee, args),
            ExprKind::Closure { .. } => self.lift_closure(expr),
            ExprKind::Tuple(elems) => self.lower_tuple(expr, elems),
            ExprKind::Array(elems) => self.lower_array(expr, elems),
            ExprKind::Block { stmts, tail } => self.lower_block(stmts, tail.as_deref()),
            ExprKind::If { cond, then_branch, else_branch } => {
                self.lower_if(expr, cond, then_branch, else_branch.as_deref())
            }
            ExprKind::Return(value) => self.lower_return(value.as_deref()),
            ExprKind::Variant { enum_name, variant, payload } => {
                self.lower_variant(expr, enum_name, variant, payload.as_deref())
            }
        }
    }

    // ===== types =====

    /// Checker type of `expr` with active substitutions applied and
    /// references peeled. Aliases are expanded.
    pub(crate) fn sem_of(&self, expr: &Expr) -> Option<SemType> {
        expr.ty.as_ref().map(|t| self.resolve_sem(t))
    }

    pub(crate) fn resolve_sem(&self, ty: &SemType) -> SemType {
        let t = ty.substitute(&self.type_subs).strip_refs().clone();
        match &t {
            SemType::Named { name, type_args, .. } if type_args.is_empty() => match self.env.resolve_alias(name) {
                Some(target) => self.resolve_sem(target),
                None => t,
            },
            _ => t,
        }
    }

    /// Instruction-set type of `expr`, defaulting to `i32` when unresolved.
    pub(crate) fn isa_of_expr(&mut self, expr: &Expr) -> IsaType {
        match self.sem_of(expr) {
            Some(sem) => self.isa_of(&sem),
            None => IsaType::i32(),
        }
    }

    // ===== diagnostics & coverage =====

    pub(crate) fn diag(&mut self, code: ErrorCode, message: impl Into<String>, span: Span) {
        let d = Diagnostic::new(code, message, span);
        debug!(code = %d.code, message = %d.message, "diagnostic");
        self.diagnostics.push(d);
    }

    /// Tag the current position with the abstract operation it implements.
    pub(crate) fn mark(&mut self, op: &str) {
        if self.config.lowering.coverage {
            self.builder.coverage(op);
            self.coverage.record(op);
        }
    }

    /// Safe stand-in value of type `ty`, used after a diagnostic.
    pub(crate) fn placeholder(&self, ty: &IsaType) -> TypedValue {
        match ty {
            IsaType::Void => TypedValue::void(),
            IsaType::Bool => TypedValue::bool(false),
            IsaType::Int { .. } => TypedValue::int(0, ty.clone()),
            IsaType::Float(_) => TypedValue::new(Operand::Float(0.0), ty.clone()),
            IsaType::Ptr => TypedValue::null(),
            _ => TypedValue::zero(ty.clone()),
        }
    }

    pub(crate) fn placeholder_for(&mut self, expr: &Expr) -> TypedValue {
        let ty = self.isa_of_expr(expr);
        self.placeholder(&ty)
    }

    // ===== emission helpers =====

    /// Call a runtime primitive by logical name, declaring it on first use.
    pub(crate) fn call_runtime(&mut self, key: &str, args: Vec<TypedValue>) -> Result<TypedValue, LowerError> {
        let runtime = self.runtime;
        let f = runtime.get(key)?;
        self.module.declare_extern(&f.symbol, f.ret.clone(), f.params.clone());
        let args = args
            .into_iter()
            .zip(f.params.iter())
            .map(|(a, p)| self.coerce_to(a, p))
            .collect();
        Ok(self.builder.call(&f.ret, Operand::Global(f.symbol.clone()), args))
    }

    /// Symbol of a user function given its qualified name (`Point::len`).
    pub(crate) fn user_symbol(&self, qualified: &str) -> String {
        self.config.user_symbol(&qualified.replace("::", "_"))
    }

    pub(crate) fn string_literal(&mut self, s: &str) -> TypedValue {
        let global = self.module.intern_string(s);
        TypedValue::new(Operand::Global(global), IsaType::Ptr)
    }

    /// Store `value` into a fresh stack slot and return the slot.
    pub(crate) fn spill(&mut self, value: TypedValue) -> Operand {
        let slot = self.builder.alloca(&value.ty);
        self.builder.store(value, slot.clone());
        slot
    }

    /// Allocate a slot for `name`, store `value` and bind it.
    pub(crate) fn bind_local(&mut self, name: &str, value: TypedValue, sem: Option<SemType>) -> Option<Local> {
        let ty = value.ty.clone();
        if ty.is_void() {
            return self.locals.bind(name, Local { ptr: Operand::Undef, ty, sem, by_ref: false });
        }
        let slot = self.spill(value);
        self.locals.bind(name, Local { ptr: slot, ty, sem, by_ref: false })
    }

    /// Address of a local's storage, following `by_ref` indirection.
    pub(crate) fn local_address(&mut self, local: &Local) -> Operand {
        if local.by_ref {
            self.builder.load(&IsaType::Ptr, local.ptr.clone()).op
        } else {
            local.ptr.clone()
        }
    }

    pub(crate) fn load_local(&mut self, local: &Local) -> TypedValue {
        if local.ty.is_void() {
            return TypedValue::void();
        }
        let addr = self.local_address(local);
        self.builder.load(&local.ty, addr)
    }

    fn lower_ident(&mut self, expr: &Expr, name: &str) -> Result<TypedValue, LowerError> {
        if let Some(local) = self.locals.get(name).cloned() {
            return Ok(self.load_local(&local));
        }
        // A named function used as a value becomes a thin closure.
        if self.env.lookup_func(name).is_some() {
            let symbol = self.user_symbol(name);
            let with_fn = self.builder.insert_value(
                TypedValue::undef(IsaType::Closure),
                TypedValue::new(Operand::Global(symbol), IsaType::Ptr),
                0,
            );
            return Ok(self.builder.insert_value(with_fn, TypedValue::null(), 1));
        }
        self.diag(ErrorCode::UnknownVariable, format!("Unknown variable: {name}"), expr.span);
        Ok(self.placeholder_for(expr))
    }

    fn lower_int_literal(
        &mut self,
        expr: &Expr,
        value: i128,
        suffix: Option<crate::sema::PrimKind>,
        hint: Option<&IsaType>,
    ) -> TypedValue {
        let ty = if let Some(sem) = self.sem_of(expr) {
            self.isa_of(&sem)
        } else if let Some(kind) = suffix {
            self.isa_of(&SemType::prim(kind))
        } else {
            match hint {
                Some(h) if h.is_integral() || h.is_float() => h.clone(),
                _ => IsaType::i32(),
            }
        };
        match ty {
            IsaType::Float(_) => TypedValue::new(Operand::Float(value as f64), ty),
            IsaType::Bool => TypedValue::bool(value != 0),
            _ => TypedValue::int(value, ty),
        }
    }

    fn lower_float_literal(
        &mut self,
        expr: &Expr,
        value: f64,
        suffix: Option<crate::sema::PrimKind>,
        hint: Option<&IsaType>,
    ) -> TypedValue {
        let ty = match (self.sem_of(expr), suffix, hint) {
            (Some(sem), _, _) if sem.is_float() => self.isa_of(&sem),
            (_, Some(kind), _) if kind.is_float() => self.isa_of(&SemType::prim(kind)),
            (_, _, Some(h)) if h.is_float() => h.clone(),
            _ => IsaType::Float(FloatKind::F64),
        };
        TypedValue::new(Operand::Float(value), ty)
    }
}
