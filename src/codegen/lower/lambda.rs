//! Lambda inlining for combinators and lifting of closure literals that
//! escape into values.

use tracing::debug;

use crate::ast::{ClosureParam, Expr, ExprKind};
use crate::diagnostics::LowerError;
use crate::ir::{Function, FunctionBuilder, IsaType, Label, Operand, TypedValue};
use crate::sema::{FuncSig, SemType};

use super::{Local, LowerContext};

/// Where `return` goes while a lambda body is inlined: store into `slot`
/// (absent for void results) and branch to `merge`.
#[derive(Debug, Clone)]
pub(crate) struct ReturnRedirect {
    pub slot: Option<Operand>,
    pub ty: IsaType,
    pub merge: Label,
}

/// How an argument reaches an inlined lambda parameter.
pub(crate) enum LambdaArg {
    Value(TypedValue, Option<SemType>),
    /// Bound through a pointer to existing storage.
    Ref { ptr: Operand, ty: IsaType, sem: Option<SemType> },
}

/// A combinator's function argument: a literal lambda to inline, or a named
/// function to call.
pub(crate) enum Callable<'e> {
    Lambda(&'e Expr),
    Func { symbol: String, sig: FuncSig },
}

impl<'a> LowerContext<'a> {
    /// Run `f` with `redirect` installed, restoring the previous redirect on
    /// every exit path.
    pub(crate) fn with_redirect<T>(
        &mut self,
        redirect: Option<ReturnRedirect>,
        f: impl FnOnce(&mut Self) -> Result<T, LowerError>,
    ) -> Result<T, LowerError> {
        let saved = std::mem::replace(&mut self.redirect, redirect);
        let out = f(self);
        self.redirect = saved;
        out
    }

    pub(crate) fn callable<'e>(&self, arg: &'e Expr) -> Option<Callable<'e>> {
        match &arg.kind {
            ExprKind::Closure { .. } => Some(Callable::Lambda(arg)),
            ExprKind::Ident(name) if self.locals.get(name).is_none() => {
                let sig = self.env.lookup_func(name).or_else(|| self.env.lookup_module_func(name))?;
                Some(Callable::Func { symbol: self.user_symbol(name), sig: sig.clone() })
            }
            _ => None,
        }
    }

    /// Declared return type of a lambda, else its body's type.
    pub(crate) fn lambda_result_sem(&self, lambda: &Expr) -> Option<SemType> {
        let ExprKind::Closure { ret, body, .. } = &lambda.kind else {
            return None;
        };
        ret.as_ref().map(|r| self.resolve_sem(r)).or_else(|| self.sem_of(body))
    }

    /// Apply a combinator's function argument to `args`.
    pub(crate) fn apply_callable(
        &mut self,
        callable: &Callable<'_>,
        args: Vec<LambdaArg>,
        result_ty: &IsaType,
        prefix: &str,
    ) -> Result<TypedValue, LowerError> {
        match callable {
            Callable::Lambda(lambda) => self.inline_lambda(lambda, args, result_ty, prefix),
            Callable::Func { symbol, sig } => {
                let mut values = Vec::with_capacity(args.len());
                for (arg, param) in args.into_iter().zip(sig.params.iter()) {
                    let v = match arg {
                        LambdaArg::Value(v, _) => v,
                        LambdaArg::Ref { ptr, ty, .. } => self.builder.load(&ty, ptr),
                    };
                    let pty = self.isa_of(param);
                    values.push(self.coerce_to(v, &pty));
                }
                let ret = self.isa_of(&sig.ret);
                let out = self.builder.call(&ret, Operand::Global(symbol.clone()), values);
                Ok(self.coerce_to(out, result_ty))
            }
        }
    }

    /// Lower `lambda`'s body in place with its parameters bound to `args`.
    /// A `return` inside the body leaves only the lambda. Parameter
    /// bindings are removed again before this returns.
    pub(crate) fn inline_lambda(
        &mut self,
        lambda: &Expr,
        args: Vec<LambdaArg>,
        result_ty: &IsaType,
        prefix: &str,
    ) -> Result<TypedValue, LowerError> {
        let ExprKind::Closure { params, body, .. } = &lambda.kind else {
            return Err(LowerError::internal("inline_lambda on a non-lambda expression"));
        };

        let mut saved = Vec::with_capacity(params.len());
        for (param, arg) in params.iter().zip(args) {
            let prev = self.bind_lambda_param(param, arg);
            saved.push((param.name.clone(), prev));
        }

        let merge = self.builder.create_block(&format!("{prefix}_ret"));
        let slot = (!result_ty.is_void()).then(|| self.builder.alloca(result_ty));
        let redirect = ReturnRedirect { slot: slot.clone(), ty: result_ty.clone(), merge: merge.clone() };
        let body_result = self.with_redirect(Some(redirect), |cx| cx.lower_expr(body));

        for (name, prev) in saved.into_iter().rev() {
            self.locals.restore(&name, prev);
        }
        let value = body_result?;

        if self.builder.current_block_unterminated() {
            if let Some(slot) = &slot {
                let v = if value.ty.is_void() { self.placeholder(result_ty) } else { self.coerce_to(value, result_ty) };
                self.builder.store(v, slot.clone());
            }
            self.builder.br(&merge);
        }
        self.builder.switch_to_block(&merge);
        Ok(match slot {
            Some(slot) => self.builder.load(result_ty, slot),
            None => TypedValue::void(),
        })
    }

    fn bind_lambda_param(&mut self, param: &ClosureParam, arg: LambdaArg) -> Option<Local> {
        let declared = param.ty.as_ref().map(|t| self.resolve_sem(t));
        match arg {
            LambdaArg::Value(value, sem) => {
                let sem = declared.or(sem);
                let value = match &sem {
                    Some(s) => {
                        let ty = self.isa_of(s);
                        self.coerce_to(value, &ty)
                    }
                    None => value,
                };
                self.bind_local(&param.name, value, sem)
            }
            LambdaArg::Ref { ptr, ty, sem } => {
                let holder = self.spill(TypedValue::new(ptr, IsaType::Ptr));
                self.locals.bind(&param.name, Local { ptr: holder, ty, sem: declared.or(sem), by_ref: true })
            }
        }
    }

    /// Turn a closure literal into a module function plus a `{ fn, env }`
    /// value. Captured locals are copied into a stack environment passed
    /// as the first argument; a closure without captures gets a null env.
    pub(crate) fn lift_closure(&mut self, expr: &Expr) -> Result<TypedValue, LowerError> {
        let ExprKind::Closure { params, body, captures, ret } = &expr.kind else {
            return Err(LowerError::internal("lift_closure on a non-closure expression"));
        };

        let mut captured = Vec::with_capacity(captures.len());
        for name in captures {
            match self.locals.get(name).cloned() {
                Some(local) => {
                    let v = self.load_local(&local);
                    captured.push((name.clone(), v, local.sem.clone()));
                }
                None => debug!(capture = %name, "captured name is not a local, skipping"),
            }
        }
        let env_ty = IsaType::Tuple(captured.iter().map(|(_, v, _)| v.ty.clone()).collect());
        let env_ptr = if captured.is_empty() {
            None
        } else {
            let slot = self.builder.alloca(&env_ty);
            for (i, (_, v, _)) in captured.iter().enumerate() {
                let field = self.builder.field_ptr(&env_ty, slot.clone(), i as u32);
                self.builder.store(v.clone(), field);
            }
            Some(slot)
        };

        let ret_sem = ret
            .as_ref()
            .map(|r| self.resolve_sem(r))
            .or_else(|| self.sem_of(body))
            .unwrap_or_else(SemType::i32);
        let ret_ty = self.isa_of(&ret_sem);
        let symbol = format!("{}.closure.{}", self.fn_symbol, self.lifted);
        self.lifted += 1;

        // Lower the body as a separate function with its own block state.
        let saved_builder = std::mem::replace(&mut self.builder, FunctionBuilder::new());
        let saved_locals = std::mem::take(&mut self.locals);
        let saved_redirect = self.redirect.take();
        let saved_ret = std::mem::replace(&mut self.ret_ty, ret_ty.clone());

        let result = self.lower_lifted_body(params, body, &captured, &env_ty, env_ptr.is_some());

        let builder = std::mem::replace(&mut self.builder, saved_builder);
        self.locals = saved_locals;
        self.redirect = saved_redirect;
        self.ret_ty = saved_ret;
        let fn_params = result?;
        self.module.functions.push(Function {
            name: symbol.clone(),
            params: fn_params,
            ret: ret_ty,
            blocks: builder.finish(),
        });
        debug!(closure = %symbol, captures = captured.len(), "lifted closure");

        let with_fn = self.builder.insert_value(
            TypedValue::undef(IsaType::Closure),
            TypedValue::new(Operand::Global(symbol), IsaType::Ptr),
            0,
        );
        let env = match env_ptr {
            Some(p) => TypedValue::new(p, IsaType::Ptr),
            None => TypedValue::null(),
        };
        Ok(self.builder.insert_value(with_fn, env, 1))
    }

    fn lower_lifted_body(
        &mut self,
        params: &[ClosureParam],
        body: &Expr,
        captured: &[(String, TypedValue, Option<SemType>)],
        env_ty: &IsaType,
        has_env: bool,
    ) -> Result<Vec<TypedValue>, LowerError> {
        let mut fn_params = Vec::new();
        if has_env {
            let env = TypedValue::new(self.builder.fresh_reg(), IsaType::Ptr);
            fn_params.push(env.clone());
            for (i, (name, v, sem)) in captured.iter().enumerate() {
                let field = self.builder.field_ptr(env_ty, env.op.clone(), i as u32);
                let loaded = self.builder.load(&v.ty, field);
                self.bind_local(name, loaded, sem.clone());
            }
        }
        for p in params {
            let sem = p.ty.as_ref().map(|t| self.resolve_sem(t));
            let ty = sem.as_ref().map_or(IsaType::i32(), |s| self.isa_of(s));
            let value = TypedValue::new(self.builder.fresh_reg(), ty);
            fn_params.push(value.clone());
            self.bind_local(&p.name, value, sem);
        }
        let result = self.lower_expr(body)?;
        if self.builder.current_block_unterminated() {
            let ret_ty = self.ret_ty.clone();
            if ret_ty.is_void() {
                self.builder.ret(None);
            } else {
                let v = if result.ty.is_void() { self.placeholder(&ret_ty) } else { self.coerce_to(result, &ret_ty) };
                self.builder.ret(Some(v));
            }
        }
        Ok(fn_params)
    }
}
