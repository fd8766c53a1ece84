//! Direct calls and calls through callable values.
//!
//! A callable value is `{ ptr fn, ptr env }`. A null env means the target
//! takes no environment argument. When the binding's type says whether the
//! closure captures, one call shape is emitted; otherwise the env pointer
//! is tested at run time and both shapes are emitted and merged.

use tracing::{debug, trace};

use crate::ast::{Expr, ExprKind};
use crate::diagnostics::{ErrorCode, LowerError};
use crate::ir::{IntPred, IsaType, Operand, TypedValue};
use crate::sema::{FuncSig, SemType};

use super::dispatch::MethodSite;
use super::lambda::LambdaArg;
use super::LowerContext;

/// Calling convention of a callable value as far as it is known statically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CallShape {
    /// Environment pointer passed first.
    Fat,
    Thin,
    /// Decided at run time by testing the environment pointer.
    Dynamic,
}

pub(crate) fn call_shape(sem: Option<&SemType>) -> CallShape {
    match sem {
        Some(SemType::Closure { captures, .. }) if !captures.is_empty() => CallShape::Fat,
        Some(SemType::Closure { .. }) => CallShape::Thin,
        _ => CallShape::Dynamic,
    }
}

fn callable_signature(sem: Option<&SemType>) -> Option<(&[SemType], &SemType)> {
    match sem {
        Some(SemType::Closure { params, ret, .. }) | Some(SemType::Func { params, ret }) => Some((params, ret)),
        _ => None,
    }
}

impl LowerContext<'_> {
    pub(crate) fn lower_call(&mut self, expr: &Expr, callee: &Expr, args: &[Expr]) -> Result<TypedValue, LowerError> {
        match &callee.kind {
            ExprKind::Ident(name) => {
                if let Some(local) = self.locals.get(name).cloned() {
                    let value = self.load_local(&local);
                    let sem = local.sem.clone().or_else(|| self.sem_of(callee));
                    return self.call_closure_value(expr, value, sem.as_ref(), args);
                }
                let env = self.env;
                if let Some(sig) = env.lookup_func(name).or_else(|| env.lookup_module_func(name)) {
                    let symbol = self.user_symbol(name);
                    return self.direct_call(expr, &symbol, sig, None, args);
                }
                self.diag(ErrorCode::UnknownVariable, format!("Unknown function: {name}"), callee.span);
                Ok(self.placeholder_for(expr))
            }
            ExprKind::Closure { params, .. } => {
                // Immediately applied literal: inline it.
                let mut lowered = Vec::with_capacity(args.len());
                for (arg, param) in args.iter().zip(params) {
                    let hint = param.ty.as_ref().map(|t| self.resolve_sem(t)).map(|s| self.isa_of(&s));
                    let v = self.lower_expr_hinted(arg, hint.as_ref())?;
                    lowered.push(LambdaArg::Value(v, self.sem_of(arg)));
                }
                let ret = match self.lambda_result_sem(callee) {
                    Some(s) => self.isa_of(&s),
                    None => self.isa_of_expr(expr),
                };
                self.inline_lambda(callee, lowered, &ret, "lambda")
            }
            _ => {
                self.diag(ErrorCode::ComplexCallee, "Complex callee expressions are not supported", callee.span);
                Ok(self.placeholder_for(expr))
            }
        }
    }

    /// Lower call arguments against a parameter list. `ref` parameters get
    /// the address of the argument's storage.
    pub(crate) fn lower_args(&mut self, args: &[Expr], params: &[SemType]) -> Result<Vec<TypedValue>, LowerError> {
        let mut out = Vec::with_capacity(args.len());
        for (i, arg) in args.iter().enumerate() {
            let param = params.get(i).map(|p| p.substitute(&self.type_subs));
            match &param {
                Some(SemType::Ref { .. }) => {
                    let ptr = match self.place_of(arg)? {
                        Some(place) => place.ptr,
                        None => {
                            let v = self.lower_expr(arg)?;
                            self.spill(v)
                        }
                    };
                    out.push(TypedValue::new(ptr, IsaType::Ptr));
                }
                Some(p) => {
                    let ty = self.isa_of(p);
                    let v = self.lower_expr_hinted(arg, Some(&ty))?;
                    out.push(self.coerce_to(v, &ty));
                }
                None => out.push(self.lower_expr(arg)?),
            }
        }
        Ok(out)
    }

    /// Call a known function symbol, optionally with a receiver argument in
    /// front of the lowered arguments.
    pub(crate) fn direct_call(
        &mut self,
        expr: &Expr,
        symbol: &str,
        sig: &FuncSig,
        receiver: Option<TypedValue>,
        args: &[Expr],
    ) -> Result<TypedValue, LowerError> {
        let lowered = self.lower_args(args, &sig.params)?;
        let ret = self.signature_ret(expr, &sig.ret);
        let mut all = Vec::with_capacity(lowered.len() + 1);
        all.extend(receiver);
        all.extend(lowered);
        trace!(callee = %symbol, args = all.len(), "direct call");
        Ok(self.builder.call(&ret, Operand::Global(symbol.to_string()), all))
    }

    /// Return type of a signature, falling back to the call expression's
    /// type when the signature still mentions unbound parameters.
    pub(crate) fn signature_ret(&mut self, expr: &Expr, ret: &SemType) -> IsaType {
        let ret = ret.substitute(&self.type_subs);
        if mentions_generic(&ret) {
            return self.isa_of_expr(expr);
        }
        self.isa_of(&ret)
    }

    /// Invoke a `{ fn, env }` value.
    pub(crate) fn call_closure_value(
        &mut self,
        expr: &Expr,
        callee: TypedValue,
        sem: Option<&SemType>,
        args: &[Expr],
    ) -> Result<TypedValue, LowerError> {
        let (params, ret) = match callable_signature(sem) {
            Some((p, r)) => (p.to_vec(), Some(r.clone())),
            None => (Vec::new(), None),
        };
        let lowered = self.lower_args(args, &params)?;
        let ret_ty = match &ret {
            Some(r) => self.signature_ret(expr, r),
            None => self.isa_of_expr(expr),
        };

        let fn_ptr = self.builder.extract_value(callee.clone(), 0, &IsaType::Ptr);
        let env_ptr = self.builder.extract_value(callee, 1, &IsaType::Ptr);
        let shape = call_shape(sem);
        debug!(shape = ?shape, "closure call");

        match shape {
            CallShape::Fat => {
                let mut all = vec![env_ptr];
                all.extend(lowered);
                Ok(self.builder.call(&ret_ty, fn_ptr.op, all))
            }
            CallShape::Thin => Ok(self.builder.call(&ret_ty, fn_ptr.op, lowered)),
            CallShape::Dynamic => {
                let is_thin = self.builder.icmp(IntPred::Eq, &IsaType::Ptr, env_ptr.op.clone(), Operand::Null);
                let thin = self.builder.create_block("fp_thin");
                let fat = self.builder.create_block("fp_fat");
                let merge = self.builder.create_block("fp_merge");
                self.builder.cond_br(is_thin.op, &thin, &fat);

                self.builder.switch_to_block(&thin);
                let thin_result = self.builder.call(&ret_ty, fn_ptr.op.clone(), lowered.clone());
                self.builder.br(&merge);

                self.builder.switch_to_block(&fat);
                let mut all = vec![env_ptr];
                all.extend(lowered);
                let fat_result = self.builder.call(&ret_ty, fn_ptr.op, all);
                self.builder.br(&merge);

                self.builder.switch_to_block(&merge);
                if ret_ty.is_void() {
                    return Ok(TypedValue::void());
                }
                Ok(self.builder.phi(&ret_ty, vec![(thin_result.op, thin), (fat_result.op, fat)]))
            }
        }
    }
}

fn mentions_generic(ty: &SemType) -> bool {
    match ty {
        SemType::Generic(_) => true,
        SemType::Named { type_args, .. } => type_args.iter().any(mentions_generic),
        SemType::Ptr { inner, .. } | SemType::Ref { inner, .. } | SemType::Slice(inner) => mentions_generic(inner),
        SemType::Array { elem, .. } => mentions_generic(elem),
        SemType::Tuple(elems) => elems.iter().any(mentions_generic),
        SemType::Closure { params, ret, .. } | SemType::Func { params, ret } => {
            params.iter().any(mentions_generic) || mentions_generic(ret)
        }
        SemType::Primitive(_) | SemType::Dyn(_) => false,
    }
}

/// `f.call(args)`, `f.call_mut(args)`, `f.call_once(args)` on a callable.
pub(super) fn resolve_fn_method(cx: &mut LowerContext<'_>, site: &MethodSite<'_>) -> Result<Option<TypedValue>, LowerError> {
    if !matches!(site.method, "call" | "call_mut" | "call_once") {
        return Ok(None);
    }
    let recv = site.recv()?;
    if !matches!(recv.sem, Some(SemType::Closure { .. } | SemType::Func { .. })) && recv.value.ty != IsaType::Closure {
        return Ok(None);
    }
    let marker = match site.method {
        "call" => "Fn::call",
        "call_mut" => "FnMut::call_mut",
        _ => "FnOnce::call_once",
    };
    cx.mark(marker);
    let v = cx.call_closure_value(site.call, recv.value.clone(), recv.sem.as_ref(), site.args)?;
    Ok(Some(v))
}

/// `s.handler(x)` where `handler` is a struct field holding a callable.
pub(super) fn resolve_fn_field(cx: &mut LowerContext<'_>, site: &MethodSite<'_>) -> Result<Option<TypedValue>, LowerError> {
    let recv = site.recv()?;
    let Some(sem) = recv.sem.clone() else {
        return Ok(None);
    };
    let Some(layout) = cx.struct_layout(&sem) else {
        return Ok(None);
    };
    let Some((idx, field_sem)) = layout.field(site.method).map(|(i, s)| (i, s.clone())) else {
        return Ok(None);
    };
    if !matches!(field_sem, SemType::Closure { .. } | SemType::Func { .. }) {
        return Ok(None);
    }
    let base = if layout.offset > 0 {
        recv.value.op.clone()
    } else {
        cx.receiver_ptr(recv)
    };
    let fptr = cx.builder.field_ptr(&layout.ty, base, idx);
    let callee = cx.builder.load(&IsaType::Closure, fptr);
    let v = cx.call_closure_value(site.call, callee, Some(&field_sem), site.args)?;
    Ok(Some(v))
}
