//! Static `Type::method` calls and method calls on bounded type parameters.

use tracing::{debug, trace};

use crate::ast::ExprKind;
use crate::diagnostics::{ErrorCode, LowerError};
use crate::ir::TypedValue;
use crate::sema::{FuncSig, SemType, TypeSubst};

use super::dispatch::MethodSite;
use super::{primitive, LowerContext};

/// Behavior methods a primitive answers with inline code. Primitives have
/// no addressable implementation to call.
pub(crate) const PRIMITIVE_INTRINSICS: &[&str] = &[
    "duplicate", "to_owned", "cmp", "partial_cmp", "add", "sub", "mul", "div", "rem", "neg", "eq", "ne", "lt",
    "le", "gt", "ge", "hash", "min", "max", "clamp", "is_zero", "is_one",
];

pub(crate) fn instantiate(sig: &FuncSig, subs: &TypeSubst) -> FuncSig {
    FuncSig {
        params: sig.params.iter().map(|p| p.substitute(subs)).collect(),
        ret: sig.ret.substitute(subs),
    }
}

impl LowerContext<'_> {
    /// Bindings in effect inside an impl of `self_ty`: `Self` plus the
    /// type's own parameters bound to its arguments.
    pub(crate) fn impl_subs(&self, self_ty: &SemType) -> TypeSubst {
        let mut subs = TypeSubst::new();
        subs.insert("Self".to_string(), self_ty.clone());
        if let SemType::Named { name, type_args, .. } = self_ty {
            let params = self
                .env
                .lookup_struct(name)
                .map(|d| d.type_params.clone())
                .or_else(|| self.env.lookup_enum(name).map(|d| d.type_params.clone()))
                .unwrap_or_default();
            subs.extend(params.into_iter().zip(type_args.iter().cloned()));
        }
        subs
    }

    /// Local then cross-module lookup of a qualified function.
    pub(crate) fn lookup_any(&self, qualified: &str) -> Option<FuncSig> {
        self.env
            .lookup_func(qualified)
            .or_else(|| self.env.lookup_module_func(qualified))
            .cloned()
    }
}

/// `Point::new(1, 2)`, `T::default()`.
pub(super) fn resolve_static(cx: &mut LowerContext<'_>, site: &MethodSite<'_>) -> Result<Option<TypedValue>, LowerError> {
    let ExprKind::TypePath { name, type_args } = &site.receiver.kind else {
        return Ok(None);
    };
    let concrete = cx.resolve_sem(&SemType::named(name, type_args.clone()));
    let type_name = concrete.type_name().unwrap_or_else(|| name.clone());

    let mut candidates = vec![format!("{type_name}::{}", site.method)];
    if type_name != *name {
        candidates.push(format!("{name}::{}", site.method));
    }
    for qualified in candidates {
        let Some(sig) = cx.lookup_any(&qualified) else {
            continue;
        };
        let subs = cx.impl_subs(&concrete);
        let sig = instantiate(&sig, &subs);
        let symbol = cx.user_symbol(&qualified);
        debug!(callee = %qualified, "static method call");
        return cx.direct_call(site.call, &symbol, &sig, None, site.args).map(Some);
    }

    cx.diag(
        ErrorCode::UnknownMethod,
        format!("Unknown method: {type_name}::{}", site.method),
        site.method_span,
    );
    Ok(Some(cx.placeholder_for(site.call)))
}

/// A method on a value whose type is a bounded type parameter, resolved
/// through the where-constraint whose parameter maps to the receiver's
/// concrete type.
pub(super) fn resolve_bounded(cx: &mut LowerContext<'_>, site: &MethodSite<'_>) -> Result<Option<TypedValue>, LowerError> {
    if cx.where_constraints.is_empty() || cx.type_subs.is_empty() {
        return Ok(None);
    }
    let Some(recv_name) = site.type_name() else {
        return Ok(None);
    };
    let env = cx.env;
    let constraints = cx.where_constraints.clone();

    for constraint in &constraints {
        let Some(bound) = cx.type_subs.get(&constraint.type_param).cloned() else {
            continue;
        };
        let concrete = cx.resolve_sem(&bound);
        let Some(concrete_name) = concrete.type_name() else {
            continue;
        };
        if concrete_name != recv_name {
            continue;
        }

        for (behavior, behavior_args) in constraint.bounds() {
            let Some(def) = env.lookup_behavior(behavior) else {
                trace!(behavior, "bound names an unknown behavior");
                continue;
            };
            let Some(method) = def.method(site.method) else {
                continue;
            };

            if let Some(kind) = concrete.prim_kind()
                && PRIMITIVE_INTRINSICS.contains(&site.method)
            {
                let recv = site.recv()?;
                if let Some(v) = primitive::lower_intrinsic(cx, site, recv, kind)? {
                    debug!(behavior, method = site.method, "bounded call on primitive inlined");
                    return Ok(Some(v));
                }
            }

            let own = format!("{concrete_name}::{}", site.method);
            let (qualified, sig) = match cx.lookup_any(&own) {
                Some(sig) => (own, sig),
                None if method.has_default => (
                    format!("{behavior}::{}", site.method),
                    FuncSig { params: method.params.clone(), ret: method.ret.clone() },
                ),
                None => {
                    trace!(callee = %own, "bound method has no implementation");
                    continue;
                }
            };

            let mut subs = cx.impl_subs(&concrete);
            subs.extend(def.type_params.iter().cloned().zip(behavior_args.iter().cloned()));
            let sig = instantiate(&sig, &subs);
            cx.mark(&format!("{behavior}::{}", site.method));
            let recv = site.recv()?.clone();
            let this = cx.receiver_arg(&recv);
            let symbol = cx.user_symbol(&qualified);
            debug!(callee = %qualified, "bounded generic call");
            return cx.direct_call(site.call, &symbol, &sig, Some(this), site.args).map(Some);
        }
    }
    Ok(None)
}
