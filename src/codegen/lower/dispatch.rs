//! Method-call resolution.
//!
//! `receiver.method(args)` is offered to an ordered list of resolvers and
//! the first one that returns a value wins. The order matters: the
//! comparison intrinsics on primitives must shadow the bounded-generic and
//! module lookups, and the builtin union combinators must shadow user
//! implementations of the same name.
//!
//! Resolvers before the receiver is evaluated see only the expression
//! (static calls, arrays, slices). The rest see a [`Receiver`] holding the
//! evaluated value and, when the receiver names storage, a pointer to it so
//! mutating methods write back through the original place.

use tracing::{debug, trace};

use crate::ast::Expr;
use crate::diagnostics::{ErrorCode, LowerError};
use crate::ir::{IsaType, Operand, TypedValue};
use crate::sema::SemType;
use crate::span::{Span, Spanned};

use super::{call, collections, generic, impls, maybe, ordering, outcome, pointer, primitive, LowerContext};

/// The evaluated receiver of a method call.
#[derive(Debug, Clone)]
pub(crate) struct Receiver {
    pub value: TypedValue,
    /// Address of the receiver's storage when it has one.
    pub ptr: Option<Operand>,
    pub sem: Option<SemType>,
}

pub(crate) struct MethodSite<'e> {
    /// The whole call expression.
    pub call: &'e Expr,
    pub receiver: &'e Expr,
    pub method: &'e str,
    pub method_span: Span,
    pub args: &'e [Expr],
    /// Receiver type with substitutions applied and references peeled.
    pub sem: Option<SemType>,
    pub recv: Option<Receiver>,
}

impl MethodSite<'_> {
    pub fn recv(&self) -> Result<&Receiver, LowerError> {
        self.recv
            .as_ref()
            .ok_or_else(|| LowerError::internal(format!("receiver of '{}' used before evaluation", self.method)))
    }

    pub fn arg(&self, i: usize) -> Option<&Expr> {
        self.args.get(i)
    }

    /// Best known receiver type: the evaluated receiver's once available.
    pub fn receiver_sem(&self) -> Option<&SemType> {
        self.recv.as_ref().and_then(|r| r.sem.as_ref()).or(self.sem.as_ref())
    }

    /// Receiver type name used for `Type::method` lookups.
    pub fn type_name(&self) -> Option<String> {
        self.receiver_sem().and_then(SemType::type_name)
    }
}

pub(crate) type Resolver = fn(&mut LowerContext<'_>, &MethodSite<'_>) -> Result<Option<TypedValue>, LowerError>;

/// Resolvers that run on the unevaluated receiver.
const PRE_RECEIVER: &[(&str, Resolver)] = &[
    ("static", generic::resolve_static),
    ("array", collections::resolve_array),
    ("slice_type", collections::resolve_slice_type),
];

/// Resolvers that run once the receiver has been evaluated.
const POST_RECEIVER: &[(&str, Resolver)] = &[
    ("primitive_compare", primitive::resolve_compare),
    ("bounded_generic", generic::resolve_bounded),
    ("pointer", pointer::resolve_pointer),
    ("primitive", primitive::resolve_primitive),
    ("primitive_default", primitive::resolve_behavior_default),
    ("ordering", ordering::resolve_ordering),
    ("maybe", maybe::resolve_maybe),
    ("outcome", outcome::resolve_outcome),
    ("slice", collections::resolve_slice),
    ("list", collections::resolve_list),
    ("local_impl", impls::resolve_local_impl),
    ("module_impl", impls::resolve_module_impl),
    ("dyn", impls::resolve_dyn),
    ("fn_call", call::resolve_fn_method),
    ("file", impls::resolve_file),
    ("class", impls::resolve_class),
    ("fn_field", call::resolve_fn_field),
];

impl LowerContext<'_> {
    pub(crate) fn lower_method_call(
        &mut self,
        expr: &Expr,
        receiver: &Expr,
        method: &Spanned<String>,
        args: &[Expr],
    ) -> Result<TypedValue, LowerError> {
        let mut site = MethodSite {
            call: expr,
            receiver,
            method: &method.node,
            method_span: method.span,
            args,
            sem: self.sem_of(receiver),
            recv: None,
        };

        for (name, resolve) in PRE_RECEIVER {
            if let Some(v) = resolve(self, &site)? {
                debug!(method = %method.node, resolver = *name, "method resolved");
                return Ok(v);
            }
        }

        site.recv = Some(self.eval_receiver(receiver, site.sem.clone())?);

        for (name, resolve) in POST_RECEIVER {
            if let Some(v) = resolve(self, &site)? {
                debug!(method = %method.node, resolver = *name, "method resolved");
                return Ok(v);
            }
        }

        trace!(method = %method.node, ty = ?site.sem, "no resolver matched");
        self.diag(ErrorCode::UnknownMethod, format!("Unknown method: {}", method.node), method.span);
        Ok(self.placeholder_for(expr))
    }

    /// Evaluate a receiver, keeping the address of its storage when it is a
    /// local, a field (through nesting, a pointer or a smart pointer) or a
    /// dereference.
    pub(crate) fn eval_receiver(&mut self, receiver: &Expr, sem: Option<SemType>) -> Result<Receiver, LowerError> {
        if let Some(place) = self.place_of(receiver)? {
            let value = if place.ty.is_void() {
                TypedValue::void()
            } else {
                self.builder.load(&place.ty, place.ptr.clone())
            };
            return Ok(Receiver { value, ptr: Some(place.ptr), sem: sem.or(place.sem) });
        }
        let value = self.lower_expr(receiver)?;
        Ok(Receiver { value, ptr: None, sem })
    }

    /// Address of the receiver, spilling it when it has no storage.
    pub(crate) fn receiver_ptr(&mut self, recv: &Receiver) -> Operand {
        match &recv.ptr {
            Some(p) => p.clone(),
            None => self.spill(recv.value.clone()),
        }
    }

    /// The receiver as the first argument of a method call: aggregates by
    /// pointer, scalars and handle types by value.
    pub(crate) fn receiver_arg(&mut self, recv: &Receiver) -> TypedValue {
        if recv.value.ty.is_aggregate() {
            let p = self.receiver_ptr(recv);
            TypedValue::new(p, IsaType::Ptr)
        } else {
            recv.value.clone()
        }
    }

    /// Result type of the call expression, `i32` when unresolved.
    pub(crate) fn call_result_isa(&mut self, site: &MethodSite<'_>) -> IsaType {
        self.isa_of_expr(site.call)
    }

    /// Report a missing argument and hand back a placeholder of the call's
    /// type.
    pub(crate) fn missing_arg(
        &mut self,
        site: &MethodSite<'_>,
        code: ErrorCode,
        message: impl Into<String>,
    ) -> Option<TypedValue> {
        self.diag(code, message, site.method_span);
        Some(self.placeholder_for(site.call))
    }
}
