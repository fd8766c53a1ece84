//! Fixed-size arrays, slices and growable lists.
//!
//! Arrays are addressed in place (`gep [0, i]`). Slices are `{ ptr, i64 }`
//! fat values. Lists are opaque runtime handles whose elements travel as
//! `i64` slots.

use tracing::trace;

use crate::diagnostics::{ErrorCode, LowerError};
use crate::ir::{CastOp, IntPred, IsaType, Operand, TypedValue};
use crate::sema::SemType;

use super::dispatch::MethodSite;
use super::LowerContext;

fn index_arg(cx: &mut LowerContext<'_>, site: &MethodSite<'_>) -> Result<Option<TypedValue>, LowerError> {
    let Some(arg) = site.arg(0) else {
        return Ok(None);
    };
    let i = cx.lower_expr(arg)?;
    Ok(Some(cx.coerce_to(i, &IsaType::i64())))
}

fn missing_index(cx: &mut LowerContext<'_>, site: &MethodSite<'_>) -> Option<TypedValue> {
    cx.missing_arg(site, ErrorCode::MissingIntrinsicArg, format!("{}() requires an index argument", site.method))
}

/// Integer results follow the call's type; lengths are `i64` otherwise.
fn length_result(cx: &mut LowerContext<'_>, site: &MethodSite<'_>, len: TypedValue) -> TypedValue {
    let ty = cx.call_result_isa(site);
    if ty.is_int() { cx.coerce_to(len, &ty) } else { len }
}

pub(super) fn resolve_array(cx: &mut LowerContext<'_>, site: &MethodSite<'_>) -> Result<Option<TypedValue>, LowerError> {
    let Some(SemType::Array { elem, len }) = site.sem.clone() else {
        return Ok(None);
    };
    if !matches!(site.method, "len" | "is_empty" | "get" | "first" | "last") {
        return Ok(None);
    }
    cx.mark(&format!("Array::{}", site.method));

    match site.method {
        "len" => Ok(Some(length_result(cx, site, TypedValue::i64(i128::from(len))))),
        "is_empty" => Ok(Some(TypedValue::bool(len == 0))),
        method => {
            let index = match method {
                "get" => match index_arg(cx, site)? {
                    Some(i) => i,
                    None => return Ok(missing_index(cx, site)),
                },
                "first" => TypedValue::i64(0),
                _ => TypedValue::i64(i128::from(len.saturating_sub(1))),
            };
            let elem_ty = cx.isa_of(&elem);
            let array_ty = IsaType::Array(len, Box::new(elem_ty.clone()));
            let base = match cx.place_of(site.receiver)? {
                Some(place) => place.ptr,
                None => {
                    let v = cx.lower_expr(site.receiver)?;
                    cx.spill(v)
                }
            };
            let p = cx.builder.gep(&array_ty, base, vec![TypedValue::i32(0), index], true);
            Ok(Some(cx.builder.load(&elem_ty, p)))
        }
    }
}

/// `[T]` receivers, answered before the receiver is evaluated.
pub(super) fn resolve_slice_type(
    cx: &mut LowerContext<'_>,
    site: &MethodSite<'_>,
) -> Result<Option<TypedValue>, LowerError> {
    let Some(SemType::Slice(elem)) = site.sem.clone() else {
        return Ok(None);
    };
    if !matches!(site.method, "len" | "is_empty" | "get") {
        return Ok(None);
    }
    let value = cx.lower_expr(site.receiver)?;
    slice_method(cx, site, value, &elem).map(Some)
}

/// `Slice[T]` and `MutSlice[T]` receivers.
pub(super) fn resolve_slice(cx: &mut LowerContext<'_>, site: &MethodSite<'_>) -> Result<Option<TypedValue>, LowerError> {
    let Some(sem) = site.receiver_sem() else {
        return Ok(None);
    };
    if !(sem.is_named("Slice") || sem.is_named("MutSlice")) || !matches!(site.method, "len" | "is_empty" | "get") {
        return Ok(None);
    }
    let elem = sem.type_args().first().cloned().unwrap_or_else(SemType::i32);
    let value = site.recv()?.value.clone();
    slice_method(cx, site, value, &elem).map(Some)
}

fn slice_method(
    cx: &mut LowerContext<'_>,
    site: &MethodSite<'_>,
    slice: TypedValue,
    elem: &SemType,
) -> Result<TypedValue, LowerError> {
    cx.mark(&format!("Slice::{}", site.method));
    match site.method {
        "len" => {
            let len = cx.builder.extract_value(slice, 1, &IsaType::i64());
            Ok(length_result(cx, site, len))
        }
        "is_empty" => {
            let len = cx.builder.extract_value(slice, 1, &IsaType::i64());
            Ok(cx.builder.icmp(IntPred::Eq, &IsaType::i64(), len.op, Operand::Int(0)))
        }
        _ => {
            let Some(index) = index_arg(cx, site)? else {
                return Ok(missing_index(cx, site).unwrap_or_else(|| cx.placeholder_for(site.call)));
            };
            let elem_ty = cx.isa_of(elem);
            let data = cx.builder.extract_value(slice, 0, &IsaType::Ptr);
            let p = cx.builder.gep(&elem_ty, data.op, vec![index], true);
            Ok(cx.builder.load(&elem_ty, p))
        }
    }
}

/// Widen an element into the list's `i64` slot.
fn to_slot(cx: &mut LowerContext<'_>, v: TypedValue) -> TypedValue {
    let i64 = IsaType::i64();
    match &v.ty {
        IsaType::Ptr => cx.builder.cast(CastOp::PtrToInt, v, &i64),
        IsaType::Float(_) => {
            let wide = cx.coerce_to(v, &IsaType::f64());
            cx.builder.cast(CastOp::Bitcast, wide, &i64)
        }
        _ => cx.coerce_to(v, &i64),
    }
}

fn from_slot(cx: &mut LowerContext<'_>, v: TypedValue, ty: &IsaType) -> TypedValue {
    match ty {
        IsaType::Ptr => cx.builder.cast(CastOp::IntToPtr, v, ty),
        IsaType::Float(_) => {
            let f = cx.builder.cast(CastOp::Bitcast, v, &IsaType::f64());
            cx.coerce_to(f, ty)
        }
        IsaType::Int { .. } | IsaType::Bool => cx.coerce_to(v, ty),
        _ => v,
    }
}

/// `List[T]` / `Vec[T]` through the runtime.
pub(super) fn resolve_list(cx: &mut LowerContext<'_>, site: &MethodSite<'_>) -> Result<Option<TypedValue>, LowerError> {
    let Some(sem) = site.receiver_sem() else {
        return Ok(None);
    };
    if !(sem.is_named("List") || sem.is_named("Vec")) {
        return Ok(None);
    }
    let elem = sem.type_args().first().cloned().unwrap_or_else(SemType::i32);
    let elem_ty = cx.isa_of(&elem);
    let handle = site.recv()?.value.clone();

    let v = match site.method {
        "len" => {
            let len = cx.call_runtime("list_len", vec![handle])?;
            length_result(cx, site, len)
        }
        "is_empty" => {
            let len = cx.call_runtime("list_len", vec![handle])?;
            cx.builder.icmp(IntPred::Eq, &IsaType::i64(), len.op, Operand::Int(0))
        }
        "push" => {
            let Some(arg) = site.arg(0) else {
                return Ok(cx.missing_arg(site, ErrorCode::MissingArgument, "push() requires a value argument"));
            };
            let v = cx.lower_expr_hinted(arg, Some(&elem_ty))?;
            let v = cx.coerce_to(v, &elem_ty);
            let slot = to_slot(cx, v);
            cx.call_runtime("list_push", vec![handle, slot])?
        }
        "get" => {
            let Some(index) = index_arg(cx, site)? else {
                return Ok(missing_index(cx, site));
            };
            let raw = cx.call_runtime("list_get", vec![handle, index])?;
            from_slot(cx, raw, &elem_ty)
        }
        "pop" => {
            let raw = cx.call_runtime("list_pop", vec![handle])?;
            from_slot(cx, raw, &elem_ty)
        }
        "clear" => cx.call_runtime("list_clear", vec![handle])?,
        _ => {
            trace!(method = site.method, "not a list method");
            return Ok(None);
        }
    };
    cx.mark(&format!("List::{}", site.method));
    Ok(Some(v))
}
