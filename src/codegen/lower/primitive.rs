//! Inline intrinsics on primitive receivers: comparisons, arithmetic
//! behavior methods, `cmp`, `hash`, `min`/`max`/`clamp`, string length and
//! `to_string`, plus the behavior default-method fallback.

use tracing::{debug, trace};

use crate::ast::BinaryOp;
use crate::diagnostics::{ErrorCode, LowerError};
use crate::ir::{FloatPred, IntPred, IsaType, Operand, TypedValue};
use crate::sema::{FuncSig, PrimKind, SemType};

use super::binary::{float_pred, int_pred};
use super::dispatch::{MethodSite, Receiver};
use super::generic::instantiate;
use super::LowerContext;

fn comparison(method: &str) -> Option<BinaryOp> {
    Some(match method {
        "eq" => BinaryOp::Eq,
        "ne" => BinaryOp::Ne,
        "lt" => BinaryOp::Lt,
        "le" => BinaryOp::Le,
        "gt" => BinaryOp::Gt,
        "ge" => BinaryOp::Ge,
        _ => return None,
    })
}

fn arithmetic(method: &str) -> Option<BinaryOp> {
    Some(match method {
        "add" => BinaryOp::Add,
        "sub" => BinaryOp::Sub,
        "mul" => BinaryOp::Mul,
        "div" => BinaryOp::Div,
        "rem" => BinaryOp::Rem,
        _ => return None,
    })
}

fn receiver_kind(site: &MethodSite<'_>) -> Option<PrimKind> {
    site.receiver_sem().and_then(SemType::prim_kind)
}

/// `a.eq(b)`, `a.lt(b)` and friends on primitives.
pub(super) fn resolve_compare(cx: &mut LowerContext<'_>, site: &MethodSite<'_>) -> Result<Option<TypedValue>, LowerError> {
    let (Some(kind), Some(op)) = (receiver_kind(site), comparison(site.method)) else {
        return Ok(None);
    };
    let recv = site.recv()?;
    compare(cx, site, recv, kind, op)
}

/// Everything else a primitive answers inline.
pub(super) fn resolve_primitive(cx: &mut LowerContext<'_>, site: &MethodSite<'_>) -> Result<Option<TypedValue>, LowerError> {
    let Some(kind) = receiver_kind(site) else {
        return Ok(None);
    };
    let recv = site.recv()?;
    lower_intrinsic(cx, site, recv, kind)
}

/// A default method of a behavior the primitive implements, called
/// as `Behavior_method(self, ...)`. A method defined on an alias of a
/// primitive is found here too.
pub(super) fn resolve_behavior_default(
    cx: &mut LowerContext<'_>,
    site: &MethodSite<'_>,
) -> Result<Option<TypedValue>, LowerError> {
    let Some(kind) = receiver_kind(site) else {
        return Ok(None);
    };
    let env = cx.env;
    let recv = site.recv()?.clone();
    let self_ty = SemType::prim(kind);

    // An explicit impl on the primitive is picked up by the impl resolvers.
    if cx.lookup_any(&format!("{}::{}", kind.name(), site.method)).is_none() {
        for behavior in env.impls_of(kind.name()) {
            let Some(def) = env.lookup_behavior(behavior) else {
                continue;
            };
            let Some(method) = def.method(site.method).filter(|m| m.has_default) else {
                continue;
            };
            let sig = FuncSig { params: method.params.clone(), ret: method.ret.clone() };
            let sig = instantiate(&sig, &cx.impl_subs(&self_ty));
            let qualified = format!("{behavior}::{}", site.method);
            let symbol = cx.user_symbol(&qualified);
            cx.mark(&qualified);
            debug!(callee = %qualified, "primitive behavior default");
            return cx.direct_call(site.call, &symbol, &sig, Some(recv.value), site.args).map(Some);
        }
    }

    let alias = site
        .receiver
        .ty
        .as_ref()
        .map(|t| t.substitute(&cx.type_subs).strip_refs().clone())
        .and_then(|t| match t {
            SemType::Named { name, type_args, .. } if type_args.is_empty() && env.resolve_alias(&name).is_some() => {
                Some(name)
            }
            _ => None,
        });
    if let Some(alias) = alias {
        let qualified = format!("{alias}::{}", site.method);
        if let Some(sig) = cx.lookup_any(&qualified) {
            let sig = instantiate(&sig, &cx.impl_subs(&self_ty));
            let symbol = cx.user_symbol(&qualified);
            debug!(callee = %qualified, "method on primitive alias");
            return cx.direct_call(site.call, &symbol, &sig, Some(recv.value), site.args).map(Some);
        }
    }
    Ok(None)
}

/// Lower the first argument at the receiver's type.
fn operand_arg(
    cx: &mut LowerContext<'_>,
    site: &MethodSite<'_>,
    recv: &Receiver,
    index: usize,
) -> Result<Option<TypedValue>, LowerError> {
    let Some(arg) = site.arg(index) else {
        return Ok(None);
    };
    let ty = recv.value.ty.clone();
    let v = cx.lower_expr_hinted(arg, Some(&ty))?;
    Ok(Some(cx.coerce_to(v, &ty)))
}

fn missing(cx: &mut LowerContext<'_>, site: &MethodSite<'_>) -> Option<TypedValue> {
    cx.missing_arg(site, ErrorCode::MissingIntrinsicArg, format!("Missing argument for {}", site.method))
}

fn compare(
    cx: &mut LowerContext<'_>,
    site: &MethodSite<'_>,
    recv: &Receiver,
    kind: PrimKind,
    op: BinaryOp,
) -> Result<Option<TypedValue>, LowerError> {
    let Some(arg) = site.arg(0) else {
        return Ok(missing(cx, site));
    };
    let rhs = cx.lower_expr_hinted(arg, Some(&recv.value.ty))?;
    if kind == PrimKind::Str && matches!(op, BinaryOp::Eq | BinaryOp::Ne) {
        return cx.string_eq(op, recv.value.clone(), rhs).map(Some);
    }
    let rsem = cx.sem_of(arg);
    let unified = cx.unify_operands(recv.value.clone(), recv.sem.as_ref(), rhs, rsem.as_ref());
    Ok(Some(cx.emit_binary_op(site.call, op, unified)))
}

/// Compare two values of the receiver's type without coverage markers.
fn raw_compare(cx: &mut LowerContext<'_>, op: BinaryOp, unsigned: bool, a: &TypedValue, b: &TypedValue) -> TypedValue {
    let ty = a.ty.clone();
    if ty.is_float() {
        let pred = float_pred(op).unwrap_or(FloatPred::Oeq);
        cx.builder.fcmp(pred, &ty, a.op.clone(), b.op.clone())
    } else {
        let pred = int_pred(op, unsigned || ty == IsaType::Bool).unwrap_or(IntPred::Eq);
        cx.builder.icmp(pred, &ty, a.op.clone(), b.op.clone())
    }
}

/// Primitive intrinsic codegen shared by the primitive resolver and by
/// bounded-generic calls whose type parameter is a primitive.
pub(crate) fn lower_intrinsic(
    cx: &mut LowerContext<'_>,
    site: &MethodSite<'_>,
    recv: &Receiver,
    kind: PrimKind,
) -> Result<Option<TypedValue>, LowerError> {
    if let Some(op) = comparison(site.method) {
        return compare(cx, site, recv, kind, op);
    }
    if kind == PrimKind::Str {
        return string_method(cx, site, recv);
    }
    if site.method.starts_with("checked_") && kind.is_integer() {
        return cx.lower_checked(site, recv, kind);
    }

    let this = recv.value.clone();
    let ty = this.ty.clone();
    let unsigned = kind.is_unsigned();

    match site.method {
        "duplicate" | "to_owned" => {
            cx.mark("Duplicate::duplicate");
            Ok(Some(this))
        }
        m if arithmetic(m).is_some() => {
            let Some(op) = arithmetic(m) else {
                return Ok(None);
            };
            let Some(rhs) = operand_arg(cx, site, recv, 0)? else {
                return Ok(missing(cx, site));
            };
            Ok(cx.emit_arith(op, &ty, unsigned, this, rhs))
        }
        "neg" => {
            cx.mark("Neg::neg");
            Ok(Some(cx.negate(this)))
        }
        "cmp" | "partial_cmp" => {
            let Some(rhs) = operand_arg(cx, site, recv, 0)? else {
                return Ok(missing(cx, site));
            };
            cx.mark(if site.method == "cmp" { "Ord::cmp" } else { "PartialOrd::partial_cmp" });
            let lt = raw_compare(cx, BinaryOp::Lt, unsigned, &this, &rhs);
            let eq = raw_compare(cx, BinaryOp::Eq, unsigned, &this, &rhs);
            let i32 = IsaType::i32();
            let not_less = cx.builder.select(eq.op, &i32, Operand::Int(1), Operand::Int(2));
            let tag = cx.builder.select(lt.op, &i32, Operand::Int(0), not_less.op);
            let ordering = cx.make_ordering(tag);
            // `partial_cmp` typed as `Maybe[Ordering]` wraps the result.
            match cx.sem_of(site.call) {
                Some(s) if s.is_named("Maybe") => {
                    let union_ty = cx.isa_of(&s);
                    Ok(Some(cx.build_union(&union_ty, 0, Some(ordering))))
                }
                _ => Ok(Some(ordering)),
            }
        }
        "hash" => {
            if !ty.is_integral() {
                return Ok(None);
            }
            cx.mark("Hash::hash");
            Ok(Some(cx.coerce_to(this, &IsaType::i64())))
        }
        "min" | "max" => {
            let Some(rhs) = operand_arg(cx, site, recv, 0)? else {
                return Ok(missing(cx, site));
            };
            let is_min = site.method == "min";
            cx.mark(if is_min { "Ord::min" } else { "Ord::max" });
            let op = if is_min { BinaryOp::Lt } else { BinaryOp::Gt };
            let keep = raw_compare(cx, op, unsigned, &this, &rhs);
            Ok(Some(cx.builder.select(keep.op, &ty, this.op, rhs.op)))
        }
        "clamp" => {
            let (Some(lo), Some(hi)) = (operand_arg(cx, site, recv, 0)?, operand_arg(cx, site, recv, 1)?) else {
                return Ok(missing(cx, site));
            };
            cx.mark("Ord::clamp");
            let below = raw_compare(cx, BinaryOp::Lt, unsigned, &this, &lo);
            let raised = cx.builder.select(below.op, &ty, lo.op, this.op);
            let above = raw_compare(cx, BinaryOp::Gt, unsigned, &raised, &hi);
            Ok(Some(cx.builder.select(above.op, &ty, hi.op, raised.op)))
        }
        "is_zero" | "is_one" => {
            let one = site.method == "is_one";
            cx.mark(if one { "One::is_one" } else { "Zero::is_zero" });
            let constant = if ty.is_float() {
                TypedValue::new(Operand::Float(if one { 1.0 } else { 0.0 }), ty.clone())
            } else if ty == IsaType::Bool {
                TypedValue::bool(one)
            } else {
                TypedValue::int(i128::from(one), ty.clone())
            };
            Ok(Some(raw_compare(cx, BinaryOp::Eq, unsigned, &this, &constant)))
        }
        "abs" => {
            cx.mark("Abs::abs");
            if unsigned || !ty.is_int() && !ty.is_float() {
                return Ok(Some(this));
            }
            let zero = if ty.is_float() {
                TypedValue::new(Operand::Float(0.0), ty.clone())
            } else {
                TypedValue::int(0, ty.clone())
            };
            let negative = raw_compare(cx, BinaryOp::Lt, false, &this, &zero);
            let flipped = cx.negate(this.clone());
            Ok(Some(cx.builder.select(negative.op, &ty, flipped.op, this.op)))
        }
        "to_string" => {
            cx.mark("Display::to_string");
            let v = match ty {
                IsaType::Bool => cx.call_runtime("bool_to_string", vec![this])?,
                IsaType::Float(_) => {
                    let wide = cx.coerce_to(this, &IsaType::f64());
                    cx.call_runtime("float_to_string", vec![wide])?
                }
                _ => {
                    let wide = cx.coerce_to(this, &IsaType::i64());
                    cx.call_runtime("int_to_string", vec![wide])?
                }
            };
            Ok(Some(v))
        }
        _ => {
            trace!(method = site.method, prim = %kind, "not a primitive intrinsic");
            Ok(None)
        }
    }
}

fn string_method(
    cx: &mut LowerContext<'_>,
    site: &MethodSite<'_>,
    recv: &Receiver,
) -> Result<Option<TypedValue>, LowerError> {
    match site.method {
        "len" => {
            cx.mark("Str::len");
            let len = cx.call_runtime("string_len", vec![recv.value.clone()])?;
            let ty = cx.call_result_isa(site);
            Ok(Some(if ty.is_int() { cx.coerce_to(len, &ty) } else { len }))
        }
        "is_empty" => {
            cx.mark("Str::is_empty");
            let len = cx.call_runtime("string_len", vec![recv.value.clone()])?;
            Ok(Some(cx.builder.icmp(IntPred::Eq, &IsaType::i64(), len.op, Operand::Int(0))))
        }
        "to_string" | "duplicate" | "to_owned" => {
            cx.mark("Display::to_string");
            Ok(Some(recv.value.clone()))
        }
        "concat" => {
            let Some(arg) = site.arg(0) else {
                return Ok(missing(cx, site));
            };
            let rhs = cx.lower_expr(arg)?;
            cx.mark("Add::add");
            cx.call_runtime("string_concat", vec![recv.value.clone(), rhs]).map(Some)
        }
        _ => Ok(None),
    }
}
