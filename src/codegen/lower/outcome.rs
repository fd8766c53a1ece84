//! `Outcome[T, E]` combinators. Tag 0 is `Ok`, tag 1 is `Err`; both
//! payloads share the union's payload slot.

use tracing::trace;

use crate::diagnostics::{ErrorCode, LowerError};
use crate::ir::{IsaType, TypedValue};
use crate::sema::SemType;

use super::dispatch::MethodSite;
use super::lambda::{Callable, LambdaArg};
use super::maybe::{JUST, NOTHING};
use super::LowerContext;

const OK: u32 = 0;
const ERR: u32 = 1;

const METHODS: &[&str] = &[
    "is_ok", "is_err", "unwrap", "expect", "unwrap_err", "expect_err", "unwrap_or", "unwrap_or_default",
    "unwrap_or_else", "ok", "err", "contains", "contains_err", "alt", "also", "is_ok_and", "is_err_and", "map",
    "map_err", "map_or", "and_then", "or_else", "duplicate",
];

pub(super) fn resolve_outcome(cx: &mut LowerContext<'_>, site: &MethodSite<'_>) -> Result<Option<TypedValue>, LowerError> {
    let Some(sem) = site.receiver_sem().filter(|s| s.is_named("Outcome")).cloned() else {
        return Ok(None);
    };
    if !METHODS.contains(&site.method) {
        trace!(method = site.method, "not an Outcome combinator");
        return Ok(None);
    }
    let ok_sem = sem.type_args().first().cloned().unwrap_or_else(SemType::unit);
    let err_sem = sem.type_args().get(1).cloned().unwrap_or_else(SemType::unit);
    let ok_ty = cx.isa_of(&ok_sem);
    let err_ty = cx.isa_of(&err_sem);
    let union_ty = cx.isa_of(&sem);
    let recv = site.recv()?.clone();
    let value = cx.union_value(&recv, &union_ty);
    cx.mark(&format!("Outcome::{}", site.method));

    let call = OutcomeCall { site, ok_sem, err_sem, ok_ty, err_ty, union_ty, value };
    call.lower(cx).map(Some)
}

struct OutcomeCall<'s, 'e> {
    site: &'s MethodSite<'e>,
    ok_sem: SemType,
    err_sem: SemType,
    ok_ty: IsaType,
    err_ty: IsaType,
    union_ty: IsaType,
    value: TypedValue,
}

impl<'e> OutcomeCall<'_, 'e> {
    fn prefix(&self) -> String {
        format!("outcome_{}", self.site.method)
    }

    fn ok_payload(&self, cx: &mut LowerContext<'_>) -> TypedValue {
        cx.union_payload(&self.value, &self.ok_ty)
    }

    fn err_payload(&self, cx: &mut LowerContext<'_>) -> TypedValue {
        cx.union_payload(&self.value, &self.err_ty)
    }

    fn ok_arg(&self, cx: &mut LowerContext<'_>) -> LambdaArg {
        LambdaArg::Value(self.ok_payload(cx), Some(self.ok_sem.clone()))
    }

    fn err_arg(&self, cx: &mut LowerContext<'_>) -> LambdaArg {
        LambdaArg::Value(self.err_payload(cx), Some(self.err_sem.clone()))
    }

    fn missing(&self, cx: &mut LowerContext<'_>, code: ErrorCode, message: String) -> TypedValue {
        let site = self.site;
        cx.missing_arg(site, code, message).unwrap_or_else(TypedValue::void)
    }

    /// Argument `index` as a lambda or function reference.
    fn function_arg(&self, cx: &mut LowerContext<'_>, index: usize) -> Option<Callable<'e>> {
        let site = self.site;
        if site.args.len() <= index {
            cx.diag(
                ErrorCode::FunctionRequired,
                format!("{} requires a function argument", site.method),
                site.method_span,
            );
            return None;
        }
        cx.require_callable(
            site,
            index,
            ErrorCode::LambdaOrFunctionRequired,
            &format!("{} requires a closure or function reference", site.method),
        )
    }

    /// The result union of a mapping combinator: the checker's type, else
    /// `Outcome[ok, err]` with the mapped side replaced.
    fn mapped_union(&self, cx: &mut LowerContext<'_>, ok: SemType, err: SemType) -> (SemType, IsaType) {
        let sem = cx.union_result_sem(self.site, "Outcome", SemType::outcome(ok, err));
        let ty = cx.isa_of(&sem);
        (sem, ty)
    }

    fn lower(self, cx: &mut LowerContext<'_>) -> Result<TypedValue, LowerError> {
        let site = self.site;
        let value = self.value.clone();
        let union_ty = self.union_ty.clone();
        let ok_ty = self.ok_ty.clone();
        let prefix = self.prefix();

        match site.method {
            "is_ok" => Ok(cx.tag_is(&value, OK)),
            "is_err" => Ok(cx.tag_is(&value, ERR)),
            "unwrap" | "expect" => Ok(self.ok_payload(cx)),
            "unwrap_err" | "expect_err" => Ok(self.err_payload(cx)),
            "duplicate" => Ok(value),
            "unwrap_or" => {
                let Some(arg) = site.arg(0) else {
                    return Ok(self.missing(cx, ErrorCode::MissingArgument, "unwrap_or requires an argument".into()));
                };
                let fallback = cx.lower_expr_hinted(arg, Some(&ok_ty))?;
                let fallback = cx.coerce_to(fallback, &ok_ty);
                let payload = self.ok_payload(cx);
                let is_ok = cx.tag_is(&value, OK);
                Ok(cx.builder.select(is_ok.op, &ok_ty, payload.op, fallback.op))
            }
            "unwrap_or_default" => {
                let payload = self.ok_payload(cx);
                let fallback = cx.placeholder(&ok_ty);
                let is_ok = cx.tag_is(&value, OK);
                Ok(cx.builder.select(is_ok.op, &ok_ty, payload.op, fallback.op))
            }
            "unwrap_or_else" => {
                let Some(f) = self.function_arg(cx, 0) else {
                    return Ok(cx.placeholder(&ok_ty));
                };
                let is_ok = cx.tag_is(&value, OK);
                cx.branch_merge(
                    is_ok.op,
                    &prefix,
                    ("ok", "err"),
                    &ok_ty,
                    |cx| Ok(self.ok_payload(cx)),
                    |cx| {
                        let arg = self.err_arg(cx);
                        cx.apply_callable(&f, vec![arg], &ok_ty, "uoe")
                    },
                )
            }
            "ok" | "err" => {
                let (want, payload_sem, payload_ty) = if site.method == "ok" {
                    (OK, self.ok_sem.clone(), self.ok_ty.clone())
                } else {
                    (ERR, self.err_sem.clone(), self.err_ty.clone())
                };
                let out_sem = cx.union_result_sem(site, "Maybe", SemType::maybe(payload_sem));
                let out_ty = cx.isa_of(&out_sem);
                let matches = cx.tag_is(&value, want);
                cx.branch_merge(
                    matches.op,
                    &prefix,
                    ("some", "none"),
                    &out_ty,
                    |cx| {
                        let payload = cx.union_payload(&value, &payload_ty);
                        Ok(cx.build_union(&out_ty, JUST, Some(payload)))
                    },
                    |cx| Ok(cx.build_union(&out_ty, NOTHING, None)),
                )
            }
            "contains" | "contains_err" => {
                let Some(arg) = site.arg(0) else {
                    return Ok(self.missing(cx, ErrorCode::MissingArgument, format!("{} requires an argument", site.method)));
                };
                let (want, payload_sem, payload_ty) = if site.method == "contains" {
                    (OK, &self.ok_sem, self.ok_ty.clone())
                } else {
                    (ERR, &self.err_sem, self.err_ty.clone())
                };
                let is_str = payload_sem.is_str();
                let probe = cx.lower_expr_hinted(arg, Some(&payload_ty))?;
                let matches = cx.tag_is(&value, want);
                cx.branch_merge(
                    matches.op,
                    &prefix,
                    ("match", "other"),
                    &IsaType::Bool,
                    |cx| {
                        let payload = cx.union_payload(&value, &payload_ty);
                        cx.payload_eq(payload, probe, is_str)
                    },
                    |_| Ok(TypedValue::bool(false)),
                )
            }
            "alt" | "also" => {
                let Some(arg) = site.arg(0) else {
                    return Ok(self.missing(cx, ErrorCode::MissingArgument, format!("{} requires an argument", site.method)));
                };
                let other = cx.lower_expr_hinted(arg, Some(&union_ty))?;
                let is_ok = cx.tag_is(&value, OK);
                // alt keeps an Ok receiver, also replaces it.
                let (on_ok, on_err) = if site.method == "alt" { (value, other) } else { (other, value) };
                let ty = on_ok.ty.clone();
                Ok(cx.builder.select(is_ok.op, &ty, on_ok.op, on_err.op))
            }
            "is_ok_and" | "is_err_and" => {
                let Some(f) = self.function_arg(cx, 0) else {
                    return Ok(TypedValue::bool(false));
                };
                let want = if site.method == "is_ok_and" { OK } else { ERR };
                let matches = cx.tag_is(&value, want);
                cx.branch_merge(
                    matches.op,
                    &prefix,
                    ("match", "other"),
                    &IsaType::Bool,
                    |cx| {
                        let arg = if want == OK { self.ok_arg(cx) } else { self.err_arg(cx) };
                        cx.apply_callable(&f, vec![arg], &IsaType::Bool, "pred")
                    },
                    |_| Ok(TypedValue::bool(false)),
                )
            }
            "map" => {
                let Some(f) = self.function_arg(cx, 0) else {
                    return Ok(value);
                };
                let mapped = cx.callable_result_sem(&f).unwrap_or_else(|| self.ok_sem.clone());
                let (out_sem, out_ty) = self.mapped_union(cx, mapped, self.err_sem.clone());
                let out_ok = out_sem.type_args().first().cloned().unwrap_or_else(SemType::unit);
                let out_ok_ty = cx.isa_of(&out_ok);
                let is_ok = cx.tag_is(&value, OK);
                cx.branch_merge(
                    is_ok.op,
                    &prefix,
                    ("ok", "err"),
                    &out_ty,
                    |cx| {
                        let arg = self.ok_arg(cx);
                        let v = cx.apply_callable(&f, vec![arg], &out_ok_ty, "map")?;
                        Ok(cx.build_union(&out_ty, OK, Some(v)))
                    },
                    |cx| {
                        let e = self.err_payload(cx);
                        Ok(cx.build_union(&out_ty, ERR, Some(e)))
                    },
                )
            }
            "map_err" => {
                let Some(f) = self.function_arg(cx, 0) else {
                    return Ok(value);
                };
                let mapped = cx.callable_result_sem(&f).unwrap_or_else(|| self.err_sem.clone());
                let (out_sem, out_ty) = self.mapped_union(cx, self.ok_sem.clone(), mapped);
                let out_err = out_sem.type_args().get(1).cloned().unwrap_or_else(SemType::unit);
                let out_err_ty = cx.isa_of(&out_err);
                let is_ok = cx.tag_is(&value, OK);
                cx.branch_merge(
                    is_ok.op,
                    &prefix,
                    ("ok", "err"),
                    &out_ty,
                    |cx| {
                        let v = self.ok_payload(cx);
                        Ok(cx.build_union(&out_ty, OK, Some(v)))
                    },
                    |cx| {
                        let arg = self.err_arg(cx);
                        let e = cx.apply_callable(&f, vec![arg], &out_err_ty, "map_err")?;
                        Ok(cx.build_union(&out_ty, ERR, Some(e)))
                    },
                )
            }
            "map_or" => {
                if site.args.len() < 2 {
                    return Ok(self.missing(
                        cx,
                        ErrorCode::DefaultAndLambdaRequired,
                        "map_or requires a default value and a function".into(),
                    ));
                }
                let Some(f) = cx.require_callable(
                    site,
                    1,
                    ErrorCode::LambdaOrFunctionRequired,
                    "map_or requires a closure or function reference",
                ) else {
                    return Ok(cx.placeholder_for(site.call));
                };
                let out_sem = cx
                    .sem_of(site.call)
                    .or_else(|| cx.callable_result_sem(&f))
                    .unwrap_or_else(|| self.ok_sem.clone());
                let out_ty = cx.isa_of(&out_sem);
                let fallback = cx.lower_expr_hinted(&site.args[0], Some(&out_ty))?;
                let is_ok = cx.tag_is(&value, OK);
                cx.branch_merge(
                    is_ok.op,
                    &prefix,
                    ("ok", "err"),
                    &out_ty,
                    |cx| {
                        let arg = self.ok_arg(cx);
                        cx.apply_callable(&f, vec![arg], &out_ty, "map_or")
                    },
                    |_| Ok(fallback),
                )
            }
            "and_then" => {
                let Some(f) = self.function_arg(cx, 0) else {
                    return Ok(value);
                };
                let fallback = cx
                    .callable_result_sem(&f)
                    .filter(|s| s.is_named("Outcome"))
                    .unwrap_or_else(|| SemType::outcome(self.ok_sem.clone(), self.err_sem.clone()));
                let out_sem = cx.union_result_sem(site, "Outcome", fallback);
                let out_ty = cx.isa_of(&out_sem);
                let is_ok = cx.tag_is(&value, OK);
                cx.branch_merge(
                    is_ok.op,
                    &prefix,
                    ("ok", "err"),
                    &out_ty,
                    |cx| {
                        let arg = self.ok_arg(cx);
                        cx.apply_callable(&f, vec![arg], &out_ty, "and_then")
                    },
                    |cx| {
                        let e = self.err_payload(cx);
                        Ok(cx.build_union(&out_ty, ERR, Some(e)))
                    },
                )
            }
            "or_else" => {
                let Some(f) = self.function_arg(cx, 0) else {
                    return Ok(value);
                };
                let fallback = cx
                    .callable_result_sem(&f)
                    .filter(|s| s.is_named("Outcome"))
                    .unwrap_or_else(|| SemType::outcome(self.ok_sem.clone(), self.err_sem.clone()));
                let out_sem = cx.union_result_sem(site, "Outcome", fallback);
                let out_ty = cx.isa_of(&out_sem);
                let is_ok = cx.tag_is(&value, OK);
                cx.branch_merge(
                    is_ok.op,
                    &prefix,
                    ("ok", "err"),
                    &out_ty,
                    |cx| {
                        let v = self.ok_payload(cx);
                        Ok(cx.build_union(&out_ty, OK, Some(v)))
                    },
                    |cx| {
                        let arg = self.err_arg(cx);
                        cx.apply_callable(&f, vec![arg], &out_ty, "or_else")
                    },
                )
            }
            _ => Err(LowerError::internal(format!("Outcome::{} listed but not lowered", site.method))),
        }
    }
}
