//! `Maybe[T]` combinators.
//!
//! Predicates and the `_or` extractors are a tag test plus `select`.
//! Anything that runs a lambda branches on the tag, inlines the lambda in
//! the present arm and merges both arms with a phi at `maybe_<method>_end`.

use tracing::trace;

use crate::ast::ExprKind;
use crate::diagnostics::{ErrorCode, LowerError};
use crate::ir::{FloatPred, IntPred, IsaType, Label, Operand, TypedValue};
use crate::sema::SemType;

use super::dispatch::{MethodSite, Receiver};
use super::lambda::{Callable, LambdaArg};
use super::LowerContext;

pub(crate) const JUST: u32 = 0;
pub(crate) const NOTHING: u32 = 1;

const METHODS: &[&str] = &[
    "is_just", "is_some", "is_nothing", "is_none", "unwrap", "expect", "unwrap_or", "unwrap_or_else",
    "unwrap_or_default", "map", "and_then", "or_else", "contains", "filter", "alt", "one_of", "duplicate",
    "map_or",
];

impl LowerContext<'_> {
    /// Branch on `cond` into `{prefix}_{arms.0}` and `{prefix}_{arms.1}`,
    /// lower each arm and merge the arm values at `{prefix}_end`. Arm values
    /// are coerced to `ty` before leaving their block.
    pub(crate) fn branch_merge(
        &mut self,
        cond: Operand,
        prefix: &str,
        arms: (&str, &str),
        ty: &IsaType,
        on_true: impl FnOnce(&mut Self) -> Result<TypedValue, LowerError>,
        on_false: impl FnOnce(&mut Self) -> Result<TypedValue, LowerError>,
    ) -> Result<TypedValue, LowerError> {
        let then_label = self.builder.create_block(&format!("{prefix}_{}", arms.0));
        let else_label = self.builder.create_block(&format!("{prefix}_{}", arms.1));
        let end = self.builder.create_block(&format!("{prefix}_end"));
        self.builder.cond_br(cond, &then_label, &else_label);

        let mut incoming = Vec::with_capacity(2);
        self.builder.switch_to_block(&then_label);
        let v = on_true(self)?;
        self.finish_arm(v, ty, &end, &mut incoming);

        self.builder.switch_to_block(&else_label);
        let v = on_false(self)?;
        self.finish_arm(v, ty, &end, &mut incoming);

        self.builder.switch_to_block(&end);
        if ty.is_void() {
            return Ok(TypedValue::void());
        }
        if incoming.is_empty() {
            return Ok(self.placeholder(ty));
        }
        Ok(self.builder.phi(ty, incoming))
    }

    fn finish_arm(
        &mut self,
        value: TypedValue,
        ty: &IsaType,
        end: &Label,
        incoming: &mut Vec<(Operand, Label)>,
    ) {
        if !self.builder.current_block_unterminated() {
            return;
        }
        if !ty.is_void() {
            let v = if value.ty.is_void() { self.placeholder(ty) } else { self.coerce_to(value, ty) };
            incoming.push((v.op, self.builder.current_label()));
        }
        self.builder.br(end);
    }

    /// The receiver as a union value, loading it when only its address is
    /// at hand.
    pub(crate) fn union_value(&mut self, recv: &Receiver, union_ty: &IsaType) -> TypedValue {
        if recv.value.ty.is_ptr() && !union_ty.is_ptr() {
            self.builder.load(union_ty, recv.value.op.clone())
        } else {
            recv.value.clone()
        }
    }

    /// Argument `index` as a lambda or function reference, reporting `code`
    /// when it is neither.
    pub(crate) fn require_callable<'e>(
        &mut self,
        site: &MethodSite<'e>,
        index: usize,
        code: ErrorCode,
        message: &str,
    ) -> Option<Callable<'e>> {
        let arg = site.args.get(index);
        if let Some(c) = arg.and_then(|a| self.callable(a)) {
            return Some(c);
        }
        match arg.map(|a| &a.kind) {
            Some(ExprKind::Ident(name)) if self.locals.get(name).is_none() => {
                self.diag(ErrorCode::FunctionRequired, format!("'{name}' is not a function"), site.args[index].span);
            }
            _ => self.diag(code, message, site.method_span),
        }
        None
    }

    pub(crate) fn callable_result_sem(&self, callable: &Callable<'_>) -> Option<SemType> {
        match callable {
            Callable::Lambda(lambda) => self.lambda_result_sem(lambda),
            Callable::Func { sig, .. } => Some(self.resolve_sem(&sig.ret)),
        }
    }

    /// `payload == other` at the payload's type.
    pub(crate) fn payload_eq(&mut self, payload: TypedValue, other: TypedValue, is_str: bool) -> Result<TypedValue, LowerError> {
        if is_str {
            let raw = self.call_runtime("string_eq", vec![payload, other])?;
            return Ok(self.builder.icmp(IntPred::Ne, &IsaType::i32(), raw.op, Operand::Int(0)));
        }
        let ty = payload.ty.clone();
        let other = self.coerce_to(other, &ty);
        Ok(if ty.is_float() {
            self.builder.fcmp(FloatPred::Oeq, &ty, payload.op, other.op)
        } else {
            self.builder.icmp(IntPred::Eq, &ty, payload.op, other.op)
        })
    }

    /// Type of a combinator result: the checker's type for the call when it
    /// is the expected union, else `fallback`.
    pub(crate) fn union_result_sem(&self, site: &MethodSite<'_>, base: &str, fallback: SemType) -> SemType {
        match self.sem_of(site.call) {
            Some(s) if s.is_named(base) => s,
            _ => fallback,
        }
    }
}

pub(super) fn resolve_maybe(cx: &mut LowerContext<'_>, site: &MethodSite<'_>) -> Result<Option<TypedValue>, LowerError> {
    let Some(sem) = site.receiver_sem().filter(|s| s.is_named("Maybe")).cloned() else {
        return Ok(None);
    };
    if !METHODS.contains(&site.method) {
        trace!(method = site.method, "not a Maybe combinator");
        return Ok(None);
    }
    let inner_sem = sem.type_args().first().cloned().unwrap_or_else(SemType::i32);
    let inner_ty = cx.isa_of(&inner_sem);
    let union_ty = cx.isa_of(&sem);
    let recv = site.recv()?.clone();
    let value = cx.union_value(&recv, &union_ty);
    cx.mark(&format!("Maybe::{}", site.method));

    let m = MaybeCall { site, sem: &sem, inner_sem: &inner_sem, inner_ty: &inner_ty, union_ty: &union_ty, value };
    m.lower(cx).map(Some)
}

struct MaybeCall<'s, 'e> {
    site: &'s MethodSite<'e>,
    sem: &'s SemType,
    inner_sem: &'s SemType,
    inner_ty: &'s IsaType,
    union_ty: &'s IsaType,
    value: TypedValue,
}

impl MaybeCall<'_, '_> {
    fn prefix(&self) -> String {
        format!("maybe_{}", self.site.method)
    }

    fn payload(&self, cx: &mut LowerContext<'_>) -> TypedValue {
        cx.union_payload(&self.value, self.inner_ty)
    }

    fn payload_arg(&self, cx: &mut LowerContext<'_>) -> LambdaArg {
        LambdaArg::Value(self.payload(cx), Some(self.inner_sem.clone()))
    }

    fn lower(self, cx: &mut LowerContext<'_>) -> Result<TypedValue, LowerError> {
        let site = self.site;
        let value = self.value.clone();
        let union_ty = self.union_ty.clone();
        let inner_ty = self.inner_ty.clone();

        match site.method {
            "is_just" | "is_some" => Ok(cx.tag_is(&value, JUST)),
            "is_nothing" | "is_none" => Ok(cx.tag_is(&value, NOTHING)),
            "unwrap" | "expect" => Ok(self.payload(cx)),
            "duplicate" => Ok(value),
            "unwrap_or" => {
                let Some(arg) = site.arg(0) else {
                    return Ok(missing(cx, site, ErrorCode::MissingArgument, "unwrap_or() requires a default value"));
                };
                let fallback = cx.lower_expr_hinted(arg, Some(&inner_ty))?;
                let fallback = cx.coerce_to(fallback, &inner_ty);
                let payload = self.payload(cx);
                let is_just = cx.tag_is(&value, JUST);
                Ok(cx.builder.select(is_just.op, &inner_ty, payload.op, fallback.op))
            }
            "unwrap_or_default" => {
                let payload = self.payload(cx);
                let fallback = cx.placeholder(&inner_ty);
                let is_just = cx.tag_is(&value, JUST);
                Ok(cx.builder.select(is_just.op, &inner_ty, payload.op, fallback.op))
            }
            "unwrap_or_else" => {
                let Some(f) = cx.require_callable(site, 0, ErrorCode::LambdaRequired, "unwrap_or_else requires a closure argument")
                else {
                    return Ok(cx.placeholder(&inner_ty));
                };
                let is_just = cx.tag_is(&value, JUST);
                cx.branch_merge(
                    is_just.op,
                    &self.prefix(),
                    ("just", "nothing"),
                    &inner_ty,
                    |cx| Ok(self.payload(cx)),
                    |cx| cx.apply_callable(&f, Vec::new(), &inner_ty, "uoe"),
                )
            }
            "map" => {
                let Some(f) = cx.require_callable(site, 0, ErrorCode::LambdaRequired, "map requires a closure argument") else {
                    return Ok(value);
                };
                let mapped = cx.callable_result_sem(&f).unwrap_or_else(|| self.inner_sem.clone());
                let out_sem = cx.union_result_sem(site, "Maybe", SemType::maybe(mapped));
                let out_inner = out_sem.type_args().first().cloned().unwrap_or_else(SemType::i32);
                let out_inner_ty = cx.isa_of(&out_inner);
                let out_ty = cx.isa_of(&out_sem);
                let is_just = cx.tag_is(&value, JUST);
                cx.branch_merge(
                    is_just.op,
                    &self.prefix(),
                    ("just", "nothing"),
                    &out_ty,
                    |cx| {
                        let arg = self.payload_arg(cx);
                        let v = cx.apply_callable(&f, vec![arg], &out_inner_ty, "map")?;
                        Ok(cx.build_union(&out_ty, JUST, Some(v)))
                    },
                    |cx| Ok(cx.build_union(&out_ty, NOTHING, None)),
                )
            }
            "and_then" => {
                let Some(f) = cx.require_callable(site, 0, ErrorCode::LambdaRequired, "and_then requires a closure argument")
                else {
                    return Ok(value);
                };
                let fallback = cx.callable_result_sem(&f).unwrap_or_else(|| self.sem.clone());
                let out_sem = cx.union_result_sem(site, "Maybe", fallback);
                let out_ty = cx.isa_of(&out_sem);
                let is_just = cx.tag_is(&value, JUST);
                cx.branch_merge(
                    is_just.op,
                    &self.prefix(),
                    ("just", "nothing"),
                    &out_ty,
                    |cx| {
                        let arg = self.payload_arg(cx);
                        cx.apply_callable(&f, vec![arg], &out_ty, "and_then")
                    },
                    |cx| Ok(cx.build_union(&out_ty, NOTHING, None)),
                )
            }
            "or_else" => {
                let Some(f) = cx.require_callable(site, 0, ErrorCode::LambdaRequired, "or_else requires a closure argument")
                else {
                    return Ok(value);
                };
                let is_just = cx.tag_is(&value, JUST);
                cx.branch_merge(
                    is_just.op,
                    &self.prefix(),
                    ("just", "nothing"),
                    &union_ty,
                    |_| Ok(value.clone()),
                    |cx| cx.apply_callable(&f, Vec::new(), &union_ty, "or_else"),
                )
            }
            "contains" => {
                let Some(arg) = site.arg(0) else {
                    return Ok(missing(cx, site, ErrorCode::MissingArgument, "contains requires an argument"));
                };
                let probe = cx.lower_expr_hinted(arg, Some(&inner_ty))?;
                let is_str = self.inner_sem.is_str();
                let is_just = cx.tag_is(&value, JUST);
                cx.branch_merge(
                    is_just.op,
                    &self.prefix(),
                    ("just", "nothing"),
                    &IsaType::Bool,
                    |cx| {
                        let payload = self.payload(cx);
                        cx.payload_eq(payload, probe, is_str)
                    },
                    |_| Ok(TypedValue::bool(false)),
                )
            }
            "filter" => self.filter(cx),
            "alt" => {
                let Some(arg) = site.arg(0) else {
                    return Ok(missing(cx, site, ErrorCode::MissingArgument, "alt requires an argument"));
                };
                let other = cx.lower_expr_hinted(arg, Some(&union_ty))?;
                let is_just = cx.tag_is(&value, JUST);
                Ok(cx.builder.select(is_just.op, &union_ty, value.op, other.op))
            }
            "one_of" => self.one_of(cx),
            "map_or" => {
                if site.args.len() < 2 {
                    return Ok(missing(
                        cx,
                        site,
                        ErrorCode::DefaultAndLambdaRequired,
                        "map_or requires a default value and a closure",
                    ));
                }
                let Some(f) = cx.require_callable(site, 1, ErrorCode::SecondArgLambdaRequired, "map_or requires a closure as second argument")
                else {
                    return Ok(cx.placeholder_for(site.call));
                };
                let out_sem = cx
                    .sem_of(site.call)
                    .or_else(|| cx.callable_result_sem(&f))
                    .unwrap_or_else(|| self.inner_sem.clone());
                let out_ty = cx.isa_of(&out_sem);
                let fallback = cx.lower_expr_hinted(&site.args[0], Some(&out_ty))?;
                let is_just = cx.tag_is(&value, JUST);
                cx.branch_merge(
                    is_just.op,
                    &self.prefix(),
                    ("just", "nothing"),
                    &out_ty,
                    |cx| {
                        let arg = self.payload_arg(cx);
                        cx.apply_callable(&f, vec![arg], &out_ty, "map_or")
                    },
                    |_| Ok(fallback),
                )
            }
            _ => Err(LowerError::internal(format!("Maybe::{} listed but not lowered", site.method))),
        }
    }

    /// The predicate sees the payload by value for scalars and through a
    /// pointer for aggregates.
    fn filter(&self, cx: &mut LowerContext<'_>) -> Result<TypedValue, LowerError> {
        let site = self.site;
        let value = self.value.clone();
        let Some(f) = cx.require_callable(site, 0, ErrorCode::LambdaRequired, "filter requires a closure argument") else {
            return Ok(value);
        };
        let union_ty = self.union_ty.clone();
        let is_just = cx.tag_is(&value, JUST);
        cx.branch_merge(
            is_just.op,
            &self.prefix(),
            ("just", "nothing"),
            &union_ty,
            |cx| {
                let payload = self.payload(cx);
                let arg = if payload.ty.is_aggregate() {
                    let ptr = cx.spill(payload.clone());
                    LambdaArg::Ref { ptr, ty: payload.ty.clone(), sem: Some(self.inner_sem.clone()) }
                } else {
                    LambdaArg::Value(payload, Some(self.inner_sem.clone()))
                };
                let keep = cx.apply_callable(&f, vec![arg], &IsaType::Bool, "filter")?;
                cx.branch_merge(
                    keep.op,
                    "maybe_filter",
                    ("keep", "discard"),
                    &union_ty,
                    |_| Ok(value.clone()),
                    |cx| Ok(cx.build_union(&union_ty, NOTHING, None)),
                )
            },
            |_| Ok(value.clone()),
        )
    }

    /// Exactly one of the two is present: that one, else nothing.
    fn one_of(&self, cx: &mut LowerContext<'_>) -> Result<TypedValue, LowerError> {
        let site = self.site;
        let value = self.value.clone();
        let Some(arg) = site.arg(0) else {
            return Ok(missing(cx, site, ErrorCode::MissingArgument, "one_of requires an argument"));
        };
        let union_ty = self.union_ty.clone();
        let other = cx.lower_expr_hinted(arg, Some(&union_ty))?;
        let self_just = cx.tag_is(&value, JUST);
        let other_just = cx.tag_is(&other, JUST);

        let check_other = cx.builder.create_block("xor_check_other");
        let check_self_nothing = cx.builder.create_block("xor_self_nothing");
        let self_only = cx.builder.create_block("xor_self_only");
        let other_only = cx.builder.create_block("xor_other_only");
        let nothing = cx.builder.create_block("xor_nothing");
        let end = cx.builder.create_block("xor_end");

        cx.builder.cond_br(self_just.op, &check_other, &check_self_nothing);

        cx.builder.switch_to_block(&check_other);
        cx.builder.cond_br(other_just.op.clone(), &nothing, &self_only);

        cx.builder.switch_to_block(&check_self_nothing);
        cx.builder.cond_br(other_just.op, &other_only, &nothing);

        cx.builder.switch_to_block(&self_only);
        cx.builder.br(&end);

        cx.builder.switch_to_block(&other_only);
        cx.builder.br(&end);

        cx.builder.switch_to_block(&nothing);
        let none = cx.build_union(&union_ty, NOTHING, None);
        let nothing_end = cx.builder.current_label();
        cx.builder.br(&end);

        cx.builder.switch_to_block(&end);
        Ok(cx.builder.phi(&union_ty, vec![(value.op, self_only), (other.op, other_only), (none.op, nothing_end)]))
    }
}

fn missing(cx: &mut LowerContext<'_>, site: &MethodSite<'_>, code: ErrorCode, message: &str) -> TypedValue {
    cx.missing_arg(site, code, message).unwrap_or_else(TypedValue::void)
}
