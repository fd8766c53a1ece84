//! Methods on `Ordering` values (`{ i32 }`: Less 0, Equal 1, Greater 2).

use crate::diagnostics::{ErrorCode, LowerError};
use crate::ir::{IntPred, IsaType, Operand, TypedValue};

use super::dispatch::MethodSite;
use super::LowerContext;

const LESS: i128 = 0;
const EQUAL: i128 = 1;
const GREATER: i128 = 2;

pub(super) fn resolve_ordering(cx: &mut LowerContext<'_>, site: &MethodSite<'_>) -> Result<Option<TypedValue>, LowerError> {
    if !site.receiver_sem().is_some_and(|s| s.is_named("Ordering")) {
        return Ok(None);
    }
    if !matches!(
        site.method,
        "is_less" | "is_equal" | "is_greater" | "reverse" | "then_cmp" | "to_string" | "debug_string"
    ) {
        return Ok(None);
    }
    let recv = site.recv()?;
    let ordering_ty = cx.ordering_isa();
    let value = if recv.value.ty.is_ptr() {
        cx.builder.load(&ordering_ty, recv.value.op.clone())
    } else {
        recv.value.clone()
    };
    let i32 = IsaType::i32();
    let tag = cx.builder.extract_value(value, 0, &i32);
    cx.mark(&format!("Ordering::{}", site.method));

    let tag_eq = |cx: &mut LowerContext<'_>, expected: i128| {
        cx.builder.icmp(IntPred::Eq, &IsaType::i32(), tag.op.clone(), Operand::Int(expected))
    };

    let v = match site.method {
        "is_less" => tag_eq(cx, LESS),
        "is_equal" => tag_eq(cx, EQUAL),
        "is_greater" => tag_eq(cx, GREATER),
        "reverse" => {
            let is_less = tag_eq(cx, LESS);
            let is_greater = tag_eq(cx, GREATER);
            let otherwise = cx.builder.select(is_greater.op, &i32, Operand::Int(LESS), Operand::Int(EQUAL));
            let flipped = cx.builder.select(is_less.op, &i32, Operand::Int(GREATER), otherwise.op);
            cx.make_ordering(flipped)
        }
        "then_cmp" => {
            let Some(arg) = site.arg(0) else {
                return Ok(cx.missing_arg(site, ErrorCode::MissingArgument, "then_cmp() requires an argument"));
            };
            let other = cx.lower_expr(arg)?;
            let other_tag = cx.builder.extract_value(other, 0, &i32);
            let is_equal = tag_eq(cx, EQUAL);
            let chained = cx.builder.select(is_equal.op, &i32, other_tag.op, tag.op.clone());
            cx.make_ordering(chained)
        }
        _ => {
            let prefix = if site.method == "debug_string" { "Ordering::" } else { "" };
            let less = cx.string_literal(&format!("{prefix}Less"));
            let equal = cx.string_literal(&format!("{prefix}Equal"));
            let greater = cx.string_literal(&format!("{prefix}Greater"));
            let is_less = tag_eq(cx, LESS);
            let is_equal = tag_eq(cx, EQUAL);
            let rest = cx.builder.select(is_equal.op, &IsaType::Ptr, equal.op, greater.op);
            cx.builder.select(is_less.op, &IsaType::Ptr, less.op, rest.op)
        }
    };
    Ok(Some(v))
}
