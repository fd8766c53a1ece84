//! Raw pointer intrinsics: `read`, `write`, `offset`, `is_null`.

use tracing::trace;

use crate::diagnostics::{ErrorCode, LowerError};
use crate::ir::{IntPred, IsaType, Operand, TypedValue};
use crate::sema::SemType;

use super::dispatch::MethodSite;
use super::LowerContext;

pub(super) fn resolve_pointer(cx: &mut LowerContext<'_>, site: &MethodSite<'_>) -> Result<Option<TypedValue>, LowerError> {
    let Some(SemType::Ptr { inner, .. }) = site.receiver_sem().cloned() else {
        return Ok(None);
    };
    let recv = site.recv()?;
    let ptr = recv.value.op.clone();
    let pointee = cx.isa_of(&inner);

    match site.method {
        "read" => {
            cx.mark("Ptr::read");
            if pointee.is_void() {
                return Ok(Some(TypedValue::void()));
            }
            Ok(Some(cx.builder.load(&pointee, ptr)))
        }
        "write" => {
            let Some(arg) = site.arg(0) else {
                return Ok(cx.missing_arg(site, ErrorCode::PointerWriteMissingValue, "write() requires a value argument"));
            };
            cx.mark("Ptr::write");
            let v = cx.lower_expr_hinted(arg, Some(&pointee))?;
            let v = cx.coerce_to(v, &pointee);
            cx.builder.store(v, ptr);
            Ok(Some(TypedValue::void()))
        }
        "offset" => {
            let Some(arg) = site.arg(0) else {
                return Ok(cx.missing_arg(site, ErrorCode::MissingIntrinsicArg, "offset() requires an index argument"));
            };
            cx.mark("Ptr::offset");
            let n = cx.lower_expr(arg)?;
            let n = cx.coerce_to(n, &IsaType::i64());
            // Unsized pointees step by bytes.
            let elem = if pointee.is_void() { IsaType::i8() } else { pointee };
            let p = cx.builder.gep(&elem, ptr, vec![n], false);
            Ok(Some(TypedValue::new(p, IsaType::Ptr)))
        }
        "is_null" => {
            cx.mark("Ptr::is_null");
            Ok(Some(cx.builder.icmp(IntPred::Eq, &IsaType::Ptr, ptr, Operand::Null)))
        }
        _ => {
            trace!(method = site.method, "not a pointer intrinsic");
            Ok(None)
        }
    }
}
