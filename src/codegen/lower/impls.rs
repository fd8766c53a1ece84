//! Methods implemented in user code: impl blocks (local and imported),
//! `dyn Behavior` objects, class instances, plus the builtin `File` handle.

use tracing::{debug, trace};

use crate::diagnostics::{ErrorCode, LowerError};
use crate::ir::{IsaType, Operand, TypedValue};
use crate::sema::{FuncSig, SemType};

use super::dispatch::{MethodSite, Receiver};
use super::generic::instantiate;
use super::LowerContext;

/// Receivers that are resolved by name through impl lookups. Classes go
/// through their own resolver so virtual methods stay virtual.
fn impl_receiver(cx: &LowerContext<'_>, site: &MethodSite<'_>) -> Option<(String, SemType)> {
    let sem = site.receiver_sem()?.clone();
    let name = sem.type_name()?;
    if cx.env.lookup_class(&name).is_some() {
        return None;
    }
    Some((name, sem))
}

fn call_impl(
    cx: &mut LowerContext<'_>,
    site: &MethodSite<'_>,
    qualified: &str,
    sig: &FuncSig,
    sem: &SemType,
) -> Result<TypedValue, LowerError> {
    let subs = cx.impl_subs(sem);
    let sig = instantiate(sig, &subs);
    let recv = site.recv()?.clone();
    let this = cx.receiver_arg(&recv);
    let symbol = cx.user_symbol(qualified);
    debug!(callee = %qualified, "impl method call");
    cx.direct_call(site.call, &symbol, &sig, Some(this), site.args)
}

pub(super) fn resolve_local_impl(
    cx: &mut LowerContext<'_>,
    site: &MethodSite<'_>,
) -> Result<Option<TypedValue>, LowerError> {
    let Some((name, sem)) = impl_receiver(cx, site) else {
        return Ok(None);
    };
    let qualified = format!("{name}::{}", site.method);
    let env = cx.env;
    let Some(sig) = env.lookup_func(&qualified) else {
        return Ok(None);
    };
    call_impl(cx, site, &qualified, sig, &sem).map(Some)
}

pub(super) fn resolve_module_impl(
    cx: &mut LowerContext<'_>,
    site: &MethodSite<'_>,
) -> Result<Option<TypedValue>, LowerError> {
    let Some((name, sem)) = impl_receiver(cx, site) else {
        return Ok(None);
    };
    let qualified = format!("{name}::{}", site.method);
    let env = cx.env;
    let Some(sig) = env.lookup_module_func(&qualified) else {
        trace!(callee = %qualified, "no imported impl");
        return Ok(None);
    };
    call_impl(cx, site, &qualified, sig, &sem).map(Some)
}

/// Load entry `slot` of a vtable.
fn vtable_entry(cx: &mut LowerContext<'_>, vtable: Operand, slot: u32) -> TypedValue {
    let entry = cx.builder.gep(&IsaType::Ptr, vtable, vec![TypedValue::i64(i128::from(slot))], false);
    cx.builder.load(&IsaType::Ptr, entry)
}

fn indirect_call(
    cx: &mut LowerContext<'_>,
    site: &MethodSite<'_>,
    callee: TypedValue,
    this: TypedValue,
    sig: &FuncSig,
) -> Result<TypedValue, LowerError> {
    let args = cx.lower_args(site.args, &sig.params)?;
    let ret = cx.signature_ret(site.call, &sig.ret);
    let mut all = Vec::with_capacity(args.len() + 1);
    all.push(this);
    all.extend(args);
    Ok(cx.builder.call(&ret, callee.op, all))
}

/// `dyn Behavior` receivers: `{ data, vtable }`, slots in declaration order.
pub(super) fn resolve_dyn(cx: &mut LowerContext<'_>, site: &MethodSite<'_>) -> Result<Option<TypedValue>, LowerError> {
    let Some(SemType::Dyn(behavior)) = site.receiver_sem().cloned() else {
        return Ok(None);
    };
    let env = cx.env;
    let Some(def) = env.lookup_behavior(&behavior) else {
        return Ok(None);
    };
    let (Some(slot), Some(method)) = (def.slot_of(site.method), def.method(site.method)) else {
        return Ok(None);
    };
    let sig = FuncSig { params: method.params.clone(), ret: method.ret.clone() };
    let recv = site.recv()?;
    let object = if recv.value.ty.is_ptr() {
        cx.builder.load(&super::layout::dyn_isa(), recv.value.op.clone())
    } else {
        recv.value.clone()
    };
    cx.mark(&format!("{behavior}::{}", site.method));
    let data = cx.builder.extract_value(object.clone(), 0, &IsaType::Ptr);
    let vtable = cx.builder.extract_value(object, 1, &IsaType::Ptr);
    let callee = vtable_entry(cx, vtable.op, slot);
    debug!(behavior = %behavior, slot, "dynamic dispatch");
    indirect_call(cx, site, callee, data, &sig).map(Some)
}

/// `File` handles wrap the runtime handle at field 0.
pub(super) fn resolve_file(cx: &mut LowerContext<'_>, site: &MethodSite<'_>) -> Result<Option<TypedValue>, LowerError> {
    if !site.receiver_sem().is_some_and(|s| s.is_named("File")) {
        return Ok(None);
    }
    let key = match site.method {
        "is_open" => "file_is_open",
        "read_line" => "file_read_line",
        "write_str" => "file_write_str",
        "size" => "file_size",
        "close" => "file_close",
        "flush" => "file_flush",
        _ => return Ok(None),
    };
    let recv = site.recv()?;
    let handle = if recv.value.ty.is_ptr() {
        let file_ty = IsaType::Struct("File".to_string());
        let field = cx.builder.field_ptr(&file_ty, recv.value.op.clone(), 0);
        cx.builder.load(&IsaType::Ptr, field)
    } else {
        cx.builder.extract_value(recv.value.clone(), 0, &IsaType::Ptr)
    };
    let mut args = vec![handle];
    if site.method == "write_str" {
        let Some(arg) = site.arg(0) else {
            return Ok(cx.missing_arg(site, ErrorCode::MissingArgument, "write_str requires a string argument"));
        };
        args.push(cx.lower_expr(arg)?);
    }
    cx.mark(&format!("File::{}", site.method));
    cx.call_runtime(key, args).map(Some)
}

/// Class instances: search the class then its ancestors. Virtual methods
/// go through the vtable at field 0 of the instance.
pub(super) fn resolve_class(cx: &mut LowerContext<'_>, site: &MethodSite<'_>) -> Result<Option<TypedValue>, LowerError> {
    let Some(name) = site.type_name() else {
        return Ok(None);
    };
    let env = cx.env;
    if env.lookup_class(&name).is_none() {
        return Ok(None);
    }
    for owner in cx.class_chain(&name) {
        let Some(method) = env.lookup_class(&owner).and_then(|c| c.method(site.method)) else {
            continue;
        };
        let sig = FuncSig { params: method.params.clone(), ret: method.ret.clone() };
        let recv: Receiver = site.recv()?.clone();
        let this = instance_ptr(cx, &recv);
        let qualified = format!("{owner}::{}", site.method);

        if let Some(slot) = method.vtable_slot {
            let class_ty = IsaType::Struct(name.clone());
            let vptr = cx.builder.field_ptr(&class_ty, this.op.clone(), 0);
            let vtable = cx.builder.load(&IsaType::Ptr, vptr);
            let callee = vtable_entry(cx, vtable.op, slot);
            debug!(callee = %qualified, slot, "virtual call");
            return indirect_call(cx, site, callee, this, &sig).map(Some);
        }
        let symbol = cx.user_symbol(&qualified);
        debug!(callee = %qualified, "class method call");
        return cx.direct_call(site.call, &symbol, &sig, Some(this), site.args).map(Some);
    }
    Ok(None)
}

/// Class values are already instance pointers.
fn instance_ptr(cx: &mut LowerContext<'_>, recv: &Receiver) -> TypedValue {
    if recv.value.ty.is_ptr() {
        recv.value.clone()
    } else {
        TypedValue::new(cx.receiver_ptr(recv), IsaType::Ptr)
    }
}
