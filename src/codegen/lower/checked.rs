//! `checked_*` integer methods returning `Maybe[T]`.
//!
//! Every variant branches to a `checked_just` block that wraps the value
//! and a `checked_nothing` block that stores the empty tag, both writing a
//! shared union slot that is loaded at `checked_end`.

use tracing::debug;

use crate::diagnostics::{ErrorCode, LowerError};
use crate::ir::{BinOp, IntPred, IsaType, Label, Operand, TypedValue, WrapFlags};
use crate::sema::{PrimKind, SemType};

use super::dispatch::{MethodSite, Receiver};
use super::LowerContext;

const JUST: u32 = 0;
const NOTHING: u32 = 1;

/// Smallest value of a signed integer of `bits` width.
fn signed_min(bits: u32) -> i128 {
    if bits >= 128 { i128::MIN } else { -(1i128 << (bits - 1)) }
}

fn overflow_intrinsic(op: &str, unsigned: bool, bits: u32) -> String {
    format!("llvm.{}{op}.with.overflow.i{bits}", if unsigned { 'u' } else { 's' })
}

impl LowerContext<'_> {
    pub(crate) fn lower_checked(
        &mut self,
        site: &MethodSite<'_>,
        recv: &Receiver,
        kind: PrimKind,
    ) -> Result<Option<TypedValue>, LowerError> {
        let Some(op) = site.method.strip_prefix("checked_") else {
            return Ok(None);
        };
        if !matches!(op, "add" | "sub" | "mul" | "div" | "rem" | "neg" | "shl" | "shr") {
            return Ok(None);
        }
        let ty = recv.value.ty.clone();
        let bits = ty.bits().unwrap_or(64);
        let unsigned = kind.is_unsigned();
        let union_ty = self.isa_of(&SemType::maybe(SemType::prim(kind)));
        let this = recv.value.clone();

        let rhs = if op == "neg" {
            None
        } else {
            let Some(arg) = site.arg(0) else {
                return Ok(self.missing_arg(
                    site,
                    ErrorCode::MissingIntrinsicArg,
                    format!("Missing argument for {}", site.method),
                ));
            };
            let v = self.lower_expr_hinted(arg, Some(&ty))?;
            Some(self.coerce_to(v, &ty))
        };

        self.mark(&format!("Checked{}::{}", capitalized(op), site.method));
        debug!(op, bits, unsigned, "checked arithmetic");

        let slot = self.builder.alloca(&union_ty);
        let just = self.builder.create_block("checked_just");
        let nothing = self.builder.create_block("checked_nothing");
        let end = self.builder.create_block("checked_end");

        match (op, rhs) {
            ("add" | "sub" | "mul", Some(rhs)) => {
                let name = overflow_intrinsic(op, unsigned, bits);
                let pair = IsaType::Tuple(vec![ty.clone(), IsaType::Bool]);
                self.module.declare_extern(&name, pair.clone(), vec![ty.clone(), ty.clone()]);
                let result = self.builder.call(&pair, Operand::Global(name), vec![this, rhs]);
                let value = self.builder.extract_value(result.clone(), 0, &ty);
                let overflow = self.builder.extract_value(result, 1, &IsaType::Bool);
                self.builder.cond_br(overflow.op, &nothing, &just);
                self.builder.switch_to_block(&just);
                self.store_just(slot.clone(), &union_ty, value, &end);
            }
            ("div" | "rem", Some(rhs)) => {
                let zero = self.builder.icmp(IntPred::Eq, &ty, rhs.op.clone(), Operand::Int(0));
                self.builder.cond_br(zero.op, &nothing, &just);
                self.builder.switch_to_block(&just);
                let bop = match (op, unsigned) {
                    ("div", true) => BinOp::UDiv,
                    ("div", false) => BinOp::SDiv,
                    (_, true) => BinOp::URem,
                    (_, false) => BinOp::SRem,
                };
                let value = self.builder.binary(bop, WrapFlags::NONE, &ty, this.op, rhs.op);
                self.store_just(slot.clone(), &union_ty, value, &end);
            }
            ("neg", None) => {
                let overflow = if unsigned {
                    self.builder.icmp(IntPred::Ne, &ty, this.op.clone(), Operand::Int(0))
                } else {
                    self.builder.icmp(IntPred::Eq, &ty, this.op.clone(), Operand::Int(signed_min(bits)))
                };
                self.builder.cond_br(overflow.op, &nothing, &just);
                self.builder.switch_to_block(&just);
                let flags = if unsigned { WrapFlags::NONE } else { WrapFlags::NSW };
                let value = self.builder.binary(BinOp::Sub, flags, &ty, Operand::Int(0), this.op);
                self.store_just(slot.clone(), &union_ty, value, &end);
            }
            (_, Some(rhs)) => {
                // Shift amounts at or past the width are undefined on the
                // target, so the computed shift uses a zero amount there.
                let too_far = self.builder.icmp(IntPred::Uge, &ty, rhs.op.clone(), Operand::Int(i128::from(bits)));
                let amount = self.builder.select(too_far.op.clone(), &ty, Operand::Int(0), rhs.op);
                let bop = match (op, unsigned) {
                    ("shl", _) => BinOp::Shl,
                    (_, true) => BinOp::LShr,
                    (_, false) => BinOp::AShr,
                };
                let value = self.builder.binary(bop, WrapFlags::NONE, &ty, this.op, amount.op);
                self.builder.cond_br(too_far.op, &nothing, &just);
                self.builder.switch_to_block(&just);
                self.store_just(slot.clone(), &union_ty, value, &end);
            }
            _ => return Err(LowerError::internal(format!("{} lowered without an operand", site.method))),
        }

        self.builder.switch_to_block(&nothing);
        let tag_ptr = self.builder.field_ptr(&union_ty, slot.clone(), 0);
        self.builder.store(TypedValue::i32(i128::from(NOTHING)), tag_ptr);
        self.builder.br(&end);

        self.builder.switch_to_block(&end);
        Ok(Some(self.builder.load(&union_ty, slot)))
    }

    fn store_just(&mut self, slot: Operand, union_ty: &IsaType, value: TypedValue, end: &Label) {
        let tag_ptr = self.builder.field_ptr(union_ty, slot.clone(), 0);
        self.builder.store(TypedValue::i32(i128::from(JUST)), tag_ptr);
        self.store_payload(slot, union_ty, value);
        self.builder.br(end);
    }
}

fn capitalized(op: &str) -> String {
    let mut chars = op.chars();
    match chars.next() {
        Some(c) => c.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}
