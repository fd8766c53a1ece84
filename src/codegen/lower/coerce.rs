//! Implicit conversions between operand types.

use tracing::trace;

use crate::ir::{CastOp, IntPred, IsaType, Operand, TypedValue};
use crate::sema::SemType;

use super::LowerContext;

/// Both operands of a binary operation converted to one type.
#[derive(Debug, Clone)]
pub(crate) struct Unified {
    pub ty: IsaType,
    /// OR of both operands' unsignedness.
    pub unsigned: bool,
    pub lhs: TypedValue,
    pub rhs: TypedValue,
}

/// Reduce an integer constant to `bits`, in the signed or unsigned reading.
pub(crate) fn wrap_const(v: i128, bits: u32, unsigned: bool) -> i128 {
    if bits >= 128 {
        return v;
    }
    let mask = (1u128 << bits) - 1;
    let raw = (v as u128) & mask;
    if unsigned || bits == 0 {
        return raw as i128;
    }
    let sign = 1u128 << (bits - 1);
    if raw & sign != 0 { (raw | !mask) as i128 } else { raw as i128 }
}

fn relabel(mut value: TypedValue, unsigned: bool) -> TypedValue {
    value.ty = value.ty.with_signedness(unsigned);
    value
}

impl LowerContext<'_> {
    /// Convert `value` to `to`. Constants fold without emitting anything;
    /// pairs with no numeric conversion pass through unchanged.
    pub(crate) fn coerce_to(&mut self, value: TypedValue, to: &IsaType) -> TypedValue {
        if &value.ty == to || to.is_void() {
            return value;
        }
        match (&value.op, to) {
            (Operand::Int(v), IsaType::Int { bits, unsigned }) => {
                return TypedValue::int(wrap_const(*v, *bits, *unsigned), to.clone());
            }
            (Operand::Int(v), IsaType::Float(_)) => return TypedValue::new(Operand::Float(*v as f64), to.clone()),
            (Operand::Int(v), IsaType::Bool) => return TypedValue::bool(*v != 0),
            (Operand::Bool(b), IsaType::Int { .. }) => return TypedValue::int(i128::from(*b), to.clone()),
            (Operand::Float(f), IsaType::Float(_)) => return TypedValue::new(Operand::Float(*f), to.clone()),
            _ => {}
        }

        let from = value.ty.clone();
        match (&from, to) {
            (IsaType::Int { bits: fb, unsigned: fu }, IsaType::Int { bits: tb, .. }) => {
                if fb == tb {
                    TypedValue::new(value.op, to.clone())
                } else if fb < tb {
                    let op = if *fu { CastOp::ZExt } else { CastOp::SExt };
                    self.builder.cast(op, value, to)
                } else {
                    self.builder.cast(CastOp::Trunc, value, to)
                }
            }
            (IsaType::Bool, IsaType::Int { .. }) => self.builder.cast(CastOp::ZExt, value, to),
            (IsaType::Int { .. }, IsaType::Bool) => {
                self.builder.icmp(IntPred::Ne, &from, value.op, Operand::Int(0))
            }
            (IsaType::Int { unsigned, .. }, IsaType::Float(_)) => {
                let op = if *unsigned { CastOp::UIToFP } else { CastOp::SIToFP };
                self.builder.cast(op, value, to)
            }
            (IsaType::Bool, IsaType::Float(_)) => self.builder.cast(CastOp::UIToFP, value, to),
            (IsaType::Float(_), IsaType::Int { unsigned, .. }) => {
                let op = if *unsigned { CastOp::FPToUI } else { CastOp::FPToSI };
                self.builder.cast(op, value, to)
            }
            (IsaType::Float(a), IsaType::Float(b)) => {
                let op = if a.bits() < b.bits() { CastOp::FPExt } else { CastOp::FPTrunc };
                self.builder.cast(op, value, to)
            }
            (IsaType::Ptr, IsaType::Int { .. }) => self.builder.cast(CastOp::PtrToInt, value, to),
            (IsaType::Int { .. }, IsaType::Ptr) => self.builder.cast(CastOp::IntToPtr, value, to),
            _ => {
                trace!(from = %from, to = %to, "no conversion between types");
                value
            }
        }
    }

    /// Bring two operands to a common type. Floats win over integers and
    /// the wider float wins; integers widen to the wider width, extending
    /// each narrower operand by its own signedness.
    pub(crate) fn unify_operands(
        &mut self,
        lhs: TypedValue,
        lsem: Option<&SemType>,
        rhs: TypedValue,
        rsem: Option<&SemType>,
    ) -> Unified {
        let l_unsigned = lsem.map_or(lhs.ty.is_unsigned(), SemType::is_unsigned);
        let r_unsigned = rsem.map_or(rhs.ty.is_unsigned(), SemType::is_unsigned);
        let unsigned = l_unsigned || r_unsigned;
        let lhs = relabel(lhs, l_unsigned);
        let rhs = relabel(rhs, r_unsigned);

        if lhs.ty.is_float() || rhs.ty.is_float() {
            let ty = match (&lhs.ty, &rhs.ty) {
                (IsaType::Float(a), IsaType::Float(b)) => {
                    if a.bits() >= b.bits() { lhs.ty.clone() } else { rhs.ty.clone() }
                }
                (IsaType::Float(_), _) => lhs.ty.clone(),
                _ => rhs.ty.clone(),
            };
            let lhs = self.coerce_to(lhs, &ty);
            let rhs = self.coerce_to(rhs, &ty);
            return Unified { ty, unsigned, lhs, rhs };
        }

        if lhs.ty.is_integral() && rhs.ty.is_integral() {
            let lb = lhs.ty.bits().unwrap_or(32);
            let rb = rhs.ty.bits().unwrap_or(32);
            let ty = match (&lhs.ty, &rhs.ty) {
                (IsaType::Bool, IsaType::Bool) => IsaType::Bool,
                _ => IsaType::Int { bits: lb.max(rb), unsigned },
            };
            let lhs = self.coerce_to(lhs, &ty);
            let rhs = self.coerce_to(rhs, &ty);
            return Unified { ty, unsigned, lhs, rhs };
        }

        trace!(lhs = %lhs.ty, rhs = %rhs.ty, "operands left unconverted");
        Unified { ty: lhs.ty.clone(), unsigned, lhs, rhs }
    }
}
