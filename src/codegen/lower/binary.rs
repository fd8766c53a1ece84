//! Binary operators: operand evaluation, promotion and instruction
//! selection, including the structural tuple and tagged-union comparisons.

use tracing::{debug, trace, warn};

use crate::ast::{BinaryOp, Expr, ExprKind};
use crate::config::AmbiguousPointerAdd;
use crate::diagnostics::{ErrorCode, LowerError};
use crate::ir::{BinOp, FloatPred, IntPred, IsaType, Operand, TypedValue, WrapFlags};
use crate::sema::SemType;

use super::coerce::Unified;
use super::LowerContext;

/// Abstract operation a binary operator implements. `and`/`or` have none.
pub(crate) fn op_marker(op: BinaryOp) -> Option<&'static str> {
    Some(match op {
        BinaryOp::Add => "Add::add",
        BinaryOp::Sub => "Sub::sub",
        BinaryOp::Mul => "Mul::mul",
        BinaryOp::Div => "Div::div",
        BinaryOp::Rem => "Rem::rem",
        BinaryOp::Eq => "Eq::eq",
        BinaryOp::Ne => "Eq::ne",
        BinaryOp::Lt => "Ord::lt",
        BinaryOp::Le => "Ord::le",
        BinaryOp::Gt => "Ord::gt",
        BinaryOp::Ge => "Ord::ge",
        BinaryOp::BitAnd => "BitAnd::bitand",
        BinaryOp::BitOr => "BitOr::bitor",
        BinaryOp::BitXor => "BitXor::bitxor",
        BinaryOp::Shl => "Shl::shift_left",
        BinaryOp::Shr => "Shr::shift_right",
        BinaryOp::And | BinaryOp::Or => return None,
    })
}

pub(crate) fn int_pred(op: BinaryOp, unsigned: bool) -> Option<IntPred> {
    Some(match (op, unsigned) {
        (BinaryOp::Eq, _) => IntPred::Eq,
        (BinaryOp::Ne, _) => IntPred::Ne,
        (BinaryOp::Lt, false) => IntPred::Slt,
        (BinaryOp::Le, false) => IntPred::Sle,
        (BinaryOp::Gt, false) => IntPred::Sgt,
        (BinaryOp::Ge, false) => IntPred::Sge,
        (BinaryOp::Lt, true) => IntPred::Ult,
        (BinaryOp::Le, true) => IntPred::Ule,
        (BinaryOp::Gt, true) => IntPred::Ugt,
        (BinaryOp::Ge, true) => IntPred::Uge,
        _ => return None,
    })
}

pub(crate) fn float_pred(op: BinaryOp) -> Option<FloatPred> {
    Some(match op {
        BinaryOp::Eq => FloatPred::Oeq,
        BinaryOp::Ne => FloatPred::One,
        BinaryOp::Lt => FloatPred::Olt,
        BinaryOp::Le => FloatPred::Ole,
        BinaryOp::Gt => FloatPred::Ogt,
        BinaryOp::Ge => FloatPred::Oge,
        _ => return None,
    })
}

/// A literal the checker left untyped and that carries no suffix.
fn is_untyped_literal(expr: &Expr) -> bool {
    expr.ty.is_none()
        && matches!(expr.kind, ExprKind::Int { suffix: None, .. } | ExprKind::Float { suffix: None, .. })
}

impl LowerContext<'_> {
    pub(crate) fn lower_binary(
        &mut self,
        expr: &Expr,
        op: BinaryOp,
        lhs: &Expr,
        rhs: &Expr,
    ) -> Result<TypedValue, LowerError> {
        let lsem = self.sem_of(lhs);
        let rsem = self.sem_of(rhs);

        // `1 + x_i64`: the untyped left literal takes the right side's type.
        let lhint = match (&rsem, is_untyped_literal(lhs)) {
            (Some(r), true) => Some(self.isa_of(r)),
            _ => None,
        };
        let l = self.lower_expr_hinted(lhs, lhint.as_ref())?;
        let rhint = l.ty.clone();
        let r = self.lower_expr_hinted(rhs, Some(&rhint))?;

        if let (IsaType::Tuple(le), IsaType::Tuple(re)) = (&l.ty, &r.ty)
            && le.len() == re.len()
            && op.is_comparison()
        {
            let elem_unsigned = tuple_signedness(lsem.as_ref(), le);
            return Ok(if op.is_ordering() {
                self.tuple_order(op, l, r, &elem_unsigned)
            } else {
                self.tuple_eq(op, l, r)
            });
        }

        if matches!(op, BinaryOp::Eq | BinaryOp::Ne)
            && matches!(l.ty, IsaType::Struct(_))
            && l.ty == r.ty
        {
            return self.struct_eq(op, l, r, lsem.as_ref());
        }

        if op == BinaryOp::Add {
            if let Some(SemType::Ptr { inner, .. }) = &lsem
                && r.ty.is_int()
            {
                return Ok(self.pointer_add(l, r, inner));
            }
            if let Some(SemType::Ptr { inner, .. }) = &rsem
                && l.ty.is_int()
            {
                return Ok(self.pointer_add(r, l, inner));
            }
        }

        let l_str = lsem.as_ref().is_some_and(SemType::is_str);
        let r_str = rsem.as_ref().is_some_and(SemType::is_str);
        match op {
            BinaryOp::Add if l_str && r_str => return self.string_concat(l, r),
            BinaryOp::Add if (l_str && rsem.is_none()) || (r_str && lsem.is_none()) => {
                trace!("string concatenation with one unresolved operand");
                return self.string_concat(l, r);
            }
            BinaryOp::Add if lsem.is_none() && rsem.is_none() && l.ty.is_ptr() && r.ty.is_ptr() => {
                return self.ambiguous_pointer_add(expr, l, r);
            }
            BinaryOp::Eq | BinaryOp::Ne if l_str && r_str => return self.string_eq(op, l, r),
            _ => {}
        }

        if matches!(op, BinaryOp::Eq | BinaryOp::Ne) && l.ty.is_ptr() && r.ty.is_ptr() {
            self.mark(if op == BinaryOp::Eq { "Eq::eq" } else { "Eq::ne" });
            let pred = if op == BinaryOp::Eq { IntPred::Eq } else { IntPred::Ne };
            return Ok(self.builder.icmp(pred, &IsaType::Ptr, l.op, r.op));
        }

        let unified = self.unify_operands(l, lsem.as_ref(), r, rsem.as_ref());
        Ok(self.emit_binary_op(expr, op, unified))
    }

    /// Instruction selection once both operands share a type.
    pub(crate) fn emit_binary_op(&mut self, expr: &Expr, op: BinaryOp, u: Unified) -> TypedValue {
        let Unified { ty, unsigned, lhs, rhs } = u;
        match op {
            BinaryOp::And | BinaryOp::Or => {
                let lhs = self.coerce_to(lhs, &IsaType::Bool);
                let rhs = self.coerce_to(rhs, &IsaType::Bool);
                let bop = if op == BinaryOp::And { BinOp::And } else { BinOp::Or };
                self.builder.binary(bop, WrapFlags::NONE, &IsaType::Bool, lhs.op, rhs.op)
            }
            _ if op.is_comparison() => {
                if let Some(marker) = op_marker(op) {
                    self.mark(marker);
                }
                if ty.is_float() {
                    let pred = float_pred(op).unwrap_or(FloatPred::Oeq);
                    self.builder.fcmp(pred, &ty, lhs.op, rhs.op)
                } else {
                    let pred = int_pred(op, unsigned || ty.is_ptr()).unwrap_or(IntPred::Eq);
                    self.builder.icmp(pred, &ty, lhs.op, rhs.op)
                }
            }
            _ => match self.emit_arith(op, &ty, unsigned, lhs, rhs) {
                Some(v) => v,
                None => {
                    debug!(op = op.symbol(), ty = %ty, "operator not defined for operand type");
                    self.placeholder_for(expr)
                }
            },
        }
    }

    /// Arithmetic, bitwise and shift operators at `ty`. None for operators
    /// that are not defined on the type.
    pub(crate) fn emit_arith(
        &mut self,
        op: BinaryOp,
        ty: &IsaType,
        unsigned: bool,
        lhs: TypedValue,
        rhs: TypedValue,
    ) -> Option<TypedValue> {
        let float = ty.is_float();
        let (bop, flags) = match op {
            BinaryOp::Add if float => (BinOp::FAdd, WrapFlags::NONE),
            BinaryOp::Sub if float => (BinOp::FSub, WrapFlags::NONE),
            BinaryOp::Mul if float => (BinOp::FMul, WrapFlags::NONE),
            BinaryOp::Div if float => (BinOp::FDiv, WrapFlags::NONE),
            BinaryOp::Rem if float => (BinOp::FRem, WrapFlags::NONE),
            _ if float => return None,
            BinaryOp::Add => (BinOp::Add, WrapFlags::no_overflow(unsigned)),
            BinaryOp::Sub => (BinOp::Sub, WrapFlags::no_overflow(unsigned)),
            BinaryOp::Mul => (BinOp::Mul, WrapFlags::no_overflow(unsigned)),
            BinaryOp::Div => (if unsigned { BinOp::UDiv } else { BinOp::SDiv }, WrapFlags::NONE),
            BinaryOp::Rem => (if unsigned { BinOp::URem } else { BinOp::SRem }, WrapFlags::NONE),
            BinaryOp::BitAnd => (BinOp::And, WrapFlags::NONE),
            BinaryOp::BitOr => (BinOp::Or, WrapFlags::NONE),
            BinaryOp::BitXor => (BinOp::Xor, WrapFlags::NONE),
            BinaryOp::Shl => (BinOp::Shl, WrapFlags::NUW),
            BinaryOp::Shr => (if unsigned { BinOp::LShr } else { BinOp::AShr }, WrapFlags::NONE),
            _ => return None,
        };
        if !ty.is_integral() && !float {
            return None;
        }
        if let Some(marker) = op_marker(op) {
            self.mark(marker);
        }
        let lhs = self.coerce_to(lhs, ty);
        let rhs = self.coerce_to(rhs, ty);
        Some(self.builder.binary(bop, flags, ty, lhs.op, rhs.op))
    }

    // ===== strings & pointers =====

    fn string_concat(&mut self, l: TypedValue, r: TypedValue) -> Result<TypedValue, LowerError> {
        self.mark("Add::add");
        self.call_runtime("string_concat", vec![l, r])
    }

    /// Runtime equality returns `i32`; turn it into `i1`.
    pub(crate) fn string_eq(&mut self, op: BinaryOp, l: TypedValue, r: TypedValue) -> Result<TypedValue, LowerError> {
        self.mark(if op == BinaryOp::Eq { "Eq::eq" } else { "Eq::ne" });
        let raw = self.call_runtime("string_eq", vec![l, r])?;
        let pred = if op == BinaryOp::Eq { IntPred::Ne } else { IntPred::Eq };
        Ok(self.builder.icmp(pred, &IsaType::i32(), raw.op, Operand::Int(0)))
    }

    fn ambiguous_pointer_add(&mut self, expr: &Expr, l: TypedValue, r: TypedValue) -> Result<TypedValue, LowerError> {
        match self.config.lowering.ambiguous_pointer_add {
            AmbiguousPointerAdd::Concat => {
                warn!("adding two pointers of unknown type, lowering as string concatenation");
                self.diag(
                    ErrorCode::AmbiguousPointerAdd,
                    "Operands of '+' have no resolved type; treating as string concatenation",
                    expr.span,
                );
                self.string_concat(l, r)
            }
            AmbiguousPointerAdd::Reject => {
                self.diag(
                    ErrorCode::AmbiguousPointerAddRejected,
                    "Cannot add two pointers of unknown type",
                    expr.span,
                );
                Ok(TypedValue::null())
            }
        }
    }

    /// `p + n` steps `n` elements of the pointee type.
    fn pointer_add(&mut self, ptr: TypedValue, index: TypedValue, pointee: &SemType) -> TypedValue {
        self.mark("Add::add");
        let elem = self.isa_of(pointee);
        let index = self.coerce_to(index, &IsaType::i64());
        let p = self.builder.gep(&elem, ptr.op, vec![index], false);
        TypedValue::new(p, IsaType::Ptr)
    }

    // ===== structural comparisons =====

    /// Element-wise equality, AND-combined; `!=` negates the result.
    fn tuple_eq(&mut self, op: BinaryOp, l: TypedValue, r: TypedValue) -> TypedValue {
        self.mark(if op == BinaryOp::Eq { "PartialEq::eq" } else { "PartialEq::ne" });
        let eq = self.aggregate_eq(l, r);
        if op == BinaryOp::Ne {
            self.builder.binary(BinOp::Xor, WrapFlags::NONE, &IsaType::Bool, eq.op, Operand::Bool(true))
        } else {
            eq
        }
    }

    fn aggregate_eq(&mut self, l: TypedValue, r: TypedValue) -> TypedValue {
        let IsaType::Tuple(elems) = l.ty.clone() else {
            return self.scalar_eq(&l.ty.clone(), l, r);
        };
        let ty = l.ty.clone();
        let lp = self.spill(l);
        let rp = self.spill(r);
        let mut acc: Option<TypedValue> = None;
        for (i, ety) in elems.iter().enumerate() {
            let a = self.load_field(&ty, lp.clone(), i as u32, ety);
            let b = self.load_field(&ty, rp.clone(), i as u32, ety);
            let eq = self.scalar_eq(ety, a, b);
            acc = Some(match acc {
                None => eq,
                Some(prev) => self.builder.binary(BinOp::And, WrapFlags::NONE, &IsaType::Bool, prev.op, eq.op),
            });
        }
        acc.unwrap_or_else(|| TypedValue::bool(true))
    }

    fn load_field(&mut self, agg: &IsaType, ptr: Operand, index: u32, ty: &IsaType) -> TypedValue {
        let fptr = self.builder.field_ptr(agg, ptr, index);
        self.builder.load(ty, fptr)
    }

    fn scalar_eq(&mut self, ty: &IsaType, a: TypedValue, b: TypedValue) -> TypedValue {
        match ty {
            IsaType::Float(_) => self.builder.fcmp(FloatPred::Oeq, ty, a.op, b.op),
            IsaType::Tuple(_) => self.aggregate_eq(a, b),
            IsaType::Struct(_) => {
                let ta = self.union_tag(&a);
                let tb = self.union_tag(&b);
                self.builder.icmp(IntPred::Eq, &IsaType::i32(), ta.op, tb.op)
            }
            _ => self.builder.icmp(IntPred::Eq, ty, a.op, b.op),
        }
    }

    /// Lexicographic `<`, `<=`, `>`, `>=`. The first differing element
    /// decides; equal tuples give true for `<=`/`>=` only.
    fn tuple_order(&mut self, op: BinaryOp, l: TypedValue, r: TypedValue, unsigned: &[bool]) -> TypedValue {
        self.mark("PartialOrd::partial_cmp");
        let IsaType::Tuple(elems) = l.ty.clone() else {
            return TypedValue::bool(false);
        };
        let ty = l.ty.clone();
        let lp = self.spill(l);
        let rp = self.spill(r);

        let result = self.builder.alloca(&IsaType::Bool);
        let when_equal = matches!(op, BinaryOp::Le | BinaryOp::Ge);
        self.builder.store(TypedValue::bool(when_equal), result.clone());
        let done = self.builder.create_block("tuple_cmp_done");

        for (i, ety) in elems.iter().enumerate() {
            let a = self.load_field(&ty, lp.clone(), i as u32, ety);
            let b = self.load_field(&ty, rp.clone(), i as u32, ety);
            let eq = self.scalar_eq(ety, a.clone(), b.clone());
            let last = i + 1 == elems.len();
            let next = if last { done.clone() } else { self.builder.create_block("tuple_cmp_next") };
            let neq = self.builder.create_block("tuple_cmp_neq");
            self.builder.cond_br(eq.op, &next, &neq);

            self.builder.switch_to_block(&neq);
            let is_unsigned = unsigned.get(i).copied().unwrap_or(false);
            let decided = self.element_order(op, ety, is_unsigned, a, b);
            self.builder.store(decided, result.clone());
            self.builder.br(&done);

            if !last {
                self.builder.switch_to_block(&next);
            }
        }
        if elems.is_empty() {
            self.builder.br(&done);
        }
        self.builder.switch_to_block(&done);
        self.builder.load(&IsaType::Bool, result)
    }

    fn element_order(&mut self, op: BinaryOp, ty: &IsaType, unsigned: bool, a: TypedValue, b: TypedValue) -> TypedValue {
        if ty.is_float() {
            let pred = float_pred(op).unwrap_or(FloatPred::Olt);
            return self.builder.fcmp(pred, ty, a.op, b.op);
        }
        let pred = int_pred(op, unsigned || *ty == IsaType::Bool).unwrap_or(IntPred::Slt);
        self.builder.icmp(pred, ty, a.op, b.op)
    }

    /// `==` on a struct: a user `eq` when the type defines one, else the
    /// union tags are compared and payloads ignored.
    fn struct_eq(
        &mut self,
        op: BinaryOp,
        l: TypedValue,
        r: TypedValue,
        sem: Option<&SemType>,
    ) -> Result<TypedValue, LowerError> {
        self.mark(if op == BinaryOp::Eq { "Eq::eq" } else { "Eq::ne" });
        let env = self.env;
        let user_eq = sem
            .and_then(SemType::type_name)
            .map(|name| format!("{name}::eq"))
            .filter(|q| env.lookup_func(q).is_some());
        let eq = match user_eq {
            Some(qualified) => {
                debug!(method = %qualified, "struct equality through user eq");
                let this = self.spill(l);
                let symbol = self.user_symbol(&qualified);
                self.builder.call(
                    &IsaType::Bool,
                    Operand::Global(symbol),
                    vec![TypedValue::new(this, IsaType::Ptr), r],
                )
            }
            None => {
                let ta = self.union_tag(&l);
                let tb = self.union_tag(&r);
                self.builder.icmp(IntPred::Eq, &IsaType::i32(), ta.op, tb.op)
            }
        };
        Ok(if op == BinaryOp::Ne {
            self.builder.binary(BinOp::Xor, WrapFlags::NONE, &IsaType::Bool, eq.op, Operand::Bool(true))
        } else {
            eq
        })
    }
}

fn tuple_signedness(sem: Option<&SemType>, elems: &[IsaType]) -> Vec<bool> {
    match sem {
        Some(SemType::Tuple(sems)) if sems.len() == elems.len() => sems.iter().map(SemType::is_unsigned).collect(),
        _ => elems.iter().map(IsaType::is_unsigned).collect(),
    }
}
