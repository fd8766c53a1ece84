//! Addressable storage: locals, struct and tuple fields, dereferenced
//! pointers. Assignment, compound assignment and `&` go through here, as
//! does receiver evaluation for mutating methods.

use crate::ast::{BinaryOp, Expr, ExprKind, UnaryOp};
use crate::diagnostics::{ErrorCode, LowerError};
use crate::ir::{IsaType, Operand, TypedValue};
use crate::sema::SemType;

use super::layout::{is_refcounted, is_smart_pointer, shared_block_isa};
use super::LowerContext;

/// A pointer to storage plus the type stored there.
#[derive(Debug, Clone)]
pub(crate) struct Place {
    pub ptr: Operand,
    pub ty: IsaType,
    pub sem: Option<SemType>,
}

impl LowerContext<'_> {
    /// Address of `expr` when it names storage. Field accesses on
    /// temporaries spill the temporary first.
    pub(crate) fn place_of(&mut self, expr: &Expr) -> Result<Option<Place>, LowerError> {
        match &expr.kind {
            ExprKind::Ident(name) => {
                let Some(local) = self.locals.get(name).cloned() else {
                    return Ok(None);
                };
                let ptr = self.local_address(&local);
                let sem = local.sem.map(|s| self.resolve_sem(&s));
                Ok(Some(Place { ptr, ty: local.ty, sem }))
            }
            ExprKind::Field { object, field } => self.field_place(object, field),
            ExprKind::Unary { op: UnaryOp::Deref, operand } => {
                match operand.ty.as_ref().map(|t| t.substitute(&self.type_subs)) {
                    Some(SemType::Ref { .. }) => self.place_of(operand),
                    Some(SemType::Ptr { inner, .. }) => {
                        let p = self.lower_expr(operand)?;
                        let ty = self.isa_of(&inner);
                        Ok(Some(Place { ptr: p.op, ty, sem: Some((*inner).clone()) }))
                    }
                    _ => Ok(None),
                }
            }
            _ => Ok(None),
        }
    }

    /// Pointer to `object.field`. Looks through one raw pointer and one
    /// smart-pointer wrapper on the way to the struct.
    fn field_place(&mut self, object: &Expr, field: &str) -> Result<Option<Place>, LowerError> {
        let (mut ptr, sem) = match self.place_of(object)? {
            Some(p) => (p.ptr, p.sem.or_else(|| self.sem_of(object))),
            None => {
                let v = self.lower_expr(object)?;
                (self.spill(v), self.sem_of(object))
            }
        };
        let Some(mut sem) = sem else {
            return Ok(None);
        };

        if let SemType::Ptr { inner, .. } = &sem {
            ptr = self.builder.load(&IsaType::Ptr, ptr).op;
            sem = (**inner).clone();
        }
        if let SemType::Named { name, type_args, .. } = &sem
            && is_smart_pointer(name)
            && let Some(inner) = type_args.first().cloned()
        {
            let wrapper = self.isa_of(&sem);
            let holder = self.builder.field_ptr(&wrapper, ptr, 0);
            let target = self.builder.load(&IsaType::Ptr, holder).op;
            ptr = if is_refcounted(name) {
                let inner_ty = self.isa_of(&inner);
                self.builder.field_ptr(&shared_block_isa(inner_ty), target, 2)
            } else {
                target
            };
            sem = inner;
        }

        if let SemType::Tuple(elems) = &sem {
            let Some(idx) = field.parse::<u32>().ok().filter(|i| (*i as usize) < elems.len()) else {
                return Ok(None);
            };
            let tuple_ty = self.isa_of(&sem);
            let elem = elems[idx as usize].clone();
            let ty = self.isa_of(&elem);
            let fptr = self.builder.field_ptr(&tuple_ty, ptr, idx);
            return Ok(Some(Place { ptr: fptr, ty, sem: Some(elem) }));
        }

        let Some(layout) = self.struct_layout(&sem) else {
            return Ok(None);
        };
        let Some((idx, fsem)) = layout.field(field).map(|(i, s)| (i, s.clone())) else {
            return Ok(None);
        };
        // Class storage holds the instance pointer, not the fields.
        let base = if layout.offset > 0 { self.builder.load(&IsaType::Ptr, ptr).op } else { ptr };
        let ty = self.isa_of(&fsem);
        let fptr = self.builder.field_ptr(&layout.ty, base, idx);
        Ok(Some(Place { ptr: fptr, ty, sem: Some(fsem) }))
    }

    pub(crate) fn lower_field(&mut self, expr: &Expr, object: &Expr, field: &str) -> Result<TypedValue, LowerError> {
        match self.field_place(object, field)? {
            Some(place) => Ok(self.builder.load(&place.ty, place.ptr)),
            None => {
                self.diag(ErrorCode::UnknownVariable, format!("Unknown field: {field}"), expr.span);
                Ok(self.placeholder_for(expr))
            }
        }
    }

    pub(crate) fn lower_assign(&mut self, target: &Expr, value: &Expr) -> Result<TypedValue, LowerError> {
        let Some(place) = self.place_of(target)? else {
            self.diag(ErrorCode::InvalidTarget, "Invalid assignment target", target.span);
            return Ok(TypedValue::void());
        };
        let v = self.lower_expr_hinted(value, Some(&place.ty))?;
        let v = self.coerce_to(v, &place.ty);
        self.builder.store(v, place.ptr);
        Ok(TypedValue::void())
    }

    /// `x op= v` on a local: load, operate at the local's type, store back.
    pub(crate) fn lower_compound_assign(
        &mut self,
        op: BinaryOp,
        target: &Expr,
        value: &Expr,
    ) -> Result<TypedValue, LowerError> {
        let local = match &target.kind {
            ExprKind::Ident(name) => self.locals.get(name).cloned(),
            _ => None,
        };
        let Some(local) = local else {
            self.diag(ErrorCode::InvalidTarget, "Invalid compound assignment target", target.span);
            return Ok(TypedValue::void());
        };
        let addr = self.local_address(&local);
        let current = self.builder.load(&local.ty, addr.clone());
        let rhs = self.lower_expr_hinted(value, Some(&local.ty))?;
        let rhs = self.coerce_to(rhs, &local.ty);
        let unsigned = local.ty.is_unsigned() || local.sem.as_ref().is_some_and(SemType::is_unsigned);
        let Some(result) = self.emit_arith(op, &local.ty, unsigned, current, rhs) else {
            let span = target.span.merge(value.span);
            self.diag(ErrorCode::InvalidTarget, format!("Operator {} cannot be compound-assigned", op.symbol()), span);
            return Ok(TypedValue::void());
        };
        self.builder.store(result, addr);
        Ok(TypedValue::void())
    }

    pub(crate) fn lower_address_of(&mut self, operand: &Expr) -> Result<TypedValue, LowerError> {
        match self.place_of(operand)? {
            Some(place) => Ok(TypedValue::new(place.ptr, IsaType::Ptr)),
            None => {
                self.diag(ErrorCode::InvalidTarget, "Cannot take the address of this expression", operand.span);
                Ok(TypedValue::null())
            }
        }
    }
}
