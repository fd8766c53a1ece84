//! Structural expression forms: blocks, `if`, `return`, tuples, arrays,
//! variant construction and unary operators.

use tracing::trace;

use crate::ast::{Expr, ExprKind, Stmt, UnaryOp};
use crate::diagnostics::{ErrorCode, LowerError};
use crate::ir::{BinOp, IsaType, Label, Operand, TypedValue, WrapFlags};
use crate::sema::{SemType, TypeSubst};

use super::LowerContext;

/// Type a closure literal has at its binding site. Captures are known here,
/// so calls through the binding can pick the call shape statically.
pub(crate) fn closure_literal_sem(expr: &Expr) -> Option<SemType> {
    let ExprKind::Closure { params, body, captures, ret } = &expr.kind else {
        return None;
    };
    Some(SemType::Closure {
        params: params.iter().map(|p| p.ty.clone().unwrap_or_else(SemType::i32)).collect(),
        ret: Box::new(ret.clone().or_else(|| body.ty.clone()).unwrap_or_else(SemType::i32)),
        captures: captures.clone(),
    })
}

impl LowerContext<'_> {
    pub(crate) fn lower_block(&mut self, stmts: &[Stmt], tail: Option<&Expr>) -> Result<TypedValue, LowerError> {
        let mut shadowed = Vec::new();
        let result = self.lower_block_inner(stmts, tail, &mut shadowed);
        for (name, prev) in shadowed.into_iter().rev() {
            self.locals.restore(&name, prev);
        }
        result
    }

    fn lower_block_inner(
        &mut self,
        stmts: &[Stmt],
        tail: Option<&Expr>,
        shadowed: &mut Vec<(String, Option<super::Local>)>,
    ) -> Result<TypedValue, LowerError> {
        for stmt in stmts {
            match stmt {
                Stmt::Let { name, ty, value } => {
                    let declared = ty.as_ref().map(|t| self.resolve_sem(t));
                    let hint = declared.as_ref().map(|s| self.isa_of(s));
                    let mut v = self.lower_expr_hinted(value, hint.as_ref())?;
                    if let Some(h) = &hint {
                        v = self.coerce_to(v, h);
                    }
                    let sem = closure_literal_sem(value).or(declared).or_else(|| self.sem_of(value));
                    let prev = self.bind_local(name, v, sem);
                    shadowed.push((name.clone(), prev));
                }
                Stmt::Expr(e) => {
                    self.lower_expr(e)?;
                }
            }
        }
        match tail {
            Some(e) => self.lower_expr(e),
            None => Ok(TypedValue::void()),
        }
    }

    pub(crate) fn lower_if(
        &mut self,
        expr: &Expr,
        cond: &Expr,
        then_branch: &Expr,
        else_branch: Option<&Expr>,
    ) -> Result<TypedValue, LowerError> {
        let c = self.lower_expr(cond)?;
        let c = self.coerce_to(c, &IsaType::Bool);

        let then_l = self.builder.create_block("if_then");
        let else_l = else_branch.map(|_| self.builder.create_block("if_else"));
        let end_l = self.builder.create_block("if_end");
        self.builder.cond_br(c.op, &then_l, else_l.as_ref().unwrap_or(&end_l));

        let mut ty = match (else_branch, self.sem_of(expr)) {
            (Some(_), Some(sem)) => Some(self.isa_of(&sem)),
            _ => None,
        };
        let mut incoming: Vec<(Operand, Label)> = Vec::new();

        self.builder.switch_to_block(&then_l);
        let tv = self.lower_expr(then_branch)?;
        if self.builder.current_block_unterminated() {
            if else_branch.is_some() && !tv.ty.is_void() {
                let t = ty.get_or_insert_with(|| tv.ty.clone()).clone();
                let tv = self.coerce_to(tv, &t);
                incoming.push((tv.op, self.builder.current_label()));
            }
            self.builder.br(&end_l);
        }

        if let (Some(else_expr), Some(else_l)) = (else_branch, &else_l) {
            self.builder.switch_to_block(else_l);
            let ev = self.lower_expr(else_expr)?;
            if self.builder.current_block_unterminated() {
                if !ev.ty.is_void() {
                    let t = ty.get_or_insert_with(|| ev.ty.clone()).clone();
                    let ev = self.coerce_to(ev, &t);
                    incoming.push((ev.op, self.builder.current_label()));
                }
                self.builder.br(&end_l);
            }
        }

        self.builder.switch_to_block(&end_l);
        match ty {
            Some(t) if !t.is_void() && !incoming.is_empty() => Ok(self.builder.phi(&t, incoming)),
            _ => Ok(TypedValue::void()),
        }
    }

    /// `return` leaves the inlined lambda when a redirect is active, the
    /// function otherwise.
    pub(crate) fn lower_return(&mut self, value: Option<&Expr>) -> Result<TypedValue, LowerError> {
        let target = self.redirect.as_ref().map(|r| r.ty.clone()).unwrap_or_else(|| self.ret_ty.clone());
        let v = match value {
            Some(e) => Some(self.lower_expr_hinted(e, Some(&target))?),
            None => None,
        };
        if let Some(redirect) = self.redirect.clone() {
            if let (Some(slot), Some(v)) = (&redirect.slot, v) {
                let v = self.coerce_to(v, &redirect.ty);
                self.builder.store(v, slot.clone());
            }
            self.builder.br(&redirect.merge);
        } else if target.is_void() {
            self.builder.ret(None);
        } else {
            let v = match v {
                Some(v) if !v.ty.is_void() => self.coerce_to(v, &target),
                _ => self.placeholder(&target),
            };
            self.builder.ret(Some(v));
        }
        Ok(TypedValue::void())
    }

    pub(crate) fn lower_tuple(&mut self, expr: &Expr, elems: &[Expr]) -> Result<TypedValue, LowerError> {
        let elem_sems: Vec<SemType> = match self.sem_of(expr) {
            Some(SemType::Tuple(ts)) if ts.len() == elems.len() => ts,
            _ => Vec::new(),
        };
        let mut values = Vec::with_capacity(elems.len());
        for (i, e) in elems.iter().enumerate() {
            let hint = elem_sems.get(i).map(|s| self.isa_of(s));
            let v = self.lower_expr_hinted(e, hint.as_ref())?;
            values.push(match &hint {
                Some(h) => self.coerce_to(v, h),
                None => v,
            });
        }
        let ty = IsaType::Tuple(values.iter().map(|v| v.ty.clone()).collect());
        Ok(self.build_aggregate(ty, values))
    }

    pub(crate) fn lower_array(&mut self, expr: &Expr, elems: &[Expr]) -> Result<TypedValue, LowerError> {
        let mut elem_ty = match self.sem_of(expr) {
            Some(SemType::Array { elem, .. }) => Some(self.isa_of(&elem)),
            _ => None,
        };
        let mut values = Vec::with_capacity(elems.len());
        for e in elems {
            let v = self.lower_expr_hinted(e, elem_ty.as_ref())?;
            let t = elem_ty.get_or_insert_with(|| v.ty.clone()).clone();
            values.push(self.coerce_to(v, &t));
        }
        let ty = IsaType::Array(elems.len() as u64, Box::new(elem_ty.unwrap_or_else(IsaType::i32)));
        Ok(self.build_aggregate(ty, values))
    }

    fn build_aggregate(&mut self, ty: IsaType, values: Vec<TypedValue>) -> TypedValue {
        let mut agg = TypedValue::undef(ty);
        for (i, v) in values.into_iter().enumerate() {
            agg = self.builder.insert_value(agg, v, i as u32);
        }
        agg
    }

    pub(crate) fn lower_variant(
        &mut self,
        expr: &Expr,
        enum_name: &str,
        variant: &str,
        payload: Option<&Expr>,
    ) -> Result<TypedValue, LowerError> {
        let sem = self.sem_of(expr);
        match (enum_name, variant) {
            ("Maybe", "Just" | "Nothing") => {
                let inner = sem
                    .as_ref()
                    .and_then(|s| s.type_args().first().cloned())
                    .or_else(|| payload.and_then(|p| self.sem_of(p)))
                    .unwrap_or_else(SemType::i32);
                let union_ty = self.isa_of(&SemType::maybe(inner.clone()));
                if variant == "Nothing" {
                    return Ok(self.build_union(&union_ty, 1, None));
                }
                let v = self.lower_payload(payload, &inner)?;
                Ok(self.build_union(&union_ty, 0, v))
            }
            ("Outcome", "Ok" | "Err") => {
                let args = sem.as_ref().map(|s| s.type_args().to_vec()).unwrap_or_default();
                let payload_sem = payload.and_then(|p| self.sem_of(p));
                let (ok, err) = match (args.first(), args.get(1)) {
                    (Some(o), Some(e)) => (o.clone(), e.clone()),
                    _ if variant == "Ok" => (payload_sem.unwrap_or_else(SemType::i32), SemType::str()),
                    _ => (SemType::unit(), payload_sem.unwrap_or_else(SemType::str)),
                };
                let union_ty = self.isa_of(&SemType::outcome(ok.clone(), err.clone()));
                let (tag, inner) = if variant == "Ok" { (0, ok) } else { (1, err) };
                let v = self.lower_payload(payload, &inner)?;
                Ok(self.build_union(&union_ty, tag, v))
            }
            ("Ordering", v) => {
                let tag = match v {
                    "Less" => 0,
                    "Equal" => 1,
                    "Greater" => 2,
                    _ => {
                        self.diag(ErrorCode::UnknownVariable, format!("Unknown variant: Ordering::{v}"), expr.span);
                        1
                    }
                };
                Ok(self.make_ordering(TypedValue::i32(tag)))
            }
            _ => self.lower_user_variant(expr, sem, enum_name, variant, payload),
        }
    }

    fn lower_payload(&mut self, payload: Option<&Expr>, inner: &SemType) -> Result<Option<TypedValue>, LowerError> {
        let Some(p) = payload else {
            return Ok(None);
        };
        let ty = self.isa_of(inner);
        let v = self.lower_expr_hinted(p, Some(&ty))?;
        Ok(Some(self.coerce_to(v, &ty)))
    }

    fn lower_user_variant(
        &mut self,
        expr: &Expr,
        sem: Option<SemType>,
        enum_name: &str,
        variant: &str,
        payload: Option<&Expr>,
    ) -> Result<TypedValue, LowerError> {
        let env = self.env;
        let Some(def) = env.lookup_enum(enum_name) else {
            self.diag(ErrorCode::UnknownVariable, format!("Unknown variant: {enum_name}::{variant}"), expr.span);
            return Ok(self.placeholder_for(expr));
        };
        let Some(tag) = def.tag_of(variant) else {
            self.diag(ErrorCode::UnknownVariable, format!("Unknown variant: {enum_name}::{variant}"), expr.span);
            return Ok(self.placeholder_for(expr));
        };
        let enum_sem = sem.unwrap_or_else(|| SemType::named(enum_name, Vec::new()));
        let subs: TypeSubst = def
            .type_params
            .iter()
            .cloned()
            .zip(enum_sem.type_args().iter().cloned())
            .collect();
        let union_ty = self.isa_of(&enum_sem);
        let payload_sem = def.variants[tag as usize].payload.as_ref().map(|p| p.substitute(&subs));
        let v = match payload_sem {
            Some(ps) => self.lower_payload(payload, &ps)?,
            None => None,
        };
        trace!(variant = %format!("{enum_name}::{variant}"), tag, "enum variant");
        Ok(self.build_union(&union_ty, tag, v))
    }

    pub(crate) fn lower_unary(&mut self, expr: &Expr, op: UnaryOp, operand: &Expr) -> Result<TypedValue, LowerError> {
        match op {
            UnaryOp::Neg => {
                let v = self.lower_expr(operand)?;
                self.mark("Neg::neg");
                Ok(self.negate(v))
            }
            UnaryOp::Not => {
                let v = self.lower_expr(operand)?;
                self.mark("Not::not");
                Ok(self.invert(v))
            }
            UnaryOp::BitNot => {
                let v = self.lower_expr(operand)?;
                self.mark("BitNot::bit_not");
                Ok(self.invert(v))
            }
            UnaryOp::Deref => {
                let raw = operand.ty.as_ref().map(|t| t.substitute(&self.type_subs));
                match raw {
                    // `ref` bindings already load through their pointer.
                    Some(SemType::Ref { .. }) => self.lower_expr(operand),
                    Some(SemType::Ptr { inner, .. }) => {
                        let p = self.lower_expr(operand)?;
                        let ty = self.isa_of(&inner);
                        Ok(self.builder.load(&ty, p.op))
                    }
                    _ => {
                        let p = self.lower_expr(operand)?;
                        if !p.ty.is_ptr() {
                            return Ok(p);
                        }
                        let ty = self.isa_of_expr(expr);
                        Ok(self.builder.load(&ty, p.op))
                    }
                }
            }
            UnaryOp::Ref { .. } => self.lower_address_of(operand),
        }
    }

    pub(crate) fn negate(&mut self, v: TypedValue) -> TypedValue {
        match (&v.op, &v.ty) {
            (Operand::Int(n), IsaType::Int { .. }) => TypedValue::int(-n, v.ty.clone()),
            (Operand::Float(f), IsaType::Float(_)) => TypedValue::new(Operand::Float(-f), v.ty.clone()),
            (_, IsaType::Float(_)) => {
                let ty = v.ty.clone();
                self.builder.binary(BinOp::FSub, WrapFlags::NONE, &ty, Operand::Float(-0.0), v.op)
            }
            _ => {
                let ty = v.ty.clone();
                self.builder.binary(BinOp::Sub, WrapFlags::NSW, &ty, Operand::Int(0), v.op)
            }
        }
    }

    /// Logical not on `i1`, bitwise not on integers.
    fn invert(&mut self, v: TypedValue) -> TypedValue {
        let ty = v.ty.clone();
        match (&v.op, &ty) {
            (Operand::Bool(b), _) => TypedValue::bool(!b),
            (_, IsaType::Bool) => self.builder.binary(BinOp::Xor, WrapFlags::NONE, &ty, v.op, Operand::Bool(true)),
            _ => self.builder.binary(BinOp::Xor, WrapFlags::NONE, &ty, v.op, Operand::Int(-1)),
        }
    }
}
