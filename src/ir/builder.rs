//! Block builder: fresh registers and labels, append-only emission, current
//! block tracking.

use super::inst::{BinOp, CastOp, FloatPred, Inst, IntPred, Terminator, WrapFlags};
use super::types::IsaType;
use super::value::{Label, Operand, Reg, TypedValue};

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub label: Label,
    pub insts: Vec<Inst>,
    pub term: Option<Terminator>,
}

pub struct FunctionBuilder {
    blocks: Vec<Block>,
    /// Blocks in the order they were first switched to.
    layout: Vec<usize>,
    current: usize,
    next_reg: u32,
    next_label: u32,
}

impl Default for FunctionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl FunctionBuilder {
    pub fn new() -> Self {
        let entry = Block { label: Label("entry".to_string()), insts: Vec::new(), term: None };
        Self {
            blocks: vec![entry],
            layout: vec![0],
            current: 0,
            next_reg: 0,
            next_label: 0,
        }
    }

    pub fn fresh_reg(&mut self) -> Reg {
        let r = Reg(self.next_reg);
        self.next_reg += 1;
        r
    }

    pub fn fresh_label(&mut self, prefix: &str) -> Label {
        let l = Label(format!("{prefix}.{}", self.next_label));
        self.next_label += 1;
        l
    }

    /// Create an empty block. It is laid out when first switched to.
    pub fn create_block(&mut self, prefix: &str) -> Label {
        let label = self.fresh_label(prefix);
        self.blocks.push(Block { label: label.clone(), insts: Vec::new(), term: None });
        label
    }

    pub fn switch_to_block(&mut self, label: &Label) {
        let Some(idx) = self.blocks.iter().position(|b| &b.label == label) else {
            // Unknown label: create it on the fly so emission never panics.
            self.blocks.push(Block { label: label.clone(), insts: Vec::new(), term: None });
            self.place(self.blocks.len() - 1);
            return;
        };
        self.place(idx);
    }

    fn place(&mut self, idx: usize) {
        if !self.layout.contains(&idx) {
            self.layout.push(idx);
        }
        self.current = idx;
    }

    pub fn current_label(&self) -> Label {
        self.blocks[self.current].label.clone()
    }

    pub fn current_block_unterminated(&self) -> bool {
        self.blocks[self.current].term.is_none()
    }

    /// Emission after a terminator lands in a fresh unreachable block.
    fn ensure_open(&mut self) {
        if !self.current_block_unterminated() {
            let dead = self.create_block("dead");
            self.switch_to_block(&dead);
        }
    }

    pub fn push(&mut self, inst: Inst) {
        self.ensure_open();
        self.blocks[self.current].insts.push(inst);
    }

    pub fn terminate(&mut self, term: Terminator) {
        self.ensure_open();
        self.blocks[self.current].term = Some(term);
    }

    /// Laid-out blocks. Blocks left open get `unreachable`.
    pub fn finish(self) -> Vec<Block> {
        let mut blocks = self.blocks;
        let mut out = Vec::with_capacity(self.layout.len());
        for idx in self.layout {
            let mut b = std::mem::replace(
                &mut blocks[idx],
                Block { label: Label(String::new()), insts: Vec::new(), term: None },
            );
            if b.term.is_none() {
                b.term = Some(Terminator::Unreachable);
            }
            out.push(b);
        }
        out
    }

    // ===== emission helpers =====

    pub fn binary(
        &mut self,
        op: BinOp,
        flags: WrapFlags,
        ty: &IsaType,
        lhs: Operand,
        rhs: Operand,
    ) -> TypedValue {
        let dst = self.fresh_reg();
        self.push(Inst::Binary { dst, op, flags, ty: ty.clone(), lhs, rhs });
        TypedValue::new(dst, ty.clone())
    }

    pub fn icmp(&mut self, pred: IntPred, ty: &IsaType, lhs: Operand, rhs: Operand) -> TypedValue {
        let dst = self.fresh_reg();
        self.push(Inst::ICmp { dst, pred, ty: ty.clone(), lhs, rhs });
        TypedValue::new(dst, IsaType::Bool)
    }

    pub fn fcmp(&mut self, pred: FloatPred, ty: &IsaType, lhs: Operand, rhs: Operand) -> TypedValue {
        let dst = self.fresh_reg();
        self.push(Inst::FCmp { dst, pred, ty: ty.clone(), lhs, rhs });
        TypedValue::new(dst, IsaType::Bool)
    }

    pub fn select(&mut self, cond: Operand, ty: &IsaType, then_val: Operand, else_val: Operand) -> TypedValue {
        let dst = self.fresh_reg();
        self.push(Inst::Select { dst, cond, ty: ty.clone(), then_val, else_val });
        TypedValue::new(dst, ty.clone())
    }

    pub fn cast(&mut self, op: CastOp, val: TypedValue, to: &IsaType) -> TypedValue {
        let dst = self.fresh_reg();
        self.push(Inst::Cast { dst, op, val, to: to.clone() });
        TypedValue::new(dst, to.clone())
    }

    /// Returns the slot pointer.
    pub fn alloca(&mut self, ty: &IsaType) -> Operand {
        let dst = self.fresh_reg();
        self.push(Inst::Alloca { dst, ty: ty.clone() });
        Operand::Reg(dst)
    }

    pub fn load(&mut self, ty: &IsaType, ptr: Operand) -> TypedValue {
        let dst = self.fresh_reg();
        self.push(Inst::Load { dst, ty: ty.clone(), ptr });
        TypedValue::new(dst, ty.clone())
    }

    pub fn store(&mut self, val: TypedValue, ptr: Operand) {
        self.push(Inst::Store { val, ptr });
    }

    /// `getelementptr inbounds base, ptr p, i32 0, i32 field`.
    pub fn field_ptr(&mut self, base_ty: &IsaType, ptr: Operand, field: u32) -> Operand {
        self.gep(base_ty, ptr, vec![TypedValue::i32(0), TypedValue::i32(field as i128)], true)
    }

    pub fn gep(&mut self, base_ty: &IsaType, ptr: Operand, indices: Vec<TypedValue>, inbounds: bool) -> Operand {
        let dst = self.fresh_reg();
        self.push(Inst::Gep { dst, base_ty: base_ty.clone(), ptr, indices, inbounds });
        Operand::Reg(dst)
    }

    pub fn extract_value(&mut self, agg: TypedValue, index: u32, field_ty: &IsaType) -> TypedValue {
        let dst = self.fresh_reg();
        self.push(Inst::ExtractValue { dst, agg, index });
        TypedValue::new(dst, field_ty.clone())
    }

    pub fn insert_value(&mut self, agg: TypedValue, val: TypedValue, index: u32) -> TypedValue {
        let dst = self.fresh_reg();
        let ty = agg.ty.clone();
        self.push(Inst::InsertValue { dst, agg, val, index });
        TypedValue::new(dst, ty)
    }

    /// Void calls yield `TypedValue::void()`.
    pub fn call(&mut self, ret: &IsaType, callee: Operand, args: Vec<TypedValue>) -> TypedValue {
        if ret.is_void() {
            self.push(Inst::Call { dst: None, ret: IsaType::Void, callee, args });
            return TypedValue::void();
        }
        let dst = self.fresh_reg();
        self.push(Inst::Call { dst: Some(dst), ret: ret.clone(), callee, args });
        TypedValue::new(dst, ret.clone())
    }

    pub fn phi(&mut self, ty: &IsaType, incoming: Vec<(Operand, Label)>) -> TypedValue {
        let dst = self.fresh_reg();
        self.push(Inst::Phi { dst, ty: ty.clone(), incoming });
        TypedValue::new(dst, ty.clone())
    }

    pub fn coverage(&mut self, op: &str) {
        self.push(Inst::Coverage { op: op.to_string() });
    }

    pub fn br(&mut self, target: &Label) {
        self.terminate(Terminator::Br(target.clone()));
    }

    pub fn cond_br(&mut self, cond: Operand, then_label: &Label, else_label: &Label) {
        self.terminate(Terminator::CondBr {
            cond,
            then_label: then_label.clone(),
            else_label: else_label.clone(),
        });
    }

    pub fn ret(&mut self, val: Option<TypedValue>) {
        self.terminate(Terminator::Ret(val));
    }
}
