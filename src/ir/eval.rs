//! Reference evaluator for lowered functions.
//!
//! Executes the IR over a small value model: fixed-width integers, floats,
//! aggregates, pointers into allocas, interned strings and function symbols.
//! Memory is typed by what was stored, not by byte layout, so a payload slot
//! declared `i64` can hold a stored `double` or pointer and hands it back on
//! load. Runtime string primitives and the overflow intrinsics are built in;
//! tests register anything else as host functions.

use std::collections::HashMap;

use thiserror::Error;

use crate::config::RuntimeNames;
use crate::coverage::CoverageLog;

use super::inst::{BinOp, CastOp, FloatPred, Inst, IntPred, Terminator};
use super::types::{FloatKind, IsaType};
use super::value::{Operand, Reg, TypedValue};
use super::{Function, Module};

const STEP_LIMIT: u64 = 1_000_000;
const MAX_ARRAY_LEN: u64 = 4096;

#[derive(Debug, Clone, PartialEq)]
pub enum Pointer {
    Null,
    Slot { alloc: usize, path: Vec<u64> },
    Str(usize),
    Func(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Val {
    Int { bits: u32, v: u128 },
    Float(f64),
    Ptr(Pointer),
    Agg(Vec<Val>),
    Undef,
}

fn mask(bits: u32, v: u128) -> u128 {
    if bits >= 128 { v } else { v & ((1u128 << bits) - 1) }
}

fn to_signed(bits: u32, v: u128) -> i128 {
    if bits >= 128 {
        return v as i128;
    }
    let shift = 128 - bits;
    ((v << shift) as i128) >> shift
}

impl Val {
    pub fn int(bits: u32, v: i128) -> Self {
        Val::Int { bits, v: mask(bits, v as u128) }
    }

    pub fn bool(b: bool) -> Self {
        Val::Int { bits: 1, v: u128::from(b) }
    }

    /// Signed reading of an integer.
    pub fn as_i128(&self) -> Option<i128> {
        match self {
            Val::Int { bits, v } => Some(to_signed(*bits, *v)),
            _ => None,
        }
    }

    pub fn as_u128(&self) -> Option<u128> {
        match self {
            Val::Int { v, .. } => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Val::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Val::Int { bits: 1, v } => Some(*v != 0),
            _ => None,
        }
    }

    pub fn field(&self, index: usize) -> Option<&Val> {
        match self {
            Val::Agg(fields) => fields.get(index),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum EvalError {
    #[error("unknown function '{0}'")]
    UnknownFunction(String),
    #[error("unknown block '{0}'")]
    UnknownBlock(String),
    #[error("use of undefined register {0}")]
    UndefinedRegister(String),
    #[error("reached unreachable in block '{0}'")]
    Unreachable(String),
    #[error("division by zero")]
    DivisionByZero,
    #[error("shift amount {amount} out of range for i{bits}")]
    ShiftOutOfRange { amount: u128, bits: u32 },
    #[error("invalid pointer access: {0}")]
    BadPointer(String),
    #[error("type mismatch: {0}")]
    TypeMismatch(String),
    #[error("step limit exceeded")]
    StepLimit,
}

/// Memory visible to host functions.
#[derive(Debug, Default)]
pub struct Heap {
    pub slots: Vec<Val>,
    pub strings: Vec<String>,
}

impl Heap {
    pub fn new_string(&mut self, s: impl Into<String>) -> Val {
        self.strings.push(s.into());
        Val::Ptr(Pointer::Str(self.strings.len() - 1))
    }

    pub fn string(&self, v: &Val) -> Option<&str> {
        match v {
            Val::Ptr(Pointer::Str(id)) => self.strings.get(*id).map(|s| s.as_str()),
            Val::Ptr(Pointer::Null) => Some(""),
            _ => None,
        }
    }

    fn read(&self, ptr: &Pointer) -> Result<&Val, EvalError> {
        let Pointer::Slot { alloc, path } = ptr else {
            return Err(EvalError::BadPointer(format!("load from {ptr:?}")));
        };
        let mut cur = self
            .slots
            .get(*alloc)
            .ok_or_else(|| EvalError::BadPointer(format!("slot {alloc}")))?;
        for idx in path {
            cur = match cur {
                Val::Agg(fields) => fields
                    .get(*idx as usize)
                    .ok_or_else(|| EvalError::BadPointer(format!("index {idx} in slot {alloc}")))?,
                Val::Undef => return Ok(&Val::Undef),
                _ => return Err(EvalError::BadPointer(format!("path into scalar in slot {alloc}"))),
            };
        }
        Ok(cur)
    }

    fn write(&mut self, ptr: &Pointer, v: Val) -> Result<(), EvalError> {
        let Pointer::Slot { alloc, path } = ptr else {
            return Err(EvalError::BadPointer(format!("store to {ptr:?}")));
        };
        let mut cur = self
            .slots
            .get_mut(*alloc)
            .ok_or_else(|| EvalError::BadPointer(format!("slot {alloc}")))?;
        for idx in path {
            let idx = *idx as usize;
            if !matches!(cur, Val::Agg(_)) {
                *cur = Val::Agg(Vec::new());
            }
            let Val::Agg(fields) = cur else {
                return Err(EvalError::BadPointer(format!("path into scalar in slot {alloc}")));
            };
            if fields.len() <= idx {
                fields.resize(idx + 1, Val::Undef);
            }
            cur = &mut fields[idx];
        }
        *cur = v;
        Ok(())
    }
}

pub type HostFn = Box<dyn FnMut(&mut Heap, &[Val]) -> Result<Val, EvalError>>;

pub struct Evaluator<'m> {
    module: &'m Module,
    pub heap: Heap,
    host: HashMap<String, HostFn>,
    global_strings: HashMap<String, usize>,
    /// Coverage markers passed during execution.
    pub executed: CoverageLog,
    steps: u64,
}

impl<'m> Evaluator<'m> {
    pub fn new(module: &'m Module, runtime: &RuntimeNames) -> Self {
        let mut ev = Self {
            module,
            heap: Heap::default(),
            host: HashMap::new(),
            global_strings: HashMap::new(),
            executed: CoverageLog::default(),
            steps: 0,
        };
        ev.install_runtime(runtime);
        ev
    }

    fn install_runtime(&mut self, rt: &RuntimeNames) {
        self.register(&rt.string_concat, |heap, args| {
            let a = heap.string(&args[0]).unwrap_or_default().to_string();
            let b = heap.string(&args[1]).unwrap_or_default();
            let joined = a + b;
            Ok(heap.new_string(joined))
        });
        self.register(&rt.string_eq, |heap, args| {
            let eq = heap.string(&args[0]) == heap.string(&args[1]);
            Ok(Val::int(32, i128::from(eq)))
        });
        self.register(&rt.string_len, |heap, args| {
            let len = heap.string(&args[0]).map_or(0, |s| s.len());
            Ok(Val::int(64, len as i128))
        });
        self.register(&rt.int_to_string, |heap, args| {
            let v = args[0].as_i128().unwrap_or_default();
            Ok(heap.new_string(v.to_string()))
        });
        self.register(&rt.float_to_string, |heap, args| {
            let v = args[0].as_f64().unwrap_or_default();
            Ok(heap.new_string(v.to_string()))
        });
        self.register(&rt.bool_to_string, |heap, args| {
            let v = args[0].as_bool().unwrap_or_default();
            Ok(heap.new_string(v.to_string()))
        });
    }

    pub fn register(
        &mut self,
        name: &str,
        f: impl FnMut(&mut Heap, &[Val]) -> Result<Val, EvalError> + 'static,
    ) {
        self.host.insert(name.to_string(), Box::new(f));
    }

    pub fn call(&mut self, name: &str, args: Vec<Val>) -> Result<Val, EvalError> {
        if let Some(func) = self.module.function(name) {
            return self.run(func, args);
        }
        if let Some(rest) = name.strip_prefix("llvm.") {
            return overflow_intrinsic(rest, &args);
        }
        let heap = &mut self.heap;
        match self.host.get_mut(name) {
            Some(f) => f(heap, &args),
            None => Err(EvalError::UnknownFunction(name.to_string())),
        }
    }

    fn run(&mut self, func: &'m Function, args: Vec<Val>) -> Result<Val, EvalError> {
        let mut regs: HashMap<Reg, Val> = HashMap::new();
        for (param, arg) in func.params.iter().zip(args) {
            if let Operand::Reg(r) = param.op {
                regs.insert(r, arg);
            }
        }
        let mut block = func
            .blocks
            .first()
            .ok_or_else(|| EvalError::UnknownBlock("entry".into()))?;
        let mut prev: Option<&str> = None;
        loop {
            for inst in &block.insts {
                self.steps += 1;
                if self.steps > STEP_LIMIT {
                    return Err(EvalError::StepLimit);
                }
                self.exec(inst, &mut regs, prev)?;
            }
            let next = match &block.term {
                Some(Terminator::Br(l)) => l,
                Some(Terminator::CondBr { cond, then_label, else_label }) => {
                    let c = self.operand(cond, &IsaType::Bool, &regs)?;
                    if c.as_bool().unwrap_or(false) { then_label } else { else_label }
                }
                Some(Terminator::Ret(Some(v))) => return self.operand(&v.op, &v.ty, &regs),
                Some(Terminator::Ret(None)) => return Ok(Val::Undef),
                Some(Terminator::Unreachable) | None => {
                    return Err(EvalError::Unreachable(block.label.name().to_string()));
                }
            };
            prev = Some(block.label.name());
            block = func
                .block(next.name())
                .ok_or_else(|| EvalError::UnknownBlock(next.name().to_string()))?;
        }
    }

    fn operand(&mut self, op: &Operand, ty: &IsaType, regs: &HashMap<Reg, Val>) -> Result<Val, EvalError> {
        Ok(match op {
            Operand::Reg(r) => regs
                .get(r)
                .cloned()
                .ok_or_else(|| EvalError::UndefinedRegister(r.to_string()))?,
            Operand::Int(v) => Val::int(ty.bits().unwrap_or(64), *v),
            Operand::Float(f) => Val::Float(round_float(ty, *f)),
            Operand::Bool(b) => Val::bool(*b),
            Operand::Null => Val::Ptr(Pointer::Null),
            Operand::Undef => self.undef_of(ty),
            Operand::Zero => self.zero_of(ty),
            Operand::Global(name) => {
                if let Some(id) = self.global_strings.get(name) {
                    return Ok(Val::Ptr(Pointer::Str(*id)));
                }
                match self.module.string_constant(name) {
                    Some(content) => {
                        let v = self.heap.new_string(content);
                        if let Val::Ptr(Pointer::Str(id)) = v {
                            self.global_strings.insert(name.clone(), id);
                        }
                        v
                    }
                    None => Val::Ptr(Pointer::Func(name.clone())),
                }
            }
        })
    }

    fn typed(&mut self, tv: &TypedValue, regs: &HashMap<Reg, Val>) -> Result<Val, EvalError> {
        self.operand(&tv.op, &tv.ty, regs)
    }

    fn undef_of(&self, ty: &IsaType) -> Val {
        match ty {
            IsaType::Struct(name) => match self.module.struct_fields(name) {
                Some(fields) => Val::Agg(fields.iter().map(|f| self.undef_of(f)).collect()),
                None => Val::Undef,
            },
            IsaType::Tuple(elems) => Val::Agg(elems.iter().map(|e| self.undef_of(e)).collect()),
            IsaType::Array(len, elem) => {
                Val::Agg((0..(*len).min(MAX_ARRAY_LEN)).map(|_| self.undef_of(elem)).collect())
            }
            IsaType::Closure => Val::Agg(vec![Val::Undef, Val::Undef]),
            _ => Val::Undef,
        }
    }

    fn zero_of(&self, ty: &IsaType) -> Val {
        match ty {
            IsaType::Bool => Val::bool(false),
            IsaType::Int { bits, .. } => Val::Int { bits: *bits, v: 0 },
            IsaType::Float(_) => Val::Float(0.0),
            IsaType::Ptr => Val::Ptr(Pointer::Null),
            IsaType::Struct(name) => match self.module.struct_fields(name) {
                Some(fields) => Val::Agg(fields.iter().map(|f| self.zero_of(f)).collect()),
                None => Val::Undef,
            },
            IsaType::Tuple(elems) => Val::Agg(elems.iter().map(|e| self.zero_of(e)).collect()),
            IsaType::Array(len, elem) => {
                Val::Agg((0..(*len).min(MAX_ARRAY_LEN)).map(|_| self.zero_of(elem)).collect())
            }
            IsaType::Closure => Val::Agg(vec![Val::Ptr(Pointer::Null), Val::Ptr(Pointer::Null)]),
            IsaType::Void => Val::Undef,
        }
    }

    fn exec(&mut self, inst: &Inst, regs: &mut HashMap<Reg, Val>, prev: Option<&str>) -> Result<(), EvalError> {
        match inst {
            Inst::Binary { dst, op, ty, lhs, rhs, .. } => {
                let a = self.operand(lhs, ty, regs)?;
                let b = self.operand(rhs, ty, regs)?;
                regs.insert(*dst, binary(*op, ty, &a, &b)?);
            }
            Inst::ICmp { dst, pred, ty, lhs, rhs } => {
                let a = self.operand(lhs, ty, regs)?;
                let b = self.operand(rhs, ty, regs)?;
                regs.insert(*dst, Val::bool(icmp(*pred, &a, &b)?));
            }
            Inst::FCmp { dst, pred, ty, lhs, rhs } => {
                let a = self.operand(lhs, ty, regs)?.as_f64();
                let b = self.operand(rhs, ty, regs)?.as_f64();
                let (Some(a), Some(b)) = (a, b) else {
                    return Err(EvalError::TypeMismatch("fcmp on non-float".into()));
                };
                let r = match pred {
                    FloatPred::Oeq => a == b,
                    FloatPred::One => !a.is_nan() && !b.is_nan() && a != b,
                    FloatPred::Olt => a < b,
                    FloatPred::Ole => a <= b,
                    FloatPred::Ogt => a > b,
                    FloatPred::Oge => a >= b,
                };
                regs.insert(*dst, Val::bool(r));
            }
            Inst::Select { dst, cond, ty, then_val, else_val } => {
                let c = self.operand(cond, &IsaType::Bool, regs)?;
                let v = if c.as_bool().unwrap_or(false) {
                    self.operand(then_val, ty, regs)?
                } else {
                    self.operand(else_val, ty, regs)?
                };
                regs.insert(*dst, v);
            }
            Inst::Cast { dst, op, val, to } => {
                let v = self.typed(val, regs)?;
                regs.insert(*dst, cast(*op, to, v)?);
            }
            Inst::Alloca { dst, ty } => {
                let init = self.undef_of(ty);
                self.heap.slots.push(init);
                let alloc = self.heap.slots.len() - 1;
                regs.insert(*dst, Val::Ptr(Pointer::Slot { alloc, path: Vec::new() }));
            }
            Inst::Load { dst, ty, ptr } => {
                let p = self.pointer(ptr, regs)?;
                let stored = self.heap.read(&p)?.clone();
                let v = match (stored, ty) {
                    (Val::Int { v, .. }, IsaType::Int { bits, .. }) => Val::Int { bits: *bits, v: mask(*bits, v) },
                    (Val::Int { v, .. }, IsaType::Bool) => Val::bool(v & 1 == 1),
                    (Val::Undef, t) => self.undef_of(t),
                    (other, _) => other,
                };
                regs.insert(*dst, v);
            }
            Inst::Store { val, ptr } => {
                let v = self.typed(val, regs)?;
                let p = self.pointer(ptr, regs)?;
                self.heap.write(&p, v)?;
            }
            Inst::Gep { dst, ptr, indices, .. } => {
                let base = self.pointer(ptr, regs)?;
                let mut idx_vals = Vec::with_capacity(indices.len());
                for i in indices {
                    let v = self.typed(i, regs)?;
                    idx_vals.push(v.as_i128().unwrap_or(0));
                }
                regs.insert(*dst, Val::Ptr(gep(base, &idx_vals)?));
            }
            Inst::ExtractValue { dst, agg, index } => {
                let a = self.typed(agg, regs)?;
                let v = match a {
                    Val::Agg(fields) => fields.get(*index as usize).cloned().unwrap_or(Val::Undef),
                    _ => Val::Undef,
                };
                regs.insert(*dst, v);
            }
            Inst::InsertValue { dst, agg, val, index } => {
                let mut a = self.typed(agg, regs)?;
                if !matches!(a, Val::Agg(_)) {
                    a = self.undef_of(&agg.ty);
                }
                let v = self.typed(val, regs)?;
                if let Val::Agg(fields) = &mut a {
                    let idx = *index as usize;
                    if fields.len() <= idx {
                        fields.resize(idx + 1, Val::Undef);
                    }
                    fields[idx] = v;
                }
                regs.insert(*dst, a);
            }
            Inst::Call { dst, callee, args, .. } => {
                let target = match callee {
                    Operand::Global(name) => name.clone(),
                    other => match self.operand(other, &IsaType::Ptr, regs)? {
                        Val::Ptr(Pointer::Func(name)) => name,
                        v => return Err(EvalError::BadPointer(format!("call through {v:?}"))),
                    },
                };
                let mut vals = Vec::with_capacity(args.len());
                for a in args {
                    vals.push(self.typed(a, regs)?);
                }
                let result = self.call(&target, vals)?;
                if let Some(dst) = dst {
                    regs.insert(*dst, result);
                }
            }
            Inst::Phi { dst, ty, incoming } => {
                let from = prev.ok_or_else(|| EvalError::UnknownBlock("phi in entry".into()))?;
                let (op, _) = incoming
                    .iter()
                    .find(|(_, l)| l.name() == from)
                    .ok_or_else(|| EvalError::UnknownBlock(format!("phi has no edge from {from}")))?;
                let v = self.operand(op, ty, regs)?;
                regs.insert(*dst, v);
            }
            Inst::Coverage { op } => self.executed.record(op),
        }
        Ok(())
    }

    fn pointer(&mut self, op: &Operand, regs: &HashMap<Reg, Val>) -> Result<Pointer, EvalError> {
        match self.operand(op, &IsaType::Ptr, regs)? {
            Val::Ptr(p) => Ok(p),
            other => Err(EvalError::BadPointer(format!("{other:?} is not a pointer"))),
        }
    }
}

fn round_float(ty: &IsaType, f: f64) -> f64 {
    match ty {
        IsaType::Float(FloatKind::F32) => f as f32 as f64,
        _ => f,
    }
}

fn gep(base: Pointer, indices: &[i128]) -> Result<Pointer, EvalError> {
    let Some((first, rest)) = indices.split_first() else {
        return Ok(base);
    };
    match base {
        Pointer::Null if *first == 0 && rest.is_empty() => Ok(Pointer::Null),
        Pointer::Slot { alloc, mut path } => {
            if *first != 0 {
                // Element step from a pointer into an array.
                let last = path
                    .last_mut()
                    .ok_or_else(|| EvalError::BadPointer("offset from slot base".into()))?;
                let moved = *last as i128 + first;
                if moved < 0 {
                    return Err(EvalError::BadPointer("negative element offset".into()));
                }
                *last = moved as u64;
            }
            path.extend(rest.iter().map(|i| *i as u64));
            Ok(Pointer::Slot { alloc, path })
        }
        other => Err(EvalError::BadPointer(format!("gep on {other:?}"))),
    }
}

fn int_parts(v: &Val) -> Result<(u32, u128), EvalError> {
    match v {
        Val::Int { bits, v } => Ok((*bits, *v)),
        other => Err(EvalError::TypeMismatch(format!("expected integer, got {other:?}"))),
    }
}

fn binary(op: BinOp, ty: &IsaType, a: &Val, b: &Val) -> Result<Val, EvalError> {
    if matches!(a, Val::Undef) || matches!(b, Val::Undef) {
        return Ok(Val::Undef);
    }
    if op.is_float() {
        let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) else {
            return Err(EvalError::TypeMismatch(format!("{} on non-float", op.mnemonic())));
        };
        let r = match op {
            BinOp::FAdd => x + y,
            BinOp::FSub => x - y,
            BinOp::FMul => x * y,
            BinOp::FDiv => x / y,
            _ => x % y,
        };
        return Ok(Val::Float(round_float(ty, r)));
    }
    let (bits, x) = int_parts(a)?;
    let (_, y) = int_parts(b)?;
    let (sx, sy) = (to_signed(bits, x), to_signed(bits, y));
    let r: u128 = match op {
        BinOp::Add => x.wrapping_add(y),
        BinOp::Sub => x.wrapping_sub(y),
        BinOp::Mul => x.wrapping_mul(y),
        BinOp::UDiv | BinOp::URem | BinOp::SDiv | BinOp::SRem if y == 0 => {
            return Err(EvalError::DivisionByZero);
        }
        BinOp::UDiv => x / y,
        BinOp::URem => x % y,
        BinOp::SDiv => sx.wrapping_div(sy) as u128,
        BinOp::SRem => sx.wrapping_rem(sy) as u128,
        BinOp::And => x & y,
        BinOp::Or => x | y,
        BinOp::Xor => x ^ y,
        BinOp::Shl | BinOp::LShr | BinOp::AShr if y >= u128::from(bits) => {
            return Err(EvalError::ShiftOutOfRange { amount: y, bits });
        }
        BinOp::Shl => x << y,
        BinOp::LShr => x >> y,
        BinOp::AShr => (sx >> y) as u128,
        _ => return Err(EvalError::TypeMismatch(format!("{} on integers", op.mnemonic()))),
    };
    Ok(Val::Int { bits, v: mask(bits, r) })
}

fn icmp(pred: IntPred, a: &Val, b: &Val) -> Result<bool, EvalError> {
    if let (Val::Ptr(p), Val::Ptr(q)) = (a, b) {
        return match pred {
            IntPred::Eq => Ok(p == q),
            IntPred::Ne => Ok(p != q),
            _ => Err(EvalError::TypeMismatch("ordered compare of pointers".into())),
        };
    }
    let (bits, x) = int_parts(a)?;
    let (_, y) = int_parts(b)?;
    let (sx, sy) = (to_signed(bits, x), to_signed(bits, y));
    Ok(match pred {
        IntPred::Eq => x == y,
        IntPred::Ne => x != y,
        IntPred::Slt => sx < sy,
        IntPred::Sle => sx <= sy,
        IntPred::Sgt => sx > sy,
        IntPred::Sge => sx >= sy,
        IntPred::Ult => x < y,
        IntPred::Ule => x <= y,
        IntPred::Ugt => x > y,
        IntPred::Uge => x >= y,
    })
}

fn cast(op: CastOp, to: &IsaType, v: Val) -> Result<Val, EvalError> {
    // Undefined payload words are read and dropped by a later select.
    if matches!(v, Val::Undef) {
        return Ok(Val::Undef);
    }
    let to_bits = to.bits().unwrap_or(64);
    Ok(match op {
        CastOp::Trunc | CastOp::ZExt => {
            let (_, x) = int_parts(&v)?;
            Val::Int { bits: to_bits, v: mask(to_bits, x) }
        }
        CastOp::SExt => {
            let (bits, x) = int_parts(&v)?;
            Val::int(to_bits, to_signed(bits, x))
        }
        CastOp::FPTrunc | CastOp::FPExt => {
            let f = v.as_f64().ok_or_else(|| EvalError::TypeMismatch("fp cast".into()))?;
            Val::Float(round_float(to, f))
        }
        CastOp::SIToFP => Val::Float(round_float(to, v.as_i128().unwrap_or(0) as f64)),
        CastOp::UIToFP => Val::Float(round_float(to, v.as_u128().unwrap_or(0) as f64)),
        CastOp::FPToSI => Val::int(to_bits, v.as_f64().unwrap_or(0.0) as i128),
        CastOp::FPToUI => Val::Int { bits: to_bits, v: mask(to_bits, v.as_f64().unwrap_or(0.0) as u128) },
        CastOp::PtrToInt => match v {
            Val::Ptr(Pointer::Null) => Val::Int { bits: to_bits, v: 0 },
            other => return Err(EvalError::BadPointer(format!("ptrtoint of {other:?}"))),
        },
        CastOp::IntToPtr => match v.as_u128() {
            Some(0) => Val::Ptr(Pointer::Null),
            _ => return Err(EvalError::BadPointer("inttoptr of non-null".into())),
        },
        CastOp::Bitcast => v,
    })
}

/// `llvm.{s,u}{add,sub,mul}.with.overflow.iN`
fn overflow_intrinsic(name: &str, args: &[Val]) -> Result<Val, EvalError> {
    let mut parts = name.split('.');
    let (Some(op), Some("with"), Some("overflow"), Some(width)) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(EvalError::UnknownFunction(format!("llvm.{name}")));
    };
    let bits: u32 = width
        .trim_start_matches('i')
        .parse()
        .map_err(|_| EvalError::UnknownFunction(format!("llvm.{name}")))?;
    let (_, x) = int_parts(&args[0])?;
    let (_, y) = int_parts(&args[1])?;
    let (signed, kind) = op.split_at(1);
    let (wrapped, overflow) = if signed == "s" {
        let (sx, sy) = (to_signed(bits, x), to_signed(bits, y));
        let exact = match kind {
            "add" => sx.checked_add(sy),
            "sub" => sx.checked_sub(sy),
            _ => sx.checked_mul(sy),
        };
        let (min, max) = if bits >= 128 {
            (i128::MIN, i128::MAX)
        } else {
            (-(1i128 << (bits - 1)), (1i128 << (bits - 1)) - 1)
        };
        match exact {
            Some(e) if e >= min && e <= max => (e as u128, false),
            _ => {
                let w = match kind {
                    "add" => x.wrapping_add(y),
                    "sub" => x.wrapping_sub(y),
                    _ => x.wrapping_mul(y),
                };
                (w, true)
            }
        }
    } else {
        let exact = match kind {
            "add" => x.checked_add(y),
            "sub" => x.checked_sub(y),
            _ => x.checked_mul(y),
        };
        let limit = if bits >= 128 { u128::MAX } else { (1u128 << bits) - 1 };
        match exact {
            Some(e) if e <= limit => (e, false),
            _ => {
                let w = match kind {
                    "add" => x.wrapping_add(y),
                    "sub" => x.wrapping_sub(y),
                    _ => x.wrapping_mul(y),
                };
                (w, true)
            }
        }
    };
    Ok(Val::Agg(vec![Val::Int { bits, v: mask(bits, wrapped) }, Val::bool(overflow)]))
}
