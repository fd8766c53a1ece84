use super::types::IsaType;
use super::value::{Label, Operand, Reg, TypedValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    SDiv,
    UDiv,
    SRem,
    URem,
    FAdd,
    FSub,
    FMul,
    FDiv,
    FRem,
    And,
    Or,
    Xor,
    Shl,
    LShr,
    AShr,
}

impl BinOp {
    pub fn mnemonic(self) -> &'static str {
        match self {
            BinOp::Add => "add",
            BinOp::Sub => "sub",
            BinOp::Mul => "mul",
            BinOp::SDiv => "sdiv",
            BinOp::UDiv => "udiv",
            BinOp::SRem => "srem",
            BinOp::URem => "urem",
            BinOp::FAdd => "fadd",
            BinOp::FSub => "fsub",
            BinOp::FMul => "fmul",
            BinOp::FDiv => "fdiv",
            BinOp::FRem => "frem",
            BinOp::And => "and",
            BinOp::Or => "or",
            BinOp::Xor => "xor",
            BinOp::Shl => "shl",
            BinOp::LShr => "lshr",
            BinOp::AShr => "ashr",
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, BinOp::FAdd | BinOp::FSub | BinOp::FMul | BinOp::FDiv | BinOp::FRem)
    }
}

/// No-wrap flags on `add`/`sub`/`mul`/`shl`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WrapFlags {
    pub nuw: bool,
    pub nsw: bool,
}

impl WrapFlags {
    pub const NONE: WrapFlags = WrapFlags { nuw: false, nsw: false };
    pub const NSW: WrapFlags = WrapFlags { nuw: false, nsw: true };
    pub const NUW: WrapFlags = WrapFlags { nuw: true, nsw: false };

    /// Flags for unchecked arithmetic at the given signedness.
    pub fn no_overflow(unsigned: bool) -> Self {
        if unsigned { Self::NUW } else { Self::NSW }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntPred {
    Eq,
    Ne,
    Slt,
    Sle,
    Sgt,
    Sge,
    Ult,
    Ule,
    Ugt,
    Uge,
}

impl IntPred {
    pub fn mnemonic(self) -> &'static str {
        match self {
            IntPred::Eq => "eq",
            IntPred::Ne => "ne",
            IntPred::Slt => "slt",
            IntPred::Sle => "sle",
            IntPred::Sgt => "sgt",
            IntPred::Sge => "sge",
            IntPred::Ult => "ult",
            IntPred::Ule => "ule",
            IntPred::Ugt => "ugt",
            IntPred::Uge => "uge",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FloatPred {
    Oeq,
    One,
    Olt,
    Ole,
    Ogt,
    Oge,
}

impl FloatPred {
    pub fn mnemonic(self) -> &'static str {
        match self {
            FloatPred::Oeq => "oeq",
            FloatPred::One => "one",
            FloatPred::Olt => "olt",
            FloatPred::Ole => "ole",
            FloatPred::Ogt => "ogt",
            FloatPred::Oge => "oge",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CastOp {
    Trunc,
    ZExt,
    SExt,
    FPTrunc,
    FPExt,
    SIToFP,
    UIToFP,
    FPToSI,
    FPToUI,
    PtrToInt,
    IntToPtr,
    Bitcast,
}

impl CastOp {
    pub fn mnemonic(self) -> &'static str {
        match self {
            CastOp::Trunc => "trunc",
            CastOp::ZExt => "zext",
            CastOp::SExt => "sext",
            CastOp::FPTrunc => "fptrunc",
            CastOp::FPExt => "fpext",
            CastOp::SIToFP => "sitofp",
            CastOp::UIToFP => "uitofp",
            CastOp::FPToSI => "fptosi",
            CastOp::FPToUI => "fptoui",
            CastOp::PtrToInt => "ptrtoint",
            CastOp::IntToPtr => "inttoptr",
            CastOp::Bitcast => "bitcast",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Inst {
    Binary {
        dst: Reg,
        op: BinOp,
        flags: WrapFlags,
        ty: IsaType,
        lhs: Operand,
        rhs: Operand,
    },
    ICmp {
        dst: Reg,
        pred: IntPred,
        ty: IsaType,
        lhs: Operand,
        rhs: Operand,
    },
    FCmp {
        dst: Reg,
        pred: FloatPred,
        ty: IsaType,
        lhs: Operand,
        rhs: Operand,
    },
    Select {
        dst: Reg,
        cond: Operand,
        ty: IsaType,
        then_val: Operand,
        else_val: Operand,
    },
    Cast {
        dst: Reg,
        op: CastOp,
        val: TypedValue,
        to: IsaType,
    },
    Alloca {
        dst: Reg,
        ty: IsaType,
    },
    Load {
        dst: Reg,
        ty: IsaType,
        ptr: Operand,
    },
    Store {
        val: TypedValue,
        ptr: Operand,
    },
    /// `getelementptr`. Indices are typed; the first steps over `base_ty`.
    Gep {
        dst: Reg,
        base_ty: IsaType,
        ptr: Operand,
        indices: Vec<TypedValue>,
        inbounds: bool,
    },
    ExtractValue {
        dst: Reg,
        agg: TypedValue,
        index: u32,
    },
    InsertValue {
        dst: Reg,
        agg: TypedValue,
        val: TypedValue,
        index: u32,
    },
    /// Direct call when `callee` is a global, indirect through a register
    /// otherwise. `dst` is None for void calls.
    Call {
        dst: Option<Reg>,
        ret: IsaType,
        callee: Operand,
        args: Vec<TypedValue>,
    },
    Phi {
        dst: Reg,
        ty: IsaType,
        incoming: Vec<(Operand, Label)>,
    },
    /// Instrumentation marker for an abstract operation. Produces no value.
    Coverage {
        op: String,
    },
}

impl Inst {
    pub fn dst(&self) -> Option<Reg> {
        match self {
            Inst::Binary { dst, .. }
            | Inst::ICmp { dst, .. }
            | Inst::FCmp { dst, .. }
            | Inst::Select { dst, .. }
            | Inst::Cast { dst, .. }
            | Inst::Alloca { dst, .. }
            | Inst::Load { dst, .. }
            | Inst::Gep { dst, .. }
            | Inst::ExtractValue { dst, .. }
            | Inst::InsertValue { dst, .. }
            | Inst::Phi { dst, .. } => Some(*dst),
            Inst::Call { dst, .. } => *dst,
            Inst::Store { .. } | Inst::Coverage { .. } => None,
        }
    }

    pub fn is_coverage(&self) -> bool {
        matches!(self, Inst::Coverage { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Terminator {
    Br(Label),
    CondBr {
        cond: Operand,
        then_label: Label,
        else_label: Label,
    },
    Ret(Option<TypedValue>),
    Unreachable,
}

impl Terminator {
    pub fn successors(&self) -> Vec<&Label> {
        match self {
            Terminator::Br(l) => vec![l],
            Terminator::CondBr { then_label, else_label, .. } => vec![then_label, else_label],
            Terminator::Ret(_) | Terminator::Unreachable => Vec::new(),
        }
    }
}
