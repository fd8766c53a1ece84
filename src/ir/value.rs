use std::fmt;

use super::types::IsaType;

/// Virtual register. Written exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Reg(pub u32);

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%t{}", self.0)
    }
}

/// Basic block label, `prefix.N`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Label(pub String);

impl Label {
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Reg(Reg),
    Int(i128),
    Float(f64),
    Bool(bool),
    Null,
    Undef,
    Zero,
    Global(String),
}

impl Operand {
    pub fn as_reg(&self) -> Option<Reg> {
        match self {
            Operand::Reg(r) => Some(*r),
            _ => None,
        }
    }

    pub fn is_const(&self) -> bool {
        !matches!(self, Operand::Reg(_))
    }
}

impl From<Reg> for Operand {
    fn from(r: Reg) -> Self {
        Operand::Reg(r)
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Reg(r) => write!(f, "{r}"),
            Operand::Int(v) => write!(f, "{v}"),
            Operand::Float(v) => {
                if v.is_finite() {
                    write!(f, "{v:?}")
                } else {
                    write!(f, "0x{:016X}", v.to_bits())
                }
            }
            Operand::Bool(b) => write!(f, "{b}"),
            Operand::Null => write!(f, "null"),
            Operand::Undef => write!(f, "undef"),
            Operand::Zero => write!(f, "zeroinitializer"),
            Operand::Global(name) => write!(f, "@{name}"),
        }
    }
}

/// Result of lowering one expression: where the value lives plus its type.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedValue {
    pub op: Operand,
    pub ty: IsaType,
}

impl TypedValue {
    pub fn new(op: impl Into<Operand>, ty: IsaType) -> Self {
        Self { op: op.into(), ty }
    }

    pub fn int(value: i128, ty: IsaType) -> Self {
        Self { op: Operand::Int(value), ty }
    }

    pub fn i32(value: i128) -> Self {
        Self::int(value, IsaType::i32())
    }

    pub fn i64(value: i128) -> Self {
        Self::int(value, IsaType::i64())
    }

    pub fn bool(value: bool) -> Self {
        Self { op: Operand::Bool(value), ty: IsaType::Bool }
    }

    pub fn null() -> Self {
        Self { op: Operand::Null, ty: IsaType::Ptr }
    }

    pub fn void() -> Self {
        Self { op: Operand::Undef, ty: IsaType::Void }
    }

    pub fn undef(ty: IsaType) -> Self {
        Self { op: Operand::Undef, ty }
    }

    pub fn zero(ty: IsaType) -> Self {
        Self { op: Operand::Zero, ty }
    }
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.ty, self.op)
    }
}
