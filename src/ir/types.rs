use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FloatKind {
    F32,
    F64,
}

impl FloatKind {
    pub fn bits(self) -> u32 {
        match self {
            FloatKind::F32 => 32,
            FloatKind::F64 => 64,
        }
    }
}

/// Instruction-set type of a value. Control flow in the lowering matches on
/// this, never on the printed form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IsaType {
    Void,
    /// `i1`
    Bool,
    /// Signedness is carried for instruction selection only; `i32` prints the
    /// same either way.
    Int { bits: u32, unsigned: bool },
    Float(FloatKind),
    Ptr,
    /// Named struct defined in the module (`%Name`).
    Struct(String),
    /// Anonymous struct `{ a, b }`.
    Tuple(Vec<IsaType>),
    Array(u64, Box<IsaType>),
    /// Callable fat pointer `{ ptr fn, ptr env }`.
    Closure,
}

impl IsaType {
    pub fn int(bits: u32) -> Self {
        IsaType::Int { bits, unsigned: false }
    }

    pub fn uint(bits: u32) -> Self {
        IsaType::Int { bits, unsigned: true }
    }

    pub fn i8() -> Self {
        Self::int(8)
    }

    pub fn i32() -> Self {
        Self::int(32)
    }

    pub fn i64() -> Self {
        Self::int(64)
    }

    pub fn f64() -> Self {
        IsaType::Float(FloatKind::F64)
    }

    pub fn f32() -> Self {
        IsaType::Float(FloatKind::F32)
    }

    pub fn is_int(&self) -> bool {
        matches!(self, IsaType::Int { .. })
    }

    /// Integers and `i1`.
    pub fn is_integral(&self) -> bool {
        matches!(self, IsaType::Int { .. } | IsaType::Bool)
    }

    pub fn is_float(&self) -> bool {
        matches!(self, IsaType::Float(_))
    }

    pub fn is_ptr(&self) -> bool {
        matches!(self, IsaType::Ptr)
    }

    pub fn is_void(&self) -> bool {
        matches!(self, IsaType::Void)
    }

    pub fn is_unsigned(&self) -> bool {
        matches!(self, IsaType::Int { unsigned: true, .. })
    }

    /// Struct-shaped values: anything loaded as a whole aggregate.
    pub fn is_aggregate(&self) -> bool {
        matches!(
            self,
            IsaType::Struct(_) | IsaType::Tuple(_) | IsaType::Array(..) | IsaType::Closure
        )
    }

    /// Width of an integral or float type. `i1` is 1.
    pub fn bits(&self) -> Option<u32> {
        match self {
            IsaType::Bool => Some(1),
            IsaType::Int { bits, .. } => Some(*bits),
            IsaType::Float(k) => Some(k.bits()),
            IsaType::Ptr => Some(64),
            _ => None,
        }
    }

    pub fn with_signedness(&self, unsigned: bool) -> Self {
        match self {
            IsaType::Int { bits, .. } => IsaType::Int { bits: *bits, unsigned },
            other => other.clone(),
        }
    }
}

impl fmt::Display for IsaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IsaType::Void => write!(f, "void"),
            IsaType::Bool => write!(f, "i1"),
            IsaType::Int { bits, .. } => write!(f, "i{bits}"),
            IsaType::Float(FloatKind::F32) => write!(f, "float"),
            IsaType::Float(FloatKind::F64) => write!(f, "double"),
            IsaType::Ptr => write!(f, "ptr"),
            IsaType::Struct(name) => write!(f, "%{name}"),
            IsaType::Tuple(elems) => {
                if elems.is_empty() {
                    return write!(f, "{{}}");
                }
                write!(f, "{{ ")?;
                for (i, e) in elems.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{e}")?;
                }
                write!(f, " }}")
            }
            IsaType::Array(len, elem) => write!(f, "[{len} x {elem}]"),
            IsaType::Closure => write!(f, "{{ ptr, ptr }}"),
        }
    }
}
