use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrimKind {
    I8,
    I16,
    I32,
    I64,
    I128,
    U8,
    U16,
    U32,
    U64,
    U128,
    F32,
    F64,
    Bool,
    Char,
    Str,
    Unit,
    Never,
}

impl PrimKind {
    pub fn name(self) -> &'static str {
        match self {
            PrimKind::I8 => "I8",
            PrimKind::I16 => "I16",
            PrimKind::I32 => "I32",
            PrimKind::I64 => "I64",
            PrimKind::I128 => "I128",
            PrimKind::U8 => "U8",
            PrimKind::U16 => "U16",
            PrimKind::U32 => "U32",
            PrimKind::U64 => "U64",
            PrimKind::U128 => "U128",
            PrimKind::F32 => "F32",
            PrimKind::F64 => "F64",
            PrimKind::Bool => "Bool",
            PrimKind::Char => "Char",
            PrimKind::Str => "Str",
            PrimKind::Unit => "Unit",
            PrimKind::Never => "Never",
        }
    }

    pub fn from_name(name: &str) -> Option<PrimKind> {
        Some(match name {
            "I8" => PrimKind::I8,
            "I16" => PrimKind::I16,
            "I32" => PrimKind::I32,
            "I64" => PrimKind::I64,
            "I128" => PrimKind::I128,
            "U8" => PrimKind::U8,
            "U16" => PrimKind::U16,
            "U32" => PrimKind::U32,
            "U64" => PrimKind::U64,
            "U128" => PrimKind::U128,
            "F32" => PrimKind::F32,
            "F64" => PrimKind::F64,
            "Bool" => PrimKind::Bool,
            "Char" => PrimKind::Char,
            "Str" => PrimKind::Str,
            "Unit" => PrimKind::Unit,
            "Never" => PrimKind::Never,
            _ => return None,
        })
    }

    pub fn is_signed_int(self) -> bool {
        matches!(self, PrimKind::I8 | PrimKind::I16 | PrimKind::I32 | PrimKind::I64 | PrimKind::I128)
    }

    pub fn is_unsigned(self) -> bool {
        matches!(
            self,
            PrimKind::U8 | PrimKind::U16 | PrimKind::U32 | PrimKind::U64 | PrimKind::U128 | PrimKind::Char
        )
    }

    pub fn is_integer(self) -> bool {
        self.is_signed_int() || self.is_unsigned()
    }

    pub fn is_float(self) -> bool {
        matches!(self, PrimKind::F32 | PrimKind::F64)
    }

    pub fn is_numeric(self) -> bool {
        self.is_integer() || self.is_float()
    }

    /// Width of integer and float kinds.
    pub fn bits(self) -> Option<u32> {
        Some(match self {
            PrimKind::I8 | PrimKind::U8 => 8,
            PrimKind::I16 | PrimKind::U16 => 16,
            PrimKind::I32 | PrimKind::U32 | PrimKind::F32 | PrimKind::Char => 32,
            PrimKind::I64 | PrimKind::U64 | PrimKind::F64 => 64,
            PrimKind::I128 | PrimKind::U128 => 128,
            PrimKind::Bool => 1,
            PrimKind::Str | PrimKind::Unit | PrimKind::Never => return None,
        })
    }
}

/// Type-checker view of an expression. Read-only to the lowering.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SemType {
    Primitive(PrimKind),
    Named {
        name: String,
        #[serde(default)]
        module: String,
        #[serde(default)]
        type_args: Vec<SemType>,
    },
    Ptr {
        mutable: bool,
        inner: Box<SemType>,
    },
    Ref {
        mutable: bool,
        inner: Box<SemType>,
    },
    Closure {
        params: Vec<SemType>,
        ret: Box<SemType>,
        /// Names of captured variables. Empty means the closure is thin.
        #[serde(default)]
        captures: Vec<String>,
    },
    Func {
        params: Vec<SemType>,
        ret: Box<SemType>,
    },
    Tuple(Vec<SemType>),
    Array {
        elem: Box<SemType>,
        len: u64,
    },
    Slice(Box<SemType>),
    Dyn(String),
    /// Unsubstituted type parameter.
    Generic(String),
}

pub type TypeSubst = BTreeMap<String, SemType>;

impl SemType {
    pub fn prim(kind: PrimKind) -> Self {
        SemType::Primitive(kind)
    }

    pub fn i32() -> Self {
        SemType::Primitive(PrimKind::I32)
    }

    pub fn i64() -> Self {
        SemType::Primitive(PrimKind::I64)
    }

    pub fn f64() -> Self {
        SemType::Primitive(PrimKind::F64)
    }

    pub fn bool() -> Self {
        SemType::Primitive(PrimKind::Bool)
    }

    pub fn str() -> Self {
        SemType::Primitive(PrimKind::Str)
    }

    pub fn unit() -> Self {
        SemType::Primitive(PrimKind::Unit)
    }

    pub fn named(name: &str, type_args: Vec<SemType>) -> Self {
        SemType::Named { name: name.to_string(), module: String::new(), type_args }
    }

    pub fn maybe(inner: SemType) -> Self {
        Self::named("Maybe", vec![inner])
    }

    pub fn outcome(ok: SemType, err: SemType) -> Self {
        Self::named("Outcome", vec![ok, err])
    }

    pub fn ptr(inner: SemType) -> Self {
        SemType::Ptr { mutable: false, inner: Box::new(inner) }
    }

    pub fn prim_kind(&self) -> Option<PrimKind> {
        match self {
            SemType::Primitive(k) => Some(*k),
            _ => None,
        }
    }

    pub fn is_primitive(&self) -> bool {
        matches!(self, SemType::Primitive(_))
    }

    pub fn is_unsigned(&self) -> bool {
        self.prim_kind().is_some_and(PrimKind::is_unsigned)
    }

    pub fn is_float(&self) -> bool {
        self.prim_kind().is_some_and(PrimKind::is_float)
    }

    pub fn is_integer(&self) -> bool {
        self.prim_kind().is_some_and(PrimKind::is_integer)
    }

    pub fn is_str(&self) -> bool {
        self.prim_kind() == Some(PrimKind::Str)
    }

    pub fn is_named(&self, base: &str) -> bool {
        matches!(self, SemType::Named { name, .. } if name == base)
    }

    pub fn type_args(&self) -> &[SemType] {
        match self {
            SemType::Named { type_args, .. } => type_args,
            _ => &[],
        }
    }

    /// `ref T` and `mut ref T` peel to `T`.
    pub fn strip_refs(&self) -> &SemType {
        match self {
            SemType::Ref { inner, .. } => inner.strip_refs(),
            other => other,
        }
    }

    /// Name a receiver of this type is dispatched under: `I32`, `Point`,
    /// `Maybe`.
    pub fn type_name(&self) -> Option<String> {
        match self.strip_refs() {
            SemType::Primitive(k) => Some(k.name().to_string()),
            SemType::Named { name, .. } => Some(name.clone()),
            SemType::Generic(name) => Some(name.clone()),
            _ => None,
        }
    }

    /// Fragment used to build mangled instance names, e.g. `Maybe__I32`.
    pub fn mangle_fragment(&self) -> String {
        match self {
            SemType::Primitive(k) => k.name().to_string(),
            SemType::Named { name, type_args, .. } => mangle_name(name, type_args),
            SemType::Ptr { inner, .. } => format!("Ptr_{}", inner.mangle_fragment()),
            SemType::Ref { inner, .. } => format!("Ref_{}", inner.mangle_fragment()),
            SemType::Tuple(elems) => {
                let parts: Vec<String> = elems.iter().map(|e| e.mangle_fragment()).collect();
                format!("Tup_{}", parts.join("_"))
            }
            SemType::Array { elem, len } => format!("Arr{len}_{}", elem.mangle_fragment()),
            SemType::Slice(elem) => format!("Slice_{}", elem.mangle_fragment()),
            SemType::Dyn(b) => format!("Dyn_{b}"),
            SemType::Closure { .. } | SemType::Func { .. } => "Fn".to_string(),
            SemType::Generic(name) => name.clone(),
        }
    }

    /// Recursively transform all inner types via `f`, rebuilding the structure.
    pub fn map_inner_types(&self, f: &impl Fn(&SemType) -> SemType) -> SemType {
        match self {
            SemType::Named { name, module, type_args } => SemType::Named {
                name: name.clone(),
                module: module.clone(),
                type_args: type_args.iter().map(f).collect(),
            },
            SemType::Ptr { mutable, inner } => SemType::Ptr { mutable: *mutable, inner: Box::new(f(inner)) },
            SemType::Ref { mutable, inner } => SemType::Ref { mutable: *mutable, inner: Box::new(f(inner)) },
            SemType::Closure { params, ret, captures } => SemType::Closure {
                params: params.iter().map(f).collect(),
                ret: Box::new(f(ret)),
                captures: captures.clone(),
            },
            SemType::Func { params, ret } => SemType::Func {
                params: params.iter().map(f).collect(),
                ret: Box::new(f(ret)),
            },
            SemType::Tuple(elems) => SemType::Tuple(elems.iter().map(f).collect()),
            SemType::Array { elem, len } => SemType::Array { elem: Box::new(f(elem)), len: *len },
            SemType::Slice(elem) => SemType::Slice(Box::new(f(elem))),
            SemType::Primitive(_) | SemType::Dyn(_) | SemType::Generic(_) => self.clone(),
        }
    }

    /// Replace type parameters (and `Self`) bound in `subs`. A bare `Named`
    /// without arguments whose name is bound is treated as a parameter too,
    /// since the checker may report `T` either way.
    pub fn substitute(&self, subs: &TypeSubst) -> SemType {
        if subs.is_empty() {
            return self.clone();
        }
        match self {
            SemType::Generic(name) => subs.get(name).cloned().unwrap_or_else(|| self.clone()),
            SemType::Named { name, type_args, .. } if type_args.is_empty() && subs.contains_key(name) => {
                subs[name].clone()
            }
            _ => self.map_inner_types(&|t| t.substitute(subs)),
        }
    }
}

pub fn mangle_name(base: &str, args: &[SemType]) -> String {
    let mut out = base.to_string();
    for a in args {
        out.push_str("__");
        out.push_str(&a.mangle_fragment());
    }
    out
}

impl fmt::Display for PrimKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[SemType]) -> fmt::Result {
    for (i, t) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{t}")?;
    }
    Ok(())
}

impl fmt::Display for SemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SemType::Primitive(k) => write!(f, "{k}"),
            SemType::Named { name, type_args, .. } => {
                write!(f, "{name}")?;
                if !type_args.is_empty() {
                    write!(f, "[")?;
                    write_list(f, type_args)?;
                    write!(f, "]")?;
                }
                Ok(())
            }
            SemType::Ptr { mutable: true, inner } => write!(f, "*mut {inner}"),
            SemType::Ptr { mutable: false, inner } => write!(f, "*{inner}"),
            SemType::Ref { mutable: true, inner } => write!(f, "mut ref {inner}"),
            SemType::Ref { mutable: false, inner } => write!(f, "ref {inner}"),
            SemType::Closure { params, ret, .. } | SemType::Func { params, ret } => {
                write!(f, "func(")?;
                write_list(f, params)?;
                write!(f, ") -> {ret}")
            }
            SemType::Tuple(elems) => {
                write!(f, "(")?;
                write_list(f, elems)?;
                write!(f, ")")
            }
            SemType::Array { elem, len } => write!(f, "[{elem}; {len}]"),
            SemType::Slice(elem) => write!(f, "[{elem}]"),
            SemType::Dyn(b) => write!(f, "dyn {b}"),
            SemType::Generic(name) => write!(f, "{name}"),
        }
    }
}
