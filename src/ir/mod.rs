//! Register/basic-block SSA form emitted by the lowering, printed as LLVM-style
//! text.

pub mod builder;
pub mod display;
pub mod eval;
pub mod inst;
pub mod types;
pub mod value;

use std::collections::BTreeMap;

pub use builder::{Block, FunctionBuilder};
pub use inst::{BinOp, CastOp, FloatPred, Inst, IntPred, Terminator, WrapFlags};
pub use types::{FloatKind, IsaType};
pub use value::{Label, Operand, Reg, TypedValue};

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: String,
    pub params: Vec<TypedValue>,
    pub ret: IsaType,
    pub blocks: Vec<Block>,
}

impl Function {
    pub fn instructions(&self) -> impl Iterator<Item = &Inst> {
        self.blocks.iter().flat_map(|b| b.insts.iter())
    }

    pub fn block(&self, label: &str) -> Option<&Block> {
        self.blocks.iter().find(|b| b.label.name() == label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternDecl {
    pub ret: IsaType,
    pub params: Vec<IsaType>,
}

/// One compilation unit: named struct layouts, string constants, external
/// declarations and lowered functions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Module {
    type_defs: Vec<(String, Vec<IsaType>)>,
    strings: Vec<(String, String)>,
    externs: BTreeMap<String, ExternDecl>,
    pub functions: Vec<Function>,
}

impl Module {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define a named struct once; later definitions of the same name are
    /// ignored.
    pub fn define_type(&mut self, name: &str, fields: Vec<IsaType>) {
        if self.struct_fields(name).is_none() {
            self.type_defs.push((name.to_string(), fields));
        }
    }

    pub fn struct_fields(&self, name: &str) -> Option<&[IsaType]> {
        self.type_defs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, f)| f.as_slice())
    }

    pub fn type_defs(&self) -> &[(String, Vec<IsaType>)] {
        &self.type_defs
    }

    /// Type of field `index` of an aggregate, resolving named structs.
    pub fn field_type(&self, ty: &IsaType, index: u32) -> Option<IsaType> {
        match ty {
            IsaType::Struct(name) => self.struct_fields(name)?.get(index as usize).cloned(),
            IsaType::Tuple(elems) => elems.get(index as usize).cloned(),
            IsaType::Array(len, elem) => (u64::from(index) < *len).then(|| (**elem).clone()),
            IsaType::Closure => (index < 2).then_some(IsaType::Ptr),
            _ => None,
        }
    }

    /// Size in 8-byte words, rounding every scalar up to one word.
    pub fn size_words(&self, ty: &IsaType) -> u64 {
        match ty {
            IsaType::Void => 0,
            IsaType::Bool | IsaType::Int { .. } | IsaType::Float(_) | IsaType::Ptr => {
                ty.bits().map_or(1, |b| u64::from(b).div_ceil(64).max(1))
            }
            IsaType::Struct(name) => self
                .struct_fields(name)
                .map_or(1, |fields| fields.iter().map(|f| self.size_words(f)).sum()),
            IsaType::Tuple(elems) => elems.iter().map(|e| self.size_words(e)).sum(),
            IsaType::Array(len, elem) => len * self.size_words(elem),
            IsaType::Closure => 2,
        }
    }

    /// Intern a string constant; returns the global name.
    pub fn intern_string(&mut self, content: &str) -> String {
        if let Some((name, _)) = self.strings.iter().find(|(_, c)| c == content) {
            return name.clone();
        }
        let name = format!("str.{}", self.strings.len());
        self.strings.push((name.clone(), content.to_string()));
        name
    }

    pub fn strings(&self) -> &[(String, String)] {
        &self.strings
    }

    pub fn string_constant(&self, global: &str) -> Option<&str> {
        self.strings
            .iter()
            .find(|(n, _)| n == global)
            .map(|(_, c)| c.as_str())
    }

    pub fn declare_extern(&mut self, name: &str, ret: IsaType, params: Vec<IsaType>) {
        self.externs
            .entry(name.to_string())
            .or_insert(ExternDecl { ret, params });
    }

    pub fn externs(&self) -> &BTreeMap<String, ExternDecl> {
        &self.externs
    }

    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == name)
    }
}
