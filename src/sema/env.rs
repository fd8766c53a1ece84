//! Collaborator interface the lowering consults for names it does not own:
//! function signatures, behaviors, struct/enum/class layouts, aliases and
//! instance mangling. `TypeEnv` is the JSON-loadable implementation the CLI
//! and tests use.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::types::{mangle_name, SemType};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuncSig {
    pub params: Vec<SemType>,
    pub ret: SemType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehaviorMethod {
    pub name: String,
    /// Parameters after the receiver.
    #[serde(default)]
    pub params: Vec<SemType>,
    pub ret: SemType,
    #[serde(default)]
    pub has_default: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehaviorDef {
    pub name: String,
    #[serde(default)]
    pub type_params: Vec<String>,
    #[serde(default)]
    pub methods: Vec<BehaviorMethod>,
}

impl BehaviorDef {
    pub fn method(&self, name: &str) -> Option<&BehaviorMethod> {
        self.methods.iter().find(|m| m.name == name)
    }

    /// Vtable slot of a method in `dyn` objects.
    pub fn slot_of(&self, name: &str) -> Option<u32> {
        self.methods.iter().position(|m| m.name == name).map(|i| i as u32)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    pub ty: SemType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructDef {
    pub name: String,
    #[serde(default)]
    pub type_params: Vec<String>,
    #[serde(default)]
    pub fields: Vec<FieldDef>,
}

impl StructDef {
    pub fn field(&self, name: &str) -> Option<(u32, &FieldDef)> {
        self.fields
            .iter()
            .enumerate()
            .find(|(_, f)| f.name == name)
            .map(|(i, f)| (i as u32, f))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantDef {
    pub name: String,
    #[serde(default)]
    pub payload: Option<SemType>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumDef {
    pub name: String,
    #[serde(default)]
    pub type_params: Vec<String>,
    pub variants: Vec<VariantDef>,
}

impl EnumDef {
    pub fn tag_of(&self, variant: &str) -> Option<u32> {
        self.variants.iter().position(|v| v.name == variant).map(|i| i as u32)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassMethod {
    pub name: String,
    #[serde(default)]
    pub params: Vec<SemType>,
    pub ret: SemType,
    /// Present for virtual methods: index into the class vtable.
    #[serde(default)]
    pub vtable_slot: Option<u32>,
}

/// Class instances are pointers to `{ ptr vtable, fields... }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassDef {
    pub name: String,
    #[serde(default)]
    pub extends: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldDef>,
    #[serde(default)]
    pub methods: Vec<ClassMethod>,
}

impl ClassDef {
    pub fn method(&self, name: &str) -> Option<&ClassMethod> {
        self.methods.iter().find(|m| m.name == name)
    }
}

/// A behavior bound with its own type arguments, e.g. `Into[I64]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundedBehavior {
    pub name: String,
    #[serde(default)]
    pub type_args: Vec<SemType>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhereConstraint {
    pub type_param: String,
    #[serde(default)]
    pub behaviors: Vec<String>,
    #[serde(default)]
    pub parameterized: Vec<BoundedBehavior>,
}

impl WhereConstraint {
    /// Plain bounds first, then parameterized ones with their arguments.
    pub fn bounds(&self) -> Vec<(&str, &[SemType])> {
        let mut out: Vec<(&str, &[SemType])> = self.behaviors.iter().map(|b| (b.as_str(), &[][..])).collect();
        out.extend(self.parameterized.iter().map(|p| (p.name.as_str(), p.type_args.as_slice())));
        out
    }
}

pub trait SemaEnv {
    /// Function in the module being compiled, by qualified name
    /// (`Point::len` or `helper`).
    fn lookup_func(&self, qualified: &str) -> Option<&FuncSig>;
    /// Function exported by another module.
    fn lookup_module_func(&self, qualified: &str) -> Option<&FuncSig>;
    fn lookup_behavior(&self, name: &str) -> Option<&BehaviorDef>;
    fn lookup_struct(&self, name: &str) -> Option<&StructDef>;
    fn lookup_enum(&self, name: &str) -> Option<&EnumDef>;
    fn lookup_class(&self, name: &str) -> Option<&ClassDef>;
    fn resolve_alias(&self, name: &str) -> Option<&SemType>;
    /// Behaviors a type is declared to implement.
    fn impls_of(&self, type_name: &str) -> &[String];
    /// Instantiate a generic struct or union and return its canonical name.
    fn mangle_instance(&self, base: &str, type_args: &[SemType]) -> String {
        mangle_name(base, type_args)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TypeEnv {
    pub functions: BTreeMap<String, FuncSig>,
    pub module_functions: BTreeMap<String, FuncSig>,
    pub behaviors: BTreeMap<String, BehaviorDef>,
    pub structs: BTreeMap<String, StructDef>,
    pub enums: BTreeMap<String, EnumDef>,
    pub classes: BTreeMap<String, ClassDef>,
    pub aliases: BTreeMap<String, SemType>,
    pub impls: BTreeMap<String, Vec<String>>,
}

impl TypeEnv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_func(&mut self, name: &str, params: Vec<SemType>, ret: SemType) -> &mut Self {
        self.functions.insert(name.to_string(), FuncSig { params, ret });
        self
    }

    pub fn add_module_func(&mut self, name: &str, params: Vec<SemType>, ret: SemType) -> &mut Self {
        self.module_functions.insert(name.to_string(), FuncSig { params, ret });
        self
    }

    pub fn add_behavior(&mut self, def: BehaviorDef) -> &mut Self {
        self.behaviors.insert(def.name.clone(), def);
        self
    }

    pub fn add_struct(&mut self, def: StructDef) -> &mut Self {
        self.structs.insert(def.name.clone(), def);
        self
    }

    pub fn add_enum(&mut self, def: EnumDef) -> &mut Self {
        self.enums.insert(def.name.clone(), def);
        self
    }

    pub fn add_class(&mut self, def: ClassDef) -> &mut Self {
        self.classes.insert(def.name.clone(), def);
        self
    }

    pub fn add_impl(&mut self, type_name: &str, behavior: &str) -> &mut Self {
        self.impls
            .entry(type_name.to_string())
            .or_default()
            .push(behavior.to_string());
        self
    }
}

impl SemaEnv for TypeEnv {
    fn lookup_func(&self, qualified: &str) -> Option<&FuncSig> {
        self.functions.get(qualified)
    }

    fn lookup_module_func(&self, qualified: &str) -> Option<&FuncSig> {
        self.module_functions.get(qualified)
    }

    fn lookup_behavior(&self, name: &str) -> Option<&BehaviorDef> {
        self.behaviors.get(name)
    }

    fn lookup_struct(&self, name: &str) -> Option<&StructDef> {
        self.structs.get(name)
    }

    fn lookup_enum(&self, name: &str) -> Option<&EnumDef> {
        self.enums.get(name)
    }

    fn lookup_class(&self, name: &str) -> Option<&ClassDef> {
        self.classes.get(name)
    }

    fn resolve_alias(&self, name: &str) -> Option<&SemType> {
        self.aliases.get(name)
    }

    fn impls_of(&self, type_name: &str) -> &[String] {
        self.impls.get(type_name).map(Vec::as_slice).unwrap_or(&[])
    }
}
