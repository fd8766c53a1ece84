//! Semantic types and the type-checker collaborator interface.

pub mod env;
pub mod types;

pub use env::{
    BehaviorDef, BehaviorMethod, BoundedBehavior, ClassDef, ClassMethod, EnumDef, FieldDef, FuncSig, SemaEnv,
    StructDef, TypeEnv, VariantDef, WhereConstraint,
};
pub use types::{mangle_name, PrimKind, SemType, TypeSubst};
