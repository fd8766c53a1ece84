pub mod lower;
pub mod runtime;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::ast::Expr;
use crate::config::LowerConfig;
use crate::coverage::CoverageLog;
use crate::diagnostics::{Diagnostic, LowerError};
use crate::ir::Module;
use crate::sema::{SemType, TypeEnv, TypeSubst, WhereConstraint};

use runtime::RuntimeRegistry;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamDef {
    pub name: String,
    pub ty: SemType,
}

/// A type-checked function body ready for lowering. Methods carry their
/// receiver as an explicit first parameter (`this`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDef {
    /// Qualified name, e.g. `main` or `Point::len`.
    pub name: String,
    #[serde(default)]
    pub params: Vec<ParamDef>,
    pub ret: SemType,
    pub body: Expr,
    /// Bindings for a monomorphized instance.
    #[serde(default)]
    pub type_subs: TypeSubst,
    #[serde(default)]
    pub where_constraints: Vec<WhereConstraint>,
    /// Type `Self` refers to inside an impl.
    #[serde(default)]
    pub impl_type: Option<SemType>,
}

impl FunctionDef {
    pub fn new(name: &str, ret: SemType, body: Expr) -> Self {
        Self {
            name: name.to_string(),
            params: Vec::new(),
            ret,
            body,
            type_subs: TypeSubst::new(),
            where_constraints: Vec::new(),
            impl_type: None,
        }
    }

    pub fn param(mut self, name: &str, ty: SemType) -> Self {
        self.params.push(ParamDef { name: name.to_string(), ty });
        self
    }

    pub fn bind(mut self, param: &str, ty: SemType) -> Self {
        self.type_subs.insert(param.to_string(), ty);
        self
    }

    pub fn bounded(mut self, constraint: WhereConstraint) -> Self {
        self.where_constraints.push(constraint);
        self
    }

    pub fn in_impl(mut self, self_ty: SemType) -> Self {
        self.impl_type = Some(self_ty);
        self
    }
}

/// Input of one lowering run: the checker's environment plus the bodies to
/// lower.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoweringUnit {
    #[serde(default)]
    pub env: TypeEnv,
    #[serde(default)]
    pub functions: Vec<FunctionDef>,
}

impl LoweringUnit {
    pub fn from_json(text: &str) -> Result<Self, LowerError> {
        serde_json::from_str(text).map_err(|e| LowerError::input(format!("invalid lowering unit: {e}")))
    }
}

#[derive(Debug)]
pub struct LoweringOutput {
    pub module: Module,
    pub diagnostics: Vec<Diagnostic>,
    pub coverage: CoverageLog,
}

impl LoweringOutput {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }
}

/// Lower every function of `unit` into one module. Recoverable problems are
/// collected as diagnostics; only internal failures abort.
pub fn lower_unit(unit: &LoweringUnit, config: &LowerConfig) -> Result<LoweringOutput, LowerError> {
    let runtime = RuntimeRegistry::new(&config.runtime);
    let mut module = Module::new();
    let mut coverage = CoverageLog::default();
    let mut diagnostics = Vec::new();

    for func in &unit.functions {
        let before = diagnostics.len();
        lower::lower_function(
            func,
            lower::Session {
                env: &unit.env,
                config,
                runtime: &runtime,
                module: &mut module,
                coverage: &mut coverage,
                diagnostics: &mut diagnostics,
            },
        )?;
        debug!(function = %func.name, diagnostics = diagnostics.len() - before, "function lowered");
    }

    info!(
        functions = module.functions.len(),
        diagnostics = diagnostics.len(),
        "lowering finished"
    );
    Ok(LoweringOutput { module, diagnostics, coverage })
}

/// Lower a single function against `env`.
pub fn lower_function(env: &TypeEnv, func: &FunctionDef, config: &LowerConfig) -> Result<LoweringOutput, LowerError> {
    let unit = LoweringUnit { env: env.clone(), functions: vec![func.clone()] };
    lower_unit(&unit, config)
}
