pub mod span;
pub mod diagnostics;
pub mod config;
pub mod coverage;
pub mod ir;
pub mod sema;
pub mod ast;
pub mod codegen;

pub use codegen::{lower_function, lower_unit, FunctionDef, LoweringOutput, LoweringUnit, ParamDef};
pub use config::LowerConfig;
pub use diagnostics::{Diagnostic, ErrorCode, LowerError};

use std::path::Path;

/// Read a JSON lowering unit from disk and lower it.
pub fn lower_file(path: &Path, config: &LowerConfig) -> Result<LoweringOutput, LowerError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| LowerError::input(format!("failed to read {}: {e}", path.display())))?;
    let unit = LoweringUnit::from_json(&text)?;
    lower_unit(&unit, config)
}
