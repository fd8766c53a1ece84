use std::path::Path;

use serde::Deserialize;

use crate::diagnostics::LowerError;

/// What to do with `ptr + ptr` when neither side has a resolved semantic type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AmbiguousPointerAdd {
    /// Lower as string concatenation and warn.
    #[default]
    Concat,
    /// Report an error and produce a null placeholder.
    Reject,
}

/// Settings for one lowering session.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LowerConfig {
    pub lowering: LoweringSection,
    pub runtime: RuntimeNames,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoweringSection {
    pub coverage: bool,
    pub ambiguous_pointer_add: AmbiguousPointerAdd,
    /// Prepended to every user function symbol.
    pub symbol_prefix: String,
}

/// Names of the external runtime primitives the lowering calls.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeNames {
    pub string_concat: String,
    pub string_eq: String,
    pub string_len: String,
    pub int_to_string: String,
    pub float_to_string: String,
    pub bool_to_string: String,
    pub list_len: String,
    pub list_push: String,
    pub list_get: String,
    pub list_pop: String,
    pub list_clear: String,
    pub file_prefix: String,
}

impl Default for LoweringSection {
    fn default() -> Self {
        Self {
            coverage: true,
            ambiguous_pointer_add: AmbiguousPointerAdd::default(),
            symbol_prefix: "tml_".to_string(),
        }
    }
}

impl Default for RuntimeNames {
    fn default() -> Self {
        Self {
            string_concat: "str_concat_opt".to_string(),
            string_eq: "str_eq".to_string(),
            string_len: "str_len".to_string(),
            int_to_string: "i64_to_str".to_string(),
            float_to_string: "f64_to_str".to_string(),
            bool_to_string: "bool_to_str".to_string(),
            list_len: "list_len".to_string(),
            list_push: "list_push".to_string(),
            list_get: "list_get".to_string(),
            list_pop: "list_pop".to_string(),
            list_clear: "list_clear".to_string(),
            file_prefix: "file_".to_string(),
        }
    }
}

impl LowerConfig {
    pub fn from_toml_str(text: &str, path: &Path) -> Result<Self, LowerError> {
        toml::from_str(text).map_err(|e| LowerError::config(e.to_string(), path.to_path_buf()))
    }

    /// Load from a file, or defaults when `path` is None.
    pub fn load(path: Option<&Path>) -> Result<Self, LowerError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path).map_err(|e| {
            LowerError::config(format!("failed to read config: {e}"), path.to_path_buf())
        })?;
        Self::from_toml_str(&text, path)
    }

    /// Symbol for a user function, e.g. `tml_Point_len`.
    pub fn user_symbol(&self, name: &str) -> String {
        format!("{}{}", self.lowering.symbol_prefix, name)
    }
}
