//! Coverage markers for abstract operations.
//!
//! Every operator and intrinsic the lowering emits is tagged with the name of
//! the abstract operation it implements (`Add::add`, `Maybe::map`, ...). The
//! marker is an instrumentation hook only: it never changes the value an
//! expression produces. The log counts markers per name so a report can show
//! which operations a compilation unit exercises.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Marker counts keyed by abstract operation name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoverageLog {
    pub hits: BTreeMap<String, u32>,
}

impl CoverageLog {
    pub fn record(&mut self, op: &str) {
        *self.hits.entry(op.to_string()).or_insert(0) += 1;
    }

    pub fn count(&self, op: &str) -> u32 {
        self.hits.get(op).copied().unwrap_or(0)
    }

    pub fn merge(&mut self, other: &CoverageLog) {
        for (op, n) in &other.hits {
            *self.hits.entry(op.clone()).or_insert(0) += n;
        }
    }

    pub fn to_json(&self) -> String {
        // BTreeMap<String, u32> cannot fail to serialize.
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    pub fn write_json(&self, path: &Path) -> std::io::Result<()> {
        std::fs::write(path, self.to_json())
    }

    pub fn read_json(path: &Path) -> std::io::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json).map_err(std::io::Error::other)
    }
}
