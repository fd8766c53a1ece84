use std::collections::HashMap;

use crate::config::RuntimeNames;
use crate::diagnostics::LowerError;
use crate::ir::IsaType;

/// Signature of one external runtime primitive.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeFn {
    pub symbol: String,
    pub params: Vec<IsaType>,
    pub ret: IsaType,
}

/// Registry of runtime functions the lowering may call, keyed by a stable
/// logical name. Symbols come from the `[runtime]` config section; a function
/// is declared in the output module the first time it is called.
pub struct RuntimeRegistry {
    fns: HashMap<&'static str, RuntimeFn>,
}

impl RuntimeRegistry {
    pub fn new(names: &RuntimeNames) -> Self {
        use IsaType::{Bool, Ptr, Void};
        let i32 = IsaType::i32();
        let i64 = IsaType::i64();

        let mut reg = RuntimeRegistry { fns: HashMap::new() };

        // Strings
        reg.declare("string_concat", &names.string_concat, &[Ptr, Ptr], Ptr);
        reg.declare("string_eq", &names.string_eq, &[Ptr, Ptr], i32); // i32 for C ABI
        reg.declare("string_len", &names.string_len, &[Ptr], i64.clone());
        reg.declare("int_to_string", &names.int_to_string, &[i64.clone()], Ptr);
        reg.declare("float_to_string", &names.float_to_string, &[IsaType::f64()], Ptr);
        reg.declare("bool_to_string", &names.bool_to_string, &[Bool], Ptr);

        // Growable lists. Elements travel as i64 slots.
        reg.declare("list_len", &names.list_len, &[Ptr], i64.clone());
        reg.declare("list_push", &names.list_push, &[Ptr, i64.clone()], Void);
        reg.declare("list_get", &names.list_get, &[Ptr, i64.clone()], i64.clone());
        reg.declare("list_pop", &names.list_pop, &[Ptr], i64.clone());
        reg.declare("list_clear", &names.list_clear, &[Ptr], Void);

        // File handles
        let file = |op: &str| format!("{}{op}", names.file_prefix);
        reg.declare("file_is_open", &file("is_open"), &[Ptr], Bool);
        reg.declare("file_read_line", &file("read_line"), &[Ptr], Ptr);
        reg.declare("file_write_str", &file("write_str"), &[Ptr, Ptr], Bool);
        reg.declare("file_size", &file("size"), &[Ptr], i64);
        reg.declare("file_close", &file("close"), &[Ptr], Void);
        reg.declare("file_flush", &file("flush"), &[Ptr], Bool);

        reg
    }

    fn declare(&mut self, key: &'static str, symbol: &str, params: &[IsaType], ret: IsaType) {
        self.fns.insert(
            key,
            RuntimeFn { symbol: symbol.to_string(), params: params.to_vec(), ret },
        );
    }

    pub fn get(&self, key: &str) -> Result<&RuntimeFn, LowerError> {
        self.fns
            .get(key)
            .ok_or_else(|| LowerError::internal(format!("runtime function '{key}' not registered")))
    }
}
