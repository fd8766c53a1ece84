//! Textual form of the IR. Follows LLVM assembly closely enough for a
//! downstream backend to parse it.

use std::fmt::{self, Write};

use super::inst::{Inst, Terminator};
use super::{Block, Function, Module};

fn escape_bytes(s: &str) -> String {
    let mut out = String::new();
    for b in s.bytes() {
        if b == b'"' || b == b'\\' || !(0x20..0x7f).contains(&b) {
            let _ = write!(out, "\\{b:02X}");
        } else {
            out.push(b as char);
        }
    }
    out
}

impl fmt::Display for Inst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Inst::Binary { dst, op, flags, ty, lhs, rhs } => {
                write!(f, "{dst} = {}", op.mnemonic())?;
                if flags.nuw {
                    write!(f, " nuw")?;
                }
                if flags.nsw {
                    write!(f, " nsw")?;
                }
                write!(f, " {ty} {lhs}, {rhs}")
            }
            Inst::ICmp { dst, pred, ty, lhs, rhs } => {
                write!(f, "{dst} = icmp {} {ty} {lhs}, {rhs}", pred.mnemonic())
            }
            Inst::FCmp { dst, pred, ty, lhs, rhs } => {
                write!(f, "{dst} = fcmp {} {ty} {lhs}, {rhs}", pred.mnemonic())
            }
            Inst::Select { dst, cond, ty, then_val, else_val } => {
                write!(f, "{dst} = select i1 {cond}, {ty} {then_val}, {ty} {else_val}")
            }
            Inst::Cast { dst, op, val, to } => write!(f, "{dst} = {} {val} to {to}", op.mnemonic()),
            Inst::Alloca { dst, ty } => write!(f, "{dst} = alloca {ty}"),
            Inst::Load { dst, ty, ptr } => write!(f, "{dst} = load {ty}, ptr {ptr}"),
            Inst::Store { val, ptr } => write!(f, "store {val}, ptr {ptr}"),
            Inst::Gep { dst, base_ty, ptr, indices, inbounds } => {
                write!(f, "{dst} = getelementptr ")?;
                if *inbounds {
                    write!(f, "inbounds ")?;
                }
                write!(f, "{base_ty}, ptr {ptr}")?;
                for idx in indices {
                    write!(f, ", {idx}")?;
                }
                Ok(())
            }
            Inst::ExtractValue { dst, agg, index } => write!(f, "{dst} = extractvalue {agg}, {index}"),
            Inst::InsertValue { dst, agg, val, index } => {
                write!(f, "{dst} = insertvalue {agg}, {val}, {index}")
            }
            Inst::Call { dst, ret, callee, args } => {
                if let Some(dst) = dst {
                    write!(f, "{dst} = ")?;
                }
                write!(f, "call {ret} {callee}(")?;
                for (i, a) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{a}")?;
                }
                write!(f, ")")
            }
            Inst::Phi { dst, ty, incoming } => {
                write!(f, "{dst} = phi {ty} ")?;
                for (i, (val, label)) in incoming.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "[ {val}, %{label} ]")?;
                }
                Ok(())
            }
            Inst::Coverage { op } => write!(f, "; coverage: {op}"),
        }
    }
}

impl fmt::Display for Terminator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Terminator::Br(l) => write!(f, "br label %{l}"),
            Terminator::CondBr { cond, then_label, else_label } => {
                write!(f, "br i1 {cond}, label %{then_label}, label %{else_label}")
            }
            Terminator::Ret(Some(v)) => write!(f, "ret {v}"),
            Terminator::Ret(None) => write!(f, "ret void"),
            Terminator::Unreachable => write!(f, "unreachable"),
        }
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}:", self.label)?;
        for inst in &self.insts {
            writeln!(f, "  {inst}")?;
        }
        match &self.term {
            Some(t) => writeln!(f, "  {t}"),
            None => writeln!(f, "  unreachable"),
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "define {} @{}(", self.ret, self.name)?;
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{p}")?;
        }
        writeln!(f, ") {{")?;
        for block in &self.blocks {
            write!(f, "{block}")?;
        }
        writeln!(f, "}}")
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first_section = true;
        let mut section = |f: &mut fmt::Formatter<'_>| -> fmt::Result {
            if !first_section {
                writeln!(f)?;
            }
            first_section = false;
            Ok(())
        };

        if !self.type_defs().is_empty() {
            section(f)?;
            for (name, fields) in self.type_defs() {
                let body: Vec<String> = fields.iter().map(|t| t.to_string()).collect();
                writeln!(f, "%{name} = type {{ {} }}", body.join(", "))?;
            }
        }
        if !self.strings().is_empty() {
            section(f)?;
            for (name, content) in self.strings() {
                writeln!(
                    f,
                    "@{name} = private unnamed_addr constant [{} x i8] c\"{}\\00\"",
                    content.len() + 1,
                    escape_bytes(content)
                )?;
            }
        }
        if !self.externs().is_empty() {
            section(f)?;
            for (name, decl) in self.externs() {
                let params: Vec<String> = decl.params.iter().map(|t| t.to_string()).collect();
                writeln!(f, "declare {} @{name}({})", decl.ret, params.join(", "))?;
            }
        }
        for func in &self.functions {
            section(f)?;
            write!(f, "{func}")?;
        }
        Ok(())
    }
}
