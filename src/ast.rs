//! Type-checked expression tree consumed by the lowering.
//!
//! Every node may carry the semantic type the checker inferred for it. The
//! lowering reads these types and never mutates the tree.

use serde::{Deserialize, Serialize};

use crate::sema::{PrimKind, SemType};
use crate::span::{Span, Spanned};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}

impl BinaryOp {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
        )
    }

    pub fn is_ordering(self) -> bool {
        matches!(self, BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge)
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Neg,
    Not,
    BitNot,
    Deref,
    Ref { mutable: bool },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosureParam {
    pub name: String,
    #[serde(default)]
    pub ty: Option<SemType>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stmt {
    Let {
        name: String,
        #[serde(default)]
        ty: Option<SemType>,
        value: Expr,
    },
    Expr(Expr),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExprKind {
    Int {
        value: i128,
        #[serde(default)]
        suffix: Option<PrimKind>,
    },
    Float {
        value: f64,
        #[serde(default)]
        suffix: Option<PrimKind>,
    },
    Bool(bool),
    Str(String),
    Null,
    Unit,
    Ident(String),
    /// A type used as a receiver, e.g. `Point` in `Point::new(1, 2)`.
    TypePath {
        name: String,
        #[serde(default)]
        type_args: Vec<SemType>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Assign {
        target: Box<Expr>,
        value: Box<Expr>,
    },
    CompoundAssign {
        op: BinaryOp,
        target: Box<Expr>,
        value: Box<Expr>,
    },
    Field {
        object: Box<Expr>,
        field: String,
    },
    MethodCall {
        receiver: Box<Expr>,
        method: Spanned<String>,
        #[serde(default)]
        args: Vec<Expr>,
    },
    Call {
        callee: Box<Expr>,
        #[serde(default)]
        args: Vec<Expr>,
    },
    Closure {
        params: Vec<ClosureParam>,
        body: Box<Expr>,
        #[serde(default)]
        captures: Vec<String>,
        #[serde(default)]
        ret: Option<SemType>,
    },
    Tuple(Vec<Expr>),
    Array(Vec<Expr>),
    Block {
        #[serde(default)]
        stmts: Vec<Stmt>,
        #[serde(default)]
        tail: Option<Box<Expr>>,
    },
    If {
        cond: Box<Expr>,
        then_branch: Box<Expr>,
        #[serde(default)]
        else_branch: Option<Box<Expr>>,
    },
    Return(Option<Box<Expr>>),
    /// `Just(x)`, `Nothing`, `Ok(x)`, `Err(e)`, `Ordering::Less`,
    /// `Color::Red`.
    Variant {
        enum_name: String,
        variant: String,
        #[serde(default)]
        payload: Option<Box<Expr>>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    pub kind: ExprKind,
    #[serde(default)]
    pub span: Span,
    /// Type inferred by the checker, if it resolved one.
    #[serde(default)]
    pub ty: Option<SemType>,
}

impl Expr {
    pub fn new(kind: ExprKind) -> Self {
        Self { kind, span: Span::dummy(), ty: None }
    }

    pub fn with_ty(mut self, ty: SemType) -> Self {
        self.ty = Some(ty);
        self
    }

    pub fn at(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn int(value: i128) -> Self {
        Self::new(ExprKind::Int { value, suffix: None })
    }

    /// Integer literal with a type suffix, typed accordingly (`3_i32`).
    pub fn int_of(value: i128, kind: PrimKind) -> Self {
        Self::new(ExprKind::Int { value, suffix: Some(kind) }).with_ty(SemType::prim(kind))
    }

    pub fn float(value: f64) -> Self {
        Self::new(ExprKind::Float { value, suffix: None })
    }

    pub fn float_of(value: f64, kind: PrimKind) -> Self {
        Self::new(ExprKind::Float { value, suffix: Some(kind) }).with_ty(SemType::prim(kind))
    }

    pub fn bool(value: bool) -> Self {
        Self::new(ExprKind::Bool(value)).with_ty(SemType::bool())
    }

    pub fn str(value: &str) -> Self {
        Self::new(ExprKind::Str(value.to_string())).with_ty(SemType::str())
    }

    pub fn ident(name: &str) -> Self {
        Self::new(ExprKind::Ident(name.to_string()))
    }

    pub fn type_path(name: &str) -> Self {
        Self::new(ExprKind::TypePath { name: name.to_string(), type_args: Vec::new() })
    }

    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Self {
        Self::new(ExprKind::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) })
    }

    pub fn unary(op: UnaryOp, operand: Expr) -> Self {
        Self::new(ExprKind::Unary { op, operand: Box::new(operand) })
    }

    pub fn assign(target: Expr, value: Expr) -> Self {
        Self::new(ExprKind::Assign { target: Box::new(target), value: Box::new(value) })
    }

    pub fn compound_assign(op: BinaryOp, target: Expr, value: Expr) -> Self {
        Self::new(ExprKind::CompoundAssign { op, target: Box::new(target), value: Box::new(value) })
    }

    pub fn field(object: Expr, field: &str) -> Self {
        Self::new(ExprKind::Field { object: Box::new(object), field: field.to_string() })
    }

    pub fn method(receiver: Expr, method: &str, args: Vec<Expr>) -> Self {
        Self::new(ExprKind::MethodCall {
            receiver: Box::new(receiver),
            method: Spanned::dummy(method.to_string()),
            args,
        })
    }

    pub fn call(callee: Expr, args: Vec<Expr>) -> Self {
        Self::new(ExprKind::Call { callee: Box::new(callee), args })
    }

    /// `do(x) body` with typed parameters and no captures.
    pub fn lambda(params: &[(&str, SemType)], body: Expr) -> Self {
        Self::new(ExprKind::Closure {
            params: params
                .iter()
                .map(|(name, ty)| ClosureParam { name: name.to_string(), ty: Some(ty.clone()) })
                .collect(),
            body: Box::new(body),
            captures: Vec::new(),
            ret: None,
        })
    }

    pub fn tuple(elems: Vec<Expr>) -> Self {
        Self::new(ExprKind::Tuple(elems))
    }

    pub fn block(stmts: Vec<Stmt>, tail: Option<Expr>) -> Self {
        Self::new(ExprKind::Block { stmts, tail: tail.map(Box::new) })
    }

    pub fn if_else(cond: Expr, then_branch: Expr, else_branch: Option<Expr>) -> Self {
        Self::new(ExprKind::If {
            cond: Box::new(cond),
            then_branch: Box::new(then_branch),
            else_branch: else_branch.map(Box::new),
        })
    }

    pub fn ret(value: Option<Expr>) -> Self {
        Self::new(ExprKind::Return(value.map(Box::new)))
    }

    pub fn variant(enum_name: &str, variant: &str, payload: Option<Expr>) -> Self {
        Self::new(ExprKind::Variant {
            enum_name: enum_name.to_string(),
            variant: variant.to_string(),
            payload: payload.map(Box::new),
        })
    }

    /// `Just(x)` typed as `Maybe[T]`.
    pub fn just(payload: Expr, inner: SemType) -> Self {
        Self::variant("Maybe", "Just", Some(payload)).with_ty(SemType::maybe(inner))
    }

    pub fn nothing(inner: SemType) -> Self {
        Self::variant("Maybe", "Nothing", None).with_ty(SemType::maybe(inner))
    }

    /// Checker type with references peeled.
    pub fn sem(&self) -> Option<&SemType> {
        self.ty.as_ref().map(SemType::strip_refs)
    }
}
