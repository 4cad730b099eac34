//! Syntax tree for Kiln units.
//!
//! The tree strictly owns its children. Passes after parsing only fill
//! in the `Option` annotation slots (`resolved`, `target`, `decl`,
//! `symbols`); references back to declarations are [`DeclId`] indices
//! into the resolver's declaration table.

use std::sync::Arc;

use crate::c_header::HeaderSymbols;
use crate::span::{FileId, Span};
use crate::types::{FunctionSig, Type};

/// Index into the declaration table built by the resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeclId(pub u32);

#[derive(Debug, Clone, PartialEq)]
pub struct Unit {
    pub file: FileId,
    pub nodes: Vec<TopLevel>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TopLevel {
    Include(Include),
    Alias(Alias),
    Function(Function),
    Variable(VariableDeclaration),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Include {
    pub span: Span,
    /// Path segments: `include sys/types` is `["sys", "types"]`.
    pub path: Vec<Identifier>,
    /// Filled by the header bridge.
    pub symbols: Option<Arc<HeaderSymbols>>,
}

impl Include {
    pub fn path_string(&self) -> String {
        self.path
            .iter()
            .map(|segment| segment.name.as_str())
            .collect::<Vec<_>>()
            .join("/")
    }

    pub fn header_name(&self) -> String {
        format!("{}.h", self.path_string())
    }
}

/// `alias <target> <name>`
#[derive(Debug, Clone, PartialEq)]
pub struct Alias {
    pub span: Span,
    pub target: TypeExpr,
    pub name: Identifier,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identifier {
    pub name: String,
    pub span: Span,
}

/// What a compound identifier was bound to.
#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    Local(DeclId),
    Parameter(DeclId),
    Global(DeclId),
    Function(DeclId),
    /// Builtin type or alias.
    Type,
    MacroConstant,
    MacroFunction { arity: usize, variadic: bool },
    CFunction,
    CVariable,
    /// The implicit array of a typed variadic function.
    VarArgs,
    /// `vargs.length`
    VarArgsLength,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub binding: Binding,
    pub ty: Type,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompoundIdentifier {
    pub span: Span,
    pub elems: Vec<Identifier>,
    pub resolved: Option<Resolution>,
}

impl CompoundIdentifier {
    pub fn dotted(&self) -> String {
        self.elems
            .iter()
            .map(|e| e.name.as_str())
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Resolved type, `@any` before resolution.
    pub fn ty(&self) -> Type {
        self.resolved.as_ref().map_or_else(Type::any, |r| r.ty.clone())
    }

    pub fn binding(&self) -> Option<&Binding> {
        self.resolved.as_ref().map(|r| &r.binding)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeExpr {
    Named(CompoundIdentifier),
    Reference { span: Span, inner: Box<TypeExpr> },
    Array { span: Span, elem: Box<TypeExpr>, length: Option<u64> },
    Function(FunctionTypeExpr),
}

impl TypeExpr {
    pub fn span(&self) -> Span {
        match self {
            TypeExpr::Named(ident) => ident.span,
            TypeExpr::Reference { span, .. } | TypeExpr::Array { span, .. } => *span,
            TypeExpr::Function(f) => f.span,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionTypeExpr {
    pub span: Span,
    pub ret: Box<TypeExpr>,
    pub params: Vec<TypeExpr>,
    pub variadic: Option<VariadicExpr>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum VariadicExpr {
    C,
    Typed(Box<TypeExpr>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub ty: TypeExpr,
    pub name: Identifier,
    pub default: Option<Expression>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub span: Span,
    pub ret: TypeExpr,
    pub name: Identifier,
    pub params: Vec<Param>,
    pub variadic: Option<VariadicExpr>,
    /// `None` for a declaration without body.
    pub body: Option<Vec<Statement>>,
    pub decl: Option<DeclId>,
    pub sig: Option<FunctionSig>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariableDeclaration {
    pub span: Span,
    pub ty: TypeExpr,
    pub name: Identifier,
    pub assign: Option<Assignment>,
    pub decl: Option<DeclId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl AssignOp {
    pub fn symbol(self) -> &'static str {
        match self {
            AssignOp::Add => "+=",
            AssignOp::Sub => "-=",
            AssignOp::Mul => "*=",
            AssignOp::Div => "/=",
            AssignOp::Rem => "%=",
        }
    }
}

/// Right-hand side of `=` or of a compound assignment.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub operator: Option<AssignOp>,
    pub expr: Expression,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariableAssignment {
    pub span: Span,
    pub target: Value,
    pub assign: Assignment,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Expression(Expression),
    Declaration(VariableDeclaration),
    Assignment(VariableAssignment),
    Return(Return),
    Condition(Condition),
    While(WhileLoop),
    Block(Block),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Return {
    pub span: Span,
    pub expr: Option<Expression>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchKind {
    If,
    Elif,
    Else,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Branch {
    pub span: Span,
    pub kind: BranchKind,
    /// `None` only for `else`.
    pub cond: Option<Expression>,
    pub body: Vec<Statement>,
}

/// `if` followed by any `elif`s and an optional `else`.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub branches: Vec<Branch>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WhileLoop {
    pub span: Span,
    pub cond: Expression,
    pub body: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub span: Span,
    pub body: Vec<Statement>,
}

/// Flat operand/operator sequence; precedence is left to C.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub span: Span,
    pub items: Vec<ExprItem>,
}

impl Expression {
    /// The sole operand when the expression has no operator.
    pub fn single(&self) -> Option<&Value> {
        match self.items.as_slice() {
            [ExprItem::Value(value)] => Some(value),
            _ => None,
        }
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.items.iter().filter_map(|item| match item {
            ExprItem::Value(value) => Some(value),
            ExprItem::Operator(_) => None,
        })
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut Value> {
        self.items.iter_mut().filter_map(|item| match item {
            ExprItem::Value(value) => Some(value),
            ExprItem::Operator(_) => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprItem {
    Value(Value),
    Operator(Operator),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Operator {
    pub span: Span,
    pub op: BinaryOp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
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
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
        }
    }

    /// Comparison and logical operators produce booleans.
    pub fn is_boolean(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq
                | BinaryOp::Ne
                | BinaryOp::Lt
                | BinaryOp::Le
                | BinaryOp::Gt
                | BinaryOp::Ge
                | BinaryOp::And
                | BinaryOp::Or
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
    BitNot,
    Inc,
    Dec,
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Not => "!",
            UnaryOp::Neg => "-",
            UnaryOp::BitNot => "~",
            UnaryOp::Inc => "++",
            UnaryOp::Dec => "--",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Literal {
    pub span: Span,
    /// Source text; strings and characters without their quotes.
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(Literal),
    Decimal(Literal),
    String(Literal),
    Char(Literal),
    Bool { span: Span, value: bool },
    Null(Span),
    Identifier(CompoundIdentifier),
    Call(FunctionCall),
    Index(ArrayAccess),
    Reference(ReferenceValue),
    Prefix(UnaryValue),
    Suffix(UnaryValue),
    Paren(Box<Expression>),
}

impl Value {
    pub fn span(&self) -> Span {
        match self {
            Value::Number(lit) | Value::Decimal(lit) | Value::String(lit) | Value::Char(lit) => lit.span,
            Value::Bool { span, .. } | Value::Null(span) => *span,
            Value::Identifier(ident) => ident.span,
            Value::Call(call) => call.span,
            Value::Index(access) => access.span,
            Value::Reference(reference) => reference.span,
            Value::Prefix(unary) | Value::Suffix(unary) => unary.span,
            Value::Paren(expr) => expr.span,
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(
            self,
            Value::Number(_)
                | Value::Decimal(_)
                | Value::String(_)
                | Value::Char(_)
                | Value::Bool { .. }
                | Value::Null(_)
        )
    }

    /// Short description for diagnostics.
    pub fn describe(&self) -> String {
        match self {
            Value::Number(lit) | Value::Decimal(lit) => format!("literal `{}`", lit.text),
            Value::String(_) => "a string literal".to_string(),
            Value::Char(_) => "a character literal".to_string(),
            Value::Bool { value, .. } => format!("literal `{value}`"),
            Value::Null(_) => "`null`".to_string(),
            Value::Identifier(ident) => format!("`{}`", ident.dotted()),
            Value::Call(call) => format!("the result of `{}`", call.callee.dotted()),
            Value::Index(_) => "an array element".to_string(),
            Value::Reference(reference) => reference.inner.describe(),
            Value::Prefix(_) | Value::Suffix(_) => "an operator expression".to_string(),
            Value::Paren(_) => "a parenthesised expression".to_string(),
        }
    }
}

/// How a call was resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum CallTarget {
    Function { decl: DeclId, sig: FunctionSig },
    /// Call through a variable of `func<...>` type.
    FunctionValue { sig: FunctionSig },
    CFunction { sig: FunctionSig },
    Macro { arity: usize, variadic: bool, result: Type },
    Cast(Type),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    pub span: Span,
    pub callee: CompoundIdentifier,
    pub args: Vec<Expression>,
    pub target: Option<CallTarget>,
    /// Trailing arguments filled in from the callee's defaults.
    pub defaulted: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArrayAccess {
    pub span: Span,
    pub base: Box<Value>,
    pub index: Box<Expression>,
}

/// Explicit `ref value`.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceValue {
    pub span: Span,
    pub inner: Box<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnaryValue {
    pub span: Span,
    pub op: UnaryOp,
    pub value: Box<Value>,
}
