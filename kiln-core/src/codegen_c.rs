//! C99 backend.
//!
//! Lowers a checked unit to C source. Width tags become `<stdint.h>`
//! types through a [`DataModel`]. `ref T` becomes a pointer that is read
//! through automatically and taken automatically when an addressable
//! value is stored into it. Typed variadics are passed as a count
//! followed by a compound-literal array; inside the callee
//! `vargs.length` is the count parameter.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use tracing::{debug, trace};

use crate::ast::{
    AssignOp, Binding, BranchKind, CallTarget, CompoundIdentifier, DeclId, ExprItem, Expression, Function,
    FunctionCall, FunctionTypeExpr, Statement, TopLevel, TypeExpr, Unit, Value, VariableDeclaration, VariadicExpr,
};
use crate::builtins::find_builtin;
use crate::error::CoreError;
use crate::resolve::SemanticContext;
use crate::typecheck::value_type;
use crate::types::{CWidth, FunctionSig, IntWidth, Primitive, Type, Variadic};

const PRELUDE: &[&str] = &["stddef.h", "stdint.h", "stdbool.h"];

/// Name of the count parameter of a typed variadic function.
const VARGS_LEN: &str = "vargs_len";
const VARGS: &str = "vargs";

// ---------------------------------------------------------------------
// Data models
// ---------------------------------------------------------------------

/// Bit widths of C's platform-dependent integer types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataModel {
    pub name: &'static str,
    pub char_bits: u8,
    pub short_bits: u8,
    pub int_bits: u8,
    pub long_bits: u8,
    pub long_long_bits: u8,
}

impl DataModel {
    /// 64-bit Unix.
    pub const LP64: DataModel = DataModel {
        name: "lp64",
        char_bits: 8,
        short_bits: 16,
        int_bits: 32,
        long_bits: 64,
        long_long_bits: 64,
    };

    /// 64-bit Windows.
    pub const LLP64: DataModel = DataModel {
        name: "llp64",
        char_bits: 8,
        short_bits: 16,
        int_bits: 32,
        long_bits: 32,
        long_long_bits: 64,
    };

    pub const ILP32: DataModel = DataModel {
        name: "ilp32",
        char_bits: 8,
        short_bits: 16,
        int_bits: 32,
        long_bits: 32,
        long_long_bits: 64,
    };

    pub const ALL: &'static [DataModel] = &[DataModel::LP64, DataModel::LLP64, DataModel::ILP32];

    pub fn from_name(name: &str) -> Option<DataModel> {
        DataModel::ALL
            .iter()
            .copied()
            .find(|model| model.name.eq_ignore_ascii_case(name))
    }

    pub fn bits(&self, width: CWidth) -> u8 {
        match width {
            CWidth::Char => self.char_bits,
            CWidth::Short => self.short_bits,
            CWidth::Int => self.int_bits,
            CWidth::Long => self.long_bits,
            CWidth::LongLong => self.long_long_bits,
        }
    }
}

impl Default for DataModel {
    fn default() -> Self {
        DataModel::LP64
    }
}

impl FromStr for DataModel {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DataModel::from_name(s).ok_or_else(|| CoreError::UnknownDataModel(s.to_string()))
    }
}

impl fmt::Display for DataModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

// ---------------------------------------------------------------------
// C types and declarators
// ---------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
enum CType {
    Named(String),
    Pointer(Box<CType>),
    Array(Box<CType>, Option<u64>),
    Function {
        ret: Box<CType>,
        params: Vec<CType>,
        variadic: bool,
    },
}

/// Wrap `inner` (a name, or empty for an abstract declarator) in the
/// declarator syntax of `ty`.
fn declarator(ty: &CType, inner: &str) -> String {
    match ty {
        CType::Named(name) => {
            let rest = inner.trim_start_matches('*');
            let stars = &inner[..inner.len() - rest.len()];
            if rest.is_empty() || rest.starts_with('[') {
                format!("{name}{stars}{rest}")
            } else {
                format!("{name}{stars} {rest}")
            }
        }
        CType::Pointer(to) => {
            let inner = match **to {
                CType::Array(..) | CType::Function { .. } => format!("(*{inner})"),
                _ => format!("*{inner}"),
            };
            declarator(to, &inner)
        }
        CType::Array(elem, length) => {
            let length = length.map(|n| n.to_string()).unwrap_or_default();
            declarator(elem, &format!("{inner}[{length}]"))
        }
        CType::Function { ret, params, variadic } => {
            let mut list: Vec<String> = params.iter().map(|param| declarator(param, "")).collect();
            if *variadic {
                list.push("...".to_string());
            }
            let list = if list.is_empty() {
                "void".to_string()
            } else {
                list.join(", ")
            };
            declarator(ret, &format!("{inner}({list})"))
        }
    }
}

/// Kiln escapes are C escapes, except `\e`.
fn c_escapes(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('e') => out.push_str("\\033"),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

// ---------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------

/// Render a resolved and checked unit as C99 source.
pub fn emit_c(unit: &Unit, ctx: &SemanticContext, model: DataModel) -> String {
    let mut writer = CWriter {
        ctx,
        model,
        out: String::new(),
        indent: 0,
        ret: None,
    };
    writer.unit(unit);
    debug!(%model, bytes = writer.out.len(), "emitted C");
    writer.out
}

struct CWriter<'a> {
    ctx: &'a SemanticContext,
    model: DataModel,
    out: String,
    indent: usize,
    /// Return type of the function being written.
    ret: Option<Type>,
}

impl CWriter<'_> {
    fn line(&mut self, text: &str) {
        if !text.is_empty() {
            for _ in 0..self.indent {
                self.out.push_str("    ");
            }
            self.out.push_str(text);
        }
        self.out.push('\n');
    }

    fn section(&mut self, lines: Vec<String>) {
        if lines.is_empty() {
            return;
        }
        self.line("");
        for line in &lines {
            self.line(line);
        }
    }

    fn unit(&mut self, unit: &Unit) {
        for header in PRELUDE {
            self.line(&format!("#include <{header}>"));
        }
        let mut typedefs = Vec::new();
        let mut globals = Vec::new();
        let mut functions = Vec::new();
        for node in &unit.nodes {
            match node {
                TopLevel::Include(include) => self.line(&format!("#include <{}>", include.header_name())),
                TopLevel::Alias(alias) => typedefs.push(format!(
                    "typedef {};",
                    declarator(&self.type_expr(&alias.target), &alias.name.name)
                )),
                TopLevel::Variable(var) => globals.push(format!("{};", self.variable(var))),
                TopLevel::Function(func) => functions.push(func),
            }
        }
        self.section(typedefs);
        self.section(globals);

        // One prototype per declaration, so definitions may come in any order.
        let mut declared: HashSet<DeclId> = HashSet::new();
        let prototypes = functions
            .iter()
            .filter(|func| func.decl.is_none_or(|id| declared.insert(id)))
            .map(|func| format!("{};", self.function_head(func)))
            .collect();
        self.section(prototypes);

        for func in functions {
            let Some(body) = &func.body else {
                continue;
            };
            trace!(function = %func.name.name, "write definition");
            self.ret = func.sig.as_ref().map(|sig| (*sig.ret).clone());
            self.line("");
            let head = self.function_head(func);
            self.line(&head);
            self.block(body);
            self.ret = None;
        }
    }

    fn function_head(&self, func: &Function) -> String {
        let mut params: Vec<String> = func
            .params
            .iter()
            .map(|param| declarator(&self.type_expr(&param.ty), &param.name.name))
            .collect();
        match &func.variadic {
            Some(VariadicExpr::Typed(elem)) => {
                params.push(declarator(&self.count_type(), VARGS_LEN));
                params.push(declarator(&CType::Pointer(Box::new(self.type_expr(elem))), VARGS));
            }
            Some(VariadicExpr::C) => params.push("...".to_string()),
            None => {}
        }
        let params = if params.is_empty() {
            "void".to_string()
        } else {
            params.join(", ")
        };
        declarator(&self.type_expr(&func.ret), &format!("{}({params})", func.name.name))
    }

    fn variable(&self, var: &VariableDeclaration) -> String {
        let head = declarator(&self.type_expr(&var.ty), &var.name.name);
        match &var.assign {
            Some(assign) => {
                let ty = var
                    .decl
                    .map_or_else(Type::any, |id| self.ctx.decls.get(id).ty.clone());
                format!("{head} = {}", self.stored(&ty, &assign.expr))
            }
            None => head,
        }
    }

    // ---- types --------------------------------------------------------

    fn primitive(&self, primitive: Primitive) -> String {
        let int_bits = |width: IntWidth| match width {
            IntWidth::Fixed(bits) => bits,
            IntWidth::Platform(width) => self.model.bits(width),
        };
        match primitive {
            Primitive::Int(width) => format!("int{}_t", int_bits(width)),
            Primitive::UInt(width) => format!("uint{}_t", int_bits(width)),
            Primitive::Float => "float".to_string(),
            Primitive::Double => "double".to_string(),
            Primitive::Decimal => "long double".to_string(),
            Primitive::Str => "char*".to_string(),
            Primitive::Char => "char".to_string(),
            Primitive::Bool => "bool".to_string(),
            Primitive::Void => "void".to_string(),
            Primitive::Size => "size_t".to_string(),
            Primitive::Any => "void*".to_string(),
        }
    }

    fn count_type(&self) -> CType {
        CType::Named(self.primitive(Primitive::INT))
    }

    fn ty(&self, ty: &Type) -> CType {
        match ty {
            Type::Primitive(primitive) => CType::Named(self.primitive(*primitive)),
            Type::Reference(inner) => CType::Pointer(Box::new(self.ty(inner))),
            Type::Array { elem, length: None } => CType::Pointer(Box::new(self.ty(elem))),
            Type::Array { elem, length } => CType::Array(Box::new(self.ty(elem)), *length),
            Type::Function(sig) => CType::Pointer(Box::new(self.signature(sig))),
        }
    }

    fn signature(&self, sig: &FunctionSig) -> CType {
        let mut params: Vec<CType> = sig.params.iter().map(|param| self.ty(param)).collect();
        if let Some(Variadic::Typed(elem)) = &sig.variadic {
            params.push(self.count_type());
            params.push(CType::Pointer(Box::new(self.ty(elem))));
        }
        CType::Function {
            ret: Box::new(self.ty(&sig.ret)),
            params,
            variadic: matches!(sig.variadic, Some(Variadic::C)),
        }
    }

    /// Like [`CWriter::ty`], but aliases keep their typedef name.
    fn type_expr(&self, expr: &TypeExpr) -> CType {
        match expr {
            TypeExpr::Named(ident) => self.named_type(ident),
            TypeExpr::Reference { inner, .. } => CType::Pointer(Box::new(self.type_expr(inner))),
            TypeExpr::Array { elem, length: None, .. } => CType::Pointer(Box::new(self.type_expr(elem))),
            TypeExpr::Array { elem, length, .. } => CType::Array(Box::new(self.type_expr(elem)), *length),
            TypeExpr::Function(func) => CType::Pointer(Box::new(self.function_type(func))),
        }
    }

    fn named_type(&self, ident: &CompoundIdentifier) -> CType {
        let name = ident.dotted();
        if find_builtin(&name).is_some() {
            self.ty(&ident.ty())
        } else {
            CType::Named(name)
        }
    }

    fn function_type(&self, func: &FunctionTypeExpr) -> CType {
        let mut params: Vec<CType> = func.params.iter().map(|param| self.type_expr(param)).collect();
        if let Some(VariadicExpr::Typed(elem)) = &func.variadic {
            params.push(self.count_type());
            params.push(CType::Pointer(Box::new(self.type_expr(elem))));
        }
        CType::Function {
            ret: Box::new(self.type_expr(&func.ret)),
            params,
            variadic: matches!(func.variadic, Some(VariadicExpr::C)),
        }
    }

    // ---- statements ---------------------------------------------------

    fn block(&mut self, body: &[Statement]) {
        self.line("{");
        self.indent += 1;
        for stmt in body {
            self.statement(stmt);
        }
        self.indent -= 1;
        self.line("}");
    }

    fn statement(&mut self, stmt: &Statement) {
        match stmt {
            Statement::Expression(expr) => {
                // A discarded call result is never read through.
                let text = match expr.single() {
                    Some(Value::Call(call)) => self.call(call),
                    _ => self.expression(expr),
                };
                self.line(&format!("{text};"));
            }
            Statement::Declaration(var) => {
                let text = self.variable(var);
                self.line(&format!("{text};"));
            }
            Statement::Assignment(assign) => {
                let op = assign.assign.operator.map_or("=", AssignOp::symbol);
                let text = format!(
                    "{} {op} {};",
                    self.value(&assign.target),
                    self.expression(&assign.assign.expr)
                );
                self.line(&text);
            }
            Statement::Return(ret) => match &ret.expr {
                Some(expr) => {
                    let ret = self.ret.clone().unwrap_or_else(Type::any);
                    let text = format!("return ({});", self.stored(&ret, expr));
                    self.line(&text);
                }
                None => self.line("return;"),
            },
            Statement::Condition(cond) => {
                for branch in &cond.branches {
                    let head = match (branch.kind, &branch.cond) {
                        (BranchKind::If, Some(expr)) => format!("if ({})", self.expression(expr)),
                        (BranchKind::Elif, Some(expr)) => format!("else if ({})", self.expression(expr)),
                        _ => "else".to_string(),
                    };
                    self.line(&head);
                    self.block(&branch.body);
                }
            }
            Statement::While(lp) => {
                let head = format!("while ({})", self.expression(&lp.cond));
                self.line(&head);
                self.block(&lp.body);
            }
            Statement::Block(block) => self.block(&block.body),
        }
    }

    // ---- expressions --------------------------------------------------

    fn expression(&self, expr: &Expression) -> String {
        expr.items
            .iter()
            .map(|item| match item {
                ExprItem::Value(value) => self.value(value),
                ExprItem::Operator(op) => op.op.symbol().to_string(),
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// `expr` stored into a slot of type `expected`.
    fn stored(&self, expected: &Type, expr: &Expression) -> String {
        match expr.single() {
            Some(value) if expected.is_reference() => self.pointer(value),
            _ => self.expression(expr),
        }
    }

    fn value(&self, value: &Value) -> String {
        match value {
            Value::Number(lit) | Value::Decimal(lit) => lit.text.clone(),
            Value::String(lit) => format!("\"{}\"", c_escapes(&lit.text)),
            Value::Char(lit) => format!("'{}'", c_escapes(&lit.text)),
            Value::Bool { value, .. } => value.to_string(),
            Value::Null(_) => "NULL".to_string(),
            Value::Identifier(ident) => {
                let name = self.identifier(ident);
                if ident.ty().is_reference() {
                    format!("(*{name})")
                } else {
                    name
                }
            }
            Value::Call(call) => {
                let text = self.call(call);
                let cast = matches!(call.target, Some(CallTarget::Cast(_)));
                if !cast && value_type(value).is_reference() {
                    format!("(*{text})")
                } else {
                    text
                }
            }
            Value::Index(access) => format!("{}[{}]", self.value(&access.base), self.expression(&access.index)),
            Value::Reference(reference) => self.pointer(&reference.inner),
            Value::Prefix(unary) => format!("{}{}", unary.op.symbol(), self.value(&unary.value)),
            Value::Suffix(unary) => format!("{}{}", self.value(&unary.value), unary.op.symbol()),
            Value::Paren(expr) => format!("({})", self.expression(expr)),
        }
    }

    /// Address of `value`; references are passed along as they are.
    fn pointer(&self, value: &Value) -> String {
        match value {
            Value::Null(_) => "NULL".to_string(),
            Value::Reference(reference) => self.pointer(&reference.inner),
            Value::Identifier(ident) if ident.ty().is_reference() => self.identifier(ident),
            Value::Identifier(ident) => format!("&{}", self.identifier(ident)),
            Value::Index(_) => format!("&{}", self.value(value)),
            Value::Paren(expr) => match expr.single() {
                Some(inner) => self.pointer(inner),
                None => self.value(value),
            },
            Value::Call(call) => self.call(call),
            _ => self.value(value),
        }
    }

    fn identifier(&self, ident: &CompoundIdentifier) -> String {
        match ident.binding() {
            Some(Binding::VarArgsLength) => VARGS_LEN.to_string(),
            _ => ident.dotted(),
        }
    }

    fn call(&self, call: &FunctionCall) -> String {
        let sig = match &call.target {
            Some(CallTarget::Cast(ty)) => {
                let target = if find_builtin(&call.callee.dotted()).is_some() {
                    self.ty(ty)
                } else {
                    CType::Named(call.callee.dotted())
                };
                let arg = call.args.first().map(|arg| self.expression(arg)).unwrap_or_default();
                return format!("(({}){arg})", declarator(&target, ""));
            }
            Some(
                CallTarget::Function { sig, .. } | CallTarget::FunctionValue { sig } | CallTarget::CFunction { sig },
            ) => Some(sig),
            Some(CallTarget::Macro { .. }) | None => None,
        };

        let callee = if call.callee.ty().is_reference() {
            format!("(*{})", self.identifier(&call.callee))
        } else {
            self.identifier(&call.callee)
        };
        let Some(sig) = sig else {
            let args: Vec<String> = call.args.iter().map(|arg| self.expression(arg)).collect();
            return format!("{callee}({})", args.join(", "));
        };

        let fixed = sig.params.len().min(call.args.len());
        let mut args: Vec<String> = sig
            .params
            .iter()
            .zip(&call.args)
            .map(|(ty, arg)| self.stored(ty, arg))
            .collect();
        let extra = &call.args[fixed..];
        match &sig.variadic {
            Some(Variadic::Typed(_)) if extra.is_empty() => {
                args.push("0".to_string());
                args.push("NULL".to_string());
            }
            Some(Variadic::Typed(elem)) => {
                let items: Vec<String> = extra.iter().map(|arg| self.expression(arg)).collect();
                let array = declarator(&CType::Array(Box::new(self.ty(elem)), None), "");
                args.push(extra.len().to_string());
                args.push(format!("({array}){{{}}}", items.join(", ")));
            }
            _ => args.extend(extra.iter().map(|arg| self.expression(arg))),
        }
        format!("{callee}({})", args.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::c_header::{bridge_includes, HeaderCache, MemoryLocator};
    use crate::parser::parse;
    use crate::resolve::resolve_unit;
    use crate::span::FileId;
    use crate::typecheck::check_unit;
    use pretty_assertions::assert_eq;

    fn emit(source: &str, model: DataModel) -> String {
        let locator = MemoryLocator::new().with("stdio.h", "int printf(const char *fmt, ...);\n");
        let mut unit = parse(FileId(0), source).expect("parse");
        bridge_includes(&mut unit, &HeaderCache::new(), &locator).expect("bridge");
        let ctx = resolve_unit(&mut unit).expect("resolve");
        check_unit(&mut unit, &ctx).expect("check");
        emit_c(&unit, &ctx, model)
    }

    #[test]
    fn writes_prototypes_before_definitions() {
        let source = "void simple_fn(int32 i) {\n\
                      }\n\
                      void declared_later()\n\
                      int32 main() {\n\
                          simple_fn(42)\n\
                          declared_later()\n\
                          return 0\n\
                      }\n\
                      void declared_later() {\n\
                      }\n";
        let expected = "\
#include <stddef.h>
#include <stdint.h>
#include <stdbool.h>

void simple_fn(int32_t i);
void declared_later(void);
int32_t main(void);

void simple_fn(int32_t i)
{
}

int32_t main(void)
{
    simple_fn(42);
    declared_later();
    return (0);
}

void declared_later(void)
{
}
";
        assert_eq!(emit(source, DataModel::LP64), expected);
    }

    #[test]
    fn references_take_and_read_through_pointers() {
        let c = emit(
            "void inc(ref int nb, int by = 1) {\n\
                 nb += by\n\
             }\n\
             int main() {\n\
                 int x = 0\n\
                 inc(x)\n\
                 inc(ref x, 2)\n\
                 return x\n\
             }\n",
            DataModel::LP64,
        );
        assert!(c.contains("void inc(int32_t* nb, int32_t by)\n"), "{c}");
        assert!(c.contains("    (*nb) += by;\n"), "{c}");
        assert!(c.contains("    inc(&x, 1);\n"), "{c}");
        assert!(c.contains("    inc(&x, 2);\n"), "{c}");
        assert!(c.contains("    return (x);\n"), "{c}");
    }

    #[test]
    fn width_tags_follow_the_data_model() {
        let source = "c_long big = 1\nint small = 2\nc_ulonglong huge = 3\n";
        let lp64 = emit(source, DataModel::LP64);
        assert!(lp64.contains("int64_t big = 1;"), "{lp64}");
        assert!(lp64.contains("int32_t small = 2;"), "{lp64}");
        let llp64 = emit(source, DataModel::LLP64);
        assert!(llp64.contains("int32_t big = 1;"), "{llp64}");
        assert!(llp64.contains("uint64_t huge = 3;"), "{llp64}");
        let ilp32 = emit(source, DataModel::ILP32);
        assert!(ilp32.contains("int32_t big = 1;"), "{ilp32}");
    }

    #[test]
    fn data_models_parse_by_name() {
        assert_eq!("LLP64".parse::<DataModel>().expect("model"), DataModel::LLP64);
        assert_eq!(DataModel::default(), DataModel::LP64);
        let err = "lp128".parse::<DataModel>().expect_err("unknown model");
        assert_eq!(err.to_string(), "unknown data model: lp128");
    }

    #[test]
    fn typed_variadics_become_count_and_array() {
        let c = emit(
            "int sum(int...) {\n\
                 int total = 0\n\
                 int i = 0\n\
                 while i < vargs.length {\n\
                     total += vargs[i]\n\
                     i++\n\
                 }\n\
                 return total\n\
             }\n\
             int main() {\n\
                 return sum(1, 2, 3) + sum()\n\
             }\n",
            DataModel::LP64,
        );
        assert!(c.contains("int32_t sum(int32_t vargs_len, int32_t* vargs);"), "{c}");
        assert!(c.contains("    while (i < vargs_len)\n"), "{c}");
        assert!(c.contains("        total += vargs[i];\n"), "{c}");
        assert!(c.contains("return (sum(3, (int32_t[]){1, 2, 3}) + sum(0, NULL));"), "{c}");
    }

    #[test]
    fn function_types_become_function_pointers() {
        let c = emit(
            "alias func<int(int, int)> binop\n\
             int add(int a, int b) {\n\
                 return a + b\n\
             }\n\
             int apply(binop op, int x) {\n\
                 return op(x, x)\n\
             }\n\
             int main() {\n\
                 func<int(int, int)> local = add\n\
                 return apply(local, 2)\n\
             }\n",
            DataModel::LP64,
        );
        assert!(c.contains("typedef int32_t (*binop)(int32_t, int32_t);"), "{c}");
        assert!(c.contains("int32_t apply(binop op, int32_t x);"), "{c}");
        assert!(c.contains("    int32_t (*local)(int32_t, int32_t) = add;\n"), "{c}");
        assert!(c.contains("    return (op(x, x));\n"), "{c}");
    }

    #[test]
    fn casts_includes_and_control_flow() {
        let c = emit(
            "include stdio\n\
             int main() {\n\
                 int n = 3\n\
                 if n > 2 {\n\
                     printf(\"big %d\\e\\n\", int8(n))\n\
                 } elif n == 2 {\n\
                     printf(\"two\")\n\
                 } else {\n\
                     return 1\n\
                 }\n\
                 return 0\n\
             }\n",
            DataModel::LP64,
        );
        assert!(c.contains("#include <stdbool.h>\n#include <stdio.h>\n"), "{c}");
        assert!(c.contains("    if (n > 2)\n    {\n"), "{c}");
        assert!(c.contains("        printf(\"big %d\\033\\n\", ((int8_t)n));\n"), "{c}");
        assert!(c.contains("    else if (n == 2)\n"), "{c}");
        assert!(c.contains("    else\n    {\n        return (1);\n    }\n"), "{c}");
    }

    #[test]
    fn declarators_nest_pointers_arrays_and_functions() {
        let int = || CType::Named("int32_t".to_string());
        let array_ptr = CType::Pointer(Box::new(CType::Array(Box::new(int()), Some(4))));
        assert_eq!(declarator(&array_ptr, "q"), "int32_t (*q)[4]");
        let strings = CType::Pointer(Box::new(CType::Named("char*".to_string())));
        assert_eq!(declarator(&strings, "av"), "char** av");
        let callback = CType::Pointer(Box::new(CType::Function {
            ret: Box::new(int()),
            params: Vec::new(),
            variadic: false,
        }));
        assert_eq!(declarator(&callback, ""), "int32_t (*)(void)");
        let ptr_array = CType::Array(Box::new(CType::Pointer(Box::new(int()))), None);
        assert_eq!(declarator(&ptr_array, ""), "int32_t*[]");
    }
}
