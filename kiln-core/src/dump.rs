//! AST dump.
//!
//! Renders a unit as an indented tree with `├─`, `│` and `└─` guides,
//! one `Label` or `Label: value` per line. The output depends only on
//! the tree, so dumping the same unit twice gives identical text. Every
//! resolved compound identifier ends with a `Type:` line.

use crate::ast::{
    Alias, Assignment, BranchKind, CallTarget, CompoundIdentifier, ExprItem, Expression, Function, FunctionCall,
    FunctionTypeExpr, Include, Param, Statement, TopLevel, TypeExpr, Unit, Value, VariableDeclaration, VariadicExpr,
};
use crate::c_header::HeaderSymbol;
use crate::types::Variadic;

/// Dump a parsed or resolved unit.
pub fn dump_unit(unit: &Unit) -> String {
    let nodes: Vec<DumpNode> = unit.nodes.iter().map(top_level).collect();
    let mut out = String::new();
    render_children(&nodes, "", &mut out);
    out
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct DumpNode {
    label: String,
    children: Vec<DumpNode>,
}

impl DumpNode {
    fn leaf(label: impl Into<String>) -> Self {
        DumpNode {
            label: label.into(),
            children: Vec::new(),
        }
    }

    fn new(label: impl Into<String>, children: Vec<DumpNode>) -> Self {
        DumpNode {
            label: label.into(),
            children,
        }
    }
}

fn render_children(nodes: &[DumpNode], prefix: &str, out: &mut String) {
    for (index, node) in nodes.iter().enumerate() {
        let last = index + 1 == nodes.len();
        out.push_str(prefix);
        out.push_str(if last { "└─ " } else { "├─ " });
        out.push_str(&node.label);
        out.push('\n');
        let nested = format!("{prefix}{}", if last { "   " } else { "│  " });
        render_children(&node.children, &nested, out);
    }
}

// ---------------------------------------------------------------------
// Top level
// ---------------------------------------------------------------------

fn top_level(node: &TopLevel) -> DumpNode {
    match node {
        TopLevel::Include(include) => include_node(include),
        TopLevel::Alias(alias) => alias_node(alias),
        TopLevel::Function(func) => function_node(func),
        TopLevel::Variable(var) => variable_node(var),
    }
}

fn include_node(include: &Include) -> DumpNode {
    let symbols = include
        .symbols
        .iter()
        .flat_map(|table| table.symbols.iter())
        .map(header_symbol)
        .collect();
    DumpNode::new(
        "Include",
        vec![
            DumpNode::leaf(format!("Path: {}", include.path_string())),
            DumpNode::new("Symbols found", symbols),
        ],
    )
}

fn header_symbol(symbol: &HeaderSymbol) -> DumpNode {
    let name = DumpNode::leaf(format!("Identifier: {}", symbol.name()));
    match symbol {
        HeaderSymbol::Constant { .. } => DumpNode::new("C define", vec![name]),
        HeaderSymbol::FunctionMacro { arity, variadic, .. } => {
            let mut children = vec![name, DumpNode::leaf(format!("Arg count: {arity}"))];
            if *variadic {
                children.push(DumpNode::leaf("Variadic (C)"));
            }
            DumpNode::new("C function macro", children)
        }
        HeaderSymbol::Function { sig, .. } => DumpNode::new(
            "Function",
            vec![
                DumpNode::leaf("Declaration"),
                name,
                DumpNode::leaf(format!("Type: {sig}")),
            ],
        ),
        HeaderSymbol::Variable { ty, .. } => {
            DumpNode::new("VariableDeclaration", vec![name, DumpNode::leaf(format!("Type: {ty}"))])
        }
        HeaderSymbol::Typedef { target, .. } => DumpNode::new(
            "Alias",
            vec![
                DumpNode::new("From:", vec![DumpNode::leaf(format!("Type: {target}"))]),
                DumpNode::new("To:", vec![name]),
            ],
        ),
    }
}

fn alias_node(alias: &Alias) -> DumpNode {
    DumpNode::new(
        "Alias",
        vec![
            DumpNode::new("From:", vec![type_node(&alias.target)]),
            DumpNode::new("To:", vec![DumpNode::leaf(format!("Identifier: {}", alias.name.name))]),
        ],
    )
}

fn function_node(func: &Function) -> DumpNode {
    let mut children = Vec::new();
    if func.body.is_none() {
        children.push(DumpNode::leaf("Declaration"));
    }
    children.push(DumpNode::leaf(format!("Identifier: {}", func.name.name)));
    children.push(signature_node(&func.ret, &func.params, func.variadic.as_ref()));
    if let Some(body) = &func.body {
        children.push(DumpNode::new("Body", statements(body)));
    }
    DumpNode::new("Function", children)
}

fn signature_node(ret: &TypeExpr, params: &[Param], variadic: Option<&VariadicExpr>) -> DumpNode {
    let mut children = vec![type_node(ret)];
    if !params.is_empty() {
        children.push(DumpNode::new("Arguments:", params.iter().map(param_node).collect()));
    }
    children.extend(variadic_node(variadic));
    DumpNode::new("FunctionType", children)
}

fn param_node(param: &Param) -> DumpNode {
    let mut children = vec![
        type_node(&param.ty),
        DumpNode::leaf(format!("Identifier: {}", param.name.name)),
    ];
    if let Some(default) = &param.default {
        children.push(DumpNode::new("Assignment", vec![expression_node(default)]));
    }
    DumpNode::new("VariableDeclaration", children)
}

fn variadic_node(variadic: Option<&VariadicExpr>) -> Option<DumpNode> {
    variadic.map(|variadic| match variadic {
        VariadicExpr::C => DumpNode::leaf("Variadic (C)"),
        VariadicExpr::Typed(elem) => DumpNode::new("Variadic:", vec![type_node(elem)]),
    })
}

fn variable_node(var: &VariableDeclaration) -> DumpNode {
    let mut children = vec![
        type_node(&var.ty),
        DumpNode::leaf(format!("Identifier: {}", var.name.name)),
    ];
    if let Some(assign) = &var.assign {
        children.push(assignment_node(assign));
    }
    DumpNode::new("VariableDeclaration", children)
}

fn assignment_node(assign: &Assignment) -> DumpNode {
    let mut children = Vec::new();
    if let Some(op) = assign.operator {
        children.push(DumpNode::leaf(format!("Operator: {}", op.symbol())));
    }
    children.push(expression_node(&assign.expr));
    DumpNode::new("Assignment", children)
}

// ---------------------------------------------------------------------
// Types and identifiers
// ---------------------------------------------------------------------

fn type_node(expr: &TypeExpr) -> DumpNode {
    match expr {
        TypeExpr::Named(ident) => identifier_node(ident),
        TypeExpr::Reference { inner, .. } => DumpNode::new("Reference", vec![type_node(inner)]),
        TypeExpr::Array { elem, length, .. } => {
            let mut children = vec![type_node(elem)];
            if let Some(length) = length {
                children.push(DumpNode::leaf(format!("Length: {length}")));
            }
            DumpNode::new("Array", children)
        }
        TypeExpr::Function(func) => function_type_node(func),
    }
}

fn function_type_node(func: &FunctionTypeExpr) -> DumpNode {
    let mut children = vec![type_node(&func.ret)];
    if !func.params.is_empty() {
        children.push(DumpNode::new("Arguments:", func.params.iter().map(type_node).collect()));
    }
    children.extend(variadic_node(func.variadic.as_ref()));
    DumpNode::new("FunctionType", children)
}

fn identifier_node(ident: &CompoundIdentifier) -> DumpNode {
    let mut children: Vec<DumpNode> = ident
        .elems
        .iter()
        .map(|elem| DumpNode::leaf(format!("Identifier: {}", elem.name)))
        .collect();
    if let Some(resolved) = &ident.resolved {
        children.push(DumpNode::leaf(format!("Type: {}", resolved.ty)));
    }
    DumpNode::new("CompoundIdentifier", children)
}

// ---------------------------------------------------------------------
// Statements and expressions
// ---------------------------------------------------------------------

fn statements(body: &[Statement]) -> Vec<DumpNode> {
    body.iter().map(statement_node).collect()
}

fn statement_node(stmt: &Statement) -> DumpNode {
    match stmt {
        Statement::Expression(expr) => DumpNode::new("Statement", vec![expression_node(expr)]),
        Statement::Declaration(var) => variable_node(var),
        Statement::Assignment(assign) => DumpNode::new(
            "VariableAssignment",
            vec![value_node(&assign.target), assignment_node(&assign.assign)],
        ),
        Statement::Return(ret) => DumpNode::new("Return", ret.expr.iter().map(expression_node).collect()),
        Statement::Condition(cond) => DumpNode::new(
            "ConditionBranches",
            cond.branches
                .iter()
                .map(|branch| {
                    let name = match branch.kind {
                        BranchKind::If => "if",
                        BranchKind::Elif => "elif",
                        BranchKind::Else => "else",
                    };
                    let mut children: Vec<DumpNode> = branch.cond.iter().map(expression_node).collect();
                    children.push(DumpNode::new("ControlStructureBody", statements(&branch.body)));
                    DumpNode::new(format!("ControlStructure: {name}"), children)
                })
                .collect(),
        ),
        Statement::While(lp) => DumpNode::new(
            "ControlStructure: while",
            vec![
                expression_node(&lp.cond),
                DumpNode::new("ControlStructureBody", statements(&lp.body)),
            ],
        ),
        Statement::Block(block) => DumpNode::new("Block", statements(&block.body)),
    }
}

fn expression_node(expr: &Expression) -> DumpNode {
    DumpNode::new(
        "Expression",
        expr.items
            .iter()
            .map(|item| match item {
                ExprItem::Value(value) => value_node(value),
                ExprItem::Operator(op) => DumpNode::leaf(format!("Operator: {}", op.op.symbol())),
            })
            .collect(),
    )
}

fn value_node(value: &Value) -> DumpNode {
    match value {
        Value::Number(lit) => DumpNode::leaf(format!("Number: {}", lit.text)),
        Value::Decimal(lit) => DumpNode::leaf(format!("DecimalNumber: {}", lit.text)),
        Value::String(lit) => DumpNode::leaf(format!("String: {}", lit.text)),
        Value::Char(lit) => DumpNode::leaf(format!("Character: {}", lit.text)),
        Value::Bool { value, .. } => DumpNode::leaf(format!("BoolValue: {value}")),
        Value::Null(_) => DumpNode::leaf("NullValue"),
        Value::Identifier(ident) => identifier_node(ident),
        Value::Call(call) => call_node(call),
        Value::Index(access) => DumpNode::new(
            "ArrayAccess",
            vec![expression_node(&access.index), value_node(&access.base)],
        ),
        Value::Reference(reference) => DumpNode::new("Reference", vec![value_node(&reference.inner)]),
        Value::Prefix(unary) => DumpNode::new(
            "PrefixOperatorValue",
            vec![
                DumpNode::leaf(format!("Operator: {}", unary.op.symbol())),
                value_node(&unary.value),
            ],
        ),
        Value::Suffix(unary) => DumpNode::new(
            "SuffixOperatorValue",
            vec![
                DumpNode::leaf(format!("Operator: {}", unary.op.symbol())),
                value_node(&unary.value),
            ],
        ),
        Value::Paren(expr) => expression_node(expr),
    }
}

fn call_node(call: &FunctionCall) -> DumpNode {
    let args = DumpNode::new("Arguments", call.args.iter().map(expression_node).collect());
    match &call.target {
        Some(CallTarget::Cast(ty)) => DumpNode::new(
            "Cast",
            vec![DumpNode::leaf(format!("Type: {ty}")), args],
        ),
        Some(CallTarget::Macro { arity, variadic, .. }) => {
            let mut children = vec![identifier_node(&call.callee), DumpNode::leaf(format!("Arg count: {arity}"))];
            if *variadic {
                children.push(DumpNode::leaf("Variadic (C)"));
            }
            children.push(args);
            DumpNode::new("FunctionCall", children)
        }
        Some(
            CallTarget::Function { sig, .. } | CallTarget::FunctionValue { sig } | CallTarget::CFunction { sig },
        ) => {
            let mut children = vec![identifier_node(&call.callee)];
            if let Some(Variadic::Typed(elem)) = &sig.variadic {
                children.push(DumpNode::leaf(format!("Variadic: {elem}")));
            }
            if call.defaulted > 0 {
                children.push(DumpNode::leaf(format!("Defaulted arguments: {}", call.defaulted)));
            }
            children.push(args);
            DumpNode::new("FunctionCall", children)
        }
        None => DumpNode::new("FunctionCall", vec![identifier_node(&call.callee), args]),
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

    fn analyzed(source: &str) -> Unit {
        let locator = MemoryLocator::new()
            .with("pair.h", "#define ADD(a, b) ((a) + (b))\n#define LIMIT 10\n")
            .with(
                "macros.h",
                "#define CONSTANT 42\n#define VALUE 7\n#define MACROCEPTION CONSTANT\n",
            );
        let mut unit = parse(FileId(0), source).expect("parse");
        bridge_includes(&mut unit, &HeaderCache::new(), &locator).expect("bridge");
        let ctx = resolve_unit(&mut unit).expect("resolve");
        check_unit(&mut unit, &ctx).expect("check");
        unit
    }

    #[test]
    fn dumps_macro_calls_with_their_arity() {
        let unit = analyzed("include pair\nint main() {\n    return ADD(1, LIMIT)\n}\n");
        let expected = "\
├─ Include
│  ├─ Path: pair
│  └─ Symbols found
│     ├─ C function macro
│     │  ├─ Identifier: ADD
│     │  └─ Arg count: 2
│     └─ C define
│        └─ Identifier: LIMIT
└─ Function
   ├─ Identifier: main
   ├─ FunctionType
   │  └─ CompoundIdentifier
   │     ├─ Identifier: int
   │     └─ Type: @int{int_sz}
   └─ Body
      └─ Return
         └─ Expression
            └─ FunctionCall
               ├─ CompoundIdentifier
               │  ├─ Identifier: ADD
               │  └─ Type: @any
               ├─ Arg count: 2
               └─ Arguments
                  ├─ Expression
                  │  └─ Number: 1
                  └─ Expression
                     └─ CompoundIdentifier
                        ├─ Identifier: LIMIT
                        └─ Type: @int{int_sz}
";
        assert_eq!(dump_unit(&unit), expected);
    }

    #[test]
    fn macro_constants_dump_their_width() {
        let unit = analyzed(
            "include macros\n\
             void main() {\n\
                 int x = CONSTANT + VALUE\n\
                 x = MACROCEPTION\n\
             }\n",
        );
        let dump = dump_unit(&unit);
        for name in ["CONSTANT", "VALUE", "MACROCEPTION"] {
            let line = format!("Identifier: {name}\n");
            let at = dump.rfind(&line).expect("identifier in body");
            let rest = &dump[at + line.len()..];
            let type_line = rest.lines().next().expect("type line");
            assert!(type_line.ends_with("Type: @int{int_sz}"), "{name}: {type_line}");
        }
    }

    #[test]
    fn dumps_are_idempotent() {
        let source = "alias ref int[4] quad\n\
                      int total(quad q, int scale = 2, int... ) {\n\
                          int sum = 0\n\
                          int i = 0\n\
                          while i < vargs.length {\n\
                              sum += vargs[i]\n\
                              i++\n\
                          }\n\
                          if sum > 10 {\n\
                              return sum * scale\n\
                          } elif sum < 0 {\n\
                              return -sum\n\
                          } else {\n\
                              return int8(sum)\n\
                          }\n\
                      }\n";
        let first = dump_unit(&analyzed(source));
        let second = dump_unit(&analyzed(source));
        assert_eq!(first, second);
        assert!(first.contains("ControlStructure: elif"));
        assert!(first.contains("Cast"));
    }

    #[test]
    fn trailing_commas_dump_identically() {
        let with = analyzed("int add(int a, int b,) {\nreturn a + b\n}\nint main() {\nreturn add(1, 2,)\n}");
        let without = analyzed("int add(int a, int b) {\nreturn a + b\n}\nint main() {\nreturn add(1, 2)\n}");
        assert_eq!(dump_unit(&with), dump_unit(&without));
    }

    #[test]
    fn unresolved_trees_have_no_type_lines() {
        let unit = parse(FileId(0), "alias int32 i32").expect("parse");
        let expected = "\
└─ Alias
   ├─ From:
   │  └─ CompoundIdentifier
   │     └─ Identifier: int32
   └─ To:
      └─ Identifier: i32
";
        assert_eq!(dump_unit(&unit), expected);
    }
}
