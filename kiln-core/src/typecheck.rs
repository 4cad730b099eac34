//! Type checking of resolved units.
//!
//! Runs after [`crate::resolve`] succeeded. Checks what a value is
//! stored into: declared variable types, parameters, return types and
//! `func<...>` targets. Omitted trailing arguments are filled in from
//! the callee's defaults, so later passes see complete calls.

use tracing::{debug, trace};

use crate::ast::{
    Binding, CallTarget, DeclId, Expression, ExprItem, Function, FunctionCall, Statement, TopLevel, UnaryOp, Unit, Value,
};
use crate::error::SemanticError;
use crate::resolve::SemanticContext;
use crate::span::Span;
use crate::types::{check_assignable, check_referent, FunctionSig, Incompatibility, Primitive, Type, Variadic};

/// Check `unit` against the declarations collected while resolving it.
pub fn check_unit(unit: &mut Unit, ctx: &SemanticContext) -> Result<(), Vec<SemanticError>> {
    let mut checker = TypeChecker {
        ctx,
        ret: None,
        expanding: Vec::new(),
        errors: Vec::new(),
    };
    for node in &mut unit.nodes {
        match node {
            TopLevel::Function(func) => checker.check_function(func),
            TopLevel::Variable(var) => {
                if let Some(assign) = &mut var.assign {
                    checker.check_expression(&mut assign.expr);
                    let ty = var.decl.map_or_else(Type::any, |id| ctx.decls.get(id).ty.clone());
                    if assign.operator.is_none() {
                        checker.check_into(&ty, &assign.expr);
                    }
                }
            }
            TopLevel::Include(_) | TopLevel::Alias(_) => {}
        }
    }
    debug!(errors = checker.errors.len(), "checked unit");
    if checker.errors.is_empty() {
        Ok(())
    } else {
        Err(checker.errors)
    }
}

struct TypeChecker<'a> {
    ctx: &'a SemanticContext,
    /// Return type of the function being checked.
    ret: Option<Type>,
    /// Functions whose defaults are being filled into a call.
    expanding: Vec<DeclId>,
    errors: Vec<SemanticError>,
}

impl TypeChecker<'_> {
    fn check_function(&mut self, func: &mut Function) {
        let Some(sig) = func.sig.clone() else {
            return;
        };
        for (param, ty) in func.params.iter_mut().zip(&sig.params) {
            if let Some(default) = &mut param.default {
                self.check_expression(default);
                self.check_into(ty, default);
            }
        }
        let Some(body) = &mut func.body else {
            return;
        };
        trace!(function = %func.name.name, %sig, "check body");
        self.ret = Some(*sig.ret);
        self.check_block(body);
        self.ret = None;
    }

    fn check_block(&mut self, body: &mut [Statement]) {
        for stmt in body {
            self.check_statement(stmt);
        }
    }

    fn check_statement(&mut self, stmt: &mut Statement) {
        match stmt {
            Statement::Expression(expr) => self.check_expression(expr),
            Statement::Declaration(var) => {
                if let Some(assign) = &mut var.assign {
                    self.check_expression(&mut assign.expr);
                    if assign.operator.is_none() {
                        let ty = var.decl.map_or_else(Type::any, |id| self.ctx.decls.get(id).ty.clone());
                        self.check_into(&ty, &assign.expr);
                    }
                }
            }
            Statement::Assignment(assign) => {
                self.check_value(&mut assign.target);
                self.check_expression(&mut assign.assign.expr);
                if assign.assign.operator.is_none() {
                    let ty = value_type(&assign.target);
                    self.check_into(&ty, &assign.assign.expr);
                }
            }
            Statement::Return(ret) => {
                if let Some(expr) = &mut ret.expr {
                    self.check_expression(expr);
                }
                self.check_return(ret.expr.as_ref(), ret.span);
            }
            Statement::Condition(cond) => {
                for branch in &mut cond.branches {
                    if let Some(expr) = &mut branch.cond {
                        self.check_expression(expr);
                    }
                    self.check_block(&mut branch.body);
                }
            }
            Statement::While(lp) => {
                self.check_expression(&mut lp.cond);
                self.check_block(&mut lp.body);
            }
            Statement::Block(block) => self.check_block(&mut block.body),
        }
    }

    fn check_return(&mut self, expr: Option<&Expression>, span: Span) {
        let Some(ret) = self.ret.clone() else {
            return;
        };
        match expr {
            Some(expr) if ret.is_void() => self.errors.push(SemanticError::TypeMismatch {
                expected: ret.to_string(),
                found: expr_type(expr).to_string(),
                span: expr.span,
            }),
            Some(expr) => self.check_into(&ret, expr),
            None if !ret.is_void() => self.errors.push(SemanticError::TypeMismatch {
                expected: ret.to_string(),
                found: Type::Primitive(Primitive::Void).to_string(),
                span,
            }),
            None => {}
        }
    }

    // ---- walking ------------------------------------------------------

    fn check_expression(&mut self, expr: &mut Expression) {
        for value in expr.values_mut() {
            self.check_value(value);
        }
    }

    fn check_value(&mut self, value: &mut Value) {
        match value {
            Value::Call(call) => self.check_call(call),
            Value::Index(access) => {
                self.check_value(&mut access.base);
                self.check_expression(&mut access.index);
            }
            Value::Reference(reference) => {
                self.check_value(&mut reference.inner);
                if !is_addressable(&reference.inner) {
                    self.errors.push(SemanticError::InvalidReferenceArgument {
                        what: reference.inner.describe(),
                        span: reference.span,
                    });
                }
            }
            Value::Prefix(unary) | Value::Suffix(unary) => self.check_value(&mut unary.value),
            Value::Paren(expr) => self.check_expression(expr),
            Value::Number(_)
            | Value::Decimal(_)
            | Value::String(_)
            | Value::Char(_)
            | Value::Bool { .. }
            | Value::Null(_)
            | Value::Identifier(_) => {}
        }
    }

    fn check_call(&mut self, call: &mut FunctionCall) {
        for arg in &mut call.args {
            self.check_expression(arg);
        }
        let (sig, callee, defaults) = match &call.target {
            Some(CallTarget::Function { decl, sig }) => {
                (sig.clone(), Some(*decl), self.ctx.decls.get(*decl).defaults.clone())
            }
            Some(CallTarget::FunctionValue { sig } | CallTarget::CFunction { sig }) => (sig.clone(), None, Vec::new()),
            Some(CallTarget::Macro { .. } | CallTarget::Cast(_)) | None => return,
        };

        let params = sig.params.len();
        let required = defaults
            .iter()
            .position(Option::is_some)
            .unwrap_or(params)
            .min(params);
        let found = call.args.len();
        if found < required || (found > params && sig.variadic.is_none()) {
            self.errors.push(SemanticError::ArgumentCount {
                name: call.callee.dotted(),
                expected: expected_count(required, params, &sig),
                found,
                span: call.span,
            });
            return;
        }

        for (index, arg) in call.args.iter().enumerate() {
            match sig.params.get(index) {
                Some(ty) => self.check_into(ty, arg),
                None => {
                    if let Some(Variadic::Typed(elem)) = &sig.variadic {
                        self.check_into(elem, arg);
                    }
                }
            }
        }

        // Trailing defaults come from the callee's declaration. A default
        // that reaches its own function again is left unfilled.
        if found < params && callee.is_none_or(|decl| !self.expanding.contains(&decl)) {
            let mut filled: Vec<Expression> = defaults[found..params].iter().flatten().cloned().collect();
            self.expand_defaults(callee, &mut filled);
            call.defaulted = filled.len();
            call.args.extend(filled);
        }
    }

    /// Fill the calls nested in copied default expressions. Their errors
    /// were reported where the defaults are declared.
    fn expand_defaults(&mut self, callee: Option<DeclId>, filled: &mut [Expression]) {
        let reported = self.errors.len();
        self.expanding.extend(callee);
        for expr in filled.iter_mut() {
            self.check_expression(expr);
        }
        if callee.is_some() {
            self.expanding.pop();
        }
        self.errors.truncate(reported);
    }

    // ---- assignability ------------------------------------------------

    /// Check a value stored into a slot of type `expected`.
    fn check_into(&mut self, expected: &Type, expr: &Expression) {
        match expr.single() {
            Some(value) => self.check_value_into(expected, value),
            None => {
                let found = expr_type(expr);
                self.check_types(expected, &found, expr.span);
            }
        }
    }

    fn check_value_into(&mut self, expected: &Type, value: &Value) {
        let span = value.span();
        if expected.is_reference() {
            // Explicit `ref` operands are validated while walking.
            let reference_ok = matches!(value, Value::Null(_) | Value::Reference(_))
                || is_addressable(value)
                || value_type(value).is_reference();
            if !reference_ok {
                self.errors.push(SemanticError::InvalidReferenceArgument {
                    what: value.describe(),
                    span,
                });
                return;
            }
            if matches!(value, Value::Null(_)) {
                return;
            }
        } else if matches!(value, Value::Reference(_)) && !expected.is_any() {
            self.errors.push(SemanticError::TypeMismatch {
                expected: expected.to_string(),
                found: value_type(value).to_string(),
                span,
            });
            return;
        }

        if value.is_literal() {
            let target = expected.strip_reference();
            if !literal_fits(value, target) {
                self.errors.push(SemanticError::TypeMismatch {
                    expected: expected.to_string(),
                    found: literal_name(value),
                    span,
                });
            }
            return;
        }
        let found = value_type(value);
        if expected.is_reference() {
            self.report(check_referent(&found, expected), expected, &found, span);
        } else {
            self.check_types(expected, &found, span);
        }
    }

    fn check_types(&mut self, expected: &Type, found: &Type, span: Span) {
        self.report(check_assignable(found, expected), expected, found, span);
    }

    fn report(&mut self, result: Result<(), Incompatibility>, expected: &Type, found: &Type, span: Span) {
        match result {
            Ok(()) => {}
            Err(Incompatibility::Signature(position)) => self.errors.push(SemanticError::FunctionTypeMismatch {
                position,
                expected: expected.strip_reference().to_string(),
                found: found.strip_reference().to_string(),
                span,
            }),
            Err(Incompatibility::Type) => self.errors.push(SemanticError::TypeMismatch {
                expected: expected.to_string(),
                found: found.to_string(),
                span,
            }),
        }
    }
}

fn expected_count(required: usize, params: usize, sig: &FunctionSig) -> String {
    if sig.variadic.is_some() {
        format!("at least {required}")
    } else if required == params {
        params.to_string()
    } else {
        format!("{required} to {params}")
    }
}

fn literal_fits(value: &Value, expected: &Type) -> bool {
    if expected.is_any() {
        return true;
    }
    match value {
        Value::Number(_) | Value::Bool { .. } => expected.is_numeric(),
        Value::Decimal(_) => expected.is_floating(),
        Value::String(_) => match expected {
            Type::Primitive(Primitive::Str) => true,
            Type::Array { elem, .. } => matches!(**elem, Type::Primitive(Primitive::Char)),
            _ => false,
        },
        Value::Char(_) => expected.is_integer(),
        Value::Null(_) => matches!(expected, Type::Primitive(Primitive::Str) | Type::Function(_)),
        _ => false,
    }
}

fn literal_name(value: &Value) -> String {
    match value {
        Value::Null(_) => "null".to_string(),
        other => value_type(other).to_string(),
    }
}

/// Values that name storage: variables, array elements and header
/// variables.
pub fn is_addressable(value: &Value) -> bool {
    match value {
        Value::Identifier(ident) => matches!(
            ident.binding(),
            Some(
                Binding::Local(_)
                    | Binding::Parameter(_)
                    | Binding::Global(_)
                    | Binding::CVariable
                    | Binding::VarArgs
            )
        ),
        Value::Index(_) => true,
        Value::Paren(expr) => expr.single().is_some_and(is_addressable),
        _ => false,
    }
}

/// Type of a resolved value.
pub fn value_type(value: &Value) -> Type {
    match value {
        Value::Number(_) => Type::int(),
        Value::Decimal(_) => Type::Primitive(Primitive::Double),
        Value::String(_) => Type::Primitive(Primitive::Str),
        Value::Char(_) => Type::Primitive(Primitive::Char),
        Value::Bool { .. } => Type::Primitive(Primitive::Bool),
        Value::Null(_) => Type::any(),
        Value::Identifier(ident) => ident.ty(),
        Value::Call(call) => match &call.target {
            Some(
                CallTarget::Function { sig, .. } | CallTarget::FunctionValue { sig } | CallTarget::CFunction { sig },
            ) => (*sig.ret).clone(),
            Some(CallTarget::Macro { result, .. }) => result.clone(),
            Some(CallTarget::Cast(ty)) => ty.clone(),
            None => Type::any(),
        },
        Value::Index(access) => match value_type(&access.base).strip_reference() {
            Type::Array { elem, .. } => (**elem).clone(),
            Type::Primitive(Primitive::Str) => Type::Primitive(Primitive::Char),
            _ => Type::any(),
        },
        Value::Reference(reference) => Type::reference(value_type(&reference.inner)),
        Value::Prefix(unary) if unary.op == UnaryOp::Not => Type::Primitive(Primitive::Bool),
        Value::Prefix(unary) | Value::Suffix(unary) => value_type(&unary.value),
        Value::Paren(expr) => expr_type(expr),
    }
}

/// Type of a flat expression: boolean for comparisons and logic,
/// otherwise the first floating operand, otherwise the first operand.
pub fn expr_type(expr: &Expression) -> Type {
    if let Some(value) = expr.single() {
        return value_type(value);
    }
    let boolean = expr.items.iter().any(|item| match item {
        ExprItem::Operator(op) => op.op.is_boolean(),
        ExprItem::Value(_) => false,
    });
    if boolean {
        return Type::Primitive(Primitive::Bool);
    }
    let types: Vec<Type> = expr
        .values()
        .map(|value| value_type(value).strip_reference().clone())
        .collect();
    types
        .iter()
        .find(|ty| ty.is_floating())
        .or_else(|| types.first())
        .cloned()
        .unwrap_or_else(Type::any)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::c_header::{bridge_includes, HeaderCache, MemoryLocator};
    use crate::error::SignaturePosition;
    use crate::parser::parse;
    use crate::resolve::resolve_unit;
    use crate::span::FileId;

    fn check_source(source: &str) -> (Unit, Result<(), Vec<SemanticError>>) {
        let locator = MemoryLocator::new().with("stdio.h", "int printf(const char *fmt, ...);\n");
        let mut unit = parse(FileId(0), source).expect("parse");
        bridge_includes(&mut unit, &HeaderCache::new(), &locator).expect("bridge");
        let ctx = resolve_unit(&mut unit).expect("resolve");
        let result = check_unit(&mut unit, &ctx);
        (unit, result)
    }

    fn check_ok(source: &str) -> Unit {
        let (unit, result) = check_source(source);
        result.expect("check");
        unit
    }

    fn check_err(source: &str) -> Vec<SemanticError> {
        check_source(source).1.expect_err("expected errors")
    }

    const INC: &str = "void inc(ref int x) {\nx += 1\n}\n";

    #[test]
    fn locals_pass_by_reference() {
        check_ok(&format!("{INC}int main() {{\nint a = 1\ninc(a)\ninc(ref a)\nreturn a\n}}"));
    }

    #[test]
    fn literals_cannot_pass_by_reference() {
        let errors = check_err(&format!("{INC}int main() {{\ninc(ref 42)\nreturn 0\n}}"));
        assert!(matches!(&errors[..], [SemanticError::InvalidReferenceArgument { .. }]));
        assert_eq!(errors[0].to_string(), "cannot pass literal `42` by reference");

        let errors = check_err(&format!("{INC}int main() {{\ninc(42)\nreturn 0\n}}"));
        assert!(matches!(&errors[..], [SemanticError::InvalidReferenceArgument { .. }]));
    }

    #[test]
    fn references_accept_null_and_elements() {
        check_ok(&format!("{INC}int main() {{\nint[4] xs\ninc(xs[0])\ninc(null)\nreturn 0\n}}"));
    }

    #[test]
    fn function_values_match_structurally() {
        check_ok("int add(int a, int b) {\nreturn a + b\n}\nint main() {\nfunc<int(int, int)> f = add\nreturn f(1, 2)\n}");

        let errors = check_err(
            "int add(int a, int b) {\nreturn a + b\n}\nint main() {\nfunc<int(int, str)> f = add\nreturn 0\n}",
        );
        let [SemanticError::FunctionTypeMismatch { position, .. }] = &errors[..] else {
            panic!("unexpected errors {errors:?}");
        };
        assert_eq!(*position, SignaturePosition::Parameter(1));
        assert_eq!(
            errors[0].to_string(),
            "function type mismatch at parameter 2: expected `func<@int{int_sz}(@int{int_sz}, @str)>`, \
             found `func<@int{int_sz}(@int{int_sz}, @int{int_sz})>`"
        );
    }

    #[test]
    fn reference_qualifiers_are_part_of_the_signature() {
        let errors = check_err(&format!("{INC}void main() {{\nfunc<void(int)> f = inc\n}}"));
        assert!(matches!(
            &errors[..],
            [SemanticError::FunctionTypeMismatch { position: SignaturePosition::Parameter(0), .. }]
        ));
        let errors = check_err("int get() {\nreturn 1\n}\nvoid main() {\nfunc<void()> f = get\n}");
        assert!(matches!(
            &errors[..],
            [SemanticError::FunctionTypeMismatch { position: SignaturePosition::Return, .. }]
        ));
    }

    #[test]
    fn defaults_fill_missing_arguments() {
        let unit = check_ok("int f(int a, int b = 7) {\nreturn a + b\n}\nint main() {\nreturn f(1)\n}");
        let TopLevel::Function(main) = &unit.nodes[1] else {
            panic!("expected main");
        };
        let Some(Statement::Return(ret)) = main.body.as_ref().and_then(|b| b.first()) else {
            panic!("expected return");
        };
        let Some(Value::Call(call)) = ret.expr.as_ref().and_then(Expression::single) else {
            panic!("expected call");
        };
        assert_eq!(call.args.len(), 2);
        assert_eq!(call.defaulted, 1);
        assert!(matches!(call.args[1].single(), Some(Value::Number(lit)) if lit.text == "7"));
    }

    #[test]
    fn nested_defaults_are_filled_too() {
        let unit = check_ok(
            "int h(int x = 1) {\nreturn x\n}\n\
             int g(int a = h()) {\nreturn a\n}\n\
             int main() {\nreturn g()\n}",
        );
        let TopLevel::Function(main) = &unit.nodes[2] else {
            panic!("expected main");
        };
        let Some(Statement::Return(ret)) = main.body.as_ref().and_then(|b| b.first()) else {
            panic!("expected return");
        };
        let Some(Value::Call(outer)) = ret.expr.as_ref().and_then(Expression::single) else {
            panic!("expected call");
        };
        assert_eq!(outer.defaulted, 1);
        let Some(Value::Call(inner)) = outer.args[0].single() else {
            panic!("expected nested call, got {:?}", outer.args[0]);
        };
        assert_eq!(inner.defaulted, 1);
        assert!(matches!(inner.args[..], [ref arg] if matches!(arg.single(), Some(Value::Number(lit)) if lit.text == "1")));
    }

    #[test]
    fn self_referencing_defaults_terminate() {
        let unit = check_ok("int f(int a = f()) {\nreturn a\n}\nint main() {\nreturn f()\n}");
        assert_eq!(unit.nodes.len(), 2);
    }

    #[test]
    fn references_need_the_exact_referenced_type() {
        let errors = check_err(&format!("{INC}int main() {{\ndouble d = 1.0\ninc(d)\nreturn 0\n}}"));
        assert!(
            matches!(&errors[..], [SemanticError::TypeMismatch { expected, found, .. }]
                if expected == "ref @int{int_sz}" && found == "@double"),
            "{errors:?}"
        );
        check_ok(&format!("{INC}int main() {{\ninc(null)\nreturn 0\n}}"));
        check_ok("void fill(ref int[] xs) {\n}\nint main() {\nint[4] xs\nfill(xs)\nreturn 0\n}");
    }

    #[test]
    fn argument_counts_are_checked() {
        let errors = check_err("int f(int a, int b = 7) {\nreturn a\n}\nint main() {\nreturn f()\n}");
        assert_eq!(errors[0].to_string(), "`f` takes 1 to 2 arguments, 0 given");
        let errors = check_err("int f(int a) {\nreturn a\n}\nint main() {\nreturn f(1, 2)\n}");
        assert_eq!(errors[0].to_string(), "`f` takes 1 argument, 2 given");
    }

    #[test]
    fn c_variadics_accept_extra_arguments() {
        check_ok("include stdio\nint main() {\nprintf(\"%d %s\\n\", 1, \"x\")\nreturn 0\n}");
        let errors = check_err("include stdio\nint main() {\nprintf()\nreturn 0\n}");
        assert_eq!(errors[0].to_string(), "`printf` takes at least 1 argument, 0 given");
    }

    #[test]
    fn typed_variadic_extras_are_checked() {
        let sum = "int sum(int... ) {\nreturn vargs.length\n}\n";
        check_ok(&format!("{sum}int main() {{\nreturn sum(1, 2, 3)\n}}"));
        let errors = check_err(&format!("{sum}int main() {{\nreturn sum(1, \"two\")\n}}"));
        assert!(matches!(&errors[..], [SemanticError::TypeMismatch { found, .. }] if found == "@str"));
    }

    #[test]
    fn literal_assignability() {
        check_ok("void main() {\ndouble d = 1\nchar c = 'x'\nstr s = \"s\"\nchar[] buf = \"b\"\nany p = null\nbool b = true\n}");
        let errors = check_err("void main() {\nstr s = 42\nint i = \"x\"\nint j = 1.5\n}");
        let found: Vec<String> = errors
            .iter()
            .map(|err| match err {
                SemanticError::TypeMismatch { found, .. } => found.clone(),
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(found, vec!["@int{int_sz}", "@str", "@double"]);
    }

    #[test]
    fn return_values_match_the_function() {
        let errors = check_err("void f() {\nreturn 1\n}\nint g() {\nreturn\n}");
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|err| matches!(err, SemanticError::TypeMismatch { .. })));
    }

    #[test]
    fn expression_types_follow_their_operands() {
        let unit = check_ok("int main() {\nbool b = 1 < 2\ndouble d = 1 + 2.5\nreturn 1 + 2\n}");
        assert_eq!(unit.nodes.len(), 1);
    }
}
