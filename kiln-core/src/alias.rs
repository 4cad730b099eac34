//! Alias/type table.
//!
//! Each unit layers its own aliases over the process-wide builtin
//! table. Entries are either type aliases (`alias int32 i32`, header
//! typedefs) or value aliases (object-like macros). Chains are checked
//! for cycles when an entry is defined, so resolution always
//! terminates.

use std::collections::HashMap;

use tracing::trace;

use crate::ast::{Binding, Resolution, TypeExpr, VariadicExpr};
use crate::builtins::find_builtin;
use crate::error::AliasError;
use crate::span::Span;
use crate::types::{FunctionSig, Type, Variadic};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AliasKind {
    /// Usable in type position.
    Type,
    /// Macro constant: usable as a value only.
    Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AliasTarget {
    /// Another alias or builtin, by name.
    Name { name: String, span: Span },
    /// `ref`, array or `func<>` type built from other names.
    Composite(TypeExpr),
    /// Already concrete.
    Terminal(Type),
}

#[derive(Debug, Clone, PartialEq)]
struct AliasEntry {
    target: AliasTarget,
    kind: AliasKind,
    span: Span,
}

#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    entries: HashMap<String, AliasEntry>,
}

impl AliasTable {
    pub fn new() -> Self {
        AliasTable::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Kind of a builtin or defined name.
    pub fn kind(&self, name: &str) -> Option<AliasKind> {
        if find_builtin(name).is_some() {
            return Some(AliasKind::Type);
        }
        self.entries.get(name).map(|entry| entry.kind)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.kind(name).is_some()
    }

    /// Span of the definition; `None` for builtins and unknown names.
    pub fn definition_span(&self, name: &str) -> Option<Span> {
        self.entries.get(name).map(|entry| entry.span)
    }

    /// Add an alias. Targets may name entries defined later; a target
    /// that leads back to `name` is rejected and nothing is recorded.
    pub fn define(&mut self, name: &str, target: AliasTarget, kind: AliasKind, span: Span) -> Result<(), AliasError> {
        if self.contains(name) {
            return Err(AliasError::Duplicate {
                name: name.to_string(),
                span,
            });
        }
        trace!(%name, ?kind, "define alias");
        self.entries
            .insert(name.to_string(), AliasEntry { target, kind, span });

        let mut chain = vec![name.to_string()];
        if self.leads_to(name, name, &mut chain) {
            self.entries.remove(name);
            return Err(AliasError::Cycle { chain, span });
        }
        Ok(())
    }

    /// Depth-first search from `current` for `start`. On success
    /// `chain` holds the path, `start` at both ends.
    fn leads_to(&self, current: &str, start: &str, chain: &mut Vec<String>) -> bool {
        let Some(entry) = self.entries.get(current) else {
            return false;
        };
        for next in referenced_names(&entry.target) {
            if next == start {
                chain.push(next);
                return true;
            }
            if chain.contains(&next) {
                continue;
            }
            chain.push(next.clone());
            if self.leads_to(&next, start, chain) {
                return true;
            }
            chain.pop();
        }
        false
    }

    /// Follow `name` to a concrete type. Value aliases resolve like
    /// type aliases; [`AliasTable::resolve_type`] rejects them.
    pub fn resolve(&self, name: &str, span: Span) -> Result<Type, AliasError> {
        self.resolve_with(name, span, &mut Vec::new())
    }

    /// Resolve a name used in type position.
    pub fn resolve_type(&self, name: &str, span: Span) -> Result<Type, AliasError> {
        if self.kind(name) == Some(AliasKind::Value) {
            return Err(AliasError::NotAType {
                name: name.to_string(),
                span,
            });
        }
        self.resolve(name, span)
    }

    fn resolve_with(&self, name: &str, span: Span, visiting: &mut Vec<String>) -> Result<Type, AliasError> {
        if let Some(builtin) = find_builtin(name) {
            return Ok(Type::Primitive(builtin.primitive));
        }
        let entry = self.entries.get(name).ok_or_else(|| AliasError::Unknown {
            name: name.to_string(),
            span,
        })?;
        if visiting.iter().any(|seen| seen == name) {
            visiting.push(name.to_string());
            return Err(AliasError::Cycle {
                chain: visiting.clone(),
                span,
            });
        }
        visiting.push(name.to_string());
        let ty = match &entry.target {
            AliasTarget::Terminal(ty) => ty.clone(),
            AliasTarget::Name { name: next, span } => self.resolve_with(next, *span, visiting)?,
            AliasTarget::Composite(expr) => self.expr_type(expr, visiting)?,
        };
        visiting.pop();
        Ok(ty)
    }

    fn expr_type(&self, expr: &TypeExpr, visiting: &mut Vec<String>) -> Result<Type, AliasError> {
        Ok(match expr {
            TypeExpr::Named(ident) => {
                let name = ident.dotted();
                if self.kind(&name) == Some(AliasKind::Value) {
                    return Err(AliasError::NotAType { name, span: ident.span });
                }
                self.resolve_with(&name, ident.span, visiting)?
            }
            TypeExpr::Reference { inner, .. } => Type::reference(self.expr_type(inner, visiting)?),
            TypeExpr::Array { elem, length, .. } => Type::array(self.expr_type(elem, visiting)?, *length),
            TypeExpr::Function(func) => {
                let ret = self.expr_type(&func.ret, visiting)?;
                let params = func
                    .params
                    .iter()
                    .map(|param| self.expr_type(param, visiting))
                    .collect::<Result<Vec<_>, _>>()?;
                let variadic = match &func.variadic {
                    None => None,
                    Some(VariadicExpr::C) => Some(Variadic::C),
                    Some(VariadicExpr::Typed(elem)) => Some(Variadic::Typed(Box::new(self.expr_type(elem, visiting)?))),
                };
                Type::Function(FunctionSig::new(ret, params, variadic))
            }
        })
    }

    /// Resolve a type expression and record the type of every name in it.
    pub fn annotate(&self, expr: &mut TypeExpr) -> Result<Type, AliasError> {
        Ok(match expr {
            TypeExpr::Named(ident) => {
                let ty = self.resolve_type(&ident.dotted(), ident.span)?;
                ident.resolved = Some(Resolution {
                    binding: Binding::Type,
                    ty: ty.clone(),
                });
                ty
            }
            TypeExpr::Reference { inner, .. } => Type::reference(self.annotate(inner)?),
            TypeExpr::Array { elem, length, .. } => Type::array(self.annotate(elem)?, *length),
            TypeExpr::Function(func) => {
                let ret = self.annotate(&mut func.ret)?;
                let params = func
                    .params
                    .iter_mut()
                    .map(|param| self.annotate(param))
                    .collect::<Result<Vec<_>, _>>()?;
                let variadic = match &mut func.variadic {
                    None => None,
                    Some(VariadicExpr::C) => Some(Variadic::C),
                    Some(VariadicExpr::Typed(elem)) => Some(Variadic::Typed(Box::new(self.annotate(elem)?))),
                };
                Type::Function(FunctionSig::new(ret, params, variadic))
            }
        })
    }
}

fn referenced_names(target: &AliasTarget) -> Vec<String> {
    fn walk(expr: &TypeExpr, out: &mut Vec<String>) {
        match expr {
            TypeExpr::Named(ident) => out.push(ident.dotted()),
            TypeExpr::Reference { inner, .. } => walk(inner, out),
            TypeExpr::Array { elem, .. } => walk(elem, out),
            TypeExpr::Function(func) => {
                walk(&func.ret, out);
                func.params.iter().for_each(|param| walk(param, out));
                if let Some(VariadicExpr::Typed(elem)) = &func.variadic {
                    walk(elem, out);
                }
            }
        }
    }

    match target {
        AliasTarget::Name { name, .. } => vec![name.clone()],
        AliasTarget::Composite(expr) => {
            let mut out = Vec::new();
            walk(expr, &mut out);
            out
        }
        AliasTarget::Terminal(_) => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::TopLevel;
    use crate::parser::parse;
    use crate::span::FileId;
    use crate::types::Primitive;

    fn name(target: &str) -> AliasTarget {
        AliasTarget::Name {
            name: target.to_string(),
            span: Span::default(),
        }
    }

    fn alias_target(source: &str) -> TypeExpr {
        let unit = parse(FileId(0), source).expect("parse");
        match unit.nodes.into_iter().next() {
            Some(TopLevel::Alias(alias)) => alias.target,
            other => panic!("expected alias, got {other:?}"),
        }
    }

    #[test]
    fn builtins_resolve_without_definitions() {
        let table = AliasTable::new();
        assert_eq!(table.resolve("int", Span::default()), Ok(Type::int()));
        assert_eq!(table.kind("c_long"), Some(AliasKind::Type));
    }

    #[test]
    fn chains_resolve_transitively() {
        let mut table = AliasTable::new();
        table
            .define("MACROCEPTION", name("CONSTANT"), AliasKind::Value, Span::default())
            .expect("forward reference");
        table
            .define("CONSTANT", AliasTarget::Terminal(Type::int()), AliasKind::Value, Span::default())
            .expect("constant");
        let ty = table.resolve("MACROCEPTION", Span::default()).expect("resolves");
        assert_eq!(ty.to_string(), "@int{int_sz}");
    }

    #[test]
    fn self_alias_is_a_cycle() {
        let mut table = AliasTable::new();
        let err = table
            .define("loop", name("loop"), AliasKind::Type, Span::default())
            .expect_err("cycle");
        assert_eq!(err.to_string(), "alias cycle: loop -> loop");
        assert!(!table.contains("loop"));
    }

    #[test]
    fn longer_cycles_name_the_chain() {
        let mut table = AliasTable::new();
        table.define("a", name("b"), AliasKind::Type, Span::default()).expect("a");
        table.define("b", name("c"), AliasKind::Type, Span::default()).expect("b");
        let err = table.define("c", name("a"), AliasKind::Type, Span::default()).expect_err("cycle");
        assert!(matches!(&err, AliasError::Cycle { chain, .. } if chain == &["c", "a", "b", "c"]));
    }

    #[test]
    fn composite_cycles_are_detected() {
        let mut table = AliasTable::new();
        let err = table
            .define("node", AliasTarget::Composite(alias_target("alias ref node[] x")), AliasKind::Type, Span::default())
            .expect_err("cycle");
        assert!(matches!(err, AliasError::Cycle { .. }));
    }

    #[test]
    fn composite_targets_build_types() {
        let mut table = AliasTable::new();
        table
            .define("ints", AliasTarget::Composite(alias_target("alias ref int[4] x")), AliasKind::Type, Span::default())
            .expect("ints");
        let ty = table.resolve_type("ints", Span::default()).expect("ints");
        assert_eq!(ty, Type::reference(Type::array(Type::int(), Some(4))));
    }

    #[test]
    fn unknown_and_duplicate_names() {
        let mut table = AliasTable::new();
        table.define("dangling", name("missing"), AliasKind::Type, Span::default()).expect("defined");
        assert!(matches!(
            table.resolve("dangling", Span::default()),
            Err(AliasError::Unknown { name, .. }) if name == "missing"
        ));
        assert!(matches!(
            table.define("int", name("double"), AliasKind::Type, Span::default()),
            Err(AliasError::Duplicate { .. })
        ));
        assert!(matches!(
            table.define("dangling", name("double"), AliasKind::Type, Span::default()),
            Err(AliasError::Duplicate { .. })
        ));
    }

    #[test]
    fn values_are_not_types() {
        let mut table = AliasTable::new();
        table
            .define("LIMIT", AliasTarget::Terminal(Type::Primitive(Primitive::Str)), AliasKind::Value, Span::default())
            .expect("LIMIT");
        assert!(matches!(
            table.resolve_type("LIMIT", Span::default()),
            Err(AliasError::NotAType { .. })
        ));
        let mut expr = alias_target("alias LIMIT[] x");
        assert!(matches!(table.annotate(&mut expr), Err(AliasError::NotAType { .. })));
    }

    #[test]
    fn annotate_records_leaf_types() {
        let table = AliasTable::new();
        let mut expr = alias_target("alias func<int(ref double, str...)> cb");
        let ty = table.annotate(&mut expr).expect("annotate");
        assert_eq!(ty.to_string(), "func<@int{int_sz}(ref @double, @str...)>");
        let TypeExpr::Function(func) = &expr else {
            panic!("expected function type");
        };
        let TypeExpr::Named(ret) = func.ret.as_ref() else {
            panic!("expected named return");
        };
        assert_eq!(ret.ty(), Type::int());
    }
}
