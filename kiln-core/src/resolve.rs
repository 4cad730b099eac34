//! Name resolution.
//!
//! Binds every compound identifier of a unit to exactly one
//! declaration: a local, a parameter, a global, a function, a type, or
//! a symbol bridged from an included C header. Top-level declarations
//! are visible everywhere in the unit; locals only after their
//! declaration. Errors are collected for the whole unit.

use std::collections::HashMap;

use tracing::{debug, trace, warn};

use crate::alias::{AliasKind, AliasTable, AliasTarget};
use crate::ast::{
    Binding, CallTarget, CompoundIdentifier, DeclId, Expression, Function, FunctionCall, Resolution, Statement,
    TopLevel, TypeExpr, Unit, Value, VariableDeclaration, VariadicExpr,
};
use crate::c_header::{HeaderSymbol, MacroValue};
use crate::error::SemanticError;
use crate::span::Span;
use crate::types::{FunctionSig, Type, Variadic};

// ---------------------------------------------------------------------
// Declaration table
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
    Global,
    Local,
    Parameter,
    Function,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeclInfo {
    pub name: String,
    pub span: Span,
    pub kind: DeclKind,
    pub ty: Type,
    /// Resolved parameter defaults of a function, one slot per parameter.
    pub defaults: Vec<Option<Expression>>,
    /// Declaration order among globals.
    pub order: usize,
    /// Functions only: a body has been seen.
    pub defined: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeclTable {
    decls: Vec<DeclInfo>,
}

impl DeclTable {
    pub fn push(&mut self, info: DeclInfo) -> DeclId {
        let id = DeclId(self.decls.len() as u32);
        self.decls.push(info);
        id
    }

    pub fn get(&self, id: DeclId) -> &DeclInfo {
        &self.decls[id.0 as usize]
    }

    fn get_mut(&mut self, id: DeclId) -> &mut DeclInfo {
        &mut self.decls[id.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.decls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decls.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (DeclId, &DeclInfo)> {
        self.decls
            .iter()
            .enumerate()
            .map(|(index, info)| (DeclId(index as u32), info))
    }
}

/// Callable or variable symbol from an included header. Constants and
/// typedefs live in the [`AliasTable`].
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeSymbol {
    FunctionMacro { arity: usize, variadic: bool, result: Type },
    Function(FunctionSig),
    Variable(Type),
}

/// Everything later passes need to know about a resolved unit.
#[derive(Debug, Clone, Default)]
pub struct SemanticContext {
    pub decls: DeclTable,
    pub aliases: AliasTable,
    pub bridge: HashMap<String, BridgeSymbol>,
}

impl SemanticContext {
    /// Signature of a function declaration.
    pub fn function_sig(&self, id: DeclId) -> Option<&FunctionSig> {
        match &self.decls.get(id).ty {
            Type::Function(sig) => Some(sig),
            _ => None,
        }
    }
}

/// Resolve every identifier of `unit`, whose includes must already be
/// bridged.
pub fn resolve_unit(unit: &mut Unit) -> Result<SemanticContext, Vec<SemanticError>> {
    let mut resolver = Resolver::default();
    resolver.register_bridge(unit);
    resolver.register_aliases(unit);
    resolver.declare_top_level(unit);
    for node in &mut unit.nodes {
        match node {
            TopLevel::Function(func) => resolver.resolve_function(func),
            TopLevel::Variable(var) => resolver.resolve_global(var),
            TopLevel::Include(_) | TopLevel::Alias(_) => {}
        }
    }
    debug!(
        decls = resolver.ctx.decls.len(),
        aliases = resolver.ctx.aliases.len(),
        bridged = resolver.ctx.bridge.len(),
        errors = resolver.errors.len(),
        "resolved unit"
    );
    if resolver.errors.is_empty() {
        Ok(resolver.ctx)
    } else {
        Err(resolver.errors)
    }
}

// ---------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------

#[derive(Default)]
struct Resolver {
    ctx: SemanticContext,
    /// `scopes[0]` is the unit scope.
    scopes: Vec<HashMap<String, DeclId>>,
    /// Element type of the current function's typed variadic.
    vargs: Option<Type>,
    /// While resolving a global initializer, globals at or after this
    /// position are not visible yet.
    global_limit: Option<usize>,
    errors: Vec<SemanticError>,
}

impl Resolver {
    fn error(&mut self, err: impl Into<SemanticError>) {
        self.errors.push(err.into());
    }

    // ---- top level ----------------------------------------------------

    fn register_bridge(&mut self, unit: &Unit) {
        let mut macros = Vec::new();
        for node in &unit.nodes {
            let TopLevel::Include(include) = node else {
                continue;
            };
            let Some(table) = &include.symbols else {
                continue;
            };
            for symbol in &table.symbols {
                let name = symbol.name();
                if self.ctx.aliases.contains(name) || self.ctx.bridge.contains_key(name) {
                    trace!(%name, "header symbol already known");
                    continue;
                }
                let defined = match symbol {
                    HeaderSymbol::Constant { value, .. } => {
                        let target = match value {
                            MacroValue::Alias(other) => AliasTarget::Name {
                                name: other.clone(),
                                span: include.span,
                            },
                            literal => AliasTarget::Terminal(literal.literal_type().unwrap_or_else(Type::any)),
                        };
                        self.ctx.aliases.define(name, target, AliasKind::Value, include.span)
                    }
                    HeaderSymbol::Typedef { target, .. } => self.ctx.aliases.define(
                        name,
                        AliasTarget::Terminal(target.clone()),
                        AliasKind::Type,
                        include.span,
                    ),
                    HeaderSymbol::FunctionMacro { arity, variadic, value, .. } => {
                        macros.push((name.to_string(), *arity, *variadic, value.clone(), include.span));
                        self.ctx.bridge.insert(
                            name.to_string(),
                            BridgeSymbol::FunctionMacro {
                                arity: *arity,
                                variadic: *variadic,
                                result: Type::any(),
                            },
                        );
                        Ok(())
                    }
                    HeaderSymbol::Function { sig, .. } => {
                        self.ctx.bridge.insert(name.to_string(), BridgeSymbol::Function(sig.clone()));
                        Ok(())
                    }
                    HeaderSymbol::Variable { ty, .. } => {
                        self.ctx.bridge.insert(name.to_string(), BridgeSymbol::Variable(ty.clone()));
                        Ok(())
                    }
                };
                if let Err(err) = defined {
                    warn!(header = %include.header_name(), "skipping `{name}`: {err}");
                }
            }
        }

        // Macro results may name constants from any header.
        for (name, arity, variadic, value, span) in macros {
            let result = match value {
                MacroValue::Alias(other) => self.ctx.aliases.resolve(&other, span).unwrap_or_else(|_| Type::any()),
                literal => literal.literal_type().unwrap_or_else(Type::any),
            };
            self.ctx
                .bridge
                .insert(name, BridgeSymbol::FunctionMacro { arity, variadic, result });
        }
    }

    fn register_aliases(&mut self, unit: &mut Unit) {
        let mut defined = Vec::new();
        for (index, node) in unit.nodes.iter().enumerate() {
            let TopLevel::Alias(alias) = node else {
                continue;
            };
            let target = match &alias.target {
                TypeExpr::Named(ident) if ident.elems.len() == 1 => AliasTarget::Name {
                    name: ident.dotted(),
                    span: ident.span,
                },
                other => AliasTarget::Composite(other.clone()),
            };
            match self
                .ctx
                .aliases
                .define(&alias.name.name, target, AliasKind::Type, alias.name.span)
            {
                Ok(()) => defined.push(index),
                Err(err) => self.error(err),
            }
        }
        for index in defined {
            if let TopLevel::Alias(alias) = &mut unit.nodes[index] {
                if let Err(err) = self.ctx.aliases.annotate(&mut alias.target) {
                    self.error(err);
                }
            }
        }
    }

    fn declare_top_level(&mut self, unit: &mut Unit) {
        self.scopes = vec![HashMap::new()];
        let mut globals = 0;
        for node in &mut unit.nodes {
            match node {
                TopLevel::Function(func) => self.declare_function(func),
                TopLevel::Variable(var) => {
                    let ty = self.annotate_type(&mut var.ty);
                    let id = self.declare(&var.name.name, var.name.span, DeclKind::Global, ty, globals);
                    var.decl = id;
                    globals += 1;
                }
                TopLevel::Include(_) | TopLevel::Alias(_) => {}
            }
        }
    }

    fn declare_function(&mut self, func: &mut Function) {
        let ret = self.annotate_type(&mut func.ret);
        let params = func
            .params
            .iter_mut()
            .map(|param| self.annotate_type(&mut param.ty))
            .collect::<Vec<_>>();
        let variadic = match &mut func.variadic {
            None => None,
            Some(VariadicExpr::C) => Some(Variadic::C),
            Some(VariadicExpr::Typed(elem)) => Some(Variadic::Typed(Box::new(self.annotate_type(elem)))),
        };
        let sig = FunctionSig::new(ret, params, variadic);
        func.sig = Some(sig.clone());

        let name = &func.name.name;
        let has_body = func.body.is_some();
        if let Some(&existing) = self.scopes[0].get(name) {
            let info = self.ctx.decls.get_mut(existing);
            // A prototype and one definition may share a declaration.
            if info.kind == DeclKind::Function && info.ty == Type::Function(sig.clone()) && !(info.defined && has_body) {
                info.defined |= has_body;
                func.decl = Some(existing);
                return;
            }
            self.error(SemanticError::Redefinition {
                name: name.clone(),
                span: func.name.span,
            });
            return;
        }
        if self.ctx.aliases.contains(name) {
            self.error(SemanticError::Redefinition {
                name: name.clone(),
                span: func.name.span,
            });
            return;
        }
        let id = self.ctx.decls.push(DeclInfo {
            name: name.clone(),
            span: func.name.span,
            kind: DeclKind::Function,
            ty: Type::Function(sig),
            defaults: vec![None; func.params.len()],
            order: 0,
            defined: has_body,
        });
        self.scopes[0].insert(name.clone(), id);
        func.decl = Some(id);
    }

    /// Declare a name in the innermost scope.
    fn declare(&mut self, name: &str, span: Span, kind: DeclKind, ty: Type, order: usize) -> Option<DeclId> {
        let global = self.scopes.len() == 1;
        let taken = self.scopes.last().is_some_and(|scope| scope.contains_key(name))
            || (global && self.ctx.aliases.contains(name));
        if taken {
            self.error(SemanticError::Redefinition {
                name: name.to_string(),
                span,
            });
            return None;
        }
        trace!(%name, ?kind, %ty, depth = self.scopes.len(), "declare");
        let id = self.ctx.decls.push(DeclInfo {
            name: name.to_string(),
            span,
            kind,
            ty,
            defaults: Vec::new(),
            order,
            defined: false,
        });
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), id);
        }
        Some(id)
    }

    fn annotate_type(&mut self, expr: &mut TypeExpr) -> Type {
        match self.ctx.aliases.annotate(expr) {
            Ok(ty) => ty,
            Err(err) => {
                self.error(err);
                Type::any()
            }
        }
    }

    // ---- bodies -------------------------------------------------------

    fn resolve_function(&mut self, func: &mut Function) {
        // Defaults see the unit scope only, never the caller's.
        for (index, param) in func.params.iter_mut().enumerate() {
            if let Some(default) = &mut param.default {
                self.resolve_expression(default);
                if let Some(decl) = func.decl {
                    let info = self.ctx.decls.get_mut(decl);
                    if let Some(slot) = info.defaults.get_mut(index) {
                        *slot = Some(default.clone());
                    }
                }
            }
        }

        let Some(body) = &mut func.body else {
            return;
        };
        let params = func.sig.as_ref().map(|sig| sig.params.clone()).unwrap_or_default();
        self.vargs = match func.sig.as_ref().and_then(|sig| sig.variadic.as_ref()) {
            Some(Variadic::Typed(elem)) => Some((**elem).clone()),
            _ => None,
        };
        self.push_scope(&func.name.name);
        for (param, ty) in func.params.iter().zip(params) {
            self.declare(&param.name.name, param.name.span, DeclKind::Parameter, ty, 0);
        }
        self.resolve_block(body);
        self.pop_scope(&func.name.name);
        self.vargs = None;
    }

    fn resolve_global(&mut self, var: &mut VariableDeclaration) {
        let Some(assign) = &mut var.assign else {
            return;
        };
        self.global_limit = var.decl.map(|id| self.ctx.decls.get(id).order);
        self.resolve_expression(&mut assign.expr);
        self.global_limit = None;
    }

    fn push_scope(&mut self, owner: &str) {
        self.scopes.push(HashMap::new());
        trace!(%owner, depth = self.scopes.len(), "enter scope");
    }

    fn pop_scope(&mut self, owner: &str) {
        trace!(%owner, depth = self.scopes.len(), "leave scope");
        self.scopes.pop();
    }

    fn resolve_block(&mut self, body: &mut [Statement]) {
        for stmt in body {
            self.resolve_statement(stmt);
        }
    }

    fn resolve_scoped(&mut self, owner: &str, body: &mut [Statement]) {
        self.push_scope(owner);
        self.resolve_block(body);
        self.pop_scope(owner);
    }

    fn resolve_statement(&mut self, stmt: &mut Statement) {
        match stmt {
            Statement::Expression(expr) => self.resolve_expression(expr),
            Statement::Declaration(var) => {
                let ty = self.annotate_type(&mut var.ty);
                // The initializer cannot see the variable it initializes.
                if let Some(assign) = &mut var.assign {
                    self.resolve_expression(&mut assign.expr);
                }
                var.decl = self.declare(&var.name.name, var.name.span, DeclKind::Local, ty, 0);
            }
            Statement::Assignment(assign) => {
                self.resolve_value(&mut assign.target);
                self.resolve_expression(&mut assign.assign.expr);
            }
            Statement::Return(ret) => {
                if let Some(expr) = &mut ret.expr {
                    self.resolve_expression(expr);
                }
            }
            Statement::Condition(cond) => {
                for branch in &mut cond.branches {
                    if let Some(expr) = &mut branch.cond {
                        self.resolve_expression(expr);
                    }
                    self.resolve_scoped("branch", &mut branch.body);
                }
            }
            Statement::While(lp) => {
                self.resolve_expression(&mut lp.cond);
                self.resolve_scoped("while", &mut lp.body);
            }
            Statement::Block(block) => self.resolve_scoped("block", &mut block.body),
        }
    }

    fn resolve_expression(&mut self, expr: &mut Expression) {
        for value in expr.values_mut() {
            self.resolve_value(value);
        }
    }

    fn resolve_value(&mut self, value: &mut Value) {
        match value {
            Value::Identifier(ident) => {
                let Some(resolution) = self.lookup(ident) else {
                    return;
                };
                match resolution.binding {
                    Binding::Type => self.error(SemanticError::NotAValue {
                        name: ident.dotted(),
                        what: "type",
                        span: ident.span,
                    }),
                    Binding::MacroFunction { .. } => self.error(SemanticError::NotAValue {
                        name: ident.dotted(),
                        what: "function macro",
                        span: ident.span,
                    }),
                    _ => {}
                }
                ident.resolved = Some(resolution);
            }
            Value::Call(call) => self.resolve_call(call),
            Value::Index(access) => {
                self.resolve_value(&mut access.base);
                self.resolve_expression(&mut access.index);
            }
            Value::Reference(reference) => self.resolve_value(&mut reference.inner),
            Value::Prefix(unary) | Value::Suffix(unary) => self.resolve_value(&mut unary.value),
            Value::Paren(expr) => self.resolve_expression(expr),
            Value::Number(_)
            | Value::Decimal(_)
            | Value::String(_)
            | Value::Char(_)
            | Value::Bool { .. }
            | Value::Null(_) => {}
        }
    }

    fn resolve_call(&mut self, call: &mut FunctionCall) {
        for arg in &mut call.args {
            self.resolve_expression(arg);
        }
        let Some(resolution) = self.lookup(&call.callee) else {
            return;
        };
        let name = call.callee.dotted();
        let found = call.args.len();
        let target = match &resolution.binding {
            Binding::Function(decl) => match &resolution.ty {
                Type::Function(sig) => Some(CallTarget::Function {
                    decl: *decl,
                    sig: sig.clone(),
                }),
                _ => None,
            },
            Binding::CFunction => resolution
                .ty
                .as_function()
                .map(|sig| CallTarget::CFunction { sig: sig.clone() }),
            Binding::Local(_) | Binding::Parameter(_) | Binding::Global(_) | Binding::CVariable => resolution
                .ty
                .as_function()
                .map(|sig| CallTarget::FunctionValue { sig: sig.clone() }),
            Binding::MacroFunction { arity, variadic } => {
                let accepted = if *variadic { found >= *arity } else { found == *arity };
                if !accepted {
                    let expected = if *variadic {
                        format!("at least {arity}")
                    } else {
                        arity.to_string()
                    };
                    self.error(SemanticError::MacroArityMismatch {
                        name: name.clone(),
                        expected,
                        found,
                        span: call.span,
                    });
                }
                Some(CallTarget::Macro {
                    arity: *arity,
                    variadic: *variadic,
                    result: resolution.ty.clone(),
                })
            }
            Binding::Type => {
                if found != 1 {
                    self.error(SemanticError::ArgumentCount {
                        name: name.clone(),
                        expected: "1".to_string(),
                        found,
                        span: call.span,
                    });
                }
                Some(CallTarget::Cast(resolution.ty.clone()))
            }
            Binding::MacroConstant | Binding::VarArgs | Binding::VarArgsLength => None,
        };
        if target.is_none() {
            self.error(SemanticError::NotCallable {
                name,
                span: call.callee.span,
            });
        }
        call.target = target;
        call.callee.resolved = Some(resolution);
    }

    // ---- lookup -------------------------------------------------------

    /// Innermost declaration, then the typed variadic, then header
    /// symbols, then types. Reports unresolved names.
    fn lookup(&mut self, ident: &CompoundIdentifier) -> Option<Resolution> {
        let found = match ident.elems.as_slice() {
            [single] => self.lookup_name(&single.name, ident.span),
            [base, member] if base.name == "vargs" && member.name == "length" && self.vargs.is_some() => {
                Some(Resolution {
                    binding: Binding::VarArgsLength,
                    ty: Type::int(),
                })
            }
            _ => None,
        };
        if found.is_none() {
            self.error(SemanticError::UnresolvedIdentifier {
                name: ident.dotted(),
                span: ident.span,
            });
        }
        found
    }

    fn lookup_name(&mut self, name: &str, span: Span) -> Option<Resolution> {
        for (depth, scope) in self.scopes.iter().enumerate().rev() {
            let Some(&id) = scope.get(name) else {
                continue;
            };
            let info = self.ctx.decls.get(id);
            if depth == 0
                && info.kind == DeclKind::Global
                && self.global_limit.is_some_and(|limit| info.order >= limit)
            {
                continue;
            }
            let binding = match info.kind {
                DeclKind::Global => Binding::Global(id),
                DeclKind::Local => Binding::Local(id),
                DeclKind::Parameter => Binding::Parameter(id),
                DeclKind::Function => Binding::Function(id),
            };
            return Some(Resolution {
                binding,
                ty: info.ty.clone(),
            });
        }

        if name == "vargs" {
            if let Some(elem) = &self.vargs {
                return Some(Resolution {
                    binding: Binding::VarArgs,
                    ty: Type::array(elem.clone(), None),
                });
            }
        }

        match self.ctx.aliases.kind(name) {
            Some(AliasKind::Value) => {
                // Constants whose body names something other than a
                // constant have no usable type.
                let ty = self.ctx.aliases.resolve(name, span).unwrap_or_else(|_| Type::any());
                return Some(Resolution {
                    binding: Binding::MacroConstant,
                    ty,
                });
            }
            Some(AliasKind::Type) => {
                let ty = match self.ctx.aliases.resolve(name, span) {
                    Ok(ty) => ty,
                    Err(err) => {
                        self.error(err);
                        Type::any()
                    }
                };
                return Some(Resolution {
                    binding: Binding::Type,
                    ty,
                });
            }
            None => {}
        }

        self.ctx.bridge.get(name).map(|symbol| match symbol {
            BridgeSymbol::FunctionMacro { arity, variadic, result } => Resolution {
                binding: Binding::MacroFunction {
                    arity: *arity,
                    variadic: *variadic,
                },
                ty: result.clone(),
            },
            BridgeSymbol::Function(sig) => Resolution {
                binding: Binding::CFunction,
                ty: Type::Function(sig.clone()),
            },
            BridgeSymbol::Variable(ty) => Resolution {
                binding: Binding::CVariable,
                ty: ty.clone(),
            },
        })
    }
}
