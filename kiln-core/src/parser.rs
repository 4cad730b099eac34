//! Recursive descent parser producing [`Unit`]s.
//!
//! Declarations and expression statements share a prefix (`a[4] x`
//! against `a[4] = x`), so statements first try a declaration and
//! rewind to the saved position when it does not fit.

use tracing::{debug, trace};

use crate::ast::*;
use crate::error::{CoreError, ParseError, ParseErrorKind};
use crate::lexer::{Token, TokenKind, lex};
use crate::span::{FileId, Span};

/// Lex and parse one source file.
pub fn parse(file: FileId, source: &str) -> Result<Unit, CoreError> {
    let tokens = lex(file, source)?;
    debug!(tokens = tokens.len(), "lexed unit");
    Ok(parse_tokens(file, source, tokens)?)
}

pub fn parse_tokens(file: FileId, source: &str, tokens: Vec<Token>) -> Result<Unit, ParseError> {
    let mut parser = Parser {
        file,
        source,
        tokens,
        position: 0,
    };
    parser.parse_unit()
}

type PResult<T> = Result<T, ParseError>;

struct Parser<'src> {
    file: FileId,
    source: &'src str,
    tokens: Vec<Token>,
    position: usize,
}

impl<'src> Parser<'src> {
    fn parse_unit(&mut self) -> PResult<Unit> {
        let mut nodes = Vec::new();
        while !self.at(TokenKind::Eof) {
            let node = match self.peek_kind() {
                TokenKind::Include => TopLevel::Include(self.parse_include()?),
                TokenKind::Alias => TopLevel::Alias(self.parse_alias()?),
                _ => self.parse_declaration()?,
            };
            self.eat(TokenKind::Semi);
            nodes.push(node);
        }
        trace!(nodes = nodes.len(), "parsed unit");
        Ok(Unit {
            file: self.file,
            nodes,
        })
    }

    // ----------------------------------------------------------------
    // Top level
    // ----------------------------------------------------------------

    fn parse_include(&mut self) -> PResult<Include> {
        let start = self.expect(TokenKind::Include)?.span;
        let mut path = vec![self.parse_identifier()?];
        while self.eat(TokenKind::Slash) {
            path.push(self.parse_identifier()?);
        }
        let end = path.last().map_or(start, |segment| segment.span);
        Ok(Include {
            span: start.to(end),
            path,
            symbols: None,
        })
    }

    fn parse_alias(&mut self) -> PResult<Alias> {
        let start = self.expect(TokenKind::Alias)?.span;
        let target = self.parse_type()?;
        let name = self.parse_identifier()?;
        Ok(Alias {
            span: start.to(name.span),
            target,
            name,
        })
    }

    /// Function or global variable: both start with `type IDENT`.
    fn parse_declaration(&mut self) -> PResult<TopLevel> {
        let ty = self.parse_type()?;
        let name = self.parse_identifier()?;
        if self.at(TokenKind::LParen) {
            return Ok(TopLevel::Function(self.parse_function(ty, name)?));
        }
        Ok(TopLevel::Variable(self.finish_variable(ty, name)?))
    }

    fn parse_function(&mut self, ret: TypeExpr, name: Identifier) -> PResult<Function> {
        let (params, variadic) = self.parse_params()?;
        let body = if self.at(TokenKind::LBrace) {
            Some(self.parse_block_body()?.0)
        } else {
            None
        };
        let end = self.previous_span();
        Ok(Function {
            span: ret.span().to(end),
            ret,
            name,
            params,
            variadic,
            body,
            decl: None,
            sig: None,
        })
    }

    fn parse_params(&mut self) -> PResult<(Vec<Param>, Option<VariadicExpr>)> {
        self.expect(TokenKind::LParen)?;
        let mut params: Vec<Param> = Vec::new();
        let mut variadic = None;
        loop {
            if self.eat(TokenKind::RParen) {
                break;
            }
            if self.eat(TokenKind::Ellipsis) {
                variadic = Some(VariadicExpr::C);
                self.close_after_variadic()?;
                break;
            }
            let ty = self.parse_type()?;
            if self.eat(TokenKind::Ellipsis) {
                variadic = Some(VariadicExpr::Typed(Box::new(ty)));
                self.close_after_variadic()?;
                break;
            }
            let name = self.parse_identifier()?;
            let default = if self.eat(TokenKind::Assign) {
                Some(self.parse_expression()?)
            } else {
                None
            };
            let follows_default = params.last().is_some_and(|p| p.default.is_some());
            if follows_default && default.is_none() {
                return Err(ParseError {
                    kind: ParseErrorKind::DefaultParameterOrder {
                        parameter: name.name.clone(),
                    },
                    span: name.span,
                    expected: vec!["`=`".to_string()],
                });
            }
            params.push(Param { ty, name, default });
            if !self.eat(TokenKind::Comma) {
                self.close_list()?;
                break;
            }
        }
        Ok((params, variadic))
    }

    /// A variadic marker may only be followed by one trailing comma.
    fn close_after_variadic(&mut self) -> PResult<()> {
        self.eat(TokenKind::Comma);
        if self.eat(TokenKind::RParen) {
            return Ok(());
        }
        Err(ParseError {
            kind: ParseErrorKind::VariadicNotLast,
            span: self.peek().span,
            expected: vec![TokenKind::RParen.describe().to_string()],
        })
    }

    fn finish_variable(&mut self, ty: TypeExpr, name: Identifier) -> PResult<VariableDeclaration> {
        let assign = if self.eat(TokenKind::Assign) {
            Some(Assignment {
                operator: None,
                expr: self.parse_expression()?,
            })
        } else {
            None
        };
        let end = self.previous_span();
        Ok(VariableDeclaration {
            span: ty.span().to(end),
            ty,
            name,
            assign,
            decl: None,
        })
    }

    // ----------------------------------------------------------------
    // Types
    // ----------------------------------------------------------------

    fn parse_type(&mut self) -> PResult<TypeExpr> {
        if self.at(TokenKind::Ref) {
            let start = self.bump().span;
            let inner = self.parse_type()?;
            return Ok(TypeExpr::Reference {
                span: start.to(inner.span()),
                inner: Box::new(inner),
            });
        }

        let mut ty = if self.at(TokenKind::Func) {
            TypeExpr::Function(self.parse_function_type()?)
        } else {
            let ident = self.parse_identifier()?;
            TypeExpr::Named(CompoundIdentifier {
                span: ident.span,
                elems: vec![ident],
                resolved: None,
            })
        };

        while self.at(TokenKind::LBracket) {
            self.bump();
            let length = if self.at(TokenKind::IntLiteral) {
                let token = self.bump();
                let text = token.text(self.source);
                Some(parse_int_literal(text).ok_or_else(|| ParseError {
                    kind: ParseErrorKind::InvalidArrayLength { text: text.to_string() },
                    span: token.span,
                    expected: Vec::new(),
                })?)
            } else {
                None
            };
            let end = self.expect(TokenKind::RBracket)?.span;
            ty = TypeExpr::Array {
                span: ty.span().to(end),
                elem: Box::new(ty),
                length,
            };
        }
        Ok(ty)
    }

    fn parse_function_type(&mut self) -> PResult<FunctionTypeExpr> {
        let start = self.expect(TokenKind::Func)?.span;
        self.expect(TokenKind::Less)?;
        let ret = self.parse_type()?;
        self.expect(TokenKind::LParen)?;
        let mut params = Vec::new();
        let mut variadic = None;
        loop {
            if self.eat(TokenKind::RParen) {
                break;
            }
            if self.eat(TokenKind::Ellipsis) {
                variadic = Some(VariadicExpr::C);
                self.close_after_variadic()?;
                break;
            }
            let ty = self.parse_type()?;
            if self.eat(TokenKind::Ellipsis) {
                variadic = Some(VariadicExpr::Typed(Box::new(ty)));
                self.close_after_variadic()?;
                break;
            }
            params.push(ty);
            if !self.eat(TokenKind::Comma) {
                self.close_list()?;
                break;
            }
        }
        let end = self.expect(TokenKind::Greater)?.span;
        Ok(FunctionTypeExpr {
            span: start.to(end),
            ret: Box::new(ret),
            params,
            variadic,
        })
    }

    // ----------------------------------------------------------------
    // Statements
    // ----------------------------------------------------------------

    /// `{ stmt* }`, returning the statements and the span of the braces.
    fn parse_block_body(&mut self) -> PResult<(Vec<Statement>, Span)> {
        let start = self.expect(TokenKind::LBrace)?.span;
        let mut body = Vec::new();
        while !self.at(TokenKind::RBrace) {
            if self.at(TokenKind::Eof) {
                return Err(self.unexpected(&[TokenKind::RBrace]));
            }
            body.push(self.parse_statement()?);
        }
        let end = self.bump().span;
        Ok((body, start.to(end)))
    }

    fn parse_statement(&mut self) -> PResult<Statement> {
        let stmt = match self.peek_kind() {
            TokenKind::If => Statement::Condition(self.parse_condition()?),
            TokenKind::While => {
                let start = self.bump().span;
                let cond = self.parse_expression()?;
                let (body, body_span) = self.parse_block_body()?;
                Statement::While(WhileLoop {
                    span: start.to(body_span),
                    cond,
                    body,
                })
            }
            TokenKind::Return => {
                let start = self.bump().span;
                let expr = if matches!(
                    self.peek_kind(),
                    TokenKind::RBrace | TokenKind::Semi | TokenKind::Eof
                ) {
                    None
                } else {
                    Some(self.parse_expression()?)
                };
                Statement::Return(Return {
                    span: start.to(self.previous_span()),
                    expr,
                })
            }
            TokenKind::LBrace => {
                let (body, span) = self.parse_block_body()?;
                Statement::Block(Block { span, body })
            }
            _ => match self.try_local_declaration()? {
                Some(decl) => Statement::Declaration(decl),
                None => self.parse_expression_statement()?,
            },
        };
        self.eat(TokenKind::Semi);
        Ok(stmt)
    }

    fn parse_condition(&mut self) -> PResult<Condition> {
        let mut branches = Vec::new();
        let start = self.expect(TokenKind::If)?.span;
        let cond = self.parse_expression()?;
        let (body, body_span) = self.parse_block_body()?;
        branches.push(Branch {
            span: start.to(body_span),
            kind: BranchKind::If,
            cond: Some(cond),
            body,
        });
        while self.at(TokenKind::Elif) {
            let start = self.bump().span;
            let cond = self.parse_expression()?;
            let (body, body_span) = self.parse_block_body()?;
            branches.push(Branch {
                span: start.to(body_span),
                kind: BranchKind::Elif,
                cond: Some(cond),
                body,
            });
        }
        if self.at(TokenKind::Else) {
            let start = self.bump().span;
            let (body, body_span) = self.parse_block_body()?;
            branches.push(Branch {
                span: start.to(body_span),
                kind: BranchKind::Else,
                cond: None,
                body,
            });
        }
        Ok(Condition { branches })
    }

    /// `type IDENT ...` when it fits, otherwise rewinds. The name must
    /// be on the same line as the type.
    fn try_local_declaration(&mut self) -> PResult<Option<VariableDeclaration>> {
        let saved = self.position;
        let ty = match self.parse_type() {
            Ok(ty) => ty,
            Err(_) => {
                self.position = saved;
                return Ok(None);
            }
        };
        if !self.at(TokenKind::Ident) || self.newline_before() {
            self.position = saved;
            return Ok(None);
        }
        let name = self.parse_identifier()?;
        Ok(Some(self.finish_variable(ty, name)?))
    }

    fn parse_expression_statement(&mut self) -> PResult<Statement> {
        let first = self.parse_operand()?;
        let operator = match self.peek_kind() {
            TokenKind::Assign => Some(None),
            TokenKind::PlusAssign => Some(Some(AssignOp::Add)),
            TokenKind::MinusAssign => Some(Some(AssignOp::Sub)),
            TokenKind::StarAssign => Some(Some(AssignOp::Mul)),
            TokenKind::SlashAssign => Some(Some(AssignOp::Div)),
            TokenKind::PercentAssign => Some(Some(AssignOp::Rem)),
            _ => None,
        };
        match operator {
            Some(operator) => {
                self.bump();
                let expr = self.parse_expression()?;
                Ok(Statement::Assignment(VariableAssignment {
                    span: first.span().to(expr.span),
                    target: first,
                    assign: Assignment { operator, expr },
                }))
            }
            None => Ok(Statement::Expression(self.continue_expression(first)?)),
        }
    }

    // ----------------------------------------------------------------
    // Expressions
    // ----------------------------------------------------------------

    fn parse_expression(&mut self) -> PResult<Expression> {
        let first = self.parse_operand()?;
        self.continue_expression(first)
    }

    fn continue_expression(&mut self, first: Value) -> PResult<Expression> {
        let start = first.span();
        let mut items = vec![ExprItem::Value(first)];
        while let Some(operator) = self.parse_binary_operator() {
            items.push(ExprItem::Operator(operator));
            items.push(ExprItem::Value(self.parse_operand()?));
        }
        Ok(Expression {
            span: start.to(self.previous_span()),
            items,
        })
    }

    fn parse_binary_operator(&mut self) -> Option<Operator> {
        let token = self.peek();
        let op = match token.kind {
            TokenKind::Plus => BinaryOp::Add,
            TokenKind::Minus => BinaryOp::Sub,
            TokenKind::Star => BinaryOp::Mul,
            TokenKind::Slash => BinaryOp::Div,
            TokenKind::Percent => BinaryOp::Rem,
            TokenKind::EqEq => BinaryOp::Eq,
            TokenKind::NotEq => BinaryOp::Ne,
            TokenKind::Less => BinaryOp::Lt,
            TokenKind::LessEq => BinaryOp::Le,
            TokenKind::GreaterEq => BinaryOp::Ge,
            TokenKind::AndAnd => BinaryOp::And,
            TokenKind::OrOr => BinaryOp::Or,
            TokenKind::Amp => BinaryOp::BitAnd,
            TokenKind::Pipe => BinaryOp::BitOr,
            TokenKind::Caret => BinaryOp::BitXor,
            TokenKind::Shl => BinaryOp::Shl,
            TokenKind::Greater => {
                let next = self.peek_at(1);
                if next.kind == TokenKind::Greater && next.span.start == token.span.end {
                    self.bump();
                    self.bump();
                    return Some(Operator {
                        span: token.span.to(next.span),
                        op: BinaryOp::Shr,
                    });
                }
                BinaryOp::Gt
            }
            _ => return None,
        };
        self.bump();
        Some(Operator { span: token.span, op })
    }

    fn parse_operand(&mut self) -> PResult<Value> {
        let prefix = match self.peek_kind() {
            TokenKind::Bang => Some(UnaryOp::Not),
            TokenKind::Minus => Some(UnaryOp::Neg),
            TokenKind::Tilde => Some(UnaryOp::BitNot),
            TokenKind::PlusPlus => Some(UnaryOp::Inc),
            TokenKind::MinusMinus => Some(UnaryOp::Dec),
            _ => None,
        };
        if let Some(op) = prefix {
            let start = self.bump().span;
            let value = self.parse_operand()?;
            return Ok(Value::Prefix(UnaryValue {
                span: start.to(value.span()),
                op,
                value: Box::new(value),
            }));
        }
        let primary = self.parse_primary()?;
        self.parse_postfix(primary)
    }

    fn parse_postfix(&mut self, mut value: Value) -> PResult<Value> {
        loop {
            value = match self.peek_kind() {
                TokenKind::LParen => {
                    let callee = match value {
                        Value::Identifier(ident) => ident,
                        other => {
                            return Err(ParseError {
                                kind: ParseErrorKind::InvalidCallee,
                                span: other.span(),
                                expected: Vec::new(),
                            });
                        }
                    };
                    let args = self.parse_arguments()?;
                    Value::Call(FunctionCall {
                        span: callee.span.to(self.previous_span()),
                        callee,
                        args,
                        target: None,
                        defaulted: 0,
                    })
                }
                TokenKind::LBracket => {
                    self.bump();
                    let index = self.parse_expression()?;
                    let end = self.expect(TokenKind::RBracket)?.span;
                    Value::Index(ArrayAccess {
                        span: value.span().to(end),
                        base: Box::new(value),
                        index: Box::new(index),
                    })
                }
                TokenKind::PlusPlus | TokenKind::MinusMinus => {
                    let token = self.bump();
                    let op = if token.kind == TokenKind::PlusPlus {
                        UnaryOp::Inc
                    } else {
                        UnaryOp::Dec
                    };
                    Value::Suffix(UnaryValue {
                        span: value.span().to(token.span),
                        op,
                        value: Box::new(value),
                    })
                }
                _ => return Ok(value),
            };
        }
    }

    fn parse_arguments(&mut self) -> PResult<Vec<Expression>> {
        self.expect(TokenKind::LParen)?;
        let mut args = Vec::new();
        loop {
            if self.eat(TokenKind::RParen) {
                break;
            }
            args.push(self.parse_expression()?);
            if !self.eat(TokenKind::Comma) {
                self.close_list()?;
                break;
            }
        }
        Ok(args)
    }

    fn parse_primary(&mut self) -> PResult<Value> {
        let token = self.peek();
        let value = match token.kind {
            TokenKind::IntLiteral => Value::Number(self.literal(token, 0)),
            TokenKind::FloatLiteral => Value::Decimal(self.literal(token, 0)),
            TokenKind::StringLiteral => Value::String(self.literal(token, 1)),
            TokenKind::CharLiteral => Value::Char(self.literal(token, 1)),
            TokenKind::True | TokenKind::False => Value::Bool {
                span: token.span,
                value: token.kind == TokenKind::True,
            },
            TokenKind::Null => Value::Null(token.span),
            TokenKind::LParen => {
                self.bump();
                let mut inner = self.parse_expression()?;
                let end = self.expect(TokenKind::RParen)?.span;
                inner.span = token.span.to(end);
                return Ok(Value::Paren(Box::new(inner)));
            }
            TokenKind::Ref => {
                self.bump();
                let inner = self.parse_operand()?;
                return Ok(Value::Reference(ReferenceValue {
                    span: token.span.to(inner.span()),
                    inner: Box::new(inner),
                }));
            }
            TokenKind::Ident => {
                let mut elems = vec![self.parse_identifier()?];
                while self.at(TokenKind::Dot) {
                    self.bump();
                    elems.push(self.parse_identifier()?);
                }
                let span = elems[0].span.to(elems[elems.len() - 1].span);
                return Ok(Value::Identifier(CompoundIdentifier {
                    span,
                    elems,
                    resolved: None,
                }));
            }
            _ => {
                return Err(self.unexpected(&[
                    TokenKind::Ident,
                    TokenKind::IntLiteral,
                    TokenKind::StringLiteral,
                    TokenKind::LParen,
                ]));
            }
        };
        self.bump();
        Ok(value)
    }

    /// Literal text with `trim` bytes removed from both ends (quotes).
    fn literal(&self, token: Token, trim: usize) -> Literal {
        let text = token.text(self.source);
        let inner = text.get(trim..text.len().saturating_sub(trim)).unwrap_or("");
        Literal {
            span: token.span,
            text: inner.to_string(),
        }
    }

    // ----------------------------------------------------------------
    // Token helpers
    // ----------------------------------------------------------------

    fn parse_identifier(&mut self) -> PResult<Identifier> {
        let token = self.expect(TokenKind::Ident)?;
        Ok(Identifier {
            name: token.text(self.source).to_string(),
            span: token.span,
        })
    }

    fn peek(&self) -> Token {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> Token {
        let index = (self.position + offset).min(self.tokens.len().saturating_sub(1));
        self.tokens.get(index).copied().unwrap_or(Token {
            kind: TokenKind::Eof,
            span: Span::new(self.file, self.source.len() as u32, self.source.len() as u32),
        })
    }

    fn peek_kind(&self) -> TokenKind {
        self.peek().kind
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.peek_kind() == kind
    }

    fn bump(&mut self) -> Token {
        let token = self.peek();
        if token.kind != TokenKind::Eof {
            self.position += 1;
        }
        token
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.at(kind) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> PResult<Token> {
        if self.at(kind) {
            Ok(self.bump())
        } else {
            Err(self.unexpected(&[kind]))
        }
    }

    /// Whether a line break separates the current token from the previous one.
    fn newline_before(&self) -> bool {
        let Some(prev) = self.position.checked_sub(1).and_then(|index| self.tokens.get(index)) else {
            return false;
        };
        let gap = prev.span.end as usize..self.peek().span.start as usize;
        self.source.get(gap).is_some_and(|text| text.contains('\n'))
    }

    /// Consume the `)` closing a list whose last element lacked a comma.
    fn close_list(&mut self) -> PResult<()> {
        if self.eat(TokenKind::RParen) {
            Ok(())
        } else {
            Err(self.unexpected(&[TokenKind::RParen, TokenKind::Comma]))
        }
    }

    fn unexpected(&self, expected: &[TokenKind]) -> ParseError {
        let token = self.peek();
        let kind = if token.kind == TokenKind::Eof {
            ParseErrorKind::UnexpectedEof
        } else {
            ParseErrorKind::UnexpectedToken {
                found: token.text(self.source).to_string(),
            }
        };
        ParseError {
            kind,
            span: token.span,
            expected: expected.iter().map(|k| k.describe().to_string()).collect(),
        }
    }

    fn previous_span(&self) -> Span {
        match self.position.checked_sub(1).and_then(|i| self.tokens.get(i)) {
            Some(token) => token.span,
            None => self.peek().span,
        }
    }
}

/// Decimal or `0x` hexadecimal integer literal.
pub fn parse_int_literal(text: &str) -> Option<u64> {
    match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => text.parse().ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(source: &str) -> Unit {
        parse(FileId(0), source).expect("parse")
    }

    fn parse_err(source: &str) -> ParseError {
        match parse(FileId(0), source) {
            Err(CoreError::Parse(err)) => err,
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    fn function(unit: &Unit, index: usize) -> &Function {
        match &unit.nodes[index] {
            TopLevel::Function(f) => f,
            other => panic!("expected function, got {other:?}"),
        }
    }

    #[test]
    fn parses_include_and_alias() {
        let unit = parse_ok("include sys/types\nalias int32 i32");
        match &unit.nodes[0] {
            TopLevel::Include(inc) => assert_eq!(inc.header_name(), "sys/types.h"),
            other => panic!("unexpected node {other:?}"),
        }
        assert!(matches!(&unit.nodes[1], TopLevel::Alias(a) if a.name.name == "i32"));
    }

    #[test]
    fn ref_binds_the_whole_type() {
        let unit = parse_ok("void f(ref int[] values) {}");
        let param = &function(&unit, 0).params[0];
        match &param.ty {
            TypeExpr::Reference { inner, .. } => {
                assert!(matches!(**inner, TypeExpr::Array { length: None, .. }))
            }
            other => panic!("expected reference, got {other:?}"),
        }
    }

    #[test]
    fn parses_function_types_with_variadics() {
        let unit = parse_ok("func<func<int(int)>(str, ...)> table");
        let TopLevel::Variable(var) = &unit.nodes[0] else {
            panic!("expected variable");
        };
        let TypeExpr::Function(outer) = &var.ty else {
            panic!("expected function type");
        };
        assert!(matches!(*outer.ret, TypeExpr::Function(_)));
        assert_eq!(outer.params.len(), 1);
        assert_eq!(outer.variadic, Some(VariadicExpr::C));
    }

    #[test]
    fn trailing_commas_have_no_effect() {
        let with = parse_ok("void f(int a, int b,) { f(1, 2,) }");
        let without = parse_ok("void f(int a, int b) { f(1, 2) }");
        assert_eq!(
            function(&with, 0).params.len(),
            function(&without, 0).params.len()
        );
        let body = |unit: &Unit| match &function(unit, 0).body.as_deref() {
            Some([Statement::Expression(expr)]) => match expr.single() {
                Some(Value::Call(call)) => call.args.len(),
                other => panic!("expected call, got {other:?}"),
            },
            other => panic!("unexpected body {other:?}"),
        };
        assert_eq!(body(&with), body(&without));
    }

    #[test]
    fn lists_close_without_trailing_comma() {
        let unit = parse_ok("void inc(ref int x) {\n    ADD(1, 2)\n}\nfunc<int(int, int)> op\n");
        assert_eq!(function(&unit, 0).params.len(), 1);
        match function(&unit, 0).body.as_deref() {
            Some([Statement::Expression(expr)]) => {
                assert!(matches!(expr.single(), Some(Value::Call(call)) if call.args.len() == 2))
            }
            other => panic!("unexpected body {other:?}"),
        }
        let TopLevel::Variable(var) = &unit.nodes[1] else {
            panic!("expected variable");
        };
        assert!(matches!(&var.ty, TypeExpr::Function(f) if f.params.len() == 2));
    }

    #[test]
    fn unclosed_lists_report_both_closers() {
        let err = parse_err("void f(int a int b) {}");
        assert!(matches!(err.kind, ParseErrorKind::UnexpectedToken { .. }), "{err:?}");
        assert_eq!(err.expected.len(), 2);
    }

    #[test]
    fn a_bare_name_line_is_not_a_declaration_type() {
        let unit = parse_ok("void f() {\n    x\n    int y = 3\n}\n");
        match function(&unit, 0).body.as_deref() {
            Some([Statement::Expression(_), Statement::Declaration(decl)]) => {
                assert_eq!(decl.name.name, "y")
            }
            other => panic!("unexpected body {other:?}"),
        }
    }

    #[test]
    fn rejects_non_default_after_default() {
        let err = parse_err("void f(int a = 1, int b) {}");
        assert_eq!(
            err.kind,
            ParseErrorKind::DefaultParameterOrder { parameter: "b".to_string() }
        );
    }

    #[test]
    fn variadic_must_be_last() {
        let err = parse_err("void f(int..., int b) {}");
        assert_eq!(err.kind, ParseErrorKind::VariadicNotLast);
        let unit = parse_ok("void g(str fmt, ...,);\nvoid h(int[]...)");
        assert_eq!(function(&unit, 0).variadic, Some(VariadicExpr::C));
        assert!(matches!(
            &function(&unit, 1).variadic,
            Some(VariadicExpr::Typed(ty)) if matches!(**ty, TypeExpr::Array { .. })
        ));
    }

    #[test]
    fn declaration_without_body() {
        let unit = parse_ok("void later()\nint main() { later() return 0 }");
        assert!(function(&unit, 0).body.is_none());
        assert_eq!(function(&unit, 1).body.as_ref().map(Vec::len), Some(2));
    }

    #[test]
    fn distinguishes_declarations_from_assignments() {
        let unit = parse_ok("void f() { int[4] a\n a[2] = 3\n a[i] += 1\n ref int r = a[0] }");
        let body = function(&unit, 0).body.as_ref().expect("body");
        assert!(matches!(body[0], Statement::Declaration(_)));
        assert!(matches!(body[1], Statement::Assignment(_)));
        assert!(matches!(
            &body[2],
            Statement::Assignment(a) if a.assign.operator == Some(AssignOp::Add)
        ));
        assert!(matches!(body[3], Statement::Declaration(_)));
    }

    #[test]
    fn return_without_value_before_brace() {
        let unit = parse_ok("void f() { if true { return } return; }");
        let body = function(&unit, 0).body.as_ref().expect("body");
        let Statement::Condition(cond) = &body[0] else {
            panic!("expected condition");
        };
        assert!(matches!(cond.branches[0].body[0], Statement::Return(Return { expr: None, .. })));
        assert!(matches!(body[1], Statement::Return(Return { expr: None, .. })));
    }

    #[test]
    fn expressions_are_flat() {
        let unit = parse_ok("int x = 4 * 8 + -y >> 2");
        let TopLevel::Variable(var) = &unit.nodes[0] else {
            panic!("expected variable");
        };
        let items = &var.assign.as_ref().expect("init").expr.items;
        assert_eq!(items.len(), 7);
        assert!(matches!(items[4], ExprItem::Value(Value::Prefix(_))));
        assert!(matches!(items[5], ExprItem::Operator(Operator { op: BinaryOp::Shr, .. })));
    }

    #[test]
    fn elif_chain() {
        let unit = parse_ok("void f(int a) { if a == 1 { } elif a == 2 { } else { } }");
        let body = function(&unit, 0).body.as_ref().expect("body");
        let Statement::Condition(cond) = &body[0] else {
            panic!("expected condition");
        };
        let kinds: Vec<_> = cond.branches.iter().map(|b| b.kind).collect();
        assert_eq!(kinds, vec![BranchKind::If, BranchKind::Elif, BranchKind::Else]);
    }

    #[test]
    fn reports_expected_tokens() {
        let err = parse_err("void f(int a b) {}");
        assert_eq!(err.kind, ParseErrorKind::UnexpectedToken { found: "b".to_string() });
        assert_eq!(err.expected, vec!["`)`".to_string(), "`,`".to_string()]);
    }

    #[test]
    fn only_identifiers_are_callable() {
        let err = parse_err("void f() { (g)() }");
        assert_eq!(err.kind, ParseErrorKind::InvalidCallee);
    }
}
