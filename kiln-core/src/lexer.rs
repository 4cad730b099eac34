//! Lexer for Kiln source text.

use crate::error::{LexError, LexErrorKind};
use crate::span::{FileId, Span};

/// Kind of a token produced by the lexer.
///
/// The lexer only recognizes keywords, literals and punctuation.
/// `>>` is never produced as one token so that nested `func<...>`
/// types close naturally; the parser rebuilds the shift operator
/// from two adjacent `>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // Special
    Eof,

    // Identifiers and literals
    Ident,
    IntLiteral,
    FloatLiteral,
    StringLiteral,
    CharLiteral,

    // Punctuation
    LParen,   // (
    RParen,   // )
    LBrace,   // {
    RBrace,   // }
    LBracket, // [
    RBracket, // ]
    Comma,    // ,
    Semi,     // ;
    Dot,      // .
    Ellipsis, // ...

    // Assignment
    Assign,        // =
    PlusAssign,    // +=
    MinusAssign,   // -=
    StarAssign,    // *=
    SlashAssign,   // /=
    PercentAssign, // %=

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    PlusPlus,
    MinusMinus,
    EqEq,
    NotEq,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    Shl,
    AndAnd,
    OrOr,
    Bang,
    Amp,
    Pipe,
    Caret,
    Tilde,

    // Keywords
    Include,
    Alias,
    Ref,
    Func,
    If,
    Elif,
    Else,
    While,
    Return,
    Null,
    True,
    False,
}

impl TokenKind {
    /// Human readable form used in "expected ..." lists.
    pub fn describe(self) -> &'static str {
        match self {
            TokenKind::Eof => "end of input",
            TokenKind::Ident => "identifier",
            TokenKind::IntLiteral => "integer literal",
            TokenKind::FloatLiteral => "decimal literal",
            TokenKind::StringLiteral => "string literal",
            TokenKind::CharLiteral => "character literal",
            TokenKind::LParen => "`(`",
            TokenKind::RParen => "`)`",
            TokenKind::LBrace => "`{`",
            TokenKind::RBrace => "`}`",
            TokenKind::LBracket => "`[`",
            TokenKind::RBracket => "`]`",
            TokenKind::Comma => "`,`",
            TokenKind::Semi => "`;`",
            TokenKind::Dot => "`.`",
            TokenKind::Ellipsis => "`...`",
            TokenKind::Assign => "`=`",
            TokenKind::PlusAssign => "`+=`",
            TokenKind::MinusAssign => "`-=`",
            TokenKind::StarAssign => "`*=`",
            TokenKind::SlashAssign => "`/=`",
            TokenKind::PercentAssign => "`%=`",
            TokenKind::Plus => "`+`",
            TokenKind::Minus => "`-`",
            TokenKind::Star => "`*`",
            TokenKind::Slash => "`/`",
            TokenKind::Percent => "`%`",
            TokenKind::PlusPlus => "`++`",
            TokenKind::MinusMinus => "`--`",
            TokenKind::EqEq => "`==`",
            TokenKind::NotEq => "`!=`",
            TokenKind::Less => "`<`",
            TokenKind::LessEq => "`<=`",
            TokenKind::Greater => "`>`",
            TokenKind::GreaterEq => "`>=`",
            TokenKind::Shl => "`<<`",
            TokenKind::AndAnd => "`&&`",
            TokenKind::OrOr => "`||`",
            TokenKind::Bang => "`!`",
            TokenKind::Amp => "`&`",
            TokenKind::Pipe => "`|`",
            TokenKind::Caret => "`^`",
            TokenKind::Tilde => "`~`",
            TokenKind::Include => "`include`",
            TokenKind::Alias => "`alias`",
            TokenKind::Ref => "`ref`",
            TokenKind::Func => "`func`",
            TokenKind::If => "`if`",
            TokenKind::Elif => "`elif`",
            TokenKind::Else => "`else`",
            TokenKind::While => "`while`",
            TokenKind::Return => "`return`",
            TokenKind::Null => "`null`",
            TokenKind::True => "`true`",
            TokenKind::False => "`false`",
        }
    }
}

/// A single token with its kind and span.
///
/// The span indexes the original source, so the lexeme is recovered
/// with [`Token::text`]; string and character tokens include their
/// quotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn text<'src>(&self, source: &'src str) -> &'src str {
        source
            .get(self.span.start as usize..self.span.end as usize)
            .unwrap_or("")
    }
}

/// Lex a whole source string, ending with an `Eof` token.
pub fn lex(file_id: FileId, source: &str) -> Result<Vec<Token>, LexError> {
    Lexer::new(file_id, source).collect()
}

/// Lazy token stream. Yields `Eof` once, then stops; stops after the
/// first error as well.
pub struct Lexer<'src> {
    file_id: FileId,
    source: &'src str,
    chars: &'src [u8],
    index: usize,
    finished: bool,
}

impl<'src> Lexer<'src> {
    pub fn new(file_id: FileId, source: &'src str) -> Self {
        Lexer {
            file_id,
            source,
            chars: source.as_bytes(),
            index: 0,
            finished: false,
        }
    }

    fn next_token(&mut self) -> Result<Token, LexError> {
        self.skip_trivia()?;

        let start = self.index as u32;
        let Some(ch) = self.peek_char() else {
            return Ok(self.simple_token(TokenKind::Eof, start));
        };

        let kind = match ch {
            b'(' => self.single(TokenKind::LParen),
            b')' => self.single(TokenKind::RParen),
            b'{' => self.single(TokenKind::LBrace),
            b'}' => self.single(TokenKind::RBrace),
            b'[' => self.single(TokenKind::LBracket),
            b']' => self.single(TokenKind::RBracket),
            b',' => self.single(TokenKind::Comma),
            b';' => self.single(TokenKind::Semi),
            b'~' => self.single(TokenKind::Tilde),
            b'^' => self.single(TokenKind::Caret),
            b'.' => {
                if self.peek_next() == Some(b'.') && self.peek_at(2) == Some(b'.') {
                    self.index += 3;
                    TokenKind::Ellipsis
                } else {
                    self.single(TokenKind::Dot)
                }
            }
            b'+' => self.pick(&[(b"++", TokenKind::PlusPlus), (b"+=", TokenKind::PlusAssign)], TokenKind::Plus),
            b'-' => self.pick(
                &[(b"--", TokenKind::MinusMinus), (b"-=", TokenKind::MinusAssign)],
                TokenKind::Minus,
            ),
            b'*' => self.pick(&[(b"*=", TokenKind::StarAssign)], TokenKind::Star),
            b'/' => self.pick(&[(b"/=", TokenKind::SlashAssign)], TokenKind::Slash),
            b'%' => self.pick(&[(b"%=", TokenKind::PercentAssign)], TokenKind::Percent),
            b'=' => self.pick(&[(b"==", TokenKind::EqEq)], TokenKind::Assign),
            b'!' => self.pick(&[(b"!=", TokenKind::NotEq)], TokenKind::Bang),
            b'<' => self.pick(&[(b"<=", TokenKind::LessEq), (b"<<", TokenKind::Shl)], TokenKind::Less),
            b'>' => self.pick(&[(b">=", TokenKind::GreaterEq)], TokenKind::Greater),
            b'&' => self.pick(&[(b"&&", TokenKind::AndAnd)], TokenKind::Amp),
            b'|' => self.pick(&[(b"||", TokenKind::OrOr)], TokenKind::Pipe),
            b'"' => self.lex_string(start)?,
            b'\'' => self.lex_char(start)?,
            b'0'..=b'9' => self.lex_number(start)?,
            _ if is_ident_start(ch) => self.lex_ident_or_keyword(start),
            _ => {
                // Step over a whole UTF-8 sequence so the span is a valid slice.
                let width = self.source[self.index..]
                    .chars()
                    .next()
                    .map_or(1, char::len_utf8);
                self.index += width;
                return Err(self.error(LexErrorKind::UnexpectedCharacter, start));
            }
        };

        Ok(self.simple_token(kind, start))
    }

    fn skip_trivia(&mut self) -> Result<(), LexError> {
        loop {
            match self.peek_char() {
                Some(ch) if is_whitespace(ch) => self.consume_char(),
                Some(b'/') if self.peek_next() == Some(b'/') => {
                    while let Some(ch) = self.peek_char() {
                        if ch == b'\n' {
                            break;
                        }
                        self.consume_char();
                    }
                }
                Some(b'/') if self.peek_next() == Some(b'*') => {
                    let start = self.index as u32;
                    self.index += 2;
                    loop {
                        match self.peek_char() {
                            None => return Err(self.error(LexErrorKind::UnterminatedComment, start)),
                            Some(b'*') if self.peek_next() == Some(b'/') => {
                                self.index += 2;
                                break;
                            }
                            Some(_) => self.consume_char(),
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn single(&mut self, kind: TokenKind) -> TokenKind {
        self.consume_char();
        kind
    }

    /// Longest match among two-byte operators, else the one-byte fallback.
    fn pick(&mut self, pairs: &[(&[u8; 2], TokenKind)], fallback: TokenKind) -> TokenKind {
        for (pair, kind) in pairs {
            if self.peek_next() == Some(pair[1]) {
                self.index += 2;
                return *kind;
            }
        }
        self.single(fallback)
    }

    fn simple_token(&self, kind: TokenKind, start: u32) -> Token {
        Token {
            kind,
            span: Span::new(self.file_id, start, self.index as u32),
        }
    }

    fn error(&self, kind: LexErrorKind, start: u32) -> LexError {
        LexError {
            kind,
            span: Span::new(self.file_id, start, self.index as u32),
        }
    }

    fn lex_string(&mut self, start: u32) -> Result<TokenKind, LexError> {
        self.consume_char(); // opening quote
        loop {
            match self.peek_char() {
                Some(b'"') => {
                    self.consume_char();
                    return Ok(TokenKind::StringLiteral);
                }
                Some(b'\\') => self.lex_escape()?,
                Some(b'\n') | None => return Err(self.error(LexErrorKind::UnterminatedString, start)),
                Some(_) => self.consume_char(),
            }
        }
    }

    fn lex_char(&mut self, start: u32) -> Result<TokenKind, LexError> {
        self.consume_char(); // opening quote
        match self.peek_char() {
            Some(b'\\') => self.lex_escape()?,
            Some(b'\'') | Some(b'\n') | None => {
                return Err(self.error(LexErrorKind::UnterminatedCharacter, start));
            }
            Some(_) => {
                let width = self.source[self.index..]
                    .chars()
                    .next()
                    .map_or(1, char::len_utf8);
                self.index += width;
            }
        }
        if self.peek_char() != Some(b'\'') {
            return Err(self.error(LexErrorKind::UnterminatedCharacter, start));
        }
        self.consume_char();
        Ok(TokenKind::CharLiteral)
    }

    /// Validate one escape sequence starting at the backslash.
    fn lex_escape(&mut self) -> Result<(), LexError> {
        let start = self.index as u32;
        self.consume_char(); // '\'
        match self.peek_char() {
            Some(b'n' | b't' | b'r' | b'0' | b'\\' | b'"' | b'\'' | b'a' | b'b' | b'f' | b'v' | b'e') => {
                self.consume_char();
                Ok(())
            }
            Some(b'x') => {
                self.consume_char();
                let mut digits = 0;
                while digits < 2 && self.peek_char().is_some_and(|c| c.is_ascii_hexdigit()) {
                    self.consume_char();
                    digits += 1;
                }
                if digits == 0 {
                    return Err(self.error(LexErrorKind::InvalidEscape, start));
                }
                Ok(())
            }
            Some(b'\n') | None => Err(self.error(LexErrorKind::InvalidEscape, start)),
            Some(_) => {
                self.consume_char();
                Err(self.error(LexErrorKind::InvalidEscape, start))
            }
        }
    }

    fn lex_number(&mut self, start: u32) -> Result<TokenKind, LexError> {
        let mut kind = TokenKind::IntLiteral;

        if self.peek_char() == Some(b'0') && matches!(self.peek_next(), Some(b'x' | b'X')) {
            self.index += 2;
            let digits_start = self.index;
            while self.peek_char().is_some_and(|c| c.is_ascii_hexdigit()) {
                self.consume_char();
            }
            if self.index == digits_start {
                return Err(self.error(LexErrorKind::InvalidNumber, start));
            }
        } else {
            self.eat_digits();
            // '.' followed by a digit makes a decimal literal.
            if self.peek_char() == Some(b'.') && self.peek_next().is_some_and(|c| c.is_ascii_digit()) {
                self.consume_char();
                self.eat_digits();
                kind = TokenKind::FloatLiteral;
            }
        }

        if self.peek_char().is_some_and(is_ident_continue) {
            while self.peek_char().is_some_and(is_ident_continue) {
                self.consume_char();
            }
            return Err(self.error(LexErrorKind::InvalidNumber, start));
        }
        Ok(kind)
    }

    fn eat_digits(&mut self) {
        while self.peek_char().is_some_and(|c| c.is_ascii_digit()) {
            self.consume_char();
        }
    }

    fn lex_ident_or_keyword(&mut self, start: u32) -> TokenKind {
        while self.peek_char().is_some_and(is_ident_continue) {
            self.consume_char();
        }

        match &self.source[start as usize..self.index] {
            "include" => TokenKind::Include,
            "alias" => TokenKind::Alias,
            "ref" => TokenKind::Ref,
            "func" => TokenKind::Func,
            "if" => TokenKind::If,
            "elif" => TokenKind::Elif,
            "else" => TokenKind::Else,
            "while" => TokenKind::While,
            "return" => TokenKind::Return,
            "null" => TokenKind::Null,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            _ => TokenKind::Ident,
        }
    }

    fn peek_char(&self) -> Option<u8> {
        self.chars.get(self.index).copied()
    }

    fn peek_next(&self) -> Option<u8> {
        self.peek_at(1)
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.chars.get(self.index + offset).copied()
    }

    fn consume_char(&mut self) {
        if self.index < self.chars.len() {
            self.index += 1;
        }
    }
}

impl Iterator for Lexer<'_> {
    type Item = Result<Token, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let result = self.next_token();
        if matches!(result, Err(_) | Ok(Token { kind: TokenKind::Eof, .. })) {
            self.finished = true;
        }
        Some(result)
    }
}

fn is_whitespace(ch: u8) -> bool {
    matches!(ch, b' ' | b'\t' | b'\n' | b'\r')
}

fn is_ident_start(ch: u8) -> bool {
    ch.is_ascii_alphabetic() || ch == b'_'
}

fn is_ident_continue(ch: u8) -> bool {
    is_ident_start(ch) || ch.is_ascii_digit()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        lex(FileId(0), source)
            .expect("lex")
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn lexes_function_header() {
        assert_eq!(
            kinds("void inc(ref int nb, int step = 1,)"),
            vec![
                TokenKind::Ident,
                TokenKind::Ident,
                TokenKind::LParen,
                TokenKind::Ref,
                TokenKind::Ident,
                TokenKind::Ident,
                TokenKind::Comma,
                TokenKind::Ident,
                TokenKind::Ident,
                TokenKind::Assign,
                TokenKind::IntLiteral,
                TokenKind::Comma,
                TokenKind::RParen,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn nested_func_types_close_with_single_angles() {
        assert_eq!(
            kinds("func<func<int()>>"),
            vec![
                TokenKind::Func,
                TokenKind::Less,
                TokenKind::Func,
                TokenKind::Less,
                TokenKind::Ident,
                TokenKind::LParen,
                TokenKind::RParen,
                TokenKind::Greater,
                TokenKind::Greater,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn skips_comments_and_keeps_positions() {
        let source = "// line\n/* block\n */ x";
        let tokens = lex(FileId(0), source).expect("lex");
        assert_eq!(tokens[0].kind, TokenKind::Ident);
        assert_eq!(tokens[0].text(source), "x");
        assert_eq!(tokens[0].span.start, 21);
    }

    #[test]
    fn lexes_literals() {
        let source = r#"42 0x1F 3.14 "a\tb" '\n' ... vargs.length"#;
        assert_eq!(
            kinds(source),
            vec![
                TokenKind::IntLiteral,
                TokenKind::IntLiteral,
                TokenKind::FloatLiteral,
                TokenKind::StringLiteral,
                TokenKind::CharLiteral,
                TokenKind::Ellipsis,
                TokenKind::Ident,
                TokenKind::Dot,
                TokenKind::Ident,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn compound_operators() {
        assert_eq!(
            kinds("a += b++ != --c"),
            vec![
                TokenKind::Ident,
                TokenKind::PlusAssign,
                TokenKind::Ident,
                TokenKind::PlusPlus,
                TokenKind::NotEq,
                TokenKind::MinusMinus,
                TokenKind::Ident,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn reports_unterminated_string() {
        let err = lex(FileId(0), "str s = \"abc").unwrap_err();
        assert_eq!(err.kind, LexErrorKind::UnterminatedString);
        assert_eq!(err.span.start, 8);
    }

    #[test]
    fn reports_invalid_escape() {
        let err = lex(FileId(0), r#""a\qb""#).unwrap_err();
        assert_eq!(err.kind, LexErrorKind::InvalidEscape);
        assert_eq!((err.span.start, err.span.end), (2, 4));
    }

    #[test]
    fn reports_unexpected_character() {
        let err = lex(FileId(0), "int a = @").unwrap_err();
        assert_eq!(err.kind, LexErrorKind::UnexpectedCharacter);
        assert_eq!(err.span.start, 8);
    }

    #[test]
    fn iterator_stops_after_eof() {
        let mut lexer = Lexer::new(FileId(0), "a");
        assert!(matches!(lexer.next(), Some(Ok(Token { kind: TokenKind::Ident, .. }))));
        assert!(matches!(lexer.next(), Some(Ok(Token { kind: TokenKind::Eof, .. }))));
        assert!(lexer.next().is_none());
    }
}
