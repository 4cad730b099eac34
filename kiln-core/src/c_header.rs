//! C header bridge.
//!
//! Extracts what a Kiln unit can use from an included C header:
//! `#define` constants, function-like macros, and a best-effort view of
//! plain prototypes, variables and typedefs. This is not a
//! preprocessor. Conditionals are tracked for balance but never
//! evaluated, so every branch is visible. Macro bodies are only
//! inspected to decide which kind of literal they produce.
//!
//! Results are cached per resolved header path in a [`HeaderCache`]
//! shared by every unit of a build.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, trace, warn};

use crate::ast::{TopLevel, Unit};
use crate::error::BridgeError;
use crate::types::{CWidth, FunctionSig, IntWidth, Primitive, Type, Variadic};

// ---------------------------------------------------------------------
// Locating headers
// ---------------------------------------------------------------------

/// Contents of a located header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderFile {
    /// Resolved path, used as the cache key.
    pub path: PathBuf,
    pub contents: String,
}

/// Finds header files by their include name (`stdio.h`, `sys/types.h`).
pub trait HeaderLocator: Send + Sync {
    fn locate(&self, name: &str) -> Option<HeaderFile>;
}

impl<F> HeaderLocator for F
where
    F: Fn(&str) -> Option<HeaderFile> + Send + Sync,
{
    fn locate(&self, name: &str) -> Option<HeaderFile> {
        self(name)
    }
}

/// Looks for headers in an ordered list of directories.
#[derive(Debug, Clone, Default)]
pub struct SearchPathLocator {
    dirs: Vec<PathBuf>,
}

impl SearchPathLocator {
    pub fn new(dirs: Vec<PathBuf>) -> Self {
        SearchPathLocator { dirs }
    }

    /// `dirs` followed by the usual system include directories.
    pub fn with_system_dirs(mut dirs: Vec<PathBuf>) -> Self {
        dirs.push(PathBuf::from("/usr/local/include"));
        dirs.push(PathBuf::from("/usr/include"));
        SearchPathLocator { dirs }
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }
}

impl HeaderLocator for SearchPathLocator {
    fn locate(&self, name: &str) -> Option<HeaderFile> {
        for dir in &self.dirs {
            let candidate = dir.join(name);
            if !candidate.is_file() {
                continue;
            }
            match fs::read(&candidate) {
                Ok(bytes) => {
                    return Some(HeaderFile {
                        path: candidate,
                        contents: String::from_utf8_lossy(&bytes).into_owned(),
                    });
                }
                Err(err) => debug!(path = %candidate.display(), %err, "unreadable header"),
            }
        }
        None
    }
}

/// Headers held in memory, keyed by include name.
#[derive(Debug, Clone, Default)]
pub struct MemoryLocator {
    files: HashMap<String, String>,
}

impl MemoryLocator {
    pub fn new() -> Self {
        MemoryLocator::default()
    }

    pub fn with(mut self, name: impl Into<String>, contents: impl Into<String>) -> Self {
        self.insert(name, contents);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, contents: impl Into<String>) {
        self.files.insert(name.into(), contents.into());
    }
}

impl HeaderLocator for MemoryLocator {
    fn locate(&self, name: &str) -> Option<HeaderFile> {
        self.files.get(name).map(|contents| HeaderFile {
            path: PathBuf::from(name),
            contents: contents.clone(),
        })
    }
}

// ---------------------------------------------------------------------
// Symbols
// ---------------------------------------------------------------------

/// Literal kind produced by a macro body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MacroValue {
    Str,
    Int,
    Float,
    Char,
    /// Body is a single identifier, resolved through the alias table.
    Alias(String),
    Opaque,
}

impl MacroValue {
    /// Result type for every kind except [`MacroValue::Alias`].
    pub fn literal_type(&self) -> Option<Type> {
        let primitive = match self {
            MacroValue::Str => Primitive::Str,
            MacroValue::Int => Primitive::INT,
            MacroValue::Float => Primitive::Double,
            MacroValue::Char => Primitive::Char,
            MacroValue::Opaque => Primitive::Any,
            MacroValue::Alias(_) => return None,
        };
        Some(Type::Primitive(primitive))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderSymbol {
    Constant {
        name: String,
        value: MacroValue,
    },
    FunctionMacro {
        name: String,
        /// Minimum arity when `variadic`.
        arity: usize,
        variadic: bool,
        value: MacroValue,
    },
    Function {
        name: String,
        sig: FunctionSig,
    },
    Variable {
        name: String,
        ty: Type,
    },
    Typedef {
        name: String,
        target: Type,
    },
}

impl HeaderSymbol {
    pub fn name(&self) -> &str {
        match self {
            HeaderSymbol::Constant { name, .. }
            | HeaderSymbol::FunctionMacro { name, .. }
            | HeaderSymbol::Function { name, .. }
            | HeaderSymbol::Variable { name, .. }
            | HeaderSymbol::Typedef { name, .. } => name,
        }
    }
}

/// A skipped directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeWarning {
    pub header: PathBuf,
    pub line: u32,
    pub message: String,
}

/// Symbols of one header, nested includes merged in. Names are
/// unique; the first definition seen wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderSymbols {
    pub path: PathBuf,
    pub symbols: Vec<HeaderSymbol>,
    pub warnings: Vec<BridgeWarning>,
}

impl HeaderSymbols {
    pub fn get(&self, name: &str) -> Option<&HeaderSymbol> {
        self.symbols.iter().find(|s| s.name() == name)
    }
}

/// Result of scanning a single header text, without following includes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScannedHeader {
    pub symbols: Vec<HeaderSymbol>,
    /// `(line, message)` for every skipped directive.
    pub warnings: Vec<(u32, String)>,
    /// Names of nested `#include`s, in order.
    pub includes: Vec<String>,
}

/// Scan one header with no knowledge of other headers' typedefs.
pub fn scan_header(contents: &str) -> ScannedHeader {
    let mut known = HashMap::new();
    scan_with_types(contents, &mut known)
}

fn scan_with_types(contents: &str, known: &mut HashMap<String, Type>) -> ScannedHeader {
    let pre = preprocess(contents);
    let mut symbols = pre.macros;
    scan_declarations(&pre.declarations, known, &mut symbols);
    ScannedHeader {
        symbols,
        warnings: pre.warnings,
        includes: pre.includes,
    }
}

// ---------------------------------------------------------------------
// Cache
// ---------------------------------------------------------------------

/// Append-only header table cache keyed by resolved path.
///
/// Tables are built outside the map's locks; when two threads race on
/// the same header the first insertion is kept and both get it.
#[derive(Debug, Default)]
pub struct HeaderCache {
    entries: DashMap<PathBuf, Arc<HeaderSymbols>>,
}

impl HeaderCache {
    pub fn new() -> Self {
        HeaderCache::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Locate and scan `name`, following nested includes. `None` when
    /// the locator cannot find the header.
    pub fn load(&self, name: &str, locator: &dyn HeaderLocator) -> Option<Arc<HeaderSymbols>> {
        let file = locator.locate(name)?;
        let (table, _) = self.load_file(file, locator, &mut Vec::new());
        Some(table)
    }

    /// Also returns the headers on `stack` whose symbols are missing from
    /// the table because including them again would cycle. Only tables
    /// missing nothing are cached, so a header reached through a cycle is
    /// rescanned when included directly.
    fn load_file(
        &self,
        file: HeaderFile,
        locator: &dyn HeaderLocator,
        stack: &mut Vec<PathBuf>,
    ) -> (Arc<HeaderSymbols>, Vec<PathBuf>) {
        if let Some(hit) = self.entries.get(&file.path) {
            trace!(path = %file.path.display(), "header cache hit");
            return (Arc::clone(hit.value()), Vec::new());
        }

        stack.push(file.path.clone());
        let pre = preprocess(&file.contents);

        let mut seen = HashSet::new();
        let mut symbols = Vec::new();
        let mut warnings = Vec::new();
        let mut known = HashMap::new();
        let mut cut = Vec::new();

        for nested in &pre.includes {
            let Some(inner) = locator.locate(nested) else {
                debug!(header = %nested, from = %file.path.display(), "nested header not found");
                continue;
            };
            if stack.contains(&inner.path) {
                trace!(header = %nested, "include cycle skipped");
                cut.push(inner.path);
                continue;
            }
            let (table, missing) = self.load_file(inner, locator, stack);
            cut.extend(missing);
            for symbol in &table.symbols {
                if let HeaderSymbol::Typedef { name, target } = symbol {
                    known.insert(name.clone(), target.clone());
                }
                if seen.insert(symbol.name().to_string()) {
                    symbols.push(symbol.clone());
                }
            }
            warnings.extend(table.warnings.iter().cloned());
        }

        let mut own = pre.macros;
        scan_declarations(&pre.declarations, &mut known, &mut own);
        for symbol in own {
            if seen.insert(symbol.name().to_string()) {
                symbols.push(symbol);
            }
        }
        for (line, message) in pre.warnings {
            warn!(header = %file.path.display(), line, "{message}");
            warnings.push(BridgeWarning {
                header: file.path.clone(),
                line,
                message,
            });
        }
        stack.pop();

        debug!(
            path = %file.path.display(),
            symbols = symbols.len(),
            warnings = warnings.len(),
            "scanned header"
        );
        let table = Arc::new(HeaderSymbols {
            path: file.path.clone(),
            symbols,
            warnings,
        });
        cut.retain(|path| *path != file.path);
        if !cut.is_empty() {
            trace!(path = %file.path.display(), "partial table not cached");
            return (table, cut);
        }
        let entry = self.entries.entry(file.path).or_insert(table);
        (Arc::clone(entry.value()), cut)
    }
}

/// Attach the symbol table of every `include` in `unit`. A header the
/// locator cannot find fails the whole unit.
pub fn bridge_includes(unit: &mut Unit, cache: &HeaderCache, locator: &dyn HeaderLocator) -> Result<(), BridgeError> {
    for node in &mut unit.nodes {
        let TopLevel::Include(include) = node else {
            continue;
        };
        let header = include.header_name();
        let table = cache
            .load(&header, locator)
            .ok_or_else(|| BridgeError::HeaderNotFound {
                header: header.clone(),
                span: include.span,
            })?;
        debug!(%header, symbols = table.symbols.len(), "bridged include");
        include.symbols = Some(table);
    }
    Ok(())
}

// ---------------------------------------------------------------------
// Directives
// ---------------------------------------------------------------------

struct Preprocessed {
    macros: Vec<HeaderSymbol>,
    warnings: Vec<(u32, String)>,
    includes: Vec<String>,
    /// Everything outside directives, for the declaration scan.
    declarations: String,
}

fn preprocess(contents: &str) -> Preprocessed {
    let mut out = Preprocessed {
        macros: Vec::new(),
        warnings: Vec::new(),
        includes: Vec::new(),
        declarations: String::new(),
    };
    let mut depth = 0usize;
    let mut last_line = 1;

    for (line, text) in logical_lines(&strip_comments(contents)) {
        last_line = line;
        let Some((name, rest)) = directive(&text) else {
            out.declarations.push_str(&text);
            out.declarations.push('\n');
            continue;
        };
        match name {
            "define" => match parse_define(rest) {
                Ok(symbol) => out.macros.push(symbol),
                Err(message) => out.warnings.push((line, message)),
            },
            "include" | "include_next" | "import" => match include_target(rest) {
                Some(target) => out.includes.push(target),
                None => trace!(line, "computed include ignored"),
            },
            "if" | "ifdef" | "ifndef" => depth += 1,
            "elif" | "elifdef" | "elifndef" | "else" => {
                if depth == 0 {
                    out.warnings.push((line, format!("#{name} without matching #if")));
                }
            }
            "endif" => {
                if depth == 0 {
                    out.warnings.push((line, "#endif without matching #if".to_string()));
                } else {
                    depth -= 1;
                }
            }
            _ => {}
        }
    }
    if depth > 0 {
        out.warnings
            .push((last_line, format!("{depth} unterminated conditional block(s)")));
    }
    out
}

/// Replace comments by spaces, keeping newlines so line numbers hold.
fn strip_comments(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut index = 0;
    let mut quote: Option<u8> = None;
    let mut chunk_start = 0;

    while index < bytes.len() {
        let byte = bytes[index];
        if let Some(q) = quote {
            if byte == b'\\' {
                index += 2;
                continue;
            }
            if byte == q || byte == b'\n' {
                quote = None;
            }
            index += 1;
            continue;
        }
        match byte {
            b'"' | b'\'' => {
                quote = Some(byte);
                index += 1;
            }
            b'/' if bytes.get(index + 1) == Some(&b'/') => {
                out.push_str(&text[chunk_start..index]);
                while index < bytes.len() && bytes[index] != b'\n' {
                    index += 1;
                }
                out.push(' ');
                chunk_start = index;
            }
            b'/' if bytes.get(index + 1) == Some(&b'*') => {
                out.push_str(&text[chunk_start..index]);
                index += 2;
                while index < bytes.len() && !(bytes[index] == b'*' && bytes.get(index + 1) == Some(&b'/')) {
                    if bytes[index] == b'\n' {
                        out.push('\n');
                    }
                    index += 1;
                }
                index = (index + 2).min(bytes.len());
                out.push(' ');
                chunk_start = index;
            }
            _ => index += 1,
        }
    }
    out.push_str(&text[chunk_start.min(text.len())..]);
    out
}

/// Physical lines joined at backslash-newline, with the number of
/// the first physical line.
fn logical_lines(text: &str) -> Vec<(u32, String)> {
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut start = None;
    for (index, raw) in text.split('\n').enumerate() {
        let raw = raw.strip_suffix('\r').unwrap_or(raw);
        start.get_or_insert(index as u32 + 1);
        match raw.strip_suffix('\\') {
            Some(joined) => {
                current.push_str(joined);
                current.push(' ');
            }
            None => {
                current.push_str(raw);
                lines.push((start.take().unwrap_or(1), std::mem::take(&mut current)));
            }
        }
    }
    if let Some(line) = start {
        lines.push((line, current));
    }
    lines
}

/// `(name, rest)` of a `#name rest` line.
fn directive(line: &str) -> Option<(&str, &str)> {
    let rest = line.trim_start().strip_prefix('#')?.trim_start();
    let end = rest
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(rest.len());
    Some((&rest[..end], &rest[end..]))
}

fn include_target(rest: &str) -> Option<String> {
    let rest = rest.trim();
    let (open, close) = match rest.chars().next()? {
        '<' => ('<', '>'),
        '"' => ('"', '"'),
        _ => return None,
    };
    let inner = rest.strip_prefix(open)?;
    let end = inner.find(close)?;
    Some(inner[..end].to_string())
}

fn parse_define(rest: &str) -> Result<HeaderSymbol, String> {
    let rest = rest.trim_start();
    let name_len = ident_len(rest);
    if name_len == 0 {
        return Err("malformed #define: missing macro name".to_string());
    }
    let name = &rest[..name_len];
    let after = &rest[name_len..];

    // Function-like only when the parenthesis touches the name.
    let Some(params) = after.strip_prefix('(') else {
        return Ok(HeaderSymbol::Constant {
            name: name.to_string(),
            value: classify_body(after.trim()),
        });
    };
    let close = params
        .find(')')
        .ok_or_else(|| format!("malformed #define `{name}`: unterminated parameter list"))?;
    let (arity, variadic) = parse_macro_params(&params[..close])
        .ok_or_else(|| format!("malformed #define `{name}`: invalid parameter list"))?;
    Ok(HeaderSymbol::FunctionMacro {
        name: name.to_string(),
        arity,
        variadic,
        value: classify_body(params[close + 1..].trim()),
    })
}

/// Named parameter count and whether the macro is variadic.
fn parse_macro_params(list: &str) -> Option<(usize, bool)> {
    if list.trim().is_empty() {
        return Some((0, false));
    }
    let parts: Vec<&str> = list.split(',').map(str::trim).collect();
    let mut arity = 0;
    for (index, part) in parts.iter().enumerate() {
        let last = index + 1 == parts.len();
        if *part == "..." {
            return last.then_some((arity, true));
        }
        if let Some(named) = part.strip_suffix("...") {
            // GNU named variadic: `args...`
            let named = named.trim_end();
            return (last && !named.is_empty() && ident_len(named) == named.len()).then_some((arity, true));
        }
        if part.is_empty() || ident_len(part) != part.len() {
            return None;
        }
        arity += 1;
    }
    Some((arity, false))
}

fn ident_len(text: &str) -> usize {
    let mut chars = text.char_indices();
    match chars.next() {
        Some((_, c)) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return 0,
    }
    chars
        .find(|(_, c)| !(c.is_ascii_alphanumeric() || *c == '_'))
        .map_or(text.len(), |(i, _)| i)
}

fn classify_body(body: &str) -> MacroValue {
    let tokens = tokenize(body);
    let mut slice = tokens.as_slice();
    while let [CToken::Punct("("), inner @ .., CToken::Punct(")")] = slice {
        if !balanced(inner) {
            break;
        }
        slice = inner;
    }
    match slice {
        [] => MacroValue::Opaque,
        [CToken::Number(text)] | [CToken::Punct("-" | "+"), CToken::Number(text)] => {
            if is_float_literal(text) {
                MacroValue::Float
            } else {
                MacroValue::Int
            }
        }
        [CToken::Char] => MacroValue::Char,
        [CToken::Ident(name)] => MacroValue::Alias(name.clone()),
        strings if strings.iter().all(|t| matches!(t, CToken::Str)) => MacroValue::Str,
        _ => MacroValue::Opaque,
    }
}

fn balanced(tokens: &[CToken]) -> bool {
    let mut depth = 0i32;
    for token in tokens {
        match token {
            CToken::Punct("(") => depth += 1,
            CToken::Punct(")") => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0
}

fn is_float_literal(text: &str) -> bool {
    let lower = text.to_ascii_lowercase();
    if lower.starts_with("0x") {
        lower.contains('p') || lower.contains('.')
    } else {
        lower.contains('.') || lower.contains('e')
    }
}

// ---------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
enum CToken {
    Ident(String),
    Number(String),
    Str,
    Char,
    Punct(&'static str),
}

const PUNCTUATION: &[&str] = &[
    "...", "(", ")", "[", "]", "{", "}", ",", ";", "*", "=", "-", "+", "&", "<", ">", ":", ".",
    "?", "!", "~", "/", "%", "^", "|", "#",
];

fn tokenize(text: &str) -> Vec<CToken> {
    let bytes = text.as_bytes();
    let mut tokens = Vec::new();
    let mut index = 0;
    while index < bytes.len() {
        let byte = bytes[index];
        if byte.is_ascii_whitespace() {
            index += 1;
            continue;
        }
        if byte == b'"' || byte == b'\'' {
            index = skip_quoted(bytes, index);
            tokens.push(if byte == b'"' { CToken::Str } else { CToken::Char });
            continue;
        }
        if byte.is_ascii_alphabetic() || byte == b'_' {
            let len = ident_len(&text[index..]);
            let word = &text[index..index + len];
            index += len;
            // Encoding prefixes: L"..", u8"..", U'..'
            if matches!(word, "L" | "u" | "U" | "u8") && matches!(bytes.get(index), Some(b'"' | b'\'')) {
                let quote = bytes[index];
                index = skip_quoted(bytes, index);
                tokens.push(if quote == b'"' { CToken::Str } else { CToken::Char });
                continue;
            }
            tokens.push(CToken::Ident(word.to_string()));
            continue;
        }
        if byte.is_ascii_digit() || (byte == b'.' && bytes.get(index + 1).is_some_and(u8::is_ascii_digit)) {
            let start = index;
            let hex = text[start..].starts_with("0x") || text[start..].starts_with("0X");
            while index < bytes.len() {
                let c = bytes[index];
                let exponent_sign = matches!(c, b'+' | b'-')
                    && match bytes[index - 1] {
                        b'e' | b'E' => !hex,
                        b'p' | b'P' => hex,
                        _ => false,
                    };
                if c.is_ascii_alphanumeric() || c == b'.' || c == b'_' || exponent_sign {
                    index += 1;
                } else {
                    break;
                }
            }
            tokens.push(CToken::Number(text[start..index].to_string()));
            continue;
        }
        match PUNCTUATION.iter().find(|p| text[index..].starts_with(**p)) {
            Some(punct) => {
                tokens.push(CToken::Punct(punct));
                index += punct.len();
            }
            None => {
                // Anything else is irrelevant to the scan; step over the char.
                index += text[index..].chars().next().map_or(1, char::len_utf8);
            }
        }
    }
    tokens
}

fn skip_quoted(bytes: &[u8], start: usize) -> usize {
    let quote = bytes[start];
    let mut index = start + 1;
    while index < bytes.len() {
        match bytes[index] {
            b'\\' => index += 2,
            b'\n' => return index,
            c if c == quote => return index + 1,
            _ => index += 1,
        }
    }
    bytes.len()
}

// ---------------------------------------------------------------------
// Declarations
// ---------------------------------------------------------------------

/// Split top-level text into declarations and record the ones whose
/// types map onto Kiln types. Bodies of functions and aggregates are
/// skipped; `extern "C" { ... }` wrappers are transparent.
fn scan_declarations(text: &str, known: &mut HashMap<String, Type>, out: &mut Vec<HeaderSymbol>) {
    let tokens = tokenize(text);
    let mut current: Vec<CToken> = Vec::new();
    // true for transparent `extern "C"` braces
    let mut braces: Vec<bool> = Vec::new();
    let mut depth = 0usize;
    let mut aggregate = false;
    let mut index = 0;

    while index < tokens.len() {
        let token = &tokens[index];
        index += 1;
        if depth == 0
            && current.is_empty()
            && *token == CToken::Ident("extern".to_string())
            && tokens.get(index) == Some(&CToken::Str)
            && tokens.get(index + 1) == Some(&CToken::Punct("{"))
        {
            braces.push(true);
            index += 2;
            continue;
        }
        match token {
            CToken::Punct("{") => {
                braces.push(false);
                if depth == 0 && !matches!(current.last(), Some(CToken::Punct(")"))) {
                    aggregate = true;
                }
                depth += 1;
            }
            CToken::Punct("}") => {
                if braces.pop() == Some(false) {
                    depth = depth.saturating_sub(1);
                    // A closed function body ends its declaration.
                    if depth == 0 && !aggregate {
                        declaration(&current, known, out);
                        current.clear();
                    }
                }
            }
            CToken::Punct(";") if depth == 0 => {
                if !aggregate {
                    declaration(&current, known, out);
                }
                aggregate = false;
                current.clear();
            }
            _ if depth == 0 => current.push(token.clone()),
            _ => {}
        }
    }
}

fn is_word(token: &CToken, word: &str) -> bool {
    matches!(token, CToken::Ident(w) if w == word)
}

const STORAGE: &[&str] = &[
    "extern", "static", "inline", "__inline", "__inline__", "__extension__", "register",
];
const QUALIFIERS: &[&str] = &[
    "const", "volatile", "restrict", "__restrict", "__restrict__", "__const", "_Noreturn",
];

fn declaration(tokens: &[CToken], known: &mut HashMap<String, Type>, out: &mut Vec<HeaderSymbol>) {
    let mut tokens = strip_attributes(tokens);
    tokens.retain(|t| !STORAGE.iter().any(|w| is_word(t, w)));
    if tokens.is_empty() {
        return;
    }
    let is_typedef = is_word(&tokens[0], "typedef");
    let tokens = if is_typedef { &tokens[1..] } else { &tokens[..] };

    let Some((base, mut rest)) = parse_base(tokens, known) else {
        return;
    };

    if is_typedef {
        if let Some((ty, name, [])) = parse_declarator(&base, rest, false) {
            trace!(%name, %ty, "header typedef");
            known.insert(name.clone(), ty.clone());
            out.push(HeaderSymbol::Typedef { name, target: ty });
        }
        return;
    }

    // Prototype: `T name(params) trailing-junk`
    let mut stars = 0;
    let mut probe = rest;
    while let Some((first, tail)) = probe.split_first() {
        if *first == CToken::Punct("*") {
            stars += 1;
        } else if !QUALIFIERS.iter().any(|w| is_word(first, w)) {
            break;
        }
        probe = tail;
    }
    if let [CToken::Ident(name), CToken::Punct("("), tail @ ..] = probe {
        let Some(ret) = apply_pointers(&base, stars) else {
            return;
        };
        if let Some(sig) = parse_params(tail, known).map(|(params, variadic)| FunctionSig::new(ret, params, variadic)) {
            trace!(%name, %sig, "header prototype");
            out.push(HeaderSymbol::Function {
                name: name.clone(),
                sig,
            });
        }
        return;
    }

    // Variables, possibly several declarators.
    loop {
        let Some((ty, name, tail)) = parse_declarator(&base, rest, false) else {
            return;
        };
        out.push(HeaderSymbol::Variable { name, ty });
        let tail = match tail.iter().position(|t| *t == CToken::Punct(",")) {
            Some(comma) if tail.first() == Some(&CToken::Punct("=")) || comma == 0 => &tail[comma + 1..],
            _ => return,
        };
        rest = tail;
    }
}

/// Drop `__attribute__((...))`, `__asm__(...)` and `__declspec(...)`.
fn strip_attributes(tokens: &[CToken]) -> Vec<CToken> {
    let mut out = Vec::with_capacity(tokens.len());
    let mut index = 0;
    while index < tokens.len() {
        let skip = ["__attribute__", "__attribute", "__asm__", "__asm", "asm", "__declspec"]
            .iter()
            .any(|w| is_word(&tokens[index], w));
        if skip && tokens.get(index + 1) == Some(&CToken::Punct("(")) {
            let mut depth = 0;
            index += 1;
            while index < tokens.len() {
                match tokens[index] {
                    CToken::Punct("(") => depth += 1,
                    CToken::Punct(")") => {
                        depth -= 1;
                        if depth == 0 {
                            index += 1;
                            break;
                        }
                    }
                    _ => {}
                }
                index += 1;
            }
            continue;
        }
        out.push(tokens[index].clone());
        index += 1;
    }
    out
}

/// Base type of a declaration before any pointer or name.
#[derive(Debug, Clone, PartialEq)]
enum CBase {
    Void,
    Known(Type),
    /// Struct, union, enum or unknown typedef: usable behind a pointer only.
    Opaque,
}

fn parse_base<'t>(tokens: &'t [CToken], known: &HashMap<String, Type>) -> Option<(CBase, &'t [CToken])> {
    let mut index = 0;
    let mut words: Vec<&str> = Vec::new();
    let mut named: Option<CBase> = None;

    while let Some(CToken::Ident(word)) = tokens.get(index) {
        let word = word.as_str();
        if QUALIFIERS.contains(&word) {
            index += 1;
            continue;
        }
        if matches!(
            word,
            "void" | "char" | "short" | "int" | "long" | "signed" | "unsigned" | "float" | "double" | "_Bool"
        ) {
            if named.is_some() {
                return None;
            }
            words.push(word);
            index += 1;
            continue;
        }
        if !words.is_empty() || named.is_some() {
            break;
        }
        if matches!(word, "struct" | "union" | "enum") {
            // Tag name, and a body is never reached here.
            index += 1;
            if matches!(tokens.get(index), Some(CToken::Ident(_))) {
                index += 1;
            }
            named = Some(CBase::Opaque);
            continue;
        }
        named = Some(match known.get(word) {
            Some(ty) => CBase::Known(ty.clone()),
            None => match std_type(word) {
                Some(ty) => CBase::Known(ty),
                None => CBase::Opaque,
            },
        });
        index += 1;
    }

    let base = match named {
        Some(base) => base,
        None => base_from_words(&words)?,
    };
    Some((base, &tokens[index..]))
}

fn base_from_words(words: &[&str]) -> Option<CBase> {
    if words.is_empty() {
        return None;
    }
    let has = |w: &str| words.contains(&w);
    let longs = words.iter().filter(|w| **w == "long").count();
    let unsigned = has("unsigned");
    let int = |width: CWidth| {
        let width = IntWidth::Platform(width);
        CBase::Known(Type::Primitive(if unsigned {
            Primitive::UInt(width)
        } else {
            Primitive::Int(width)
        }))
    };
    Some(if has("void") {
        CBase::Void
    } else if has("_Bool") {
        CBase::Known(Type::Primitive(Primitive::Bool))
    } else if has("float") {
        CBase::Known(Type::Primitive(Primitive::Float))
    } else if has("double") {
        CBase::Known(Type::Primitive(if longs > 0 { Primitive::Decimal } else { Primitive::Double }))
    } else if has("char") {
        int(CWidth::Char)
    } else if has("short") {
        int(CWidth::Short)
    } else if longs >= 2 {
        int(CWidth::LongLong)
    } else if longs == 1 {
        int(CWidth::Long)
    } else {
        int(CWidth::Int)
    })
}

fn std_type(name: &str) -> Option<Type> {
    let fixed = |signed: bool, bits: u8| {
        Type::Primitive(if signed {
            Primitive::Int(IntWidth::Fixed(bits))
        } else {
            Primitive::UInt(IntWidth::Fixed(bits))
        })
    };
    Some(match name {
        "size_t" => Type::Primitive(Primitive::Size),
        "bool" => Type::Primitive(Primitive::Bool),
        "ssize_t" | "ptrdiff_t" | "intptr_t" | "off_t" => {
            Type::Primitive(Primitive::Int(IntWidth::Platform(CWidth::Long)))
        }
        "uintptr_t" => Type::Primitive(Primitive::UInt(IntWidth::Platform(CWidth::Long))),
        "int8_t" => fixed(true, 8),
        "int16_t" => fixed(true, 16),
        "int32_t" => fixed(true, 32),
        "int64_t" => fixed(true, 64),
        "uint8_t" => fixed(false, 8),
        "uint16_t" => fixed(false, 16),
        "uint32_t" => fixed(false, 32),
        "uint64_t" => fixed(false, 64),
        _ => return None,
    })
}

/// `char *` is a string, `void *` and opaque pointers are `any`, other
/// pointers are references.
fn apply_pointers(base: &CBase, stars: usize) -> Option<Type> {
    if stars == 0 {
        return match base {
            CBase::Void => Some(Type::Primitive(Primitive::Void)),
            CBase::Known(ty) => Some(ty.clone()),
            CBase::Opaque => None,
        };
    }
    let first = match base {
        CBase::Void | CBase::Opaque => Type::any(),
        CBase::Known(Type::Primitive(Primitive::Int(IntWidth::Platform(CWidth::Char))))
        | CBase::Known(Type::Primitive(Primitive::UInt(IntWidth::Platform(CWidth::Char)))) => {
            Type::Primitive(Primitive::Str)
        }
        CBase::Known(ty) => Type::reference(ty.clone()),
    };
    Some((1..stars).fold(first, |ty, _| Type::reference(ty)))
}

/// `* qualifiers name [N]...`, returning the type, the name and the
/// tokens after the declarator. Parameters may omit the name and turn
/// arrays into pointers.
fn parse_declarator<'t>(
    base: &CBase,
    tokens: &'t [CToken],
    parameter: bool,
) -> Option<(Type, String, &'t [CToken])> {
    let mut index = 0;
    let mut stars = 0;
    while let Some(token) = tokens.get(index) {
        if *token == CToken::Punct("*") {
            stars += 1;
        } else if !QUALIFIERS.iter().any(|w| is_word(token, w)) {
            break;
        }
        index += 1;
    }
    let name = match tokens.get(index) {
        Some(CToken::Ident(name)) => {
            index += 1;
            name.clone()
        }
        _ if parameter => String::new(),
        _ => return None,
    };

    let mut lengths = Vec::new();
    while tokens.get(index) == Some(&CToken::Punct("[")) {
        let length = match tokens.get(index + 1) {
            Some(CToken::Number(text)) => text.trim_end_matches(['u', 'U', 'l', 'L']).parse::<u64>().ok(),
            _ => None,
        };
        let close = tokens[index..].iter().position(|t| *t == CToken::Punct("]"))?;
        lengths.push(length);
        index += close + 1;
    }

    let mut ty = if parameter && !lengths.is_empty() {
        apply_pointers(base, stars + 1)?
    } else {
        let ty = apply_pointers(base, stars)?;
        lengths
            .iter()
            .rev()
            .fold(ty, |elem, length| Type::array(elem, *length))
    };
    if ty.is_void() && (parameter || !name.is_empty()) {
        return None;
    }
    if parameter && matches!(ty, Type::Array { .. }) {
        ty = Type::reference(ty);
    }
    Some((ty, name, &tokens[index..]))
}

/// Parameter list after the opening parenthesis. Tokens after the
/// closing parenthesis are ignored.
fn parse_params(tokens: &[CToken], known: &HashMap<String, Type>) -> Option<(Vec<Type>, Option<Variadic>)> {
    let mut depth = 0;
    let mut groups: Vec<&[CToken]> = Vec::new();
    let mut start = 0;
    let mut closed = false;
    for (index, token) in tokens.iter().enumerate() {
        match token {
            CToken::Punct("(") => depth += 1,
            CToken::Punct(")") if depth == 0 => {
                groups.push(&tokens[start..index]);
                closed = true;
                break;
            }
            CToken::Punct(")") => depth -= 1,
            CToken::Punct(",") if depth == 0 => {
                groups.push(&tokens[start..index]);
                start = index + 1;
            }
            _ => {}
        }
    }
    if !closed {
        return None;
    }

    let mut params = Vec::new();
    let mut variadic = None;
    match groups.as_slice() {
        [[]] => return Some((params, None)),
        [[CToken::Ident(word)]] if word == "void" => return Some((params, None)),
        _ => {}
    }
    for (index, group) in groups.iter().enumerate() {
        if *group == [CToken::Punct("...")] {
            if index + 1 != groups.len() {
                return None;
            }
            variadic = Some(Variadic::C);
            continue;
        }
        let (base, rest) = parse_base(group, known)?;
        let (ty, _, tail) = parse_declarator(&base, rest, true)?;
        if !tail.is_empty() {
            return None;
        }
        params.push(ty);
    }
    Some((params, variadic))
}
