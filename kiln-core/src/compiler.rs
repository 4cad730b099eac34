//! Compilation driver.
//!
//! A [`Compiler`] owns the header locator and the header cache. Units
//! compiled through the same compiler, sequentially or in parallel
//! with [`Compiler::compile_batch`], share both.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, debug_span, info};

use crate::ast::{TopLevel, Unit};
use crate::c_header::{bridge_includes, HeaderCache, HeaderLocator, SearchPathLocator};
use crate::codegen_c::{emit_c, DataModel};
use crate::diagnostic::Diagnostic;
use crate::dump::dump_unit;
use crate::error::CoreError;
use crate::parser::parse;
use crate::resolve::{resolve_unit, SemanticContext};
use crate::sources::read_source;
use crate::span::SourceMap;
use crate::typecheck::check_unit;

/// What a compilation produces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EmitFormat {
    #[default]
    C,
    /// The resolved AST dump.
    Ast,
}

impl EmitFormat {
    /// Extension of output files written for this format.
    pub fn extension(self) -> &'static str {
        match self {
            EmitFormat::C => "c",
            EmitFormat::Ast => "ast",
        }
    }
}

impl FromStr for EmitFormat {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "c" => Ok(EmitFormat::C),
            "ast" | "dump" => Ok(EmitFormat::Ast),
            _ => Err(CoreError::UnsupportedFormat(s.to_string())),
        }
    }
}

impl fmt::Display for EmitFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmitFormat::C => f.write_str("c"),
            EmitFormat::Ast => f.write_str("ast"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileOptions {
    pub emit: EmitFormat,
    /// Searched before the system include directories.
    pub include_dirs: Vec<PathBuf>,
    pub data_model: DataModel,
}

/// A unit that went through every front-end pass.
#[derive(Debug)]
pub struct AnalyzedUnit {
    pub unit: Unit,
    pub context: SemanticContext,
    /// Directives the header bridge skipped.
    pub warnings: Vec<Diagnostic>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOutput {
    pub text: String,
    pub warnings: Vec<Diagnostic>,
}

/// A failed unit, with its diagnostics rendered against the source.
#[derive(Debug, Error)]
#[error("{rendered}")]
pub struct CompileError {
    pub error: CoreError,
    rendered: String,
}

impl CompileError {
    fn new(error: CoreError, sources: &SourceMap) -> Self {
        let rendered = error
            .diagnostics()
            .iter()
            .map(|diag| diag.render(sources))
            .collect::<Vec<_>>()
            .join("\n");
        CompileError { error, rendered }
    }

    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.error.diagnostics()
    }
}

pub struct Compiler {
    options: CompileOptions,
    locator: Box<dyn HeaderLocator>,
    cache: Arc<HeaderCache>,
}

impl fmt::Debug for Compiler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Compiler")
            .field("options", &self.options)
            .field("cached_headers", &self.cache.len())
            .finish_non_exhaustive()
    }
}

impl Compiler {
    /// Headers are searched in the include directories, then the system
    /// ones.
    pub fn new(options: CompileOptions) -> Self {
        let locator = SearchPathLocator::with_system_dirs(options.include_dirs.clone());
        Compiler::with_locator(options, locator)
    }

    pub fn with_locator(options: CompileOptions, locator: impl HeaderLocator + 'static) -> Self {
        Compiler {
            options,
            locator: Box::new(locator),
            cache: Arc::new(HeaderCache::new()),
        }
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    pub fn header_cache(&self) -> &Arc<HeaderCache> {
        &self.cache
    }

    /// Parse, bridge, resolve and check one unit.
    pub fn analyze(&self, name: &str, source: &str) -> Result<AnalyzedUnit, CompileError> {
        let _span = debug_span!("unit", %name).entered();
        let mut sources = SourceMap::new();
        let file = sources.add(name, source);
        let fail = |error: CoreError| CompileError::new(error, &sources);

        let mut unit = parse(file, source).map_err(fail)?;
        debug!(nodes = unit.nodes.len(), "parsed");
        bridge_includes(&mut unit, &self.cache, self.locator.as_ref()).map_err(|err| fail(err.into()))?;
        let context = resolve_unit(&mut unit).map_err(|errs| fail(errs.into()))?;
        check_unit(&mut unit, &context).map_err(|errs| fail(errs.into()))?;

        let warnings = header_warnings(&unit);
        Ok(AnalyzedUnit {
            unit,
            context,
            warnings,
        })
    }

    pub fn compile_source(&self, name: &str, source: &str) -> Result<CompileOutput, CompileError> {
        let analyzed = self.analyze(name, source)?;
        let text = match self.options.emit {
            EmitFormat::C => emit_c(&analyzed.unit, &analyzed.context, self.options.data_model),
            EmitFormat::Ast => dump_unit(&analyzed.unit),
        };
        Ok(CompileOutput {
            text,
            warnings: analyzed.warnings,
        })
    }

    pub fn compile_file(&self, path: &Path) -> Result<CompileOutput, CompileError> {
        let source = read_source(path).map_err(|err| CompileError::new(err, &SourceMap::new()))?;
        self.compile_source(&path.display().to_string(), &source)
    }

    /// Compile every file in parallel. Results keep the order of `paths`.
    pub fn compile_batch(&self, paths: &[PathBuf]) -> Vec<(PathBuf, Result<CompileOutput, CompileError>)> {
        info!(units = paths.len(), emit = %self.options.emit, "compiling batch");
        paths
            .par_iter()
            .map(|path| (path.clone(), self.compile_file(path)))
            .collect()
    }
}

fn header_warnings(unit: &Unit) -> Vec<Diagnostic> {
    unit.nodes
        .iter()
        .filter_map(|node| match node {
            TopLevel::Include(include) => include.symbols.as_ref(),
            _ => None,
        })
        .flat_map(|table| table.warnings.iter())
        .map(|warning| {
            Diagnostic::warning(
                format!("{}:{}: {}", warning.header.display(), warning.line, warning.message),
                None,
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::c_header::MemoryLocator;
    use std::fs;

    const SHAPES_H: &str = "#define SIDES 4\n\
                            #define AREA(w, h) ((w) * (h))\n\
                            #define\n\
                            int printf(const char *fmt, ...);\n";

    fn compiler(emit: EmitFormat) -> Compiler {
        let options = CompileOptions {
            emit,
            ..CompileOptions::default()
        };
        Compiler::with_locator(options, MemoryLocator::new().with("shapes.h", SHAPES_H))
    }

    const PROGRAM: &str = "include shapes\n\
                           int main() {\n\
                               int area = AREA(SIDES, 2)\n\
                               printf(\"%d\\n\", area)\n\
                               return 0\n\
                           }\n";

    #[test]
    fn compiles_to_c() {
        let output = compiler(EmitFormat::C).compile_source("main.kn", PROGRAM).expect("compile");
        assert!(output.text.starts_with("#include <stddef.h>\n"), "{}", output.text);
        assert!(output.text.contains("#include <shapes.h>\n"));
        assert!(output.text.contains("    int32_t area = AREA(SIDES, 2);\n"));
        assert!(output.text.contains("    printf(\"%d\\n\", area);\n"));
    }

    #[test]
    fn dumps_the_resolved_tree() {
        let output = compiler(EmitFormat::Ast).compile_source("main.kn", PROGRAM).expect("compile");
        assert!(output.text.contains("C function macro"));
        assert!(output.text.contains("Arg count: 2"));
        assert!(output.text.contains("Identifier: SIDES\n"));
    }

    #[test]
    fn skipped_header_directives_become_warnings() {
        let output = compiler(EmitFormat::C).compile_source("main.kn", PROGRAM).expect("compile");
        assert_eq!(output.warnings.len(), 1);
        assert!(output.warnings[0].message.starts_with("shapes.h:3: "), "{:?}", output.warnings);
    }

    #[test]
    fn semantic_errors_are_reported_together() {
        let err = compiler(EmitFormat::C)
            .compile_source("main.kn", "int main() {\n    return missing + other\n}\n")
            .expect_err("unresolved names");
        assert_eq!(err.diagnostics().len(), 2);
        assert_eq!(
            err.to_string(),
            "main.kn:2:12: error[E0301]: unresolved identifier `missing`\n\
             main.kn:2:22: error[E0301]: unresolved identifier `other`"
        );
    }

    #[test]
    fn missing_headers_fail_the_unit() {
        let err = compiler(EmitFormat::C)
            .compile_source("main.kn", "include nothere\n")
            .expect_err("missing header");
        assert!(matches!(err.error, CoreError::Bridge(_)));
        assert_eq!(err.to_string(), "main.kn:1:1: error[E0201]: header `nothere.h` not found");
    }

    #[test]
    fn parse_errors_abort_the_unit() {
        let err = compiler(EmitFormat::C)
            .compile_source("main.kn", "void f(int a = 1, int b) {\n}\n")
            .expect_err("default order");
        assert_eq!(err.diagnostics()[0].code, Some("E0102"));
    }

    #[test]
    fn formats_parse_from_names() {
        assert_eq!("C".parse::<EmitFormat>().expect("c"), EmitFormat::C);
        assert_eq!("dump".parse::<EmitFormat>().expect("dump"), EmitFormat::Ast);
        assert!(matches!(
            "wasm".parse::<EmitFormat>(),
            Err(CoreError::UnsupportedFormat(name)) if name == "wasm"
        ));
    }

    #[test]
    fn batches_share_the_header_cache() {
        let dir = tempfile::tempdir().expect("tempdir");
        let include = dir.path().join("include");
        fs::create_dir_all(&include).expect("mkdir");
        fs::write(include.join("limits.h"), "#define LIMIT 8\n").expect("write header");

        let mut paths = Vec::new();
        for name in ["a", "b", "c"] {
            let path = dir.path().join(format!("{name}.kn"));
            fs::write(&path, format!("include limits\nint {name}_limit = LIMIT\n")).expect("write source");
            paths.push(path);
        }
        paths.push(dir.path().join("missing.kn"));

        let compiler = Compiler::with_locator(CompileOptions::default(), SearchPathLocator::new(vec![include]));
        let results = compiler.compile_batch(&paths);
        assert_eq!(results.len(), 4);
        for (path, result) in &results[..3] {
            let output = result.as_ref().expect("compiled");
            let stem = path.file_stem().and_then(|s| s.to_str()).expect("stem");
            assert!(output.text.contains(&format!("int32_t {stem}_limit = LIMIT;")));
        }
        assert!(matches!(results[3].1, Err(CompileError { error: CoreError::SourceIo { .. }, .. })));
        assert_eq!(compiler.header_cache().len(), 1);
    }
}
