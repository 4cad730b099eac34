use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Parser;
use kiln_core::diagnostic::Diagnostic;
use kiln_core::span::SourceMap;
use kiln_core::{CompileOptions, Compiler, DataModel, EmitFormat, collect_sources};
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Compile Kiln sources to C.
#[derive(Parser, Debug)]
#[command(name = "kiln", version, about, long_about = None)]
struct Cli {
    /// Source files or directories of `.kn` files; stdin when omitted.
    inputs: Vec<PathBuf>,

    #[arg(
        short,
        long,
        value_name = "PATH",
        help = "Output file for a single input, output directory for several (defaults to stdout)"
    )]
    output: Option<PathBuf>,

    #[arg(long, value_name = "FORMAT", default_value = "c", help = "Output format: c, ast")]
    emit: EmitFormat,

    #[arg(short = 'I', long = "include-dir", value_name = "DIR", help = "Add a header search directory")]
    include_dirs: Vec<PathBuf>,

    #[arg(
        long,
        value_name = "MODEL",
        default_value = "lp64",
        help = "C data model for platform-sized integers: lp64, llp64, ilp32"
    )]
    data_model: DataModel,

    #[arg(short, long, action = clap::ArgAction::Count, help = "Log more (-v info, -vv debug, -vvv trace)")]
    verbose: u8,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    execute(cli)
}

/// `KILN_LOG` takes precedence over `-v`.
fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_env("KILN_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr).with_target(false))
        .with(filter)
        .init();
}

fn execute(cli: Cli) -> Result<()> {
    let options = CompileOptions {
        emit: cli.emit,
        include_dirs: cli.include_dirs,
        data_model: cli.data_model,
    };
    let compiler = Compiler::new(options);

    if cli.inputs.is_empty() {
        let mut source = String::new();
        io::stdin()
            .read_to_string(&mut source)
            .context("failed to read source from stdin")?;
        let output = compiler.compile_source("<stdin>", &source)?;
        report_warnings(&output.warnings);
        return write_single(cli.output.as_deref(), &output.text);
    }

    let files = collect_sources(&cli.inputs).context("failed to collect sources")?;
    debug!(files = files.len(), "collected inputs");
    match files.as_slice() {
        [] => bail!("no .kn sources found"),
        [file] if !cli.inputs.iter().any(|input| input.is_dir()) => {
            let output = compiler.compile_file(file)?;
            report_warnings(&output.warnings);
            write_single(cli.output.as_deref(), &output.text)
        }
        _ => {
            let results = compiler.compile_batch(&files);
            let mut failed = 0;
            let mut stdout = String::new();
            for (path, result) in results {
                match result {
                    Ok(output) => {
                        report_warnings(&output.warnings);
                        match &cli.output {
                            Some(dir) => {
                                let target = output_path(dir, &path, compiler.options().emit);
                                write_output(&target, &output.text)?;
                            }
                            None => stdout.push_str(&output.text),
                        }
                    }
                    Err(err) => {
                        failed += 1;
                        eprintln!("{err}");
                    }
                }
            }
            print!("{stdout}");
            if failed > 0 {
                bail!("{failed} of {} units failed to compile", files.len());
            }
            Ok(())
        }
    }
}

fn report_warnings(warnings: &[Diagnostic]) {
    let sources = SourceMap::new();
    for warning in warnings {
        eprintln!("{}", warning.render(&sources));
    }
}

fn write_single(output: Option<&Path>, text: &str) -> Result<()> {
    match output {
        Some(path) => write_output(path, text),
        None => {
            print!("{text}");
            Ok(())
        }
    }
}

/// `<dir>/<stem>.<ext>` for one input of a batch.
fn output_path(dir: &Path, input: &Path, emit: EmitFormat) -> PathBuf {
    let stem = input.file_stem().unwrap_or(input.as_os_str());
    dir.join(stem).with_extension(emit.extension())
}

fn write_output(path: &Path, text: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {}", parent.display()))?;
        }
    }
    fs::write(path, text).with_context(|| format!("failed to write output file {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_options() {
        let cli = Cli::try_parse_from([
            "kiln", "a.kn", "src", "-o", "out", "--emit", "ast", "-I", "inc", "-I", "more", "--data-model", "llp64",
            "-vv",
        ])
        .expect("valid arguments");
        assert_eq!(cli.inputs, vec![PathBuf::from("a.kn"), PathBuf::from("src")]);
        assert_eq!(cli.output, Some(PathBuf::from("out")));
        assert_eq!(cli.emit, EmitFormat::Ast);
        assert_eq!(cli.include_dirs, vec![PathBuf::from("inc"), PathBuf::from("more")]);
        assert_eq!(cli.data_model, DataModel::LLP64);
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn rejects_unknown_formats() {
        assert!(Cli::try_parse_from(["kiln", "--emit", "wasm"]).is_err());
        assert!(Cli::try_parse_from(["kiln", "--data-model", "lp128"]).is_err());
    }

    #[test]
    fn batch_outputs_use_the_format_extension() {
        let target = output_path(Path::new("out"), Path::new("src/app/main.kn"), EmitFormat::C);
        assert_eq!(target, PathBuf::from("out/main.c"));
        let dump = output_path(Path::new("out"), Path::new("main.kn"), EmitFormat::Ast);
        assert_eq!(dump, PathBuf::from("out/main.ast"));
    }
}
