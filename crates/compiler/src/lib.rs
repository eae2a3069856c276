//! Quill Compiler Library
//!
//! Provides compilation from Quill source to the machine-agnostic IR in
//! `quill_ir`. One translation unit flows through the pipeline at a
//! time: lexing and parsing, symbol analysis, semantic analysis, then IR
//! generation. Units are independent jobs; nothing is shared between
//! them, so the driver may run several on worker threads.
//!
//! ```rust,ignore
//! use quillc::{compile_source, Diagnostics, Options};
//!
//! let mut diags = Diagnostics::stderr();
//! let options = Options::default();
//! let compiled = compile_source(Path::new("demo.ql"), source, &options, &mut diags)?;
//! println!("{}", compiled.cfg.display());
//! ```

pub mod ast;
pub mod diagnostics;
pub mod error;
pub mod irgen;
pub mod lexer;
pub mod options;
pub mod parser;
pub mod printer;
pub mod scope;
pub mod sema;
pub mod source;
pub mod symbols;
pub mod token;
pub mod types;

pub use ast::TranslationUnit;
pub use diagnostics::Diagnostics;
pub use error::CompileError;
pub use lexer::Lexer;
pub use options::{OptLevel, Options, ProjectConfig};
pub use parser::Parser;
pub use printer::Printer;
pub use sema::SemanticAnalysis;
pub use source::{SourceLocation, SourceSpan};
pub use symbols::SymbolAnalysis;
pub use token::{Token, TokenKind};

use std::path::Path;
use std::time::Instant;

use irgen::IrGen;

/// The products of one compiled unit.
pub struct CompiledUnit {
    pub unit: TranslationUnit,
    pub cfg: quill_ir::Cfg,
}

/// Compile one unit from source text already in memory.
pub fn compile_source(
    path: &Path,
    source: &str,
    options: &Options,
    diags: &mut Diagnostics,
) -> Result<CompiledUnit, CompileError> {
    let mut stage = Instant::now();
    let timing = |diags: &mut Diagnostics, name: &str, stage: &mut Instant| {
        if options.time {
            diags.note(&format!("{} took {:.3}ms", name, stage.elapsed().as_secs_f64() * 1e3));
        }
        *stage = Instant::now();
    };

    let mut unit = Parser::new(diags, path, source).parse()?;
    timing(diags, "syntax analysis", &mut stage);

    SymbolAnalysis::new(diags, &mut unit).run()?;
    timing(diags, "symbol analysis", &mut stage);

    SemanticAnalysis::new(diags, &mut unit).run()?;
    timing(diags, "semantic analysis", &mut stage);

    if options.print_tree {
        print!("{}", Printer::new(&unit).print());
    }

    // Analysis errors make lowering meaningless; hand back the checked
    // tree with an empty graph and let the driver flush the exit code.
    if diags.has_errors() {
        let cfg = quill_ir::Cfg::new(&path.display().to_string());
        return Ok(CompiledUnit { unit, cfg });
    }

    let cfg = IrGen::new(&unit).run()?;
    timing(diags, "ir generation", &mut stage);

    if options.print_ir {
        print!("{}", cfg.display());
    }

    if options.verbose {
        diags.note(&format!("compiled unit '{}'", path.display()));
    }

    Ok(CompiledUnit { unit, cfg })
}

/// Compile one unit from a file on disk.
pub fn compile_file(
    path: &Path,
    options: &Options,
    diags: &mut Diagnostics,
) -> Result<CompiledUnit, CompileError> {
    let source = std::fs::read_to_string(path)?;
    compile_source(path, &source, options, diags)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_pipeline_end_to_end() {
        let source = r#"
            limit :: s64 = 100

            clamp :: (x: s64) -> s64 {
                if x > limit ret limit;
                ret x;
            }
        "#;

        let mut diags = Diagnostics::to_writer(Box::new(std::io::sink()));
        let compiled =
            compile_source(Path::new("clamp.ql"), source, &Options::default(), &mut diags)
                .expect("compile failed");

        assert!(!diags.has_errors());
        assert!(compiled.cfg.get_global("limit").is_some());
        assert!(compiled.cfg.get_function("clamp").is_some());
    }

    #[test]
    fn test_fatal_errors_propagate() {
        let mut diags = Diagnostics::to_writer(Box::new(std::io::sink()));
        let result = compile_source(
            Path::new("bad.ql"),
            "f :: () -> s64 { ret missing; }",
            &Options::default(),
            &mut diags,
        );
        assert!(matches!(result, Err(CompileError::Unresolved(_))));
    }

    #[test]
    fn test_compile_file_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("unit.ql");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "main :: () -> s64 {{ ret 0; }}").unwrap();

        let mut diags = Diagnostics::to_writer(Box::new(std::io::sink()));
        let compiled = compile_file(&path, &Options::default(), &mut diags).expect("compile failed");
        assert!(compiled.cfg.get_function("main").is_some());
    }

    #[test]
    fn test_missing_file_is_an_io_error() {
        let mut diags = Diagnostics::to_writer(Box::new(std::io::sink()));
        let result = compile_file(Path::new("/nonexistent/unit.ql"), &Options::default(), &mut diags);
        assert!(matches!(result, Err(CompileError::Io(_))));
    }
}
