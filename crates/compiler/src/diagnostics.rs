//! Diagnostics logging
//!
//! A diagnostics handle is threaded explicitly through the pipeline; no
//! stage logs through global state. Notes and warnings are informative;
//! errors additionally set a sticky errors-seen flag that the driver
//! turns into the process exit code at the end of a job.

use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};

use crate::error::CompileError;
use crate::source::{SourceLocation, SourceSpan};

/// A diagnostics logger for the frontend.
pub struct Diagnostics {
    out: Box<dyn Write + Send>,
    /// The path reported in location-carrying messages.
    path: Option<PathBuf>,
    /// The current unit's source text, used for span excerpts.
    source: Option<String>,
    color: bool,
    errors: bool,
}

impl Diagnostics {
    /// A logger writing to standard error, with color when that is a
    /// terminal.
    pub fn stderr() -> Self {
        Diagnostics {
            color: io::stderr().is_terminal(),
            out: Box::new(io::stderr()),
            path: None,
            source: None,
            errors: false,
        }
    }

    /// A logger writing to an arbitrary sink, without color. Used by
    /// tests to capture output.
    pub fn to_writer(out: Box<dyn Write + Send>) -> Self {
        Diagnostics { out, path: None, source: None, color: false, errors: false }
    }

    pub fn set_path(&mut self, path: &Path) {
        self.path = Some(path.to_path_buf());
    }

    pub fn set_source(&mut self, source: &str) {
        self.source = Some(source.to_string());
    }

    /// True once any error has been logged.
    pub fn has_errors(&self) -> bool {
        self.errors
    }

    /// The exit code this job should produce.
    pub fn exit_code(&self) -> i32 {
        if self.errors { 1 } else { 0 }
    }

    /// Flush the underlying writer at the end of a job and report the
    /// exit code.
    pub fn flush(&mut self) -> i32 {
        let _ = self.out.flush();
        self.exit_code()
    }

    fn path_str(&self) -> String {
        self.path
            .as_deref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<input>".to_string())
    }

    fn label(&self, plain: &str, colored: &str) -> String {
        if self.color { colored.to_string() } else { plain.to_string() }
    }

    fn log(&mut self, label: String, msg: &str, loc: Option<SourceLocation>) {
        let line = match loc {
            Some(loc) => format!("{}:{}: {} {}\n", self.path_str(), loc, label, msg),
            None => format!("quillc: {} {}\n", label, msg),
        };
        let _ = self.out.write_all(line.as_bytes());
    }

    /// Print the source lines a span covers, when the source is known.
    fn print_excerpt(&mut self, span: SourceSpan) {
        let Some(source) = self.source.clone() else { return };

        let mut text = String::new();
        for (index, line) in source.lines().enumerate() {
            let line_n = index as u16 + 1;
            if span.start.line <= line_n && line_n <= span.end.line {
                text.push_str(&format!("  {:>4} | {}\n", line_n, line));
            }
        }
        let _ = self.out.write_all(text.as_bytes());
    }

    pub fn note(&mut self, msg: &str) {
        let label = self.label("note:", "\x1b[1;35mnote:\x1b[0m");
        self.log(label, msg, None);
    }

    pub fn note_at(&mut self, msg: &str, loc: SourceLocation) {
        let label = self.label("note:", "\x1b[1;35mnote:\x1b[0m");
        self.log(label, msg, Some(loc));
    }

    pub fn warn(&mut self, msg: &str) {
        let label = self.label("warning:", "\x1b[1;33mwarning:\x1b[0m");
        self.log(label, msg, None);
    }

    pub fn warn_at(&mut self, msg: &str, loc: SourceLocation) {
        let label = self.label("warning:", "\x1b[1;33mwarning:\x1b[0m");
        self.log(label, msg, Some(loc));
    }

    pub fn error(&mut self, msg: &str) {
        self.errors = true;
        let label = self.label("error:", "\x1b[1;31merror:\x1b[0m");
        self.log(label, msg, None);
    }

    pub fn error_at(&mut self, msg: &str, loc: SourceLocation) {
        self.errors = true;
        let label = self.label("error:", "\x1b[1;31merror:\x1b[0m");
        self.log(label, msg, Some(loc));
    }

    pub fn error_span(&mut self, msg: &str, span: SourceSpan) {
        self.error_at(msg, span.start);
        self.print_excerpt(span);
    }

    /// Render a fatal error. The single fatal path: stages construct a
    /// [`CompileError`] and propagate it; only the driver calls this.
    pub fn report(&mut self, err: &CompileError) {
        let label = self.label("fatal:", "\x1b[1;31mfatal:\x1b[0m");
        let line = format!("quillc: {} {}\n", label, err);
        let _ = self.out.write_all(line.as_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// A writer that shares its buffer with the test body.
    #[derive(Clone, Default)]
    struct Shared(Arc<Mutex<Vec<u8>>>);

    impl Write for Shared {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn captured() -> (Diagnostics, Shared) {
        let shared = Shared::default();
        (Diagnostics::to_writer(Box::new(shared.clone())), shared)
    }

    #[test]
    fn test_errors_set_the_flag() {
        let (mut diags, _) = captured();
        assert!(!diags.has_errors());
        diags.warn("only a warning");
        assert!(!diags.has_errors());
        diags.error("an error");
        assert!(diags.has_errors());
        assert_eq!(diags.exit_code(), 1);
    }

    #[test]
    fn test_location_formatting() {
        let (mut diags, shared) = captured();
        diags.set_path(Path::new("demo.ql"));
        diags.error_at("unexpected token", SourceLocation::new(3, 14));

        let text = String::from_utf8(shared.0.lock().unwrap().clone()).unwrap();
        assert_eq!(text, "demo.ql:3:14: error: unexpected token\n");
    }

    #[test]
    fn test_span_excerpt_quotes_the_line() {
        let (mut diags, shared) = captured();
        diags.set_path(Path::new("demo.ql"));
        diags.set_source("first line\nsecond line\nthird line\n");

        let span = SourceSpan::new(SourceLocation::new(2, 1), SourceLocation::new(2, 6));
        diags.error_span("bad thing here", span);

        let text = String::from_utf8(shared.0.lock().unwrap().clone()).unwrap();
        assert!(text.contains("second line"));
        assert!(!text.contains("third line"));
    }
}
