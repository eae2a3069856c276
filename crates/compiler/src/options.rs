//! Compiler options
//!
//! The settings the pipeline reads. The CLI fills these from argv; a
//! `quill.toml` project file can fill them from disk, with flags taking
//! precedence.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Possible optimization levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptLevel {
    /// No optimizations, i.e. -O0.
    None,
    /// Basic optimizations, i.e. -O1.
    Few,
    /// The standard set, i.e. -O2.
    #[default]
    Default,
    /// More aggressive optimizations, i.e. -O3.
    Many,
    /// Optimize for output size, i.e. -Os.
    Space,
}

/// Settings for one compiler invocation.
#[derive(Debug, Clone)]
pub struct Options {
    /// (-o) The name of the output file.
    pub output: Option<PathBuf>,
    /// (-O) The optimization level.
    pub opt: OptLevel,
    /// (--threads) Job parallelism for multiple units.
    pub threads: u32,
    /// (-g) Retain source positions through the IR.
    pub debug: bool,
    /// Run independent units on worker threads.
    pub multithread: bool,
    /// (--time) Emit per-stage timings.
    pub time: bool,
    /// (-b) Log extra notes.
    pub verbose: bool,
    /// (--print-tree) Dump the syntax tree.
    pub print_tree: bool,
    /// (--print-ir) Dump the lowered IR.
    pub print_ir: bool,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            output: None,
            opt: OptLevel::default(),
            threads: 1,
            debug: false,
            multithread: false,
            time: false,
            verbose: false,
            print_tree: false,
            print_ir: false,
        }
    }
}

/// Project configuration parsed from `quill.toml`. Every field is
/// optional; unset fields leave the current option untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectConfig {
    pub output: Option<PathBuf>,
    pub opt: Option<OptLevel>,
    pub threads: Option<u32>,
    pub debug: Option<bool>,
    pub time: Option<bool>,
    pub verbose: Option<bool>,
}

impl ProjectConfig {
    /// Parse project configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, String> {
        toml::from_str(toml_str).map_err(|e| format!("failed to parse project config: {}", e))
    }

    pub fn load(path: &Path) -> Result<Self, String> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
        Self::from_toml(&text)
    }
}

impl Options {
    /// Fold a project config underneath these options.
    pub fn apply_config(&mut self, config: &ProjectConfig) {
        if self.output.is_none() {
            self.output = config.output.clone();
        }
        if let Some(opt) = config.opt {
            self.opt = opt;
        }
        if let Some(threads) = config.threads {
            self.threads = threads;
            self.multithread = threads > 1;
        }
        self.debug |= config.debug.unwrap_or(false);
        self.time |= config.time.unwrap_or(false);
        self.verbose |= config.verbose.unwrap_or(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_parses_and_applies() {
        let config = ProjectConfig::from_toml(
            r#"
output = "demo"
opt = "space"
threads = 4
time = true
"#,
        )
        .unwrap();

        let mut options = Options::default();
        options.apply_config(&config);

        assert_eq!(options.output.as_deref(), Some(Path::new("demo")));
        assert_eq!(options.opt, OptLevel::Space);
        assert_eq!(options.threads, 4);
        assert!(options.multithread);
        assert!(options.time);
        assert!(!options.verbose);
    }

    #[test]
    fn test_flags_take_precedence_over_config() {
        let config = ProjectConfig::from_toml("output = \"from-config\"").unwrap();

        let mut options = Options { output: Some(PathBuf::from("from-flag")), ..Default::default() };
        options.apply_config(&config);
        assert_eq!(options.output.as_deref(), Some(Path::new("from-flag")));
    }

    #[test]
    fn test_bad_config_is_an_error() {
        assert!(ProjectConfig::from_toml("opt = \"warp\"").is_err());
        assert!(ProjectConfig::from_toml("threads = \"many\"").is_err());
    }
}
