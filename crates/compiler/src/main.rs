//! Quill Compiler CLI
//!
//! Command-line interface for compiling .ql source files to the
//! machine-agnostic IR. Multiple inputs are independent jobs and may run
//! on worker threads.

use clap::{CommandFactory, Parser as ClapParser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use std::io;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};

use quillc::{Diagnostics, OptLevel, Options, ProjectConfig, compile_file};

#[derive(ClapParser)]
#[command(name = "quillc")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Quill compiler - compile .ql sources to IR", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum OptArg {
    /// -O0
    None,
    /// -O1
    Few,
    /// -O2
    #[default]
    Default,
    /// -O3
    Many,
    /// -Os
    Space,
}

impl From<OptArg> for OptLevel {
    fn from(arg: OptArg) -> Self {
        match arg {
            OptArg::None => OptLevel::None,
            OptArg::Few => OptLevel::Few,
            OptArg::Default => OptLevel::Default,
            OptArg::Many => OptLevel::Many,
            OptArg::Space => OptLevel::Space,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Compile .ql source files
    Build {
        /// Input .ql source files
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output file name
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Optimization level
        #[arg(short = 'O', long = "opt", value_enum, default_value = "default")]
        opt: OptArg,

        /// Worker threads for independent units
        #[arg(long)]
        threads: Option<u32>,

        /// Retain source positions through the IR
        #[arg(short = 'g', long)]
        debug: bool,

        /// Emit per-stage timings
        #[arg(long)]
        time: bool,

        /// Log extra notes
        #[arg(short = 'b', long)]
        verbose: bool,

        /// Dump the syntax tree
        #[arg(long)]
        print_tree: bool,

        /// Dump the lowered IR
        #[arg(long)]
        print_ir: bool,

        /// Path to a project configuration (TOML)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Build {
            inputs,
            output,
            opt,
            threads,
            debug,
            time,
            verbose,
            print_tree,
            print_ir,
            config,
        } => {
            let mut options = Options {
                output,
                opt: opt.into(),
                threads: threads.unwrap_or(1),
                debug,
                multithread: threads.unwrap_or(1) > 1,
                time,
                verbose,
                print_tree,
                print_ir,
            };

            let config_path = config.unwrap_or_else(|| PathBuf::from("quill.toml"));
            if config_path.exists() {
                match ProjectConfig::load(&config_path) {
                    Ok(config) => options.apply_config(&config),
                    Err(message) => {
                        eprintln!("quillc: {}", message);
                        process::exit(1);
                    }
                }
            }

            process::exit(run_build(&inputs, &options));
        }

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            generate(shell, &mut cmd, name, &mut io::stdout());
        }
    }
}

/// Compile every input as an independent job and fold the results into
/// one exit code.
fn run_build(inputs: &[PathBuf], options: &Options) -> i32 {
    let failed = AtomicBool::new(false);

    if options.multithread && inputs.len() > 1 {
        let workers = (options.threads as usize).max(2).min(inputs.len());
        let chunk = inputs.len().div_ceil(workers);
        let failed = &failed;

        std::thread::scope(|scope| {
            for batch in inputs.chunks(chunk) {
                scope.spawn(move || {
                    for input in batch {
                        if !compile_one(input, options) {
                            failed.store(true, Ordering::Relaxed);
                        }
                    }
                });
            }
        });
    } else {
        for input in inputs {
            if !compile_one(input, options) {
                failed.store(true, Ordering::Relaxed);
            }
        }
    }

    if failed.load(Ordering::Relaxed) { 1 } else { 0 }
}

/// Run one unit through the pipeline. Each job gets its own diagnostics
/// handle; a fatal error aborts only this job.
fn compile_one(input: &Path, options: &Options) -> bool {
    let mut diags = Diagnostics::stderr();

    match compile_file(input, options, &mut diags) {
        Ok(_) => diags.flush() == 0,
        Err(err) => {
            diags.report(&err);
            diags.flush();
            false
        }
    }
}
