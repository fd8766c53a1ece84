use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use lowering::config::LowerConfig;
use lowering::diagnostics::render_diagnostic;
use lowering::LoweringOutput;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "lowerc", version, about = "Lower type-checked expression trees to SSA IR")]
struct Cli {
    /// Path to a lower.toml configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log filter, e.g. "debug" or "lowering=trace" (overrides LOWER_LOG)
    #[arg(long, global = true)]
    log: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lower a JSON lowering unit and print the IR module
    Lower {
        /// Lowering unit (JSON)
        file: PathBuf,
        /// Write the IR here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Source the spans point into, used when rendering diagnostics
        #[arg(long)]
        source: Option<PathBuf>,
    },
    /// Lower a unit and print the abstract-operation coverage log as JSON
    Coverage {
        /// Lowering unit (JSON)
        file: PathBuf,
        /// Write the log here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn init_logging(filter: Option<&str>) {
    let filter = match filter {
        Some(f) => EnvFilter::new(f),
        None => EnvFilter::try_from_env("LOWER_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

fn run_lowering(file: &Path, config: &LowerConfig) -> LoweringOutput {
    match lowering::lower_file(file, config) {
        Ok(out) => out,
        Err(err) => {
            eprintln!("error [{}]: {err}", file.display());
            std::process::exit(1);
        }
    }
}

fn write_or_print(output: Option<&Path>, text: &str) {
    match output {
        Some(path) => {
            if let Err(e) = std::fs::write(path, text) {
                eprintln!("error: failed to write {}: {e}", path.display());
                std::process::exit(1);
            }
        }
        None => print!("{text}"),
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log.as_deref());

    let config = match LowerConfig::load(cli.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(1);
        }
    };

    match cli.command {
        Commands::Lower { file, output, source } => {
            let out = run_lowering(&file, &config);
            let source_text = source.as_ref().and_then(|p| std::fs::read_to_string(p).ok());
            let filename = source
                .as_ref()
                .unwrap_or(&file)
                .to_string_lossy()
                .to_string();
            for diag in &out.diagnostics {
                render_diagnostic(source_text.as_deref(), &filename, diag);
            }
            if out.has_errors() {
                std::process::exit(1);
            }
            write_or_print(output.as_deref(), &out.module.to_string());
        }
        Commands::Coverage { file, output } => {
            let out = run_lowering(&file, &config);
            for diag in &out.diagnostics {
                render_diagnostic(None, &file.to_string_lossy(), diag);
            }
            let mut json = out.coverage.to_json();
            json.push('\n');
            write_or_print(output.as_deref(), &json);
            if out.has_errors() {
                std::process::exit(1);
            }
        }
    }
}
