//! docxtpl CLI - DOCX template renderer.
//!
//! Renders a `.docx` template against a JSON data file:
//!
//! ```text
//! docxtpl template.docx data.json output.docx
//! ```

mod commands;
mod error;
mod output;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use commands::RenderArgs;
use output::Output;

/// docxtpl - DOCX template renderer.
#[derive(Parser)]
#[command(name = "docxtpl", version, about)]
struct Cli {
    #[command(flatten)]
    render: RenderArgs,
}

fn main() {
    let cli = Cli::parse();
    let output = Output::new();

    // --verbose enables INFO level, otherwise use RUST_LOG or default to WARN
    let filter = if cli.render.verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = cli.render.execute() {
        if let Some(report) = err.report() {
            output.report(&report);
        }
        output.error(&format!("Error: {err}"));
        std::process::exit(1);
    }
}
