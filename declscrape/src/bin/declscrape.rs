//! CLI entry point for declscrape.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

/// declscrape — extract a filtered declaration model from C/C++ headers.
#[derive(Parser, Debug)]
#[command(name = "declscrape", version, about)]
struct Cli {
    /// Header or source file to parse.
    header: PathBuf,

    /// Path to a declscrape.toml configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print per-declaration inclusion verdicts after shaking.
    #[arg(long)]
    diagnostics: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("declscrape=info")),
        )
        .init();

    let cli = Cli::parse();

    let mut options = match &cli.config {
        Some(path) => declscrape::config::load_options(path)?,
        None => declscrape::Options::default(),
    };
    if cli.diagnostics {
        options.diagnostics = true;
    }

    let translation = declscrape::extract(&cli.header, &options)?;

    for decl in translation.exposed() {
        println!("{}: {} [{}]", decl.kind, decl.qualified_name, decl.location);
        for field_idx in decl.record_fields() {
            let field = translation.decl(*field_idx);
            println!(
                "  FIELD: {} {{offset: {}}}",
                field.name,
                field.field_offset().unwrap_or(-1)
            );
        }
        for constant_idx in decl.enum_constants() {
            let constant = translation.decl(*constant_idx);
            println!(
                "  CONSTANT: {} = {}",
                constant.name,
                constant.enum_constant_value().unwrap_or(0)
            );
        }
        for param_idx in decl.function_params() {
            let param = translation.decl(*param_idx);
            let type_name = param
                .ty
                .map(|t| translation.ty(t).name.clone())
                .unwrap_or_default();
            println!("  PARAMETER: {} {}", param.name, type_name);
        }
    }

    Ok(())
}
