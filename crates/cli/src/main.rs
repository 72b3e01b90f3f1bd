//! Ripple CLI - evaluate a sheet of dependent formulas.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use ripple_core::load_sheet;
use ripple_kernel::Kernel;
use ripple_script::CalcEvaluator;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "ripple")]
#[command(about = "Dependency-driven formula evaluation", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate every formula in a sheet and print the results
    Run {
        /// Sheet file (TOML or JSON)
        sheet: PathBuf,
    },
    /// List a sheet's formulas without evaluating them
    Check {
        /// Sheet file (TOML or JSON)
        sheet: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .init();

    match cli.command {
        Commands::Run { sheet } => {
            let formulas = load_sheet(&sheet)?.into_formulas();
            info!(formulas = formulas.len(), "evaluating sheet");

            let submitted: Vec<String> = formulas.keys().cloned().collect();
            let kernel = Kernel::new(Arc::new(CalcEvaluator::new()));
            let output = kernel.update(formulas).await;

            let mut names: Vec<&String> = output.keys().collect();
            names.sort();
            for name in names {
                println!("{} = {}", name, output[name]);
            }

            let mut failed: Vec<String> = submitted
                .into_iter()
                .filter(|name| !output.contains_key(name))
                .collect();
            if !failed.is_empty() {
                failed.sort();
                eprintln!("failed: {}", failed.join(", "));
            }
        }
        Commands::Check { sheet } => {
            let loaded = load_sheet(&sheet)?;
            println!("Formulas ({})", loaded.formulas.len());
            let mut names: Vec<&String> = loaded.formulas.keys().collect();
            names.sort();
            for name in names {
                let formula = &loaded.formulas[name];
                println!(
                    "  {} | {} dependencies | {}",
                    name,
                    formula.dependencies.len(),
                    formula.code.lines().next().unwrap_or(""),
                );
            }
        }
    }

    Ok(())
}
