// attest/src/main.rs

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

// Infrastructure (Parsing & Built-in Adapters)
use attest_core::infrastructure::adapters::bootstrap_registry;
use attest_core::infrastructure::parser::load_runbook;

// Domain (Config for override layering)
use attest_core::domain::runbook::RunbookConfig;

// Application (Use Cases)
use attest_core::application::{DagExecutor, ExecutionResult, Outcome, Planner};

#[derive(Parser)]
#[command(name = "attest")]
#[command(about = "The Compliance-as-Code Analysis Orchestrator", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 🚀 Plans and executes a runbook end to end
    Run {
        /// Runbook file
        runbook: PathBuf,

        /// Override the runbook's max_concurrency (ex: "--max-concurrency 4")
        #[arg(long)]
        max_concurrency: Option<usize>,
    },

    /// 🧠 Validates a runbook and prints the execution plan
    Plan {
        /// Runbook file
        runbook: PathBuf,
    },

    /// 🔌 Lists registered source and processor component types
    Components,
}

// Exit codes consumed by CI wrappers.
const EXIT_PLAN_ERROR: i32 = 2;
const EXIT_EXECUTION_ERROR: i32 = 3;
const EXIT_CANCELLED: i32 = 4;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // RUST_LOG=debug attest run ... to see the details
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let registry = bootstrap_registry();

    match cli.command {
        // --- USE CASE: RUN ---
        Commands::Run {
            runbook,
            max_concurrency,
        } => {
            let start = std::time::Instant::now();

            println!("⚙️  Planning runbook {}...", runbook.display());
            let mut parsed = match load_runbook(&runbook) {
                Ok(parsed) => parsed,
                Err(e) => {
                    eprintln!("💥 PLAN ERROR: {e}");
                    std::process::exit(EXIT_PLAN_ERROR);
                }
            };
            apply_overrides(&mut parsed.config, max_concurrency);

            let plan = match Planner::plan_runbook(parsed, &runbook, &registry) {
                Ok(plan) => plan,
                Err(e) => {
                    eprintln!("💥 PLAN ERROR: {e}");
                    std::process::exit(EXIT_PLAN_ERROR);
                }
            };
            println!(
                "📝 Execution Plan: {} artifacts in {} layers",
                plan.artifacts().len(),
                plan.execution_layers().len()
            );

            println!("🟢 Processing runbook...");
            let executor = DagExecutor::new(Arc::new(registry));
            match executor.execute(&plan).await {
                Ok(result) => {
                    report(&result);
                    if !result.failed.is_empty() {
                        eprintln!("\n❌ FAILURE. {} artifacts failed.", result.failed.len());
                        std::process::exit(EXIT_EXECUTION_ERROR);
                    }
                    if result.cancelled {
                        eprintln!("\n🛑 CANCELLED before completion.");
                        std::process::exit(EXIT_CANCELLED);
                    }
                    println!("\n✨ SUCCESS! Runbook finished in {:.2?}", start.elapsed());
                }
                Err(e) => {
                    eprintln!("\n💥 CRITICAL EXECUTION ERROR: {e}");
                    std::process::exit(EXIT_EXECUTION_ERROR);
                }
            }
        }

        // --- USE CASE: PLAN ONLY ---
        Commands::Plan { runbook } => match Planner::plan(&runbook, &registry) {
            Ok(plan) => {
                println!("📝 Execution Plan for '{}':", plan.runbook().name);
                for (index, layer) in plan.execution_layers().iter().enumerate() {
                    println!(
                        "  🔹 Layer {} ({} artifacts): {}",
                        index + 1,
                        layer.len(),
                        layer.join(", ")
                    );
                }
                for (alias, target) in plan.aliases() {
                    println!("  🔗 {alias} -> {target}");
                }
                println!("✅ Runbook is valid.");
            }
            Err(e) => {
                eprintln!("💥 PLAN ERROR: {e}");
                std::process::exit(EXIT_PLAN_ERROR);
            }
        },

        // --- USE CASE: LIST COMPONENTS ---
        Commands::Components => {
            println!("🔌 Sources:");
            for type_name in registry.list_source_types() {
                println!("  - {type_name}");
            }
            println!("🔌 Processors:");
            for type_name in registry.list_processor_types() {
                println!("  - {type_name}");
            }
        }
    }

    Ok(())
}

fn report(result: &ExecutionResult) {
    for (id, outcome) in &result.outcomes {
        match outcome {
            Outcome::Success(_) => println!("    ✅ {id}"),
            Outcome::Failure { message, .. } => eprintln!("    ❌ {id}: {message}"),
            Outcome::Skipped { reason } => println!("    ⏭️  {id} (skipped: {reason})"),
            Outcome::Cancelled => println!("    🛑 {id} (cancelled)"),
        }
    }
    println!("\n📊 {}", result.summary());
    if result.timed_out {
        eprintln!("⏰ Execution timed out.");
    }
    if result.cost_limit_exceeded {
        eprintln!("💸 Cost limit exceeded.");
    }
}

/// CLI flag wins over ATTEST_MAX_CONCURRENCY, which wins over the runbook.
fn apply_overrides(config: &mut RunbookConfig, flag: Option<usize>) {
    if let Some(value) = flag {
        config.max_concurrency = value.max(1);
        return;
    }
    if let Ok(value) = std::env::var("ATTEST_MAX_CONCURRENCY")
        && let Ok(parsed) = value.parse::<usize>()
    {
        config.max_concurrency = parsed.max(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_run_defaults() {
        let args = Cli::parse_from(["attest", "run", "runbook.yaml"]);
        match args.command {
            Commands::Run {
                runbook,
                max_concurrency,
            } => {
                assert_eq!(runbook.to_string_lossy(), "runbook.yaml");
                assert_eq!(max_concurrency, None);
            }
            _ => panic!("Expected Run command"),
        }
    }

    #[test]
    fn test_cli_parse_run_with_concurrency() {
        let args = Cli::parse_from(["attest", "run", "runbook.yaml", "--max-concurrency", "4"]);
        match args.command {
            Commands::Run {
                max_concurrency, ..
            } => assert_eq!(max_concurrency, Some(4)),
            _ => panic!("Expected Run command"),
        }
    }

    #[test]
    fn test_cli_parse_components() {
        let args = Cli::parse_from(["attest", "components"]);
        assert!(matches!(args.command, Commands::Components));
    }

    #[test]
    fn test_flag_override_beats_runbook_value() {
        let mut config = RunbookConfig::default();
        apply_overrides(&mut config, Some(3));
        assert_eq!(config.max_concurrency, 3);
    }

    #[test]
    fn test_flag_override_clamps_to_one() {
        let mut config = RunbookConfig::default();
        apply_overrides(&mut config, Some(0));
        assert_eq!(config.max_concurrency, 1);
    }
}
