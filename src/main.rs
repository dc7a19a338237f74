//! Attrition CLI entry point

use attrition::cli::{cmd_compare, cmd_info, Cli, Commands};
use clap::Parser;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "attrition=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Compare {
            data,
            output,
            save_models,
            folds,
            test_fraction,
            scoring,
            seed,
        } => {
            cmd_compare(
                &data,
                output.as_deref(),
                save_models.as_deref(),
                folds,
                test_fraction,
                &scoring,
                seed,
            )?;
        }
        Commands::Info { data } => {
            cmd_info(&data)?;
        }
    }

    Ok(())
}
