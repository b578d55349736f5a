mod config;

use std::io;

use anyhow::Context;
use clap::Parser;
use gatherkit_io_fs::gather_tree_with;

use crate::config::{Cli, NoPromptSelector, PromptSelector, default_prompt_dir, home_dir};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(cli.log_level.as_str())
        .with_writer(io::stderr)
        .init();

    let config = if cli.no_prompt {
        cli.into_config(&mut NoPromptSelector)?
    } else {
        let mut selector = PromptSelector::new(
            io::stdin().lock(),
            io::stdout(),
            default_prompt_dir(),
            home_dir(),
        );
        cli.into_config(&mut selector)?
    };

    tracing::debug!(?config, "resolved configuration");

    println!("Searching {}", config.path_dir_src.display());
    let report = gather_tree_with(
        &config.path_dir_src,
        &config.path_dir_dst,
        config.spec_options,
        |event| println!("{event}"),
    )
    .context("gather aborted, nothing was copied")?;

    println!("{report}");
    for spec_error in &report.errors {
        println!(
            "  failed ({}): {}: {}",
            spec_error.kind,
            spec_error.path.display(),
            spec_error.exception
        );
    }
    println!("Done");
    Ok(())
}
