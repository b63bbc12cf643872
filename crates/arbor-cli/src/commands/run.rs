//! Script execution

use std::path::PathBuf;

use anyhow::Context;
use arbor_core::split_statements;
use clap::Args;

use crate::AppContext;

#[derive(Args)]
pub struct RunArgs {
    /// Script file of `;`-terminated statements
    pub script: PathBuf,
}

/// Execute a script, reporting only errors and saving once at the end
pub async fn run(args: &RunArgs, ctx: &mut AppContext) -> anyhow::Result<()> {
    let text = tokio::fs::read_to_string(&args.script)
        .await
        .with_context(|| format!("Cannot read script {}", args.script.display()))?;
    let statements = split_statements(&text);
    tracing::info!(statements = statements.len(), script = %args.script.display(), "Running script");

    ctx.database.set_autosave(false);
    let mut failures = 0;
    for statement in &statements {
        let reply = ctx.database.execute(&statement.text).await?;
        if reply.is_error() {
            failures += 1;
            println!("Error on line {}: {}", statement.line, reply.text());
        }
        if ctx.database.engine().should_exit() {
            break;
        }
    }
    ctx.database.flush().await?;

    if failures > 0 {
        tracing::warn!(failures, "Script finished with errors");
    }
    Ok(())
}
