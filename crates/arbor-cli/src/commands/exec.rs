//! One-shot statement execution

use arbor_core::split_statements;
use clap::Args;

use crate::output;
use crate::AppContext;

#[derive(Args)]
pub struct ExecArgs {
    /// Statements, joined with spaces and split on `;`
    #[arg(required = true)]
    pub statements: Vec<String>,
}

pub async fn run(args: &ExecArgs, ctx: &mut AppContext) -> anyhow::Result<()> {
    let text = args.statements.join(" ");
    for statement in split_statements(&text) {
        let reply = ctx.database.execute(&statement.text).await?;
        let rendered = output::render(&reply, ctx.format);
        if !rendered.is_empty() {
            println!("{}", rendered);
        }
        if ctx.database.engine().should_exit() {
            break;
        }
    }
    Ok(())
}
