//! Interactive statement shell
//!
//! Lines are buffered until an unescaped `;` completes one or more
//! statements. A trailing statement without terminator runs at end of input.

use std::io::{IsTerminal, Write};

use arbor_core::split_statements;
use clap::Args;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::output;
use crate::AppContext;

#[derive(Args, Default)]
pub struct ShellArgs {
    /// Print each parsed statement as JSON before running it
    #[arg(long)]
    pub debug: bool,
}

/// Split `buffer` after its last unescaped `;`
///
/// Returns the complete part, leaving the unfinished rest in `buffer`.
pub fn take_complete(buffer: &mut String) -> Option<String> {
    let mut end = None;
    let mut previous = None;
    for (i, c) in buffer.char_indices() {
        if c == ';' && previous != Some('\\') {
            end = Some(i + 1);
        }
        previous = Some(c);
    }
    let end = end?;
    let rest = buffer.split_off(end);
    Some(std::mem::replace(buffer, rest))
}

fn prompt(ctx: &AppContext, interactive: bool, continuation: bool) {
    if !interactive {
        return;
    }
    let text = if continuation { "... " } else { ctx.config.prompt() };
    print!("{}", text);
    let _ = std::io::stdout().flush();
}

/// Run every statement in `text`; false once `exit` was executed
async fn run_text(text: &str, args: &ShellArgs, ctx: &mut AppContext) -> anyhow::Result<bool> {
    for statement in split_statements(text) {
        let reply = ctx.database.execute(&statement.text).await?;
        if args.debug {
            println!("{}", reply.statement.to_json()?);
        }
        let rendered = output::render(&reply, ctx.format);
        if !rendered.is_empty() {
            println!("{}", rendered);
        }
        if ctx.database.engine().should_exit() {
            return Ok(false);
        }
    }
    Ok(true)
}

pub async fn run(args: &ShellArgs, ctx: &mut AppContext) -> anyhow::Result<()> {
    let interactive = std::io::stdin().is_terminal();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut buffer = String::new();
    tracing::debug!(interactive, "Starting shell");

    prompt(ctx, interactive, false);
    while let Some(line) = lines.next_line().await? {
        buffer.push_str(&line);
        buffer.push('\n');

        if let Some(complete) = take_complete(&mut buffer) {
            if !run_text(&complete, args, ctx).await? {
                return Ok(());
            }
        }
        prompt(ctx, interactive, !buffer.trim().is_empty());
    }

    if !buffer.trim().is_empty() {
        run_text(&buffer, args, ctx).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_complete() {
        let mut buffer = String::from("write a = 1;\nread");
        assert_eq!(take_complete(&mut buffer).as_deref(), Some("write a = 1;"));
        assert_eq!(buffer, "\nread");
    }

    #[test]
    fn test_take_complete_waits_for_terminator() {
        let mut buffer = String::from(r"write a = 'x\;y'");
        assert_eq!(take_complete(&mut buffer), None);
        assert_eq!(buffer, r"write a = 'x\;y'");

        buffer.push_str(";\n");
        assert_eq!(take_complete(&mut buffer).as_deref(), Some(r"write a = 'x\;y';"));
        assert_eq!(buffer, "\n");
    }

    #[test]
    fn test_take_complete_several() {
        let mut buffer = String::from("read a; read b;");
        assert_eq!(take_complete(&mut buffer).as_deref(), Some("read a; read b;"));
        assert!(buffer.is_empty());
    }
}
