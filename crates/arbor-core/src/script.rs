//! Splitting script text into statements

/// One statement of a script
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptStatement {
    /// Statement text without its `;` terminator, trimmed
    pub text: String,
    /// 1-based line on which the statement starts
    pub line: usize,
}

/// Split on every `;` not preceded by `\`, skipping blank pieces
///
/// Escaped terminators are kept as written; the parser unescapes them.
pub fn split_statements(text: &str) -> Vec<ScriptStatement> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut line = 1;
    let mut start_line = None;
    let mut previous = None;

    for c in text.chars() {
        if c == ';' && previous != Some('\\') {
            push_statement(&mut statements, &mut current, start_line.take().unwrap_or(line));
        } else {
            if start_line.is_none() && !c.is_whitespace() {
                start_line = Some(line);
            }
            current.push(c);
        }
        if c == '\n' {
            line += 1;
        }
        previous = Some(c);
    }
    push_statement(&mut statements, &mut current, start_line.unwrap_or(line));
    statements
}

fn push_statement(statements: &mut Vec<ScriptStatement>, current: &mut String, line: usize) {
    let text = current.trim();
    if !text.is_empty() {
        statements.push(ScriptStatement {
            text: text.to_string(),
            line,
        });
    }
    current.clear();
}
