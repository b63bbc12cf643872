//! Output formatting utilities

use arbor_core::{DataFormat, Record, Reply, Response, Tally, Verb};
use serde::Serialize;

/// Widest separator drawn around basic output
const MAX_SEPARATOR_WIDTH: usize = 64;
/// Spaces per tree level
const TREE_INDENT: usize = 4;
/// Deepest indentation level drawn in tree output
const MAX_TREE_DEPTH: usize = 8;

/// JSON view of one distinct response
#[derive(Serialize)]
struct ResponseView<'a> {
    verb: Verb,
    lines: &'a [String],
    count: usize,
    summary: &'a str,
    #[serde(skip_serializing_if = "is_one")]
    times: u32,
}

fn is_one(n: &u32) -> bool {
    *n == 1
}

impl<'a> From<&'a Tally> for ResponseView<'a> {
    fn from(tally: &'a Tally) -> Self {
        Self {
            verb: tally.response.verb,
            lines: &tally.response.lines,
            count: tally.response.count,
            summary: &tally.response.summary,
            times: tally.times,
        }
    }
}

/// Render a reply in the requested format
pub fn render(reply: &Reply, format: DataFormat) -> String {
    match format {
        DataFormat::Json => render_json(reply),
        DataFormat::Xml => render_xml(reply),
        DataFormat::Basic | DataFormat::Tree => reply
            .tallies
            .iter()
            .map(|tally| render_text(tally, format))
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

fn summary_with_times(tally: &Tally) -> String {
    match tally.times {
        1 => tally.response.summary.clone(),
        n => format!("{} (*{})", tally.response.summary, n),
    }
}

fn render_text(tally: &Tally, format: DataFormat) -> String {
    let response = &tally.response;
    let summary = summary_with_times(tally);
    if response.lines.is_empty() {
        return summary;
    }

    let lines = if format == DataFormat::Tree && response.verb == Verb::Read {
        tree_lines(&response.lines)
    } else {
        response.lines.clone()
    };
    let width = lines
        .iter()
        .map(|line| line.chars().count())
        .max()
        .unwrap_or(0)
        .clamp(1, MAX_SEPARATOR_WIDTH);
    let separator = "=".repeat(width);

    let mut out = Vec::with_capacity(lines.len() + 3);
    out.push(separator.clone());
    out.extend(lines);
    out.push(separator);
    out.push(summary);
    out.join("\n")
}

/// `path:value` lines as indented `name-> value` lines
///
/// Depth is relative to the shallowest line.
pub fn tree_lines(lines: &[String]) -> Vec<String> {
    let parsed: Vec<(usize, &str, &str)> = lines
        .iter()
        .map(|line| {
            let (path, value) = line.split_once(':').unwrap_or((line.as_str(), ""));
            let depth = path.matches('.').count();
            let name = path.rsplit('.').next().unwrap_or(path);
            (depth, name, value)
        })
        .collect();
    let base = parsed.iter().map(|(depth, _, _)| *depth).min().unwrap_or(0);

    parsed
        .into_iter()
        .map(|(depth, name, value)| {
            let level = (depth - base).min(MAX_TREE_DEPTH);
            format!("{}{}-> {}", " ".repeat(level * TREE_INDENT), name, value)
        })
        .collect()
}

fn render_json(reply: &Reply) -> String {
    let views: Vec<ResponseView> = reply.tallies.iter().map(ResponseView::from).collect();
    let result = match views.as_slice() {
        [single] => serde_json::to_string_pretty(single),
        _ => serde_json::to_string_pretty(&views),
    };
    result.unwrap_or_else(|_| "{}".to_string())
}

/// Escape text for XML content and attributes
pub fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            other => out.push(other),
        }
    }
    out
}

fn response_xml(response: &Response, times: u32) -> String {
    let mut out = format!(
        "<response verb=\"{}\" count=\"{}\"",
        response.verb, response.count
    );
    if times > 1 {
        out.push_str(&format!(" times=\"{}\"", times));
    }
    out.push_str(">\n");
    for line in &response.lines {
        out.push_str(&format!("  <line>{}</line>\n", escape_xml(line)));
    }
    out.push_str(&format!(
        "  <summary>{}</summary>\n</response>",
        escape_xml(&response.summary)
    ));
    out
}

fn render_xml(reply: &Reply) -> String {
    reply
        .tallies
        .iter()
        .map(|tally| response_xml(&tally.response, tally.times))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Records as an XML document
pub fn records_xml(records: &[Record]) -> String {
    let mut out = String::from("<records>\n");
    for record in records {
        out.push_str(&format!(
            "  <record path=\"{}\">{}</record>\n",
            escape_xml(&record.path),
            escape_xml(&record.value)
        ));
    }
    out.push_str("</records>");
    out
}
