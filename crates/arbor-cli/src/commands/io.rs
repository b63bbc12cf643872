//! Import/Export commands

use std::io::Write;
use std::path::{Path, PathBuf};

#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;

use anyhow::Context;
use arbor_core::Record;
use arbor_storage::flatfile::{parse_records, render_records};
use clap::{Args, ValueEnum};

use crate::output::records_xml;
use crate::AppContext;

/// Export format
#[derive(Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    /// `path:value` lines, the database file format
    #[default]
    Flat,
    Json,
    Xml,
}

/// Import format
#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ImportFormat {
    Flat,
    Json,
}

impl ImportFormat {
    /// `.json` files are JSON, everything else is flat
    fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Flat,
        }
    }
}

#[derive(Args)]
pub struct ExportArgs {
    /// Output file (stdout if omitted)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Export format
    #[arg(long = "as", value_name = "FORMAT", default_value = "flat")]
    pub as_format: ExportFormat,
}

#[derive(Args)]
pub struct ImportArgs {
    /// Input file
    pub file: PathBuf,

    /// Merge into existing data (default: error unless the tree is empty)
    #[arg(long)]
    pub merge: bool,

    /// Input format (default: by file extension)
    #[arg(long = "as", value_name = "FORMAT")]
    pub as_format: Option<ImportFormat>,
}

pub fn parse_import(text: &str, format: ImportFormat) -> anyhow::Result<Vec<Record>> {
    Ok(match format {
        ImportFormat::Flat => parse_records(text)?,
        ImportFormat::Json => serde_json::from_str(text)?,
    })
}

pub fn render_export(records: &[Record], format: ExportFormat) -> anyhow::Result<String> {
    Ok(match format {
        ExportFormat::Flat => render_records(records),
        ExportFormat::Json => serde_json::to_string_pretty(records)?,
        ExportFormat::Xml => records_xml(records),
    })
}

pub async fn run_import(args: &ImportArgs, ctx: &mut AppContext) -> anyhow::Result<()> {
    tracing::info!("Importing from {:?}", args.file);

    let text = tokio::fs::read_to_string(&args.file)
        .await
        .with_context(|| format!("Cannot read {}", args.file.display()))?;
    let format = args
        .as_format
        .unwrap_or_else(|| ImportFormat::from_path(&args.file));
    let records = parse_import(&text, format)?;

    let count = ctx.database.import(&records, args.merge).await?;
    println!("Imported {} records", count);
    Ok(())
}

pub async fn run_export(args: &ExportArgs, ctx: &AppContext) -> anyhow::Result<()> {
    tracing::info!("Exporting data");

    let records = ctx.database.export();
    tracing::debug!("Exporting {} records", records.len());
    let content = render_export(&records, args.as_format)?;

    if let Some(ref path) = args.output {
        // Write with secure permissions (0o600 = owner read/write only)
        #[cfg(unix)]
        {
            let mut file = std::fs::OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .mode(0o600)
                .open(path)?;
            file.write_all(content.as_bytes())?;
        }
        #[cfg(not(unix))]
        {
            std::fs::write(path, &content)?;
        }
        println!("Exported to {:?}", path);
    } else {
        println!("{}", content.trim_end());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_import_format_from_extension() {
        assert!(ImportFormat::from_path(Path::new("tree.JSON")) == ImportFormat::Json);
        assert!(ImportFormat::from_path(Path::new("tree.arbor")) == ImportFormat::Flat);
        assert!(ImportFormat::from_path(Path::new("tree")) == ImportFormat::Flat);
    }

    #[test]
    fn test_json_export_reimports() {
        let records = vec![Record::new("a", "1"), Record::new("a.b", "x:y")];
        let json = render_export(&records, ExportFormat::Json).unwrap();
        assert_eq!(parse_import(&json, ImportFormat::Json).unwrap(), records);
    }

    #[test]
    fn test_flat_export_reimports() {
        let records = vec![Record::new("a", ""), Record::new("a.b", "2")];
        let flat = render_export(&records, ExportFormat::Flat).unwrap();
        assert_eq!(parse_import(&flat, ImportFormat::Flat).unwrap(), records);
    }
}
