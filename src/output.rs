use std::io::Write;

use clap::ValueEnum;

use crate::listing::ObjectEntry;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// One object key per line.
    #[default]
    Keys,
    /// One JSON object per line, with size and modification time when known.
    Jsonl,
}

pub fn write_entries<W: Write>(
    out: &mut W,
    entries: &[ObjectEntry],
    format: OutputFormat,
) -> anyhow::Result<()> {
    for entry in entries {
        match format {
            OutputFormat::Keys => writeln!(out, "{}", entry.key)?,
            OutputFormat::Jsonl => {
                serde_json::to_writer(&mut *out, entry)?;
                writeln!(out)?;
            }
        }
    }
    out.flush()?;
    Ok(())
}
