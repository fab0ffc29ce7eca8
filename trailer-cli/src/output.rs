use std::io::{self, Write};

use serde::Serialize;

use crate::{cli::OutputFormat, error::Result};

/// Writes results to stdout. Diagnostics never go through here.
pub struct OutputManager {
    format: OutputFormat,
}

impl OutputManager {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn render<T: Serialize + ?Sized>(&self, value: &T) -> Result<String> {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(value),
            OutputFormat::JsonCompact => serde_json::to_string(value),
        }
        .map_err(Into::into)
    }

    pub fn print<T: Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        let rendered = self.render(value)?;
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "{rendered}")?;
        stdout.flush()?;
        Ok(())
    }
}
