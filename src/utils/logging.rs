use std::fs::OpenOptions;
use std::io::{BufWriter, Write};

use chrono::{SecondsFormat, Utc};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_LOG_FILTER: &str = "mcp_inspector=info";

/// Installs the stderr diagnostics subscriber. `RUST_LOG` overrides the
/// default filter.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Appends panel activity to a file, one timestamped record per line.
pub struct ActivityLog {
    file_path: String,
}

impl ActivityLog {
    /// Opens `path` for appending, creating it if needed, so a bad path is
    /// reported before the first call starts.
    pub fn open(path: impl Into<String>) -> Result<Self, Box<dyn std::error::Error>> {
        let file_path = path.into();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&file_path)?;
        file.flush()?;
        Ok(Self { file_path })
    }

    pub fn path(&self) -> &str {
        &self.file_path
    }

    pub fn record(&self, content: &str) -> Result<(), Box<dyn std::error::Error>> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.file_path)?;
        let mut writer = BufWriter::new(file);

        let stamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        for line in content.lines() {
            writeln!(writer, "{stamp} {line}")?;
        }
        writer.flush()?;
        Ok(())
    }
}
