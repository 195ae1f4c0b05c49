//! tracing subscriber setup.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;

/// Where formatted log lines go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTarget {
    Stderr,
    /// Discard; used while the console owns the terminal.
    Sink,
}

/// Installs the global subscriber. `RUST_LOG` overrides `level`.
///
/// When `file` is given, lines are appended there regardless of `target`.
/// Returns `false` if a subscriber was already installed.
pub fn init_logging(level: &str, file: Option<&Path>, target: LogTarget) -> io::Result<bool> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let writer = match file {
        Some(path) => {
            let file = Arc::new(open_log_file(path)?);
            BoxMakeWriter::new(move || FileWriter(file.clone()))
        }
        None => match target {
            LogTarget::Stderr => BoxMakeWriter::new(io::stderr),
            LogTarget::Sink => BoxMakeWriter::new(io::sink),
        },
    };
    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(file.is_none() && target == LogTarget::Stderr)
        .try_init()
        .is_ok();
    Ok(installed)
}

fn open_log_file(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

struct FileWriter(Arc<File>);

impl Write for FileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        (&*self.0).write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        (&*self.0).flush()
    }
}
