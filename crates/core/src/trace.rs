use std::{
    fs::OpenOptions,
    io::Write,
    path::PathBuf,
};

use tracing::warn;

/// Appends the text of each statement stage to a diagnostic file. Write
/// failures are logged and otherwise ignored.
#[derive(Debug, Clone)]
pub struct StatementTrace {
    path: PathBuf,
}

impl StatementTrace {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn record(&self, label: &str, text: &str) {
        let written = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut file| writeln!(file, "{label}: {text}"));
        if let Err(error) = written {
            warn!(path = %self.path.display(), %error, "failed to write statement trace");
        }
    }
}
