use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::error;

/// Side-channel sink for protocol-level error payloads.
///
/// Dumps are observability only, never recovery: each one lands in a
/// timestamped file the operator can attach to a bug report.
#[derive(Clone, Debug)]
pub struct DumpSink {
    dir: PathBuf,
}

impl DumpSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `data` to a timestamped dump file, creating the directory on demand.
    pub fn dump(&self, data: &[u8], context: &str) -> crate::Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let file = self.dir.join(format!("{}.dump", Utc::now().timestamp()));
        fs::write(&file, data)?;
        error!(
            "{context}; details dumped to {} - please attach it together with the logs when reporting",
            file.display()
        );
        Ok(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dump_creates_directory_and_file() {
        let dir = tempfile::tempdir().unwrap();
        let sink = DumpSink::new(dir.path().join("dump"));
        let path = sink.dump(b"payload", "decode error").unwrap();
        assert!(path.starts_with(dir.path().join("dump")));
        assert_eq!(fs::read(&path).unwrap(), b"payload");
        assert_eq!(path.extension().unwrap(), "dump");
    }
}
