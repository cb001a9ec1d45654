use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;

/// Durable home of the session credential blob.
///
/// The blob is opaque here; the protocol adapter owns its format. A missing or
/// unreadable file is never fatal: the caller falls back to a fresh login.
#[derive(Clone, Debug)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the persisted credential, if any.
    pub fn load(&self) -> Option<Vec<u8>> {
        match fs::read(&self.path) {
            Ok(data) => Some(data),
            Err(e) => {
                warn!("read session file {}: {e}", self.path.display());
                None
            }
        }
    }

    /// Persist the credential, overwriting any previous one.
    ///
    /// Writes to a sibling temp file and renames it over the target so a crash
    /// mid-write cannot corrupt the previous valid file.
    pub fn save(&self, credential: &[u8]) -> crate::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut tmp = self.path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, credential)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("sig.bin"));
        assert!(store.load().is_none());
    }

    #[test]
    fn round_trip_is_byte_exact() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("sig.bin"));
        let blob: Vec<u8> = (0..=255).collect();
        store.save(&blob).unwrap();

        // A fresh store over the same path must read the same bytes.
        let reopened = SessionStore::new(dir.path().join("sig.bin"));
        assert_eq!(reopened.load().unwrap(), blob);
    }

    #[test]
    fn save_overwrites_previous_credential() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("sig.bin"));
        store.save(b"old").unwrap();
        store.save(b"new").unwrap();
        assert_eq!(store.load().unwrap(), b"new");
        // No stray temp file left behind.
        assert!(!dir.path().join("sig.bin.tmp").exists());
    }

    #[test]
    fn save_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("state/sig.bin"));
        store.save(b"blob").unwrap();
        assert_eq!(store.load().unwrap(), b"blob");
    }
}
