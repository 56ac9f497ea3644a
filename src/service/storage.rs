use crate::error::ApiError;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

/// Prefix under which ledger blobs are stored.
pub const LEDGER_PREFIX: &str = "ledgers";

/// Blob custody store addressed by relative path. The core only ever needs
/// store / read / exists / delete; everything else about the files is opaque.
#[derive(Clone)]
pub struct LedgerStore {
    root: PathBuf,
}

impl LedgerStore {
    pub fn new(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(root.join(LEDGER_PREFIX))?;
        Ok(Self { root })
    }

    fn resolve(&self, rel_path: &str) -> Result<PathBuf, ApiError> {
        let rel = Path::new(rel_path);
        let traversal = rel
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if traversal || rel_path.is_empty() {
            return Err(ApiError::validation("file_path", "invalid storage path"));
        }
        Ok(self.root.join(rel))
    }

    pub fn store(&self, rel_path: &str, bytes: &[u8]) -> Result<(), ApiError> {
        let path = self.resolve(rel_path)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                tracing::error!(error = %e, rel_path, "Failed to create blob directory");
                ApiError::Internal
            })?;
        }
        fs::write(&path, bytes).map_err(|e| {
            tracing::error!(error = %e, rel_path, "Failed to store blob");
            ApiError::Internal
        })
    }

    pub fn read(&self, rel_path: &str) -> Result<Vec<u8>, ApiError> {
        let path = self.resolve(rel_path)?;
        fs::read(&path).map_err(|e| {
            tracing::error!(error = %e, rel_path, "Failed to read blob");
            ApiError::FileUnavailable("The requested file is not available".to_string())
        })
    }

    pub fn exists(&self, rel_path: &str) -> bool {
        self.resolve(rel_path).map(|p| p.is_file()).unwrap_or(false)
    }

    /// Best-effort delete: callers log and continue on failure.
    pub fn delete(&self, rel_path: &str) -> Result<(), ApiError> {
        let path = self.resolve(rel_path)?;
        fs::remove_file(&path).map_err(|e| {
            tracing::warn!(error = %e, rel_path, "Failed to delete blob");
            ApiError::Internal
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> LedgerStore {
        let dir = std::env::temp_dir().join(format!(
            "tradecrm-store-test-{}-{:?}",
            std::process::id(),
            std::thread::current().id()
        ));
        LedgerStore::new(dir).unwrap()
    }

    #[test]
    fn store_read_exists_delete_cycle() {
        let store = temp_store();
        let rel = format!("{LEDGER_PREFIX}/LED-TEST01_1.pdf");

        assert!(!store.exists(&rel));
        store.store(&rel, b"statement").unwrap();
        assert!(store.exists(&rel));
        assert_eq!(store.read(&rel).unwrap(), b"statement");
        store.delete(&rel).unwrap();
        assert!(!store.exists(&rel));
    }

    #[test]
    fn rejects_path_traversal() {
        let store = temp_store();
        assert!(store.store("../escape.pdf", b"x").is_err());
        assert!(store.read("/etc/passwd").is_err());
        assert!(!store.exists("ledgers/../../escape.pdf"));
    }

    #[test]
    fn missing_blob_reads_as_unavailable() {
        let store = temp_store();
        let err = store.read("ledgers/LED-NOPE_1.pdf").unwrap_err();
        assert_eq!(err.kind(), "file_unavailable");
    }
}
