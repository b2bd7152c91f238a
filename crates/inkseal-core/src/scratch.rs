//! Uniquely named output files.
//!
//! Every generated document is written to a temp file inside the scratch
//! root and only kept once the write succeeds; a failed write removes it.

use std::fs::File;
use std::path::{Path, PathBuf};

use tempfile::{Builder, NamedTempFile};
use tracing::debug;

use crate::error::{InksealError, Operation, Result};
use crate::models::OutputConfig;

/// Directory that receives generated documents.
#[derive(Debug, Clone)]
pub struct ScratchSpace {
    root: PathBuf,
}

impl ScratchSpace {
    /// Scratch space in the system temp directory.
    pub fn system() -> Self {
        Self {
            root: std::env::temp_dir(),
        }
    }

    /// Scratch space rooted at `dir` (created on first use).
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self { root: dir.into() }
    }

    /// Scratch space from the output configuration.
    pub fn from_config(config: &OutputConfig) -> Self {
        match &config.scratch_dir {
            Some(dir) => Self::in_dir(dir),
            None => Self::system(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Open a fresh `<prefix><random>.<extension>` file, removed on drop.
    pub fn create(
        &self,
        prefix: &str,
        extension: &str,
        operation: Operation,
    ) -> Result<NamedTempFile> {
        std::fs::create_dir_all(&self.root).map_err(|e| InksealError::io(operation, e))?;
        Builder::new()
            .prefix(prefix)
            .suffix(&format!(".{}", extension))
            .tempfile_in(&self.root)
            .map_err(|e| InksealError::io(operation, e))
    }

    /// Create a unique file, fill it with `write`, and keep it on success.
    pub fn persist_with<F>(
        &self,
        prefix: &str,
        extension: &str,
        operation: Operation,
        write: F,
    ) -> Result<PathBuf>
    where
        F: FnOnce(&mut File) -> Result<()>,
    {
        let mut file = self.create(prefix, extension, operation)?;
        write(file.as_file_mut())?;
        let (_, path) = file
            .keep()
            .map_err(|e| InksealError::io(operation, e.error))?;
        debug!("Wrote {}", path.display());
        Ok(path)
    }
}

impl Default for ScratchSpace {
    fn default() -> Self {
        Self::system()
    }
}

/// Fill `path` through a sibling temp file, creating parent directories.
pub fn write_atomic<F>(path: &Path, operation: Operation, write: F) -> Result<()>
where
    F: FnOnce(&mut File) -> Result<()>,
{
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&parent).map_err(|e| InksealError::io(operation, e))?;

    let mut file = Builder::new()
        .prefix(".inkseal")
        .tempfile_in(&parent)
        .map_err(|e| InksealError::io(operation, e))?;
    write(file.as_file_mut())?;
    file.persist(path)
        .map_err(|e| InksealError::io(operation, e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_unique_names() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = ScratchSpace::in_dir(dir.path().join("out"));

        let write = |f: &mut File| {
            f.write_all(b"x")
                .map_err(|e| InksealError::io(Operation::ApplyOverlay, e))
        };
        let a = scratch.persist_with("signed_", "pdf", Operation::ApplyOverlay, write).unwrap();
        let b = scratch.persist_with("signed_", "pdf", Operation::ApplyOverlay, write).unwrap();

        assert_ne!(a, b);
        assert!(a.exists() && b.exists());
        assert_eq!(a.extension().unwrap(), "pdf");
        assert!(a.file_name().unwrap().to_str().unwrap().starts_with("signed_"));
    }

    #[test]
    fn test_failed_write_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = ScratchSpace::in_dir(dir.path());

        let result = scratch.persist_with("broken_", "png", Operation::ApplyOverlay, |_| {
            Err(InksealError::invalid(Operation::ApplyOverlay, "boom"))
        });
        assert!(result.is_err());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_write_atomic_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("a/b/c.bin");
        write_atomic(&target, Operation::SaveBase64Image, |f| {
            f.write_all(b"data")
                .map_err(|e| InksealError::io(Operation::SaveBase64Image, e))
        })
        .unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"data");
    }
}
