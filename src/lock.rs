//! Cross-process advisory lock over the harness output root.
//!
//! Gated regions touch shared container state, so concurrent harness
//! processes serialize on `<out>/.lock`. The guard releases on drop.
use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct RunLock {
    file: File,
    path: PathBuf,
}

impl RunLock {
    /// Block until the exclusive lock on `path` is held.
    pub fn acquire(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)
            .with_context(|| format!("open lock {}", path.display()))?;
        tracing::debug!(path = %path.display(), "waiting for run lock");
        FileExt::lock_exclusive(&file).with_context(|| format!("lock {}", path.display()))?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_is_exclusive_until_dropped() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("out").join(".lock");
        let guard = RunLock::acquire(&path).expect("acquire");
        assert_eq!(guard.path(), path);

        let probe = OpenOptions::new().write(true).open(&path).expect("open");
        assert!(FileExt::try_lock_exclusive(&probe).is_err());

        drop(guard);
        FileExt::try_lock_exclusive(&probe).expect("lock after release");
        FileExt::unlock(&probe).expect("unlock");
    }
}
