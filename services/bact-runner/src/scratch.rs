//! Job scratch roots.
//!
//! Each job gets a unique directory under the OS temp dir that holds one
//! sub-directory per step. All paths handed out by [`ScratchRoot`] are
//! validated to stay inside the root: absolute inputs, parent traversal and
//! symlinks that resolve outside the root are rejected.

use std::path::{Component, Path, PathBuf};

use anyhow::{bail, Context, Result};
use tempfile::TempDir;

/// A temp directory bound to one job run. Dropping it deletes the tree.
pub struct ScratchRoot {
    dir: TempDir,
}

impl ScratchRoot {
    /// Create `bact-job-<name>-<random>` under the OS temp dir.
    pub fn create(job_name: &str) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix(&format!("bact-job-{job_name}-"))
            .tempdir()
            .context("creating job scratch directory")?;
        Ok(ScratchRoot { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Resolve a relative path against the root, refusing anything that
    /// would land outside it.
    pub fn resolve(&self, relative: impl AsRef<Path>) -> Result<PathBuf> {
        let relative = relative.as_ref();
        if relative.is_absolute() {
            bail!("absolute paths are not allowed inside the scratch root: {}", relative.display());
        }
        for component in relative.components() {
            match component {
                Component::Normal(_) | Component::CurDir => {}
                _ => bail!(
                    "path escapes the scratch root: {}",
                    relative.display()
                ),
            }
        }

        let joined = self.dir.path().join(relative);

        // symlinks inside the tree must not point back out
        if let Some(existing) = deepest_existing(&joined) {
            let canonical = existing
                .canonicalize()
                .with_context(|| format!("resolving {}", existing.display()))?;
            let root = self
                .dir
                .path()
                .canonicalize()
                .context("resolving scratch root")?;
            if !canonical.starts_with(&root) {
                bail!("path escapes the scratch root: {}", relative.display());
            }
        }

        Ok(joined)
    }

    /// Create a sub-directory inside the root and return its full path.
    pub fn create_dir(&self, relative: impl AsRef<Path>) -> Result<PathBuf> {
        let path = self.resolve(relative)?;
        std::fs::create_dir_all(&path)
            .with_context(|| format!("creating {}", path.display()))?;
        Ok(path)
    }

    /// Write a file inside the root and return its full path.
    pub fn write_file(&self, relative: impl AsRef<Path>, contents: &[u8]) -> Result<PathBuf> {
        let path = self.resolve(relative)?;
        std::fs::write(&path, contents)
            .with_context(|| format!("writing {}", path.display()))?;
        Ok(path)
    }
}

/// The longest existing ancestor of `path` (or the path itself).
fn deepest_existing(path: &Path) -> Option<PathBuf> {
    let mut current = Some(path);
    while let Some(p) = current {
        if p.exists() {
            return Some(p.to_path_buf());
        }
        current = p.parent();
    }
    None
}
