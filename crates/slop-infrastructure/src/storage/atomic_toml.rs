//! Atomic TOML documents guarded by an advisory file lock.
//!
//! Writers take an exclusive lock on a sidecar `.lock` file, rewrite the
//! document into a temporary file in the same directory, fsync it and rename
//! it over the original. Readers take a shared lock, so they never observe a
//! half-written document even across processes.

use fs2::FileExt;
use serde::{Serialize, de::DeserializeOwned};
use slop_core::error::{Result, SlopError};
use std::fs::{self, File, OpenOptions};
use std::io::Write as IoWrite;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

/// A handle to a TOML document on disk.
///
/// All operations are blocking; async callers run them on the blocking pool.
pub struct AtomicTomlFile<T> {
    path: PathBuf,
    _phantom: PhantomData<T>,
}

impl<T> AtomicTomlFile<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            _phantom: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the document under a shared lock.
    ///
    /// # Returns
    ///
    /// - `Ok(T)`: The parsed document, or `T::default()` when the file is missing or empty
    /// - `Err(_)`: The file could not be read, locked or parsed
    pub fn load(&self) -> Result<T> {
        let _lock = FileLock::shared(&self.path)?;
        self.read_unlocked()
    }

    /// Applies `f` to the document and writes the result back atomically.
    ///
    /// The exclusive lock is held from read to rename. When `f` reports that
    /// nothing changed (`(false, _)`) the file is left untouched.
    pub fn update<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut T) -> (bool, R),
    {
        let _lock = FileLock::exclusive(&self.path)?;
        let mut data = self.read_unlocked()?;

        let (changed, output) = f(&mut data);
        if changed {
            self.write_unlocked(&data)?;
        }

        Ok(output)
    }

    fn read_unlocked(&self) -> Result<T> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(T::default()),
            Err(e) => return Err(e.into()),
        };

        if content.trim().is_empty() {
            return Ok(T::default());
        }

        Ok(toml::from_str(&content)?)
    }

    fn write_unlocked(&self, data: &T) -> Result<()> {
        ensure_parent(&self.path)?;

        let toml_string = toml::to_string_pretty(data)?;

        let tmp_path = sibling_path(&self.path, "tmp")?;
        let mut tmp_file = File::create(&tmp_path)?;
        tmp_file.write_all(toml_string.as_bytes())?;
        tmp_file.sync_all()?;
        drop(tmp_file);

        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Builds `.{file_name}.{suffix}` next to `path`.
fn sibling_path(path: &Path, suffix: &str) -> Result<PathBuf> {
    let file_name = path
        .file_name()
        .ok_or_else(|| SlopError::io(format!("Path has no file name: {}", path.display())))?;
    let name = format!(".{}.{}", file_name.to_string_lossy(), suffix);
    Ok(match path.parent() {
        Some(parent) => parent.join(name),
        None => PathBuf::from(name),
    })
}

/// Advisory lock on a sidecar file; released when dropped.
///
/// The lock file itself is left in place so concurrent lockers always contend
/// on the same inode.
struct FileLock {
    file: File,
}

impl FileLock {
    fn open(path: &Path) -> Result<File> {
        ensure_parent(path)?;
        let lock_path = sibling_path(path, "lock")?;
        Ok(OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(lock_path)?)
    }

    fn shared(path: &Path) -> Result<Self> {
        let file = Self::open(path)?;
        FileExt::lock_shared(&file)
            .map_err(|e| SlopError::data_access(format!("Failed to acquire shared lock: {}", e)))?;
        Ok(Self { file })
    }

    fn exclusive(path: &Path) -> Result<Self> {
        let file = Self::open(path)?;
        FileExt::lock_exclusive(&file)
            .map_err(|e| SlopError::data_access(format!("Failed to acquire exclusive lock: {}", e)))?;
        Ok(Self { file })
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!("[AtomicTomlFile] Failed to release lock: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    struct Counter {
        count: u32,
    }

    #[test]
    fn test_load_missing_file_is_default() {
        let temp_dir = TempDir::new().unwrap();
        let file = AtomicTomlFile::<Counter>::new(temp_dir.path().join("missing.toml"));
        assert_eq!(file.load().unwrap(), Counter::default());
    }

    #[test]
    fn test_update_persists_changes() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("counter.toml");
        let file = AtomicTomlFile::<Counter>::new(path.clone());

        let seen = file
            .update(|c| {
                c.count += 10;
                (true, c.count)
            })
            .unwrap();
        assert_eq!(seen, 10);
        file.update(|c| {
            c.count += 5;
            (true, ())
        })
        .unwrap();

        assert_eq!(file.load().unwrap().count, 15);
        assert!(path.exists());
        assert!(!temp_dir.path().join("nested").join(".counter.toml.tmp").exists());
    }

    #[test]
    fn test_unchanged_update_does_not_create_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("counter.toml");
        let file = AtomicTomlFile::<Counter>::new(path.clone());

        file.update(|_| (false, ())).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_corrupt_file_is_serialization_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bad.toml");
        fs::write(&path, "count = [").unwrap();

        let file = AtomicTomlFile::<Counter>::new(path);
        assert!(file.load().unwrap_err().is_serialization());
    }
}
