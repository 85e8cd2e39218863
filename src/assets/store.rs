use std::{
    collections::HashMap,
    fmt,
    io::Write as _,
    path::{Component, Path, PathBuf},
    sync::{
        Mutex, MutexGuard,
        atomic::{AtomicU64, Ordering},
    },
};

use anyhow::Context;
use sha2::Digest as _;

use crate::foundation::error::{CollageError, CollageResult, lock};

/// Opaque reference to bytes held by a [`BlobStore`].
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct BlobHandle(pub String);

impl BlobHandle {
    /// Build a handle from any string-like key.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Raw key.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Byte storage collaborator for source images and rendered output.
///
/// The engine never touches the filesystem directly; all raster bytes enter
/// and leave through this trait.
pub trait BlobStore: Send + Sync {
    /// Persist `bytes` and return a handle for later reads.
    fn store(&self, bytes: &[u8]) -> CollageResult<BlobHandle>;

    /// Read back the bytes behind `handle`; unknown handles are `NotFound`.
    fn read(&self, handle: &BlobHandle) -> CollageResult<Vec<u8>>;

    /// Remove the bytes behind `handle`; unknown handles are ignored.
    fn delete(&self, handle: &BlobHandle) -> CollageResult<()>;
}

/// In-process [`BlobStore`] keyed by a monotonically increasing counter.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    next: AtomicU64,
    blobs: Mutex<HashMap<BlobHandle, Vec<u8>>>,
}

impl MemoryBlobStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of blobs currently held.
    pub fn len(&self) -> usize {
        self.blobs.lock().map(|b| b.len()).unwrap_or(0)
    }

    /// Whether the store holds no blobs.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `handle` is present.
    pub fn contains(&self, handle: &BlobHandle) -> bool {
        self.blobs
            .lock()
            .map(|b| b.contains_key(handle))
            .unwrap_or(false)
    }

    fn table(&self) -> CollageResult<MutexGuard<'_, HashMap<BlobHandle, Vec<u8>>>> {
        lock(&self.blobs, "blob table")
    }
}

impl BlobStore for MemoryBlobStore {
    fn store(&self, bytes: &[u8]) -> CollageResult<BlobHandle> {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        let handle = BlobHandle(format!("mem-{n}"));
        self.table()?.insert(handle.clone(), bytes.to_vec());
        Ok(handle)
    }

    fn read(&self, handle: &BlobHandle) -> CollageResult<Vec<u8>> {
        self.table()?
            .get(handle)
            .cloned()
            .ok_or_else(|| CollageError::not_found(format!("blob '{handle}'")))
    }

    fn delete(&self, handle: &BlobHandle) -> CollageResult<()> {
        self.table()?.remove(handle);
        Ok(())
    }
}

/// Hex digits of the content hash kept in directory blob names.
const BLOB_NAME_HASH_LEN: usize = 16;

/// Directory-backed [`BlobStore`].
///
/// Handles are relative paths below `root`. Stored blobs are named by a
/// prefix of the SHA-256 of their content plus a sequence number; every call
/// to [`BlobStore::store`] creates a new file, so identical bytes stored twice
/// get distinct handles and deleting one never affects the other.
#[derive(Clone, Debug)]
pub struct DirBlobStore {
    root: PathBuf,
}

impl DirBlobStore {
    /// Store rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, handle: &BlobHandle) -> CollageResult<PathBuf> {
        let rel = Path::new(handle.as_str());
        let escapes = rel
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes || handle.as_str().is_empty() {
            return Err(CollageError::validation(format!(
                "blob handle '{handle}' must be a relative path inside the store"
            )));
        }
        Ok(self.root.join(rel))
    }
}

impl BlobStore for DirBlobStore {
    fn store(&self, bytes: &[u8]) -> CollageResult<BlobHandle> {
        std::fs::create_dir_all(&self.root)
            .with_context(|| format!("create blob dir '{}'", self.root.display()))?;
        let digest = sha256_hex(bytes);
        let prefix = &digest[..BLOB_NAME_HASH_LEN];
        for seq in 0u64.. {
            let handle = BlobHandle(format!("blob-{prefix}-{seq}"));
            let path = self.resolve(&handle)?;
            let mut file = match std::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
            {
                Ok(file) => file,
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => {
                    return Err(anyhow::Error::new(e)
                        .context(format!("create blob '{}'", path.display()))
                        .into());
                }
            };
            file.write_all(bytes)
                .with_context(|| format!("write blob '{}'", path.display()))?;
            return Ok(handle);
        }
        Err(CollageError::Other(anyhow::anyhow!(
            "blob names exhausted for '{prefix}'"
        )))
    }

    fn read(&self, handle: &BlobHandle) -> CollageResult<Vec<u8>> {
        let path = self.resolve(handle)?;
        match std::fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(CollageError::not_found(format!("blob '{handle}'")))
            }
            Err(e) => Err(anyhow::Error::new(e)
                .context(format!("read blob '{}'", path.display()))
                .into()),
        }
    }

    fn delete(&self, handle: &BlobHandle) -> CollageResult<()> {
        let path = self.resolve(handle)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(anyhow::Error::new(e)
                .context(format!("delete blob '{}'", path.display()))
                .into()),
        }
    }
}

/// Lowercase hex SHA-256 of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let digest = sha2::Sha256::digest(bytes);
    let mut out = String::with_capacity(digest.len() * 2);
    for b in digest {
        out.push_str(&format!("{:02x}", b));
    }
    out
}

#[cfg(test)]
#[path = "../../tests/unit/assets/store.rs"]
mod tests;
