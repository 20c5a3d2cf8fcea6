//! In-memory filesystem backend.
//!
//! Every volume session gets its own instance. All data is ephemeral and is
//! dropped together with the session.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{BTreeMap, TryReserveError};
use std::path::{Component, Path, PathBuf};

use crate::vfs::error::{VfsError, VfsResult};
use crate::vfs::ops::VfsOps;
use crate::vfs::types::{DirEntry, FileAttr, FileType, Owner, SetAttr, StatFs};

/// Longest single path component we accept.
const MAX_NAME_LEN: usize = 255;

/// Entry in the memory filesystem.
#[derive(Debug, Clone)]
enum Entry {
    File { data: Vec<u8>, attr: FileAttr },
    Directory { attr: FileAttr },
    Symlink { target: PathBuf, attr: FileAttr },
}

impl Entry {
    fn attr(&self) -> &FileAttr {
        match self {
            Entry::File { attr, .. } => attr,
            Entry::Directory { attr } => attr,
            Entry::Symlink { attr, .. } => attr,
        }
    }

    fn attr_mut(&mut self) -> &mut FileAttr {
        match self {
            Entry::File { attr, .. } => attr,
            Entry::Directory { attr } => attr,
            Entry::Symlink { attr, .. } => attr,
        }
    }

    fn kind(&self) -> FileType {
        self.attr().kind
    }
}

/// In-memory filesystem backend.
///
/// Thread-safe via an internal `RwLock`. Entries are keyed by normalized
/// path; the root directory is the empty path and always exists.
#[derive(Debug)]
pub struct MemoryBackend {
    entries: RwLock<BTreeMap<PathBuf, Entry>>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    /// Create a new empty filesystem with a root-owned `0755` root directory.
    pub fn new() -> Self {
        Self::with_root(Owner::root(), 0o755)
    }

    /// Create a new empty filesystem whose root directory has the given
    /// owner and permissions.
    pub fn with_root(owner: Owner, perm: u32) -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(
            PathBuf::new(),
            Entry::Directory {
                attr: FileAttr::directory(perm, owner),
            },
        );
        Self {
            entries: RwLock::new(entries),
        }
    }

    /// Normalize a path: remove leading `/`, resolve `.` and `..`.
    fn normalize(path: &Path) -> PathBuf {
        let mut result = PathBuf::new();
        for component in path.components() {
            match component {
                Component::ParentDir => {
                    result.pop();
                }
                Component::Normal(s) => result.push(s),
                Component::RootDir | Component::CurDir | Component::Prefix(_) => {}
            }
        }
        result
    }

    fn path_str(path: &Path) -> String {
        path.display().to_string()
    }

    fn check_name(path: &Path) -> VfsResult<()> {
        match path.file_name() {
            Some(name) if name.len() > MAX_NAME_LEN => Err(VfsError::NameTooLong),
            Some(_) => Ok(()),
            None => Err(VfsError::already_exists("/")),
        }
    }

    /// The parent of `path` must exist and be a directory.
    fn check_parent(entries: &BTreeMap<PathBuf, Entry>, path: &Path) -> VfsResult<()> {
        let parent = path.parent().unwrap_or(Path::new(""));
        match entries.get(parent) {
            Some(Entry::Directory { .. }) => Ok(()),
            Some(_) => Err(VfsError::not_a_directory(Self::path_str(parent))),
            None => Err(VfsError::not_found(Self::path_str(parent))),
        }
    }

    fn touch_parent(entries: &mut BTreeMap<PathBuf, Entry>, path: &Path) {
        let parent = path.parent().unwrap_or(Path::new(""));
        if let Some(entry) = entries.get_mut(parent) {
            entry.attr_mut().touch();
        }
    }

    /// Direct children of `dir`.
    fn children<'a>(
        entries: &'a BTreeMap<PathBuf, Entry>,
        dir: &'a Path,
    ) -> impl Iterator<Item = (&'a PathBuf, &'a Entry)> + 'a {
        entries
            .iter()
            .filter(move |(path, _)| !path.as_os_str().is_empty() && path.parent() == Some(dir))
    }

    /// Attributes as reported to callers. Directory link counts are derived
    /// from the number of subdirectories.
    fn reported_attr(entries: &BTreeMap<PathBuf, Entry>, path: &Path, entry: &Entry) -> FileAttr {
        let mut attr = entry.attr().clone();
        if let Entry::Directory { .. } = entry {
            let subdirs = Self::children(entries, path)
                .filter(|(_, e)| e.kind().is_dir())
                .count();
            attr.nlink = 2 + subdirs as u32;
        }
        attr
    }

    /// Zero-extend `data` to `len` bytes, failing instead of aborting when
    /// the allocation cannot be satisfied.
    fn grow(data: &mut Vec<u8>, len: usize) -> Result<(), TryReserveError> {
        data.try_reserve_exact(len - data.len())?;
        data.resize(len, 0);
        Ok(())
    }

    fn insert_new(&self, path: &Path, entry: Entry) -> VfsResult<FileAttr> {
        let normalized = Self::normalize(path);
        Self::check_name(&normalized)?;

        let mut entries = self.entries.write();
        Self::check_parent(&entries, &normalized)?;
        if entries.contains_key(&normalized) {
            return Err(VfsError::already_exists(Self::path_str(&normalized)));
        }

        let attr = entry.attr().clone();
        entries.insert(normalized.clone(), entry);
        Self::touch_parent(&mut entries, &normalized);
        Ok(attr)
    }
}

#[async_trait]
impl VfsOps for MemoryBackend {
    async fn getattr(&self, path: &Path) -> VfsResult<FileAttr> {
        let normalized = Self::normalize(path);
        let entries = self.entries.read();

        entries
            .get(&normalized)
            .map(|e| Self::reported_attr(&entries, &normalized, e))
            .ok_or_else(|| VfsError::not_found(Self::path_str(&normalized)))
    }

    async fn readdir(&self, path: &Path) -> VfsResult<Vec<DirEntry>> {
        let normalized = Self::normalize(path);
        let entries = self.entries.read();

        match entries.get(&normalized) {
            Some(Entry::Directory { .. }) => {}
            Some(_) => return Err(VfsError::not_a_directory(Self::path_str(&normalized))),
            None => return Err(VfsError::not_found(Self::path_str(&normalized))),
        }

        // BTreeMap order keeps siblings sorted by name
        let result = Self::children(&entries, &normalized)
            .filter_map(|(entry_path, entry)| {
                entry_path
                    .file_name()
                    .map(|name| DirEntry::new(name.to_string_lossy(), entry.kind()))
            })
            .collect();
        Ok(result)
    }

    async fn read(&self, path: &Path, offset: u64, size: u32) -> VfsResult<Vec<u8>> {
        let normalized = Self::normalize(path);
        let entries = self.entries.read();

        match entries.get(&normalized) {
            Some(Entry::File { data, .. }) => {
                let start = (offset as usize).min(data.len());
                let end = start.saturating_add(size as usize).min(data.len());
                Ok(data[start..end].to_vec())
            }
            Some(Entry::Directory { .. }) => {
                Err(VfsError::is_a_directory(Self::path_str(&normalized)))
            }
            Some(Entry::Symlink { .. }) => Err(VfsError::other("cannot read symlink as file")),
            None => Err(VfsError::not_found(Self::path_str(&normalized))),
        }
    }

    async fn readlink(&self, path: &Path) -> VfsResult<PathBuf> {
        let normalized = Self::normalize(path);
        let entries = self.entries.read();

        match entries.get(&normalized) {
            Some(Entry::Symlink { target, .. }) => Ok(target.clone()),
            Some(_) => Err(VfsError::NotASymlink(Self::path_str(&normalized))),
            None => Err(VfsError::not_found(Self::path_str(&normalized))),
        }
    }

    async fn write(&self, path: &Path, offset: u64, data: &[u8]) -> VfsResult<u32> {
        let normalized = Self::normalize(path);
        let mut entries = self.entries.write();

        match entries.get_mut(&normalized) {
            Some(Entry::File {
                data: file_data,
                attr,
            }) => {
                let too_large = || VfsError::file_too_large(Self::path_str(&normalized));
                let start = usize::try_from(offset).map_err(|_| too_large())?;
                let end = start.checked_add(data.len()).ok_or_else(too_large)?;
                if end > file_data.len() {
                    Self::grow(file_data, end).map_err(|_| too_large())?;
                }
                file_data[start..end].copy_from_slice(data);
                attr.size = file_data.len() as u64;
                attr.touch();
                Ok(data.len() as u32)
            }
            Some(Entry::Directory { .. }) => {
                Err(VfsError::is_a_directory(Self::path_str(&normalized)))
            }
            Some(Entry::Symlink { .. }) => Err(VfsError::other("cannot write to symlink")),
            None => Err(VfsError::not_found(Self::path_str(&normalized))),
        }
    }

    async fn create(&self, path: &Path, mode: u32, owner: Owner) -> VfsResult<FileAttr> {
        self.insert_new(
            path,
            Entry::File {
                data: Vec::new(),
                attr: FileAttr::file(0, mode, owner),
            },
        )
    }

    async fn mkdir(&self, path: &Path, mode: u32, owner: Owner) -> VfsResult<FileAttr> {
        self.insert_new(
            path,
            Entry::Directory {
                attr: FileAttr::directory(mode, owner),
            },
        )
    }

    async fn unlink(&self, path: &Path) -> VfsResult<()> {
        let normalized = Self::normalize(path);
        if normalized.as_os_str().is_empty() {
            return Err(VfsError::permission_denied("cannot remove root"));
        }

        let mut entries = self.entries.write();
        match entries.get(&normalized) {
            Some(Entry::Directory { .. }) => {
                Err(VfsError::is_a_directory(Self::path_str(&normalized)))
            }
            Some(_) => {
                entries.remove(&normalized);
                Self::touch_parent(&mut entries, &normalized);
                Ok(())
            }
            None => Err(VfsError::not_found(Self::path_str(&normalized))),
        }
    }

    async fn rmdir(&self, path: &Path) -> VfsResult<()> {
        let normalized = Self::normalize(path);
        if normalized.as_os_str().is_empty() {
            return Err(VfsError::permission_denied("cannot remove root"));
        }

        let mut entries = self.entries.write();
        match entries.get(&normalized) {
            Some(Entry::Directory { .. }) => {}
            Some(_) => return Err(VfsError::not_a_directory(Self::path_str(&normalized))),
            None => return Err(VfsError::not_found(Self::path_str(&normalized))),
        }

        if Self::children(&entries, &normalized).next().is_some() {
            return Err(VfsError::directory_not_empty(Self::path_str(&normalized)));
        }

        entries.remove(&normalized);
        Self::touch_parent(&mut entries, &normalized);
        Ok(())
    }

    async fn rename(&self, from: &Path, to: &Path) -> VfsResult<()> {
        let from = Self::normalize(from);
        let to = Self::normalize(to);
        if from.as_os_str().is_empty() || to.as_os_str().is_empty() {
            return Err(VfsError::permission_denied("cannot rename root"));
        }
        Self::check_name(&to)?;
        if from == to {
            return Ok(());
        }

        let mut entries = self.entries.write();
        let source_kind = entries
            .get(&from)
            .map(Entry::kind)
            .ok_or_else(|| VfsError::not_found(Self::path_str(&from)))?;
        Self::check_parent(&entries, &to)?;

        if source_kind.is_dir() && to.starts_with(&from) {
            return Err(VfsError::invalid_path(Self::path_str(&to)));
        }

        // POSIX replacement rules for an existing destination
        if let Some(existing) = entries.get(&to) {
            match (source_kind.is_dir(), existing.kind().is_dir()) {
                (true, true) => {
                    if Self::children(&entries, &to).next().is_some() {
                        return Err(VfsError::directory_not_empty(Self::path_str(&to)));
                    }
                }
                (true, false) => return Err(VfsError::not_a_directory(Self::path_str(&to))),
                (false, true) => return Err(VfsError::is_a_directory(Self::path_str(&to))),
                (false, false) => {}
            }
            entries.remove(&to);
        }

        let Some(mut entry) = entries.remove(&from) else {
            return Err(VfsError::not_found(Self::path_str(&from)));
        };
        entry.attr_mut().ctime = std::time::SystemTime::now();

        if source_kind.is_dir() {
            let descendants: Vec<PathBuf> = entries
                .keys()
                .filter(|k| k.starts_with(&from))
                .cloned()
                .collect();

            for child in descendants {
                if let Some(child_entry) = entries.remove(&child) {
                    if let Ok(relative) = child.strip_prefix(&from) {
                        entries.insert(to.join(relative), child_entry);
                    }
                }
            }
        }

        entries.insert(to.clone(), entry);
        Self::touch_parent(&mut entries, &from);
        Self::touch_parent(&mut entries, &to);
        Ok(())
    }

    async fn setattr(&self, path: &Path, set: SetAttr) -> VfsResult<FileAttr> {
        let normalized = Self::normalize(path);
        let mut entries = self.entries.write();

        let entry = entries
            .get_mut(&normalized)
            .ok_or_else(|| VfsError::not_found(Self::path_str(&normalized)))?;

        if let Some(size) = set.size {
            match entry {
                Entry::File { data, attr } => {
                    let len = usize::try_from(size)
                        .map_err(|_| VfsError::file_too_large(Self::path_str(&normalized)))?;
                    if len > data.len() {
                        Self::grow(data, len)
                            .map_err(|_| VfsError::file_too_large(Self::path_str(&normalized)))?;
                    } else {
                        data.truncate(len);
                    }
                    attr.size = size;
                    attr.touch();
                }
                Entry::Directory { .. } => {
                    return Err(VfsError::is_a_directory(Self::path_str(&normalized)));
                }
                Entry::Symlink { .. } => return Err(VfsError::other("cannot truncate symlink")),
            }
        }

        let attr = entry.attr_mut();
        if let Some(mtime) = set.mtime {
            attr.mtime = mtime;
        }
        if let Some(atime) = set.atime {
            attr.atime = atime;
        }
        if let Some(perm) = set.perm {
            attr.perm = perm & 0o7777;
        }
        if let Some(uid) = set.uid {
            attr.uid = uid;
        }
        if let Some(gid) = set.gid {
            attr.gid = gid;
        }
        attr.ctime = std::time::SystemTime::now();

        let entry = entry.clone();
        Ok(Self::reported_attr(&entries, &normalized, &entry))
    }

    async fn symlink(&self, path: &Path, target: &Path, owner: Owner) -> VfsResult<FileAttr> {
        let target_len = target.as_os_str().len() as u64;
        self.insert_new(
            path,
            Entry::Symlink {
                target: target.to_path_buf(),
                attr: FileAttr::symlink(target_len, owner),
            },
        )
    }

    async fn link(&self, _oldpath: &Path, _newpath: &Path) -> VfsResult<FileAttr> {
        Err(VfsError::Unsupported("hard links"))
    }

    async fn statfs(&self) -> VfsResult<StatFs> {
        let entries = self.entries.read();
        let mut stats = StatFs::default();

        let used_bytes: u64 = entries
            .values()
            .map(|e| match e {
                Entry::File { data, .. } => data.len() as u64,
                _ => 0,
            })
            .sum();
        let used_blocks = used_bytes.div_ceil(stats.bsize as u64);
        stats.bfree = stats.blocks.saturating_sub(used_blocks);
        stats.bavail = stats.bfree;
        stats.ffree = stats.files.saturating_sub(entries.len() as u64);
        Ok(stats)
    }
}
