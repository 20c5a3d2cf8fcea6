//! Inode ↔ path table for the FUSE adapter.
//!
//! The VFS is path-based; the kernel speaks inode numbers. Numbers are handed
//! out on first sight of a path and never reused while the session lives.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use fuser::FUSE_ROOT_ID;

#[derive(Debug)]
pub struct InodeTable {
    paths: HashMap<u64, PathBuf>,
    inodes: HashMap<PathBuf, u64>,
    next: u64,
}

impl Default for InodeTable {
    fn default() -> Self {
        Self::new()
    }
}

impl InodeTable {
    /// A table holding only the root directory (the empty path).
    pub fn new() -> Self {
        let mut table = Self {
            paths: HashMap::new(),
            inodes: HashMap::new(),
            next: FUSE_ROOT_ID + 1,
        };
        table.paths.insert(FUSE_ROOT_ID, PathBuf::new());
        table.inodes.insert(PathBuf::new(), FUSE_ROOT_ID);
        table
    }

    pub fn path(&self, ino: u64) -> Option<&Path> {
        self.paths.get(&ino).map(PathBuf::as_path)
    }

    /// Path of `name` inside directory `parent`.
    pub fn child_path(&self, parent: u64, name: &OsStr) -> Option<PathBuf> {
        self.path(parent).map(|dir| dir.join(name))
    }

    pub fn lookup_or_insert(&mut self, path: &Path) -> u64 {
        if let Some(&ino) = self.inodes.get(path) {
            return ino;
        }
        let ino = self.next;
        self.next += 1;
        self.paths.insert(ino, path.to_path_buf());
        self.inodes.insert(path.to_path_buf(), ino);
        ino
    }

    /// Forget `path` and everything below it.
    pub fn remove(&mut self, path: &Path) {
        let doomed: Vec<PathBuf> = self
            .inodes
            .keys()
            .filter(|p| p.starts_with(path))
            .cloned()
            .collect();
        for p in doomed {
            if let Some(ino) = self.inodes.remove(&p) {
                self.paths.remove(&ino);
            }
        }
    }

    /// Re-key `from` and its descendants under `to`, dropping whatever `to`
    /// used to name.
    pub fn rename(&mut self, from: &Path, to: &Path) {
        self.remove(to);
        let moved: Vec<(PathBuf, u64)> = self
            .inodes
            .iter()
            .filter(|(p, _)| p.starts_with(from))
            .map(|(p, ino)| (p.clone(), *ino))
            .collect();
        for (old, ino) in moved {
            self.inodes.remove(&old);
            let new = match old.strip_prefix(from) {
                Ok(rest) if rest.as_os_str().is_empty() => to.to_path_buf(),
                Ok(rest) => to.join(rest),
                Err(_) => continue,
            };
            self.paths.insert(ino, new.clone());
            self.inodes.insert(new, ino);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root() {
        let mut table = InodeTable::new();
        assert_eq!(table.path(FUSE_ROOT_ID), Some(Path::new("")));
        assert_eq!(table.lookup_or_insert(Path::new("")), FUSE_ROOT_ID);
        assert_eq!(
            table.child_path(FUSE_ROOT_ID, OsStr::new("a")),
            Some(PathBuf::from("a"))
        );
        assert_eq!(table.child_path(99, OsStr::new("a")), None);
    }

    #[test]
    fn test_lookup_or_insert_is_stable() {
        let mut table = InodeTable::new();
        let a = table.lookup_or_insert(Path::new("a"));
        let b = table.lookup_or_insert(Path::new("a/b"));
        assert_ne!(a, b);
        assert_eq!(table.lookup_or_insert(Path::new("a")), a);
        assert_eq!(table.path(b), Some(Path::new("a/b")));
    }

    #[test]
    fn test_remove_drops_subtree() {
        let mut table = InodeTable::new();
        let a = table.lookup_or_insert(Path::new("a"));
        let b = table.lookup_or_insert(Path::new("a/b"));
        let ab = table.lookup_or_insert(Path::new("ab"));

        table.remove(Path::new("a"));
        assert!(table.path(a).is_none());
        assert!(table.path(b).is_none());
        // sibling sharing a string prefix survives
        assert_eq!(table.path(ab), Some(Path::new("ab")));
    }

    #[test]
    fn test_rename_moves_descendants() {
        let mut table = InodeTable::new();
        let dir = table.lookup_or_insert(Path::new("dir"));
        let file = table.lookup_or_insert(Path::new("dir/file"));
        let victim = table.lookup_or_insert(Path::new("other"));

        table.rename(Path::new("dir"), Path::new("other"));
        assert_eq!(table.path(dir), Some(Path::new("other")));
        assert_eq!(table.path(file), Some(Path::new("other/file")));
        assert!(table.path(victim).is_none());
        assert_eq!(table.lookup_or_insert(Path::new("other/file")), file);
    }
}
