//! FUSE adapter over a [`VfsOps`] backend.
//!
//! fuser drives this from its own session thread, so each request blocks on
//! the runtime handle to run the async VFS call.

use std::ffi::OsStr;
use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;

use fuser::{
    FUSE_ROOT_ID, FileAttr as FuseAttr, FileType as FuseFileType, Filesystem, KernelConfig,
    ReplyAttr, ReplyCreate, ReplyData, ReplyDirectory, ReplyEmpty, ReplyEntry, ReplyOpen,
    ReplyStatfs, ReplyWrite, Request, TimeOrNow,
};
use libc::c_int;
use tokio::runtime::Handle;
use tracing::{debug, info};

use memvol_kernel::{FileAttr, FileType, Owner, SetAttr, VfsError, VfsOps};

use crate::constants::ATTR_TTL;
use crate::inode::InodeTable;

/// Block size reported in `st_blksize`.
const BLOCK_SIZE: u32 = 4096;

/// Map a VFS error to the errno the kernel expects.
pub fn errno(err: &VfsError) -> c_int {
    match err {
        VfsError::NotFound(_) => libc::ENOENT,
        VfsError::AlreadyExists(_) => libc::EEXIST,
        VfsError::PermissionDenied(_) => libc::EACCES,
        VfsError::NotADirectory(_) => libc::ENOTDIR,
        VfsError::IsADirectory(_) => libc::EISDIR,
        VfsError::DirectoryNotEmpty(_) => libc::ENOTEMPTY,
        VfsError::InvalidPath(_) | VfsError::NotASymlink(_) => libc::EINVAL,
        VfsError::NameTooLong => libc::ENAMETOOLONG,
        VfsError::FileTooLarge(_) => libc::EFBIG,
        VfsError::Unsupported(_) => libc::ENOTSUP,
        VfsError::Io(e) => e.raw_os_error().unwrap_or(libc::EIO),
        VfsError::Other(_) => libc::EIO,
    }
}

fn to_fuse_kind(kind: FileType) -> FuseFileType {
    match kind {
        FileType::File => FuseFileType::RegularFile,
        FileType::Directory => FuseFileType::Directory,
        FileType::Symlink => FuseFileType::Symlink,
    }
}

fn to_fuse_attr(ino: u64, attr: &FileAttr) -> FuseAttr {
    FuseAttr {
        ino,
        size: attr.size,
        blocks: attr.size.div_ceil(512),
        atime: attr.atime,
        mtime: attr.mtime,
        ctime: attr.ctime,
        crtime: attr.ctime,
        kind: to_fuse_kind(attr.kind),
        perm: (attr.perm & 0o7777) as u16,
        nlink: attr.nlink,
        uid: attr.uid,
        gid: attr.gid,
        rdev: 0,
        blksize: BLOCK_SIZE,
        flags: 0,
    }
}

fn to_system_time(time: TimeOrNow) -> SystemTime {
    match time {
        TimeOrNow::SpecificTime(t) => t,
        TimeOrNow::Now => SystemTime::now(),
    }
}

fn request_owner(req: &Request<'_>) -> Owner {
    Owner::new(req.uid(), req.gid())
}

/// One volume's filesystem as the kernel sees it.
pub struct MemFs {
    name: String,
    vfs: Arc<dyn VfsOps>,
    rt: Handle,
    inodes: InodeTable,
}

impl MemFs {
    pub fn new(name: impl Into<String>, vfs: Arc<dyn VfsOps>, rt: Handle) -> Self {
        Self {
            name: name.into(),
            vfs,
            rt,
            inodes: InodeTable::new(),
        }
    }

    /// Stat `path` and register its inode.
    fn entry(&mut self, path: &Path) -> Result<FuseAttr, c_int> {
        let attr = self
            .rt
            .block_on(self.vfs.getattr(path))
            .map_err(|e| errno(&e))?;
        let ino = self.inodes.lookup_or_insert(path);
        Ok(to_fuse_attr(ino, &attr))
    }

    fn attr_of(&self, ino: u64) -> Result<FuseAttr, c_int> {
        let path = self.inodes.path(ino).ok_or(libc::ENOENT)?;
        let attr = self
            .rt
            .block_on(self.vfs.getattr(path))
            .map_err(|e| errno(&e))?;
        Ok(to_fuse_attr(ino, &attr))
    }

    fn setattr_inner(&self, ino: u64, changes: SetAttr) -> Result<FuseAttr, c_int> {
        let path = self.inodes.path(ino).ok_or(libc::ENOENT)?;
        let attr = self
            .rt
            .block_on(self.vfs.setattr(path, changes))
            .map_err(|e| errno(&e))?;
        Ok(to_fuse_attr(ino, &attr))
    }

    fn remove_inner(&mut self, parent: u64, name: &OsStr, dir: bool) -> Result<(), c_int> {
        let path = self.inodes.child_path(parent, name).ok_or(libc::ENOENT)?;
        let result = if dir {
            self.rt.block_on(self.vfs.rmdir(&path))
        } else {
            self.rt.block_on(self.vfs.unlink(&path))
        };
        result.map_err(|e| errno(&e))?;
        self.inodes.remove(&path);
        Ok(())
    }

    fn rename_inner(
        &mut self,
        parent: u64,
        name: &OsStr,
        newparent: u64,
        newname: &OsStr,
        flags: u32,
    ) -> Result<(), c_int> {
        if flags & libc::RENAME_EXCHANGE != 0 {
            return Err(libc::ENOTSUP);
        }
        let from = self.inodes.child_path(parent, name).ok_or(libc::ENOENT)?;
        let to = self
            .inodes
            .child_path(newparent, newname)
            .ok_or(libc::ENOENT)?;
        if flags & libc::RENAME_NOREPLACE != 0 && self.rt.block_on(self.vfs.exists(&to)) {
            return Err(libc::EEXIST);
        }
        self.rt
            .block_on(self.vfs.rename(&from, &to))
            .map_err(|e| errno(&e))?;
        self.inodes.rename(&from, &to);
        Ok(())
    }

    fn readdir_entries(&mut self, ino: u64) -> Result<Vec<(u64, FuseFileType, String)>, c_int> {
        let path = self.inodes.path(ino).ok_or(libc::ENOENT)?.to_path_buf();
        let children = self
            .rt
            .block_on(self.vfs.readdir(&path))
            .map_err(|e| errno(&e))?;

        let parent_ino = match path.parent() {
            Some(parent) => self.inodes.lookup_or_insert(parent),
            None => FUSE_ROOT_ID,
        };
        let mut entries = Vec::with_capacity(children.len() + 2);
        entries.push((ino, FuseFileType::Directory, ".".to_string()));
        entries.push((parent_ino, FuseFileType::Directory, "..".to_string()));
        for child in children {
            let child_ino = self.inodes.lookup_or_insert(&path.join(&child.name));
            entries.push((child_ino, to_fuse_kind(child.kind), child.name));
        }
        Ok(entries)
    }
}

impl Filesystem for MemFs {
    fn init(&mut self, _req: &Request<'_>, _config: &mut KernelConfig) -> Result<(), c_int> {
        info!(volume = %self.name, "filesystem session initialized");
        Ok(())
    }

    fn destroy(&mut self) {
        info!(volume = %self.name, "filesystem session destroyed");
    }

    fn lookup(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        debug!(volume = %self.name, parent, ?name, "lookup");
        let Some(path) = self.inodes.child_path(parent, name) else {
            reply.error(libc::ENOENT);
            return;
        };
        match self.entry(&path) {
            Ok(attr) => reply.entry(&ATTR_TTL, &attr, 0),
            Err(e) => reply.error(e),
        }
    }

    fn getattr(&mut self, _req: &Request<'_>, ino: u64, _fh: Option<u64>, reply: ReplyAttr) {
        debug!(volume = %self.name, ino, "getattr");
        match self.attr_of(ino) {
            Ok(attr) => reply.attr(&ATTR_TTL, &attr),
            Err(e) => reply.error(e),
        }
    }

    fn setattr(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        mode: Option<u32>,
        uid: Option<u32>,
        gid: Option<u32>,
        size: Option<u64>,
        atime: Option<TimeOrNow>,
        mtime: Option<TimeOrNow>,
        _ctime: Option<SystemTime>,
        _fh: Option<u64>,
        _crtime: Option<SystemTime>,
        _chgtime: Option<SystemTime>,
        _bkuptime: Option<SystemTime>,
        _flags: Option<u32>,
        reply: ReplyAttr,
    ) {
        debug!(volume = %self.name, ino, ?mode, ?uid, ?gid, ?size, "setattr");
        let changes = SetAttr {
            size,
            mtime: mtime.map(to_system_time),
            atime: atime.map(to_system_time),
            perm: mode,
            uid,
            gid,
        };
        match self.setattr_inner(ino, changes) {
            Ok(attr) => reply.attr(&ATTR_TTL, &attr),
            Err(e) => reply.error(e),
        }
    }

    fn readlink(&mut self, _req: &Request<'_>, ino: u64, reply: ReplyData) {
        debug!(volume = %self.name, ino, "readlink");
        let Some(path) = self.inodes.path(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        match self.rt.block_on(self.vfs.readlink(path)) {
            Ok(target) => reply.data(target.as_os_str().as_encoded_bytes()),
            Err(e) => reply.error(errno(&e)),
        }
    }

    fn mkdir(
        &mut self,
        req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        mode: u32,
        umask: u32,
        reply: ReplyEntry,
    ) {
        debug!(volume = %self.name, parent, ?name, mode, "mkdir");
        let Some(path) = self.inodes.child_path(parent, name) else {
            reply.error(libc::ENOENT);
            return;
        };
        let created = self
            .rt
            .block_on(self.vfs.mkdir(&path, mode & !umask, request_owner(req)));
        match created {
            Ok(attr) => {
                let ino = self.inodes.lookup_or_insert(&path);
                reply.entry(&ATTR_TTL, &to_fuse_attr(ino, &attr), 0);
            }
            Err(e) => reply.error(errno(&e)),
        }
    }

    fn unlink(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        debug!(volume = %self.name, parent, ?name, "unlink");
        match self.remove_inner(parent, name, false) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(e),
        }
    }

    fn rmdir(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        debug!(volume = %self.name, parent, ?name, "rmdir");
        match self.remove_inner(parent, name, true) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(e),
        }
    }

    fn symlink(
        &mut self,
        req: &Request<'_>,
        parent: u64,
        link_name: &OsStr,
        target: &Path,
        reply: ReplyEntry,
    ) {
        debug!(volume = %self.name, parent, ?link_name, ?target, "symlink");
        let Some(path) = self.inodes.child_path(parent, link_name) else {
            reply.error(libc::ENOENT);
            return;
        };
        let created = self
            .rt
            .block_on(self.vfs.symlink(&path, target, request_owner(req)));
        match created {
            Ok(attr) => {
                let ino = self.inodes.lookup_or_insert(&path);
                reply.entry(&ATTR_TTL, &to_fuse_attr(ino, &attr), 0);
            }
            Err(e) => reply.error(errno(&e)),
        }
    }

    fn rename(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        newparent: u64,
        newname: &OsStr,
        flags: u32,
        reply: ReplyEmpty,
    ) {
        debug!(volume = %self.name, parent, ?name, newparent, ?newname, flags, "rename");
        match self.rename_inner(parent, name, newparent, newname, flags) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(e),
        }
    }

    fn link(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        newparent: u64,
        newname: &OsStr,
        reply: ReplyEntry,
    ) {
        debug!(volume = %self.name, ino, newparent, ?newname, "link");
        let (Some(from), Some(to)) = (
            self.inodes.path(ino).map(Path::to_path_buf),
            self.inodes.child_path(newparent, newname),
        ) else {
            reply.error(libc::ENOENT);
            return;
        };
        match self.rt.block_on(self.vfs.link(&from, &to)) {
            Ok(attr) => {
                let ino = self.inodes.lookup_or_insert(&to);
                reply.entry(&ATTR_TTL, &to_fuse_attr(ino, &attr), 0);
            }
            // link(2) reports a filesystem without hard links as EPERM
            Err(VfsError::Unsupported(_)) => reply.error(libc::EPERM),
            Err(e) => reply.error(errno(&e)),
        }
    }

    fn open(&mut self, _req: &Request<'_>, ino: u64, flags: i32, reply: ReplyOpen) {
        debug!(volume = %self.name, ino, flags, "open");
        match self.attr_of(ino) {
            Ok(attr) if attr.kind == FuseFileType::Directory => reply.error(libc::EISDIR),
            Ok(_) => reply.opened(0, 0),
            Err(e) => reply.error(e),
        }
    }

    fn read(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        debug!(volume = %self.name, ino, offset, size, "read");
        let Ok(offset) = u64::try_from(offset) else {
            reply.error(libc::EINVAL);
            return;
        };
        let Some(path) = self.inodes.path(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        match self.rt.block_on(self.vfs.read(path, offset, size)) {
            Ok(data) => reply.data(&data),
            Err(e) => reply.error(errno(&e)),
        }
    }

    fn write(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        debug!(volume = %self.name, ino, offset, len = data.len(), "write");
        let Ok(offset) = u64::try_from(offset) else {
            reply.error(libc::EINVAL);
            return;
        };
        let Some(path) = self.inodes.path(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        match self.rt.block_on(self.vfs.write(path, offset, data)) {
            Ok(written) => reply.written(written),
            Err(e) => reply.error(errno(&e)),
        }
    }

    fn flush(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        _fh: u64,
        _lock_owner: u64,
        reply: ReplyEmpty,
    ) {
        reply.ok();
    }

    fn fsync(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        _fh: u64,
        _datasync: bool,
        reply: ReplyEmpty,
    ) {
        // nothing below memory to sync to
        reply.ok();
    }

    fn readdir(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        debug!(volume = %self.name, ino, offset, "readdir");
        let entries = match self.readdir_entries(ino) {
            Ok(entries) => entries,
            Err(e) => {
                reply.error(e);
                return;
            }
        };
        let skip = usize::try_from(offset).unwrap_or(0);
        for (i, (child_ino, kind, name)) in entries.into_iter().enumerate().skip(skip) {
            // offset handed back is that of the next entry
            if reply.add(child_ino, (i + 1) as i64, kind, name) {
                break;
            }
        }
        reply.ok();
    }

    fn statfs(&mut self, _req: &Request<'_>, _ino: u64, reply: ReplyStatfs) {
        match self.rt.block_on(self.vfs.statfs()) {
            Ok(st) => reply.statfs(
                st.blocks, st.bfree, st.bavail, st.files, st.ffree, st.bsize, st.namelen, st.frsize,
            ),
            Err(e) => reply.error(errno(&e)),
        }
    }

    fn create(
        &mut self,
        req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        mode: u32,
        umask: u32,
        flags: i32,
        reply: ReplyCreate,
    ) {
        debug!(volume = %self.name, parent, ?name, mode, flags, "create");
        let Some(path) = self.inodes.child_path(parent, name) else {
            reply.error(libc::ENOENT);
            return;
        };
        let created = self
            .rt
            .block_on(self.vfs.create(&path, mode & !umask, request_owner(req)));
        match created {
            Ok(attr) => {
                let ino = self.inodes.lookup_or_insert(&path);
                reply.created(&ATTR_TTL, &to_fuse_attr(ino, &attr), 0, 0, 0);
            }
            Err(e) => reply.error(errno(&e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_errno_mapping() {
        assert_eq!(errno(&VfsError::not_found("a")), libc::ENOENT);
        assert_eq!(errno(&VfsError::already_exists("a")), libc::EEXIST);
        assert_eq!(errno(&VfsError::not_a_directory("a")), libc::ENOTDIR);
        assert_eq!(errno(&VfsError::is_a_directory("a")), libc::EISDIR);
        assert_eq!(errno(&VfsError::directory_not_empty("a")), libc::ENOTEMPTY);
        assert_eq!(errno(&VfsError::invalid_path("a")), libc::EINVAL);
        assert_eq!(errno(&VfsError::NameTooLong), libc::ENAMETOOLONG);
        assert_eq!(errno(&VfsError::file_too_large("a")), libc::EFBIG);
        assert_eq!(errno(&VfsError::Unsupported("link")), libc::ENOTSUP);
        assert_eq!(errno(&VfsError::other("boom")), libc::EIO);
    }

    #[test]
    fn test_errno_passes_os_errors_through() {
        let err = VfsError::from(io::Error::from_raw_os_error(libc::ENOSPC));
        assert_eq!(errno(&err), libc::ENOSPC);

        let err = VfsError::from(io::Error::other("no code"));
        assert_eq!(errno(&err), libc::EIO);
    }

    #[test]
    fn test_fuse_attr_conversion() {
        let attr = FileAttr::file(1025, 0o640, Owner::new(1000, 100));
        let fuse = to_fuse_attr(42, &attr);
        assert_eq!(fuse.ino, 42);
        assert_eq!(fuse.size, 1025);
        assert_eq!(fuse.blocks, 3);
        assert_eq!(fuse.kind, FuseFileType::RegularFile);
        assert_eq!(fuse.perm, 0o640);
        assert_eq!(fuse.uid, 1000);
        assert_eq!(fuse.gid, 100);

        let dir = to_fuse_attr(FUSE_ROOT_ID, &FileAttr::directory(0o755, Owner::root()));
        assert_eq!(dir.kind, FuseFileType::Directory);
        assert_eq!(dir.nlink, 2);
    }
}
