use std::ffi::OsStr;
use std::time::{Duration, UNIX_EPOCH};

use fuser::{
    FileAttr, FileType, Filesystem, ReplyAttr, ReplyCreate, ReplyData, ReplyDirectory, ReplyEmpty, ReplyEntry,
    ReplyWrite, Request,
};
use log::debug;

use crate::client::MfsClient;
use crate::consts::{InodePointer, BLOCK_SIZE, DIRECT_POINTERS, ROOT_INODE};
use crate::fs::Stat;
use crate::structure::directory::entries;
use crate::structure::inode::InodeKind;
use crate::util::error::{Error, Result};

const TTL: Duration = Duration::from_secs(1);

pub struct FuseDriver {
    client: MfsClient,
    uid: u32,
    gid: u32,
}

fn to_inum(ino: u64) -> Result<InodePointer> {
    ino.checked_sub(1)
        .and_then(|inum| InodePointer::try_from(inum).ok())
        .ok_or(Error::InvalidInode(-1))
}

fn to_ino(inum: InodePointer) -> u64 {
    inum as u64 + 1
}

fn to_name(name: &OsStr) -> Result<&str> {
    name.to_str().ok_or(Error::InvalidName)
}

impl FuseDriver {
    pub fn new(client: MfsClient) -> FuseDriver {
        // SAFETY: plain getters with no preconditions
        let (uid, gid) = unsafe { (libc::getuid(), libc::getgid()) };
        FuseDriver { client, uid, gid }
    }

    fn attr(&self, inum: InodePointer) -> Result<FileAttr> {
        let Stat { size, kind } = self.client.stat(inum)?;
        let (kind, perm) = match kind {
            InodeKind::Directory => (FileType::Directory, 0o755),
            InodeKind::File => (FileType::RegularFile, 0o644),
            InodeKind::Unused => return Err(Error::NotFound),
        };
        let size = size.max(0) as u64;
        Ok(FileAttr {
            ino: to_ino(inum),
            size,
            blocks: size.div_ceil(512),
            atime: UNIX_EPOCH,
            mtime: UNIX_EPOCH,
            ctime: UNIX_EPOCH,
            crtime: UNIX_EPOCH,
            kind,
            perm,
            nlink: if kind == FileType::Directory { 2 } else { 1 },
            uid: self.uid,
            gid: self.gid,
            rdev: 0,
            blksize: BLOCK_SIZE as u32,
            flags: 0,
        })
    }

    fn make(&self, parent: u64, name: &OsStr, kind: InodeKind) -> Result<FileAttr> {
        let parent = to_inum(parent)?;
        let inum = self.client.create(parent, kind, to_name(name)?)?;
        self.attr(inum)
    }

    fn remove(&self, parent: u64, name: &OsStr, expected: InodeKind) -> Result<()> {
        let parent = to_inum(parent)?;
        let name = to_name(name)?;
        let target = self.client.lookup(parent, name)?;
        match (self.client.stat(target)?.kind, expected) {
            (InodeKind::Directory, InodeKind::File) => return Err(Error::IsADirectory(target)),
            (InodeKind::File, InodeKind::Directory) => return Err(Error::NotADirectory(target)),
            _ => {}
        }
        if expected == InodeKind::Directory {
            let listing = self.client.read(target, 0, BLOCK_SIZE as i32)?;
            if entries(&listing).skip(2).any(|(_, entry)| !entry.is_free()) {
                return Err(Error::DirectoryNotEmpty(target));
            }
        }
        self.client.unlink(parent, name)
    }

    /// Reads up to `size` bytes, one block request at a time, clamped to the
    /// reported file size.
    fn read_range(&self, inum: InodePointer, offset: i64, size: u32) -> Result<Vec<u8>> {
        let file_size = self.client.stat(inum)?.size.max(0) as i64;
        let limit = file_size.min((BLOCK_SIZE * DIRECT_POINTERS) as i64);
        let end = (offset + size as i64).min(limit);
        let mut data = Vec::new();
        let mut position = offset.max(0);
        while position < end {
            let block_start = position - position % BLOCK_SIZE as i64;
            let within = (position - block_start) as usize;
            let take = ((end - position) as usize).min(BLOCK_SIZE - within);
            let block = self.client.read(inum, block_start as i32, (within + take) as i32)?;
            data.extend_from_slice(&block[within..within + take]);
            position += take as i64;
        }
        Ok(data)
    }

    /// Block-wise read-modify-write; the server always writes from the start
    /// of the addressed block.
    fn write_range(&self, inum: InodePointer, offset: i64, data: &[u8]) -> Result<usize> {
        if offset < 0 || offset as usize + data.len() > BLOCK_SIZE * DIRECT_POINTERS {
            return Err(Error::InvalidOffset(offset.clamp(i32::MIN as i64, i32::MAX as i64) as i32));
        }
        let mut written = 0;
        while written < data.len() {
            let position = offset as usize + written;
            let block_start = position - position % BLOCK_SIZE;
            let within = position - block_start;
            let take = (data.len() - written).min(BLOCK_SIZE - within);

            let mut block = if within == 0 && take == BLOCK_SIZE {
                vec![0u8; BLOCK_SIZE]
            } else {
                self.client.read(inum, block_start as i32, BLOCK_SIZE as i32)?
            };
            block[within..within + take].copy_from_slice(&data[written..written + take]);
            let nbytes = (within + take) as i32;
            self.client.write(inum, &block, block_start as i32, nbytes)?;
            written += take;
        }
        Ok(written)
    }

    fn list(&self, inum: InodePointer) -> Result<Vec<(u64, FileType, String)>> {
        let listing = self.client.read(inum, 0, BLOCK_SIZE as i32)?;
        let mut found = Vec::new();
        for (_, entry) in entries(&listing).filter(|(_, entry)| !entry.is_free()) {
            let kind = match self.client.stat(entry.inum)?.kind {
                InodeKind::File => FileType::RegularFile,
                _ => FileType::Directory,
            };
            found.push((to_ino(entry.inum), kind, entry.name_lossy()));
        }
        Ok(found)
    }
}

impl Filesystem for FuseDriver {
    fn init(&mut self, _req: &Request<'_>, _config: &mut fuser::KernelConfig) -> std::result::Result<(), libc::c_int> {
        self.client.ping().map_err(|e| e.errno())?;
        self.attr(ROOT_INODE).map(|_| ()).map_err(|e| e.errno())
    }

    fn lookup(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        let found = to_inum(parent)
            .and_then(|parent| self.client.lookup(parent, to_name(name)?))
            .and_then(|inum| self.attr(inum));
        match found {
            Ok(attr) => reply.entry(&TTL, &attr, 0),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn getattr(&mut self, _req: &Request<'_>, ino: u64, reply: ReplyAttr) {
        match to_inum(ino).and_then(|inum| self.attr(inum)) {
            Ok(attr) => reply.attr(&TTL, &attr),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn mkdir(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, _mode: u32, _umask: u32, reply: ReplyEntry) {
        match self.make(parent, name, InodeKind::Directory) {
            Ok(attr) => reply.entry(&TTL, &attr, 0),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn create(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        _mode: u32,
        _umask: u32,
        flags: i32,
        reply: ReplyCreate,
    ) {
        match self.make(parent, name, InodeKind::File) {
            Ok(attr) => reply.created(&TTL, &attr, 0, 0, flags as u32),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn unlink(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        match self.remove(parent, name, InodeKind::File) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn rmdir(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        match self.remove(parent, name, InodeKind::Directory) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(e.errno()),
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
        match to_inum(ino).and_then(|inum| self.read_range(inum, offset, size)) {
            Ok(data) => reply.data(&data),
            Err(e) => reply.error(e.errno()),
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
        match to_inum(ino).and_then(|inum| self.write_range(inum, offset, data)) {
            Ok(written) => reply.written(written as u32),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn readdir(&mut self, _req: &Request<'_>, ino: u64, _fh: u64, offset: i64, mut reply: ReplyDirectory) {
        let listing = match to_inum(ino).and_then(|inum| self.list(inum)) {
            Ok(listing) => listing,
            Err(e) => return reply.error(e.errno()),
        };
        debug!("readdir {} from {}: {} entries", ino, offset, listing.len());
        for (i, (child, kind, name)) in listing.into_iter().enumerate().skip(offset.max(0) as usize) {
            if reply.add(child, (i + 1) as i64, kind, name) {
                break;
            }
        }
        reply.ok();
    }
}
