use log::{debug, info};

use crate::consts::{
    Block, BlockPointer, InodePointer, BLOCK_SIZE, DIRECT_POINTERS, DIR_ENTRY_SIZE, INODES_PER_BLOCK, INODE_SIZE,
    ROOT_INODE, UNUSED_POINTER,
};
use crate::driver::DeviceDriver;
use crate::structure::bitmap::Bitmap;
use crate::structure::directory::{encode_name, entries, DirEntry, DirectoryBlock};
use crate::structure::inode::{Inode, InodeKind};
use crate::structure::superblock::SuperBlock;
use crate::util::error::{Error, Result};
use crate::util::serializable::ByteSerializable;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Stat {
    pub size: i32,
    pub kind: InodeKind,
}

/// The storage engine. Owns the in-memory copy of the bitmaps, the inode table
/// and the data region; the drive is only touched by `mount`, `format` and
/// `flush`.
pub struct FS<A: DeviceDriver> {
    device: A,
    superblock: SuperBlock,
    inode_map: Bitmap,
    data_map: Bitmap,
    inodes: Vec<Inode>,
    data: Vec<Block>,
}

impl<A: DeviceDriver> FS<A> {
    /// Writes an empty file system with a root directory at inode 0 and mounts it.
    pub fn format(mut device: A, num_inodes: i32, num_data: i32) -> Result<FS<A>> {
        let max = (BLOCK_SIZE * 8) as i32;
        if !(1..=max).contains(&num_inodes) || !(1..=max).contains(&num_data) {
            return Err(Error::CorruptImage(format!(
                "inode and data block counts must be between 1 and {}",
                max
            )));
        }

        let superblock = SuperBlock::new(num_inodes, num_data);
        if device.get_block_count() < superblock.total_blocks() {
            return Err(Error::CorruptImage(format!(
                "image holds {} blocks, layout needs {}",
                device.get_block_count(),
                superblock.total_blocks()
            )));
        }
        superblock.write(&mut device)?;

        let mut inode_map = Bitmap::new(num_inodes as usize);
        inode_map.mark_used(ROOT_INODE as usize);
        device.write_block(superblock.inode_bitmap_block(), &inode_map.to_block())?;

        let mut data_map = Bitmap::new(num_data as usize);
        data_map.mark_used(0);
        device.write_block(superblock.data_bitmap_block(), &data_map.to_block())?;

        let mut inodes = vec![Inode::unused(); num_inodes as usize];
        inodes[ROOT_INODE as usize] = Inode::new_directory(superblock.data_region_block(0));
        for (i, chunk) in inodes.chunks(INODES_PER_BLOCK).enumerate() {
            device.write_block(superblock.inode_region_block(i), &pack_inodes(chunk))?;
        }

        let mut root = vec![0u8; BLOCK_SIZE];
        DirectoryBlock::new(&mut root).init(ROOT_INODE, ROOT_INODE);
        device.write_block(superblock.data_region_block(0), &root)?;
        let empty = vec![0u8; BLOCK_SIZE];
        for i in 1..num_data as usize {
            device.write_block(superblock.data_region_block(i), &empty)?;
        }
        device.sync()?;

        info!("formatted image: {} inodes, {} data blocks", num_inodes, num_data);
        FS::mount(device)
    }

    /// Loads superblock, bitmaps, inode table and data region into memory.
    pub fn mount(device: A) -> Result<FS<A>> {
        let superblock = SuperBlock::read(&device)?;
        let num_inodes = superblock.num_inodes as usize;
        let num_data = superblock.num_data as usize;

        let inode_map = Bitmap::from_block(&device.read_block(superblock.inode_bitmap_block())?, num_inodes)?;
        let data_map = Bitmap::from_block(&device.read_block(superblock.data_bitmap_block())?, num_data)?;

        let mut inodes = Vec::with_capacity(num_inodes);
        for i in 0..superblock.inode_region_len as usize {
            let block = device.read_block(superblock.inode_region_block(i))?;
            for record in block.chunks_exact(INODE_SIZE) {
                if inodes.len() == num_inodes {
                    break;
                }
                // free slots may hold anything, depending on the formatter
                if inode_map.is_used(inodes.len()) {
                    inodes.push(Inode::from_bytes(record)?);
                } else {
                    inodes.push(Inode::unused());
                }
            }
        }

        let mut data = Vec::with_capacity(num_data);
        for i in 0..num_data {
            data.push(device.read_block(superblock.data_region_block(i))?);
        }

        if !inode_map.is_used(ROOT_INODE as usize) || inodes[ROOT_INODE as usize].kind != InodeKind::Directory {
            return Err(Error::CorruptImage("inode 0 is not a directory".to_string()));
        }

        info!(
            "mounted image: {} inodes ({} in use), {} data blocks ({} in use)",
            num_inodes,
            inode_map.used_count(),
            num_data,
            data_map.used_count()
        );
        Ok(FS { device, superblock, inode_map, data_map, inodes, data })
    }

    pub fn superblock(&self) -> &SuperBlock {
        &self.superblock
    }

    /// Inode of `name` in `parent`. A parent that is out of range or not a
    /// directory reads as `NotFound`, like a missing name.
    pub fn lookup(&self, parent: InodePointer, name: &str) -> Result<InodePointer> {
        let directory = self.directory(parent).map_err(|_| Error::NotFound)?;
        for pointer in directory.used_pointers() {
            let block = self.block(pointer)?;
            let hit = entries(block)
                .find(|(_, entry)| !entry.is_free() && entry.name_bytes() == name.as_bytes());
            if let Some((_, entry)) = hit {
                return Ok(entry.inum);
            }
        }
        Err(Error::NotFound)
    }

    /// Size and type of `inum`, including the unused sentinel type. Out of
    /// range inode numbers are `NotFound`.
    pub fn stat(&self, inum: InodePointer) -> Result<Stat> {
        let inode = self.inode(inum).map_err(|_| Error::NotFound)?;
        Ok(Stat { size: inode.size, kind: inode.kind })
    }

    /// Adds `name` to `parent` as a new file or directory. Nothing is modified
    /// unless every resource the entry needs is available.
    pub fn create(&mut self, parent: InodePointer, kind: InodeKind, name: &str) -> Result<InodePointer> {
        let encoded = encode_name(name)?;
        let directory = *self.directory(parent)?;
        if kind == InodeKind::Unused {
            return Err(Error::InvalidType(kind.code()));
        }
        if self.lookup(parent, name).is_ok() {
            return Err(Error::AlreadyExists);
        }

        let parent_block = directory.pointer(0).ok_or(Error::DirectoryFull(parent))?;
        let parent_index = self.data_index(parent_block)?;
        let slot = DirectoryBlock::new(&mut self.data[parent_index])
            .find_free()
            .ok_or(Error::DirectoryFull(parent))?;

        let inum = self.inode_map.find_free().ok_or(Error::NoFreeInodes)?;
        let wanted = match kind {
            InodeKind::Directory => 1,
            _ => DIRECT_POINTERS,
        };
        let blocks = self.data_map.find_free_many(wanted).ok_or(Error::NoFreeBlocks)?;

        let inum = inum as InodePointer;
        for &index in &blocks {
            self.data_map.mark_used(index);
        }
        self.inode_map.mark_used(inum as usize);

        self.inodes[inum as usize] = match kind {
            InodeKind::Directory => {
                DirectoryBlock::new(&mut self.data[blocks[0]]).init(inum, parent);
                Inode::new_directory(self.superblock.data_region_block(blocks[0]))
            }
            _ => {
                let mut pointers = [UNUSED_POINTER; DIRECT_POINTERS];
                for (pointer, &index) in pointers.iter_mut().zip(&blocks) {
                    self.data[index].fill(0);
                    *pointer = self.superblock.data_region_block(index);
                }
                Inode::new_file(pointers)
            }
        };

        DirectoryBlock::new(&mut self.data[parent_index]).set(slot, &DirEntry::new(encoded, inum));
        self.inodes[parent as usize].size += DIR_ENTRY_SIZE as i32;

        debug!("created {:?} {:?} as inode {} under {}", kind, name, inum, parent);
        Ok(inum)
    }

    /// Removes `name` from `parent`. A name that is not present is not an error.
    pub fn unlink(&mut self, parent: InodePointer, name: &str) -> Result<()> {
        let directory = *self.inode(parent)?;
        if directory.kind != InodeKind::Directory {
            return Err(Error::NotADirectory(parent));
        }
        if name == "." || name == ".." {
            return Err(Error::InvalidName);
        }

        let Some(parent_block) = directory.pointer(0) else {
            return Ok(());
        };
        let parent_index = self.data_index(parent_block)?;
        let Some((slot, entry)) = DirectoryBlock::new(&mut self.data[parent_index]).find(name.as_bytes()) else {
            debug!("unlink: {:?} not present in {}", name, parent);
            return Ok(());
        };

        let target = entry.inum;
        let inode = *self
            .inode(target)
            .map_err(|_| Error::CorruptImage(format!("entry {:?} points at inode {}", name, target)))?;
        if inode.kind == InodeKind::Directory && inode.size > 2 * DIR_ENTRY_SIZE as i32 {
            return Err(Error::DirectoryNotEmpty(target));
        }

        let blocks = inode
            .used_pointers()
            .map(|pointer| self.data_index(pointer))
            .collect::<Result<Vec<usize>>>()?;
        for index in blocks {
            if inode.kind == InodeKind::Directory {
                // drop "." and ".."
                let mut dot_entries = DirectoryBlock::new(&mut self.data[index]);
                dot_entries.set(0, &DirEntry::free());
                dot_entries.set(1, &DirEntry::free());
            }
            self.data_map.mark_free(index);
        }
        self.inodes[target as usize] = Inode::unused();
        self.inode_map.mark_free(target as usize);

        DirectoryBlock::new(&mut self.data[parent_index]).set(slot, &DirEntry::free());
        self.inodes[parent as usize].size -= DIR_ENTRY_SIZE as i32;

        debug!("unlinked {:?} (inode {}) from {}", name, target, parent);
        Ok(())
    }

    /// Overwrites the first `nbytes` bytes of the block holding `offset`.
    /// The recorded size grows by `nbytes` on every call.
    pub fn write(&mut self, inum: InodePointer, data: &[u8], offset: i32, nbytes: i32) -> Result<()> {
        let slot = check_transfer(offset, nbytes)?;
        if data.len() < nbytes as usize {
            return Err(Error::InvalidLength(nbytes));
        }
        let inode = *self.inode(inum)?;
        match inode.kind {
            InodeKind::Directory => return Err(Error::IsADirectory(inum)),
            InodeKind::Unused => return Err(Error::NotFound),
            InodeKind::File => {}
        }

        let index = self.data_index(inode.pointer(slot).ok_or(Error::InvalidOffset(offset))?)?;
        self.data[index][..nbytes as usize].copy_from_slice(&data[..nbytes as usize]);
        let size = &mut self.inodes[inum as usize].size;
        *size = size.saturating_add(nbytes);
        Ok(())
    }

    /// The whole block holding `offset`; callers consume the first `nbytes`.
    pub fn read(&self, inum: InodePointer, offset: i32, nbytes: i32) -> Result<&[u8]> {
        let slot = check_transfer(offset, nbytes)?;
        let inode = self.inode(inum)?;
        if !inode.is_used() {
            return Err(Error::NotFound);
        }
        self.block(inode.pointer(slot).ok_or(Error::InvalidOffset(offset))?)
    }

    /// Writes bitmaps, inode table and data region back to the image and syncs it.
    pub fn flush(&mut self) -> Result<()> {
        let superblock = self.superblock;
        self.device.write_block(superblock.inode_bitmap_block(), &self.inode_map.to_block())?;
        self.device.write_block(superblock.data_bitmap_block(), &self.data_map.to_block())?;
        debug!("bitmaps saved");

        for (i, chunk) in self.inodes.chunks(INODES_PER_BLOCK).enumerate() {
            self.device.write_block(superblock.inode_region_block(i), &pack_inodes(chunk))?;
        }
        debug!("inode table saved");

        for (i, block) in self.data.iter().enumerate() {
            self.device.write_block(superblock.data_region_block(i), block)?;
        }
        debug!("data blocks saved");

        self.device.sync()?;
        info!("image flushed");
        Ok(())
    }

    pub fn into_device(self) -> A {
        self.device
    }

    fn inode(&self, inum: InodePointer) -> Result<&Inode> {
        usize::try_from(inum)
            .ok()
            .and_then(|i| self.inodes.get(i))
            .ok_or(Error::InvalidInode(inum))
    }

    fn directory(&self, inum: InodePointer) -> Result<&Inode> {
        let inode = self.inode(inum)?;
        if inode.kind != InodeKind::Directory {
            return Err(Error::NotADirectory(inum));
        }
        Ok(inode)
    }

    /// Maps an absolute block address onto an index into the data region.
    fn data_index(&self, pointer: BlockPointer) -> Result<usize> {
        let start = self.superblock.data_region_addr as u64;
        let pointer_addr = pointer as u64;
        if pointer_addr < start || pointer_addr >= start + self.data.len() as u64 {
            return Err(Error::BlockOutOfRange(pointer));
        }
        Ok((pointer_addr - start) as usize)
    }

    fn block(&self, pointer: BlockPointer) -> Result<&[u8]> {
        Ok(&self.data[self.data_index(pointer)?])
    }
}

/// Validates a read/write request and returns the direct slot it targets.
pub(crate) fn check_transfer(offset: i32, nbytes: i32) -> Result<usize> {
    if !(0..=BLOCK_SIZE as i32).contains(&nbytes) {
        return Err(Error::InvalidLength(nbytes));
    }
    if offset < 0 || offset as usize / BLOCK_SIZE >= DIRECT_POINTERS {
        return Err(Error::InvalidOffset(offset));
    }
    Ok(offset as usize / BLOCK_SIZE)
}

fn pack_inodes(inodes: &[Inode]) -> Vec<u8> {
    let mut block = Vec::with_capacity(BLOCK_SIZE);
    for inode in inodes {
        block.extend_from_slice(&inode.to_bytes());
    }
    block.resize(BLOCK_SIZE, 0);
    block
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::{Stat, FS};
    use crate::consts::{BLOCK_SIZE, DIRECT_POINTERS, DIR_ENTRY_SIZE, ENTRIES_PER_BLOCK};
    use crate::driver::file_drive::FileDrive;
    use crate::structure::inode::InodeKind;
    use crate::structure::superblock::SuperBlock;
    use crate::util::error::Error;

    fn format(dir: &TempDir, num_inodes: i32, num_data: i32) -> FS<FileDrive> {
        let blocks = SuperBlock::new(num_inodes, num_data).total_blocks();
        let drive = FileDrive::create(dir.path().join("fs.img"), blocks).unwrap();
        FS::format(drive, num_inodes, num_data).unwrap()
    }

    #[test]
    fn init() {
        let dir = TempDir::new().unwrap();
        let fs = format(&dir, 32, 32);
        assert_eq!(*fs.superblock(), SuperBlock::new(32, 32));
        assert_eq!(fs.stat(0).unwrap(), Stat { size: 2 * DIR_ENTRY_SIZE as i32, kind: InodeKind::Directory });
        assert_eq!(fs.lookup(0, ".").unwrap(), 0);
        assert_eq!(fs.lookup(0, "..").unwrap(), 0);
    }

    #[test]
    fn file_lifecycle() {
        let dir = TempDir::new().unwrap();
        let mut fs = format(&dir, 32, 64);

        let inum = fs.create(0, InodeKind::File, "a.txt").unwrap();
        assert_eq!(inum, 1);
        assert_eq!(fs.lookup(0, "a.txt").unwrap(), 1);
        assert_eq!(fs.stat(1).unwrap(), Stat { size: 0, kind: InodeKind::File });
        assert_eq!(fs.stat(0).unwrap().size, 3 * DIR_ENTRY_SIZE as i32);

        fs.write(1, b"hello", 0, 5).unwrap();
        assert_eq!(&fs.read(1, 0, 5).unwrap()[..5], b"hello");
        assert_eq!(fs.read(1, 0, 5).unwrap().len(), BLOCK_SIZE);
        assert_eq!(fs.stat(1).unwrap().size, 5);

        fs.unlink(0, "a.txt").unwrap();
        assert!(matches!(fs.lookup(0, "a.txt"), Err(Error::NotFound)));
        assert_eq!(fs.stat(1).unwrap().kind, InodeKind::Unused);
        assert_eq!(fs.stat(0).unwrap().size, 2 * DIR_ENTRY_SIZE as i32);
    }

    #[test]
    fn directory_entries() {
        let dir = TempDir::new().unwrap();
        let mut fs = format(&dir, 32, 64);
        fs.create(0, InodeKind::File, "a.txt").unwrap();

        let sub = fs.create(0, InodeKind::Directory, "sub").unwrap();
        assert_eq!(sub, 2);
        assert_eq!(fs.lookup(2, ".").unwrap(), 2);
        assert_eq!(fs.lookup(2, "..").unwrap(), 0);
        assert_eq!(fs.stat(2).unwrap(), Stat { size: 2 * DIR_ENTRY_SIZE as i32, kind: InodeKind::Directory });

        let nested = fs.create(sub, InodeKind::File, "inner").unwrap();
        assert_eq!(fs.lookup(sub, "inner").unwrap(), nested);
        assert!(matches!(fs.lookup(0, "inner"), Err(Error::NotFound)));
    }

    #[test]
    fn unlink_non_empty_directory() {
        let dir = TempDir::new().unwrap();
        let mut fs = format(&dir, 32, 64);
        let sub = fs.create(0, InodeKind::Directory, "sub").unwrap();
        fs.create(sub, InodeKind::File, "keep").unwrap();

        let before = fs.stat(sub).unwrap();
        assert!(matches!(fs.unlink(0, "sub"), Err(Error::DirectoryNotEmpty(_))));
        assert_eq!(fs.stat(sub).unwrap(), before);
        assert_eq!(fs.lookup(0, "sub").unwrap(), sub);

        fs.unlink(sub, "keep").unwrap();
        fs.unlink(0, "sub").unwrap();
        assert!(matches!(fs.lookup(0, "sub"), Err(Error::NotFound)));
        assert_eq!(fs.stat(sub).unwrap().kind, InodeKind::Unused);
    }

    #[test]
    fn create_validation() {
        let dir = TempDir::new().unwrap();
        let mut fs = format(&dir, 32, 64);
        let file = fs.create(0, InodeKind::File, "f").unwrap();

        assert!(matches!(fs.create(0, InodeKind::File, &"n".repeat(28)), Err(Error::NameTooLong(28))));
        assert!(matches!(fs.create(32, InodeKind::File, "x"), Err(Error::InvalidInode(32))));
        assert!(matches!(fs.create(-1, InodeKind::File, "x"), Err(Error::InvalidInode(-1))));
        assert!(matches!(fs.create(file, InodeKind::File, "x"), Err(Error::NotADirectory(_))));
        assert!(matches!(fs.create(0, InodeKind::File, "f"), Err(Error::AlreadyExists)));
        assert!(matches!(fs.create(0, InodeKind::Unused, "u"), Err(Error::InvalidType(-1))));
        assert!(fs.create(0, InodeKind::File, &"n".repeat(27)).is_ok());
    }

    #[test]
    fn missing_targets_are_not_found() {
        let dir = TempDir::new().unwrap();
        let mut fs = format(&dir, 32, 64);
        let file = fs.create(0, InodeKind::File, "f").unwrap();

        assert!(matches!(fs.lookup(32, "f"), Err(Error::NotFound)));
        assert!(matches!(fs.lookup(-3, "f"), Err(Error::NotFound)));
        assert!(matches!(fs.lookup(file, "."), Err(Error::NotFound)));
        assert!(matches!(fs.stat(32), Err(Error::NotFound)));
        assert!(matches!(fs.stat(-1), Err(Error::NotFound)));
        assert_eq!(fs.stat(31).unwrap().kind, InodeKind::Unused);
    }

    #[test]
    fn allocation_is_unique_until_freed() {
        let dir = TempDir::new().unwrap();
        let mut fs = format(&dir, 8, 256);
        let mut seen = Vec::new();
        for i in 0..7 {
            let inum = fs.create(0, InodeKind::File, &format!("f{}", i)).unwrap();
            assert!(!seen.contains(&inum));
            seen.push(inum);
        }
        assert!(matches!(fs.create(0, InodeKind::File, "full"), Err(Error::NoFreeInodes)));

        fs.unlink(0, "f3").unwrap();
        assert_eq!(fs.create(0, InodeKind::File, "again").unwrap(), seen[3]);
    }

    #[test]
    fn create_is_all_or_nothing() {
        let dir = TempDir::new().unwrap();
        // root takes one block, leaving fewer than a file needs
        let mut fs = format(&dir, 32, DIRECT_POINTERS as i32);
        let root = fs.stat(0).unwrap();
        assert!(matches!(fs.create(0, InodeKind::File, "big"), Err(Error::NoFreeBlocks)));
        assert_eq!(fs.stat(0).unwrap(), root);
        assert!(matches!(fs.lookup(0, "big"), Err(Error::NotFound)));
        assert_eq!(fs.create(0, InodeKind::Directory, "small").unwrap(), 1);
    }

    #[test]
    fn directory_capacity() {
        let dir = TempDir::new().unwrap();
        let mut fs = format(&dir, 256, 256);
        for i in 0..ENTRIES_PER_BLOCK - 2 {
            fs.create(0, InodeKind::Directory, &format!("d{}", i)).unwrap();
        }
        assert!(matches!(fs.create(0, InodeKind::Directory, "overflow"), Err(Error::DirectoryFull(0))));
    }

    #[test]
    fn write_read_validation() {
        let dir = TempDir::new().unwrap();
        let mut fs = format(&dir, 32, 64);
        let file = fs.create(0, InodeKind::File, "f").unwrap();
        let data = vec![7u8; BLOCK_SIZE];

        assert!(matches!(fs.write(file, &data, 0, -1), Err(Error::InvalidLength(-1))));
        assert!(matches!(fs.write(file, &data, 0, BLOCK_SIZE as i32 + 1), Err(Error::InvalidLength(_))));
        let past_end = (DIRECT_POINTERS * BLOCK_SIZE) as i32;
        assert!(matches!(fs.write(file, &data, past_end, 1), Err(Error::InvalidOffset(_))));
        assert!(matches!(fs.write(0, &data, 0, 1), Err(Error::IsADirectory(0))));
        assert!(matches!(fs.write(99, &data, 0, 1), Err(Error::InvalidInode(99))));
        assert!(matches!(fs.read(file, past_end, 1), Err(Error::InvalidOffset(_))));
        assert!(matches!(fs.read(file, 0, -3), Err(Error::InvalidLength(-3))));
        assert!(matches!(fs.read(5, 0, 1), Err(Error::NotFound)));
        assert_eq!(fs.stat(file).unwrap().size, 0);

        let last = ((DIRECT_POINTERS - 1) * BLOCK_SIZE) as i32;
        fs.write(file, &data, last, BLOCK_SIZE as i32).unwrap();
        assert_eq!(fs.read(file, last, BLOCK_SIZE as i32).unwrap(), &data[..]);
        assert_eq!(fs.read(file, 0, 1).unwrap()[0], 0);
    }

    #[test]
    fn size_counts_every_write() {
        let dir = TempDir::new().unwrap();
        let mut fs = format(&dir, 32, 64);
        let file = fs.create(0, InodeKind::File, "f").unwrap();
        fs.write(file, b"abc", 0, 3).unwrap();
        fs.write(file, b"xyz", 0, 3).unwrap();
        assert_eq!(fs.stat(file).unwrap().size, 6);
        assert_eq!(&fs.read(file, 0, 3).unwrap()[..3], b"xyz");
    }

    #[test]
    fn unlink_validation() {
        let dir = TempDir::new().unwrap();
        let mut fs = format(&dir, 32, 64);
        let file = fs.create(0, InodeKind::File, "f").unwrap();
        assert!(matches!(fs.unlink(40, "f"), Err(Error::InvalidInode(40))));
        assert!(matches!(fs.unlink(file, "f"), Err(Error::NotADirectory(_))));
        assert!(matches!(fs.unlink(0, ".."), Err(Error::InvalidName)));
        fs.unlink(0, "missing").unwrap();
        assert_eq!(fs.lookup(0, "f").unwrap(), file);
    }

    #[test]
    fn freed_blocks_are_reused_clean() {
        let dir = TempDir::new().unwrap();
        let mut fs = format(&dir, 32, DIRECT_POINTERS as i32 + 1);
        let file = fs.create(0, InodeKind::File, "one").unwrap();
        fs.write(file, b"secret", 0, 6).unwrap();
        fs.unlink(0, "one").unwrap();

        let file = fs.create(0, InodeKind::File, "two").unwrap();
        assert!(fs.read(file, 0, 6).unwrap().iter().all(|&b| b == 0));
    }

    #[test]
    fn flush_and_remount() {
        let dir = TempDir::new().unwrap();
        let mut fs = format(&dir, 32, 64);
        let sub = fs.create(0, InodeKind::Directory, "sub").unwrap();
        let file = fs.create(sub, InodeKind::File, "data").unwrap();
        fs.write(file, b"persisted", BLOCK_SIZE as i32, 9).unwrap();
        fs.flush().unwrap();

        let fs = FS::mount(fs.into_device()).unwrap();
        assert_eq!(fs.lookup(0, "sub").unwrap(), sub);
        assert_eq!(fs.lookup(sub, "data").unwrap(), file);
        assert_eq!(fs.stat(file).unwrap(), Stat { size: 9, kind: InodeKind::File });
        assert_eq!(&fs.read(file, BLOCK_SIZE as i32, 9).unwrap()[..9], b"persisted");
    }

    #[test]
    fn unflushed_changes_are_lost() {
        let dir = TempDir::new().unwrap();
        let mut fs = format(&dir, 32, 64);
        fs.create(0, InodeKind::File, "volatile").unwrap();

        let fs = FS::mount(fs.into_device()).unwrap();
        assert!(matches!(fs.lookup(0, "volatile"), Err(Error::NotFound)));
    }

    #[test]
    fn format_rejects_small_image() {
        let dir = TempDir::new().unwrap();
        let drive = FileDrive::create(dir.path().join("tiny.img"), 4).unwrap();
        assert!(matches!(FS::format(drive, 32, 32), Err(Error::CorruptImage(_))));
    }
}
