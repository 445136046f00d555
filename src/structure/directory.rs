use crate::consts::{InodePointer, BLOCK_SIZE, DIR_ENTRY_SIZE, ENTRIES_PER_BLOCK, FREE_ENTRY, MAX_NAME_LENGTH, NAME_LENGTH};
use crate::util::error::{Error, Result};
use crate::util::serializable::{read_i32, ByteSerializable, KnownSize};

pub type FileName = [u8; NAME_LENGTH];

/// Encodes `name` into the NUL-padded on-disk form.
pub fn encode_name(name: &str) -> Result<FileName> {
    if name.len() > MAX_NAME_LENGTH {
        return Err(Error::NameTooLong(name.len()));
    }
    if name.is_empty() || name.bytes().any(|b| b == 0 || b == b'/') {
        return Err(Error::InvalidName);
    }
    let mut encoded = [0u8; NAME_LENGTH];
    encoded[..name.len()].copy_from_slice(name.as_bytes());
    Ok(encoded)
}

/// Bytes up to the first NUL.
pub fn decode_name(name: &FileName) -> &[u8] {
    let end = name.iter().position(|&b| b == 0).unwrap_or(NAME_LENGTH);
    &name[..end]
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct DirEntry {
    pub name: FileName,
    pub inum: InodePointer,
}

impl DirEntry {
    pub fn free() -> DirEntry {
        DirEntry { name: [0; NAME_LENGTH], inum: FREE_ENTRY }
    }

    pub fn new(name: FileName, inum: InodePointer) -> DirEntry {
        DirEntry { name, inum }
    }

    pub fn is_free(&self) -> bool {
        self.inum == FREE_ENTRY
    }

    pub fn name_bytes(&self) -> &[u8] {
        decode_name(&self.name)
    }

    pub fn name_lossy(&self) -> String {
        String::from_utf8_lossy(self.name_bytes()).into_owned()
    }
}

impl ByteSerializable for DirEntry {
    fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(DIR_ENTRY_SIZE);
        bytes.extend_from_slice(&self.name);
        bytes.extend_from_slice(&self.inum.to_le_bytes());
        bytes
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < DIR_ENTRY_SIZE {
            return Err(Error::CorruptImage("directory entry truncated".to_string()));
        }
        let mut name = [0u8; NAME_LENGTH];
        name.copy_from_slice(&bytes[..NAME_LENGTH]);
        Ok(DirEntry { name, inum: read_i32(bytes, NAME_LENGTH) })
    }
}

impl KnownSize for DirEntry {
    fn size_on_disk() -> usize {
        DIR_ENTRY_SIZE
    }
}

/// View of a data block as an array of directory entries.
pub struct DirectoryBlock<'a> {
    block: &'a mut [u8],
}

impl<'a> DirectoryBlock<'a> {
    pub fn new(block: &'a mut [u8]) -> DirectoryBlock<'a> {
        assert_eq!(block.len(), BLOCK_SIZE);
        DirectoryBlock { block }
    }

    /// Writes "." and ".." into the first two slots and frees all others.
    pub fn init(&mut self, own: InodePointer, parent: InodePointer) {
        for slot in 0..ENTRIES_PER_BLOCK {
            self.set(slot, &DirEntry::free());
        }
        let mut dot = [0u8; NAME_LENGTH];
        dot[0] = b'.';
        let mut dot_dot = [0u8; NAME_LENGTH];
        dot_dot[..2].copy_from_slice(b"..");
        self.set(0, &DirEntry::new(dot, own));
        self.set(1, &DirEntry::new(dot_dot, parent));
    }

    pub fn set(&mut self, slot: usize, entry: &DirEntry) {
        let offset = slot * DIR_ENTRY_SIZE;
        self.block[offset..offset + DIR_ENTRY_SIZE].copy_from_slice(&entry.to_bytes());
    }

    pub fn find(&self, name: &[u8]) -> Option<(usize, DirEntry)> {
        entries(self.block).find(|(_, entry)| !entry.is_free() && entry.name_bytes() == name)
    }

    pub fn find_free(&self) -> Option<usize> {
        entries(self.block).find(|(_, entry)| entry.is_free()).map(|(slot, _)| slot)
    }
}

/// All entry slots of a directory block, free ones included.
pub fn entries(block: &[u8]) -> impl Iterator<Item = (usize, DirEntry)> + '_ {
    block.chunks_exact(DIR_ENTRY_SIZE).enumerate().map(|(slot, chunk)| {
        let mut name = [0u8; NAME_LENGTH];
        name.copy_from_slice(&chunk[..NAME_LENGTH]);
        (slot, DirEntry { name, inum: read_i32(chunk, NAME_LENGTH) })
    })
}
