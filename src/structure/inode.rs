use crate::consts::{BlockPointer, DirectPointers, DIRECT_POINTERS, DIR_ENTRY_SIZE, INODE_SIZE, UNUSED_POINTER};
use crate::util::error::{Error, Result};
use crate::util::serializable::{read_i32, read_u32, ByteSerializable, KnownSize};

const EMPTY_POINTERS: DirectPointers = [UNUSED_POINTER; DIRECT_POINTERS];

#[repr(i32)]
#[derive(PartialEq, Eq, Debug, Copy, Clone)]
pub enum InodeKind {
    Unused = -1,
    Directory = 0,
    File = 1,
}

impl InodeKind {
    pub fn code(self) -> i32 {
        self as i32
    }
}

impl TryFrom<i32> for InodeKind {
    type Error = Error;

    fn try_from(code: i32) -> Result<Self> {
        match code {
            -1 => Ok(InodeKind::Unused),
            0 => Ok(InodeKind::Directory),
            1 => Ok(InodeKind::File),
            other => Err(Error::InvalidType(other)),
        }
    }
}

#[derive(PartialEq, Eq, Debug, Copy, Clone)]
pub struct Inode {
    pub kind: InodeKind,
    pub size: i32,
    pub(crate) pointers: DirectPointers,
}

impl Inode {
    pub fn unused() -> Inode {
        Inode { kind: InodeKind::Unused, size: 0, pointers: EMPTY_POINTERS }
    }

    pub fn new_directory(block: BlockPointer) -> Inode {
        let mut pointers = EMPTY_POINTERS;
        pointers[0] = block;
        Inode { kind: InodeKind::Directory, size: 2 * DIR_ENTRY_SIZE as i32, pointers }
    }

    pub fn new_file(pointers: DirectPointers) -> Inode {
        Inode { kind: InodeKind::File, size: 0, pointers }
    }

    pub fn is_used(&self) -> bool {
        self.kind != InodeKind::Unused
    }

    pub fn pointer(&self, slot: usize) -> Option<BlockPointer> {
        match self.pointers.get(slot) {
            Some(&pointer) if pointer != UNUSED_POINTER => Some(pointer),
            _ => None,
        }
    }

    /// Allocated direct pointers, in slot order.
    pub fn used_pointers(&self) -> impl Iterator<Item = BlockPointer> + '_ {
        self.pointers.iter().copied().filter(|&p| p != UNUSED_POINTER)
    }
}

impl ByteSerializable for Inode {
    fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::<u8>::with_capacity(INODE_SIZE);
        bytes.extend_from_slice(&self.kind.code().to_le_bytes());
        bytes.extend_from_slice(&self.size.to_le_bytes());
        for pointer in self.pointers {
            bytes.extend_from_slice(&pointer.to_le_bytes());
        }
        bytes
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < INODE_SIZE {
            return Err(Error::CorruptImage("inode record truncated".to_string()));
        }
        let kind = InodeKind::try_from(read_i32(bytes, 0))
            .map_err(|_| Error::CorruptImage(format!("bad inode type {}", read_i32(bytes, 0))))?;
        let size = read_i32(bytes, 4);
        let mut pointers = EMPTY_POINTERS;
        for (i, pointer) in pointers.iter_mut().enumerate() {
            *pointer = read_u32(bytes, 8 + i * 4);
        }
        Ok(Inode { kind, size, pointers })
    }
}

impl KnownSize for Inode {
    #[inline]
    fn size_on_disk() -> usize {
        INODE_SIZE
    }
}
