pub const BLOCK_SIZE: usize = 4096;
pub const DIRECT_POINTERS: usize = 30;

/// Size of the on-disk name field, including the terminating NUL.
pub const NAME_LENGTH: usize = 28;
pub const MAX_NAME_LENGTH: usize = NAME_LENGTH - 1;

pub const DIR_ENTRY_SIZE: usize = 32;
pub const ENTRIES_PER_BLOCK: usize = BLOCK_SIZE / DIR_ENTRY_SIZE;

pub const INODE_SIZE: usize = 128;
pub const INODES_PER_BLOCK: usize = BLOCK_SIZE / INODE_SIZE;

pub const SUPERBLOCK_ADDR: BlockPointer = 0;
pub const ROOT_INODE: InodePointer = 0;

pub const UNUSED_POINTER: BlockPointer = u32::MAX;
pub const FREE_ENTRY: InodePointer = -1;

/// Absolute block address inside the image.
pub type BlockPointer = u32;
/// Inode number as carried on disk and on the wire; -1 marks "none".
pub type InodePointer = i32;
pub type DirectPointers = [BlockPointer; DIRECT_POINTERS];
pub type Block = Vec<u8>;
