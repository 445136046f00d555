pub mod bitmap;
pub mod directory;
pub mod inode;
pub mod superblock;
