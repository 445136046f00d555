//! Kernel mount of a remote image. Each FUSE callback becomes one or more
//! client requests; FUSE inode numbers are the server's inode numbers plus one.

mod filesystem;

pub use filesystem::FuseDriver;
