use std::io;
use std::os::raw::c_int;

use thiserror::Error;

use crate::consts::{BlockPointer, InodePointer};
use crate::message::OpCode;

type ErrorNum = c_int;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("inode {0} is out of range")]
    InvalidInode(InodePointer),
    #[error("no such entry")]
    NotFound,
    #[error("inode {0} is not a directory")]
    NotADirectory(InodePointer),
    #[error("inode {0} is a directory")]
    IsADirectory(InodePointer),
    #[error("name is {0} bytes long, the limit is 27")]
    NameTooLong(usize),
    #[error("invalid entry name")]
    InvalidName,
    #[error("invalid inode type {0}")]
    InvalidType(i32),
    #[error("an entry with this name already exists")]
    AlreadyExists,
    #[error("directory {0} has no free entry slot")]
    DirectoryFull(InodePointer),
    #[error("directory {0} is not empty")]
    DirectoryNotEmpty(InodePointer),
    #[error("no free inodes left")]
    NoFreeInodes,
    #[error("no free data blocks left")]
    NoFreeBlocks,
    #[error("invalid transfer length {0}")]
    InvalidLength(i32),
    #[error("offset {0} is outside the direct pointer range")]
    InvalidOffset(i32),
    #[error("block {0} is outside the data region")]
    BlockOutOfRange(BlockPointer),
    #[error("corrupt image: {0}")]
    CorruptImage(String),
    #[error("malformed message: {0}")]
    MalformedMessage(String),
    #[error("unknown operation code {0}")]
    UnknownOperation(i32),
    #[error("server rejected {0:?}")]
    Rejected(OpCode),
    #[error("no reply after {attempts} attempts")]
    Timeout { attempts: u32 },
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    pub fn errno(&self) -> ErrorNum {
        match self {
            Error::InvalidInode(_) | Error::NotFound => libc::ENOENT,
            Error::NotADirectory(_) => libc::ENOTDIR,
            Error::IsADirectory(_) => libc::EISDIR,
            Error::NameTooLong(_) => libc::ENAMETOOLONG,
            Error::InvalidName
            | Error::InvalidType(_)
            | Error::InvalidLength(_)
            | Error::InvalidOffset(_) => libc::EINVAL,
            Error::AlreadyExists => libc::EEXIST,
            Error::DirectoryNotEmpty(_) => libc::ENOTEMPTY,
            Error::DirectoryFull(_) | Error::NoFreeInodes | Error::NoFreeBlocks => libc::ENOSPC,
            Error::Timeout { .. } => libc::ETIMEDOUT,
            Error::UnknownOperation(_) => libc::EOPNOTSUPP,
            Error::Io(e) => e.raw_os_error().unwrap_or(libc::EIO),
            Error::BlockOutOfRange(_)
            | Error::CorruptImage(_)
            | Error::MalformedMessage(_)
            | Error::Rejected(_) => libc::EIO,
        }
    }
}
