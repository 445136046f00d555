//! mfs: a block-based file system served over UDP.
//!
//! The server ([`server::Server`]) owns one storage engine ([`fs::FS`]) loaded
//! from a disk image and answers fixed-size [`message::Message`] datagrams one
//! at a time. The client ([`client::MfsClient`]) turns each operation into a
//! single request and resends it until a reply arrives or its retry budget is
//! spent.

pub mod client;
pub mod consts;
pub mod driver;
pub mod fs;
#[cfg(feature = "fuse")]
pub mod fuse;
pub mod message;
pub mod server;
pub mod structure;
pub mod util;

pub use client::{ClientConfig, MfsClient};
pub use fs::{Stat, FS};
pub use structure::inode::InodeKind;
pub use util::error::{Error, Result};
