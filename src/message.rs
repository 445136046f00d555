//! Fixed-layout request/response record exchanged between client and server.
//!
//! Every datagram carries exactly one message of [`MESSAGE_SIZE`] bytes:
//!
//! ```text
//! op | rc | inum | nbytes | type | offset   (i32 little-endian each)
//! name[28]                                  (NUL padded)
//! buffer[4096]                              (one block of payload)
//! ```

use std::fmt;

use crate::consts::{InodePointer, BLOCK_SIZE, NAME_LENGTH};
use crate::structure::directory::{decode_name, encode_name, FileName};
use crate::util::error::{Error, Result};
use crate::util::serializable::{read_i32, ByteSerializable, KnownSize};

const HEADER_SIZE: usize = 6 * 4;
pub const MESSAGE_SIZE: usize = HEADER_SIZE + NAME_LENGTH + BLOCK_SIZE;

pub const RC_OK: i32 = 0;
pub const RC_ERROR: i32 = -1;

#[repr(i32)]
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum OpCode {
    Init = 1,
    Lookup = 2,
    Stat = 3,
    Write = 4,
    Read = 5,
    Create = 6,
    Unlink = 7,
    Shutdown = 8,
}

impl TryFrom<i32> for OpCode {
    type Error = Error;

    fn try_from(code: i32) -> Result<Self> {
        Ok(match code {
            1 => OpCode::Init,
            2 => OpCode::Lookup,
            3 => OpCode::Stat,
            4 => OpCode::Write,
            5 => OpCode::Read,
            6 => OpCode::Create,
            7 => OpCode::Unlink,
            8 => OpCode::Shutdown,
            other => return Err(Error::UnknownOperation(other)),
        })
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct Message {
    pub op: OpCode,
    pub rc: i32,
    pub inum: InodePointer,
    pub nbytes: i32,
    pub kind: i32,
    pub offset: i32,
    name: FileName,
    buffer: Vec<u8>,
}

impl Message {
    pub fn request(op: OpCode) -> Message {
        Message {
            op,
            rc: RC_OK,
            inum: 0,
            nbytes: 0,
            kind: 0,
            offset: 0,
            name: [0; NAME_LENGTH],
            buffer: vec![0; BLOCK_SIZE],
        }
    }

    /// An empty response echoing the request's operation code.
    /// Successful reply echoing the request's header and name. The payload
    /// starts out zeroed.
    pub fn reply_to(request: &Message) -> Message {
        Message {
            inum: request.inum,
            nbytes: request.nbytes,
            offset: request.offset,
            name: request.name,
            ..Message::request(request.op)
        }
    }

    /// Whether `self` is the reply to `request`, judged by the fields the
    /// server echoes back for each op.
    pub fn answers(&self, request: &Message) -> bool {
        if self.op != request.op {
            return false;
        }
        match self.op {
            OpCode::Init | OpCode::Shutdown => true,
            OpCode::Lookup | OpCode::Create | OpCode::Unlink => self.name == request.name,
            OpCode::Stat => self.inum == request.inum,
            OpCode::Read | OpCode::Write => {
                self.inum == request.inum && self.offset == request.offset && self.nbytes == request.nbytes
            }
        }
    }

    pub fn with_name(mut self, name: &str) -> Result<Message> {
        self.name = encode_name(name)?;
        Ok(self)
    }

    pub fn name(&self) -> Result<&str> {
        std::str::from_utf8(decode_name(&self.name)).map_err(|_| Error::InvalidName)
    }

    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    /// Copies `data` into the start of the payload; the rest is zeroed.
    pub fn set_buffer(&mut self, data: &[u8]) {
        let len = data.len().min(BLOCK_SIZE);
        self.buffer[..len].copy_from_slice(&data[..len]);
        self.buffer[len..].fill(0);
    }

    pub fn is_ok(&self) -> bool {
        self.rc == RC_OK
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("op", &self.op)
            .field("rc", &self.rc)
            .field("inum", &self.inum)
            .field("nbytes", &self.nbytes)
            .field("type", &self.kind)
            .field("offset", &self.offset)
            .field("name", &String::from_utf8_lossy(decode_name(&self.name)))
            .finish()
    }
}

impl ByteSerializable for Message {
    fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(MESSAGE_SIZE);
        for field in [self.op as i32, self.rc, self.inum, self.nbytes, self.kind, self.offset] {
            bytes.extend_from_slice(&field.to_le_bytes());
        }
        bytes.extend_from_slice(&self.name);
        bytes.extend_from_slice(&self.buffer);
        bytes
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != MESSAGE_SIZE {
            return Err(Error::MalformedMessage(format!(
                "expected {} bytes, got {}",
                MESSAGE_SIZE,
                bytes.len()
            )));
        }
        let op = OpCode::try_from(read_i32(bytes, 0))?;
        let mut name = [0u8; NAME_LENGTH];
        name.copy_from_slice(&bytes[HEADER_SIZE..HEADER_SIZE + NAME_LENGTH]);
        Ok(Message {
            op,
            rc: read_i32(bytes, 4),
            inum: read_i32(bytes, 8),
            nbytes: read_i32(bytes, 12),
            kind: read_i32(bytes, 16),
            offset: read_i32(bytes, 20),
            name,
            buffer: bytes[HEADER_SIZE + NAME_LENGTH..].to_vec(),
        })
    }
}

impl KnownSize for Message {
    fn size_on_disk() -> usize {
        MESSAGE_SIZE
    }
}
