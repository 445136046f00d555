//! Client stub: one request message per operation, driven through a
//! resend-on-timeout loop over UDP.

use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::Duration;

use log::debug;

use crate::consts::InodePointer;
use crate::fs::{check_transfer, Stat};
use crate::message::{Message, OpCode, MESSAGE_SIZE};
use crate::structure::inode::InodeKind;
use crate::util::error::{Error, Result};
use crate::util::serializable::ByteSerializable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientConfig {
    /// How long to wait for a reply before resending.
    pub timeout: Duration,
    /// Total number of sends per request.
    pub max_attempts: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig { timeout: Duration::from_secs(2), max_attempts: 5 }
    }
}

pub struct MfsClient {
    socket: UdpSocket,
    server: SocketAddr,
    config: ClientConfig,
}

impl MfsClient {
    pub fn connect(host: &str, port: u16) -> Result<MfsClient> {
        MfsClient::with_config(host, port, ClientConfig::default())
    }

    pub fn with_config(host: &str, port: u16, config: ClientConfig) -> Result<MfsClient> {
        if config.max_attempts == 0 || config.timeout.is_zero() {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                "retry policy needs at least one attempt and a non-zero timeout",
            )));
        }
        let server = (host, port).to_socket_addrs()?.next().ok_or_else(|| {
            Error::Io(io::Error::new(io::ErrorKind::NotFound, format!("cannot resolve {}", host)))
        })?;
        let local: SocketAddr = if server.is_ipv4() { ([0, 0, 0, 0], 0).into() } else { ([0u16; 8], 0).into() };
        let socket = UdpSocket::bind(local)?;
        socket.set_read_timeout(Some(config.timeout))?;
        debug!("client bound to {}, server {}", socket.local_addr()?, server);
        Ok(MfsClient { socket, server, config })
    }

    pub fn server_addr(&self) -> SocketAddr {
        self.server
    }

    /// Round-trips an Init message.
    pub fn ping(&self) -> Result<()> {
        self.call(&Message::request(OpCode::Init)).map(|_| ())
    }

    /// Inode of `name` in `parent`; any server-side failure reads as `NotFound`.
    pub fn lookup(&self, parent: InodePointer, name: &str) -> Result<InodePointer> {
        let mut request = Message::request(OpCode::Lookup).with_name(name)?;
        request.inum = parent;
        match self.call(&request) {
            Ok(reply) => Ok(reply.inum),
            Err(Error::Rejected(_)) => Err(Error::NotFound),
            Err(e) => Err(e),
        }
    }

    /// Stat of `inum`; an unused inode reports [`InodeKind::Unused`].
    pub fn stat(&self, inum: InodePointer) -> Result<Stat> {
        let mut request = Message::request(OpCode::Stat);
        request.inum = inum;
        let reply = self.call(&request)?;
        let kind = InodeKind::try_from(reply.kind)
            .map_err(|_| Error::MalformedMessage(format!("unknown inode type {}", reply.kind)))?;
        Ok(Stat { size: reply.nbytes, kind })
    }

    pub fn write(&self, inum: InodePointer, data: &[u8], offset: i32, nbytes: i32) -> Result<()> {
        check_transfer(offset, nbytes)?;
        if data.len() < nbytes as usize {
            return Err(Error::InvalidLength(nbytes));
        }
        let mut request = Message::request(OpCode::Write);
        request.inum = inum;
        request.offset = offset;
        request.nbytes = nbytes;
        request.set_buffer(&data[..nbytes as usize]);
        self.call(&request).map(|_| ())
    }

    /// The full block holding `offset`; only the first `nbytes` are meaningful.
    pub fn read(&self, inum: InodePointer, offset: i32, nbytes: i32) -> Result<Vec<u8>> {
        check_transfer(offset, nbytes)?;
        let mut request = Message::request(OpCode::Read);
        request.inum = inum;
        request.offset = offset;
        request.nbytes = nbytes;
        Ok(self.call(&request)?.buffer().to_vec())
    }

    pub fn create(&self, parent: InodePointer, kind: InodeKind, name: &str) -> Result<InodePointer> {
        let mut request = Message::request(OpCode::Create).with_name(name)?;
        request.inum = parent;
        request.kind = kind.code();
        Ok(self.call(&request)?.inum)
    }

    pub fn unlink(&self, parent: InodePointer, name: &str) -> Result<()> {
        let mut request = Message::request(OpCode::Unlink).with_name(name)?;
        request.inum = parent;
        self.call(&request).map(|_| ())
    }

    /// Asks the server to persist its image and exit.
    pub fn shutdown(&self) -> Result<()> {
        self.call(&Message::request(OpCode::Shutdown)).map(|_| ())
    }

    fn call(&self, request: &Message) -> Result<Message> {
        let reply = self.send_request(request)?;
        if !reply.is_ok() {
            return Err(Error::Rejected(request.op));
        }
        Ok(reply)
    }

    /// Sends `request` and waits for the matching reply, resending after each
    /// timeout. The reply is returned as received, whatever its rc.
    pub fn send_request(&self, request: &Message) -> Result<Message> {
        let bytes = request.to_bytes();
        let mut buffer = vec![0u8; MESSAGE_SIZE + 1];
        self.discard_pending(&mut buffer)?;

        for attempt in 1..=self.config.max_attempts {
            debug!("sending {:?} (attempt {}/{})", request, attempt, self.config.max_attempts);
            if let Err(e) = self.socket.send_to(&bytes, self.server) {
                debug!("send failed: {}", e);
                continue;
            }
            if let Some(reply) = self.wait_for_reply(request, &mut buffer)? {
                return Ok(reply);
            }
        }
        Err(Error::Timeout { attempts: self.config.max_attempts })
    }

    /// Drops datagrams still queued from earlier calls, such as second
    /// answers to a resent request.
    fn discard_pending(&self, buffer: &mut [u8]) -> Result<()> {
        self.socket.set_nonblocking(true)?;
        let drained = loop {
            match self.socket.recv_from(buffer) {
                Ok((len, from)) => debug!("discarding {} queued bytes from {}", len, from),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break Ok(()),
                Err(e) if matches!(
                    e.kind(),
                    io::ErrorKind::Interrupted | io::ErrorKind::ConnectionRefused | io::ErrorKind::ConnectionReset
                ) => {}
                Err(e) => break Err(e),
            }
        };
        self.socket.set_nonblocking(false)?;
        drained.map_err(Error::from)
    }

    /// `None` when the timeout elapsed without a matching reply.
    fn wait_for_reply(&self, request: &Message, buffer: &mut [u8]) -> Result<Option<Message>> {
        loop {
            let (len, from) = match self.socket.recv_from(buffer) {
                Ok(received) => received,
                Err(e) => {
                    return match e.kind() {
                        io::ErrorKind::WouldBlock
                        | io::ErrorKind::TimedOut
                        | io::ErrorKind::ConnectionRefused
                        | io::ErrorKind::ConnectionReset
                        | io::ErrorKind::Interrupted => {
                            debug!("no reply: {}", e);
                            Ok(None)
                        }
                        _ => Err(e.into()),
                    };
                }
            };
            if from != self.server {
                debug!("ignoring datagram from {}", from);
                continue;
            }
            match Message::from_bytes(&buffer[..len]) {
                Ok(reply) if reply.answers(request) => return Ok(Some(reply)),
                Ok(reply) => debug!("discarding stale reply {:?}", reply),
                Err(e) => debug!("discarding malformed reply: {}", e),
            }
        }
    }
}
