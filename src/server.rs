use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};

use log::{debug, info, warn};

use crate::driver::DeviceDriver;
use crate::fs::FS;
use crate::message::{Message, OpCode, MESSAGE_SIZE, RC_ERROR};
use crate::structure::inode::InodeKind;
use crate::util::error::{Error, Result};
use crate::util::serializable::ByteSerializable;

/// What the dispatch loop does after handling one request.
#[derive(Debug, PartialEq, Eq)]
pub enum Outcome {
    Reply(Message),
    /// Send the reply, then flush the image and stop serving.
    Shutdown(Message),
}

/// Single-threaded request dispatcher. Requests are served strictly one at a
/// time against the owned storage engine.
pub struct Server<A: DeviceDriver> {
    socket: UdpSocket,
    fs: FS<A>,
}

impl<A: DeviceDriver> Server<A> {
    pub fn bind<T: ToSocketAddrs>(addr: T, fs: FS<A>) -> Result<Server<A>> {
        let socket = UdpSocket::bind(addr)?;
        info!("listening on {}", socket.local_addr()?);
        Ok(Server { socket, fs })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    pub fn fs(&self) -> &FS<A> {
        &self.fs
    }

    /// Serves requests until a shutdown request arrives, then persists the
    /// image. Returns the engine after the flush.
    pub fn run(mut self) -> Result<FS<A>> {
        // one spare byte so oversized datagrams are detected instead of truncated
        let mut buffer = vec![0u8; MESSAGE_SIZE + 1];
        loop {
            let (len, peer) = match self.socket.recv_from(&mut buffer) {
                Ok(received) => received,
                Err(e) if is_transient(&e) => {
                    debug!("receive interrupted: {}", e);
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let request = match Message::from_bytes(&buffer[..len]) {
                Ok(request) => request,
                Err(Error::UnknownOperation(code)) => {
                    debug!("ignoring unknown operation {} from {}", code, peer);
                    continue;
                }
                Err(e) => {
                    warn!("dropping datagram from {}: {}", peer, e);
                    continue;
                }
            };
            debug!("{} -> {:?}", peer, request);

            match self.handle(&request) {
                Outcome::Reply(reply) => self.send(&reply, peer),
                Outcome::Shutdown(reply) => {
                    self.send(&reply, peer);
                    info!("shutdown requested by {}", peer);
                    self.fs.flush()?;
                    return Ok(self.fs);
                }
            }
        }
    }

    /// Executes one decoded request. Engine errors become an rc of -1 and
    /// leave the server ready for the next request.
    pub fn handle(&mut self, request: &Message) -> Outcome {
        if request.op == OpCode::Shutdown {
            return Outcome::Shutdown(Message::reply_to(request));
        }
        match self.execute(request) {
            Ok(reply) => Outcome::Reply(reply),
            Err(e) => {
                warn!("{:?} on inode {} failed: {}", request.op, request.inum, e);
                let mut reply = Message::reply_to(request);
                reply.rc = RC_ERROR;
                Outcome::Reply(reply)
            }
        }
    }

    fn execute(&mut self, request: &Message) -> Result<Message> {
        let mut reply = Message::reply_to(request);
        match request.op {
            OpCode::Init | OpCode::Shutdown => {}
            OpCode::Lookup => {
                reply.inum = self.fs.lookup(request.inum, request.name()?)?;
            }
            OpCode::Stat => {
                let stat = self.fs.stat(request.inum)?;
                reply.nbytes = stat.size;
                reply.kind = stat.kind.code();
            }
            OpCode::Write => {
                self.fs.write(request.inum, request.buffer(), request.offset, request.nbytes)?;
            }
            OpCode::Read => {
                let block = self.fs.read(request.inum, request.offset, request.nbytes)?;
                reply.set_buffer(block);
            }
            OpCode::Create => {
                let kind = InodeKind::try_from(request.kind)?;
                reply.inum = self.fs.create(request.inum, kind, request.name()?)?;
                reply.kind = kind.code();
            }
            OpCode::Unlink => {
                self.fs.unlink(request.inum, request.name()?)?;
            }
        }
        Ok(reply)
    }

    fn send(&self, reply: &Message, peer: SocketAddr) {
        if let Err(e) = self.socket.send_to(&reply.to_bytes(), peer) {
            warn!("failed to reply to {}: {}", peer, e);
        }
    }
}

fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::Interrupted | io::ErrorKind::ConnectionRefused | io::ErrorKind::ConnectionReset
    )
}
