//! Non-blocking connection (C2).
//!
//! Owns one non-blocking socket (TCP or UNIX-domain, selected by
//! configuration) plus the incremental RESP reply buffer. Grounded in
//! `roughenough-client::transport::ClientTransport`'s send/recv split and in
//! `roughenough-server::backend::mio_backend::MioBackend`'s non-blocking
//! recv loop, adapted from UDP datagrams to a buffered TCP/UNIX byte stream.

use std::io::{self, Read, Write};
use std::net::SocketAddr;
use std::os::unix::io::{AsRawFd, RawFd};

use mio::event::Source;
use mio::net::{TcpStream, UnixStream};
use mio::{Interest, Registry, Token};

use crate::resp::{scan_reply, Reply};

const READ_CHUNK: usize = 16 * 1024;

/// Where to connect: TCP host:port, or a UNIX-domain socket path.
#[derive(Debug, Clone)]
pub enum Target {
    Tcp(SocketAddr),
    Unix(String),
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Target::Tcp(addr) => write!(f, "{addr}"),
            Target::Unix(path) => write!(f, "{path}"),
        }
    }
}

enum Socket {
    Tcp(TcpStream),
    Unix(UnixStream),
}

impl Socket {
    fn connect(target: &Target) -> io::Result<Self> {
        match target {
            Target::Tcp(addr) => Ok(Socket::Tcp(TcpStream::connect(*addr)?)),
            Target::Unix(path) => Ok(Socket::Unix(UnixStream::connect(path)?)),
        }
    }
}

impl Read for Socket {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Socket::Tcp(s) => s.read(buf),
            Socket::Unix(s) => s.read(buf),
        }
    }
}

impl Write for Socket {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Socket::Tcp(s) => s.write(buf),
            Socket::Unix(s) => s.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Socket::Tcp(s) => s.flush(),
            Socket::Unix(s) => s.flush(),
        }
    }
}

impl Source for Socket {
    fn register(&mut self, registry: &Registry, token: Token, interests: Interest) -> io::Result<()> {
        match self {
            Socket::Tcp(s) => s.register(registry, token, interests),
            Socket::Unix(s) => s.register(registry, token, interests),
        }
    }

    fn reregister(&mut self, registry: &Registry, token: Token, interests: Interest) -> io::Result<()> {
        match self {
            Socket::Tcp(s) => s.reregister(registry, token, interests),
            Socket::Unix(s) => s.reregister(registry, token, interests),
        }
    }

    fn deregister(&mut self, registry: &Registry) -> io::Result<()> {
        match self {
            Socket::Tcp(s) => s.deregister(registry),
            Socket::Unix(s) => s.deregister(registry),
        }
    }
}

impl AsRawFd for Socket {
    fn as_raw_fd(&self) -> RawFd {
        match self {
            Socket::Tcp(s) => s.as_raw_fd(),
            Socket::Unix(s) => s.as_raw_fd(),
        }
    }
}

/// One non-blocking connection plus its incoming-byte accumulator.
pub struct Connection {
    socket: Socket,
    read_buf: Vec<u8>,
    read_pos: usize,
}

impl Connection {
    pub fn connect(target: &Target) -> io::Result<Self> {
        let socket = Socket::connect(target)?;
        Ok(Connection {
            socket,
            read_buf: Vec::with_capacity(READ_CHUNK),
            read_pos: 0,
        })
    }

    pub fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.socket.write(buf)
    }

    /// Drains whatever the socket has available into the internal buffer.
    /// Returns the number of bytes read, which may be 0 on `WouldBlock`.
    pub fn fill_from_socket(&mut self) -> io::Result<usize> {
        self.compact();
        let mut total = 0;
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            match self.socket.read(&mut chunk) {
                Ok(0) => {
                    if total == 0 {
                        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "connection closed"));
                    }
                    break;
                }
                Ok(n) => {
                    self.read_buf.extend_from_slice(&chunk[..n]);
                    total += n;
                    if n < chunk.len() {
                        break;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(total)
    }

    /// Pops one complete reply from the front of the buffer, if present.
    pub fn try_take_reply(&mut self) -> Result<Option<Reply>, String> {
        let reply = scan_reply(&self.read_buf[self.read_pos..])?;
        if let Some(reply) = reply {
            self.read_pos += reply.len;
        }
        Ok(reply)
    }

    fn compact(&mut self) {
        if self.read_pos > 0 {
            self.read_buf.drain(0..self.read_pos);
            self.read_pos = 0;
        }
    }

    pub fn source(&mut self) -> &mut impl Source {
        &mut self.socket
    }
}
