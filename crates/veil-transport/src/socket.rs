//! Non-blocking stream socket abstraction.
//!
//! A channel only needs single-attempt `send` and `recv`; the multiplexer
//! owns readiness. Implemented for `std::net::TcpStream` and
//! `socket2::Socket`.

use std::io::{self, Read, Write};
use std::net::TcpStream;

/// One connected, non-blocking byte stream.
pub trait StreamSocket: Send + Sync {
    /// Write as much of `buf` as the socket accepts right now.
    ///
    /// # Errors
    ///
    /// Any socket error, including `WouldBlock`.
    fn send(&self, buf: &[u8]) -> io::Result<usize>;

    /// Read whatever is available into `buf`. `Ok(0)` means end of stream.
    ///
    /// # Errors
    ///
    /// Any socket error, including `WouldBlock`.
    fn recv(&self, buf: &mut [u8]) -> io::Result<usize>;
}

impl StreamSocket for TcpStream {
    fn send(&self, buf: &[u8]) -> io::Result<usize> {
        (&*self).write(buf)
    }

    fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        (&*self).read(buf)
    }
}

impl StreamSocket for socket2::Socket {
    fn send(&self, buf: &[u8]) -> io::Result<usize> {
        (&*self).write(buf)
    }

    fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        (&*self).read(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn test_tcp_stream_socket_roundtrip() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let (server, _) = listener.accept().unwrap();

        assert_eq!(StreamSocket::send(&client, b"ping").unwrap(), 4);

        let mut buf = [0u8; 16];
        let n = StreamSocket::recv(&server, &mut buf).unwrap();
        assert_eq!(&buf[..n], b"ping");
    }

    #[test]
    fn test_nonblocking_recv_would_block() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let (server, _) = listener.accept().unwrap();
        server.set_nonblocking(true).unwrap();

        let mut buf = [0u8; 16];
        let err = StreamSocket::recv(&server, &mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::WouldBlock);
        drop(client);
    }
}
