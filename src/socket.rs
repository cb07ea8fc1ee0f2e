//! Transport: acquires the control-port connection and exposes split
//! read/write halves (spec.md §4.6). Closing is idempotent and safe to call
//! from any task; the read half is handed to the message pump, the write
//! half is serialized behind a single lock inside [`Socket`].

use std::io;
use std::path::Path;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, ReadBuf, ReadHalf, WriteHalf};
use tokio::net::{TcpStream, UnixStream};
use tokio::sync::Mutex as AsyncMutex;

use crate::error::SocketError;

/// Either transport the control port can be reached over.
enum RawStream {
    Tcp(TcpStream),
    Unix(UnixStream),
}

impl AsyncRead for RawStream {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            RawStream::Tcp(s) => Pin::new(s).poll_read(cx, buf),
            RawStream::Unix(s) => Pin::new(s).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for RawStream {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            RawStream::Tcp(s) => Pin::new(s).poll_write(cx, buf),
            RawStream::Unix(s) => Pin::new(s).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            RawStream::Tcp(s) => Pin::new(s).poll_flush(cx),
            RawStream::Unix(s) => Pin::new(s).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            RawStream::Tcp(s) => Pin::new(s).poll_shutdown(cx),
            RawStream::Unix(s) => Pin::new(s).poll_shutdown(cx),
        }
    }
}

/// The write half plus liveness flag; the one writer the concurrency model
/// allows (spec.md §5).
pub struct Socket {
    write_half: AsyncMutex<WriteHalf<RawStream>>,
    alive: Arc<AtomicBool>,
}

/// The read half, handed off to the message pump. Not [`Clone`]: exactly
/// one reader task owns it for the socket's lifetime.
pub struct SocketReader {
    reader: BufReader<ReadHalf<RawStream>>,
}

async fn split(stream: RawStream) -> (Socket, SocketReader) {
    let (read_half, write_half) = tokio::io::split(stream);
    let alive = Arc::new(AtomicBool::new(true));
    (
        Socket {
            write_half: AsyncMutex::new(write_half),
            alive: alive.clone(),
        },
        SocketReader {
            reader: BufReader::new(read_half),
        },
    )
}

impl Socket {
    pub async fn connect_tcp(address: &str, port: u16) -> io::Result<(Socket, SocketReader)> {
        let stream = TcpStream::connect((address, port)).await?;
        Ok(split(RawStream::Tcp(stream)).await)
    }

    pub async fn connect_unix(path: &Path) -> io::Result<(Socket, SocketReader)> {
        let stream = UnixStream::connect(path).await?;
        Ok(split(RawStream::Unix(stream)).await)
    }

    /// Writes one command, serialized behind the writer lock. `before_write`
    /// runs while still holding that lock — callers use it to register a
    /// FIFO completion handle so the request queue's order can never
    /// diverge from the order commands actually hit the wire. The lock is
    /// released as soon as the bytes are flushed, before any reply is
    /// awaited (spec.md §4.8's `msg` note).
    pub async fn write_line(&self, command: &str, before_write: impl FnOnce()) -> Result<(), SocketError> {
        if !self.alive.load(Ordering::SeqCst) {
            return Err(SocketError::SocketClosed);
        }
        let mut guard = self.write_half.lock().await;
        before_write();
        guard.write_all(&torctl_wire::encode_command(command)).await?;
        guard.flush().await?;
        Ok(())
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Idempotent: marks the socket dead and shuts down the write half,
    /// which in turn wakes the pump's blocked read with EOF.
    pub async fn close(&self) {
        if self.alive.swap(false, Ordering::SeqCst) {
            let mut guard = self.write_half.lock().await;
            let _ = guard.shutdown().await;
        }
    }

    pub(crate) fn alive_flag(&self) -> Arc<AtomicBool> {
        self.alive.clone()
    }
}

impl SocketReader {
    /// Reads one CRLF- or LF-terminated line, with the terminator and any
    /// trailing CR stripped. `Ok(None)` on clean EOF.
    pub async fn read_line(&mut self) -> Result<Option<String>, SocketError> {
        let mut buf = String::new();
        let n = self.reader.read_line(&mut buf).await?;
        if n == 0 {
            return Ok(None);
        }
        while buf.ends_with('\n') || buf.ends_with('\r') {
            buf.pop();
        }
        Ok(Some(buf))
    }
}
