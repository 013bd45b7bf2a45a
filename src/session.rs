//! Per-connection session loop.
//!
//! A session greets the client, then repeats prompt, read, validate,
//! route and respond until one of:
//! - a closing reply (`/quit`, `bye`), which ends gracefully with a goodbye
//! - the idle deadline elapsing, which sends a timeout notice first
//! - EOF, a read error or a write error, which end silently
//!
//! The idle deadline is reset right before each prompt is written, so a
//! client is only disconnected for silence after a prompt.

use crate::protocol::Frame;
use crate::routing::{Response, Router};
use crate::transcript::Transcript;
use crate::validate::{validate, ValidationOutcome, MAX_LINE_BYTES};
use bytes::BytesMut;
use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, trace, warn};

/// Bytes of a single line kept in memory. One past the limit is enough
/// for the validator to reject it as too long.
const LINE_CAPACITY: usize = MAX_LINE_BYTES + 1;

/// Why a session ended without a closing reply.
#[derive(Debug)]
pub enum SessionError {
    /// No complete line arrived before the idle deadline.
    Timeout,
    /// The client closed its side of the connection.
    Disconnected,
    Read(io::Error),
    Write(io::Error),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Timeout => write!(f, "idle timeout elapsed"),
            SessionError::Disconnected => write!(f, "connection closed by client"),
            SessionError::Read(e) => write!(f, "read failed: {}", e),
            SessionError::Write(e) => write!(f, "write failed: {}", e),
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SessionError::Read(e) | SessionError::Write(e) => Some(e),
            _ => None,
        }
    }
}

/// How a session ended.
#[derive(Debug)]
pub enum SessionEnd {
    /// A closing reply was sent.
    Graceful,
    Abrupt(SessionError),
}

impl fmt::Display for SessionEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionEnd::Graceful => write!(f, "closed by request"),
            SessionEnd::Abrupt(e) => e.fmt(f),
        }
    }
}

/// One client connection.
pub struct Session<S> {
    stream: BufReader<S>,
    peer: SocketAddr,
    router: Arc<Router>,
    transcript: Arc<dyn Transcript>,
    idle_timeout: Duration,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(
        stream: S,
        peer: SocketAddr,
        router: Arc<Router>,
        transcript: Arc<dyn Transcript>,
        idle_timeout: Duration,
    ) -> Self {
        Self {
            stream: BufReader::new(stream),
            peer,
            router,
            transcript,
            idle_timeout,
        }
    }

    /// Serve the connection until it ends, then release it.
    pub async fn run(mut self) -> SessionEnd {
        self.transcript
            .record(&format!("[INFO] [{}] connected to the server.", self.peer));

        let end = self.serve().await;

        if let Err(e) = self.stream.shutdown().await {
            trace!(peer = %self.peer, error = %e, "Shutdown after session end failed");
        }

        self.transcript.record(&format!(
            "[INFO] [{}] disconnected from the server.\n",
            self.peer
        ));
        end
    }

    async fn serve(&mut self) -> SessionEnd {
        if let Err(e) = self.write(&Frame::welcome(self.peer)).await {
            warn!(peer = %self.peer, error = %e, "Welcome message failed");
            return SessionEnd::Abrupt(SessionError::Write(e));
        }

        let mut line = BytesMut::with_capacity(LINE_CAPACITY);

        loop {
            let deadline = Instant::now() + self.idle_timeout;

            if let Err(e) = self.write(&Frame::prompt(self.peer)).await {
                warn!(peer = %self.peer, error = %e, "Client prompt failed");
                return SessionEnd::Abrupt(SessionError::Write(e));
            }

            let read = timeout_at(
                deadline,
                read_line(&mut self.stream, &mut line, LINE_CAPACITY),
            )
            .await;
            match read {
                Ok(Ok(true)) => {}
                Ok(Ok(false)) => {
                    debug!(peer = %self.peer, "Client closed the connection");
                    return SessionEnd::Abrupt(SessionError::Disconnected);
                }
                Ok(Err(e)) => {
                    warn!(peer = %self.peer, error = %e, "Client input failed");
                    return SessionEnd::Abrupt(SessionError::Read(e));
                }
                Err(_) => return self.time_out().await,
            }

            self.transcript.record(&format!(
                "[CLIENT] {}",
                String::from_utf8_lossy(&line).trim_end_matches(['\r', '\n'])
            ));

            let response = self.respond_to(&line);

            self.transcript.record(&format!("[SERVER] {}", response.text));

            if let Err(e) = self.write(&Frame::reply(&response.text)).await {
                warn!(peer = %self.peer, error = %e, "Server write failed");
                return SessionEnd::Abrupt(SessionError::Write(e));
            }

            if response.closes {
                if let Err(e) = self.write(Frame::goodbye()).await {
                    warn!(peer = %self.peer, error = %e, "Goodbye message failed");
                }
                return SessionEnd::Graceful;
            }
        }
    }

    /// Validate and route one raw line.
    fn respond_to(&self, raw: &[u8]) -> Response {
        match validate(raw) {
            ValidationOutcome::Accepted(text) => {
                let text = text.strip_suffix('\n').unwrap_or(&text);
                self.router.route(text)
            }
            ValidationOutcome::Rejected(kind) => {
                debug!(peer = %self.peer, reason = ?kind, "Rejected client input");
                Response::open(kind.message())
            }
        }
    }

    async fn time_out(&mut self) -> SessionEnd {
        info!(
            peer = %self.peer,
            idle_secs = self.idle_timeout.as_secs(),
            "Client timed out"
        );
        self.transcript.record(&format!(
            "[TIMEOUT] [{}] {} seconds have passed.",
            self.peer,
            self.idle_timeout.as_secs()
        ));
        if let Err(e) = self.write(&Frame::timeout_notice(self.idle_timeout)).await {
            debug!(peer = %self.peer, error = %e, "Timeout notice failed");
        }
        SessionEnd::Abrupt(SessionError::Timeout)
    }

    async fn write(&mut self, frame: &[u8]) -> io::Result<()> {
        self.stream.write_all(frame).await
    }
}

/// Read through the next `\n`, keeping at most `limit` bytes of the line.
///
/// Bytes past the limit are consumed and dropped. Returns `false` on EOF
/// before a complete line.
async fn read_line<R>(reader: &mut R, line: &mut BytesMut, limit: usize) -> io::Result<bool>
where
    R: AsyncBufRead + Unpin,
{
    line.clear();

    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return Ok(false);
        }

        let (used, done) = match available.iter().position(|&b| b == b'\n') {
            Some(i) => (i + 1, true),
            None => (available.len(), false),
        };

        let room = limit.saturating_sub(line.len());
        line.extend_from_slice(&available[..used.min(room)]);
        reader.consume(used);

        if done {
            return Ok(true);
        }
    }
}
