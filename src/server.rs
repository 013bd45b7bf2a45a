//! TCP server for Echo Town connections.
//!
//! Accepts incoming connections and runs one session task per client.
//! Sessions share only the read-only router and the log sinks.

use crate::config::Config;
use crate::routing::Router;
use crate::session::Session;
use crate::transcript::{FileTranscript, Transcript};
use std::net::{IpAddr, Ipv4Addr, SocketAddr, ToSocketAddrs, UdpSocket};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, info_span, Instrument};

/// Listen backlog
const BACKLOG: i32 = 1024;

/// Pause after a failed accept so a persistent error (e.g. EMFILE) does
/// not spin the loop
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Server instance
pub struct Server {
    config: Config,
    router: Arc<Router>,
}

impl Server {
    /// Create a new server instance
    pub fn new(config: Config, router: Router) -> Self {
        Server {
            config,
            router: Arc::new(router),
        }
    }

    /// Bind the listener and begin accepting connections
    pub async fn run(&self) -> Result<(), Box<dyn std::error::Error>> {
        let listener = bind(&self.config.listen_addr())?;
        let bound = listener.local_addr()?;
        info!(
            address = %advertised_addr(bound),
            bind = %bound,
            "Echo Town server started"
        );
        self.serve(listener).await;
        Ok(())
    }

    /// Accept connections forever. Accept failures are logged and skipped.
    pub async fn serve(&self, listener: TcpListener) {
        loop {
            match listener.accept().await {
                Ok((stream, peer)) => self.spawn_session(stream, peer),
                Err(e) => {
                    error!(error = %e, "Connection acceptance failed");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
            }
        }
    }

    fn spawn_session(&self, stream: TcpStream, peer: SocketAddr) {
        let router = Arc::clone(&self.router);
        let log_dir = self.config.log_dir.clone();
        let idle_timeout = self.config.idle_timeout;

        tokio::spawn(
            handle_connection(stream, peer, router, log_dir, idle_timeout)
                .instrument(info_span!("session")),
        );
    }
}

/// Run one client connection from accept to disconnect
async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    router: Arc<Router>,
    log_dir: PathBuf,
    idle_timeout: Duration,
) {
    let transcript: Arc<dyn Transcript> = match FileTranscript::open(&log_dir, peer) {
        Ok(transcript) => {
            debug!(path = %transcript.path().display(), "Client log opened");
            Arc::new(transcript)
        }
        Err(e) => {
            error!(
                peer = %peer,
                error = %e,
                "Client log could not be opened, closing connection"
            );
            return;
        }
    };

    info!("[{}] connected to the server", peer);
    let end = Session::new(stream, peer, router, transcript, idle_timeout)
        .run()
        .await;
    info!(reason = %end, "[{}] disconnected from the server", peer);
}

/// Address clients should use to reach a listener bound to `bound`.
///
/// A wildcard bind is reported as the first non-loopback IPv4 interface,
/// or loopback if none is found.
pub fn advertised_addr(bound: SocketAddr) -> SocketAddr {
    if !bound.ip().is_unspecified() {
        return bound;
    }
    let ip = outbound_ipv4().unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST));
    SocketAddr::new(ip, bound.port())
}

/// Local IPv4 address the OS routes outbound traffic from.
fn outbound_ipv4() -> Option<IpAddr> {
    // Connecting a UDP socket only selects a route; nothing is sent
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).ok()?;
    socket.connect((Ipv4Addr::new(192, 0, 2, 1), 9)).ok()?;
    let ip = socket.local_addr().ok()?.ip();
    (!ip.is_unspecified() && !ip.is_loopback()).then_some(ip)
}

/// Create a reusable, non-blocking TCP listener on `addr`
pub fn bind(addr: &str) -> std::io::Result<TcpListener> {
    let addr = addr.to_socket_addrs()?.next().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("no address resolved for {}", addr),
        )
    })?;

    let socket = socket2::Socket::new(
        match addr {
            SocketAddr::V4(_) => socket2::Domain::IPV4,
            SocketAddr::V6(_) => socket2::Domain::IPV6,
        },
        socket2::Type::STREAM,
        Some(socket2::Protocol::TCP),
    )?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(BACKLOG)?;

    TcpListener::from_std(socket.into())
}
