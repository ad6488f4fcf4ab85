//! TCP/TLS transport task.
//!
//! One task per connection owns the socket, framed in both directions by
//! [`Framer`]. Everything it observes is reported to the event loop as
//! [`TransportEvent`]s tagged with the connection id; outgoing lines arrive
//! over an mpsc channel and are written by a separate writer task.

use crate::app::event::{AppEvent, ConnectionId, TransportEvent};
use crate::irc::framer::{FrameError, Framer};
use rustls::pki_types::ServerName;
use rustls::{ClientConfig, RootCertStore};
use std::io;
use std::net::SocketAddr;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_rustls::TlsConnector;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("could not resolve {host}: {source}")]
    Resolve { host: String, source: io::Error },
    #[error("{0} did not resolve to any address")]
    NoAddress(String),
    #[error("could not connect to {addr}: {source}")]
    Connect { addr: SocketAddr, source: io::Error },
    #[error("invalid server name: {0}")]
    InvalidServerName(String),
    #[error("TLS handshake failed: {0}")]
    Tls(io::Error),
    #[error(transparent)]
    Frame(#[from] FrameError),
}

/// Where to connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    pub tls: bool,
    pub accept_invalid_certs: bool,
}

/// Handle to a running transport task.
#[derive(Debug)]
pub struct Connection {
    conn_id: ConnectionId,
    outgoing: mpsc::UnboundedSender<String>,
    task: JoinHandle<()>,
}

impl Connection {
    pub fn conn_id(&self) -> ConnectionId {
        self.conn_id
    }

    /// Queue a line (without terminator). Returns false once the writer has
    /// gone away.
    pub fn send(&self, line: String) -> bool {
        self.outgoing.send(line).is_ok()
    }

    /// Stop reading immediately. Lines already queued are still flushed
    /// before the socket closes.
    pub fn close(self) {
        debug!("closing connection {}", self.conn_id);
        drop(self.outgoing);
        self.task.abort();
    }
}

/// Spawn the transport task for one connection attempt.
pub fn spawn_connection(
    conn_id: ConnectionId,
    endpoint: Endpoint,
    max_line_len: usize,
    event_tx: mpsc::UnboundedSender<AppEvent>,
) -> Connection {
    let (outgoing, outgoing_rx) = mpsc::unbounded_channel();
    let events = Events { conn_id, tx: event_tx };

    let task = tokio::spawn(async move {
        let result = run(&endpoint, max_line_len, &events, outgoing_rx).await;
        match result {
            Ok(()) => {
                info!("connection {} closed by peer", conn_id);
                events.emit(TransportEvent::Closed);
            }
            Err(e) => {
                warn!("connection {} failed: {}", conn_id, e);
                events.emit(TransportEvent::Failed(e.to_string()));
            }
        }
    });

    Connection { conn_id, outgoing, task }
}

#[derive(Clone)]
struct Events {
    conn_id: ConnectionId,
    tx: mpsc::UnboundedSender<AppEvent>,
}

impl Events {
    /// Returns false if the event loop is gone.
    fn emit(&self, event: TransportEvent) -> bool {
        self.tx
            .send(AppEvent::Transport { conn_id: self.conn_id, event })
            .is_ok()
    }
}

async fn run(
    endpoint: &Endpoint,
    max_line_len: usize,
    events: &Events,
    outgoing: mpsc::UnboundedReceiver<String>,
) -> Result<(), TransportError> {
    let tcp = open_tcp(endpoint, events).await?;

    if endpoint.tls {
        let connector = TlsConnector::from(Arc::new(tls_config(endpoint.accept_invalid_certs)));
        let server_name = ServerName::try_from(endpoint.host.clone())
            .map_err(|_| TransportError::InvalidServerName(endpoint.host.clone()))?;
        let stream = connector
            .connect(server_name, tcp)
            .await
            .map_err(TransportError::Tls)?;
        info!("TLS established with {}", endpoint.host);
        pump(stream, max_line_len, events, outgoing).await
    } else {
        pump(tcp, max_line_len, events, outgoing).await
    }
}

/// Try each resolved address in turn. Failures with addresses left to try
/// are reported as `Waiting`.
async fn open_tcp(endpoint: &Endpoint, events: &Events) -> Result<TcpStream, TransportError> {
    let addrs: Vec<SocketAddr> = tokio::net::lookup_host((endpoint.host.as_str(), endpoint.port))
        .await
        .map_err(|source| TransportError::Resolve { host: endpoint.host.clone(), source })?
        .collect();

    let mut last_error = TransportError::NoAddress(endpoint.host.clone());
    for (idx, addr) in addrs.iter().enumerate() {
        debug!("trying {}", addr);
        match TcpStream::connect(*addr).await {
            Ok(stream) => {
                if let Err(e) = stream.set_nodelay(true) {
                    debug!("set_nodelay failed: {}", e);
                }
                return Ok(stream);
            }
            Err(source) => {
                let err = TransportError::Connect { addr: *addr, source };
                if idx + 1 < addrs.len() {
                    events.emit(TransportEvent::Waiting(err.to_string()));
                }
                last_error = err;
            }
        }
    }
    Err(last_error)
}

fn tls_config(accept_invalid_certs: bool) -> ClientConfig {
    if accept_invalid_certs {
        warn!("TLS certificate verification is disabled");
        return ClientConfig::builder()
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(InsecureVerifier))
            .with_no_client_auth();
    }

    let mut roots = RootCertStore::empty();
    let native = rustls_native_certs::load_native_certs();
    for cert in native.certs {
        if let Err(e) = roots.add(cert) {
            warn!("failed to add root cert: {}", e);
        }
    }
    for e in &native.errors {
        warn!("error loading native certs: {}", e);
    }
    ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth()
}

/// Reads until EOF or error. `Ok(())` means the peer closed the stream.
async fn pump<S>(
    stream: S,
    max_line_len: usize,
    events: &Events,
    outgoing: mpsc::UnboundedReceiver<String>,
) -> Result<(), TransportError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (reader, writer) = tokio::io::split(stream);
    let sink = FramedWrite::new(writer, Framer::new(max_line_len));
    tokio::spawn(write_loop(sink, outgoing, events.clone()));
    events.emit(TransportEvent::Ready);

    let mut lines = FramedRead::new(reader, Framer::new(max_line_len));
    while let Some(line) = lines.next().await {
        if !events.emit(TransportEvent::Line(line?)) {
            // Event loop is gone; nobody is listening.
            break;
        }
    }
    Ok(())
}

async fn write_loop<W>(
    mut sink: FramedWrite<W, Framer>,
    mut outgoing: mpsc::UnboundedReceiver<String>,
    events: Events,
) where
    W: AsyncWrite + Unpin,
{
    while let Some(line) = outgoing.recv().await {
        if let Err(e) = sink.send(line).await {
            warn!("write failed on connection {}: {}", events.conn_id, e);
            events.emit(TransportEvent::SendFailed(e.to_string()));
            return;
        }
    }
    if let Err(e) = sink.close().await {
        debug!("shutdown failed on connection {}: {}", events.conn_id, e);
    }
}

#[derive(Debug)]
struct InsecureVerifier;

impl rustls::client::danger::ServerCertVerifier for InsecureVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        rustls::crypto::aws_lc_rs::default_provider()
            .signature_verification_algorithms
            .supported_schemes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::time::Duration;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;

    async fn next_event(rx: &mut mpsc::UnboundedReceiver<AppEvent>) -> TransportEvent {
        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for transport event")
            .expect("event channel closed");
        match event {
            AppEvent::Transport { event, .. } => event,
            other => panic!("unexpected event {:?}", other),
        }
    }

    fn plain(port: u16) -> Endpoint {
        Endpoint {
            host: "127.0.0.1".into(),
            port,
            tls: false,
            accept_invalid_certs: false,
        }
    }

    #[tokio::test]
    async fn frames_lines_and_writes_terminated_lines() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let conn = spawn_connection(4, plain(port), 512, tx);
        let (mut server, _) = listener.accept().await.unwrap();
        assert_eq!(next_event(&mut rx).await, TransportEvent::Ready);

        server.write_all(b"PING :x\r\nPA").await.unwrap();
        assert_eq!(next_event(&mut rx).await, TransportEvent::Line("PING :x".into()));
        server.write_all(b"RT #a\r\n").await.unwrap();
        assert_eq!(next_event(&mut rx).await, TransportEvent::Line("PART #a".into()));

        assert!(conn.send("PONG :x".into()));
        let mut reader = BufReader::new(&mut server);
        let mut line = String::new();
        reader.read_line(&mut line).await.unwrap();
        assert_eq!(line, "PONG :x\r\n");

        drop(reader);
        drop(server);
        assert_eq!(next_event(&mut rx).await, TransportEvent::Closed);
    }

    #[tokio::test]
    async fn events_carry_the_connection_id() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let _conn = spawn_connection(42, plain(port), 512, tx);
        let _server = listener.accept().await.unwrap();
        let event = rx.recv().await.unwrap();
        assert_eq!(
            event,
            AppEvent::Transport { conn_id: 42, event: TransportEvent::Ready }
        );
    }

    #[tokio::test]
    async fn overlong_line_fails_the_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let _conn = spawn_connection(1, plain(port), 16, tx);
        let (mut server, _) = listener.accept().await.unwrap();
        assert_eq!(next_event(&mut rx).await, TransportEvent::Ready);

        server.write_all(&[b'x'; 64]).await.unwrap();
        assert_eq!(
            next_event(&mut rx).await,
            TransportEvent::Failed("line exceeds maximum length (16 bytes)".into())
        );
    }

    #[tokio::test]
    async fn lines_ahead_of_an_overflow_are_still_delivered() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let _conn = spawn_connection(1, plain(port), 16, tx);
        let (mut server, _) = listener.accept().await.unwrap();
        assert_eq!(next_event(&mut rx).await, TransportEvent::Ready);

        let mut chunk = b"ERROR :bye\r\n".to_vec();
        chunk.extend_from_slice(&[b'x'; 40]);
        server.write_all(&chunk).await.unwrap();
        assert_eq!(next_event(&mut rx).await, TransportEvent::Line("ERROR :bye".into()));
        assert_eq!(
            next_event(&mut rx).await,
            TransportEvent::Failed("line exceeds maximum length (16 bytes)".into())
        );
    }

    #[tokio::test]
    async fn refused_connection_fails() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        let (tx, mut rx) = mpsc::unbounded_channel();

        let _conn = spawn_connection(1, plain(port), 512, tx);
        match next_event(&mut rx).await {
            TransportEvent::Failed(reason) => assert!(reason.contains("could not connect")),
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn close_flushes_queued_lines_without_reporting() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let conn = spawn_connection(1, plain(port), 512, tx);
        let (server, _) = listener.accept().await.unwrap();
        assert_eq!(next_event(&mut rx).await, TransportEvent::Ready);

        assert!(conn.send("QUIT :bye".into()));
        conn.close();

        let mut lines = BufReader::new(server).lines();
        assert_eq!(lines.next_line().await.unwrap(), Some("QUIT :bye".into()));
        assert_eq!(lines.next_line().await.unwrap(), None);
        assert!(rx.try_recv().is_err());
    }
}
