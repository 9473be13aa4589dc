// src/transport/mod.rs

//! Persistent HTTPS transport to the metadata service
//!
//! One TLS connection is kept open and reused for every request. The
//! connection sits behind a mutex so only one request is in flight at a
//! time. A request that fails on write, or whose response cannot be read
//! or comes back empty, tears the connection down and is retried once on a
//! fresh connection before the error reaches the caller.

pub mod http;

use crate::error::{Error, Result};
use rustls::{ClientConfig, ClientConnection, RootCertStore, StreamOwned};
use rustls_pki_types::ServerName;
use std::io::{BufReader, Read, Write};
use std::net::TcpStream;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

pub use http::{percent_encode, Response};

/// Standard HTTPS port
const HTTPS_PORT: u16 = 443;

/// Socket read/write timeout
const SOCKET_TIMEOUT: Duration = Duration::from_secs(30);

/// A bidirectional byte stream (TLS in production, in-memory in tests)
pub trait Stream: Read + Write + Send {}

impl<T: Read + Write + Send> Stream for T {}

/// Opens new connections for the transport
pub trait Connector: Send + Sync {
    /// Host name sent in the `Host` header
    fn host(&self) -> &str;

    /// Open a fresh connection
    fn connect(&self) -> Result<Box<dyn Stream>>;
}

/// TLS-over-TCP connector for a single host
pub struct TlsConnector {
    host: String,
    port: u16,
    config: Arc<ClientConfig>,
}

impl TlsConnector {
    /// Create a connector trusting the bundled web PKI roots
    pub fn new(host: impl Into<String>) -> Result<Self> {
        let mut roots = RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let config = ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .map_err(|e| Error::InitError(format!("Failed to configure TLS: {e}")))?
            .with_root_certificates(roots)
            .with_no_client_auth();

        Ok(Self {
            host: host.into(),
            port: HTTPS_PORT,
            config: Arc::new(config),
        })
    }
}

impl Connector for TlsConnector {
    fn host(&self) -> &str {
        &self.host
    }

    fn connect(&self) -> Result<Box<dyn Stream>> {
        debug!("Connecting to {}:{}", self.host, self.port);

        let server_name = ServerName::try_from(self.host.clone())
            .map_err(|e| Error::TransportError(format!("Invalid host name {}: {e}", self.host)))?;

        let mut socket = TcpStream::connect((self.host.as_str(), self.port)).map_err(|e| {
            Error::TransportError(format!("Connection to {} failed: {e}", self.host))
        })?;
        socket.set_read_timeout(Some(SOCKET_TIMEOUT))?;
        socket.set_write_timeout(Some(SOCKET_TIMEOUT))?;
        socket.set_nodelay(true)?;

        let mut conn = ClientConnection::new(Arc::clone(&self.config), server_name)
            .map_err(|e| Error::TransportError(format!("TLS setup failed: {e}")))?;

        // Drive the handshake now so failures surface as connect errors
        while conn.is_handshaking() {
            conn.complete_io(&mut socket)
                .map_err(|e| Error::TransportError(format!("TLS handshake failed: {e}")))?;
        }

        Ok(Box::new(StreamOwned::new(conn, socket)))
    }
}

/// Keep-alive HTTP/1.1 client over a single persistent connection
pub struct Transport {
    connector: Box<dyn Connector>,
    conn: Mutex<Option<BufReader<Box<dyn Stream>>>>,
}

impl Transport {
    /// Create a transport; no connection is opened until first use
    pub fn new(connector: Box<dyn Connector>) -> Self {
        Self {
            connector,
            conn: Mutex::new(None),
        }
    }

    /// Create a TLS transport to `host`
    pub fn https(host: &str) -> Result<Self> {
        Ok(Self::new(Box::new(TlsConnector::new(host)?)))
    }

    /// Establish the connection ahead of the first request
    ///
    /// A no-op when already connected.
    pub fn connect(&self) -> Result<()> {
        let mut guard = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        self.ensure_connected(&mut guard)?;
        Ok(())
    }

    /// Drop the current connection, if any
    pub fn disconnect(&self) {
        let mut guard = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        *guard = None;
    }

    /// Issue a `GET` for `path` and return the decoded body
    ///
    /// `path` must already be percent-encoded.
    pub fn request(&self, path: &str) -> Result<Vec<u8>> {
        let mut guard = self.conn.lock().unwrap_or_else(|e| e.into_inner());

        let mut last_error = None;
        for attempt in 1..=2 {
            match self.try_request(&mut guard, path) {
                Ok(response) if !response.is_success() => {
                    return Err(Error::DownloadError(format!(
                        "HTTP {} from {}",
                        response.status, path
                    )));
                }
                Ok(response) if !response.body.is_empty() => return Ok(response.body),
                Ok(_) => {
                    warn!("Empty response for {} (attempt {})", path, attempt);
                    *guard = None;
                    last_error = Some(Error::TransportError(format!("Empty response for {path}")));
                }
                Err(e) => {
                    warn!("Request for {} failed (attempt {}): {}", path, attempt, e);
                    *guard = None;
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| Error::TransportError("HTTPS request failed".to_string())))
    }

    fn ensure_connected<'a>(
        &self,
        slot: &'a mut Option<BufReader<Box<dyn Stream>>>,
    ) -> Result<&'a mut BufReader<Box<dyn Stream>>> {
        if slot.is_none() {
            *slot = Some(BufReader::new(self.connector.connect()?));
        }
        slot.as_mut()
            .ok_or_else(|| Error::TransportError("Connection unavailable".to_string()))
    }

    fn try_request(
        &self,
        slot: &mut Option<BufReader<Box<dyn Stream>>>,
        path: &str,
    ) -> Result<Response> {
        let reader = self.ensure_connected(slot)?;

        http::write_get(reader.get_mut(), self.connector.host(), path)
            .map_err(|e| Error::TransportError(format!("Write failed: {e}")))?;

        let response = http::read_response(reader)?;
        if response.close {
            debug!("Server closed connection after {}", path);
            *slot = None;
        }
        Ok(response)
    }
}
