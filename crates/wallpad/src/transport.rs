//! Byte-stream transports to the wall pad bus.

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncRead;
use tokio::io::AsyncWrite;
use tokio::net::TcpStream;
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::tcp::OwnedWriteHalf;
use tracing::debug;

use crate::config::GatewayConfig;
use crate::error::Error;
use crate::error::Result;

/// Something that can open a duplex byte stream to the bus.
///
/// Each call to [`Transport::open`] yields a fresh connection, which is how
/// the connection manager reconnects.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    type Reader: AsyncRead + Unpin + Send + 'static;
    type Writer: AsyncWrite + Unpin + Send + 'static;

    async fn open(&self) -> Result<(Self::Reader, Self::Writer)>;

    /// Human-readable peer description for logs
    fn describe(&self) -> String;
}

/// RS485-to-TCP bridge (EW11 style serial server).
#[derive(Debug, Clone)]
pub struct TcpTransport {
    host: String,
    port: u16,
    connect_timeout: Duration,
}

impl TcpTransport {
    pub fn new(host: impl Into<String>, port: u16, connect_timeout: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            connect_timeout,
        }
    }

    pub fn from_config(config: &GatewayConfig) -> Self {
        Self::new(config.host.clone(), config.port, config.connect_timeout())
    }
}

#[async_trait]
impl Transport for TcpTransport {
    type Reader = OwnedReadHalf;
    type Writer = OwnedWriteHalf;

    async fn open(&self) -> Result<(Self::Reader, Self::Writer)> {
        let addr = self.describe();
        let stream = tokio::time::timeout(
            self.connect_timeout,
            TcpStream::connect((self.host.as_str(), self.port)),
        )
        .await
        .map_err(|_| Error::ConnectTimeout(addr.clone()))??;

        // Frames are tiny and latency matters more than throughput.
        stream.set_nodelay(true)?;
        debug!("TCP connection to {} established", addr);

        Ok(stream.into_split())
    }

    fn describe(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;
    use std::sync::atomic::AtomicBool;
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering;

    use tokio::io::DuplexStream;
    use tokio::io::ReadHalf;
    use tokio::io::WriteHalf;
    use tokio::sync::mpsc;

    use super::*;

    const DUPLEX_BUFFER_SIZE: usize = 4096;

    /// In-memory transport. Every `open` creates a new duplex pipe and hands
    /// the far end to the test through [`BusSide`].
    pub struct DuplexTransport {
        peers: mpsc::UnboundedSender<DuplexStream>,
        refuse: Arc<AtomicBool>,
        opens: Arc<AtomicUsize>,
    }

    /// The test's view of the bus.
    pub struct BusSide {
        pub peers: mpsc::UnboundedReceiver<DuplexStream>,
        pub refuse: Arc<AtomicBool>,
        pub opens: Arc<AtomicUsize>,
    }

    impl BusSide {
        /// Wait for the next connection the gateway opens.
        pub async fn accept(&mut self) -> DuplexStream {
            tokio::time::timeout(Duration::from_secs(2), self.peers.recv())
                .await
                .expect("timed out waiting for a connection")
                .expect("transport dropped")
        }

        pub fn set_refuse(&self, refuse: bool) {
            self.refuse.store(refuse, Ordering::SeqCst);
        }

        pub fn open_count(&self) -> usize {
            self.opens.load(Ordering::SeqCst)
        }
    }

    pub fn duplex_transport() -> (DuplexTransport, BusSide) {
        let (tx, rx) = mpsc::unbounded_channel();
        let refuse = Arc::new(AtomicBool::new(false));
        let opens = Arc::new(AtomicUsize::new(0));
        (
            DuplexTransport {
                peers: tx,
                refuse: refuse.clone(),
                opens: opens.clone(),
            },
            BusSide {
                peers: rx,
                refuse,
                opens,
            },
        )
    }

    #[async_trait]
    impl Transport for DuplexTransport {
        type Reader = ReadHalf<DuplexStream>;
        type Writer = WriteHalf<DuplexStream>;

        async fn open(&self) -> Result<(Self::Reader, Self::Writer)> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            if self.refuse.load(Ordering::SeqCst) {
                return Err(Error::Transport(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    "bus refused connection",
                )));
            }
            let (ours, theirs) = tokio::io::duplex(DUPLEX_BUFFER_SIZE);
            let _ = self.peers.send(theirs);
            Ok(tokio::io::split(ours))
        }

        fn describe(&self) -> String {
            "duplex".to_string()
        }
    }
}
