//! Connection manager: owns the transport, a read task, and the writer half.

use std::sync::Arc;
use std::sync::PoisonError;

use strum::Display;
use tokio::io::AsyncRead;
use tokio::io::AsyncReadExt;
use tokio::io::AsyncWrite;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tokio::sync::mpsc;
use tokio::sync::oneshot;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;
use tracing::info;
use tracing::warn;
use wallpad_packet::FrameDecoder;

use crate::error::Error;
use crate::error::Result;
use crate::transport::Transport;

/// Candidate frames read off the bus, in arrival order.
///
/// The channel closes when the connection is lost or closed.
pub type FrameReceiver = mpsc::Receiver<Vec<u8>>;

/// Capacity of the frame channel when none is configured
pub const DEFAULT_FRAME_CHANNEL_SIZE: usize = 256;

const READ_BUFFER_SIZE: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Closing,
    Closed,
}

struct ReadTask {
    cancel: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

type SharedState = Arc<std::sync::Mutex<ConnectionState>>;
type SharedWriter<W> = Arc<Mutex<Option<W>>>;

pub struct ConnectionManager<T: Transport> {
    transport: T,
    state: SharedState,

    /// Held for the whole of each write so frames never interleave
    writer: SharedWriter<T::Writer>,

    /// Also serialises connect against close
    read_task: Mutex<Option<ReadTask>>,

    /// Raised by close so a write stuck on a stalled peer gives up the writer
    closing: watch::Sender<bool>,

    frame_channel_size: usize,
}

impl<T: Transport> ConnectionManager<T> {
    pub fn new(transport: T) -> Self {
        Self::with_channel_size(transport, DEFAULT_FRAME_CHANNEL_SIZE)
    }

    pub fn with_channel_size(transport: T, frame_channel_size: usize) -> Self {
        Self {
            transport,
            state: Arc::new(std::sync::Mutex::new(ConnectionState::Disconnected)),
            writer: Arc::new(Mutex::new(None)),
            read_task: Mutex::new(None),
            closing: watch::channel(false).0,
            frame_channel_size: frame_channel_size.max(1),
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn describe(&self) -> String {
        self.transport.describe()
    }

    fn set_state(&self, state: ConnectionState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    /// Open the transport and start reading.
    ///
    /// Allowed from `Disconnected` or `Closed`. The returned receiver yields
    /// every frame whose envelope and checksum are intact; decoding the
    /// payload is left to the caller.
    pub async fn connect(&self) -> Result<FrameReceiver> {
        let mut read_task = self.read_task.lock().await;
        {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            match *state {
                ConnectionState::Connecting | ConnectionState::Connected => {
                    return Err(Error::AlreadyConnected);
                }
                ConnectionState::Closing => return Err(Error::Closed),
                ConnectionState::Disconnected | ConnectionState::Closed => {}
            }
            *state = ConnectionState::Connecting;
        }

        // A task left over from a lost connection has already exited.
        if let Some(stale) = read_task.take() {
            let _ = stale.cancel.send(());
            let _ = stale.handle.await;
        }

        info!("Connecting to wall pad at {}", self.transport.describe());
        let (reader, writer) = match self.transport.open().await {
            Ok(halves) => halves,
            Err(e) => {
                self.set_state(ConnectionState::Disconnected);
                return Err(e);
            }
        };

        self.closing.send_replace(false);
        *self.writer.lock().await = Some(writer);

        let (frame_tx, frame_rx) = mpsc::channel(self.frame_channel_size);
        let (cancel_tx, cancel_rx) = oneshot::channel();
        self.set_state(ConnectionState::Connected);

        let handle = tokio::spawn(read_loop(
            reader,
            frame_tx,
            cancel_rx,
            self.state.clone(),
            self.writer.clone(),
        ));
        *read_task = Some(ReadTask {
            cancel: cancel_tx,
            handle,
        });

        info!("Connected to wall pad at {}", self.transport.describe());
        Ok(frame_rx)
    }

    /// Write one complete frame.
    ///
    /// A write still pending when [`ConnectionManager::close`] runs is
    /// abandoned with [`Error::Closed`].
    pub async fn send(&self, frame: &[u8]) -> Result<()> {
        let mut closing = self.closing.subscribe();
        let mut writer = self.writer.lock().await;
        let writer = writer.as_mut().ok_or(Error::NotConnected)?;

        tokio::select! {
            written = write_frame(writer, frame) => written?,
            _ = closing.wait_for(|closing| *closing) => {
                warn!("Abandoning frame write, connection is closing");
                return Err(Error::Closed);
            }
        }
        debug!("Sent frame {:02x?}", frame);
        Ok(())
    }

    /// Stop reading and release the transport. Safe to call repeatedly.
    pub async fn close(&self) {
        let mut read_task = self.read_task.lock().await;
        self.set_state(ConnectionState::Closing);
        self.closing.send_replace(true);

        if let Some(task) = read_task.take() {
            let _ = task.cancel.send(());
            if let Err(e) = task.handle.await {
                warn!("Bus read task ended abnormally: {}", e);
            }
        }

        if let Some(mut writer) = self.writer.lock().await.take() {
            if let Err(e) = writer.shutdown().await {
                debug!("Error shutting down bus writer: {}", e);
            }
        }

        self.set_state(ConnectionState::Closed);
        debug!("Connection to {} closed", self.transport.describe());
    }
}

impl<T: Transport> Drop for ConnectionManager<T> {
    fn drop(&mut self) {
        if let Some(task) = self.read_task.get_mut().take() {
            task.handle.abort();
        }
    }
}

async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, frame: &[u8]) -> std::io::Result<()> {
    writer.write_all(frame).await?;
    writer.flush().await
}

async fn read_loop<R, W>(
    mut reader: R,
    frames: mpsc::Sender<Vec<u8>>,
    mut cancel: oneshot::Receiver<()>,
    state: SharedState,
    writer: SharedWriter<W>,
) where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut decoder = FrameDecoder::new();
    let mut buf = [0u8; READ_BUFFER_SIZE];

    let lost = 'read: loop {
        let n = tokio::select! {
            _ = &mut cancel => break 'read false,
            read = reader.read(&mut buf) => match read {
                Ok(0) => {
                    warn!("Wall pad closed the connection");
                    break 'read true;
                }
                Ok(n) => n,
                Err(e) => {
                    warn!("Failed to read from wall pad: {}", e);
                    break 'read true;
                }
            },
        };

        decoder.push(&buf[..n]);
        while let Some(next) = decoder.next_frame() {
            let frame = match next {
                Ok(frame) => frame,
                Err(e) => {
                    warn!("Dropping bus bytes: {}", e);
                    continue;
                }
            };
            debug!("Received frame {:02x?}", frame);
            tokio::select! {
                _ = &mut cancel => break 'read false,
                sent = frames.send(frame) => {
                    if sent.is_err() {
                        debug!("Frame receiver dropped, stopping read task");
                        break 'read false;
                    }
                }
            }
        }
    };

    if lost {
        {
            let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
            if *state == ConnectionState::Connected {
                *state = ConnectionState::Disconnected;
            }
        }
        if let Some(mut writer) = writer.lock().await.take() {
            let _ = writer.shutdown().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::io::AsyncReadExt;
    use tokio::io::AsyncWriteExt;
    use wallpad_packet::DeviceKind;
    use wallpad_packet::Identity;
    use wallpad_packet::Packet;

    use super::*;
    use crate::transport::testing::duplex_transport;

    fn query_frame(kind: DeviceKind, room: u8) -> Vec<u8> {
        wallpad_packet::encode(&Packet::query(Identity::new(kind, room, 0)))
    }

    async fn recv(frames: &mut FrameReceiver) -> Option<Vec<u8>> {
        tokio::time::timeout(Duration::from_secs(2), frames.recv())
            .await
            .expect("timed out waiting for a frame")
    }

    #[tokio::test]
    async fn test_connect_and_receive_frames() {
        let (transport, mut bus) = duplex_transport();
        let conn = ConnectionManager::new(transport);
        assert_eq!(conn.state(), ConnectionState::Disconnected);

        let mut frames = conn.connect().await.unwrap();
        assert_eq!(conn.state(), ConnectionState::Connected);

        let mut peer = bus.accept().await;
        let first = query_frame(DeviceKind::Light, 1);
        let second = query_frame(DeviceKind::Dimmer, 2);
        // Split across writes to exercise buffering.
        peer.write_all(&first[..4]).await.unwrap();
        peer.write_all(&first[4..]).await.unwrap();
        peer.write_all(&second).await.unwrap();

        assert_eq!(recv(&mut frames).await.unwrap(), first);
        assert_eq!(recv(&mut frames).await.unwrap(), second);
    }

    #[tokio::test]
    async fn test_garbage_between_frames_is_skipped() {
        let (transport, mut bus) = duplex_transport();
        let conn = ConnectionManager::new(transport);
        let mut frames = conn.connect().await.unwrap();
        let mut peer = bus.accept().await;

        let first = query_frame(DeviceKind::Light, 1);
        let second = query_frame(DeviceKind::Outlet, 3);
        let mut stream = first.clone();
        stream.extend_from_slice(&[0x00, 0x13, 0xf7, 0xff, 0x42]);
        stream.extend_from_slice(&second);
        peer.write_all(&stream).await.unwrap();

        assert_eq!(recv(&mut frames).await.unwrap(), first);
        assert_eq!(recv(&mut frames).await.unwrap(), second);
    }

    #[tokio::test]
    async fn test_connect_twice_is_rejected() {
        let (transport, _bus) = duplex_transport();
        let conn = ConnectionManager::new(transport);
        let _frames = conn.connect().await.unwrap();

        assert!(matches!(conn.connect().await, Err(Error::AlreadyConnected)));
    }

    #[tokio::test]
    async fn test_connect_failure_returns_to_disconnected() {
        let (transport, bus) = duplex_transport();
        bus.set_refuse(true);
        let conn = ConnectionManager::new(transport);

        assert!(matches!(conn.connect().await, Err(Error::Transport(_))));
        assert_eq!(conn.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_send_requires_connection() {
        let (transport, _bus) = duplex_transport();
        let conn = ConnectionManager::new(transport);

        assert!(matches!(
            conn.send(&query_frame(DeviceKind::Light, 1)).await,
            Err(Error::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_concurrent_sends_do_not_interleave() {
        let (transport, mut bus) = duplex_transport();
        let conn = Arc::new(ConnectionManager::new(transport));
        let _frames = conn.connect().await.unwrap();
        let mut peer = bus.accept().await;

        let mut sent = Vec::new();
        let mut handles = Vec::new();
        for room in 1..=6 {
            for kind in [DeviceKind::Light, DeviceKind::Dimmer, DeviceKind::Outlet] {
                let frame = query_frame(kind, room);
                sent.push(frame.clone());
                let conn = conn.clone();
                handles.push(tokio::spawn(async move { conn.send(&frame).await }));
            }
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let total: usize = sent.iter().map(Vec::len).sum();
        let mut bytes = vec![0u8; total];
        peer.read_exact(&mut bytes).await.unwrap();

        let mut decoder = FrameDecoder::new();
        decoder.push(&bytes);
        let mut received = Vec::new();
        while let Some(frame) = decoder.next_frame() {
            let frame = frame.unwrap();
            wallpad_packet::decode(&frame).unwrap();
            received.push(frame);
        }

        sent.sort();
        received.sort();
        assert_eq!(received, sent);
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (transport, mut bus) = duplex_transport();
        let conn = ConnectionManager::new(transport);
        let mut frames = conn.connect().await.unwrap();
        let _peer = bus.accept().await;

        conn.close().await;
        assert_eq!(conn.state(), ConnectionState::Closed);
        conn.close().await;
        assert_eq!(conn.state(), ConnectionState::Closed);

        assert!(recv(&mut frames).await.is_none());
        assert!(matches!(
            conn.send(&query_frame(DeviceKind::Light, 1)).await,
            Err(Error::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_close_abandons_stalled_write() {
        let (transport, mut bus) = duplex_transport();
        let conn = Arc::new(ConnectionManager::new(transport));
        let _frames = conn.connect().await.unwrap();
        // Never read from, so the pipe fills up.
        let _peer = bus.accept().await;

        let sender = conn.clone();
        let stalled = tokio::spawn(async move { sender.send(&vec![0u8; 64 * 1024]).await });
        tokio::time::sleep(Duration::from_millis(50)).await;

        tokio::time::timeout(Duration::from_secs(2), conn.close())
            .await
            .expect("close blocked behind a stalled write");
        assert_eq!(conn.state(), ConnectionState::Closed);
        assert!(matches!(
            stalled.await.unwrap(),
            Err(Error::Closed | Error::NotConnected)
        ));

        // The next connection writes normally again.
        let _frames = conn.connect().await.unwrap();
        let mut peer = bus.accept().await;
        let frame = query_frame(DeviceKind::Light, 1);
        conn.send(&frame).await.unwrap();
        let mut sent = vec![0u8; frame.len()];
        peer.read_exact(&mut sent).await.unwrap();
        assert_eq!(sent, frame);
    }

    #[tokio::test]
    async fn test_close_without_connect() {
        let (transport, _bus) = duplex_transport();
        let conn = ConnectionManager::new(transport);

        conn.close().await;
        assert_eq!(conn.state(), ConnectionState::Closed);
    }

    #[tokio::test]
    async fn test_peer_hangup_disconnects() {
        let (transport, mut bus) = duplex_transport();
        let conn = ConnectionManager::new(transport);
        let mut frames = conn.connect().await.unwrap();

        drop(bus.accept().await);
        assert!(recv(&mut frames).await.is_none());
        assert_eq!(conn.state(), ConnectionState::Disconnected);
        assert!(matches!(
            conn.send(&query_frame(DeviceKind::Light, 1)).await,
            Err(Error::NotConnected)
        ));

        // A fresh connection can be opened after the loss.
        let mut frames = conn.connect().await.unwrap();
        let mut peer = bus.accept().await;
        let frame = query_frame(DeviceKind::Light, 4);
        peer.write_all(&frame).await.unwrap();
        assert_eq!(recv(&mut frames).await.unwrap(), frame);
        assert_eq!(bus.open_count(), 2);
    }
}
