//! The gateway: ties the connection, registry and dispatch bus together.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::PoisonError;
use std::sync::RwLock;
use std::time::Duration;

use strum::Display;
use tokio::sync::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;
use wallpad_packet::Command;
use wallpad_packet::Identity;
use wallpad_packet::Packet;
use wallpad_packet::Platform;

use crate::config::Config;
use crate::connection::ConnectionManager;
use crate::connection::ConnectionState;
use crate::connection::DEFAULT_FRAME_CHANNEL_SIZE;
use crate::connection::FrameReceiver;
use crate::device::DeviceHandle;
use crate::dispatch::DispatchBus;
use crate::dispatch::EntityAddSignal;
use crate::dispatch::Subscription;
use crate::error::Error;
use crate::error::Result;
use crate::registry::EntityRecord;
use crate::registry::EntityRegistry;
use crate::scan;
use crate::store::RegistryStore;
use crate::transport::Transport;

const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum GatewayState {
    Idle,
    Connecting,
    Running,
    Closing,
    Closed,
}

#[derive(Debug, Clone)]
pub struct GatewayOptions {
    /// Wait between reconnect attempts. `None` stops the gateway on loss.
    pub reconnect_interval: Option<Duration>,
    pub registry_path: Option<PathBuf>,
    pub frame_channel_size: usize,
}

impl Default for GatewayOptions {
    fn default() -> Self {
        Self {
            reconnect_interval: Some(DEFAULT_RECONNECT_INTERVAL),
            registry_path: None,
            frame_channel_size: DEFAULT_FRAME_CHANNEL_SIZE,
        }
    }
}

impl From<&Config> for GatewayOptions {
    fn from(config: &Config) -> Self {
        Self {
            reconnect_interval: config.gateway.reconnect_interval(),
            registry_path: config.registry.path.clone(),
            frame_channel_size: config.gateway.frame_channel_size,
        }
    }
}

/// State reachable from the receive loop task.
struct Shared<T: Transport> {
    connection: ConnectionManager<T>,
    registry: RwLock<EntityRegistry>,
    dispatch: Arc<DispatchBus>,
    state: std::sync::Mutex<GatewayState>,
    reconnect_interval: Option<Duration>,
}

/// Gateway to one wall pad bus.
///
/// Lifecycle is `load_registry`, `connect`, then `close`. Consumers find
/// entities through [`Gateway::setup_platform`] or
/// [`Gateway::entity_add_signal`], bind a device to each, and send commands
/// with [`Gateway::send_packet`].
pub struct Gateway<T: Transport> {
    shared: Arc<Shared<T>>,
    store: Option<RegistryStore>,
    receive_task: Mutex<Option<JoinHandle<()>>>,
    shutdown: watch::Sender<bool>,
}

impl<T: Transport> Gateway<T> {
    pub fn new(transport: T, options: GatewayOptions) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            shared: Arc::new(Shared {
                connection: ConnectionManager::with_channel_size(
                    transport,
                    options.frame_channel_size,
                ),
                registry: RwLock::new(EntityRegistry::new()),
                dispatch: Arc::new(DispatchBus::new()),
                state: std::sync::Mutex::new(GatewayState::Idle),
                reconnect_interval: options.reconnect_interval,
            }),
            store: options.registry_path.map(RegistryStore::new),
            receive_task: Mutex::new(None),
            shutdown,
        }
    }

    pub fn state(&self) -> GatewayState {
        self.shared.state()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.shared.connection.state()
    }

    /// Restore persisted identities as unavailable entities.
    ///
    /// Returns how many were restored. Does nothing without a store.
    pub async fn load_registry(&self) -> Result<usize> {
        let Some(store) = &self.store else {
            return Ok(0);
        };
        let mut identities = store.load().await?;
        identities.retain(|identity| match identity.check_address() {
            Ok(()) => true,
            Err(e) => {
                warn!("Skipping stored entity {}: {}", identity, e);
                false
            }
        });
        let restored = self.shared.registry_write().restore(identities);
        info!(
            "Restored {} entities from {}",
            restored,
            store.path().display()
        );
        Ok(restored)
    }

    /// Persist the identities of every known entity.
    pub async fn save_registry(&self) -> Result<()> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        let identities = self.shared.registry_read().identities();
        store.save(&identities).await
    }

    /// Connect to the bus and start the receive loop.
    ///
    /// Returns false if the connection could not be opened (the failure is
    /// logged) or the gateway has been closed.
    pub async fn connect(&self) -> bool {
        let mut receive_task = self.receive_task.lock().await;
        match self.state() {
            GatewayState::Running => return true,
            // Only the receive loop leaves this state set, while it reconnects.
            GatewayState::Connecting => {
                debug!("Reconnect already in progress");
                return true;
            }
            GatewayState::Closing | GatewayState::Closed => {
                warn!("Refusing to connect a closed gateway");
                return false;
            }
            GatewayState::Idle => {}
        }

        self.shared.set_state(GatewayState::Connecting);
        match self.shared.connection.connect().await {
            Ok(frames) => {
                self.shared.set_state(GatewayState::Running);
                let shared = self.shared.clone();
                let shutdown = self.shutdown.subscribe();
                *receive_task = Some(tokio::spawn(receive_loop(shared, frames, shutdown)));
                true
            }
            Err(e) => {
                error!(
                    "Failed to connect to wall pad at {}: {}",
                    self.shared.connection.describe(),
                    e
                );
                self.shared.set_state(GatewayState::Idle);
                false
            }
        }
    }

    /// Stop the receive loop, close the connection and save the registry.
    ///
    /// Safe to call more than once.
    pub async fn close(&self) {
        let mut receive_task = self.receive_task.lock().await;
        if self.state() == GatewayState::Closed {
            return;
        }
        self.shared.set_state(GatewayState::Closing);
        info!("Closing gateway");

        self.shutdown.send_replace(true);
        self.shared.connection.close().await;
        if let Some(task) = receive_task.take() {
            if let Err(e) = task.await {
                warn!("Receive loop ended abnormally: {}", e);
            }
        }
        // A reconnect racing the shutdown may have opened a new connection.
        self.shared.connection.close().await;

        if let Err(e) = self.save_registry().await {
            warn!("Failed to save entity registry: {}", e);
        }
        self.shared.set_state(GatewayState::Closed);
    }

    /// Write one raw frame to the bus.
    pub async fn send(&self, frame: &[u8]) -> Result<()> {
        if self.state() == GatewayState::Closed {
            return Err(Error::Closed);
        }
        self.shared.connection.send(frame).await
    }

    /// Encode and send a packet, typically one built with `make_change_*`.
    ///
    /// Fails with [`Error::Rejected`] when the packet's room or channel does
    /// not fit on the bus.
    pub async fn send_packet(&self, packet: &Packet) -> Result<()> {
        packet.identity().check_address()?;
        debug!("Sending {} {}", packet.command(), packet.identity());
        self.send(&wallpad_packet::encode(packet)).await
    }

    /// Send the probe frames for `platform`. Returns how many were sent.
    pub async fn scan(&self, platform: Platform) -> Result<usize> {
        let frames = scan::probe_frames(platform);
        for frame in &frames {
            self.send(frame).await?;
        }
        info!("Sent {} probes for {}", frames.len(), platform);
        Ok(frames.len())
    }

    /// Attach a consumer to `platform`.
    ///
    /// The listener is called for every entity already known, then for each
    /// new one as it is discovered. When the platform has no entities yet it
    /// is scanned.
    pub async fn setup_platform<F>(&self, platform: Platform, listener: F) -> Result<Subscription>
    where
        F: Fn(&EntityRecord) + Send + Sync + 'static,
    {
        let listener = Arc::new(listener);
        let existing = self.get_platform_entities(platform);
        for record in &existing {
            listener(record);
        }

        let subscription = self
            .shared
            .dispatch
            .subscribe(platform, move |record| listener(record));

        if existing.is_empty() {
            self.scan(platform).await?;
        }
        Ok(subscription)
    }

    pub fn get_platform_entities(&self, platform: Platform) -> Vec<EntityRecord> {
        self.shared.registry_read().all(platform)
    }

    pub fn get(&self, identity: &Identity) -> Option<EntityRecord> {
        self.shared.registry_read().get(identity)
    }

    pub fn entity_add_signal(&self, platform: Platform) -> EntityAddSignal {
        EntityAddSignal::new(self.shared.dispatch.clone(), platform)
    }

    /// Route future updates for `identity` to `device`.
    pub fn bind_device(&self, identity: &Identity, device: DeviceHandle) -> bool {
        self.shared.registry_write().bind(identity, device)
    }
}

impl<T: Transport> Shared<T> {
    fn state(&self) -> GatewayState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: GatewayState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    fn registry_read(&self) -> std::sync::RwLockReadGuard<'_, EntityRegistry> {
        self.registry.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn registry_write(&self) -> std::sync::RwLockWriteGuard<'_, EntityRegistry> {
        self.registry.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn handle_frame(&self, frame: &[u8]) {
        let packet = match wallpad_packet::decode(frame) {
            Ok(packet) => packet,
            Err(e) => {
                warn!("Dropping frame {:02x?}: {}", frame, e);
                return;
            }
        };

        let is_query = packet.command() == Command::Query;
        let (record, is_new) = self.registry_write().upsert(packet);
        if is_new {
            info!("Discovered {} entity {}", record.platform, record.identity);
            let listeners = self.dispatch.publish(record.platform, &record);
            debug!("Announced {} to {} listeners", record.identity, listeners);
        } else if is_query {
            debug!("Query for known entity {}", record.identity);
        } else if let Some(device) = record.device() {
            device.on_state_changed(&record.packet);
        } else {
            debug!("Updated unbound entity {}", record.identity);
        }
    }

    /// Keep trying to reconnect until it works or the gateway shuts down.
    async fn reconnect(&self, shutdown: &mut watch::Receiver<bool>) -> Option<FrameReceiver> {
        let Some(interval) = self.reconnect_interval else {
            warn!("Reconnect disabled, receive loop stopping");
            return None;
        };

        loop {
            tokio::select! {
                _ = shutdown.changed() => return None,
                _ = tokio::time::sleep(interval) => {}
            }
            if *shutdown.borrow() {
                return None;
            }

            match self.connection.connect().await {
                Ok(frames) => {
                    info!("Reconnected to wall pad");
                    return Some(frames);
                }
                Err(e) => warn!(
                    "Reconnect to {} failed, retrying in {:?}: {}",
                    self.connection.describe(),
                    interval,
                    e
                ),
            }
        }
    }
}

async fn receive_loop<T: Transport>(
    shared: Arc<Shared<T>>,
    mut frames: FrameReceiver,
    mut shutdown: watch::Receiver<bool>,
) {
    debug!("Receive loop started");
    loop {
        if *shutdown.borrow() {
            break;
        }
        tokio::select! {
            _ = shutdown.changed() => break,
            frame = frames.recv() => match frame {
                Some(frame) => shared.handle_frame(&frame),
                None => {
                    if *shutdown.borrow() {
                        break;
                    }
                    warn!("Lost connection to wall pad");
                    shared.set_state(GatewayState::Connecting);
                    match shared.reconnect(&mut shutdown).await {
                        Some(next) => {
                            frames = next;
                            shared.set_state(GatewayState::Running);
                        }
                        None => {
                            if !*shutdown.borrow() {
                                shared.set_state(GatewayState::Idle);
                            }
                            break;
                        }
                    }
                }
            },
        }
    }
    debug!("Receive loop stopped");
}
