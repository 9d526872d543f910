//! Gateway core for the Imazu wall pad RS485 bus.
//!
//! A [`Gateway`] keeps a connection to the bus open, decodes every frame with
//! [`wallpad_packet`], keeps one [`EntityRecord`] per device, and announces
//! newly discovered devices to per-platform listeners.

pub mod config;
pub mod connection;
pub mod device;
pub mod dispatch;
mod error;
pub mod gateway;
pub mod logging;
pub mod registry;
pub mod scan;
pub mod store;
pub mod transport;

pub use config::Config;
pub use config::ConfigError;
pub use connection::ConnectionManager;
pub use connection::ConnectionState;
pub use connection::FrameReceiver;
pub use device::DeviceHandle;
pub use device::EntityDevice;
pub use dispatch::DispatchBus;
pub use dispatch::EntityAddSignal;
pub use dispatch::Listener;
pub use dispatch::Subscription;
pub use error::Error;
pub use error::Result;
pub use error::StoreError;
pub use gateway::Gateway;
pub use gateway::GatewayOptions;
pub use gateway::GatewayState;
pub use registry::EntityRecord;
pub use registry::EntityRegistry;
pub use store::RegistryStore;
pub use transport::TcpTransport;
pub use transport::Transport;
