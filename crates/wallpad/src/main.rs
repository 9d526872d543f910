use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::Weak;

use anyhow::Context;
use clap::Parser;
use strum::IntoEnumIterator;
use tracing::info;
use tracing::warn;
use wallpad::Config;
use wallpad::DeviceHandle;
use wallpad::EntityDevice;
use wallpad::EntityRecord;
use wallpad::Gateway;
use wallpad::GatewayOptions;
use wallpad::TcpTransport;
use wallpad_packet::Identity;
use wallpad_packet::Packet;
use wallpad_packet::Platform;

#[derive(Debug, Parser)]
#[command(name = "wallpad", version, about = "Imazu wall pad RS485 gateway")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "wallpad.toml")]
    config: PathBuf,

    /// Do not probe platforms that have no known entities
    #[arg(long)]
    no_scan: bool,
}

/// Logs every state change of one entity.
struct LoggedEntity {
    identity: Identity,
}

impl EntityDevice for LoggedEntity {
    fn on_state_changed(&self, packet: &Packet) {
        info!("{} is now {}", self.identity, packet.state_json());
    }
}

type Devices = Arc<Mutex<Vec<Arc<LoggedEntity>>>>;

fn attach(gateway: &Weak<Gateway<TcpTransport>>, devices: &Devices, record: &EntityRecord) {
    let Some(gateway) = gateway.upgrade() else {
        return;
    };
    info!(
        "New {} entity {}: {}{}",
        record.platform,
        record.identity,
        record.packet.state_json(),
        if record.available { "" } else { " (unavailable)" }
    );

    let device = Arc::new(LoggedEntity {
        identity: record.identity,
    });
    if !gateway.bind_device(&record.identity, DeviceHandle::new(&device)) {
        warn!("Entity {} vanished before it could be bound", record.identity);
        return;
    }
    if let Ok(mut devices) = devices.lock() {
        devices.push(device);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = Config::from_file(&cli.config)
        .with_context(|| format!("Failed to load config from {}", cli.config.display()))?;
    wallpad::logging::init(&config.logging);

    info!("wallpad starting");
    info!("Loaded config from: {}", cli.config.display());

    let transport = TcpTransport::from_config(&config.gateway);
    let gateway = Arc::new(Gateway::new(transport, GatewayOptions::from(&config)));

    gateway
        .load_registry()
        .await
        .context("Failed to load entity registry")?;

    if !gateway.connect().await {
        gateway.close().await;
        anyhow::bail!(
            "Could not connect to wall pad at {}:{}",
            config.gateway.host,
            config.gateway.port
        );
    }

    let scan = config.scan.enabled && !cli.no_scan;
    let devices: Devices = Arc::default();
    let mut subscriptions = Vec::new();

    for platform in Platform::iter() {
        let weak = Arc::downgrade(&gateway);
        let sink = devices.clone();
        let listener = move |record: &EntityRecord| attach(&weak, &sink, record);

        let subscription = if scan {
            match gateway.setup_platform(platform, listener).await {
                Ok(subscription) => subscription,
                Err(e) => {
                    warn!("Failed to set up {}: {}", platform, e);
                    continue;
                }
            }
        } else {
            for record in gateway.get_platform_entities(platform) {
                listener(&record);
            }
            gateway.entity_add_signal(platform).connect(listener)
        };
        subscriptions.push(subscription);
    }

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;
    info!("Shutting down");

    for subscription in &subscriptions {
        gateway
            .entity_add_signal(subscription.platform())
            .disconnect(subscription);
    }
    gateway.close().await;

    Ok(())
}
