//! tracing-subscriber setup for the daemon.

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::LoggingConfig;

/// Filter built from `[logging]`: a default level plus per-target overrides.
pub fn targets(config: &LoggingConfig) -> Targets {
    Targets::new()
        .with_default(LevelFilter::from(config.level))
        .with_targets(
            config
                .overrides
                .iter()
                .map(|(target, level)| (target.clone(), LevelFilter::from(*level))),
        )
}

/// Install the global subscriber. Call once, before anything logs.
pub fn init(config: &LoggingConfig) {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(targets(config))
        .init();
}
