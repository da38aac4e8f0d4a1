//! Understory: incremental graph coarsening with modularity-driven grouping
//!
//! The engine keeps a rendered working set of a large graph under a node
//! budget by folding dense groups of nodes into communities. Group proposals
//! come from a detector running behind a command channel.

use std::path::Path;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub use understory_core::{
    Community, Counters, Edge, EdgeId, EdgeRecord, EngineConfig, Error, Node, NodeId, NodePage,
    NodeRecord, Reason, Visible,
};
pub use understory_detector::{DetectorError, DetectorHandle, DetectorWorker, channel};
pub use understory_engine::{
    Applied, DataSource, Engine, Exploration, Explorer, LimitCheck, MemorySource, spawn_detector,
};

/// Install a `tracing` subscriber filtered to this workspace's crates.
///
/// `RUST_LOG` takes precedence when set.
pub fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!(
            "understory={level},understory_core={level},understory_detector={level},understory_engine={level}"
        ))
    });
    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
    if installed.is_ok() {
        tracing::info!("Understory v{}", env!("CARGO_PKG_VERSION"));
    }
}

/// Defaults, then the optional TOML file, then `UNDERSTORY_*` overrides.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<EngineConfig> {
    let config = match path {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    Ok(config.with_env_overrides()?)
}
