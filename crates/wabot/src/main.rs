//! Single-session entry point: one implicit session named "default".

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;

use wabot_core::{
    config::Config,
    domain::SessionId,
    reply::ReplyMode,
    retry::RetryCounterCache,
    store::InMemoryStore,
    supervisor::{SessionOptions, Supervisor},
};
use wabot_sidecar::{SidecarConfig, SidecarTransport};

#[derive(Debug, Parser)]
#[command(name = "wabot", about = "WhatsApp Web demo bot, single session")]
struct Cli {
    /// Disable the periodically-snapshotted in-memory store.
    #[arg(long)]
    no_store: bool,

    /// Disable automatic demo replies to inbound messages.
    #[arg(long)]
    no_reply: bool,

    /// Authenticate with a pairing code instead of a QR.
    #[arg(long)]
    use_pairing_code: bool,

    /// Register with a mobile-client identity.
    #[arg(long)]
    mobile: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    wabot_core::logging::init("wabot")?;

    let cli = Cli::parse();
    let cfg = Config::load()?;

    let retry_counters = RetryCounterCache::new();

    let store = if cli.no_store {
        None
    } else {
        let store = Arc::new(InMemoryStore::open(cfg.store_path.clone()));
        store.spawn_flush_task(cfg.store_flush_interval);
        Some(store)
    };

    // Spawn the sidecar when a directory is configured; otherwise attach to
    // an already-running one at the configured URL.
    let mut sidecar = match &cfg.sidecar_dir {
        Some(dir) => Some(
            wabot_sidecar::start(SidecarConfig {
                dir: dir.clone(),
                port: cfg.sidecar_port,
                auth_root: cfg.auth_root.clone(),
            })
            .await?,
        ),
        None => None,
    };

    let transport = Arc::new(SidecarTransport::new(
        cfg.sidecar_url.clone(),
        cfg.version_url.clone(),
    ));
    let supervisor = Supervisor::new(
        transport,
        retry_counters,
        store,
        cfg.backoff,
        SessionOptions {
            session: SessionId::new("default"),
            auto_reply: !cli.no_reply,
            reply_mode: ReplyMode::Catalogue,
            typing: cfg.typing,
            use_pairing_code: cli.use_pairing_code,
            mobile: cli.mobile,
        },
    );

    let outcome = supervisor.run().await;

    if let Some(process) = sidecar.as_mut() {
        let _ = process.stop().await;
    }

    outcome.map_err(Into::into)
}
