//! Multi-session entry point: one supervisor task per named session.
//!
//! Sessions share the process, the transport and the retry-counter cache,
//! nothing else. Each gets its own credential directory and store snapshot.

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use futures::future::join_all;
use tracing::{error, info};

use wabot_core::{
    config::Config,
    domain::SessionId,
    ports::WaTransport,
    reply::ReplyMode,
    retry::RetryCounterCache,
    store::InMemoryStore,
    supervisor::{SessionOptions, Supervisor},
};
use wabot_sidecar::{SidecarConfig, SidecarTransport};

#[derive(Debug, Parser)]
#[command(name = "wabot-multi", about = "WhatsApp Web demo bot, multiple named sessions")]
struct Cli {
    /// Session names to run concurrently.
    #[arg(default_values_t = [String::from("s1"), String::from("s2")])]
    sessions: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    wabot_core::logging::init("wabot_multi")?;

    let cli = Cli::parse();
    let cfg = Config::load()?;

    let retry_counters = RetryCounterCache::new();

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

    let transport: Arc<dyn WaTransport> = Arc::new(SidecarTransport::new(
        cfg.sidecar_url.clone(),
        cfg.version_url.clone(),
    ));

    let mut runs = Vec::new();
    for name in &cli.sessions {
        let session = SessionId::new(name.as_str());
        info!(session = %session, "starting session");

        let store = Arc::new(InMemoryStore::open(InMemoryStore::session_path(
            &cfg.store_path,
            &session,
        )));
        store.spawn_flush_task(cfg.store_flush_interval);

        let supervisor = Supervisor::new(
            Arc::clone(&transport),
            retry_counters.clone(),
            Some(store),
            cfg.backoff,
            SessionOptions {
                session: session.clone(),
                auto_reply: true,
                reply_mode: ReplyMode::Greeting,
                typing: cfg.typing,
                use_pairing_code: false,
                mobile: false,
            },
        );

        runs.push(async move {
            let outcome = supervisor.run().await;
            (session, outcome)
        });
    }

    let mut failed = false;
    for (session, outcome) in join_all(runs).await {
        match outcome {
            Ok(()) => info!(session = %session, "session finished"),
            Err(e) => {
                failed = true;
                error!(session = %session, error = %e, "session failed");
            }
        }
    }

    if let Some(process) = sidecar.as_mut() {
        let _ = process.stop().await;
    }

    if failed {
        anyhow::bail!("one or more sessions failed");
    }
    Ok(())
}
