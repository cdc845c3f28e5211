use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{reply::TypingDelays, supervisor::BackoffPolicy};

/// Typed runtime configuration, loaded from the environment (with `.env`
/// support). CLI switches of the binaries layer on top of this.
#[derive(Clone, Debug)]
pub struct Config {
    /// Root directory for per-session credential state; each session gets
    /// `<auth_root>/<session_id>`.
    pub auth_root: PathBuf,

    // Optional in-memory store mirror
    pub store_path: PathBuf,
    pub store_flush_interval: Duration,

    // Reply engine
    pub typing: TypingDelays,

    // Supervisor reconnect policy
    pub backoff: BackoffPolicy,

    // Sidecar endpoint
    pub sidecar_url: String,
    pub sidecar_port: u16,
    /// When set, the binary spawns the sidecar process from this directory.
    pub sidecar_dir: Option<PathBuf>,
    /// Override for the protocol-version manifest URL.
    pub version_url: Option<String>,
}

impl Config {
    pub fn load() -> crate::Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let auth_root = env_path("WABOT_AUTH_DIR").unwrap_or_else(|| PathBuf::from("wabot_auth"));
        let store_path =
            env_path("WABOT_STORE_FILE").unwrap_or_else(|| PathBuf::from("wabot_store.json"));
        let store_flush_interval = duration_ms(env_str("WABOT_STORE_FLUSH_MS"), 10_000);

        let typing = TypingDelays {
            subscribe_pause: duration_ms(env_str("WABOT_SUBSCRIBE_PAUSE_MS"), 500),
            composing_pause: duration_ms(env_str("WABOT_COMPOSING_PAUSE_MS"), 2_000),
        };

        let backoff = BackoffPolicy {
            initial: duration_ms(env_str("WABOT_RECONNECT_INITIAL_MS"), 1_000),
            max: duration_ms(env_str("WABOT_RECONNECT_MAX_MS"), 30_000),
            max_attempts: env_u32("WABOT_RECONNECT_ATTEMPTS").unwrap_or(10),
        };

        let sidecar_port = env_u16("WABOT_SIDECAR_PORT").unwrap_or(3459);
        let sidecar_url = env_str("WABOT_SIDECAR_URL")
            .and_then(non_empty)
            .unwrap_or_else(|| format!("ws://127.0.0.1:{sidecar_port}"));
        let sidecar_dir = env_path("WABOT_SIDECAR_DIR");
        let version_url = env_str("WABOT_VERSION_URL").and_then(non_empty);

        Ok(Self {
            auth_root,
            store_path,
            store_flush_interval,
            typing,
            backoff,
            sidecar_url,
            sidecar_port,
            sidecar_dir,
            version_url,
        })
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var_os(key).map(PathBuf::from)
}

fn env_u32(key: &str) -> Option<u32> {
    env_str(key).and_then(|s| s.trim().parse::<u32>().ok())
}

fn env_u16(key: &str) -> Option<u16> {
    env_str(key).and_then(|s| s.trim().parse::<u16>().ok())
}

fn duration_ms(v: Option<String>, default_ms: u64) -> Duration {
    let ms = v
        .and_then(|s| s.trim().parse::<u64>().ok())
        .unwrap_or(default_ms);
    Duration::from_millis(ms)
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        env::set_var(key, val);
    }
}
