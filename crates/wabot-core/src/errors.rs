/// Core error type for the bot.
///
/// Adapter crates map their specific failures into this type so the
/// supervisor can handle them consistently (startup abort vs reconnect).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Version lookup or session construction failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// A send, presence update or lookup on a live session failed.
    #[error("socket error: {0}")]
    Socket(String),

    #[error("external error: {0}")]
    External(String),
}

pub type Result<T> = std::result::Result<T, Error>;
