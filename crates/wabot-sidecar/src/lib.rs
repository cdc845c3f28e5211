//! Baileys sidecar adapter.
//!
//! The WhatsApp Web protocol library is a JS package; it runs as a sidecar
//! process and this crate drives it over a local WebSocket, implementing the
//! `wabot-core` ports. One WebSocket connection per session; request frames
//! carry an id echoed by the matching response, event frames stream in
//! between.

pub mod client;
pub mod process;
pub mod version;
pub mod wire;

pub use client::SidecarTransport;
pub use process::{start, SidecarConfig, SidecarProcess};
