//! Core domain + orchestration logic for the WhatsApp demo bot.
//!
//! This crate is intentionally protocol-agnostic. The WhatsApp Web library
//! lives behind ports (traits) implemented in adapter crates; everything here
//! is written against those ports so the supervisor, dispatcher and reply
//! engine can be exercised with fakes.

pub mod config;
pub mod dispatch;
pub mod domain;
pub mod errors;
pub mod events;
pub mod logging;
pub mod message;
pub mod ports;
pub mod reply;
pub mod retry;
pub mod store;
pub mod supervisor;

#[cfg(test)]
pub mod testutil;

pub use errors::{Error, Result};
