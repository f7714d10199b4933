//! Wakegate - A protocol-aware TCP gateway for an on-demand Minecraft server
//!
//! This library provides a gateway that:
//! - Tunnels raw bytes to the backend whenever it is already running
//! - Classifies the Minecraft handshake of each new connection (status vs. login)
//! - Answers server-list pings itself with a fixed offline MOTD, never waking anything
//! - Debounces a wake trigger on login attempts, one invocation per cooldown window
//! - Consumes backend discovery and the wake trigger as narrow HTTP interfaces

pub mod config;
pub mod error;
pub mod locator;
pub mod protocol;
pub mod proxy;
pub mod status;
pub mod tunnel;
pub mod varint;
pub mod wake;
