//! # Snake Arena Server
//!
//! Authoritative server for the snake arena. It owns the only real copy of the
//! game, applies the controls clients send, advances the simulation at a fixed
//! tick rate and sends every client a full snapshot after each tick.
//!
//! ## Architecture
//!
//! A single task owns the [`shared::Game`] and every session. Socket reads,
//! accepted connections and timer ticks all arrive at that task through one
//! `tokio::select!` loop, so game state is never shared between tasks.
//!
//! Each connection gets two small tasks:
//! - a reader that forwards raw bytes to the main loop
//! - a writer that drains the session's outgoing channel into the socket
//!
//! ## Modules
//!
//! - [`client_manager`]: sessions, their byte buffers and per-session decoding
//! - [`network`]: the listener, the socket tasks and the tick loop
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::{Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let mut server = Server::new("127.0.0.1:8080", ServerConfig::default()).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod client_manager;
pub mod network;
