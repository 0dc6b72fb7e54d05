//! # Snake Arena Client
//!
//! Headless client for the snake arena. It reads key commands from stdin,
//! sends the resulting controls to the server once per tick and keeps a
//! mirror of the game rebuilt from every snapshot the server sends.
//!
//! The client does no simulation of its own: the server is authoritative and
//! each State message replaces the whole mirrored player list.
//!
//! ## Modules
//!
//! - [`input`]: key events and text commands to [`shared::Controls`]
//! - [`game`]: the mirrored game and the local player's [`game::Outcome`]
//! - [`network`]: the TCP session loop
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::network::Client;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let mut client = Client::connect("127.0.0.1:8080", Duration::from_millis(100)).await?;
//!     client.run().await?;
//!     Ok(())
//! }
//! ```

pub mod game;
pub mod input;
pub mod network;
