//! A line-oriented broadcast chat server.
//!
//! Clients connect over TCP, may pick a nickname with `/nick NAME`, and
//! every other line they send is relayed to all connected clients,
//! themselves included. The [`Registry`] is the only shared state; each
//! connection runs its own [`Session`] task against it.

pub mod command;
pub mod config;
pub mod connection;
pub mod error;
pub mod message;
pub mod registry;
pub mod server;
pub mod session;
pub mod types;

pub use config::ServerConfig;
pub use error::ChatError;
pub use registry::{Notifier, Registration, Registry};
pub use server::Server;
pub use session::Session;
pub use types::UserId;
