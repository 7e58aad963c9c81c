//! Browser relay: open URLs from a headless host in a browser elsewhere.
//!
//! A long-lived [`RelayServer`] accepts TCP connections from
//! [`BrowserClient`]s running on machines with a display. Short-lived local
//! processes hand URLs to the relay over a same-host control socket, usually
//! through a [`Launcher`] that starts the relay first if needed. Every valid
//! URL is broadcast to all connected clients, which open it locally.
//!
//! ```text
//!  remote host                                   machine with a browser
//! ┌──────────────────────────────────────┐      ┌───────────────────────┐
//! │ $BROWSER url ─► Launcher             │      │                       │
//! │                   │ control socket   │      │                       │
//! │                   ▼                  │ TCP  │                       │
//! │               RelayServer ─► Registry├─────►│ BrowserClient ─► open │
//! └──────────────────────────────────────┘      └───────────────────────┘
//! ```

pub mod client;
pub mod config;
pub mod control;
pub mod error;
pub mod launcher;
pub mod opener;
pub mod probe;
pub mod registry;
pub mod server;

pub use client::BrowserClient;
pub use config::{ClientConfig, DEFAULT_HOST, DEFAULT_PORT, ServerConfig};
pub use control::{ControlAddr, RetryPolicy};
pub use error::{Error, Result};
pub use launcher::{Delivery, DetachedProcess, Launcher, SpawnRelay};
pub use opener::{Opener, SystemOpener};
pub use probe::port_in_use;
pub use registry::{ConnectionId, Registration, Registry};
pub use relay_protocol::{ControlRequest, ControlResponse, is_url};
pub use server::{Lifecycle, RelayServer};
