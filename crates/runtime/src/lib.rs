//! DevTools runtime - browser lifecycle and protocol connection
//!
//! This crate provides the low-level infrastructure for driving a local
//! Chromium over the Chrome DevTools Protocol:
//!
//! - **Executable discovery**: Locating a Chrome/Chromium install
//! - **Browser server**: Launching it with remote debugging on an ephemeral port
//! - **Transport**: WebSocket frames to and from JSON values
//! - **Connection**: Request/response correlation, session routing, event fan-out
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │ devtools-attach  │  Browser, Page, DevTools client
//! └────────┬─────────┘
//!          │ Connection::send / subscribe
//! ┌────────▼─────────┐
//! │ devtools-runtime │  This crate
//! │  ┌────────────┐  │
//! │  │ Connection │  │  ID correlation, events
//! │  └────────────┘  │
//! │  ┌────────────┐  │
//! │  │ Transport  │  │  WebSocket
//! │  └────────────┘  │
//! │  ┌────────────┐  │
//! │  │  Browser   │  │  Process management
//! │  │  server    │  │
//! │  └────────────┘  │
//! └──────────────────┘
//! ```

pub mod browser_server;
pub mod connection;
pub mod error;
pub mod executable;
pub mod transport;

pub use browser_server::{BrowserProcess, LaunchOptions};
pub use connection::{Connection, Event, Message, Request, Response};
pub use error::{Error, Result};
pub use executable::find_chromium;
pub use transport::{Transport, TransportParts, TransportReceiver, WebSocketTransport};
