//! Attach a Chromium DevTools tab to a supervised process's V8 inspector and
//! keep it attached while the process restarts its debugger.
//!
//! The moving parts:
//!
//! - [`Process`]: the supervisor's read-only record of a process
//! - [`UiSession`]: one debugger tab; [`DevToolsClient`] is the Chromium-backed one
//! - [`SessionRegistry`]: at most one [`Session`] per process name
//! - [`Reconciler`]: the state machine behind `launch` and `reconcile`
//! - [`DebuggerStarter`]: asks a process to (re)start its inspector
//! - [`DebuggerPlugin`]: what a supervisor's command surface talks to
//!
//! # Example
//!
//! ```ignore
//! use devtools::{DebuggerPlugin, PluginOptions, Process};
//!
//! let plugin = DebuggerPlugin::with_devtools(Default::default(), Default::default(), PluginOptions::default());
//! let api = Process::new("api").with_pid(4242).with_inspector_url(Some("ws://127.0.0.1:9229/abc"));
//!
//! for (_key, command) in plugin.commands(&api) {
//!     command.toggle().await;
//! }
//! plugin.update(&api).await;
//! ```

pub mod browser;
pub mod client;
pub mod error;
pub mod page;
pub mod plugin;
pub mod process;
pub mod reconciler;
pub mod registry;
pub mod signal;
pub mod ui;

#[cfg(test)]
mod fake_browser;

pub use browser::{AcquiredPage, Browser, BrowserLauncher, BrowserManager, ChromiumLauncher};
pub use client::{ClientOptions, DevToolsClient, DevToolsFactory, FRONT_END_BASE_URL, front_end_url};
pub use devtools_runtime::LaunchOptions as BrowserLaunchOptions;
pub use error::{Error, Result};
pub use page::{Keyboard, Modifier, Page};
pub use plugin::{DEFAULT_KEY, DebuggerPlugin, LAUNCH_VERB, LaunchCommand, PluginOptions};
pub use process::{ChildProcess, Process};
pub use reconciler::{LaunchOptions, Reconciler, SessionState};
pub use registry::{Session, SessionId, SessionRegistry};
pub use signal::{DebuggerStarter, SignalStarter, process_alive};
pub use ui::{Invalidation, Invalidator, UiFactory, UiSession};
