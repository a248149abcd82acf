//! Galaxy integration plugin runtime.
//!
//! Connects a [`Plugin`] implementation to the host over a line-delimited
//! JSON-RPC stream: the [`Dispatcher`] routes host calls to handlers through
//! the method [`registry`], and a [`Notifier`] pushes plugin-side events.
//!
//! ```no_run
//! use galaxy_plugin::{Dispatcher, MemoryChat, Notifier, config::ChatConfig};
//!
//! # async fn example() -> Result<(), galaxy_plugin::DispatchError> {
//! let (notifier, outbox) = Notifier::channel();
//! let plugin = MemoryChat::new(ChatConfig::default(), notifier.clone());
//!
//! Dispatcher::new(plugin, notifier, outbox).run_stdio().await
//! # }
//! ```

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod memory;
pub mod notifier;
pub mod plugin;
pub mod registry;

pub use config::{Config, ConfigError, Directories};
pub use dispatcher::{DispatchError, Dispatcher, RequestLedger, RequestState};
pub use error::{PluginError, Result};
pub use memory::MemoryChat;
pub use notifier::{NotifyError, Notifier, Outbox};
pub use plugin::{Plugin, invoke};
pub use registry::{BindError, METHODS, Method, MethodSpec, resolve};

pub use galaxy_rpc::ErrorKind;
pub use galaxy_types::*;
