//! Line-delimited JSON-RPC 2.0 protocol definitions for Galaxy integration plugins.
//!
//! The host launches a plugin and talks to it over the plugin's stdin/stdout,
//! one JSON document per line.
//!
//! # Architecture
//!
//! - [`protocol`]: envelope types (Request, Response, Notification) and
//!   classification of inbound documents
//! - [`transport`]: newline codec for message framing
//! - [`errors`]: the closed table of error kinds and their wire codes
//!
//! # Example
//!
//! ```
//! use galaxy_rpc::{ErrorKind, Incoming, Response, RpcError};
//!
//! let incoming = Incoming::parse(r#"{"jsonrpc":"2.0","method":"import_rooms","id":"3"}"#).unwrap();
//! let Incoming::Request(request) = incoming else { unreachable!() };
//!
//! let id = request.id.expect("request carries an id");
//! let response = Response::error(id, RpcError::from(ErrorKind::BackendError));
//! assert!(response.is_error());
//! ```

pub mod errors;
pub mod protocol;
pub mod transport;

pub use errors::ErrorKind;

pub use protocol::{
    EnvelopeError, Incoming, JSONRPC_VERSION, Message, Notification, Outcome, ParseError, Request,
    RequestId, Response, RpcError, json_type_name,
};

pub use transport::{CodecError, DEFAULT_MAX_LINE_LENGTH, Frame, FrameError, LineCodec};
