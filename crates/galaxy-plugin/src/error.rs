//! Error types for plugin handlers.

use galaxy_rpc::{ErrorKind, RpcError};
use serde_json::Value;

use crate::registry::BindError;

/// Errors raised by plugin handlers and the dispatch path around them
#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    /// Failure with a kind from the host's error table
    #[error("{0}")]
    Kind(ErrorKind),

    /// Failure with a table kind and a `data` payload for the host
    #[error("{kind}")]
    KindWithData { kind: ErrorKind, data: Value },

    /// Handler not provided by this plugin
    #[error("Method not implemented: {0}")]
    NotImplemented(&'static str),

    /// Params did not match the method's declared schema
    #[error("Invalid parameters: {0}")]
    InvalidParams(#[from] BindError),

    /// Method name not in the registry
    #[error("Method not found: {0}")]
    MethodNotFound(String),

    /// Handler panicked while running
    #[error("Handler panicked")]
    Panicked,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PluginError {
    #[must_use]
    pub fn kind_with_data(kind: ErrorKind, data: Value) -> Self {
        PluginError::KindWithData { kind, data }
    }

    /// Wire kind reported to the host for this failure.
    ///
    /// An [`anyhow::Error`] keeps the kind of the first table error found in
    /// its cause chain, so adding context does not hide it.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            PluginError::Kind(kind) | PluginError::KindWithData { kind, .. } => *kind,
            PluginError::Other(err) => err
                .chain()
                .find_map(|cause| {
                    cause
                        .downcast_ref::<PluginError>()
                        .map(PluginError::kind)
                        .filter(|kind| *kind != ErrorKind::UnknownError)
                        .or_else(|| cause.downcast_ref::<ErrorKind>().copied())
                })
                .unwrap_or(ErrorKind::UnknownError),
            PluginError::NotImplemented(_)
            | PluginError::InvalidParams(_)
            | PluginError::MethodNotFound(_)
            | PluginError::Panicked
            | PluginError::Io(_)
            | PluginError::Json(_) => ErrorKind::UnknownError,
        }
    }

    /// `data` payload for the host, looking through anyhow context too.
    fn data(&self) -> Option<&Value> {
        match self {
            PluginError::KindWithData { data, .. } => Some(data),
            PluginError::Other(err) => err
                .chain()
                .find_map(|cause| cause.downcast_ref::<PluginError>()?.data()),
            _ => None,
        }
    }
}

impl From<ErrorKind> for PluginError {
    fn from(kind: ErrorKind) -> Self {
        PluginError::Kind(kind)
    }
}

impl From<PluginError> for RpcError {
    fn from(err: PluginError) -> Self {
        let kind = err.kind();
        match err.data() {
            Some(data) => RpcError::with_data(kind.code(), kind.message(), data.clone()),
            None => RpcError::from(kind),
        }
    }
}

pub type Result<T> = std::result::Result<T, PluginError>;
