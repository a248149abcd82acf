//! Dispatcher: reads calls from the host, runs handlers concurrently and
//! answers every request id exactly once.
//!
//! One reader (the task calling [`Dispatcher::run`]), one writer task and a
//! [`JoinSet`] of handler tasks. The reader never waits on a handler, so a
//! slow call does not hold up later ones; responses are written in
//! completion order.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::{FutureExt, StreamExt};
use galaxy_rpc::{
    CodecError, DEFAULT_MAX_LINE_LENGTH, ErrorKind, Incoming, LineCodec, Request, RequestId,
    Response, RpcError,
};
use serde_json::{Map, Value};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{Mutex, oneshot};
use tokio::task::{JoinError, JoinSet};
use tokio_util::codec::FramedRead;
use tracing::{debug, error, info, trace, warn};

use crate::error::PluginError;
use crate::notifier::{Notifier, Outbox, write_loop};
use crate::plugin::{Plugin, invoke};
use crate::registry::{Method, MethodSpec, resolve};

/// Lifecycle of a request id inside the dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Received,
    Dispatched,
    Completed,
    Failed,
    Sent,
}

/// In-flight request ids and their state
#[derive(Debug, Clone, Default)]
pub struct RequestLedger {
    inner: Arc<Mutex<HashMap<RequestId, RequestState>>>,
}

impl RequestLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a newly received request.
    ///
    /// Returns `false` if the id is already in flight.
    pub async fn register(&self, id: &RequestId) -> bool {
        let mut requests = self.inner.lock().await;
        if requests.contains_key(id) {
            return false;
        }
        requests.insert(id.clone(), RequestState::Received);
        trace!("request {}: received", id);
        true
    }

    pub async fn advance(&self, id: &RequestId, state: RequestState) {
        let mut requests = self.inner.lock().await;
        if let Some(current) = requests.get_mut(id) {
            trace!("request {}: {:?} -> {:?}", id, current, state);
            *current = state;
        }
    }

    /// Forget a request, freeing its id for reuse.
    pub async fn finish(&self, id: &RequestId) -> Option<RequestState> {
        self.inner.lock().await.remove(id)
    }

    pub async fn state(&self, id: &RequestId) -> Option<RequestState> {
        self.inner.lock().await.get(id).copied()
    }

    pub async fn in_flight(&self) -> usize {
        self.inner.lock().await.len()
    }
}

/// Errors that end a dispatcher run
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Transport error: {0}")]
    Transport(#[from] CodecError),

    #[error("Writer task failed: {0}")]
    Writer(#[from] JoinError),
}

/// Serves one host connection for a plugin
pub struct Dispatcher<P> {
    plugin: Arc<P>,
    notifier: Notifier,
    outbox: Outbox,
    ledger: RequestLedger,
    max_line_length: usize,
}

impl<P: Plugin> Dispatcher<P> {
    /// Create a dispatcher writing to the queue behind `notifier`.
    ///
    /// `outbox` must come from the same [`Notifier::channel`] call, so that
    /// responses and the plugin's own notifications share one writer.
    #[must_use]
    pub fn new(plugin: P, notifier: Notifier, outbox: Outbox) -> Self {
        Self {
            plugin: Arc::new(plugin),
            notifier,
            outbox,
            ledger: RequestLedger::new(),
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
        }
    }

    #[must_use]
    pub fn with_max_line_length(mut self, max_line_length: usize) -> Self {
        self.max_line_length = max_line_length;
        self
    }

    #[must_use]
    pub fn plugin(&self) -> Arc<P> {
        Arc::clone(&self.plugin)
    }

    #[must_use]
    pub fn ledger(&self) -> RequestLedger {
        self.ledger.clone()
    }

    /// Serve the host over this process's stdin and stdout.
    ///
    /// # Errors
    ///
    /// See [`Dispatcher::run`].
    pub async fn run_stdio(self) -> Result<(), DispatchError> {
        self.run(tokio::io::stdin(), tokio::io::stdout()).await
    }

    /// Read calls from `reader` until EOF or a `shutdown` notification,
    /// writing responses and notifications to `writer`.
    ///
    /// In-flight handlers are awaited and their responses written before the
    /// output is closed; [`Plugin::shutdown`] runs last.
    ///
    /// # Errors
    ///
    /// Returns an error if reading from the host fails or the writer task dies.
    pub async fn run<R, W>(self, reader: R, writer: W) -> Result<(), DispatchError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let Self {
            plugin,
            notifier,
            outbox,
            ledger,
            max_line_length,
        } = self;

        let (close_tx, close_rx) = oneshot::channel();
        let writer_task = tokio::spawn(write_loop(
            outbox,
            writer,
            LineCodec::with_max_line_length(max_line_length),
            close_rx,
        ));

        let intake = Intake {
            plugin: Arc::clone(&plugin),
            notifier,
            ledger,
        };
        let mut frames = FramedRead::new(reader, LineCodec::with_max_line_length(max_line_length));
        let mut tasks = JoinSet::new();
        let mut result = Ok(());

        debug!("Dispatcher started");
        loop {
            tokio::select! {
                frame = frames.next() => match frame {
                    None => {
                        debug!("Input closed by host");
                        break;
                    }
                    Some(Err(e)) => {
                        error!("Failed to read from host: {}", e);
                        result = Err(DispatchError::from(e));
                        break;
                    }
                    Some(Ok(Err(e))) => warn!("Dropping malformed line: {}", e),
                    Some(Ok(Ok(value))) => {
                        if intake.accept(value, &mut tasks).await == Flow::Stop {
                            break;
                        }
                    }
                },
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => log_join(joined),
            }
        }

        if !tasks.is_empty() {
            debug!("Draining {} in-flight calls", tasks.len());
        }
        while let Some(joined) = tasks.join_next().await {
            log_join(joined);
        }
        drop(intake);

        if close_tx.send(()).is_err() {
            debug!("Writer already stopped");
        }
        let writer_result = writer_task.await;

        if let Err(e) = plugin.shutdown().await {
            warn!("Plugin shutdown failed: {}", e);
        }
        info!("Dispatcher stopped");

        result?;
        writer_result?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

struct Intake<P> {
    plugin: Arc<P>,
    notifier: Notifier,
    ledger: RequestLedger,
}

impl<P: Plugin> Intake<P> {
    async fn accept(&self, value: Value, tasks: &mut JoinSet<()>) -> Flow {
        match Incoming::from_value(value) {
            Ok(Incoming::Request(request) | Incoming::Notification(request)) => {
                self.dispatch(request, tasks).await
            }
            Ok(Incoming::Response(id)) => {
                debug!("Ignoring response document (id={:?})", id);
                Flow::Continue
            }
            Err(e) => {
                if let Some(id) = e.id() {
                    warn!("Invalid request {}: {}", id, e);
                    self.respond(Response::error(id.clone(), RpcError::unknown_error()));
                } else {
                    warn!("Dropping invalid message: {}", e);
                }
                Flow::Continue
            }
        }
    }

    async fn dispatch(&self, request: Request, tasks: &mut JoinSet<()>) -> Flow {
        let Request {
            method, params, id, ..
        } = request;

        let Some(spec) = resolve(&method) else {
            let err = PluginError::MethodNotFound(method);
            if let Some(id) = id {
                warn!("Request {}: {}", id, err);
                self.respond(Response::error(id, err.into()));
            } else {
                debug!("Notification dropped: {}", err);
            }
            return Flow::Continue;
        };

        if spec.method == Method::Shutdown {
            info!("Shutdown requested by host");
            if let Some(id) = id {
                self.respond(Response::success(id, Value::Null));
            }
            return Flow::Stop;
        }

        let Some(id) = id else {
            debug!("Dispatching notification {}", spec.name);
            let plugin = Arc::clone(&self.plugin);
            tasks.spawn(async move {
                if let Err(e) = call(&*plugin, spec, params).await {
                    debug!("Notification {} failed: {}", spec.name, e);
                }
            });
            return Flow::Continue;
        };

        if !self.ledger.register(&id).await {
            warn!("Dropping request {}: id already in flight", id);
            return Flow::Continue;
        }
        debug!("Dispatching request {} ({})", id, spec.name);
        self.ledger.advance(&id, RequestState::Dispatched).await;

        let plugin = Arc::clone(&self.plugin);
        let notifier = self.notifier.clone();
        let ledger = self.ledger.clone();
        tasks.spawn(async move {
            let response = match call(&*plugin, spec, params).await {
                Ok(result) => {
                    ledger.advance(&id, RequestState::Completed).await;
                    Response::success(id.clone(), result)
                }
                Err(e) => {
                    ledger.advance(&id, RequestState::Failed).await;
                    if e.kind() == ErrorKind::UnknownError {
                        warn!("Request {} ({}) failed: {}", id, spec.name, e);
                    } else {
                        debug!("Request {} ({}) failed: {}", id, spec.name, e);
                    }
                    Response::error(id.clone(), e.into())
                }
            };

            // The id must be free before the host can see the response
            ledger.advance(&id, RequestState::Sent).await;
            ledger.finish(&id).await;
            if let Err(e) = notifier.send(response.into()) {
                warn!("Dropping response for request {}: {}", id, e);
            }
        });

        Flow::Continue
    }

    fn respond(&self, response: Response) {
        if let Err(e) = self.notifier.send(response.into()) {
            warn!("Dropping response: {}", e);
        }
    }
}

/// Run a handler, turning a panic into [`PluginError::Panicked`].
async fn call<P: Plugin>(
    plugin: &P,
    spec: &'static MethodSpec,
    params: Option<Map<String, Value>>,
) -> Result<Value, PluginError> {
    AssertUnwindSafe(invoke(plugin, spec, params))
        .catch_unwind()
        .await
        .unwrap_or(Err(PluginError::Panicked))
}

fn log_join(joined: Result<(), JoinError>) {
    if let Err(e) = joined {
        error!("Handler task failed: {}", e);
    }
}
