//! DevTools protocol connection layer.
//!
//! Implements request/response correlation and event fan-out on top of a
//! [`Transport`](crate::transport::Transport):
//! - Generating unique request IDs
//! - Correlating responses with pending requests
//! - Routing commands to flattened target sessions via `sessionId`
//! - Broadcasting events to any number of subscribers
//!
//! # Message Flow
//!
//! 1. Caller invokes [`Connection::send`] with an optional session, method and params
//! 2. Connection allocates an ID and parks a oneshot sender under it
//! 3. Request is serialized and queued for the writer task
//! 4. Caller awaits the oneshot receiver
//! 5. Dispatch loop correlates the response by ID and completes the oneshot
//!
//! When the socket closes every pending request fails with
//! [`Error::ChannelClosed`] and [`Connection::closed`] flips to `true`.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex as TokioMutex;
use tokio::sync::{broadcast, mpsc, oneshot, watch};

use crate::error::{Error, Result};
use crate::transport::{Transport, TransportParts, TransportReceiver, WebSocketTransport};

/// Capacity of the event broadcast channel.
const EVENT_CAPACITY: usize = 1024;

/// Protocol request message sent to the browser.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
	/// Unique request ID for correlating responses
	pub id: u64,
	/// Domain-qualified method name (e.g. `Page.navigate`)
	pub method: String,
	/// Method parameters as JSON object
	pub params: Value,
	/// Flattened target session the command is addressed to
	#[serde(rename = "sessionId", skip_serializing_if = "Option::is_none")]
	pub session_id: Option<String>,
}

/// Protocol response message from the browser.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
	/// Request ID this response correlates to
	pub id: u64,
	/// Success result (mutually exclusive with error)
	#[serde(skip_serializing_if = "Option::is_none")]
	pub result: Option<Value>,
	/// Error result (mutually exclusive with result)
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<ErrorPayload>,
	#[serde(rename = "sessionId", skip_serializing_if = "Option::is_none")]
	pub session_id: Option<String>,
}

/// Protocol error details.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPayload {
	pub code: i64,
	pub message: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub data: Option<String>,
}

/// Protocol event message from the browser.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
	/// Event method name (e.g. `Target.targetDestroyed`)
	pub method: String,
	/// Event parameters
	#[serde(default)]
	pub params: Value,
	/// Session the event originated from, absent for browser-level events
	#[serde(rename = "sessionId", default, skip_serializing_if = "Option::is_none")]
	pub session_id: Option<String>,
}

impl Event {
	/// Returns true if the event came from the given target session.
	pub fn is_from(&self, session_id: &str) -> bool {
		self.session_id.as_deref() == Some(session_id)
	}
}

/// Discriminated union of protocol messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Message {
	/// Response message (has `id` field)
	Response(Response),
	/// Event message (has `method`, no `id`)
	Event(Event),
	/// Unknown message type (forward-compatible catch-all)
	Unknown(Value),
}

struct Pending {
	method: String,
	tx: oneshot::Sender<Result<Value>>,
}

/// Pending request callbacks keyed by request ID; `None` once the connection closed.
type CallbackMap = Arc<Mutex<Option<HashMap<u64, Pending>>>>;

/// RAII guard ensuring callback cleanup when a request future is dropped.
struct CancelGuard {
	id: u64,
	callbacks: CallbackMap,
	completed: bool,
}

impl CancelGuard {
	fn new(id: u64, callbacks: CallbackMap) -> Self {
		Self {
			id,
			callbacks,
			completed: false,
		}
	}

	fn complete(&mut self) {
		self.completed = true;
	}
}

impl Drop for CancelGuard {
	fn drop(&mut self) {
		if self.completed {
			return;
		}

		if let Some(map) = self.callbacks.lock().as_mut() {
			if map.remove(&self.id).is_some() {
				tracing::debug!(id = self.id, "CancelGuard: removed orphaned callback");
			}
		}
	}
}

/// Future returned by [`Connection::send`] with automatic cancellation cleanup.
struct ResponseFuture {
	rx: oneshot::Receiver<Result<Value>>,
	guard: CancelGuard,
}

impl Future for ResponseFuture {
	type Output = Result<Value>;

	fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		match Pin::new(&mut self.rx).poll(cx) {
			Poll::Ready(result) => {
				self.guard.complete();
				Poll::Ready(result.map_err(|_| Error::ChannelClosed).and_then(|r| r))
			}
			Poll::Pending => Poll::Pending,
		}
	}
}

/// Connection to a browser's DevTools endpoint.
///
/// Uses sequential request IDs and oneshot channels for correlation.
pub struct Connection {
	/// Sequential request ID counter
	last_id: AtomicU64,
	/// Pending request callbacks keyed by request ID
	callbacks: CallbackMap,
	/// Channel for sending outbound messages to the writer task
	outbound_tx: mpsc::UnboundedSender<Value>,
	/// Transport halves and channels, taken once by `run()`
	transport_sender: TokioMutex<Option<Box<dyn Transport>>>,
	transport_receiver: TokioMutex<Option<Box<dyn TransportReceiver>>>,
	message_rx: TokioMutex<Option<mpsc::UnboundedReceiver<Value>>>,
	outbound_rx: TokioMutex<Option<mpsc::UnboundedReceiver<Value>>>,
	/// Event fan-out
	events: broadcast::Sender<Event>,
	/// Flips to `true` once the socket is gone
	closed: watch::Sender<bool>,
}

impl Connection {
	/// Creates a new Connection over the given transport.
	pub fn new(parts: TransportParts) -> Self {
		let TransportParts {
			sender,
			receiver,
			message_rx,
		} = parts;

		let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
		let (events, _) = broadcast::channel(EVENT_CAPACITY);
		let (closed, _) = watch::channel(false);

		Self {
			last_id: AtomicU64::new(0),
			callbacks: Arc::new(Mutex::new(Some(HashMap::new()))),
			outbound_tx,
			transport_sender: TokioMutex::new(Some(sender)),
			transport_receiver: TokioMutex::new(Some(receiver)),
			message_rx: TokioMutex::new(Some(message_rx)),
			outbound_rx: TokioMutex::new(Some(outbound_rx)),
			events,
			closed,
		}
	}

	/// Connects to `ws_endpoint` and spawns the dispatch loop.
	pub async fn open(ws_endpoint: &str) -> Result<Arc<Self>> {
		let parts = WebSocketTransport::connect(ws_endpoint).await?;
		let connection = Arc::new(Self::new(parts));

		let runner = Arc::clone(&connection);
		tokio::spawn(async move {
			if let Err(e) = runner.run().await {
				tracing::error!(target = "devtools.connection", error = %e, "dispatch loop failed");
			}
		});

		Ok(connection)
	}

	/// Sends a command and awaits its result.
	///
	/// `session_id` addresses a flattened target session; `None` talks to the
	/// browser target itself.
	pub async fn send(&self, session_id: Option<&str>, method: &str, params: Value) -> Result<Value> {
		let id = self.last_id.fetch_add(1, Ordering::SeqCst);

		tracing::debug!(target = "devtools.connection", id, method, session = ?session_id, "sending command");

		let (tx, rx) = oneshot::channel();
		{
			let mut callbacks = self.callbacks.lock();
			let map = callbacks.as_mut().ok_or(Error::ChannelClosed)?;
			map.insert(
				id,
				Pending {
					method: method.to_string(),
					tx,
				},
			);
		}

		let guard = CancelGuard::new(id, Arc::clone(&self.callbacks));

		let request = Request {
			id,
			method: method.to_string(),
			params,
			session_id: session_id.map(str::to_string),
		};

		if self.outbound_tx.send(serde_json::to_value(&request)?).is_err() {
			tracing::error!(target = "devtools.connection", "Failed to queue message: outbound channel closed");
			return Err(Error::ChannelClosed);
		}

		ResponseFuture { rx, guard }.await
	}

	/// Subscribes to every event received from now on.
	pub fn subscribe(&self) -> broadcast::Receiver<Event> {
		self.events.subscribe()
	}

	/// Returns a watch that flips to `true` when the socket closes.
	pub fn closed(&self) -> watch::Receiver<bool> {
		self.closed.subscribe()
	}

	/// Returns true once the socket has closed.
	pub fn is_closed(&self) -> bool {
		*self.closed.borrow()
	}

	/// Runs the message dispatch loop until the socket closes.
	///
	/// May only be called once per connection.
	pub async fn run(self: &Arc<Self>) -> Result<()> {
		let already_running = || Error::ProtocolError("run() can only be called once".to_string());

		let transport_receiver = self.transport_receiver.lock().await.take().ok_or_else(already_running)?;
		let mut transport_sender = self.transport_sender.lock().await.take().ok_or_else(already_running)?;
		let mut outbound_rx = self.outbound_rx.lock().await.take().ok_or_else(already_running)?;
		let mut message_rx = self.message_rx.lock().await.take().ok_or_else(already_running)?;

		let reader_handle = tokio::spawn(async move {
			if let Err(e) = transport_receiver.run().await {
				tracing::warn!(target = "devtools.connection", error = %e, "transport read error");
			}
		});

		let writer_handle = tokio::spawn(async move {
			while let Some(message) = outbound_rx.recv().await {
				if let Err(e) = transport_sender.send(message).await {
					tracing::warn!(target = "devtools.connection", error = %e, "transport write error");
					break;
				}
			}
		});

		while let Some(message_value) = message_rx.recv().await {
			match serde_json::from_value::<Message>(message_value) {
				Ok(message) => {
					if let Err(e) = self.dispatch_internal(message) {
						tracing::debug!(target = "devtools.connection", error = %e, "dispatch error");
					}
				}
				Err(e) => {
					tracing::warn!(target = "devtools.connection", error = %e, "failed to parse message");
				}
			}
		}

		let _ = reader_handle.await;
		writer_handle.abort();
		self.shutdown();

		Ok(())
	}

	/// Dispatches an incoming message (test-only public version).
	#[cfg(test)]
	pub fn dispatch(&self, message: Message) -> Result<()> {
		self.dispatch_internal(message)
	}

	fn dispatch_internal(&self, message: Message) -> Result<()> {
		match message {
			Message::Response(response) => {
				let pending = self
					.callbacks
					.lock()
					.as_mut()
					.and_then(|map| map.remove(&response.id))
					.ok_or_else(|| Error::ProtocolError(format!("Cannot find request to respond: id={}", response.id)))?;

				let result = match response.error {
					Some(error) => Err(parse_protocol_error(pending.method, error)),
					None => Ok(response.result.unwrap_or(Value::Null)),
				};

				let _ = pending.tx.send(result);
				Ok(())
			}
			Message::Event(event) => {
				tracing::trace!(target = "devtools.connection", method = %event.method, session = ?event.session_id, "event");
				// No subscribers is fine.
				let _ = self.events.send(event);
				Ok(())
			}
			Message::Unknown(value) => {
				tracing::debug!(
					target = "devtools.connection",
					"Unknown message type (ignored): {}",
					serde_json::to_string(&value).unwrap_or_else(|_| "<serialization failed>".to_string())
				);
				Ok(())
			}
		}
	}

	/// Marks the connection closed and fails all pending requests.
	fn shutdown(&self) {
		// Dropping the senders resolves every waiter with `ChannelClosed`.
		let pending = self.callbacks.lock().take();
		if let Some(pending) = pending {
			if !pending.is_empty() {
				tracing::debug!(target = "devtools.connection", count = pending.len(), "failing pending requests");
			}
		}
		self.closed.send_replace(true);
	}
}

/// Converts an [`ErrorPayload`] into [`Error::Remote`].
fn parse_protocol_error(method: String, error: ErrorPayload) -> Error {
	let message = match error.data {
		Some(data) => format!("{} ({data})", error.message),
		None => error.message,
	};
	Error::Remote {
		method,
		code: error.code,
		message,
	}
}
