//! WebSocket transport for the DevTools protocol.
//!
//! The browser exposes one WebSocket per browser instance. Each text frame
//! carries exactly one JSON message, so unlike a pipe transport no length
//! framing is needed: the receiver half parses frames and forwards the values
//! over an unbounded channel, the sender half serializes values into frames.

use std::future::Future;
use std::pin::Pin;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;

use crate::error::{Error, Result};

/// Outbound half of a transport.
pub trait Transport: Send {
	/// Sends one JSON message to the browser.
	fn send(&mut self, message: Value) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Inbound half of a transport.
pub trait TransportReceiver: Send {
	/// Reads messages until the peer goes away, forwarding each one.
	fn run(self: Box<Self>) -> Pin<Box<dyn Future<Output = Result<()>> + Send>>;
}

/// Both transport halves plus the channel inbound messages are delivered on.
pub struct TransportParts {
	pub sender: Box<dyn Transport>,
	pub receiver: Box<dyn TransportReceiver>,
	pub message_rx: mpsc::UnboundedReceiver<Value>,
}

/// Entry point for WebSocket-backed transports.
pub struct WebSocketTransport;

impl WebSocketTransport {
	/// Connects to a `ws://` endpoint such as the one printed by
	/// `--remote-debugging-port`.
	pub async fn connect(url: &str) -> Result<TransportParts> {
		let (stream, _) = tokio_tungstenite::connect_async(url)
			.await
			.map_err(|e| Error::ConnectionFailed(format!("{url}: {e}")))?;
		tracing::debug!(target = "devtools.transport", %url, "websocket connected");
		Ok(Self::from_stream(stream))
	}

	/// Splits an established WebSocket stream into transport parts.
	pub fn from_stream<S>(stream: WebSocketStream<S>) -> TransportParts
	where
		S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
	{
		let (sink, stream) = stream.split();
		let (message_tx, message_rx) = mpsc::unbounded_channel();

		TransportParts {
			sender: Box::new(WebSocketSender { sink }),
			receiver: Box::new(WebSocketReceiver { stream, message_tx }),
			message_rx,
		}
	}
}

/// Sender half of [`WebSocketTransport`].
pub struct WebSocketSender<S> {
	sink: SplitSink<WebSocketStream<S>, WsMessage>,
}

impl<S> Transport for WebSocketSender<S>
where
	S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
	fn send(&mut self, message: Value) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
		Box::pin(async move {
			let text = serde_json::to_string(&message)?;
			self.sink
				.send(WsMessage::Text(text))
				.await
				.map_err(|e| Error::TransportError(format!("Failed to write frame: {e}")))
		})
	}
}

/// Receiver half of [`WebSocketTransport`].
pub struct WebSocketReceiver<S> {
	stream: SplitStream<WebSocketStream<S>>,
	message_tx: mpsc::UnboundedSender<Value>,
}

impl<S> WebSocketReceiver<S>
where
	S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
	fn forward(&self, payload: &[u8]) {
		match serde_json::from_slice::<Value>(payload) {
			Ok(value) => {
				// Receiver gone means the connection is shutting down.
				let _ = self.message_tx.send(value);
			}
			Err(e) => {
				tracing::warn!(target = "devtools.transport", error = %e, "dropping unparseable frame");
			}
		}
	}

	async fn read_loop(mut self) -> Result<()> {
		while let Some(frame) = self.stream.next().await {
			match frame {
				Ok(WsMessage::Text(text)) => self.forward(text.as_bytes()),
				Ok(WsMessage::Binary(bytes)) => self.forward(&bytes),
				Ok(WsMessage::Close(reason)) => {
					tracing::debug!(target = "devtools.transport", ?reason, "websocket closed by peer");
					break;
				}
				Ok(_) => {}
				Err(e) => return Err(Error::TransportError(format!("Failed to read frame: {e}"))),
			}
		}
		Ok(())
	}
}

impl<S> TransportReceiver for WebSocketReceiver<S>
where
	S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
	fn run(self: Box<Self>) -> Pin<Box<dyn Future<Output = Result<()>> + Send>> {
		Box::pin((*self).read_loop())
	}
}

#[cfg(test)]
mod tests;
