//! Scripted DevTools peer standing in for Chromium in unit tests.
//!
//! The peer answers the handful of commands pages and clients issue, fires
//! `Page.loadEventFired` after every navigation and records what it received.

use std::sync::Arc;

use async_trait::async_trait;
use devtools_runtime::{Connection, Request, WebSocketTransport};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::io::DuplexStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::tungstenite::protocol::Role;

use crate::browser::{Browser, BrowserLauncher};
use crate::error::Result;

/// A command the peer received.
#[derive(Debug, Clone)]
pub(crate) struct Received {
	pub method: String,
	pub session_id: Option<String>,
	pub params: Value,
}

struct Script {
	/// Answer to every visibility poll.
	selectors_visible: bool,
	created_targets: u32,
}

impl Script {
	fn answer(&mut self, request: &Request) -> Vec<Value> {
		let reply = |result: Value| {
			let mut response = json!({ "id": request.id, "result": result });
			if let Some(session_id) = &request.session_id {
				response["sessionId"] = json!(session_id);
			}
			response
		};

		match request.method.as_str() {
			"Target.getTargets" => vec![reply(json!({
				"targetInfos": [
					{ "targetId": "B", "type": "browser" },
					{ "targetId": "T0", "type": "page", "url": "about:blank" },
				]
			}))],
			"Target.createTarget" => {
				self.created_targets += 1;
				vec![reply(json!({ "targetId": format!("T{}", self.created_targets) }))]
			}
			"Target.attachToTarget" => {
				let target_id = request.params["targetId"].as_str().unwrap_or_default();
				vec![reply(json!({ "sessionId": format!("S-{target_id}") }))]
			}
			"Page.navigate" => vec![
				reply(json!({ "frameId": "F" })),
				json!({
					"method": "Page.loadEventFired",
					"sessionId": request.session_id,
					"params": { "timestamp": 1.0 },
				}),
			],
			"Runtime.evaluate" => {
				let expression = request.params["expression"].as_str().unwrap_or_default();
				let result = if expression.contains("document.querySelector") {
					json!({ "type": "boolean", "value": self.selectors_visible })
				} else {
					json!({ "type": "undefined" })
				};
				vec![reply(json!({ "result": result }))]
			}
			_ => vec![reply(json!({}))],
		}
	}
}

async fn serve(
	mut socket: WebSocketStream<DuplexStream>,
	mut injected: mpsc::UnboundedReceiver<Value>,
	received: Arc<Mutex<Vec<Received>>>,
	mut script: Script,
) {
	loop {
		let outgoing = tokio::select! {
			frame = socket.next() => match frame {
				Some(Ok(WsMessage::Text(text))) => {
					let Ok(request) = serde_json::from_str::<Request>(&text) else {
						continue;
					};
					received.lock().push(Received {
						method: request.method.clone(),
						session_id: request.session_id.clone(),
						params: request.params.clone(),
					});
					script.answer(&request)
				}
				Some(Ok(_)) => continue,
				_ => return,
			},
			Some(event) = injected.recv() => vec![event],
		};

		for message in outgoing {
			if socket.send(WsMessage::Text(message.to_string())).await.is_err() {
				return;
			}
		}
	}
}

/// One scripted browser connection.
pub(crate) struct FakeBrowser {
	connection: Arc<Connection>,
	received: Arc<Mutex<Vec<Received>>>,
	injected: mpsc::UnboundedSender<Value>,
	peer: JoinHandle<()>,
}

impl FakeBrowser {
	pub async fn start(selectors_visible: bool) -> Self {
		let (client, server) = tokio::io::duplex(64 * 1024);
		let client = WebSocketStream::from_raw_socket(client, Role::Client, None).await;
		let server = WebSocketStream::from_raw_socket(server, Role::Server, None).await;

		let connection = Arc::new(Connection::new(WebSocketTransport::from_stream(client)));
		let runner = Arc::clone(&connection);
		tokio::spawn(async move {
			let _ = runner.run().await;
		});

		let received = Arc::new(Mutex::new(Vec::new()));
		let (injected, injected_rx) = mpsc::unbounded_channel();
		let script = Script {
			selectors_visible,
			created_targets: 0,
		};
		let peer = tokio::spawn(serve(server, injected_rx, Arc::clone(&received), script));

		Self {
			connection,
			received,
			injected,
			peer,
		}
	}

	pub fn connection(&self) -> Arc<Connection> {
		Arc::clone(&self.connection)
	}

	pub fn received(&self) -> Vec<Received> {
		self.received.lock().clone()
	}

	/// Methods received on one tab session, in order.
	pub fn methods_on(&self, session_id: &str) -> Vec<String> {
		self.received()
			.into_iter()
			.filter(|r| r.session_id.as_deref() == Some(session_id))
			.map(|r| r.method)
			.collect()
	}

	/// Parameters of every command `method` received on `session_id`.
	pub fn params_of(&self, session_id: &str, method: &str) -> Vec<Value> {
		self.received()
			.into_iter()
			.filter(|r| r.session_id.as_deref() == Some(session_id) && r.method == method)
			.map(|r| r.params)
			.collect()
	}

	/// `(type, key)` of every key event dispatched on `session_id`.
	pub fn key_events_on(&self, session_id: &str) -> Vec<(String, String)> {
		self.params_of(session_id, "Input.dispatchKeyEvent")
			.into_iter()
			.map(|p| {
				(
					p["type"].as_str().unwrap_or_default().to_string(),
					p["key"].as_str().unwrap_or_default().to_string(),
				)
			})
			.collect()
	}

	/// Sends a browser-level event to the client.
	pub fn emit(&self, method: &str, params: Value) {
		let _ = self.injected.send(json!({ "method": method, "params": params }));
	}

	/// Drops the socket as if the user quit the browser and waits until the
	/// connection notices.
	pub async fn quit(&self) {
		self.peer.abort();
		let mut closed = self.connection.closed();
		let _ = closed.wait_for(|closed| *closed).await;
	}
}

/// Launcher handing out [`FakeBrowser`]s and keeping each for inspection.
#[derive(Clone)]
pub(crate) struct FakeLauncher {
	selectors_visible: bool,
	launched: Arc<Mutex<Vec<Arc<FakeBrowser>>>>,
}

impl FakeLauncher {
	pub fn new(selectors_visible: bool) -> Self {
		Self {
			selectors_visible,
			launched: Arc::new(Mutex::new(Vec::new())),
		}
	}

	pub fn launched(&self) -> Vec<Arc<FakeBrowser>> {
		self.launched.lock().clone()
	}

	pub fn last(&self) -> Arc<FakeBrowser> {
		self.launched().last().cloned().expect("no browser launched")
	}
}

#[async_trait]
impl BrowserLauncher for FakeLauncher {
	async fn launch(&self) -> Result<Browser> {
		let fake = Arc::new(FakeBrowser::start(self.selectors_visible).await);
		let browser = Browser::connect(fake.connection()).await?;
		self.launched.lock().push(fake);
		Ok(browser)
	}
}
