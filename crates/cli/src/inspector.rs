//! Discovery of a V8 inspector's WebSocket URL over its HTTP endpoint.

use std::time::Duration;

use serde::Deserialize;

use crate::error::{CliError, Result};

const REQUEST_TIMEOUT: Duration = Duration::from_millis(400);

/// One entry of the inspector's `/json/list` response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InspectorTarget {
	pub id: String,
	#[serde(default)]
	pub title: String,
	#[serde(rename = "type", default)]
	pub kind: String,
	/// Absent while another client holds the session on some runtimes.
	pub web_socket_debugger_url: Option<String>,
}

/// First target that can be debugged.
pub fn select_debugger_url(targets: &[InspectorTarget]) -> Option<&str> {
	targets
		.iter()
		.filter_map(|target| target.web_socket_debugger_url.as_deref())
		.find(|url| !url.is_empty())
}

/// Polls `http://HOST:PORT/json/list`.
#[derive(Debug, Clone)]
pub struct InspectorProbe {
	client: reqwest::Client,
	list_url: String,
}

impl InspectorProbe {
	/// `endpoint` is `HOST:PORT`.
	pub fn new(endpoint: &str) -> Result<Self> {
		let valid = endpoint
			.rsplit_once(':')
			.is_some_and(|(host, port)| !host.is_empty() && port.parse::<u16>().is_ok());
		if !valid {
			return Err(CliError::InspectorAddress(endpoint.to_string()));
		}

		let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
		Ok(Self {
			client,
			list_url: format!("http://{endpoint}/json/list"),
		})
	}

	pub fn list_url(&self) -> &str {
		&self.list_url
	}

	/// Lists the inspector's targets.
	pub async fn targets(&self) -> Result<Vec<InspectorTarget>> {
		let response = self.client.get(&self.list_url).send().await?.error_for_status()?;
		Ok(response.json().await?)
	}

	/// The current debugger URL, or `None` while no inspector is listening.
	pub async fn current_url(&self) -> Option<String> {
		match self.targets().await {
			Ok(targets) => select_debugger_url(&targets).map(str::to_string),
			Err(e) => {
				tracing::trace!(url = %self.list_url, error = %e, "inspector not reachable");
				None
			}
		}
	}
}
