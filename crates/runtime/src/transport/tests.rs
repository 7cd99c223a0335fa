use futures_util::{SinkExt, StreamExt};
use tokio::io::DuplexStream;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::tungstenite::protocol::Role;

use super::*;

async fn socket_pair() -> (WebSocketStream<DuplexStream>, WebSocketStream<DuplexStream>) {
	let (client, server) = tokio::io::duplex(64 * 1024);
	let client = WebSocketStream::from_raw_socket(client, Role::Client, None).await;
	let server = WebSocketStream::from_raw_socket(server, Role::Server, None).await;
	(client, server)
}

#[tokio::test]
async fn test_send_writes_one_text_frame_per_message() {
	let (client, mut server) = socket_pair().await;
	let TransportParts { mut sender, .. } = WebSocketTransport::from_stream(client);

	let message = serde_json::json!({"id": 1, "method": "Target.getTargets", "params": {}});
	sender.send(message.clone()).await.unwrap();

	match server.next().await.unwrap().unwrap() {
		WsMessage::Text(text) => {
			let received: Value = serde_json::from_str(&text).unwrap();
			assert_eq!(received, message);
		}
		other => panic!("Expected text frame, got {other:?}"),
	}
}

#[tokio::test]
async fn test_receiver_forwards_messages_in_order() {
	let (client, mut server) = socket_pair().await;
	let TransportParts {
		receiver,
		mut message_rx,
		..
	} = WebSocketTransport::from_stream(client);

	let read_task = tokio::spawn(receiver.run());

	let messages = vec![
		serde_json::json!({"id": 1, "result": {}}),
		serde_json::json!({"method": "Target.targetDestroyed", "params": {"targetId": "A"}}),
		serde_json::json!({"id": 2, "result": {"sessionId": "S"}}),
	];
	for msg in &messages {
		server.send(WsMessage::Text(msg.to_string())).await.unwrap();
	}

	for expected in &messages {
		let received = message_rx.recv().await.unwrap();
		assert_eq!(&received, expected);
	}

	server.close(None).await.unwrap();
	assert!(read_task.await.unwrap().is_ok());
	assert!(message_rx.recv().await.is_none());
}

#[tokio::test]
async fn test_receiver_skips_garbage_frames() {
	let (client, mut server) = socket_pair().await;
	let TransportParts {
		receiver,
		mut message_rx,
		..
	} = WebSocketTransport::from_stream(client);

	tokio::spawn(receiver.run());

	server.send(WsMessage::Text("not json".to_string())).await.unwrap();
	server
		.send(WsMessage::Text(r#"{"id": 7, "result": {}}"#.to_string()))
		.await
		.unwrap();

	let received = message_rx.recv().await.unwrap();
	assert_eq!(received["id"], 7);
}
