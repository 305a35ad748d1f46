use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::accept_async;

use super::*;
use crate::queue::MessageQueue;

async fn bind() -> (TcpListener, String) {
	let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
	let uri = format!("ws://{}", listener.local_addr().unwrap());
	(listener, uri)
}

async fn accept(listener: &TcpListener) -> WebSocketStream<TcpStream> {
	let (stream, _) = listener.accept().await.unwrap();
	accept_async(stream).await.unwrap()
}

fn queue() -> Arc<MessageQueue> {
	Arc::new(MessageQueue::new("vizor:error"))
}

#[tokio::test]
async fn inbound_frames_resolve_registered_waits() {
	let (listener, uri) = bind().await;
	let queue = queue();
	let wait = queue.wait_for("vizor:setStories");

	let server = tokio::spawn(async move {
		let mut ws = accept(&listener).await;
		ws.send(WsMessage::Text(
			r#"{"type":"vizor:setStories","args":[{"stories":[]}]}"#.to_owned(),
		))
		.await
		.unwrap();
		// Hold the socket open until the client closes.
		while ws.next().await.is_some() {}
	});

	let session = Session::connect(&uri, Arc::clone(&queue), CONNECT_TIMEOUT).await.unwrap();
	assert_eq!(session.state(), SessionState::Connected);
	assert_eq!(wait.await.unwrap(), json!({"stories": []}));

	session.close();
	server.await.unwrap();
}

#[tokio::test]
async fn send_serializes_the_envelope() {
	let (listener, uri) = bind().await;
	let server = tokio::spawn(async move {
		let mut ws = accept(&listener).await;
		match ws.next().await {
			Some(Ok(WsMessage::Text(raw))) => raw,
			other => panic!("expected a text frame, got {other:?}"),
		}
	});

	let session = Session::connect(&uri, queue(), CONNECT_TIMEOUT).await.unwrap();
	session
		.send(Envelope::new("vizor:prepare", vec![json!({"platform": "ios"})]))
		.unwrap();

	let raw = server.await.unwrap();
	let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
	assert_eq!(value, json!({"type": "vizor:prepare", "args": [{"platform": "ios"}]}));
}

#[tokio::test]
async fn unparseable_frames_are_ignored() {
	let (listener, uri) = bind().await;
	let queue = queue();
	let wait = queue.wait_for("vizor:setStories");

	let server = tokio::spawn(async move {
		let mut ws = accept(&listener).await;
		ws.send(WsMessage::Text("not json".to_owned())).await.unwrap();
		ws.send(WsMessage::Text(
			r#"{"type":"vizor:setStories","args":[{"stories":[]}]}"#.to_owned(),
		))
		.await
		.unwrap();
		while ws.next().await.is_some() {}
	});

	let session = Session::connect(&uri, Arc::clone(&queue), CONNECT_TIMEOUT).await.unwrap();
	assert_eq!(wait.await.unwrap(), json!({"stories": []}));

	session.close();
	server.await.unwrap();
}

#[tokio::test]
async fn refused_connection_fails_and_rejects_pending_waits() {
	let (listener, uri) = bind().await;
	drop(listener);
	let queue = queue();
	let wait = queue.wait_for("vizor:setStories");

	let err = Session::connect(&uri, Arc::clone(&queue), CONNECT_TIMEOUT)
		.await
		.unwrap_err();

	assert!(matches!(err, Error::ConnectionFailed(_)), "got {err:?}");
	assert!(matches!(wait.await, Err(Error::ConnectionFailed(_))));
}

#[tokio::test]
async fn a_dropped_server_rejects_pending_waits() {
	let (listener, uri) = bind().await;
	let (drop_now, wait_for_signal) = tokio::sync::oneshot::channel::<()>();
	let server = tokio::spawn(async move {
		let ws = accept(&listener).await;
		let _ = wait_for_signal.await;
		drop(ws);
	});

	let queue = queue();
	let session = Session::connect(&uri, Arc::clone(&queue), CONNECT_TIMEOUT).await.unwrap();
	let wait = queue.wait_for("vizor:readyiPhone 8");
	drop_now.send(()).unwrap();

	let err = wait.await.unwrap_err();
	assert!(
		matches!(err, Error::ConnectionClosed | Error::Transport(_)),
		"got {err:?}"
	);
	assert_eq!(session.state(), SessionState::Closed);
	server.await.unwrap();
}

#[tokio::test]
async fn close_is_idempotent_and_blocks_further_sends() {
	let (listener, uri) = bind().await;
	let server = tokio::spawn(async move {
		let mut ws = accept(&listener).await;
		while ws.next().await.is_some() {}
	});

	let session = Session::connect(&uri, queue(), CONNECT_TIMEOUT).await.unwrap();
	session.close();
	session.close();
	assert_eq!(session.state(), SessionState::Closed);

	let err = session
		.send(Envelope::new("vizor:prepare", vec![json!({"platform": "ios"})]))
		.unwrap_err();
	assert!(matches!(err, Error::ConnectionClosed));
	server.await.unwrap();
}
