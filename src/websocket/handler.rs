use std::collections::HashMap;
use std::sync::Arc;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::{accept_hdr_async, WebSocketStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{Request, Response, ErrorResponse};
use tokio_tungstenite::tungstenite::http::StatusCode;
use log::{info, warn, error, debug};

use crate::data::{Broadcaster, SubscriptionMessage, SubscriptionResponse};

pub const WS_PATH: &str = "/ws";
const OUTBOUND_QUEUE_SIZE: usize = 32;

type WsSink = futures::stream::SplitSink<WebSocketStream<TcpStream>, Message>;
type WsSource = futures::stream::SplitStream<WebSocketStream<TcpStream>>;

/// One subscriber connection on the WebSocket listener.
pub struct WebSocketHandler {
    session_id: String,
    peer_addr: String,
}

impl WebSocketHandler {
    pub fn new(peer_addr: String) -> Self {
        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            peer_addr,
        }
    }

    pub async fn handle_connection(self, stream: TcpStream, broadcaster: Arc<Broadcaster>) {
        let peer_addr = self.peer_addr.clone();
        let ws_stream = match accept_hdr_async(stream, |req: &Request, response: Response| {
            route_request(req, response, &peer_addr)
        }).await {
            Ok(ws) => ws,
            Err(e) => {
                error!("WebSocket handshake failed for {}: {:?}", self.peer_addr, e);
                return;
            }
        };

        self.handle_websocket_connection(ws_stream, broadcaster).await;
    }

    async fn handle_websocket_connection(
        &self,
        ws_stream: WebSocketStream<TcpStream>,
        broadcaster: Arc<Broadcaster>,
    ) {
        let (write, read) = ws_stream.split();

        info!("WebSocket connection established - Session: {} from {}", &self.session_id[..8], self.peer_addr);

        let (outbound_tx, outbound_rx) = mpsc::channel::<String>(OUTBOUND_QUEUE_SIZE);

        let write_task = spawn_write_task(write, outbound_rx);
        let read_task = spawn_read_task(read, self.session_id.clone(), broadcaster.clone(), outbound_tx);

        // Wait for either side to finish
        tokio::select! {
            _ = write_task => {
                debug!("Write task completed for session {}", &self.session_id[..8]);
            }
            _ = read_task => {
                debug!("Read task completed for session {}", &self.session_id[..8]);
            }
        }

        broadcaster.cleanup_session(&self.session_id);
        info!("WebSocket connection closed - Session: {} from {}", &self.session_id[..8], self.peer_addr);
    }
}

fn route_request(req: &Request, response: Response, peer_addr: &str) -> Result<Response, ErrorResponse> {
    let path = req.uri().path();
    if path == WS_PATH {
        info!("WebSocket connection request for path: {} from {}", path, peer_addr);
        Ok(response)
    } else {
        warn!("Unknown WebSocket path '{}' from {}", path, peer_addr);
        let mut rejection = ErrorResponse::new(Some("Invalid WebSocket path".to_string()));
        *rejection.status_mut() = StatusCode::NOT_FOUND;
        Err(rejection)
    }
}

fn spawn_write_task(mut write: WsSink, mut outbound_rx: mpsc::Receiver<String>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if let Err(e) = write.send(Message::Text(message)).await {
                error!("Error sending message: {:?}", e);
                break;
            }
        }
        let _ = write.close().await;
    })
}

fn spawn_read_task(
    mut read: WsSource,
    session_id: String,
    broadcaster: Arc<Broadcaster>,
    outbound_tx: mpsc::Sender<String>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut forwarders: HashMap<String, JoinHandle<()>> = HashMap::new();

        while let Some(msg_result) = read.next().await {
            match msg_result {
                Ok(Message::Text(text)) => {
                    let response = match serde_json::from_str::<SubscriptionMessage>(&text) {
                        Ok(command) => handle_command(command, &session_id, &broadcaster, &outbound_tx, &mut forwarders),
                        Err(_) => SubscriptionResponse {
                            status: "error".to_string(),
                            topic: None,
                            message: "Expected {\"action\": ..., \"topic\": ...}".to_string(),
                        },
                    };
                    match serde_json::to_string(&response) {
                        Ok(json) => {
                            if outbound_tx.send(json).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => error!("Failed to serialize subscription response: {}", e),
                    }
                }
                Ok(Message::Close(_)) => {
                    info!("Client sent close frame for session {}", &session_id[..8]);
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("WebSocket error for session {}: {:?}", &session_id[..8], e);
                    break;
                }
            }
        }

        for (_, task) in forwarders {
            task.abort();
        }
    })
}

fn handle_command(
    command: SubscriptionMessage,
    session_id: &str,
    broadcaster: &Broadcaster,
    outbound_tx: &mpsc::Sender<String>,
    forwarders: &mut HashMap<String, JoinHandle<()>>,
) -> SubscriptionResponse {
    let reply = |status: &str, topic: Option<String>, message: String| SubscriptionResponse {
        status: status.to_string(),
        topic,
        message,
    };

    match (command.action.as_str(), command.topic) {
        ("subscribe", Some(topic)) => match broadcaster.subscribe(session_id, &topic) {
            Ok(rx) => {
                forwarders.insert(topic.clone(), spawn_forwarder(rx, outbound_tx.clone(), topic.clone()));
                reply("success", Some(topic), "Successfully subscribed".to_string())
            }
            Err(e) => reply("error", Some(topic), e.to_string()),
        },
        ("unsubscribe", Some(topic)) => {
            if let Some(task) = forwarders.remove(&topic) {
                task.abort();
            }
            match broadcaster.unsubscribe(session_id, Some(&topic)) {
                Ok(_) => reply("success", Some(topic), "Successfully unsubscribed".to_string()),
                Err(e) => reply("error", Some(topic), e.to_string()),
            }
        }
        ("unsubscribe_all", _) => {
            for (_, task) in forwarders.drain() {
                task.abort();
            }
            match broadcaster.unsubscribe(session_id, None) {
                Ok(topics) => reply("success", None, format!("Successfully unsubscribed from {} topics", topics.len())),
                Err(e) => reply("error", None, e.to_string()),
            }
        }
        (action, topic) => {
            warn!("Unknown subscription action: {}", action);
            reply("error", topic, format!("Unsupported action '{}'", action))
        }
    }
}

fn spawn_forwarder(
    mut rx: broadcast::Receiver<String>,
    outbound_tx: mpsc::Sender<String>,
    topic: String,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(message) => {
                    if outbound_tx.send(message).await.is_err() {
                        break;
                    }
                }
                // Older snapshots are superseded anyway
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Subscriber lagged on {}, skipped {} snapshots", topic, skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}
