use crate::signaling::connection_stats::ConnectionStats;
use crate::signaling::signaling_service::SignalingService;
use axum::Json;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, info};

#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub client_name: Option<String>,
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsParams>,
    State(service): State<SignalingService>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, params.client_name, service))
}

pub async fn stats_handler(State(service): State<SignalingService>) -> Json<ConnectionStats> {
    Json(service.stats())
}

async fn handle_socket(socket: WebSocket, client_name: Option<String>, service: SignalingService) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel();

    let client_id = service.register(client_name.as_deref(), tx);

    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(msg).await.is_err() {
                break;
            }
        }
    });

    let mut recv_task = tokio::spawn({
        let service = service.clone();
        let client_id = client_id.clone();

        async move {
            while let Some(Ok(msg)) = receiver.next().await {
                match msg {
                    Message::Text(text) => service.handle_text(&client_id, text.as_str()),
                    Message::Close(_) => break,
                    _ => debug!("Ignoring non-text frame from {}", client_id),
                }
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    };

    service.unregister(&client_id);
    info!("WebSocket closed: {}", client_id);
}
