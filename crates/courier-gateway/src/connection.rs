use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tracing::{info, warn};

use courier_types::events::{Envelope, ErrorReply};

use crate::dispatcher::{DispatchError, MessageDispatcher};
use crate::registry::{ChannelHandle, ConnectionRegistry};

/// Drive one pre-authenticated connection from registration to cleanup.
/// The credential was already verified at the HTTP upgrade layer, so the
/// socket arrives here carrying a known subject and intended recipient.
pub async fn handle_connection(
    socket: WebSocket,
    registry: ConnectionRegistry,
    dispatcher: MessageDispatcher,
    subject_id: i64,
    receiver_id: i64,
) {
    let (mut sink, mut stream) = socket.split();
    let (channel, mut outbound_rx) = ChannelHandle::open();

    info!("subject {} connected (recipient {})", subject_id, receiver_id);

    // Idempotent connect: a subject that already holds a live channel
    // keeps it, and this connection's channel stays out of the registry.
    if !registry.is_registered(subject_id).await {
        registry.register(subject_id, channel.clone()).await;
    }

    // Forward queued deliveries to the socket.
    let mut send_task = tokio::spawn(async move {
        while let Some(payload) = outbound_rx.recv().await {
            if sink.send(Message::Text(payload.into())).await.is_err() {
                break;
            }
        }
    });

    // Read frames sequentially; one frame is fully dispatched before the
    // next is parsed, which gives per-sender ordering for free.
    let recv_channel = channel.clone();
    let recv_dispatcher = dispatcher.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = stream.next().await {
            match msg {
                Message::Text(text) => {
                    let envelope = match serde_json::from_str::<Envelope>(&text) {
                        Ok(envelope) => envelope,
                        Err(e) => {
                            // Protocol violation: fatal to this connection only.
                            warn!(
                                "subject {} sent an unparseable frame ({} bytes): {}",
                                subject_id,
                                text.len(),
                                e
                            );
                            break;
                        }
                    };

                    // The upgrade path names the recipient; the wire value
                    // on create frames is overridden by it.
                    let envelope = match envelope {
                        Envelope::Create {
                            text,
                            photo,
                            sender_id,
                            ..
                        } => Envelope::Create {
                            text,
                            photo,
                            sender_id,
                            receiver_id,
                        },
                        other => other,
                    };

                    if let Err(e) = recv_dispatcher.dispatch(subject_id, envelope).await {
                        warn!("subject {} frame failed: {}", subject_id, e);
                        report(&recv_channel, &e);
                    }
                }
                Message::Binary(_) => {
                    warn!("subject {} sent a binary frame, closing", subject_id);
                    break;
                }
                Message::Close(_) => break,
                // Ping/Pong are handled at the transport layer.
                _ => {}
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    // Unconditional cleanup, exactly once. Compare-and-remove keeps a
    // stale disconnect from evicting a newer connection for this subject.
    registry.unregister(subject_id, &channel).await;
    info!("subject {} disconnected", subject_id);
}

/// Per-frame failures go back to the offending sender; the connection
/// stays open.
fn report(channel: &ChannelHandle, error: &DispatchError) {
    match serde_json::to_string(&ErrorReply::new(error.to_string())) {
        Ok(frame) => {
            channel.push(frame);
        }
        Err(e) => warn!("failed to serialize error reply: {}", e),
    }
}
