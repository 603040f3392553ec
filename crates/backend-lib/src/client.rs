// ============================
// crates/backend-lib/src/client.rs
// ============================
//! One authenticated WebSocket connection bound to one room.
//!
//! Every client runs two tasks. The read pump pulls frames off the socket,
//! applies the per-connection rate limit, rewrites the chat envelope, and
//! hands the result to the room. The write pump is the sole writer to the
//! socket: it drains the outbound queue, pings on a timer, and sends a
//! close frame when the queue closes.
//!
//! Teardown order: a pump exits -> unregister -> room drops the queue
//! sender -> the write pump drains and exits -> hub empty-check ->
//! disconnect hook reverses presence and metrics.

use crate::auth::RateLimiter;
use crate::config::ChatSettings;
use crate::hub::Hub;
use crate::messages::{rewrite_envelope, ChatMessage};
use crate::room::{Frame, Room};
use axum::extract::ws::{Message, WebSocket};
use chrono::Utc;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval_at, timeout, Instant};
use uuid::Uuid;

pub struct Client {
    id: Uuid,
    username: String,
    room: Arc<Room>,
    hub: Arc<Hub>,
    chat_limiter: Arc<RateLimiter>,
    settings: ChatSettings,
    on_disconnect: Box<dyn FnOnce() + Send>,
}

impl Client {
    pub fn new(
        id: Uuid,
        username: String,
        room: Arc<Room>,
        hub: Arc<Hub>,
        chat_limiter: Arc<RateLimiter>,
        settings: ChatSettings,
        on_disconnect: Box<dyn FnOnce() + Send>,
    ) -> Self {
        Self {
            id,
            username,
            room,
            hub,
            chat_limiter,
            settings,
            on_disconnect,
        }
    }

    /// Drive the connection to completion. Returns once the peer is gone
    /// and all cleanup has run.
    pub async fn run(self, socket: WebSocket) {
        let (sink, stream) = socket.split();

        let (outbound_tx, outbound_rx) = mpsc::channel(self.settings.outbound_queue_depth);
        // The room holds the only strong sender; the read pump keeps a weak
        // handle for system notices. When the room drops its sender (leave
        // or slow-peer eviction) the queue closes and the write pump ends.
        let notices = outbound_tx.downgrade();
        self.room.register(self.id, outbound_tx).await;

        let mut write_task = tokio::spawn(write_pump(
            sink,
            outbound_rx,
            self.settings.ping_interval(),
            self.settings.write_timeout(),
        ));
        let mut read_task = tokio::spawn(read_pump(
            stream,
            notices,
            self.room.clone(),
            self.username.clone(),
            self.chat_limiter.clone(),
            self.id.to_string(),
            self.settings.pong_timeout(),
        ));

        // Whichever pump stops first tears the connection down. A finished
        // write pump (write failure or eviction) aborts the reader, which
        // drops the socket outright.
        tokio::select! {
            _ = &mut write_task => read_task.abort(),
            _ = &mut read_task => {},
        }

        let room_key = self.room.key().to_string();
        self.room.unregister(self.id).await;
        self.hub.delete_if_empty(&room_key);
        (self.on_disconnect)();
        self.chat_limiter.forget(&self.id.to_string());
        // if the write pump is still draining, the unregister above closed
        // its queue and it will exit on its own
    }
}

async fn read_pump(
    mut stream: SplitStream<WebSocket>,
    notices: mpsc::WeakSender<Frame>,
    room: Arc<Room>,
    username: String,
    limiter: Arc<RateLimiter>,
    limiter_key: String,
    pong_timeout: Duration,
) {
    loop {
        // Any inbound frame, pongs included, counts as liveness and
        // refreshes the read deadline.
        let message = match timeout(pong_timeout, stream.next()).await {
            Err(_) => break,
            Ok(None) => break,
            Ok(Some(Err(_))) => break,
            Ok(Some(Ok(message))) => message,
        };

        let payload = match message {
            Message::Text(text) => text,
            Message::Binary(bytes) => match String::from_utf8(bytes) {
                Ok(text) => text,
                Err(_) => continue,
            },
            Message::Ping(_) | Message::Pong(_) => continue,
            Message::Close(_) => break,
        };

        if !limiter.allow(&limiter_key) {
            notify_rate_limited(&notices, room.key());
            continue;
        }

        let frame = rewrite_envelope(&payload, &username, room.key(), Utc::now().timestamp());
        room.broadcast(frame).await;
    }
}

/// Best-effort notice to this connection only; dropped if the queue is
/// already full or closed.
fn notify_rate_limited(notices: &mpsc::WeakSender<Frame>, room_key: &str) {
    let Some(sender) = notices.upgrade() else {
        return;
    };
    let notice = ChatMessage::rate_limit_notice(room_key, Utc::now().timestamp());
    if let Some(frame) = notice.encode() {
        let _ = sender.try_send(frame);
    }
}

async fn write_pump(
    mut sink: SplitSink<WebSocket, Message>,
    mut outbound_rx: mpsc::Receiver<Frame>,
    ping_interval: Duration,
    write_timeout: Duration,
) {
    let mut ticker = interval_at(Instant::now() + ping_interval, ping_interval);

    loop {
        tokio::select! {
            frame = outbound_rx.recv() => match frame {
                Some(frame) => {
                    match timeout(write_timeout, sink.send(Message::Text(frame))).await {
                        Ok(Ok(())) => {},
                        _ => break,
                    }
                },
                None => {
                    // queue closed: the room removed us, or the read pump
                    // has unregistered
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                },
            },
            _ = ticker.tick() => {
                match timeout(write_timeout, sink.send(Message::Ping(Vec::new()))).await {
                    Ok(Ok(())) => {},
                    _ => break,
                }
            },
        }
    }
}
