//! WebSocket client with automatic reconnection

use super::types::{WsConfig, WsError, WsMessage};
use crate::telemetry::{increment_counter, CounterMetric};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::sleep;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;

/// Reusable WebSocket client with automatic reconnection and ping/pong handling
pub struct WsClient {
    config: WsConfig,
}

impl WsClient {
    /// Create a new WebSocket client with the given configuration
    pub fn new(config: WsConfig) -> Self {
        Self { config }
    }

    /// Connect and return a receiver for messages
    ///
    /// This spawns a background task that owns the connection. Errors and
    /// server-side closes both lead to a reconnect after the configured delay,
    /// and the subscription frame is re-sent on every connect. The task ends
    /// when `cancel` fires (pending reconnect sleeps included) or the
    /// receiver is dropped.
    pub fn connect(&self, cancel: CancellationToken) -> mpsc::Receiver<WsMessage> {
        let (tx, rx) = mpsc::channel(1024);
        let config = self.config.clone();

        tokio::spawn(async move {
            if let Err(e) = Self::run_connection_loop(config, tx, cancel).await {
                tracing::error!(error = %e, "WebSocket connection loop failed");
            }
        });

        rx
    }

    /// Run the connection loop with automatic reconnection
    async fn run_connection_loop(
        config: WsConfig,
        tx: mpsc::Sender<WsMessage>,
        cancel: CancellationToken,
    ) -> Result<(), WsError> {
        let mut reconnect_attempts = 0;

        loop {
            match Self::connect_and_stream(&config, &tx, &cancel, &mut reconnect_attempts).await {
                Ok(()) => break,
                Err(e) => {
                    if cancel.is_cancelled() || tx.is_closed() {
                        break;
                    }

                    reconnect_attempts += 1;
                    increment_counter(CounterMetric::Reconnects);
                    tracing::warn!(
                        error = %e,
                        attempt = reconnect_attempts,
                        "WebSocket connection lost, reconnecting..."
                    );

                    // Check max reconnects (0 = infinite)
                    if config.max_reconnect_attempts > 0
                        && reconnect_attempts >= config.max_reconnect_attempts
                    {
                        tracing::error!("Max reconnection attempts reached");
                        let _ = tx.send(WsMessage::Disconnected).await;
                        return Err(WsError::MaxReconnectsExceeded);
                    }

                    let _ = tx
                        .send(WsMessage::Reconnecting {
                            attempt: reconnect_attempts,
                        })
                        .await;

                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = sleep(config.reconnect_delay(reconnect_attempts)) => {}
                    }
                }
            }
        }

        tracing::info!(url = %config.url, "WebSocket client stopped");
        let _ = tx.try_send(WsMessage::Disconnected);
        Ok(())
    }

    /// Connect, subscribe, and stream messages until stopped or failed
    ///
    /// `Ok(())` means the client was asked to stop; any `Err` triggers a reconnect.
    async fn connect_and_stream(
        config: &WsConfig,
        tx: &mpsc::Sender<WsMessage>,
        cancel: &CancellationToken,
        reconnect_attempts: &mut u32,
    ) -> Result<(), WsError> {
        tracing::info!(url = %config.url, "Connecting to WebSocket");

        let (ws_stream, _response) = tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            result = connect_async(config.url.as_str()) => {
                result.map_err(|e| WsError::ConnectionFailed(e.to_string()))?
            }
        };

        let (mut write, mut read) = ws_stream.split();

        if let Some(subscription) = &config.subscribe_message {
            write
                .send(Message::Text(subscription.clone()))
                .await
                .map_err(|e| WsError::SendFailed(e.to_string()))?;
        }

        tracing::info!("WebSocket connected");
        *reconnect_attempts = 0;

        if tx.send(WsMessage::Connected).await.is_err() {
            return Ok(());
        }

        let mut ping_interval = tokio::time::interval(config.ping_interval);
        ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // First tick completes immediately
        ping_interval.tick().await;

        let mut waiting_for_pong = false;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    let _ = write.send(Message::Close(None)).await;
                    return Ok(());
                }

                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            if tx.send(WsMessage::Text(text)).await.is_err() {
                                tracing::debug!("Receiver dropped, closing connection");
                                return Ok(());
                            }
                        }
                        Some(Ok(Message::Binary(data))) => {
                            if tx.send(WsMessage::Binary(data)).await.is_err() {
                                tracing::debug!("Receiver dropped, closing connection");
                                return Ok(());
                            }
                        }
                        Some(Ok(Message::Ping(data))) => {
                            write.send(Message::Pong(data)).await
                                .map_err(|e| WsError::SendFailed(e.to_string()))?;
                        }
                        Some(Ok(Message::Pong(_))) => {
                            waiting_for_pong = false;
                        }
                        Some(Ok(Message::Close(_))) => {
                            tracing::info!("Received close frame");
                            return Err(WsError::ClosedByServer);
                        }
                        Some(Err(e)) => {
                            return Err(WsError::ConnectionFailed(e.to_string()));
                        }
                        None => {
                            return Err(WsError::ConnectionFailed("Stream ended unexpectedly".into()));
                        }
                        _ => {}
                    }
                }

                _ = ping_interval.tick() => {
                    if waiting_for_pong {
                        return Err(WsError::ConnectionFailed("Pong timeout".into()));
                    }
                    write.send(Message::Ping(Vec::new())).await
                        .map_err(|e| WsError::SendFailed(e.to_string()))?;
                    waiting_for_pong = true;
                }
            }
        }
    }
}
