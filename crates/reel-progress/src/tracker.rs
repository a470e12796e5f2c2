//! Long-lived progress connection with per-job subscriptions.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use uuid::Uuid;

use reel_models::ProgressEvent;

use crate::error::{TrackerError, TrackerResult};
use crate::protocol::{parse_event, HelloFrame, SubscribeFrame};

/// Callback invoked for every event addressed to a subscribed job.
pub type ProgressHandler = Box<dyn Fn(ProgressEvent) + Send + Sync + 'static>;

/// Connection lifecycle of the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerState {
    Disconnected,
    Connecting,
    Connected,
    Closing,
}

/// Configuration for the render progress tracker.
#[derive(Debug, Clone)]
pub struct RenderTrackerConfig {
    /// WebSocket URL of the render backend's progress socket
    pub ws_url: String,
}

impl Default for RenderTrackerConfig {
    fn default() -> Self {
        Self {
            ws_url: "ws://localhost:8188/ws".to_string(),
        }
    }
}

impl RenderTrackerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            ws_url: std::env::var("RENDER_WS_URL")
                .unwrap_or_else(|_| "ws://localhost:8188/ws".to_string()),
        }
    }
}

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type HandlerMap = HashMap<String, ProgressHandler>;

/// Tracker for a push-based generation backend.
///
/// One background receive task per open connection fans incoming events out
/// to the registered handlers, in arrival order. The tracker never
/// reconnects on its own; after a drop the caller decides whether to call
/// `connect` again and re-subscribe.
pub struct ProgressTracker {
    config: RenderTrackerConfig,
    client_id: String,
    state: Arc<Mutex<TrackerState>>,
    handlers: Arc<Mutex<HandlerMap>>,
    sink: AsyncMutex<Option<WsSink>>,
    recv_task: Mutex<Option<JoinHandle<()>>>,
}

impl ProgressTracker {
    /// Create a disconnected tracker.
    pub fn new(config: RenderTrackerConfig) -> Self {
        Self {
            config,
            client_id: format!("reelsmith_{}", Uuid::new_v4().simple()),
            state: Arc::new(Mutex::new(TrackerState::Disconnected)),
            handlers: Arc::new(Mutex::new(HashMap::new())),
            sink: AsyncMutex::new(None),
            recv_task: Mutex::new(None),
        }
    }

    /// Create from environment variables.
    pub fn from_env() -> Self {
        Self::new(RenderTrackerConfig::from_env())
    }

    /// Current connection state.
    pub fn state(&self) -> TrackerState {
        *self.state.lock().unwrap()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == TrackerState::Connected
    }

    /// Establish the connection and start the background receive task.
    ///
    /// Returns `false` on failure: an unreachable backend is an expected,
    /// recoverable condition the caller may retry. Subscriptions from a
    /// previous connection are not carried over.
    pub async fn connect(&self) -> bool {
        // A previous connection may still be live; its receive task must not
        // keep dispatching into the registry alongside the new one.
        if let Some(task) = self.recv_task.lock().unwrap().take() {
            task.abort();
        }
        *self.sink.lock().await = None;

        self.set_state(TrackerState::Connecting);
        self.handlers.lock().unwrap().clear();

        let (ws, _) = match connect_async(&self.config.ws_url).await {
            Ok(ok) => ok,
            Err(e) => {
                warn!(url = %self.config.ws_url, "Connection failed: {}", e);
                self.set_state(TrackerState::Disconnected);
                return false;
            }
        };

        let (mut sink, mut stream) = ws.split();

        // Identify ourselves before anything else
        let hello = HelloFrame {
            client_id: self.client_id.clone(),
        };
        let hello_json = match serde_json::to_string(&hello) {
            Ok(j) => j,
            Err(_) => {
                self.set_state(TrackerState::Disconnected);
                return false;
            }
        };
        if sink.send(Message::Text(hello_json)).await.is_err() {
            warn!("Failed to send client id");
            self.set_state(TrackerState::Disconnected);
            return false;
        }

        *self.sink.lock().await = Some(sink);

        // The receive task downgrades the state when the connection drops,
        // which can happen immediately; Connected must already be in place
        // so that write is never overwritten.
        self.set_state(TrackerState::Connected);

        let handlers = Arc::clone(&self.handlers);
        let state = Arc::clone(&self.state);
        let task = tokio::spawn(async move {
            while let Some(message) = stream.next().await {
                match message {
                    Ok(Message::Text(text)) => {
                        let Some(event) = parse_event(&text) else {
                            continue;
                        };
                        // Dispatch under the registry lock: close() clears
                        // the map under the same lock, so no handler runs
                        // after close() returns.
                        let handlers = handlers.lock().unwrap();
                        if let Some(handler) = handlers.get(&event.job_id) {
                            debug!(job = %event.job_id, "Dispatching progress event");
                            handler(event);
                        }
                    }
                    Ok(Message::Close(_)) | Err(_) => break,
                    Ok(_) => {}
                }
            }
            info!("Progress connection closed");
            *state.lock().unwrap() = TrackerState::Disconnected;
        });
        *self.recv_task.lock().unwrap() = Some(task);

        info!(url = %self.config.ws_url, "Connected to render backend");
        true
    }

    /// Register a handler for one job and send the subscribe frame.
    ///
    /// Multiple subscriptions may be active concurrently over the same
    /// connection.
    pub async fn subscribe(
        &self,
        job_id: impl Into<String>,
        handler: ProgressHandler,
    ) -> TrackerResult<()> {
        if !self.is_connected() {
            return Err(TrackerError::NotConnected);
        }
        let job_id = job_id.into();

        self.handlers
            .lock()
            .unwrap()
            .insert(job_id.clone(), handler);

        let frame = serde_json::to_string(&SubscribeFrame::new(&job_id))?;
        let mut sink = self.sink.lock().await;
        match sink.as_mut() {
            Some(sink) => sink
                .send(Message::Text(frame))
                .await
                .map_err(|e| TrackerError::ConnectionLost(e.to_string()))?,
            None => return Err(TrackerError::NotConnected),
        }

        debug!(job = %job_id, "Subscribed to progress events");
        Ok(())
    }

    /// Tear down the connection.
    ///
    /// Safe to call any number of times. Once this returns, no handler will
    /// be invoked again.
    pub async fn close(&self) {
        self.set_state(TrackerState::Closing);

        // Clearing the registry first guarantees the receive task cannot
        // dispatch a late-arriving event.
        self.handlers.lock().unwrap().clear();

        if let Some(mut sink) = self.sink.lock().await.take() {
            let _ = sink.send(Message::Close(None)).await;
        }
        if let Some(task) = self.recv_task.lock().unwrap().take() {
            task.abort();
        }

        self.set_state(TrackerState::Disconnected);
        debug!("Tracker closed");
    }

    fn set_state(&self, next: TrackerState) {
        *self.state.lock().unwrap() = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use futures_util::SinkExt;
    use serde_json::json;
    use tokio_tungstenite::accept_async;

    /// Spawn a one-connection server that sends `frames` after `delay`.
    async fn one_shot_server(frames: Vec<String>, delay: Duration) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            if let Ok((stream, _)) = listener.accept().await {
                let mut ws = accept_async(stream).await.unwrap();
                tokio::time::sleep(delay).await;
                for frame in frames {
                    if ws.send(Message::Text(frame)).await.is_err() {
                        break;
                    }
                }
                // Keep the connection open long enough for the client to drain
                tokio::time::sleep(Duration::from_millis(200)).await;
            }
        });
        format!("ws://{}", addr)
    }

    fn progress_frame(job_id: &str, value: u32, max: u32) -> String {
        json!({
            "type": "progress",
            "data": {"prompt_id": job_id, "value": value, "max": max}
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_connect_failure_returns_false() {
        let tracker = ProgressTracker::new(RenderTrackerConfig {
            ws_url: "ws://127.0.0.1:1/ws".into(),
        });
        assert!(!tracker.connect().await);
        assert_eq!(tracker.state(), TrackerState::Disconnected);
    }

    #[tokio::test]
    async fn test_subscribe_requires_connection() {
        let tracker = ProgressTracker::new(RenderTrackerConfig::default());
        let result = tracker.subscribe("job-1", Box::new(|_| {})).await;
        assert!(matches!(result, Err(TrackerError::NotConnected)));
    }

    #[tokio::test]
    async fn test_events_delivered_in_order() {
        let url = one_shot_server(
            vec![
                progress_frame("job-1", 1, 10),
                progress_frame("job-1", 5, 10),
                progress_frame("job-1", 10, 10),
                // Addressed to a job nobody subscribed to; must be dropped
                progress_frame("job-2", 3, 10),
            ],
            Duration::from_millis(100),
        )
        .await;

        let tracker = ProgressTracker::new(RenderTrackerConfig { ws_url: url });
        assert!(tracker.connect().await);

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        tracker
            .subscribe(
                "job-1",
                Box::new(move |event| {
                    let _ = tx.send(event);
                }),
            )
            .await
            .unwrap();

        let mut fractions = Vec::new();
        for _ in 0..3 {
            let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
                .await
                .expect("timed out waiting for event")
                .expect("channel closed");
            assert_eq!(event.job_id, "job-1");
            fractions.push(event.progress.unwrap());
        }
        assert_eq!(fractions, vec![0.1, 0.5, 1.0]);

        // The job-2 frame must not reach this handler
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(rx.try_recv().is_err());

        tracker.close().await;
    }

    #[tokio::test]
    async fn test_instant_drop_transitions_to_disconnected() {
        // Server completes the handshake and drops the socket right away
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            if let Ok((stream, _)) = listener.accept().await {
                let ws = accept_async(stream).await.unwrap();
                drop(ws);
            }
        });

        let tracker = ProgressTracker::new(RenderTrackerConfig {
            ws_url: format!("ws://{}", addr),
        });
        assert!(tracker.connect().await);

        for _ in 0..50 {
            if tracker.state() == TrackerState::Disconnected {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(tracker.state(), TrackerState::Disconnected);
    }

    #[tokio::test]
    async fn test_reconnect_tears_down_previous_connection() {
        // Two-connection server: the first connection sends a late frame,
        // the second stays quiet.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut late = true;
            while let Ok((stream, _)) = listener.accept().await {
                let send_late_frame = late;
                late = false;
                tokio::spawn(async move {
                    let mut ws = accept_async(stream).await.unwrap();
                    if send_late_frame {
                        tokio::time::sleep(Duration::from_millis(200)).await;
                        let _ = ws.send(Message::Text(progress_frame("job-1", 10, 10))).await;
                    }
                    tokio::time::sleep(Duration::from_millis(500)).await;
                });
            }
        });

        let tracker = ProgressTracker::new(RenderTrackerConfig {
            ws_url: format!("ws://{}", addr),
        });
        assert!(tracker.connect().await);
        // Reconnect before the first connection's frame is sent
        assert!(tracker.connect().await);
        assert!(tracker.is_connected());

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        tracker
            .subscribe(
                "job-1",
                Box::new(move |event| {
                    let _ = tx.send(event);
                }),
            )
            .await
            .unwrap();

        // The frame addressed to the old connection must never be delivered
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert!(rx.try_recv().is_err());

        tracker.close().await;
    }

    #[tokio::test]
    async fn test_no_events_after_close() {
        // Server sends its frame well after the client has closed
        let url = one_shot_server(
            vec![progress_frame("job-1", 10, 10)],
            Duration::from_millis(150),
        )
        .await;

        let tracker = ProgressTracker::new(RenderTrackerConfig { ws_url: url });
        assert!(tracker.connect().await);

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        tracker
            .subscribe(
                "job-1",
                Box::new(move |event| {
                    let _ = tx.send(event);
                }),
            )
            .await
            .unwrap();

        tracker.close().await;
        assert_eq!(tracker.state(), TrackerState::Disconnected);

        // Close again to confirm idempotence
        tracker.close().await;

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(rx.try_recv().is_err());
    }
}
