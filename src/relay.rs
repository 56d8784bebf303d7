//! Unix-socket relay for an external BLE peripheral shim.
//!
//! The shim owns advertising, pairing and MTU negotiation; this relay only
//! carries the endpoint primitives as newline-delimited JSON frames:
//! writes and subscribe/unsubscribe events inbound, acknowledgements and
//! notifications outbound. A shim disconnect clears its notify callbacks
//! and nothing else — in-flight executions and cache state survive.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use uuid::Uuid;

use crate::endpoint::AttributeEndpoint;
use crate::error::{GatewayError, Result};
use crate::protocol::response::WriteStatus;
use crate::service::GatewayService;

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
enum InboundFrame {
    Write { endpoint: Uuid, payload: String },
    Subscribe { endpoint: Uuid },
    Unsubscribe { endpoint: Uuid },
}

#[derive(Debug, Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
enum OutboundFrame {
    Ack {
        endpoint: Uuid,
        status: WriteStatus,
        payload: String,
    },
    Notify {
        endpoint: Uuid,
        payload: String,
    },
    Error {
        message: String,
    },
}

/// Serve the endpoint table to peripheral shims connecting on `socket_path`
/// until `shutdown` fires; waits for in-flight request handling to finish.
pub async fn run(
    service: Arc<GatewayService>,
    socket_path: &str,
    shutdown: CancellationToken,
) -> Result<()> {
    if Path::new(socket_path).exists() {
        tokio::fs::remove_file(socket_path).await?;
    }
    let listener = UnixListener::bind(socket_path)
        .map_err(|e| GatewayError::Relay(format!("failed to bind {socket_path}: {e}")))?;
    log::info!("Peripheral relay listening on {socket_path}");

    let tracker = TaskTracker::new();

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, _)) => {
                        let service = service.clone();
                        let workers = tracker.clone();
                        tracker.spawn(async move {
                            serve_connection(service, stream, workers).await;
                        });
                    }
                    Err(err) => log::warn!("Relay accept failed: {err}"),
                }
            }
            _ = shutdown.cancelled() => break,
        }
    }

    tracker.close();
    tracker.wait().await;
    log::info!("Peripheral relay stopped");
    Ok(())
}

async fn serve_connection(service: Arc<GatewayService>, stream: UnixStream, workers: TaskTracker) {
    log::info!("Peripheral shim connected");

    let (reader, mut writer) = stream.into_split();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<OutboundFrame>();

    // Writer task owns the socket's write half; everything outbound is a
    // single JSON line.
    let writer_task = tokio::spawn(async move {
        while let Some(frame) = out_rx.recv().await {
            match serde_json::to_string(&frame) {
                Ok(mut line) => {
                    line.push('\n');
                    if writer.write_all(line.as_bytes()).await.is_err() {
                        break;
                    }
                }
                Err(err) => log::error!("Failed to encode relay frame: {err}"),
            }
        }
    });

    // One ordered write queue per endpoint: enqueueing happens on this
    // task in frame-arrival order, so same-endpoint requests are handled
    // in submission order while distinct endpoints proceed concurrently.
    let mut write_queues: HashMap<Uuid, mpsc::UnboundedSender<String>> = HashMap::new();
    let mut subscribed: Vec<Uuid> = Vec::new();

    let mut lines = BufReader::new(reader).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(err) => {
                log::warn!("Relay read failed: {err}");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let frame: InboundFrame = match serde_json::from_str(&line) {
            Ok(frame) => frame,
            Err(err) => {
                let _ = out_tx.send(OutboundFrame::Error {
                    message: format!("unparsable frame: {err}"),
                });
                continue;
            }
        };

        match frame {
            InboundFrame::Write { endpoint, payload } => {
                let Some(target) = service.endpoint(&endpoint) else {
                    let _ = out_tx.send(OutboundFrame::Error {
                        message: format!("unknown endpoint: {endpoint}"),
                    });
                    continue;
                };
                let queue = write_queues.entry(endpoint).or_insert_with(|| {
                    spawn_write_worker(target.clone(), out_tx.clone(), &workers)
                });
                let _ = queue.send(payload);
            }
            InboundFrame::Subscribe { endpoint } => {
                let Some(target) = service.endpoint(&endpoint) else {
                    let _ = out_tx.send(OutboundFrame::Error {
                        message: format!("unknown endpoint: {endpoint}"),
                    });
                    continue;
                };
                let out = out_tx.clone();
                target.subscribe(Box::new(move |payload| {
                    let _ = out.send(OutboundFrame::Notify {
                        endpoint,
                        payload: String::from_utf8_lossy(payload).into_owned(),
                    });
                }));
                if !subscribed.contains(&endpoint) {
                    subscribed.push(endpoint);
                }
            }
            InboundFrame::Unsubscribe { endpoint } => {
                if let Some(target) = service.endpoint(&endpoint) {
                    target.unsubscribe();
                }
                subscribed.retain(|id| id != &endpoint);
            }
        }
    }

    // Shim went away: only its notify callbacks are cleared.
    for endpoint in subscribed {
        if let Some(target) = service.endpoint(&endpoint) {
            target.unsubscribe();
        }
    }
    drop(write_queues);
    drop(out_tx);
    let _ = writer_task.await;
    log::info!("Peripheral shim disconnected");
}

fn spawn_write_worker(
    endpoint: Arc<AttributeEndpoint>,
    out_tx: mpsc::UnboundedSender<OutboundFrame>,
    workers: &TaskTracker,
) -> mpsc::UnboundedSender<String> {
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    workers.spawn(async move {
        while let Some(payload) = rx.recv().await {
            let frame = endpoint.write(payload.as_bytes()).await;
            let _ = out_tx.send(OutboundFrame::Ack {
                endpoint: endpoint.uuid(),
                status: frame.status,
                payload: frame.payload_text(),
            });
        }
    });
    tx
}
