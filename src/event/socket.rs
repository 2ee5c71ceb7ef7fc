use super::{BackendMessage, Event};
use crate::errors::{OfficeError, Result};
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::UnixListener;
use tokio::sync::{mpsc, Semaphore};
use tokio::time::{timeout, Duration};
use tokio_util::sync::CancellationToken;

/// Maximum concurrent connections to prevent resource exhaustion
const MAX_CONNECTIONS: usize = 16;

/// Socket receive buffer size (snapshots with a full office run a few KB)
const SOCKET_RECV_BUF: usize = 64 * 1024;

/// Connections silent for this long are dropped
const IDLE_TIMEOUT: Duration = Duration::from_secs(300);

/// Listen for backend messages on a Unix socket
///
/// Each connection carries newline-delimited JSON. A bridge process usually
/// keeps one connection open and streams every message over it.
pub async fn listen(
    tx: mpsc::Sender<Event>,
    socket_path: &Path,
    shutdown: CancellationToken,
) -> Result<()> {
    // Remove existing socket file
    if socket_path.exists() {
        std::fs::remove_file(socket_path)?;
    }

    // Create socket with socket2 for buffer tuning
    let socket = socket2::Socket::new(socket2::Domain::UNIX, socket2::Type::STREAM, None)?;

    // OS may clamp to its own limits, which is fine
    if let Err(e) = socket.set_recv_buffer_size(SOCKET_RECV_BUF) {
        tracing::debug!("Could not set recv buffer size: {}", e);
    }

    socket.bind(&socket2::SockAddr::unix(socket_path)?)?;
    socket.listen(128)?;
    socket.set_nonblocking(true)?;

    let std_listener: std::os::unix::net::UnixListener = socket.into();
    let listener = UnixListener::from_std(std_listener)?;

    tracing::info!("Listening on {:?}", socket_path);

    let semaphore = Arc::new(Semaphore::new(MAX_CONNECTIONS));

    // Backoff state for accept errors
    let mut backoff_ms: u64 = 0;
    const MAX_BACKOFF_MS: u64 = 5000;

    loop {
        let accepted = tokio::select! {
            () = shutdown.cancelled() => {
                tracing::debug!("Socket listener shutting down");
                break;
            }
            accepted = listener.accept() => accepted,
        };

        match accepted {
            Ok((stream, _)) => {
                backoff_ms = 0;

                let permit = match semaphore.clone().try_acquire_owned() {
                    Ok(permit) => permit,
                    Err(_) => {
                        tracing::warn!(
                            "Connection limit reached ({} max), dropping connection",
                            MAX_CONNECTIONS
                        );
                        continue;
                    }
                };

                let tx = tx.clone();
                let shutdown = shutdown.clone();
                tokio::spawn(async move {
                    // Permit is held until this task completes
                    let _permit = permit;

                    let mut lines = BufReader::new(stream).lines();
                    loop {
                        let next = tokio::select! {
                            () = shutdown.cancelled() => break,
                            next = timeout(IDLE_TIMEOUT, lines.next_line()) => next,
                        };
                        match next {
                            Ok(Ok(Some(line))) => {
                                if line.trim().is_empty() {
                                    continue;
                                }
                                if let Some(message) = parse_line(&line) {
                                    if tx.send(Event::Backend(Box::new(message))).await.is_err() {
                                        // Receiver gone, the office is shutting down
                                        break;
                                    }
                                }
                            }
                            Ok(Ok(None)) => break,
                            Ok(Err(e)) => {
                                tracing::warn!("Read error: {}", e);
                                break;
                            }
                            Err(_) => {
                                tracing::debug!("Idle timeout (connection may be stale)");
                                break;
                            }
                        }
                    }
                });
            }
            Err(e) => {
                tracing::error!("Accept error: {}", e);

                // Exponential backoff to prevent CPU spin on persistent errors
                if backoff_ms == 0 {
                    backoff_ms = 100;
                } else {
                    backoff_ms = (backoff_ms * 2).min(MAX_BACKOFF_MS);
                }

                tracing::debug!("Backing off for {}ms", backoff_ms);
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
            }
        }
    }

    if let Err(e) = std::fs::remove_file(socket_path) {
        tracing::debug!("Could not remove socket file: {}", e);
    }
    Ok(())
}

/// Decode and validate one line
pub fn decode(line: &str) -> Result<BackendMessage> {
    let message: BackendMessage = serde_json::from_str(line)?;
    message
        .validate()
        .map_err(|e| OfficeError::InvalidMessage(e.to_string()))?;
    Ok(message)
}

/// Parse one line; invalid or unknown messages are logged and dropped
pub fn parse_line(line: &str) -> Option<BackendMessage> {
    match decode(line) {
        Ok(BackendMessage::Unknown) => {
            tracing::debug!("Ignoring unknown message type: {}", line);
            None
        }
        Ok(message) => Some(message),
        Err(e) => {
            tracing::warn!("Dropping backend message: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio::io::AsyncWriteExt;
    use tokio::net::UnixStream;

    #[test]
    fn test_decode_errors() {
        assert!(matches!(decode("{"), Err(OfficeError::JsonError(_))));
        assert!(matches!(
            decode(r#"{"type": "event", "event": {"id": "e1"}}"#),
            Err(OfficeError::InvalidMessage(_))
        ));
    }

    #[test]
    fn test_parse_line_drops_bad_input() {
        assert!(parse_line("not json").is_none());
        assert!(parse_line(r#"{"type": "ping"}"#).is_none());
        assert!(parse_line(r#"{"type": "state_update", "state": {"sessionId": ""}}"#).is_none());
        assert!(parse_line(r#"{"type": "state_update", "state": {"sessionId": "s"}}"#).is_some());
    }

    #[tokio::test]
    async fn test_listen_streams_multiple_lines() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("office.sock");
        let (tx, mut rx) = mpsc::channel(8);
        let shutdown = CancellationToken::new();

        let listener_path = path.clone();
        let listener_shutdown = shutdown.clone();
        let handle =
            tokio::spawn(async move { listen(tx, &listener_path, listener_shutdown).await });

        // Wait for the socket to appear
        let mut stream = loop {
            if let Ok(stream) = UnixStream::connect(&path).await {
                break stream;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        };

        stream
            .write_all(
                b"{\"type\":\"state_update\",\"state\":{\"sessionId\":\"s1\"}}\n\
                  garbage\n\
                  {\"type\":\"event\",\"event\":{\"type\":\"session_start\"}}\n",
            )
            .await
            .unwrap();

        let first = timeout(Duration::from_secs(2), rx.recv()).await.unwrap().unwrap();
        let second = timeout(Duration::from_secs(2), rx.recv()).await.unwrap().unwrap();
        let Event::Backend(first) = first;
        let Event::Backend(second) = second;
        assert!(matches!(*first, BackendMessage::StateUpdate { .. }));
        assert!(matches!(*second, BackendMessage::Event { .. }));

        shutdown.cancel();
        handle.await.unwrap().unwrap();
    }
}
