//! WebSocket connection handling
//!
//! Dials the signed URL and runs the response-reading side of a session.
//! The reader is an independent task publishing decoded frames on a
//! bounded channel; the channel closing is the termination signal for the
//! drain loop, whether the peer closed, the terminal frame arrived, a
//! decode failed, or the call was cancelled.

use std::time::Duration;

use futures_util::stream::SplitStream;
use futures_util::StreamExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use crate::protocol::{FrameStatus, Response};
use crate::Error;

/// Bound on the initial WebSocket handshake
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Capacity of the response channel; the reader blocks once the drain
/// loop falls this far behind
const RESPONSE_CHANNEL_CAPACITY: usize = 32;

pub(crate) type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Dial a signed URL
///
/// The connection belongs to exactly one recognition call; the caller
/// closes it on every exit path. When the server rejects the upgrade with
/// an HTTP response, its body is folded into the error message.
pub(crate) async fn connect(url: &str) -> Result<WsStream, Error> {
    let (stream, _response) = timeout(HANDSHAKE_TIMEOUT, connect_async(url))
        .await
        .map_err(|_| Error::ConnectionFailed("handshake timed out".to_string()))?
        .map_err(dial_error)?;
    Ok(stream)
}

fn dial_error(err: tungstenite::Error) -> Error {
    match err {
        tungstenite::Error::Http(response) => {
            let status = response.status();
            let body = response
                .into_body()
                .map(|bytes| String::from_utf8_lossy(&bytes).trim().to_string())
                .unwrap_or_default();
            if body.is_empty() {
                Error::ConnectionFailed(format!("server rejected handshake: {}", status))
            } else {
                Error::ConnectionFailed(format!(
                    "server rejected handshake: {}: {}",
                    status, body
                ))
            }
        }
        other => Error::ConnectionFailed(other.to_string()),
    }
}

/// Spawn the response reader for one session
///
/// Decodes one JSON frame per inbound message and forwards it. The task
/// stops, closing the channel by dropping its sender, when:
/// - a frame with End status has been forwarded
/// - the peer closes the connection
/// - a message fails to decode (one error is published first)
/// - the cancellation token fires
pub(crate) fn spawn_reader(
    mut read: SplitStream<WsStream>,
    cancel: CancellationToken,
) -> mpsc::Receiver<Result<Response, Error>> {
    let (tx, rx) = mpsc::channel(RESPONSE_CHANNEL_CAPACITY);

    tokio::spawn(async move {
        loop {
            let message = tokio::select! {
                biased;

                _ = cancel.cancelled() => break,
                message = read.next() => message,
            };

            let Some(message) = message else { break };

            let frame = match message {
                Ok(tungstenite::Message::Text(text)) => decode_frame(text.as_bytes()),
                Ok(tungstenite::Message::Binary(data)) => decode_frame(&data),
                Ok(tungstenite::Message::Close(_)) => break,
                // ping/pong are answered by the transport
                Ok(_) => continue,
                Err(tungstenite::Error::ConnectionClosed)
                | Err(tungstenite::Error::AlreadyClosed) => break,
                Err(e) => {
                    let _ = tx.send(Err(Error::ConnectionFailed(e.to_string()))).await;
                    break;
                }
            };

            match frame {
                Ok(frame) => {
                    let terminal = frame.header.status == FrameStatus::End;
                    if tx.send(Ok(frame)).await.is_err() {
                        // drain loop is gone, nobody left to notify
                        break;
                    }
                    if terminal {
                        break;
                    }
                }
                Err(e) => {
                    let _ = tx.send(Err(e)).await;
                    break;
                }
            }
        }

        log::debug!("response reader stopped");
    });

    rx
}

fn decode_frame(raw: &[u8]) -> Result<Response, Error> {
    serde_json::from_slice(raw).map_err(|e| Error::DecodeFailed(e.to_string()))
}
