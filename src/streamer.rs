//! Outbound audio frame loop
//!
//! Drains a byte source into the connection as correctly-sequenced frames:
//! one Start frame carrying the recognition parameters, Continue frames of
//! audio, and exactly one End frame. Pacing and cancellation both happen
//! here; every await point races the caller's cancellation token.
//!
//! The sink side is generic over [`Sink<Message>`] so the loop runs against
//! the WebSocket write half in production and an in-memory channel in tests.

use base64::{engine::general_purpose::STANDARD, Engine};
use futures_util::{Sink, SinkExt};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use crate::options::RecognizeOptions;
use crate::protocol::{FrameStatus, Request};
use crate::Error;

/// Send the whole audio source as a framed stream
///
/// Returns the sequence number the next frame would have used, i.e.
/// `seq_start` plus the number of frames sent.
///
/// A short read followed by end-of-input becomes a final partial frame.
/// A source that yields no bytes at all still opens the session: the
/// service requires a parameter-bearing first frame before the terminal
/// frame, so an empty source produces exactly Start then End.
pub(crate) async fn send_audio_frames<R, S>(
    source: &mut R,
    sink: &mut S,
    app_id: &str,
    options: &RecognizeOptions,
    cancel: &CancellationToken,
) -> Result<i64, Error>
where
    R: AsyncRead + Unpin,
    S: Sink<Message> + Unpin,
    S::Error: std::fmt::Display,
{
    let frame_size = options.frame_size.max(1);
    let mut buffer = vec![0u8; frame_size];
    let mut seq = options.seq_start;
    let mut first_frame = true;

    loop {
        let (read, exhausted) = tokio::select! {
            biased;

            _ = cancel.cancelled() => return Err(Error::Cancelled),
            read = read_full(source, &mut buffer) => read?,
        };

        if read > 0 {
            let status = if first_frame {
                FrameStatus::Start
            } else {
                FrameStatus::Continue
            };
            let frame = options.frame(
                app_id,
                seq,
                status,
                STANDARD.encode(&buffer[..read]),
                first_frame,
            );
            first_frame = false;
            write_frame(sink, &frame, options.debug, cancel).await?;
            seq += 1;

            if !exhausted && !options.frame_interval.is_zero() {
                tokio::select! {
                    biased;

                    _ = cancel.cancelled() => return Err(Error::Cancelled),
                    _ = tokio::time::sleep(options.frame_interval) => {}
                }
            }
        }

        if exhausted {
            break;
        }
    }

    if first_frame {
        // zero-length source: the opening frame still has to go out
        let frame = options.frame(app_id, seq, FrameStatus::Start, String::new(), true);
        write_frame(sink, &frame, options.debug, cancel).await?;
        seq += 1;
    }

    let frame = options.frame(app_id, seq, FrameStatus::End, String::new(), false);
    write_frame(sink, &frame, options.debug, cancel).await?;
    seq += 1;

    Ok(seq)
}

/// Fill `buffer` from the source, tolerating short reads
///
/// Returns the byte count actually read and whether the source is
/// exhausted. Only a read that fails outright is an error; end-of-input
/// after a partial fill is a normal final chunk.
async fn read_full<R>(source: &mut R, buffer: &mut [u8]) -> Result<(usize, bool), Error>
where
    R: AsyncRead + Unpin,
{
    let mut filled = 0;
    while filled < buffer.len() {
        let read = source
            .read(&mut buffer[filled..])
            .await
            .map_err(|e| Error::AudioRead(e.to_string()))?;
        if read == 0 {
            return Ok((filled, true));
        }
        filled += read;
    }
    Ok((filled, false))
}

async fn write_frame<S>(
    sink: &mut S,
    frame: &Request,
    debug: bool,
    cancel: &CancellationToken,
) -> Result<(), Error>
where
    S: Sink<Message> + Unpin,
    S::Error: std::fmt::Display,
{
    let json = serde_json::to_string(frame).map_err(|e| Error::SendFailed(e.to_string()))?;

    if debug {
        log::debug!(
            "send frame seq={} status={} audio_chars={}",
            frame.payload.audio.seq,
            u8::from(frame.header.status),
            frame.payload.audio.audio.len()
        );
    }

    tokio::select! {
        biased;

        _ = cancel.cancelled() => Err(Error::Cancelled),
        sent = sink.send(Message::Text(json)) => {
            sent.map_err(|e| Error::SendFailed(e.to_string()))
        }
    }
}
