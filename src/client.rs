//! Recognition client and call orchestration
//!
//! One call = one signed URL, one connection, one streaming pass, one
//! drain pass. The audio-sending side runs on the caller's task while the
//! response reader runs concurrently; a single channel bridges the two.

use chrono::Utc;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::io::AsyncRead;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use crate::aggregator::{SentenceAggregator, SentenceResult};
use crate::auth::{build_auth_url, Credentials};
use crate::connection::{self, WsStream};
use crate::options::RecognizeOptions;
use crate::protocol::{FrameStatus, Response, TextResult};
use crate::streamer;
use crate::{ApiError, Error};

/// Final output of a successful recognition call
#[derive(Debug, Clone)]
pub struct RecognitionResult {
    /// Session id assigned by the service
    pub sid: String,
    /// Concatenated transcript, best-known at the moment the stream ended
    pub text: String,
    /// Per-sentence records behind `text`, ascending by sentence index
    pub sentences: Vec<SentenceResult>,
    /// Every response frame received, for diagnostics
    pub frames: Vec<Response>,
}

/// Client for the realtime dictation service
///
/// Holds validated credentials; each [`recognize`](IatClient::recognize)
/// call opens and tears down its own connection, so one client can serve
/// any number of sequential or concurrent calls.
pub struct IatClient {
    credentials: Credentials,
}

impl IatClient {
    /// Create a client, rejecting incomplete credentials before any
    /// network I/O happens
    pub fn new(credentials: Credentials) -> Result<Self, Error> {
        credentials.validate()?;
        Ok(Self { credentials })
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Recognize one audio stream to completion
    pub async fn recognize<R>(
        &self,
        audio: R,
        options: RecognizeOptions,
    ) -> Result<RecognitionResult, Error>
    where
        R: AsyncRead + Unpin,
    {
        self.recognize_with_cancel(audio, options, CancellationToken::new())
            .await
    }

    /// Recognize one audio stream, honoring the caller's cancellation token
    ///
    /// Cancellation is observed at every blocking point: the audio read,
    /// the pacing sleep, and the response receive. A cancelled call closes
    /// the connection and returns [`Error::Cancelled`], never a partial
    /// result. There is no retry at any level; retrying means a fresh call
    /// with a fresh signed session.
    pub async fn recognize_with_cancel<R>(
        &self,
        mut audio: R,
        mut options: RecognizeOptions,
        cancel: CancellationToken,
    ) -> Result<RecognitionResult, Error>
    where
        R: AsyncRead + Unpin,
    {
        if self.credentials.debug {
            options.debug = true;
        }

        let url = build_auth_url(&self.credentials, Utc::now())?;
        if options.debug {
            log::debug!("connecting to {}", url);
        }

        let stream = connection::connect(&url).await?;
        let (mut write, read) = stream.split();

        let reader_cancel = cancel.child_token();
        let mut responses = connection::spawn_reader(read, reader_cancel.clone());

        let outcome = self
            .run_session(&mut audio, &mut write, &mut responses, &options, &cancel)
            .await;

        // the connection belongs to this call alone; tear it down on every
        // exit path, success or not
        reader_cancel.cancel();
        if let Err(e) = write.close().await {
            log::debug!("error closing connection: {}", e);
        }

        outcome
    }

    async fn run_session<R>(
        &self,
        audio: &mut R,
        write: &mut SplitSink<WsStream, Message>,
        responses: &mut mpsc::Receiver<Result<Response, Error>>,
        options: &RecognizeOptions,
        cancel: &CancellationToken,
    ) -> Result<RecognitionResult, Error>
    where
        R: AsyncRead + Unpin,
    {
        if options.debug {
            log::debug!(
                "streaming audio, frame_size={} interval={:?}",
                options.frame_size,
                options.frame_interval
            );
        }

        streamer::send_audio_frames(audio, write, &self.credentials.app_id, options, cancel)
            .await?;

        let mut aggregator = SentenceAggregator::new();
        let mut sid = String::new();
        let mut frames: Vec<Response> = Vec::new();

        loop {
            let received = tokio::select! {
                biased;

                _ = cancel.cancelled() => return Err(Error::Cancelled),
                received = responses.recv() => received,
            };

            // channel closed: the reader saw the peer close the connection
            let Some(item) = received else { break };
            let frame = item?;

            if frame.header.code != 0 {
                return Err(Error::Api(ApiError {
                    code: frame.header.code,
                    message: frame.header.message.clone(),
                    sid: frame.header.sid.clone(),
                }));
            }

            if sid.is_empty() {
                sid = frame.header.sid.clone();
            }

            if let Some(result) = frame.payload.as_ref().and_then(|p| p.result.as_ref()) {
                if !result.text.is_empty() {
                    let update = TextResult::decode(&result.text)?;
                    aggregator.apply(&update);
                }
            }

            let terminal = frame.header.status == FrameStatus::End;
            frames.push(frame);
            if terminal {
                break;
            }
        }

        let (text, sentences) = aggregator.summary();
        if options.debug {
            log::debug!("recognition finished sid={} text={}", sid, text);
        }

        Ok(RecognitionResult {
            sid,
            text,
            sentences,
            frames,
        })
    }
}
