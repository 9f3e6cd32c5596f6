//! Per-call recognition options
//!
//! Every default is written out here rather than inferred from zero
//! values, so a caller who genuinely wants a zero (say `eos: Some(0)`)
//! can ask for it. Override individual fields with struct update syntax:
//!
//! ```
//! use std::time::Duration;
//! use iat_stream::{IatParameter, RecognizeOptions};
//!
//! let options = RecognizeOptions {
//!     frame_interval: Duration::from_millis(20),
//!     iat: IatParameter {
//!         dwa: Some("wpgs".to_string()),
//!         ..IatParameter::default()
//!     },
//!     ..RecognizeOptions::default()
//! };
//! ```

use std::time::Duration;

use crate::protocol::{
    AudioFormat, AudioPayload, FrameStatus, IatParameter, Request, RequestHeader,
    RequestParameter, RequestPayload,
};

/// Bytes of raw audio per frame
pub const DEFAULT_FRAME_SIZE: usize = 1280;
/// Pause between consecutive audio frames
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(40);
/// Sequence number of the first frame
pub const DEFAULT_SEQ_START: i64 = 1;

/// Tunables for one recognition call
#[derive(Debug, Clone)]
pub struct RecognizeOptions {
    /// Hotword resource id, sent in every frame header when set
    pub res_id: Option<String>,
    /// Recognition-mode parameters carried by the Start frame
    pub iat: IatParameter,
    /// Physical format of the audio source
    pub audio: AudioFormat,
    /// Bytes per frame; the last frame may be shorter
    pub frame_size: usize,
    /// Pacing delay between frames; zero disables pacing
    pub frame_interval: Duration,
    /// First sequence number; subsequent frames count up from here
    pub seq_start: i64,
    /// Frame-level tracing via `log::debug!`
    pub debug: bool,
}

impl Default for RecognizeOptions {
    fn default() -> Self {
        Self {
            res_id: None,
            iat: IatParameter::default(),
            audio: AudioFormat::default(),
            frame_size: DEFAULT_FRAME_SIZE,
            frame_interval: DEFAULT_FRAME_INTERVAL,
            seq_start: DEFAULT_SEQ_START,
            debug: false,
        }
    }
}

impl RecognizeOptions {
    /// Assemble one outbound frame under these options
    pub(crate) fn frame(
        &self,
        app_id: &str,
        seq: i64,
        status: FrameStatus,
        audio: String,
        include_parameter: bool,
    ) -> Request {
        Request {
            header: RequestHeader {
                app_id: app_id.to_string(),
                res_id: self.res_id.clone(),
                status,
            },
            parameter: include_parameter.then(|| RequestParameter {
                iat: self.iat.clone(),
            }),
            payload: RequestPayload {
                audio: AudioPayload {
                    format: self.audio.clone(),
                    seq,
                    status,
                    audio,
                },
            },
        }
    }
}
