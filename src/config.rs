use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::{DEFAULT_AUDIO_FILE, DEFAULT_STUN_SERVER};

/// EndOfStream decides what the pacing loop does once the audio file is
/// exhausted. A trailing partial frame is always padded with silence and
/// sent before the policy applies.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub enum EndOfStream {
    /// Finish the stream cleanly.
    #[default]
    Stop,
    /// Rewind to the start of the file and keep streaming.
    Loop,
}

const END_OF_STREAM_STOP_STR: &str = "stop";
const END_OF_STREAM_LOOP_STR: &str = "loop";

impl FromStr for EndOfStream {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.to_ascii_lowercase().as_str() {
            END_OF_STREAM_STOP_STR => Ok(EndOfStream::Stop),
            END_OF_STREAM_LOOP_STR => Ok(EndOfStream::Loop),
            _ => Err(format!("unknown end-of-stream policy '{raw}'")),
        }
    }
}

impl fmt::Display for EndOfStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            EndOfStream::Stop => END_OF_STREAM_STOP_STR,
            EndOfStream::Loop => END_OF_STREAM_LOOP_STR,
        };
        write!(f, "{s}")
    }
}

/// Config holds everything [`crate::run`] needs to set up one streaming
/// session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Raw interleaved 48 kHz stereo little-endian `f32` PCM.
    pub audio_file: PathBuf,
    pub end_of_stream: EndOfStream,
    /// Opus target bitrate in bits per second; encoder default when `None`.
    pub bitrate: Option<i32>,
    /// ICE server urls, e.g. `stun:stun.l.google.com:19302`.
    pub ice_servers: Vec<String>,
    /// Read the remote offer from this file instead of stdin.
    pub input_sdp_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            audio_file: PathBuf::from(DEFAULT_AUDIO_FILE),
            end_of_stream: EndOfStream::default(),
            bitrate: None,
            ice_servers: vec![DEFAULT_STUN_SERVER.to_owned()],
            input_sdp_file: None,
        }
    }
}
