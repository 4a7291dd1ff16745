use std::io;
use std::string::FromUtf8Error;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// ErrAudioFileNotFound indicates the raw PCM input is missing at startup.
    #[error("audio file: '{0}' not exist")]
    ErrAudioFileNotFound(String),

    /// ErrEmptyAudioFile indicates a looping stream over a file with no data.
    #[error("audio file is empty, nothing to loop over")]
    ErrEmptyAudioFile,

    /// ErrSignalInputClosed indicates EOF before a non-empty signaling line.
    #[error("signaling input closed before a session description arrived")]
    ErrSignalInputClosed,

    #[error("generate local_description failed")]
    ErrNoLocalDescription,

    /// ErrConnectionFailed indicates the peer connection failed or was closed
    /// while the audio stream was still running.
    #[error("peer connection failed")]
    ErrConnectionFailed,

    #[error("pcm frame has {actual} samples, expected {expected}")]
    ErrInvalidFrameLength { expected: usize, actual: usize },

    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("utf-8 error: {0}")]
    Utf8(#[from] FromUtf8Error),
    #[error("opus: {0}")]
    Opus(#[from] opus::Error),
    #[error("{0}")]
    WebRTC(#[from] webrtc::Error),
    #[error("task join: {0}")]
    Join(#[from] tokio::task::JoinError),
}
