#![warn(rust_2018_idioms)]

//! Streams raw 48 kHz stereo `f32` PCM from disk to a browser peer as Opus,
//! using copy/paste (non-trickle) SDP signaling over stdin/stdout.

pub mod config;
pub mod encoder;
pub mod error;
pub mod pacer;
pub mod pcm;
pub mod peer;
pub mod signal;
pub mod sink;
pub mod state;

pub use config::{Config, EndOfStream};
pub use error::{Error, Result};
pub use peer::run;

use std::time::Duration;

/// Sample rate of the raw input and of the Opus encoder.
pub const SAMPLE_RATE: u32 = 48000;

/// Interleaved channel count of the raw input.
pub const CHANNELS: usize = 2;

/// Opus frame size must be 2.5, 5, 10, 20, 40 or 60 ms long.
pub const FRAME_DURATION: Duration = Duration::from_millis(20);

/// 20ms @ 48kHz gives 960 samples per channel => 1920 floats.
pub const SAMPLES_PER_FRAME: usize = (SAMPLE_RATE as usize / 1000) * 20 * CHANNELS;

/// Size in bytes of one raw frame of little-endian `f32` samples.
pub const FRAME_BYTES: usize = SAMPLES_PER_FRAME * 4;

/// Upper bound for a single encoded Opus packet.
pub const MAX_OPUS_PACKET_SIZE: usize = 1000;

pub const DEFAULT_AUDIO_FILE: &str = "output.raw";
pub const DEFAULT_STUN_SERVER: &str = "stun:stun.l.google.com:19302";
