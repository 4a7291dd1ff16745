
use bytes::Bytes;
use opus::{Application, Bitrate, Channels};

use crate::error::{Error, Result};
use crate::{MAX_OPUS_PACKET_SIZE, SAMPLES_PER_FRAME, SAMPLE_RATE};

/// FrameEncoder compresses one interleaved PCM frame into a media payload
pub trait FrameEncoder {
    fn encode(&mut self, pcm: &[f32]) -> Result<Bytes>;
}

/// OpusFrameEncoder encodes 20ms of 48kHz stereo audio per call
pub struct OpusFrameEncoder {
    encoder: opus::Encoder,
}

impl OpusFrameEncoder {
    pub fn new(bitrate: Option<i32>) -> Result<Self> {
        let mut encoder = opus::Encoder::new(SAMPLE_RATE, Channels::Stereo, Application::Audio)?;
        if let Some(bps) = bitrate {
            encoder.set_bitrate(Bitrate::Bits(bps))?;
        }

        Ok(OpusFrameEncoder { encoder })
    }
}

impl FrameEncoder for OpusFrameEncoder {
    fn encode(&mut self, pcm: &[f32]) -> Result<Bytes> {
        if pcm.len() != SAMPLES_PER_FRAME {
            return Err(Error::ErrInvalidFrameLength {
                expected: SAMPLES_PER_FRAME,
                actual: pcm.len(),
            });
        }

        let mut data = vec![0u8; MAX_OPUS_PACKET_SIZE];
        let n = self.encoder.encode_float(pcm, &mut data)?;
        log::trace!("opus encoded {} samples to {n} bytes", pcm.len());

        data.truncate(n);
        Ok(Bytes::from(data))
    }
}
